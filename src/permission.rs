use log::warn;

use crate::activity::Activity;

pub const CAMERA: &str = "android.permission.CAMERA";
pub const READ_EXTERNAL_STORAGE: &str = "android.permission.READ_EXTERNAL_STORAGE";
pub const WRITE_EXTERNAL_STORAGE: &str = "android.permission.WRITE_EXTERNAL_STORAGE";

/// Everything the camera screen needs before it may open a camera.
pub const REQUIRED_PERMISSIONS: [&str; 3] = [CAMERA, READ_EXTERNAL_STORAGE, WRITE_EXTERNAL_STORAGE];

/// Outcome of a permission request, in request order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionResult {
    entries: Vec<(String, bool)>,
}

impl PermissionResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn granted(permissions: &[&str]) -> Self {
        permissions.iter().map(|p| (p.to_string(), true)).collect()
    }

    pub fn denied(permissions: &[&str]) -> Self {
        permissions.iter().map(|p| (p.to_string(), false)).collect()
    }

    pub fn insert(&mut self, permission: &str, granted: bool) {
        match self.entries.iter_mut().find(|(p, _)| p == permission) {
            Some(entry) => entry.1 = granted,
            None => self.entries.push((permission.to_string(), granted)),
        }
    }

    pub fn is_granted(&self, permission: &str) -> bool {
        self.entries
            .iter()
            .any(|(p, granted)| p == permission && *granted)
    }

    /// A cancelled request comes back empty and counts as denied.
    pub fn all_granted(&self) -> bool {
        !self.entries.is_empty() && self.entries.iter().all(|(_, granted)| *granted)
    }

    pub fn entries(&self) -> &[(String, bool)] {
        &self.entries
    }
}

impl FromIterator<(String, bool)> for PermissionResult {
    fn from_iter<T: IntoIterator<Item = (String, bool)>>(iter: T) -> Self {
        let mut result = PermissionResult::new();
        for (permission, granted) in iter {
            result.insert(&permission, granted);
        }
        result
    }
}

/// Grant state of one permission as the host reports it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionState {
    pub permission: String,
    pub granted: bool,
    /// `shouldShowRequestPermissionRationale`.
    pub show_rationale: bool,
}

/// Decides when a permission dialog has been answered, from grant state
/// sampled before the request and while it is pending.
///
/// The user denied once a permission still not granted has its rationale flag
/// changed: false to true after a first denial, true to false after a denial
/// with "don't ask again".
#[derive(Debug, Clone)]
pub struct PermissionWatch {
    before: Vec<PermissionState>,
}

impl PermissionWatch {
    pub fn new(before: Vec<PermissionState>) -> Self {
        Self { before }
    }

    /// `None` while the dialog is still open.
    pub fn decide(&self, now: &[PermissionState]) -> Option<PermissionResult> {
        let result: PermissionResult = now
            .iter()
            .map(|state| (state.permission.clone(), state.granted))
            .collect();
        if result.all_granted() {
            return Some(result);
        }
        let answered = now.iter().filter(|state| !state.granted).any(|state| {
            self.before
                .iter()
                .find(|before| before.permission == state.permission)
                .is_some_and(|before| before.show_rationale != state.show_rationale)
        });
        answered.then_some(result)
    }
}

pub fn all_permissions_granted<A: Activity + ?Sized>(activity: &A, permissions: &[&str]) -> bool {
    permissions
        .iter()
        .all(|permission| match activity.check_self_permission(permission) {
            Ok(granted) => granted,
            Err(err) => {
                warn!("checkSelfPermission({permission}) failed: {err:?}");
                false
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_is_not_granted() {
        assert!(!PermissionResult::new().all_granted());
    }

    #[test]
    fn one_denial_fails_the_whole_set() {
        let mut result = PermissionResult::granted(&REQUIRED_PERMISSIONS);
        assert!(result.all_granted());
        result.insert(WRITE_EXTERNAL_STORAGE, false);
        assert!(!result.all_granted());
        assert!(result.is_granted(CAMERA));
        assert!(!result.is_granted(WRITE_EXTERNAL_STORAGE));
        assert_eq!(result.entries().len(), 3);
    }

    fn state(permission: &str, granted: bool, show_rationale: bool) -> PermissionState {
        PermissionState {
            permission: permission.to_string(),
            granted,
            show_rationale,
        }
    }

    #[test]
    fn watch_waits_while_dialog_is_open() {
        let watch = PermissionWatch::new(vec![state(CAMERA, false, false)]);
        assert_eq!(watch.decide(&[state(CAMERA, false, false)]), None);
    }

    #[test]
    fn watch_reports_grant() {
        let watch = PermissionWatch::new(vec![state(CAMERA, false, false)]);
        let result = watch.decide(&[state(CAMERA, true, false)]).unwrap();
        assert!(result.all_granted());
    }

    #[test]
    fn watch_reports_first_denial() {
        let watch = PermissionWatch::new(vec![
            state(CAMERA, false, false),
            state(WRITE_EXTERNAL_STORAGE, false, false),
        ]);
        let result = watch
            .decide(&[
                state(CAMERA, false, true),
                state(WRITE_EXTERNAL_STORAGE, true, false),
            ])
            .unwrap();
        assert!(!result.all_granted());
        assert!(!result.is_granted(CAMERA));
        assert!(result.is_granted(WRITE_EXTERNAL_STORAGE));
    }

    #[test]
    fn watch_reports_dont_ask_again() {
        let watch = PermissionWatch::new(vec![state(CAMERA, false, true)]);
        assert_eq!(watch.decide(&[state(CAMERA, false, true)]), None);
        let result = watch.decide(&[state(CAMERA, false, false)]).unwrap();
        assert!(!result.all_granted());
    }

    #[test]
    fn keeps_request_order() {
        let result = PermissionResult::denied(&REQUIRED_PERMISSIONS);
        let order: Vec<&str> = result.entries().iter().map(|(p, _)| p.as_str()).collect();
        assert_eq!(order, REQUIRED_PERMISSIONS);
    }
}
