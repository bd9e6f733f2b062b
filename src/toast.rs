use std::time::Duration;

use crate::activity::Activity;

/// How long a toast stays visible. `Activity::finish` waits the same time.
pub const LENGTH_SHORT: Duration = Duration::from_millis(2000);

pub trait ShowToast {
    fn show_toast(&self, message: &str);
}

impl<A: Activity + ?Sized> ShowToast for A {
    fn show_toast(&self, message: &str) {
        self.make_toast(message, LENGTH_SHORT);
    }
}
