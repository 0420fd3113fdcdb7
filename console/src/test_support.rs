//! Fakes shared by the unit tests.

use parking_lot::Mutex;

use crate::hooks::{Notice, TokenSource, UiEffects};

pub struct FixedToken(pub Option<String>);

impl TokenSource for FixedToken {
    fn token(&self) -> Option<String> {
        self.0.clone()
    }
}

/// Records every redirect and notice instead of showing it.
#[derive(Default)]
pub struct RecordedEffects {
    pub routes: Mutex<Vec<String>>,
    pub notices: Mutex<Vec<Notice>>,
}

impl UiEffects for RecordedEffects {
    fn navigate(&self, route: &str) {
        self.routes.lock().push(route.to_string());
    }

    fn notify(&self, notice: Notice) {
        self.notices.lock().push(notice);
    }
}
