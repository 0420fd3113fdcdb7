//! Terminal rendition of the UI side effects.

use std::sync::atomic::{AtomicBool, Ordering};

use log::warn;

use crate::hooks::{Notice, UiEffects, LOGIN_ROUTE};

/// Prints redirects and notices to stderr.
#[derive(Debug, Default)]
pub struct TerminalEffects {
    login_required: AtomicBool,
}

impl TerminalEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once any request was redirected to the login page.
    pub fn login_required(&self) -> bool {
        self.login_required.load(Ordering::SeqCst)
    }
}

impl UiEffects for TerminalEffects {
    fn navigate(&self, route: &str) {
        if route == LOGIN_ROUTE {
            self.login_required.store(true, Ordering::SeqCst);
            eprintln!("Authentication required. Run `amlctl login --token <TOKEN>` and retry.");
        } else {
            warn!("Ignoring navigation to {}", route);
        }
    }

    fn notify(&self, notice: Notice) {
        eprintln!("{}", notice);
    }
}
