//! Application view-state boundary
//!
//! The surrounding application owns account-scoped view state (file
//! trees, share lists, the login screen). The directory only signals
//! lifecycle transitions through this trait; it never reads UI state
//! back.

/// Callbacks into account-scoped application state.
pub trait SessionHooks: Send + Sync {
    /// A record became the active account.
    fn account_activated(&self, user_id: &str);
    /// No account is active any more.
    fn account_cleared(&self);
    /// Drop account-scoped view state before a different account takes over.
    fn reset_account_views(&self);
    /// No stored account validates; the user must authenticate.
    fn show_login(&self);
}

/// Hooks that do nothing. Used for headless operation and tests.
#[derive(Debug, Default)]
pub struct NullHooks;

impl SessionHooks for NullHooks {
    fn account_activated(&self, _user_id: &str) {}
    fn account_cleared(&self) {}
    fn reset_account_views(&self) {}
    fn show_login(&self) {}
}
