//! Account directory for the drive credential manager
//!
//! Owns the set of known accounts and which one is active. Startup loads
//! every persisted record and validates it through the refresh
//! coordinator; the first validated record (preferring the saved default)
//! becomes active. Logoff falls back to the next account that still
//! validates; a periodic sweep renews credentials by expiry proximity.
//!
//! Account lifecycle:
//! 1. `AccountDirectory::load_all` validates persisted records at startup
//! 2. The chosen record goes through `login`: profile fetch, session
//!    refresh, default-account persistence, hooks + broadcast
//! 3. `spawn_sweep_task` renews approaching-expiry credentials in the
//!    background
//! 4. A terminal refresh rejection purges the account; `logoff`/`switch`
//!    pick a replacement or signal the login screen

pub mod directory;
pub mod hooks;
pub mod sweep;

#[cfg(test)]
mod testutil;

pub use directory::AccountDirectory;
pub use hooks::{NullHooks, SessionHooks};
pub use sweep::spawn_sweep_task;
