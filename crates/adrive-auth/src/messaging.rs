//! User-facing messaging boundary
//!
//! The credential core only emits messages; it never reads UI state back.
//! `loading` opens a dismissible indicator keyed by a caller-supplied
//! token, and a later `success` with the same key replaces it. Implementors
//! are expected to be cheap and non-blocking (queue and return).

/// Sink for user-visible notifications.
pub trait Messenger: Send + Sync {
    /// Open (or replace) a loading indicator under `key`.
    fn loading(&self, key: &str, text: &str);
    /// Dismiss the indicator under `key` with a success message.
    fn success(&self, key: &str, text: &str);
    fn info(&self, text: &str);
    fn warning(&self, text: &str);
    fn error(&self, text: &str);
}

/// Messenger that drops everything. Used for headless operation and tests.
#[derive(Debug, Default)]
pub struct NullMessenger;

impl Messenger for NullMessenger {
    fn loading(&self, _key: &str, _text: &str) {}
    fn success(&self, _key: &str, _text: &str) {}
    fn info(&self, _text: &str) {}
    fn warning(&self, _text: &str) {}
    fn error(&self, _text: &str) {}
}
