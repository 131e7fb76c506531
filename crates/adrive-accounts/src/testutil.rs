//! Test doubles shared across this crate's test modules.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex as StdMutex;

use adrive_auth::messaging::Messenger;
use adrive_auth::notify::{TokenAnnouncement, TokenBroadcast};
use adrive_auth::transport::{ApiResponse, Transport};

use crate::hooks::SessionHooks;

struct Rule {
    url: String,
    body_contains: Option<String>,
    response: ApiResponse,
}

/// Scripted transport with routing on URL plus an optional request-body
/// substring, so two accounts hitting the same endpoint can get different
/// answers (e.g. one valid and one rejected refresh token). Rules match
/// in insertion order; unmatched requests answer 500.
pub(crate) struct MockTransport {
    rules: StdMutex<Vec<Rule>>,
    calls: StdMutex<Vec<String>>,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            rules: StdMutex::new(Vec::new()),
            calls: StdMutex::new(Vec::new()),
        }
    }

    pub(crate) fn respond(self, url: &str, code: u16, body: serde_json::Value) -> Self {
        self.rules.lock().unwrap().push(Rule {
            url: url.to_string(),
            body_contains: None,
            response: ApiResponse { code, body },
        });
        self
    }

    pub(crate) fn respond_matching(
        self,
        url: &str,
        body_contains: &str,
        code: u16,
        body: serde_json::Value,
    ) -> Self {
        self.rules.lock().unwrap().push(Rule {
            url: url.to_string(),
            body_contains: Some(body_contains.to_string()),
            response: ApiResponse { code, body },
        });
        self
    }

    pub(crate) fn calls_to(&self, url: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|u| *u == url)
            .count()
    }

    fn answer(&self, url: &str, request_body: &serde_json::Value) -> ApiResponse {
        self.calls.lock().unwrap().push(url.to_string());
        let request_text = request_body.to_string();
        let rules = self.rules.lock().unwrap();
        rules
            .iter()
            .find(|rule| {
                rule.url == url
                    && rule
                        .body_contains
                        .as_ref()
                        .is_none_or(|needle| request_text.contains(needle.as_str()))
            })
            .map(|rule| rule.response.clone())
            .unwrap_or(ApiResponse {
                code: 500,
                body: serde_json::Value::Null,
            })
    }
}

impl Transport for MockTransport {
    fn post<'a>(
        &'a self,
        url: &'a str,
        body: serde_json::Value,
        _user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = adrive_auth::Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move { Ok(self.answer(url, &body)) })
    }

    fn get<'a>(
        &'a self,
        url: &'a str,
        _user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = adrive_auth::Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move { Ok(self.answer(url, &serde_json::Value::Null)) })
    }
}

/// Messenger double capturing warnings and errors.
#[derive(Default)]
pub(crate) struct RecordingMessenger {
    pub(crate) errors: StdMutex<Vec<String>>,
    pub(crate) warnings: StdMutex<Vec<String>>,
}

impl Messenger for RecordingMessenger {
    fn loading(&self, _key: &str, _text: &str) {}
    fn success(&self, _key: &str, _text: &str) {}
    fn info(&self, _text: &str) {}
    fn warning(&self, text: &str) {
        self.warnings.lock().unwrap().push(text.to_string());
    }
    fn error(&self, text: &str) {
        self.errors.lock().unwrap().push(text.to_string());
    }
}

/// Hooks double recording lifecycle signals.
#[derive(Default)]
pub(crate) struct RecordingHooks {
    pub(crate) activated: StdMutex<Vec<String>>,
    pub(crate) cleared: StdMutex<usize>,
    pub(crate) resets: StdMutex<usize>,
    pub(crate) login_shown: StdMutex<usize>,
}

impl SessionHooks for RecordingHooks {
    fn account_activated(&self, user_id: &str) {
        self.activated.lock().unwrap().push(user_id.to_string());
    }
    fn account_cleared(&self) {
        *self.cleared.lock().unwrap() += 1;
    }
    fn reset_account_views(&self) {
        *self.resets.lock().unwrap() += 1;
    }
    fn show_login(&self) {
        *self.login_shown.lock().unwrap() += 1;
    }
}

/// Broadcast double recording announcements.
#[derive(Default)]
pub(crate) struct RecordingBroadcast {
    pub(crate) events: StdMutex<Vec<TokenAnnouncement>>,
}

impl TokenBroadcast for RecordingBroadcast {
    fn announce(&self, announcement: TokenAnnouncement) {
        self.events.lock().unwrap().push(announcement);
    }
}
