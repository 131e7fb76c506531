//! Test doubles shared across this crate's test modules.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use crate::error::Result;
use crate::messaging::Messenger;
use crate::transport::{ApiResponse, Transport};

/// Scripted transport: fixed response per URL, counts calls, optional
/// artificial latency for concurrency tests. Unknown URLs answer 500.
pub(crate) struct MockTransport {
    responses: StdMutex<HashMap<String, ApiResponse>>,
    calls: StdMutex<Vec<String>>,
    delay: Duration,
}

impl MockTransport {
    pub(crate) fn new() -> Self {
        Self {
            responses: StdMutex::new(HashMap::new()),
            calls: StdMutex::new(Vec::new()),
            delay: Duration::ZERO,
        }
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn respond(self, url: &str, code: u16, body: serde_json::Value) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(url.to_string(), ApiResponse { code, body });
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

    pub(crate) fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn answer(&self, url: &str) -> ApiResponse {
        self.calls.lock().unwrap().push(url.to_string());
        self.responses
            .lock()
            .unwrap()
            .get(url)
            .cloned()
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
        _body: serde_json::Value,
        _user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move {
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            Ok(self.answer(url))
        })
    }

    fn get<'a>(
        &'a self,
        url: &'a str,
        _user_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<ApiResponse>> + Send + 'a>> {
        Box::pin(async move { Ok(self.answer(url)) })
    }
}

/// Messenger double capturing everything it is asked to show.
#[derive(Default)]
pub(crate) struct RecordingMessenger {
    pub(crate) errors: StdMutex<Vec<String>>,
    pub(crate) warnings: StdMutex<Vec<String>>,
    pub(crate) infos: StdMutex<Vec<String>>,
}

impl Messenger for RecordingMessenger {
    fn loading(&self, _key: &str, _text: &str) {}
    fn success(&self, _key: &str, _text: &str) {}
    fn info(&self, text: &str) {
        self.infos.lock().unwrap().push(text.to_string());
    }
    fn warning(&self, text: &str) {
        self.warnings.lock().unwrap().push(text.to_string());
    }
    fn error(&self, text: &str) {
        self.errors.lock().unwrap().push(text.to_string());
    }
}
