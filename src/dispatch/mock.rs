use crate::dispatch::{CollectorTransport, TransportError};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Status(u16),
    Fail(TransportError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub url: String,
    pub body: String,
}

#[derive(Debug, Default)]
struct Recorder {
    responses: VecDeque<MockResponse>,
    calls: Vec<RecordedCall>,
}

/// Transport that records every request and replays scripted responses.
///
/// Cloned handles share the same recording, so a test can keep one while the
/// dispatcher owns another. Once the script runs out every request gets 200.
#[derive(Debug, Clone, Default)]
pub struct RecordingTransport {
    inner: Arc<Mutex<Recorder>>,
}

impl RecordingTransport {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Recorder {
                responses: responses.into(),
                calls: Vec::new(),
            })),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.inner
            .lock()
            .map(|recorder| recorder.calls.clone())
            .unwrap_or_default()
    }
}

impl CollectorTransport for RecordingTransport {
    fn post_json(&self, url: &str, body: &str) -> Result<u16, TransportError> {
        let mut recorder = self
            .inner
            .lock()
            .map_err(|_| TransportError::Io("mock transport lock poisoned".to_string()))?;
        recorder.calls.push(RecordedCall {
            url: url.to_string(),
            body: body.to_string(),
        });
        match recorder.responses.pop_front() {
            Some(MockResponse::Status(status)) => Ok(status),
            Some(MockResponse::Fail(err)) => Err(err),
            None => Ok(200),
        }
    }
}
