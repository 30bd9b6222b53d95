//! Scripted chat client for local runs and tests

use super::{ChatClient, ChatRequest, TokenStream};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard};

const DEFAULT_ANSWER: &[&str] = &[
    "This is a mock answer ",
    "grounded in the first document",
    "{{cita",
    "tion:0}}.",
];

enum StreamScript {
    Items(Vec<Result<String>>),
    OpenError(AppError),
}

/// Chat client that replays queued responses.
///
/// Completions and streams are consumed in the order they were queued. An
/// exhausted completion queue returns an empty string; an exhausted stream
/// queue replays a short canned answer citing document 0.
///
/// Requests are kept only after [`ScriptedChatClient::with_recording`].
#[derive(Default)]
pub struct ScriptedChatClient {
    completions: Mutex<VecDeque<Result<String>>>,
    streams: Mutex<VecDeque<StreamScript>>,
    recording: bool,
    requests: Mutex<Vec<ChatRequest>>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl ScriptedChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep every request for later inspection.
    pub fn with_recording(mut self) -> Self {
        self.recording = true;
        self
    }

    /// Queue a successful completion.
    pub fn with_completion(self, text: impl Into<String>) -> Self {
        lock(&self.completions).push_back(Ok(text.into()));
        self
    }

    /// Queue a failing completion.
    pub fn with_completion_error(self, message: impl Into<String>) -> Self {
        lock(&self.completions).push_back(Err(AppError::Llm {
            message: message.into(),
        }));
        self
    }

    /// Queue a stream that yields `fragments` and then ends.
    pub fn with_stream<S: Into<String>>(self, fragments: impl IntoIterator<Item = S>) -> Self {
        let items = fragments.into_iter().map(|f| Ok(f.into())).collect();
        lock(&self.streams).push_back(StreamScript::Items(items));
        self
    }

    /// Queue a stream that yields `fragments` and then fails mid-read.
    pub fn with_stream_failing_after<S: Into<String>>(
        self,
        fragments: impl IntoIterator<Item = S>,
        message: impl Into<String>,
    ) -> Self {
        let mut items: Vec<Result<String>> = fragments.into_iter().map(|f| Ok(f.into())).collect();
        items.push(Err(AppError::Llm {
            message: message.into(),
        }));
        lock(&self.streams).push_back(StreamScript::Items(items));
        self
    }

    /// Queue a stream that cannot be opened.
    pub fn with_stream_open_error(self, message: impl Into<String>) -> Self {
        lock(&self.streams).push_back(StreamScript::OpenError(AppError::ServiceUnavailable {
            message: message.into(),
        }));
        self
    }

    /// Requests received so far, in call order. Empty unless recording.
    pub fn requests(&self) -> Vec<ChatRequest> {
        lock(&self.requests).clone()
    }

    fn record(&self, request: &ChatRequest) {
        if self.recording {
            lock(&self.requests).push(request.clone());
        }
    }
}

#[async_trait]
impl ChatClient for ScriptedChatClient {
    fn provider_name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.record(request);
        lock(&self.completions)
            .pop_front()
            .unwrap_or_else(|| Ok(String::new()))
    }

    async fn stream(&self, request: &ChatRequest) -> Result<TokenStream> {
        self.record(request);
        let script = lock(&self.streams).pop_front();

        let items = match script {
            Some(StreamScript::Items(items)) => items,
            Some(StreamScript::OpenError(err)) => return Err(err),
            None => DEFAULT_ANSWER.iter().map(|f| Ok(f.to_string())).collect(),
        };

        Ok(Box::pin(futures::stream::iter(items)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ChatMessage;
    use futures::StreamExt;

    fn request() -> ChatRequest {
        ChatRequest::new("mock", vec![ChatMessage::user("q")])
    }

    #[tokio::test]
    async fn test_completions_replay_in_order() {
        let client = ScriptedChatClient::new()
            .with_recording()
            .with_completion("first")
            .with_completion_error("boom");

        assert_eq!(client.complete(&request()).await.unwrap(), "first");
        assert!(client.complete(&request()).await.is_err());
        assert_eq!(client.complete(&request()).await.unwrap(), "");
        assert_eq!(client.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_requests_are_not_kept_by_default() {
        let client = ScriptedChatClient::new();
        for _ in 0..3 {
            client.complete(&request()).await.unwrap();
            let _ = client.stream(&request()).await.unwrap();
        }
        assert!(client.requests().is_empty());
    }

    #[tokio::test]
    async fn test_stream_failure_after_fragments() {
        let client = ScriptedChatClient::new().with_stream_failing_after(["a", "b"], "reset");
        let items: Vec<_> = client.stream(&request()).await.unwrap().collect().await;

        assert_eq!(items.len(), 3);
        assert_eq!(items[1].as_deref().unwrap(), "b");
        assert!(items[2].is_err());
    }

    #[tokio::test]
    async fn test_default_stream_cites_first_document() {
        let client = ScriptedChatClient::new();
        let text: String = client
            .stream(&request())
            .await
            .unwrap()
            .filter_map(|item| async move { item.ok() })
            .collect()
            .await;

        assert!(text.contains("{{citation:0}}"));
    }
}
