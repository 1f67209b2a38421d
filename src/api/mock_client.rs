use super::backend::{ByteStream, ChatBackend};
use crate::error::{ChatError, Result};
use crate::types::ClearResponse;
use bytes::Bytes;
use futures::channel::mpsc;
use futures::future::BoxFuture;
use futures::stream;
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// One scripted answer to `open_chat_stream`.
pub enum ChatReply {
    /// Body delivered as these exact physical chunks.
    Chunks(Vec<Bytes>),
    /// Body fed by the test through the paired sender.
    Channel(mpsc::UnboundedReceiver<Result<Bytes>>),
    /// The request itself fails.
    Fail(ChatError),
}

/// `ChatBackend` that replays scripted responses in order.
#[derive(Default)]
pub struct ScriptedBackend {
    chat_replies: Mutex<VecDeque<ChatReply>>,
    history_replies: Mutex<VecDeque<Result<Value>>>,
    clear_replies: Mutex<VecDeque<Result<ClearResponse>>>,
    sent_messages: Mutex<Vec<String>>,
    chat_calls: AtomicUsize,
    history_calls: AtomicUsize,
    clear_calls: AtomicUsize,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_chat(&self, reply: ChatReply) {
        self.chat_replies.lock().unwrap().push_back(reply);
    }

    /// Queues a reply whose body is `chunks`, each delivered as one read.
    pub fn push_chat_chunks<I, S>(&self, chunks: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<Vec<u8>>,
    {
        let chunks = chunks
            .into_iter()
            .map(|chunk| Bytes::from(chunk.into()))
            .collect();
        self.push_chat(ChatReply::Chunks(chunks));
    }

    /// Queues a reply driven by the returned sender; dropping it ends the body.
    pub fn push_chat_channel(&self) -> mpsc::UnboundedSender<Result<Bytes>> {
        let (tx, rx) = mpsc::unbounded();
        self.push_chat(ChatReply::Channel(rx));
        tx
    }

    pub fn push_chat_failure(&self, error: ChatError) {
        self.push_chat(ChatReply::Fail(error));
    }

    pub fn push_history(&self, reply: Result<Value>) {
        self.history_replies.lock().unwrap().push_back(reply);
    }

    pub fn push_clear(&self, reply: Result<ClearResponse>) {
        self.clear_replies.lock().unwrap().push_back(reply);
    }

    pub fn chat_calls(&self) -> usize {
        self.chat_calls.load(Ordering::SeqCst)
    }

    pub fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    pub fn sent_messages(&self) -> Vec<String> {
        self.sent_messages.lock().unwrap().clone()
    }
}

impl ChatBackend for ScriptedBackend {
    fn open_chat_stream<'a>(
        &'a self,
        _token: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<ByteStream>> {
        self.chat_calls.fetch_add(1, Ordering::SeqCst);
        self.sent_messages.lock().unwrap().push(message.to_string());
        let reply = self.chat_replies.lock().unwrap().pop_front();

        Box::pin(async move {
            match reply {
                Some(ChatReply::Chunks(chunks)) => {
                    let items: Vec<Result<Bytes>> = chunks.into_iter().map(Ok).collect();
                    Ok(Box::pin(stream::iter(items)) as ByteStream)
                }
                Some(ChatReply::Channel(rx)) => Ok(Box::pin(rx) as ByteStream),
                Some(ChatReply::Fail(error)) => Err(error),
                None => Err(ChatError::Transport(
                    "ScriptedBackend: no chat reply configured".to_string(),
                )),
            }
        })
    }

    fn fetch_history<'a>(&'a self, _token: &'a str) -> BoxFuture<'a, Result<Value>> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.history_replies.lock().unwrap().pop_front();
        Box::pin(async move {
            reply.unwrap_or_else(|| {
                Err(ChatError::Transport(
                    "ScriptedBackend: no history reply configured".to_string(),
                ))
            })
        })
    }

    fn clear_history<'a>(&'a self, _token: &'a str) -> BoxFuture<'a, Result<ClearResponse>> {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
        let reply = self.clear_replies.lock().unwrap().pop_front();
        Box::pin(async move {
            reply.unwrap_or_else(|| {
                Err(ChatError::Transport(
                    "ScriptedBackend: no clear reply configured".to_string(),
                ))
            })
        })
    }
}

/// A `data: {"text": ...}` line, newline included.
pub fn text_frame(text: &str) -> String {
    format!("data: {}\n", json!({ "text": text }))
}

/// A `data: {"error": ...}` line, newline included.
pub fn error_frame(message: &str) -> String {
    format!("data: {}\n", json!({ "error": message }))
}
