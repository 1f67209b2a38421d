use crate::error::Result;
use crate::types::ClearResponse;
use bytes::Bytes;
use futures::future::BoxFuture;
use futures::Stream;
use serde_json::Value;
use std::pin::Pin;

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Remote chat endpoints the session controller depends on.
///
/// Every call receives the bearer token explicitly; token lookup and the
/// "no token" short-circuit belong to the caller.
pub trait ChatBackend: Send + Sync {
    /// `POST /message_chat`; resolves once response headers arrive.
    fn open_chat_stream<'a>(
        &'a self,
        token: &'a str,
        message: &'a str,
    ) -> BoxFuture<'a, Result<ByteStream>>;

    /// `GET /conversation_history`, as raw JSON.
    fn fetch_history<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<Value>>;

    /// `POST /clear`.
    fn clear_history<'a>(&'a self, token: &'a str) -> BoxFuture<'a, Result<ClearResponse>>;
}
