mod auth;
pub mod backend;
pub mod client;
mod finance;
pub mod logging;
pub mod mock_client;
pub mod stream;

pub use backend::{ByteStream, ChatBackend};
pub use client::ApiClient;
pub use stream::{Frame, FrameDecoder, FrameReader};
