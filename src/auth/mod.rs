mod token_store;

pub use token_store::{Credentials, FileTokenStore, MemoryTokenStore, TokenStore};
