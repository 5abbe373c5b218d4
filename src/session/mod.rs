//! Client-side session state and its durable persistence.
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use coursedesk_client::session::{FileStorage, SessionStore};
//!
//! let store = SessionStore::rehydrate(Arc::new(FileStorage::new("session.json")));
//! if store.is_authenticated() {
//!     // resume where the user left off
//! }
//! ```

mod storage;
mod store;

pub use storage::{FileStorage, MemoryStorage, Storage};
pub use store::{Session, SessionStore, TokenSource};
