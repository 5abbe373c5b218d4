#![doc = include_str!("../README.md")]

pub mod client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod guard;
pub mod normalize;
pub mod notify;
pub mod repository;
pub mod session;
pub mod translate;
pub mod types;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use client::{Api, ServiceClient};
pub use config::{ApiConfig, AuthPolicy, DEFAULT_TIMEOUT, DispatcherConfig, Service};
pub use dispatcher::{Dispatcher, REQUEST_ID_HEADER};
pub use error::Error;
pub use guard::{Navigator, SessionGuard};
pub use normalize::{Keys, Shape, decode_list, decode_single, extract_list, extract_single};
pub use notify::{Notice, NoticeLevel, Notifier, TracingNotifier};
pub use repository::Listing;
pub use session::{FileStorage, MemoryStorage, Session, SessionStore, Storage, TokenSource};
pub use translate::{BackendErrorPayload, error_message, message_from_value};
pub use types::{EntityId, Principal, PrincipalPatch, Role, Token, UploadedFile};
