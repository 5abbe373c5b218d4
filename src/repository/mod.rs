//! Typed access to CourseDesk endpoints.
//!
//! Repositories borrow a [`ServiceClient`](crate::ServiceClient) and a
//! [`Notifier`](crate::Notifier) from the [`Api`](crate::Api). They share one
//! failure policy:
//!
//! - Writes (create, update, delete, upload, generate) send the translated
//!   message to the notifier and return the error, so forms can keep their
//!   submit state accurate.
//! - List reads log the failure and return an empty [`Listing`] carrying the
//!   message, so list views render an error indicator instead of failing.

mod auth;
mod certificates;
mod questions;
mod resource;
mod states;
mod uploads;

pub use auth::{AuthRepository, Credentials, Registration};
pub use certificates::{Certificate, CertificateRepository};
pub use questions::{Question, QuestionDraft};
pub use resource::Resource;
pub use states::{CourseState, StateDraft};
pub use uploads::UploadRepository;

use crate::error::Error;
use crate::notify::{Notice, Notifier};
use crate::translate::error_message;

/// Result of a list read: never absent, possibly with an error message.
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T> {
    pub items: Vec<T>,
    pub error: Option<String>,
}

impl<T> Listing<T> {
    #[must_use]
    pub fn ok(items: Vec<T>) -> Self {
        Self { items, error: None }
    }

    #[must_use]
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            items: Vec::new(),
            error: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self::ok(Vec::new())
    }
}

/// Turn a list read into a [`Listing`], logging a failure.
pub(crate) fn listing<T>(result: Result<Vec<T>, Error>, default: &str) -> Listing<T> {
    match result {
        Ok(items) => Listing::ok(items),
        Err(e) => {
            tracing::warn!(error = %e, "List read failed");
            Listing::failed(error_message(&e, default))
        }
    }
}

/// Notify the outcome of a write and hand the result back unchanged.
pub(crate) fn report<T>(
    notifier: &dyn Notifier,
    result: Result<T, Error>,
    success: &str,
    failure: &str,
) -> Result<T, Error> {
    match &result {
        Ok(_) => notifier.notify(Notice::success(success)),
        Err(e) => {
            tracing::warn!(error = %e, "Write failed");
            notifier.notify(Notice::error(error_message(e, failure)));
        }
    }
    result
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::client::Api;
    use crate::config::ApiConfig;
    use crate::guard::Navigator;
    use crate::notify::{Notice, Notifier};
    use crate::session::{MemoryStorage, SessionStore};
    use crate::types::{Principal, Role};

    /// An [`Api`] against `origin` with a signed-in session and recorded
    /// notices and redirects.
    pub(crate) struct Harness {
        pub(crate) api: Api,
        pub(crate) notices: Arc<Mutex<Vec<Notice>>>,
        pub(crate) redirects: Arc<Mutex<Vec<String>>>,
    }

    pub(crate) fn harness(origin: url::Url) -> Harness {
        let session = SessionStore::new(Arc::new(MemoryStorage::new()));
        session
            .set_auth(
                Principal::new("1", "admin@example.com", Role::Admin),
                "access".into(),
                "refresh".into(),
            )
            .unwrap();

        let redirects = Arc::new(Mutex::new(Vec::new()));
        let sink = redirects.clone();
        let navigator: Arc<dyn Navigator> =
            Arc::new(move |location: &str| sink.lock().push(location.to_owned()));

        let notices = Arc::new(Mutex::new(Vec::new()));
        let sink = notices.clone();
        let notifier: Arc<dyn Notifier> = Arc::new(move |notice: Notice| sink.lock().push(notice));

        let api = Api::new(&ApiConfig::new(origin), session, navigator)
            .unwrap()
            .with_notifier(notifier);
        Harness {
            api,
            notices,
            redirects,
        }
    }
}
