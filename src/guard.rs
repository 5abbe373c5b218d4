use std::sync::Arc;

use crate::error::Error;
use crate::session::SessionStore;

/// Host-provided navigation to the login entry point.
///
/// Implemented for any `Fn(&str)` closure, so hosts can pass their router's
/// navigate function directly.
pub trait Navigator: Send + Sync + 'static {
    /// Navigate to `location`, the login entry point plus query string.
    fn redirect_to_login(&self, location: &str);
}

impl<F> Navigator for F
where
    F: Fn(&str) + Send + Sync + 'static,
{
    fn redirect_to_login(&self, location: &str) {
        self(location);
    }
}

/// Reason attached to the login redirect after a 401.
pub const SESSION_EXPIRED: &str = "session_expired";

/// The one place that reacts to authentication failure.
///
/// Every [`ServiceClient`](crate::ServiceClient) passes its results through
/// [`SessionGuard::observe`]. On [`Error::Unauthenticated`] the session is
/// cleared and the host navigates to login before the error reaches the
/// caller. The policy is the same whichever service or endpoint answered 401.
#[derive(Clone)]
pub struct SessionGuard {
    session: SessionStore,
    navigator: Arc<dyn Navigator>,
    login_location: Arc<str>,
}

impl SessionGuard {
    #[must_use]
    pub fn new(session: SessionStore, navigator: Arc<dyn Navigator>, login_path: &str) -> Self {
        Self {
            session,
            navigator,
            login_location: login_location(login_path, SESSION_EXPIRED).into(),
        }
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    /// Where a 401 sends the user.
    #[must_use]
    pub fn login_location(&self) -> &str {
        &self.login_location
    }

    /// Pass `result` through, tearing the session down first if it is an
    /// authentication failure.
    ///
    /// # Errors
    ///
    /// Returns the error in `result` unchanged.
    pub fn observe<T>(&self, result: Result<T, Error>) -> Result<T, Error> {
        if let Err(Error::Unauthenticated { .. }) = &result {
            self.teardown();
        }
        result
    }

    fn teardown(&self) {
        let was_authenticated = self.session.clear_auth();
        tracing::warn!(
            was_authenticated,
            location = %self.login_location,
            "Backend rejected session; redirecting to login"
        );
        self.navigator.redirect_to_login(&self.login_location);
    }
}

impl std::fmt::Debug for SessionGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionGuard")
            .field("login_location", &self.login_location)
            .finish_non_exhaustive()
    }
}

fn login_location(login_path: &str, reason: &str) -> String {
    let separator = if login_path.contains('?') { '&' } else { '?' };
    format!(
        "{login_path}{separator}error={}",
        urlencoding::encode(reason)
    )
}

#[cfg(test)]
mod tests {
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::*;
    use crate::session::MemoryStorage;
    use crate::types::{Principal, Role};

    fn signed_in() -> SessionStore {
        let store = SessionStore::new(Arc::new(MemoryStorage::new()));
        store
            .set_auth(
                Principal::new("1", "a@b.c", Role::Admin),
                "access".into(),
                "refresh".into(),
            )
            .unwrap();
        store
    }

    fn recording() -> (Arc<Mutex<Vec<String>>>, Arc<dyn Navigator>) {
        let visits = Arc::new(Mutex::new(Vec::new()));
        let sink = visits.clone();
        let navigator: Arc<dyn Navigator> =
            Arc::new(move |location: &str| sink.lock().push(location.to_owned()));
        (visits, navigator)
    }

    #[test]
    fn unauthenticated_clears_session_and_redirects() {
        let session = signed_in();
        let (visits, navigator) = recording();
        let guard = SessionGuard::new(session.clone(), navigator, "/login");

        let result: Result<(), Error> = guard.observe(Err(Error::Unauthenticated { body: Value::Null }));

        assert!(matches!(result, Err(Error::Unauthenticated { .. })));
        assert!(!session.is_authenticated());
        assert_eq!(*visits.lock(), ["/login?error=session_expired"]);
    }

    #[test]
    fn other_errors_leave_session_alone() {
        let session = signed_in();
        let (visits, navigator) = recording();
        let guard = SessionGuard::new(session.clone(), navigator, "/login");

        let _ = guard.observe::<()>(Err(Error::Status {
            status: 403,
            body: Value::Null,
        }));
        let _ = guard.observe::<()>(Err(Error::Timeout));
        let ok = guard.observe(Ok(5));

        assert_eq!(ok.unwrap(), 5);
        assert!(session.is_authenticated());
        assert!(visits.lock().is_empty());
    }

    #[test]
    fn redirects_even_when_already_signed_out() {
        let session = SessionStore::new(Arc::new(MemoryStorage::new()));
        let (visits, navigator) = recording();
        let guard = SessionGuard::new(session, navigator, "/login");

        let _ = guard.observe::<()>(Err(Error::Unauthenticated { body: Value::Null }));
        assert_eq!(visits.lock().len(), 1);
    }

    #[test]
    fn login_location_appends_to_existing_query() {
        assert_eq!(
            login_location("/auth?tab=signin", SESSION_EXPIRED),
            "/auth?tab=signin&error=session_expired"
        );
    }
}
