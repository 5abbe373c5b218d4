use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use super::storage::Storage;
use crate::error::Error;
use crate::types::{Principal, PrincipalPatch, Token};

pub(crate) const TOKEN_KEY: &str = "token";
pub(crate) const LEGACY_TOKEN_KEY: &str = "auth-token";
pub(crate) const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub(crate) const USER_KEY: &str = "user";

const ALL_KEYS: [&str; 4] = [TOKEN_KEY, LEGACY_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY];

/// Current authentication state.
///
/// `is_authenticated()` is derived from the token pair, so it can never
/// disagree with the tokens actually held.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    principal: Option<Principal>,
    access_token: Option<Token>,
    refresh_token: Option<Token>,
}

impl Session {
    #[must_use]
    pub fn principal(&self) -> Option<&Principal> {
        self.principal.as_ref()
    }

    #[must_use]
    pub fn access_token(&self) -> Option<&Token> {
        self.access_token.as_ref()
    }

    #[must_use]
    pub fn refresh_token(&self) -> Option<&Token> {
        self.refresh_token.as_ref()
    }

    /// True iff both tokens are present and non-empty.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        let present = |t: &Option<Token>| t.as_ref().is_some_and(|t| !t.is_empty());
        present(&self.access_token) && present(&self.refresh_token)
    }
}

/// Source of the bearer token attached by a [`Dispatcher`](crate::Dispatcher).
pub trait TokenSource: Send + Sync + 'static {
    /// Current access token, if any.
    fn access_token(&self) -> Option<Token>;
}

/// Owner of the [`Session`].
///
/// Cloning is cheap and every clone shares the same state. Mutations are
/// single-step replacements published through a `watch` channel, so readers
/// and subscribers see them as soon as the mutating call returns. Mutators
/// hold one lock across persist-then-publish, so storage and memory never
/// disagree once a mutation has returned.
#[derive(Clone)]
pub struct SessionStore {
    inner: Arc<Inner>,
}

struct Inner {
    state: watch::Sender<Session>,
    storage: Arc<dyn Storage>,
    mutation: Mutex<()>,
}

impl SessionStore {
    /// Empty session over `storage`, ignoring whatever it already holds.
    #[must_use]
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self::with_session(storage, Session::default())
    }

    /// Restore the session persisted in `storage`.
    ///
    /// Falls back to the empty session when any key is missing, unreadable or
    /// corrupt. Never fails.
    #[must_use]
    pub fn rehydrate(storage: Arc<dyn Storage>) -> Self {
        let session = match load(storage.as_ref()) {
            Ok(Some(session)) => {
                tracing::debug!("Session rehydrated from storage");
                session
            }
            Ok(None) => Session::default(),
            Err(e) => {
                tracing::warn!(error = %e, "Discarding unreadable persisted session");
                Session::default()
            }
        };
        Self::with_session(storage, session)
    }

    fn with_session(storage: Arc<dyn Storage>, session: Session) -> Self {
        let (state, _) = watch::channel(session);
        Self {
            inner: Arc::new(Inner {
                state,
                storage,
                mutation: Mutex::new(()),
            }),
        }
    }

    /// Copy of the current session.
    #[must_use]
    pub fn snapshot(&self) -> Session {
        self.inner.state.borrow().clone()
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.inner.state.borrow().is_authenticated()
    }

    /// Receiver that observes every subsequent mutation.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.inner.state.subscribe()
    }

    /// Store a freshly authenticated principal and token pair.
    ///
    /// Storage is written first. On failure the in-memory session is left as
    /// it was.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the tokens or principal cannot be persisted.
    pub fn set_auth(
        &self,
        principal: Principal,
        access_token: Token,
        refresh_token: Token,
    ) -> Result<(), Error> {
        let _guard = self.inner.mutation.lock();
        let storage = self.inner.storage.as_ref();
        storage.set(TOKEN_KEY, access_token.expose())?;
        storage.set(REFRESH_TOKEN_KEY, refresh_token.expose())?;
        storage.set(USER_KEY, &encode_principal(&principal)?)?;

        self.inner.state.send_replace(Session {
            principal: Some(principal),
            access_token: Some(access_token),
            refresh_token: Some(refresh_token),
        });
        tracing::debug!("Session authenticated");
        Ok(())
    }

    /// Drop the session and every persisted key, including legacy variants.
    ///
    /// Idempotent. Returns whether an authenticated session was torn down.
    pub fn clear_auth(&self) -> bool {
        let _guard = self.inner.mutation.lock();
        for key in ALL_KEYS {
            if let Err(e) = self.inner.storage.remove(key) {
                tracing::warn!(error = %e, key, "Failed to remove persisted session key");
            }
        }
        let previous = self.inner.state.send_replace(Session::default());
        previous.is_authenticated()
    }

    /// Merge `patch` into the current principal. No-op without one.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Storage`] if the merged principal cannot be persisted.
    pub fn update_principal(&self, patch: PrincipalPatch) -> Result<(), Error> {
        let _guard = self.inner.mutation.lock();
        let Some(mut principal) = self.inner.state.borrow().principal.clone() else {
            return Ok(());
        };
        principal.apply(patch);
        self.inner
            .storage
            .set(USER_KEY, &encode_principal(&principal)?)?;
        self.inner.state.send_modify(|session| session.principal = Some(principal));
        Ok(())
    }
}

impl TokenSource for SessionStore {
    fn access_token(&self) -> Option<Token> {
        self.inner
            .state
            .borrow()
            .access_token
            .clone()
            .filter(|t| !t.is_empty())
    }
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &*self.inner.state.borrow())
            .finish_non_exhaustive()
    }
}

fn encode_principal(principal: &Principal) -> Result<String, Error> {
    serde_json::to_string(principal).map_err(|e| Error::Storage(e.to_string()))
}

fn load(storage: &dyn Storage) -> Result<Option<Session>, Error> {
    let access = match storage.get(TOKEN_KEY)? {
        Some(t) => Some(t),
        None => storage.get(LEGACY_TOKEN_KEY)?,
    };
    let refresh = storage.get(REFRESH_TOKEN_KEY)?;
    let user = storage.get(USER_KEY)?;

    let (Some(access), Some(refresh), Some(user)) = (access, refresh, user) else {
        return Ok(None);
    };
    let principal: Principal = serde_json::from_str(&user)
        .map_err(|e| Error::Storage(format!("corrupt {USER_KEY}: {e}")))?;

    let session = Session {
        principal: Some(principal),
        access_token: Some(Token::new(access)),
        refresh_token: Some(Token::new(refresh)),
    };
    Ok(session.is_authenticated().then_some(session))
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;
    use std::thread::JoinHandle;
    use std::time::Duration;

    use super::*;
    use crate::session::storage::{FileStorage, MemoryStorage, scratch_path};
    use crate::types::Role;

    fn principal() -> Principal {
        Principal::new("u-1", "admin@example.com", Role::Admin).with_display_name("Admin")
    }

    fn store() -> (Arc<MemoryStorage>, SessionStore) {
        let storage = Arc::new(MemoryStorage::new());
        (storage.clone(), SessionStore::new(storage))
    }

    #[test]
    fn starts_empty() {
        let (_, store) = store();
        let session = store.snapshot();
        assert!(!session.is_authenticated());
        assert!(session.principal().is_none());
        assert!(store.access_token().is_none());
    }

    #[test]
    fn set_auth_persists_and_authenticates() {
        let (storage, store) = store();
        store
            .set_auth(principal(), "access".into(), "refresh".into())
            .unwrap();

        assert!(store.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).unwrap().as_deref(), Some("access"));
        assert_eq!(
            storage.get(REFRESH_TOKEN_KEY).unwrap().as_deref(),
            Some("refresh")
        );
        assert!(storage.get(USER_KEY).unwrap().is_some());
    }

    #[test]
    fn empty_token_is_not_authenticated() {
        let (_, store) = store();
        store
            .set_auth(principal(), "access".into(), "".into())
            .unwrap();
        assert!(!store.is_authenticated());
    }

    #[test]
    fn clear_auth_removes_every_key_including_legacy() {
        let (storage, store) = store();
        storage.set(LEGACY_TOKEN_KEY, "old").unwrap();
        store
            .set_auth(principal(), "access".into(), "refresh".into())
            .unwrap();

        assert!(store.clear_auth());
        for key in ALL_KEYS {
            assert_eq!(storage.get(key).unwrap(), None, "{key} should be cleared");
        }
        assert!(!store.is_authenticated());
        assert!(store.snapshot().principal().is_none());
    }

    #[test]
    fn clear_auth_is_idempotent() {
        let (_, store) = store();
        assert!(!store.clear_auth());
        assert!(!store.clear_auth());
    }

    #[test]
    fn update_principal_merges_and_persists() {
        let (storage, store) = store();
        store
            .set_auth(principal(), "access".into(), "refresh".into())
            .unwrap();
        store
            .update_principal(PrincipalPatch::display_name("Renamed"))
            .unwrap();

        let session = store.snapshot();
        assert_eq!(session.principal().unwrap().display_name, "Renamed");
        let persisted: Principal =
            serde_json::from_str(&storage.get(USER_KEY).unwrap().unwrap()).unwrap();
        assert_eq!(persisted.display_name, "Renamed");
    }

    #[test]
    fn update_principal_without_principal_is_noop() {
        let (storage, store) = store();
        store
            .update_principal(PrincipalPatch::display_name("Nobody"))
            .unwrap();
        assert!(store.snapshot().principal().is_none());
        assert_eq!(storage.get(USER_KEY).unwrap(), None);
    }

    #[test]
    fn subscribers_see_mutations_immediately() {
        let (_, store) = store();
        let mut rx = store.subscribe();
        store
            .set_auth(principal(), "access".into(), "refresh".into())
            .unwrap();
        assert!(rx.has_changed().unwrap());
        assert!(rx.borrow_and_update().is_authenticated());

        store.clear_auth();
        assert!(!rx.borrow_and_update().is_authenticated());
    }

    #[test]
    fn rehydrate_restores_persisted_session() {
        let (storage, store) = store();
        store
            .set_auth(principal(), "access".into(), "refresh".into())
            .unwrap();

        let restored = SessionStore::rehydrate(storage);
        let session = restored.snapshot();
        assert!(session.is_authenticated());
        assert_eq!(session.principal(), Some(&principal()));
        assert_eq!(session.access_token().unwrap().expose(), "access");
    }

    #[test]
    fn rehydrate_reads_legacy_token_key() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(LEGACY_TOKEN_KEY, "legacy").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "refresh").unwrap();
        storage
            .set(USER_KEY, &serde_json::to_string(&principal()).unwrap())
            .unwrap();

        let restored = SessionStore::rehydrate(storage);
        assert_eq!(restored.access_token().unwrap().expose(), "legacy");
    }

    #[test]
    fn rehydrate_after_clear_is_empty() {
        let (storage, store) = store();
        store
            .set_auth(principal(), "access".into(), "refresh".into())
            .unwrap();
        store.clear_auth();

        let restored = SessionStore::rehydrate(storage);
        assert!(!restored.is_authenticated());
        assert!(restored.snapshot().principal().is_none());
    }

    #[test]
    fn rehydrate_partial_storage_is_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "access").unwrap();
        let restored = SessionStore::rehydrate(storage);
        assert_eq!(restored.snapshot(), Session::default());
    }

    #[test]
    fn rehydrate_corrupt_user_is_empty() {
        let storage = Arc::new(MemoryStorage::new());
        storage.set(TOKEN_KEY, "access").unwrap();
        storage.set(REFRESH_TOKEN_KEY, "refresh").unwrap();
        storage.set(USER_KEY, "{broken").unwrap();
        let restored = SessionStore::rehydrate(storage);
        assert!(!restored.is_authenticated());
    }

    #[test]
    fn rehydrate_corrupt_file_is_empty() {
        let path = scratch_path("session-corrupt");
        std::fs::write(&path, "not json at all").unwrap();
        let restored = SessionStore::rehydrate(Arc::new(FileStorage::new(&path)));
        assert!(!restored.is_authenticated());
        let _ = std::fs::remove_file(path);
    }

    /// Storage that fires a teardown from another thread while `set_auth` is
    /// between its token write and its publish.
    struct RacingStorage {
        inner: MemoryStorage,
        store: OnceLock<SessionStore>,
        teardown: Mutex<Option<JoinHandle<bool>>>,
    }

    impl Storage for RacingStorage {
        fn get(&self, key: &str) -> Result<Option<String>, Error> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<(), Error> {
            self.inner.set(key, value)?;
            if key == TOKEN_KEY {
                if let Some(store) = self.store.get().cloned() {
                    *self.teardown.lock() = Some(std::thread::spawn(move || store.clear_auth()));
                    std::thread::sleep(Duration::from_millis(50));
                }
            }
            Ok(())
        }

        fn remove(&self, key: &str) -> Result<(), Error> {
            self.inner.remove(key)
        }
    }

    #[test]
    fn concurrent_teardown_waits_for_set_auth() {
        let storage = Arc::new(RacingStorage {
            inner: MemoryStorage::new(),
            store: OnceLock::new(),
            teardown: Mutex::new(None),
        });
        let store = SessionStore::new(storage.clone());
        let _ = storage.store.set(store.clone());

        store
            .set_auth(principal(), "access".into(), "refresh".into())
            .unwrap();
        let teardown = storage.teardown.lock().take().unwrap();
        assert!(teardown.join().unwrap(), "teardown should see the new session");

        assert!(!store.is_authenticated());
        assert_eq!(storage.get(TOKEN_KEY).unwrap(), None);
        let restored = SessionStore::rehydrate(storage.clone());
        assert_eq!(restored.snapshot(), store.snapshot());
    }

    #[test]
    fn update_after_clear_does_not_resurrect_user() {
        let (storage, store) = store();
        store
            .set_auth(principal(), "access".into(), "refresh".into())
            .unwrap();
        store.clear_auth();
        store
            .update_principal(PrincipalPatch::display_name("Late"))
            .unwrap();
        assert_eq!(storage.get(USER_KEY).unwrap(), None);
        assert!(store.snapshot().principal().is_none());
    }
}
