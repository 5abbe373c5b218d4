use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::config::{ApiConfig, Service};
use crate::dispatcher::Dispatcher;
use crate::error::Error;
use crate::guard::{Navigator, SessionGuard};
use crate::normalize::Keys;
use crate::notify::{Notifier, TracingNotifier};
use crate::repository::{
    AuthRepository, CertificateRepository, CourseState, Question, Resource, UploadRepository,
};
use crate::session::SessionStore;
use crate::types::EntityId;

/// One backend service: its dispatcher plus the shared session guard.
///
/// Every result passes through the guard, so a 401 from any endpoint tears
/// the session down before the caller sees the error.
#[derive(Debug)]
pub struct ServiceClient {
    service: Service,
    dispatcher: Dispatcher,
    guard: SessionGuard,
}

impl ServiceClient {
    #[must_use]
    pub fn new(service: Service, dispatcher: Dispatcher, guard: SessionGuard) -> Self {
        Self {
            service,
            dispatcher,
            guard,
        }
    }

    #[must_use]
    pub fn service(&self) -> Service {
        self.service
    }

    #[must_use]
    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        self.guard.session()
    }

    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn get(&self, path: &str) -> Result<Value, Error> {
        self.guard.observe(self.dispatcher.get(path).await)
    }

    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, Error> {
        self.guard.observe(self.dispatcher.post(path, body).await)
    }

    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn put<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value, Error> {
        self.guard.observe(self.dispatcher.put(path, body).await)
    }

    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn patch<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, Error> {
        self.guard.observe(self.dispatcher.patch(path, body).await)
    }

    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn delete(&self, path: &str) -> Result<Value, Error> {
        self.guard.observe(self.dispatcher.delete(path).await)
    }

    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn delete_with<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value, Error> {
        self.guard.observe(self.dispatcher.delete_with(path, body).await)
    }

    /// # Errors
    ///
    /// See [`Dispatcher::send`].
    pub async fn post_multipart(
        &self,
        path: &str,
        form: reqwest::multipart::Form,
    ) -> Result<Value, Error> {
        self.guard
            .observe(self.dispatcher.post_multipart(path, form).await)
    }
}

/// Entry point: one [`ServiceClient`] per CourseDesk backend service, sharing
/// a session, an HTTP connection pool and a notifier.
///
/// ```rust,ignore
/// use std::sync::Arc;
/// use coursedesk_client::Api;
///
/// let api = Api::from_env(Arc::new(|location: &str| router.navigate(location)))?;
/// api.auth().login("admin@example.com", "secret").await?;
/// let states = api.states().list().await;
/// ```
pub struct Api {
    session: SessionStore,
    notifier: Arc<dyn Notifier>,
    auth: ServiceClient,
    user: ServiceClient,
    admin: ServiceClient,
    course: ServiceClient,
    payment: ServiceClient,
}

impl Api {
    /// Build clients for every service in `config`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if a service URL cannot be derived from
    /// the origin.
    pub fn new(
        config: &ApiConfig,
        session: SessionStore,
        navigator: Arc<dyn Navigator>,
    ) -> Result<Self, Error> {
        let guard = SessionGuard::new(session.clone(), navigator, config.login_path());
        let http = reqwest::Client::new();
        let tokens: Arc<SessionStore> = Arc::new(session.clone());

        let client = |service: Service| -> Result<ServiceClient, Error> {
            let dispatcher = Dispatcher::new(config.dispatcher(service)?, tokens.clone())
                .with_http_client(http.clone());
            Ok(ServiceClient::new(service, dispatcher, guard.clone()))
        };

        Ok(Self {
            auth: client(Service::Auth)?,
            user: client(Service::User)?,
            admin: client(Service::Admin)?,
            course: client(Service::Course)?,
            payment: client(Service::Payment)?,
            session,
            notifier: Arc::new(TracingNotifier),
        })
    }

    /// Configure from the environment and rehydrate the persisted session.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the environment is incomplete; see
    /// [`ApiConfig::from_env`].
    pub fn from_env(navigator: Arc<dyn Navigator>) -> Result<Self, Error> {
        let config = ApiConfig::from_env()?;
        let session = SessionStore::rehydrate(config.storage());
        Self::new(&config, session, navigator)
    }

    /// Replace the default [`TracingNotifier`].
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    #[must_use]
    pub fn session(&self) -> &SessionStore {
        &self.session
    }

    #[must_use]
    pub fn notifier(&self) -> &dyn Notifier {
        self.notifier.as_ref()
    }

    #[must_use]
    pub fn service(&self, service: Service) -> &ServiceClient {
        match service {
            Service::Auth => &self.auth,
            Service::User => &self.user,
            Service::Admin => &self.admin,
            Service::Course => &self.course,
            Service::Payment => &self.payment,
        }
    }

    #[must_use]
    pub fn auth(&self) -> AuthRepository<'_> {
        AuthRepository::new(&self.auth, self.notifier())
    }

    /// `/course/state`
    #[must_use]
    pub fn states(&self) -> Resource<'_, CourseState> {
        self.resource(Service::Course, "/state", Keys::new("states", "state"), "State")
    }

    /// `/course/quiz/:quiz_id/questions`
    #[must_use]
    pub fn questions(&self, quiz_id: &EntityId) -> Resource<'_, Question> {
        self.resource(
            Service::Course,
            format!("/quiz/{quiz_id}/questions"),
            Keys::new("questions", "question"),
            "Question",
        )
    }

    #[must_use]
    pub fn certificates(&self) -> CertificateRepository<'_> {
        CertificateRepository::new(&self.course, self.notifier())
    }

    #[must_use]
    pub fn uploads(&self) -> UploadRepository<'_> {
        UploadRepository::new(&self.course, self.notifier())
    }

    /// CRUD repository for any other entity collection.
    ///
    /// `label` is the entity name used in user-visible notices.
    #[must_use]
    pub fn resource<T: DeserializeOwned>(
        &self,
        service: Service,
        path: impl Into<String>,
        keys: Keys,
        label: &'static str,
    ) -> Resource<'_, T> {
        Resource::new(self.service(service), self.notifier(), path, keys, label)
    }
}

impl std::fmt::Debug for Api {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("session", &self.session)
            .field("course", &self.course)
            .finish_non_exhaustive()
    }
}
