use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use url::Url;

use crate::error::Error;
use crate::session::{FileStorage, MemoryStorage, Storage};

/// Default per-request timeout for every dispatcher.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Backend services, each reachable under its own base path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Service {
    Auth,
    User,
    Admin,
    Course,
    Payment,
}

impl Service {
    pub const ALL: [Self; 5] = [
        Self::Auth,
        Self::User,
        Self::Admin,
        Self::Course,
        Self::Payment,
    ];

    /// Path of the service relative to the API origin.
    #[must_use]
    pub fn base_path(self) -> &'static str {
        match self {
            Self::Auth => "/api/auth",
            Self::User => "/api/user",
            Self::Admin => "/api/admin",
            Self::Course => "/api/course",
            Self::Payment => "/api/payment",
        }
    }
}

/// Whether a dispatcher attaches the session's bearer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthPolicy {
    #[default]
    Bearer,
    Anonymous,
}

/// Configuration of a single [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct DispatcherConfig {
    pub(crate) base_url: Url,
    pub(crate) timeout: Duration,
    pub(crate) auth: AuthPolicy,
}

impl DispatcherConfig {
    #[must_use]
    pub fn new(base_url: Url) -> Self {
        Self {
            base_url,
            timeout: DEFAULT_TIMEOUT,
            auth: AuthPolicy::default(),
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_auth(mut self, auth: AuthPolicy) -> Self {
        self.auth = auth;
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    #[must_use]
    pub fn auth(&self) -> AuthPolicy {
        self.auth
    }

    /// Absolute URL of `path` under this dispatcher's base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the joined URL does not parse.
    pub fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        let joined = if path.is_empty() {
            base.to_owned()
        } else {
            format!("{base}/{path}")
        };
        Url::parse(&joined).map_err(Into::into)
    }
}

/// CourseDesk API client configuration.
///
/// The origin is a constructor parameter; everything else has a default and
/// can be overridden with `with_*` methods.
///
/// ```rust,ignore
/// use coursedesk_client::ApiConfig;
///
/// let config = ApiConfig::new("https://admin.example.com".parse()?)
///     .with_timeout(std::time::Duration::from_secs(5));
/// ```
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ApiConfig {
    pub(crate) origin: Url,
    pub(crate) timeout: Duration,
    pub(crate) login_path: String,
    pub(crate) session_file: Option<PathBuf>,
}

impl ApiConfig {
    #[must_use]
    pub fn new(origin: Url) -> Self {
        Self {
            origin,
            timeout: DEFAULT_TIMEOUT,
            login_path: "/login".into(),
            session_file: None,
        }
    }

    /// Create config from environment variables.
    ///
    /// # Required env vars
    /// - `COURSEDESK_API_ORIGIN`: scheme and host of the API, e.g. `https://admin.example.com`
    ///
    /// # Optional env vars
    /// - `COURSEDESK_API_TIMEOUT_SECS`: per-request timeout (default 10)
    /// - `COURSEDESK_LOGIN_PATH`: login entry point for 401 redirects (default `/login`)
    /// - `COURSEDESK_SESSION_FILE`: persist the session to this JSON file instead of memory
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the origin is missing or a value is invalid.
    pub fn from_env() -> Result<Self, Error> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ApiConfig::from_env`], reading variables through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the origin is missing or a value is invalid.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, Error> {
        let origin_str = lookup("COURSEDESK_API_ORIGIN")
            .ok_or_else(|| Error::Config("COURSEDESK_API_ORIGIN is required".into()))?;
        let origin: Url = origin_str
            .parse()
            .map_err(|e| Error::Config(format!("COURSEDESK_API_ORIGIN: {e}")))?;

        let mut config = Self::new(origin);

        if let Some(secs) = lookup("COURSEDESK_API_TIMEOUT_SECS") {
            let secs: u64 = secs
                .trim()
                .parse()
                .map_err(|e| Error::Config(format!("COURSEDESK_API_TIMEOUT_SECS: {e}")))?;
            if secs == 0 {
                return Err(Error::Config(
                    "COURSEDESK_API_TIMEOUT_SECS must be greater than zero".into(),
                ));
            }
            config = config.with_timeout(Duration::from_secs(secs));
        }
        if let Some(path) = lookup("COURSEDESK_LOGIN_PATH") {
            config = config.with_login_path(path);
        }
        if let Some(file) = lookup("COURSEDESK_SESSION_FILE") {
            config = config.with_session_file(file);
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_login_path(mut self, path: impl Into<String>) -> Self {
        self.login_path = path.into();
        self
    }

    #[must_use]
    pub fn with_session_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.session_file = Some(path.into());
        self
    }

    #[must_use]
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Login entry point 401 responses redirect to.
    #[must_use]
    pub fn login_path(&self) -> &str {
        &self.login_path
    }

    /// Dispatcher configuration for one backend service.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidUrl`] if the origin cannot carry a path.
    pub fn dispatcher(&self, service: Service) -> Result<DispatcherConfig, Error> {
        let base = self.origin.join(service.base_path())?;
        Ok(DispatcherConfig::new(base).with_timeout(self.timeout))
    }

    /// Session storage selected by this configuration.
    #[must_use]
    pub fn storage(&self) -> Arc<dyn Storage> {
        match &self.session_file {
            Some(path) => Arc::new(FileStorage::new(path)),
            None => Arc::new(MemoryStorage::new()),
        }
    }
}
