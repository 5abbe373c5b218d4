use serde::{Deserialize, Serialize};
use serde_json::json;

use super::report;
use crate::client::ServiceClient;
use crate::error::Error;
use crate::normalize::{Keys, decode_single, extract_single};
use crate::notify::Notifier;
use crate::session::SessionStore;
use crate::types::{Principal, Token};

/// Login form body.
#[derive(Debug, Clone, Serialize)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    #[must_use]
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

/// Registration form body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TokenPair {
    #[serde(alias = "access_token", alias = "token")]
    access_token: Token,
    #[serde(alias = "refresh_token")]
    refresh_token: Token,
}

/// Login/registration reply. Tokens sit either beside the user or under
/// `tokens`.
#[derive(Debug, Deserialize)]
struct AuthGrant {
    #[serde(alias = "principal")]
    user: Principal,
    #[serde(default)]
    tokens: Option<TokenPair>,
    #[serde(flatten)]
    inline: Option<TokenPair>,
}

impl AuthGrant {
    fn into_parts(self) -> Result<(Principal, TokenPair), Error> {
        let pair = self.tokens.or(self.inline).ok_or_else(|| {
            Error::Decode(serde::de::Error::custom(
                "auth reply carries no access/refresh token pair",
            ))
        })?;
        Ok((self.user, pair))
    }
}

/// `/auth` endpoints and the session lifecycle they drive.
pub struct AuthRepository<'a> {
    client: &'a ServiceClient,
    notifier: &'a dyn Notifier,
}

impl<'a> AuthRepository<'a> {
    #[must_use]
    pub fn new(client: &'a ServiceClient, notifier: &'a dyn Notifier) -> Self {
        Self { client, notifier }
    }

    fn session(&self) -> &SessionStore {
        self.client.session()
    }

    /// `POST /auth/login`, then store the principal and tokens.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error after notifying it, [`Error::Decode`] if
    /// the reply lacks a user or token pair, or [`Error::Storage`] if the
    /// session cannot be persisted.
    pub async fn login(&self, email: &str, password: &str) -> Result<Principal, Error> {
        let credentials = Credentials::new(email, password);
        let body = report(
            self.notifier,
            self.client.post("/login", &credentials).await,
            "Signed in",
            "Login failed",
        )?;
        self.establish(&body)
    }

    /// `POST /auth/register`, then store the principal and tokens.
    ///
    /// # Errors
    ///
    /// Same as [`AuthRepository::login`].
    pub async fn register(&self, registration: &Registration) -> Result<Principal, Error> {
        let body = report(
            self.notifier,
            self.client.post("/register", registration).await,
            "Account created",
            "Registration failed",
        )?;
        self.establish(&body)
    }

    fn establish(&self, body: &serde_json::Value) -> Result<Principal, Error> {
        let grant: AuthGrant = serde_json::from_value(extract_single(body, Keys::NONE))?;
        let (principal, pair) = grant.into_parts()?;
        self.session()
            .set_auth(principal.clone(), pair.access_token, pair.refresh_token)?;
        tracing::info!(principal_id = %principal.id, "Signed in");
        Ok(principal)
    }

    /// `POST /auth/logout`, then clear the session.
    ///
    /// The local session is cleared even when the backend call fails; the
    /// failure is only logged. The call skips the session guard, so a 401 here
    /// never redirects to the expired-session login.
    pub async fn logout(&self) {
        if let Err(e) = self.client.dispatcher().post("/logout", &json!({})).await {
            tracing::warn!(error = %e, "Logout request failed; clearing session anyway");
        }
        self.session().clear_auth();
    }

    /// `GET /auth/me`: the principal as the backend currently sees it.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error, or [`Error::Decode`] if the reply is not
    /// a principal.
    pub async fn me(&self) -> Result<Principal, Error> {
        let body = self.client.get("/me").await?;
        decode_single(&body, Keys::new("users", "user"))
    }
}
