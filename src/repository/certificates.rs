use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;

use super::{Listing, listing, report};
use crate::client::ServiceClient;
use crate::error::Error;
use crate::normalize::{Keys, decode_list, decode_single};
use crate::notify::Notifier;
use crate::types::EntityId;

const KEYS: Keys = Keys::new("certificates", "certificate");

/// A completion certificate issued for an enrollment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[non_exhaustive]
pub struct Certificate {
    #[serde(alias = "_id")]
    pub id: EntityId,
    #[serde(default, alias = "enrollment_id", skip_serializing_if = "Option::is_none")]
    pub enrollment_id: Option<EntityId>,
    #[serde(
        default,
        alias = "certificateUrl",
        alias = "pdfUrl",
        skip_serializing_if = "Option::is_none"
    )]
    pub url: Option<String>,
    #[serde(
        default,
        alias = "issued_at",
        with = "time::serde::rfc3339::option",
        skip_serializing_if = "Option::is_none"
    )]
    pub issued_at: Option<OffsetDateTime>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `/course/certificate/:enrollment_id/certificates`
pub struct CertificateRepository<'a> {
    client: &'a ServiceClient,
    notifier: &'a dyn Notifier,
}

impl<'a> CertificateRepository<'a> {
    #[must_use]
    pub fn new(client: &'a ServiceClient, notifier: &'a dyn Notifier) -> Self {
        Self { client, notifier }
    }

    fn path(enrollment_id: &EntityId) -> String {
        format!(
            "/certificate/{}/certificates",
            urlencoding::encode(enrollment_id.as_str())
        )
    }

    /// Certificates issued for an enrollment, in backend order.
    pub async fn list(&self, enrollment_id: &EntityId) -> Listing<Certificate> {
        listing(
            self.try_list(enrollment_id).await,
            "Failed to load certificates",
        )
    }

    /// # Errors
    ///
    /// Returns the dispatcher's error, or [`Error::Decode`] if an item is not a
    /// certificate.
    pub async fn try_list(&self, enrollment_id: &EntityId) -> Result<Vec<Certificate>, Error> {
        let body = self.client.get(&Self::path(enrollment_id)).await?;
        decode_list(&body, KEYS)
    }

    /// Issue a certificate for a completed enrollment.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error after notifying it, or
    /// [`Error::Decode`] if the reply does not carry a certificate.
    pub async fn generate(&self, enrollment_id: &EntityId) -> Result<Certificate, Error> {
        let path = format!("{}/generate", Self::path(enrollment_id));
        let body = report(
            self.notifier,
            self.client.post(&path, &json!({})).await,
            "Certificate generated",
            "Failed to generate certificate",
        )?;
        decode_single(&body, KEYS)
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::routing::{get, post};

    use super::*;
    use crate::repository::test_support::harness;
    use crate::testing::spawn;

    #[tokio::test]
    async fn list_keeps_backend_order() {
        let router = Router::new().route(
            "/api/course/certificate/{enrollment}/certificates",
            get(|| async {
                axum::Json(json!({"data": {"certificates": [
                    {"id": "c3", "issuedAt": "2024-03-01T00:00:00Z"},
                    {"id": "c1"},
                    {"id": "c2", "certificateUrl": "https://cdn.example.com/c2.pdf"}
                ]}}))
            }),
        );
        let h = harness(spawn(router).await);

        let listing = h.api.certificates().list(&EntityId::from("e-1")).await;
        let ids: Vec<_> = listing.items.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["c3", "c1", "c2"]);
        assert!(listing.items[0].issued_at.is_some());
        assert_eq!(
            listing.items[2].url.as_deref(),
            Some("https://cdn.example.com/c2.pdf")
        );
    }

    #[tokio::test]
    async fn generate_returns_certificate() {
        let router = Router::new().route(
            "/api/course/certificate/{enrollment}/certificates/generate",
            post(
                |axum::extract::Path(enrollment): axum::extract::Path<String>| async move {
                    axum::Json(json!({"certificate": {"id": "new", "enrollmentId": enrollment}}))
                },
            ),
        );
        let h = harness(spawn(router).await);

        let cert = h
            .api
            .certificates()
            .generate(&EntityId::from(77u64))
            .await
            .unwrap();
        assert_eq!(cert.id.as_str(), "new");
        assert_eq!(cert.enrollment_id, Some(EntityId::from("77")));
        assert_eq!(h.notices.lock()[0].message, "Certificate generated");
    }
}
