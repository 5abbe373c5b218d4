use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;

use super::{Listing, listing, report};
use crate::client::ServiceClient;
use crate::error::Error;
use crate::normalize::{Keys, decode_list, decode_single};
use crate::notify::Notifier;
use crate::types::EntityId;

/// CRUD over one entity collection: `GET|POST path`, `GET|PATCH|DELETE path/:id`.
pub struct Resource<'a, T> {
    client: &'a ServiceClient,
    notifier: &'a dyn Notifier,
    path: String,
    keys: Keys,
    label: &'static str,
    _entity: PhantomData<fn() -> T>,
}

impl<'a, T: DeserializeOwned> Resource<'a, T> {
    #[must_use]
    pub fn new(
        client: &'a ServiceClient,
        notifier: &'a dyn Notifier,
        path: impl Into<String>,
        keys: Keys,
        label: &'static str,
    ) -> Self {
        Self {
            client,
            notifier,
            path: path.into(),
            keys,
            label,
            _entity: PhantomData,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    fn item_path(&self, id: &EntityId) -> String {
        format!("{}/{}", self.path, urlencoding::encode(id.as_str()))
    }

    fn plural(&self) -> String {
        self.keys
            .plural
            .map_or_else(|| format!("{}s", self.label.to_lowercase()), str::to_owned)
    }

    /// All entities, or an empty listing with the error message.
    pub async fn list(&self) -> Listing<T> {
        let default = format!("Failed to load {}", self.plural());
        listing(self.try_list().await, &default)
    }

    /// All entities, propagating failures.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error, or [`Error::Decode`] if an item does
    /// not match `T`.
    pub async fn try_list(&self) -> Result<Vec<T>, Error> {
        let body = self.client.get(&self.path).await?;
        decode_list(&body, self.keys)
    }

    /// One entity by id.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error, or [`Error::Decode`] if the payload
    /// does not match `T`.
    pub async fn get(&self, id: &EntityId) -> Result<T, Error> {
        let body = self.client.get(&self.item_path(id)).await?;
        decode_single(&body, self.keys)
    }

    /// Create an entity and return the stored version.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error after notifying it, or
    /// [`Error::Decode`] if the reply does not carry a `T`.
    pub async fn create<B: Serialize + ?Sized>(&self, draft: &B) -> Result<T, Error> {
        let body = report(
            self.notifier,
            self.client.post(&self.path, draft).await,
            &format!("{} created", self.label),
            &format!("Failed to create {}", self.label.to_lowercase()),
        )?;
        decode_single(&body, self.keys)
    }

    /// Apply a partial update and return the stored version.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error after notifying it, or
    /// [`Error::Decode`] if the reply does not carry a `T`.
    pub async fn update<B: Serialize + ?Sized>(&self, id: &EntityId, patch: &B) -> Result<T, Error> {
        let body = report(
            self.notifier,
            self.client.patch(&self.item_path(id), patch).await,
            &format!("{} updated", self.label),
            &format!("Failed to update {}", self.label.to_lowercase()),
        )?;
        decode_single(&body, self.keys)
    }

    /// Delete an entity.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error after notifying it.
    pub async fn delete(&self, id: &EntityId) -> Result<(), Error> {
        report(
            self.notifier,
            self.client.delete(&self.item_path(id)).await,
            &format!("{} deleted", self.label),
            &format!("Failed to delete {}", self.label.to_lowercase()),
        )
        .map(drop)
    }
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;
    use serde_json::{Value, json};

    use super::*;
    use crate::config::Service;
    use crate::notify::NoticeLevel;
    use crate::repository::test_support::harness;
    use crate::testing::spawn;

    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Employer {
        id: EntityId,
        name: String,
    }

    fn employers(api: &crate::Api) -> Resource<'_, Employer> {
        api.resource(
            Service::Admin,
            "/employers",
            Keys::new("employers", "employer"),
            "Employer",
        )
    }

    #[tokio::test]
    async fn list_failure_is_an_empty_listing() {
        let router = Router::new().route(
            "/api/admin/employers",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(json!({}))) }),
        );
        let h = harness(spawn(router).await);

        let listing = employers(&h.api).list().await;
        assert!(listing.items.is_empty());
        assert_eq!(listing.error.as_deref(), Some("Failed to load employers"));
        assert!(h.notices.lock().is_empty());
    }

    #[tokio::test]
    async fn delete_notifies_success() {
        let router = Router::new().route(
            "/api/admin/employers/{id}",
            axum::routing::delete(|| async { axum::Json(json!({"message": "ok"})) }),
        );
        let h = harness(spawn(router).await);

        employers(&h.api).delete(&EntityId::from(3u64)).await.unwrap();
        let notices = h.notices.lock();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].level, NoticeLevel::Success);
        assert_eq!(notices[0].message, "Employer deleted");
    }

    #[tokio::test]
    async fn item_ids_are_path_encoded() {
        let router = Router::new().route(
            "/api/admin/employers/{id}",
            get(|axum::extract::Path(id): axum::extract::Path<String>| async move {
                axum::Json(json!({"employer": {"id": id, "name": "Acme"}}))
            }),
        );
        let h = harness(spawn(router).await);

        let employer = employers(&h.api)
            .get(&EntityId::from("a/b"))
            .await
            .unwrap();
        assert_eq!(employer.id, EntityId::from("a/b"));
    }

    #[tokio::test]
    async fn create_failure_notifies_and_propagates() {
        let router = Router::new().route(
            "/api/admin/employers",
            axum::routing::post(|_: axum::Json<Value>| async {
                (
                    StatusCode::CONFLICT,
                    axum::Json(json!({"error": "Employer already exists"})),
                )
            }),
        );
        let h = harness(spawn(router).await);

        let err = employers(&h.api)
            .create(&json!({"name": "Acme"}))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(409));
        let notices = h.notices.lock();
        assert_eq!(notices[0].level, NoticeLevel::Error);
        assert_eq!(notices[0].message, "Employer already exists");
    }

    #[tokio::test]
    async fn expired_session_on_list_redirects_once() {
        let router = Router::new().route(
            "/api/admin/employers",
            get(|| async { (StatusCode::UNAUTHORIZED, axum::Json(json!({"message": "jwt expired"}))) }),
        );
        let h = harness(spawn(router).await);

        let listing = employers(&h.api).list().await;
        assert_eq!(listing.error.as_deref(), Some("jwt expired"));
        assert!(!h.api.session().is_authenticated());
        assert_eq!(*h.redirects.lock(), ["/login?error=session_expired"]);
    }
}
