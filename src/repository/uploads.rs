use reqwest::multipart::{Form, Part};
use serde_json::json;

use super::report;
use crate::client::ServiceClient;
use crate::error::Error;
use crate::normalize::{Keys, decode_single};
use crate::notify::Notifier;
use crate::types::UploadedFile;

/// File storage behind the course service (`/course/bunny-upload`,
/// `/course/bunny/delete-file`).
pub struct UploadRepository<'a> {
    client: &'a ServiceClient,
    notifier: &'a dyn Notifier,
}

impl<'a> UploadRepository<'a> {
    #[must_use]
    pub fn new(client: &'a ServiceClient, notifier: &'a dyn Notifier) -> Self {
        Self { client, notifier }
    }

    /// Upload a file as the multipart field `file`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Http`] if `mime` is not a valid content type, the
    /// dispatcher's error after notifying it, or [`Error::Decode`] if the reply
    /// is not a `{url, path, filename}` triple.
    pub async fn upload(
        &self,
        filename: &str,
        bytes: Vec<u8>,
        mime: Option<&str>,
    ) -> Result<UploadedFile, Error> {
        let mut part = Part::bytes(bytes).file_name(filename.to_owned());
        if let Some(mime) = mime {
            part = part.mime_str(mime)?;
        }
        let form = Form::new().part("file", part);

        let body = report(
            self.notifier,
            self.client.post_multipart("/bunny-upload", form).await,
            "File uploaded",
            "Failed to upload file",
        )?;
        decode_single(&body, Keys::new("files", "file"))
    }

    /// Remove a previously uploaded file by its storage path.
    ///
    /// # Errors
    ///
    /// Returns the dispatcher's error after notifying it.
    pub async fn delete_file(&self, path: &str) -> Result<(), Error> {
        report(
            self.notifier,
            self.client
                .delete_with("/bunny/delete-file", &json!({ "path": path }))
                .await,
            "File deleted",
            "Failed to delete file",
        )
        .map(drop)
    }
}
