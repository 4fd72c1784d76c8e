use anyhow::Context;
use reqwest::multipart;
use serde::Deserialize;
use uuid::Uuid;

use crate::config::MediaSettings;

/// Client for the external managed media host. Audio blobs are uploaded
/// under a per-patient folder and the host returns a durable URL; nothing
/// is stored locally.
#[derive(Debug, Clone)]
pub struct MediaClient {
    http: reqwest::Client,
    settings: MediaSettings,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: Option<String>,
    url: Option<String>,
}

impl MediaClient {
    pub fn new(settings: MediaSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub async fn upload_audio(
        &self,
        bytes: Vec<u8>,
        filename: &str,
        patient_id: Uuid,
        entry_id: Option<Uuid>,
    ) -> anyhow::Result<String> {
        let folder = match entry_id {
            Some(entry_id) => format!("journal/{patient_id}/{entry_id}"),
            None => format!("journal/{patient_id}"),
        };

        let part = multipart::Part::bytes(bytes).file_name(filename.to_string());
        let mut form = multipart::Form::new()
            .text("upload_preset", self.settings.upload_preset.clone())
            .text("folder", folder)
            .part("file", part);
        if let Some(api_key) = &self.settings.api_key {
            form = form.text("api_key", api_key.clone());
        }

        let response = self
            .http
            .post(format!("{}/upload", self.settings.base_url))
            .multipart(form)
            .send()
            .await
            .context("media host unreachable")?
            .error_for_status()
            .context("media host rejected the upload")?;

        let body: UploadResponse = response
            .json()
            .await
            .context("media host returned an unreadable body")?;

        body.secure_url
            .or(body.url)
            .context("media host returned no file URL")
    }
}
