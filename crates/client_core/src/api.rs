//! HTTP facade over the lost-and-found backend.

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, Response, StatusCode,
};
use shared::{
    domain::{LostItemId, StoredFilename},
    error::ErrorBody,
    protocol::{
        AnalysisResult, AnalyzeRequest, CreateLostItemRequest, CreateLostItemResponse, LostItem,
        UploadResponse,
    },
};
use tracing::{debug, info};

use crate::{
    config::ClientSettings,
    error::{ApiOperation, ClientError, Result},
};

/// A photo picked by the user, not yet known to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Builds a file, guessing the MIME type from the name's extension.
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let file_name = file_name.into();
        let mime_type = mime_guess::from_path(&file_name)
            .first_raw()
            .map(str::to_string);
        Self {
            file_name,
            mime_type,
            bytes,
        }
    }

    fn into_part(self) -> Result<Part> {
        let mime_type = self
            .mime_type
            .unwrap_or_else(|| "application/octet-stream".to_string());
        Part::bytes(self.bytes)
            .file_name(self.file_name)
            .mime_str(&mime_type)
            .map_err(|err| ClientError::validation(format!("invalid file type '{mime_type}': {err}")))
    }
}

#[async_trait]
pub trait LostFoundApi: Send + Sync {
    async fn upload(&self, file: UploadedFile) -> Result<StoredFilename>;
    async fn analyze(&self, filename: &StoredFilename) -> Result<AnalysisResult>;
    async fn create_item(&self, request: &CreateLostItemRequest) -> Result<CreateLostItemResponse>;
    /// Creates an item straight from a photo, letting the server fill in
    /// the details.
    async fn create_item_from_file(
        &self,
        file: UploadedFile,
        found_location: Option<&str>,
    ) -> Result<CreateLostItemResponse>;
    async fn fetch_item(&self, id: LostItemId) -> Result<Option<LostItem>>;
    async fn list_items(&self) -> Result<Vec<LostItem>>;
}

pub struct HttpLostFoundClient {
    http: Client,
    base_url: String,
}

impl HttpLostFoundClient {
    pub fn new(settings: &ClientSettings) -> Result<Self> {
        let base_url = settings.base_url()?;
        let http = Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build http client: {err}")))?;
        Ok(Self {
            http,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Where the backend serves a stored photo.
    pub fn image_url(&self, filename: &StoredFilename) -> String {
        self.endpoint(&format!("uploads/{filename}"))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

async fn ensure_success(operation: ApiOperation, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = match ErrorBody::summarize(&body) {
        Some(detail) => format!("HTTP {}: {detail}", status.as_u16()),
        None => format!("HTTP {}", status.as_u16()),
    };
    Err(ClientError::network(operation, message))
}

async fn decode<T: serde::de::DeserializeOwned>(
    operation: ApiOperation,
    response: Response,
) -> Result<T> {
    response
        .json::<T>()
        .await
        .map_err(|err| ClientError::from_transport(operation, err))
}

#[async_trait]
impl LostFoundApi for HttpLostFoundClient {
    async fn upload(&self, file: UploadedFile) -> Result<StoredFilename> {
        let op = ApiOperation::Upload;
        let size_bytes = file.bytes.len();
        let form = Form::new().part("file", file.into_part()?);
        let response = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await
            .map_err(|err| ClientError::from_transport(op, err))?;
        let body: UploadResponse = decode(op, ensure_success(op, response).await?).await?;
        if body.filename.as_str().trim().is_empty() {
            return Err(ClientError::network(op, "server returned an empty filename"));
        }
        info!(filename = %body.filename, size_bytes, "api: uploaded photo");
        Ok(body.filename)
    }

    async fn analyze(&self, filename: &StoredFilename) -> Result<AnalysisResult> {
        let op = ApiOperation::Analyze;
        let response = self
            .http
            .post(self.endpoint("analyze-image"))
            .json(&AnalyzeRequest {
                filename: filename.clone(),
            })
            .send()
            .await
            .map_err(|err| ClientError::from_transport(op, err))?;
        let result: AnalysisResult = decode(op, ensure_success(op, response).await?).await?;
        debug!(
            %filename,
            object_name = result.object_name.as_deref().unwrap_or("-"),
            confidence = result.confidence.unwrap_or_default(),
            "api: analysis received"
        );
        Ok(result)
    }

    async fn create_item(&self, request: &CreateLostItemRequest) -> Result<CreateLostItemResponse> {
        let op = ApiOperation::Create;
        let response = self
            .http
            .post(self.endpoint("create-lost-item"))
            .json(request)
            .send()
            .await
            .map_err(|err| ClientError::from_transport(op, err))?;
        let created: CreateLostItemResponse =
            decode(op, ensure_success(op, response).await?).await?;
        info!(id = created.id.0, "api: lost item created");
        Ok(created)
    }

    async fn create_item_from_file(
        &self,
        file: UploadedFile,
        found_location: Option<&str>,
    ) -> Result<CreateLostItemResponse> {
        let op = ApiOperation::Create;
        let mut form = Form::new().part("file", file.into_part()?);
        if let Some(location) = found_location.map(str::trim).filter(|l| !l.is_empty()) {
            form = form.text("foundLocation", location.to_string());
        }
        let response = self
            .http
            .post(self.endpoint("create-lost-item"))
            .multipart(form)
            .send()
            .await
            .map_err(|err| ClientError::from_transport(op, err))?;
        let created: CreateLostItemResponse =
            decode(op, ensure_success(op, response).await?).await?;
        info!(id = created.id.0, "api: lost item created from photo");
        Ok(created)
    }

    async fn fetch_item(&self, id: LostItemId) -> Result<Option<LostItem>> {
        let op = ApiOperation::FetchItem;
        let response = self
            .http
            .get(self.endpoint(&format!("lost-items/{id}")))
            .send()
            .await
            .map_err(|err| ClientError::from_transport(op, err))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        decode(op, ensure_success(op, response).await?).await.map(Some)
    }

    async fn list_items(&self) -> Result<Vec<LostItem>> {
        let op = ApiOperation::ListItems;
        let response = self
            .http
            .get(self.endpoint("lost-items"))
            .send()
            .await
            .map_err(|err| ClientError::from_transport(op, err))?;
        decode(op, ensure_success(op, response).await?).await
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
