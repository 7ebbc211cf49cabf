use std::path::Path;

use reqwest::{
    Method,
    multipart::{Form, Part},
};

use super::ApiClient;
use crate::{
    error::AppError,
    forms::{check_image_size, image_content_type},
    models::FileUploadResponse,
};

pub struct FilesApi<'a> {
    api: &'a ApiClient,
}

impl<'a> FilesApi<'a> {
    pub(crate) fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }

    pub async fn upload_image(&self, path: &Path) -> Result<FileUploadResponse, AppError> {
        let content_type = image_content_type(path)?;
        let unreadable = |err: std::io::Error| {
            AppError::validation(format!("cannot read {}: {err}", path.display()))
        };
        let metadata = tokio::fs::metadata(path).await.map_err(unreadable)?;
        check_image_size(metadata.len())?;
        let bytes = tokio::fs::read(path).await.map_err(unreadable)?;

        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());
        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str(content_type)?;

        let uploaded: FileUploadResponse = self
            .api
            .send_json(
                self.api
                    .request(Method::POST, "/api/upload/image")
                    .multipart(Form::new().part("file", part)),
            )
            .await?;
        tracing::info!(url = %uploaded.url, size = %uploaded.size, "image uploaded");
        Ok(uploaded)
    }

    pub async fn delete(&self, filename: &str) -> Result<(), AppError> {
        self.api
            .send(
                self.api
                    .request(Method::DELETE, &format!("/api/upload/files/{filename}")),
            )
            .await?;
        Ok(())
    }
}
