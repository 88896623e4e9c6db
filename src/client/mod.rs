//! Async client for the OCR backend's HTTP contract.

mod retry;

use anyhow::{Context, Result, anyhow};
use futures_util::stream::{self, StreamExt, TryStreamExt};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::models::{
    GlobalWord, GlobalWordsResponse, OcrResult, StatusResponse, Upload, UploadResponse,
    UploadsResponse,
};
use crate::settings::Settings;
use retry::{RETRY_BASE_DELAY, RETRY_MAX_ATTEMPTS, is_transient, retry_after, wait_with_backoff};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONCURRENCY: usize = 4;
const DELETE_ALL_SEGMENT: &str = "all";

#[derive(Debug, Clone)]
pub struct GalleryClient {
    http: Client,
    base_url: Url,
    concurrency: usize,
}

impl GalleryClient {
    pub fn new(base_url: &str) -> Result<Self> {
        Self::build(base_url, DEFAULT_TIMEOUT, DEFAULT_CONCURRENCY)
    }

    pub fn from_settings(settings: &Settings) -> Result<Self> {
        Self::build(
            &settings.base_url,
            Duration::from_secs(settings.timeout_secs),
            settings.concurrency,
        )
    }

    fn build(base_url: &str, timeout: Duration, concurrency: usize) -> Result<Self> {
        let trimmed = base_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .with_context(|| format!("invalid backend url: {}", base_url))?;
        if base_url.cannot_be_a_base() {
            return Err(anyhow!("backend url cannot be a base: {}", trimmed));
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .with_context(|| "failed to build http client")?;
        Ok(Self {
            http,
            base_url,
            concurrency: concurrency.max(1),
        })
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    pub async fn list_uploads(&self) -> Result<Vec<Upload>> {
        let response: UploadsResponse = self
            .get_json(&["uploads"], &[])
            .await
            .with_context(|| "failed to fetch uploads")?;
        debug!("fetched {} uploads", response.uploads.len());
        Ok(response.uploads)
    }

    /// Sends an image for OCR. Files that do not sniff as images are
    /// rejected before any request is made.
    pub async fn upload_image(&self, path: &Path) -> Result<UploadResponse> {
        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read image: {}", path.display()))?;
        let mime = sniff_image_mime(&bytes)
            .ok_or_else(|| anyhow!("not an image file: {}", path.display()))?;
        let filename = path
            .file_name()
            .and_then(|name| name.to_str())
            .filter(|name| !name.trim().is_empty())
            .ok_or_else(|| anyhow!("image path has no file name: {}", path.display()))?
            .to_string();

        let part = Part::bytes(bytes)
            .file_name(filename.clone())
            .mime_str(mime)
            .with_context(|| format!("invalid mime type: {}", mime))?;
        let form = Form::new().part("image", part);

        let url = self.endpoint(&["ocr"])?;
        info!("uploading {} ({})", filename, mime);
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .with_context(|| "upload failed")?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(backend_error(status, &text).context("upload failed"));
        }
        serde_json::from_str(&text).with_context(|| "failed to parse upload response")
    }

    pub async fn fetch_ocr(&self, filename: &str) -> Result<OcrResult> {
        self.get_json(&["ocr"], &[("filename", filename)])
            .await
            .with_context(|| format!("failed to fetch details for {}", filename))
    }

    /// Fetches OCR results for every file, in parallel, returning them in
    /// the order given. Any failure fails the whole batch.
    pub async fn fetch_ocr_many(&self, filenames: &[String]) -> Result<Vec<OcrResult>> {
        stream::iter(filenames.iter().cloned())
            .map(|filename| async move { self.fetch_ocr(&filename).await })
            .buffered(self.concurrency)
            .try_collect()
            .await
    }

    /// Deletes one upload. `all` is the backend's delete-everything route,
    /// so it is refused here; use [`GalleryClient::delete_all`] for that.
    pub async fn delete_upload(&self, id: &str) -> Result<()> {
        let id = id.trim();
        if id.is_empty() {
            return Err(anyhow!("upload id is empty"));
        }
        if id.eq_ignore_ascii_case(DELETE_ALL_SEGMENT) || id.contains('/') {
            return Err(anyhow!("not a single upload id: {}", id));
        }
        self.send_delete(&["uploads", id])
            .await
            .with_context(|| "failed to delete image")?;
        info!("deleted upload {}", id);
        Ok(())
    }

    /// Removes every upload; returns the backend's status line.
    pub async fn delete_all(&self) -> Result<String> {
        let status = self
            .send_delete(&["uploads", DELETE_ALL_SEGMENT])
            .await
            .with_context(|| "failed to delete uploads")?;
        Ok(status.unwrap_or_else(|| "all uploads deleted".to_string()))
    }

    /// Where the backend serves the stored image for `filename`.
    pub fn image_url(&self, filename: &str) -> Result<Url> {
        self.endpoint(&["uploaded_images", filename])
    }

    pub async fn top_words(&self) -> Result<Vec<GlobalWord>> {
        let response: GlobalWordsResponse = self
            .get_json(&["top_words"], &[])
            .await
            .with_context(|| "failed to fetch top words")?;
        Ok(response.top_words)
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow!("backend url cannot be a base: {}", self.base_url))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<T> {
        let url = self.endpoint(segments)?;
        let path = url.path().to_string();
        let mut attempt = 0usize;
        let mut delay = RETRY_BASE_DELAY;
        loop {
            attempt += 1;
            debug!("GET {}", path);
            let response = self
                .http
                .request(Method::GET, url.clone())
                .query(query)
                .send()
                .await
                .with_context(|| format!("request to {} failed", path))?;

            let status = response.status();
            let wait_hint = retry_after(response.headers());
            let text = response.text().await.unwrap_or_default();
            if status.is_success() {
                return serde_json::from_str(&text)
                    .with_context(|| format!("failed to parse response from {}", path));
            }
            if is_transient(status) && attempt <= RETRY_MAX_ATTEMPTS {
                delay = wait_with_backoff(&path, attempt, delay, wait_hint).await;
                continue;
            }
            return Err(backend_error(status, &text));
        }
    }

    async fn send_delete(&self, segments: &[&str]) -> Result<Option<String>> {
        let url = self.endpoint(segments)?;
        debug!("DELETE {}", url.path());
        let response = self.http.delete(url).send().await?;
        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            return Err(backend_error(status, &text));
        }
        let parsed: StatusResponse = serde_json::from_str(&text).unwrap_or_default();
        Ok(parsed.status)
    }
}

fn backend_error(status: StatusCode, body: &str) -> anyhow::Error {
    let message = serde_json::from_str::<StatusResponse>(body)
        .ok()
        .and_then(|parsed| parsed.error)
        .filter(|message| !message.trim().is_empty());
    match message {
        Some(message) => anyhow!("backend error ({}): {}", status, message),
        None => anyhow!("backend error ({})", status),
    }
}

fn sniff_image_mime(bytes: &[u8]) -> Option<&'static str> {
    let kind = infer::get(bytes)?;
    let mime = kind.mime_type();
    mime.starts_with("image/").then_some(mime)
}
