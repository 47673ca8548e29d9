use anyhow::{Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, StatusCode};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

use crate::archive::RemoteArchive;
use crate::config::{Config, Credential};
use crate::generator::TEMPLATE_FILE;
use crate::retry::RetryPolicy;

/// Longest slice of an error response body kept in messages
const MAX_ERROR_BODY: usize = 500;

/// A failed Crowdin call. URLs are stripped so the API key never ends up in logs.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Crowdin {operation} request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("Crowdin {operation} error ({status}): {body}")]
    Status {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },
}

impl SyncError {
    /// Network failures, 5xx and 429 are worth another attempt; other 4xx are not
    pub fn is_retryable(&self) -> bool {
        match self {
            SyncError::Transport { source, .. } => !source.is_builder(),
            SyncError::Status { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
        }
    }
}

/// Result of the remote stage
#[derive(Debug)]
pub struct SyncOutcome {
    pub archive: RemoteArchive,
    /// Whether the template was uploaded and a build requested this run
    pub pushed: bool,
}

/// Client for the Crowdin v1 project API
pub struct CrowdinClient {
    http: reqwest::Client,
    api_url: String,
    download_url: String,
    project: String,
    file_name: String,
    retry: RetryPolicy,
}

impl CrowdinClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            api_url: config.crowdin_api_url.clone(),
            download_url: config.crowdin_download_url.clone(),
            project: config.crowdin_project.clone(),
            file_name: config.crowdin_file_name.clone(),
            retry: config.retry.clone(),
        })
    }

    /// Upload (when a credential exists), request a build, then download the export.
    ///
    /// Without a credential only the public export is downloaded. The download
    /// does not wait for the build it just requested, so it may lag behind the
    /// uploaded template by one export cycle.
    pub async fn sync(&self, credential: Option<&Credential>, template: &Path) -> Result<SyncOutcome> {
        let pushed = match credential {
            Some(credential) => {
                info!("Uploading template to Crowdin project '{}'", self.project);
                self.push_template(credential, template).await?;
                info!("✓ Template uploaded");

                info!("Requesting Crowdin export build");
                self.trigger_build(credential).await?;
                info!("✓ Export build requested");
                true
            }
            None => {
                info!("No Crowdin API key found, skipping upload and build");
                false
            }
        };

        info!("Downloading translations export");
        let archive = self.download_archive().await?;
        info!("✓ Downloaded export ({} bytes)", archive.len());

        Ok(SyncOutcome { archive, pushed })
    }

    /// `POST .../update-file` with the template as `files[<remote name>]`
    pub async fn push_template(&self, credential: &Credential, template: &Path) -> Result<()> {
        let contents = std::fs::read(template)
            .with_context(|| format!("Failed to read template {}", template.display()))?;
        let url = format!("{}/{}/update-file", self.api_url, self.project);
        let field = format!("files[{}]", self.file_name);

        let response = self
            .retry
            .run("Crowdin upload", || {
                let part = Part::bytes(contents.clone()).file_name(TEMPLATE_FILE);
                let request = self
                    .http
                    .post(&url)
                    .query(&[("key", credential.expose())])
                    .multipart(Form::new().part(field.clone(), part));
                self.send("upload", request)
            })
            .await?;

        let body = response.text().await.unwrap_or_default();
        debug!("Crowdin upload response: {}", body);
        Ok(())
    }

    /// `GET .../export`; the body is informational only
    pub async fn trigger_build(&self, credential: &Credential) -> Result<String> {
        let url = format!("{}/{}/export", self.api_url, self.project);

        let body = self
            .retry
            .run("Crowdin export", || async {
                let request = self.http.get(&url).query(&[("key", credential.expose())]);
                let response = self.send("export", request).await?;
                response.text().await.map_err(|e| transport("export", e))
            })
            .await?;

        debug!("Crowdin export response: {}", body);
        Ok(body)
    }

    /// `GET <download>/<project>.zip`, the public export; no key needed
    pub async fn download_archive(&self) -> Result<RemoteArchive> {
        let url = format!("{}/{}.zip", self.download_url, self.project);

        let bytes = self
            .retry
            .run("Crowdin download", || async {
                let response = self.send("download", self.http.get(&url)).await?;
                response.bytes().await.map_err(|e| transport("download", e))
            })
            .await?;

        Ok(RemoteArchive::new(bytes.to_vec()))
    }

    async fn send(&self, operation: &'static str, request: RequestBuilder) -> Result<Response, SyncError> {
        let response = request.send().await.map_err(|e| transport(operation, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Status {
                operation,
                status,
                body: body.trim().chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        Ok(response)
    }
}

fn transport(operation: &'static str, error: reqwest::Error) -> SyncError {
    SyncError::Transport {
        operation,
        source: error.without_url(),
    }
}
