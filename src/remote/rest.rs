use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use url::Url;

use crate::core::model::Torrent;
use crate::remote::ServiceConfig;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("bad endpoint url: {0}")]
    Endpoint(#[from] url::ParseError),

    #[error("daemon answered {status}: {detail}")]
    Status { status: StatusCode, detail: String },

    #[error("not found: {0}")]
    NotFound(String),
}

#[derive(Deserialize)]
struct SnapshotBody {
    #[serde(default)]
    torrents: Vec<Torrent>,
}

/// Daemon's answer to a successful upload.
#[derive(Debug, Deserialize)]
pub struct AddOutcome {
    #[serde(default)]
    pub success: bool,
    #[serde(default)]
    pub info_hash: String,
    #[serde(default)]
    pub name: String,
}

/// Request side of the daemon API: the snapshot endpoint plus the
/// fire-and-forget command routes.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base: Url,
}

impl ApiClient {
    pub fn new(config: &ServiceConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { http, base: config.base_url.clone() })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        Ok(self.base.join(path)?)
    }

    /// Full listing of every torrent the daemon tracks.
    pub async fn fetch_snapshot(&self) -> Result<Vec<Torrent>, ApiError> {
        let resp = self.http.get(self.endpoint("/api/torrents")?).send().await?;
        let body: SnapshotBody = Self::check(resp).await?.json().await?;
        Ok(body.torrents)
    }

    pub async fn start(&self, info_hash: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/api/torrents/{info_hash}/start"))?;
        Self::check(self.http.post(url).send().await?).await?;
        Ok(())
    }

    pub async fn pause(&self, info_hash: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/api/torrents/{info_hash}/pause"))?;
        Self::check(self.http.post(url).send().await?).await?;
        Ok(())
    }

    pub async fn remove(&self, info_hash: &str) -> Result<(), ApiError> {
        let url = self.endpoint(&format!("/api/torrents/{info_hash}"))?;
        Self::check(self.http.delete(url).send().await?).await?;
        Ok(())
    }

    /// Upload a `.torrent` file as the `file` field of a multipart form.
    /// The daemon answers with the stub and then announces the add on the
    /// push channel, which is what makes live clients re-fetch.
    pub async fn add_torrent(&self, file_name: &str, bytes: Vec<u8>) -> Result<AddOutcome, ApiError> {
        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str("application/x-bittorrent")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        let resp = self
            .http
            .post(self.endpoint("/api/torrents/add")?)
            .multipart(form)
            .send()
            .await?;
        Ok(Self::check(resp).await?.json().await?)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let detail = extract_detail(&resp.text().await.unwrap_or_default());
        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(detail));
        }
        Err(ApiError::Status { status, detail })
    }
}

/// Error bodies look like `{"detail": "..."}`; fall back to the raw text.
fn extract_detail(body: &str) -> String {
    #[derive(Deserialize)]
    struct Detail {
        detail: String,
    }
    match serde_json::from_str::<Detail>(body) {
        Ok(d) => d.detail,
        Err(_) => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detail_is_pulled_out_of_error_bodies() {
        assert_eq!(extract_detail(r#"{"detail":"Torrent not found"}"#), "Torrent not found");
        assert_eq!(extract_detail("plain text\n"), "plain text");
        assert_eq!(extract_detail(""), "");
    }

    #[test]
    fn snapshot_body_tolerates_missing_fields() {
        let body: SnapshotBody =
            serde_json::from_str(r#"{"torrents":[{"info_hash":"aa","name":"x"}]}"#).unwrap();
        assert_eq!(body.torrents.len(), 1);
        assert_eq!(body.torrents[0].total_size, 0);
        assert_eq!(body.torrents[0].piece_count, None);

        let empty: SnapshotBody = serde_json::from_str("{}").unwrap();
        assert!(empty.torrents.is_empty());
    }
}
