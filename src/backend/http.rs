//! HTTP implementation of [`ReviewBackend`] against the hiring-platform API.

use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde_json::Value;

use crate::error::BackendError;

use super::{ChunkKind, FaceFlag, FinalSummary, ReviewBackend};

const REQUEST_TIMEOUT_SECS: u64 = 30;

pub struct HttpReviewBackend {
    client: reqwest::Client,
    base_url: String,
    bearer_token: Option<String>,
}

impl HttpReviewBackend {
    /// `base_url` is the video-interview route prefix, e.g.
    /// `https://host/api/video-interviews`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer_token: None,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    fn request(&self, url: String) -> reqwest::RequestBuilder {
        let builder = self.client.post(url);
        match &self.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, BackendError> {
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let body = resp.text().await.unwrap_or_default();
        Err(BackendError::Api {
            status,
            detail: extract_detail(&body).unwrap_or_default(),
        })
    }
}

impl ReviewBackend for HttpReviewBackend {
    async fn start_attempt(&self, simulation_id: &str) -> Result<String, BackendError> {
        let resp = self
            .request(self.url("start"))
            .form(&[("simulation_id", simulation_id)])
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        let resp = Self::check(resp).await?;

        let body: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        match body.get("attempt_id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(BackendError::InvalidResponse(
                "missing attempt_id in start response".into(),
            )),
        }
    }

    async fn upload_chunk(
        &self,
        attempt_id: &str,
        kind: ChunkKind,
        payload: Vec<u8>,
    ) -> Result<(), BackendError> {
        let part = Part::bytes(payload).file_name("chunk.webm");
        let form = Form::new().text("kind", kind.as_str()).part("chunk", part);

        let resp = self
            .request(self.url(&format!("upload-chunk/{attempt_id}")))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn upload_summary(
        &self,
        attempt_id: &str,
        summary: &FinalSummary,
    ) -> Result<(), BackendError> {
        let json = serde_json::to_vec(summary)
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let part = Part::bytes(json)
            .file_name("editor_events.json")
            .mime_str("application/json")
            .map_err(|e| BackendError::InvalidResponse(e.to_string()))?;
        let form = Form::new()
            .text("kind", ChunkKind::EditorEvents.as_str())
            .part("chunk", part);

        let resp = self
            .request(self.url(&format!("upload-chunk/{attempt_id}")))
            .multipart(form)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn finish(&self, attempt_id: &str) -> Result<(), BackendError> {
        // The backend replies 202 Accepted and assembles media in the
        // background; any 2xx counts as submitted.
        let resp = self
            .request(self.url(&format!("finish/{attempt_id}")))
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }

    async fn face_flag(&self, attempt_id: &str, flag: FaceFlag) -> Result<(), BackendError> {
        let resp = self
            .request(self.url(&format!("face-flag/{attempt_id}")))
            .json(&flag)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Self::check(resp).await.map(|_| ())
    }
}

/// Extract readable text from a FastAPI-style error body: either
/// `{"detail": "..."}` or `{"detail": [{"msg": "..."}, ...]}`.
fn extract_detail(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("detail")? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(issues) => {
            let msgs: Vec<&str> = issues
                .iter()
                .filter_map(|issue| issue.get("msg").and_then(Value::as_str))
                .collect();
            if msgs.is_empty() {
                None
            } else {
                Some(msgs.join("; "))
            }
        }
        _ => None,
    }
}
