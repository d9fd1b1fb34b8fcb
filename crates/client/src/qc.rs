//! HTTP boundary for the QC pipeline backend.
//!
//! One streaming call (`full_run`) and two plain request/response
//! listing calls. Status handling happens here, before any frame
//! parsing: a non-success response short-circuits with its plain-text
//! body as the error detail.

use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::multipart;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use shared::catalog::{Question, QuestionBank};
use shared::events::RunEvent;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::StreamError;
use crate::stream::{pump_events, StreamOutcome};

// Connect timeout only: a total request timeout would cut long runs
// short while their progress stream is still live.
static SHARED_HTTP: LazyLock<Client> = LazyLock::new(|| {
    Client::builder()
        .connect_timeout(Duration::from_secs(30))
        .pool_max_idle_per_host(2)
        .build()
        .expect("failed to build HTTP client")
});

pub const DEFAULT_ENDPOINT: &str = "http://0.0.0.0:8080";

// ── Request types ────────────────────────────────────────────────────

/// Optional archive attached to a run (the picker form's zip upload).
#[derive(Debug, Clone)]
pub struct RunArchive {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Everything the full-run endpoint takes: free-form description text,
/// an optional archive, and an opaque JSON configuration object.
#[derive(Debug, Clone)]
pub struct FullRunRequest {
    pub description: String,
    pub archive: Option<RunArchive>,
    pub config: serde_json::Value,
}

impl FullRunRequest {
    fn into_form(self) -> multipart::Form {
        let mut form = multipart::Form::new()
            .text("description", self.description)
            .text("config", self.config.to_string());
        if let Some(archive) = self.archive {
            let part = multipart::Part::bytes(archive.bytes).file_name(archive.file_name);
            form = form.part("zip_file", part);
        }
        form
    }
}

/// Credential and search term for the question-bank listing call.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionBankQuery {
    #[serde(rename = "authToken")]
    pub auth_token: String,
    pub search: String,
}

#[derive(Debug, Serialize)]
struct QuestionsQuery<'a> {
    #[serde(rename = "authToken")]
    auth_token: &'a str,
    qb_id: &'a str,
}

// ── Response types ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct QuestionBankResponse {
    results: QuestionBankResults,
}

#[derive(Debug, Deserialize)]
struct QuestionBankResults {
    #[serde(default)]
    questionbanks: Vec<QuestionBank>,
}

#[derive(Debug, Deserialize)]
struct QuestionsResponse {
    #[serde(default)]
    non_group_questions: Vec<Question>,
}

// ── Client ───────────────────────────────────────────────────────────

/// Client for the QC pipeline backend.
#[derive(Debug, Clone)]
pub struct QcClient {
    http: Client,
    endpoint: String,
}

impl QcClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: SHARED_HTTP.clone(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        }
    }

    /// Start a full pipeline run and stream its progress events into
    /// `tx` until the server closes the stream, `cancel` fires, or the
    /// subscriber goes away.
    pub async fn full_run(
        &self,
        request: FullRunRequest,
        tx: &mpsc::Sender<RunEvent>,
        cancel: &CancellationToken,
    ) -> Result<StreamOutcome, StreamError> {
        let url = format!("{}/qc/full-run", self.endpoint);
        debug!(%url, "starting full run");

        let resp = self
            .http
            .post(&url)
            .multipart(request.into_form())
            .send()
            .await
            .map_err(|err| StreamError::Transport(err.into()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StreamError::Http { status, body });
        }

        pump_events(resp.bytes_stream(), tx, cancel).await
    }

    /// List question banks matching a search term. Plain
    /// request/response, no streaming.
    pub async fn fetch_question_banks(
        &self,
        query: &QuestionBankQuery,
    ) -> Result<Vec<QuestionBank>> {
        let url = format!("{}/fetch-qbs", self.endpoint);
        let resp = self.http.post(&url).json(query).send().await?;
        if !resp.status().is_success() {
            return Err(listing_error("fetch-qbs", resp).await);
        }
        let body: QuestionBankResponse = resp.json().await?;
        Ok(body.results.questionbanks)
    }

    /// List the questions of one bank.
    pub async fn fetch_questions(&self, auth_token: &str, qb_id: &str) -> Result<Vec<Question>> {
        let url = format!("{}/fetch-questions", self.endpoint);
        let query = QuestionsQuery { auth_token, qb_id };
        let resp = self.http.post(&url).json(&query).send().await?;
        if !resp.status().is_success() {
            return Err(listing_error("fetch-questions", resp).await);
        }
        let body: QuestionsResponse = resp.json().await?;
        Ok(body.non_group_questions)
    }
}

impl Default for QcClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT)
    }
}

async fn listing_error(call: &str, resp: reqwest::Response) -> anyhow::Error {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let detail: String = body.chars().take(800).collect();
    if detail.trim().is_empty() {
        anyhow!("{} error: {}", call, status)
    } else {
        anyhow!("{} error: {}\n{}", call, status, detail)
    }
}
