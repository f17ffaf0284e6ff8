//! Async HTTP client wrapping the Cohort JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cohort_core::{
  history::HistoryEntry,
  segment::{ActiveSegment, Segment},
  update::MembershipUpdate,
};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{Value, json};

/// Async HTTP client for the Cohort JSON REST API.
///
/// Cheap to clone: the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: impl Into<String>) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url: base_url.into() })
  }

  pub(crate) fn url(&self, path: &str) -> String {
    let base = self.base_url.trim_end_matches('/');
    if path.starts_with('/') {
      format!("{base}{path}")
    } else {
      format!("{base}/{path}")
    }
  }

  async fn send(&self, req: reqwest::RequestBuilder, what: &str) -> Result<Response> {
    tracing::debug!(request = what, "sending");
    let resp = req.send().await.with_context(|| format!("{what} failed"))?;
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }

    // The API reports failures as `{"error": "<message>"}`.
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<Value>(&body)
      .ok()
      .and_then(|v| v.get("error").and_then(Value::as_str).map(str::to_owned))
      .unwrap_or(body);
    Err(anyhow!("{what} → {status}: {message}"))
  }

  // ── Segments ──────────────────────────────────────────────────────────────

  /// `GET /segments`
  pub async fn list_segments(&self) -> Result<Vec<String>> {
    self
      .send(self.client.get(self.url("/segments")), "GET /segments")
      .await?
      .json()
      .await
      .context("deserialising segments")
  }

  /// `POST /segments`
  pub async fn create_segment(&self, slug: &str, auto_percent: Option<i64>) -> Result<Segment> {
    let body = json!({ "slug": slug, "auto_percent": auto_percent });
    self
      .send(self.client.post(self.url("/segments")).json(&body), "POST /segments")
      .await?
      .json()
      .await
      .context("deserialising segment")
  }

  /// `DELETE /segments/{slug}`
  pub async fn delete_segment(&self, slug: &str) -> Result<()> {
    let path = format!("/segments/{slug}");
    self
      .send(self.client.delete(self.url(&path)), &format!("DELETE {path}"))
      .await?;
    Ok(())
  }

  /// `GET /segments/history[?year=&month=]`
  pub async fn history(&self, period: Option<(i32, u32)>) -> Result<Vec<HistoryEntry>> {
    let mut req = self.client.get(self.url("/segments/history"));
    if let Some((year, month)) = period {
      req = req.query(&[("year", year.to_string()), ("month", month.to_string())]);
    }
    self
      .send(req, "GET /segments/history")
      .await?
      .json()
      .await
      .context("deserialising history")
  }

  // ── Users ─────────────────────────────────────────────────────────────────

  /// `GET /users/{user_id}/segments`
  pub async fn user_segments(&self, user_id: i64) -> Result<Vec<ActiveSegment>> {
    let path = format!("/users/{user_id}/segments");
    self
      .send(self.client.get(self.url(&path)), &format!("GET {path}"))
      .await?
      .json()
      .await
      .context("deserialising active segments")
  }

  /// `POST /users/{user_id}/segments`
  pub async fn add_user(&self, user_id: i64, slug: &str) -> Result<Value> {
    let path = format!("/users/{user_id}/segments");
    self
      .send(
        self.client.post(self.url(&path)).json(&json!({ "slug": slug })),
        &format!("POST {path}"),
      )
      .await?
      .json()
      .await
      .context("deserialising membership")
  }

  /// `PATCH /users/{user_id}/segments`
  pub async fn update_user(&self, user_id: i64, update: &MembershipUpdate) -> Result<()> {
    let path = format!("/users/{user_id}/segments");
    self
      .send(self.client.patch(self.url(&path)).json(update), &format!("PATCH {path}"))
      .await?;
    Ok(())
  }

  // ── Raw ───────────────────────────────────────────────────────────────────

  /// Send an arbitrary request and return the status and body verbatim,
  /// whether or not it succeeded.
  pub async fn raw(
    &self,
    method: Method,
    endpoint: &str,
    data: Option<String>,
  ) -> Result<(StatusCode, String)> {
    let mut req = self.client.request(method.clone(), self.url(endpoint));
    if let Some(data) = data {
      req = req
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(data);
    }
    let resp = req
      .send()
      .await
      .with_context(|| format!("{method} {endpoint} failed"))?;
    let status = resp.status();
    let body = resp.text().await.context("reading response body")?;
    Ok((status, body))
  }
}
