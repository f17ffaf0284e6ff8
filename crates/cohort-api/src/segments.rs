//! Handlers for `/segments` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/segments` | Slugs in ascending order |
//! | `POST`   | `/segments` | Body: `{"slug":"VOICE","auto_percent":30}` |
//! | `DELETE` | `/segments/{slug}` | 404 if not found |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::{SegmentService, clock::Clock, store::SegmentStore};
use serde::Deserialize;

use crate::error::ApiError;

// ─── List ─────────────────────────────────────────────────────────────────────

/// `GET /segments`
pub async fn list<S, C>(
  State(service): State<Arc<SegmentService<S, C>>>,
) -> Result<Json<Vec<String>>, ApiError>
where
  S: SegmentStore,
  C: Clock,
{
  Ok(Json(service.list_segments().await?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct CreateBody {
  pub slug:         String,
  pub auto_percent: Option<i64>,
}

/// `POST /segments`, body: `{"slug":"VOICE","auto_percent":30}`
pub async fn create<S, C>(
  State(service): State<Arc<SegmentService<S, C>>>,
  Json(body): Json<CreateBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SegmentStore,
  C: Clock,
{
  let segment = service.create_segment(body.slug, body.auto_percent).await?;
  tracing::info!(slug = %segment.slug, auto_percent = ?segment.auto_percent, "segment created");
  Ok((StatusCode::CREATED, Json(segment)))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /segments/{slug}`
pub async fn delete_one<S, C>(
  State(service): State<Arc<SegmentService<S, C>>>,
  Path(slug): Path<String>,
) -> Result<StatusCode, ApiError>
where
  S: SegmentStore,
  C: Clock,
{
  if !service.delete_segment(slug.clone()).await? {
    return Err(cohort_core::Error::SlugNotFound(slug).into());
  }
  tracing::info!(%slug, "segment deleted");
  Ok(StatusCode::NO_CONTENT)
}
