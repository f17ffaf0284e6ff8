//! Handlers for `/users/{user_id}/segments`.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/users/{user_id}/segments` | Active segments with the reason each applies |
//! | `POST`  | `/users/{user_id}/segments` | Body: `{"slug":"VOICE"}`; permanent, no history |
//! | `PATCH` | `/users/{user_id}/segments` | Body: `{"add":[..],"remove":[..],"ttl_hours":24}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use cohort_core::{
  SegmentService,
  clock::Clock,
  segment::ActiveSegment,
  store::SegmentStore,
  update::MembershipUpdate,
};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `GET /users/{user_id}/segments`
pub async fn active<S, C>(
  State(service): State<Arc<SegmentService<S, C>>>,
  Path(user_id): Path<i64>,
) -> Result<Json<Vec<ActiveSegment>>, ApiError>
where
  S: SegmentStore,
  C: Clock,
{
  Ok(Json(service.user_segments(user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct AddBody {
  pub slug: String,
}

#[derive(Debug, Serialize)]
pub struct Membership {
  pub user_id: i64,
  pub slug:    String,
}

/// `POST /users/{user_id}/segments`, body: `{"slug":"VOICE"}`
pub async fn add<S, C>(
  State(service): State<Arc<SegmentService<S, C>>>,
  Path(user_id): Path<i64>,
  Json(body): Json<AddBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: SegmentStore,
  C: Clock,
{
  service.add_user_to_segment(user_id, body.slug.clone()).await?;
  Ok((StatusCode::CREATED, Json(Membership { user_id, slug: body.slug })))
}

/// `PATCH /users/{user_id}/segments`
pub async fn update<S, C>(
  State(service): State<Arc<SegmentService<S, C>>>,
  Path(user_id): Path<i64>,
  Json(body): Json<MembershipUpdate>,
) -> Result<StatusCode, ApiError>
where
  S: SegmentStore,
  C: Clock,
{
  let (added, removed) = (body.add.len(), body.remove.len());
  service.update_user_segments(user_id, body).await?;
  tracing::debug!(user_id, added, removed, "memberships updated");
  Ok(StatusCode::NO_CONTENT)
}
