//! Handler for `GET /segments/history[?year=<y>&month=<m>]`.
//!
//! Without parameters the whole audit trail is returned in insertion order.
//! With both, only entries recorded during that fully elapsed UTC month.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Query, State},
};
use cohort_core::{SegmentService, clock::Clock, history::HistoryEntry, store::SegmentStore};
use serde::Deserialize;

use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct HistoryParams {
  pub year:  Option<i32>,
  pub month: Option<u32>,
}

pub async fn handler<S, C>(
  State(service): State<Arc<SegmentService<S, C>>>,
  Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<HistoryEntry>>, ApiError>
where
  S: SegmentStore,
  C: Clock,
{
  let entries = match (params.year, params.month) {
    (Some(year), Some(month)) => service.history_for_month(year, month).await?,
    (None, None) => service.history().await?,
    _ => {
      return Err(ApiError::BadRequest(
        "year and month must be given together".to_string(),
      ));
    }
  };
  Ok(Json(entries))
}
