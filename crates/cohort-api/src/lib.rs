//! JSON REST API for Cohort.
//!
//! Exposes an axum [`Router`] backed by a [`SegmentService`] over any
//! [`cohort_core::store::SegmentStore`]. Auth, TLS, and transport concerns are
//! the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .merge(cohort_api::api_router(service.clone()))
//! ```

pub mod error;
pub mod history;
pub mod segments;
pub mod users;

use std::sync::Arc;

use axum::{
  Router,
  routing::{delete, get},
};
use cohort_core::{SegmentService, clock::Clock, store::SegmentStore};

pub use error::ApiError;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be merged into any parent router regardless
/// of its own state type.
pub fn api_router<S, C>(service: Arc<SegmentService<S, C>>) -> Router<()>
where
  S: SegmentStore + 'static,
  C: Clock + 'static,
{
  Router::new()
    // Catalog
    .route("/segments", get(segments::list::<S, C>).post(segments::create::<S, C>))
    .route("/segments/history", get(history::handler::<S, C>))
    .route("/segments/{slug}", delete(segments::delete_one::<S, C>))
    // Memberships
    .route(
      "/users/{user_id}/segments",
      get(users::active::<S, C>)
        .post(users::add::<S, C>)
        .patch(users::update::<S, C>),
    )
    .with_state(service)
}

// ─── Router tests ─────────────────────────────────────────────────────────────
