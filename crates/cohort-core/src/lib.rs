//! Core types and logic for the Cohort segment service.
//!
//! Users belong to segments either manually (explicit, optionally expiring
//! assignments recorded in an audit trail) or automatically (a deterministic
//! percentage rollout). This crate decides which segments are active and
//! plans atomic membership updates. It has no HTTP or database dependencies
//! and never logs.

// Native `async fn` in trait impls; the trait itself spells out `Send` bounds.
#![allow(async_fn_in_trait)]

pub mod bucket;
pub mod clock;
pub mod error;
pub mod history;
pub mod memory;
pub mod resolve;
pub mod segment;
pub mod service;
pub mod store;
pub mod update;
pub mod validate;

pub use error::{Error, Result};
pub use service::SegmentService;
