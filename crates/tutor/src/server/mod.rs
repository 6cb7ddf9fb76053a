//! HTTP service for the professor-review assistant
//!
//! axum routes over the retrieval pipeline in [`services`]. Every JSON
//! response uses the [`types::BaseResponse`] envelope.

pub mod handlers;
pub mod middleware;
pub mod models;
pub mod routing;
pub mod services;
pub mod startup;
pub mod state;
pub mod types;
