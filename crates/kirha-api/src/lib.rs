//! Client for the Kirha search/planning API.
//!
//! Three operations, each one HTTP POST with a bearer credential:
//! - `search`: natural-language search within a vertical
//! - `create_plan`: build a search plan for later execution
//! - `run_plan`: execute a previously created plan
//!
//! The credential is supplied per call, not at construction, because the
//! gateway resolves an effective key per request (header override falling
//! back to the configured default).

mod client;
mod types;

pub use client::{DEFAULT_BASE_URL, KirhaApiError, KirhaClient, KirhaClientOptions};
pub use types::{CreatePlanRequest, RunPlanRequest, SearchRequest, SummarizationOptions};
