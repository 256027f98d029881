//! HTTP boundary: the content API (feed pages, item profiles) and the
//! metadata service (batched category lookups).
//!
//! Upstream records are normalized into [`crate::feed::ResolvedItem`] here,
//! so nothing past this module sees the wire format.

mod client;
pub mod profile;
pub mod records;

pub use client::{
    build_http_client, parse_lookup, read_limited_bytes, ApiClient, ApiEndpoints, ApiError,
    HealthStatus, HEALTH_PROBE_ID,
};
pub use profile::{format_size, ItemProfile, ProfileFile, Requirement, Submitter};
