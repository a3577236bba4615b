//! Observability for the to-do service: metrics and log subscriber setup.
//!
//! All instrumentation uses `#[instrument(skip_all)]` with explicit field
//! allow-listing. Passwords, session tokens and the signing secret are never
//! recorded as fields. User ids and task ids are safe; usernames appear only in
//! debug-level events.

pub mod logging;
pub mod metrics;
