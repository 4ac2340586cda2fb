//! API endpoints.

pub mod notify;
