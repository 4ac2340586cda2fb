//! Core services.

pub mod notify;
pub mod recipient;
pub mod sender;
