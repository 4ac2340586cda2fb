//! Job workers.

mod send;

pub use send::{send_worker, SendContext};
