//! Database repositories.

mod notify;
mod user_link;

pub use notify::NotifyRepository;
pub use user_link::UserLinkRepository;
