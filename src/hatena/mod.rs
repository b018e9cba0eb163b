pub mod client;
pub mod types;

pub use client::HatenaClient;
pub use types::{ApiError, BookmarkService, Endpoints};
