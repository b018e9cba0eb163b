pub mod bookmark;
pub mod session;
