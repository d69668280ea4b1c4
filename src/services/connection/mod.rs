pub mod cache;
pub mod connection;
pub mod handler;
pub mod types;

pub use cache::*;
pub use connection::*;
pub use handler::{apply_notification, handle_notification};
pub use types::*;
