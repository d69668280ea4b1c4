pub mod config;
pub mod logging;
pub mod runtime;
pub mod server;
pub mod services;

pub use config::Config;
pub use runtime::{LifecycleState, RuntimeError, ServerRuntime};
