pub mod client;
pub mod connection;
pub mod context;
pub mod health;
pub mod notification;
pub mod registry;
pub mod router;

pub use context::{ServiceContext, dependency_gate};
pub use registry::{RegistrationRecord, RegistryError, ServiceRegistry};
