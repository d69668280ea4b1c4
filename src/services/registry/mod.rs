//! Registry service module
//!
//! This module contains the authoritative in-memory directory split into logical components:
//! - `types`: Registration record and registry errors
//! - `service`: The locked store and its queries

pub mod service;
pub mod types;

// Re-export public types for easier access
pub use service::ServiceRegistry;
pub use types::{RegistrationRecord, RegistryError};
