//! Trait-shaped adapters over Google Cloud service clients.
//!
//! Each service module holds a thin REST client and an `iface` submodule
//! with the traits application code depends on, plus adapters that make the
//! real client satisfy them. Tests substitute in-memory fakes.

pub mod bigquery;
pub mod config;
pub mod datastore;
pub mod pubsub;
pub mod runtimeconfig;
pub mod transport;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::{CliConfig, Command};

pub use config::{ClientConfig, ServiceKind};
pub use utils::error::{Error, Result};
