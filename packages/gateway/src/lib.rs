//! Labrack Remote Access Gateway Package
//!
//! Client for the web gateway that fronts lab instances. Each launch gets a
//! throwaway gateway user bound to one RDP connection; closing the lab tears
//! the binding down again.

pub mod client;
pub mod error;
pub mod types;

pub use client::{GatewayClient, GatewayConfig, SessionBinder};
pub use error::{GatewayError, GatewayResult};
pub use types::{GatewaySession, RemoteTarget};
