//! Host-local virtual network provisioning.
//!
//! netshed creates bridge and dummy interfaces with static IPv4 addresses
//! and, for bridges, tagged nf_tables masquerade rules. Everything goes
//! through netlink: rtnetlink for links and addresses, nfnetlink for
//! nf_tables.
//!
//! # Example
//!
//! ```ignore
//! use netshed::{Config, InterfaceManager, MasqueradeManager, Orchestrator};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> netshed::Result<()> {
//!     let config = Config::load("networks.yaml")?;
//!     let orchestrator =
//!         Orchestrator::new(InterfaceManager::new()?, MasqueradeManager::new()?);
//!
//!     let report = orchestrator.create(&config.networks).await?;
//!     println!("created {} networks", report.processed.len());
//!     Ok(())
//! }
//! ```

pub mod config;
mod error;
pub mod interface;
pub mod masquerade;
pub mod netlink;
pub mod orchestrator;

pub use config::{Config, NetworkDescriptor, NetworkType};
pub use error::{Error, Result};
pub use interface::{InterfaceManager, parse_ipv4_cidr};
pub use masquerade::{MasqueradeManager, has_masquerade, has_tag, tag_for};
pub use orchestrator::{InterfaceOps, MasqueradeOps, Orchestrator, RunReport, RunWarning};
