//! Sequencing of per-network create and delete runs.

use std::future::Future;

use tracing::{info, warn};

use crate::config::{NetworkDescriptor, NetworkType};
use crate::error::{Error, Result};
use crate::interface::InterfaceManager;
use crate::masquerade::MasqueradeManager;

/// Interface operations the orchestrator drives.
pub trait InterfaceOps {
    fn create_bridge(&self, name: &str, gateway_cidr: &str) -> impl Future<Output = Result<()>>;

    fn create_dummy(&self, name: &str, address_cidr: &str) -> impl Future<Output = Result<()>>;

    fn remove_interface(&self, name: &str) -> impl Future<Output = Result<()>>;
}

/// Masquerade operations the orchestrator drives.
pub trait MasqueradeOps {
    fn add_masquerade(&self, network: &str) -> impl Future<Output = Result<()>>;

    fn remove_masquerade(&self, network: &str) -> impl Future<Output = Result<()>>;
}

impl InterfaceOps for InterfaceManager {
    async fn create_bridge(&self, name: &str, gateway_cidr: &str) -> Result<()> {
        InterfaceManager::create_bridge(self, name, gateway_cidr).await
    }

    async fn create_dummy(&self, name: &str, address_cidr: &str) -> Result<()> {
        InterfaceManager::create_dummy(self, name, address_cidr).await
    }

    async fn remove_interface(&self, name: &str) -> Result<()> {
        self.remove(name).await
    }
}

impl MasqueradeOps for MasqueradeManager {
    async fn add_masquerade(&self, network: &str) -> Result<()> {
        self.add(network).await
    }

    async fn remove_masquerade(&self, network: &str) -> Result<()> {
        self.remove(network).await
    }
}

/// A failure that did not stop the run.
#[derive(Debug)]
pub struct RunWarning {
    /// Network being processed.
    pub network: String,
    /// What failed.
    pub error: Error,
}

/// Outcome of a completed run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Networks processed, in order.
    pub processed: Vec<String>,
    /// Non-fatal failures.
    pub warnings: Vec<RunWarning>,
}

impl RunReport {
    /// True if the run finished without warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: &str,
    network: &NetworkDescriptor,
) -> Result<&'a str> {
    value.as_deref().filter(|v| !v.is_empty()).ok_or_else(|| {
        Error::Config(format!(
            "{} network {} has no {}",
            network.kind, network.name, field
        ))
    })
}

/// Creates and deletes networks in declaration order.
pub struct Orchestrator<I, M> {
    interfaces: I,
    masquerade: M,
}

impl<I: InterfaceOps, M: MasqueradeOps> Orchestrator<I, M> {
    pub fn new(interfaces: I, masquerade: M) -> Self {
        Self {
            interfaces,
            masquerade,
        }
    }

    /// Create every network.
    ///
    /// The first failure aborts the run. A bridge whose masquerade rule
    /// cannot be added is removed again before returning.
    pub async fn create(&self, networks: &[NetworkDescriptor]) -> Result<RunReport> {
        let mut report = RunReport::default();

        for network in networks {
            self.create_one(network)
                .await
                .map_err(|e| e.for_network(&network.name))?;
            info!("created network {}", network.name);
            report.processed.push(network.name.clone());
        }

        Ok(report)
    }

    async fn create_one(&self, network: &NetworkDescriptor) -> Result<()> {
        match network.kind {
            NetworkType::Bridge => {
                let gateway = required(&network.gateway, "gateway", network)?;
                self.interfaces.create_bridge(&network.name, gateway).await?;

                if network.masquerade {
                    if let Err(original) = self.masquerade.add_masquerade(&network.name).await {
                        return Err(self.rollback(&network.name, original).await);
                    }
                }
            }
            NetworkType::Dummy => {
                let address = required(&network.address, "address", network)?;
                self.interfaces.create_dummy(&network.name, address).await?;
            }
        }
        Ok(())
    }

    /// Undo a bridge creation; returns the error to report.
    async fn rollback(&self, name: &str, original: Error) -> Error {
        warn!(network = name, error = %original, "masquerade setup failed, removing interface");
        match self.interfaces.remove_interface(name).await {
            Ok(()) => original,
            Err(rollback) => Error::RollbackFailed {
                original: Box::new(original),
                rollback: Box::new(rollback),
            },
        }
    }

    /// Delete every network.
    ///
    /// Masquerade cleanup failures are recorded as warnings; a failure to
    /// remove an interface aborts the run.
    pub async fn delete(&self, networks: &[NetworkDescriptor]) -> Result<RunReport> {
        let mut report = RunReport::default();

        for network in networks {
            if network.wants_masquerade() {
                if let Err(error) = self.masquerade.remove_masquerade(&network.name).await {
                    warn!(network = %network.name, error = %error, "failed to remove masquerade");
                    report.warnings.push(RunWarning {
                        network: network.name.clone(),
                        error,
                    });
                }
            }

            self.interfaces
                .remove_interface(&network.name)
                .await
                .map_err(|e| e.for_network(&network.name))?;
            info!("deleted network {}", network.name);
            report.processed.push(network.name.clone());
        }

        Ok(report)
    }
}
