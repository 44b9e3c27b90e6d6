//! Declarative network configuration.
//!
//! ```yaml
//! networks:
//!   - name: br0
//!     type: bridge
//!     subnet: 10.0.0.0/24
//!     gateway: 10.0.0.1/24
//!     masquerade: true
//!   - name: dum0
//!     type: dummy
//!     address: 192.168.1.1/24
//! ```

use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Kind of interface a network is backed by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NetworkType {
    /// Bridge with a gateway address.
    Bridge,
    /// Isolated dummy interface with a static address.
    Dummy,
}

impl std::fmt::Display for NetworkType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NetworkType::Bridge => f.write_str("bridge"),
            NetworkType::Dummy => f.write_str("dummy"),
        }
    }
}

/// One declared network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDescriptor {
    /// Interface name; also the masquerade tag.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: NetworkType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subnet: Option<String>,
    /// Gateway address with prefix (bridge).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway: Option<String>,
    /// Interface address with prefix (dummy).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Masquerade outbound traffic (bridge only).
    #[serde(default)]
    pub masquerade: bool,
}

impl NetworkDescriptor {
    /// A bridge network.
    pub fn bridge(
        name: impl Into<String>,
        subnet: impl Into<String>,
        gateway: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: NetworkType::Bridge,
            subnet: Some(subnet.into()),
            gateway: Some(gateway.into()),
            address: None,
            masquerade: false,
        }
    }

    /// A dummy network.
    pub fn dummy(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: NetworkType::Dummy,
            subnet: None,
            gateway: None,
            address: Some(address.into()),
            masquerade: false,
        }
    }

    /// Enable masquerading.
    pub fn masquerade(mut self, enabled: bool) -> Self {
        self.masquerade = enabled;
        self
    }

    /// True for a bridge that wants masquerading.
    pub fn wants_masquerade(&self) -> bool {
        self.kind == NetworkType::Bridge && self.masquerade
    }
}

/// A validated configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub networks: Vec<NetworkDescriptor>,
}

impl Config {
    /// Read and validate a configuration file.
    ///
    /// Files ending in `.json` are parsed as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let is_json = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        if is_json {
            Self::from_json_str(&content)
        } else {
            Self::from_yaml_str(&content)
        }
    }

    /// Parse and validate a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a JSON document.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Check the structural rules the rest of the tool relies on.
    pub fn validate(&self) -> Result<()> {
        if self.networks.is_empty() {
            return Err(Error::Config("no networks defined".into()));
        }

        let mut seen = HashSet::new();
        for (index, network) in self.networks.iter().enumerate() {
            if network.name.trim().is_empty() {
                return Err(Error::Config(format!("network {} has no name", index)));
            }
            if !seen.insert(network.name.as_str()) {
                return Err(Error::Config(format!(
                    "duplicate network name: {}",
                    network.name
                )));
            }

            match network.kind {
                NetworkType::Bridge => {
                    if is_blank(&network.subnet) || is_blank(&network.gateway) {
                        return Err(Error::Config(format!(
                            "bridge network {} requires subnet and gateway",
                            network.name
                        )));
                    }
                }
                NetworkType::Dummy => {
                    if is_blank(&network.address) {
                        return Err(Error::Config(format!(
                            "dummy network {} requires address",
                            network.name
                        )));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Absent and empty are both "not set".
fn is_blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(str::is_empty)
}
