//! Common test utilities for integration tests.
//!
//! Provides `TestNamespace` for isolated network namespace testing
//! and `require_root!` for skipping kernel tests when unprivileged.

use std::io;
use std::path::PathBuf;
use std::process::Command;
use std::sync::atomic::{AtomicU32, Ordering};

use netshed::netlink::{self, Connection, Netfilter, Route};
use netshed::{InterfaceManager, MasqueradeManager};

/// Result type for integration tests.
pub type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

static NAMESPACE_COUNTER: AtomicU32 = AtomicU32::new(0);

fn unique_ns_name(prefix: &str) -> String {
    let id = NAMESPACE_COUNTER.fetch_add(1, Ordering::SeqCst);
    let pid = std::process::id();
    format!("netshed-test-{}-{}-{}", prefix, pid, id)
}

/// A network namespace deleted on drop.
pub struct TestNamespace {
    name: String,
}

impl TestNamespace {
    /// Create a namespace with a unique name derived from `prefix`.
    pub fn new(prefix: &str) -> netlink::Result<Self> {
        let name = unique_ns_name(prefix);

        let status = Command::new("ip")
            .args(["netns", "add", &name])
            .status()
            .map_err(|e| netlink::Error::Io(io::Error::from(e.kind())))?;

        if !status.success() {
            return Err(netlink::Error::InvalidMessage(format!(
                "failed to create namespace: {}",
                name
            )));
        }

        Ok(Self { name })
    }

    fn path(&self) -> PathBuf {
        PathBuf::from("/var/run/netns").join(&self.name)
    }

    /// rtnetlink connection inside the namespace.
    pub fn route(&self) -> netlink::Result<Connection<Route>> {
        Connection::<Route>::new_in_namespace_path(self.path())
    }

    /// nfnetlink connection inside the namespace.
    pub fn netfilter(&self) -> netlink::Result<Connection<Netfilter>> {
        Connection::<Netfilter>::new_in_namespace_path(self.path())
    }

    /// Interface manager bound to the namespace.
    pub fn interfaces(&self) -> netlink::Result<InterfaceManager> {
        Ok(InterfaceManager::with_connection(self.route()?))
    }

    /// Masquerade manager bound to the namespace.
    pub fn masquerade(&self) -> netlink::Result<MasqueradeManager> {
        Ok(MasqueradeManager::with_connections(
            self.netfilter()?,
            self.route()?,
        ))
    }

    /// Run a command in the namespace and return its stdout.
    pub fn exec(&self, cmd: &str, args: &[&str]) -> netlink::Result<String> {
        let output = Command::new("ip")
            .args(["netns", "exec", &self.name, cmd])
            .args(args)
            .output()
            .map_err(|e| netlink::Error::Io(io::Error::from(e.kind())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(netlink::Error::InvalidMessage(format!(
                "command failed: {} {:?}: {}",
                cmd, args, stderr
            )));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl Drop for TestNamespace {
    fn drop(&mut self) {
        let _ = Command::new("ip")
            .args(["netns", "del", &self.name])
            .status();
    }
}

/// Check if running as root.
pub fn is_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}

/// Skip the test if not running as root.
#[macro_export]
macro_rules! require_root {
    () => {
        if !crate::common::is_root() {
            eprintln!("Skipping test: requires root");
            return Ok(());
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unique_ns_name() {
        let name1 = unique_ns_name("test");
        let name2 = unique_ns_name("test");
        assert_ne!(name1, name2);
        assert!(name1.starts_with("netshed-test-test-"));
    }
}
