//! Bridge and dummy interface provisioning over rtnetlink.

use std::net::{IpAddr, Ipv4Addr};

use ipnet::{IpNet, Ipv4Net};
use tracing::debug;

use crate::error::{Error, Result};
use crate::netlink::addr::Ipv4Address;
use crate::netlink::link::{BridgeLink, DummyLink, LinkConfig};
use crate::netlink::{Connection, Route};

/// Parse an IPv4 address with prefix length, e.g. `10.0.0.1/24`.
///
/// The host bits are kept: the result is the interface address, not the
/// network.
pub fn parse_ipv4_cidr(input: &str) -> Result<Ipv4Net> {
    let parse_error = |reason: &str| Error::Parse {
        input: input.to_string(),
        reason: reason.to_string(),
    };

    if let Ok(net) = input.parse::<Ipv4Net>() {
        return Ok(net);
    }

    if let Ok(IpNet::V6(_)) = input.parse::<IpNet>() {
        return Err(parse_error("IPv6 is not supported"));
    }
    match input.parse::<IpAddr>() {
        Ok(IpAddr::V4(_)) => Err(parse_error("missing prefix length")),
        Ok(IpAddr::V6(_)) => Err(parse_error("IPv6 is not supported")),
        Err(_) => Err(parse_error("expected an IPv4 address with prefix length")),
    }
}

/// Creates and removes named interfaces.
///
/// Every operation resolves the interface by name through netlink; no
/// handle is kept between calls.
pub struct InterfaceManager {
    conn: Connection<Route>,
}

impl InterfaceManager {
    /// Open an rtnetlink connection in the current namespace.
    pub fn new() -> Result<Self> {
        let conn =
            Connection::<Route>::new().map_err(|e| Error::kernel("open rtnetlink socket", e))?;
        Ok(Self::with_connection(conn))
    }

    /// Use an existing connection (e.g. one opened in another namespace).
    pub fn with_connection(conn: Connection<Route>) -> Self {
        Self { conn }
    }

    /// The underlying connection.
    pub fn connection(&self) -> &Connection<Route> {
        &self.conn
    }

    /// Create bridge `name`, assign `gateway_cidr` and bring it up.
    pub async fn create_bridge(&self, name: &str, gateway_cidr: &str) -> Result<()> {
        let address = parse_ipv4_cidr(gateway_cidr)?;
        self.create(BridgeLink::new(name), address).await
    }

    /// Create dummy interface `name`, assign `address_cidr` and bring it up.
    pub async fn create_dummy(&self, name: &str, address_cidr: &str) -> Result<()> {
        let address = parse_ipv4_cidr(address_cidr)?;
        self.create(DummyLink::new(name), address).await
    }

    async fn create<L: LinkConfig>(&self, link: L, address: Ipv4Net) -> Result<()> {
        let name = link.name().to_string();
        let kind = link.kind().to_string();

        self.conn
            .add_link(link)
            .await
            .map_err(|e| Error::kernel(format!("failed to create {} {}", kind, name), e))?;
        debug!(interface = %name, kind = %kind, "link created");

        let ifindex = self
            .conn
            .link_index(&name)
            .await
            .map_err(|e| Error::kernel(format!("failed to resolve interface {}", name), e))?;

        self.conn
            .add_address(Ipv4Address::with_index(
                ifindex,
                address.addr(),
                address.prefix_len(),
            ))
            .await
            .map_err(|e| {
                Error::kernel(format!("failed to add address {} to {}", address, name), e)
            })?;
        debug!(interface = %name, %address, "address assigned");

        self.conn
            .set_link_up_by_index(ifindex)
            .await
            .map_err(|e| Error::kernel(format!("failed to set {} up", name), e))?;
        debug!(interface = %name, "link up");

        Ok(())
    }

    /// Delete interface `name`.
    ///
    /// Fails with [`Error::NotFound`] if no such interface exists.
    pub async fn remove(&self, name: &str) -> Result<()> {
        let link = self
            .conn
            .get_link_by_name(name)
            .await
            .map_err(|e| Error::kernel(format!("failed to look up interface {}", name), e))?
            .ok_or_else(|| Error::NotFound {
                name: name.to_string(),
            })?;

        self.conn
            .del_link_by_index(link.ifindex())
            .await
            .map_err(|e| Error::kernel(format!("failed to delete interface {}", name), e))?;
        debug!(interface = %name, "link deleted");

        Ok(())
    }

    /// IPv4 addresses on interface `name`, with prefix length.
    pub async fn ipv4_addresses(&self, name: &str) -> Result<Vec<(Ipv4Addr, u8)>> {
        let ifindex = self
            .conn
            .link_index(name)
            .await
            .map_err(|e| Error::kernel(format!("failed to resolve interface {}", name), e))?;
        self.conn
            .get_ipv4_addresses_by_index(ifindex)
            .await
            .map_err(|e| Error::kernel(format!("failed to list addresses of {}", name), e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reason(input: &str) -> String {
        match parse_ipv4_cidr(input) {
            Err(Error::Parse { reason, .. }) => reason,
            other => panic!("expected parse error for {input}, got {other:?}"),
        }
    }

    #[test]
    fn test_parses_address_with_prefix() {
        let net = parse_ipv4_cidr("10.0.0.1/24").unwrap();
        assert_eq!(net.addr(), Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(net.prefix_len(), 24);
        assert_eq!(net.network(), Ipv4Addr::new(10, 0, 0, 0));
    }

    #[test]
    fn test_accepts_host_prefix() {
        let net = parse_ipv4_cidr("192.168.1.1/32").unwrap();
        assert_eq!(net.prefix_len(), 32);
    }

    #[test]
    fn test_rejects_missing_prefix() {
        assert_eq!(reason("10.0.0.1"), "missing prefix length");
    }

    #[test]
    fn test_rejects_ipv6() {
        assert_eq!(reason("fd00::1/64"), "IPv6 is not supported");
        assert_eq!(reason("fd00::1"), "IPv6 is not supported");
    }

    #[test]
    fn test_rejects_garbage() {
        assert_eq!(
            reason("not-an-address"),
            "expected an IPv4 address with prefix length"
        );
        assert_eq!(
            reason("10.0.0.1/33"),
            "expected an IPv4 address with prefix length"
        );
    }
}
