//! Protocol state types for strongly-typed connections.
//!
//! Each netlink protocol used here has a zero-sized marker type, so that
//! link/address operations only exist on `Connection<Route>` and nf_tables
//! operations only on `Connection<Netfilter>`.
//!
//! ```ignore
//! use netshed::netlink::nftables::Family;
//! use netshed::netlink::{Connection, Netfilter, Route};
//!
//! let route = Connection::<Route>::new()?;
//! route.get_links().await?;
//!
//! let nft = Connection::<Netfilter>::new()?;
//! nft.get_rules(Family::Ipv4, "nat", "postrouting").await?;
//! ```

use super::socket::Protocol;

mod private {
    pub trait Sealed {}
}

/// Protocol state trait for typed connections.
///
/// Sealed; implemented only by the marker types in this module.
pub trait ProtocolState: private::Sealed {
    /// The netlink protocol for this state type.
    const PROTOCOL: Protocol;
}

/// Route protocol state (RTNetlink): links and addresses.
#[derive(Debug, Default, Clone, Copy)]
pub struct Route;

impl private::Sealed for Route {}

impl ProtocolState for Route {
    const PROTOCOL: Protocol = Protocol::Route;
}

/// Netfilter protocol state: nf_tables tables, chains and rules.
#[derive(Debug, Default, Clone, Copy)]
pub struct Netfilter;

impl private::Sealed for Netfilter {}

impl ProtocolState for Netfilter {
    const PROTOCOL: Protocol = Protocol::Netfilter;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_markers_are_zero_sized() {
        assert_eq!(std::mem::size_of::<Route>(), 0);
        assert_eq!(std::mem::size_of::<Netfilter>(), 0);
    }

    #[test]
    fn test_protocol_constants() {
        assert_eq!(Route::PROTOCOL, Protocol::Route);
        assert_eq!(Netfilter::PROTOCOL, Protocol::Netfilter);
    }
}
