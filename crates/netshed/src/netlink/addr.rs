//! Address management.
//!
//! ```ignore
//! use std::net::Ipv4Addr;
//! use netshed::netlink::addr::Ipv4Address;
//!
//! let ifindex = conn.link_index("br0").await?;
//! conn.add_address(Ipv4Address::with_index(ifindex, Ipv4Addr::new(10, 0, 0, 1), 24))
//!     .await?;
//! ```

use std::net::{IpAddr, Ipv4Addr};

use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::{Error, Result};
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use super::messages::AddressMessage;
use super::protocol::Route;
use super::types::addr::{IfAddrMsg, IfaAttr, RT_SCOPE_UNIVERSE};

/// IPv4 address to assign to an interface.
#[derive(Debug, Clone)]
pub struct Ipv4Address {
    ifindex: u32,
    address: Ipv4Addr,
    prefix_len: u8,
    broadcast: Option<Ipv4Addr>,
}

impl Ipv4Address {
    /// Address on interface `ifindex`.
    ///
    /// Prefixes shorter than /31 get the subnet broadcast address
    /// (`ip addr add ... brd +`); /31 and /32 have none.
    pub fn with_index(ifindex: u32, address: Ipv4Addr, prefix_len: u8) -> Self {
        Self {
            ifindex,
            address,
            prefix_len,
            broadcast: default_broadcast(address, prefix_len),
        }
    }

    fn build(&self) -> Result<MessageBuilder> {
        if self.prefix_len > 32 {
            return Err(Error::InvalidAttribute(format!(
                "invalid IPv4 prefix length: {}",
                self.prefix_len
            )));
        }

        let mut builder = MessageBuilder::new(
            NlMsgType::RTM_NEWADDR,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
        );

        let mut ifaddr = IfAddrMsg::new()
            .with_family(libc::AF_INET as u8)
            .with_prefixlen(self.prefix_len)
            .with_index(self.ifindex);
        ifaddr.ifa_scope = RT_SCOPE_UNIVERSE;
        builder.append(&ifaddr);

        builder.append_attr(IfaAttr::Local as u16, &self.address.octets());
        builder.append_attr(IfaAttr::Address as u16, &self.address.octets());
        if let Some(brd) = self.broadcast {
            builder.append_attr(IfaAttr::Broadcast as u16, &brd.octets());
        }

        Ok(builder)
    }
}

fn default_broadcast(address: Ipv4Addr, prefix_len: u8) -> Option<Ipv4Addr> {
    if prefix_len >= 31 {
        return None;
    }
    let host_mask = u32::MAX >> prefix_len;
    Some(Ipv4Addr::from(u32::from(address) | host_mask))
}

impl Connection<Route> {
    /// Assign an IPv4 address.
    pub async fn add_address(&self, address: Ipv4Address) -> Result<()> {
        let builder = address.build()?;
        self.request_ack(builder).await.map_err(|e| {
            e.with_context(format!(
                "add address {}/{}",
                address.address, address.prefix_len
            ))
        })
    }

    /// List all addresses on the host.
    pub async fn get_addresses(&self) -> Result<Vec<AddressMessage>> {
        self.dump_typed(NlMsgType::RTM_GETADDR).await
    }

    /// IPv4 addresses (with prefix length) on interface `ifindex`.
    pub async fn get_ipv4_addresses_by_index(&self, ifindex: u32) -> Result<Vec<(Ipv4Addr, u8)>> {
        let addresses = self.get_addresses().await?;
        Ok(addresses
            .into_iter()
            .filter(|a| a.ifindex() == ifindex)
            .filter_map(|a| match a.primary_address() {
                Some(IpAddr::V4(v4)) => Some((v4, a.prefix_len())),
                _ => None,
            })
            .collect())
    }
}
