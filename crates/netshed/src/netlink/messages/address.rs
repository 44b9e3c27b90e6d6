//! Strongly-typed address message.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::netlink::parse::{FromNetlink, PResult, bytes, cut, next_attr};
use crate::netlink::types::addr::{IfAddrMsg, IfaAttr};

/// An address as reported by `RTM_GETADDR`.
#[derive(Debug, Clone, Default)]
pub struct AddressMessage {
    pub(crate) header: IfAddrMsg,
    /// IFA_ADDRESS (peer address on point-to-point links).
    pub(crate) address: Option<IpAddr>,
    /// IFA_LOCAL.
    pub(crate) local: Option<IpAddr>,
}

impl AddressMessage {
    /// Interface index the address belongs to.
    pub fn ifindex(&self) -> u32 {
        self.header.ifa_index
    }

    /// Prefix length.
    pub fn prefix_len(&self) -> u8 {
        self.header.ifa_prefixlen
    }

    /// The address configured on the interface.
    ///
    /// Prefers IFA_LOCAL, falling back to IFA_ADDRESS.
    pub fn primary_address(&self) -> Option<IpAddr> {
        self.local.or(self.address)
    }
}

fn parse_ip(family: u8, data: &[u8]) -> Option<IpAddr> {
    match family as i32 {
        libc::AF_INET => {
            let octets: [u8; 4] = data.get(..4)?.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        libc::AF_INET6 => {
            let octets: [u8; 16] = data.get(..16)?.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}

impl FromNetlink for AddressMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(IfAddrMsg::new().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        if input.len() < IfAddrMsg::SIZE {
            return Err(cut());
        }

        let header_bytes = bytes(input, IfAddrMsg::SIZE)?;
        let header = *IfAddrMsg::from_bytes(header_bytes).map_err(|_| cut())?;
        let family = header.ifa_family;

        let mut msg = AddressMessage {
            header,
            ..Default::default()
        };

        while let Some((attr_type, attr_data)) = next_attr(input)? {
            match attr_type {
                t if t == IfaAttr::Address as u16 => msg.address = parse_ip(family, attr_data),
                t if t == IfaAttr::Local as u16 => msg.local = parse_ip(family, attr_data),
                _ => {}
            }
        }

        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::builder::MessageBuilder;
    use crate::netlink::message::NLMSG_HDRLEN;

    #[test]
    fn test_parse_ipv4_address() {
        let mut builder = MessageBuilder::new(20, 0);
        builder.append(
            &IfAddrMsg::new()
                .with_family(libc::AF_INET as u8)
                .with_prefixlen(24)
                .with_index(4),
        );
        builder.append_attr(IfaAttr::Address as u16, &[10, 0, 0, 9]);
        builder.append_attr(IfaAttr::Local as u16, &[10, 0, 0, 1]);
        builder.append_attr(IfaAttr::Broadcast as u16, &[10, 0, 0, 255]);
        let msg = builder.finish();

        let addr = AddressMessage::from_bytes(&msg[NLMSG_HDRLEN..]).unwrap();
        assert_eq!(addr.ifindex(), 4);
        assert_eq!(addr.prefix_len(), 24);
        assert_eq!(
            addr.primary_address(),
            Some(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1)))
        );
    }

    #[test]
    fn test_ipv6_address_without_local() {
        let mut builder = MessageBuilder::new(20, 0);
        builder.append(
            &IfAddrMsg::new()
                .with_family(libc::AF_INET6 as u8)
                .with_prefixlen(64)
                .with_index(2),
        );
        let v6: Ipv6Addr = "fe80::1".parse().unwrap();
        builder.append_attr(IfaAttr::Address as u16, &v6.octets());
        let msg = builder.finish();

        let addr = AddressMessage::from_bytes(&msg[NLMSG_HDRLEN..]).unwrap();
        assert_eq!(addr.primary_address(), Some(IpAddr::V6(v6)));
    }
}
