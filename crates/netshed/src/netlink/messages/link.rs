//! Strongly-typed link message.

use crate::netlink::parse::{FromNetlink, PResult, bytes, cut, next_attr, parse_string_from_bytes};
use crate::netlink::types::link::{IfInfoMsg, IflaAttr, IflaInfo, iff};

/// A link as reported by `RTM_GETLINK`.
#[derive(Debug, Clone, Default)]
pub struct LinkMessage {
    pub(crate) header: IfInfoMsg,
    pub(crate) name: Option<String>,
    pub(crate) kind: Option<String>,
}

impl LinkMessage {
    /// Interface index.
    pub fn ifindex(&self) -> u32 {
        self.header.ifi_index as u32
    }

    /// Interface name (IFLA_IFNAME).
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Link kind from IFLA_LINKINFO (e.g. "bridge", "dummy").
    pub fn kind(&self) -> Option<&str> {
        self.kind.as_deref()
    }

    /// Check if the interface is administratively up.
    pub fn is_up(&self) -> bool {
        self.header.ifi_flags & iff::UP != 0
    }
}

impl FromNetlink for LinkMessage {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(IfInfoMsg::new().as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        if input.len() < IfInfoMsg::SIZE {
            return Err(cut());
        }

        let header_bytes = bytes(input, IfInfoMsg::SIZE)?;
        let header = *IfInfoMsg::from_bytes(header_bytes).map_err(|_| cut())?;

        let mut msg = LinkMessage {
            header,
            ..Default::default()
        };

        while let Some((attr_type, attr_data)) = next_attr(input)? {
            match attr_type {
                t if t == IflaAttr::Ifname as u16 => {
                    msg.name = Some(parse_string_from_bytes(attr_data));
                }
                t if t == IflaAttr::Linkinfo as u16 => {
                    msg.kind = parse_link_kind(attr_data)?;
                }
                _ => {}
            }
        }

        Ok(msg)
    }
}

/// Pull IFLA_INFO_KIND out of a nested IFLA_LINKINFO.
fn parse_link_kind(data: &[u8]) -> PResult<Option<String>> {
    let mut input = data;
    while let Some((attr_type, payload)) = next_attr(&mut input)? {
        if attr_type == IflaInfo::Kind as u16 {
            return Ok(Some(parse_string_from_bytes(payload)));
        }
    }
    Ok(None)
}
