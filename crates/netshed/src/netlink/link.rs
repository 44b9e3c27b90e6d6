//! Link creation and management.
//!
//! Each supported link kind has a config type implementing [`LinkConfig`]:
//!
//! ```ignore
//! use netshed::netlink::link::{BridgeLink, DummyLink};
//! use netshed::netlink::{Connection, Route};
//!
//! let conn = Connection::<Route>::new()?;
//! conn.add_link(BridgeLink::new("br0")).await?;
//! conn.add_link(DummyLink::new("dummy0")).await?;
//! ```

use super::builder::MessageBuilder;
use super::connection::{Connection, ack_request};
use super::error::{Error, Result};
use super::message::{NLM_F_ACK, NLM_F_CREATE, NLM_F_EXCL, NLM_F_REQUEST, NlMsgType};
use super::messages::LinkMessage;
use super::protocol::Route;
use super::types::link::{IfInfoMsg, IflaAttr, IflaInfo, iff};

/// Maximum interface name length, excluding the trailing NUL.
pub const IFNAMSIZ: usize = 15;

/// A link type that can be created with [`Connection::add_link`].
pub trait LinkConfig {
    /// Interface name.
    fn name(&self) -> &str;

    /// Kind string for IFLA_INFO_KIND (e.g. "bridge", "dummy").
    fn kind(&self) -> &str;

    /// Build the RTM_NEWLINK request.
    fn build(&self) -> Result<MessageBuilder>;
}

/// Configuration for a bridge interface.
#[derive(Debug, Clone)]
pub struct BridgeLink {
    name: String,
}

impl BridgeLink {
    /// Create a new bridge configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LinkConfig for BridgeLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "bridge"
    }

    fn build(&self) -> Result<MessageBuilder> {
        build_simple_link(&self.name, self.kind())
    }
}

/// Configuration for a dummy interface.
///
/// Dummy interfaces drop all traffic; they serve as anchors for addresses.
#[derive(Debug, Clone)]
pub struct DummyLink {
    name: String,
}

impl DummyLink {
    /// Create a new dummy configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl LinkConfig for DummyLink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "dummy"
    }

    fn build(&self) -> Result<MessageBuilder> {
        build_simple_link(&self.name, self.kind())
    }
}

fn validate_ifname(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > IFNAMSIZ {
        return Err(Error::InvalidAttribute(format!(
            "interface name '{}' must be 1-{} bytes",
            name, IFNAMSIZ
        )));
    }
    if name.contains(['/', ' ', '\0']) {
        return Err(Error::InvalidAttribute(format!(
            "interface name '{}' contains an invalid character",
            name
        )));
    }
    Ok(())
}

/// Start an exclusive RTM_NEWLINK request for `name`.
fn create_link_message(name: &str) -> MessageBuilder {
    let mut builder = MessageBuilder::new(
        NlMsgType::RTM_NEWLINK,
        NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL,
    );

    builder.append(&IfInfoMsg::new());
    builder.append_attr_str(IflaAttr::Ifname as u16, name);

    builder
}

fn build_simple_link(name: &str, kind: &str) -> Result<MessageBuilder> {
    validate_ifname(name)?;

    let mut builder = create_link_message(name);

    // IFLA_LINKINFO -> IFLA_INFO_KIND
    let linkinfo = builder.nest_start(IflaAttr::Linkinfo as u16);
    builder.append_attr_str(IflaInfo::Kind as u16, kind);
    builder.nest_end(linkinfo);

    Ok(builder)
}

impl Connection<Route> {
    /// Create a new network interface.
    ///
    /// Fails with `EEXIST` if an interface with that name already exists.
    pub async fn add_link<L: LinkConfig>(&self, config: L) -> Result<()> {
        let builder = config.build()?;
        self.request_ack(builder)
            .await
            .map_err(|e| e.with_context(format!("add {} link {}", config.kind(), config.name())))
    }

    /// List all network interfaces.
    pub async fn get_links(&self) -> Result<Vec<LinkMessage>> {
        self.dump_typed(NlMsgType::RTM_GETLINK).await
    }

    /// Look up an interface by name.
    ///
    /// Returns `None` if the interface doesn't exist.
    pub async fn get_link_by_name(&self, name: &str) -> Result<Option<LinkMessage>> {
        let links = self.get_links().await?;
        Ok(links.into_iter().find(|l| l.name() == Some(name)))
    }

    /// Resolve an interface name to its index.
    ///
    /// Resolution goes through this connection's namespace, not the caller's.
    pub async fn link_index(&self, name: &str) -> Result<u32> {
        self.get_link_by_name(name)
            .await?
            .map(|link| link.ifindex())
            .ok_or_else(|| Error::InterfaceNotFound {
                name: name.to_string(),
            })
    }

    /// Bring an interface up by index.
    pub async fn set_link_up_by_index(&self, ifindex: u32) -> Result<()> {
        let mut ifinfo = IfInfoMsg::new().with_index(ifindex as i32);
        ifinfo.ifi_flags = iff::UP;
        ifinfo.ifi_change = iff::UP;

        let mut builder = ack_request(NlMsgType::RTM_SETLINK);
        builder.append(&ifinfo);

        self.request_ack(builder).await
    }

    /// Delete an interface by index.
    pub async fn del_link_by_index(&self, ifindex: u32) -> Result<()> {
        let ifinfo = IfInfoMsg::new().with_index(ifindex as i32);

        let mut builder = ack_request(NlMsgType::RTM_DELLINK);
        builder.append(&ifinfo);

        self.request_ack(builder).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::AttrIter;
    use crate::netlink::message::{NLMSG_HDRLEN, NlMsgHdr};

    fn attrs_of(msg: &[u8]) -> Vec<(u16, Vec<u8>)> {
        AttrIter::new(&msg[NLMSG_HDRLEN + IfInfoMsg::SIZE..])
            .map(|(t, d)| (t, d.to_vec()))
            .collect()
    }

    #[test]
    fn test_bridge_request_layout() {
        let msg = BridgeLink::new("br0").build().unwrap().finish();
        let header = NlMsgHdr::from_bytes(&msg).unwrap();

        assert_eq!(header.nlmsg_type, NlMsgType::RTM_NEWLINK);
        assert_eq!(
            header.nlmsg_flags,
            NLM_F_REQUEST | NLM_F_ACK | NLM_F_CREATE | NLM_F_EXCL
        );
        assert_eq!(header.nlmsg_len as usize, msg.len());

        let attrs = attrs_of(&msg);
        assert_eq!(attrs[0], (IflaAttr::Ifname as u16, b"br0\0".to_vec()));

        let (kind, info) = &attrs[1];
        assert_eq!(*kind, IflaAttr::Linkinfo as u16);
        let nested: Vec<_> = AttrIter::new(info).collect();
        assert_eq!(nested, vec![(IflaInfo::Kind as u16, &b"bridge\0"[..])]);
    }

    #[test]
    fn test_dummy_request_kind() {
        let msg = DummyLink::new("dum0").build().unwrap().finish();
        let attrs = attrs_of(&msg);

        assert_eq!(attrs.len(), 2);
        let nested: Vec<_> = AttrIter::new(&attrs[1].1).collect();
        assert_eq!(nested, vec![(IflaInfo::Kind as u16, &b"dummy\0"[..])]);
    }

    #[test]
    fn test_rejects_bad_names() {
        assert!(BridgeLink::new("").build().is_err());
        assert!(BridgeLink::new("a-very-long-bridge-name").build().is_err());
        assert!(DummyLink::new("bad/name").build().is_err());
        assert!(DummyLink::new("abcdefghijklmno").build().is_ok());
    }
}
