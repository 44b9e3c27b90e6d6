//! Async netlink plumbing for Linux.
//!
//! Two protocols are spoken: RTNetlink for links and addresses, and
//! nfnetlink for nf_tables.
//!
//! ```ignore
//! use netshed::netlink::link::BridgeLink;
//! use netshed::netlink::{Connection, Route};
//!
//! let conn = Connection::<Route>::new()?;
//! conn.add_link(BridgeLink::new("br0")).await?;
//! let ifindex = conn.link_index("br0").await?;
//! conn.set_link_up_by_index(ifindex).await?;
//!
//! for link in conn.get_links().await? {
//!     println!("{}: {}", link.ifindex(), link.name().unwrap_or("?"));
//! }
//! ```

pub mod addr;
pub mod attr;
mod builder;
pub mod connection;
mod error;
pub mod link;
pub mod message;
pub mod messages;
pub mod nftables;
pub mod parse;
pub mod protocol;
mod socket;
pub mod types;

pub use builder::{MessageBuilder, NestToken};
pub use connection::Connection;
pub use error::{Error, Result};
pub use protocol::{Netfilter, ProtocolState, Route};
pub use socket::{NetlinkSocket, Protocol};
