//! Strongly-typed netlink message structures.
//!
//! ```ignore
//! use netshed::netlink::messages::LinkMessage;
//! use netshed::netlink::parse::FromNetlink;
//!
//! let msg = LinkMessage::from_bytes(&payload)?;
//! println!("{}: {:?}", msg.ifindex(), msg.name());
//! ```

mod address;
mod link;

pub use address::*;
pub use link::*;
