//! Message builder for constructing netlink messages.

use zerocopy::{Immutable, IntoBytes};

use super::attr::{NLA_F_NESTED, NlAttr, nla_align};
use super::message::{NLMSG_HDRLEN, NlMsgHdr, nlmsg_align};

/// Marks an open nested attribute; pass it back to [`MessageBuilder::nest_end`].
#[derive(Debug, Clone, Copy)]
pub struct NestToken {
    /// Offset of the nest's attribute header within the body.
    offset: usize,
}

/// Builds one netlink message: a header plus an aligned body.
///
/// Sequence number and port ID are filled in by the connection right
/// before sending; the length is fixed up by [`finish`](Self::finish).
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    header: NlMsgHdr,
    body: Vec<u8>,
}

impl MessageBuilder {
    pub fn new(msg_type: u16, flags: u16) -> Self {
        Self {
            header: NlMsgHdr::new(msg_type, flags),
            body: Vec::new(),
        }
    }

    pub fn flags(&self) -> u16 {
        self.header.nlmsg_flags
    }

    pub fn set_seq(&mut self, seq: u32) {
        self.header.nlmsg_seq = seq;
    }

    pub fn set_pid(&mut self, pid: u32) {
        self.header.nlmsg_pid = pid;
    }

    /// Append raw bytes, padded to NLMSG_ALIGNTO.
    pub fn append_bytes(&mut self, data: &[u8]) {
        self.body.extend_from_slice(data);
        self.body.resize(nlmsg_align(self.body.len()), 0);
    }

    /// Append a fixed-size family header (ifinfomsg, nfgenmsg, ...).
    pub fn append<T: IntoBytes + Immutable>(&mut self, data: &T) {
        self.append_bytes(data.as_bytes());
    }

    pub fn append_attr(&mut self, attr_type: u16, data: &[u8]) {
        self.body
            .extend_from_slice(NlAttr::new(attr_type, data.len()).as_bytes());
        self.body.extend_from_slice(data);
        self.body.resize(nla_align(self.body.len()), 0);
    }

    /// Append a u32 attribute in network byte order.
    pub fn append_attr_u32_be(&mut self, attr_type: u16, value: u32) {
        self.append_attr(attr_type, &value.to_be_bytes());
    }

    /// Append a u64 attribute in network byte order.
    pub fn append_attr_u64_be(&mut self, attr_type: u16, value: u64) {
        self.append_attr(attr_type, &value.to_be_bytes());
    }

    /// Append a NUL-terminated string attribute.
    pub fn append_attr_str(&mut self, attr_type: u16, value: &str) {
        let mut data = Vec::with_capacity(value.len() + 1);
        data.extend_from_slice(value.as_bytes());
        data.push(0);
        self.append_attr(attr_type, &data);
    }

    pub fn nest_start(&mut self, attr_type: u16) -> NestToken {
        let offset = self.body.len();
        self.body
            .extend_from_slice(NlAttr::new(attr_type | NLA_F_NESTED, 0).as_bytes());
        NestToken { offset }
    }

    pub fn nest_end(&mut self, token: NestToken) {
        let len = (self.body.len() - token.offset) as u16;
        self.body[token.offset..token.offset + 2].copy_from_slice(&len.to_ne_bytes());
        self.body.resize(nla_align(self.body.len()), 0);
    }

    /// Serialize the message with its final length.
    pub fn finish(mut self) -> Vec<u8> {
        self.header.nlmsg_len = (NLMSG_HDRLEN + self.body.len()) as u32;

        let mut msg = Vec::with_capacity(NLMSG_HDRLEN + self.body.len());
        msg.extend_from_slice(self.header.as_bytes());
        msg.resize(NLMSG_HDRLEN, 0);
        msg.extend_from_slice(&self.body);
        msg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netlink::attr::{AttrIter, NLA_HDRLEN};
    use crate::netlink::message::{NLM_F_ACK, NLM_F_REQUEST};

    #[test]
    fn test_header_only_message() {
        let msg = MessageBuilder::new(16, NLM_F_REQUEST).finish();
        assert_eq!(msg.len(), NLMSG_HDRLEN);

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_len as usize, NLMSG_HDRLEN);
        assert_eq!(header.nlmsg_type, 16);
        assert_eq!(header.nlmsg_flags, NLM_F_REQUEST);
    }

    #[test]
    fn test_flags_and_seq() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST | NLM_F_ACK);
        assert_eq!(builder.flags(), NLM_F_REQUEST | NLM_F_ACK);
        builder.set_seq(42);
        builder.set_pid(7);
        let msg = builder.finish();

        let header = NlMsgHdr::from_bytes(&msg).unwrap();
        assert_eq!(header.nlmsg_seq, 42);
        assert_eq!(header.nlmsg_pid, 7);
    }

    #[test]
    fn test_string_attribute_is_padded() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        builder.append_attr_str(3, "br0");
        builder.append_attr_u32_be(4, 100);
        let msg = builder.finish();

        // "br0\0" fits exactly; the u32 follows directly.
        assert_eq!(msg.len(), NLMSG_HDRLEN + (NLA_HDRLEN + 4) * 2);
        let attrs: Vec<_> = AttrIter::new(&msg[NLMSG_HDRLEN..]).collect();
        assert_eq!(attrs[0], (3, &b"br0\0"[..]));
        assert_eq!(attrs[1], (4, &[0, 0, 0, 100][..]));
    }

    #[test]
    fn test_nested_attribute() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        let nest = builder.nest_start(1);
        builder.append_attr_u32_be(2, 100);
        builder.nest_end(nest);
        let msg = builder.finish();

        let payload = &msg[NLMSG_HDRLEN..];
        let header = NlAttr::from_bytes(payload).unwrap();
        assert_eq!(header.nla_type, 1 | NLA_F_NESTED);
        assert_eq!(header.nla_len as usize, NLA_HDRLEN * 2 + 4);

        let (kind, inner) = AttrIter::new(payload).next().unwrap();
        assert_eq!(kind, 1);
        assert_eq!(AttrIter::new(inner).next(), Some((2, &[0, 0, 0, 100][..])));
    }

    #[test]
    fn test_odd_sized_body_is_aligned() {
        let mut builder = MessageBuilder::new(16, NLM_F_REQUEST);
        builder.append_attr(5, &[1, 2, 3]);
        let msg = builder.finish();

        assert_eq!(msg.len() % 4, 0);
        assert_eq!(
            NlMsgHdr::from_bytes(&msg).unwrap().nlmsg_len as usize,
            msg.len()
        );
    }
}
