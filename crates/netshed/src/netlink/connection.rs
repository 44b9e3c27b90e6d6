//! High-level netlink connection with request/response handling.

use std::marker::PhantomData;
use std::path::Path;

use super::builder::MessageBuilder;
use super::error::Result;
use super::message::{
    MessageIter, NLM_F_ACK, NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN, NlMsgError,
};
use super::parse::FromNetlink;
use super::protocol::ProtocolState;
use super::socket::NetlinkSocket;

/// Netlink connection typed by protocol.
///
/// Route operations (links, addresses) live on `Connection<Route>`; nf_tables
/// operations live on `Connection<Netfilter>`.
pub struct Connection<P: ProtocolState> {
    socket: NetlinkSocket,
    _protocol: PhantomData<P>,
}

impl<P: ProtocolState> Connection<P> {
    /// Open a connection in the current network namespace.
    pub fn new() -> Result<Self> {
        let socket = NetlinkSocket::new(P::PROTOCOL)?;
        Ok(Self::from_socket(socket))
    }

    /// Open a connection inside the network namespace at `ns_path`.
    ///
    /// ```ignore
    /// use netshed::netlink::{Connection, Route};
    ///
    /// // Namespace created via `ip netns add lab`
    /// let conn = Connection::<Route>::new_in_namespace_path("/var/run/netns/lab")?;
    /// let links = conn.get_links().await?;
    /// ```
    pub fn new_in_namespace_path<T: AsRef<Path>>(ns_path: T) -> Result<Self> {
        let socket = NetlinkSocket::new_in_namespace_path(P::PROTOCOL, ns_path)?;
        Ok(Self::from_socket(socket))
    }

    fn from_socket(socket: NetlinkSocket) -> Self {
        Self {
            socket,
            _protocol: PhantomData,
        }
    }

    /// Get the underlying socket.
    pub fn socket(&self) -> &NetlinkSocket {
        &self.socket
    }

    /// Send a request that expects an ACK only (no data response).
    pub async fn request_ack(&self, mut builder: MessageBuilder) -> Result<()> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        self.socket.send(&msg).await?;

        loop {
            let response = self.socket.recv_msg().await?;
            for result in MessageIter::new(&response) {
                let (header, payload) = result?;

                if header.nlmsg_seq != seq {
                    continue;
                }

                if header.is_error() {
                    return NlMsgError::from_bytes(payload)?.check();
                }
            }
        }
    }

    /// Send a dump request and collect all responses.
    ///
    /// Each entry is a full message (header and payload).
    pub async fn dump(&self, mut builder: MessageBuilder) -> Result<Vec<Vec<u8>>> {
        let seq = self.socket.next_seq();
        builder.set_seq(seq);
        builder.set_pid(self.socket.pid());

        let msg = builder.finish();
        self.socket.send(&msg).await?;

        let mut responses = Vec::new();

        loop {
            let data = self.socket.recv_msg().await?;

            for result in MessageIter::new(&data) {
                let (header, payload) = result?;

                if header.nlmsg_seq != seq {
                    continue;
                }

                if header.is_error() {
                    NlMsgError::from_bytes(payload)?.check()?;
                    continue;
                }

                if header.is_done() {
                    return Ok(responses);
                }

                let mut full = Vec::with_capacity(NLMSG_HDRLEN + payload.len());
                full.extend_from_slice(header.as_bytes());
                full.extend_from_slice(payload);
                responses.push(full);
            }
        }
    }

    /// Send a dump request and parse all responses into typed messages.
    ///
    /// Messages that fail to parse are skipped.
    pub async fn dump_typed<T: FromNetlink>(&self, msg_type: u16) -> Result<Vec<T>> {
        let mut builder = dump_request(msg_type);

        let mut header_buf = Vec::new();
        T::write_dump_header(&mut header_buf);
        builder.append_bytes(&header_buf);

        let responses = self.dump(builder).await?;

        let mut parsed = Vec::with_capacity(responses.len());
        for response in responses {
            match T::from_bytes(&response[NLMSG_HDRLEN..]) {
                Ok(msg) => parsed.push(msg),
                Err(e) => tracing::trace!(error = %e, "skipping unparsable dump entry"),
            }
        }

        Ok(parsed)
    }
}

/// Helper to build a dump request.
pub fn dump_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_DUMP)
}

/// Helper to build a request expecting ACK.
pub fn ack_request(msg_type: u16) -> MessageBuilder {
    MessageBuilder::new(msg_type, NLM_F_REQUEST | NLM_F_ACK)
}
