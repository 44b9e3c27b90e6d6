//! nf_tables implementation for `Connection<Netfilter>`.
//!
//! Writes go through a [`Transaction`], which is sent to the kernel as one
//! nfnetlink batch and applied atomically:
//!
//! ```ignore
//! use netshed::netlink::nftables::{Chain, ChainType, Family, Hook, Table, Transaction};
//! use netshed::netlink::{Connection, Netfilter};
//!
//! let conn = Connection::<Netfilter>::new()?;
//!
//! let mut tx = Transaction::new(Family::Ipv4);
//! tx.add_table(&Table::new("nat"));
//! tx.add_chain(
//!     &Chain::new("nat", "postrouting")
//!         .hook(Hook::Postrouting, 100)
//!         .chain_type(ChainType::Nat),
//! );
//! conn.commit(tx).await?;
//!
//! let rules = conn.get_rules(Family::Ipv4, "nat", "postrouting").await?;
//! ```

mod expr;

pub use expr::*;

use zerocopy::{Immutable, IntoBytes};

use super::attr::{AttrIter, get};
use super::builder::MessageBuilder;
use super::connection::Connection;
use super::error::{Error, Result};
use super::message::{
    MessageIter, NLM_F_ACK, NLM_F_APPEND, NLM_F_CREATE, NLM_F_DUMP, NLM_F_REQUEST, NLMSG_HDRLEN,
    NlMsgError, NlMsgHdr,
};
use super::parse::{FromNetlink, PResult, bytes, cut};
use super::protocol::Netfilter;

// Netfilter subsystem ID
const NFNL_SUBSYS_NFTABLES: u16 = 10;

// Batch delimiters
const NFNL_MSG_BATCH_BEGIN: u16 = 0x10;
const NFNL_MSG_BATCH_END: u16 = 0x11;

// nf_tables message types
const NFT_MSG_NEWTABLE: u16 = 0;
const NFT_MSG_NEWCHAIN: u16 = 3;
const NFT_MSG_NEWRULE: u16 = 6;
const NFT_MSG_GETRULE: u16 = 7;
const NFT_MSG_DELRULE: u16 = 8;

// NFTA_TABLE_*
const NFTA_TABLE_NAME: u16 = 1;

// NFTA_CHAIN_*
const NFTA_CHAIN_TABLE: u16 = 1;
const NFTA_CHAIN_NAME: u16 = 3;
const NFTA_CHAIN_HOOK: u16 = 4;
const NFTA_CHAIN_TYPE: u16 = 7;

// NFTA_HOOK_*
const NFTA_HOOK_HOOKNUM: u16 = 1;
const NFTA_HOOK_PRIORITY: u16 = 2;

// NFTA_RULE_*
const NFTA_RULE_TABLE: u16 = 1;
const NFTA_RULE_CHAIN: u16 = 2;
const NFTA_RULE_HANDLE: u16 = 3;
const NFTA_RULE_EXPRESSIONS: u16 = 4;

/// Receive queue reserved per reply to a batch. Each ACK is queued as its
/// own skb, whose accounted size is several times the message itself.
const REPLY_RECV_BUDGET: usize = 1024;

const fn nft_msg_type(msg: u16) -> u16 {
    (NFNL_SUBSYS_NFTABLES << 8) | msg
}

/// nfgenmsg header (4 bytes).
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, IntoBytes, Immutable)]
struct NfGenMsg {
    family: u8,
    version: u8,
    /// Big endian.
    res_id: u16,
}

impl NfGenMsg {
    const SIZE: usize = 4;

    fn new(family: u8) -> Self {
        Self {
            family,
            version: 0,
            res_id: 0,
        }
    }

    fn batch() -> Self {
        Self {
            family: 0,
            version: 0,
            res_id: NFNL_SUBSYS_NFTABLES.to_be(),
        }
    }
}

/// nf_tables address family (NFPROTO_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Family {
    Ipv4,
}

impl Family {
    fn number(self) -> u8 {
        match self {
            Family::Ipv4 => 2,
        }
    }
}

/// Netfilter hook a base chain attaches to (NF_INET_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Postrouting,
}

impl Hook {
    fn number(self) -> u32 {
        match self {
            Hook::Postrouting => 4,
        }
    }
}

/// Base chain type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainType {
    Nat,
}

impl ChainType {
    fn as_str(self) -> &'static str {
        match self {
            ChainType::Nat => "nat",
        }
    }
}

/// An nf_tables table.
#[derive(Debug, Clone)]
pub struct Table {
    name: String,
}

impl Table {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An nf_tables chain; a base chain when a hook is set.
#[derive(Debug, Clone)]
pub struct Chain {
    table: String,
    name: String,
    hook: Option<(Hook, i32)>,
    chain_type: Option<ChainType>,
}

impl Chain {
    pub fn new(table: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            name: name.into(),
            hook: None,
            chain_type: None,
        }
    }

    /// Attach to `hook` at `priority`.
    pub fn hook(mut self, hook: Hook, priority: i32) -> Self {
        self.hook = Some((hook, priority));
        self
    }

    pub fn chain_type(mut self, chain_type: ChainType) -> Self {
        self.chain_type = Some(chain_type);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// An nf_tables rule.
///
/// Rules read back from the kernel carry a handle; new rules do not.
#[derive(Debug, Clone, Default)]
pub struct Rule {
    table: String,
    chain: String,
    handle: Option<u64>,
    exprs: Vec<Expr>,
}

impl Rule {
    pub fn new(table: impl Into<String>, chain: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            chain: chain.into(),
            ..Default::default()
        }
    }

    /// Append an expression.
    pub fn expr(mut self, expr: Expr) -> Self {
        self.exprs.push(expr);
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn chain(&self) -> &str {
        &self.chain
    }

    /// Kernel-assigned handle.
    pub fn handle(&self) -> Option<u64> {
        self.handle
    }

    pub fn exprs(&self) -> &[Expr] {
        &self.exprs
    }
}

impl FromNetlink for Rule {
    fn write_dump_header(buf: &mut Vec<u8>) {
        buf.extend_from_slice(NfGenMsg::new(Family::Ipv4.number()).as_bytes());
    }

    fn parse(input: &mut &[u8]) -> PResult<Self> {
        if input.len() < NfGenMsg::SIZE {
            return Err(cut());
        }
        bytes(input, NfGenMsg::SIZE)?;

        let mut rule = Rule::default();
        for (kind, payload) in AttrIter::new(input) {
            match kind {
                NFTA_RULE_TABLE => rule.table = get::string(payload).map_err(|_| cut())?.into(),
                NFTA_RULE_CHAIN => rule.chain = get::string(payload).map_err(|_| cut())?.into(),
                NFTA_RULE_HANDLE => rule.handle = get::u64_be(payload).ok(),
                NFTA_RULE_EXPRESSIONS => rule.exprs = expr::decode_list(payload),
                _ => {}
            }
        }
        *input = &[];

        Ok(rule)
    }
}

/// A set of nf_tables changes committed as one atomic batch.
#[derive(Debug)]
pub struct Transaction {
    family: Family,
    messages: Vec<(String, MessageBuilder)>,
}

impl Transaction {
    /// Start an empty transaction for `family`.
    pub fn new(family: Family) -> Self {
        Self {
            family,
            messages: Vec::new(),
        }
    }

    /// Number of queued changes.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn message(&self, msg: u16, flags: u16) -> MessageBuilder {
        let mut builder = MessageBuilder::new(nft_msg_type(msg), flags);
        builder.append(&NfGenMsg::new(self.family.number()));
        builder
    }

    /// Create the table, or leave an existing one as is.
    pub fn add_table(&mut self, table: &Table) -> &mut Self {
        let mut builder = self.message(NFT_MSG_NEWTABLE, NLM_F_REQUEST | NLM_F_CREATE | NLM_F_ACK);
        builder.append_attr_str(NFTA_TABLE_NAME, &table.name);

        self.messages
            .push((format!("add table {}", table.name), builder));
        self
    }

    /// Create the chain, or leave an existing one as is.
    pub fn add_chain(&mut self, chain: &Chain) -> &mut Self {
        let mut builder = self.message(NFT_MSG_NEWCHAIN, NLM_F_REQUEST | NLM_F_CREATE | NLM_F_ACK);
        builder.append_attr_str(NFTA_CHAIN_TABLE, &chain.table);
        builder.append_attr_str(NFTA_CHAIN_NAME, &chain.name);

        if let Some((hook, priority)) = chain.hook {
            let nest = builder.nest_start(NFTA_CHAIN_HOOK);
            builder.append_attr_u32_be(NFTA_HOOK_HOOKNUM, hook.number());
            builder.append_attr_u32_be(NFTA_HOOK_PRIORITY, priority as u32);
            builder.nest_end(nest);
        }
        if let Some(chain_type) = chain.chain_type {
            builder.append_attr_str(NFTA_CHAIN_TYPE, chain_type.as_str());
        }

        self.messages.push((
            format!("add chain {} {}", chain.table, chain.name),
            builder,
        ));
        self
    }

    /// Append a rule to the end of its chain.
    pub fn add_rule(&mut self, rule: &Rule) -> &mut Self {
        let mut builder = self.message(
            NFT_MSG_NEWRULE,
            NLM_F_REQUEST | NLM_F_CREATE | NLM_F_APPEND | NLM_F_ACK,
        );
        builder.append_attr_str(NFTA_RULE_TABLE, &rule.table);
        builder.append_attr_str(NFTA_RULE_CHAIN, &rule.chain);

        let list = builder.nest_start(NFTA_RULE_EXPRESSIONS);
        for expr in &rule.exprs {
            expr.encode(&mut builder);
        }
        builder.nest_end(list);

        self.messages.push((
            format!("add rule to {} {}", rule.table, rule.chain),
            builder,
        ));
        self
    }

    /// Delete a rule by handle.
    pub fn del_rule(&mut self, table: &str, chain: &str, handle: u64) -> &mut Self {
        let mut builder = self.message(NFT_MSG_DELRULE, NLM_F_REQUEST | NLM_F_ACK);
        builder.append_attr_str(NFTA_RULE_TABLE, table);
        builder.append_attr_str(NFTA_RULE_CHAIN, chain);
        builder.append_attr_u64_be(NFTA_RULE_HANDLE, handle);

        self.messages.push((
            format!("delete rule {} from {} {}", handle, table, chain),
            builder,
        ));
        self
    }

    /// Serialize the batch, numbering messages from `first_seq`.
    fn encode(self, first_seq: u32, pid: u32) -> Batch {
        let mut buf = Vec::new();
        let mut seq = first_seq;

        let mut push = |buf: &mut Vec<u8>, mut builder: MessageBuilder| {
            builder.set_seq(seq);
            builder.set_pid(pid);
            buf.extend_from_slice(&builder.finish());
            seq = seq.wrapping_add(1);
        };

        let mut begin = MessageBuilder::new(NFNL_MSG_BATCH_BEGIN, NLM_F_REQUEST);
        begin.append(&NfGenMsg::batch());
        push(&mut buf, begin);

        let mut ops = Vec::with_capacity(self.messages.len());
        for (label, builder) in self.messages {
            let acked = builder.flags() & NLM_F_ACK != 0;
            ops.push((label, acked));
            push(&mut buf, builder);
        }

        let mut end = MessageBuilder::new(NFNL_MSG_BATCH_END, NLM_F_REQUEST);
        end.append(&NfGenMsg::batch());
        push(&mut buf, end);

        Batch {
            buf,
            begin_seq: first_seq,
            end_seq: first_seq.wrapping_add(ops.len() as u32 + 1),
            ops,
        }
    }
}

/// An encoded transaction, ready to send.
struct Batch {
    buf: Vec<u8>,
    begin_seq: u32,
    end_seq: u32,
    /// Label and ACK flag for each message between begin and end.
    ops: Vec<(String, bool)>,
}

impl Batch {
    fn expected_acks(&self) -> usize {
        self.ops.iter().filter(|(_, acked)| *acked).count()
    }

    /// Receive queue needed to hold every reply at once, delimiters included.
    fn recv_budget(&self) -> usize {
        (self.expected_acks() + 2).saturating_mul(REPLY_RECV_BUDGET)
    }

    /// Label of the message with sequence number `seq`, if it belongs here.
    fn label(&self, seq: u32) -> Option<&str> {
        let index = seq.wrapping_sub(self.begin_seq).checked_sub(1)? as usize;
        self.ops.get(index).map(|(label, _)| label.as_str())
    }
}

impl Connection<Netfilter> {
    /// Apply a transaction atomically.
    ///
    /// Returns the first error the kernel reported; in that case nothing
    /// in the batch took effect.
    pub async fn commit(&self, tx: Transaction) -> Result<()> {
        if tx.is_empty() {
            return Ok(());
        }

        let count = tx.len() as u32 + 2;
        let first_seq = self.socket().next_seq();
        for _ in 1..count {
            self.socket().next_seq();
        }

        let batch = tx.encode(first_seq, self.socket().pid());
        self.socket().reserve_recv_buffer(batch.recv_budget())?;
        self.socket().send(&batch.buf).await?;

        let mut remaining = batch.expected_acks();
        let mut first_error = None;

        while remaining > 0 {
            let data = self.socket().recv_msg().await?;
            for result in MessageIter::new(&data) {
                let (header, payload) = result?;
                if !header.is_error() {
                    continue;
                }

                let seq = header.nlmsg_seq;
                if seq == batch.begin_seq || seq == batch.end_seq {
                    NlMsgError::from_bytes(payload)?
                        .check()
                        .map_err(|e| e.with_context("nftables batch"))?;
                    continue;
                }

                let Some(label) = batch.label(seq) else {
                    continue;
                };

                remaining = remaining.saturating_sub(1);
                if let Err(e) = NlMsgError::from_bytes(payload)?.check() {
                    tracing::debug!(operation = label, error = %e, "nftables batch message rejected");
                    if first_error.is_none() {
                        first_error = Some(e.with_context(label));
                    }
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// List the rules of one chain.
    pub async fn get_rules(&self, family: Family, table: &str, chain: &str) -> Result<Vec<Rule>> {
        let mut builder =
            MessageBuilder::new(nft_msg_type(NFT_MSG_GETRULE), NLM_F_REQUEST | NLM_F_DUMP);
        builder.append(&NfGenMsg::new(family.number()));
        builder.append_attr_str(NFTA_RULE_TABLE, table);
        builder.append_attr_str(NFTA_RULE_CHAIN, chain);

        let responses = self
            .dump(builder)
            .await
            .map_err(|e| e.with_context(format!("list rules of {} {}", table, chain)))?;

        let mut rules = Vec::with_capacity(responses.len());
        for response in responses {
            if NlMsgHdr::from_bytes(&response)?.nlmsg_type != nft_msg_type(NFT_MSG_NEWRULE) {
                continue;
            }
            match Rule::from_bytes(&response[NLMSG_HDRLEN..]) {
                Ok(rule) if rule.chain == chain && rule.table == table => rules.push(rule),
                Ok(_) => {}
                Err(e) => {
                    return Err(Error::InvalidMessage(format!("malformed rule: {}", e)));
                }
            }
        }

        Ok(rules)
    }
}
