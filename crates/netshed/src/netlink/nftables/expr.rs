//! nf_tables rule expressions.

use crate::netlink::attr::{AttrIter, get};
use crate::netlink::builder::MessageBuilder;

// NFTA_LIST_*
const NFTA_LIST_ELEM: u16 = 1;

// NFTA_EXPR_*
const NFTA_EXPR_NAME: u16 = 1;
const NFTA_EXPR_DATA: u16 = 2;

// NFTA_DATA_*
const NFTA_DATA_VALUE: u16 = 1;

// NFTA_PAYLOAD_*
const NFTA_PAYLOAD_DREG: u16 = 1;
const NFTA_PAYLOAD_BASE: u16 = 2;
const NFTA_PAYLOAD_OFFSET: u16 = 3;
const NFTA_PAYLOAD_LEN: u16 = 4;

// NFTA_BITWISE_*
const NFTA_BITWISE_SREG: u16 = 1;
const NFTA_BITWISE_DREG: u16 = 2;
const NFTA_BITWISE_LEN: u16 = 3;
const NFTA_BITWISE_MASK: u16 = 4;
const NFTA_BITWISE_XOR: u16 = 5;

// NFTA_CMP_*
const NFTA_CMP_SREG: u16 = 1;
const NFTA_CMP_OP: u16 = 2;
const NFTA_CMP_DATA: u16 = 3;

// NFTA_META_*
const NFTA_META_DREG: u16 = 1;
const NFTA_META_KEY: u16 = 2;

/// First 128-bit data register (NFT_REG_1).
pub const NFT_REG_1: u32 = 1;

/// Largest data blob a `cmp` expression accepts.
pub const NFT_DATA_VALUE_MAXLEN: usize = 16;

/// Header a payload expression loads from (NFT_PAYLOAD_*_HEADER).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadBase {
    Network,
    Other(u32),
}

impl PayloadBase {
    fn from_u32(val: u32) -> Self {
        match val {
            1 => Self::Network,
            other => Self::Other(other),
        }
    }

    fn number(self) -> u32 {
        match self {
            Self::Network => 1,
            Self::Other(n) => n,
        }
    }
}

/// Comparison operator (NFT_CMP_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Eq,
    Other(u32),
}

impl CmpOp {
    fn from_u32(val: u32) -> Self {
        match val {
            0 => Self::Eq,
            other => Self::Other(other),
        }
    }

    fn number(self) -> u32 {
        match self {
            Self::Eq => 0,
            Self::Other(n) => n,
        }
    }
}

/// Packet metadata key (NFT_META_*).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKey {
    Iifname,
    Other(u32),
}

impl MetaKey {
    fn from_u32(val: u32) -> Self {
        match val {
            6 => Self::Iifname,
            other => Self::Other(other),
        }
    }

    fn number(self) -> u32 {
        match self {
            Self::Iifname => 6,
            Self::Other(n) => n,
        }
    }
}

/// A single rule expression.
///
/// Only the expressions needed for source-NAT rules are modelled; anything
/// else read back from the kernel decodes as [`Expr::Other`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// Load `len` bytes at `offset` of `base` into `dreg`.
    Payload {
        dreg: u32,
        base: PayloadBase,
        offset: u32,
        len: u32,
    },
    /// `dreg = (sreg & mask) ^ xor`.
    Bitwise {
        sreg: u32,
        dreg: u32,
        mask: Vec<u8>,
        xor: Vec<u8>,
    },
    /// Compare `sreg` with `data`; break on mismatch.
    Cmp { sreg: u32, op: CmpOp, data: Vec<u8> },
    /// Load packet metadata into `dreg`.
    Meta { dreg: u32, key: MetaKey },
    /// Source NAT to the outgoing interface address. Terminal.
    Masquerade,
    /// Any other expression, by name.
    Other(String),
}

impl Expr {
    /// Kernel expression name.
    pub fn name(&self) -> &str {
        match self {
            Expr::Payload { .. } => "payload",
            Expr::Bitwise { .. } => "bitwise",
            Expr::Cmp { .. } => "cmp",
            Expr::Meta { .. } => "meta",
            Expr::Masquerade => "masq",
            Expr::Other(name) => name,
        }
    }

    /// Append this expression as one NFTA_LIST_ELEM.
    pub(crate) fn encode(&self, builder: &mut MessageBuilder) {
        let elem = builder.nest_start(NFTA_LIST_ELEM);
        builder.append_attr_str(NFTA_EXPR_NAME, self.name());

        match self {
            Expr::Payload {
                dreg,
                base,
                offset,
                len,
            } => {
                let data = builder.nest_start(NFTA_EXPR_DATA);
                builder.append_attr_u32_be(NFTA_PAYLOAD_DREG, *dreg);
                builder.append_attr_u32_be(NFTA_PAYLOAD_BASE, base.number());
                builder.append_attr_u32_be(NFTA_PAYLOAD_OFFSET, *offset);
                builder.append_attr_u32_be(NFTA_PAYLOAD_LEN, *len);
                builder.nest_end(data);
            }
            Expr::Bitwise {
                sreg,
                dreg,
                mask,
                xor,
            } => {
                let data = builder.nest_start(NFTA_EXPR_DATA);
                builder.append_attr_u32_be(NFTA_BITWISE_SREG, *sreg);
                builder.append_attr_u32_be(NFTA_BITWISE_DREG, *dreg);
                builder.append_attr_u32_be(NFTA_BITWISE_LEN, mask.len() as u32);
                append_data(builder, NFTA_BITWISE_MASK, mask);
                append_data(builder, NFTA_BITWISE_XOR, xor);
                builder.nest_end(data);
            }
            Expr::Cmp { sreg, op, data } => {
                let nest = builder.nest_start(NFTA_EXPR_DATA);
                builder.append_attr_u32_be(NFTA_CMP_SREG, *sreg);
                builder.append_attr_u32_be(NFTA_CMP_OP, op.number());
                append_data(builder, NFTA_CMP_DATA, data);
                builder.nest_end(nest);
            }
            Expr::Meta { dreg, key } => {
                let data = builder.nest_start(NFTA_EXPR_DATA);
                builder.append_attr_u32_be(NFTA_META_KEY, key.number());
                builder.append_attr_u32_be(NFTA_META_DREG, *dreg);
                builder.nest_end(data);
            }
            Expr::Masquerade | Expr::Other(_) => {}
        }

        builder.nest_end(elem);
    }

    /// Decode one NFTA_LIST_ELEM payload.
    pub(crate) fn decode(elem: &[u8]) -> Option<Self> {
        let mut name = None;
        let mut data: &[u8] = &[];
        for (kind, payload) in AttrIter::new(elem) {
            match kind {
                NFTA_EXPR_NAME => name = get::string(payload).ok(),
                NFTA_EXPR_DATA => data = payload,
                _ => {}
            }
        }

        let expr = match name? {
            "payload" => {
                let (mut dreg, mut base, mut offset, mut len) = (0, 0, 0, 0);
                for (kind, payload) in AttrIter::new(data) {
                    let value = get::u32_be(payload).ok()?;
                    match kind {
                        NFTA_PAYLOAD_DREG => dreg = value,
                        NFTA_PAYLOAD_BASE => base = value,
                        NFTA_PAYLOAD_OFFSET => offset = value,
                        NFTA_PAYLOAD_LEN => len = value,
                        _ => {}
                    }
                }
                Expr::Payload {
                    dreg,
                    base: PayloadBase::from_u32(base),
                    offset,
                    len,
                }
            }
            "bitwise" => {
                let (mut sreg, mut dreg) = (0, 0);
                let (mut mask, mut xor) = (Vec::new(), Vec::new());
                for (kind, payload) in AttrIter::new(data) {
                    match kind {
                        NFTA_BITWISE_SREG => sreg = get::u32_be(payload).ok()?,
                        NFTA_BITWISE_DREG => dreg = get::u32_be(payload).ok()?,
                        NFTA_BITWISE_MASK => mask = data_value(payload),
                        NFTA_BITWISE_XOR => xor = data_value(payload),
                        _ => {}
                    }
                }
                Expr::Bitwise {
                    sreg,
                    dreg,
                    mask,
                    xor,
                }
            }
            "cmp" => {
                let (mut sreg, mut op) = (0, 0);
                let mut value = Vec::new();
                for (kind, payload) in AttrIter::new(data) {
                    match kind {
                        NFTA_CMP_SREG => sreg = get::u32_be(payload).ok()?,
                        NFTA_CMP_OP => op = get::u32_be(payload).ok()?,
                        NFTA_CMP_DATA => value = data_value(payload),
                        _ => {}
                    }
                }
                Expr::Cmp {
                    sreg,
                    op: CmpOp::from_u32(op),
                    data: value,
                }
            }
            "meta" => {
                let (mut dreg, mut key) = (0, 0);
                for (kind, payload) in AttrIter::new(data) {
                    match kind {
                        NFTA_META_DREG => dreg = get::u32_be(payload).ok()?,
                        NFTA_META_KEY => key = get::u32_be(payload).ok()?,
                        _ => {}
                    }
                }
                Expr::Meta {
                    dreg,
                    key: MetaKey::from_u32(key),
                }
            }
            "masq" => Expr::Masquerade,
            other => Expr::Other(other.to_string()),
        };

        Some(expr)
    }
}

fn append_data(builder: &mut MessageBuilder, attr_type: u16, value: &[u8]) {
    let nest = builder.nest_start(attr_type);
    builder.append_attr(NFTA_DATA_VALUE, value);
    builder.nest_end(nest);
}

fn data_value(nested: &[u8]) -> Vec<u8> {
    AttrIter::new(nested)
        .find(|(kind, _)| *kind == NFTA_DATA_VALUE)
        .map(|(_, value)| value.to_vec())
        .unwrap_or_default()
}

/// Decode the contents of NFTA_RULE_EXPRESSIONS.
pub(crate) fn decode_list(list: &[u8]) -> Vec<Expr> {
    AttrIter::new(list)
        .filter(|(kind, _)| *kind == NFTA_LIST_ELEM)
        .filter_map(|(_, elem)| Expr::decode(elem))
        .collect()
}
