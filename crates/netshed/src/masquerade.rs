//! Tagged nf_tables masquerade rules.
//!
//! Every rule lives in `ip nat postrouting` and ends with an inert
//! `meta iifname == "netshed:<network>"` match placed after the masquerade
//! statement. That literal is how rules are found again for removal.

use ipnet::Ipv4Net;
use tracing::debug;

use crate::error::{Error, Result};
use crate::netlink::nftables::{
    Chain, ChainType, CmpOp, Expr, Family, Hook, MetaKey, NFT_DATA_VALUE_MAXLEN, NFT_REG_1,
    PayloadBase, Rule, Table, Transaction,
};
use crate::netlink::{self, Connection, Netfilter, Route};

/// Table holding the masquerade chain.
pub const NAT_TABLE: &str = "nat";

/// Chain holding the masquerade rules.
pub const POSTROUTING_CHAIN: &str = "postrouting";

/// Source NAT priority (NF_IP_PRI_NAT_SRC).
pub const NAT_SOURCE_PRIORITY: i32 = 100;

const TAG_PREFIX: &str = "netshed:";

/// Offset of the source address in the IPv4 header.
const IPV4_SADDR_OFFSET: u32 = 12;

/// The identification literal for `network`.
pub fn tag_for(network: &str) -> String {
    format!("{}{}", TAG_PREFIX, network)
}

/// True if some `cmp` in the rule compares against exactly `tag`.
pub fn has_tag(rule: &Rule, tag: &str) -> bool {
    rule.exprs()
        .iter()
        .any(|expr| matches!(expr, Expr::Cmp { data, .. } if data.as_slice() == tag.as_bytes()))
}

/// True if the rule contains a masquerade statement.
pub fn has_masquerade(rule: &Rule) -> bool {
    rule.exprs()
        .iter()
        .any(|expr| matches!(expr, Expr::Masquerade))
}

/// `ip saddr & mask == subnet masquerade`, tagged with `tag`.
pub fn masquerade_rule(subnet: Ipv4Net, tag: &str) -> Rule {
    Rule::new(NAT_TABLE, POSTROUTING_CHAIN)
        .expr(Expr::Payload {
            dreg: NFT_REG_1,
            base: PayloadBase::Network,
            offset: IPV4_SADDR_OFFSET,
            len: 4,
        })
        .expr(Expr::Bitwise {
            sreg: NFT_REG_1,
            dreg: NFT_REG_1,
            mask: subnet.netmask().octets().to_vec(),
            xor: vec![0; 4],
        })
        .expr(Expr::Cmp {
            sreg: NFT_REG_1,
            op: CmpOp::Eq,
            data: subnet.network().octets().to_vec(),
        })
        .expr(Expr::Masquerade)
        .expr(Expr::Meta {
            dreg: NFT_REG_1,
            key: MetaKey::Iifname,
        })
        .expr(Expr::Cmp {
            sreg: NFT_REG_1,
            op: CmpOp::Eq,
            data: tag.as_bytes().to_vec(),
        })
}

fn nat_chain() -> Chain {
    Chain::new(NAT_TABLE, POSTROUTING_CHAIN)
        .hook(Hook::Postrouting, NAT_SOURCE_PRIORITY)
        .chain_type(ChainType::Nat)
}

/// Adds and removes per-network masquerade rules.
pub struct MasqueradeManager {
    nft: Connection<Netfilter>,
    route: Connection<Route>,
}

impl MasqueradeManager {
    /// Open netfilter and rtnetlink connections in the current namespace.
    pub fn new() -> Result<Self> {
        let nft = Connection::<Netfilter>::new()
            .map_err(|e| Error::kernel("open nfnetlink socket", e))?;
        let route =
            Connection::<Route>::new().map_err(|e| Error::kernel("open rtnetlink socket", e))?;
        Ok(Self::with_connections(nft, route))
    }

    /// Use existing connections.
    pub fn with_connections(nft: Connection<Netfilter>, route: Connection<Route>) -> Self {
        Self { nft, route }
    }

    /// Declare `ip nat` and its postrouting chain; no-op if both exist.
    async fn ensure_nat_chain(&self) -> Result<()> {
        let mut tx = Transaction::new(Family::Ipv4);
        tx.add_table(&Table::new(NAT_TABLE)).add_chain(&nat_chain());
        self.nft.commit(tx).await.map_err(Error::ChainEnsure)
    }

    /// Subnet of the first IPv4 address on `network`.
    async fn network_subnet(&self, network: &str) -> Result<Ipv4Net> {
        let ifindex = self
            .route
            .link_index(network)
            .await
            .map_err(|e| Error::kernel(format!("failed to get interface {}", network), e))?;

        let addresses = self
            .route
            .get_ipv4_addresses_by_index(ifindex)
            .await
            .map_err(|e| Error::kernel(format!("failed to get addresses for {}", network), e))?;

        let (addr, prefix_len) = addresses.first().copied().ok_or_else(|| {
            Error::kernel(
                format!("failed to get addresses for {}", network),
                netlink::Error::AddressNotFound {
                    name: network.to_string(),
                },
            )
        })?;

        Ipv4Net::new(addr, prefix_len)
            .map(|net| net.trunc())
            .map_err(|e| Error::Parse {
                input: format!("{}/{}", addr, prefix_len),
                reason: e.to_string(),
            })
    }

    /// Append a masquerade rule for the subnet of interface `network`.
    ///
    /// Not idempotent: each call appends another rule.
    pub async fn add(&self, network: &str) -> Result<()> {
        let tag = tag_for(network);
        if tag.len() > NFT_DATA_VALUE_MAXLEN {
            return Err(Error::kernel(
                format!("failed to add masquerade rule for {}", network),
                netlink::Error::InvalidAttribute(format!(
                    "rule tag '{}' exceeds {} bytes",
                    tag, NFT_DATA_VALUE_MAXLEN
                )),
            ));
        }

        self.ensure_nat_chain().await?;
        let subnet = self.network_subnet(network).await?;

        let mut tx = Transaction::new(Family::Ipv4);
        tx.add_rule(&masquerade_rule(subnet, &tag));
        self.nft
            .commit(tx)
            .await
            .map_err(|e| Error::kernel("failed to add masquerade rule", e))?;

        debug!(network, %subnet, "masquerade rule added");
        Ok(())
    }

    /// Delete every masquerade rule tagged for `network`.
    ///
    /// Nothing is committed when no rule matches.
    pub async fn remove(&self, network: &str) -> Result<()> {
        self.ensure_nat_chain().await?;

        let rules = self.tagged_rules(network).await?;
        if rules.is_empty() {
            debug!(network, "no masquerade rules to remove");
            return Ok(());
        }

        let mut tx = Transaction::new(Family::Ipv4);
        for handle in rules.iter().filter_map(Rule::handle) {
            tx.del_rule(NAT_TABLE, POSTROUTING_CHAIN, handle);
        }
        self.nft
            .commit(tx)
            .await
            .map_err(|e| Error::kernel("failed to remove masquerade rule", e))?;

        debug!(network, count = rules.len(), "masquerade rules removed");
        Ok(())
    }

    /// Rules in the NAT chain that belong to `network`.
    pub async fn tagged_rules(&self, network: &str) -> Result<Vec<Rule>> {
        let tag = tag_for(network);
        let rules = self
            .nft
            .get_rules(Family::Ipv4, NAT_TABLE, POSTROUTING_CHAIN)
            .await
            .map_err(|e| Error::kernel("failed to get rules", e))?;

        Ok(rules
            .into_iter()
            .filter(|rule| has_tag(rule, &tag) && has_masquerade(rule))
            .collect())
    }
}
