//! Masquerade manager integration tests.

use netshed::Error;
use netshed::masquerade::{NAT_TABLE, POSTROUTING_CHAIN};
use netshed::netlink::nftables::Family;

use crate::common::{TestNamespace, TestResult};

#[tokio::test]
async fn test_add_then_remove() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("masq")?;
    let interfaces = ns.interfaces()?;
    let masq = ns.masquerade()?;

    interfaces.create_bridge("netA", "10.10.0.1/24").await?;
    interfaces.create_bridge("netB", "10.20.0.1/24").await?;

    masq.add("netA").await?;
    masq.add("netB").await?;
    assert_eq!(masq.tagged_rules("netA").await?.len(), 1);

    masq.remove("netA").await?;
    assert!(masq.tagged_rules("netA").await?.is_empty());
    assert_eq!(
        masq.tagged_rules("netB").await?.len(),
        1,
        "other networks' rules must survive"
    );

    Ok(())
}

#[tokio::test]
async fn test_remove_without_rules_is_noop() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("masqnoop")?;
    let masq = ns.masquerade()?;

    masq.remove("netA").await?;
    masq.remove("netA").await?;

    // The chain is ensured even when nothing is removed.
    let rules = ns
        .netfilter()?
        .get_rules(Family::Ipv4, NAT_TABLE, POSTROUTING_CHAIN)
        .await?;
    assert!(rules.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_duplicates_removed_together() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("masqdup")?;
    let interfaces = ns.interfaces()?;
    let masq = ns.masquerade()?;

    interfaces.create_bridge("netA", "10.10.0.1/24").await?;

    masq.add("netA").await?;
    masq.add("netA").await?;
    assert_eq!(masq.tagged_rules("netA").await?.len(), 2);

    masq.remove("netA").await?;
    assert!(masq.tagged_rules("netA").await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_many_duplicates_removed_in_one_batch() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("masqmany")?;
    let interfaces = ns.interfaces()?;
    let masq = ns.masquerade()?;

    interfaces.create_bridge("netA", "10.10.0.1/24").await?;
    interfaces.create_bridge("netB", "10.20.0.1/24").await?;

    // Enough replies to overflow the default receive queue.
    for _ in 0..400 {
        masq.add("netA").await?;
    }
    masq.add("netB").await?;
    assert_eq!(masq.tagged_rules("netA").await?.len(), 400);

    masq.remove("netA").await?;
    assert!(masq.tagged_rules("netA").await?.is_empty());
    assert_eq!(masq.tagged_rules("netB").await?.len(), 1);

    Ok(())
}

#[tokio::test]
async fn test_add_for_missing_interface() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("masqmissing")?;
    let masq = ns.masquerade()?;

    let err = masq.add("ghost0").await.unwrap_err();
    assert!(matches!(err, Error::KernelOp { .. }));
    assert!(err.is_not_found());

    Ok(())
}

#[tokio::test]
async fn test_add_for_interface_without_address() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("masqnoaddr")?;
    ns.exec("ip", &["link", "add", "bare0", "type", "dummy"])?;
    let masq = ns.masquerade()?;

    let err = masq.add("bare0").await.unwrap_err();
    assert!(err.to_string().contains("no IPv4 address found for bare0"));

    Ok(())
}
