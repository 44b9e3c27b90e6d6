//! End-to-end create/delete runs.

use std::net::Ipv4Addr;

use netshed::{NetworkDescriptor, Orchestrator};

use crate::common::{TestNamespace, TestResult};

fn scenario() -> Vec<NetworkDescriptor> {
    vec![
        NetworkDescriptor::bridge("br0", "10.0.0.0/24", "10.0.0.1/24").masquerade(true),
        NetworkDescriptor::dummy("dum0", "192.168.1.1/24"),
    ]
}

#[tokio::test]
async fn test_create_and_delete_scenario() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("orch")?;
    let orchestrator = Orchestrator::new(ns.interfaces()?, ns.masquerade()?);
    let networks = scenario();

    let report = orchestrator.create(&networks).await?;
    assert_eq!(report.processed, ["br0", "dum0"]);

    let interfaces = ns.interfaces()?;
    let br0 = interfaces
        .connection()
        .get_link_by_name("br0")
        .await?
        .expect("br0 should exist");
    assert!(br0.is_up());
    assert_eq!(
        interfaces.ipv4_addresses("br0").await?,
        vec![(Ipv4Addr::new(10, 0, 0, 1), 24)]
    );
    assert_eq!(ns.masquerade()?.tagged_rules("br0").await?.len(), 1);

    let report = orchestrator.delete(&networks).await?;
    assert!(report.is_clean());

    let links = interfaces.connection().get_links().await?;
    assert!(!links.iter().any(|l| l.name() == Some("br0")));
    assert!(!links.iter().any(|l| l.name() == Some("dum0")));
    assert!(ns.masquerade()?.tagged_rules("br0").await?.is_empty());

    Ok(())
}

#[tokio::test]
async fn test_failed_masquerade_rolls_back_bridge() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("orchrb")?;
    let orchestrator = Orchestrator::new(ns.interfaces()?, ns.masquerade()?);

    // "netshed:" plus this name does not fit a cmp operand.
    let networks =
        [NetworkDescriptor::bridge("longbridge1", "10.0.0.0/24", "10.0.0.1/24").masquerade(true)];

    assert!(orchestrator.create(&networks).await.is_err());
    assert!(
        ns.interfaces()?
            .connection()
            .get_link_by_name("longbridge1")
            .await?
            .is_none(),
        "bridge should be rolled back"
    );

    Ok(())
}
