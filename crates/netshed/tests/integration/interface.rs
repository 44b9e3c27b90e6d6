//! Interface manager integration tests.

use std::net::Ipv4Addr;

use netshed::Error;

use crate::common::{TestNamespace, TestResult};

#[tokio::test]
async fn test_create_and_remove_bridge() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("bridge")?;
    let interfaces = ns.interfaces()?;

    interfaces.create_bridge("br0", "10.0.0.1/24").await?;

    let link = interfaces
        .connection()
        .get_link_by_name("br0")
        .await?
        .expect("br0 should exist");
    assert_eq!(link.kind(), Some("bridge"));
    assert!(link.is_up(), "br0 should be up");

    let addrs = interfaces.ipv4_addresses("br0").await?;
    assert_eq!(addrs, vec![(Ipv4Addr::new(10, 0, 0, 1), 24)]);

    interfaces.remove("br0").await?;
    assert!(
        interfaces
            .connection()
            .get_link_by_name("br0")
            .await?
            .is_none(),
        "br0 should be deleted"
    );

    Ok(())
}

#[tokio::test]
async fn test_create_dummy() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("dummy")?;
    let interfaces = ns.interfaces()?;

    interfaces.create_dummy("dum0", "192.168.1.1/24").await?;

    let link = interfaces
        .connection()
        .get_link_by_name("dum0")
        .await?
        .expect("dum0 should exist");
    assert_eq!(link.kind(), Some("dummy"));
    assert!(link.is_up());

    let addrs = interfaces.ipv4_addresses("dum0").await?;
    assert_eq!(addrs, vec![(Ipv4Addr::new(192, 168, 1, 1), 24)]);

    Ok(())
}

#[tokio::test]
async fn test_create_existing_name_fails() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("exists")?;
    let interfaces = ns.interfaces()?;

    interfaces.create_dummy("dum0", "192.168.1.1/24").await?;
    let err = interfaces
        .create_bridge("dum0", "10.0.0.1/24")
        .await
        .unwrap_err();

    match err {
        Error::KernelOp { source, .. } => assert!(source.is_already_exists()),
        other => panic!("unexpected error: {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn test_remove_missing_interface() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("missing")?;
    let interfaces = ns.interfaces()?;

    let err = interfaces.remove("nope0").await.unwrap_err();
    assert!(matches!(err, Error::NotFound { ref name } if name == "nope0"));

    Ok(())
}

#[tokio::test]
async fn test_second_remove_is_not_found() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("twice")?;
    let interfaces = ns.interfaces()?;

    interfaces.create_dummy("dum0", "192.168.1.1/24").await?;
    interfaces.remove("dum0").await?;
    assert!(interfaces.remove("dum0").await.unwrap_err().is_not_found());

    Ok(())
}

#[tokio::test]
async fn test_invalid_gateway_touches_nothing() -> TestResult {
    require_root!();

    let ns = TestNamespace::new("badgw")?;
    let interfaces = ns.interfaces()?;

    let err = interfaces.create_bridge("br0", "10.0.0.1").await.unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
    assert!(
        interfaces
            .connection()
            .get_link_by_name("br0")
            .await?
            .is_none()
    );

    Ok(())
}
