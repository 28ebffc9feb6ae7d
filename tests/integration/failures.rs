//! Failure paths: every one ends with a message and an empty mount.

use crate::*;

use std::time::Duration;

use playground_client::{Failure, PlaygroundState};
use playground_core::error::GENERIC_FAILURE_MESSAGE;
use playground_core::RetryGuidance;

#[tokio::test]
async fn build_failure_carries_message_and_stderr() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, loader) = playground(&gateway.url, RequestFormat::Raw);

    let err = playground
        .run(&request("fn main() { compile_error!(\"x\") }"))
        .await
        .unwrap_err();

    assert!(matches!(
        err.kind(),
        Some(ErrorKind::BuildFailed { .. })
    ));
    assert_eq!(err.user_message(), "The code failed to build");
    assert_eq!(err.diagnostic(), Some(BUILD_STDERR));
    assert_eq!(err.retry(), RetryGuidance::EditRequired);
    assert_eq!(playground.state(), PlaygroundState::Idle);
    assert!(loader.instances().is_empty());
    assert!(playground.harness().page().surfaces().is_empty());
    Ok(())
}

#[tokio::test]
async fn build_failures_are_cached_by_default() -> Result<()> {
    let (gateway, mock) = stack().await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);
    let req = request("compile_error!()");

    assert!(playground.run(&req).await.is_err());
    gateway.wait_for_stores(1).await?;
    let again = playground.run(&req).await.unwrap_err();

    assert_eq!(mock.compiles(), 1);
    assert_eq!(again.diagnostic(), Some(BUILD_STDERR));
    Ok(())
}

#[tokio::test]
async fn build_failures_are_not_cached_when_disabled() -> Result<()> {
    let (backend_url, mock) = spawn_backend().await?;
    let gateway = spawn_gateway_with(&backend_url, |state| state.cache_failures = false).await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);
    let req = request("compile_error!()");

    assert!(playground.run(&req).await.is_err());
    assert!(playground.run(&req).await.is_err());
    assert_eq!(mock.compiles(), 2);
    assert!(gateway.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn rate_limit_reports_wait_time() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);

    let err = playground.run(&request("slow_down")).await.unwrap_err();
    assert_eq!(
        err.user_message(),
        "Please wait 4s before submitting another request"
    );
    assert_eq!(err.retry(), RetryGuidance::After(Duration::from_secs_f64(3.5)));
    Ok(())
}

#[tokio::test]
async fn unknown_kind_falls_back_to_generic_message() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);

    let err = playground.run(&request("mystery")).await.unwrap_err();
    assert!(matches!(
        &err,
        Failure::Unrecognized { kind: Some(kind) } if kind == "QuantumFlux"
    ));
    assert!(err.user_message().starts_with(GENERIC_FAILURE_MESSAGE));
    Ok(())
}

#[tokio::test]
async fn overrunning_frame_is_malformed() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, loader) = playground(&gateway.url, RequestFormat::Raw);

    let err = playground.run(&request("malformed")).await.unwrap_err();
    assert_eq!(err.kind(), Some(&ErrorKind::MalformedFrame));
    assert!(!err.user_message().is_empty());
    assert!(loader.instances().is_empty());
    assert_eq!(playground.state(), PlaygroundState::Idle);
    Ok(())
}

#[tokio::test]
async fn backend_down_is_internal_and_never_cached() -> Result<()> {
    let gateway = spawn_gateway(&dead_url()?).await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);

    for _ in 0..2 {
        let err = playground.run(&request("fn main() {}")).await.unwrap_err();
        assert_eq!(err.kind(), Some(&ErrorKind::Internal));
    }
    tokio::time::sleep(Duration::from_millis(50)).await;
    let stats = gateway.state.stats.snapshot();
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.stores, 0);
    assert!(gateway.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn gateway_down_is_a_transport_failure() -> Result<()> {
    let (playground, _) = playground(&dead_url()?, RequestFormat::Raw);
    let err = playground.run(&request("fn main() {}")).await.unwrap_err();
    assert!(matches!(err, Failure::Transport(_)));
    assert_eq!(err.retry(), RetryGuidance::Later);
    Ok(())
}

#[tokio::test]
async fn failing_glue_tears_down_and_keeps_mount_empty() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, loader) = playground(&gateway.url, RequestFormat::Raw);

    let running = playground.run(&request("fn main() {}")).await?;
    let err = playground.run(&request("unreachable!()")).await.unwrap_err();

    assert!(matches!(&err, Failure::Load(reason) if reason.contains("unreachable executed")));
    assert!(!running.session.is_active());
    let instances = loader.instances();
    assert_eq!(instances.len(), 2);
    assert!(instances.iter().all(|i| i.exit_count() == 1));
    assert!(playground.harness().page().surfaces().is_empty());
    assert!(playground.harness().active(playground.mount()).await.is_none());
    Ok(())
}
