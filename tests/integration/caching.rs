//! Gateway caching observed end to end.

use crate::*;

use playground_api::CACHE_STATUS_HEADER;
use playground_core::StoreKey;
use playground_services::CacheStore;

const SOURCE: &str = "fn main() { App::new().run(); }";

#[tokio::test]
async fn identical_submission_is_served_from_cache() -> Result<()> {
    let (gateway, mock) = stack().await?;
    let (playground, loader) = playground(&gateway.url, RequestFormat::Raw);

    let first = playground.run(&request(SOURCE)).await?;
    assert_eq!(first.cache_status.as_deref(), Some("MISS"));
    assert_eq!(first.logs, vec!["running on 0.16 (stable)".to_string()]);
    gateway.wait_for_stores(1).await?;

    let second = playground.run(&request(SOURCE)).await?;
    assert_eq!(second.cache_status.as_deref(), Some("HIT"));
    assert_eq!(mock.compiles(), 1);

    assert_eq!(first.diagnostics, second.diagnostics);
    assert_eq!(first.logs, second.logs);
    assert!(!first.session.is_active());
    assert!(second.session.is_active());
    assert_eq!(loader.instances()[0].exit_count(), 1);
    assert_eq!(loader.instances()[0].module_len(), loader.instances()[1].module_len());
    Ok(())
}

#[tokio::test]
async fn cached_body_is_byte_identical() -> Result<()> {
    let (gateway, _) = stack().await?;
    let url = format!("{}/0.16/stable", gateway.url);
    let client = reqwest::Client::new();

    let miss = client.post(&url).body(SOURCE).send().await?;
    assert_eq!(miss.headers()[CACHE_STATUS_HEADER], "MISS");
    let miss_lengths = (
        miss.headers()["module-length"].clone(),
        miss.headers()["glue-length"].clone(),
    );
    let miss_body = miss.bytes().await?;
    gateway.wait_for_stores(1).await?;

    let hit = client.post(&url).body(SOURCE).send().await?;
    assert_eq!(hit.status(), 200);
    assert_eq!(hit.headers()[CACHE_STATUS_HEADER], "HIT");
    assert_eq!(hit.headers()["module-length"], miss_lengths.0);
    assert_eq!(hit.headers()["glue-length"], miss_lengths.1);
    assert_eq!(hit.bytes().await?, miss_body);
    Ok(())
}

#[tokio::test]
async fn store_key_matches_request_key() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);
    let req = request(SOURCE);

    playground.run(&req).await?;
    gateway.wait_for_stores(1).await?;

    let key = StoreKey::for_request(&req.route(RequestFormat::Raw), req.source().as_bytes());
    assert_eq!(key.key(), &req.cache_key());
    assert!(gateway.store.get(&key).await?.is_some());
    assert_eq!(gateway.store.len(), 1);
    Ok(())
}

#[tokio::test]
async fn versions_and_channels_do_not_share_entries() -> Result<()> {
    let (gateway, mock) = stack().await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);

    let variants = [
        CompileRequest::new(SOURCE, TargetVersion::V0_16, ToolchainChannel::Stable),
        CompileRequest::new(SOURCE, TargetVersion::V0_15, ToolchainChannel::Stable),
        CompileRequest::new(SOURCE, TargetVersion::V0_16, ToolchainChannel::Nightly),
    ];
    for req in &variants {
        let report = playground.run(req).await?;
        assert_eq!(report.cache_status.as_deref(), Some("MISS"));
        assert_eq!(
            report.logs,
            vec![format!(
                "running on {} ({})",
                req.target_version(),
                req.toolchain_channel()
            )]
        );
    }
    assert_eq!(mock.compiles(), 3);
    gateway.wait_for_stores(3).await?;
    assert_eq!(gateway.store.len(), 3);
    Ok(())
}

#[tokio::test]
async fn json_submissions_are_cached_under_their_own_route() -> Result<()> {
    let (gateway, mock) = stack().await?;
    let (raw, _) = playground(&gateway.url, RequestFormat::Raw);
    let (json, _) = playground(&gateway.url, RequestFormat::Json);

    raw.run(&request(SOURCE)).await?;
    let first = json.run(&request(SOURCE)).await?;
    assert_eq!(first.cache_status.as_deref(), Some("MISS"));
    assert_eq!(mock.compiles(), 2);
    gateway.wait_for_stores(2).await?;

    let again = json.run(&request(SOURCE)).await?;
    assert_eq!(again.cache_status.as_deref(), Some("HIT"));
    assert_eq!(again.logs, first.logs);
    assert_eq!(mock.compiles(), 2);
    Ok(())
}

#[tokio::test]
async fn bypass_token_refreshes_the_entry() -> Result<()> {
    let (backend_url, mock) = spawn_backend().await?;
    let gateway = spawn_gateway_with(&backend_url, |state| {
        state.bypass_token = Some("letmein".into());
    })
    .await?;
    let url = format!("{}/0.16/stable", gateway.url);
    let client = reqwest::Client::new();

    client.post(&url).body(SOURCE).send().await?;
    gateway.wait_for_stores(1).await?;

    let bypass = client
        .post(&url)
        .header("cache-bypass", "letmein")
        .body(SOURCE)
        .send()
        .await?;
    assert_eq!(bypass.headers()[CACHE_STATUS_HEADER], "BYPASS");
    assert_eq!(mock.compiles(), 2);
    gateway.wait_for_stores(2).await?;

    let wrong_token = client
        .post(&url)
        .header("cache-bypass", "guess")
        .body(SOURCE)
        .send()
        .await?;
    assert_eq!(wrong_token.headers()[CACHE_STATUS_HEADER], "HIT");
    assert_eq!(mock.compiles(), 2);
    Ok(())
}

#[tokio::test]
async fn get_is_passed_through_uncached() -> Result<()> {
    let (gateway, mock) = stack().await?;
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let resp = client.get(format!("{}/health", gateway.url)).send().await?;
        assert_eq!(resp.status(), 200);
        assert_eq!(resp.headers()[CACHE_STATUS_HEADER], "PASS");
        assert_eq!(resp.text().await?, "ok");
    }
    assert_eq!(mock.probes(), 2);
    assert_eq!(mock.compiles(), 0);
    assert!(gateway.store.is_empty());
    Ok(())
}

#[tokio::test]
async fn other_methods_are_refused() -> Result<()> {
    let (gateway, mock) = stack().await?;
    let resp = reqwest::Client::new()
        .delete(format!("{}/0.16/stable", gateway.url))
        .send()
        .await?;

    assert_eq!(resp.status(), 405);
    assert_eq!(resp.headers()["allow"], "GET, OPTIONS, POST");
    let body: serde_json::Value = resp.json().await?;
    assert_eq!(body["kind"], "MethodNotAllowed");
    assert_eq!(mock.compiles() + mock.probes(), 0);
    Ok(())
}

#[tokio::test]
async fn oversized_body_is_refused_before_forwarding() -> Result<()> {
    let (backend_url, mock) = spawn_backend().await?;
    let gateway = spawn_gateway_with(&backend_url, |state| state.max_body_bytes = 64).await?;

    let resp = reqwest::Client::new()
        .post(format!("{}/0.16/stable", gateway.url))
        .body("x".repeat(65))
        .send()
        .await?;
    assert_eq!(resp.status(), 413);
    assert_eq!(mock.compiles(), 0);
    Ok(())
}

#[tokio::test]
async fn operator_endpoints_report_and_clear() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);
    let client = reqwest::Client::new();

    playground.run(&request(SOURCE)).await?;
    gateway.wait_for_stores(1).await?;
    playground.run(&request(SOURCE)).await?;

    let health: serde_json::Value = client.get(gateway.api("/health")).send().await?.json().await?;
    assert_eq!(health["status"], "ok");
    assert_eq!(health["store"], "memory");

    let cache: serde_json::Value = client.get(gateway.api("/cache")).send().await?.json().await?;
    assert_eq!(cache["entries"], 1);
    assert_eq!(cache["hits"], 1);
    assert_eq!(cache["misses"], 1);
    assert_eq!(cache["stores"], 1);

    let cleared: serde_json::Value = client
        .post(gateway.api("/cache/clear"))
        .send()
        .await?
        .json()
        .await?;
    assert_eq!(cleared["cleared"], 1);

    let after = playground.run(&request(SOURCE)).await?;
    assert_eq!(after.cache_status.as_deref(), Some("MISS"));
    Ok(())
}
