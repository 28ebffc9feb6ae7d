//! Gateway health and cache commands.

use anyhow::Result;
use serde::Deserialize;

use super::http::{api_url, get_json, post_json};

// ── Response types ────────────────────────────────────────────────────────────

#[derive(Deserialize)]
struct HealthResponse {
    status: String,
    store: String,
    version: String,
}

#[derive(Deserialize)]
struct CacheInfo {
    store: String,
    entries: Option<usize>,
    bytes: Option<u64>,
    hits: u64,
    misses: u64,
    bypasses: u64,
    passthroughs: u64,
    stores: u64,
    store_failures: u64,
}

#[derive(Deserialize)]
struct ClearResponse {
    cleared: usize,
}

// ── Commands ──────────────────────────────────────────────────────────────────

pub async fn cmd_health(gateway: &str) -> Result<()> {
    let resp: HealthResponse = get_json(&format!("{}/health", api_url(gateway))).await?;
    println!(
        "Gateway {} ({} store, v{})",
        resp.status, resp.store, resp.version
    );
    Ok(())
}

pub async fn cmd_cache(gateway: &str) -> Result<()> {
    let resp: CacheInfo = get_json(&format!("{}/cache", api_url(gateway))).await?;

    println!("═══════════════════════════════════════");
    println!("  Compile Cache ({})", resp.store);
    println!("═══════════════════════════════════════");
    match resp.entries {
        Some(entries) => println!("  Entries        : {}", entries),
        None => println!("  Entries        : unknown"),
    }
    if let Some(bytes) = resp.bytes {
        println!(
            "  Bytes          : {} ({:.1} KB)",
            bytes,
            bytes as f64 / 1024.0
        );
    }
    println!("  Hits           : {}", resp.hits);
    println!("  Misses         : {}", resp.misses);
    println!("  Bypasses       : {}", resp.bypasses);
    println!("  Passthroughs   : {}", resp.passthroughs);
    println!("  Stores         : {}", resp.stores);
    println!("  Store failures : {}", resp.store_failures);

    let lookups = resp.hits + resp.misses;
    if lookups > 0 {
        println!(
            "  Hit rate       : {:.1}%",
            resp.hits as f64 * 100.0 / lookups as f64
        );
    }

    Ok(())
}

pub async fn cmd_cache_clear(gateway: &str) -> Result<()> {
    let resp: ClearResponse = post_json(&format!("{}/cache/clear", api_url(gateway))).await?;
    println!("Cleared {} entries from the compile cache.", resp.cleared);
    Ok(())
}
