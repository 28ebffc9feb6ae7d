//! Shared HTTP request helpers for CLI commands.

use anyhow::{Context, Result};
use serde::Deserialize;

pub fn api_url(gateway: &str) -> String {
    format!("{}/api", gateway.trim_end_matches('/'))
}

pub async fn get_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::get(url)
        .await
        .with_context(|| format!("failed to connect to the gateway at {url}; is playgroundd running?"))?
        .error_for_status()
        .context("gateway returned an error")?
        .json::<T>()
        .await
        .context("failed to parse response")
}

pub async fn post_json<T: for<'de> Deserialize<'de>>(url: &str) -> Result<T> {
    reqwest::Client::new()
        .post(url)
        .send()
        .await
        .with_context(|| format!("failed to connect to the gateway at {url}; is playgroundd running?"))?
        .error_for_status()
        .context("gateway returned an error")?
        .json::<T>()
        .await
        .context("failed to parse response")
}
