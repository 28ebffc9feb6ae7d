//! Compile a file through the gateway and run it headless.

use std::sync::Arc;

use anyhow::Result;

use playground_client::{CompileClient, Harness, HeadlessLoader, Page, Playground};
use playground_core::{CompileRequest, RequestFormat};

/// Width of the headless mount point.
const MOUNT_WIDTH: f64 = 1280.0;

pub async fn cmd_run(gateway: &str, request: &CompileRequest, format: RequestFormat) -> Result<()> {
    let page = Page::new();
    let mount = page.create_container(MOUNT_WIDTH);
    let harness = Harness::new(page, Arc::new(HeadlessLoader::new()));
    let client = CompileClient::new(gateway).with_format(format);
    let playground = Playground::new(client, harness, mount);

    println!(
        "Compiling {} bytes for {} ({})...",
        request.source().len(),
        request.target_version(),
        request.toolchain_channel()
    );

    let report = match playground.run(request).await {
        Ok(report) => report,
        Err(failure) => {
            eprintln!("✗ {}", failure.user_message());
            if let Some(diagnostic) = failure.diagnostic() {
                eprintln!();
                eprintln!("{}", diagnostic.trim_end());
            }
            std::process::exit(1);
        }
    };

    let cache = report.cache_status.as_deref().unwrap_or("-");
    println!("✓ Running (session {}, cache {})", report.session.id(), cache);
    if let Some(surface) = report.session.surface() {
        if let Some(style) = playground.harness().page().style(surface) {
            println!(
                "  surface {} : {:.0}x{:.0}",
                surface,
                style.width.unwrap_or_default(),
                style.height.unwrap_or_default()
            );
        }
    }
    if !report.diagnostics.trim().is_empty() {
        println!();
        println!("{}", report.diagnostics.trim_end());
    }
    for line in &report.logs {
        println!("  │ {}", line);
    }

    playground.unmount().await;
    println!("Stopped.");
    Ok(())
}
