//! Successful runs through the whole stack.

use crate::*;

use playground_client::PlaygroundState;

#[tokio::test]
async fn run_mounts_a_sized_surface() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, loader) = playground(&gateway.url, RequestFormat::Raw);
    let mut states = playground.subscribe();

    let report = playground.run(&request("fn main() {}")).await?;

    assert_eq!(report.diagnostics, "warning: unused variable: `y`");
    assert_eq!(playground.state(), PlaygroundState::Playing);
    assert_eq!(*states.borrow_and_update(), PlaygroundState::Playing);
    assert_eq!(loader.instances()[0].module_len(), MODULE_PREAMBLE.len() + "0.16".len());

    let page = playground.harness().page();
    let surface = report.session.surface().expect("surface mounted");
    assert_eq!(page.parent_of(surface), Some(playground.mount()));
    let style = page.style(surface).expect("surface styled");
    assert_eq!(style.width, Some(MOUNT_WIDTH));
    assert_eq!(style.height, Some(MOUNT_WIDTH * 9.0 / 16.0));
    assert_eq!(style.border_radius.as_deref(), Some("0.5rem"));
    Ok(())
}

#[tokio::test]
async fn sentinel_completion_is_a_success() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, _) = playground(&gateway.url, RequestFormat::Raw);

    let report = playground.run(&request("early_exit")).await?;
    assert_eq!(report.logs, vec!["booted".to_string()]);
    assert!(report.session.is_active());
    assert!(report.session.surface().is_some());
    Ok(())
}

#[tokio::test]
async fn resubmitting_keeps_one_instance_alive() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, loader) = playground(&gateway.url, RequestFormat::Raw);

    let mut sessions = Vec::new();
    for n in 0..4 {
        let source = format!("fn main() {{ let frame = {n}; }}");
        sessions.push(playground.run(&request(&source)).await?.session);
    }

    let live: Vec<_> = sessions.iter().filter(|s| s.is_active()).collect();
    assert_eq!(live.len(), 1);
    assert!(sessions[3].is_active());
    let exits: Vec<_> = loader.instances().iter().map(|i| i.exit_count()).collect();
    assert_eq!(exits, vec![1, 1, 1, 0]);
    assert_eq!(playground.harness().page().surfaces().len(), 1);
    Ok(())
}

#[tokio::test]
async fn stop_then_unmount_exits_once() -> Result<()> {
    let (gateway, _) = stack().await?;
    let (playground, loader) = playground(&gateway.url, RequestFormat::Raw);

    let report = playground.run(&request("fn main() {}")).await?;
    playground.stop().await;
    assert_eq!(playground.state(), PlaygroundState::Idle);
    assert!(!report.session.is_active());

    let page = playground.harness().page().clone();
    playground.unmount().await;
    assert_eq!(loader.instances()[0].exit_count(), 1);
    assert!(page.surfaces().is_empty());
    Ok(())
}
