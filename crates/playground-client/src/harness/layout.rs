//! Surface sizing.

use tokio::sync::broadcast::error::RecvError;
use tokio::task::AbortHandle;

use super::page::{ElementId, Page};

/// Fixed presentation applied to every mounted surface.
#[derive(Debug, Clone, PartialEq)]
pub struct SurfaceLayout {
    /// Width over height.
    pub aspect_ratio: f64,
    pub corner_radius: String,
}

impl Default for SurfaceLayout {
    fn default() -> Self {
        Self {
            aspect_ratio: 16.0 / 9.0,
            corner_radius: "0.5rem".to_string(),
        }
    }
}

impl SurfaceLayout {
    /// Size `surface` to the width of `mount` at the fixed aspect ratio.
    ///
    /// Only acts while `surface` is still a child of `mount`; returns false
    /// otherwise. Safe to call any number of times.
    pub fn fit(&self, page: &Page, surface: ElementId, mount: ElementId) -> bool {
        if page.parent_of(surface) != Some(mount) {
            return false;
        }
        let Some(width) = page.client_width(mount) else {
            return false;
        };
        let height = width / self.aspect_ratio;
        page.set_style(surface, |style| {
            style.width = Some(width);
            style.height = Some(height);
            style.border_radius = Some(self.corner_radius.clone());
        })
    }

    /// Refit on every page resize until aborted, the surface is removed,
    /// or the page goes away.
    pub fn follow_resizes(&self, page: &Page, surface: ElementId, mount: ElementId) -> AbortHandle {
        let mut resizes = page.subscribe_resize();
        let page = page.downgrade();
        let layout = self.clone();
        let task = tokio::spawn(async move {
            loop {
                match resizes.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        let Some(page) = page.upgrade() else { break };
                        if !page.contains(surface) {
                            break;
                        }
                        layout.fit(&page, surface, mount);
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
        task.abort_handle()
    }
}
