//! One running program attached to one mount point.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tokio::task::AbortHandle;
use tracing::debug;

use super::loader::{ExitCapability, Instance};
use super::page::{ElementId, Page};

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

struct SessionInner {
    id: u64,
    page: Page,
    mount: ElementId,
    surface: Option<ElementId>,
    instance: Arc<dyn Instance>,
    exit: Option<ExitCapability>,
    logs: Vec<String>,
    resize_follower: Option<AbortHandle>,
    stopped: AtomicBool,
}

/// Handle to a run. Clones refer to the same run; stopping any clone stops
/// them all.
#[derive(Clone)]
pub struct RunSession {
    inner: Arc<SessionInner>,
}

impl RunSession {
    pub(crate) fn new(
        page: Page,
        mount: ElementId,
        surface: Option<ElementId>,
        instance: Arc<dyn Instance>,
        exit: Option<ExitCapability>,
        logs: Vec<String>,
        resize_follower: Option<AbortHandle>,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                id: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
                page,
                mount,
                surface,
                instance,
                exit,
                logs,
                resize_follower,
                stopped: AtomicBool::new(false),
            }),
        }
    }

    pub fn id(&self) -> u64 {
        self.inner.id
    }

    pub fn mount(&self) -> ElementId {
        self.inner.mount
    }

    pub fn surface(&self) -> Option<ElementId> {
        self.inner.surface
    }

    pub fn instance(&self) -> &Arc<dyn Instance> {
        &self.inner.instance
    }

    /// Output the glue recorded while loading.
    pub fn logs(&self) -> &[String] {
        &self.inner.logs
    }

    pub fn is_active(&self) -> bool {
        !self.inner.stopped.load(Ordering::SeqCst)
    }

    /// Invoke the exit capability, stop following resizes, detach the
    /// surface. Only the first call on a session does anything.
    pub fn stop(&self) {
        if self.inner.stopped.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Some(exit) = &self.inner.exit {
            exit.invoke();
        }
        if let Some(follower) = &self.inner.resize_follower {
            follower.abort();
        }
        if let Some(surface) = self.inner.surface {
            self.inner.page.remove(surface);
        }
        debug!(session = self.inner.id, mount = %self.inner.mount, "session stopped");
    }

    pub(crate) fn same_as(&self, other: &RunSession) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl std::fmt::Debug for RunSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunSession")
            .field("id", &self.inner.id)
            .field("mount", &self.inner.mount)
            .field("surface", &self.inner.surface)
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harness::loader::HeadlessInstance;
    use crate::harness::page::{MARKER_ATTR, SURFACE_TAG};

    fn session(page: &Page, with_exit: bool) -> (RunSession, Arc<HeadlessInstance>) {
        let mount = page.create_container(640.0);
        let surface = page.create_element(SURFACE_TAG, &[(MARKER_ATTR, "App")]);
        page.append_child(mount, surface);
        let instance = Arc::new(HeadlessInstance::default());
        let exit = with_exit.then(|| ExitCapability::new(instance.clone()));
        let session = RunSession::new(
            page.clone(),
            mount,
            Some(surface),
            instance.clone(),
            exit,
            Vec::new(),
            None,
        );
        (session, instance)
    }

    #[test]
    fn stop_is_idempotent() {
        let page = Page::new();
        let (session, instance) = session(&page, true);
        let surface = session.surface().unwrap();

        session.stop();
        session.stop();
        session.clone().stop();

        assert_eq!(instance.exit_count(), 1);
        assert!(!page.contains(surface));
        assert!(!session.is_active());
    }

    #[test]
    fn stop_without_exit_still_detaches() {
        let page = Page::new();
        let (session, instance) = session(&page, false);
        session.stop();
        assert_eq!(instance.exit_count(), 0);
        assert!(page.surfaces().is_empty());
    }

    #[test]
    fn ids_are_unique() {
        let page = Page::new();
        let (a, _) = session(&page, true);
        let (b, _) = session(&page, true);
        assert_ne!(a.id(), b.id());
        assert!(a.same_as(&a.clone()));
        assert!(!a.same_as(&b));
    }
}
