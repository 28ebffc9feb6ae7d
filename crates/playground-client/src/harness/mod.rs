//! Execution harness.
//!
//! Turns a decoded module plus its glue into a running session mounted
//! under a page element, and guarantees at most one session per mount
//! point: starting a run stops whatever was running there first, before
//! the new module begins loading.

pub mod glue;
pub mod layout;
pub mod loader;
pub mod page;
pub mod session;

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::failure::Failure;

pub use glue::{GlueOutcome, ResultHandle, SENTINEL_MESSAGE};
pub use layout::SurfaceLayout;
pub use loader::{ExitCapability, HeadlessInstance, HeadlessLoader, Instance, ModuleLoader};
pub use page::{ElementId, Page, Style};
pub use session::RunSession;

/// Surface markers searched for after loading, in priority order.
pub const DEFAULT_MARKERS: [&str; 2] = ["App", "Bevy App"];

pub struct Harness {
    page: Page,
    loader: Arc<dyn ModuleLoader>,
    layout: SurfaceLayout,
    markers: Vec<String>,
    /// Held across a whole start so two starts on one page never interleave.
    sessions: Mutex<HashMap<ElementId, RunSession>>,
}

impl Harness {
    pub fn new(page: Page, loader: Arc<dyn ModuleLoader>) -> Self {
        Self {
            page,
            loader,
            layout: SurfaceLayout::default(),
            markers: DEFAULT_MARKERS.iter().map(|m| m.to_string()).collect(),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    pub fn with_layout(mut self, layout: SurfaceLayout) -> Self {
        self.layout = layout;
        self
    }

    pub fn with_markers<I, S>(mut self, markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.markers = markers.into_iter().map(Into::into).collect();
        self
    }

    pub fn page(&self) -> &Page {
        &self.page
    }

    /// Load and mount a program under `mount`.
    ///
    /// Any session already mounted there is stopped before loading starts.
    /// Loading is never cancelled once begun.
    pub async fn start(
        &self,
        glue_text: &str,
        module_bytes: Bytes,
        mount: ElementId,
    ) -> Result<RunSession, Failure> {
        let mut sessions = self.sessions.lock().await;
        if let Some(previous) = sessions.remove(&mount) {
            previous.stop();
        }

        if !self.page.contains(mount) {
            return Err(Failure::Load(format!("mount point {mount} does not exist")));
        }

        let program = glue::parse(glue_text).map_err(|e| {
            warn!(error = %e, "glue rejected");
            Failure::Load(e.to_string())
        })?;

        let handle = match glue::run(&program, module_bytes, self.loader.as_ref(), &self.page).await
        {
            GlueOutcome::Loaded(handle) => handle,
            GlueOutcome::SentinelDone(handle) => {
                debug!("glue finished early");
                handle
            }
            GlueOutcome::Failed(reason) => {
                warn!(reason = %reason, "load failed");
                return Err(Failure::Load(reason));
            }
        };

        let ResultHandle {
            instance,
            exit,
            surface: created,
            logs,
        } = handle;
        let Some(instance) = instance else {
            if let Some(surface) = created {
                self.page.remove(surface);
            }
            warn!("glue produced no instance");
            return Err(Failure::Load("the program did not start an instance".into()));
        };
        if exit.is_none() {
            debug!("instance exports no exit");
        }

        let surface = created.or_else(|| self.page.find_surface(self.markers.as_slice()));
        let (surface, follower) = match surface {
            Some(surface) if self.page.append_child(mount, surface) => {
                self.layout.fit(&self.page, surface, mount);
                let follower = self.layout.follow_resizes(&self.page, surface, mount);
                (Some(surface), Some(follower))
            }
            Some(surface) => {
                if created.is_some() {
                    self.page.remove(surface);
                }
                warn!(mount = %mount, surface = %surface, "surface could not be mounted");
                (None, None)
            }
            None => {
                debug!(mount = %mount, "no surface to mount");
                (None, None)
            }
        };

        let session = RunSession::new(
            self.page.clone(),
            mount,
            surface,
            instance,
            exit,
            logs,
            follower,
        );
        debug!(session = session.id(), mount = %mount, surface = ?surface, "session started");
        sessions.insert(mount, session.clone());
        Ok(session)
    }

    /// Stop `session` and forget it if it is still the one mounted.
    pub async fn stop(&self, session: &RunSession) {
        let mut sessions = self.sessions.lock().await;
        if sessions
            .get(&session.mount())
            .is_some_and(|current| current.same_as(session))
        {
            sessions.remove(&session.mount());
        }
        session.stop();
    }

    /// Session currently mounted under `mount`.
    pub async fn active(&self, mount: ElementId) -> Option<RunSession> {
        self.sessions.lock().await.get(&mount).cloned()
    }

    /// Stop whatever is mounted under `mount`.
    pub async fn unmount(&self, mount: ElementId) {
        if let Some(session) = self.sessions.lock().await.remove(&mount) {
            session.stop();
        }
    }
}
