//! Submit-and-run facade.
//!
//! [`Playground`] owns one mount point. Each [`Playground::run`] tears down
//! whatever was playing, compiles the request, and starts the result, moving
//! through [`PlaygroundState`] so a UI can follow along.

use tokio::sync::watch;
use tracing::{info, warn};

use playground_core::{CompileRequest, FramedResponse};

use crate::compile::CompileClient;
use crate::failure::Failure;
use crate::harness::{ElementId, Harness, RunSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaygroundState {
    #[default]
    Idle,
    Loading,
    Playing,
}

/// What a successful run hands back to the caller.
#[derive(Debug, Clone)]
pub struct RunReport {
    /// Build output, empty when the build was clean.
    pub diagnostics: String,
    /// Lines the program logged while loading.
    pub logs: Vec<String>,
    pub cache_status: Option<String>,
    pub session: RunSession,
}

pub struct Playground {
    client: CompileClient,
    harness: Harness,
    mount: ElementId,
    state: watch::Sender<PlaygroundState>,
}

impl Playground {
    pub fn new(client: CompileClient, harness: Harness, mount: ElementId) -> Self {
        let (state, _) = watch::channel(PlaygroundState::Idle);
        Self {
            client,
            harness,
            mount,
            state,
        }
    }

    pub fn state(&self) -> PlaygroundState {
        *self.state.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlaygroundState> {
        self.state.subscribe()
    }

    pub fn harness(&self) -> &Harness {
        &self.harness
    }

    pub fn mount(&self) -> ElementId {
        self.mount
    }

    /// Stop the current program, compile `request`, and start the result.
    ///
    /// On any failure the mount is left empty and the state returns to
    /// `Idle`.
    pub async fn run(&self, request: &CompileRequest) -> Result<RunReport, Failure> {
        self.harness.unmount(self.mount).await;
        self.state.send_replace(PlaygroundState::Loading);

        let output = match self.client.compile(request).await {
            Ok(output) => output,
            Err(failure) => {
                warn!(error = %failure, "compile failed");
                self.state.send_replace(PlaygroundState::Idle);
                return Err(failure);
            }
        };

        let mut report = self.start(&output.framed).await?;
        report.cache_status = output.cache_status;
        Ok(report)
    }

    /// Start an already-fetched response, replacing whatever is playing.
    pub async fn load(&self, framed: &FramedResponse) -> Result<RunReport, Failure> {
        self.harness.unmount(self.mount).await;
        self.state.send_replace(PlaygroundState::Loading);
        self.start(framed).await
    }

    async fn start(&self, framed: &FramedResponse) -> Result<RunReport, Failure> {
        let started = self
            .harness
            .start(&framed.glue_text, framed.module_bytes.clone(), self.mount)
            .await;
        match started {
            Ok(session) => {
                self.state.send_replace(PlaygroundState::Playing);
                info!(session = session.id(), module = framed.module_bytes.len(), "playing");
                Ok(RunReport {
                    diagnostics: framed.diagnostic_text.clone(),
                    logs: session.logs().to_vec(),
                    cache_status: None,
                    session,
                })
            }
            Err(failure) => {
                self.state.send_replace(PlaygroundState::Idle);
                Err(failure)
            }
        }
    }

    /// Stop whatever is playing.
    pub async fn stop(&self) {
        self.harness.unmount(self.mount).await;
        self.state.send_replace(PlaygroundState::Idle);
    }

    /// Tear down for good.
    pub async fn unmount(self) {
        self.stop().await;
    }
}
