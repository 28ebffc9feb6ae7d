//! Module loading seam.
//!
//! A [`ModuleLoader`] turns delivered module bytes into a live
//! [`Instance`]. The harness never inspects the module itself.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use async_trait::async_trait;
use bytes::Bytes;

/// WebAssembly binary preamble: `\0asm` then version 1.
const WASM_MAGIC: [u8; 4] = *b"\0asm";
const WASM_VERSION: [u8; 4] = [0x01, 0x00, 0x00, 0x00];

/// A running module.
pub trait Instance: Send + Sync + 'static {
    /// Ask the instance to shut down.
    fn exit(&self);
}

/// The `exit` export of an instance, bound by glue code.
#[derive(Clone)]
pub struct ExitCapability {
    instance: Arc<dyn Instance>,
}

impl ExitCapability {
    pub fn new(instance: Arc<dyn Instance>) -> Self {
        Self { instance }
    }

    pub fn invoke(&self) {
        self.instance.exit();
    }
}

impl std::fmt::Debug for ExitCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ExitCapability")
    }
}

#[async_trait]
pub trait ModuleLoader: Send + Sync {
    async fn instantiate(&self, module: Bytes) -> Result<Arc<dyn Instance>>;
}

// ── Headless ──────────────────────────────────────────────────────────────────

/// Inert instance that only records exit requests.
#[derive(Debug, Default)]
pub struct HeadlessInstance {
    module_len: usize,
    exits: AtomicUsize,
}

impl HeadlessInstance {
    pub fn module_len(&self) -> usize {
        self.module_len
    }

    pub fn exit_count(&self) -> usize {
        self.exits.load(Ordering::SeqCst)
    }
}

impl Instance for HeadlessInstance {
    fn exit(&self) {
        let n = self.exits.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(exits = n, "headless instance exit");
    }
}

/// Validates the module preamble and hands back a [`HeadlessInstance`].
/// Keeps every instance it created so callers can inspect them.
#[derive(Default)]
pub struct HeadlessLoader {
    created: Mutex<Vec<Arc<HeadlessInstance>>>,
}

impl HeadlessLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn instances(&self) -> Vec<Arc<HeadlessInstance>> {
        self.created
            .lock()
            .map(|created| created.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ModuleLoader for HeadlessLoader {
    async fn instantiate(&self, module: Bytes) -> Result<Arc<dyn Instance>> {
        check_preamble(&module)?;
        let instance = Arc::new(HeadlessInstance {
            module_len: module.len(),
            exits: AtomicUsize::new(0),
        });
        if let Ok(mut created) = self.created.lock() {
            created.push(instance.clone());
        }
        Ok(instance)
    }
}

fn check_preamble(module: &[u8]) -> Result<()> {
    if module.len() < 8 {
        bail!("module is {} bytes, too short to be a module", module.len());
    }
    if module[0..4] != WASM_MAGIC {
        bail!("module does not start with the wasm magic number");
    }
    if module[4..8] != WASM_VERSION {
        bail!("unsupported module version {:02x?}", &module[4..8]);
    }
    Ok(())
}
