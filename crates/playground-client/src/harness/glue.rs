//! Glue instructions.
//!
//! Glue text delivered next to a module is not code. It is a short list
//! of instructions, one per line, that bind the module to the page:
//!
//! ```text
//! # comments and blank lines are ignored
//! instantiate          load the module into a live instance
//! surface App          create a visual surface marked `alt="App"`
//! export exit          bind the instance's exit capability
//! log <text>           record a line of instance output
//! finish               stop here; loading completed normally
//! throw <message>      stop here; loading failed
//! ```
//!
//! Running a program yields a [`GlueOutcome`]. A `throw` whose message
//! starts with [`SENTINEL_MESSAGE`] is an older way of spelling `finish`
//! and is reported as [`GlueOutcome::SentinelDone`]; every other `throw`
//! is a failure.

use std::sync::Arc;

use bytes::Bytes;

use super::loader::{ExitCapability, Instance, ModuleLoader};
use super::page::{ElementId, Page, MARKER_ATTR, SURFACE_TAG};

/// Prefix of the control-flow "error" some glue emits on normal completion.
pub const SENTINEL_MESSAGE: &str =
    "Using exceptions for control flow, don't mind me. This isn't actually an error!";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    Instantiate,
    Surface(String),
    ExportExit,
    Log(String),
    Finish,
    Throw(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GlueError {
    #[error("line {line}: unknown instruction {word:?}")]
    UnknownInstruction { line: usize, word: String },
    #[error("line {line}: {instruction} needs an argument")]
    MissingArgument { line: usize, instruction: &'static str },
    #[error("line {line}: cannot export {name:?}")]
    UnknownExport { line: usize, name: String },
}

/// What a glue program left behind.
#[derive(Default)]
pub struct ResultHandle {
    pub instance: Option<Arc<dyn Instance>>,
    pub exit: Option<ExitCapability>,
    /// Surface the program created, still attached to the page body.
    pub surface: Option<ElementId>,
    pub logs: Vec<String>,
}

pub enum GlueOutcome {
    /// The program ran to its last instruction.
    Loaded(ResultHandle),
    /// The program stopped early through `finish` or the sentinel throw.
    SentinelDone(ResultHandle),
    /// Loading failed. Anything the program created has been torn down.
    Failed(String),
}

impl std::fmt::Debug for GlueOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GlueOutcome::Loaded(_) => f.write_str("Loaded"),
            GlueOutcome::SentinelDone(_) => f.write_str("SentinelDone"),
            GlueOutcome::Failed(reason) => write!(f, "Failed({reason:?})"),
        }
    }
}

// ── Parsing ───────────────────────────────────────────────────────────────────

pub fn parse(text: &str) -> Result<Vec<Instruction>, GlueError> {
    let mut program = Vec::new();
    for (index, raw) in text.lines().enumerate() {
        let line = index + 1;
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let (word, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (trimmed, ""),
        };
        let instruction = match word {
            "instantiate" => Instruction::Instantiate,
            "finish" => Instruction::Finish,
            "surface" => Instruction::Surface(argument(rest, line, "surface")?),
            "log" => Instruction::Log(rest.to_string()),
            "throw" => Instruction::Throw(argument(rest, line, "throw")?),
            "export" => match argument(rest, line, "export")?.as_str() {
                "exit" => Instruction::ExportExit,
                other => {
                    return Err(GlueError::UnknownExport {
                        line,
                        name: other.to_string(),
                    })
                }
            },
            other => {
                return Err(GlueError::UnknownInstruction {
                    line,
                    word: other.to_string(),
                })
            }
        };
        program.push(instruction);
    }
    Ok(program)
}

fn argument(rest: &str, line: usize, instruction: &'static str) -> Result<String, GlueError> {
    if rest.is_empty() {
        Err(GlueError::MissingArgument { line, instruction })
    } else {
        Ok(rest.to_string())
    }
}

// ── Running ───────────────────────────────────────────────────────────────────

/// Execute `program` against `module`. Sequential; no step runs in parallel
/// with another.
pub async fn run(
    program: &[Instruction],
    module: Bytes,
    loader: &dyn ModuleLoader,
    page: &Page,
) -> GlueOutcome {
    let mut handle = ResultHandle::default();
    for instruction in program {
        match instruction {
            Instruction::Instantiate => {
                if handle.instance.is_some() {
                    return fail(handle, page, "module instantiated twice".into());
                }
                match loader.instantiate(module.clone()).await {
                    Ok(instance) => handle.instance = Some(instance),
                    Err(e) => return fail(handle, page, format!("{e:#}")),
                }
            }
            Instruction::Surface(marker) => {
                if handle.instance.is_none() {
                    return fail(handle, page, "surface requested before instantiate".into());
                }
                if let Some(previous) = handle.surface.take() {
                    page.remove(previous);
                }
                let surface = page.create_element(SURFACE_TAG, &[(MARKER_ATTR, marker.as_str())]);
                page.append_child(page.body(), surface);
                handle.surface = Some(surface);
            }
            Instruction::ExportExit => {
                let Some(instance) = handle.instance.clone() else {
                    return fail(handle, page, "exit exported before instantiate".into());
                };
                handle.exit = Some(ExitCapability::new(instance));
            }
            Instruction::Log(text) => handle.logs.push(text.clone()),
            Instruction::Finish => return GlueOutcome::SentinelDone(handle),
            Instruction::Throw(message) if message.starts_with(SENTINEL_MESSAGE) => {
                return GlueOutcome::SentinelDone(handle)
            }
            Instruction::Throw(message) => return fail(handle, page, message.clone()),
        }
    }
    GlueOutcome::Loaded(handle)
}

/// Tear down what the program built so far and report `reason`.
fn fail(handle: ResultHandle, page: &Page, reason: String) -> GlueOutcome {
    if let Some(instance) = &handle.instance {
        instance.exit();
    }
    if let Some(surface) = handle.surface {
        page.remove(surface);
    }
    GlueOutcome::Failed(reason)
}
