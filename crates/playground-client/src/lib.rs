//! playground-client — submit source to the compile service and run what
//! comes back.
//!
//! [`CompileClient`] performs the round trip and decodes the framed body;
//! [`Harness`] turns the decoded module and glue into at most one running
//! instance per mount point; [`Playground`] ties the two together.

pub mod compile;
pub mod failure;
pub mod harness;
pub mod playground;

pub use compile::{CompileClient, CompileOutput};
pub use failure::Failure;
pub use harness::{
    ElementId, ExitCapability, GlueOutcome, Harness, HeadlessLoader, Instance, ModuleLoader, Page,
    RunSession, SurfaceLayout,
};
pub use playground::{Playground, PlaygroundState, RunReport};
