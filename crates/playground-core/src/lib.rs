//! playground-core — shared types for the compile playground: the error
//! taxonomy, the three-segment response framing, request identity and
//! cache keys. All other playground crates depend on this one.

pub mod config;
pub mod error;
pub mod frame;
pub mod key;
pub mod request;

pub use error::{ErrorKind, ErrorReport, RetryGuidance};
pub use frame::{FrameError, FrameLengths, FramedResponse};
pub use key::{CacheKey, StoreKey};
pub use request::{CompileRequest, RequestFormat, TargetVersion, ToolchainChannel};
