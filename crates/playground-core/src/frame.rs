//! Compile response framing — three payloads in one HTTP body.
//!
//! A successful compile response carries the binary module, the glue code
//! and the build diagnostics back to back in a single body. Two byte counts
//! travel out-of-band in response headers; the diagnostic segment is not
//! length-prefixed and runs to end-of-body.
//!
//! ```text
//!   0            module_len     module_len+glue_len          len(body)
//!   ├── module ──┼──── glue ────┼──────── diagnostics ────────┤
//! ```
//!
//! Changing the header names or the segment order is a breaking change for
//! every deployed client and every cached entry.

use bytes::{BufMut, Bytes, BytesMut};

// ── Headers ───────────────────────────────────────────────────────────────────

/// Header carrying the byte length of the binary module segment.
pub const MODULE_LENGTH_HEADER: &str = "module-length";

/// Header carrying the byte length of the glue code segment.
pub const GLUE_LENGTH_HEADER: &str = "glue-length";

/// Content type used for framed bodies.
pub const FRAMED_CONTENT_TYPE: &str = "application/octet-stream";

// ── Types ─────────────────────────────────────────────────────────────────────

/// The two out-of-band segment lengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLengths {
    pub module_len: usize,
    pub glue_len: usize,
}

/// A decoded compile response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FramedResponse {
    /// The loadable binary module. Trusted as delivered by the backend.
    pub module_bytes: Bytes,
    /// Glue instructions that bind the module to a running instance.
    pub glue_text: String,
    /// Build diagnostics (compiler warnings and the like).
    pub diagnostic_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    #[error("frame lengths {module_len}+{glue_len} exceed body length {body_len}")]
    OutOfBounds {
        module_len: usize,
        glue_len: usize,
        body_len: usize,
    },

    #[error("missing {0} header")]
    MissingHeader(&'static str),

    #[error("invalid {0} header: {1:?}")]
    InvalidHeader(&'static str, String),
}

// ── Lengths ───────────────────────────────────────────────────────────────────

impl FrameLengths {
    pub fn new(module_len: usize, glue_len: usize) -> Self {
        Self {
            module_len,
            glue_len,
        }
    }

    /// Parse both lengths through a header lookup function.
    ///
    /// Values are decimal byte counts. Surrounding whitespace is tolerated,
    /// signs and fractions are not.
    pub fn from_headers<'a, F>(lookup: F) -> Result<Self, FrameError>
    where
        F: Fn(&str) -> Option<&'a str>,
    {
        let module_len = parse_length(&lookup, MODULE_LENGTH_HEADER)?;
        let glue_len = parse_length(&lookup, GLUE_LENGTH_HEADER)?;
        Ok(Self::new(module_len, glue_len))
    }

    /// Header name/value pairs for these lengths.
    pub fn to_headers(self) -> [(&'static str, String); 2] {
        [
            (MODULE_LENGTH_HEADER, self.module_len.to_string()),
            (GLUE_LENGTH_HEADER, self.glue_len.to_string()),
        ]
    }
}

fn parse_length<'a, F>(lookup: &F, name: &'static str) -> Result<usize, FrameError>
where
    F: Fn(&str) -> Option<&'a str>,
{
    let raw = lookup(name).ok_or(FrameError::MissingHeader(name))?;
    let trimmed = raw.trim();
    if trimmed.is_empty() || !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(FrameError::InvalidHeader(name, raw.to_string()));
    }
    trimmed
        .parse()
        .map_err(|_| FrameError::InvalidHeader(name, raw.to_string()))
}

// ── Encode / decode ───────────────────────────────────────────────────────────

/// Concatenate the three segments and report the lengths to send alongside.
pub fn encode(module: &[u8], glue: &str, diagnostic: &str) -> (FrameLengths, Bytes) {
    let mut body = BytesMut::with_capacity(module.len() + glue.len() + diagnostic.len());
    body.put_slice(module);
    body.put_slice(glue.as_bytes());
    body.put_slice(diagnostic.as_bytes());
    (FrameLengths::new(module.len(), glue.len()), body.freeze())
}

/// Split a framed body back into its segments.
///
/// The only check performed is that both declared segments fit inside the
/// body. Text segments are decoded lossily; their contents are not
/// validated here.
pub fn decode(body: Bytes, lengths: FrameLengths) -> Result<FramedResponse, FrameError> {
    let FrameLengths {
        module_len,
        glue_len,
    } = lengths;
    let body_len = body.len();

    let glue_end = module_len
        .checked_add(glue_len)
        .filter(|end| *end <= body_len)
        .ok_or(FrameError::OutOfBounds {
            module_len,
            glue_len,
            body_len,
        })?;

    let module_bytes = body.slice(..module_len);
    let glue_text = String::from_utf8_lossy(&body[module_len..glue_end]).into_owned();
    let diagnostic_text = String::from_utf8_lossy(&body[glue_end..]).into_owned();

    Ok(FramedResponse {
        module_bytes,
        glue_text,
        diagnostic_text,
    })
}

impl FramedResponse {
    /// Encode this response; inverse of [`decode`].
    pub fn encode(&self) -> (FrameLengths, Bytes) {
        encode(&self.module_bytes, &self.glue_text, &self.diagnostic_text)
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
