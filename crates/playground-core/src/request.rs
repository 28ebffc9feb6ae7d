//! Compile request model.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::key::CacheKey;

/// Framework version the source is compiled against.
///
/// Newest versions go last so keys derived from earlier variants stay put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TargetVersion {
    #[serde(rename = "main")]
    Main,
    #[serde(rename = "0.14")]
    V0_14,
    #[serde(rename = "0.15")]
    V0_15,
    #[default]
    #[serde(rename = "0.16")]
    V0_16,
}

/// Toolchain channel used for the build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ToolchainChannel {
    #[default]
    #[serde(rename = "stable")]
    Stable,
    #[serde(rename = "nightly")]
    Nightly,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {what} {value:?}")]
pub struct ParseRequestError {
    what: &'static str,
    value: String,
}

impl TargetVersion {
    pub const ALL: [TargetVersion; 4] = [
        TargetVersion::Main,
        TargetVersion::V0_14,
        TargetVersion::V0_15,
        TargetVersion::V0_16,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TargetVersion::Main => "main",
            TargetVersion::V0_14 => "0.14",
            TargetVersion::V0_15 => "0.15",
            TargetVersion::V0_16 => "0.16",
        }
    }
}

impl fmt::Display for TargetVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TargetVersion {
    type Err = ParseRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TargetVersion::ALL
            .into_iter()
            .find(|v| v.as_str() == s)
            .ok_or_else(|| ParseRequestError {
                what: "version",
                value: s.to_string(),
            })
    }
}

impl ToolchainChannel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ToolchainChannel::Stable => "stable",
            ToolchainChannel::Nightly => "nightly",
        }
    }
}

impl fmt::Display for ToolchainChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ToolchainChannel {
    type Err = ParseRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stable" => Ok(ToolchainChannel::Stable),
            "nightly" => Ok(ToolchainChannel::Nightly),
            other => Err(ParseRequestError {
                what: "channel",
                value: other.to_string(),
            }),
        }
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// How a request is laid out on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestFormat {
    /// Body is the source text; version and channel are path segments.
    #[default]
    Raw,
    /// Body is a JSON envelope posted to `/compile`.
    Json,
}

/// A compile submission. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompileRequest {
    #[serde(rename = "code")]
    source: String,
    #[serde(rename = "version")]
    target_version: TargetVersion,
    #[serde(rename = "channel")]
    toolchain_channel: ToolchainChannel,
}

impl CompileRequest {
    pub fn new(
        source: impl Into<String>,
        target_version: TargetVersion,
        toolchain_channel: ToolchainChannel,
    ) -> Self {
        Self {
            source: source.into(),
            target_version,
            toolchain_channel,
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn target_version(&self) -> TargetVersion {
        self.target_version
    }

    pub fn toolchain_channel(&self) -> ToolchainChannel {
        self.toolchain_channel
    }

    /// Request path for the given format.
    pub fn route(&self, format: RequestFormat) -> String {
        match format {
            RequestFormat::Raw => format!("/{}/{}", self.target_version, self.toolchain_channel),
            RequestFormat::Json => "/compile".to_string(),
        }
    }

    /// Serialized body for the given format.
    pub fn body(&self, format: RequestFormat) -> Vec<u8> {
        match format {
            RequestFormat::Raw => self.source.as_bytes().to_vec(),
            // Strings and unit enums always serialize.
            RequestFormat::Json => serde_json::to_vec(self).unwrap_or_default(),
        }
    }

    /// Identity of this request: `SHA256(source ++ version ++ channel)`.
    ///
    /// Matches the key a gateway derives for a raw-format submission.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::compute(
            self.source.as_bytes(),
            [self.target_version.as_str(), self.toolchain_channel.as_str()],
        )
    }
}
