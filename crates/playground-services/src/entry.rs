//! Cache entry codec.
//!
//! An entry is a backend response frozen at the moment it was stored: the
//! status, the few headers a client needs to re-derive segment boundaries,
//! and the body, byte for byte. Entries are immutable once written.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//!   "PGCE" | version u8 | status u16 | header count u16
//!   { name len u16 | name | value len u16 | value } * count
//!   body (to end)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use playground_core::frame::{GLUE_LENGTH_HEADER, MODULE_LENGTH_HEADER};

const MAGIC: &[u8; 4] = b"PGCE";
const ENTRY_VERSION: u8 = 0x01;

/// Response headers that survive into the cache. Everything else is
/// regenerated by the gateway on replay.
pub const KEPT_HEADERS: [&str; 5] = [
    "content-type",
    "content-encoding",
    "retry-after",
    MODULE_LENGTH_HEADER,
    GLUE_LENGTH_HEADER,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EntryError {
    #[error("entry truncated while reading {0}")]
    Truncated(&'static str),
    #[error("bad entry magic")]
    BadMagic,
    #[error("unsupported entry version: 0x{0:02x}")]
    UnsupportedVersion(u8),
    #[error("header {0} is not valid utf-8")]
    InvalidHeader(&'static str),
    #[error("header {0} too long to encode")]
    HeaderTooLong(String),
}

impl CacheEntry {
    /// Build an entry, keeping only [`KEPT_HEADERS`].
    pub fn new<'a, I>(status: u16, headers: I, body: Bytes) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let headers = headers
            .into_iter()
            .filter_map(|(name, value)| {
                let name = name.to_ascii_lowercase();
                KEPT_HEADERS
                    .contains(&name.as_str())
                    .then(|| (name, value.to_string()))
            })
            .collect();
        Self {
            status,
            headers,
            body,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn encode(&self) -> Result<Bytes, EntryError> {
        let mut buf = BytesMut::with_capacity(16 + self.body.len());
        buf.put_slice(MAGIC);
        buf.put_u8(ENTRY_VERSION);
        buf.put_u16(self.status);
        let count = u16::try_from(self.headers.len())
            .map_err(|_| EntryError::HeaderTooLong("<count>".into()))?;
        buf.put_u16(count);
        for (name, value) in &self.headers {
            put_str(&mut buf, name, name)?;
            put_str(&mut buf, name, value)?;
        }
        buf.put_slice(&self.body);
        Ok(buf.freeze())
    }

    pub fn decode(mut raw: Bytes) -> Result<Self, EntryError> {
        if raw.remaining() < MAGIC.len() + 1 + 2 + 2 {
            return Err(EntryError::Truncated("preamble"));
        }
        if &raw[..MAGIC.len()] != MAGIC {
            return Err(EntryError::BadMagic);
        }
        raw.advance(MAGIC.len());
        let version = raw.get_u8();
        if version != ENTRY_VERSION {
            return Err(EntryError::UnsupportedVersion(version));
        }
        let status = raw.get_u16();
        let count = raw.get_u16();

        let mut headers = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let name = take_str(&mut raw, "name")?;
            let value = take_str(&mut raw, "value")?;
            headers.push((name, value));
        }

        Ok(Self {
            status,
            headers,
            body: raw,
        })
    }
}

fn put_str(buf: &mut BytesMut, name: &str, s: &str) -> Result<(), EntryError> {
    let len = u16::try_from(s.len()).map_err(|_| EntryError::HeaderTooLong(name.to_string()))?;
    buf.put_u16(len);
    buf.put_slice(s.as_bytes());
    Ok(())
}

fn take_str(raw: &mut Bytes, what: &'static str) -> Result<String, EntryError> {
    if raw.remaining() < 2 {
        return Err(EntryError::Truncated(what));
    }
    let len = raw.get_u16() as usize;
    if raw.remaining() < len {
        return Err(EntryError::Truncated(what));
    }
    let bytes = raw.split_to(len);
    String::from_utf8(bytes.to_vec()).map_err(|_| EntryError::InvalidHeader(what))
}
