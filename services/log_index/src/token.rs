//! Fixed-width binary identifiers used by every table in a log file.
//!
//! Tokens are compared on their raw bytes and only rendered as lowercase hex
//! at the API boundary (logs, JSON output, configuration).

use crate::error::{IndexError, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Width of every token stored in a log file, in bytes
pub const TOKEN_LEN: usize = 8;

/// Opaque identity of a frame, track, scene, pose or sensor row
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token([u8; TOKEN_LEN]);

impl Token {
    pub const fn new(bytes: [u8; TOKEN_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse the hex form produced by [`Token::to_hex`]
    pub fn from_hex(text: &str) -> Result<Self> {
        let bytes = hex::decode(text.trim())
            .map_err(|e| IndexError::InvalidToken(format!("{text:?}: {e}")))?;
        Self::from_slice(&bytes).map_err(|_| {
            IndexError::InvalidToken(format!(
                "{text:?}: expected {} hex characters, got {}",
                TOKEN_LEN * 2,
                text.trim().len()
            ))
        })
    }

    /// Build a token from a raw BLOB column value
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; TOKEN_LEN] = bytes.try_into().map_err(|_| {
            IndexError::InvalidToken(format!(
                "expected {TOKEN_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        Ok(Self(raw))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<u64> for Token {
    /// Big-endian so that numeric order matches byte order
    fn from(value: u64) -> Self {
        Self(value.to_be_bytes())
    }
}

impl FromStr for Token {
    type Err = IndexError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token({})", self.to_hex())
    }
}

impl Serialize for Token {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Token::from_hex(&s).map_err(serde::de::Error::custom)
    }
}
