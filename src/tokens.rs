//! Opaque lexer token caches.
//!
//! Deferred inline bodies and default arguments travel as raw token runs
//! that the front end re-lexes when it finally needs them. The engine
//! does not interpret them; a run is a serde payload encoded with bincode
//! and stored length-prefixed in the record stream.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreepackError};

/// One saved lexer token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The lexer's token kind code.
    pub kind: u16,
    /// Lexer flag bits.
    pub flags: u8,
    /// The token's spelling.
    pub text: String,
}

/// An unlexed token run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenCache {
    /// The tokens in source order.
    pub tokens: Vec<Token>,
}

impl TokenCache {
    /// Number of saved tokens.
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// True if the run holds no tokens.
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Encodes the run to the blob form stored in record streams.
    pub fn to_blob(&self) -> Result<Vec<u8>> {
        bincode::serde::encode_to_vec(self, bincode::config::standard())
            .map_err(|e| TreepackError::Serialization(e.to_string()))
    }

    /// Decodes a run from its stored blob form.
    pub fn from_blob(bytes: &[u8]) -> Result<Self> {
        let (cache, _) =
            bincode::serde::decode_from_slice(bytes, bincode::config::standard())
                .map_err(|e| TreepackError::Serialization(e.to_string()))?;
        Ok(cache)
    }
}
