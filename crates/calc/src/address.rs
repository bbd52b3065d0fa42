use std::fmt;

use thiserror::Error;

/// Shortest base58 rendering of a 32-byte public key.
pub const MIN_ADDRESS_LEN: usize = 32;
const PUBKEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is {0} characters, expected at least {MIN_ADDRESS_LEN}")]
    TooShort(usize),
    #[error("address is not valid base58")]
    NotBase58,
    #[error("address decodes to {0} bytes, expected {PUBKEY_LEN}")]
    WrongLength(usize),
}

/// A validated account authority, kept in its base58 form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Authority(String);

impl Authority {
    /// `Ok(None)` for blank input: nothing entered yet is not an error.
    pub fn parse(raw: &str) -> Result<Option<Self>, AddressError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if trimmed.len() < MIN_ADDRESS_LEN {
            return Err(AddressError::TooShort(trimmed.len()));
        }

        let bytes = bs58::decode(trimmed)
            .into_vec()
            .map_err(|_| AddressError::NotBase58)?;
        if bytes.len() != PUBKEY_LEN {
            return Err(AddressError::WrongLength(bytes.len()));
        }

        Ok(Some(Self(trimmed.to_owned())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Authority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
