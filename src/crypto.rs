//! Cryptographic primitives: asymmetric keys, signatures and hashing.

pub mod asymmetric_key;
pub mod hash;

use thiserror::Error;

/// Cryptographic errors.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum Error {
    /// Asymmetric key or signature bytes failed to parse.
    #[error("asymmetric key error: {0}")]
    AsymmetricKey(String),

    /// Hex decoding failed.
    #[error("hex decoding error: {0}")]
    FromHex(#[from] hex::FromHexError),

    /// Signature verification failed.
    #[error("signature verification failed")]
    SignatureError,
}

impl From<ed25519_dalek::SignatureError> for Error {
    fn from(error: ed25519_dalek::SignatureError) -> Self {
        Error::AsymmetricKey(error.to_string())
    }
}

/// A result whose error is [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
