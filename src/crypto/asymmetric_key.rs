//! Asymmetric-key types and functions.

use std::{
    cmp::Ordering,
    fmt::{self, Debug, Display, Formatter},
    hash::{Hash, Hasher},
};

use datasize::DataSize;
use ed25519_dalek::{self as ed25519, ExpandedSecretKey, Verifier};
use hex_fmt::HexFmt;
use serde::{Deserialize, Serialize};
use signature::Signature as Sig;

use super::{Error, Result};
use crate::crypto::hash::Digest;

/// A secret or private asymmetric key.
#[derive(Serialize, Deserialize)]
pub struct SecretKey(ed25519::SecretKey);

impl SecretKey {
    /// The length in bytes of an Ed25519 secret key.
    pub const ED25519_LENGTH: usize = ed25519::SECRET_KEY_LENGTH;

    /// Constructs a new Ed25519 variant from a byte array.
    pub fn new_ed25519(bytes: [u8; Self::ED25519_LENGTH]) -> Self {
        // safe to unwrap as `SecretKey::from_bytes` can only fail if the provided slice is the
        // wrong length.
        SecretKey(ed25519::SecretKey::from_bytes(&bytes).unwrap())
    }

    /// Constructs a new Ed25519 variant from a byte slice.
    pub fn ed25519_from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        Ok(SecretKey(ed25519::SecretKey::from_bytes(bytes.as_ref())?))
    }

    /// Constructs a new Ed25519 variant using the operating system's cryptographically secure
    /// random number generator.
    pub fn generate_ed25519() -> Self {
        let mut bytes = [0u8; Self::ED25519_LENGTH];
        getrandom::getrandom(&mut bytes[..]).expect("RNG failure!");
        SecretKey::new_ed25519(bytes)
    }

    /// Exposes the secret values of the key as a byte slice.
    pub fn as_secret_slice(&self) -> &[u8] {
        self.0.as_ref()
    }

    /// Duplicates a secret key.
    ///
    /// Only available for testing and named other than `clone` to prevent accidental use.
    #[cfg(test)]
    pub fn duplicate(&self) -> Self {
        Self::ed25519_from_bytes(self.as_secret_slice()).expect("could not copy secret key")
    }
}

impl DataSize for SecretKey {
    const IS_DYNAMIC: bool = false;
    const STATIC_HEAP_SIZE: usize = 0;

    fn estimate_heap_size(&self) -> usize {
        0
    }
}

impl Debug for SecretKey {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "SecretKey")
    }
}

impl Display for SecretKey {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        Debug::fmt(self, formatter)
    }
}

/// A public asymmetric key.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey(ed25519::PublicKey);

impl PublicKey {
    /// The length in bytes of an Ed25519 public key.
    pub const ED25519_LENGTH: usize = ed25519::PUBLIC_KEY_LENGTH;

    /// Constructs a new Ed25519 variant from a byte slice.
    pub fn ed25519_from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        Ok(PublicKey(ed25519::PublicKey::from_bytes(bytes.as_ref())?))
    }

    /// Parses a public key from its hex representation.
    pub fn from_hex<T: AsRef<[u8]>>(hex_input: T) -> Result<Self> {
        let bytes = hex::decode(hex_input)?;
        Self::ed25519_from_bytes(bytes)
    }

    /// Exposes the public key as a byte slice.
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }

    /// Returns the hex representation of the key.
    pub fn to_hex(&self) -> String {
        hex::encode(self.as_bytes())
    }
}

impl From<&SecretKey> for PublicKey {
    fn from(secret_key: &SecretKey) -> Self {
        PublicKey(ed25519::PublicKey::from(&secret_key.0))
    }
}

impl DataSize for PublicKey {
    const IS_DYNAMIC: bool = false;
    const STATIC_HEAP_SIZE: usize = 0;

    fn estimate_heap_size(&self) -> usize {
        0
    }
}

impl Ord for PublicKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.as_bytes().cmp(other.as_bytes())
    }
}

impl PartialOrd for PublicKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Hash for PublicKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.as_bytes().hash(state)
    }
}

impl Debug for PublicKey {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "PublicKey({})", HexFmt(self.as_bytes()))
    }
}

impl Display for PublicKey {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "{:10}", HexFmt(self.as_bytes()))
    }
}

/// A signature over a piece of data.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature(ed25519::Signature);

impl Signature {
    /// Constructs a new Ed25519 variant from a byte slice.
    pub fn ed25519_from_bytes<T: AsRef<[u8]>>(bytes: T) -> Result<Self> {
        Ok(Signature(ed25519::Signature::from_bytes(bytes.as_ref())?))
    }

    /// Exposes the signature as raw bytes.
    pub fn to_bytes(&self) -> [u8; ed25519::SIGNATURE_LENGTH] {
        self.0.to_bytes()
    }
}

impl DataSize for Signature {
    const IS_DYNAMIC: bool = false;
    const STATIC_HEAP_SIZE: usize = 0;

    fn estimate_heap_size(&self) -> usize {
        0
    }
}

impl Debug for Signature {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "Signature({})", HexFmt(&self.to_bytes()))
    }
}

impl Display for Signature {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "{:10}", HexFmt(&self.to_bytes()))
    }
}

/// Signs the given message using the given key pair.
pub fn sign<T: AsRef<[u8]>>(
    message: T,
    secret_key: &SecretKey,
    public_key: &PublicKey,
) -> Signature {
    let expanded_secret_key = ExpandedSecretKey::from(&secret_key.0);
    Signature(expanded_secret_key.sign(message.as_ref(), &public_key.0))
}

/// Verifies the signature of the given message against the given public key.
pub fn verify<T: AsRef<[u8]>>(
    message: T,
    signature: &Signature,
    public_key: &PublicKey,
) -> Result<()> {
    public_key
        .0
        .verify(message.as_ref(), &signature.0)
        .map_err(|_| Error::SignatureError)
}

/// A validator's signing identity: the public key it is bonded under and the matching secret key.
#[derive(DataSize, Debug)]
pub struct ValidatorIdentity {
    /// The validator's public key.
    pub public_key: PublicKey,
    /// The validator's secret key.
    pub secret_key: SecretKey,
}

impl ValidatorIdentity {
    /// Creates a validator identity from a secret key.
    pub fn new(secret_key: SecretKey) -> Self {
        let public_key = PublicKey::from(&secret_key);
        ValidatorIdentity {
            public_key,
            secret_key,
        }
    }

    /// Signs the given digest with this identity's secret key.
    pub fn sign(&self, digest: &Digest) -> Signature {
        sign(digest, &self.secret_key, &self.public_key)
    }
}

impl Display for ValidatorIdentity {
    fn fmt(&self, formatter: &mut Formatter) -> fmt::Result {
        write!(formatter, "validator {}", self.public_key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_and_verify_roundtrip() {
        let secret_key = SecretKey::generate_ed25519();
        let public_key = PublicKey::from(&secret_key);

        let message = b"the quick brown fox";
        let signature = sign(message, &secret_key, &public_key);
        assert!(verify(message, &signature, &public_key).is_ok());
    }

    #[test]
    fn verification_fails_for_tampered_message() {
        let secret_key = SecretKey::generate_ed25519();
        let public_key = PublicKey::from(&secret_key);

        let signature = sign(b"original", &secret_key, &public_key);
        assert_eq!(
            Err(Error::SignatureError),
            verify(b"tampered", &signature, &public_key)
        );
    }

    #[test]
    fn verification_fails_for_wrong_key() {
        let secret_key = SecretKey::generate_ed25519();
        let public_key = PublicKey::from(&secret_key);
        let other_public_key = PublicKey::from(&SecretKey::generate_ed25519());

        let message = b"addressed to someone else";
        let signature = sign(message, &secret_key, &public_key);
        assert!(verify(message, &signature, &other_public_key).is_err());
    }

    #[test]
    fn public_key_hex_roundtrip() {
        let secret_key = SecretKey::generate_ed25519();
        let public_key = PublicKey::from(&secret_key);
        assert_eq!(public_key, PublicKey::from_hex(public_key.to_hex()).unwrap());
    }

    #[test]
    fn secret_key_duplicate_signs_identically() {
        let secret_key = SecretKey::generate_ed25519();
        let public_key = PublicKey::from(&secret_key);
        let duplicate = secret_key.duplicate();

        let message = b"determinism";
        assert_eq!(
            sign(message, &secret_key, &public_key),
            sign(message, &duplicate, &public_key)
        );
    }
}
