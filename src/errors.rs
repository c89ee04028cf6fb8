//! Module Errors for the keytosc project
//!

use thiserror::Error;

/// Names the value a size or format error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    /// One of the seven RSA-CRT components.
    Component(crate::keys::ComponentKind),
    /// The private key template (tag 0x7F48).
    Template,
    /// The concatenated component values (tag 0x5F48).
    Payload,
    /// The extended header list (tag 0x4D).
    Header,
    /// The PIN of a VERIFY APDU.
    Pin,
    /// The key fingerprint.
    Fingerprint,
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Field::Component(kind) => write!(f, "{}", kind),
            Field::Template => f.write_str("key template"),
            Field::Payload => f.write_str("key payload"),
            Field::Header => f.write_str("extended header"),
            Field::Pin => f.write_str("pin"),
            Field::Fingerprint => f.write_str("fingerprint"),
        }
    }
}

/// KeyToSCError enumarates all the possible errors from the library.
#[derive(Error, Debug)]
pub enum KeyToSCError {
    /// When a required RSA component was never given.
    #[error("Missing key component: {component}")]
    MissingComponent { component: crate::keys::ComponentKind },
    /// When a length can not be expressed in the BER length field.
    #[error("Size of {field} is {size} bytes, the maximum is 65534")]
    SizeOverflow { field: Field, size: usize },
    /// When an odd number of hex digits reaches a place expecting whole bytes.
    #[error("Odd number of hex digits ({length}) for {field}")]
    InvalidHexLength { field: Field, length: usize },
    /// When a value contains something other than hex digits.
    #[error("Invalid hex value for {field}: {source}")]
    InvalidHex {
        field: Field,
        #[source]
        source: hex::FromHexError,
    },
    /// When the public exponent is neither a decimal `u64` nor `0x` prefixed hex.
    #[error("Invalid public exponent: {0}")]
    InvalidExponent(String),
    /// When the PIN to verify is empty.
    #[error("The PIN is empty")]
    EmptyPin,
    /// When a labelled key field is not an RSA-CRT component.
    #[error("Unknown key field: {0}")]
    UnknownField(String),
    /// When the key purpose is not one of the three card slots.
    #[error("Unknown key slot: {0}, expected one of a, s or e")]
    UnknownKeySlot(String),
    /// When the fingerprint is not 20 bytes long.
    #[error("Fingerprint must be 20 bytes, got {length}")]
    InvalidFingerprint { length: usize },
    /// When the configured chunk size does not fit in one APDU.
    #[error("Chunk size must be between 1 and 255, got {0}")]
    InvalidChunkSize(usize),
}

/// Result type used all over the crate.
pub type Result<T> = std::result::Result<T, KeyToSCError>;
