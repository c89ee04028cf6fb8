//! This crate builds the APDUs to import an RSA key into the OpenPGP applet on a smartcard.
//!
//! The key is given as its RSA-CRT components. The result is the list of APDUs to select the
//! applet, verify the admin PIN, import the key (a chained PUT DATA of the extended header
//! list) and write the fingerprint, rendered as arguments for `opensc-tool`.
//!
//! # Example
//!
//! ```
//! let key = KeyMaterial::builder()
//!     .field("modulus", modulus)?
//!     .field("publicExponent", "65537")?
//!     .field("prime1", prime1)?
//!     .field("prime2", prime2)?
//!     .field("exponent1", exponent1)?
//!     .field("exponent2", exponent2)?
//!     .field("coefficient", coefficient)?
//!     .build()?;
//! let fingerprint = Fingerprint::from_hex("A4F3 88BB 1B8F 8A42 7E2E  0C5F 1A4F FEBA 9B21 5CA3")?;
//! let command = build_command(&Config::default(), &key, "s".parse()?, "12345678", &fingerprint)?;
//! println!("{}", command);
//! ```

pub mod apdus;
pub mod command;
pub mod errors;
pub mod keys;
pub mod template;
pub mod tlvs;

pub use command::{build_command, Config, RenderedCommand};
pub use errors::{Field, KeyToSCError, Result};
pub use keys::{ComponentKind, Fingerprint, KeyComponent, KeyMaterial, KeySlot};
