//! This module implements the ISO7816 BER-TLV length field, and the hex helpers every other
//! module uses to read and print byte strings.
//!

use crate::errors::{Field, KeyToSCError, Result};

/// The largest length we can write. Anything from 65535 upwards needs the 0x83/0x84 forms,
/// which no field of a key import ever needs.
pub const MAX_LENGTH: usize = 65534;

/// Encodes `n` as a BER-TLV length field.
///
/// * `1..=127` is a single byte.
/// * `128..=255` is `0x81` followed by the byte.
/// * `256..=65534` is `0x82` followed by two big endian bytes.
///
/// `field` is only used to tell the caller which value was too big.
///
/// # Example
///
/// ```
/// assert_eq!(encode_length(Field::Payload, 451).unwrap(), vec![0x82, 0x01, 0xC3]);
/// ```
pub fn encode_length(field: Field, n: usize) -> Result<Vec<u8>> {
    debug_assert!(n > 0, "zero length for {}", field);
    if n < 0x80 {
        Ok(vec![n as u8])
    } else if n < 0x100 {
        Ok(vec![0x81, n as u8])
    } else if n <= MAX_LENGTH {
        let length = (n as u16).to_be_bytes();
        Ok(vec![0x82, length[0], length[1]])
    } else {
        Err(KeyToSCError::SizeOverflow { field, size: n })
    }
}

/// Reads a BER-TLV length field from the start of `data`.
///
/// Returns the length and the number of bytes the field itself took, or `None` if the
/// field is truncated or uses a form other than short, 0x81 or 0x82.
pub fn decode_length(data: &[u8]) -> Option<(usize, usize)> {
    let (&first, rest) = data.split_first()?;
    match first {
        0x81 => rest.first().map(|&l| (l as usize, 2)),
        0x82 => match rest {
            [high, low, ..] => Some((u16::from_be_bytes([*high, *low]) as usize, 3)),
            _ => None,
        },
        l if l < 0x80 => Some((l as usize, 1)),
        _ => None,
    }
}

/// Prepends a `0` nibble when `hexstr` has an odd number of digits.
///
/// Every byte must be printed as two hex digits, so all number to hex conversions go
/// through here.
pub fn pad_even(hexstr: &str) -> String {
    if hexstr.len() % 2 == 1 {
        format!("0{}", hexstr)
    } else {
        hexstr.to_string()
    }
}

/// Removes the `:` separators and whitespace which `openssl` and `gpg` put between bytes.
pub fn strip_separators(hexstr: &str) -> String {
    hexstr
        .chars()
        .filter(|c| *c != ':' && !c.is_whitespace())
        .collect()
}

/// Decodes a hex string into bytes. Separators are ignored, but the remaining digits
/// must describe whole bytes.
pub fn decode_hex(field: Field, hexstr: &str) -> Result<Vec<u8>> {
    let digits = strip_separators(hexstr);
    if digits.len() % 2 == 1 {
        return Err(KeyToSCError::InvalidHexLength {
            field,
            length: digits.len(),
        });
    }
    hex::decode(&digits).map_err(|source| KeyToSCError::InvalidHex { field, source })
}

/// Returns the minimal big endian representation of `value` (at least one byte).
pub fn minimal_be_bytes(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes
        .iter()
        .position(|byte| *byte != 0)
        .unwrap_or(bytes.len() - 1);
    bytes[start..].to_vec()
}

/// Prints bytes as space separated uppercase hex, `00 A4 04 00`.
pub fn hexify(data: &[u8]) -> String {
    data.iter()
        .map(|byte| format!("{:02X}", byte))
        .collect::<Vec<String>>()
        .join(" ")
}
