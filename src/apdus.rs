//! Module apdus helps to create the APDUs of a key import. We have many `create_*` functions to
//! help to create predefined APDU structs.
//!

use std::fmt;

use tracing::{debug, trace};

use crate::errors::{Field, KeyToSCError, Result};
use crate::keys::{Fingerprint, KeySlot};
use crate::tlvs;

/// Data bytes in every chained fragment but the last one.
pub const DEFAULT_CHUNK_SIZE: usize = 250;

/// Bit 5 of CLA, set on every chained APDU except the last.
pub const CHAINING_CLA: u8 = 0x10;

/// AID of the OpenPGP application.
pub const OPENPGP_AID: [u8; 6] = [0xD2, 0x76, 0x00, 0x01, 0x24, 0x01];

/// Tells the card whether more fragments follow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderCode {
    /// More fragments follow, CLA has the chaining bit.
    First,
    /// The final (or only) fragment.
    Last,
}

/// The 4 byte headers used for the fragments of a chained command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainHeaders {
    pub first: [u8; 4],
    pub last: [u8; 4],
}

impl ChainHeaders {
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        ChainHeaders {
            first: [cla | CHAINING_CLA, ins, p1, p2],
            last: [cla, ins, p1, p2],
        }
    }

    pub fn for_code(&self, code: HeaderCode) -> [u8; 4] {
        match code {
            HeaderCode::First => self.first,
            HeaderCode::Last => self.last,
        }
    }
}

/// One APDU as sent to the card: header, length and data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub code: HeaderCode,
    pub header: [u8; 4],
    /// The Lc field. One byte for chained fragments, a BER length otherwise.
    pub length: Vec<u8>,
    pub body: Vec<u8>,
}

impl Fragment {
    /// Raw bytes of the APDU.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut res = Vec::with_capacity(4 + self.length.len() + self.body.len());
        res.extend_from_slice(&self.header);
        res.extend_from_slice(&self.length);
        res.extend_from_slice(&self.body);
        res
    }
}

/// Checks that `chunk_size` fits in the length byte of a short APDU.
pub fn check_chunk_size(chunk_size: usize) -> Result<()> {
    if chunk_size == 0 || chunk_size > 0xFF {
        return Err(KeyToSCError::InvalidChunkSize(chunk_size));
    }
    Ok(())
}

/// Splits `data` into fragments of `chunk_size` bytes.
///
/// Every fragment but the last uses the `first` header, the last one always uses the `last`
/// header, even when it is a full chunk. Empty `data` gives a single empty last fragment.
pub fn chunk(data: &[u8], chunk_size: usize, headers: &ChainHeaders) -> Result<Vec<Fragment>> {
    check_chunk_size(chunk_size)?;
    if data.is_empty() {
        return Ok(vec![Fragment {
            code: HeaderCode::Last,
            header: headers.last,
            length: vec![0],
            body: Vec::new(),
        }]);
    }

    let count = (data.len() + chunk_size - 1) / chunk_size;
    let fragments: Vec<Fragment> = data
        .chunks(chunk_size)
        .enumerate()
        .map(|(index, body)| {
            let code = if index + 1 == count {
                HeaderCode::Last
            } else {
                HeaderCode::First
            };
            trace!(index, ?code, size = body.len(), "fragment");
            Fragment {
                code,
                header: headers.for_code(code),
                length: vec![body.len() as u8],
                body: body.to_vec(),
            }
        })
        .collect();
    debug!(
        fragments = fragments.len(),
        size = data.len(),
        chunk_size,
        "split command data"
    );
    Ok(fragments)
}

/// Creates APDU to be used inside of our project.
///
/// A command with little data is one fragment. [chained](#method.chained) splits bigger
/// data into as many fragments as the card needs.
#[derive(Clone)]
pub struct APDU {
    /// CLA information.
    pub cla: u8,
    /// INS value
    pub ins: u8,
    pub p1: u8,
    pub p2: u8,
    /// Original `Vec<u8>` data which needs to send to the card.
    pub data: Vec<u8>,
    /// The actual APDUs, in the order the card must receive them.
    pub fragments: Vec<Fragment>,
}

impl fmt::Debug for APDU {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fragments: Vec<String> = self
            .fragments
            .iter()
            .map(|fragment| format!("[{}]", tlvs::hexify(&fragment.to_bytes())))
            .collect();
        f.debug_struct("APDU")
            .field("CLA", &self.cla)
            .field("INS", &self.ins)
            .field("P1", &self.p1)
            .field("P2", &self.p2)
            .field("fragments", &fragments)
            .finish()
    }
}

impl APDU {
    /// Creates a single APDU, the length of `inputdata` is written as a BER length.
    ///
    /// `field` names the data in the error if it is too long.
    pub fn new(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        field: Field,
        inputdata: Option<Vec<u8>>,
    ) -> Result<Self> {
        let data = inputdata.unwrap_or_default();
        let length = if data.is_empty() {
            Vec::new()
        } else {
            tlvs::encode_length(field, data.len())?
        };
        Ok(APDU::single(cla, ins, p1, p2, length, data))
    }

    /// Creates a chained APDU, splitting `data` in `chunk_size` pieces.
    pub fn chained(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: Vec<u8>,
        chunk_size: usize,
    ) -> Result<Self> {
        let headers = ChainHeaders::new(cla, ins, p1, p2);
        let fragments = chunk(&data, chunk_size, &headers)?;
        Ok(APDU {
            cla,
            ins,
            p1,
            p2,
            data,
            fragments,
        })
    }

    fn single(cla: u8, ins: u8, p1: u8, p2: u8, length: Vec<u8>, data: Vec<u8>) -> Self {
        let fragment = Fragment {
            code: HeaderCode::Last,
            header: [cla, ins, p1, p2],
            length,
            body: data.clone(),
        };
        APDU {
            cla,
            ins,
            p1,
            p2,
            data,
            fragments: vec![fragment],
        }
    }

    /// Raw bytes of every fragment.
    pub fn iapdus(&self) -> Vec<Vec<u8>> {
        self.into_iter().collect()
    }
}

impl<'a> IntoIterator for &'a APDU {
    type Item = Vec<u8>;
    type IntoIter = APDUIterator<'a>;

    fn into_iter(self) -> Self::IntoIter {
        APDUIterator {
            apdu: self,
            index: 0,
        }
    }
}

/// Iterates over the raw bytes of the fragments of an [APDU](struct.APDU.html).
#[derive(Debug)]
pub struct APDUIterator<'a> {
    apdu: &'a APDU,
    index: usize,
}

impl<'a> Iterator for APDUIterator<'a> {
    type Item = Vec<u8>;
    fn next(&mut self) -> Option<Vec<u8>> {
        let fragment = self.apdu.fragments.get(self.index)?;
        self.index += 1;
        Some(fragment.to_bytes())
    }
}

/// Creates a new APDU to select the OpenPGP applet in the card.
///
/// This is the **first** APDU to be sent to the card. Only after selecting
/// the OpenPGP applet, one should send in the other APDUs as required.
pub fn create_apdu_select_openpgp() -> APDU {
    APDU::single(
        0x00,
        0xA4,
        0x04,
        0x00,
        vec![OPENPGP_AID.len() as u8],
        OPENPGP_AID.to_vec(),
    )
}

/// Creates a new APDU to verify the PW3 for admin commands, key import needs it.
///
/// The PIN is sent as its UTF-8 bytes, so `123456` becomes `31 32 33 34 35 36`. An empty
/// PIN is refused, `00 20 00 83` without data only asks the card for the PIN status.
pub fn create_apdu_verify_pw3(pin: &str) -> Result<APDU> {
    if pin.is_empty() {
        return Err(KeyToSCError::EmptyPin);
    }
    APDU::new(0x00, 0x20, 0x00, 0x83, Field::Pin, Some(pin.as_bytes().to_vec()))
}

/// Creates the chained PUT DATA which imports a key. `body` is the extended header list
/// from [build_key_import](../template/fn.build_key_import.html).
pub fn create_apdu_key_import(body: Vec<u8>, chunk_size: usize) -> Result<APDU> {
    APDU::chained(0x00, 0xDB, 0x3F, 0xFF, body, chunk_size)
}

/// Creates the PUT DATA which stores the fingerprint of the key in `slot`.
pub fn create_apdu_put_fingerprint(slot: KeySlot, fingerprint: &Fingerprint) -> Result<APDU> {
    APDU::new(
        0x00,
        0xDA,
        0x00,
        slot.fingerprint_tag(),
        Field::Fingerprint,
        Some(fingerprint.as_bytes().to_vec()),
    )
}
