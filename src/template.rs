//! Module template builds the body of the key import PUT DATA: the OpenPGP card extended
//! header list.
//!
//! ```text
//! 4D <len>                     extended header list
//!    B6 00                     key slot (control reference template)
//!    7F 48 <len>               private key template
//!       91 <len> ... 97 <len>  tag and length of every component
//!    5F 48 <len>               concatenated component values
//!       <e> <p> <q> <u> <dp> <dq> <n>
//! ```
//!
//! All sizes are computed first, from the innermost values outwards, and only then written.

use tracing::debug;

use crate::errors::{Field, Result};
use crate::keys::{ComponentKind, KeyMaterial, KeySlot};
use crate::tlvs::encode_length;

/// Tag of the extended header list.
pub const EXTENDED_HEADER_TAG: u8 = 0x4D;
/// Tag of the private key template.
pub const TEMPLATE_TAG: [u8; 2] = [0x7F, 0x48];
/// Tag of the concatenated key values.
pub const PAYLOAD_TAG: [u8; 2] = [0x5F, 0x48];
/// The control reference template naming the key slot, `B6 00` and friends.
const KEY_SLOT_LENGTH: usize = 2;

/// The byte counts of every part of the key import, derived from the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteSizeTable {
    components: [usize; 7],
    template: usize,
    payload: usize,
    header: usize,
    body: usize,
}

impl ByteSizeTable {
    /// Computes all the sizes for `key`.
    ///
    /// Fails with `SizeOverflow` as soon as any length does not fit the BER length field.
    pub fn compute(key: &KeyMaterial) -> Result<Self> {
        let mut components = [0usize; 7];
        let mut template = 0;
        for component in key.iter() {
            let kind = component.kind();
            let length = encode_length(Field::Component(kind), component.len())?;
            components[kind.index()] = component.len();
            // tag, length and no value
            template += 1 + length.len();
        }
        let payload: usize = components.iter().sum();

        let header = KEY_SLOT_LENGTH
            + TEMPLATE_TAG.len()
            + encode_length(Field::Template, template)?.len()
            + template
            + PAYLOAD_TAG.len()
            + encode_length(Field::Payload, payload)?.len()
            + payload;
        let body = 1 + encode_length(Field::Header, header)?.len() + header;

        let sizes = ByteSizeTable {
            components,
            template,
            payload,
            header,
            body,
        };
        debug!(?sizes, "computed key import sizes");
        Ok(sizes)
    }

    /// Value length of one component.
    pub fn component(&self, kind: ComponentKind) -> usize {
        self.components[kind.index()]
    }

    /// Content length of the 7F48 template.
    pub fn template(&self) -> usize {
        self.template
    }

    /// Content length of 5F48, all the component values together.
    pub fn payload(&self) -> usize {
        self.payload
    }

    /// Content length of the 4D extended header list.
    pub fn header(&self) -> usize {
        self.header
    }

    /// Length of the full 4D TLV, what gets split over the chained APDUs.
    pub fn body(&self) -> usize {
        self.body
    }
}

/// The private key template and the component values of one key.
#[derive(Clone)]
pub struct KeyTemplate {
    sizes: ByteSizeTable,
    template: Vec<u8>,
    payload: Vec<u8>,
}

impl KeyTemplate {
    /// Writes the template and the payload of `key`. The private exponent never reaches this
    /// point, [KeyMaterial](../keys/struct.KeyMaterial.html) does not hold it.
    pub fn new(key: &KeyMaterial) -> Result<Self> {
        let sizes = ByteSizeTable::compute(key)?;
        let mut template = Vec::with_capacity(sizes.template());
        let mut payload = Vec::with_capacity(sizes.payload());
        for component in key.iter() {
            template.push(component.kind().tag());
            template.extend(encode_length(
                Field::Component(component.kind()),
                component.len(),
            )?);
            payload.extend_from_slice(component.value());
        }
        Ok(KeyTemplate {
            sizes,
            template,
            payload,
        })
    }

    pub fn sizes(&self) -> &ByteSizeTable {
        &self.sizes
    }

    /// Content of the 7F48 template.
    pub fn template(&self) -> &[u8] {
        &self.template[..]
    }

    /// Content of 5F48.
    pub fn payload(&self) -> &[u8] {
        &self.payload[..]
    }

    /// Wraps everything into the extended header list for `slot`.
    pub fn into_body(self, slot: KeySlot) -> Result<Vec<u8>> {
        let sizes = self.sizes;
        let mut body = Vec::with_capacity(sizes.body());
        body.push(EXTENDED_HEADER_TAG);
        body.extend(encode_length(Field::Header, sizes.header())?);
        body.extend_from_slice(&slot.crt_tag());
        body.extend_from_slice(&TEMPLATE_TAG);
        body.extend(encode_length(Field::Template, sizes.template())?);
        body.extend(self.template);
        body.extend_from_slice(&PAYLOAD_TAG);
        body.extend(encode_length(Field::Payload, sizes.payload())?);
        body.extend(self.payload);
        debug_assert_eq!(body.len(), sizes.body());
        Ok(body)
    }
}

/// Builds the complete extended header list for importing `key` into `slot`.
pub fn build_key_import(key: &KeyMaterial, slot: KeySlot) -> Result<Vec<u8>> {
    KeyTemplate::new(key)?.into_body(slot)
}
