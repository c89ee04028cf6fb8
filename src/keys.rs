//! Module keys holds the RSA-CRT key material which goes into the card, the card slot it goes
//! to, and the fingerprint of the key.
//!

use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use tracing::{debug, warn};

use crate::errors::{Field, KeyToSCError, Result};
use crate::tlvs;

/// The public exponent almost every RSA key uses.
pub const DEFAULT_PUBLIC_EXPONENT: u64 = 65537;

/// Length of an OpenPGP v4 fingerprint.
pub const FINGERPRINT_LENGTH: usize = 20;

/// The seven RSA-CRT components the card needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComponentKind {
    PublicExponent,
    Prime1,
    Prime2,
    Coefficient,
    Exponent1,
    Exponent2,
    Modulus,
}

impl ComponentKind {
    /// The order in which the card expects the components, both in the private key template
    /// (7F48) and in the concatenated values (5F48).
    pub const ORDER: [ComponentKind; 7] = [
        ComponentKind::PublicExponent,
        ComponentKind::Prime1,
        ComponentKind::Prime2,
        ComponentKind::Coefficient,
        ComponentKind::Exponent1,
        ComponentKind::Exponent2,
        ComponentKind::Modulus,
    ];

    /// Tag of the component inside the 7F48 template.
    pub fn tag(self) -> u8 {
        match self {
            ComponentKind::PublicExponent => 0x91,
            ComponentKind::Prime1 => 0x92,
            ComponentKind::Prime2 => 0x93,
            ComponentKind::Coefficient => 0x94,
            ComponentKind::Exponent1 => 0x95,
            ComponentKind::Exponent2 => 0x96,
            ComponentKind::Modulus => 0x97,
        }
    }

    /// Position in [ORDER](#associatedconstant.ORDER).
    pub fn index(self) -> usize {
        (self.tag() - 0x91) as usize
    }

    /// The label `openssl rsa -text` prints for this component.
    pub fn label(self) -> &'static str {
        match self {
            ComponentKind::PublicExponent => "publicExponent",
            ComponentKind::Prime1 => "prime1",
            ComponentKind::Prime2 => "prime2",
            ComponentKind::Coefficient => "coefficient",
            ComponentKind::Exponent1 => "exponent1",
            ComponentKind::Exponent2 => "exponent2",
            ComponentKind::Modulus => "modulus",
        }
    }

    /// Finds the component for an `openssl` label.
    pub fn from_label(label: &str) -> Option<Self> {
        ComponentKind::ORDER
            .iter()
            .copied()
            .find(|kind| kind.label() == label)
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One component of the key, without leading zero bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyComponent {
    kind: ComponentKind,
    value: Vec<u8>,
}

impl fmt::Debug for KeyComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Never print the secret itself.
        f.debug_struct("KeyComponent")
            .field("kind", &self.kind)
            .field("length", &self.value.len())
            .finish()
    }
}

impl KeyComponent {
    /// Creates a component from raw big endian bytes. Leading zero bytes are dropped.
    pub fn new(kind: ComponentKind, value: &[u8]) -> Result<Self> {
        let start = value
            .iter()
            .position(|byte| *byte != 0)
            .ok_or(KeyToSCError::MissingComponent { component: kind })?;
        Ok(KeyComponent {
            kind,
            value: value[start..].to_vec(),
        })
    }

    /// Creates a component from hex as printed by `openssl rsa -text`, for example
    /// `00:c3:1f:...`. Leading zeros are stripped and an odd digit count is padded.
    pub fn from_hex(kind: ComponentKind, hexstr: &str) -> Result<Self> {
        let digits = tlvs::strip_separators(hexstr);
        let digits = digits.trim_start_matches('0');
        if digits.is_empty() {
            return Err(KeyToSCError::MissingComponent { component: kind });
        }
        let value = tlvs::decode_hex(Field::Component(kind), &tlvs::pad_even(digits))?;
        Ok(KeyComponent { kind, value })
    }

    /// Creates the public exponent component from its integer value.
    pub fn from_exponent(exponent: u64) -> Result<Self> {
        if exponent != DEFAULT_PUBLIC_EXPONENT {
            warn!(exponent, "the public exponent is not 65537");
        }
        KeyComponent::new(
            ComponentKind::PublicExponent,
            &tlvs::minimal_be_bytes(exponent),
        )
    }

    pub fn kind(&self) -> ComponentKind {
        self.kind
    }

    pub fn value(&self) -> &[u8] {
        &self.value[..]
    }

    /// Length of the value in bytes.
    #[allow(clippy::len_without_is_empty)]
    pub fn len(&self) -> usize {
        self.value.len()
    }
}

/// The full RSA-CRT key. The private exponent is not part of it, the card never gets it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyMaterial {
    pub modulus: KeyComponent,
    pub public_exponent: KeyComponent,
    pub prime1: KeyComponent,
    pub prime2: KeyComponent,
    pub exponent1: KeyComponent,
    pub exponent2: KeyComponent,
    pub coefficient: KeyComponent,
}

impl KeyMaterial {
    /// Starts collecting the components one by one.
    pub fn builder() -> KeyMaterialBuilder {
        KeyMaterialBuilder::default()
    }

    /// Returns the component of the given kind.
    pub fn get(&self, kind: ComponentKind) -> &KeyComponent {
        match kind {
            ComponentKind::PublicExponent => &self.public_exponent,
            ComponentKind::Prime1 => &self.prime1,
            ComponentKind::Prime2 => &self.prime2,
            ComponentKind::Coefficient => &self.coefficient,
            ComponentKind::Exponent1 => &self.exponent1,
            ComponentKind::Exponent2 => &self.exponent2,
            ComponentKind::Modulus => &self.modulus,
        }
    }

    /// Iterates over the components in card order.
    pub fn iter(&self) -> impl Iterator<Item = &KeyComponent> + '_ {
        let order: &'static [ComponentKind; 7] = &ComponentKind::ORDER;
        order.iter().map(move |kind| self.get(*kind))
    }
}

/// Collects key components, usually as they come out of the parsed `openssl` output.
///
/// # Example
///
/// ```
/// let key = KeyMaterial::builder()
///     .field("modulus", "00:c3:...")?
///     .field("publicExponent", "65537")?
///     // ...
///     .build()?;
/// ```
#[derive(Debug, Clone, Default)]
pub struct KeyMaterialBuilder {
    components: [Option<KeyComponent>; 7],
}

impl KeyMaterialBuilder {
    /// Sets a component, replacing any previous value of the same kind.
    pub fn component(mut self, component: KeyComponent) -> Self {
        let index = component.kind().index();
        self.components[index] = Some(component);
        self
    }

    /// Sets a component from its hex value.
    pub fn hex(self, kind: ComponentKind, hexstr: &str) -> Result<Self> {
        Ok(self.component(KeyComponent::from_hex(kind, hexstr)?))
    }

    /// Sets the public exponent from its integer value.
    pub fn public_exponent(self, exponent: u64) -> Result<Self> {
        Ok(self.component(KeyComponent::from_exponent(exponent)?))
    }

    /// Sets a component by its `openssl` label.
    ///
    /// `publicExponent` is read as a decimal integer, or as hex when prefixed with `0x`.
    /// `privateExponent` is accepted and thrown away.
    pub fn field(self, label: &str, value: &str) -> Result<Self> {
        if label == "privateExponent" {
            debug!("skipping the private exponent");
            return Ok(self);
        }
        let kind = ComponentKind::from_label(label)
            .ok_or_else(|| KeyToSCError::UnknownField(label.to_string()))?;
        if kind == ComponentKind::PublicExponent {
            let value = value.trim();
            if let Some(hexstr) = value.strip_prefix("0x") {
                return self.hex(kind, hexstr);
            }
            let exponent = value
                .parse::<u64>()
                .map_err(|_| KeyToSCError::InvalidExponent(value.to_string()))?;
            return self.public_exponent(exponent);
        }
        self.hex(kind, value)
    }

    /// Returns the key, or `MissingComponent` for the first component never set.
    pub fn build(self) -> Result<KeyMaterial> {
        let [public_exponent, prime1, prime2, coefficient, exponent1, exponent2, modulus] =
            self.components;
        let require = |kind: ComponentKind, component: Option<KeyComponent>| {
            component.ok_or(KeyToSCError::MissingComponent { component: kind })
        };
        Ok(KeyMaterial {
            public_exponent: require(ComponentKind::PublicExponent, public_exponent)?,
            prime1: require(ComponentKind::Prime1, prime1)?,
            prime2: require(ComponentKind::Prime2, prime2)?,
            coefficient: require(ComponentKind::Coefficient, coefficient)?,
            exponent1: require(ComponentKind::Exponent1, exponent1)?,
            exponent2: require(ComponentKind::Exponent2, exponent2)?,
            modulus: require(ComponentKind::Modulus, modulus)?,
        })
    }
}

/// The three key slots of the OpenPGP applet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySlot {
    /// Signing key slot
    Signing,
    /// Decryption/encryption key slot
    Decryption,
    /// Authentication key slot
    Authentication,
}

impl KeySlot {
    /// Control reference template which selects the slot in the extended header list.
    pub fn crt_tag(self) -> [u8; 2] {
        match self {
            KeySlot::Signing => [0xB6, 0x00],
            KeySlot::Decryption => [0xB8, 0x00],
            KeySlot::Authentication => [0xA4, 0x00],
        }
    }

    /// P2 of the PUT DATA which stores the fingerprint of this slot.
    pub fn fingerprint_tag(self) -> u8 {
        match self {
            KeySlot::Signing => 0xC7,
            KeySlot::Decryption => 0xC8,
            KeySlot::Authentication => 0xC9,
        }
    }
}

impl FromStr for KeySlot {
    type Err = KeyToSCError;

    /// Accepts the short purposes `s`, `e` and `a`, or the slot names.
    fn from_str(purpose: &str) -> Result<Self> {
        match purpose.to_ascii_lowercase().as_str() {
            "s" | "sign" | "signing" => Ok(KeySlot::Signing),
            "e" | "encryption" | "decryption" => Ok(KeySlot::Decryption),
            "a" | "auth" | "authentication" => Ok(KeySlot::Authentication),
            _ => Err(KeyToSCError::UnknownKeySlot(purpose.to_string())),
        }
    }
}

/// OpenPGP v4 fingerprint of the key being imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint([u8; FINGERPRINT_LENGTH]);

impl Fingerprint {
    /// Reads a fingerprint as printed by `gpg --fingerprint`, spaces are allowed.
    pub fn from_hex(hexstr: &str) -> Result<Self> {
        let data = tlvs::decode_hex(Field::Fingerprint, hexstr)?;
        Fingerprint::try_from(&data[..])
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0[..]
    }
}

impl TryFrom<&[u8]> for Fingerprint {
    type Error = KeyToSCError;

    fn try_from(data: &[u8]) -> Result<Self> {
        if data.len() != FINGERPRINT_LENGTH {
            return Err(KeyToSCError::InvalidFingerprint { length: data.len() });
        }
        let mut fingerprint = [0u8; FINGERPRINT_LENGTH];
        fingerprint.copy_from_slice(data);
        Ok(Fingerprint(fingerprint))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Builds a key where every component is `fill` repeated to the given length.
    pub(crate) fn key_with_sizes(sizes: [usize; 7], fill: u8) -> KeyMaterial {
        let mut builder = KeyMaterial::builder();
        for (kind, size) in ComponentKind::ORDER.iter().zip(sizes.iter()) {
            let value = vec![fill; *size];
            builder = builder.component(KeyComponent::new(*kind, &value).unwrap());
        }
        builder.build().unwrap()
    }

    #[test]
    fn test_tags_follow_order() {
        let tags: Vec<u8> = ComponentKind::ORDER.iter().map(|k| k.tag()).collect();
        assert_eq!(tags, vec![0x91, 0x92, 0x93, 0x94, 0x95, 0x96, 0x97]);
        for (i, kind) in ComponentKind::ORDER.iter().enumerate() {
            assert_eq!(kind.index(), i);
        }
    }

    #[test]
    fn test_from_hex_strips_leading_zero() {
        let c = KeyComponent::from_hex(ComponentKind::Prime1, "00:e1:02:\n    03").unwrap();
        assert_eq!(c.value(), &[0xE1, 0x02, 0x03]);
        assert_eq!(c.len(), 3);
    }

    #[test]
    fn test_from_hex_pads_odd_digits() {
        let c = KeyComponent::from_hex(ComponentKind::Prime1, "00:01:02").unwrap();
        assert_eq!(c.value(), &[0x01, 0x02]);
        let c = KeyComponent::from_hex(ComponentKind::Prime1, "10001").unwrap();
        assert_eq!(c.value(), &[0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_all_zero_component_is_missing() {
        assert!(matches!(
            KeyComponent::from_hex(ComponentKind::Exponent2, "00:00"),
            Err(KeyToSCError::MissingComponent {
                component: ComponentKind::Exponent2
            })
        ));
        assert!(KeyComponent::new(ComponentKind::Exponent2, &[]).is_err());
    }

    #[test]
    fn test_public_exponent() {
        let e = KeyComponent::from_exponent(65537).unwrap();
        assert_eq!(e.value(), &[0x01, 0x00, 0x01]);
        assert_eq!(e.kind(), ComponentKind::PublicExponent);
    }

    #[test]
    fn test_builder_with_labels() {
        let key = KeyMaterial::builder()
            .field("modulus", "00:c0:01")
            .unwrap()
            .field("publicExponent", "65537")
            .unwrap()
            .field("privateExponent", "00:aa:bb")
            .unwrap()
            .field("prime1", "c1")
            .unwrap()
            .field("prime2", "c2")
            .unwrap()
            .field("exponent1", "c3")
            .unwrap()
            .field("exponent2", "c4")
            .unwrap()
            .field("coefficient", "c5")
            .unwrap()
            .build()
            .unwrap();
        assert_eq!(key.modulus.value(), &[0xC0, 0x01]);
        assert_eq!(key.public_exponent.value(), &[0x01, 0x00, 0x01]);
        let order: Vec<ComponentKind> = key.iter().map(|c| c.kind()).collect();
        assert_eq!(order, ComponentKind::ORDER.to_vec());
    }

    #[test]
    fn test_builder_hex_exponent() {
        let builder = KeyMaterial::builder()
            .field("publicExponent", "0x10001")
            .unwrap();
        let e = builder.components[0].as_ref().unwrap();
        assert_eq!(e.value(), &[0x01, 0x00, 0x01]);
    }

    #[test]
    fn test_builder_exponent_too_big() {
        // 2^64 + 1 must not be read as hex
        match KeyMaterial::builder().field("publicExponent", "18446744073709551617") {
            Err(KeyToSCError::InvalidExponent(value)) => {
                assert_eq!(value, "18446744073709551617")
            }
            other => panic!("expected invalid exponent, got {:?}", other.map(|_| ())),
        }
        assert!(matches!(
            KeyMaterial::builder().field("publicExponent", "10001h"),
            Err(KeyToSCError::InvalidExponent(_))
        ));
    }

    #[test]
    fn test_builder_unknown_label() {
        assert!(matches!(
            KeyMaterial::builder().field("exponent3", "01"),
            Err(KeyToSCError::UnknownField(_))
        ));
    }

    #[test]
    fn test_builder_missing() {
        let result = KeyMaterial::builder()
            .hex(ComponentKind::Modulus, "c0")
            .unwrap()
            .public_exponent(65537)
            .unwrap()
            .build();
        match result {
            Err(KeyToSCError::MissingComponent { component }) => {
                assert_eq!(component, ComponentKind::Prime1)
            }
            other => panic!("expected missing component, got {:?}", other),
        }
    }

    #[test]
    fn test_key_slots() {
        assert_eq!("s".parse::<KeySlot>().unwrap(), KeySlot::Signing);
        assert_eq!("e".parse::<KeySlot>().unwrap(), KeySlot::Decryption);
        assert_eq!("A".parse::<KeySlot>().unwrap(), KeySlot::Authentication);
        assert!("x".parse::<KeySlot>().is_err());
        assert_eq!(KeySlot::Authentication.crt_tag(), [0xA4, 0x00]);
        assert_eq!(KeySlot::Signing.fingerprint_tag(), 0xC7);
        assert_eq!(KeySlot::Decryption.fingerprint_tag(), 0xC8);
    }

    #[test]
    fn test_fingerprint() {
        let fpr =
            Fingerprint::from_hex("A4F3 88BB 1B8F 8A42 7E2E  0C5F 1A4F FEBA 9B21 5CA3").unwrap();
        assert_eq!(fpr.as_bytes()[0], 0xA4);
        assert_eq!(fpr.as_bytes()[19], 0xA3);
        assert!(matches!(
            Fingerprint::from_hex("A4F3"),
            Err(KeyToSCError::InvalidFingerprint { length: 2 })
        ));
    }
}
