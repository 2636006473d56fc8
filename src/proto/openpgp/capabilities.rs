//! Card capability discovery.
//!
//! Two sources feed this: the ATR historical bytes (compact TLV, tag 0x73)
//! announce transport-level features like command chaining and extended
//! length, and the application-related data object 0x6E describes the
//! OpenPGP applet itself.

use std::io::{Error as IOError, ErrorKind as IOErrorKind};

use bitflags::bitflags;
use tracing::warn;

use super::keys::{KeyFormat, KeyType};
use super::tlv::Tlv;

const CAPABILITIES_TL: u8 = 0x73;
const MASK_CHAINING: u8 = 1 << 7;
const MASK_EXTENDED: u8 = 1 << 6;

const STATUS_INDICATOR_NO_INFORMATION: u8 = 0x00;
const STATUS_INDICATOR_INITIALISATION_STATE: u8 = 0x03;
const STATUS_INDICATOR_OPERATIONAL_STATE: u8 = 0x05;

const EXPECTED_PROCESSING_STATUS_BYTES: [u8; 2] = [0x90, 0x00];

const FINGERPRINT_LENGTH: usize = 20;
const EMPTY_FINGERPRINT: [u8; FINGERPRINT_LENGTH] = [0; FINGERPRINT_LENGTH];

const MAX_PW1_LENGTH_INDEX: usize = 1;
const MAX_PW3_LENGTH_INDEX: usize = 3;
const PW1_TRIES_INDEX: usize = 4;
const PW3_TRIES_INDEX: usize = 6;

bitflags! {
    #[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
    pub struct ExtendedCapabilityFlags: u8 {
        const SECURE_MESSAGING = 1 << 7;
        const GET_CHALLENGE = 1 << 6;
        const KEY_IMPORT = 1 << 5;
        const PW_STATUS_CHANGEABLE = 1 << 4;
        const PRIVATE_DOS = 1 << 3;
        const ALGORITHM_ATTRIBUTES_CHANGEABLE = 1 << 2;
        const AES = 1 << 1;
        const KDF_DO = 1 << 0;
    }
}

/// Transport features announced by the ATR historical bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CardCapabilities {
    chaining: bool,
    extended_length: bool,
    lifecycle_management: bool,
}

impl CardCapabilities {
    pub fn from_historical_bytes(historical: &[u8]) -> Result<Self, IOError> {
        if historical.first() != Some(&0x00) {
            return Err(IOError::new(
                IOErrorKind::InvalidData,
                "Invalid historical bytes category indicator byte",
            ));
        }
        if historical.len() < 4 {
            return Err(IOError::new(
                IOErrorKind::InvalidData,
                "Historical bytes too short",
            ));
        }

        let capability_bytes = compact_tlv_capabilities(&historical[1..historical.len() - 2]);
        let (chaining, extended_length) = match capability_bytes {
            Some(caps) => (caps[2] & MASK_CHAINING != 0, caps[2] & MASK_EXTENDED != 0),
            None => (false, false),
        };

        let tail = &historical[historical.len() - 2..];
        let lifecycle_management = if tail == EXPECTED_PROCESSING_STATUS_BYTES {
            match historical[historical.len() - 3] {
                STATUS_INDICATOR_NO_INFORMATION => false,
                STATUS_INDICATOR_INITIALISATION_STATE | STATUS_INDICATOR_OPERATIONAL_STATE => true,
                indicator => {
                    return Err(IOError::new(
                        IOErrorKind::InvalidData,
                        format!("Unknown status indicator byte: {:#04x}", indicator),
                    ));
                }
            }
        } else {
            // Some tokens end the historical bytes with 0x0000 instead.
            true
        };

        Ok(Self {
            chaining,
            extended_length,
            lifecycle_management,
        })
    }

    pub fn has_chaining(&self) -> bool {
        self.chaining
    }

    pub fn has_extended_length(&self) -> bool {
        self.extended_length
    }

    pub fn has_lifecycle_management(&self) -> bool {
        self.lifecycle_management
    }
}

/// Walk the compact TLV records and pull out the three capability bytes.
fn compact_tlv_capabilities(data: &[u8]) -> Option<[u8; 3]> {
    let mut offset = 0;
    while offset < data.len() {
        let tl = data[offset];
        offset += 1;
        if tl == CAPABILITIES_TL {
            if data.len() < offset + 3 {
                return None;
            }
            return Some([data[offset], data[offset + 1], data[offset + 2]]);
        }
        offset += usize::from(tl & 0x0F);
    }
    None
}

/// Parse of the application-related data object (0x6E).
#[derive(Debug, Clone)]
pub struct OpenPgpCapabilities {
    aid: Vec<u8>,
    historical_bytes: Vec<u8>,
    flags: ExtendedCapabilityFlags,
    sm_algorithm: u8,
    max_challenge_length: u16,
    max_cardholder_cert_length: u16,
    max_special_do_length: u16,
    sign_key_format: Option<KeyFormat>,
    encrypt_key_format: Option<KeyFormat>,
    auth_key_format: Option<KeyFormat>,
    pw_status_bytes: Vec<u8>,
    fingerprints: [[u8; FINGERPRINT_LENGTH]; 3],
}

impl Default for OpenPgpCapabilities {
    fn default() -> Self {
        Self {
            aid: Vec::new(),
            historical_bytes: Vec::new(),
            flags: ExtendedCapabilityFlags::empty(),
            sm_algorithm: 0,
            max_challenge_length: 0,
            max_cardholder_cert_length: 0,
            max_special_do_length: 0,
            sign_key_format: None,
            encrypt_key_format: None,
            auth_key_format: None,
            pw_status_bytes: Vec::new(),
            fingerprints: [EMPTY_FINGERPRINT; 3],
        }
    }
}

impl OpenPgpCapabilities {
    pub fn from_bytes(raw: &[u8]) -> Result<Self, IOError> {
        let mut parsed = Self::default();
        let tlvs = Tlv::read_list(raw)?;
        let tlvs = match tlvs.as_slice() {
            [single] if single.tag == 0x6E => single.children.clone(),
            _ => tlvs,
        };
        parsed.update_with_tlvs(&tlvs)?;
        Ok(parsed)
    }

    fn update_with_tlvs(&mut self, tlvs: &[Tlv]) -> Result<(), IOError> {
        for tlv in tlvs {
            match tlv.tag {
                0x4F => self.aid = tlv.value.clone(),
                0x5F52 => self.historical_bytes = tlv.value.clone(),
                // Discretionary data objects; same DOs, one level down.
                0x73 => self.update_with_tlvs(&tlv.children)?,
                0xC0 => self.parse_extended_capabilities(&tlv.value)?,
                0xC1 => self.sign_key_format = Some(KeyFormat::from_bytes(&tlv.value)?),
                0xC2 => self.encrypt_key_format = Some(KeyFormat::from_bytes(&tlv.value)?),
                0xC3 => self.auth_key_format = Some(KeyFormat::from_bytes(&tlv.value)?),
                0xC4 => self.pw_status_bytes = tlv.value.clone(),
                0xC5 => self.parse_fingerprints(&tlv.value)?,
                tag => {
                    // Cards expose plenty of DOs this layer has no use for.
                    warn!({ tag }, "Ignoring unhandled data object");
                }
            }
        }
        Ok(())
    }

    fn parse_extended_capabilities(&mut self, value: &[u8]) -> Result<(), IOError> {
        if value.len() < 8 {
            return Err(IOError::new(
                IOErrorKind::InvalidData,
                "Extended capabilities DO too short",
            ));
        }
        self.flags = ExtendedCapabilityFlags::from_bits_truncate(value[0]);
        self.sm_algorithm = value[1];
        self.max_challenge_length = u16::from_be_bytes([value[2], value[3]]);
        self.max_cardholder_cert_length = u16::from_be_bytes([value[4], value[5]]);
        self.max_special_do_length = u16::from_be_bytes([value[6], value[7]]);
        Ok(())
    }

    fn parse_fingerprints(&mut self, value: &[u8]) -> Result<(), IOError> {
        if value.len() < 3 * FINGERPRINT_LENGTH {
            return Err(IOError::new(
                IOErrorKind::InvalidData,
                "Fingerprint DO too short",
            ));
        }
        for (index, fingerprint) in self.fingerprints.iter_mut().enumerate() {
            let start = index * FINGERPRINT_LENGTH;
            fingerprint.copy_from_slice(&value[start..start + FINGERPRINT_LENGTH]);
        }
        Ok(())
    }

    pub fn aid(&self) -> &[u8] {
        &self.aid
    }

    pub fn historical_bytes(&self) -> &[u8] {
        &self.historical_bytes
    }

    pub fn card_capabilities(&self) -> Result<CardCapabilities, IOError> {
        CardCapabilities::from_historical_bytes(&self.historical_bytes)
    }

    pub fn has_key_import(&self) -> bool {
        self.flags.contains(ExtendedCapabilityFlags::KEY_IMPORT)
    }

    pub fn attributes_changeable(&self) -> bool {
        self.flags
            .contains(ExtendedCapabilityFlags::ALGORITHM_ATTRIBUTES_CHANGEABLE)
    }

    pub fn has_secure_messaging(&self) -> bool {
        self.flags.contains(ExtendedCapabilityFlags::SECURE_MESSAGING)
    }

    pub fn has_aes_secure_messaging(&self) -> bool {
        self.has_secure_messaging() && (self.sm_algorithm == 1 || self.sm_algorithm == 2)
    }

    pub fn max_challenge_length(&self) -> u16 {
        self.max_challenge_length
    }

    pub fn max_cardholder_cert_length(&self) -> u16 {
        self.max_cardholder_cert_length
    }

    pub fn max_special_do_length(&self) -> u16 {
        self.max_special_do_length
    }

    pub fn key_format(&self, key_type: KeyType) -> Option<&KeyFormat> {
        match key_type {
            KeyType::Sign => self.sign_key_format.as_ref(),
            KeyType::Encrypt => self.encrypt_key_format.as_ref(),
            KeyType::Auth => self.auth_key_format.as_ref(),
        }
    }

    pub fn fingerprint(&self, key_type: KeyType) -> &[u8; FINGERPRINT_LENGTH] {
        &self.fingerprints[key_type.index()]
    }

    /// A slot is populated when its fingerprint is not all zero.
    pub fn has_key(&self, key_type: KeyType) -> bool {
        *self.fingerprint(key_type) != EMPTY_FINGERPRINT
    }

    pub fn pw1_valid_for_multiple_signatures(&self) -> bool {
        self.pw_status_bytes.first() == Some(&0x01)
    }

    pub fn pw1_max_length(&self) -> Option<u8> {
        self.pw_status_bytes.get(MAX_PW1_LENGTH_INDEX).copied()
    }

    pub fn pw3_max_length(&self) -> Option<u8> {
        self.pw_status_bytes.get(MAX_PW3_LENGTH_INDEX).copied()
    }

    pub fn pw1_tries_left(&self) -> Option<u8> {
        self.pw_status_bytes.get(PW1_TRIES_INDEX).copied()
    }

    pub fn pw3_tries_left(&self) -> Option<u8> {
        self.pw_status_bytes.get(PW3_TRIES_INDEX).copied()
    }
}
