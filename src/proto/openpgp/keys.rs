//! Key slots, algorithm attributes and private-key import templates.
//!
//! Key material is uploaded inside an extended header list (tag 0x4D): a
//! control reference naming the slot, the private-key template (0x7F48)
//! describing field order and widths, and the concatenated key data
//! (0x5F48). All numeric fields are big-endian at exactly the width the
//! template declares.

use std::io::{Error as IOError, ErrorKind as IOErrorKind};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use super::tlv::encode_length;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyType {
    Sign,
    Encrypt,
    Auth,
}

impl KeyType {
    pub fn index(self) -> usize {
        match self {
            KeyType::Sign => 0,
            KeyType::Encrypt => 1,
            KeyType::Auth => 2,
        }
    }

    /// Control-reference byte naming the slot in key templates.
    pub fn slot(self) -> u8 {
        match self {
            KeyType::Sign => 0xB6,
            KeyType::Encrypt => 0xB8,
            KeyType::Auth => 0xA4,
        }
    }

    pub fn timestamp_tag(self) -> u16 {
        match self {
            KeyType::Sign => 0xCE,
            KeyType::Encrypt => 0xCF,
            KeyType::Auth => 0xD0,
        }
    }

    pub fn fingerprint_tag(self) -> u16 {
        match self {
            KeyType::Sign => 0xC7,
            KeyType::Encrypt => 0xC8,
            KeyType::Auth => 0xC9,
        }
    }

    pub fn algorithm_attributes_tag(self) -> u16 {
        match self {
            KeyType::Sign => 0xC1,
            KeyType::Encrypt => 0xC2,
            KeyType::Auth => 0xC3,
        }
    }
}

const ALGORITHM_ID_RSA: u8 = 0x01;
const EC_IMPORT_WITH_PUBKEY: u8 = 0xFF;

#[derive(Debug, IntoPrimitive, TryFromPrimitive, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum RsaImportFormat {
    Standard = 0x00,
    StandardWithModulus = 0x01,
    Crt = 0x02,
    CrtWithModulus = 0x03,
}

impl RsaImportFormat {
    fn includes_crt(self) -> bool {
        matches!(self, RsaImportFormat::Crt | RsaImportFormat::CrtWithModulus)
    }

    fn includes_modulus(self) -> bool {
        matches!(
            self,
            RsaImportFormat::StandardWithModulus | RsaImportFormat::CrtWithModulus
        )
    }
}

#[derive(Debug, IntoPrimitive, TryFromPrimitive, Copy, Clone, PartialEq, Eq)]
#[repr(u8)]
pub enum EcAlgorithm {
    Ecdh = 0x12,
    Ecdsa = 0x13,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RsaKeyFormat {
    pub modulus_length: u16,
    pub exponent_length: u16,
    pub import_format: RsaImportFormat,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EcKeyFormat {
    pub algorithm: EcAlgorithm,
    pub curve_oid: Vec<u8>,
    pub with_public_key: bool,
}

const OID_NIST_P256: &[u8] = &[0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07];
const OID_NIST_P384: &[u8] = &[0x2B, 0x81, 0x04, 0x00, 0x22];
const OID_NIST_P521: &[u8] = &[0x2B, 0x81, 0x04, 0x00, 0x23];
const OID_BRAINPOOL_P256R1: &[u8] = &[0x2B, 0x24, 0x03, 0x03, 0x02, 0x08, 0x01, 0x01, 0x07];
const OID_X25519: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x97, 0x55, 0x01, 0x05, 0x01];
const OID_ED25519: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xDA, 0x47, 0x0F, 0x01];

impl EcKeyFormat {
    /// Width of one field element, in bytes.
    pub fn field_size(&self) -> Result<usize, IOError> {
        match self.curve_oid.as_slice() {
            oid if oid == OID_NIST_P256 => Ok(32),
            oid if oid == OID_NIST_P384 => Ok(48),
            oid if oid == OID_NIST_P521 => Ok(66),
            oid if oid == OID_BRAINPOOL_P256R1 => Ok(32),
            oid if oid == OID_X25519 => Ok(32),
            oid if oid == OID_ED25519 => Ok(32),
            oid => Err(IOError::new(
                IOErrorKind::InvalidData,
                format!("Unknown curve OID: {:02x?}", oid),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyFormat {
    Rsa(RsaKeyFormat),
    Ec(EcKeyFormat),
}

impl KeyFormat {
    /// Parse an algorithm-attributes DO (0xC1..0xC3).
    pub fn from_bytes(value: &[u8]) -> Result<Self, IOError> {
        let Some(&algorithm_id) = value.first() else {
            return Err(IOError::new(
                IOErrorKind::InvalidData,
                "Empty algorithm attributes",
            ));
        };
        if algorithm_id == ALGORITHM_ID_RSA {
            if value.len() < 6 {
                return Err(IOError::new(
                    IOErrorKind::InvalidData,
                    "RSA algorithm attributes too short",
                ));
            }
            let import_format = RsaImportFormat::try_from(value[5]).or(Err(IOError::new(
                IOErrorKind::InvalidData,
                format!("Unknown RSA import format: {:#04x}", value[5]),
            )))?;
            return Ok(KeyFormat::Rsa(RsaKeyFormat {
                modulus_length: u16::from_be_bytes([value[1], value[2]]),
                exponent_length: u16::from_be_bytes([value[3], value[4]]),
                import_format,
            }));
        }
        if let Ok(algorithm) = EcAlgorithm::try_from(algorithm_id) {
            let mut oid = &value[1..];
            let with_public_key = oid.last() == Some(&EC_IMPORT_WITH_PUBKEY);
            if with_public_key {
                oid = &oid[..oid.len() - 1];
            }
            if oid.is_empty() {
                return Err(IOError::new(
                    IOErrorKind::InvalidData,
                    "EC algorithm attributes carry no curve OID",
                ));
            }
            return Ok(KeyFormat::Ec(EcKeyFormat {
                algorithm,
                curve_oid: oid.to_vec(),
                with_public_key,
            }));
        }
        Err(IOError::new(
            IOErrorKind::InvalidData,
            format!("Unknown algorithm id: {:#04x}", algorithm_id),
        ))
    }

    /// Serialize back into algorithm-attribute bytes, e.g. for PUT DATA.
    pub fn attributes(&self) -> Vec<u8> {
        match self {
            KeyFormat::Rsa(rsa) => {
                let mut attributes = vec![ALGORITHM_ID_RSA];
                attributes.extend(rsa.modulus_length.to_be_bytes());
                attributes.extend(rsa.exponent_length.to_be_bytes());
                attributes.push(u8::from(rsa.import_format));
                attributes
            }
            KeyFormat::Ec(ec) => {
                let mut attributes = vec![u8::from(ec.algorithm)];
                attributes.extend(&ec.curve_oid);
                if ec.with_public_key {
                    attributes.push(EC_IMPORT_WITH_PUBKEY);
                }
                attributes
            }
        }
    }
}

/// RSA private key in CRT form, every component big-endian.
#[derive(Debug, Clone)]
pub struct RsaCrtKey {
    pub public_exponent: Vec<u8>,
    pub prime_p: Vec<u8>,
    pub prime_q: Vec<u8>,
    /// 1/q mod p
    pub crt_coefficient: Vec<u8>,
    /// d mod (p - 1)
    pub prime_exponent_p: Vec<u8>,
    /// d mod (q - 1)
    pub prime_exponent_q: Vec<u8>,
    pub modulus: Vec<u8>,
}

/// EC private scalar with its optional uncompressed public point.
#[derive(Debug, Clone)]
pub struct EcPrivateKey {
    pub scalar: Vec<u8>,
    pub public_point: Option<Vec<u8>>,
}

/// Build the 0x4D extended header list importing an RSA private key.
pub fn rsa_key_template(
    slot: KeyType,
    key: &RsaCrtKey,
    format: &RsaKeyFormat,
) -> Result<Vec<u8>, IOError> {
    let exponent_width = (usize::from(format.exponent_length) + 7) / 8;
    let modulus_width = usize::from(format.modulus_length) / 8;
    let prime_width = modulus_width / 2;

    let mut template: Vec<u8> = Vec::new();
    let mut data: Vec<u8> = Vec::new();

    template.push(0x91);
    template.extend(encode_length(exponent_width));
    write_fixed_width(&mut data, &key.public_exponent, exponent_width)?;

    template.push(0x92);
    template.extend(encode_length(prime_width));
    write_fixed_width(&mut data, &key.prime_p, prime_width)?;

    template.push(0x93);
    template.extend(encode_length(prime_width));
    write_fixed_width(&mut data, &key.prime_q, prime_width)?;

    if format.import_format.includes_crt() {
        template.push(0x94);
        template.extend(encode_length(prime_width));
        write_fixed_width(&mut data, &key.crt_coefficient, prime_width)?;

        template.push(0x95);
        template.extend(encode_length(prime_width));
        write_fixed_width(&mut data, &key.prime_exponent_p, prime_width)?;

        template.push(0x96);
        template.extend(encode_length(prime_width));
        write_fixed_width(&mut data, &key.prime_exponent_q, prime_width)?;
    }

    if format.import_format.includes_modulus() {
        template.push(0x97);
        template.extend(encode_length(modulus_width));
        write_fixed_width(&mut data, &key.modulus, modulus_width)?;
    }

    Ok(bundle_template(slot, &template, &data))
}

/// Build the 0x4D extended header list importing an EC private key.
pub fn ec_key_template(
    slot: KeyType,
    key: &EcPrivateKey,
    format: &EcKeyFormat,
) -> Result<Vec<u8>, IOError> {
    let field_size = format.field_size()?;

    let mut template: Vec<u8> = Vec::new();
    let mut data: Vec<u8> = Vec::new();

    template.push(0x92);
    template.extend(encode_length(field_size));
    write_fixed_width(&mut data, &key.scalar, field_size)?;

    if format.with_public_key {
        let Some(point) = &key.public_point else {
            return Err(IOError::new(
                IOErrorKind::InvalidData,
                "Key format requires the public point",
            ));
        };
        let point_length = 1 + 2 * field_size;
        if point.len() != point_length || point[0] != 0x04 {
            return Err(IOError::new(
                IOErrorKind::InvalidData,
                "Public point must be in uncompressed SEC1 form",
            ));
        }
        data.extend(point);
        template.push(0x99);
        template.extend(encode_length(point_length));
    }

    Ok(bundle_template(slot, &template, &data))
}

fn bundle_template(slot: KeyType, template: &[u8], data: &[u8]) -> Vec<u8> {
    // Control reference naming the private key slot.
    let mut stream: Vec<u8> = vec![slot.slot(), 0x00];

    // Cardholder private key template.
    stream.extend([0x7F, 0x48]);
    stream.extend(encode_length(template.len()));
    stream.extend(template);

    // Concatenated key data, as laid out by DO 0x7F48.
    stream.extend([0x5F, 0x48]);
    stream.extend(encode_length(data.len()));
    stream.extend(data);

    let mut result: Vec<u8> = vec![0x4D];
    result.extend(encode_length(stream.len()));
    result.extend(&stream);
    result
}

/// Append `value` left-padded to exactly `width` bytes.
///
/// Leading zero bytes are stripped before the width check; a value still
/// wider than `width` is a construction error, never truncated.
fn write_fixed_width(out: &mut Vec<u8>, value: &[u8], width: usize) -> Result<(), IOError> {
    if width == 0 {
        return Err(IOError::new(IOErrorKind::InvalidData, "Zero field width"));
    }
    let significant = match value.iter().position(|&byte| byte != 0) {
        Some(index) => &value[index..],
        None => &[],
    };
    if significant.len() > width {
        return Err(IOError::new(
            IOErrorKind::InvalidData,
            format!(
                "Not enough width to fit value: {}/{}",
                significant.len(),
                width
            ),
        ));
    }
    out.extend(std::iter::repeat(0x00).take(width - significant.len()));
    out.extend(significant);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::openpgp::tlv::Tlv;

    fn rsa_2048_crt_format() -> RsaKeyFormat {
        RsaKeyFormat {
            modulus_length: 2048,
            exponent_length: 32,
            import_format: RsaImportFormat::Crt,
        }
    }

    fn p256_format(with_public_key: bool) -> EcKeyFormat {
        EcKeyFormat {
            algorithm: EcAlgorithm::Ecdh,
            curve_oid: OID_NIST_P256.to_vec(),
            with_public_key,
        }
    }

    #[test]
    fn rsa_algorithm_attributes_round_trip() {
        let format = KeyFormat::Rsa(rsa_2048_crt_format());
        let attributes = format.attributes();
        assert_eq!(attributes, vec![0x01, 0x08, 0x00, 0x00, 0x20, 0x02]);
        assert_eq!(KeyFormat::from_bytes(&attributes).unwrap(), format);
    }

    #[test]
    fn ec_algorithm_attributes_round_trip() {
        let format = KeyFormat::Ec(p256_format(true));
        let attributes = format.attributes();
        assert_eq!(attributes[0], 0x12);
        assert_eq!(*attributes.last().unwrap(), 0xFF);
        assert_eq!(KeyFormat::from_bytes(&attributes).unwrap(), format);

        let bare = KeyFormat::Ec(p256_format(false));
        assert_eq!(KeyFormat::from_bytes(&bare.attributes()).unwrap(), bare);
    }

    #[test]
    fn unknown_algorithm_id_is_rejected() {
        assert!(KeyFormat::from_bytes(&[0x42, 0x00]).is_err());
        assert!(KeyFormat::from_bytes(&[]).is_err());
    }

    #[test]
    fn rsa_template_layout_for_2048_bit_crt_key() {
        let key = RsaCrtKey {
            public_exponent: vec![0x01, 0x00, 0x01],
            prime_p: vec![0x11; 128],
            prime_q: vec![0x22; 128],
            crt_coefficient: vec![0x33; 128],
            prime_exponent_p: vec![0x44; 128],
            prime_exponent_q: vec![0x55; 128],
            modulus: vec![0x66; 256],
        };
        let template = rsa_key_template(KeyType::Sign, &key, &rsa_2048_crt_format()).unwrap();

        let outer = Tlv::read_single(&template).unwrap();
        assert_eq!(outer.tag, 0x4D);
        // Control reference for the signature slot.
        assert_eq!(&outer.value[..2], &[0xB6, 0x00]);

        let inner = Tlv::read_list(&outer.value[2..]).unwrap();
        assert_eq!(inner.len(), 2);
        assert_eq!(inner[0].tag, 0x7F48);
        // 0x91 e(4), then five 128-byte fields with long-form lengths.
        assert_eq!(
            inner[0].value,
            vec![
                0x91, 0x04, 0x92, 0x81, 0x80, 0x93, 0x81, 0x80, 0x94, 0x81, 0x80, 0x95, 0x81,
                0x80, 0x96, 0x81, 0x80
            ]
        );
        assert_eq!(inner[1].tag, 0x5F48);
        let data = &inner[1].value;
        assert_eq!(data.len(), 4 + 5 * 128);
        // The exponent is left-padded to its declared width.
        assert_eq!(&data[..4], &[0x00, 0x01, 0x00, 0x01]);
        assert_eq!(&data[4..6], &[0x11, 0x11]);
    }

    #[test]
    fn rsa_template_includes_modulus_when_format_asks() {
        let key = RsaCrtKey {
            public_exponent: vec![0x01, 0x00, 0x01],
            prime_p: vec![0x11; 128],
            prime_q: vec![0x22; 128],
            crt_coefficient: vec![0x33; 128],
            prime_exponent_p: vec![0x44; 128],
            prime_exponent_q: vec![0x55; 128],
            modulus: vec![0x66; 256],
        };
        let format = RsaKeyFormat {
            import_format: RsaImportFormat::CrtWithModulus,
            ..rsa_2048_crt_format()
        };
        let template = rsa_key_template(KeyType::Encrypt, &key, &format).unwrap();
        let outer = Tlv::read_single(&template).unwrap();
        assert_eq!(&outer.value[..2], &[0xB8, 0x00]);
        let inner = Tlv::read_list(&outer.value[2..]).unwrap();
        assert!(inner[0].value.ends_with(&[0x97, 0x82, 0x01, 0x00]));
        assert_eq!(inner[1].value.len(), 4 + 5 * 128 + 256);
    }

    #[test]
    fn oversized_component_is_a_construction_error() {
        let key = RsaCrtKey {
            public_exponent: vec![0x01; 5], // five significant bytes, width 4
            prime_p: vec![0x11; 128],
            prime_q: vec![0x22; 128],
            crt_coefficient: vec![0x33; 128],
            prime_exponent_p: vec![0x44; 128],
            prime_exponent_q: vec![0x55; 128],
            modulus: vec![],
        };
        assert!(rsa_key_template(KeyType::Sign, &key, &rsa_2048_crt_format()).is_err());
    }

    #[test]
    fn leading_zeroes_do_not_count_against_the_width() {
        let mut out = Vec::new();
        write_fixed_width(&mut out, &[0x00, 0x00, 0x01, 0x02], 2).unwrap();
        assert_eq!(out, vec![0x01, 0x02]);

        let mut out = Vec::new();
        write_fixed_width(&mut out, &[], 3).unwrap();
        assert_eq!(out, vec![0x00, 0x00, 0x00]);
    }

    #[test]
    fn ec_template_with_public_point() {
        let mut point = vec![0x04];
        point.extend([0xAA; 32]);
        point.extend([0xBB; 32]);
        let key = EcPrivateKey {
            scalar: vec![0x77; 32],
            public_point: Some(point.clone()),
        };
        let template = ec_key_template(KeyType::Encrypt, &key, &p256_format(true)).unwrap();
        let outer = Tlv::read_single(&template).unwrap();
        assert_eq!(outer.tag, 0x4D);
        let inner = Tlv::read_list(&outer.value[2..]).unwrap();
        assert_eq!(inner[0].value, vec![0x92, 0x20, 0x99, 0x41]);
        let mut expected_data = vec![0x77; 32];
        expected_data.extend(&point);
        assert_eq!(inner[1].value, expected_data);
    }

    #[test]
    fn ec_template_without_public_point() {
        let key = EcPrivateKey {
            scalar: vec![0x77; 32],
            public_point: None,
        };
        let template = ec_key_template(KeyType::Auth, &key, &p256_format(false)).unwrap();
        let outer = Tlv::read_single(&template).unwrap();
        assert_eq!(&outer.value[..2], &[0xA4, 0x00]);
        let inner = Tlv::read_list(&outer.value[2..]).unwrap();
        assert_eq!(inner[0].value, vec![0x92, 0x20]);
        assert_eq!(inner[1].value, vec![0x77; 32]);
    }

    #[test]
    fn ec_template_demands_the_point_when_format_requires_it() {
        let key = EcPrivateKey {
            scalar: vec![0x77; 32],
            public_point: None,
        };
        assert!(ec_key_template(KeyType::Encrypt, &key, &p256_format(true)).is_err());
    }

    #[test]
    fn unknown_curve_oid_is_rejected() {
        let format = EcKeyFormat {
            algorithm: EcAlgorithm::Ecdsa,
            curve_oid: vec![0x01, 0x02, 0x03],
            with_public_key: false,
        };
        let key = EcPrivateKey {
            scalar: vec![0x77; 32],
            public_point: None,
        };
        assert!(ec_key_template(KeyType::Sign, &key, &format).is_err());
    }
}
