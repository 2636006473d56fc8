use std::time::Duration;

use aes::cipher::{block_padding::NoPadding, BlockDecryptMut};
use cbc::cipher::{BlockEncryptMut, KeyIvInit};
use cosey::PublicKey;
use hkdf::Hkdf;
use hmac::Mac;
use p256::elliptic_curve::generic_array::GenericArray;
use p256::{
    ecdh::EphemeralSecret, elliptic_curve::sec1::FromEncodedPoint, EncodedPoint,
    PublicKey as P256PublicKey,
};
use rand::{rngs::OsRng, thread_rng, Rng};
use sha2::{Digest, Sha256};
use tracing::{debug, error, info, warn};

use crate::proto::ctap2::{
    Ctap2, Ctap2ClientPinRequest, Ctap2GetInfoResponse, Ctap2PinUvAuthProtocol,
};
use crate::proto::CtapError;
use crate::transport::error::{Error, PlatformError};
use crate::transport::Channel;

type Aes256CbcEncryptor = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDecryptor = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = hmac::Hmac<Sha256>;

const PIN_PADDED_LENGTH: usize = 64;

pub trait PinProvider {
    fn provide_pin(&self, attempts_left: Option<u32>) -> Option<String>;
}

#[derive(Debug, Clone)]
pub struct StaticPinProvider {
    pin: String,
}

impl StaticPinProvider {
    pub fn new(pin: &str) -> Self {
        Self {
            pin: pin.to_owned(),
        }
    }
}

impl PinProvider for StaticPinProvider {
    fn provide_pin(&self, attempts_left: Option<u32>) -> Option<String> {
        if attempts_left.map_or(false, |no| no <= 1) {
            warn!(
                ?attempts_left,
                "Refusing to provide static PIN, insufficient number of attempts left"
            );
            return None;
        }

        info!({ ?attempts_left }, "Providing static PIN");
        Some(self.pin.clone())
    }
}

pub struct StdinPromptPinProvider {}

impl StdinPromptPinProvider {
    pub fn new() -> Self {
        Self {}
    }
}

impl PinProvider for StdinPromptPinProvider {
    fn provide_pin(&self, attempts_left: Option<u32>) -> Option<String> {
        use std::io::{self, Write};
        use text_io::read;

        if let Some(attempts_left) = attempts_left {
            println!("PIN: {} attempts left.", attempts_left);
        }
        print!("PIN: Please enter the PIN for your token: ");
        io::stdout().flush().unwrap();
        let pin_raw: String = read!("{}\n");

        if pin_raw.is_empty() {
            println!("PIN: No PIN provided, cancelling operation.");
            return None;
        }

        Some(pin_raw)
    }
}

pub trait PinUvAuthProtocol {
    fn version(&self) -> Ctap2PinUvAuthProtocol;

    /// encapsulate(peerCoseKey) → (coseKey, sharedSecret) | error
    fn encapsulate(&self, peer_public_key: &PublicKey) -> Result<(PublicKey, Vec<u8>), Error>;

    /// encrypt(key, demPlaintext) → ciphertext
    ///   The plaintext length must be a multiple of the AES block size.
    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error>;

    /// decrypt(key, ciphertext) → plaintext | error
    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error>;

    /// authenticate(key, message) → signature
    fn authenticate(&self, key: &[u8], message: &[u8]) -> Vec<u8>;
}

trait ECPrivateKeyPinUvAuthProtocol {
    fn private_key(&self) -> &EphemeralSecret;
    fn public_key(&self) -> &P256PublicKey;
    fn kdf(&self, bytes: &[u8]) -> Vec<u8>;
}

/// ECDH encapsulation shared between the two PIN/UV auth protocols.
trait ECDHPinUvAuthProtocol {
    fn ecdh(&self, peer_public_key: &PublicKey) -> Result<Vec<u8>, Error>;
    fn encapsulate(&self, peer_public_key: &PublicKey) -> Result<(PublicKey, Vec<u8>), Error>;
    fn get_public_key(&self) -> PublicKey;
}

impl<P> ECDHPinUvAuthProtocol for P
where
    P: ECPrivateKeyPinUvAuthProtocol,
{
    fn encapsulate(&self, peer_public_key: &PublicKey) -> Result<(PublicKey, Vec<u8>), Error> {
        let shared_secret = self.ecdh(peer_public_key)?;
        Ok((self.get_public_key(), shared_secret))
    }

    /// ecdh(peerCoseKey) → sharedSecret | error
    fn ecdh(&self, peer_public_key: &PublicKey) -> Result<Vec<u8>, Error> {
        // Produce a P-256 point from peerCoseKey; error out if it is not on
        // the curve.
        let PublicKey::EcdhEsHkdf256Key(peer_public_key) = peer_public_key else {
            error!("Unsupported peerCoseKey format; only EcdhEsHkdf256Key is supported");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };
        if peer_public_key.x.len() != 32 || peer_public_key.y.len() != 32 {
            error!("Malformed peerCoseKey coordinates");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        }
        let encoded_point = EncodedPoint::from_affine_coordinates(
            GenericArray::from_slice(&peer_public_key.x),
            GenericArray::from_slice(&peer_public_key.y),
            false,
        );
        let peer_point: Option<P256PublicKey> =
            P256PublicKey::from_encoded_point(&encoded_point).into();
        let Some(peer_point) = peer_point else {
            error!("Peer public key is not a valid curve point");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };

        // Scalar-multiply the peer's point with our private agreement key,
        // then derive the shared secret.
        let shared = self.private_key().diffie_hellman(&peer_point);
        Ok(self.kdf(shared.raw_secret_bytes().as_slice()))
    }

    fn get_public_key(&self) -> PublicKey {
        let point = EncodedPoint::from(self.public_key());
        let x: heapless::Vec<u8, 32> =
            heapless::Vec::from_slice(point.x().expect("Not the identity point").as_slice())
                .unwrap();
        let y: heapless::Vec<u8, 32> =
            heapless::Vec::from_slice(point.y().expect("Not identity nor compressed").as_slice())
                .unwrap();
        PublicKey::EcdhEsHkdf256Key(cosey::EcdhEsHkdf256PublicKey {
            x: x.into(),
            y: y.into(),
        })
    }
}

pub struct PinUvAuthProtocolOne {
    private_key: EphemeralSecret,
    public_key: P256PublicKey,
}

impl PinUvAuthProtocolOne {
    pub fn new() -> Self {
        let private_key = EphemeralSecret::random(&mut OsRng);
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }
}

impl Default for PinUvAuthProtocolOne {
    fn default() -> Self {
        Self::new()
    }
}

impl ECPrivateKeyPinUvAuthProtocol for PinUvAuthProtocolOne {
    fn private_key(&self) -> &EphemeralSecret {
        &self.private_key
    }

    fn public_key(&self) -> &P256PublicKey {
        &self.public_key
    }

    /// kdf(Z) → SHA-256(Z)
    fn kdf(&self, bytes: &[u8]) -> Vec<u8> {
        let mut hasher = Sha256::default();
        hasher.update(bytes);
        hasher.finalize().to_vec()
    }
}

impl PinUvAuthProtocol for PinUvAuthProtocolOne {
    fn version(&self) -> Ctap2PinUvAuthProtocol {
        Ctap2PinUvAuthProtocol::One
    }

    fn encapsulate(&self, peer_public_key: &PublicKey) -> Result<(PublicKey, Vec<u8>), Error> {
        <Self as ECDHPinUvAuthProtocol>::encapsulate(self, peer_public_key)
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        // AES-256-CBC with an all-zero IV; no padding, the plaintext length
        // is required to be a multiple of the AES block size.
        let iv: &[u8] = &[0; 16];
        let Ok(enc) = Aes256CbcEncryptor::new_from_slices(key, iv) else {
            error!("Invalid key for AES-256 encryption");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };
        Ok(enc.encrypt_padded_vec_mut::<NoPadding>(plaintext))
    }

    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        if ciphertext.len() % 16 != 0 {
            error!(
                { len = ciphertext.len() },
                "Ciphertext length is not a multiple of AES block length"
            );
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        }

        let iv: &[u8] = &[0; 16];
        let Ok(dec) = Aes256CbcDecryptor::new_from_slices(key, iv) else {
            error!("Invalid key for AES-256 decryption");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };
        let Ok(plaintext) = dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext) else {
            error!("Unpad error while decrypting");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };
        Ok(plaintext)
    }

    fn authenticate(&self, key: &[u8], message: &[u8]) -> Vec<u8> {
        // First 16 bytes of HMAC-SHA-256 over the message.
        let hmac = hmac_sha256(key, message);
        Vec::from(&hmac[..16])
    }
}

pub struct PinUvAuthProtocolTwo {
    private_key: EphemeralSecret,
    public_key: P256PublicKey,
}

impl PinUvAuthProtocolTwo {
    pub fn new() -> Self {
        let private_key = EphemeralSecret::random(&mut OsRng);
        let public_key = private_key.public_key();
        Self {
            private_key,
            public_key,
        }
    }
}

impl Default for PinUvAuthProtocolTwo {
    fn default() -> Self {
        Self::new()
    }
}

impl ECPrivateKeyPinUvAuthProtocol for PinUvAuthProtocolTwo {
    fn private_key(&self) -> &EphemeralSecret {
        &self.private_key
    }

    fn public_key(&self) -> &P256PublicKey {
        &self.public_key
    }

    /// kdf(Z) → HMAC-key portion || AES-key portion
    fn kdf(&self, ikm: &[u8]) -> Vec<u8> {
        let salt: &[u8] = &[0u8; 32];
        let mut output = hkdf_sha256(Some(salt), ikm, "CTAP2 HMAC key".as_bytes());
        output.extend(hkdf_sha256(Some(salt), ikm, "CTAP2 AES key".as_bytes()));
        output
    }
}

impl PinUvAuthProtocol for PinUvAuthProtocolTwo {
    fn version(&self) -> Ctap2PinUvAuthProtocol {
        Ctap2PinUvAuthProtocol::Two
    }

    fn encapsulate(&self, peer_public_key: &PublicKey) -> Result<(PublicKey, Vec<u8>), Error> {
        <Self as ECDHPinUvAuthProtocol>::encapsulate(self, peer_public_key)
    }

    fn encrypt(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>, Error> {
        // The second half of the shared secret is the AES key.
        if key.len() < 64 {
            error!({ len = key.len() }, "Shared secret too short");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        }
        let key = &key[32..];

        let iv: [u8; 16] = thread_rng().gen();
        let Ok(enc) = Aes256CbcEncryptor::new_from_slices(key, &iv) else {
            error!("Invalid key for AES-256 encryption");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };
        let ct = enc.encrypt_padded_vec_mut::<NoPadding>(plaintext);

        // iv || ct
        let mut out = Vec::from(iv);
        out.extend(ct);
        Ok(out)
    }

    fn decrypt(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, Error> {
        if key.len() < 64 {
            error!({ len = key.len() }, "Shared secret too short");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        }
        let key = &key[32..];

        if ciphertext.len() < 16 || (ciphertext.len() - 16) % 16 != 0 {
            error!({ len = ciphertext.len() }, "Invalid length for ciphertext");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        }

        let (iv, ciphertext) = ciphertext.split_at(16);
        let Ok(dec) = Aes256CbcDecryptor::new_from_slices(key, iv) else {
            error!("Invalid key for AES-256 decryption");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };
        let Ok(plaintext) = dec.decrypt_padded_vec_mut::<NoPadding>(ciphertext) else {
            error!("Unpad error while decrypting");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };
        Ok(plaintext)
    }

    fn authenticate(&self, key: &[u8], message: &[u8]) -> Vec<u8> {
        // The first half of the shared secret is the HMAC key; the
        // pinUvAuthToken is exactly 32 bytes, so taking the prefix is a
        // no-op for it.
        let key = &key[..usize::min(32, key.len())];
        hmac_sha256(key, message)
    }
}

/// hash(pin) → LEFT(SHA-256(pin), 16)
pub fn pin_hash(pin: &[u8]) -> Vec<u8> {
    let mut hasher = Sha256::default();
    hasher.update(pin);
    let hashed = hasher.finalize().to_vec();
    Vec::from(&hashed[..16])
}

pub fn hmac_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut hmac = HmacSha256::new_from_slice(key).expect("Any key size is valid");
    hmac.update(message);
    hmac.finalize().into_bytes().to_vec()
}

pub fn hkdf_sha256(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> Vec<u8> {
    let hk = Hkdf::<Sha256>::new(salt, ikm);
    let mut okm = [0u8; 32];
    hk.expand(info, &mut okm)
        .expect("32 is a valid length for Sha256 to output");
    Vec::from(okm)
}

/// Pick the strongest PIN/UV auth protocol the token advertises.
///
/// Tokens that predate the pinUvAuthProtocols field speak protocol one.
pub fn select_uv_proto(get_info_response: &Ctap2GetInfoResponse) -> Box<dyn PinUvAuthProtocol> {
    if get_info_response.supports_pin_uv_auth_protocol(2) {
        return Box::new(PinUvAuthProtocolTwo::new());
    }
    Box::new(PinUvAuthProtocolOne::new())
}

/// Run the key-agreement subcommand and derive the session's shared secret.
pub fn obtain_shared_secret<C: Channel>(
    channel: &mut C,
    uv_proto: &dyn PinUvAuthProtocol,
    timeout: Duration,
) -> Result<(PublicKey, Vec<u8>), Error> {
    let request = Ctap2ClientPinRequest::new_get_key_agreement(uv_proto.version());
    let response = channel.ctap2_client_pin(&request, timeout)?;
    let Some(public_key) = response.key_agreement else {
        warn!("Token did not return a key-agreement key");
        return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
    };
    uv_proto.encapsulate(&public_key)
}

/// Ask the user for the PIN, disclosing how many attempts remain.
pub fn obtain_pin<C: Channel>(
    channel: &mut C,
    uv_proto: &dyn PinUvAuthProtocol,
    pin_provider: &dyn PinProvider,
    timeout: Duration,
) -> Result<Vec<u8>, Error> {
    let request = Ctap2ClientPinRequest::new_get_pin_retries(uv_proto.version());
    let response = channel.ctap2_client_pin(&request, timeout)?;
    let Some(pin) = pin_provider.provide_pin(response.retries) else {
        info!("No PIN provided, cancelling operation");
        return Err(Error::Ctap(CtapError::PinRequired));
    };
    Ok(pin.into_bytes())
}

/// Obtain a decrypted pinToken for subsequent authenticated exchanges.
pub fn obtain_pin_token<C: Channel>(
    channel: &mut C,
    uv_proto: &dyn PinUvAuthProtocol,
    pin: &[u8],
    timeout: Duration,
) -> Result<Vec<u8>, Error> {
    let (public_key, shared_secret) = obtain_shared_secret(channel, uv_proto, timeout)?;
    let pin_hash_enc = uv_proto.encrypt(&shared_secret, &pin_hash(pin))?;
    let request =
        Ctap2ClientPinRequest::new_get_pin_token(uv_proto.version(), public_key, &pin_hash_enc);
    let response = channel.ctap2_client_pin(&request, timeout)?;
    let Some(token_enc) = response.pin_token else {
        warn!("Token did not return a pinToken");
        return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
    };
    debug!("Obtained encrypted pinToken");
    uv_proto.decrypt(&shared_secret, &token_enc)
}

pub trait PinManagement {
    /// Set the token's PIN, or change it after verifying the current one.
    fn change_pin(
        &mut self,
        pin_provider: &dyn PinProvider,
        new_pin: String,
        timeout: Duration,
    ) -> Result<(), Error>;
}

impl<C> PinManagement for C
where
    C: Channel,
{
    fn change_pin(
        &mut self,
        pin_provider: &dyn PinProvider,
        new_pin: String,
        timeout: Duration,
    ) -> Result<(), Error> {
        let get_info_response = self.ctap2_get_info(timeout)?;

        // Absent minPINLength means 4 code points.
        if new_pin.as_bytes().len() < get_info_response.min_pin_length.unwrap_or(4) as usize {
            return Err(Error::Platform(PlatformError::PinTooShort));
        }

        // The UTF-8 representation is limited to 63 bytes.
        if new_pin.as_bytes().len() >= PIN_PADDED_LENGTH {
            return Err(Error::Platform(PlatformError::PinTooLong));
        }

        let uv_proto = select_uv_proto(&get_info_response);

        let current_pin = match get_info_response
            .options
            .as_ref()
            .and_then(|options| options.get("clientPin"))
            .copied()
        {
            // A PIN is set already; it must be verified to change it.
            Some(true) => Some(obtain_pin(self, uv_proto.as_ref(), pin_provider, timeout)?),

            // No PIN set yet.
            Some(false) => None,

            // The token does not support a PIN at all.
            None => {
                return Err(Error::Platform(PlatformError::PinNotSupported));
            }
        };

        let (public_key, shared_secret) = obtain_shared_secret(self, uv_proto.as_ref(), timeout)?;

        // newPin, right-padded with zero bytes to 64; there is always at
        // least one byte of padding.
        let mut padded_new_pin = new_pin.as_bytes().to_vec();
        padded_new_pin.resize(PIN_PADDED_LENGTH, 0x00);
        let new_pin_enc = uv_proto.encrypt(&shared_secret, &padded_new_pin)?;

        let request = match current_pin {
            Some(curr_pin) => {
                let pin_hash_enc = uv_proto.encrypt(&shared_secret, &pin_hash(&curr_pin))?;
                let uv_auth_param = uv_proto.authenticate(
                    &shared_secret,
                    &[new_pin_enc.as_slice(), pin_hash_enc.as_slice()].concat(),
                );
                Ctap2ClientPinRequest::new_change_pin(
                    uv_proto.version(),
                    &new_pin_enc,
                    &pin_hash_enc,
                    public_key,
                    &uv_auth_param,
                )
            }
            None => {
                let uv_auth_param = uv_proto.authenticate(&shared_secret, &new_pin_enc);
                Ctap2ClientPinRequest::new_set_pin(
                    uv_proto.version(),
                    &new_pin_enc,
                    public_key,
                    &uv_auth_param,
                )
            }
        };

        // On success the response carries no fields.
        let _ = self.ctap2_client_pin(&request, timeout)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peer_pair() -> (EphemeralSecret, PublicKey) {
        let secret = EphemeralSecret::random(&mut OsRng);
        let public = secret.public_key();
        let point = EncodedPoint::from(&public);
        let x: heapless::Vec<u8, 32> =
            heapless::Vec::from_slice(point.x().unwrap().as_slice()).unwrap();
        let y: heapless::Vec<u8, 32> =
            heapless::Vec::from_slice(point.y().unwrap().as_slice()).unwrap();
        let cose = PublicKey::EcdhEsHkdf256Key(cosey::EcdhEsHkdf256PublicKey {
            x: x.into(),
            y: y.into(),
        });
        (secret, cose)
    }

    #[test]
    fn pin_hash_is_a_truncated_sha256() {
        // SHA-256("1234") = 03ac674216f3e15c761ee1a5e255f067953623c8b388b4459e13f978d7c846f4
        assert_eq!(
            pin_hash(b"1234"),
            vec![
                0x03, 0xac, 0x67, 0x42, 0x16, 0xf3, 0xe1, 0x5c, 0x76, 0x1e, 0xe1, 0xa5, 0xe2,
                0x55, 0xf0, 0x67
            ]
        );
    }

    #[test]
    fn protocol_one_encrypt_decrypt_round_trip() {
        let proto = PinUvAuthProtocolOne::new();
        let key = [0x42u8; 32];
        let plaintext = [0x01u8; 64];
        let ciphertext = proto.encrypt(&key, &plaintext).unwrap();
        assert_eq!(ciphertext.len(), 64);
        assert_ne!(ciphertext.as_slice(), plaintext.as_slice());
        assert_eq!(proto.decrypt(&key, &ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn protocol_one_authenticate_truncates_to_16_bytes() {
        let proto = PinUvAuthProtocolOne::new();
        let signature = proto.authenticate(&[0x0Au8; 32], b"message");
        assert_eq!(signature.len(), 16);
        assert_eq!(signature, hmac_sha256(&[0x0Au8; 32], b"message")[..16]);
    }

    #[test]
    fn protocol_two_encrypt_prepends_a_random_iv() {
        let proto = PinUvAuthProtocolTwo::new();
        let key = [0x42u8; 64];
        let plaintext = [0x02u8; 32];
        let first = proto.encrypt(&key, &plaintext).unwrap();
        let second = proto.encrypt(&key, &plaintext).unwrap();
        assert_eq!(first.len(), 16 + 32);
        assert_ne!(first, second);
        assert_eq!(proto.decrypt(&key, &first).unwrap(), plaintext);
        assert_eq!(proto.decrypt(&key, &second).unwrap(), plaintext);
    }

    #[test]
    fn protocol_two_rejects_short_ciphertext() {
        let proto = PinUvAuthProtocolTwo::new();
        assert!(proto.decrypt(&[0u8; 64], &[0u8; 8]).is_err());
    }

    #[test]
    fn encapsulation_agrees_with_the_peer() {
        let proto = PinUvAuthProtocolOne::new();
        let (peer_secret, peer_cose) = peer_pair();
        let (our_cose, shared_secret) =
            PinUvAuthProtocol::encapsulate(&proto, &peer_cose).unwrap();

        // The peer runs the same ECDH with our public key.
        let PublicKey::EcdhEsHkdf256Key(ours) = our_cose else {
            panic!("expected an ECDH-ES+HKDF-256 key");
        };
        let our_point = EncodedPoint::from_affine_coordinates(
            GenericArray::from_slice(&ours.x),
            GenericArray::from_slice(&ours.y),
            false,
        );
        let our_key: Option<P256PublicKey> =
            P256PublicKey::from_encoded_point(&our_point).into();
        let shared = peer_secret.diffie_hellman(&our_key.unwrap());
        let mut hasher = Sha256::default();
        hasher.update(shared.raw_secret_bytes().as_slice());
        assert_eq!(shared_secret, hasher.finalize().to_vec());
    }

    #[test]
    fn protocol_two_derives_64_byte_secrets() {
        let proto = PinUvAuthProtocolTwo::new();
        let (_, peer_cose) = peer_pair();
        let (_, shared_secret) = PinUvAuthProtocol::encapsulate(&proto, &peer_cose).unwrap();
        assert_eq!(shared_secret.len(), 64);
    }

    #[test]
    fn encapsulation_rejects_an_off_curve_point() {
        let proto = PinUvAuthProtocolOne::new();
        let x: heapless::Vec<u8, 32> = heapless::Vec::from_slice(&[0x01; 32]).unwrap();
        let y: heapless::Vec<u8, 32> = heapless::Vec::from_slice(&[0x02; 32]).unwrap();
        let bogus = PublicKey::EcdhEsHkdf256Key(cosey::EcdhEsHkdf256PublicKey {
            x: x.into(),
            y: y.into(),
        });
        assert!(PinUvAuthProtocol::encapsulate(&proto, &bogus).is_err());
    }

    #[test]
    fn static_pin_provider_withholds_final_attempt() {
        let provider = StaticPinProvider::new("123456");
        assert_eq!(provider.provide_pin(Some(8)), Some("123456".to_owned()));
        assert_eq!(provider.provide_pin(None), Some("123456".to_owned()));
        assert_eq!(provider.provide_pin(Some(1)), None);
    }
}
