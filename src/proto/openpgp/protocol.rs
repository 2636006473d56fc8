use std::time::Duration;

use tracing::{debug, info, trace, warn};

use crate::proto::apdu::{ApduRequest, ApduResponse, ApduResponseStatus};
use crate::transport::error::{Error, PlatformError};
use crate::transport::Channel;

use super::capabilities::OpenPgpCapabilities;
use super::keys::{
    ec_key_template, rsa_key_template, EcKeyFormat, EcPrivateKey, KeyType, RsaCrtKey, RsaKeyFormat,
};

/// Application identifier of the OpenPGP applet.
pub const OPENPGP_AID: [u8; 6] = [0xD2, 0x76, 0x00, 0x01, 0x24, 0x01];

/// Data object holding the application related data.
const DO_APPLICATION_RELATED_DATA: u16 = 0x006E;

pub trait OpenPgp {
    /// Select the OpenPGP applet.
    fn openpgp_select(&mut self, timeout: Duration) -> Result<(), Error>;

    /// Read and parse the application related data (DO 0x6E).
    fn openpgp_capabilities(&mut self, timeout: Duration) -> Result<OpenPgpCapabilities, Error>;

    /// Upload an RSA private key into a slot (PUT DATA, extended header list).
    fn openpgp_import_rsa_key(
        &mut self,
        slot: KeyType,
        key: &RsaCrtKey,
        format: &RsaKeyFormat,
        timeout: Duration,
    ) -> Result<(), Error>;

    /// Upload an EC private key into a slot.
    fn openpgp_import_ec_key(
        &mut self,
        slot: KeyType,
        key: &EcPrivateKey,
        format: &EcKeyFormat,
        timeout: Duration,
    ) -> Result<(), Error>;
}

impl<C> OpenPgp for C
where
    C: Channel,
{
    fn openpgp_select(&mut self, timeout: Duration) -> Result<(), Error> {
        let request = ApduRequest::new(0x00, 0xA4, 0x04, 0x00, Some(&OPENPGP_AID), Some(0x100));
        let response = self.apdu_exchange(&request, timeout)?;
        expect_success(&response)?;
        debug!("OpenPGP applet selected");
        Ok(())
    }

    fn openpgp_capabilities(&mut self, timeout: Duration) -> Result<OpenPgpCapabilities, Error> {
        let response = get_data(self, DO_APPLICATION_RELATED_DATA, timeout)?;
        let capabilities = OpenPgpCapabilities::from_bytes(&response)
            .or(Err(Error::Platform(PlatformError::InvalidDeviceResponse)))?;
        info!(?capabilities, "OpenPGP card capabilities");
        Ok(capabilities)
    }

    fn openpgp_import_rsa_key(
        &mut self,
        slot: KeyType,
        key: &RsaCrtKey,
        format: &RsaKeyFormat,
        timeout: Duration,
    ) -> Result<(), Error> {
        let template = rsa_key_template(slot, key, format)
            .or(Err(Error::Platform(PlatformError::InvalidKeyMaterial)))?;
        put_key_template(self, slot, &template, timeout)
    }

    fn openpgp_import_ec_key(
        &mut self,
        slot: KeyType,
        key: &EcPrivateKey,
        format: &EcKeyFormat,
        timeout: Duration,
    ) -> Result<(), Error> {
        let template = ec_key_template(slot, key, format)
            .or(Err(Error::Platform(PlatformError::InvalidKeyMaterial)))?;
        put_key_template(self, slot, &template, timeout)
    }
}

fn get_data<C: Channel>(channel: &mut C, tag: u16, timeout: Duration) -> Result<Vec<u8>, Error> {
    let [p1, p2] = tag.to_be_bytes();
    let request = ApduRequest::new(0x00, 0xCA, p1, p2, None, Some(ApduRequest::extended_max_le()));
    let response = channel.apdu_exchange(&request, timeout)?;
    expect_success(&response)?;
    trace!({ tag }, "GET DATA complete");
    Ok(response.data.unwrap_or_default())
}

fn put_key_template<C: Channel>(
    channel: &mut C,
    slot: KeyType,
    template: &[u8],
    timeout: Duration,
) -> Result<(), Error> {
    debug!({ slot = ?slot, len = template.len() }, "Importing private key");
    // PUT DATA (odd instruction) addressing the extended header list.
    let request = ApduRequest::new(0x00, 0xDB, 0x3F, 0xFF, Some(template), None);
    let response = channel.apdu_exchange(&request, timeout)?;
    expect_success(&response)?;
    info!(?slot, "Private key imported");
    Ok(())
}

fn expect_success(response: &ApduResponse) -> Result<(), Error> {
    let status = response.status().or_else(|_| {
        warn!(
            { sw = response.status_word() },
            "Unknown status word in response"
        );
        Err(Error::Platform(PlatformError::InvalidDeviceResponse))
    })?;
    if status != ApduResponseStatus::NoError {
        warn!(?status, "Card rejected the command");
        return Err(Error::Card(status));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::super::keys::EcAlgorithm;
    use super::*;

    const TIMEOUT: Duration = Duration::from_millis(100);

    struct StubChannel {
        responses: Vec<ApduResponse>,
        requests: Vec<Vec<u8>>,
    }

    impl Channel for StubChannel {
        fn apdu_exchange(
            &mut self,
            request: &ApduRequest,
            _timeout: Duration,
        ) -> Result<ApduResponse, Error> {
            self.requests.push(request.raw_extended().unwrap());
            Ok(self.responses.remove(0))
        }
    }

    #[test]
    fn select_sends_the_openpgp_aid() {
        let mut channel = StubChannel {
            responses: vec![ApduResponse::try_from(&vec![0x90, 0x00]).unwrap()],
            requests: vec![],
        };
        channel.openpgp_select(TIMEOUT).unwrap();
        let raw = &channel.requests[0];
        assert_eq!(&raw[..4], &[0x00, 0xA4, 0x04, 0x00]);
        assert!(raw.windows(OPENPGP_AID.len()).any(|w| w == OPENPGP_AID));
    }

    #[test]
    fn capabilities_issues_get_data_for_do_6e() {
        let mut payload = vec![
            0x6E, 0x0A, 0x4F, 0x08, 0xD2, 0x76, 0x00, 0x01, 0x24, 0x01, 0x02, 0x00,
        ];
        payload.extend([0x90, 0x00]);
        let mut channel = StubChannel {
            responses: vec![ApduResponse::try_from(&payload).unwrap()],
            requests: vec![],
        };
        let capabilities = channel.openpgp_capabilities(TIMEOUT).unwrap();
        assert_eq!(
            capabilities.aid(),
            &[0xD2, 0x76, 0x00, 0x01, 0x24, 0x01, 0x02, 0x00]
        );
        assert_eq!(&channel.requests[0][..4], &[0x00, 0xCA, 0x00, 0x6E]);
    }

    #[test]
    fn key_import_wraps_the_template_in_put_data_odd() {
        let mut channel = StubChannel {
            responses: vec![ApduResponse::try_from(&vec![0x90, 0x00]).unwrap()],
            requests: vec![],
        };
        let key = EcPrivateKey {
            scalar: vec![0x77; 32],
            public_point: None,
        };
        let format = EcKeyFormat {
            algorithm: EcAlgorithm::Ecdh,
            curve_oid: vec![0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
            with_public_key: false,
        };
        channel
            .openpgp_import_ec_key(KeyType::Encrypt, &key, &format, TIMEOUT)
            .unwrap();
        let raw = &channel.requests[0];
        assert_eq!(&raw[..4], &[0x00, 0xDB, 0x3F, 0xFF]);
        // The payload is the 0x4D extended header list.
        assert_eq!(raw[7], 0x4D);
    }

    #[test]
    fn card_errors_are_forwarded() {
        let mut channel = StubChannel {
            responses: vec![ApduResponse::try_from(&vec![0x69, 0x82]).unwrap()],
            requests: vec![],
        };
        let err = channel.openpgp_select(TIMEOUT).unwrap_err();
        assert_eq!(
            err,
            Error::Card(ApduResponseStatus::SecurityStatusNotSatisfied)
        );
    }

    #[test]
    fn invalid_key_material_is_a_platform_error() {
        let mut channel = StubChannel {
            responses: vec![],
            requests: vec![],
        };
        let key = EcPrivateKey {
            scalar: vec![0x77; 64], // too wide for P-256
            public_point: None,
        };
        let format = EcKeyFormat {
            algorithm: EcAlgorithm::Ecdh,
            curve_oid: vec![0x2A, 0x86, 0x48, 0xCE, 0x3D, 0x03, 0x01, 0x07],
            with_public_key: false,
        };
        let err = channel
            .openpgp_import_ec_key(KeyType::Sign, &key, &format, TIMEOUT)
            .unwrap_err();
        assert_eq!(err, Error::Platform(PlatformError::InvalidKeyMaterial));
    }
}
