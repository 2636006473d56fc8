use std::time::Duration;

use serde_cbor::from_slice;
use tracing::{debug, info, trace, warn};

use crate::proto::apdu::{ApduRequest, ApduResponseStatus};
use crate::proto::ctap2::cbor::CborRequest;
use crate::proto::ctap2::model::{
    Ctap2ClientPinRequest, Ctap2ClientPinResponse, Ctap2CommandCode, Ctap2GetInfoResponse,
};
use crate::proto::CtapError;
use crate::transport::error::{Error, PlatformError};
use crate::transport::Channel;

/// Application identifier of the FIDO2/U2F applet.
pub const FIDO_AID: [u8; 8] = [0xA0, 0x00, 0x00, 0x06, 0x47, 0x2F, 0x00, 0x01];

pub trait Ctap2 {
    /// Select the FIDO applet; returns the version string it reports.
    fn ctap2_select(&mut self, timeout: Duration) -> Result<String, Error>;
    fn ctap2_get_info(&mut self, timeout: Duration) -> Result<Ctap2GetInfoResponse, Error>;
    fn ctap2_client_pin(
        &mut self,
        request: &Ctap2ClientPinRequest,
        timeout: Duration,
    ) -> Result<Ctap2ClientPinResponse, Error>;
}

impl<C> Ctap2 for C
where
    C: Channel,
{
    fn ctap2_select(&mut self, timeout: Duration) -> Result<String, Error> {
        let request = ApduRequest::new(0x00, 0xA4, 0x04, 0x00, Some(&FIDO_AID), Some(0x100));
        let response = self.apdu_exchange(&request, timeout)?;
        let status = response
            .status()
            .or(Err(Error::Platform(PlatformError::InvalidDeviceResponse)))?;
        if status != ApduResponseStatus::NoError {
            warn!(?status, "FIDO applet selection failed");
            return Err(Error::Card(status));
        }
        let version = String::from_utf8(response.data.unwrap_or_default())
            .or(Err(Error::Platform(PlatformError::InvalidDeviceResponse)))?;
        debug!({ %version }, "FIDO applet selected");
        Ok(version)
    }

    fn ctap2_get_info(&mut self, timeout: Duration) -> Result<Ctap2GetInfoResponse, Error> {
        let cbor_request = CborRequest::new(Ctap2CommandCode::AuthenticatorGetInfo);
        let cbor_response = self.cbor_exchange(&cbor_request, timeout)?;
        if cbor_response.status_code != CtapError::Ok {
            return Err(Error::Ctap(cbor_response.status_code));
        }
        let Some(data) = cbor_response.data else {
            warn!("GetInfo response carried no payload");
            return Err(Error::Platform(PlatformError::InvalidDeviceResponse));
        };
        let response: Ctap2GetInfoResponse = from_slice(&data)
            .or(Err(Error::Platform(PlatformError::InvalidDeviceResponse)))?;
        info!(?response, "CTAP2 GetInfo response");
        Ok(response)
    }

    fn ctap2_client_pin(
        &mut self,
        request: &Ctap2ClientPinRequest,
        timeout: Duration,
    ) -> Result<Ctap2ClientPinResponse, Error> {
        trace!(?request);
        let cbor_request: CborRequest = request.into();
        let cbor_response = self.cbor_exchange(&cbor_request, timeout)?;
        if cbor_response.status_code != CtapError::Ok {
            warn!({ status = ?cbor_response.status_code }, "ClientPin request failed");
            return Err(Error::Ctap(cbor_response.status_code));
        }
        let response: Ctap2ClientPinResponse = match cbor_response.data {
            // Some subcommands (setPIN, changePIN) respond with an empty map
            // or no payload at all.
            None => Ctap2ClientPinResponse::default(),
            Some(data) => from_slice(&data)
                .or(Err(Error::Platform(PlatformError::InvalidDeviceResponse)))?,
        };
        debug!("CTAP2 ClientPin response");
        trace!(?response);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::apdu::ApduResponse;
    use crate::proto::ctap2::model::Ctap2PinUvAuthProtocol;

    const TIMEOUT: Duration = Duration::from_millis(100);

    /// Channel stub answering from a fixed queue of APDU responses.
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
    fn select_returns_the_version_string() {
        let mut channel = StubChannel {
            responses: vec![ApduResponse::new_success(b"FIDO_2_0")],
            requests: vec![],
        };
        let version = channel.ctap2_select(TIMEOUT).unwrap();
        assert_eq!(version, "FIDO_2_0");
        // SELECT by AID.
        assert_eq!(
            channel.requests[0][..5],
            [0x00, 0xA4, 0x04, 0x00, 0x00]
        );
    }

    #[test]
    fn select_surfaces_card_errors() {
        let mut channel = StubChannel {
            responses: vec![ApduResponse::try_from(&vec![0x6A, 0x82]).unwrap()],
            requests: vec![],
        };
        let err = channel.ctap2_select(TIMEOUT).unwrap_err();
        assert_eq!(err, Error::Card(ApduResponseStatus::FileNotFound));
    }

    #[test]
    fn get_info_decodes_the_cbor_payload() {
        // Status 0x00, then {1: ["FIDO_2_0"], 3: aaguid}.
        let mut payload = vec![0x00, 0xA2, 0x01, 0x81, 0x68];
        payload.extend(b"FIDO_2_0");
        payload.extend([0x03, 0x50]);
        payload.extend([0xAB; 16]);
        payload.extend([0x90, 0x00]);
        let mut channel = StubChannel {
            responses: vec![ApduResponse::try_from(&payload).unwrap()],
            requests: vec![],
        };
        let info = channel.ctap2_get_info(TIMEOUT).unwrap();
        assert_eq!(info.versions, vec!["FIDO_2_0"]);
    }

    #[test]
    fn ctap_error_status_is_surfaced() {
        let mut channel = StubChannel {
            responses: vec![ApduResponse::try_from(&vec![0x31, 0x90, 0x00]).unwrap()],
            requests: vec![],
        };
        let request = Ctap2ClientPinRequest::new_get_pin_retries(Ctap2PinUvAuthProtocol::One);
        let err = channel.ctap2_client_pin(&request, TIMEOUT).unwrap_err();
        assert_eq!(err, Error::Ctap(CtapError::PinInvalid));
    }

    #[test]
    fn empty_client_pin_response_is_accepted() {
        let mut channel = StubChannel {
            responses: vec![ApduResponse::try_from(&vec![0x00, 0x90, 0x00]).unwrap()],
            requests: vec![],
        };
        let request = Ctap2ClientPinRequest::new_get_pin_retries(Ctap2PinUvAuthProtocol::One);
        let response = channel.ctap2_client_pin(&request, TIMEOUT).unwrap();
        assert!(response.retries.is_none());
        assert!(response.pin_token.is_none());
    }
}
