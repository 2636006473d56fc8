use serde_cbor::ser::to_vec;

use crate::proto::apdu::ApduRequest;
use crate::proto::ctap2::model::{Ctap2ClientPinRequest, Ctap2CommandCode};

/// CLA/INS pair carrying a CTAP2 CBOR command in an extended APDU.
const CTAP2_FRAMING_CLA: u8 = 0x80;
const CTAP2_FRAMING_INS: u8 = 0x10;

#[derive(Debug, Clone)]
pub struct CborRequest {
    pub command: Ctap2CommandCode,
    pub encoded_data: Vec<u8>,
}

impl CborRequest {
    pub fn new(command: Ctap2CommandCode) -> Self {
        Self {
            command,
            encoded_data: vec![],
        }
    }

    /// Command byte followed by the CBOR-encoded request map.
    pub fn ctap_data(&self) -> Vec<u8> {
        let mut data = vec![u8::from(self.command)];
        data.extend(&self.encoded_data);
        data
    }
}

impl From<&Ctap2ClientPinRequest> for CborRequest {
    fn from(request: &Ctap2ClientPinRequest) -> CborRequest {
        CborRequest {
            command: Ctap2CommandCode::AuthenticatorClientPin,
            encoded_data: to_vec(request).unwrap(),
        }
    }
}

impl From<&CborRequest> for ApduRequest {
    fn from(request: &CborRequest) -> ApduRequest {
        ApduRequest::new(
            CTAP2_FRAMING_CLA,
            CTAP2_FRAMING_INS,
            0x00,
            0x00,
            Some(&request.ctap_data()),
            Some(ApduRequest::extended_max_le()),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::ctap2::model::Ctap2PinUvAuthProtocol;

    #[test]
    fn ctap_data_prefixes_the_command_byte() {
        let request = CborRequest::new(Ctap2CommandCode::AuthenticatorGetInfo);
        assert_eq!(request.ctap_data(), vec![0x04]);
    }

    #[test]
    fn client_pin_request_encodes_as_integer_keyed_map() {
        let request =
            Ctap2ClientPinRequest::new_get_key_agreement(Ctap2PinUvAuthProtocol::One);
        let cbor: CborRequest = (&request).into();
        assert_eq!(cbor.command, Ctap2CommandCode::AuthenticatorClientPin);
        // {1: 1, 2: 2}: protocol one, getKeyAgreement.
        assert_eq!(cbor.encoded_data, vec![0xA2, 0x01, 0x01, 0x02, 0x02]);
    }

    #[test]
    fn apdu_framing_uses_extended_length() {
        let request = CborRequest::new(Ctap2CommandCode::AuthenticatorGetInfo);
        let apdu: ApduRequest = (&request).into();
        let raw = apdu.raw_extended().unwrap();
        assert_eq!(
            raw,
            vec![0x80, 0x10, 0x00, 0x00, 0x00, 0x00, 0x01, 0x04, 0x00, 0x00]
        );
    }
}
