use std::io::{Error as IOError, ErrorKind as IOErrorKind};

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// ISO 7816-4 response APDU: optional data followed by SW1/SW2.
#[derive(Debug, PartialEq)]
pub struct ApduResponse {
    pub data: Option<Vec<u8>>,
    sw1: u8,
    sw2: u8,
}

#[derive(Debug, IntoPrimitive, TryFromPrimitive, Copy, Clone, PartialEq)]
#[repr(u16)]
pub enum ApduResponseStatus {
    NoError = 0x9000,
    MemoryFailure = 0x6581,
    WrongLength = 0x6700,
    SecurityStatusNotSatisfied = 0x6982,
    AuthenticationBlocked = 0x6983,
    ConditionsNotSatisfied = 0x6985,
    WrongData = 0x6A80,
    FileNotFound = 0x6A82,
    IncorrectParameters = 0x6B00,
    InstructionNotSupported = 0x6D00,
    ClassNotSupported = 0x6E00,
}

impl ApduResponse {
    pub fn new_success(data: &[u8]) -> Self {
        Self {
            data: Some(Vec::from(data)),
            sw1: 0x90,
            sw2: 0x00,
        }
    }

    /// The raw status word, for callers that interpret vendor codes
    /// (e.g. remaining-tries encodings) themselves.
    pub fn status_word(&self) -> u16 {
        u16::from_be_bytes([self.sw1, self.sw2])
    }

    pub fn status(&self) -> Result<ApduResponseStatus, IOError> {
        let code = self.status_word();
        code.try_into().or(Err(IOError::new(
            IOErrorKind::InvalidData,
            format!("Unknown APDU response code returned: {:x}", code),
        )))
    }
}

impl TryFrom<&Vec<u8>> for ApduResponse {
    type Error = IOError;
    fn try_from(packet: &Vec<u8>) -> Result<Self, Self::Error> {
        if packet.len() < 2 {
            return Err(IOError::new(
                IOErrorKind::InvalidData,
                "Apdu response packets must contain at least 2 bytes.",
            ));
        }

        let data = if packet.len() > 2 {
            Some(Vec::from(&packet[0..packet.len() - 2]))
        } else {
            None
        };
        let (sw1, sw2) = (packet[packet.len() - 2], packet[packet.len() - 1]);

        Ok(Self { data, sw1, sw2 })
    }
}
