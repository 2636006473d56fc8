use std::io::{Error as IOError, ErrorKind as IOErrorKind};

use byteorder::{BigEndian, WriteBytesExt};

const APDU_SHORT_MAX_DATA: usize = 0x100;
const APDU_SHORT_MAX_LE: usize = 0x100;

const APDU_EXTENDED_MAX_DATA: usize = 0xFF_FF;
const APDU_EXTENDED_MAX_LE: usize = 0x1_00_00;

/// ISO 7816-4 command APDU.
#[derive(Debug)]
pub struct ApduRequest {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    data: Option<Vec<u8>>,
    response_max_length: Option<usize>,
}

impl ApduRequest {
    pub fn new(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        data: Option<&[u8]>,
        response_max_length: Option<usize>,
    ) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            data: data.map(Vec::from),
            response_max_length,
        }
    }

    /// Largest Le value expressible in the extended encoding.
    pub fn extended_max_le() -> usize {
        APDU_EXTENDED_MAX_LE
    }

    /// Serialize with single-byte length fields.
    pub fn raw_short(&self) -> Result<Vec<u8>, IOError> {
        let mut raw: Vec<u8> = vec![self.cla, self.ins, self.p1, self.p2];

        if let Some(data) = &self.data {
            if data.len() > APDU_SHORT_MAX_DATA {
                return Err(IOError::new(
                    IOErrorKind::InvalidData,
                    format!(
                        "Unable to serialize {} bytes of data in APDU short form.",
                        data.len()
                    ),
                ));
            } else if data.is_empty() {
                return Err(IOError::new(
                    IOErrorKind::InvalidData,
                    "Cannot serialize an empty payload.",
                ));
            }

            raw.push(if data.len() != APDU_SHORT_MAX_DATA {
                data.len() as u8
            } else {
                0
            });
            raw.extend(data);
        }

        if let Some(le) = self.response_max_length {
            if le > APDU_SHORT_MAX_LE {
                return Err(IOError::new(
                    IOErrorKind::InvalidData,
                    format!("Unable to serialize L_e value ({}) in APDU short form.", le),
                ));
            }
            raw.push(if le == APDU_SHORT_MAX_LE { 0 } else { le as u8 });
        }
        Ok(raw)
    }

    /// Serialize with extended (two-byte) length fields.
    ///
    /// The 0x00 extended-length marker precedes Lc when data is present, or
    /// Le when only a response is expected; Le of `extended_max_le()` encodes
    /// as 0x0000.
    pub fn raw_extended(&self) -> Result<Vec<u8>, IOError> {
        let mut raw: Vec<u8> = vec![self.cla, self.ins, self.p1, self.p2];
        let mut marker_written = false;

        if let Some(data) = &self.data {
            if data.len() > APDU_EXTENDED_MAX_DATA {
                return Err(IOError::new(
                    IOErrorKind::InvalidData,
                    format!(
                        "Unable to serialize {} bytes of data in APDU extended form.",
                        data.len()
                    ),
                ));
            } else if data.is_empty() {
                return Err(IOError::new(
                    IOErrorKind::InvalidData,
                    "Cannot serialize an empty payload.",
                ));
            }
            raw.push(0x00);
            marker_written = true;
            raw.write_u16::<BigEndian>(data.len() as u16)?;
            raw.extend(data);
        }

        if let Some(le) = self.response_max_length {
            if le > APDU_EXTENDED_MAX_LE {
                return Err(IOError::new(
                    IOErrorKind::InvalidData,
                    format!(
                        "Unable to serialize L_e value ({}) in APDU extended form.",
                        le
                    ),
                ));
            }
            if !marker_written {
                raw.push(0x00);
            }
            raw.write_u16::<BigEndian>(if le == APDU_EXTENDED_MAX_LE {
                0
            } else {
                le as u16
            })?;
        }
        Ok(raw)
    }
}
