//! TPDU block codec.
//!
//! Every frame on the wire is `[NAD][PCB][LEN][payload][epilogue]`. The PCB
//! selects one of three block kinds, tested against masked bit patterns in a
//! fixed priority order: information, supervisory, receive-ready.

use num_enum::{IntoPrimitive, TryFromPrimitive};
use tracing::warn;

use crate::transport::error::TransportError;

use super::checksum::ChecksumAlgorithm;

/// NAD, PCB and LEN precede the payload in every frame.
pub(crate) const PROLOGUE_SIZE: usize = 3;

const OFFSET_PCB: usize = 1;
const OFFSET_LEN: usize = 2;

/// Largest information field a single block may carry; 0xFF is reserved.
pub const MAX_INFORMATION_FIELD: usize = 0xFE;

const MASK_INFORMATION: u8 = 0b1000_0000;
const VALUE_INFORMATION: u8 = 0b0000_0000;
const MASK_SUPERVISORY: u8 = 0b1100_0000;
const VALUE_SUPERVISORY: u8 = 0b1100_0000;
const MASK_RECEIVE_READY: u8 = 0b1100_0000;
const VALUE_RECEIVE_READY: u8 = 0b1000_0000;

const INFORMATION_SEQUENCE: u8 = 0b0100_0000;
const INFORMATION_CHAINING: u8 = 0b0010_0000;
const RECEIVE_READY_SEQUENCE: u8 = 0b0001_0000;
const RECEIVE_READY_ERROR_MASK: u8 = 0b0000_1111;
const SUPERVISORY_RESPONSE: u8 = 0b0010_0000;
const SUPERVISORY_OPERATION_MASK: u8 = 0b0001_1111;

#[derive(Debug, Clone, PartialEq)]
pub struct InformationBlock {
    pub sequence: u8,
    pub chaining: bool,
    pub payload: Vec<u8>,
}

#[derive(Debug, IntoPrimitive, TryFromPrimitive, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum ReceiveReadyError {
    None = 0x00,
    Checksum = 0x01,
    Other = 0x02,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReceiveReadyBlock {
    /// Sequence bit the peer is expected to use for its next block.
    pub sequence: u8,
    pub error: ReceiveReadyError,
}

#[derive(Debug, IntoPrimitive, TryFromPrimitive, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum SupervisoryOperation {
    Resynchronization = 0x00,
    InformationFieldSize = 0x01,
    Abort = 0x02,
    WaitingTimeExtension = 0x03,
}

impl SupervisoryOperation {
    /// IFS and WTX carry a one-byte parameter; resync and abort carry none.
    fn parameter_length(&self) -> usize {
        match self {
            SupervisoryOperation::Resynchronization | SupervisoryOperation::Abort => 0,
            SupervisoryOperation::InformationFieldSize
            | SupervisoryOperation::WaitingTimeExtension => 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SupervisoryBlock {
    pub operation: SupervisoryOperation,
    pub response: bool,
    pub parameter: Option<u8>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Block {
    Information(InformationBlock),
    Supervisory(SupervisoryBlock),
    ReceiveReady(ReceiveReadyBlock),
}

/// Frame encoder/decoder for one session.
///
/// Holds the session's checksum algorithm and node address; both are fixed
/// when the channel is opened.
#[derive(Debug, Clone)]
pub struct BlockCodec {
    checksum: ChecksumAlgorithm,
    node_address: u8,
}

impl BlockCodec {
    pub fn new(checksum: ChecksumAlgorithm, node_address: u8) -> Self {
        Self {
            checksum,
            node_address,
        }
    }

    /// Parse a raw frame into a block.
    ///
    /// The checksum is validated before the PCB is interpreted, so a corrupted
    /// frame is reported as [`TransportError::InvalidChecksum`] and never
    /// misclassified. Structural problems (short frame, length mismatch,
    /// unknown PCB contents) are [`TransportError::InvalidFraming`].
    pub fn decode(&self, frame: &[u8]) -> Result<Block, TransportError> {
        if frame.len() < PROLOGUE_SIZE + self.checksum.length() {
            warn!({ len = frame.len() }, "Frame shorter than prologue and epilogue");
            return Err(TransportError::InvalidFraming);
        }
        let payload_length = frame[OFFSET_LEN] as usize;
        if frame.len() != PROLOGUE_SIZE + payload_length + self.checksum.length() {
            warn!(
                { len = frame.len(), declared = payload_length },
                "Frame length does not match its length byte"
            );
            return Err(TransportError::InvalidFraming);
        }
        if !self.checksum.verify(frame) {
            return Err(TransportError::InvalidChecksum);
        }

        let pcb = frame[OFFSET_PCB];
        let payload = &frame[PROLOGUE_SIZE..PROLOGUE_SIZE + payload_length];
        if pcb & MASK_INFORMATION == VALUE_INFORMATION {
            Ok(Block::Information(InformationBlock {
                sequence: (pcb & INFORMATION_SEQUENCE != 0) as u8,
                chaining: pcb & INFORMATION_CHAINING != 0,
                payload: payload.to_vec(),
            }))
        } else if pcb & MASK_SUPERVISORY == VALUE_SUPERVISORY {
            let Ok(operation) = SupervisoryOperation::try_from(pcb & SUPERVISORY_OPERATION_MASK)
            else {
                warn!({ pcb }, "Unknown supervisory operation");
                return Err(TransportError::InvalidFraming);
            };
            if payload.len() != operation.parameter_length() {
                warn!(
                    { ?operation, len = payload.len() },
                    "Supervisory block with unexpected parameter length"
                );
                return Err(TransportError::InvalidFraming);
            }
            Ok(Block::Supervisory(SupervisoryBlock {
                operation,
                response: pcb & SUPERVISORY_RESPONSE != 0,
                parameter: payload.first().copied(),
            }))
        } else if pcb & MASK_RECEIVE_READY == VALUE_RECEIVE_READY {
            let Ok(error) = ReceiveReadyError::try_from(pcb & RECEIVE_READY_ERROR_MASK) else {
                warn!({ pcb }, "Unknown receive-ready error code");
                return Err(TransportError::InvalidFraming);
            };
            if !payload.is_empty() {
                warn!({ len = payload.len() }, "Receive-ready block with payload");
                return Err(TransportError::InvalidFraming);
            }
            Ok(Block::ReceiveReady(ReceiveReadyBlock {
                sequence: (pcb & RECEIVE_READY_SEQUENCE != 0) as u8,
                error,
            }))
        } else {
            warn!({ pcb }, "Unknown block type");
            Err(TransportError::InvalidFraming)
        }
    }

    /// Encode one information block carrying a payload fragment.
    pub fn information(&self, sequence: u8, chaining: bool, payload: &[u8]) -> Vec<u8> {
        assert!(
            payload.len() <= MAX_INFORMATION_FIELD,
            "information field exceeds the block maximum"
        );
        let mut pcb = VALUE_INFORMATION;
        if sequence & 1 != 0 {
            pcb |= INFORMATION_SEQUENCE;
        }
        if chaining {
            pcb |= INFORMATION_CHAINING;
        }
        self.assemble(pcb, payload)
    }

    /// Encode a receive-ready acknowledgement.
    ///
    /// `expected_sequence` names the sequence bit the peer must use for its
    /// next information block; acknowledging block N is done by passing
    /// `N.sequence ^ 1`.
    pub fn receive_ready(&self, expected_sequence: u8) -> Vec<u8> {
        let mut pcb = VALUE_RECEIVE_READY;
        if expected_sequence & 1 != 0 {
            pcb |= RECEIVE_READY_SEQUENCE;
        }
        self.assemble(pcb, &[])
    }

    /// Encode a supervisory request or response.
    pub fn supervisory(
        &self,
        operation: SupervisoryOperation,
        response: bool,
        parameter: Option<u8>,
    ) -> Vec<u8> {
        let mut pcb = VALUE_SUPERVISORY | u8::from(operation);
        if response {
            pcb |= SUPERVISORY_RESPONSE;
        }
        match parameter {
            Some(value) => self.assemble(pcb, &[value]),
            None => self.assemble(pcb, &[]),
        }
    }

    fn assemble(&self, pcb: u8, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(PROLOGUE_SIZE + payload.len() + self.checksum.length());
        frame.push(self.node_address);
        frame.push(pcb);
        frame.push(payload.len() as u8);
        frame.extend_from_slice(payload);
        let epilogue = self.checksum.compute(&frame);
        frame.extend_from_slice(&epilogue);
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codec() -> BlockCodec {
        BlockCodec::new(ChecksumAlgorithm::Lrc, 0x00)
    }

    #[test]
    fn information_block_round_trip() {
        for sequence in [0, 1] {
            for chaining in [false, true] {
                let frame = codec().information(sequence, chaining, &[0x0A, 0x0B]);
                let block = codec().decode(&frame).unwrap();
                assert_eq!(
                    block,
                    Block::Information(InformationBlock {
                        sequence,
                        chaining,
                        payload: vec![0x0A, 0x0B],
                    })
                );
            }
        }
    }

    #[test]
    fn information_block_wire_layout() {
        let frame = codec().information(1, true, &[0xAB]);
        // NAD, PCB (sequence | chaining), LEN, payload, LRC.
        assert_eq!(frame, vec![0x00, 0x60, 0x01, 0xAB, 0x60 ^ 0x01 ^ 0xAB]);
    }

    #[test]
    fn receive_ready_round_trip() {
        for expected in [0, 1] {
            let frame = codec().receive_ready(expected);
            let block = codec().decode(&frame).unwrap();
            assert_eq!(
                block,
                Block::ReceiveReady(ReceiveReadyBlock {
                    sequence: expected,
                    error: ReceiveReadyError::None,
                })
            );
        }
    }

    #[test]
    fn receive_ready_error_codes_decode() {
        // PCB 1000_0001 = checksum error reported by the peer.
        let mut frame = vec![0x00, 0x81, 0x00];
        frame.push(0x81);
        assert_eq!(
            codec().decode(&frame).unwrap(),
            Block::ReceiveReady(ReceiveReadyBlock {
                sequence: 0,
                error: ReceiveReadyError::Checksum,
            })
        );
    }

    #[test]
    fn supervisory_round_trip() {
        let cases = [
            (SupervisoryOperation::Resynchronization, false, None),
            (SupervisoryOperation::Resynchronization, true, None),
            (SupervisoryOperation::InformationFieldSize, false, Some(0x20)),
            (SupervisoryOperation::WaitingTimeExtension, false, Some(0x03)),
            (SupervisoryOperation::Abort, false, None),
        ];
        for (operation, response, parameter) in cases {
            let frame = codec().supervisory(operation, response, parameter);
            let block = codec().decode(&frame).unwrap();
            assert_eq!(
                block,
                Block::Supervisory(SupervisoryBlock {
                    operation,
                    response,
                    parameter,
                })
            );
        }
    }

    #[test]
    fn corrupting_any_byte_is_a_checksum_error() {
        let frame = codec().information(0, false, &[0x01, 0x02, 0x03]);
        for index in 0..frame.len() {
            let mut corrupted = frame.clone();
            corrupted[index] ^= 0x04;
            // Flipping a bit in LEN changes the expected frame size instead.
            if index == 2 {
                continue;
            }
            assert_eq!(
                codec().decode(&corrupted),
                Err(TransportError::InvalidChecksum),
                "byte {}",
                index
            );
        }
    }

    #[test]
    fn short_frame_is_a_framing_error() {
        assert_eq!(
            codec().decode(&[0x00, 0x00]),
            Err(TransportError::InvalidFraming)
        );
        let crc_codec = BlockCodec::new(ChecksumAlgorithm::Crc, 0x00);
        assert_eq!(
            crc_codec.decode(&[0x00, 0x00, 0x00, 0xFF]),
            Err(TransportError::InvalidFraming)
        );
    }

    #[test]
    fn length_mismatch_is_a_framing_error() {
        let mut frame = codec().information(0, false, &[0x01]);
        frame[2] = 0x05;
        assert_eq!(codec().decode(&frame), Err(TransportError::InvalidFraming));
    }

    #[test]
    fn unknown_receive_ready_error_code_is_a_framing_error() {
        // PCB 1000_0111: error code 7 is not defined.
        let frame = vec![0x00, 0x87, 0x00, 0x87];
        assert_eq!(codec().decode(&frame), Err(TransportError::InvalidFraming));
    }

    #[test]
    fn unknown_supervisory_operation_is_a_framing_error() {
        // PCB 1100_1111: operation 15 is not defined.
        let frame = vec![0x00, 0xCF, 0x00, 0xCF];
        assert_eq!(codec().decode(&frame), Err(TransportError::InvalidFraming));
    }

    #[test]
    fn supervisory_parameter_length_is_enforced() {
        // Resynchronization request with a stray parameter byte.
        let frame = vec![0x00, 0xC0, 0x01, 0xAA, 0xC0 ^ 0x01 ^ 0xAA];
        assert_eq!(codec().decode(&frame), Err(TransportError::InvalidFraming));
    }

    #[test]
    fn classification_priority_is_stable_under_crc() {
        let crc_codec = BlockCodec::new(ChecksumAlgorithm::Crc, 0x12);
        let frame = crc_codec.information(1, false, &[0xDE, 0xAD]);
        assert_eq!(frame[0], 0x12);
        let block = crc_codec.decode(&frame).unwrap();
        assert!(matches!(block, Block::Information(_)));
    }

    #[test]
    fn empty_information_block_is_valid() {
        let frame = codec().information(0, false, &[]);
        assert_eq!(frame.len(), 4);
        let block = codec().decode(&frame).unwrap();
        assert_eq!(
            block,
            Block::Information(InformationBlock {
                sequence: 0,
                chaining: false,
                payload: vec![],
            })
        );
    }
}
