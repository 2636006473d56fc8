//! T=1 exchange engine.
//!
//! One [`T1Protocol`] instance owns the session state of one channel: the
//! two sequence bits, the negotiated information field size, and the retry
//! budget of the exchange in flight. Exchanges are strictly half-duplex;
//! callers serialize access by holding `&mut self`.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::proto::apdu::{ApduRequest, ApduResponse};
use crate::transport::channel::{Channel, FrameTransceiver};
use crate::transport::error::{Error, TransportError};

use super::block::{
    Block, BlockCodec, SupervisoryBlock, SupervisoryOperation, MAX_INFORMATION_FIELD,
};
use super::block::ReceiveReadyError;
use super::checksum::ChecksumAlgorithm;

/// Recoverable errors tolerated per exchange before giving up.
pub const RETRY_LIMIT: u8 = 3;

const DEFAULT_NODE_ADDRESS: u8 = 0x00;
const SEQUENCE_INITIAL: u8 = 0;

pub struct T1Protocol<T: FrameTransceiver> {
    transceiver: T,
    codec: BlockCodec,
    send_sequence: u8,
    recv_sequence: u8,
    information_field_size: usize,
    retries: u8,
}

impl<T: FrameTransceiver> T1Protocol<T> {
    pub fn new(transceiver: T, checksum: ChecksumAlgorithm) -> Self {
        Self::with_node_address(transceiver, checksum, DEFAULT_NODE_ADDRESS)
    }

    pub fn with_node_address(transceiver: T, checksum: ChecksumAlgorithm, node_address: u8) -> Self {
        Self {
            transceiver,
            codec: BlockCodec::new(checksum, node_address),
            send_sequence: SEQUENCE_INITIAL,
            recv_sequence: SEQUENCE_INITIAL,
            information_field_size: MAX_INFORMATION_FIELD,
            retries: 0,
        }
    }

    pub fn information_field_size(&self) -> usize {
        self.information_field_size
    }

    /// Override the negotiated information field size, e.g. from reader
    /// descriptors known out of band. Values are clamped to the block maximum.
    pub fn set_information_field_size(&mut self, size: usize) {
        self.information_field_size = size.clamp(1, MAX_INFORMATION_FIELD);
    }

    /// Send one APDU and return the reassembled response.
    ///
    /// The request is fragmented into information blocks of at most the
    /// negotiated field size; the response chain is reassembled into a single
    /// buffer. On failure no partial response is returned, and the sequence
    /// bits are exactly as last acknowledged, so a fresh exchange may be
    /// attempted without resynchronizing.
    pub fn exchange(&mut self, apdu: &[u8], timeout: Duration) -> Result<Vec<u8>, Error> {
        self.retries = 0;
        let field = self.information_field_size;
        let chunk_count = usize::max(1, (apdu.len() + field - 1) / field);
        debug!(
            { len = apdu.len(), blocks = chunk_count },
            "Starting TPDU exchange"
        );

        let mut final_frame = Vec::new();
        for index in 0..chunk_count {
            let start = index * field;
            let end = usize::min(start + field, apdu.len());
            let chaining = index + 1 < chunk_count;
            let frame = self
                .codec
                .information(self.send_sequence, chaining, &apdu[start..end]);
            self.transceiver.write_frame(&frame)?;
            if chaining {
                self.await_acknowledgement(&frame, timeout)?;
            } else {
                final_frame = frame;
            }
        }

        self.receive_response(final_frame, timeout)
    }

    /// Reset both endpoints' sequence counters after an unrecoverable desync.
    ///
    /// Any exchange that was in flight is abandoned; the caller must repeat
    /// the whole logical operation. If this fails the channel should be
    /// considered unusable until re-opened.
    pub fn resynchronize(&mut self, timeout: Duration) -> Result<(), Error> {
        let request =
            self.codec
                .supervisory(SupervisoryOperation::Resynchronization, false, None);
        let mut attempts: u8 = 0;
        loop {
            self.transceiver.write_frame(&request)?;
            match self.read_block(timeout) {
                Ok(Block::Supervisory(SupervisoryBlock {
                    operation: SupervisoryOperation::Resynchronization,
                    response: true,
                    ..
                })) => {
                    self.send_sequence = SEQUENCE_INITIAL;
                    self.recv_sequence = SEQUENCE_INITIAL;
                    self.retries = 0;
                    debug!("Resynchronization complete");
                    return Ok(());
                }
                Ok(block) => {
                    warn!(?block, "Unexpected block in response to resynchronization");
                    return Err(Error::Transport(TransportError::ResynchronizationFailed));
                }
                Err(Error::Transport(TransportError::InvalidChecksum))
                    if attempts < RETRY_LIMIT =>
                {
                    attempts += 1;
                }
                Err(err) => {
                    warn!(?err, "Resynchronization failed");
                    return Err(Error::Transport(TransportError::ResynchronizationFailed));
                }
            }
        }
    }

    /// Wait for the acknowledgement of a chained information block.
    ///
    /// The send sequence bit is toggled only once the acknowledgement names
    /// the next sequence bit; it is never toggled speculatively.
    fn await_acknowledgement(&mut self, frame: &[u8], timeout: Duration) -> Result<(), Error> {
        let mut wait = timeout;
        loop {
            match self.read_block(wait) {
                Err(Error::Transport(TransportError::InvalidChecksum)) => {
                    wait = timeout;
                    self.bump_retries()?;
                    self.transceiver.write_frame(frame)?;
                }
                Err(err) => return Err(err),
                Ok(Block::ReceiveReady(ack)) => {
                    wait = timeout;
                    if ack.error == ReceiveReadyError::None
                        && ack.sequence == self.send_sequence ^ 1
                    {
                        self.send_sequence ^= 1;
                        return Ok(());
                    }
                    debug!(?ack, "Fragment not acknowledged; retransmitting");
                    self.bump_retries()?;
                    self.transceiver.write_frame(frame)?;
                }
                Ok(Block::Supervisory(request)) => {
                    wait = self.answer_supervisory(&request, timeout)?;
                }
                Ok(Block::Information(_)) => {
                    warn!("Information block received while a chain acknowledgement was due");
                    return Err(Error::Transport(TransportError::InvalidFraming));
                }
            }
        }
    }

    /// Collect the response chain after the final request fragment.
    ///
    /// `last_frame` is always the most recent block we sent: initially the
    /// final information block, later the latest acknowledgement. It is what
    /// gets retransmitted on recoverable errors and duplicate deliveries.
    fn receive_response(
        &mut self,
        mut last_frame: Vec<u8>,
        timeout: Duration,
    ) -> Result<Vec<u8>, Error> {
        let mut response: Vec<u8> = Vec::new();
        let mut wait = timeout;
        let mut request_acknowledged = false;
        loop {
            match self.read_block(wait) {
                Err(Error::Transport(TransportError::InvalidChecksum)) => {
                    wait = timeout;
                    self.bump_retries()?;
                    self.transceiver.write_frame(&last_frame)?;
                }
                Err(err) => return Err(err),
                Ok(Block::ReceiveReady(reply)) => {
                    // The card missed our final fragment or rejected it.
                    wait = timeout;
                    debug!(?reply, "Receive-ready while awaiting response; retransmitting");
                    self.bump_retries()?;
                    self.transceiver.write_frame(&last_frame)?;
                }
                Ok(Block::Supervisory(request)) => {
                    wait = self.answer_supervisory(&request, timeout)?;
                }
                Ok(Block::Information(block)) => {
                    wait = timeout;
                    if !request_acknowledged {
                        // The first response block implicitly acknowledges
                        // our final fragment.
                        self.send_sequence ^= 1;
                        request_acknowledged = true;
                    }
                    if block.sequence != self.recv_sequence {
                        // Duplicate retransmission: the card missed our last
                        // acknowledgement. Repeat it, do not append again.
                        debug!(
                            { sequence = block.sequence },
                            "Duplicate information block; repeating last acknowledgement"
                        );
                        self.transceiver.write_frame(&last_frame)?;
                        continue;
                    }
                    response.extend_from_slice(&block.payload);
                    if block.chaining {
                        let ack = self.codec.receive_ready(self.recv_sequence ^ 1);
                        self.transceiver.write_frame(&ack)?;
                        self.recv_sequence ^= 1;
                        last_frame = ack;
                    } else {
                        self.recv_sequence ^= 1;
                        debug!({ len = response.len() }, "TPDU exchange complete");
                        return Ok(response);
                    }
                }
            }
        }
    }

    /// Answer a supervisory request from the card and return the timeout to
    /// use for the next read (extended by a waiting-time extension, base
    /// value otherwise).
    fn answer_supervisory(
        &mut self,
        request: &SupervisoryBlock,
        timeout: Duration,
    ) -> Result<Duration, Error> {
        if request.response {
            warn!(?request, "Unsolicited supervisory response");
            return Err(Error::Transport(TransportError::InvalidFraming));
        }
        match request.operation {
            SupervisoryOperation::WaitingTimeExtension => {
                let factor = u32::from(request.parameter.unwrap_or(1).max(1));
                let reply = self
                    .codec
                    .supervisory(request.operation, true, request.parameter);
                self.transceiver.write_frame(&reply)?;
                debug!({ factor }, "Waiting-time extension granted for next read");
                Ok(timeout.saturating_mul(factor))
            }
            SupervisoryOperation::InformationFieldSize => {
                let size = usize::from(request.parameter.unwrap_or(0));
                if size == 0 || size > MAX_INFORMATION_FIELD {
                    warn!({ size }, "Invalid information field size requested");
                    return Err(Error::Transport(TransportError::InvalidFraming));
                }
                let reply = self
                    .codec
                    .supervisory(request.operation, true, request.parameter);
                self.transceiver.write_frame(&reply)?;
                self.information_field_size = size;
                debug!({ size }, "Information field size renegotiated");
                Ok(timeout)
            }
            SupervisoryOperation::Abort => {
                let reply = self.codec.supervisory(request.operation, true, None);
                self.transceiver.write_frame(&reply)?;
                warn!("Card aborted the exchange");
                Err(Error::Transport(TransportError::ExchangeAborted))
            }
            SupervisoryOperation::Resynchronization => {
                warn!("Unexpected resynchronization request from card");
                Err(Error::Transport(TransportError::InvalidFraming))
            }
        }
    }

    fn read_block(&mut self, timeout: Duration) -> Result<Block, Error> {
        let frame = self.transceiver.read_frame(timeout)?;
        trace!(?frame, "Frame received");
        let block = self.codec.decode(&frame)?;
        trace!(?block);
        Ok(block)
    }

    fn bump_retries(&mut self) -> Result<(), Error> {
        if self.retries >= RETRY_LIMIT {
            warn!({ retries = self.retries }, "Retry budget exhausted; aborting exchange");
            return Err(Error::Transport(TransportError::RetriesExceeded));
        }
        self.retries += 1;
        Ok(())
    }
}

impl<T: FrameTransceiver> Channel for T1Protocol<T> {
    fn apdu_exchange(
        &mut self,
        request: &ApduRequest,
        timeout: Duration,
    ) -> Result<ApduResponse, Error> {
        trace!(?request);
        let raw = request
            .raw_extended()
            .or(Err(Error::Transport(TransportError::InvalidFraming)))?;
        let reply = self.exchange(&raw, timeout)?;
        let response = ApduResponse::try_from(&reply)
            .or(Err(Error::Transport(TransportError::InvalidFraming)))?;
        trace!(?response);
        Ok(response)
    }
}
