use std::time::Duration;

use tracing::{trace, warn};

use crate::proto::apdu::{ApduRequest, ApduResponse, ApduResponseStatus};
use crate::proto::ctap2::cbor::{CborRequest, CborResponse};
use crate::transport::error::{Error, TransportError};

/// One raw frame in, one raw frame out.
///
/// Implemented by the physical backends (USB CCID bulk transfers, an NFC
/// tag channel); the TPDU engine is its only consumer and never interprets
/// the bytes it carries beyond the frame boundary.
pub trait FrameTransceiver {
    fn write_frame(&mut self, frame: &[u8]) -> Result<(), Error>;

    /// Block until a frame arrives or `timeout` elapses.
    fn read_frame(&mut self, timeout: Duration) -> Result<Vec<u8>, Error>;
}

/// A reliable APDU exchange, consumed by the protocol layers.
///
/// A channel carries exactly one exchange at a time; callers serialize
/// access by construction (`&mut self`). Errors are never swallowed and a
/// failed exchange never yields a partial response.
pub trait Channel {
    fn apdu_exchange(
        &mut self,
        request: &ApduRequest,
        timeout: Duration,
    ) -> Result<ApduResponse, Error>;

    /// Exchange a CBOR command, framed in an extended APDU.
    fn cbor_exchange(
        &mut self,
        request: &CborRequest,
        timeout: Duration,
    ) -> Result<CborResponse, Error> {
        trace!(?request);
        let apdu_request = ApduRequest::from(request);
        let apdu_response = self.apdu_exchange(&apdu_request, timeout)?;
        let status = apdu_response
            .status()
            .or(Err(Error::Transport(TransportError::InvalidFraming)))?;
        if status != ApduResponseStatus::NoError {
            warn!(?status, "CBOR command rejected at the APDU level");
            return Err(Error::Card(status));
        }
        let payload = apdu_response.data.unwrap_or_default();
        let cbor_response = CborResponse::try_from(&payload)
            .or(Err(Error::Transport(TransportError::InvalidFraming)))?;
        trace!(?cbor_response);
        Ok(cbor_response)
    }
}
