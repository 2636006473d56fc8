pub use crate::proto::CtapError;

use crate::proto::apdu::ApduResponseStatus;

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum PlatformError {
    PinTooShort,
    PinTooLong,
    PinNotSupported,
    InvalidKeyMaterial,
    InvalidDeviceResponse,
}

impl std::error::Error for PlatformError {}

impl std::fmt::Display for PlatformError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum TransportError {
    ConnectionFailed,
    ConnectionLost,
    /// Frame too short, or its control byte matches no known block type.
    /// Fatal to the exchange; never retried.
    InvalidFraming,
    /// Structurally valid frame with a bad epilogue. Recoverable by
    /// retransmission up to the retry bound.
    InvalidChecksum,
    RetriesExceeded,
    ResynchronizationFailed,
    ExchangeAborted,
    Timeout,
}

impl std::error::Error for TransportError {}

impl std::fmt::Display for TransportError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum Error {
    Transport(TransportError),
    Ctap(CtapError),
    /// Status word reported by the card for a successfully transported APDU.
    Card(ApduResponseStatus),
    Platform(PlatformError),
}

impl std::error::Error for Error {}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        Error::Transport(error)
    }
}

impl From<CtapError> for Error {
    fn from(error: CtapError) -> Self {
        Error::Ctap(error)
    }
}

impl From<ApduResponseStatus> for Error {
    fn from(status: ApduResponseStatus) -> Self {
        Error::Card(status)
    }
}

impl From<PlatformError> for Error {
    fn from(error: PlatformError) -> Self {
        Error::Platform(error)
    }
}
