use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::proto::apdu::ApduResponseStatus;

/// Status byte leading every CTAP2 response payload.
#[derive(Debug, IntoPrimitive, TryFromPrimitive, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum CtapError {
    Ok = 0x00,
    InvalidCommand = 0x01,
    InvalidParameter = 0x02,
    InvalidLength = 0x03,
    InvalidSeq = 0x04,
    Timeout = 0x05,
    ChannelBusy = 0x06,
    LockRequired = 0x0A,
    InvalidChannel = 0x0B,
    InvalidCborType = 0x11,
    InvalidCbor = 0x12,
    MissingParameter = 0x14,
    LimitExceeded = 0x15,
    UnsupportedExtension = 0x16,
    CredentialExcluded = 0x19,
    Processing = 0x21,
    InvalidCredential = 0x22,
    UserActionPending = 0x23,
    OperationPending = 0x24,
    NoOperations = 0x25,
    UnsupportedAlgorithm = 0x26,
    OperationDenied = 0x27,
    KeyStoreFull = 0x28,
    NoOperationPending = 0x2A,
    UnsupportedOption = 0x2B,
    InvalidOption = 0x2C,
    KeepAliveCancel = 0x2D,
    NoCredentials = 0x2E,
    UserActionTimeout = 0x2F,
    NotAllowed = 0x30,
    PinInvalid = 0x31,
    PinBlocked = 0x32,
    PinAuthInvalid = 0x33,
    PinAuthBlocked = 0x34,
    PinNotSet = 0x35,
    PinRequired = 0x36,
    PinPolicyViolation = 0x37,
    PinTokenExpired = 0x38,
    RequestTooLarge = 0x39,
    ActionTimeout = 0x3A,
    UserPresenceRequired = 0x3B,
    Other = 0x7F,
}

impl CtapError {
    /// Errors the user can resolve by retrying the whole logical operation.
    pub fn is_retryable_user_error(&self) -> bool {
        matches!(
            self,
            Self::PinInvalid | Self::UserActionTimeout | Self::UserPresenceRequired
        )
    }
}

impl std::error::Error for CtapError {}

impl std::fmt::Display for CtapError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl From<ApduResponseStatus> for CtapError {
    fn from(status: ApduResponseStatus) -> Self {
        match status {
            ApduResponseStatus::NoError => CtapError::Ok,
            ApduResponseStatus::ConditionsNotSatisfied => CtapError::UserPresenceRequired,
            ApduResponseStatus::WrongData => CtapError::InvalidParameter,
            ApduResponseStatus::WrongLength => CtapError::InvalidLength,
            ApduResponseStatus::InstructionNotSupported => CtapError::InvalidCommand,
            _ => CtapError::Other,
        }
    }
}
