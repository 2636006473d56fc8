pub mod cbor;

mod model;
mod protocol;

pub use model::{
    Ctap2ClientPinCommand, Ctap2ClientPinRequest, Ctap2ClientPinResponse, Ctap2CommandCode,
    Ctap2GetInfoResponse, Ctap2PinUvAuthProtocol,
};
pub use protocol::Ctap2;
