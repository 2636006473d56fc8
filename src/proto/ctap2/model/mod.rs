mod client_pin;
mod get_info;

pub use client_pin::{
    Ctap2ClientPinCommand, Ctap2ClientPinRequest, Ctap2ClientPinResponse, Ctap2PinUvAuthProtocol,
};
pub use get_info::Ctap2GetInfoResponse;

use num_enum::IntoPrimitive;

#[derive(Debug, IntoPrimitive, Copy, Clone, PartialEq)]
#[repr(u8)]
pub enum Ctap2CommandCode {
    AuthenticatorGetInfo = 0x04,
    AuthenticatorClientPin = 0x06,
}
