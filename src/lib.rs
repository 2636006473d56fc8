//! Host-side driver stack for smart cards and security tokens.
//!
//! The core of this crate is the T=1 TPDU transport engine in
//! [`transport::tpdu`], which turns a raw frame channel into a reliable,
//! ordered APDU exchange. The protocol layers in [`proto`] (CTAP2 and
//! OpenPGP card) are consumers of that exchange and never see frames.

pub mod pin;
pub mod proto;
pub mod transport;
