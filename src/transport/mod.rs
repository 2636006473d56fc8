pub mod error;
pub mod tpdu;

mod channel;

pub use channel::{Channel, FrameTransceiver};
