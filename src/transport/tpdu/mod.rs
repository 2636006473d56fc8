//! T=1 TPDU transport protocol.
//!
//! Turns the unreliable byte-oriented frame channel of a card reader into a
//! reliable, ordered, one-exchange-at-a-time APDU channel: framing, sequence
//! numbers, chaining, checksums, bounded retries and resynchronization.

mod block;
mod checksum;
mod protocol;

pub use block::{
    Block, BlockCodec, InformationBlock, ReceiveReadyBlock, ReceiveReadyError, SupervisoryBlock,
    SupervisoryOperation, MAX_INFORMATION_FIELD,
};
pub use checksum::ChecksumAlgorithm;
pub use protocol::{T1Protocol, RETRY_LIMIT};
