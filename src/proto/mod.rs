pub mod apdu;
pub mod ctap2;
pub mod openpgp;

mod error;

pub use error::CtapError;
