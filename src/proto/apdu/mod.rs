mod request;
mod response;

pub use request::ApduRequest;
pub use response::{ApduResponse, ApduResponseStatus};
