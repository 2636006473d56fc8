pub mod tlv;

mod capabilities;
mod keys;
mod protocol;

pub use capabilities::{CardCapabilities, ExtendedCapabilityFlags, OpenPgpCapabilities};
pub use keys::{
    ec_key_template, rsa_key_template, EcAlgorithm, EcKeyFormat, EcPrivateKey, KeyFormat, KeyType,
    RsaCrtKey, RsaImportFormat, RsaKeyFormat,
};
pub use protocol::{OpenPgp, OPENPGP_AID};
