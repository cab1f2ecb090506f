//! Registration code lifecycle: generation, issuance and one-time consumption.

mod generator;
mod issuer;

pub use generator::{ALPHABET, GROUP_LEN, generate_code, is_well_formed, normalize_code};
pub use issuer::CodeIssuer;
