//! Crosscall Types - value types shared by the execution host and its tools.
//!
//! - Addresses (32-byte opaque identifiers, Bech32m / hex / padded-name forms)
//! - U256 (256-bit unsigned amounts, 32-byte big-endian on the host boundary)

pub mod address;
pub mod u256;
pub mod error;

#[cfg(feature = "serde")]
mod serialization;

pub use address::Address;
pub use u256::U256;
pub use error::TypesError;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{Address, TypesError, U256};
}
