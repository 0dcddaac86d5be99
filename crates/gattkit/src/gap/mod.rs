//! Generic Access Profile types
//!
//! Device addressing and the GAP assigned numbers used as EIR/AD element
//! types during scanning.

pub mod constants;
pub mod types;

pub use self::types::{AddressType, Eui48, EUI48_ALL, EUI48_ANY, EUI48_LOCAL};
