//! GATT client
//!
//! The discovery and read/write procedures layered over the ATT client,
//! plus the well-known Generic Access and Device Information services.

pub mod handler;
pub mod profile;
pub mod types;

// Re-export the public API
pub use self::handler::{GattHandler, HandlerState, ReaderConfig};
pub use self::profile::{DeviceInformation, GenericAccess, PnpId, PreferredConnectionParameters};
pub use self::types::{
    Characteristic, CharacteristicProperty, CharacteristicRef, ClientCharacteristicConfig,
    Descriptor, Service,
};
