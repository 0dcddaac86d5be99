//! GattKit - a host-side Bluetooth Low Energy ATT/GATT client
//!
//! This library implements the client side of the Attribute Protocol (ATT)
//! over an L2CAP connection-oriented channel, the GATT discovery procedures
//! layered on top of it, and a decoder for EIR/AD advertising payloads
//! received during device scanning. The L2CAP byte transport itself is
//! consumed through the [`transport::L2capTransport`] trait and is provided
//! by the embedding application.

pub mod att;
pub mod eir;
pub mod error;
pub mod gap;
pub mod gatt;
pub mod octets;
pub mod transport;
pub mod uuid;

// Re-export common types for convenience
pub use error::{Error, Result};
pub use gap::{AddressType, Eui48};
pub use gatt::{Characteristic, GattHandler, HandlerState, Service};
pub use eir::{EirDataMask, InfoReport};
pub use transport::{L2capTransport, TransportState};
pub use uuid::Uuid;
