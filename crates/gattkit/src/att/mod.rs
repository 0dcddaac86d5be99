//! Attribute Protocol (ATT) client support
//!
//! The PDU codec, wire error codes and the reader-to-issuer hand-off queue
//! used by the GATT handler. Only the client role is implemented.

pub mod constants;
pub mod error;
pub mod pdu;
pub mod queue;

// Re-export the public API
pub use self::constants::*;
pub use self::error::AttErrorCode;
pub use self::pdu::{
    AttPdu, FindInformationResponse, ReadByGroupTypeResponse, ReadByTypeResponse,
};
pub use self::queue::PduQueue;
