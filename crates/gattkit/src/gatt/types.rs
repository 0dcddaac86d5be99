//! Common types for GATT operations
//!
//! The attribute tree discovered from a server: primary services, their
//! characteristic declarations, client configuration descriptors and plain
//! descriptors. The tree is owned by the handler; consumers address entries
//! through [`CharacteristicRef`] index pairs rather than shared references.

use crate::uuid::Uuid;
use bitflags::bitflags;

bitflags! {
    /// Characteristic properties as defined in the Bluetooth specification
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct CharacteristicProperty: u8 {
        const BROADCAST = 0x01;
        const READ = 0x02;
        const WRITE_NO_RESPONSE = 0x04;
        const WRITE = 0x08;
        const NOTIFY = 0x10;
        const INDICATE = 0x20;
        const AUTH_SIGNED_WRITE = 0x40;
        const EXTENDED_PROPERTIES = 0x80;
    }
}

impl CharacteristicProperty {
    pub fn can_read(&self) -> bool {
        self.contains(CharacteristicProperty::READ)
    }

    pub fn can_write(&self) -> bool {
        self.contains(CharacteristicProperty::WRITE)
    }

    pub fn can_write_without_response(&self) -> bool {
        self.contains(CharacteristicProperty::WRITE_NO_RESPONSE)
    }

    pub fn can_notify(&self) -> bool {
        self.contains(CharacteristicProperty::NOTIFY)
    }

    pub fn can_indicate(&self) -> bool {
        self.contains(CharacteristicProperty::INDICATE)
    }
}

/// Client Characteristic Configuration descriptor contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientCharacteristicConfig {
    pub handle: u16,
    pub value: u16,
}

impl ClientCharacteristicConfig {
    pub fn notifications_enabled(&self) -> bool {
        self.value & 0x0001 != 0
    }

    pub fn indications_enabled(&self) -> bool {
        self.value & 0x0002 != 0
    }
}

/// A characteristic descriptor found via Find Information.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub handle: u16,
    pub uuid: Uuid,
}

/// A discovered characteristic declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Characteristic {
    /// UUID of the service this characteristic belongs to
    pub service_uuid: Uuid,
    /// Start handle of the owning service
    pub service_handle: u16,
    /// End handle of the owning service
    pub service_handle_end: u16,
    /// Handle of the declaration attribute itself
    pub declaration_handle: u16,
    /// Handle of the value attribute
    pub value_handle: u16,
    /// Property bits from the declaration
    pub properties: CharacteristicProperty,
    /// Characteristic UUID
    pub uuid: Uuid,
    /// Client configuration descriptor, when discovered
    pub config: Option<ClientCharacteristicConfig>,
}

/// A discovered primary service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Service {
    pub uuid: Uuid,
    pub start_handle: u16,
    pub end_handle: u16,
    pub characteristics: Vec<Characteristic>,
}

/// Stable address of a characteristic inside the handler's service tree:
/// service index plus characteristic index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharacteristicRef {
    pub service: usize,
    pub characteristic: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_bits() {
        let p = CharacteristicProperty::from_bits_truncate(0x12);
        assert!(p.can_read());
        assert!(p.can_notify());
        assert!(!p.can_write());
        assert!(!p.can_indicate());
    }

    #[test]
    fn test_cccd_bits() {
        let cfg = ClientCharacteristicConfig {
            handle: 0x0004,
            value: 0x0003,
        };
        assert!(cfg.notifications_enabled());
        assert!(cfg.indications_enabled());
        let off = ClientCharacteristicConfig {
            handle: 0x0004,
            value: 0,
        };
        assert!(!off.notifications_enabled());
        assert!(!off.indications_enabled());
    }
}
