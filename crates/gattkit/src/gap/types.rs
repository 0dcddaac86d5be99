use crate::error::{Error, Result};
use crate::gap::constants::*;
use std::fmt;
use std::str::FromStr;

/// A 48-bit extended unique identifier (Bluetooth device address).
///
/// Bytes are stored in wire order (least significant first); `Display`
/// renders the conventional colon form most significant first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Eui48 {
    pub b: [u8; 6],
}

/// The all-zero wildcard address.
pub const EUI48_ANY: Eui48 = Eui48 {
    b: [0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
};

/// The all-ones broadcast address.
pub const EUI48_ALL: Eui48 = Eui48 {
    b: [0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF],
};

/// The local controller placeholder address.
pub const EUI48_LOCAL: Eui48 = Eui48 {
    b: [0x00, 0x00, 0x00, 0xFF, 0xFF, 0xFF],
};

impl Eui48 {
    pub const fn new(b: [u8; 6]) -> Self {
        Self { b }
    }

    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() >= 6 {
            let mut b = [0u8; 6];
            b.copy_from_slice(&slice[0..6]);
            Some(Self { b })
        } else {
            None
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.b
    }
}

impl fmt::Display for Eui48 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:02X}:{:02X}:{:02X}:{:02X}:{:02X}:{:02X}",
            self.b[5], self.b[4], self.b[3], self.b[2], self.b[1], self.b[0]
        )
    }
}

impl FromStr for Eui48 {
    type Err = Error;

    /// Parse the colon form `AA:BB:CC:DD:EE:FF`.
    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::InvalidArgument(format!("bad EUI48 string: {s}"));
        if s.len() != 17 {
            return Err(bad());
        }
        let mut b = [0u8; 6];
        for (i, part) in s.split(':').enumerate() {
            if i >= 6 || part.len() != 2 {
                return Err(bad());
            }
            // display order is b[5]..b[0]
            b[5 - i] = u8::from_str_radix(part, 16).map_err(|_| bad())?;
        }
        Ok(Self { b })
    }
}

/// Address type of an advertiser, as delivered by the kernel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressType {
    BrEdr,
    LePublic,
    LeRandom,
    Undefined,
}

impl From<u8> for AddressType {
    fn from(value: u8) -> Self {
        match value {
            BDADDR_BREDR => AddressType::BrEdr,
            BDADDR_LE_PUBLIC => AddressType::LePublic,
            BDADDR_LE_RANDOM => AddressType::LeRandom,
            _ => AddressType::Undefined,
        }
    }
}

impl From<AddressType> for u8 {
    fn from(value: AddressType) -> Self {
        match value {
            AddressType::BrEdr => BDADDR_BREDR,
            AddressType::LePublic => BDADDR_LE_PUBLIC,
            AddressType::LeRandom => BDADDR_LE_RANDOM,
            AddressType::Undefined => BDADDR_UNDEFINED,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eui48_display_roundtrip() {
        let addr = Eui48::new([0x55, 0x44, 0x33, 0x22, 0x11, 0x00]);
        assert_eq!(addr.to_string(), "00:11:22:33:44:55");
        assert_eq!("00:11:22:33:44:55".parse::<Eui48>().unwrap(), addr);
    }

    #[test]
    fn test_eui48_parse_rejects_malformed() {
        assert!("00:11:22:33:44".parse::<Eui48>().is_err());
        assert!("00:11:22:33:44:5".parse::<Eui48>().is_err());
        assert!("00-11-22-33-44-55".parse::<Eui48>().is_err());
        assert!("g0:11:22:33:44:55".parse::<Eui48>().is_err());
    }

    #[test]
    fn test_well_known_addresses() {
        assert_eq!(EUI48_ANY.to_string(), "00:00:00:00:00:00");
        assert_eq!(EUI48_ALL.to_string(), "FF:FF:FF:FF:FF:FF");
        assert_eq!(EUI48_LOCAL.to_string(), "FF:FF:FF:00:00:00");
    }

    #[test]
    fn test_address_type_conversion() {
        assert_eq!(AddressType::from(0x01), AddressType::LePublic);
        assert_eq!(AddressType::from(0x77), AddressType::Undefined);
        assert_eq!(u8::from(AddressType::LeRandom), 0x02);
    }
}
