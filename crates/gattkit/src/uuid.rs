//! Bluetooth UUIDs in their three wire widths
//!
//! A UUID on the ATT wire is 16, 32 or 128 bits wide. The short forms are
//! offsets into the Bluetooth Base UUID; two UUIDs are equal exactly when
//! their 128-bit expansions match, regardless of the width they were
//! decoded from.

use crate::error::{Error, Result};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// The Bluetooth Base UUID `00000000-0000-1000-8000-00805F9B34FB`,
/// stored little-endian. 16-bit and 32-bit values are inserted at
/// [`BASE_OFFSET`].
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

const BASE_OFFSET: usize = 12;

/// A Bluetooth UUID, tagged with its wire width.
///
/// The 128-bit payload is kept little-endian, matching the ATT wire order.
#[derive(Debug, Clone, Copy)]
pub enum Uuid {
    Uuid16(u16),
    Uuid32(u32),
    Uuid128([u8; 16]),
}

impl Uuid {
    /// Decode a UUID from its little-endian wire form.
    ///
    /// Accepts slices of 2, 4 or 16 octets; anything else fails with
    /// [`Error::InvalidUuidSize`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match bytes.len() {
            2 => Ok(Uuid::Uuid16(u16::from_le_bytes([bytes[0], bytes[1]]))),
            4 => Ok(Uuid::Uuid32(u32::from_le_bytes([
                bytes[0], bytes[1], bytes[2], bytes[3],
            ]))),
            16 => {
                let mut b = [0u8; 16];
                b.copy_from_slice(bytes);
                Ok(Uuid::Uuid128(b))
            }
            n => Err(Error::InvalidUuidSize(n)),
        }
    }

    /// Wire width of this UUID in octets.
    pub fn type_size(&self) -> usize {
        match self {
            Uuid::Uuid16(_) => 2,
            Uuid::Uuid32(_) => 4,
            Uuid::Uuid128(_) => 16,
        }
    }

    /// Little-endian wire form at the native width.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Uuid::Uuid16(v) => v.to_le_bytes().to_vec(),
            Uuid::Uuid32(v) => v.to_le_bytes().to_vec(),
            Uuid::Uuid128(b) => b.to_vec(),
        }
    }

    /// Canonical 128-bit expansion over the Base UUID, little-endian.
    pub fn to_uuid128(&self) -> [u8; 16] {
        match self {
            Uuid::Uuid16(v) => {
                let mut b = BASE_UUID_BYTES;
                b[BASE_OFFSET..BASE_OFFSET + 2].copy_from_slice(&v.to_le_bytes());
                b
            }
            Uuid::Uuid32(v) => {
                let mut b = BASE_UUID_BYTES;
                b[BASE_OFFSET..BASE_OFFSET + 4].copy_from_slice(&v.to_le_bytes());
                b
            }
            Uuid::Uuid128(b) => *b,
        }
    }

    /// The 16-bit value when this UUID has 16-bit width.
    pub fn as_u16(&self) -> Option<u16> {
        match self {
            Uuid::Uuid16(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Uuid::Uuid32(v) => Some(*v),
            _ => None,
        }
    }
}

// Equality is width-independent: compare the 128-bit expansions.
impl PartialEq for Uuid {
    fn eq(&self, other: &Self) -> bool {
        self.to_uuid128() == other.to_uuid128()
    }
}

impl Eq for Uuid {}

impl Hash for Uuid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.to_uuid128().hash(state);
    }
}

impl From<u16> for Uuid {
    fn from(v: u16) -> Self {
        Uuid::Uuid16(v)
    }
}

impl From<u32> for Uuid {
    fn from(v: u32) -> Self {
        Uuid::Uuid32(v)
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Uuid::Uuid16(v) => write!(f, "{:04x}", v),
            Uuid::Uuid32(v) => write!(f, "{:08x}", v),
            Uuid::Uuid128(b) => write!(
                f,
                "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
                b[15], b[14], b[13], b[12],
                b[11], b[10],
                b[9], b[8],
                b[7], b[6],
                b[5], b[4], b[3], b[2], b[1], b[0]
            ),
        }
    }
}

impl FromStr for Uuid {
    type Err = Error;

    /// Parse a 16-bit ("180a"), 32-bit ("0000180a") or hyphenated/plain
    /// 128-bit hex form.
    fn from_str(s: &str) -> Result<Self> {
        let cleaned: String = s.chars().filter(|c| c.is_ascii_hexdigit()).collect();
        match cleaned.len() {
            4 => u16::from_str_radix(&cleaned, 16)
                .map(Uuid::Uuid16)
                .map_err(|_| Error::InvalidArgument(format!("bad UUID string: {s}"))),
            8 => u32::from_str_radix(&cleaned, 16)
                .map(Uuid::Uuid32)
                .map_err(|_| Error::InvalidArgument(format!("bad UUID string: {s}"))),
            32 => {
                let mut be = [0u8; 16];
                hex::decode_to_slice(&cleaned, &mut be)
                    .map_err(|_| Error::InvalidArgument(format!("bad UUID string: {s}")))?;
                be.reverse();
                Ok(Uuid::Uuid128(be))
            }
            n => Err(Error::InvalidUuidSize(n / 2)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_width_independent_equality() {
        let a = Uuid::Uuid16(0x180A);
        let b = Uuid::Uuid32(0x0000180A);
        let c = Uuid::from_bytes(&a.to_uuid128()).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, c);
        assert_eq!(b, c);
        assert_ne!(a, Uuid::Uuid16(0x1800));

        // A 128-bit UUID off the base is equal to nothing short
        let mut raw = a.to_uuid128();
        raw[0] ^= 0xFF;
        assert_ne!(a, Uuid::Uuid128(raw));
    }

    #[test]
    fn test_from_bytes_sizes() {
        assert_eq!(Uuid::from_bytes(&[0x00, 0x28]).unwrap(), Uuid::Uuid16(0x2800));
        assert_eq!(
            Uuid::from_bytes(&[0x01, 0x02, 0x03, 0x04]).unwrap(),
            Uuid::Uuid32(0x04030201)
        );
        assert!(Uuid::from_bytes(&[0u8; 16]).is_ok());
        assert!(matches!(
            Uuid::from_bytes(&[1, 2, 3]),
            Err(Error::InvalidUuidSize(3))
        ));
        assert!(matches!(
            Uuid::from_bytes(&[]),
            Err(Error::InvalidUuidSize(0))
        ));
    }

    #[test]
    fn test_parse_and_display() {
        let u: Uuid = "180A".parse().unwrap();
        assert_eq!(u, Uuid::Uuid16(0x180A));
        assert_eq!(format!("{}", u), "180a");

        let u: Uuid = "0000180a".parse().unwrap();
        assert_eq!(u, Uuid::Uuid32(0x0000180A));

        let u: Uuid = "00001800-0000-1000-8000-00805f9b34fb".parse().unwrap();
        assert_eq!(u, Uuid::Uuid16(0x1800));
        assert_eq!(
            format!("{}", u),
            "00001800-0000-1000-8000-00805f9b34fb"
        );

        assert!("zz".parse::<Uuid>().is_err());
    }

    #[test]
    fn test_hash_follows_equality() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        set.insert(Uuid::Uuid16(0x2902));
        assert!(set.contains(&Uuid::Uuid32(0x2902)));
    }
}
