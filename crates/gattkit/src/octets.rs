//! Octet buffers with endian-aware typed accessors
//!
//! Every ATT PDU is a thin view over one of these buffers. All multi-byte
//! integers on the ATT wire are little-endian, so the accessors here are
//! little-endian only.

use crate::error::{Error, Result};
use crate::uuid::Uuid;
use byteorder::{ByteOrder, LittleEndian};

/// Owned octet buffer with bounds-checked little-endian accessors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Octets {
    data: Vec<u8>,
}

impl Octets {
    /// Create a zero-filled buffer of the given size.
    pub fn new(size: usize) -> Self {
        Self {
            data: vec![0; size],
        }
    }

    /// Take ownership of an existing byte vector.
    pub fn from_vec(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<u8> {
        self.data
    }

    fn check(&self, offset: usize, count: usize) -> Result<()> {
        check_range(offset, count, self.data.len())
    }

    pub fn get_u8(&self, offset: usize) -> Result<u8> {
        self.check(offset, 1)?;
        Ok(self.data[offset])
    }

    pub fn get_i8(&self, offset: usize) -> Result<i8> {
        Ok(self.get_u8(offset)? as i8)
    }

    pub fn get_u16(&self, offset: usize) -> Result<u16> {
        self.check(offset, 2)?;
        Ok(LittleEndian::read_u16(&self.data[offset..offset + 2]))
    }

    pub fn get_u32(&self, offset: usize) -> Result<u32> {
        self.check(offset, 4)?;
        Ok(LittleEndian::read_u32(&self.data[offset..offset + 4]))
    }

    pub fn get_u64(&self, offset: usize) -> Result<u64> {
        self.check(offset, 8)?;
        Ok(LittleEndian::read_u64(&self.data[offset..offset + 8]))
    }

    pub fn put_u8(&mut self, offset: usize, v: u8) -> Result<()> {
        self.check(offset, 1)?;
        self.data[offset] = v;
        Ok(())
    }

    pub fn put_u16(&mut self, offset: usize, v: u16) -> Result<()> {
        self.check(offset, 2)?;
        LittleEndian::write_u16(&mut self.data[offset..offset + 2], v);
        Ok(())
    }

    pub fn put_u32(&mut self, offset: usize, v: u32) -> Result<()> {
        self.check(offset, 4)?;
        LittleEndian::write_u32(&mut self.data[offset..offset + 4], v);
        Ok(())
    }

    pub fn put_u64(&mut self, offset: usize, v: u64) -> Result<()> {
        self.check(offset, 8)?;
        LittleEndian::write_u64(&mut self.data[offset..offset + 8], v);
        Ok(())
    }

    /// Read a UUID of the given wire size (2, 4 or 16 octets, little-endian).
    pub fn get_uuid(&self, offset: usize, size: usize) -> Result<Uuid> {
        self.check(offset, size)?;
        Uuid::from_bytes(&self.data[offset..offset + size])
    }

    /// Borrow a read-only sub-slice view of this buffer.
    pub fn slice(&self, offset: usize, len: usize) -> Result<OctetSlice<'_>> {
        self.check(offset, len)?;
        Ok(OctetSlice {
            data: &self.data[offset..offset + len],
        })
    }
}

/// Read-only borrowed view into a range of a parent buffer.
///
/// A slice cannot outlive its parent and cannot be mutated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OctetSlice<'a> {
    data: &'a [u8],
}

impl<'a> OctetSlice<'a> {
    pub fn from_slice(data: &'a [u8]) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &'a [u8] {
        self.data
    }

    pub fn get_u8(&self, offset: usize) -> Result<u8> {
        check_range(offset, 1, self.data.len())?;
        Ok(self.data[offset])
    }

    pub fn get_i8(&self, offset: usize) -> Result<i8> {
        Ok(self.get_u8(offset)? as i8)
    }

    pub fn get_u16(&self, offset: usize) -> Result<u16> {
        check_range(offset, 2, self.data.len())?;
        Ok(LittleEndian::read_u16(&self.data[offset..offset + 2]))
    }

    pub fn get_u32(&self, offset: usize) -> Result<u32> {
        check_range(offset, 4, self.data.len())?;
        Ok(LittleEndian::read_u32(&self.data[offset..offset + 4]))
    }

    pub fn get_uuid(&self, offset: usize, size: usize) -> Result<Uuid> {
        check_range(offset, size, self.data.len())?;
        Uuid::from_bytes(&self.data[offset..offset + size])
    }
}

/// Growable octet buffer bounded by a fixed capacity.
///
/// `resize` and `append` never exceed the capacity chosen at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct POctets {
    data: Vec<u8>,
    capacity: usize,
}

impl POctets {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Grow or shrink to `n` octets, zero-filling new space.
    pub fn resize(&mut self, n: usize) -> Result<()> {
        if n > self.capacity {
            return Err(Error::OutOfBounds {
                offset: 0,
                count: n,
                size: self.capacity,
            });
        }
        self.data.resize(n, 0);
        Ok(())
    }

    /// Append `bytes` at the end, growing within capacity.
    pub fn append(&mut self, bytes: &[u8]) -> Result<()> {
        if self.data.len() + bytes.len() > self.capacity {
            return Err(Error::OutOfBounds {
                offset: self.data.len(),
                count: bytes.len(),
                size: self.capacity,
            });
        }
        self.data.extend_from_slice(bytes);
        Ok(())
    }

    pub fn get_u8(&self, offset: usize) -> Result<u8> {
        check_range(offset, 1, self.data.len())?;
        Ok(self.data[offset])
    }

    pub fn get_u16(&self, offset: usize) -> Result<u16> {
        check_range(offset, 2, self.data.len())?;
        Ok(LittleEndian::read_u16(&self.data[offset..offset + 2]))
    }

    pub fn put_u16(&mut self, offset: usize, v: u16) -> Result<()> {
        check_range(offset, 2, self.data.len())?;
        LittleEndian::write_u16(&mut self.data[offset..offset + 2], v);
        Ok(())
    }
}

fn check_range(offset: usize, count: usize, size: usize) -> Result<()> {
    if offset.checked_add(count).map_or(true, |end| end > size) {
        Err(Error::OutOfBounds {
            offset,
            count,
            size,
        })
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::Uuid;

    #[test]
    fn test_endian_accessors() {
        let mut o = Octets::new(8);
        o.put_u16(0, 0x1234).unwrap();
        o.put_u32(2, 0xAABBCCDD).unwrap();
        assert_eq!(o.as_slice()[0], 0x34);
        assert_eq!(o.as_slice()[1], 0x12);
        assert_eq!(o.get_u16(0).unwrap(), 0x1234);
        assert_eq!(o.get_u32(2).unwrap(), 0xAABBCCDD);
        assert_eq!(o.get_u8(2).unwrap(), 0xDD);

        let mut o = Octets::new(8);
        o.put_u64(0, 0x0102030405060708).unwrap();
        assert_eq!(o.get_u64(0).unwrap(), 0x0102030405060708);
        assert_eq!(o.get_u8(0).unwrap(), 0x08);
    }

    #[test]
    fn test_bounds_checked() {
        let o = Octets::new(4);
        assert!(matches!(
            o.get_u16(3),
            Err(Error::OutOfBounds {
                offset: 3,
                count: 2,
                size: 4
            })
        ));
        assert!(o.get_u32(1).is_err());
        assert!(o.get_u8(4).is_err());
        assert!(o.get_u16(usize::MAX).is_err());

        let mut o = Octets::new(2);
        assert!(o.put_u32(0, 1).is_err());
    }

    #[test]
    fn test_get_uuid() {
        let o = Octets::from_vec(vec![0x00, 0x18, 0xAA, 0xBB]);
        assert_eq!(o.get_uuid(0, 2).unwrap(), Uuid::Uuid16(0x1800));
        assert_eq!(o.get_uuid(0, 4).unwrap(), Uuid::Uuid32(0xBBAA1800));
        assert!(matches!(
            o.get_uuid(0, 3),
            Err(Error::InvalidUuidSize(3))
        ));
        assert!(o.get_uuid(2, 4).is_err());
    }

    #[test]
    fn test_sub_slice() {
        let o = Octets::from_vec(vec![1, 2, 3, 4, 5]);
        let s = o.slice(1, 3).unwrap();
        assert_eq!(s.as_slice(), &[2, 3, 4]);
        assert_eq!(s.get_u16(0).unwrap(), 0x0302);
        assert!(s.get_u16(2).is_err());
        assert!(o.slice(3, 3).is_err());
    }

    #[test]
    fn test_poctets_resize_bounded() {
        let mut p = POctets::with_capacity(4);
        assert_eq!(p.len(), 0);
        p.resize(4).unwrap();
        assert_eq!(p.len(), 4);
        p.put_u16(0, 0x2902).unwrap();
        assert_eq!(p.get_u16(0).unwrap(), 0x2902);
        assert!(p.resize(5).is_err());
        p.resize(0).unwrap();
        assert!(p.is_empty());
    }

    #[test]
    fn test_poctets_append_bounded() {
        let mut p = POctets::with_capacity(3);
        p.append(&[1, 2]).unwrap();
        assert!(p.append(&[3, 4]).is_err());
        p.append(&[3]).unwrap();
        assert_eq!(p.as_slice(), &[1, 2, 3]);
    }
}
