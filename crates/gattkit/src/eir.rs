//! EIR/AD advertising-data decoder
//!
//! Walks the tag-length-value stream of an Extended Inquiry Response or
//! LE Advertising Data payload and builds an [`InfoReport`]: the typed
//! fields recognized from the GAP assigned numbers, plus a bitmask naming
//! exactly the fields that were populated.

use crate::error::{Error, Result};
use crate::gap::constants::*;
use crate::gap::types::{AddressType, Eui48};
use crate::uuid::Uuid;
use bitflags::bitflags;
use log::{debug, warn};
use std::sync::OnceLock;
use std::time::Instant;

bitflags! {
    /// Which fields of an [`InfoReport`] carry data.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct EirDataMask: u32 {
        const EVT_TYPE = 1 << 0;
        const BDADDR_TYPE = 1 << 1;
        const BDADDR = 1 << 2;
        const FLAGS = 1 << 3;
        const NAME = 1 << 4;
        const NAME_SHORT = 1 << 5;
        const RSSI = 1 << 6;
        const TX_POWER = 1 << 7;
        const MANUF_DATA = 1 << 8;
        const DEVICE_CLASS = 1 << 9;
        const APPEARANCE = 1 << 10;
        const HASH = 1 << 11;
        const RANDOMIZER = 1 << 12;
        const DEVICE_ID = 1 << 13;
        const SERVICE_UUID = 1 << 14;
    }
}

/// Where a report's payload came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReportSource {
    #[default]
    NotAvailable,
    Ad,
    Eir,
}

/// Manufacturer Specific Data element: company identifier plus payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManufacturerData {
    pub company: u16,
    pub data: Vec<u8>,
}

/// Kernel advertising batches carry at most this many reports.
pub const MAX_ADV_REPORTS: usize = 0x19;

/// One advertising-data element: `len | type | data`.
#[derive(Debug, Clone, Copy)]
pub struct AdElement<'a> {
    pub ad_type: u8,
    pub data: &'a [u8],
}

/// Extract the element at `offset`.
///
/// Returns `Ok(None)` at a zero length octet or the end of the buffer (the
/// end of the significant part), otherwise the element and the offset of
/// the next one. An element reaching past the buffer fails with
/// [`Error::TruncatedAdElement`].
pub fn next_element(data: &[u8], offset: usize) -> Result<Option<(AdElement<'_>, usize)>> {
    if offset >= data.len() {
        return Ok(None);
    }
    // len covers type + data, not itself
    let len = data[offset] as usize;
    if len == 0 {
        return Ok(None);
    }
    if offset + 1 + len > data.len() {
        return Err(Error::TruncatedAdElement(offset));
    }
    Ok(Some((
        AdElement {
            ad_type: data[offset + 1],
            data: &data[offset + 2..offset + 1 + len],
        },
        offset + 1 + len,
    )))
}

/// Structured information decoded from one advertising report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InfoReport {
    source: ReportSource,
    timestamp_ms: u64,
    mask: EirDataMask,
    evt_type: u8,
    address: Eui48,
    address_type: AddressType,
    flags: i8,
    name: String,
    short_name: String,
    rssi: i8,
    tx_power: i8,
    device_class: u32,
    appearance: u16,
    hash: [u8; 16],
    randomizer: [u8; 16],
    did_source: u16,
    did_vendor: u16,
    did_product: u16,
    did_version: u16,
    manufacturer_data: Option<ManufacturerData>,
    services: Vec<Uuid>,
}

impl InfoReport {
    pub fn new(source: ReportSource) -> Self {
        Self {
            source,
            timestamp_ms: monotonic_millis(),
            mask: EirDataMask::empty(),
            evt_type: 0,
            address: Eui48::default(),
            address_type: AddressType::Undefined,
            flags: 0,
            name: String::new(),
            short_name: String::new(),
            rssi: 0,
            tx_power: 0,
            device_class: 0,
            appearance: 0,
            hash: [0; 16],
            randomizer: [0; 16],
            did_source: 0,
            did_vendor: 0,
            did_product: 0,
            did_version: 0,
            manufacturer_data: None,
            services: Vec::new(),
        }
    }

    pub fn source(&self) -> ReportSource {
        self.source
    }

    pub fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    pub fn mask(&self) -> EirDataMask {
        self.mask
    }

    pub fn evt_type(&self) -> u8 {
        self.evt_type
    }

    pub fn address(&self) -> Eui48 {
        self.address
    }

    pub fn address_type(&self) -> AddressType {
        self.address_type
    }

    pub fn rssi(&self) -> i8 {
        self.rssi
    }

    pub fn flags(&self) -> Option<i8> {
        self.mask.contains(EirDataMask::FLAGS).then_some(self.flags)
    }

    pub fn name(&self) -> Option<&str> {
        self.mask
            .contains(EirDataMask::NAME)
            .then_some(self.name.as_str())
    }

    pub fn short_name(&self) -> Option<&str> {
        self.mask
            .contains(EirDataMask::NAME_SHORT)
            .then_some(self.short_name.as_str())
    }

    pub fn tx_power(&self) -> Option<i8> {
        self.mask
            .contains(EirDataMask::TX_POWER)
            .then_some(self.tx_power)
    }

    pub fn device_class(&self) -> Option<u32> {
        self.mask
            .contains(EirDataMask::DEVICE_CLASS)
            .then_some(self.device_class)
    }

    pub fn appearance(&self) -> Option<u16> {
        self.mask
            .contains(EirDataMask::APPEARANCE)
            .then_some(self.appearance)
    }

    pub fn hash(&self) -> Option<&[u8; 16]> {
        self.mask.contains(EirDataMask::HASH).then_some(&self.hash)
    }

    pub fn randomizer(&self) -> Option<&[u8; 16]> {
        self.mask
            .contains(EirDataMask::RANDOMIZER)
            .then_some(&self.randomizer)
    }

    /// Device ID as `(source, vendor, product, version)`.
    pub fn device_id(&self) -> Option<(u16, u16, u16, u16)> {
        self.mask.contains(EirDataMask::DEVICE_ID).then_some((
            self.did_source,
            self.did_vendor,
            self.did_product,
            self.did_version,
        ))
    }

    pub fn manufacturer_data(&self) -> Option<&ManufacturerData> {
        self.manufacturer_data.as_ref()
    }

    pub fn services(&self) -> &[Uuid] {
        &self.services
    }

    /// Kernel modalias rendering of the Device ID fields.
    pub fn modalias(&self) -> Option<String> {
        if !self.mask.contains(EirDataMask::DEVICE_ID) {
            return None;
        }
        let prefix = match self.did_source {
            0x0001 => "bluetooth".to_string(),
            0x0002 => "usb".to_string(),
            s => format!("source<0x{s:X}>"),
        };
        Some(format!(
            "{prefix}:v{:04X}p{:04X}d{:04X}",
            self.did_vendor, self.did_product, self.did_version
        ))
    }

    pub fn set_evt_type(&mut self, v: u8) {
        self.evt_type = v;
        self.mask |= EirDataMask::EVT_TYPE;
    }

    pub fn set_address(&mut self, address: Eui48) {
        self.address = address;
        self.mask |= EirDataMask::BDADDR;
    }

    pub fn set_address_type(&mut self, t: AddressType) {
        self.address_type = t;
        self.mask |= EirDataMask::BDADDR_TYPE;
    }

    pub fn set_rssi(&mut self, rssi: i8) {
        self.rssi = rssi;
        self.mask |= EirDataMask::RSSI;
    }

    pub fn set_flags(&mut self, flags: i8) {
        self.flags = flags;
        self.mask |= EirDataMask::FLAGS;
    }

    pub fn set_name(&mut self, buffer: &[u8]) {
        self.name = ad_string(buffer);
        self.mask |= EirDataMask::NAME;
    }

    pub fn set_short_name(&mut self, buffer: &[u8]) {
        self.short_name = ad_string(buffer);
        self.mask |= EirDataMask::NAME_SHORT;
    }

    pub fn set_tx_power(&mut self, v: i8) {
        self.tx_power = v;
        self.mask |= EirDataMask::TX_POWER;
    }

    pub fn set_device_class(&mut self, v: u32) {
        self.device_class = v;
        self.mask |= EirDataMask::DEVICE_CLASS;
    }

    pub fn set_appearance(&mut self, v: u16) {
        self.appearance = v;
        self.mask |= EirDataMask::APPEARANCE;
    }

    pub fn set_hash(&mut self, h: &[u8]) {
        self.hash.copy_from_slice(&h[..16]);
        self.mask |= EirDataMask::HASH;
    }

    pub fn set_randomizer(&mut self, r: &[u8]) {
        self.randomizer.copy_from_slice(&r[..16]);
        self.mask |= EirDataMask::RANDOMIZER;
    }

    pub fn set_device_id(&mut self, source: u16, vendor: u16, product: u16, version: u16) {
        self.did_source = source;
        self.did_vendor = vendor;
        self.did_product = product;
        self.did_version = version;
        self.mask |= EirDataMask::DEVICE_ID;
    }

    pub fn set_manufacturer_data(&mut self, company: u16, data: &[u8]) {
        self.manufacturer_data = Some(ManufacturerData {
            company,
            data: data.to_vec(),
        });
        self.mask |= EirDataMask::MANUF_DATA;
    }

    pub fn add_service(&mut self, uuid: Uuid) {
        if !self.services.contains(&uuid) {
            self.services.push(uuid);
        }
        self.mask |= EirDataMask::SERVICE_UUID;
    }

    /// Walk an EIR/AD payload and populate the recognized fields.
    /// Returns the number of elements consumed.
    pub fn read_data(&mut self, data: &[u8]) -> Result<usize> {
        let mut count = 0;
        let mut offset = 0;
        while let Some((elem, next)) = next_element(data, offset)? {
            offset = next;
            count += 1;
            let d = elem.data;
            match elem.ad_type {
                AD_FLAGS => {
                    if !d.is_empty() {
                        self.set_flags(d[0] as i8);
                    }
                }
                AD_UUID16_INCOMPLETE | AD_UUID16_COMPLETE => {
                    for chunk in d.chunks_exact(2) {
                        self.add_service(Uuid::from_bytes(chunk)?);
                    }
                }
                AD_UUID32_INCOMPLETE | AD_UUID32_COMPLETE => {
                    for chunk in d.chunks_exact(4) {
                        self.add_service(Uuid::from_bytes(chunk)?);
                    }
                }
                AD_UUID128_INCOMPLETE | AD_UUID128_COMPLETE => {
                    for chunk in d.chunks_exact(16) {
                        self.add_service(Uuid::from_bytes(chunk)?);
                    }
                }
                AD_NAME_SHORT => self.set_short_name(d),
                AD_NAME_COMPLETE => self.set_name(d),
                AD_TX_POWER_LEVEL => {
                    if !d.is_empty() {
                        self.set_tx_power(d[0] as i8);
                    }
                }
                AD_CLASS_OF_DEVICE => {
                    if d.len() >= 3 {
                        self.set_device_class(
                            d[0] as u32 | (d[1] as u32) << 8 | (d[2] as u32) << 16,
                        );
                    }
                }
                AD_DEVICE_ID => {
                    if d.len() >= 8 {
                        self.set_device_id(
                            u16::from_le_bytes([d[0], d[1]]),
                            u16::from_le_bytes([d[2], d[3]]),
                            u16::from_le_bytes([d[4], d[5]]),
                            u16::from_le_bytes([d[6], d[7]]),
                        );
                    }
                }
                AD_APPEARANCE => {
                    if d.len() >= 2 {
                        self.set_appearance(u16::from_le_bytes([d[0], d[1]]));
                    }
                }
                AD_SSP_HASH_C192 => {
                    if d.len() >= 16 {
                        self.set_hash(d);
                    }
                }
                AD_SSP_RANDOMIZER_R192 => {
                    if d.len() >= 16 {
                        self.set_randomizer(d);
                    }
                }
                AD_MANUFACTURER_SPECIFIC => {
                    if d.len() >= 2 {
                        self.set_manufacturer_data(
                            u16::from_le_bytes([d[0], d[1]]),
                            &d[2..],
                        );
                    }
                }
                t => {
                    debug!("skipping AD element type 0x{t:02X} ({} octets)", d.len());
                }
            }
        }
        Ok(count)
    }
}

/// Decode a kernel advertising-report batch.
///
/// Layout: `num_reports | evt_type[] | addr_type[] | addr[] | ad_len[] |
/// ad_data[] | rssi[]`. An out-of-range report count produces an empty
/// result; arrays cut short by the buffer end truncate, and the decoder
/// returns whatever reports it could build.
pub fn read_ad_reports(data: &[u8]) -> Vec<InfoReport> {
    if data.is_empty() {
        return Vec::new();
    }
    let num_reports = data[0] as usize;
    if num_reports == 0 || num_reports > MAX_ADV_REPORTS {
        debug!("advertising batch: invalid report count {num_reports}");
        return Vec::new();
    }
    let limes = data.len();
    let mut off = 1usize;
    let mut reports: Vec<InfoReport> = Vec::with_capacity(num_reports);
    let mut segments = 0;

    // event types; reports come to life here
    while reports.len() < num_reports && off < limes {
        let mut report = InfoReport::new(ReportSource::Ad);
        report.set_evt_type(data[off]);
        off += 1;
        reports.push(report);
    }
    if reports.len() == num_reports {
        segments += 1;
    }

    // address types
    let mut done = 0;
    for report in reports.iter_mut() {
        if off >= limes {
            break;
        }
        report.set_address_type(AddressType::from(data[off]));
        off += 1;
        done += 1;
    }
    if done == num_reports {
        segments += 1;
    }

    // addresses
    done = 0;
    for report in reports.iter_mut() {
        if off + 6 > limes {
            break;
        }
        if let Some(address) = Eui48::from_slice(&data[off..off + 6]) {
            report.set_address(address);
        }
        off += 6;
        done += 1;
    }
    if done == num_reports {
        segments += 1;
    }

    // AD payload lengths
    let mut ad_len = vec![0usize; reports.len()];
    done = 0;
    for len in ad_len.iter_mut() {
        if off >= limes {
            break;
        }
        *len = data[off] as usize;
        off += 1;
        done += 1;
    }
    if done == num_reports {
        segments += 1;
    }

    // AD payloads
    done = 0;
    for (i, report) in reports.iter_mut().enumerate() {
        let len = ad_len[i];
        if off + len > limes {
            break;
        }
        if let Err(e) = report.read_data(&data[off..off + len]) {
            warn!("advertising batch: report {i}: {e}");
        }
        off += len;
        done += 1;
    }
    if done == num_reports {
        segments += 1;
    }

    // RSSI
    done = 0;
    for report in reports.iter_mut() {
        if off >= limes {
            break;
        }
        report.set_rssi(data[off] as i8);
        off += 1;
        done += 1;
    }
    if done == num_reports {
        segments += 1;
    }

    if segments != 6 {
        warn!(
            "advertising batch: incomplete, {segments}/6 segments for {num_reports} reports \
             in {limes} octets"
        );
    }
    reports
}

/// UTF-8 string from an AD name element: stops at an embedded NUL, capped
/// at 30 octets.
fn ad_string(buffer: &[u8]) -> String {
    let capped = &buffer[..buffer.len().min(AD_NAME_MAX_LEN)];
    let end = capped.iter().position(|&b| b == 0).unwrap_or(capped.len());
    String::from_utf8_lossy(&capped[..end]).into_owned()
}

fn monotonic_millis() -> u64 {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    EPOCH.get_or_init(Instant::now).elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_element_walk() {
        let data = [0x02, 0x01, 0x06, 0x04, 0x09, b'A', b'B', b'C'];
        let (e1, next) = next_element(&data, 0).unwrap().unwrap();
        assert_eq!(e1.ad_type, AD_FLAGS);
        assert_eq!(e1.data, &[0x06]);
        assert_eq!(next, 3);
        let (e2, next) = next_element(&data, next).unwrap().unwrap();
        assert_eq!(e2.ad_type, AD_NAME_COMPLETE);
        assert_eq!(e2.data, b"ABC");
        assert!(next_element(&data, next).unwrap().is_none());
    }

    #[test]
    fn test_next_element_truncated() {
        // claims 5 octets after the length but only 2 remain
        let data = [0x05, 0x09, b'A'];
        assert!(matches!(
            next_element(&data, 0),
            Err(Error::TruncatedAdElement(0))
        ));
    }

    #[test]
    fn test_zero_length_terminates() {
        let data = [0x00, 0x02, 0x01, 0x06];
        assert!(next_element(&data, 0).unwrap().is_none());
    }

    #[test]
    fn test_read_data_combined() {
        // flags, one 16-bit service UUID, complete name, trailing zero
        let data = [
            0x02, 0x01, 0x06, 0x03, 0x03, 0xAA, 0xBB, 0x04, 0x09, b'A', b'B', b'C', 0x00,
        ];
        let mut report = InfoReport::new(ReportSource::Ad);
        let count = report.read_data(&data).unwrap();
        assert_eq!(count, 3);
        assert_eq!(report.flags(), Some(0x06));
        assert_eq!(report.services(), &[Uuid::Uuid16(0xBBAA)]);
        assert_eq!(report.name(), Some("ABC"));
        assert_eq!(
            report.mask(),
            EirDataMask::FLAGS | EirDataMask::SERVICE_UUID | EirDataMask::NAME
        );
    }

    fn decode_one(element: &[u8]) -> InfoReport {
        let mut report = InfoReport::new(ReportSource::Eir);
        report.read_data(element).unwrap();
        report
    }

    #[test]
    fn test_each_element_type_sets_its_bit() {
        let r = decode_one(&[0x02, 0x01, 0x05]);
        assert_eq!(r.mask(), EirDataMask::FLAGS);
        assert_eq!(r.flags(), Some(0x05));

        let r = decode_one(&[0x05, 0x04, 0x01, 0x02, 0x03, 0x04]);
        assert_eq!(r.mask(), EirDataMask::SERVICE_UUID);
        assert_eq!(r.services(), &[Uuid::Uuid32(0x04030201)]);

        let mut uuid128 = vec![0x11, 0x06];
        uuid128.extend_from_slice(&[0xAB; 16]);
        let r = decode_one(&uuid128);
        assert_eq!(r.mask(), EirDataMask::SERVICE_UUID);
        assert_eq!(r.services(), &[Uuid::Uuid128([0xAB; 16])]);

        let r = decode_one(&[0x03, 0x08, b'h', b'i']);
        assert_eq!(r.mask(), EirDataMask::NAME_SHORT);
        assert_eq!(r.short_name(), Some("hi"));

        let r = decode_one(&[0x02, 0x0A, 0xF4]);
        assert_eq!(r.mask(), EirDataMask::TX_POWER);
        assert_eq!(r.tx_power(), Some(-12));

        let r = decode_one(&[0x04, 0x0D, 0x04, 0x01, 0x7A]);
        assert_eq!(r.mask(), EirDataMask::DEVICE_CLASS);
        assert_eq!(r.device_class(), Some(0x7A0104));

        let r = decode_one(&[0x03, 0x19, 0xC1, 0x03]);
        assert_eq!(r.mask(), EirDataMask::APPEARANCE);
        assert_eq!(r.appearance(), Some(0x03C1));

        let mut hash = vec![0x11, 0x0E];
        hash.extend_from_slice(&[0x42; 16]);
        let r = decode_one(&hash);
        assert_eq!(r.mask(), EirDataMask::HASH);
        assert_eq!(r.hash(), Some(&[0x42; 16]));

        let mut rand = vec![0x11, 0x0F];
        rand.extend_from_slice(&[0x24; 16]);
        let r = decode_one(&rand);
        assert_eq!(r.mask(), EirDataMask::RANDOMIZER);
        assert_eq!(r.randomizer(), Some(&[0x24; 16]));

        let r = decode_one(&[0x05, 0xFF, 0x5E, 0x04, 0xDE, 0xAD]);
        assert_eq!(r.mask(), EirDataMask::MANUF_DATA);
        let msd = r.manufacturer_data().unwrap();
        assert_eq!(msd.company, 0x045E);
        assert_eq!(msd.data, vec![0xDE, 0xAD]);
    }

    #[test]
    fn test_device_id_reads_element_data() {
        // a leading flags element ensures the device-id words differ from
        // the start of the surrounding buffer
        let data = [
            0x02, 0x01, 0x06, // flags
            0x09, 0x10, 0x01, 0x00, 0x5E, 0x04, 0x23, 0x01, 0x02, 0x00, // device id
        ];
        let mut report = InfoReport::new(ReportSource::Eir);
        report.read_data(&data).unwrap();
        assert_eq!(report.device_id(), Some((0x0001, 0x045E, 0x0123, 0x0002)));
        assert_eq!(
            report.modalias().unwrap(),
            "bluetooth:v045Ep0123d0002"
        );
    }

    #[test]
    fn test_service_uuids_deduplicate() {
        let data = [0x05, 0x02, 0xAA, 0xBB, 0xAA, 0xBB, 0x03, 0x03, 0xAA, 0xBB];
        let mut report = InfoReport::new(ReportSource::Ad);
        report.read_data(&data).unwrap();
        assert_eq!(report.services().len(), 1);
    }

    #[test]
    fn test_unknown_type_skipped() {
        let mut report = InfoReport::new(ReportSource::Ad);
        let count = report.read_data(&[0x03, 0x16, 0x0F, 0x18]).unwrap();
        assert_eq!(count, 1);
        assert_eq!(report.mask(), EirDataMask::empty());
    }

    #[test]
    fn test_name_capped_at_30_octets() {
        let mut element = vec![41, 0x09];
        element.extend_from_slice(&[b'x'; 40]);
        let mut report = InfoReport::new(ReportSource::Ad);
        report.read_data(&element).unwrap();
        assert_eq!(report.name().unwrap().len(), 30);
    }

    #[test]
    fn test_ad_reports_batch() {
        // two reports, empty AD payloads
        let data = [
            0x02, // num_reports
            0x00, 0x03, // event types
            0x01, 0x01, // address types
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, // address 1
            0x11, 0x12, 0x13, 0x14, 0x15, 0x16, // address 2
            0x00, 0x00, // ad data lengths
            0xC8, 0xB0, // rssi
        ];
        let reports = read_ad_reports(&data);
        assert_eq!(reports.len(), 2);
        let expected =
            EirDataMask::EVT_TYPE | EirDataMask::BDADDR_TYPE | EirDataMask::BDADDR | EirDataMask::RSSI;
        for report in &reports {
            assert_eq!(report.mask(), expected);
            assert_eq!(report.source(), ReportSource::Ad);
        }
        assert_eq!(reports[0].evt_type(), 0x00);
        assert_eq!(reports[1].evt_type(), 0x03);
        assert_eq!(reports[0].address().to_string(), "06:05:04:03:02:01");
        assert_eq!(reports[0].rssi(), -56);
        assert_eq!(reports[1].rssi(), -80);
    }

    #[test]
    fn test_ad_reports_with_payload() {
        let data = [
            0x01, // num_reports
            0x00, // event type
            0x01, // address type
            0x01, 0x02, 0x03, 0x04, 0x05, 0x06, // address
            0x05, // ad data length
            0x04, 0x09, b'c', b'a', b't', // complete name
            0xC5, // rssi
        ];
        let reports = read_ad_reports(&data);
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name(), Some("cat"));
        assert_eq!(reports[0].rssi(), -59);
    }

    #[test]
    fn test_ad_reports_invalid_count() {
        assert!(read_ad_reports(&[]).is_empty());
        assert!(read_ad_reports(&[0x00, 0x01]).is_empty());
        assert!(read_ad_reports(&[0x1A, 0x01]).is_empty());
    }

    #[test]
    fn test_ad_reports_truncated_batch() {
        // claims two reports but the buffer ends inside the address array
        let data = [0x02, 0x00, 0x03, 0x01, 0x01, 0x01, 0x02, 0x03];
        let reports = read_ad_reports(&data);
        assert_eq!(reports.len(), 2);
        assert!(reports[0].mask().contains(EirDataMask::BDADDR_TYPE));
        assert!(!reports[0].mask().contains(EirDataMask::BDADDR));
    }
}
