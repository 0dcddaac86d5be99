//! Well-known services
//!
//! Reconstructs the Generic Access and Device Information service contents
//! from a discovered attribute tree by looking characteristics up by their
//! assigned-number UUIDs and reading each value.

use crate::att::constants::ATT_CLIENT_MAX_MTU;
use crate::error::Result;
use crate::gatt::handler::GattHandler;
use crate::octets::POctets;
use crate::transport::L2capTransport;
use crate::uuid::Uuid;
use log::debug;

// Generic Access service and its characteristics
pub const GENERIC_ACCESS_SERVICE: u16 = 0x1800;
pub const DEVICE_NAME: u16 = 0x2A00;
pub const APPEARANCE: u16 = 0x2A01;
pub const PERIPHERAL_PREFERRED_CONNECTION_PARAMETERS: u16 = 0x2A04;

// Device Information service and its characteristics
pub const DEVICE_INFORMATION_SERVICE: u16 = 0x180A;
pub const SYSTEM_ID: u16 = 0x2A23;
pub const MODEL_NUMBER_STRING: u16 = 0x2A24;
pub const SERIAL_NUMBER_STRING: u16 = 0x2A25;
pub const FIRMWARE_REVISION_STRING: u16 = 0x2A26;
pub const HARDWARE_REVISION_STRING: u16 = 0x2A27;
pub const SOFTWARE_REVISION_STRING: u16 = 0x2A28;
pub const MANUFACTURER_NAME_STRING: u16 = 0x2A29;
pub const REGULATORY_CERT_DATA_LIST: u16 = 0x2A2A;
pub const PNP_ID: u16 = 0x2A50;

/// Peripheral Preferred Connection Parameters characteristic value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreferredConnectionParameters {
    pub min_conn_interval: u16,
    pub max_conn_interval: u16,
    pub slave_latency: u16,
    pub supervision_timeout: u16,
}

impl PreferredConnectionParameters {
    /// Decode the 8-octet characteristic value.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 8 {
            return None;
        }
        Some(Self {
            min_conn_interval: u16::from_le_bytes([bytes[0], bytes[1]]),
            max_conn_interval: u16::from_le_bytes([bytes[2], bytes[3]]),
            slave_latency: u16::from_le_bytes([bytes[4], bytes[5]]),
            supervision_timeout: u16::from_le_bytes([bytes[6], bytes[7]]),
        })
    }
}

/// PnP ID characteristic value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PnpId {
    pub vendor_id_source: u8,
    pub vendor_id: u16,
    pub product_id: u16,
    pub product_version: u16,
}

impl PnpId {
    /// Decode the 7-octet characteristic value.
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < 7 {
            return None;
        }
        Some(Self {
            vendor_id_source: bytes[0],
            vendor_id: u16::from_le_bytes([bytes[1], bytes[2]]),
            product_id: u16::from_le_bytes([bytes[3], bytes[4]]),
            product_version: u16::from_le_bytes([bytes[5], bytes[6]]),
        })
    }
}

/// Generic Access service contents.
///
/// Considered complete only when both the Device Name and the Preferred
/// Connection Parameters were read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenericAccess {
    pub device_name: String,
    pub appearance: u16,
    pub preferred_params: PreferredConnectionParameters,
}

/// Device Information service contents. Fields the server does not expose
/// stay empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceInformation {
    pub system_id: Vec<u8>,
    pub model_number: String,
    pub serial_number: String,
    pub firmware_revision: String,
    pub hardware_revision: String,
    pub software_revision: String,
    pub manufacturer: String,
    pub regulatory_cert_data: Vec<u8>,
    pub pnp_id: PnpId,
}

impl<T: L2capTransport + 'static> GattHandler<T> {
    /// Read the Generic Access service from the discovered tree.
    pub fn read_generic_access(&mut self) -> Result<Option<GenericAccess>> {
        let services = self.services();
        let mut device_name = String::new();
        let mut appearance = 0u16;
        let mut preferred_params: Option<PreferredConnectionParameters> = None;
        let mut value = POctets::with_capacity(ATT_CLIENT_MAX_MTU as usize);

        for service in &services {
            if service.uuid != Uuid::Uuid16(GENERIC_ACCESS_SERVICE) {
                continue;
            }
            for chr in &service.characteristics {
                value.resize(0)?;
                if chr.uuid == Uuid::Uuid16(DEVICE_NAME) {
                    if self.read_characteristic_value(chr.value_handle, &mut value, None)? {
                        device_name = gatt_name_to_string(value.as_slice());
                    }
                } else if chr.uuid == Uuid::Uuid16(APPEARANCE) {
                    if self.read_characteristic_value(chr.value_handle, &mut value, None)?
                        && value.len() >= 2
                    {
                        appearance = value.get_u16(0)?;
                    }
                } else if chr.uuid == Uuid::Uuid16(PERIPHERAL_PREFERRED_CONNECTION_PARAMETERS)
                    && self.read_characteristic_value(chr.value_handle, &mut value, None)?
                {
                    preferred_params = PreferredConnectionParameters::from_bytes(value.as_slice());
                }
            }
        }

        match preferred_params {
            Some(preferred_params) if !device_name.is_empty() => {
                debug!("generic access: '{device_name}', appearance 0x{appearance:04X}");
                Ok(Some(GenericAccess {
                    device_name,
                    appearance,
                    preferred_params,
                }))
            }
            _ => Ok(None),
        }
    }

    /// Read the Device Information service from the discovered tree.
    /// Present when at least one of its characteristics was found.
    pub fn read_device_information(&mut self) -> Result<Option<DeviceInformation>> {
        let services = self.services();
        let mut info = DeviceInformation::default();
        let mut found = false;
        let mut value = POctets::with_capacity(ATT_CLIENT_MAX_MTU as usize);

        for service in &services {
            if service.uuid != Uuid::Uuid16(DEVICE_INFORMATION_SERVICE) {
                continue;
            }
            for chr in &service.characteristics {
                found = true;
                value.resize(0)?;
                if !self.read_characteristic_value(chr.value_handle, &mut value, None)? {
                    continue;
                }
                let bytes = value.as_slice();
                if chr.uuid == Uuid::Uuid16(SYSTEM_ID) {
                    info.system_id = bytes.to_vec();
                } else if chr.uuid == Uuid::Uuid16(MODEL_NUMBER_STRING) {
                    info.model_number = gatt_name_to_string(bytes);
                } else if chr.uuid == Uuid::Uuid16(SERIAL_NUMBER_STRING) {
                    info.serial_number = gatt_name_to_string(bytes);
                } else if chr.uuid == Uuid::Uuid16(FIRMWARE_REVISION_STRING) {
                    info.firmware_revision = gatt_name_to_string(bytes);
                } else if chr.uuid == Uuid::Uuid16(HARDWARE_REVISION_STRING) {
                    info.hardware_revision = gatt_name_to_string(bytes);
                } else if chr.uuid == Uuid::Uuid16(SOFTWARE_REVISION_STRING) {
                    info.software_revision = gatt_name_to_string(bytes);
                } else if chr.uuid == Uuid::Uuid16(MANUFACTURER_NAME_STRING) {
                    info.manufacturer = gatt_name_to_string(bytes);
                } else if chr.uuid == Uuid::Uuid16(REGULATORY_CERT_DATA_LIST) {
                    info.regulatory_cert_data = bytes.to_vec();
                } else if chr.uuid == Uuid::Uuid16(PNP_ID) {
                    if let Some(pnp_id) = PnpId::from_bytes(bytes) {
                        info.pnp_id = pnp_id;
                    }
                }
            }
        }

        Ok(if found { Some(info) } else { None })
    }
}

/// Decode a GATT UTF-8 string value, stopping at an embedded NUL.
fn gatt_name_to_string(bytes: &[u8]) -> String {
    let end = bytes.iter().position(|&b| b == 0).unwrap_or(bytes.len());
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}
