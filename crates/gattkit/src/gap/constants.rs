//! GAP assigned numbers

// EIR/AD data element types (GAP assigned numbers)
pub const AD_FLAGS: u8 = 0x01;
pub const AD_UUID16_INCOMPLETE: u8 = 0x02;
pub const AD_UUID16_COMPLETE: u8 = 0x03;
pub const AD_UUID32_INCOMPLETE: u8 = 0x04;
pub const AD_UUID32_COMPLETE: u8 = 0x05;
pub const AD_UUID128_INCOMPLETE: u8 = 0x06;
pub const AD_UUID128_COMPLETE: u8 = 0x07;
pub const AD_NAME_SHORT: u8 = 0x08;
pub const AD_NAME_COMPLETE: u8 = 0x09;
pub const AD_TX_POWER_LEVEL: u8 = 0x0A;
pub const AD_CLASS_OF_DEVICE: u8 = 0x0D;
pub const AD_SSP_HASH_C192: u8 = 0x0E;
pub const AD_SSP_RANDOMIZER_R192: u8 = 0x0F;
pub const AD_DEVICE_ID: u8 = 0x10;
pub const AD_APPEARANCE: u8 = 0x19;
pub const AD_MANUFACTURER_SPECIFIC: u8 = 0xFF;

// Address type values as delivered in advertising reports
pub const BDADDR_BREDR: u8 = 0x00;
pub const BDADDR_LE_PUBLIC: u8 = 0x01;
pub const BDADDR_LE_RANDOM: u8 = 0x02;
pub const BDADDR_UNDEFINED: u8 = 0xFF;

// Local-name elements cap their payload at this many octets
pub const AD_NAME_MAX_LEN: usize = 30;
