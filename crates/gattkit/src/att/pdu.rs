//! ATT PDU codec
//!
//! One tagged variant per opcode the client sends or receives. Decoding is
//! a single dispatch on the first octet; opcodes outside the client's set
//! land in [`AttPdu::Unknown`]. The paged responses keep their raw element
//! payload and expose per-element accessors over it, so element extraction
//! happens lazily at the offsets the element length dictates.

use crate::att::constants::*;
use crate::att::error::AttErrorCode;
use crate::error::{Error, Result};
use crate::octets::{Octets, OctetSlice};
use crate::uuid::Uuid;
use byteorder::{ByteOrder, LittleEndian};

/// An ATT protocol data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttPdu {
    ErrorResponse {
        request_opcode: u8,
        handle: u16,
        code: AttErrorCode,
    },
    ExchangeMtuRequest {
        mtu: u16,
    },
    ExchangeMtuResponse {
        mtu: u16,
    },
    FindInformationRequest {
        start_handle: u16,
        end_handle: u16,
    },
    FindInformationResponse(FindInformationResponse),
    ReadByTypeRequest {
        start_handle: u16,
        end_handle: u16,
        attribute_type: Uuid,
    },
    ReadByTypeResponse(ReadByTypeResponse),
    ReadByGroupTypeRequest {
        start_handle: u16,
        end_handle: u16,
        group_type: Uuid,
    },
    ReadByGroupTypeResponse(ReadByGroupTypeResponse),
    ReadRequest {
        handle: u16,
    },
    ReadResponse {
        value: Vec<u8>,
    },
    ReadBlobRequest {
        handle: u16,
        offset: u16,
    },
    ReadBlobResponse {
        value: Vec<u8>,
    },
    WriteRequest {
        handle: u16,
        value: Vec<u8>,
    },
    WriteResponse,
    HandleValueNotification {
        handle: u16,
        value: Vec<u8>,
    },
    HandleValueIndication {
        handle: u16,
        value: Vec<u8>,
    },
    HandleValueConfirmation,
    /// Accepted from the server but not dispatched element-wise.
    MultipleHandleValueNotification {
        payload: Vec<u8>,
    },
    Unknown {
        opcode: u8,
        payload: Vec<u8>,
    },
}

impl AttPdu {
    /// The opcode octet of this PDU.
    pub fn opcode(&self) -> u8 {
        match self {
            AttPdu::ErrorResponse { .. } => ATT_ERROR_RSP,
            AttPdu::ExchangeMtuRequest { .. } => ATT_EXCHANGE_MTU_REQ,
            AttPdu::ExchangeMtuResponse { .. } => ATT_EXCHANGE_MTU_RSP,
            AttPdu::FindInformationRequest { .. } => ATT_FIND_INFO_REQ,
            AttPdu::FindInformationResponse(_) => ATT_FIND_INFO_RSP,
            AttPdu::ReadByTypeRequest { .. } => ATT_READ_BY_TYPE_REQ,
            AttPdu::ReadByTypeResponse(_) => ATT_READ_BY_TYPE_RSP,
            AttPdu::ReadByGroupTypeRequest { .. } => ATT_READ_BY_GROUP_TYPE_REQ,
            AttPdu::ReadByGroupTypeResponse(_) => ATT_READ_BY_GROUP_TYPE_RSP,
            AttPdu::ReadRequest { .. } => ATT_READ_REQ,
            AttPdu::ReadResponse { .. } => ATT_READ_RSP,
            AttPdu::ReadBlobRequest { .. } => ATT_READ_BLOB_REQ,
            AttPdu::ReadBlobResponse { .. } => ATT_READ_BLOB_RSP,
            AttPdu::WriteRequest { .. } => ATT_WRITE_REQ,
            AttPdu::WriteResponse => ATT_WRITE_RSP,
            AttPdu::HandleValueNotification { .. } => ATT_HANDLE_VALUE_NTF,
            AttPdu::HandleValueIndication { .. } => ATT_HANDLE_VALUE_IND,
            AttPdu::HandleValueConfirmation => ATT_HANDLE_VALUE_CONF,
            AttPdu::MultipleHandleValueNotification { .. } => ATT_MULTIPLE_HANDLE_VALUE_NTF,
            AttPdu::Unknown { opcode, .. } => *opcode,
        }
    }

    /// Decode one PDU from its wire form.
    pub fn decode(data: &[u8]) -> Result<AttPdu> {
        if data.is_empty() {
            return Err(malformed("empty ATT PDU"));
        }
        let opcode = data[0];
        let pdu = match opcode {
            ATT_ERROR_RSP => {
                need(data, 5)?;
                AttPdu::ErrorResponse {
                    request_opcode: data[1],
                    handle: LittleEndian::read_u16(&data[2..4]),
                    code: AttErrorCode::from(data[4]),
                }
            }
            ATT_EXCHANGE_MTU_REQ => {
                need(data, 3)?;
                AttPdu::ExchangeMtuRequest {
                    mtu: LittleEndian::read_u16(&data[1..3]),
                }
            }
            ATT_EXCHANGE_MTU_RSP => {
                need(data, 3)?;
                AttPdu::ExchangeMtuResponse {
                    mtu: LittleEndian::read_u16(&data[1..3]),
                }
            }
            ATT_FIND_INFO_REQ => {
                need(data, 5)?;
                AttPdu::FindInformationRequest {
                    start_handle: LittleEndian::read_u16(&data[1..3]),
                    end_handle: LittleEndian::read_u16(&data[3..5]),
                }
            }
            ATT_FIND_INFO_RSP => {
                need(data, 2)?;
                AttPdu::FindInformationResponse(FindInformationResponse::new(
                    data[1],
                    data[2..].to_vec(),
                )?)
            }
            ATT_READ_BY_TYPE_REQ | ATT_READ_BY_GROUP_TYPE_REQ => {
                need(data, 7)?;
                let start_handle = LittleEndian::read_u16(&data[1..3]);
                let end_handle = LittleEndian::read_u16(&data[3..5]);
                let uuid = match data.len() {
                    7 => Uuid::from_bytes(&data[5..7])?,
                    21 => Uuid::from_bytes(&data[5..21])?,
                    _ => return Err(malformed("read-by-type request UUID")),
                };
                if opcode == ATT_READ_BY_TYPE_REQ {
                    AttPdu::ReadByTypeRequest {
                        start_handle,
                        end_handle,
                        attribute_type: uuid,
                    }
                } else {
                    AttPdu::ReadByGroupTypeRequest {
                        start_handle,
                        end_handle,
                        group_type: uuid,
                    }
                }
            }
            ATT_READ_BY_TYPE_RSP => {
                need(data, 2)?;
                AttPdu::ReadByTypeResponse(ReadByTypeResponse::new(
                    data[1] as usize,
                    data[2..].to_vec(),
                )?)
            }
            ATT_READ_BY_GROUP_TYPE_RSP => {
                need(data, 2)?;
                AttPdu::ReadByGroupTypeResponse(ReadByGroupTypeResponse::new(
                    data[1] as usize,
                    data[2..].to_vec(),
                )?)
            }
            ATT_READ_REQ => {
                need(data, 3)?;
                AttPdu::ReadRequest {
                    handle: LittleEndian::read_u16(&data[1..3]),
                }
            }
            ATT_READ_RSP => AttPdu::ReadResponse {
                value: data[1..].to_vec(),
            },
            ATT_READ_BLOB_REQ => {
                need(data, 5)?;
                AttPdu::ReadBlobRequest {
                    handle: LittleEndian::read_u16(&data[1..3]),
                    offset: LittleEndian::read_u16(&data[3..5]),
                }
            }
            ATT_READ_BLOB_RSP => AttPdu::ReadBlobResponse {
                value: data[1..].to_vec(),
            },
            ATT_WRITE_REQ => {
                need(data, 3)?;
                AttPdu::WriteRequest {
                    handle: LittleEndian::read_u16(&data[1..3]),
                    value: data[3..].to_vec(),
                }
            }
            ATT_WRITE_RSP => AttPdu::WriteResponse,
            ATT_HANDLE_VALUE_NTF => {
                need(data, 3)?;
                AttPdu::HandleValueNotification {
                    handle: LittleEndian::read_u16(&data[1..3]),
                    value: data[3..].to_vec(),
                }
            }
            ATT_HANDLE_VALUE_IND => {
                need(data, 3)?;
                AttPdu::HandleValueIndication {
                    handle: LittleEndian::read_u16(&data[1..3]),
                    value: data[3..].to_vec(),
                }
            }
            ATT_HANDLE_VALUE_CONF => AttPdu::HandleValueConfirmation,
            ATT_MULTIPLE_HANDLE_VALUE_NTF => AttPdu::MultipleHandleValueNotification {
                payload: data[1..].to_vec(),
            },
            _ => AttPdu::Unknown {
                opcode,
                payload: data[1..].to_vec(),
            },
        };
        Ok(pdu)
    }

    /// Encode this PDU to its wire form.
    pub fn encode(&self) -> Vec<u8> {
        match self {
            AttPdu::ErrorResponse {
                request_opcode,
                handle,
                code,
            } => {
                let mut out = Vec::with_capacity(5);
                out.push(ATT_ERROR_RSP);
                out.push(*request_opcode);
                out.extend_from_slice(&handle.to_le_bytes());
                out.push(u8::from(*code));
                out
            }
            AttPdu::ExchangeMtuRequest { mtu } => encode_u16(ATT_EXCHANGE_MTU_REQ, *mtu),
            AttPdu::ExchangeMtuResponse { mtu } => encode_u16(ATT_EXCHANGE_MTU_RSP, *mtu),
            AttPdu::FindInformationRequest {
                start_handle,
                end_handle,
            } => encode_range(ATT_FIND_INFO_REQ, *start_handle, *end_handle),
            AttPdu::FindInformationResponse(rsp) => {
                let mut out = Vec::with_capacity(2 + rsp.data.len());
                out.push(ATT_FIND_INFO_RSP);
                out.push(rsp.format);
                out.extend_from_slice(rsp.data.as_slice());
                out
            }
            AttPdu::ReadByTypeRequest {
                start_handle,
                end_handle,
                attribute_type,
            } => encode_typed_range(ATT_READ_BY_TYPE_REQ, *start_handle, *end_handle, attribute_type),
            AttPdu::ReadByTypeResponse(rsp) => {
                let mut out = Vec::with_capacity(2 + rsp.data.len());
                out.push(ATT_READ_BY_TYPE_RSP);
                out.push(rsp.element_length as u8);
                out.extend_from_slice(rsp.data.as_slice());
                out
            }
            AttPdu::ReadByGroupTypeRequest {
                start_handle,
                end_handle,
                group_type,
            } => encode_typed_range(
                ATT_READ_BY_GROUP_TYPE_REQ,
                *start_handle,
                *end_handle,
                group_type,
            ),
            AttPdu::ReadByGroupTypeResponse(rsp) => {
                let mut out = Vec::with_capacity(2 + rsp.data.len());
                out.push(ATT_READ_BY_GROUP_TYPE_RSP);
                out.push(rsp.element_length as u8);
                out.extend_from_slice(rsp.data.as_slice());
                out
            }
            AttPdu::ReadRequest { handle } => encode_u16(ATT_READ_REQ, *handle),
            AttPdu::ReadResponse { value } => encode_value(ATT_READ_RSP, value),
            AttPdu::ReadBlobRequest { handle, offset } => {
                encode_range(ATT_READ_BLOB_REQ, *handle, *offset)
            }
            AttPdu::ReadBlobResponse { value } => encode_value(ATT_READ_BLOB_RSP, value),
            AttPdu::WriteRequest { handle, value } => {
                let mut out = Vec::with_capacity(3 + value.len());
                out.push(ATT_WRITE_REQ);
                out.extend_from_slice(&handle.to_le_bytes());
                out.extend_from_slice(value);
                out
            }
            AttPdu::WriteResponse => vec![ATT_WRITE_RSP],
            AttPdu::HandleValueNotification { handle, value } => {
                let mut out = Vec::with_capacity(3 + value.len());
                out.push(ATT_HANDLE_VALUE_NTF);
                out.extend_from_slice(&handle.to_le_bytes());
                out.extend_from_slice(value);
                out
            }
            AttPdu::HandleValueIndication { handle, value } => {
                let mut out = Vec::with_capacity(3 + value.len());
                out.push(ATT_HANDLE_VALUE_IND);
                out.extend_from_slice(&handle.to_le_bytes());
                out.extend_from_slice(value);
                out
            }
            AttPdu::HandleValueConfirmation => vec![ATT_HANDLE_VALUE_CONF],
            AttPdu::MultipleHandleValueNotification { payload } => {
                encode_value(ATT_MULTIPLE_HANDLE_VALUE_NTF, payload)
            }
            AttPdu::Unknown { opcode, payload } => encode_value(*opcode, payload),
        }
    }
}

/// Element list of an `ATT_READ_BY_GROUP_TYPE_RSP`.
///
/// Each element is `start_handle (2) | end_handle (2) | uuid (len - 4)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByGroupTypeResponse {
    element_length: usize,
    data: Octets,
}

impl ReadByGroupTypeResponse {
    pub fn new(element_length: usize, data: Vec<u8>) -> Result<Self> {
        if element_length != 6 && element_length != 20 {
            return Err(malformed("read-by-group-type element length"));
        }
        Ok(Self {
            element_length,
            data: Octets::from_vec(data),
        })
    }

    pub fn element_length(&self) -> usize {
        self.element_length
    }

    pub fn element_count(&self) -> usize {
        self.data.len() / self.element_length
    }

    pub fn start_handle(&self, i: usize) -> Result<u16> {
        self.data.get_u16(i * self.element_length)
    }

    pub fn end_handle(&self, i: usize) -> Result<u16> {
        self.data.get_u16(i * self.element_length + 2)
    }

    pub fn uuid(&self, i: usize) -> Result<Uuid> {
        self.data
            .get_uuid(i * self.element_length + 4, self.element_length - 4)
    }
}

/// Element list of an `ATT_READ_BY_TYPE_RSP`.
///
/// Each element is `handle (2) | value (len - 2)`; the value layout depends
/// on the requested attribute type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadByTypeResponse {
    element_length: usize,
    data: Octets,
}

impl ReadByTypeResponse {
    pub fn new(element_length: usize, data: Vec<u8>) -> Result<Self> {
        if element_length < 2 {
            return Err(malformed("read-by-type element length"));
        }
        Ok(Self {
            element_length,
            data: Octets::from_vec(data),
        })
    }

    pub fn element_length(&self) -> usize {
        self.element_length
    }

    pub fn element_count(&self) -> usize {
        self.data.len() / self.element_length
    }

    pub fn handle(&self, i: usize) -> Result<u16> {
        self.data.get_u16(i * self.element_length)
    }

    pub fn value(&self, i: usize) -> Result<OctetSlice<'_>> {
        self.data
            .slice(i * self.element_length + 2, self.element_length - 2)
    }
}

/// Element list of an `ATT_FIND_INFORMATION_RSP`.
///
/// The format octet selects the UUID width of every pair: `0x01` for
/// 16-bit, `0x02` for 128-bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FindInformationResponse {
    format: u8,
    data: Octets,
}

impl FindInformationResponse {
    pub fn new(format: u8, data: Vec<u8>) -> Result<Self> {
        if format != ATT_FIND_INFO_RSP_FORMAT_16BIT && format != ATT_FIND_INFO_RSP_FORMAT_128BIT {
            return Err(malformed("find-information format"));
        }
        Ok(Self {
            format,
            data: Octets::from_vec(data),
        })
    }

    pub fn format(&self) -> u8 {
        self.format
    }

    fn pair_size(&self) -> usize {
        if self.format == ATT_FIND_INFO_RSP_FORMAT_16BIT {
            4
        } else {
            18
        }
    }

    pub fn element_count(&self) -> usize {
        self.data.len() / self.pair_size()
    }

    pub fn handle(&self, i: usize) -> Result<u16> {
        self.data.get_u16(i * self.pair_size())
    }

    pub fn uuid(&self, i: usize) -> Result<Uuid> {
        self.data
            .get_uuid(i * self.pair_size() + 2, self.pair_size() - 2)
    }
}

fn need(data: &[u8], min: usize) -> Result<()> {
    if data.len() < min {
        Err(malformed("short ATT PDU"))
    } else {
        Ok(())
    }
}

fn malformed(what: &str) -> Error {
    Error::InvalidArgument(format!("malformed PDU: {what}"))
}

fn encode_u16(opcode: u8, v: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(3);
    out.push(opcode);
    out.extend_from_slice(&v.to_le_bytes());
    out
}

fn encode_range(opcode: u8, a: u16, b: u16) -> Vec<u8> {
    let mut out = Vec::with_capacity(5);
    out.push(opcode);
    out.extend_from_slice(&a.to_le_bytes());
    out.extend_from_slice(&b.to_le_bytes());
    out
}

fn encode_typed_range(opcode: u8, start: u16, end: u16, uuid: &Uuid) -> Vec<u8> {
    let mut out = encode_range(opcode, start, end);
    // 16-bit types go out short; everything else as the 128-bit expansion
    match uuid {
        Uuid::Uuid16(v) => out.extend_from_slice(&v.to_le_bytes()),
        other => out.extend_from_slice(&other.to_uuid128()),
    }
    out
}

fn encode_value(opcode: u8, value: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + value.len());
    out.push(opcode);
    out.extend_from_slice(value);
    out
}
