//! GATT client handler
//!
//! One `GattHandler` owns one ATT bearer: the L2CAP transport, the reader
//! task demultiplexing inbound PDUs, the response queue, and the discovered
//! service tree. The calling task (the issuer) holds at most one
//! outstanding request at a time, so the next queued non-notification PDU
//! is always the response to the most recent request.

use crate::att::constants::*;
use crate::att::error::AttErrorCode;
use crate::att::pdu::AttPdu;
use crate::att::queue::PduQueue;
use crate::error::{Error, Result};
use crate::gatt::types::{
    Characteristic, CharacteristicProperty, CharacteristicRef, ClientCharacteristicConfig,
    Descriptor, Service,
};
use crate::octets::POctets;
use crate::transport::{L2capTransport, TransportError, TransportState};
use crate::uuid::Uuid;
use log::{debug, info, warn};
use std::sync::atomic::{AtomicBool, AtomicU16, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::thread;

/// How long the reader blocks in one transport poll. Bounds how quickly a
/// stop request is noticed; not an ATT procedure timeout.
pub const READER_POLL_TIMEOUT_MS: u32 = 500;

/// Capacity of the reader-to-issuer response queue.
pub const RESPONSE_QUEUE_CAPACITY: usize = 128;

/// Defines the connection state of a GATT handler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

/// Tunables for the reader task.
#[derive(Debug, Clone, Copy)]
pub struct ReaderConfig {
    pub poll_timeout_ms: u32,
    pub queue_capacity: usize,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            poll_timeout_ms: READER_POLL_TIMEOUT_MS,
            queue_capacity: RESPONSE_QUEUE_CAPACITY,
        }
    }
}

/// Callback for server-initiated notifications.
///
/// Runs on the reader task. The first argument is the characteristic's
/// position in the discovered tree, when the handle is known there.
/// Listeners must not issue new requests synchronously: the response could
/// never be dequeued while the reader is inside the listener, so doing so
/// deadlocks.
pub type NotificationListener = Box<dyn FnMut(Option<CharacteristicRef>, u16, &[u8]) + Send>;

/// Callback for server-initiated indications. The final argument reports
/// whether the confirmation was already sent. Same reader-task rules as
/// [`NotificationListener`].
pub type IndicationListener = Box<dyn FnMut(Option<CharacteristicRef>, u16, &[u8], bool) + Send>;

/// State shared between the issuer and the reader task.
struct Shared<T: L2capTransport> {
    transport: T,
    state: RwLock<HandlerState>,
    used_mtu: AtomicU16,
    stop: AtomicBool,
    send_confirmation: AtomicBool,
    services: RwLock<Vec<Service>>,
    notification_listener: Mutex<Option<NotificationListener>>,
    indication_listener: Mutex<Option<IndicationListener>>,
    config: ReaderConfig,
}

impl<T: L2capTransport> Shared<T> {
    fn state(&self) -> HandlerState {
        *self.state.read().unwrap()
    }

    fn set_state(&self, state: HandlerState) {
        *self.state.write().unwrap() = state;
    }
}

/// A client for one ATT bearer to a GATT server.
pub struct GattHandler<T: L2capTransport + 'static> {
    shared: Arc<Shared<T>>,
    queue: Arc<PduQueue>,
    server_mtu: u16,
    reader: Option<thread::JoinHandle<()>>,
}

impl<T: L2capTransport + 'static> GattHandler<T> {
    /// Create a handler bound to a transport. No I/O happens until
    /// [`connect`](Self::connect).
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, ReaderConfig::default())
    }

    pub fn with_config(transport: T, config: ReaderConfig) -> Self {
        Self {
            shared: Arc::new(Shared {
                transport,
                state: RwLock::new(HandlerState::Disconnected),
                used_mtu: AtomicU16::new(ATT_DEFAULT_MTU),
                stop: AtomicBool::new(false),
                send_confirmation: AtomicBool::new(false),
                services: RwLock::new(Vec::new()),
                notification_listener: Mutex::new(None),
                indication_listener: Mutex::new(None),
                config,
            }),
            queue: Arc::new(PduQueue::new(config.queue_capacity)),
            server_mtu: ATT_DEFAULT_MTU,
            reader: None,
        }
    }

    pub fn state(&self) -> HandlerState {
        self.shared.state()
    }

    /// The negotiated MTU: `min(client max, server reply)`, at least 23.
    pub fn used_mtu(&self) -> u16 {
        self.shared.used_mtu.load(Ordering::SeqCst)
    }

    /// Snapshot of the discovered service tree.
    pub fn services(&self) -> Vec<Service> {
        self.shared.services.read().unwrap().clone()
    }

    pub fn characteristic(&self, r: CharacteristicRef) -> Option<Characteristic> {
        self.shared
            .services
            .read()
            .unwrap()
            .get(r.service)
            .and_then(|s| s.characteristics.get(r.characteristic))
            .cloned()
    }

    /// Locate a characteristic by its value handle.
    pub fn find_characteristic(&self, value_handle: u16) -> Option<CharacteristicRef> {
        find_characteristic(&self.shared.services.read().unwrap(), value_handle)
    }

    pub fn set_notification_listener<F>(&self, listener: F)
    where
        F: FnMut(Option<CharacteristicRef>, u16, &[u8]) + Send + 'static,
    {
        *self.shared.notification_listener.lock().unwrap() = Some(Box::new(listener));
    }

    /// Install the indication listener. With `send_confirmation` set, the
    /// reader emits the `ATT_HANDLE_VALUE_CONF` before invoking the
    /// listener.
    pub fn set_indication_listener<F>(&self, listener: F, send_confirmation: bool)
    where
        F: FnMut(Option<CharacteristicRef>, u16, &[u8], bool) + Send + 'static,
    {
        *self.shared.indication_listener.lock().unwrap() = Some(Box::new(listener));
        self.shared
            .send_confirmation
            .store(send_confirmation, Ordering::SeqCst);
    }

    /// Open the transport, start the reader task and negotiate the MTU.
    ///
    /// A handler in the `Error` state must be `disconnect`ed first.
    pub fn connect(&mut self) -> Result<()> {
        match self.shared.state() {
            HandlerState::Connected | HandlerState::Connecting => return Ok(()),
            HandlerState::Error => return Err(Error::InvalidState),
            HandlerState::Disconnected => {}
        }
        self.shared.set_state(HandlerState::Connecting);
        match self.shared.transport.connect() {
            Ok(TransportState::Connected) => {}
            Ok(_) => {
                self.shared.set_state(HandlerState::Disconnected);
                return Err(Error::Transport(TransportError::NotOpen));
            }
            Err(e) => {
                self.shared.set_state(HandlerState::Disconnected);
                return Err(e.into());
            }
        }

        self.shared.stop.store(false, Ordering::SeqCst);
        self.shared.used_mtu.store(ATT_DEFAULT_MTU, Ordering::SeqCst);
        self.server_mtu = ATT_DEFAULT_MTU;
        self.queue = Arc::new(PduQueue::new(self.shared.config.queue_capacity));

        let shared = self.shared.clone();
        let queue = self.queue.clone();
        let reader = thread::Builder::new()
            .name("gatt-reader".into())
            .spawn(move || reader_loop(shared, queue))
            .map_err(|e| Error::Transport(TransportError::Io(e)))?;
        self.reader = Some(reader);
        self.shared.set_state(HandlerState::Connected);

        self.exchange_mtu()
    }

    /// Stop the reader, close the transport and cancel any queue waiter.
    /// Idempotent.
    pub fn disconnect(&mut self) -> Result<()> {
        self.shared.stop.store(true, Ordering::SeqCst);
        self.shared.transport.disconnect();
        self.queue.close();
        if let Some(reader) = self.reader.take() {
            debug!("disconnect: joining reader task");
            let _ = reader.join();
        }
        self.shared.set_state(HandlerState::Disconnected);
        Ok(())
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.shared.state() == HandlerState::Connected {
            Ok(())
        } else {
            Err(Error::InvalidState)
        }
    }

    /// Encode and transmit one PDU, enforcing the MTU bound. A write
    /// failure is fatal for the bearer.
    fn send(&self, pdu: &AttPdu) -> Result<()> {
        if self.shared.state() != HandlerState::Connected {
            return Err(Error::InvalidState);
        }
        let bytes = pdu.encode();
        let used = self.used_mtu() as usize;
        if bytes.len() > used {
            return Err(Error::InvalidArgument(format!(
                "PDU size {} exceeds negotiated MTU {used}",
                bytes.len()
            )));
        }
        match self.shared.transport.write(&bytes) {
            Ok(n) if n == bytes.len() => Ok(()),
            Ok(n) => {
                self.shared.set_state(HandlerState::Error);
                Err(Error::Transport(TransportError::ShortWrite {
                    written: n,
                    expected: bytes.len(),
                }))
            }
            Err(e) => {
                self.shared.set_state(HandlerState::Error);
                Err(e.into())
            }
        }
    }

    fn receive_next(&self) -> Result<AttPdu> {
        self.queue.get_blocking()
    }

    /// BT Core Spec v5.2: Vol 3, Part G GATT: 4.3.1 Exchange MTU.
    /// Runs exactly once, right after connect.
    fn exchange_mtu(&mut self) -> Result<()> {
        self.send(&AttPdu::ExchangeMtuRequest {
            mtu: ATT_CLIENT_MAX_MTU,
        })?;
        match self.receive_next()? {
            AttPdu::ExchangeMtuResponse { mtu } => {
                if mtu == 0 {
                    warn!("ignoring zero server MTU");
                } else if mtu < ATT_DEFAULT_MTU {
                    warn!("ignoring server MTU {mtu} below ATT default");
                } else {
                    self.server_mtu = mtu.min(ATT_CLIENT_MAX_MTU);
                }
            }
            other => {
                warn!(
                    "MTU exchange: unexpected reply opcode 0x{:02X}",
                    other.opcode()
                );
            }
        }
        let used = ATT_CLIENT_MAX_MTU.min(self.server_mtu);
        self.shared.used_mtu.store(used, Ordering::SeqCst);
        debug!("MTU negotiated: server {}, using {used}", self.server_mtu);
        Ok(())
    }

    /// BT Core Spec v5.2: Vol 3, Part G GATT: 4.4.1 Discover All Primary
    /// Services. Returns the number of services found; the tree is replaced.
    pub fn discover_primary_services(&mut self) -> Result<usize> {
        self.ensure_connected()?;
        let mut result: Vec<Service> = Vec::new();
        let mut start_handle = ATT_HANDLE_MIN;
        loop {
            self.send(&AttPdu::ReadByGroupTypeRequest {
                start_handle,
                end_handle: ATT_HANDLE_MAX,
                group_type: Uuid::Uuid16(PRIMARY_SERVICE_UUID),
            })?;
            match self.receive_next()? {
                AttPdu::ReadByGroupTypeResponse(rsp) => {
                    let count = rsp.element_count();
                    if count == 0 {
                        // an empty page also ends the procedure
                        break;
                    }
                    for i in 0..count {
                        let service = Service {
                            uuid: rsp.uuid(i)?,
                            start_handle: rsp.start_handle(i)?,
                            end_handle: rsp.end_handle(i)?,
                            characteristics: Vec::new(),
                        };
                        debug!(
                            "primary service {}: 0x{:04X}..0x{:04X}",
                            service.uuid, service.start_handle, service.end_handle
                        );
                        result.push(service);
                    }
                    let last_end = rsp.end_handle(count - 1)?;
                    if last_end == ATT_HANDLE_MAX {
                        break;
                    }
                    start_handle = last_end + 1;
                }
                AttPdu::ErrorResponse {
                    code: AttErrorCode::AttributeNotFound,
                    ..
                } => break,
                AttPdu::ErrorResponse { code, handle, .. } => {
                    return Err(Error::Att { code, handle })
                }
                other => {
                    warn!(
                        "primary service discovery: unexpected reply opcode 0x{:02X}",
                        other.opcode()
                    );
                    return Err(Error::Protocol(other.opcode()));
                }
            }
        }
        let count = result.len();
        *self.shared.services.write().unwrap() = result;
        Ok(count)
    }

    /// BT Core Spec v5.2: Vol 3, Part G GATT: 4.6.1 Discover All
    /// Characteristics of a Service. Returns the number found.
    pub fn discover_characteristics(&mut self, service_index: usize) -> Result<usize> {
        self.ensure_connected()?;
        let (svc_uuid, svc_start, svc_end) = self.service_bounds(service_index)?;
        let mut found: Vec<Characteristic> = Vec::new();
        let mut handle = svc_start;
        loop {
            self.send(&AttPdu::ReadByTypeRequest {
                start_handle: handle,
                end_handle: svc_end,
                attribute_type: Uuid::Uuid16(CHARACTERISTIC_UUID),
            })?;
            match self.receive_next()? {
                AttPdu::ReadByTypeResponse(rsp) => {
                    let count = rsp.element_count();
                    if count == 0 {
                        break;
                    }
                    for i in 0..count {
                        // value: properties (1) | value handle (2) | uuid
                        let declaration_handle = rsp.handle(i)?;
                        let value = rsp.value(i)?;
                        let characteristic = Characteristic {
                            service_uuid: svc_uuid,
                            service_handle: svc_start,
                            service_handle_end: svc_end,
                            declaration_handle,
                            value_handle: value.get_u16(1)?,
                            properties: CharacteristicProperty::from_bits_truncate(
                                value.get_u8(0)?,
                            ),
                            uuid: value.get_uuid(3, value.len() - 3)?,
                            config: None,
                        };
                        debug!(
                            "characteristic {}: decl 0x{:04X}, value 0x{:04X}",
                            characteristic.uuid,
                            characteristic.declaration_handle,
                            characteristic.value_handle
                        );
                        found.push(characteristic);
                    }
                    let last = rsp.handle(count - 1)?;
                    if last < svc_end {
                        handle = last + 1;
                    } else {
                        break;
                    }
                }
                AttPdu::ErrorResponse {
                    code: AttErrorCode::AttributeNotFound,
                    ..
                } => break,
                AttPdu::ErrorResponse { code, handle, .. } => {
                    return Err(Error::Att { code, handle })
                }
                other => {
                    warn!(
                        "characteristic discovery: unexpected reply opcode 0x{:02X}",
                        other.opcode()
                    );
                    return Err(Error::Protocol(other.opcode()));
                }
            }
        }
        let count = found.len();
        self.shared.services.write().unwrap()[service_index].characteristics = found;
        Ok(count)
    }

    /// Discover the Client Characteristic Configuration descriptors of a
    /// service and attach each to the characteristic whose value handle
    /// precedes it. Returns the number of descriptors associated.
    pub fn discover_client_config(&mut self, service_index: usize) -> Result<usize> {
        self.ensure_connected()?;
        let (_, svc_start, svc_end) = self.service_bounds(service_index)?;
        let mut configs: Vec<(u16, u16)> = Vec::new();
        let mut handle = svc_start;
        loop {
            self.send(&AttPdu::ReadByTypeRequest {
                start_handle: handle,
                end_handle: svc_end,
                attribute_type: Uuid::Uuid16(CLIENT_CHAR_CONFIG_UUID),
            })?;
            match self.receive_next()? {
                AttPdu::ReadByTypeResponse(rsp) => {
                    let count = rsp.element_count();
                    if count == 0 {
                        break;
                    }
                    if rsp.element_length() != 4 {
                        warn!(
                            "client config discovery: unexpected element size {}",
                            rsp.element_length()
                        );
                        break;
                    }
                    for i in 0..count {
                        configs.push((rsp.handle(i)?, rsp.value(i)?.get_u16(0)?));
                    }
                    let last = rsp.handle(count - 1)?;
                    if last < svc_end {
                        handle = last + 1;
                    } else {
                        break;
                    }
                }
                AttPdu::ErrorResponse {
                    code: AttErrorCode::AttributeNotFound,
                    ..
                } => break,
                AttPdu::ErrorResponse { code, handle, .. } => {
                    return Err(Error::Att { code, handle })
                }
                other => {
                    warn!(
                        "client config discovery: unexpected reply opcode 0x{:02X}",
                        other.opcode()
                    );
                    return Err(Error::Protocol(other.opcode()));
                }
            }
        }

        let mut services = self.shared.services.write().unwrap();
        let service = &mut services[service_index];
        let mut associated = 0;
        for (config_handle, config_value) in configs {
            let len = service.characteristics.len();
            for j in 0..len {
                let upper = if j + 1 < len {
                    service.characteristics[j + 1].value_handle
                } else {
                    service.characteristics[j].service_handle_end
                };
                let chr = &mut service.characteristics[j];
                if config_handle > chr.value_handle && config_handle <= upper {
                    chr.config = Some(ClientCharacteristicConfig {
                        handle: config_handle,
                        value: config_value,
                    });
                    associated += 1;
                }
            }
        }
        Ok(associated)
    }

    /// BT Core Spec v5.2: Vol 3, Part G GATT: 4.7.1 Discover All
    /// Characteristic Descriptors, over `[value_handle + 1, service end]`.
    pub fn discover_descriptors(
        &mut self,
        service_index: usize,
        char_index: usize,
    ) -> Result<Vec<Descriptor>> {
        self.ensure_connected()?;
        let (value_handle, svc_end) = {
            let services = self.shared.services.read().unwrap();
            let chr = services
                .get(service_index)
                .and_then(|s| s.characteristics.get(char_index))
                .ok_or_else(|| {
                    Error::InvalidArgument(format!(
                        "no characteristic at {service_index}/{char_index}"
                    ))
                })?;
            (chr.value_handle, chr.service_handle_end)
        };
        let mut result = Vec::new();
        if value_handle >= svc_end {
            return Ok(result);
        }
        let mut handle = value_handle + 1;
        loop {
            self.send(&AttPdu::FindInformationRequest {
                start_handle: handle,
                end_handle: svc_end,
            })?;
            match self.receive_next()? {
                AttPdu::FindInformationResponse(rsp) => {
                    let count = rsp.element_count();
                    if count == 0 {
                        break;
                    }
                    for i in 0..count {
                        result.push(Descriptor {
                            handle: rsp.handle(i)?,
                            uuid: rsp.uuid(i)?,
                        });
                    }
                    let last = rsp.handle(count - 1)?;
                    if last < svc_end {
                        handle = last + 1;
                    } else {
                        break;
                    }
                }
                AttPdu::ErrorResponse {
                    code: AttErrorCode::AttributeNotFound,
                    ..
                } => break,
                AttPdu::ErrorResponse { code, handle, .. } => {
                    return Err(Error::Att { code, handle })
                }
                other => {
                    warn!(
                        "descriptor discovery: unexpected reply opcode 0x{:02X}",
                        other.opcode()
                    );
                    return Err(Error::Protocol(other.opcode()));
                }
            }
        }
        Ok(result)
    }

    /// Discover primary services, then each service's characteristics and
    /// client configuration descriptors. Returns the service count.
    pub fn discover_all(&mut self) -> Result<usize> {
        let count = self.discover_primary_services()?;
        for i in 0..count {
            if self.discover_characteristics(i)? > 0 {
                self.discover_client_config(i)?;
            }
        }
        Ok(count)
    }

    /// BT Core Spec v5.2: Vol 3, Part G GATT: 4.8.1 Read Characteristic
    /// Value and 4.8.3 Read Long Characteristic Value.
    ///
    /// `expected_length` selects the termination mode: `Some(0)` stops
    /// after the first response, `Some(n)` stops once `n` octets arrived,
    /// `None` reads until the server has no more data. Returns whether any
    /// octets were read.
    pub fn read_characteristic_value(
        &mut self,
        handle: u16,
        out: &mut POctets,
        expected_length: Option<usize>,
    ) -> Result<bool> {
        self.ensure_connected()?;
        let max_value = self.used_mtu() as usize - 1;
        let mut offset: usize = 0;
        loop {
            match expected_length {
                Some(0) if offset > 0 => break,
                Some(n) if n > 0 && offset >= n => break,
                _ => {}
            }
            if offset > u16::MAX as usize {
                break;
            }
            if offset == 0 {
                self.send(&AttPdu::ReadRequest { handle })?;
            } else {
                self.send(&AttPdu::ReadBlobRequest {
                    handle,
                    offset: offset as u16,
                })?;
            }
            match self.receive_next()? {
                AttPdu::ReadResponse { value } => {
                    out.append(&value)?;
                    offset += value.len();
                    if value.len() < max_value {
                        break;
                    }
                }
                AttPdu::ReadBlobResponse { value } => {
                    if value.is_empty() {
                        break;
                    }
                    out.append(&value)?;
                    offset += value.len();
                    if value.len() < max_value {
                        break;
                    }
                }
                AttPdu::ErrorResponse {
                    code: AttErrorCode::AttributeNotLong,
                    ..
                } => {
                    // a value no longer than MTU - 1 answers the first
                    // blob request this way
                    break;
                }
                AttPdu::ErrorResponse { code, handle, .. } => {
                    return Err(Error::Att { code, handle })
                }
                other => {
                    warn!(
                        "characteristic read: unexpected reply opcode 0x{:02X}",
                        other.opcode()
                    );
                    return Err(Error::Protocol(other.opcode()));
                }
            }
        }
        Ok(offset > 0)
    }

    /// BT Core Spec v5.2: Vol 3, Part G GATT: 4.9.3 Write Characteristic
    /// Value.
    pub fn write_characteristic_value(&mut self, handle: u16, value: &[u8]) -> Result<()> {
        self.ensure_connected()?;
        self.send(&AttPdu::WriteRequest {
            handle,
            value: value.to_vec(),
        })?;
        match self.receive_next()? {
            AttPdu::WriteResponse => Ok(()),
            AttPdu::ErrorResponse { code, handle, .. } => Err(Error::Att { code, handle }),
            other => {
                warn!(
                    "characteristic write: unexpected reply opcode 0x{:02X}",
                    other.opcode()
                );
                Err(Error::Protocol(other.opcode()))
            }
        }
    }

    /// BT Core Spec v5.2: Vol 3, Part G GATT: 3.3.3.3 Client Characteristic
    /// Configuration: write the notify/indicate enable bits to a CCCD.
    pub fn configure_notification_indication(
        &mut self,
        cccd_handle: u16,
        enable_notification: bool,
        enable_indication: bool,
    ) -> Result<()> {
        let value = (enable_notification as u16) | ((enable_indication as u16) << 1);
        debug!("CCCD 0x{cccd_handle:04X} := 0x{value:04X}");
        self.write_characteristic_value(cccd_handle, &value.to_le_bytes())
    }

    fn service_bounds(&self, service_index: usize) -> Result<(Uuid, u16, u16)> {
        let services = self.shared.services.read().unwrap();
        let svc = services.get(service_index).ok_or_else(|| {
            Error::InvalidArgument(format!("no service at index {service_index}"))
        })?;
        Ok((svc.uuid, svc.start_handle, svc.end_handle))
    }
}

impl<T: L2capTransport + 'static> Drop for GattHandler<T> {
    fn drop(&mut self) {
        let _ = self.disconnect();
    }
}

/// The reader task: demultiplexes inbound PDUs into listener dispatch
/// (notifications, indications) and the response queue (everything else).
fn reader_loop<T: L2capTransport>(shared: Arc<Shared<T>>, queue: Arc<PduQueue>) {
    debug!("reader task started");
    let mut buf = vec![0u8; ATT_CLIENT_MAX_MTU as usize];
    while !shared.stop.load(Ordering::SeqCst) {
        let used = shared.used_mtu.load(Ordering::SeqCst) as usize;
        let len = match shared
            .transport
            .read(&mut buf[..used], shared.config.poll_timeout_ms)
        {
            Ok(0) => continue, // poll timeout
            Ok(len) => len,
            Err(e) => {
                if shared.stop.load(Ordering::SeqCst) {
                    break;
                }
                warn!("reader: transport read error: {e}");
                if !shared.transport.is_open() {
                    shared.set_state(HandlerState::Error);
                    break;
                }
                continue;
            }
        };
        let pdu = match AttPdu::decode(&buf[..len]) {
            Ok(pdu) => pdu,
            Err(e) => {
                warn!("reader: dropping undecodable PDU: {e}");
                continue;
            }
        };
        match pdu {
            AttPdu::HandleValueNotification { handle, value } => {
                info!("NTF: handle 0x{handle:04X}, {} octets", value.len());
                let target = find_characteristic(&shared.services.read().unwrap(), handle);
                if let Some(listener) = shared.notification_listener.lock().unwrap().as_mut() {
                    listener(target, handle, &value);
                }
            }
            AttPdu::HandleValueIndication { handle, value } => {
                let mut confirmation_sent = false;
                if shared.send_confirmation.load(Ordering::SeqCst) {
                    let cfm = AttPdu::HandleValueConfirmation.encode();
                    match shared.transport.write(&cfm) {
                        Ok(n) if n == cfm.len() => confirmation_sent = true,
                        _ => {
                            warn!("reader: confirmation send failed");
                            shared.set_state(HandlerState::Error);
                        }
                    }
                }
                info!(
                    "IND: handle 0x{handle:04X}, {} octets, confirmation_sent {confirmation_sent}",
                    value.len()
                );
                let target = find_characteristic(&shared.services.read().unwrap(), handle);
                if let Some(listener) = shared.indication_listener.lock().unwrap().as_mut() {
                    listener(target, handle, &value, confirmation_sent);
                }
            }
            AttPdu::MultipleHandleValueNotification { payload } => {
                info!(
                    "multi-handle notification accepted ({} octets), not dispatched",
                    payload.len()
                );
            }
            other => {
                if queue.put_blocking(other).is_err() {
                    // queue closed: disconnect in progress
                    break;
                }
            }
        }
    }
    if shared.state() != HandlerState::Error {
        shared.set_state(HandlerState::Disconnected);
    }
    debug!("reader task ended");
}

fn find_characteristic(services: &[Service], value_handle: u16) -> Option<CharacteristicRef> {
    for (si, service) in services.iter().enumerate() {
        for (ci, chr) in service.characteristics.iter().enumerate() {
            if chr.value_handle == value_handle {
                return Some(CharacteristicRef {
                    service: si,
                    characteristic: ci,
                });
            }
        }
    }
    None
}
