//! Shared transport region.
//!
//! One contiguous block mapped by the command producer and by the proxy:
//!
//! ```text
//! offset            size        page
//! 0x000000          4096 * 500  producer page  (producer writes, proxy reads)
//! 0x1F4000          4096 * 500  consumer page  (proxy writes, producer reads)
//! 0x3E8000          4096        info page      (proxy writes once per session)
//! ```
//!
//! Both sides are compiled independently against this layout, so every field
//! offset is pinned by a compile-time assertion. The region has no locks of
//! its own. Cross-process ordering comes entirely from the signal pair: a
//! side only touches a page after the other side has handed it over.

use std::{
    alloc::{Layout, handle_alloc_error},
    mem::{offset_of, size_of},
    sync::{Mutex, PoisonError},
};

use elaphure_proto::InfoId;
use zerocopy::{FromBytes, FromZeros, KnownLayout};

use crate::error::SessionError;

/// Size of the producer and consumer pages.
pub const DATA_PAGE_SIZE: usize = 4096 * 500;

/// Size of the info page.
pub const INFO_PAGE_SIZE: usize = 4096;

/// Size of the whole region.
pub const REGION_SIZE: usize = DATA_PAGE_SIZE * 2 + INFO_PAGE_SIZE;

/// Payload bytes available in a producer or consumer page.
pub const PAGE_DATA_CAPACITY: usize = DATA_PAGE_SIZE - 8;

/// Consumer status meaning "no valid response".
pub const RESPONSE_INVALID: u32 = 0xFFFF_FFFF;

const PRODUCT_NAME_LEN: usize = 160;
const SERIAL_NUMBER_LEN: usize = 160;
const FIRMWARE_VERSION_LEN: usize = 20;
const VERSION_STRING_LEN: usize = 64;
const INFO_USED: usize = 4 * 5
    + PRODUCT_NAME_LEN
    + SERIAL_NUMBER_LEN
    + FIRMWARE_VERSION_LEN
    + 4
    + 4
    + VERSION_STRING_LEN;

/// Outbound batch written by the command producer.
#[derive(FromBytes, KnownLayout)]
#[repr(C)]
pub struct ProducerPage {
    /// Logical sub-commands in the batch
    pub command_count: u32,
    /// Valid bytes in `data`
    pub data_len: u32,
    /// Raw command bytes, sent to the probe verbatim
    pub data: [u8; PAGE_DATA_CAPACITY],
}

/// Inbound result written by the proxy.
#[derive(FromBytes, KnownLayout)]
#[repr(C)]
pub struct ConsumerPage {
    /// Status of the batch, or [`RESPONSE_INVALID`]
    pub command_response: u32,
    /// Valid bytes in `data`
    pub data_len: u32,
    /// Response payload words
    pub data: [u8; PAGE_DATA_CAPACITY],
}

/// Proxy and device metadata.
#[derive(FromBytes, KnownLayout)]
#[repr(C)]
pub struct InfoPage {
    /// Proxy major version
    pub major_version: u32,
    /// Proxy minor version
    pub minor_version: u32,
    /// Proxy revision
    pub revision: u32,
    /// 1 once handshake and device info succeeded, 0 otherwise
    pub is_proxy_ready: u32,
    /// Probe capabilities bitmap
    pub capabilities: u32,
    /// NUL-terminated probe product name
    pub product_name: [u8; PRODUCT_NAME_LEN],
    /// NUL-terminated probe serial number
    pub serial_number: [u8; SERIAL_NUMBER_LEN],
    /// NUL-terminated CMSIS-DAP firmware version
    pub firmware_version: [u8; FIRMWARE_VERSION_LEN],
    /// Probe packet buffer size, if known
    pub device_dap_buffer_size: u32,
    /// Nonzero when the producer may issue vendor commands
    pub enable_vendor_command: u32,
    /// NUL-terminated proxy version string
    pub version_string: [u8; VERSION_STRING_LEN],
    reserved: [u8; INFO_PAGE_SIZE - INFO_USED],
}

/// The whole region.
#[derive(FromBytes, KnownLayout)]
#[repr(C)]
pub struct SharedMemory {
    /// Producer page
    pub producer: ProducerPage,
    /// Consumer page
    pub consumer: ConsumerPage,
    /// Info page
    pub info: InfoPage,
}

const _: () = {
    assert!(size_of::<ProducerPage>() == DATA_PAGE_SIZE);
    assert!(size_of::<ConsumerPage>() == DATA_PAGE_SIZE);
    assert!(size_of::<InfoPage>() == INFO_PAGE_SIZE);
    assert!(size_of::<SharedMemory>() == REGION_SIZE);

    assert!(offset_of!(SharedMemory, producer) == 0);
    assert!(offset_of!(ProducerPage, command_count) == 0);
    assert!(offset_of!(ProducerPage, data_len) == 4);
    assert!(offset_of!(ProducerPage, data) == 8);

    assert!(offset_of!(SharedMemory, consumer) == DATA_PAGE_SIZE);
    assert!(offset_of!(ConsumerPage, command_response) == 0);
    assert!(offset_of!(ConsumerPage, data_len) == 4);
    assert!(offset_of!(ConsumerPage, data) == 8);

    assert!(offset_of!(SharedMemory, info) == DATA_PAGE_SIZE * 2);
    assert!(offset_of!(InfoPage, major_version) == 0);
    assert!(offset_of!(InfoPage, minor_version) == 4);
    assert!(offset_of!(InfoPage, revision) == 8);
    assert!(offset_of!(InfoPage, is_proxy_ready) == 12);
    assert!(offset_of!(InfoPage, capabilities) == 16);
    assert!(offset_of!(InfoPage, product_name) == 20);
    assert!(offset_of!(InfoPage, serial_number) == 20 + 160);
    assert!(offset_of!(InfoPage, firmware_version) == 20 + 160 + 160);
    assert!(offset_of!(InfoPage, device_dap_buffer_size) == 20 + 160 + 160 + 20);
    assert!(offset_of!(InfoPage, enable_vendor_command) == 364);
    assert!(offset_of!(InfoPage, version_string) == 368);
};

impl ProducerPage {
    /// The pending batch: declared command count and command bytes.
    pub fn batch(&self) -> Result<(u32, &[u8]), SessionError> {
        let declared = self.data_len as usize;
        let data = self.data.get(..declared).ok_or(SessionError::ProducerOverflow {
            declared,
            capacity: PAGE_DATA_CAPACITY,
        })?;
        Ok((self.command_count, data))
    }

    /// Stage a batch. Used by command producers.
    pub fn load(&mut self, command_count: u32, data: &[u8]) -> Result<(), SessionError> {
        let dest = self.data.get_mut(..data.len()).ok_or(SessionError::ProducerOverflow {
            declared: data.len(),
            capacity: PAGE_DATA_CAPACITY,
        })?;
        dest.copy_from_slice(data);
        self.data_len = data.len() as u32;
        self.command_count = command_count;
        Ok(())
    }
}

impl ConsumerPage {
    /// Publish a batch result.
    pub fn store(&mut self, status: u32, payload: &[u8]) -> Result<(), SessionError> {
        let dest = self
            .data
            .get_mut(..payload.len())
            .ok_or(SessionError::ConsumerOverflow { len: payload.len() })?;
        dest.copy_from_slice(payload);
        self.data_len = payload.len() as u32;
        self.command_response = status;
        Ok(())
    }

    /// Mark the page as carrying no valid response.
    pub fn invalidate(&mut self) {
        self.command_response = RESPONSE_INVALID;
    }

    /// Payload of the last stored result.
    pub fn payload(&self) -> &[u8] {
        let len = (self.data_len as usize).min(PAGE_DATA_CAPACITY);
        &self.data[..len]
    }
}

impl InfoPage {
    /// Largest payload accepted for a device-info field.
    ///
    /// String fields keep room for their terminating NUL.
    pub fn capacity(id: InfoId) -> usize {
        match id {
            InfoId::ProductName => PRODUCT_NAME_LEN - 1,
            InfoId::SerialNumber => SERIAL_NUMBER_LEN - 1,
            InfoId::FirmwareVersion => FIRMWARE_VERSION_LEN - 1,
            InfoId::Capabilities => size_of::<u32>(),
        }
    }

    /// Write a device-info field, clearing whatever it held before.
    pub fn store(&mut self, id: InfoId, payload: &[u8]) {
        match id {
            InfoId::ProductName => write_text(&mut self.product_name, payload),
            InfoId::SerialNumber => write_text(&mut self.serial_number, payload),
            InfoId::FirmwareVersion => write_text(&mut self.firmware_version, payload),
            InfoId::Capabilities => {
                let mut raw = [0u8; 4];
                let len = payload.len().min(raw.len());
                raw[..len].copy_from_slice(&payload[..len]);
                self.capabilities = u32::from_ne_bytes(raw);
            },
        }
    }

    /// Reset all device-info fields.
    pub fn clear_device_info(&mut self) {
        self.capabilities = 0;
        self.product_name.fill(0);
        self.serial_number.fill(0);
        self.firmware_version.fill(0);
        self.device_dap_buffer_size = 0;
    }

    /// Record the proxy's own version.
    pub fn set_version(&mut self, major: u32, minor: u32, revision: u32, text: &str) {
        self.major_version = major;
        self.minor_version = minor;
        self.revision = revision;
        write_text(&mut self.version_string, text.as_bytes());
    }

    /// Update the ready flag.
    pub fn set_ready(&mut self, ready: bool) {
        self.is_proxy_ready = u32::from(ready);
    }

    /// Whether the proxy finished session setup.
    pub fn is_ready(&self) -> bool {
        self.is_proxy_ready == 1
    }

    /// Product name without the trailing NUL padding.
    pub fn product_name(&self) -> &[u8] {
        read_text(&self.product_name)
    }

    /// Serial number without the trailing NUL padding.
    pub fn serial_number(&self) -> &[u8] {
        read_text(&self.serial_number)
    }

    /// Firmware version without the trailing NUL padding.
    pub fn firmware_version(&self) -> &[u8] {
        read_text(&self.firmware_version)
    }

    /// Proxy version string without the trailing NUL padding.
    pub fn version_string(&self) -> &[u8] {
        read_text(&self.version_string)
    }
}

fn write_text(field: &mut [u8], text: &[u8]) {
    field.fill(0);
    let len = text.len().min(field.len().saturating_sub(1));
    field[..len].copy_from_slice(&text[..len]);
}

fn read_text(field: &[u8]) -> &[u8] {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    &field[..end]
}

/// Memory both sides of the transport can reach.
///
/// Implementations hand out exclusive access for the duration of `f`. The
/// lock only serializes threads of this process; the other process is kept
/// out by the producer/consumer hand-off.
pub trait SharedRegion: Send + Sync + 'static {
    /// Run `f` with access to the region.
    fn with_memory<T>(&self, f: impl FnOnce(&mut SharedMemory) -> T) -> T;
}

/// Region on the local heap, for in-process producers and tests.
pub struct HeapRegion {
    memory: Mutex<Box<SharedMemory>>,
}

impl HeapRegion {
    /// Allocate a zeroed region.
    pub fn new() -> Self {
        let memory = SharedMemory::new_box_zeroed()
            .unwrap_or_else(|_| handle_alloc_error(Layout::new::<SharedMemory>()));
        Self { memory: Mutex::new(memory) }
    }
}

impl Default for HeapRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl SharedRegion for HeapRegion {
    fn with_memory<T>(&self, f: impl FnOnce(&mut SharedMemory) -> T) -> T {
        let mut memory = self.memory.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut memory)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn producer_batch_respects_data_len() {
        let region = HeapRegion::new();
        region.with_memory(|memory| {
            memory.producer.load(3, &[0x05, 0x01, 0x02]).unwrap();
            let (count, data) = memory.producer.batch().unwrap();
            assert_eq!(count, 3);
            assert_eq!(data, &[0x05, 0x01, 0x02]);
        });
    }

    #[test]
    fn producer_overflow_is_rejected() {
        let region = HeapRegion::new();
        region.with_memory(|memory| {
            memory.producer.data_len = (PAGE_DATA_CAPACITY + 1) as u32;
            assert!(matches!(
                memory.producer.batch(),
                Err(SessionError::ProducerOverflow { .. })
            ));
        });
    }

    #[test]
    fn consumer_store_and_invalidate() {
        let region = HeapRegion::new();
        region.with_memory(|memory| {
            memory.consumer.store(1, &[1, 2, 3, 4]).unwrap();
            assert_eq!(memory.consumer.command_response, 1);
            assert_eq!(memory.consumer.payload(), &[1, 2, 3, 4]);

            memory.consumer.invalidate();
            assert_eq!(memory.consumer.command_response, RESPONSE_INVALID);
        });
    }

    #[test]
    fn capabilities_copy_only_declared_bytes() {
        let region = HeapRegion::new();
        region.with_memory(|memory| {
            memory.info.capabilities = u32::MAX;
            memory.info.product_name.fill(0xAA);

            memory.info.store(InfoId::Capabilities, &[0xA5, 0x5A]);

            assert_eq!(memory.info.capabilities.to_ne_bytes(), [0xA5, 0x5A, 0x00, 0x00]);
            assert!(memory.info.product_name.iter().all(|&b| b == 0xAA));
            assert_eq!(memory.info.major_version, 0);
        });
    }

    #[test]
    fn single_byte_capabilities_clear_the_rest() {
        let region = HeapRegion::new();
        region.with_memory(|memory| {
            memory.info.capabilities = u32::MAX;
            memory.info.store(InfoId::Capabilities, &[0x13]);
            assert_eq!(memory.info.capabilities.to_ne_bytes(), [0x13, 0x00, 0x00, 0x00]);
        });
    }

    #[test]
    fn shorter_string_replaces_longer_one() {
        let region = HeapRegion::new();
        region.with_memory(|memory| {
            memory.info.store(InfoId::ProductName, b"CMSIS-DAP long name");
            memory.info.store(InfoId::ProductName, b"short");
            assert_eq!(memory.info.product_name(), b"short");
        });
    }

    #[test]
    fn version_block() {
        let region = HeapRegion::new();
        region.with_memory(|memory| {
            memory.info.set_version(0, 1, 0, "elaphure-proxy 0.1.0");
            assert_eq!(memory.info.version_string(), b"elaphure-proxy 0.1.0");
            assert!(!memory.info.is_ready());
            memory.info.set_ready(true);
            assert_eq!(memory.info.is_proxy_ready, 1);
        });
    }
}
