//! R307 optical fingerprint module over UART.
//!
//! Every exchange is one command packet and one acknowledge packet:
//!
//! ```text
//!  ┌──────┬──────────┬─────┬────────┬──────────────────┬──────────┐
//!  │ EF01 │ address  │ PID │ length │ payload          │ checksum │
//!  │ 2 B  │ 4 B      │ 1 B │ 2 B    │ length - 2 bytes │ 2 B      │
//!  └──────┴──────────┴─────┴────────┴──────────────────┴──────────┘
//! ```
//!
//! `length` counts payload plus checksum; the checksum is the 16-bit sum of
//! PID, both length bytes and the payload.  Command payloads start with the
//! instruction code, acknowledge payloads with a confirmation code.

use log::{debug, info};

use crate::app::ports::{CharBuffer, FingerprintSensor, MatchResult};
use crate::error::SensorFault;

pub const HEADER: u16 = 0xEF01;
pub const DEFAULT_ADDRESS: u32 = 0xFFFF_FFFF;
pub const DEFAULT_PASSWORD: u32 = 0;

/// Largest payload this driver sends or accepts.
pub const MAX_PAYLOAD: usize = 32;
const PREAMBLE_LEN: usize = 9;
const READ_TIMEOUT_MS: u32 = 1000;

// ── Packet identifiers ────────────────────────────────────────

pub const PID_COMMAND: u8 = 0x01;
pub const PID_ACK: u8 = 0x07;

// ── Instructions ──────────────────────────────────────────────

const INS_GEN_IMG: u8 = 0x01;
const INS_IMG2TZ: u8 = 0x02;
const INS_REG_MODEL: u8 = 0x05;
const INS_STORE: u8 = 0x06;
const INS_VERIFY_PASSWORD: u8 = 0x13;
const INS_HIGH_SPEED_SEARCH: u8 = 0x1B;

// ── Confirmation codes ────────────────────────────────────────

const ACK_OK: u8 = 0x00;
const ACK_PACKET_ERROR: u8 = 0x01;
const ACK_NO_FINGER: u8 = 0x02;
const ACK_IMAGE_FAIL: u8 = 0x03;
const ACK_IMAGE_MESSY: u8 = 0x06;
const ACK_FEATURE_FAIL: u8 = 0x07;
const ACK_NOT_FOUND: u8 = 0x09;
const ACK_ENROLL_MISMATCH: u8 = 0x0A;
const ACK_BAD_LOCATION: u8 = 0x0B;
const ACK_FLASH_ERROR: u8 = 0x18;
const ACK_INVALID_IMAGE: u8 = 0x15;

// ───────────────────────────────────────────────────────────────
// Serial transport
// ───────────────────────────────────────────────────────────────

/// Byte-oriented serial channel to the module.
pub trait Transport {
    type Error: core::fmt::Debug;

    /// Read up to `buf.len()` bytes, waiting at most `timeout_ms`.
    /// Returns the number of bytes read (0 on timeout).
    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error>;

    /// Write all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error>;

    /// Throw away everything already received.
    fn discard_input(&mut self) -> Result<(), Self::Error>;
}

#[cfg(target_os = "espidf")]
impl Transport for esp_idf_hal::uart::UartDriver<'_> {
    type Error = esp_idf_svc::sys::EspError;

    fn read(&mut self, buf: &mut [u8], timeout_ms: u32) -> Result<usize, Self::Error> {
        let ticks = esp_idf_hal::delay::TickType::new_millis(timeout_ms as u64).ticks();
        esp_idf_hal::uart::UartDriver::read(self, buf, ticks)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        let mut sent = 0;
        while sent < data.len() {
            sent += esp_idf_hal::uart::UartDriver::write(self, &data[sent..])?;
        }
        Ok(())
    }

    fn discard_input(&mut self) -> Result<(), Self::Error> {
        esp_idf_hal::uart::UartDriver::clear_rx(self)
    }
}

// ───────────────────────────────────────────────────────────────
// Packet codec
// ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub address: u32,
    pub pid: u8,
    pub payload: heapless::Vec<u8, MAX_PAYLOAD>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketError {
    Truncated,
    BadHeader,
    BadLength,
    BadChecksum,
    UnknownPid(u8),
}

fn checksum(pid: u8, length: u16, payload: &[u8]) -> u16 {
    let [lh, ll] = length.to_be_bytes();
    payload
        .iter()
        .fold(pid as u16 + lh as u16 + ll as u16, |acc, b| acc.wrapping_add(*b as u16))
}

/// Encode one packet.  `payload` longer than [`MAX_PAYLOAD`] is rejected.
pub fn encode_packet(address: u32, pid: u8, payload: &[u8]) -> Result<heapless::Vec<u8, 48>, PacketError> {
    if payload.len() > MAX_PAYLOAD {
        return Err(PacketError::BadLength);
    }
    let length = (payload.len() + 2) as u16;
    let mut out = heapless::Vec::new();
    let sum = checksum(pid, length, payload);
    // Capacity covers preamble + MAX_PAYLOAD + checksum.
    let _ = out.extend_from_slice(&HEADER.to_be_bytes());
    let _ = out.extend_from_slice(&address.to_be_bytes());
    let _ = out.push(pid);
    let _ = out.extend_from_slice(&length.to_be_bytes());
    let _ = out.extend_from_slice(payload);
    let _ = out.extend_from_slice(&sum.to_be_bytes());
    Ok(out)
}

/// Decode one complete packet from `bytes` (trailing bytes are ignored).
pub fn decode_packet(bytes: &[u8]) -> Result<Packet, PacketError> {
    if bytes.len() < PREAMBLE_LEN {
        return Err(PacketError::Truncated);
    }
    if u16::from_be_bytes([bytes[0], bytes[1]]) != HEADER {
        return Err(PacketError::BadHeader);
    }
    let address = u32::from_be_bytes([bytes[2], bytes[3], bytes[4], bytes[5]]);
    let pid = bytes[6];
    if !matches!(pid, PID_COMMAND | PID_ACK) {
        return Err(PacketError::UnknownPid(pid));
    }
    let length = u16::from_be_bytes([bytes[7], bytes[8]]);
    if length < 2 || length as usize - 2 > MAX_PAYLOAD {
        return Err(PacketError::BadLength);
    }
    let end = PREAMBLE_LEN + length as usize;
    if bytes.len() < end {
        return Err(PacketError::Truncated);
    }
    let payload = &bytes[PREAMBLE_LEN..end - 2];
    let sum = u16::from_be_bytes([bytes[end - 2], bytes[end - 1]]);
    if sum != checksum(pid, length, payload) {
        return Err(PacketError::BadChecksum);
    }
    let mut out = heapless::Vec::new();
    let _ = out.extend_from_slice(payload);
    Ok(Packet {
        address,
        pid,
        payload: out,
    })
}

fn fault_from_code(code: u8) -> SensorFault {
    match code {
        ACK_NO_FINGER => SensorFault::NoFinger,
        ACK_IMAGE_FAIL => SensorFault::ImagingError,
        ACK_IMAGE_MESSY => SensorFault::ImageTooMessy,
        ACK_FEATURE_FAIL | ACK_INVALID_IMAGE => SensorFault::FeatureExtractionFailed,
        ACK_NOT_FOUND => SensorFault::NotFound,
        ACK_ENROLL_MISMATCH => SensorFault::MismatchedSamples,
        ACK_BAD_LOCATION => SensorFault::BadLocation,
        ACK_FLASH_ERROR => SensorFault::StorageError,
        ACK_PACKET_ERROR => SensorFault::CommsError,
        _ => SensorFault::CommsError,
    }
}

// ───────────────────────────────────────────────────────────────
// Driver
// ───────────────────────────────────────────────────────────────

pub struct R307<T> {
    port: T,
    address: u32,
    capacity: u16,
}

impl<T: Transport> R307<T> {
    pub fn new(port: T, capacity: u16) -> Self {
        Self {
            port,
            address: DEFAULT_ADDRESS,
            capacity,
        }
    }

    /// Boot probe: verify the module password.  Failure means the sensor
    /// is absent or locked.
    pub fn handshake(&mut self, password: u32) -> Result<(), SensorFault> {
        let pw = password.to_be_bytes();
        self.command(&[INS_VERIFY_PASSWORD, pw[0], pw[1], pw[2], pw[3]])?;
        info!("Finger: R307 handshake OK");
        Ok(())
    }

    #[cfg(test)]
    fn port_mut(&mut self) -> &mut T {
        &mut self.port
    }

    /// Send one command and return the acknowledge payload.  A non-zero
    /// confirmation code becomes the matching [`SensorFault`].
    fn command(&mut self, payload: &[u8]) -> Result<heapless::Vec<u8, MAX_PAYLOAD>, SensorFault> {
        let frame = encode_packet(self.address, PID_COMMAND, payload).map_err(|_| SensorFault::CommsError)?;
        self.port.write(&frame).map_err(|e| {
            debug!("Finger: write failed: {:?}", e);
            SensorFault::CommsError
        })?;

        let ack = self.read_ack();
        if ack == Err(SensorFault::CommsError) {
            // Leftovers of a broken ack would be read as the next header.
            if let Err(e) = self.port.discard_input() {
                debug!("Finger: RX flush failed: {:?}", e);
            }
        }
        ack
    }

    fn read_ack(&mut self) -> Result<heapless::Vec<u8, MAX_PAYLOAD>, SensorFault> {
        let mut buf = [0u8; PREAMBLE_LEN + MAX_PAYLOAD + 2];
        self.read_exact(&mut buf[..PREAMBLE_LEN])?;
        let length = u16::from_be_bytes([buf[7], buf[8]]) as usize;
        if !(3..=MAX_PAYLOAD + 2).contains(&length) {
            return Err(SensorFault::CommsError);
        }
        self.read_exact(&mut buf[PREAMBLE_LEN..PREAMBLE_LEN + length])?;

        let packet = decode_packet(&buf[..PREAMBLE_LEN + length]).map_err(|e| {
            debug!("Finger: bad ack: {:?}", e);
            SensorFault::CommsError
        })?;
        if packet.pid != PID_ACK {
            return Err(SensorFault::CommsError);
        }
        match packet.payload.first() {
            Some(&ACK_OK) => Ok(packet.payload),
            Some(&code) => Err(fault_from_code(code)),
            None => Err(SensorFault::CommsError),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), SensorFault> {
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .port
                .read(&mut buf[filled..], READ_TIMEOUT_MS)
                .map_err(|_| SensorFault::CommsError)?;
            if n == 0 {
                return Err(SensorFault::CommsError);
            }
            filled += n;
        }
        Ok(())
    }
}

fn read_u16(payload: &[u8], at: usize) -> u16 {
    match payload.get(at..at + 2) {
        Some(&[hi, lo]) => u16::from_be_bytes([hi, lo]),
        _ => 0,
    }
}

impl<T: Transport> FingerprintSensor for R307<T> {
    fn capture(&mut self) -> Result<(), SensorFault> {
        self.command(&[INS_GEN_IMG]).map(drop)
    }

    fn convert(&mut self, buffer: CharBuffer) -> Result<(), SensorFault> {
        self.command(&[INS_IMG2TZ, buffer as u8]).map(drop)
    }

    fn search(&mut self) -> Result<MatchResult, SensorFault> {
        let [ch, cl] = self.capacity.to_be_bytes();
        let ack = self.command(&[INS_HIGH_SPEED_SEARCH, CharBuffer::One as u8, 0, 0, ch, cl])?;
        Ok(MatchResult {
            id: read_u16(&ack, 1),
            confidence: read_u16(&ack, 3),
        })
    }

    fn merge(&mut self) -> Result<(), SensorFault> {
        self.command(&[INS_REG_MODEL]).map(drop)
    }

    fn store(&mut self, id: u16) -> Result<(), SensorFault> {
        if id >= self.capacity {
            return Err(SensorFault::BadLocation);
        }
        let [ih, il] = id.to_be_bytes();
        self.command(&[INS_STORE, CharBuffer::One as u8, ih, il]).map(drop)
    }
}
