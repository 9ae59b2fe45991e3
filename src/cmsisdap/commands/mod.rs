pub mod general;
pub mod packet;
pub mod swd;
pub mod swj;
pub mod transfer;

use scroll::{Pread, LE};

use self::packet::Packet;
use super::CmsisDapError;
use crate::transport::{Transport, TransportError};

#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum SendError {
    /// The transport failed to deliver a response
    Transport(#[from] TransportError),
    /// Not enough data in response from probe
    NotEnoughData,
    /// Command ID in response ({0:#04x}) does not match sent command ID
    CommandIdMismatch(u8),
}

/// Command ID for CMSIS-DAP commands.
///
/// The command ID is always sent as the first byte for every command,
/// and also is the first byte of every response.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandId {
    Info = 0x00,
    Connect = 0x02,
    Disconnect = 0x03,
    TransferConfigure = 0x04,
    Transfer = 0x05,
    TransferBlock = 0x06,
    WriteAbort = 0x08,
    Delay = 0x09,
    ResetTarget = 0x0A,
    SwjPins = 0x10,
    SwjClock = 0x11,
    SwjSequence = 0x12,
    SwdConfigure = 0x13,
    /// Vendor command 1, used by MCU-Link style probes to reset themselves.
    ProbeReset = 0x81,
}

pub(crate) trait Request {
    const COMMAND_ID: CommandId;

    type Response;

    /// Write the request parameters into `buffer`, starting at `offset`
    /// (right after the command byte).
    /// Returns the amount of bytes written.
    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize;

    /// Parse the response, with the echoed command byte already stripped.
    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError>;
}

pub(crate) fn send_command<T: Transport, Req: Request>(
    transport: &mut T,
    tx: &mut Packet,
    rx: &mut Packet,
    request: &Req,
) -> Result<Req::Response, CmsisDapError> {
    send_command_inner(transport, tx, rx, request).map_err(|source| CmsisDapError::Send {
        command_id: Req::COMMAND_ID,
        source,
    })
}

fn send_command_inner<T: Transport, Req: Request>(
    transport: &mut T,
    tx: &mut Packet,
    rx: &mut Packet,
    request: &Req,
) -> Result<Req::Response, SendError> {
    tx.pack_u8(0, Req::COMMAND_ID as u8);
    let size = 1 + request.to_bytes(tx, 1);
    let request_bytes = &tx.as_slice()[..size];
    trace_buffer("Transmit buffer", request_bytes);

    let received = transport.exchange(request_bytes, rx)?;
    let response = &rx.as_slice()[..received.min(rx.len())];
    trace_buffer("Receive buffer", response);

    match response.first() {
        None => Err(SendError::NotEnoughData),
        Some(&id) if id == Req::COMMAND_ID as u8 => request.parse_response(&response[1..]),
        Some(&id) => Err(SendError::CommandIdMismatch(id)),
    }
}

/// Reads a single status byte at the start of a response.
pub(crate) fn status_byte(buffer: &[u8]) -> Result<u8, SendError> {
    buffer.first().copied().ok_or(SendError::NotEnoughData)
}

pub(crate) fn read_u16(buffer: &[u8], offset: usize) -> Result<u16, SendError> {
    buffer.pread_with(offset, LE).map_err(|_| SendError::NotEnoughData)
}

pub(crate) fn read_u32(buffer: &[u8], offset: usize) -> Result<u32, SendError> {
    buffer.pread_with(offset, LE).map_err(|_| SendError::NotEnoughData)
}

/// Trace log a buffer, including only the first trailing zero.
///
/// HID reports are padded with zeros up to the report size, which makes
/// the raw trace output long and hard to read.
fn trace_buffer(name: &str, buf: &[u8]) {
    if tracing::enabled!(tracing::Level::TRACE) {
        let len = buf.len();
        let cut = len + 1 - buf.iter().rev().position(|&x| x != 0).unwrap_or(len);
        let end = std::cmp::min(len, std::cmp::max(1, cut));
        tracing::trace!("{}: {:02X?}...", name, &buf[..end]);
    }
}
