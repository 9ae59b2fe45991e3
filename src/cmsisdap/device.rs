use std::io;
use std::time::Duration;

use super::commands::packet::Packet;
use super::usb_util::InterfaceExt;
use crate::transport::{Transport, TransportError};

const TIMEOUT: Duration = Duration::from_millis(100);

/// An opened CMSIS-DAP probe.
pub enum CmsisDapDevice {
    /// CMSIS-DAP v1 over HID.
    /// Stores a HID device handle and the HID report size.
    V1 {
        handle: hidapi::HidDevice,
        report_size: usize,
    },

    /// CMSIS-DAP v2 over WinUSB/Bulk.
    /// Stores the claimed interface, out/in EP addresses and the maximum
    /// DAP packet size.
    V2 {
        handle: nusb::Interface,
        out_ep: u8,
        in_ep: u8,
        max_packet_size: usize,
    },
}

impl std::fmt::Debug for CmsisDapDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CmsisDapDevice::V1 { report_size, .. } => f.debug_struct("V1").field("report_size", report_size).finish(),
            CmsisDapDevice::V2 {
                out_ep,
                in_ep,
                max_packet_size,
                ..
            } => f
                .debug_struct("V2")
                .field("out_ep", out_ep)
                .field("in_ep", in_ep)
                .field("max_packet_size", max_packet_size)
                .finish(),
        }
    }
}

impl CmsisDapDevice {
    /// Drain any pending data from the probe, so that later responses line
    /// up with their requests. Errors are expected once nothing is left to
    /// read, and are swallowed.
    pub fn drain(&self) {
        tracing::debug!("Draining probe of any pending data.");

        match self {
            CmsisDapDevice::V1 { handle, report_size } => loop {
                let mut discard = vec![0u8; report_size + 1];
                match handle.read_timeout(&mut discard, 1) {
                    Ok(n) if n != 0 => continue,
                    _ => break,
                }
            },
            CmsisDapDevice::V2 {
                handle,
                in_ep,
                max_packet_size,
                ..
            } => {
                let mut discard = vec![0u8; *max_packet_size];
                loop {
                    match handle.read_bulk(*in_ep, &mut discard, Duration::from_millis(1)) {
                        Ok(n) if n != 0 => continue,
                        _ => break,
                    }
                }
            }
        }
    }

    fn write(&self, request: &[u8]) -> Result<(), TransportError> {
        match self {
            CmsisDapDevice::V1 { handle, report_size } => {
                // Report ID 0, then the request padded to a full report.
                let mut report = vec![0u8; (*report_size).max(request.len()) + 1];
                report[1..=request.len()].copy_from_slice(request);
                handle.write(&report)?;
            }
            CmsisDapDevice::V2 { handle, out_ep, .. } => {
                handle.write_bulk(*out_ep, request, TIMEOUT).map_err(usb_error)?;
            }
        }
        Ok(())
    }

    fn read(&self, response: &mut Packet) -> Result<usize, TransportError> {
        match self {
            CmsisDapDevice::V1 { handle, report_size } => {
                response.reserve_len(*report_size);
                // A timeout is not an error here, just zero bytes read.
                match handle.read_timeout(response.as_mut_slice(), TIMEOUT.as_millis() as i32)? {
                    0 => Err(TransportError::Timeout),
                    n => Ok(n),
                }
            }
            CmsisDapDevice::V2 {
                handle,
                in_ep,
                max_packet_size,
                ..
            } => {
                response.reserve_len(*max_packet_size);
                handle
                    .read_bulk(*in_ep, response.as_mut_slice(), TIMEOUT)
                    .map_err(usb_error)
            }
        }
    }
}

fn usb_error(e: io::Error) -> TransportError {
    if e.kind() == io::ErrorKind::TimedOut {
        TransportError::Timeout
    } else {
        TransportError::Usb(e)
    }
}

impl Transport for CmsisDapDevice {
    fn exchange(&mut self, request: &[u8], response: &mut Packet) -> Result<usize, TransportError> {
        self.write(request)?;
        self.read(response)
    }

    /// Sets either the HID report size for V1 devices,
    /// or the maximum bulk transfer size for V2 devices.
    fn set_packet_size(&mut self, packet_size: usize) {
        tracing::debug!("Configuring probe to use packet size {}", packet_size);
        match self {
            CmsisDapDevice::V1 { report_size, .. } => *report_size = packet_size,
            CmsisDapDevice::V2 { max_packet_size, .. } => *max_packet_size = packet_size,
        }
    }
}

