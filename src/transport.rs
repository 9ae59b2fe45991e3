//! The byte transport underneath the CMSIS-DAP protocol engine.

use crate::cmsisdap::commands::packet::Packet;

/// A failure to move a packet across the channel to the probe.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum TransportError {
    /// Error in the USB HID access
    Hid(#[from] hidapi::HidError),
    /// Error in the USB access
    Usb(#[from] std::io::Error),
    /// Timeout in USB communication.
    Timeout,
    /// The channel to the probe is closed.
    Closed,
}

/// A half-duplex request/response channel to a CMSIS-DAP probe.
///
/// Every call to [`Transport::exchange`] must complete before the next one
/// starts: the wire protocol carries no transaction IDs, so responses are
/// matched to requests purely by order.
pub trait Transport {
    /// Sends `request` and stores the next full response in `response`.
    ///
    /// Implementations may grow `response` to fit the received report.
    /// Returns the number of valid bytes now held in `response`.
    fn exchange(&mut self, request: &[u8], response: &mut Packet) -> Result<usize, TransportError>;

    /// Called when the probe reports its maximum packet size.
    fn set_packet_size(&mut self, _packet_size: usize) {}
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn exchange(&mut self, request: &[u8], response: &mut Packet) -> Result<usize, TransportError> {
        (**self).exchange(request, response)
    }

    fn set_packet_size(&mut self, packet_size: usize) {
        (**self).set_packet_size(packet_size)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn exchange(&mut self, request: &[u8], response: &mut Packet) -> Result<usize, TransportError> {
        (**self).exchange(request, response)
    }

    fn set_packet_size(&mut self, packet_size: usize) {
        (**self).set_packet_size(packet_size)
    }
}
