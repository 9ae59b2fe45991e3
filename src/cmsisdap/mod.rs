//! CMSIS-DAP probe implementation.
pub mod commands;
pub mod device;
pub mod tools;
mod usb_util;

use std::fmt::Write;

use bitvec::prelude::*;
use commands::general::connect::ConnectRequest;
use commands::general::delay::DelayRequest;
use commands::general::disconnect::DisconnectRequest;
use commands::general::info::{Capabilities, CapabilitiesRequest, InfoId, InfoStringRequest, InfoValueRequest};
use commands::general::probe_reset::ProbeResetRequest;
use commands::general::reset::ResetRequest;
use commands::packet::{Packet, DEFAULT_PACKET_SIZE};
use commands::swd;
use commands::swj::clock::SWJClockRequest;
use commands::swj::pins::{Pins, SWJPinsRequest};
use commands::swj::sequence::SequenceRequest;
use commands::transfer::abort::WriteAbortRequest;
use commands::transfer::configure::ConfigureRequest;
use commands::transfer::{Ack, TransferBlockRequest, TransferRequest};
use commands::{send_command, CommandId, SendError};

use crate::register::{Port, RegisterId};
use crate::transport::Transport;

/// Bytes of a DAP_TransferBlock report not available for data words.
const BLOCK_HEADER_LEN: usize = 5;

/// Sequence error code for a response echoing the wrong command.
pub const SEQUENCE_MISMATCH: u8 = 0x83;
/// Sequence error code for a non-zero sequence status.
pub const SEQUENCE_FAILED: u8 = 0xFF;

/// An error in the communication with the probe, or with the
/// debug port or access port behind it.
#[derive(Debug, thiserror::Error, docsplay::Display)]
pub enum CmsisDapError {
    /// Error handling CMSIS-DAP command {command_id:?}
    Send {
        command_id: CommandId,
        #[source]
        source: SendError,
    },
    /// Target device responded with a WAIT response to the request.
    WaitResponse,
    /// Target device did not acknowledge the request with OK ({ack:?}).
    FaultResponse { ack: Ack },
    /// CMSIS-DAP command {command_id:?} reported status {status:#04x}
    StatusFail { command_id: CommandId, status: u8 },
    /// SWJ sequence failed with code {0:#04x}
    Sequence(u8),
    /// There is no {port:?} register at address {address:#x}
    AddressResolution { port: Port, address: u32 },
    /// The debug session is not connected.
    NotConnected,
    /// Block transfers need at least one word.
    EmptyBlock,
}

impl CmsisDapError {
    /// True if the probe answered with a response that does not fit the
    /// request: wrong command echo, or too little data.
    pub fn is_transport_integrity(&self) -> bool {
        matches!(
            self,
            CmsisDapError::Send {
                source: SendError::CommandIdMismatch(_) | SendError::NotEnoughData,
                ..
            }
        )
    }
}

fn check_ack(ack: Ack) -> Result<(), CmsisDapError> {
    match ack {
        Ack::Ok => Ok(()),
        Ack::Wait => Err(CmsisDapError::WaitResponse),
        ack => Err(CmsisDapError::FaultResponse { ack }),
    }
}

fn check_status(command_id: CommandId, status: u8, expected: u8) -> Result<(), CmsisDapError> {
    if status == expected {
        Ok(())
    } else {
        Err(CmsisDapError::StatusFail { command_id, status })
    }
}

/// A CMSIS-DAP probe, reached through a [`Transport`].
///
/// Owns the request and response buffers; every method is one or more
/// strictly alternating request/response round trips.
pub struct CmsisDap<T> {
    transport: T,
    tx: Packet,
    rx: Packet,
    /// Report size used to split block transfers.
    packet_size: usize,
}

impl<T> std::fmt::Debug for CmsisDap<T> {
    fn fmt(&self, fmt: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fmt.debug_struct("CmsisDap")
            .field("packet_size", &self.packet_size)
            .field("tx", &self.tx)
            .field("rx", &self.rx)
            .finish()
    }
}

impl<T: Transport> CmsisDap<T> {
    pub fn new(transport: T) -> Self {
        Self::with_packet_size(transport, DEFAULT_PACKET_SIZE)
    }

    pub fn with_packet_size(transport: T, packet_size: usize) -> Self {
        Self {
            transport,
            tx: Packet::with_size(packet_size),
            rx: Packet::with_size(packet_size),
            packet_size: packet_size.max(BLOCK_HEADER_LEN + 4),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    pub fn packet_size(&self) -> usize {
        self.packet_size
    }

    /// Changes the report size used for block transfers.
    ///
    /// Sizes too small to carry a single data word are ignored.
    pub fn set_packet_size(&mut self, packet_size: usize) {
        if packet_size < BLOCK_HEADER_LEN + 4 {
            tracing::warn!("Ignoring packet size {}: too small for a block transfer", packet_size);
            return;
        }
        tracing::debug!("Using packet size {}", packet_size);
        self.packet_size = packet_size;
        self.transport.set_packet_size(packet_size);
        self.tx.reserve_len(packet_size);
        self.rx.reserve_len(packet_size);
    }

    /// Maximum number of words moved by one DAP_TransferBlock report.
    ///
    /// The word count field is 16 bits wide, which caps this regardless of
    /// the packet size.
    pub fn block_capacity(&self) -> usize {
        ((self.packet_size - BLOCK_HEADER_LEN) / 4).min(u16::MAX as usize)
    }

    fn send<Req: commands::Request>(&mut self, request: &Req) -> Result<Req::Response, CmsisDapError> {
        send_command(&mut self.transport, &mut self.tx, &mut self.rx, request)
    }

    pub fn info_string(&mut self, id: InfoId) -> Result<String, CmsisDapError> {
        self.send(&InfoStringRequest(id))
    }

    pub fn info_value(&mut self, id: InfoId) -> Result<u32, CmsisDapError> {
        self.send(&InfoValueRequest(id))
    }

    /// Reads the capability bits and the SWO trace buffer size.
    pub fn capabilities(&mut self) -> Result<Capabilities, CmsisDapError> {
        let mut caps = self.send(&CapabilitiesRequest)?;
        caps.swo_trace_buffer_size = self.info_value(InfoId::SwoTraceBufferSize)?;
        tracing::debug!("Detected probe capabilities: {:?}", caps);
        Ok(caps)
    }

    /// Initialises the probe's debug port in SWD mode.
    pub fn connect_swd(&mut self) -> Result<(), CmsisDapError> {
        let port = self.send(&ConnectRequest::UseSwd)?;
        check_status(CommandId::Connect, port, ConnectRequest::UseSwd as u8)
    }

    pub fn disconnect(&mut self) -> Result<(), CmsisDapError> {
        let status = self.send(&DisconnectRequest)?;
        check_status(CommandId::Disconnect, status, 0)
    }

    /// Set maximum SWD clock frequency to use, in Hz.
    ///
    /// The actual clock frequency used by the device might be lower.
    pub fn set_swj_clock(&mut self, clock_speed_hz: u32) -> Result<(), CmsisDapError> {
        let status = self.send(&SWJClockRequest { clock_speed_hz })?;
        check_status(CommandId::SwjClock, status, 0)
    }

    pub fn transfer_configure(&mut self, request: ConfigureRequest) -> Result<(), CmsisDapError> {
        let status = self.send(&request)?;
        check_status(CommandId::TransferConfigure, status, 0)
    }

    pub fn configure_swd(&mut self) -> Result<(), CmsisDapError> {
        let status = self.send(&swd::configure::ConfigureRequest)?;
        check_status(CommandId::SwdConfigure, status, 0)
    }

    /// Drives the pins in `select` to the levels in `output`, waits up to
    /// `wait_us` for them to settle and returns the pin state read back.
    ///
    /// An empty `select` only reads the pins.
    pub fn swj_pins(&mut self, output: Pins, select: Pins, wait_us: u32) -> Result<Pins, CmsisDapError> {
        let pins = self.send(&SWJPinsRequest { output, select, wait_us })?;
        tracing::trace!("Pin response: {:?}", pins);
        Ok(pins)
    }

    /// Clocks `bits` out on SWDIO/TMS, LSB first.
    ///
    /// Sequences longer than one command can carry are split.
    pub fn swj_sequence(&mut self, bits: &BitSlice<u8, Lsb0>) -> Result<(), CmsisDapError> {
        if tracing::enabled!(tracing::Level::TRACE) {
            let mut seq = String::new();
            let _ = write!(&mut seq, "swj sequence:");
            for bit in bits.iter().by_vals() {
                let _ = write!(&mut seq, "{}", u8::from(bit));
            }
            tracing::trace!("{}", seq);
        }

        for chunk in bits.chunks(commands::swj::sequence::MAX_SEQUENCE_BITS) {
            let Some(request) = SequenceRequest::new(chunk) else {
                return Err(CmsisDapError::Sequence(SEQUENCE_FAILED));
            };
            match self.send(&request) {
                Ok(0) => {}
                Ok(_) => return Err(CmsisDapError::Sequence(SEQUENCE_FAILED)),
                Err(CmsisDapError::Send {
                    source: SendError::CommandIdMismatch(_),
                    ..
                }) => return Err(CmsisDapError::Sequence(SEQUENCE_MISMATCH)),
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    pub fn read_register(&mut self, register: RegisterId) -> Result<u32, CmsisDapError> {
        let response = self.send(&TransferRequest::read(register.transfer_request()))?;
        check_ack(response.ack)?;
        if response.transfer_count != 1 {
            return Err(CmsisDapError::StatusFail {
                command_id: CommandId::Transfer,
                status: response.transfer_count,
            });
        }
        response.data.ok_or(CmsisDapError::Send {
            command_id: CommandId::Transfer,
            source: SendError::NotEnoughData,
        })
    }

    pub fn write_register(&mut self, register: RegisterId, value: u32) -> Result<(), CmsisDapError> {
        let response = self.send(&TransferRequest::write(register.transfer_request(), value))?;
        check_ack(response.ack)?;
        if response.transfer_count != 1 {
            return Err(CmsisDapError::StatusFail {
                command_id: CommandId::Transfer,
                status: response.transfer_count,
            });
        }
        Ok(())
    }

    /// Reads `data.len()` words from one register, splitting the transfer
    /// into as many reports as the packet size requires.
    pub fn read_block(&mut self, register: RegisterId, data: &mut [u32]) -> Result<(), CmsisDapError> {
        if data.is_empty() {
            return Err(CmsisDapError::EmptyBlock);
        }

        let capacity = self.block_capacity();
        for chunk in data.chunks_mut(capacity) {
            let request = TransferBlockRequest::read(register.transfer_request(), chunk.len() as u16);
            let response = self.send(&request)?;
            check_ack(response.ack)?;
            check_block_count(response.transfer_count, request.transfer_count())?;
            chunk.copy_from_slice(&response.transfer_data);
        }
        Ok(())
    }

    /// Writes `data` word by word to one register, split into reports like
    /// [`CmsisDap::read_block`].
    pub fn write_block(&mut self, register: RegisterId, data: &[u32]) -> Result<(), CmsisDapError> {
        if data.is_empty() {
            return Err(CmsisDapError::EmptyBlock);
        }

        let capacity = self.block_capacity();
        for chunk in data.chunks(capacity) {
            let request = TransferBlockRequest::write(register.transfer_request(), chunk);
            let response = self.send(&request)?;
            check_ack(response.ack)?;
            check_block_count(response.transfer_count, request.transfer_count())?;
        }
        Ok(())
    }

    pub fn write_abort(&mut self, abort: u32) -> Result<(), CmsisDapError> {
        let status = self.send(&WriteAbortRequest { abort })?;
        check_status(CommandId::WriteAbort, status, 0)
    }

    pub fn delay(&mut self, delay_us: u16) -> Result<(), CmsisDapError> {
        let status = self.send(&DelayRequest { delay_us })?;
        check_status(CommandId::Delay, status, 0)
    }

    /// Runs the probe's device specific target reset sequence.
    ///
    /// Returns whether the probe implements one.
    pub fn reset_target(&mut self) -> Result<bool, CmsisDapError> {
        let response = self.send(&ResetRequest)?;
        tracing::info!("Target reset response: {:?}", response);
        check_status(CommandId::ResetTarget, response.status, 0)?;
        Ok(response.executed)
    }

    /// Resets the probe itself through the vendor command.
    pub fn probe_reset(&mut self) -> Result<(), CmsisDapError> {
        let response = self.send(&ProbeResetRequest { mode: 0 })?;
        check_status(CommandId::ProbeReset, response.status, 0)?;
        if response.length == 0 {
            return Err(CmsisDapError::StatusFail {
                command_id: CommandId::ProbeReset,
                status: response.length,
            });
        }
        Ok(())
    }
}

fn check_block_count(received: u16, requested: u16) -> Result<(), CmsisDapError> {
    if received == requested {
        Ok(())
    } else {
        Err(CmsisDapError::StatusFail {
            command_id: CommandId::TransferBlock,
            status: received.min(u8::MAX as u16) as u8,
        })
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::register::resolve;
    use crate::transport::mock::MockTransport;

    fn dap() -> CmsisDap<MockTransport> {
        CmsisDap::new(MockTransport::new())
    }

    #[test]
    fn single_read_returns_data() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x05, 0x01, 0x01, 0x78, 0x56, 0x34, 0x12]);
        let value = dap.read_register(resolve(Port::Ap, 0xC).unwrap()).unwrap();
        assert_eq!(value, 0x1234_5678);
        assert_eq!(dap.transport().requests, vec![vec![0x05, 0x00, 0x01, 0x0F]]);
    }

    #[test]
    fn wait_ack_is_reported() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x05, 0x00, 0x02]);
        let err = dap.read_register(resolve(Port::Dp, 0x4).unwrap()).unwrap_err();
        assert!(matches!(err, CmsisDapError::WaitResponse));
    }

    #[test]
    fn fault_ack_is_reported() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x05, 0x00, 0x04]);
        let err = dap.write_register(resolve(Port::Ap, 0x4).unwrap(), 1).unwrap_err();
        assert!(matches!(err, CmsisDapError::FaultResponse { ack: Ack::Fault }));
    }

    #[test]
    fn no_ack_counts_as_fault() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x05, 0x00, 0x07]);
        let err = dap.read_register(resolve(Port::Dp, 0x0).unwrap()).unwrap_err();
        assert!(matches!(err, CmsisDapError::FaultResponse { ack: Ack::NoAck }));
    }

    #[test]
    fn wrong_transfer_count_is_a_status_failure() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x05, 0x02, 0x01]);
        let err = dap.write_register(resolve(Port::Dp, 0x8).unwrap(), 0).unwrap_err();
        assert!(matches!(
            err,
            CmsisDapError::StatusFail {
                command_id: CommandId::Transfer,
                status: 2
            }
        ));
    }

    #[test]
    fn block_read_is_chunked_by_packet_size() {
        let mut dap = dap();
        assert_eq!(dap.block_capacity(), 14);

        let words: Vec<u32> = (0..30).map(|i| 0x1000 + i).collect();
        for chunk in words.chunks(14) {
            dap.transport_mut().respond_block_read(chunk);
        }

        let mut data = vec![0u32; 30];
        dap.read_block(resolve(Port::Ap, 0xC).unwrap(), &mut data).unwrap();
        assert_eq!(data, words);

        let counts: Vec<u16> = dap
            .transport()
            .requests
            .iter()
            .map(|r| u16::from_le_bytes([r[2], r[3]]))
            .collect();
        assert_eq!(counts, vec![14, 14, 2]);
        assert!(dap.transport().requests.iter().all(|r| r[0] == 0x06 && r[4] == 0x0F));
    }

    #[test]
    fn bigger_packets_mean_fewer_chunks() {
        let mut dap = CmsisDap::with_packet_size(MockTransport::new(), 512);
        assert_eq!(dap.block_capacity(), 126);

        let words: Vec<u32> = (0..200).collect();
        dap.transport_mut().respond_block_read(&words[..126]);
        dap.transport_mut().respond_block_read(&words[126..]);

        let mut data = vec![0u32; 200];
        dap.read_block(resolve(Port::Ap, 0xC).unwrap(), &mut data).unwrap();
        assert_eq!(data, words);
        assert_eq!(dap.transport().requests.len(), 2);
    }

    #[test]
    fn block_write_streams_words_in_order() {
        let mut dap = dap();
        let words: Vec<u32> = (0..20).collect();
        dap.transport_mut().respond(&[0x06, 14, 0x00, 0x01]);
        dap.transport_mut().respond(&[0x06, 6, 0x00, 0x01]);

        dap.write_block(resolve(Port::Ap, 0xC).unwrap(), &words).unwrap();

        let requests = &dap.transport().requests;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].len(), 5 + 14 * 4);
        assert_eq!(&requests[1][..5], &[0x06, 0x00, 6, 0x00, 0x0D]);
        assert_eq!(&requests[1][5..9], &14u32.to_le_bytes());
    }

    #[test]
    fn block_wait_aborts_remaining_chunks() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x06, 0x00, 0x00, 0x02]);
        dap.transport_mut().respond_block_read(&[0; 14]);

        let mut data = vec![0u32; 20];
        let err = dap.read_block(resolve(Port::Dp, 0x0).unwrap(), &mut data).unwrap_err();
        assert!(matches!(err, CmsisDapError::WaitResponse));
        assert_eq!(dap.transport().pending(), 1);
    }

    #[test]
    fn block_count_mismatch_is_a_status_failure() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x06, 0x01, 0x00, 0x01, 0, 0, 0, 0]);

        let mut data = vec![0u32; 2];
        let err = dap.read_block(resolve(Port::Dp, 0x0).unwrap(), &mut data).unwrap_err();
        assert!(matches!(
            err,
            CmsisDapError::StatusFail {
                command_id: CommandId::TransferBlock,
                ..
            }
        ));
    }

    #[test]
    fn empty_block_is_rejected_without_traffic() {
        let mut dap = dap();
        let err = dap.read_block(resolve(Port::Dp, 0x0).unwrap(), &mut []).unwrap_err();
        assert!(matches!(err, CmsisDapError::EmptyBlock));
        assert!(dap.transport().requests.is_empty());
    }

    #[test]
    fn sequence_status_codes() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x12, 0xFF]);
        dap.transport_mut().respond(&[0x05, 0x00]);
        let bits = bitvec![u8, Lsb0; 1; 8];

        assert!(matches!(dap.swj_sequence(&bits), Err(CmsisDapError::Sequence(SEQUENCE_FAILED))));
        assert!(matches!(dap.swj_sequence(&bits), Err(CmsisDapError::Sequence(SEQUENCE_MISMATCH))));
    }

    #[test]
    fn long_sequences_are_split() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x12, 0x00]).respond(&[0x12, 0x00]);
        dap.swj_sequence(&bitvec![u8, Lsb0; 1; 300]).unwrap();

        let requests = &dap.transport().requests;
        assert_eq!(requests[0][1], 0);
        assert_eq!(requests[1][1], 44);
    }

    #[test]
    fn connect_reports_wrong_port_as_status_failure() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x02, 0x00]);
        assert!(matches!(
            dap.connect_swd(),
            Err(CmsisDapError::StatusFail {
                command_id: CommandId::Connect,
                status: 0
            })
        ));
    }

    #[test]
    fn transfer_configure_layout() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x04, 0x00]);
        dap.transfer_configure(ConfigureRequest {
            idle_cycles: 2,
            wait_retry: 0x50,
            match_retry: 0,
        })
        .unwrap();
        assert_eq!(dap.transport().requests[0], vec![0x04, 0x02, 0x50, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn probe_reset_needs_positive_length() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x81, 0x00, 0x01]);
        dap.transport_mut().respond(&[0x81, 0x00, 0x00]);
        dap.transport_mut().respond(&[0x81, 0x01, 0x01]);

        dap.probe_reset().unwrap();
        assert!(dap.probe_reset().is_err());
        assert!(dap.probe_reset().is_err());
        assert_eq!(dap.transport().requests[0], vec![0x81, 0x00]);
    }

    #[test]
    fn delay_and_target_reset() {
        let mut dap = dap();
        dap.transport_mut()
            .respond(&[0x09, 0x00])
            .respond(&[0x0A, 0x00, 0x01])
            .respond(&[0x0A, 0x00, 0x00]);

        dap.delay(500).unwrap();
        assert!(dap.reset_target().unwrap());
        assert!(!dap.reset_target().unwrap());
        assert_eq!(dap.transport().requests[0], vec![0x09, 0xF4, 0x01]);
        assert_eq!(dap.transport().requests[1], vec![0x0A]);
    }

    #[test]
    fn tiny_packet_sizes_are_ignored() {
        let mut dap = dap();
        dap.set_packet_size(8);
        assert_eq!(dap.packet_size(), DEFAULT_PACKET_SIZE);
        dap.set_packet_size(1024);
        assert_eq!(dap.block_capacity(), 254);
    }

    #[test]
    fn block_capacity_fits_the_count_field() {
        let mut dap = dap();
        dap.set_packet_size(1 << 20);
        assert_eq!(dap.block_capacity(), u16::MAX as usize);
    }

    #[test]
    fn capabilities_include_swo_buffer_size() {
        let mut dap = dap();
        dap.transport_mut().respond(&[0x00, 0x01, 0x41]);
        dap.transport_mut().respond(&[0x00, 0x04, 0x00, 0x08, 0x00, 0x00]);
        let caps = dap.capabilities().unwrap();
        assert!(caps.swd);
        assert!(caps.swo_streaming);
        assert_eq!(caps.swo_trace_buffer_size, 2048);
        assert_eq!(dap.transport().requests, vec![vec![0x00, 0xF0], vec![0x00, 0xFD]]);
    }
}
