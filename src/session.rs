//! SWD session on top of a CMSIS-DAP probe: connect, disconnect, reset and
//! probe information.

use std::time::Duration;

use bitvec::prelude::*;

use crate::cmsisdap::commands::general::info::{Capabilities, InfoId};
use crate::cmsisdap::commands::packet::DEFAULT_PACKET_SIZE;
use crate::cmsisdap::commands::swj::pins::Pins;
use crate::cmsisdap::commands::transfer::configure::ConfigureRequest;
use crate::cmsisdap::tools::supported_vendor_ids;
use crate::cmsisdap::{CmsisDap, CmsisDapError};
use crate::dp::{Abort, Ctrl, DebugPortInfo, Dpidr, ABORT_ADDR, CTRL_STAT_ADDR, DPIDR_ADDR};
use crate::register::{resolve, Port};
use crate::transport::Transport;

/// Words read from DPIDR and CTRL/STAT while connecting. Only the first one
/// matters, but probes expect the full block.
const CONNECT_READ_WORDS: usize = 25;

/// Number of times `hold_reset` drives nRESET before giving up.
const HOLD_RESET_ATTEMPTS: usize = 2;

/// JTAG-to-SWD switch sequence, sent LSB first.
const JTAG_TO_SWD: u16 = 0xE79E;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Maximum SWD clock frequency.
    pub swj_clock_hz: u32,
    /// Idle cycles after each transfer.
    pub idle_cycles: u8,
    /// Times the probe retries a transfer answered with WAIT.
    pub wait_retry: u16,
    /// Times the probe retries a value match read.
    pub match_retry: u16,
    /// Settle time for DAP_SWJ_Pins, in microseconds.
    pub pin_wait_us: u32,
    /// How long `reset` holds nRESET low.
    pub reset_pulse: Duration,
    /// Report size until the probe tells us its own.
    pub packet_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            swj_clock_hz: 1_000_000,
            idle_cycles: 2,
            wait_retry: 0x50,
            match_retry: 0,
            pin_wait_us: 5000,
            reset_pulse: Duration::from_millis(47),
            packet_size: DEFAULT_PACKET_SIZE,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

/// Protocol version, product name and packet limits of a probe.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FirmwareInfo {
    pub protocol_version: String,
    pub product_name: String,
    pub max_packet_count: u32,
    pub max_packet_size: u32,
}

/// Everything a probe reports through DAP_Info.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DapInfo {
    pub firmware: FirmwareInfo,
    pub target_device_name: String,
    pub target_device_vendor: String,
    pub target_board_name: String,
    pub target_board_vendor: String,
    pub product_name: String,
    pub vendor_name: String,
    pub protocol_version: String,
    pub product_firmware_version: String,
    pub serial_number: String,
    pub capabilities: Capabilities,
}

/// A debug session with one target, through one probe.
///
/// Owns the probe, its buffers and the AP bank selection cache. Callers
/// sharing a session must serialize access to it as a whole.
///
/// The DAP command layer is not reachable from outside the crate, so
/// register writes always go through the cache:
///
/// ```compile_fail
/// fn raw<T: dapper::Transport>(session: &mut dapper::Session<T>) {
///     let _ = session.dap();
/// }
/// ```
pub struct Session<T> {
    pub(crate) dap: CmsisDap<T>,
    config: SessionConfig,
    state: SessionState,
    /// Last value written to DP SELECT, `None` when unknown.
    pub(crate) last_selected_ap: Option<u32>,
    debug_port: Option<DebugPortInfo>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::default())
    }

    pub fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            dap: CmsisDap::with_packet_size(transport, config.packet_size),
            config,
            state: SessionState::Disconnected,
            last_selected_ap: None,
            debug_port: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// What the last successful `connect` read from the debug port.
    pub fn debug_port(&self) -> Option<DebugPortInfo> {
        self.debug_port
    }

    pub(crate) fn dap(&mut self) -> &mut CmsisDap<T> {
        &mut self.dap
    }

    pub fn into_transport(self) -> T {
        self.dap.into_transport()
    }

    /// Brings up SWD and identifies the debug port.
    ///
    /// Any failure aborts the sequence and leaves the session disconnected.
    pub fn connect(&mut self) -> Result<DebugPortInfo, CmsisDapError> {
        self.last_selected_ap = None;
        self.debug_port = None;
        self.state = SessionState::Connecting;

        match self.connect_sequence() {
            Ok(info) => {
                self.state = SessionState::Connected;
                self.debug_port = Some(info);
                tracing::info!("SWD connected");
                Ok(info)
            }
            Err(e) => {
                tracing::warn!("SWD connect failed: {}", e);
                self.state = SessionState::Disconnected;
                self.last_selected_ap = None;
                Err(e)
            }
        }
    }

    fn connect_sequence(&mut self) -> Result<DebugPortInfo, CmsisDapError> {
        self.dap.connect_swd()?;
        self.dap.set_swj_clock(self.config.swj_clock_hz)?;
        self.dap.transfer_configure(ConfigureRequest {
            idle_cycles: self.config.idle_cycles,
            wait_retry: self.config.wait_retry,
            match_retry: self.config.match_retry,
        })?;
        self.dap.configure_swd()?;

        self.swd_line_reset()?;
        self.dap.swj_sequence(JTAG_TO_SWD.to_le_bytes().view_bits::<Lsb0>())?;
        self.swd_line_reset()?;
        self.dap.swj_sequence(&bitvec![u8, Lsb0; 0; 8])?;

        let dpidr = Dpidr(self.read_dp_block(DPIDR_ADDR)?);
        tracing::info!(
            "DPIDR {:#010x}: partno {:#x}, version {}, revision {}, mindp {}",
            dpidr.0,
            dpidr.part_no(),
            dpidr.version(),
            dpidr.revision(),
            dpidr.min()
        );

        let ctrl_stat = Ctrl(self.read_dp_block(CTRL_STAT_ADDR)?);
        if ctrl_stat.has_sticky_errors() {
            tracing::warn!("Sticky errors set after connect: {:?}", ctrl_stat);
        } else {
            tracing::debug!("CTRL/STAT: {:?}", ctrl_stat);
        }

        Ok(DebugPortInfo { dpidr, ctrl_stat })
    }

    /// At least 50 clocks with SWDIO high.
    fn swd_line_reset(&mut self) -> Result<(), CmsisDapError> {
        self.dap.swj_sequence(&bitvec![u8, Lsb0; 1; 256])
    }

    fn read_dp_block(&mut self, address: u32) -> Result<u32, CmsisDapError> {
        let mut words = [0u32; CONNECT_READ_WORDS];
        self.dap.read_block(resolve(Port::Dp, address)?, &mut words)?;
        Ok(words[0])
    }

    /// Ends the session. The session is disconnected afterwards even if the
    /// probe reports a failure.
    pub fn disconnect(&mut self) -> Result<(), CmsisDapError> {
        let result = self.dap.disconnect();
        self.state = SessionState::Disconnected;
        self.last_selected_ap = None;
        self.debug_port = None;
        tracing::debug!("SWD disconnected");
        result
    }

    /// Resets the probe itself. Works in any session state.
    pub fn probe_reset(&mut self) -> Result<(), CmsisDapError> {
        self.last_selected_ap = None;
        self.dap.probe_reset()
    }

    /// Drives nRESET to `level` (false holds the target in reset) and reads
    /// it back, trying twice.
    ///
    /// Succeeds even if the pin never reaches `level`.
    pub fn hold_reset(&mut self, level: bool) -> Result<(), CmsisDapError> {
        let wait_us = self.config.pin_wait_us;
        let mut pins = self.dap.swj_pins(Pins(0), Pins(0), wait_us)?;

        for _ in 0..HOLD_RESET_ATTEMPTS {
            let mut output = pins;
            output.set_nreset(level);
            pins = self.dap.swj_pins(output, Pins::nreset_only(), wait_us)?;
            if pins.nreset() == level {
                return Ok(());
            }
        }

        tracing::warn!("nRESET did not settle to {} (pins {:?})", level, pins);
        Ok(())
    }

    /// Pulses nRESET low for the configured time.
    pub fn reset(&mut self) -> Result<(), CmsisDapError> {
        self.last_selected_ap = None;
        self.hold_reset(false)?;
        std::thread::sleep(self.config.reset_pulse);
        self.hold_reset(true)
    }

    /// Writes DP ABORT, typically [`Abort::clear_sticky_errors`] after a
    /// FAULT response.
    pub fn write_abort(&mut self, abort: Abort) -> Result<(), CmsisDapError> {
        if self.state != SessionState::Connected {
            return Err(CmsisDapError::NotConnected);
        }
        tracing::debug!("Writing ABORT {:#x} (DP {:#x})", abort.0, ABORT_ADDR);
        self.dap.write_abort(abort.0)
    }

    /// Queries protocol version, product name and packet limits, and starts
    /// using the reported packet size.
    pub fn firmware_info(&mut self) -> Result<FirmwareInfo, CmsisDapError> {
        let info = FirmwareInfo {
            protocol_version: self.dap.info_string(InfoId::ProtocolVersion)?,
            product_name: self.dap.info_string(InfoId::ProductName)?,
            max_packet_count: self.dap.info_value(InfoId::PacketCount)?,
            max_packet_size: self.dap.info_value(InfoId::PacketSize)?,
        };

        if info.max_packet_size != 0 {
            self.dap.set_packet_size(info.max_packet_size as usize);
        }
        Ok(info)
    }

    pub fn capabilities(&mut self) -> Result<Capabilities, CmsisDapError> {
        self.dap.capabilities()
    }

    /// Reads every DAP_Info parameter.
    pub fn probe_dap_info(&mut self) -> Result<DapInfo, CmsisDapError> {
        let firmware = self.firmware_info()?;
        let dap = &mut self.dap;
        Ok(DapInfo {
            target_device_name: dap.info_string(InfoId::TargetDeviceName)?,
            target_device_vendor: dap.info_string(InfoId::TargetDeviceVendor)?,
            target_board_name: dap.info_string(InfoId::TargetBoardName)?,
            target_board_vendor: dap.info_string(InfoId::TargetBoardVendor)?,
            product_name: dap.info_string(InfoId::ProductName)?,
            vendor_name: dap.info_string(InfoId::VendorName)?,
            protocol_version: dap.info_string(InfoId::ProtocolVersion)?,
            product_firmware_version: dap.info_string(InfoId::ProductFirmwareVersion)?,
            serial_number: dap.info_string(InfoId::SerialNumber)?,
            capabilities: dap.capabilities()?,
            firmware,
        })
    }

    pub fn supported_vendor_ids(&self) -> &'static [u16] {
        supported_vendor_ids()
    }
}
