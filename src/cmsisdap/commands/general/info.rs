use super::super::packet::Packet;
use super::super::{read_u16, read_u32, CommandId, Request, SendError};

/// DAP_Info identifiers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InfoId {
    VendorName = 0x01,
    ProductName = 0x02,
    SerialNumber = 0x03,
    ProtocolVersion = 0x04,
    TargetDeviceVendor = 0x05,
    TargetDeviceName = 0x06,
    TargetBoardVendor = 0x07,
    TargetBoardName = 0x08,
    ProductFirmwareVersion = 0x09,
    Capabilities = 0xF0,
    SwoTraceBufferSize = 0xFD,
    PacketCount = 0xFE,
    PacketSize = 0xFF,
}

/// Query a string parameter.
#[derive(Clone, Copy, Debug)]
pub struct InfoStringRequest(pub InfoId);

impl Request for InfoStringRequest {
    const COMMAND_ID: CommandId = CommandId::Info;

    type Response = String;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u8(offset, self.0 as u8);
        1
    }

    /// The first byte is a length indicator including the zero terminator.
    /// A length of zero means the probe does not provide the value. Bytes
    /// that are not UTF-8 are replaced rather than rejected.
    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        match buffer.first() {
            None => Err(SendError::NotEnoughData),
            Some(0) => Ok("N/A".to_owned()),
            Some(1) => Ok(String::new()),
            Some(&n) => {
                let bytes = buffer.get(1..n as usize).ok_or(SendError::NotEnoughData)?;
                Ok(String::from_utf8_lossy(bytes).into_owned())
            }
        }
    }
}

/// Query a numeric parameter.
///
/// Missing values decode as zero, which is also what unusual widths decode to.
#[derive(Clone, Copy, Debug)]
pub struct InfoValueRequest(pub InfoId);

impl Request for InfoValueRequest {
    const COMMAND_ID: CommandId = CommandId::Info;

    type Response = u32;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u8(offset, self.0 as u8);
        1
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        match buffer.first() {
            None => Err(SendError::NotEnoughData),
            Some(1) => buffer.get(1).map(|&v| v as u32).ok_or(SendError::NotEnoughData),
            Some(2) => read_u16(buffer, 1).map(u32::from),
            Some(4) => read_u32(buffer, 1),
            Some(_) => Ok(0),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct CapabilitiesRequest;

impl Request for CapabilitiesRequest {
    const COMMAND_ID: CommandId = CommandId::Info;

    type Response = Capabilities;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u8(offset, InfoId::Capabilities as u8);
        1
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        // Only the first info byte is interpreted, whatever the length says.
        let info0 = *buffer.get(1).ok_or(SendError::NotEnoughData)?;
        Ok(Capabilities {
            swd: info0 & 0x01 != 0,
            jtag: info0 & 0x02 != 0,
            swo_uart: info0 & 0x04 != 0,
            manchester: info0 & 0x08 != 0,
            atomic: info0 & 0x10 != 0,
            swo_streaming: info0 & 0x40 != 0,
            swo_trace_buffer_size: 0,
        })
    }
}

/// What the probe says it can do.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Capabilities {
    pub swd: bool,
    pub jtag: bool,
    pub swo_uart: bool,
    pub manchester: bool,
    pub atomic: bool,
    pub swo_streaming: bool,
    /// Filled in from a separate query, see [`InfoId::SwoTraceBufferSize`].
    pub swo_trace_buffer_size: u32,
}
