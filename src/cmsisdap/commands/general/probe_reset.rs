use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

/// Vendor command resetting the probe itself (not the target).
#[derive(Clone, Copy, Debug)]
pub struct ProbeResetRequest {
    /// 0 for a plain probe reset, 1 to enter ISP mode.
    pub mode: u8,
}

impl Request for ProbeResetRequest {
    const COMMAND_ID: CommandId = CommandId::ProbeReset;

    type Response = ProbeResetResponse;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u8(offset, self.mode);
        1
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        Ok(ProbeResetResponse {
            status: status_byte(buffer)?,
            length: *buffer.get(1).ok_or(SendError::NotEnoughData)?,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProbeResetResponse {
    pub status: u8,
    pub length: u8,
}
