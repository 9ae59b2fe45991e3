use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

/// DAP_ResetTarget: run the probe's device specific reset sequence.
#[derive(Clone, Copy, Debug)]
pub struct ResetRequest;

impl Request for ResetRequest {
    const COMMAND_ID: CommandId = CommandId::ResetTarget;

    type Response = ResetResponse;

    fn to_bytes(&self, _buffer: &mut Packet, _offset: usize) -> usize {
        0
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        Ok(ResetResponse {
            status: status_byte(buffer)?,
            executed: *buffer.get(1).ok_or(SendError::NotEnoughData)? == 1,
        })
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResetResponse {
    pub status: u8,
    /// Whether a device specific reset sequence is implemented and was run.
    pub executed: bool,
}
