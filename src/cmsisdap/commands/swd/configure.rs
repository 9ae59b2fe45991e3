use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

/// DAP_SWD_Configure with the default turnaround of one clock and no data
/// phase on WAIT/FAULT.
#[derive(Clone, Copy, Debug)]
pub struct ConfigureRequest;

impl Request for ConfigureRequest {
    const COMMAND_ID: CommandId = CommandId::SwdConfigure;

    type Response = u8;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u8(offset, 0);
        1
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        status_byte(buffer)
    }
}
