use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

/// DAP_Connect. Only SWD is ever requested.
#[derive(Clone, Copy, Debug)]
pub enum ConnectRequest {
    UseSwd = 0x01,
}

impl Request for ConnectRequest {
    const COMMAND_ID: CommandId = CommandId::Connect;

    /// The port the probe initialised: 1 for SWD, 0 on failure.
    type Response = u8;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u8(offset, *self as u8);
        1
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        status_byte(buffer)
    }
}
