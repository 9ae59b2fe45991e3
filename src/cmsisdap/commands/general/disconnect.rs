use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

#[derive(Clone, Copy, Debug)]
pub struct DisconnectRequest;

impl Request for DisconnectRequest {
    const COMMAND_ID: CommandId = CommandId::Disconnect;

    type Response = u8;

    fn to_bytes(&self, _buffer: &mut Packet, _offset: usize) -> usize {
        0
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        status_byte(buffer)
    }
}
