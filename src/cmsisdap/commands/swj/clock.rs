use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

#[derive(Clone, Copy, Debug)]
pub struct SWJClockRequest {
    pub clock_speed_hz: u32,
}

impl Request for SWJClockRequest {
    const COMMAND_ID: CommandId = CommandId::SwjClock;

    type Response = u8;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u32(offset, self.clock_speed_hz);
        4
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        status_byte(buffer)
    }
}
