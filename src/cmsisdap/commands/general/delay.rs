use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

/// DAP_Delay: wait on the probe side for a number of microseconds.
#[derive(Clone, Copy, Debug)]
pub struct DelayRequest {
    pub delay_us: u16,
}

impl Request for DelayRequest {
    const COMMAND_ID: CommandId = CommandId::Delay;

    type Response = u8;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u16(offset, self.delay_us);
        2
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        status_byte(buffer)
    }
}
