use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

/// DAP_WriteAbort: write the DP ABORT register outside a transfer.
#[derive(Clone, Copy, Debug)]
pub struct WriteAbortRequest {
    pub abort: u32,
}

impl Request for WriteAbortRequest {
    const COMMAND_ID: CommandId = CommandId::WriteAbort;

    type Response = u8;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        // DAP index, ignored for SWD.
        buffer.pack_u8(offset, 0);
        buffer.pack_u32(offset + 1, self.abort);
        5
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        status_byte(buffer)
    }
}
