pub mod abort;
pub mod configure;

use super::packet::Packet;
use super::{read_u16, read_u32, CommandId, Request, SendError};

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RW {
    R = 1,
    W = 0,
}

/// Acknowledge reported for the last transfer of a request.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Ack {
    Ok,
    Wait,
    Fault,
    NoAck,
    /// SWD parity or framing error, reported in bit 3.
    ProtocolError,
}

impl Ack {
    pub fn from_response(byte: u8) -> Self {
        if byte & 0x08 != 0 {
            return Ack::ProtocolError;
        }
        match byte & 0x07 {
            1 => Ack::Ok,
            2 => Ack::Wait,
            4 => Ack::Fault,
            _ => Ack::NoAck,
        }
    }
}

/// DAP_Transfer carrying exactly one register access.
///
/// `request` is the raw transfer request byte (APnDP, RnW, A2, A3).
#[derive(Clone, Copy, Debug)]
pub struct TransferRequest {
    request: u8,
    data: Option<u32>,
}

impl TransferRequest {
    pub fn read(request: u8) -> Self {
        Self {
            request: request | (RW::R as u8) << 1,
            data: None,
        }
    }

    pub fn write(request: u8, data: u32) -> Self {
        Self {
            request: request & !((RW::R as u8) << 1),
            data: Some(data),
        }
    }
}

impl Request for TransferRequest {
    const COMMAND_ID: CommandId = CommandId::Transfer;

    type Response = TransferResponse;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        // DAP index is ignored in SWD mode.
        buffer.pack_u8(offset, 0);
        buffer.pack_u8(offset + 1, 1);
        buffer.pack_u8(offset + 2, self.request);
        match self.data {
            Some(data) => {
                buffer.pack_u32(offset + 3, data);
                7
            }
            None => 3,
        }
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        if buffer.len() < 2 {
            return Err(SendError::NotEnoughData);
        }
        let transfer_count = buffer[0];
        let ack = Ack::from_response(buffer[1]);

        // Read data only follows a successful read.
        let data = if self.data.is_none() && ack == Ack::Ok && transfer_count == 1 {
            Some(read_u32(buffer, 2)?)
        } else {
            None
        };

        Ok(TransferResponse {
            transfer_count,
            ack,
            data,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferResponse {
    pub transfer_count: u8,
    pub ack: Ack,
    pub data: Option<u32>,
}

/// One report's worth of DAP_TransferBlock.
#[derive(Debug)]
pub struct TransferBlockRequest<'a> {
    request: u8,
    transfer_count: u16,
    /// Register values to write for writes, empty for reads.
    transfer_data: &'a [u32],
}

impl<'a> TransferBlockRequest<'a> {
    pub fn read(request: u8, transfer_count: u16) -> Self {
        Self {
            request: request | (RW::R as u8) << 1,
            transfer_count,
            transfer_data: &[],
        }
    }

    pub fn write(request: u8, data: &'a [u32]) -> Self {
        Self {
            request: request & !((RW::R as u8) << 1),
            transfer_count: data.len() as u16,
            transfer_data: data,
        }
    }

    pub fn transfer_count(&self) -> u16 {
        self.transfer_count
    }

    fn is_read(&self) -> bool {
        self.request & (RW::R as u8) << 1 != 0
    }
}

impl Request for TransferBlockRequest<'_> {
    const COMMAND_ID: CommandId = CommandId::TransferBlock;

    type Response = TransferBlockResponse;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u8(offset, 0);
        buffer.pack_u16(offset + 1, self.transfer_count);
        buffer.pack_u8(offset + 3, self.request);

        let mut size = 4;
        for word in self.transfer_data {
            buffer.pack_u32(offset + size, *word);
            size += 4;
        }
        size
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        let transfer_count = read_u16(buffer, 0)?;
        let ack = Ack::from_response(*buffer.get(2).ok_or(SendError::NotEnoughData)?);

        let mut transfer_data = Vec::new();
        if self.is_read() && ack == Ack::Ok && transfer_count == self.transfer_count {
            transfer_data.reserve(transfer_count as usize);
            for i in 0..transfer_count as usize {
                transfer_data.push(read_u32(buffer, 3 + i * 4)?);
            }
        }

        Ok(TransferBlockResponse {
            transfer_count,
            ack,
            transfer_data,
        })
    }
}

#[derive(Debug, PartialEq, Eq)]
pub struct TransferBlockResponse {
    pub transfer_count: u16,
    pub ack: Ack,
    pub transfer_data: Vec<u32>,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0x01, Ack::Ok)]
    #[test_case(0x02, Ack::Wait)]
    #[test_case(0x04, Ack::Fault)]
    #[test_case(0x07, Ack::NoAck)]
    #[test_case(0x09, Ack::ProtocolError)]
    fn ack_decoding(byte: u8, ack: Ack) {
        assert_eq!(Ack::from_response(byte), ack);
    }

    #[test]
    fn single_write_layout() {
        let mut packet = Packet::default();
        let request = TransferRequest::write(0x08, 0x0100_00F0);
        assert_eq!(request.to_bytes(&mut packet, 1), 7);
        assert_eq!(&packet.as_slice()[1..8], &[0x00, 0x01, 0x08, 0xF0, 0x00, 0x00, 0x01]);
    }

    #[test]
    fn single_read_sets_rnw() {
        let mut packet = Packet::default();
        assert_eq!(TransferRequest::read(0x0D).to_bytes(&mut packet, 1), 3);
        assert_eq!(&packet.as_slice()[1..4], &[0x00, 0x01, 0x0F]);
    }

    #[test]
    fn single_read_response() {
        let response = TransferRequest::read(0x00)
            .parse_response(&[0x01, 0x01, 0x77, 0x14, 0xA0, 0x2B])
            .unwrap();
        assert_eq!(response.data, Some(0x2BA0_1477));
    }

    #[test]
    fn wait_response_carries_no_data() {
        let response = TransferRequest::read(0x00).parse_response(&[0x00, 0x02]).unwrap();
        assert_eq!(response.ack, Ack::Wait);
        assert_eq!(response.data, None);
    }

    #[test]
    fn block_write_layout() {
        let mut packet = Packet::default();
        let words = [0x1122_3344, 0x5566_7788];
        let request = TransferBlockRequest::write(0x0F, &words);
        assert_eq!(request.to_bytes(&mut packet, 1), 12);
        assert_eq!(
            &packet.as_slice()[1..13],
            &[0x00, 0x02, 0x00, 0x0D, 0x44, 0x33, 0x22, 0x11, 0x88, 0x77, 0x66, 0x55]
        );
    }

    #[test]
    fn short_block_read_is_rejected() {
        let request = TransferBlockRequest::read(0x00, 2);
        let result = request.parse_response(&[0x02, 0x00, 0x01, 0x01, 0x00, 0x00, 0x00]);
        assert!(matches!(result, Err(SendError::NotEnoughData)));
    }
}
