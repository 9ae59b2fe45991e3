//! Implementation of the DAP_SWJ_Sequence command

use bitvec::prelude::*;

use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

/// Longest sequence a single command can carry.
pub const MAX_SEQUENCE_BITS: usize = 256;

#[derive(Clone, Copy, Debug)]
pub struct SequenceRequest {
    /// Number of bits to clock out; 0 encodes 256.
    bit_count: u8,
    data: [u8; 32],
}

impl SequenceRequest {
    /// Builds a request clocking out `bits` LSB first.
    ///
    /// Returns `None` for empty sequences and those longer than
    /// [`MAX_SEQUENCE_BITS`].
    pub fn new(bits: &BitSlice<u8, Lsb0>) -> Option<Self> {
        if bits.is_empty() || bits.len() > MAX_SEQUENCE_BITS {
            return None;
        }

        let mut data = [0u8; 32];
        data.view_bits_mut::<Lsb0>()[..bits.len()].copy_from_bitslice(bits);

        Some(Self {
            bit_count: (bits.len() % MAX_SEQUENCE_BITS) as u8,
            data,
        })
    }

    pub fn bit_len(&self) -> usize {
        match self.bit_count {
            0 => MAX_SEQUENCE_BITS,
            n => n as usize,
        }
    }
}

impl Request for SequenceRequest {
    const COMMAND_ID: CommandId = CommandId::SwjSequence;

    type Response = u8;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        let transfer_len_bytes = self.bit_len().div_ceil(8);
        buffer.pack_u8(offset, self.bit_count);
        buffer.pack_bytes(offset + 1, &self.data[..transfer_len_bytes]);

        // bit_count + data
        1 + transfer_len_bytes
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        status_byte(buffer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_length_sequence_encodes_as_zero() {
        let ones = bitvec![u8, Lsb0; 1; 256];
        let request = SequenceRequest::new(&ones).unwrap();

        let mut packet = Packet::default();
        assert_eq!(request.to_bytes(&mut packet, 1), 33);
        assert_eq!(packet.as_slice()[1], 0);
        assert!(packet.as_slice()[2..34].iter().all(|&b| b == 0xFF));
    }

    #[test]
    fn partial_byte_is_rounded_up() {
        let bits = bitvec![u8, Lsb0; 1; 51];
        let request = SequenceRequest::new(&bits).unwrap();

        let mut packet = Packet::default();
        assert_eq!(request.to_bytes(&mut packet, 1), 8);
        assert_eq!(packet.as_slice()[1], 51);
        assert_eq!(&packet.as_slice()[2..9], &[0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x07]);
    }

    #[test]
    fn activation_code_is_sent_lsb_first() {
        let code = 0xE79Eu16.to_le_bytes();
        let request = SequenceRequest::new(code.view_bits::<Lsb0>()).unwrap();

        let mut packet = Packet::default();
        assert_eq!(request.to_bytes(&mut packet, 1), 3);
        assert_eq!(&packet.as_slice()[1..4], &[16, 0x9E, 0xE7]);
    }

    #[test]
    fn rejects_empty_and_oversized() {
        assert!(SequenceRequest::new(BitSlice::empty()).is_none());
        assert!(SequenceRequest::new(&bitvec![u8, Lsb0; 0; 257]).is_none());
    }
}
