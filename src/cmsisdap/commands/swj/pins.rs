use super::super::packet::Packet;
use super::super::{status_byte, CommandId, Request, SendError};

bitfield::bitfield! {
    /// SWJ pin bits as used by DAP_SWJ_Pins, both for output/select masks
    /// and for the pin state the probe reads back.
    #[derive(Copy, Clone, Default, PartialEq, Eq)]
    pub struct Pins(u8);
    impl Debug;
    pub nreset, set_nreset: 7;
    pub ntrst, set_ntrst: 5;
    pub tdo, set_tdo: 3;
    pub tdi, set_tdi: 2;
    pub swdio_tms, set_swdio_tms: 1;
    pub swclk_tck, set_swclk_tck: 0;
}

impl Pins {
    pub fn nreset_only() -> Self {
        let mut pins = Pins(0);
        pins.set_nreset(true);
        pins
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SWJPinsRequest {
    /// Values the pins selected in `select` will be set to.
    pub output: Pins,
    /// Pins to drive. An empty selection only reads the pin state back.
    pub select: Pins,
    /// Time in microseconds to wait for the selected pins to settle.
    pub wait_us: u32,
}

impl Request for SWJPinsRequest {
    const COMMAND_ID: CommandId = CommandId::SwjPins;

    type Response = Pins;

    fn to_bytes(&self, buffer: &mut Packet, offset: usize) -> usize {
        buffer.pack_u8(offset, self.output.0);
        buffer.pack_u8(offset + 1, self.select.0);
        buffer.pack_u32(offset + 2, self.wait_us);
        6
    }

    fn parse_response(&self, buffer: &[u8]) -> Result<Self::Response, SendError> {
        status_byte(buffer).map(Pins)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_layout() {
        let mut packet = Packet::default();
        let request = SWJPinsRequest {
            output: Pins(0x80),
            select: Pins::nreset_only(),
            wait_us: 5000,
        };
        assert_eq!(request.to_bytes(&mut packet, 1), 6);
        assert_eq!(&packet.as_slice()[1..7], &[0x80, 0x80, 0x88, 0x13, 0x00, 0x00]);
    }
}
