use crate::cmsisdap::CmsisDapError;
use crate::session::Session;
use crate::transport::Transport;

/// IDR, Identification register, at the top of every AP's register space.
pub const IDR_ADDR: u8 = 0xFC;

/// An access port, addressed through the CoreSight facade of a [`Session`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Ap {
    index: u8,
}

impl Ap {
    pub fn new(index: u8) -> Self {
        Self { index }
    }

    pub fn index(&self) -> u8 {
        self.index
    }

    /// The CoreSight address of register `addr` of this AP.
    pub fn address(&self, addr: u8) -> u32 {
        (self.index as u32) << 24 | addr as u32
    }

    pub fn read<T: Transport>(&self, session: &mut Session<T>, addr: u8) -> Result<u32, CmsisDapError> {
        session.coresight_read(true, self.address(addr))
    }

    pub fn write<T: Transport>(&self, session: &mut Session<T>, addr: u8, val: u32) -> Result<(), CmsisDapError> {
        session.coresight_write(true, self.address(addr), val)
    }
}
