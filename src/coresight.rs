//! Register access for a debugger: DP registers directly, AP registers
//! through a cached DP SELECT.

use crate::cmsisdap::CmsisDapError;
use crate::dp::{Select, SELECT_ADDR};
use crate::register::{resolve, Port, RegisterId};
use crate::session::{Session, SessionState};
use crate::transport::Transport;

/// Bits of a CoreSight AP address picking the register inside a bank.
const AP_REGISTER_MASK: u32 = 0xC;

impl<T: Transport> Session<T> {
    /// Reads a DP register (`access_port == false`) or the AP register at
    /// CoreSight `address` (AP index in bits 24..31, bank in bits 4..7).
    pub fn coresight_read(&mut self, access_port: bool, address: u32) -> Result<u32, CmsisDapError> {
        let register = self.prepare_access(access_port, address)?;
        self.dap.read_register(register)
    }

    /// Writes a register, addressed like [`Session::coresight_read`].
    pub fn coresight_write(&mut self, access_port: bool, address: u32, value: u32) -> Result<(), CmsisDapError> {
        let register = self.prepare_access(access_port, address)?;
        if !access_port && address == SELECT_ADDR {
            self.last_selected_ap = None;
            self.dap.write_register(register, value)?;
            self.track_select(value);
            return Ok(());
        }
        self.dap.write_register(register, value)
    }

    /// Reads `data.len()` words from one AP or DP register, e.g. the data
    /// register of a MEM-AP with auto-increment.
    pub fn coresight_read_block(
        &mut self,
        access_port: bool,
        address: u32,
        data: &mut [u32],
    ) -> Result<(), CmsisDapError> {
        let register = self.prepare_access(access_port, address)?;
        self.dap.read_block(register, data)
    }

    pub fn coresight_write_block(&mut self, access_port: bool, address: u32, data: &[u32]) -> Result<(), CmsisDapError> {
        let register = self.prepare_access(access_port, address)?;
        if !access_port && address == SELECT_ADDR {
            self.last_selected_ap = None;
            self.dap.write_block(register, data)?;
            if let Some(&value) = data.last() {
                self.track_select(value);
            }
            return Ok(());
        }
        self.dap.write_block(register, data)
    }

    fn prepare_access(&mut self, access_port: bool, address: u32) -> Result<RegisterId, CmsisDapError> {
        if self.state() != SessionState::Connected {
            return Err(CmsisDapError::NotConnected);
        }

        if access_port {
            self.select_ap(address)?;
            resolve(Port::Ap, address & AP_REGISTER_MASK)
        } else {
            resolve(Port::Dp, address)
        }
    }

    /// Points DP SELECT at the AP and bank of `address`, unless it already
    /// does.
    fn select_ap(&mut self, address: u32) -> Result<(), CmsisDapError> {
        let select = Select::for_ap_address(address);
        if self.last_selected_ap == Some(select.0) {
            return Ok(());
        }

        // Unknown until the write succeeds.
        self.last_selected_ap = None;
        self.dap.write_register(resolve(Port::Dp, SELECT_ADDR)?, select.0)?;
        self.last_selected_ap = Some(select.0);

        tracing::info!("Selected AP: {}, Bank: {:x}", select.ap_sel(), select.ap_bank_sel());
        Ok(())
    }

    /// Records a SELECT value written directly to the DP. A value with
    /// DPBANKSEL bits set does not match any AP access, so the cache is
    /// left unknown.
    fn track_select(&mut self, value: u32) {
        let select = Select::for_ap_address(value);
        self.last_selected_ap = (select.0 == value).then_some(select.0);
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use crate::ap::{Ap, IDR_ADDR};
    use crate::cmsisdap::commands::transfer::Ack;
    use crate::cmsisdap::CmsisDapError;
    use crate::session::tests::connected;

    const SELECT_WRITE: u8 = 0x08;
    const OK_WRITE: [u8; 3] = [0x05, 0x01, 0x01];

    fn select_writes(requests: &[Vec<u8>]) -> Vec<u32> {
        requests
            .iter()
            .filter(|r| r[3] == SELECT_WRITE)
            .map(|r| u32::from_le_bytes([r[4], r[5], r[6], r[7]]))
            .collect()
    }

    #[test]
    fn same_bank_selects_once() {
        let mut session = connected();
        for _ in 0..3 {
            session.dap().transport_mut().respond(&OK_WRITE);
        }

        session.coresight_write(true, 0x0100_0004, 0xA).unwrap();
        session.coresight_write(true, 0x0100_0008, 0xB).unwrap();

        let requests = session.dap().transport().requests.clone();
        assert_eq!(select_writes(&requests), vec![0x0100_0000]);
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[1], vec![0x05, 0x00, 0x01, 0x05, 0x0A, 0x00, 0x00, 0x00]);
        assert_eq!(requests[2], vec![0x05, 0x00, 0x01, 0x09, 0x0B, 0x00, 0x00, 0x00]);
    }

    #[test]
    fn direct_select_write_updates_cache() {
        let mut session = connected();
        for _ in 0..5 {
            session.dap().transport_mut().respond(&OK_WRITE);
        }

        session.coresight_write(true, 0x0100_0004, 0xA).unwrap();
        session.coresight_write(false, 0x8, 0x0200_0000).unwrap();
        assert_eq!(session.last_selected_ap, Some(0x0200_0000));
        session.coresight_write(true, 0x0100_0004, 0xB).unwrap();

        let requests = session.dap().transport().requests.clone();
        assert_eq!(select_writes(&requests), vec![0x0100_0000, 0x0200_0000, 0x0100_0000]);
        assert_eq!(requests.len(), 5);
    }

    #[test]
    fn select_write_with_dp_bank_forgets_cache() {
        let mut session = connected();
        for _ in 0..3 {
            session.dap().transport_mut().respond(&OK_WRITE);
        }

        session.coresight_write(true, 0x0100_0004, 0xA).unwrap();
        session.coresight_write(false, 0x8, 0x0100_0001).unwrap();
        assert_eq!(session.last_selected_ap, None);

        session.dap().transport_mut().respond(&OK_WRITE).respond(&OK_WRITE);
        session.coresight_write(true, 0x0100_0004, 0xB).unwrap();
        let requests = session.dap().transport().requests.clone();
        assert_eq!(select_writes(&requests), vec![0x0100_0000, 0x0100_0001, 0x0100_0000]);
    }

    #[test]
    fn different_bank_selects_again() {
        let mut session = connected();
        for _ in 0..4 {
            session.dap().transport_mut().respond(&OK_WRITE);
        }

        session.coresight_write(true, 0x0000_0004, 1).unwrap();
        session.coresight_write(true, 0x0000_00F4, 2).unwrap();

        let requests = session.dap().transport().requests.clone();
        assert_eq!(select_writes(&requests), vec![0x0000_0000, 0x0000_00F0]);
        assert_eq!(session.last_selected_ap, Some(0xF0));
    }

    #[test]
    fn dp_access_skips_select() {
        let mut session = connected();
        session
            .dap()
            .transport_mut()
            .respond(&[0x05, 0x01, 0x01, 0x40, 0x00, 0x00, 0xF0]);

        assert_eq!(session.coresight_read(false, 0x4).unwrap(), 0xF000_0040);
        assert_eq!(session.dap().transport().requests, vec![vec![0x05, 0x00, 0x01, 0x06]]);
        assert_eq!(session.last_selected_ap, None);
    }

    #[test]
    fn ap_idr_read_through_ap_handle() {
        let mut session = connected();
        session
            .dap()
            .transport_mut()
            .respond(&OK_WRITE)
            .respond(&[0x05, 0x01, 0x01, 0x11, 0x00, 0x77, 0x24]);

        let idr = Ap::new(0).read(&mut session, IDR_ADDR).unwrap();
        assert_eq!(idr, 0x2477_0011);

        let requests = session.dap().transport().requests.clone();
        assert_eq!(select_writes(&requests), vec![0x0000_00F0]);
        assert_eq!(requests[1], vec![0x05, 0x00, 0x01, 0x0F]);
    }

    #[test]
    fn wait_on_ap_read() {
        let mut session = connected();
        session
            .dap()
            .transport_mut()
            .respond(&OK_WRITE)
            .respond(&[0x05, 0x00, 0x02]);

        assert!(matches!(
            session.coresight_read(true, 0x0C),
            Err(CmsisDapError::WaitResponse)
        ));
    }

    #[test]
    fn fault_on_select_leaves_bank_unknown() {
        let mut session = connected();
        session.dap().transport_mut().respond(&[0x05, 0x00, 0x04]);

        assert!(matches!(
            session.coresight_write(true, 0x0200_0000, 0),
            Err(CmsisDapError::FaultResponse { ack: Ack::Fault })
        ));
        assert_eq!(session.last_selected_ap, None);
    }

    #[test]
    fn unknown_dp_register() {
        let mut session = connected();
        assert!(matches!(
            session.coresight_read(false, 0x10),
            Err(CmsisDapError::AddressResolution { address: 0x10, .. })
        ));
        assert!(session.dap().transport().requests.is_empty());
    }

    #[test]
    fn block_read_from_ap_data_register() {
        let mut session = connected();
        session.dap().transport_mut().respond(&OK_WRITE).respond_block_read(&[1, 2, 3]);

        let mut data = [0u32; 3];
        session.coresight_read_block(true, 0x0000_000C, &mut data).unwrap();
        assert_eq!(data, [1, 2, 3]);
    }
}
