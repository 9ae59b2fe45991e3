//! Debug Port registers.

use bitfield::bitfield;

pub const ABORT_ADDR: u32 = 0x0;
pub const DPIDR_ADDR: u32 = 0x0;
pub const CTRL_STAT_ADDR: u32 = 0x4;
pub const SELECT_ADDR: u32 = 0x8;

bitfield! {
    /// ABORT, Abort register (see ADI v5.2 B2.2.1)
    #[derive(Copy, Clone, Default, Eq, PartialEq)]
    pub struct Abort(u32);
    impl Debug;
    /// Clear CTRL/STAT.STICKYORUN.
    pub _, set_orunerrclr: 4;
    /// Clear CTRL/STAT.WDATAERR.
    pub _, set_wderrclr: 3;
    /// Clear CTRL/STAT.STICKYERR.
    pub _, set_stkerrclr: 2;
    /// Clear CTRL/STAT.STICKYCMP.
    pub _, set_stkcmpclr: 1;
    /// Abort the current AP transaction. Only after extended WAIT responses.
    pub _, set_dapabort: 0;
}

impl Abort {
    /// Clears every sticky error flag without aborting the AP transaction.
    pub fn clear_sticky_errors() -> Self {
        let mut abort = Abort(0);
        abort.set_orunerrclr(true);
        abort.set_wderrclr(true);
        abort.set_stkerrclr(true);
        abort.set_stkcmpclr(true);
        abort
    }
}

bitfield! {
    /// CTRL/STAT, Control/Status register (see ADI v5.2 B2.2.2)
    #[derive(Copy, Clone, Default, Eq, PartialEq)]
    pub struct Ctrl(u32);
    impl Debug;
    pub csyspwrupack, _: 31;
    pub csyspwrupreq, set_csyspwrupreq: 30;
    pub cdbgpwrupack, _: 29;
    pub cdbgpwrupreq, set_cdbgpwrupreq: 28;
    pub cdbgrstack, _: 27;
    pub c_dbg_rst_req, set_c_dbg_rst_req: 26;
    pub u16, trn_cnt, set_trn_cnt: 23, 12;
    pub u8, mask_lane, set_mask_lane: 11, 8;
    /// Write data error: parity or framing error on a write data phase.
    pub w_data_err, _ : 7;
    /// The last AP read or RDBUFF read was acknowledged OK.
    pub read_ok, _ : 6;
    /// An AP transaction returned an error.
    pub sticky_err, _: 5;
    /// A pushed-compare mismatch or pushed-verify match happened.
    pub sticky_cmp, _: 4;
    pub u8, trn_mode, _: 3, 2;
    /// An overrun happened while overrun detection was enabled.
    pub sticky_orun, _: 1;
    pub orun_detect, set_orun_detect: 0;
}

impl Ctrl {
    /// True if any sticky error flag is raised.
    pub fn has_sticky_errors(&self) -> bool {
        self.sticky_err() || self.sticky_cmp() || self.sticky_orun() || self.w_data_err()
    }
}

bitfield! {
    /// SELECT, AP Select register (see ADI v5.2 B2.2.9)
    #[derive(Copy, Clone, Default, Eq, PartialEq)]
    pub struct Select(u32);
    impl Debug;
    /// Index of the AP that AP transactions go to.
    pub u8, ap_sel, set_ap_sel: 31, 24;
    /// Four-word register bank inside the selected AP.
    pub u8, ap_bank_sel, set_ap_bank_sel: 7, 4;
    pub u8, dp_bank_sel, set_dp_bank_sel: 3, 0;
}

impl Select {
    /// The SELECT value needed to reach the AP register at a CoreSight
    /// `address` (AP index in bits 24..31, bank in bits 4..7).
    pub fn for_ap_address(address: u32) -> Self {
        Select(address & 0xFF00_00F0)
    }
}

bitfield! {
    /// DPIDR, Debug Port Identification register (see ADI v5.2 B2.2.5)
    #[derive(Copy, Clone, Eq, PartialEq)]
    pub struct Dpidr(u32);
    impl Debug;
    /// Revision code. The meaning of this field is IMPLEMENTATION DEFINED.
    pub u8, revision, _: 31, 28;
    /// Part Number for the Debug Port.
    pub u8, part_no, _: 27, 20;
    /// Minimal Debug Port (MINDP): transaction counter and pushed
    /// operations are not implemented.
    pub min, _: 16;
    /// Version of the Debug Port architecture implemented (DPv1..DPv3).
    pub u8, version, _: 15, 12;
    /// JEP106 code of the designer of the DP.
    pub u16, designer, _: 11, 1;
}

impl std::fmt::Display for Dpidr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "DPIDR(idr={:#010x}, partno={:#x}, version={}, revision={}, mindp={})",
            self.0,
            self.part_no(),
            self.version(),
            self.revision(),
            self.min()
        )
    }
}

/// What `connect` learned about the debug port.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DebugPortInfo {
    pub dpidr: Dpidr,
    /// CTRL/STAT as read right after connecting, for its sticky error bits.
    pub ctrl_stat: Ctrl,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dpidr_fields_of_a_cortex_m4() {
        let idr = Dpidr(0x2BA0_1477);
        assert_eq!(idr.part_no(), 0xBA);
        assert_eq!(idr.version(), 1);
        assert_eq!(idr.revision(), 2);
        assert!(!idr.min());
        assert_eq!(idr.designer(), 0x23B);
    }

    #[test]
    fn dpidr_min_dp_flag() {
        assert!(Dpidr(0x0BC1_2477).min());
    }

    #[test]
    fn select_keeps_ap_and_bank_only() {
        let select = Select::for_ap_address(0x0200_00FC);
        assert_eq!(select.0, 0x0200_00F0);
        assert_eq!(select.ap_sel(), 2);
        assert_eq!(select.ap_bank_sel(), 0xF);
        assert_eq!(select.dp_bank_sel(), 0);
    }

    #[test]
    fn sticky_errors() {
        assert!(!Ctrl(0xF000_0040).has_sticky_errors());
        assert!(Ctrl(0xF000_0020).has_sticky_errors());
        assert_eq!(Abort::clear_sticky_errors().0, 0x1E);
    }
}
