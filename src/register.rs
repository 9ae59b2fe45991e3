//! Mapping from DP/AP register addresses to the probe's register IDs.

use crate::cmsisdap::CmsisDapError;

/// Which side of the debug interface a register lives on.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Port {
    Dp = 0,
    Ap = 1,
}

/// Register slot 0..=7: DP registers first, then the four registers of the
/// currently selected AP bank.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct RegisterId(u8);

impl RegisterId {
    pub fn port(self) -> Port {
        if self.0 < 4 {
            Port::Dp
        } else {
            Port::Ap
        }
    }

    /// Register offset inside the DP or the AP bank (0, 4, 8 or 0xC).
    pub fn offset(self) -> u8 {
        (self.0 % 4) * 4
    }

    /// The APnDP/A2/A3 bits of a DAP_Transfer request. RnW is left clear.
    pub fn transfer_request(self) -> u8 {
        (self.port() as u8) | self.offset()
    }
}

impl From<RegisterId> for u8 {
    fn from(id: RegisterId) -> u8 {
        id.0
    }
}

/// Looks up the register ID for `address` on `port`.
///
/// Only word-aligned addresses inside a bank (0x0, 0x4, 0x8, 0xC) exist.
pub fn resolve(port: Port, address: u32) -> Result<RegisterId, CmsisDapError> {
    let id = match (port, address) {
        (Port::Dp, 0x0) => 0,
        (Port::Dp, 0x4) => 1,
        (Port::Dp, 0x8) => 2,
        (Port::Dp, 0xC) => 3,
        (Port::Ap, 0x0) => 4,
        (Port::Ap, 0x4) => 5,
        (Port::Ap, 0x8) => 6,
        (Port::Ap, 0xC) => 7,
        _ => return Err(CmsisDapError::AddressResolution { port, address }),
    };
    Ok(RegisterId(id))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    use super::*;

    #[test_case(Port::Dp, 0x0, 0, 0x00)]
    #[test_case(Port::Dp, 0x4, 1, 0x04)]
    #[test_case(Port::Dp, 0x8, 2, 0x08)]
    #[test_case(Port::Dp, 0xC, 3, 0x0C)]
    #[test_case(Port::Ap, 0x0, 4, 0x01)]
    #[test_case(Port::Ap, 0x4, 5, 0x05)]
    #[test_case(Port::Ap, 0x8, 6, 0x09)]
    #[test_case(Port::Ap, 0xC, 7, 0x0D)]
    fn known_registers(port: Port, address: u32, id: u8, request: u8) {
        let register = resolve(port, address).unwrap();
        assert_eq!(u8::from(register), id);
        assert_eq!(register.port(), port);
        assert_eq!(register.offset() as u32, address);
        assert_eq!(register.transfer_request(), request);
    }

    #[test]
    fn resolution_is_deterministic() {
        for port in [Port::Dp, Port::Ap] {
            for address in (0..0x10).step_by(4) {
                assert_eq!(resolve(port, address).unwrap(), resolve(port, address).unwrap());
            }
        }
    }

    #[test_case(Port::Dp, 0x2)]
    #[test_case(Port::Dp, 0x10)]
    #[test_case(Port::Ap, 0xF0)]
    #[test_case(Port::Ap, 0xFFFF_FFFC)]
    fn unknown_registers(port: Port, address: u32) {
        assert!(matches!(
            resolve(port, address),
            Err(CmsisDapError::AddressResolution { port: p, address: a }) if p == port && a == address
        ));
    }
}
