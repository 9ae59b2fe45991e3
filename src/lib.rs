#![recursion_limit = "256"] // required by bitfield!
#![deny(unused_must_use)]

//! CMSIS-DAP over SWD: probe commands, session control and CoreSight
//! register access.

pub mod ap;
pub mod cmsisdap;
pub mod coresight;
pub mod dp;
pub mod register;
pub mod session;
pub mod transport;

pub use cmsisdap::tools::{list_cmsisdap_devices, open_device_from_selector, supported_vendor_ids, DebugProbeSelector};
pub use cmsisdap::CmsisDapError;
pub use register::{resolve, Port, RegisterId};
pub use session::{DapInfo, FirmwareInfo, Session, SessionConfig, SessionState};
pub use transport::{Transport, TransportError};
