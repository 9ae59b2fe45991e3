pub mod connect;
pub mod delay;
pub mod disconnect;
pub mod info;
pub mod probe_reset;
pub mod reset;
