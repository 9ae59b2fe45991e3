pub mod clock;
pub mod pins;
pub mod sequence;
