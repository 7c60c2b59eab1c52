pub mod addr;
pub mod error;
pub mod keystream;
pub mod log;
pub mod payload;
pub mod wire;
