pub mod handshake;
pub mod harness;
pub mod responder;
pub mod session;
pub mod transport;
pub mod trial;
