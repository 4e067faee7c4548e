pub mod handshake;
pub mod link;
pub mod port;
#[cfg(test)]
pub(crate) mod testing;

pub use handshake::{submit, synchronize, HandshakeConfig, Submission, SyncOutcome};
pub use link::DeviceLink;
pub use port::{available_ports, open, SerialLink};
