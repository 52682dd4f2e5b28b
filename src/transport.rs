use crate::protocol::{Frame, ProtocolError};

/// The radio network as seen from the coordinator.
pub trait Transport {
    /// Whether a frame is waiting to be read.
    fn available(&mut self) -> bool;

    /// Reads the next queued frame.
    fn read_frame(&mut self) -> Result<Frame, ProtocolError>;

    /// Sends a ping to `address` and blocks until the radio accepts or rejects it.
    fn send_probe(&mut self, address: u16) -> bool;
}
