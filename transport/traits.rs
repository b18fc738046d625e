// Transport abstraction - lets the client run over TLS, plain TCP, or a test double
use std::io::{Error, ErrorKind, Result};

pub trait Transport: Send {
    /// Open the underlying connection.
    fn connect(&mut self) -> Result<()>;
    /// Write every byte of `data` and flush it.
    fn send(&mut self, data: &[u8]) -> Result<()>;
    /// One read into `buf`; `Ok(0)` means the peer closed the stream.
    fn receive(&mut self, buf: &mut [u8]) -> Result<usize>;
    /// Close the connection. Closing twice is not an error.
    fn disconnect(&mut self) -> Result<()>;
    fn is_connected(&self) -> bool;
}

pub(crate) fn not_connected() -> Error {
    Error::new(ErrorKind::NotConnected, "Not connected")
}
