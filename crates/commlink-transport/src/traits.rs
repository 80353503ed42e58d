use crate::error::Result;

/// Byte-level capability an endpoint needs from the layer below it.
///
/// Implementations must be non-blocking or bounded: `read` may wait for
/// readiness for a short, fixed interval but never indefinitely, so the
/// endpoint threads can observe their stop flag.
///
/// All methods take `&self`; the receive and transmit threads share one
/// transport through an `Arc`.
pub trait Transport: Send + Sync {
    /// Whether the receive direction is still operational.
    fn is_readable(&self) -> bool;

    /// Whether the transmit direction is still operational.
    fn is_writable(&self) -> bool;

    /// Read available bytes into `buf`.
    ///
    /// `Ok(0)` means no data right now. `Err(_)` is fatal.
    fn read(&self, buf: &mut [u8]) -> Result<usize>;

    /// Write bytes from `data`.
    ///
    /// `Ok(0)` means the transport would block and the caller may retry.
    /// A short count means only a prefix was accepted. `Err(_)` is fatal.
    fn write(&self, data: &[u8]) -> Result<usize>;

    /// Transport name for diagnostics.
    fn transport_name(&self) -> &'static str;
}

impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    fn is_readable(&self) -> bool {
        (**self).is_readable()
    }

    fn is_writable(&self) -> bool {
        (**self).is_writable()
    }

    fn read(&self, buf: &mut [u8]) -> Result<usize> {
        (**self).read(buf)
    }

    fn write(&self, data: &[u8]) -> Result<usize> {
        (**self).write(data)
    }

    fn transport_name(&self) -> &'static str {
        (**self).transport_name()
    }
}
