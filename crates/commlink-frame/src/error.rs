/// Errors that can occur while building packets or encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The payload exceeds the wire format's maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;
