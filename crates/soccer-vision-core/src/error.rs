/// Fixed-capacity bookkeeping ran out of room.
///
/// This is the only failure a detection pass can report. Callers keep the
/// partial result produced before the limit was reached.
#[derive(thiserror::Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityError {
    #[error("group capacity exhausted ({max} groups)")]
    GroupsExhausted { max: usize },
    #[error("link capacity exhausted for group {group} ({max} links)")]
    LinksExhausted { group: u16, max: usize },
}

/// Errors raised while building a [`crate::CameraFrame`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("frame dimensions must be non-zero (got {width}x{height})")]
    EmptyFrame { width: usize, height: usize },
    #[error("{plane} plane has {actual} samples, expected {expected}")]
    PlaneSize {
        plane: &'static str,
        expected: usize,
        actual: usize,
    },
}
