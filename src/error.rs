//! Failure classification for pipeline errors.
//!
//! Stages return `anyhow::Result`. At the point where a failure is classified
//! the stage attaches a [`FailureKind`] as context; the binary recovers it
//! with [`FailureKind::of`] to choose a process exit code.

use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum FailureKind {
    #[error("configuration error")]
    Configuration,
    #[error("preflight check failed")]
    Preflight,
    #[error("acquiring source ISO failed")]
    Acquisition,
    #[error("mount operation failed")]
    Mount,
    #[error("copying files failed")]
    Copy,
    #[error("packing ISO failed")]
    Pack,
}

impl FailureKind {
    pub fn exit_code(self) -> u8 {
        match self {
            FailureKind::Configuration => 2,
            FailureKind::Preflight => 3,
            FailureKind::Acquisition => 4,
            FailureKind::Mount => 5,
            FailureKind::Copy => 6,
            FailureKind::Pack => 7,
        }
    }

    /// Outermost classification attached to `err`, if any.
    pub fn of(err: &anyhow::Error) -> Option<FailureKind> {
        err.downcast_ref::<FailureKind>().copied()
    }
}
