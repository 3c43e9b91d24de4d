use crate::error::PersistError;
use std::fmt;

/// Which persistence step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOp {
    Load,
    Save,
    Erase,
    Flush,
}

impl fmt::Display for PersistOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PersistOp::Load => "load",
            PersistOp::Save => "save",
            PersistOp::Erase => "erase",
            PersistOp::Flush => "flush",
        };
        f.write_str(name)
    }
}

/// Receives persistence failures the engine recovers from. Implementations
/// must not panic; the engine keeps running on its in-memory corpus either way.
/// The engine holds no lock of its own while calling this, so an observer may
/// query the engine that reported the failure.
pub trait PersistenceObserver: Send + Sync {
    fn persistence_failed(&self, op: PersistOp, error: &PersistError);
}

/// Default observer: emits a `tracing` warning.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogObserver;

impl PersistenceObserver for LogObserver {
    fn persistence_failed(&self, op: PersistOp, error: &PersistError) {
        tracing::warn!(%op, error = %error, "corpus persistence failed; continuing in memory");
    }
}
