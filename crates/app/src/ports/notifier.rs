//! Change notification port.

use std::fmt;

/// Which part of the catalog changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Zones,
    Programs,
}

impl ChangeKind {
    /// Every kind, in round-robin order.
    pub const ALL: [Self; 2] = [Self::Zones, Self::Programs];
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Zones => f.write_str("zones"),
            Self::Programs => f.write_str("programs"),
        }
    }
}

/// Receives "something changed" signals. Must never block.
pub trait ChangeNotifier: Send + Sync {
    fn notify(&self, kind: ChangeKind);
}

impl<T: ChangeNotifier> ChangeNotifier for std::sync::Arc<T> {
    fn notify(&self, kind: ChangeKind) {
        (**self).notify(kind);
    }
}
