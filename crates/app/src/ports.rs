//! Port definitions — traits that adapters implement.
//!
//! Ports are the boundaries between the controller core and the outside
//! world. They are defined here (in `app`) so that both the core and the
//! adapter layer can depend on them without creating circular dependencies.

pub mod clock;
pub mod notifier;
pub mod outputs;
pub mod records;

pub use clock::{Clock, SystemClock};
pub use notifier::{ChangeKind, ChangeNotifier};
pub use outputs::OutputDriver;
pub use records::RecordStore;
