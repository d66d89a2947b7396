//! # sprinkler-app
//!
//! Application layer — the controller core and its **port definitions** (traits).
//!
//! ## Responsibilities
//! - Define **port traits** that adapters must implement (driven/outbound ports):
//!   - `RecordStore` — atomic per-key write / read / delete of records
//!   - `OutputDriver` — configure and switch output lines
//!   - `ChangeNotifier` — "zones changed" / "programs changed" signals
//!   - `Clock` — wall-clock time in the controller's time zone
//! - Own the authoritative catalog in the **schedule store** (locked,
//!   write-through persisted, notified)
//! - Sequence zone runs in the **execution engine** (single active zone,
//!   command queue, zone timer, recovery, due programs)
//! - Coalesce change signals into JSON-ready snapshots in the **update fan-out**
//! - Map validated **commands** onto store and engine operations
//!
//! ## Dependency rule
//! Depends on `sprinkler-domain` only (plus `tokio` for sync primitives and
//! timers). Never imports adapter crates. Adapters depend on *this* crate,
//! not the reverse.

pub mod commands;
pub mod execution_engine;
pub mod ports;
pub mod records;
pub mod schedule_store;
pub mod update_fanout;
pub mod views;

#[cfg(test)]
pub(crate) mod testing;
