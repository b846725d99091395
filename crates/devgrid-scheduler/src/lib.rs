//! devgrid-scheduler — the slot ↔ scheduler coordination protocol.
//!
//! Slots publish device availability to the cluster coordinator with
//! three one-way messages:
//!
//! - `AddDevice` — the device exists and may receive work
//! - `RemoveDevice` — the device must no longer receive work
//! - `FreeDevice` — the device's container finished; it is idle again
//!
//! # Architecture
//!
//! ```text
//! Slot ──tell──▶ dyn Cluster
//!                  └── ClusterRef (unbounded mpsc, never blocks)
//!                        └── DeviceRegistry::run (coordinator side)
//!                              └── DeviceId → occupant bookkeeping
//! ```
//!
//! Placement decisions are not made here; the registry only keeps the
//! coordinator's view of which devices exist and which are idle.

pub mod cluster;
pub mod error;
pub mod message;
pub mod registry;

pub use cluster::{Cluster, ClusterRef};
pub use error::{SchedulerError, SchedulerResult};
pub use message::{AddDevice, FreeDevice, RemoveDevice, SchedulerMessage};
pub use registry::{DeviceRegistry, RegisteredDevice};
