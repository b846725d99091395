//! devgrid-agent — per-device slot coordination on a worker node.
//!
//! Every device on a node is represented by a `Slot`: a state machine
//! combining administrative enablement, user enablement and container
//! occupancy, which keeps the scheduler's view of the device in sync.
//!
//! # Architecture
//!
//! ```text
//! Agent (one per node)
//!   ├── container id → slot id routing index
//!   └── per-device SlotActor task
//!       ├── bounded mailbox (one consumer, arrival order)
//!       └── Slot
//!           ├── SlotEnabled (agent / user / device_added)
//!           ├── Option<Container>
//!           ├── dyn Cluster        → AddDevice / RemoveDevice / FreeDevice
//!           └── dyn ExecutionHost  → KillContainer
//! ```
//!
//! # Registration
//!
//! After every operation the slot reconciles: if it should be available
//! and is not registered it sends `AddDevice`; if it should not be and
//! is registered it sends `RemoveDevice` and kills any occupant. The
//! `device_added` bit makes repeated operations send nothing.

pub mod actor;
pub mod agent;
pub mod enablement;
pub mod error;
pub mod host;
pub mod slot;

pub use actor::{SlotActor, SlotHandle};
pub use agent::{Agent, AgentSettings};
pub use enablement::{is_enabled, SlotEnabled};
pub use error::{SlotError, SlotResult};
pub use host::{ExecutionHost, HostRef, KillContainer};
pub use slot::Slot;
