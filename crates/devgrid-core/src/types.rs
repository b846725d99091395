//! Domain types shared across devgrid crates.
//!
//! All types serialize to/from JSON so they can cross the scheduler
//! channel and the HTTP boundary unchanged.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Unique identifier for an agent (one per worker node).
pub type AgentId = String;

/// Unique identifier for a workload container.
pub type ContainerId = String;

// ── Device ─────────────────────────────────────────────────────────

/// Kind of compute device backing a slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    Cpu,
    Gpu,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Cpu => f.write_str("cpu"),
            DeviceType::Gpu => f.write_str("gpu"),
        }
    }
}

/// Immutable descriptor of a physical device on a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Device {
    /// Node-local device index.
    pub id: u32,
    pub brand: String,
    pub uuid: String,
    #[serde(rename = "type")]
    pub kind: DeviceType,
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{} ({})", self.kind, self.id, self.brand)
    }
}

/// Cluster-wide identity of a device: the hosting agent plus the
/// node-local index.
///
/// Built once when a slot is created and passed by value afterwards.
/// The scheduler indexes devices by this key, and `agent_id` names the
/// execution host that owns the device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId {
    pub agent_id: AgentId,
    pub index: u32,
}

impl DeviceId {
    pub fn new(agent_id: impl Into<AgentId>, device: &Device) -> Self {
        Self {
            agent_id: agent_id.into(),
            index: device.id,
        }
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.agent_id, self.index)
    }
}

// ── Container ──────────────────────────────────────────────────────

/// Lifecycle state of a container as reported by its execution host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerState {
    Assigned,
    Pulling,
    Starting,
    Running,
    Terminated,
}

/// A workload occupying a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: ContainerId,
    pub state: ContainerState,
}

impl Container {
    /// A freshly assigned container.
    pub fn assigned(id: impl Into<ContainerId>) -> Self {
        Self {
            id: id.into(),
            state: ContainerState::Assigned,
        }
    }

    /// The same container in a new lifecycle state.
    pub fn with_state(&self, state: ContainerState) -> Self {
        Self {
            id: self.id.clone(),
            state,
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.state == ContainerState::Terminated
    }
}

// ── Slot ───────────────────────────────────────────────────────────

/// Read-only snapshot of a slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotSummary {
    /// Node-local slot name.
    pub id: String,
    pub device: Device,
    pub enabled: bool,
    pub container: Option<Container>,
}

/// Request body for updating a slot's user enablement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotPatch {
    pub enabled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gpu(id: u32) -> Device {
        Device {
            id,
            brand: "NVIDIA A100".to_string(),
            uuid: format!("GPU-{id}"),
            kind: DeviceType::Gpu,
        }
    }

    #[test]
    fn device_id_composes_agent_and_index() {
        let id = DeviceId::new("agent-1", &gpu(3));
        assert_eq!(id.agent_id, "agent-1");
        assert_eq!(id.index, 3);
        assert_eq!(id.to_string(), "agent-1/3");
    }

    #[test]
    fn device_serializes_kind_as_type() {
        let json = serde_json::to_value(gpu(0)).unwrap();
        assert_eq!(json["type"], "gpu");
        assert_eq!(json["id"], 0);
    }

    #[test]
    fn container_state_transitions_keep_id() {
        let c = Container::assigned("c-1");
        assert_eq!(c.state, ContainerState::Assigned);
        assert!(!c.is_terminated());

        let done = c.with_state(ContainerState::Terminated);
        assert_eq!(done.id, "c-1");
        assert!(done.is_terminated());
    }

    #[test]
    fn slot_summary_serializes_absent_container_as_null() {
        let summary = SlotSummary {
            id: "0".to_string(),
            device: gpu(0),
            enabled: true,
            container: None,
        };
        let json = serde_json::to_value(&summary).unwrap();
        assert!(json["container"].is_null());
        assert_eq!(json["enabled"], true);
    }

    #[test]
    fn slot_patch_rejects_wrong_shape() {
        assert!(serde_json::from_str::<SlotPatch>(r#"{"enabled": "yes"}"#).is_err());
        assert!(serde_json::from_str::<SlotPatch>("{}").is_err());
        let patch: SlotPatch = serde_json::from_str(r#"{"enabled": false}"#).unwrap();
        assert!(!patch.enabled);
    }
}
