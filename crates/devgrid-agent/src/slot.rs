//! Slot — the per-device state machine.
//!
//! A slot owns one device's enablement flags and its (at most one)
//! occupying container, and keeps the scheduler's registration of the
//! device in sync with them. Every mutating operation ends with a
//! reconciliation step that emits at most one registration message.
//!
//! The slot is not synchronized; `SlotActor` gives it a single-consumer
//! mailbox.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use devgrid_core::config::SlotDefaults;
use devgrid_core::{Container, ContainerId, Device, DeviceId, SlotSummary};
use devgrid_scheduler::{AddDevice, Cluster, FreeDevice, RemoveDevice};

use crate::enablement::SlotEnabled;
use crate::error::{SlotError, SlotResult};
use crate::host::{ExecutionHost, KillContainer};

pub struct Slot {
    /// Node-local slot name.
    id: String,
    device: Device,
    device_id: DeviceId,
    enabled: SlotEnabled,
    container: Option<Container>,
    /// Containers killed on deregistration whose termination has not
    /// been reported yet. An id leaves the set on its `Terminated` report
    /// or when it is assigned here again; a host that never reports keeps
    /// it for the slot's lifetime.
    killed: HashSet<ContainerId>,
    cluster: Arc<dyn Cluster>,
    host: Arc<dyn ExecutionHost>,
}

impl Slot {
    /// Create a slot for `device` on agent `agent_id`.
    ///
    /// Nothing is sent until `initialize` runs.
    pub fn new(
        agent_id: &str,
        device: Device,
        defaults: SlotDefaults,
        cluster: Arc<dyn Cluster>,
        host: Arc<dyn ExecutionHost>,
    ) -> Self {
        Self {
            id: device.id.to_string(),
            device_id: DeviceId::new(agent_id, &device),
            device,
            enabled: SlotEnabled::new(defaults.agent_enabled, defaults.user_enabled),
            container: None,
            killed: HashSet::new(),
            cluster,
            host,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub fn flags(&self) -> SlotEnabled {
        self.enabled
    }

    pub fn container(&self) -> Option<&Container> {
        self.container.as_ref()
    }

    /// Register the device if the slot starts out enabled.
    pub fn initialize(&mut self) {
        debug!(device_id = %self.device_id, device = %self.device, "slot initializing");
        self.reconcile();
    }

    /// Operator enable/disable.
    pub fn set_user_enabled(&mut self, enabled: bool) {
        self.enabled.user_enabled = enabled;
        self.reconcile();
    }

    /// Node health/lifecycle enable/disable.
    pub fn set_agent_enabled(&mut self, enabled: bool) {
        self.enabled.agent_enabled = enabled;
        self.reconcile();
    }

    /// Bind a container to this slot. Sends nothing.
    pub fn assign_container(&mut self, container: Container) -> SlotResult<()> {
        if !self.enabled.enabled() {
            return Err(self.contract_violation(format!(
                "container {} assigned but slot is not enabled",
                container.id
            )));
        }
        if let Some(current) = &self.container {
            return Err(self.contract_violation(format!(
                "container {} assigned but slot already holds {}",
                container.id, current.id
            )));
        }

        if self.killed.remove(&container.id) {
            debug!(device_id = %self.device_id, container_id = %container.id, "killed container reassigned");
        }
        info!(device_id = %self.device_id, container_id = %container.id, "container assigned");
        self.container = Some(container);
        Ok(())
    }

    /// Record a lifecycle update for the occupying container.
    ///
    /// A `Terminated` report empties the slot and, if the device is
    /// enabled, tells the scheduler it is free again.
    pub fn update_container_state(&mut self, container: Container) -> SlotResult<()> {
        let occupant = self.container.as_ref().map(|c| c.id.as_str());
        if occupant != Some(container.id.as_str()) {
            if self.killed.contains(&container.id) {
                debug!(
                    device_id = %self.device_id,
                    container_id = %container.id,
                    state = ?container.state,
                    "ignoring state report for killed container"
                );
                if container.is_terminated() {
                    self.killed.remove(&container.id);
                }
                return Ok(());
            }

            let detail = match occupant {
                Some(current) => format!(
                    "state reported for container {} but slot holds {current}",
                    container.id
                ),
                None => format!(
                    "state reported for container {} but slot is empty",
                    container.id
                ),
            };
            return Err(self.contract_violation(detail));
        }

        if !container.is_terminated() {
            debug!(
                device_id = %self.device_id,
                container_id = %container.id,
                state = ?container.state,
                "container state changed"
            );
            self.container = Some(container);
            return Ok(());
        }

        self.container = None;
        info!(device_id = %self.device_id, container_id = %container.id, "container terminated");
        if self.enabled.enabled() {
            self.cluster.tell(
                FreeDevice {
                    device_id: self.device_id.clone(),
                }
                .into(),
            );
        }
        Ok(())
    }

    pub fn summarize(&self) -> SlotSummary {
        SlotSummary {
            id: self.id.clone(),
            device: self.device.clone(),
            enabled: self.enabled.enabled(),
            container: self.container.clone(),
        }
    }

    /// Bring the scheduler registration in line with the enablement flags.
    fn reconcile(&mut self) {
        let enabled = self.enabled.enabled();
        if !self.enabled.needs_reconcile() {
            debug!(device_id = %self.device_id, enabled, "slot registration in sync");
            return;
        }

        self.enabled.device_added = enabled;
        if enabled {
            let container_id = self.container.as_ref().map(|c| c.id.clone());
            info!(device_id = %self.device_id, container_id = ?container_id, "adding device to scheduler");
            self.cluster.tell(
                AddDevice {
                    device_id: self.device_id.clone(),
                    container_id,
                }
                .into(),
            );
            return;
        }

        info!(device_id = %self.device_id, "removing device from scheduler");
        self.cluster.tell(
            RemoveDevice {
                device_id: self.device_id.clone(),
            }
            .into(),
        );

        if let Some(container) = self.container.take() {
            warn!(
                device_id = %self.device_id,
                container_id = %container.id,
                "killing container on disabled device"
            );
            self.killed.insert(container.id.clone());
            self.host.signal(KillContainer {
                container_id: container.id,
            });
        }
    }

    fn contract_violation(&self, detail: String) -> SlotError {
        error!(device_id = %self.device_id, %detail, "slot contract violated");
        SlotError::ContractViolation(detail)
    }
}
