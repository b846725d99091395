//! Agent — owns every slot on one worker node.
//!
//! The agent spawns one `SlotActor` per device, routes container events
//! from the scheduler and the execution host to the right slots, and
//! forwards node health changes to every slot's agent flag. Stopping the
//! agent stops every slot, which deregisters its device.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::{watch, Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use devgrid_core::config::SlotDefaults;
use devgrid_core::{AgentId, Container, ContainerId, Device, DevgridConfig, SlotSummary};
use devgrid_scheduler::Cluster;

use crate::actor::{SlotActor, SlotHandle};
use crate::error::{SlotError, SlotResult};
use crate::host::ExecutionHost;
use crate::slot::Slot;

/// Settings for starting an agent.
#[derive(Debug, Clone)]
pub struct AgentSettings {
    pub agent_id: AgentId,
    pub devices: Vec<Device>,
    pub slot_defaults: SlotDefaults,
    pub mailbox_capacity: usize,
}

impl From<&DevgridConfig> for AgentSettings {
    fn from(config: &DevgridConfig) -> Self {
        Self {
            agent_id: config.agent.id.clone(),
            devices: config.devices.clone(),
            slot_defaults: config.slot_defaults(),
            mailbox_capacity: config.mailbox_capacity(),
        }
    }
}

/// Owns the slot actors of a node.
pub struct Agent {
    id: AgentId,
    /// Slots keyed by device index.
    slots: BTreeMap<u32, SlotHandle>,
    /// Container id → slots it was assigned to. Entries are dropped on a
    /// `Terminated` report, including one for a container killed on disable.
    containers: RwLock<HashMap<ContainerId, Vec<u32>>>,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl Agent {
    /// Spawn a slot actor for every device.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        settings: AgentSettings,
        cluster: Arc<dyn Cluster>,
        host: Arc<dyn ExecutionHost>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut slots = BTreeMap::new();
        let mut tasks = Vec::with_capacity(settings.devices.len());

        for device in settings.devices {
            let index = device.id;
            let slot = Slot::new(
                &settings.agent_id,
                device,
                settings.slot_defaults,
                cluster.clone(),
                host.clone(),
            );
            let (handle, task) =
                SlotActor::spawn(slot, settings.mailbox_capacity, shutdown_rx.clone());
            slots.insert(index, handle);
            tasks.push(task);
        }

        info!(agent_id = %settings.agent_id, slots = slots.len(), "agent started");

        Self {
            id: settings.agent_id,
            slots,
            containers: RwLock::new(HashMap::new()),
            shutdown_tx,
            tasks: Mutex::new(tasks),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Look up a slot by its node-local name.
    pub fn slot(&self, slot_id: &str) -> SlotResult<SlotHandle> {
        slot_id
            .parse::<u32>()
            .ok()
            .and_then(|index| self.slots.get(&index))
            .cloned()
            .ok_or_else(|| SlotError::SlotNotFound(format!("{}/{slot_id}", self.id)))
    }

    pub fn slot_count(&self) -> usize {
        self.slots.len()
    }

    /// Summaries of every slot, ordered by device index.
    pub async fn list_slots(&self) -> SlotResult<Vec<SlotSummary>> {
        let mut summaries = Vec::with_capacity(self.slots.len());
        for handle in self.slots.values() {
            summaries.push(handle.summarize().await?);
        }
        Ok(summaries)
    }

    /// Apply a node health change to every slot.
    pub async fn set_enabled(&self, enabled: bool) -> SlotResult<()> {
        info!(agent_id = %self.id, enabled, "agent enablement changed");
        for handle in self.slots.values() {
            handle.set_agent_enabled(enabled).await?;
        }
        Ok(())
    }

    /// Bind a container to a slot on behalf of the scheduler.
    ///
    /// The routing index stays write-locked until the route is recorded,
    /// so a state report can never observe an occupied slot without a route.
    pub async fn assign_container(&self, slot_id: &str, container: Container) -> SlotResult<()> {
        let handle = self.slot(slot_id)?;
        let container_id = container.id.clone();

        let mut containers = self.containers.write().await;
        handle.assign_container(container).await?;

        let index = handle.device_id().index;
        let slots = containers.entry(container_id.clone()).or_default();
        if !slots.contains(&index) {
            slots.push(index);
        }
        debug!(agent_id = %self.id, %container_id, slot_id, "container routed to slot");
        Ok(())
    }

    /// Deliver a container state report to every slot the container holds.
    pub async fn update_container_state(&self, container: Container) -> SlotResult<()> {
        let indices = {
            let containers = self.containers.read().await;
            containers
                .get(&container.id)
                .cloned()
                .ok_or_else(|| SlotError::ContainerNotFound(container.id.clone()))?
        };

        let mut result = Ok(());
        for index in &indices {
            let Some(handle) = self.slots.get(index) else {
                continue;
            };
            if let Err(e) = handle.update_container_state(container.clone()).await {
                warn!(agent_id = %self.id, container_id = %container.id, error = %e, "container state update rejected");
                if result.is_ok() {
                    result = Err(e);
                }
            }
        }

        if container.is_terminated() {
            self.containers.write().await.remove(&container.id);
        }
        result
    }

    /// Stop every slot and wait for them to deregister.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
        let tasks: Vec<_> = self.tasks.lock().await.drain(..).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(agent_id = %self.id, error = %e, "slot task failed");
            }
        }
        info!(agent_id = %self.id, "agent stopped");
    }
}
