//! Device registry — the coordinator's view of registered devices.
//!
//! Consumes `SchedulerMessage`s strictly in arrival order, which gives
//! the per-device serialization the slot protocol relies on. Protocol
//! violations (double add, remove or free of an unknown device) are
//! surfaced as `SchedulerError`s; the `run` loop logs them and keeps going.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, watch, RwLock};
use tracing::{debug, info, warn};

use devgrid_core::{ContainerId, DeviceId};

use crate::error::{SchedulerError, SchedulerResult};
use crate::message::SchedulerMessage;

/// Coordinator-side record of a registered device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDevice {
    pub device_id: DeviceId,
    /// Container the coordinator believes occupies the device.
    pub container_id: Option<ContainerId>,
}

impl RegisteredDevice {
    pub fn is_idle(&self) -> bool {
        self.container_id.is_none()
    }
}

/// Tracks which devices are registered and which are idle.
///
/// `Clone` + `Send` + `Sync`; clones share the same view.
#[derive(Clone, Default)]
pub struct DeviceRegistry {
    devices: Arc<RwLock<HashMap<DeviceId, RegisteredDevice>>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply a single coordination message.
    pub async fn apply(&self, msg: SchedulerMessage) -> SchedulerResult<()> {
        let mut devices = self.devices.write().await;
        match msg {
            SchedulerMessage::AddDevice(add) => {
                if devices.contains_key(&add.device_id) {
                    return Err(SchedulerError::AlreadyRegistered(add.device_id.to_string()));
                }
                info!(
                    device_id = %add.device_id,
                    container_id = ?add.container_id,
                    "device registered"
                );
                devices.insert(
                    add.device_id.clone(),
                    RegisteredDevice {
                        device_id: add.device_id,
                        container_id: add.container_id,
                    },
                );
            }
            SchedulerMessage::RemoveDevice(remove) => {
                if devices.remove(&remove.device_id).is_none() {
                    return Err(SchedulerError::UnknownDevice(remove.device_id.to_string()));
                }
                info!(device_id = %remove.device_id, "device deregistered");
            }
            SchedulerMessage::FreeDevice(free) => {
                let entry = devices
                    .get_mut(&free.device_id)
                    .ok_or_else(|| SchedulerError::UnknownDevice(free.device_id.to_string()))?;
                debug!(
                    device_id = %free.device_id,
                    container_id = ?entry.container_id,
                    "device freed"
                );
                entry.container_id = None;
            }
        }
        Ok(())
    }

    /// Record that the coordinator placed `container_id` on a device.
    ///
    /// Called by whatever placement layer hands out work. The daemon runs
    /// no placement of its own, so only slots' messages reach it there.
    pub async fn mark_assigned(
        &self,
        device_id: &DeviceId,
        container_id: &str,
    ) -> SchedulerResult<()> {
        let mut devices = self.devices.write().await;
        let entry = devices
            .get_mut(device_id)
            .ok_or_else(|| SchedulerError::UnknownDevice(device_id.to_string()))?;

        if let Some(current) = &entry.container_id {
            return Err(SchedulerError::DeviceBusy {
                device: device_id.to_string(),
                container: current.clone(),
            });
        }

        entry.container_id = Some(container_id.to_string());
        debug!(%device_id, %container_id, "container placed on device");
        Ok(())
    }

    pub async fn get(&self, device_id: &DeviceId) -> Option<RegisteredDevice> {
        self.devices.read().await.get(device_id).cloned()
    }

    pub async fn contains(&self, device_id: &DeviceId) -> bool {
        self.devices.read().await.contains_key(device_id)
    }

    pub async fn len(&self) -> usize {
        self.devices.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.devices.read().await.is_empty()
    }

    /// Registered devices with no occupant, sorted by id.
    pub async fn idle_devices(&self) -> Vec<DeviceId> {
        let devices = self.devices.read().await;
        let mut idle: Vec<DeviceId> = devices
            .values()
            .filter(|d| d.is_idle())
            .map(|d| d.device_id.clone())
            .collect();
        idle.sort();
        idle
    }

    /// Consume messages until the channel closes or shutdown fires.
    ///
    /// Returns the number of protocol violations observed.
    pub async fn run(
        &self,
        mut rx: mpsc::UnboundedReceiver<SchedulerMessage>,
        mut shutdown: watch::Receiver<bool>,
    ) -> u64 {
        let mut violations = 0u64;
        info!("device registry started");

        loop {
            tokio::select! {
                msg = rx.recv() => {
                    let Some(msg) = msg else {
                        debug!("all slots disconnected from registry");
                        break;
                    };
                    let kind = msg.kind();
                    if let Err(e) = self.apply(msg).await {
                        violations += 1;
                        warn!(kind, error = %e, "coordination protocol violation");
                    }
                }
                _ = shutdown.changed() => {
                    // Deregistrations sent during node shutdown are still queued.
                    while let Ok(msg) = rx.try_recv() {
                        let kind = msg.kind();
                        if let Err(e) = self.apply(msg).await {
                            violations += 1;
                            warn!(kind, error = %e, "coordination protocol violation");
                        }
                    }
                    break;
                }
            }
        }

        info!(violations, "device registry stopped");
        violations
    }
}
