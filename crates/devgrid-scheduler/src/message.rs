//! Messages sent from a slot to the cluster coordinator.

use serde::{Deserialize, Serialize};

use devgrid_core::{ContainerId, DeviceId};

/// The device is available for placement.
///
/// If a container already occupies the device when it is (re)registered,
/// its id is carried along so the coordinator's view starts consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddDevice {
    pub device_id: DeviceId,
    pub container_id: Option<ContainerId>,
}

/// The device is no longer available for placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoveDevice {
    pub device_id: DeviceId,
}

/// The device's container terminated and the device is idle again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FreeDevice {
    pub device_id: DeviceId,
}

/// Any message a slot can tell the coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SchedulerMessage {
    AddDevice(AddDevice),
    RemoveDevice(RemoveDevice),
    FreeDevice(FreeDevice),
}

impl SchedulerMessage {
    /// The device this message refers to.
    pub fn device_id(&self) -> &DeviceId {
        match self {
            SchedulerMessage::AddDevice(m) => &m.device_id,
            SchedulerMessage::RemoveDevice(m) => &m.device_id,
            SchedulerMessage::FreeDevice(m) => &m.device_id,
        }
    }

    /// Short name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            SchedulerMessage::AddDevice(_) => "add_device",
            SchedulerMessage::RemoveDevice(_) => "remove_device",
            SchedulerMessage::FreeDevice(_) => "free_device",
        }
    }
}

impl From<AddDevice> for SchedulerMessage {
    fn from(msg: AddDevice) -> Self {
        SchedulerMessage::AddDevice(msg)
    }
}

impl From<RemoveDevice> for SchedulerMessage {
    fn from(msg: RemoveDevice) -> Self {
        SchedulerMessage::RemoveDevice(msg)
    }
}

impl From<FreeDevice> for SchedulerMessage {
    fn from(msg: FreeDevice) -> Self {
        SchedulerMessage::FreeDevice(msg)
    }
}
