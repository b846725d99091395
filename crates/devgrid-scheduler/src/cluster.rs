//! Send side of the coordination protocol.

use tokio::sync::mpsc;
use tracing::warn;

use crate::message::SchedulerMessage;

/// Destination for a slot's coordination messages.
///
/// Sends are fire-and-forget: implementations must not block and the
/// slot never waits for an acknowledgement. Delivery to a single
/// destination is assumed reliable and ordered.
pub trait Cluster: Send + Sync {
    fn tell(&self, msg: SchedulerMessage);
}

/// Channel-backed handle to the cluster coordinator.
///
/// Cheap to clone; every slot on a node holds one.
#[derive(Clone, Debug)]
pub struct ClusterRef {
    tx: mpsc::UnboundedSender<SchedulerMessage>,
}

impl ClusterRef {
    /// Create a handle and the receiver the coordinator consumes.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<SchedulerMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Whether the coordinator side has gone away.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl Cluster for ClusterRef {
    fn tell(&self, msg: SchedulerMessage) {
        if let Err(e) = self.tx.send(msg) {
            let msg = e.0;
            warn!(
                device_id = %msg.device_id(),
                kind = msg.kind(),
                "cluster coordinator gone, dropping message"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{FreeDevice, RemoveDevice};
    use devgrid_core::DeviceId;

    fn device_id(index: u32) -> DeviceId {
        DeviceId {
            agent_id: "agent-1".to_string(),
            index,
        }
    }

    #[test]
    fn tell_preserves_order() {
        let (cluster, mut rx) = ClusterRef::channel();
        cluster.tell(RemoveDevice { device_id: device_id(0) }.into());
        cluster.tell(FreeDevice { device_id: device_id(1) }.into());

        assert_eq!(rx.try_recv().unwrap().kind(), "remove_device");
        assert_eq!(rx.try_recv().unwrap().device_id(), &device_id(1));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn tell_after_receiver_dropped_does_not_panic() {
        let (cluster, rx) = ClusterRef::channel();
        drop(rx);
        assert!(cluster.is_closed());
        cluster.tell(FreeDevice { device_id: device_id(0) }.into());
    }
}
