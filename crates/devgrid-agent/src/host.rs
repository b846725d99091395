//! Signalling the execution host that runs a slot's container.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::warn;

use devgrid_core::ContainerId;

/// Forceful termination request for a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KillContainer {
    pub container_id: ContainerId,
}

/// The runtime that actually runs containers on a node.
///
/// Delivery is fire-and-forget; the slot only ever tells the host to
/// kill, it never creates containers.
pub trait ExecutionHost: Send + Sync {
    fn signal(&self, kill: KillContainer);
}

/// Channel-backed handle to a node's execution host.
#[derive(Clone, Debug)]
pub struct HostRef {
    tx: mpsc::UnboundedSender<KillContainer>,
}

impl HostRef {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<KillContainer>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ExecutionHost for HostRef {
    fn signal(&self, kill: KillContainer) {
        if let Err(e) = self.tx.send(kill) {
            warn!(container_id = %e.0.container_id, "execution host gone, dropping kill signal");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signals_are_delivered_in_order() {
        let (host, mut rx) = HostRef::channel();
        host.signal(KillContainer { container_id: "a".to_string() });
        host.signal(KillContainer { container_id: "b".to_string() });

        assert_eq!(rx.try_recv().unwrap().container_id, "a");
        assert_eq!(rx.try_recv().unwrap().container_id, "b");
    }

    #[test]
    fn signal_to_closed_host_is_dropped() {
        let (host, rx) = HostRef::channel();
        drop(rx);
        host.signal(KillContainer { container_id: "a".to_string() });
    }
}
