//! Slot actor — runs a `Slot` behind a single-consumer mailbox.
//!
//! Operations against one slot execute strictly one at a time in
//! arrival order; each completes, including every message it sends,
//! before the next is dequeued. Distinct slots run in parallel and share
//! nothing.
//!
//! On start the actor initializes the slot (registering it if enabled).
//! On stop, either through the shutdown signal or because every handle
//! was dropped, it clears the slot's agent flag so the device is
//! deregistered exactly once.

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use devgrid_core::{Container, DeviceId, SlotSummary};

use crate::error::{SlotError, SlotResult};
use crate::slot::Slot;

/// Mailbox message for a slot actor.
enum SlotCommand {
    Summarize {
        reply: oneshot::Sender<SlotSummary>,
    },
    SetUserEnabled {
        enabled: bool,
        reply: oneshot::Sender<SlotSummary>,
    },
    SetAgentEnabled {
        enabled: bool,
        reply: oneshot::Sender<SlotSummary>,
    },
    AssignContainer {
        container: Container,
        reply: oneshot::Sender<SlotResult<()>>,
    },
    UpdateContainerState {
        container: Container,
        reply: oneshot::Sender<SlotResult<()>>,
    },
}

impl std::fmt::Debug for SlotCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            SlotCommand::Summarize { .. } => "Summarize",
            SlotCommand::SetUserEnabled { .. } => "SetUserEnabled",
            SlotCommand::SetAgentEnabled { .. } => "SetAgentEnabled",
            SlotCommand::AssignContainer { .. } => "AssignContainer",
            SlotCommand::UpdateContainerState { .. } => "UpdateContainerState",
        };
        f.write_str(name)
    }
}

/// Owns a slot and processes its mailbox.
pub struct SlotActor {
    slot: Slot,
    mailbox: mpsc::Receiver<SlotCommand>,
    shutdown: watch::Receiver<bool>,
}

impl SlotActor {
    /// Spawn the actor task and return a handle to its mailbox.
    pub fn spawn(
        slot: Slot,
        capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (SlotHandle, JoinHandle<()>) {
        let (tx, mailbox) = mpsc::channel(capacity.max(1));
        let handle = SlotHandle {
            id: slot.id().to_string(),
            device_id: slot.device_id().clone(),
            tx,
        };

        let actor = SlotActor {
            slot,
            mailbox,
            shutdown,
        };
        let task = tokio::spawn(actor.run());

        (handle, task)
    }

    async fn run(mut self) {
        let device_id = self.slot.device_id().clone();
        self.slot.initialize();

        if *self.shutdown.borrow_and_update() {
            debug!(%device_id, "shutdown already requested");
        } else {
            loop {
                tokio::select! {
                    cmd = self.mailbox.recv() => {
                        match cmd {
                            Some(cmd) => self.handle(cmd),
                            None => {
                                debug!(%device_id, "all slot handles dropped");
                                break;
                            }
                        }
                    }
                    _ = self.shutdown.changed() => {
                        debug!(%device_id, "slot shutting down");
                        break;
                    }
                }
            }
        }

        self.mailbox.close();
        self.slot.set_agent_enabled(false);
        info!(%device_id, "slot stopped");
    }

    fn handle(&mut self, cmd: SlotCommand) {
        // A dropped reply receiver means the caller stopped waiting; the
        // operation itself has already been applied.
        match cmd {
            SlotCommand::Summarize { reply } => {
                let _ = reply.send(self.slot.summarize());
            }
            SlotCommand::SetUserEnabled { enabled, reply } => {
                self.slot.set_user_enabled(enabled);
                let _ = reply.send(self.slot.summarize());
            }
            SlotCommand::SetAgentEnabled { enabled, reply } => {
                self.slot.set_agent_enabled(enabled);
                let _ = reply.send(self.slot.summarize());
            }
            SlotCommand::AssignContainer { container, reply } => {
                let _ = reply.send(self.slot.assign_container(container));
            }
            SlotCommand::UpdateContainerState { container, reply } => {
                let _ = reply.send(self.slot.update_container_state(container));
            }
        }
    }
}

/// Cloneable handle to a running slot actor.
#[derive(Clone, Debug)]
pub struct SlotHandle {
    id: String,
    device_id: DeviceId,
    tx: mpsc::Sender<SlotCommand>,
}

impl SlotHandle {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn device_id(&self) -> &DeviceId {
        &self.device_id
    }

    pub async fn summarize(&self) -> SlotResult<SlotSummary> {
        self.request(|reply| SlotCommand::Summarize { reply }).await
    }

    pub async fn set_user_enabled(&self, enabled: bool) -> SlotResult<SlotSummary> {
        self.request(|reply| SlotCommand::SetUserEnabled { enabled, reply })
            .await
    }

    pub async fn set_agent_enabled(&self, enabled: bool) -> SlotResult<SlotSummary> {
        self.request(|reply| SlotCommand::SetAgentEnabled { enabled, reply })
            .await
    }

    pub async fn assign_container(&self, container: Container) -> SlotResult<()> {
        self.request(|reply| SlotCommand::AssignContainer { container, reply })
            .await?
    }

    pub async fn update_container_state(&self, container: Container) -> SlotResult<()> {
        self.request(|reply| SlotCommand::UpdateContainerState { container, reply })
            .await?
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> SlotCommand,
    ) -> SlotResult<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| SlotError::MailboxClosed(self.device_id.to_string()))?;
        rx.await
            .map_err(|_| SlotError::MailboxClosed(self.device_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use devgrid_core::config::SlotDefaults;
    use devgrid_core::ContainerState;
    use devgrid_scheduler::{ClusterRef, SchedulerMessage};
    use tokio::sync::mpsc::UnboundedReceiver;

    use crate::host::{HostRef, KillContainer};
    use crate::slot::tests::gpu;

    struct Harness {
        handle: SlotHandle,
        task: JoinHandle<()>,
        scheduler: UnboundedReceiver<SchedulerMessage>,
        host: UnboundedReceiver<KillContainer>,
        shutdown: watch::Sender<bool>,
    }

    fn spawn(defaults: SlotDefaults) -> Harness {
        let (cluster, scheduler) = ClusterRef::channel();
        let (host_ref, host) = HostRef::channel();
        let (shutdown, shutdown_rx) = watch::channel(false);
        let slot = Slot::new("agent-1", gpu(0), defaults, Arc::new(cluster), Arc::new(host_ref));
        let (handle, task) = SlotActor::spawn(slot, 8, shutdown_rx);
        Harness {
            handle,
            task,
            scheduler,
            host,
            shutdown,
        }
    }

    fn kinds(rx: &mut UnboundedReceiver<SchedulerMessage>) -> Vec<&'static str> {
        let mut kinds = Vec::new();
        while let Ok(msg) = rx.try_recv() {
            kinds.push(msg.kind());
        }
        kinds
    }

    #[tokio::test]
    async fn actor_registers_on_start() {
        let mut h = spawn(SlotDefaults::default());

        let summary = h.handle.summarize().await.unwrap();
        assert!(summary.enabled);
        assert_eq!(h.handle.id(), "0");
        assert_eq!(h.handle.device_id().to_string(), "agent-1/0");

        match h.scheduler.try_recv().unwrap() {
            SchedulerMessage::AddDevice(add) => {
                assert_eq!(add.device_id.to_string(), "agent-1/0");
                assert!(add.container_id.is_none());
            }
            other => panic!("expected AddDevice, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn operations_apply_in_order() {
        let mut h = spawn(SlotDefaults::default());

        h.handle.set_user_enabled(false).await.unwrap();
        h.handle.set_user_enabled(false).await.unwrap();
        let summary = h.handle.set_user_enabled(true).await.unwrap();
        assert!(summary.enabled);

        assert_eq!(
            kinds(&mut h.scheduler),
            vec!["add_device", "remove_device", "add_device"]
        );
    }

    #[tokio::test]
    async fn contract_violation_is_returned_to_caller() {
        let h = spawn(SlotDefaults::default());

        h.handle
            .assign_container(Container::assigned("c-1"))
            .await
            .unwrap();
        let err = h
            .handle
            .assign_container(Container::assigned("c-2"))
            .await
            .unwrap_err();
        assert!(err.is_contract_violation());

        // The actor survives and still holds the first container.
        let summary = h.handle.summarize().await.unwrap();
        assert_eq!(summary.container.unwrap().id, "c-1");
    }

    #[tokio::test]
    async fn terminated_container_frees_device() {
        let mut h = spawn(SlotDefaults::default());
        let c = Container::assigned("c-1");

        h.handle.assign_container(c.clone()).await.unwrap();
        h.handle
            .update_container_state(c.with_state(ContainerState::Terminated))
            .await
            .unwrap();

        assert_eq!(kinds(&mut h.scheduler), vec!["add_device", "free_device"]);
        assert!(h.handle.summarize().await.unwrap().container.is_none());
    }

    #[tokio::test]
    async fn shutdown_deregisters_and_kills_occupant() {
        let mut h = spawn(SlotDefaults::default());
        h.handle
            .assign_container(Container::assigned("c-1"))
            .await
            .unwrap();

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();

        assert_eq!(kinds(&mut h.scheduler), vec!["add_device", "remove_device"]);
        assert_eq!(h.host.try_recv().unwrap().container_id, "c-1");
        assert!(h.host.try_recv().is_err());

        let err = h.handle.summarize().await.unwrap_err();
        assert!(matches!(err, SlotError::MailboxClosed(_)));
    }

    #[tokio::test]
    async fn dropping_all_handles_stops_the_actor() {
        let Harness {
            handle,
            task,
            mut scheduler,
            shutdown: _shutdown,
            ..
        } = spawn(SlotDefaults::default());

        handle.summarize().await.unwrap();
        drop(handle);
        task.await.unwrap();

        assert_eq!(kinds(&mut scheduler), vec!["add_device", "remove_device"]);
    }

    #[tokio::test]
    async fn disabled_slot_stops_silently() {
        let mut h = spawn(SlotDefaults {
            agent_enabled: true,
            user_enabled: false,
        });
        assert!(!h.handle.summarize().await.unwrap().enabled);

        h.shutdown.send(true).unwrap();
        h.task.await.unwrap();
        assert!(kinds(&mut h.scheduler).is_empty());
    }
}
