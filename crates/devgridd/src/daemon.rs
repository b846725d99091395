//! Daemon mode — runs one node's slots behind the REST API.
//!
//! In this mode the daemon:
//! 1. Starts the device registry, standing in for the cluster coordinator
//! 2. Starts the execution host loop that acts on kill signals
//! 3. Starts the agent, which spawns and registers one slot per device
//! 4. Serves the REST API until Ctrl-C
//! 5. On shutdown, stops every slot (deregistering its device) and then
//!    the coordinator loops

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use devgrid_agent::{Agent, AgentSettings, HostRef, KillContainer};
use devgrid_core::{ContainerState, DevgridConfig};
use devgrid_scheduler::{ClusterRef, DeviceRegistry};

pub async fn run(config: DevgridConfig, port: u16) -> anyhow::Result<()> {
    info!(agent_id = %config.agent.id, devices = config.devices.len(), "devgrid daemon starting");

    // ── Coordinator side ───────────────────────────────────────

    let (cluster, scheduler_rx) = ClusterRef::channel();
    let (host, kill_rx) = HostRef::channel();
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let registry = DeviceRegistry::new();
    let registry_handle = {
        let registry = registry.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(async move { registry.run(scheduler_rx, shutdown).await })
    };

    // ── Slots ──────────────────────────────────────────────────

    let agent = Arc::new(Agent::start(
        AgentSettings::from(&config),
        Arc::new(cluster),
        Arc::new(host),
    ));

    let host_handle = {
        let agent = agent.clone();
        let shutdown = shutdown_rx.clone();
        tokio::spawn(run_execution_host(agent, kill_rx, shutdown))
    };

    // ── API server ─────────────────────────────────────────────

    let router = devgrid_api::build_router(agent.clone());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                warn!(error = %e, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    // ── Shutdown ───────────────────────────────────────────────

    agent.shutdown().await;
    let _ = shutdown_tx.send(true);

    let _ = host_handle.await;
    match registry_handle.await {
        Ok(violations) => {
            let remaining = registry.len().await;
            info!(violations, remaining, "device registry drained");
        }
        Err(e) => warn!(error = %e, "device registry task failed"),
    }

    info!("devgrid daemon stopped");
    Ok(())
}

/// Stand-in execution host: every kill succeeds immediately and is
/// reported back to the agent as a terminated container.
async fn run_execution_host(
    agent: Arc<Agent>,
    mut kills: mpsc::UnboundedReceiver<KillContainer>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            kill = kills.recv() => {
                let Some(kill) = kill else { break };
                info!(container_id = %kill.container_id, "killing container");

                let terminated = devgrid_core::Container {
                    id: kill.container_id,
                    state: ContainerState::Terminated,
                };
                if let Err(e) = agent.update_container_state(terminated).await {
                    warn!(error = %e, "termination report not delivered");
                }
            }
            _ = shutdown.changed() => break,
        }
    }
}
