// src/engine/runtime.rs

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::exec::BindingExecutor;
use crate::reload::ClientRegistry;

use super::core::CoreRuntime;
use super::{CoreCommand, RuntimeEvent};

/// Drives the core state machine from `RuntimeEvent`s, hands unit runs to a
/// [`BindingExecutor`] and broadcasts reloads through the [`ClientRegistry`].
///
/// All runtime semantics live in `CoreRuntime`; this struct only does IO.
pub struct Runtime<E: BindingExecutor> {
    core: CoreRuntime,
    event_rx: mpsc::Receiver<RuntimeEvent>,
    executor: E,
    registry: Arc<ClientRegistry>,
}

impl<E: BindingExecutor> fmt::Debug for Runtime<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("clients", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl<E: BindingExecutor> Runtime<E> {
    pub fn new(
        core: CoreRuntime,
        event_rx: mpsc::Receiver<RuntimeEvent>,
        executor: E,
        registry: Arc<ClientRegistry>,
    ) -> Self {
        Self {
            core,
            event_rx,
            executor,
            registry,
        }
    }

    /// Main event loop. Returns on shutdown or when every sender is gone.
    ///
    /// Build failures never end the loop; only executor plumbing errors do.
    pub async fn run(mut self) -> anyhow::Result<()> {
        info!("watch loop started");

        while let Some(event) = self.event_rx.recv().await {
            debug!(?event, "runtime received event");
            if !self.process(event).await? {
                info!("shutdown requested; stopping watch loop");
                return Ok(());
            }
        }

        info!("runtime event channel closed; exiting");
        Ok(())
    }

    /// Feed one event (and any follow-up acknowledgements) through the core.
    async fn process(&mut self, event: RuntimeEvent) -> anyhow::Result<bool> {
        let mut queue = VecDeque::from([event]);
        while let Some(event) = queue.pop_front() {
            let step = self.core.step(event);
            for command in step.commands {
                if let Some(ack) = self.execute_command(command).await? {
                    queue.push_back(ack);
                }
            }
            if !step.keep_running {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn execute_command(&mut self, command: CoreCommand) -> anyhow::Result<Option<RuntimeEvent>> {
        match command {
            CoreCommand::Dispatch { binding, units } => {
                debug!(binding = %binding, ?units, "dispatching units");
                self.executor.dispatch(binding, units).await?;
                Ok(None)
            }
            CoreCommand::Reload { binding, message } => {
                let clients = self.registry.broadcast(&message);
                info!(binding = %binding, event = message.event_name(), clients, "reload sent");
                Ok(Some(RuntimeEvent::ReloadSent { binding }))
            }
        }
    }
}
