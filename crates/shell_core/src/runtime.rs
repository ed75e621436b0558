//! Worker thread that owns an [`AppShell`] and applies queued commands one at
//! a time, so navigations never overlap.

use std::thread;

use chrono::Utc;
use crossbeam_channel::{Receiver, Sender, TrySendError};
use serde_json::Value;
use shared::{
    domain::ElementId,
    error::{ErrorCode, ShellFailure},
    protocol::ShellEvent,
};
use view::scan_refs;

use crate::{
    host::{NavigationHistory, PendingNavigation},
    navigation::AppShell,
};

#[derive(Debug, Clone, PartialEq)]
pub enum ShellCommand {
    Launch,
    Navigate {
        location: String,
        state: Option<Value>,
    },
    Back {
        distance: usize,
    },
    Forward {
        distance: usize,
    },
    Dispatch {
        element: ElementId,
        event: String,
        payload: Value,
    },
    /// Dispatch on the element of the current page carrying
    /// `data-shell-ref="name"`.
    DispatchRef {
        name: String,
        event: String,
        payload: Value,
    },
    Shutdown,
}

impl ShellCommand {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Launch => "launch",
            Self::Navigate { .. } => "navigate",
            Self::Back { .. } => "back",
            Self::Forward { .. } => "forward",
            Self::Dispatch { .. } => "dispatch",
            Self::DispatchRef { .. } => "dispatch_ref",
            Self::Shutdown => "shutdown",
        }
    }
}

/// An [`AppShell`] paired with the host history that feeds it.
pub struct ShellSession {
    shell: AppShell,
    history: NavigationHistory,
}

impl ShellSession {
    pub fn new(shell: AppShell) -> Self {
        Self {
            shell,
            history: NavigationHistory::new(),
        }
    }

    pub fn shell(&self) -> &AppShell {
        &self.shell
    }

    pub fn shell_mut(&mut self) -> &mut AppShell {
        &mut self.shell
    }

    pub fn history(&self) -> &NavigationHistory {
        &self.history
    }

    pub async fn apply(&mut self, cmd: ShellCommand) -> ShellEvent {
        match cmd {
            ShellCommand::Launch => {
                let home = self.shell.home_page().to_string();
                self.commit(|history| Some(history.navigate(home, None)))
                    .await
            }
            ShellCommand::Navigate { location, state } => {
                if self.shell.before_navigate(&location).is_veto() {
                    return ShellEvent::Vetoed { target: location };
                }
                self.commit(|history| Some(history.navigate(location, state)))
                    .await
            }
            ShellCommand::Back { distance } => {
                let Some(target) = self.history.back_target(distance) else {
                    return ShellEvent::Info(format!("cannot go back {distance} page(s)"));
                };
                if self.shell.before_navigate(&target.location).is_veto() {
                    return ShellEvent::Vetoed {
                        target: target.location.clone(),
                    };
                }
                self.commit(|history| history.back(distance)).await
            }
            ShellCommand::Forward { distance } => {
                let Some(target) = self.history.forward_target(distance) else {
                    return ShellEvent::Info(format!("cannot go forward {distance} page(s)"));
                };
                if self.shell.before_navigate(&target.location).is_veto() {
                    return ShellEvent::Vetoed {
                        target: target.location.clone(),
                    };
                }
                self.commit(|history| history.forward(distance)).await
            }
            ShellCommand::Dispatch {
                element,
                event,
                payload,
            } => self.dispatch(element, event, payload).await,
            ShellCommand::DispatchRef {
                name,
                event,
                payload,
            } => {
                let element = self
                    .shell
                    .current()
                    .and_then(|handle| self.shell.view_of(handle))
                    .and_then(|view| scan_refs(self.shell.tree(), view).get(&name).copied());
                match element {
                    Some(element) => self.dispatch(element, event, payload).await,
                    None => ShellEvent::Info(format!("no element named '{name}' on the current page")),
                }
            }
            ShellCommand::Shutdown => ShellEvent::Info("shell worker stopping".to_string()),
        }
    }

    async fn dispatch(&mut self, element: ElementId, event: String, payload: Value) -> ShellEvent {
        let page = self
            .shell
            .owning_controller(element)
            .and_then(|handle| self.shell.page_of(handle))
            .unwrap_or_default()
            .to_string();
        match self.shell.dispatch_action(element, &event, payload).await {
            Ok(Some(action)) => ShellEvent::ActionDispatched {
                page,
                event,
                action,
            },
            Ok(None) => ShellEvent::Info(format!("no action wired for '{event}' on {element}")),
            Err(err) => ShellEvent::Error(ShellFailure::from(err)),
        }
    }

    /// Moves the history, then delivers the navigation. The history is
    /// restored when the navigation fails.
    async fn commit<F>(&mut self, move_history: F) -> ShellEvent
    where
        F: FnOnce(&mut NavigationHistory) -> Option<PendingNavigation>,
    {
        let saved = self.history.clone();
        let Some(pending) = move_history(&mut self.history) else {
            return ShellEvent::Info("history did not move".to_string());
        };

        match self
            .shell
            .navigate(
                &pending.location,
                pending.delta,
                &pending.snapshot,
                pending.state,
            )
            .await
        {
            Ok(outcome) => ShellEvent::Navigated {
                from: outcome
                    .previous
                    .and_then(|handle| self.shell.page_of(handle))
                    .map(str::to_string),
                to: outcome.page,
                handle: outcome.current,
                delta: pending.delta,
                created: outcome.created,
                at: Utc::now(),
            },
            Err(err) => {
                self.history = saved;
                ShellEvent::Error(ShellFailure::from(err))
            }
        }
    }
}

/// Spawns the worker. `build` runs on the worker thread; a build failure is
/// reported as an [`ErrorCode::Internal`] event and the worker exits.
pub fn spawn_shell_worker<F>(
    build: F,
    cmd_rx: Receiver<ShellCommand>,
    event_tx: Sender<ShellEvent>,
) -> thread::JoinHandle<()>
where
    F: FnOnce() -> anyhow::Result<AppShell> + Send + 'static,
{
    thread::spawn(move || {
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                emit(
                    &event_tx,
                    ShellEvent::Error(ShellFailure::new(
                        ErrorCode::Internal,
                        format!("shell worker startup failure: failed to build runtime: {err}"),
                    )),
                );
                tracing::error!("failed to build shell runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let shell = match build() {
                Ok(shell) => shell,
                Err(err) => {
                    emit(
                        &event_tx,
                        ShellEvent::Error(ShellFailure::new(
                            ErrorCode::Internal,
                            format!("shell worker startup failure: {err:#}"),
                        )),
                    );
                    tracing::error!("failed to build shell: {err:#}");
                    return;
                }
            };
            emit(&event_tx, ShellEvent::Info("shell worker ready".to_string()));

            let mut session = ShellSession::new(shell);
            while let Ok(cmd) = cmd_rx.recv() {
                let stop = matches!(cmd, ShellCommand::Shutdown);
                tracing::debug!(command = cmd.name(), "applying shell command");
                let event = session.apply(cmd).await;
                emit(&event_tx, event);
                if stop {
                    break;
                }
            }
            tracing::info!("shell worker stopped");
        });
    })
}

fn emit(event_tx: &Sender<ShellEvent>, event: ShellEvent) {
    if let Err(TrySendError::Full(event)) = event_tx.try_send(event) {
        tracing::warn!(?event, "shell event queue is full; dropping event");
    }
}

pub fn dispatch_shell_command(
    cmd_tx: &Sender<ShellCommand>,
    cmd: ShellCommand,
    status: &mut String,
) {
    let cmd_name = cmd.name();
    match cmd_tx.try_send(cmd) {
        Ok(()) => tracing::debug!(command = cmd_name, "queued shell command"),
        Err(TrySendError::Full(_)) => {
            *status = "Shell command queue is full; please retry".to_string();
        }
        Err(TrySendError::Disconnected(_)) => {
            *status =
                "Shell worker disconnected (possible startup/runtime failure); restart the shell"
                    .to_string();
        }
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
