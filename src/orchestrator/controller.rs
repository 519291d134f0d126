//! Distribution lifecycle controller.
//!
//! Owns the registry and drives lifecycle operations, emitting events for
//! presentation layers. One select loop over three inputs: UI commands, the
//! supervisor poll tick, and the delayed-refresh timer that follows a
//! detached start.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::time::Instant;

use crate::error::{CommandError, OpError, RenameError};
use crate::model::{AppEvent, InfoEvent, RenameStatus, RenameTask, UiCommand};
use crate::ops::{self, rename};
use crate::parser::parse_listing;
use crate::registry::Registry;
use crate::runner::{CommandRunner, LIST_VERBOSE};
use crate::supervisor::{self, TaskHandle, TaskStatus};

pub(crate) struct ControllerOptions<R> {
    pub runner: Arc<R>,
    /// Delay between a detached start and the follow-up refresh; the tool
    /// launches asynchronously and the state flip is not instantaneous.
    pub start_refresh_delay: Duration,
    /// Interval at which an in-flight rename is polled for completion.
    pub poll_interval: Duration,
}

struct Controller<R> {
    opts: ControllerOptions<R>,
    registry: Registry,
    event_tx: UnboundedSender<AppEvent>,
    /// In-flight rename, if any. At most one; the UI disables rename while
    /// one is pending.
    rename: Option<(RenameTask, TaskHandle<Result<(), RenameError>>)>,
    /// Deadline for the post-start refresh, when one is scheduled.
    refresh_at: Option<Instant>,
}

/// Runs the controller until `Quit` or command-channel close.
pub(crate) async fn run_controller<R: CommandRunner + 'static>(
    opts: ControllerOptions<R>,
    event_tx: UnboundedSender<AppEvent>,
    mut cmd_rx: UnboundedReceiver<UiCommand>,
) -> Result<()> {
    let mut ctl = Controller {
        opts,
        registry: Registry::new(),
        event_tx,
        rename: None,
        refresh_at: None,
    };

    // Initial population, mirroring the listing done at startup.
    ctl.refresh().await;

    let mut poll = tokio::time::interval(ctl.opts.poll_interval);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(UiCommand::Quit) | None => {
                        // A rename still in flight keeps running on the
                        // blocking pool; UIs hold the door open until it
                        // reports, so this break only abandons it if the
                        // user force-quit.
                        break;
                    }
                    Some(cmd) => ctl.handle_command(cmd).await,
                }
            }
            _ = poll.tick() => {
                ctl.poll_rename().await;
            }
            _ = delayed_refresh(ctl.refresh_at) => {
                ctl.refresh_at = None;
                ctl.refresh().await;
            }
        }
    }

    Ok(())
}

/// Pending-forever unless a refresh deadline is set, so the select branch
/// only fires when scheduled.
async fn delayed_refresh(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => futures::future::pending().await,
    }
}

impl<R: CommandRunner + 'static> Controller<R> {
    async fn handle_command(&mut self, cmd: UiCommand) {
        match cmd {
            UiCommand::Refresh => self.refresh().await,
            UiCommand::Start(name) => {
                match ops::start(&*self.opts.runner, &self.registry, &name) {
                    Ok(()) => {
                        self.refresh_at = Some(Instant::now() + self.opts.start_refresh_delay);
                    }
                    Err(err) => self.report_op_error("start", err),
                }
            }
            UiCommand::OpenShell(name) => {
                // State does not change; no refresh is scheduled.
                if let Err(err) = ops::open_shell(&*self.opts.runner, &self.registry, &name) {
                    self.report_op_error("open shell", err);
                }
            }
            UiCommand::Terminate(name) => {
                let runner = Arc::clone(&self.opts.runner);
                let registry = self.registry.clone();
                let res = tokio::task::spawn_blocking(move || {
                    ops::terminate(&*runner, &registry, &name)
                })
                .await;
                self.finish_blocking_op("terminate", res).await;
            }
            UiCommand::ShutdownAll => {
                let runner = Arc::clone(&self.opts.runner);
                let res =
                    tokio::task::spawn_blocking(move || ops::shutdown_all(&*runner)).await;
                self.finish_blocking_op("shutdown", res).await;
            }
            UiCommand::Rename { old_name, new_name } => {
                self.begin_rename(&old_name, &new_name);
            }
            UiCommand::Quit => unreachable!("handled by the select loop"),
        }
    }

    /// Common tail for blocking operations: report failure, then refresh so
    /// any partial effect is reflected. A missing tool skips the refresh —
    /// nothing changed and re-listing would just blank the registry again.
    async fn finish_blocking_op(
        &mut self,
        operation: &'static str,
        res: std::result::Result<std::result::Result<(), OpError>, tokio::task::JoinError>,
    ) {
        let mut refresh = true;
        match res {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                if matches!(err, OpError::Command(CommandError::ToolNotFound)) {
                    refresh = false;
                }
                self.report_op_error(operation, err);
            }
            Err(join_err) => {
                self.emit(AppEvent::Info(InfoEvent::OperationFailed {
                    operation,
                    detail: join_err.to_string(),
                }));
            }
        }
        if refresh {
            self.refresh().await;
        }
    }

    fn begin_rename(&mut self, old_name: &str, new_name: &str) {
        if self.rename.is_some() {
            self.emit(AppEvent::Info(InfoEvent::Message(
                "a rename is already in progress".into(),
            )));
            return;
        }
        if let Err(err) = rename::validate(&self.registry, old_name, new_name) {
            self.emit(AppEvent::Info(InfoEvent::Rejected(err)));
            return;
        }
        let plan = match rename::RenamePlan::new(old_name, new_name) {
            Ok(plan) => plan,
            Err(err) => {
                self.emit(AppEvent::Info(InfoEvent::OperationFailed {
                    operation: "rename",
                    detail: err.to_string(),
                }));
                return;
            }
        };

        self.emit(AppEvent::RenameStarted {
            old_name: old_name.to_string(),
            new_name: new_name.to_string(),
        });

        let runner = Arc::clone(&self.opts.runner);
        let handle = supervisor::submit(move || rename::execute(&*runner, &plan));
        self.rename = Some((RenameTask::pending(old_name, new_name), handle));
    }

    /// Cooperative completion check for the in-flight rename.
    async fn poll_rename(&mut self) {
        let completed = match &self.rename {
            Some((task, handle)) => match handle.poll() {
                TaskStatus::Finished(result) => Some((task.clone(), result)),
                TaskStatus::Pending => None,
            },
            None => None,
        };

        if let Some((mut task, result)) = completed {
            self.rename = None;
            let archive: Option<PathBuf> = match result {
                Ok(()) => {
                    task.status = RenameStatus::Succeeded;
                    None
                }
                Err(err) => {
                    let archive = err.archive_path().cloned();
                    task.status = RenameStatus::Failed(err.to_string());
                    archive
                }
            };
            self.emit(AppEvent::RenameDone { task, archive });
            self.refresh().await;
        }
    }

    /// Full re-query of the control tool; the snapshot is replaced, never
    /// merged. Runs the blocking listing off the async thread.
    async fn refresh(&mut self) {
        let runner = Arc::clone(&self.opts.runner);
        let res = tokio::task::spawn_blocking(move || runner.run(LIST_VERBOSE)).await;
        match res {
            Ok(Ok(raw)) => self.registry.apply(parse_listing(&raw)),
            Ok(Err(err)) => {
                self.registry.apply(Vec::new());
                let info = match err {
                    CommandError::ToolNotFound => InfoEvent::ToolMissing,
                    other => InfoEvent::OperationFailed {
                        operation: "refresh",
                        detail: other.to_string(),
                    },
                };
                self.emit(AppEvent::Info(info));
            }
            Err(join_err) => {
                self.registry.apply(Vec::new());
                self.emit(AppEvent::Info(InfoEvent::OperationFailed {
                    operation: "refresh",
                    detail: join_err.to_string(),
                }));
            }
        }
        self.emit(AppEvent::Registry(self.registry.to_snapshot()));
    }

    fn report_op_error(&self, operation: &'static str, err: OpError) {
        let info = match err {
            OpError::Validation(v) => InfoEvent::Rejected(v),
            OpError::Command(CommandError::ToolNotFound) => InfoEvent::ToolMissing,
            other => InfoEvent::OperationFailed {
                operation,
                detail: other.to_string(),
            },
        };
        self.emit(AppEvent::Info(info));
    }

    fn emit(&self, event: AppEvent) {
        // A closed event channel means the UI is gone; nothing to do.
        let _ = self.event_tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ValidationError;
    use crate::runner::testing::{exit_error, MockRunner};
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const LISTING: &str = "  NAME    STATE    VERSION\n  Ubuntu    Stopped    2\n* Debian    Running    1\n";

    fn options(runner: MockRunner) -> ControllerOptions<MockRunner> {
        ControllerOptions {
            runner: Arc::new(runner),
            start_refresh_delay: Duration::from_millis(20),
            poll_interval: Duration::from_millis(10),
        }
    }

    async fn next_event(rx: &mut UnboundedReceiver<AppEvent>) -> AppEvent {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("timed out waiting for event")
            .expect("event channel closed")
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn startup_refresh_emits_a_registry_snapshot() {
        let runner = MockRunner::new(vec![Ok(LISTING.to_string())]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl = tokio::spawn(run_controller(options(runner), event_tx, cmd_rx));

        match next_event(&mut event_rx).await {
            AppEvent::Registry(instances) => {
                assert_eq!(instances.len(), 2);
                assert_eq!(instances[0].name, "Ubuntu");
                assert!(instances[1].is_default);
            }
            other => panic!("expected registry snapshot, got {other:?}"),
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_schedules_a_delayed_refresh() {
        // Responses: startup listing, then post-start listing.
        let runner = MockRunner::new(vec![Ok(LISTING.to_string()), Ok(LISTING.to_string())]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl = tokio::spawn(run_controller(options(runner), event_tx, cmd_rx));
        let _ = next_event(&mut event_rx).await; // startup snapshot

        cmd_tx.send(UiCommand::Start("Ubuntu".into())).unwrap();
        match next_event(&mut event_rx).await {
            AppEvent::Registry(_) => {}
            other => panic!("expected post-start refresh, got {other:?}"),
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn start_of_unknown_instance_is_rejected_without_external_call() {
        let runner = MockRunner::new(vec![Ok(LISTING.to_string())]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl = tokio::spawn(run_controller(options(runner), event_tx, cmd_rx));
        let _ = next_event(&mut event_rx).await;

        cmd_tx.send(UiCommand::Start("Ghost".into())).unwrap();
        match next_event(&mut event_rx).await {
            AppEvent::Info(InfoEvent::Rejected(ValidationError::UnknownInstance(name))) => {
                assert_eq!(name, "Ghost");
            }
            other => panic!("expected rejection, got {other:?}"),
        }

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn terminate_failure_still_refreshes_the_registry() {
        let runner = MockRunner::new(vec![
            Ok(LISTING.to_string()),     // startup listing
            Err(exit_error("denied")),   // --terminate
            Ok(LISTING.to_string()),     // post-terminate listing
        ]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl = tokio::spawn(run_controller(options(runner), event_tx, cmd_rx));
        let _ = next_event(&mut event_rx).await;

        cmd_tx.send(UiCommand::Terminate("Debian".into())).unwrap();
        match next_event(&mut event_rx).await {
            AppEvent::Info(InfoEvent::OperationFailed { operation, detail }) => {
                assert_eq!(operation, "terminate");
                assert!(detail.contains("denied"));
            }
            other => panic!("expected failure info, got {other:?}"),
        }
        assert!(matches!(
            next_event(&mut event_rx).await,
            AppEvent::Registry(_)
        ));

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rename_runs_supervised_and_reports_completion() {
        let runner = MockRunner::new(vec![
            Ok(LISTING.to_string()), // startup listing
            Ok(String::new()),       // --export
            Ok(String::new()),       // --unregister
            Ok(String::new()),       // --import
            Ok(LISTING.to_string()), // post-rename listing
        ]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl = tokio::spawn(run_controller(options(runner), event_tx, cmd_rx));
        let _ = next_event(&mut event_rx).await;

        cmd_tx
            .send(UiCommand::Rename {
                old_name: "Ubuntu".into(),
                new_name: "Jammy".into(),
            })
            .unwrap();

        assert!(matches!(
            next_event(&mut event_rx).await,
            AppEvent::RenameStarted { .. }
        ));
        match next_event(&mut event_rx).await {
            AppEvent::RenameDone { task, archive } => {
                assert_eq!(task.status, RenameStatus::Succeeded);
                assert_eq!(task.new_name, "Jammy");
                assert!(archive.is_none());
            }
            other => panic!("expected rename completion, got {other:?}"),
        }
        assert!(matches!(
            next_event(&mut event_rx).await,
            AppEvent::Registry(_)
        ));

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn rename_of_running_instance_is_rejected_before_any_call() {
        let runner = MockRunner::new(vec![Ok(LISTING.to_string())]);
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();

        let ctl = tokio::spawn(run_controller(options(runner), event_tx, cmd_rx));
        let _ = next_event(&mut event_rx).await;

        cmd_tx
            .send(UiCommand::Rename {
                old_name: "Debian".into(),
                new_name: "Bookworm".into(),
            })
            .unwrap();

        assert!(matches!(
            next_event(&mut event_rx).await,
            AppEvent::Info(InfoEvent::Rejected(ValidationError::NotStopped(_)))
        ));

        cmd_tx.send(UiCommand::Quit).unwrap();
        ctl.await.unwrap().unwrap();
    }
}
