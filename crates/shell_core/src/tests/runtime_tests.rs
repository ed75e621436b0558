use std::sync::Arc;

use super::*;
use anyhow::anyhow;
use serde_json::json;
use view::{scan_refs, ElementSpec, StaticViewLoader, ACTIONS_ATTR, REF_ATTR};

use crate::{config::ShellConfig, registry::ControllerRegistry};

fn build_shell() -> anyhow::Result<AppShell> {
    let loader = StaticViewLoader::new()
        .with_fragment("home", ElementSpec::new("main"))
        .with_fragment(
            "detail",
            ElementSpec::new("main").child(
                ElementSpec::new("button")
                    .attr(REF_ATTR, "refresh")
                    .attr(ACTIONS_ATTR, "click: reload()"),
            ),
        );
    let config = ShellConfig::with_pages(["home", "detail", "ghost"]);
    Ok(AppShell::new(
        config,
        ControllerRegistry::new(),
        Arc::new(loader),
    )?)
}

fn navigated_to(event: &ShellEvent) -> Option<(&str, Option<&str>, i32, bool)> {
    match event {
        ShellEvent::Navigated {
            to,
            from,
            delta,
            created,
            ..
        } => Some((to.as_str(), from.as_deref(), *delta, *created)),
        _ => None,
    }
}

#[tokio::test]
async fn session_tracks_history_through_commands() {
    let mut session = ShellSession::new(build_shell().expect("shell"));

    let event = session.apply(ShellCommand::Launch).await;
    assert_eq!(navigated_to(&event), Some(("home", None, 0, true)));

    let event = session
        .apply(ShellCommand::Navigate {
            location: "detail".into(),
            state: None,
        })
        .await;
    assert_eq!(navigated_to(&event), Some(("detail", Some("home"), 0, true)));

    let event = session.apply(ShellCommand::Back { distance: 1 }).await;
    assert_eq!(navigated_to(&event), Some(("home", Some("detail"), -1, false)));

    let event = session.apply(ShellCommand::Forward { distance: 1 }).await;
    assert_eq!(navigated_to(&event), Some(("detail", Some("home"), 1, false)));
    assert_eq!(session.history().location(), Some("detail"));
}

#[tokio::test]
async fn vetoes_and_out_of_range_moves_leave_history_alone() {
    let mut session = ShellSession::new(build_shell().expect("shell"));
    session.apply(ShellCommand::Launch).await;

    let event = session
        .apply(ShellCommand::Navigate {
            location: "nowhere".into(),
            state: None,
        })
        .await;
    assert!(matches!(event, ShellEvent::Vetoed { ref target } if target == "nowhere"));

    let event = session.apply(ShellCommand::Back { distance: 3 }).await;
    assert!(matches!(event, ShellEvent::Info(_)));
    assert_eq!(session.history().location(), Some("home"));
    assert!(!session.history().can_go_back());
}

#[tokio::test]
async fn failed_navigation_restores_history() {
    let mut session = ShellSession::new(build_shell().expect("shell"));
    session.apply(ShellCommand::Launch).await;

    let event = session
        .apply(ShellCommand::Navigate {
            location: "ghost".into(),
            state: None,
        })
        .await;
    match event {
        ShellEvent::Error(failure) => assert_eq!(failure.code, ErrorCode::ViewLoad),
        other => panic!("expected an error event, got {other:?}"),
    }
    assert_eq!(session.history().location(), Some("home"));
    assert!(!session.history().can_go_back());
}

#[tokio::test]
async fn dispatch_reports_the_action_and_page() {
    let mut session = ShellSession::new(build_shell().expect("shell"));
    session.apply(ShellCommand::Launch).await;
    let event = session
        .apply(ShellCommand::Navigate {
            location: "detail".into(),
            state: None,
        })
        .await;
    let ShellEvent::Navigated { handle, .. } = event else {
        panic!("expected navigation");
    };

    let view = session.shell().view_of(handle).expect("view");
    let button = scan_refs(session.shell().tree(), view)["refresh"];
    let event = session
        .apply(ShellCommand::Dispatch {
            element: button,
            event: "click".into(),
            payload: json!({"x": 1}),
        })
        .await;
    assert!(matches!(
        event,
        ShellEvent::ActionDispatched { ref page, ref action, .. }
            if page == "detail" && action == "reload()"
    ));
}

#[tokio::test]
async fn dispatch_by_ref_targets_the_current_page() {
    let mut session = ShellSession::new(build_shell().expect("shell"));
    session.apply(ShellCommand::Launch).await;

    let missing = session
        .apply(ShellCommand::DispatchRef {
            name: "refresh".into(),
            event: "click".into(),
            payload: Value::Null,
        })
        .await;
    assert!(matches!(missing, ShellEvent::Info(_)));

    session
        .apply(ShellCommand::Navigate {
            location: "detail".into(),
            state: None,
        })
        .await;
    let event = session
        .apply(ShellCommand::DispatchRef {
            name: "refresh".into(),
            event: "click".into(),
            payload: Value::Null,
        })
        .await;
    assert!(matches!(event, ShellEvent::ActionDispatched { ref action, .. } if action == "reload()"));
}

#[test]
fn worker_applies_commands_in_order_and_stops() {
    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(8);
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let worker = spawn_shell_worker(build_shell, cmd_rx, event_tx);

    let mut status = String::new();
    dispatch_shell_command(&cmd_tx, ShellCommand::Launch, &mut status);
    dispatch_shell_command(
        &cmd_tx,
        ShellCommand::Navigate {
            location: "detail".into(),
            state: Some(json!({"from": "home"})),
        },
        &mut status,
    );
    dispatch_shell_command(&cmd_tx, ShellCommand::Shutdown, &mut status);
    assert!(status.is_empty());

    worker.join().expect("worker thread");
    let events: Vec<ShellEvent> = event_rx.try_iter().collect();
    assert_eq!(events.len(), 4);
    assert!(matches!(events[0], ShellEvent::Info(_)));
    assert_eq!(navigated_to(&events[1]).map(|n| n.0), Some("home"));
    assert_eq!(navigated_to(&events[2]).map(|n| n.0), Some("detail"));
    assert!(matches!(events[3], ShellEvent::Info(_)));
}

#[test]
fn worker_reports_build_failures() {
    let (_cmd_tx, cmd_rx) = crossbeam_channel::bounded::<ShellCommand>(1);
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let worker = spawn_shell_worker(|| Err(anyhow!("no pages on disk")), cmd_rx, event_tx);
    worker.join().expect("worker thread");

    match event_rx.try_recv().expect("event") {
        ShellEvent::Error(failure) => {
            assert_eq!(failure.code, ErrorCode::Internal);
            assert!(failure.message.contains("no pages on disk"));
        }
        other => panic!("expected an error event, got {other:?}"),
    }
}

#[test]
fn dispatch_reports_full_and_disconnected_queues() {
    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(1);
    let mut status = String::new();

    dispatch_shell_command(&cmd_tx, ShellCommand::Launch, &mut status);
    dispatch_shell_command(&cmd_tx, ShellCommand::Launch, &mut status);
    assert!(status.contains("full"));

    drop(cmd_rx);
    dispatch_shell_command(&cmd_tx, ShellCommand::Shutdown, &mut status);
    assert!(status.contains("disconnected"));
}
