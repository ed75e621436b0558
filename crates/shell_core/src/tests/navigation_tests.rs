use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use super::*;
use async_trait::async_trait;
use serde_json::json;
use shared::protocol::PageDescriptor;
use view::{ElementSpec, StaticViewLoader, ACTIONS_ATTR, BIND_ATTR, REF_ATTR};

use crate::{
    controller::{factory, ControllerFactory},
    host::{NavigationHistory, PendingNavigation},
    registry::convention_name,
};

type Journal = Arc<Mutex<Vec<String>>>;

struct JournalController {
    page: String,
    view: ViewHandle,
    model: Value,
    journal: Journal,
}

impl JournalController {
    fn record(&self, entry: impl AsRef<str>) {
        self.journal
            .lock()
            .expect("journal")
            .push(format!("{}.{}", self.page, entry.as_ref()));
    }

    fn fails_in(&self, phase: &str) -> bool {
        self.model.get("fail").and_then(Value::as_str) == Some(phase)
    }
}

#[async_trait]
impl PageController for JournalController {
    fn view(&self) -> ViewHandle {
        self.view
    }

    async fn view_ready(&mut self, _view: &WiredView) -> anyhow::Result<()> {
        self.record("viewReady");
        if self.fails_in("viewReady") {
            anyhow::bail!("not ready");
        }
        Ok(())
    }

    async fn before_navigate_in(&mut self, ctx: &NavigationContext) -> anyhow::Result<()> {
        if self.model.get("hang").is_some() {
            futures::future::pending::<()>().await;
        }
        if let Some(from) = ctx.state.get("from").and_then(Value::as_str) {
            self.record(format!("from={from}"));
        }
        self.record("beforeIn");
        if self.fails_in("beforeIn") {
            anyhow::bail!("refusing to enter");
        }
        Ok(())
    }

    async fn after_navigate_in(&mut self, _ctx: &NavigationContext) -> anyhow::Result<()> {
        self.record("afterIn");
        Ok(())
    }

    async fn before_navigate_out(&mut self, _ctx: &NavigationContext) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.record("beforeOut");
        Ok(())
    }

    async fn after_navigate_out(&mut self, _ctx: &NavigationContext) -> anyhow::Result<()> {
        self.record("afterOut");
        Ok(())
    }

    fn has_action(&self, name: &str) -> bool {
        name == "save"
    }

    async fn invoke_action(&mut self, name: &str, event: &ActionEvent) -> anyhow::Result<()> {
        self.record(format!("action.{name}.{}", event.event));
        Ok(())
    }

    async fn run_inline(&mut self, body: &str, _event: &ActionEvent) -> anyhow::Result<()> {
        self.record(format!("inline.{body}"));
        Ok(())
    }

    fn model_mut(&mut self) -> Option<&mut Value> {
        Some(&mut self.model)
    }
}

fn journal_factory(page: &str, journal: &Journal) -> ControllerFactory {
    let page = page.to_string();
    let journal = journal.clone();
    factory(move |view, config| {
        journal.lock().expect("journal").push(format!("{page}.new"));
        Ok(Box::new(JournalController {
            page: page.clone(),
            view,
            model: config.clone(),
            journal: journal.clone(),
        }) as Box<dyn PageController>)
    })
}

fn definition(name: &str, view: Option<&str>, config: Value) -> PageDescriptor {
    PageDescriptor::Definition {
        name: name.to_string(),
        view: view.map(str::to_string),
        controller: None,
        controller_class: None,
        config: Some(config),
    }
}

fn loader() -> Arc<dyn ViewLoader> {
    Arc::new(
        StaticViewLoader::new()
            .with_fragment("home", ElementSpec::new("section").attr(REF_ATTR, "title"))
            .with_fragment(
                "detail",
                ElementSpec::new("section")
                    .child(ElementSpec::new("h1").attr(BIND_ATTR, "profile.name"))
                    .child(
                        ElementSpec::new("button")
                            .attr(REF_ATTR, "save")
                            .attr(ACTIONS_ATTR, "click: save, hover: this.highlight()")
                            .child(ElementSpec::new("span").attr(REF_ATTR, "label")),
                    ),
            )
            .with_fragment(
                "broken",
                ElementSpec::new("section").child(ElementSpec::new("p").attr(BIND_ATTR, "missing.path")),
            ),
    )
}

const PAGES: [&str; 7] = [
    "home", "detail", "broken", "failing", "hanging", "ghost", "unready",
];

fn build_shell(handoff: HandoffMode, journal: &Journal) -> AppShell {
    let config = ShellConfig {
        pages: vec![
            PageDescriptor::from("home"),
            definition("detail", None, json!({"profile": {"name": "Ada"}})),
            PageDescriptor::from("broken"),
            definition("failing", Some("home"), json!({"fail": "beforeIn"})),
            definition("hanging", Some("home"), json!({"hang": true})),
            PageDescriptor::from("ghost"),
            definition("unready", Some("home"), json!({"fail": "viewReady"})),
            PageDescriptor::Definition {
                name: "orphan".to_string(),
                view: Some("home".to_string()),
                controller: Some("Nope.Missing".to_string()),
                controller_class: None,
                config: None,
            },
        ],
        handoff,
        ..ShellConfig::default()
    };
    let mut registry = ControllerRegistry::new();
    for page in PAGES {
        registry.register(&convention_name(page), journal_factory(page, journal));
    }
    AppShell::new(config, registry, loader()).expect("shell")
}

async fn go(
    shell: &mut AppShell,
    pending: PendingNavigation,
) -> Result<NavigationOutcome, ShellError> {
    shell
        .navigate(&pending.location, pending.delta, &pending.snapshot, pending.state)
        .await
}

fn take(journal: &Journal) -> Vec<String> {
    std::mem::take(&mut *journal.lock().expect("journal"))
}

#[tokio::test]
async fn launch_runs_only_the_incoming_half() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);

    let outcome = shell.launch().await.expect("launch");
    assert_eq!(outcome.page, "home");
    assert!(outcome.previous.is_none());
    assert!(outcome.created);
    assert_eq!(
        take(&journal),
        vec!["home.new", "home.viewReady", "home.beforeIn", "home.afterIn"]
    );
    assert_eq!(shell.state(), NavState::Idle);
    assert_eq!(shell.current(), Some(outcome.current));

    let view = shell.view_of(outcome.current).expect("view");
    assert!(shell.tree().is_attached(view));
    assert_eq!(shell.owning_controller(view), Some(outcome.current));
}

#[tokio::test]
async fn round_trip_reuses_the_cached_controller() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);
    let mut history = NavigationHistory::new();

    let home = go(&mut shell, history.navigate("home", None))
        .await
        .expect("home");
    take(&journal);

    let detail = go(&mut shell, history.navigate("detail", None))
        .await
        .expect("detail");
    assert_eq!(detail.previous, Some(home.current));
    assert_eq!(
        take(&journal),
        vec![
            "detail.new",
            "detail.viewReady",
            "home.beforeOut",
            "home.afterOut",
            "detail.beforeIn",
            "detail.afterIn",
        ]
    );

    let back = go(&mut shell, history.back(1).expect("back"))
        .await
        .expect("back");
    assert_eq!(back.current, home.current);
    assert_eq!(back.previous, Some(detail.current));
    assert!(!back.created);
    assert_eq!(
        take(&journal),
        vec![
            "detail.beforeOut",
            "detail.afterOut",
            "home.beforeIn",
            "home.afterIn",
        ]
    );
    assert_eq!(shell.controller_count(), 2);

    let home_view = shell.view_of(home.current).expect("home view");
    let detail_view = shell.view_of(detail.current).expect("detail view");
    assert!(shell.tree().is_attached(home_view));
    assert!(!shell.tree().is_attached(detail_view));
}

#[tokio::test]
async fn overlapped_handoff_interleaves_but_keeps_precedence() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Overlapped, &journal);
    let mut history = NavigationHistory::new();

    go(&mut shell, history.navigate("home", None))
        .await
        .expect("home");
    take(&journal);
    go(&mut shell, history.navigate("detail", None))
        .await
        .expect("detail");

    let order = take(&journal);
    assert_eq!(
        order,
        vec![
            "detail.new",
            "detail.viewReady",
            "detail.beforeIn",
            "home.beforeOut",
            "detail.afterIn",
            "home.afterOut",
        ]
    );
    let position = |entry: &str| {
        order
            .iter()
            .position(|recorded| recorded == entry)
            .expect("recorded")
    };
    assert!(position("home.beforeOut") < position("home.afterOut"));
    assert!(position("detail.beforeIn") < position("detail.afterIn"));
}

#[tokio::test]
async fn same_page_navigation_runs_both_halves_on_one_controller() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Overlapped, &journal);
    let mut history = NavigationHistory::new();

    let first = go(&mut shell, history.navigate("home", None))
        .await
        .expect("home");
    take(&journal);

    let again = go(&mut shell, history.navigate("home", None))
        .await
        .expect("home again");
    assert_eq!(again.current, first.current);
    assert_eq!(again.previous, Some(first.current));
    assert_eq!(
        take(&journal),
        vec!["home.beforeOut", "home.afterOut", "home.beforeIn", "home.afterIn"]
    );
    let view = shell.view_of(first.current).expect("view");
    assert!(shell.tree().is_attached(view));
}

#[tokio::test]
async fn unknown_pages_are_vetoed_and_fail_to_navigate() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);

    assert_eq!(shell.before_navigate("home"), NavigationVerdict::Proceed);
    assert!(shell.before_navigate("nowhere").is_veto());

    let err = shell
        .navigate("nowhere", 0, &HistorySnapshot::default(), None)
        .await
        .expect_err("unknown page");
    assert!(matches!(err, ShellError::UnknownPage { ref name } if name == "nowhere"));
    assert_eq!(shell.state(), NavState::Idle);
    assert_eq!(shell.controller_count(), 0);
}

#[tokio::test]
async fn plain_navigation_inherits_the_caller_state() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);
    let mut history = NavigationHistory::new();

    go(&mut shell, history.navigate("home", None))
        .await
        .expect("home");
    take(&journal);
    go(&mut shell, history.navigate("detail", Some(json!({"from": "home"}))))
        .await
        .expect("detail");

    assert!(take(&journal).contains(&"detail.from=home".to_string()));
}

#[tokio::test]
async fn bindings_materialize_before_entering() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);
    let mut history = NavigationHistory::new();

    go(&mut shell, history.navigate("home", None))
        .await
        .expect("home");
    let detail = go(&mut shell, history.navigate("detail", None))
        .await
        .expect("detail");
    let model = shell
        .bound_model(detail.current, "profile.name")
        .expect("bound")
        .clone();
    assert_eq!(model.get(), json!("Ada"));

    go(&mut shell, history.back(1).expect("back"))
        .await
        .expect("back");
    go(&mut shell, history.forward(1).expect("forward"))
        .await
        .expect("forward again");
    model.set(json!("Grace"));
    assert_eq!(
        shell
            .bound_model(detail.current, "profile.name")
            .expect("still bound")
            .get(),
        json!("Grace")
    );
}

#[tokio::test]
async fn missing_model_path_fails_the_navigation() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);

    let err = shell
        .navigate("broken", 0, &HistorySnapshot::default(), None)
        .await
        .expect_err("missing model");
    assert!(matches!(
        err,
        ShellError::ModelPath { ref path, ref segment } if path == "missing.path" && segment == "missing"
    ));
    assert!(!take(&journal).contains(&"broken.beforeIn".to_string()));
    assert_eq!(shell.state(), NavState::Idle);
}

#[tokio::test]
async fn hook_failures_surface_with_their_phase() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);

    let err = shell
        .navigate("failing", 0, &HistorySnapshot::default(), None)
        .await
        .expect_err("hook failure");
    assert!(matches!(
        err,
        ShellError::Hook { ref page, phase: LifecyclePhase::BeforeNavigateIn, .. } if page == "failing"
    ));
    assert_eq!(shell.state(), NavState::Idle);
    assert!(!take(&journal).contains(&"failing.afterIn".to_string()));
}

#[tokio::test]
async fn missing_view_fragment_is_a_view_load_error() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);

    let err = shell
        .navigate("ghost", 0, &HistorySnapshot::default(), None)
        .await
        .expect_err("no fragment");
    assert!(matches!(err, ShellError::ViewLoad { ref view, .. } if view == "ghost"));
    assert!(take(&journal).is_empty());
}

#[tokio::test]
async fn abandoned_transition_blocks_until_recovered() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);

    let abandoned = tokio::time::timeout(
        Duration::from_millis(20),
        shell.navigate("hanging", 0, &HistorySnapshot::default(), None),
    )
    .await;
    assert!(abandoned.is_err());
    assert_eq!(shell.state(), NavState::Transitioning);

    let err = shell
        .navigate("home", 0, &HistorySnapshot::default(), None)
        .await
        .expect_err("in flight");
    assert!(matches!(err, ShellError::NavigationInFlight { ref target } if target == "home"));

    assert!(shell.recover());
    assert_eq!(shell.state(), NavState::Idle);
    assert!(!shell.recover());
    let hanging = shell.handle_for("hanging").expect("hanging cached");
    let hanging_view = shell.view_of(hanging).expect("view");
    assert!(!shell.tree().is_attached(hanging_view));

    let home = shell
        .navigate("home", 0, &HistorySnapshot::default(), None)
        .await
        .expect("home after recovery");
    assert_eq!(shell.current(), Some(home.current));
}

#[tokio::test]
async fn failed_view_ready_is_not_cached() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);
    let baseline = shell.tree().len();

    for _ in 0..2 {
        let err = shell
            .navigate("unready", 0, &HistorySnapshot::default(), None)
            .await
            .expect_err("view_ready fails");
        assert!(matches!(
            err,
            ShellError::Hook { ref page, phase: LifecyclePhase::ViewReady, .. } if page == "unready"
        ));
        assert_eq!(take(&journal), vec!["unready.new", "unready.viewReady"]);
        assert_eq!(shell.handle_for("unready"), None);
        assert_eq!(shell.controller_count(), 0);
        assert_eq!(shell.tree().len(), baseline);
        assert_eq!(shell.state(), NavState::Idle);
    }

    let home = shell.launch().await.expect("home");
    assert_eq!(home.current, ControllerHandle(0));
    assert!(home.created);
}

#[tokio::test]
async fn unresolvable_pages_do_not_grow_the_tree() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);
    let baseline = shell.tree().len();

    for _ in 0..3 {
        let err = shell
            .navigate("orphan", 0, &HistorySnapshot::default(), None)
            .await
            .expect_err("no controller");
        assert!(matches!(err, ShellError::Resolution { .. }));
        assert_eq!(shell.tree().len(), baseline);
    }
    assert!(take(&journal).is_empty());
    assert_eq!(shell.handle_for("orphan"), None);
}

#[tokio::test]
async fn actions_bubble_to_the_wired_ancestor() {
    let journal = Journal::default();
    let mut shell = build_shell(HandoffMode::Sequential, &journal);
    let detail = shell
        .navigate("detail", 0, &HistorySnapshot::default(), None)
        .await
        .expect("detail");
    take(&journal);

    let view = shell.view_of(detail.current).expect("view");
    let refs = scan_refs(shell.tree(), view);
    let label = refs["label"];
    assert_eq!(shell.owning_controller(label), Some(detail.current));
    assert_eq!(shell.owning_controller(shell.tree().host()), None);

    let click = shell
        .dispatch_action(label, "click", json!({}))
        .await
        .expect("click");
    assert_eq!(click.as_deref(), Some("save"));

    let hover = shell
        .dispatch_action(refs["save"], "hover", json!({}))
        .await
        .expect("hover");
    assert_eq!(hover.as_deref(), Some("this.highlight()"));

    let unwired = shell
        .dispatch_action(label, "scroll", json!({}))
        .await
        .expect("scroll");
    assert!(unwired.is_none());

    assert_eq!(
        take(&journal),
        vec!["detail.action.save.click", "detail.inline.this.highlight()"]
    );
}
