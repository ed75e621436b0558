use std::{fs, sync::Arc};

use anyhow::Result;
use serde_json::json;
use shared::protocol::ShellEvent;
use shell_core::{load_config, AppShell, ControllerRegistry, ShellCommand, ShellSession};
use view::DirectoryViewLoader;

fn write_fixture(dir: &std::path::Path) -> Result<()> {
    fs::create_dir_all(dir.join("views/pages"))?;
    fs::write(
        dir.join("shell.toml"),
        r#"
home_page = "home"
pages = [
  "home",
  { name = "inbox", view = "pages/inbox", config = { folder = { name = "Inbox", unread = 3 } } },
]
"#,
    )?;
    fs::write(
        dir.join("views/home.json"),
        json!({"tag": "main", "attributes": {"data-shell-ref": "title"}}).to_string(),
    )?;
    fs::write(
        dir.join("views/pages/inbox.json"),
        json!({
            "tag": "section",
            "children": [
                {"tag": "h1", "attributes": {"data-shell-bind": "folder.name"}},
                {"tag": "button", "attributes": {"data-shell-actions": "click: refresh()"}}
            ]
        })
        .to_string(),
    )?;
    Ok(())
}

#[tokio::test]
async fn launches_from_files_and_round_trips() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_fixture(dir.path())?;

    let config = load_config(dir.path().join("shell.toml"))?;
    let loader = Arc::new(DirectoryViewLoader::new(dir.path().join("views")));
    let mut session = ShellSession::new(AppShell::new(config, ControllerRegistry::new(), loader)?);

    let launched = session.apply(ShellCommand::Launch).await;
    let ShellEvent::Navigated { ref to, ref from, .. } = launched else {
        panic!("launch failed: {launched:?}");
    };
    assert_eq!(to.as_str(), "home");
    assert!(from.is_none());

    let inbox = session
        .apply(ShellCommand::Navigate {
            location: "inbox".into(),
            state: None,
        })
        .await;
    let ShellEvent::Navigated { handle, created, .. } = inbox else {
        panic!("inbox navigation failed: {inbox:?}");
    };
    assert!(created);
    let folder = session
        .shell()
        .bound_model(handle, "folder.name")
        .expect("folder name bound");
    assert_eq!(folder.get(), json!("Inbox"));

    let back = session.apply(ShellCommand::Back { distance: 1 }).await;
    assert!(matches!(
        back,
        ShellEvent::Navigated { ref to, created: false, .. } if to == "home"
    ));
    assert_eq!(session.shell().controller_count(), 2);
    Ok(())
}
