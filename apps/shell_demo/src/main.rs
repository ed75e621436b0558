mod controllers;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, bail, Result};
use clap::{Parser, Subcommand};
use collection::{KeyOrderMirror, KeyedCollection};
use serde_json::{json, Value};
use shell_core::{dispatch_shell_command, load_config, spawn_shell_worker, AppShell, ShellCommand};
use view::DirectoryViewLoader;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long, default_value = "apps/shell_demo/assets/shell.toml")]
    config: PathBuf,
    #[arg(long, default_value = "apps/shell_demo/assets/views")]
    views: PathBuf,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Launches the home page, then replays each step: a page name,
    /// `back[:n]`, `forward[:n]` or `click:<ref>`.
    Run { steps: Vec<String> },
    /// Sorts generated records and checks that a notification-driven mirror
    /// ends up in the same order.
    Sort {
        #[arg(long, default_value_t = 5)]
        count: usize,
        #[arg(long)]
        descending: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let cli = Cli::parse();

    match cli.command {
        Command::Run { steps } => run(cli.config, cli.views, &steps),
        Command::Sort { count, descending } => sort(count, descending),
    }
}

fn parse_step(step: &str) -> Result<ShellCommand> {
    let (verb, arg) = match step.split_once(':') {
        Some((verb, arg)) => (verb, Some(arg)),
        None => (step, None),
    };
    let distance = || -> Result<usize> {
        arg.map(str::parse::<usize>)
            .transpose()
            .map_err(|err| anyhow!("invalid distance in '{step}': {err}"))
            .map(|n| n.unwrap_or(1))
    };

    Ok(match verb {
        "back" => ShellCommand::Back {
            distance: distance()?,
        },
        "forward" => ShellCommand::Forward {
            distance: distance()?,
        },
        "click" => ShellCommand::DispatchRef {
            name: arg
                .filter(|name| !name.is_empty())
                .ok_or_else(|| anyhow!("'click' needs an element ref, e.g. click:sort"))?
                .to_string(),
            event: "click".to_string(),
            payload: Value::Null,
        },
        page => ShellCommand::Navigate {
            location: page.to_string(),
            state: None,
        },
    })
}

fn run(config_path: PathBuf, views: PathBuf, steps: &[String]) -> Result<()> {
    let mut commands = vec![ShellCommand::Launch];
    for step in steps {
        commands.push(parse_step(step)?);
    }
    commands.push(ShellCommand::Shutdown);

    let (cmd_tx, cmd_rx) = crossbeam_channel::bounded(commands.len());
    let (event_tx, event_rx) = crossbeam_channel::unbounded();
    let worker = spawn_shell_worker(
        move || {
            let config = load_config(&config_path)?;
            let loader = Arc::new(DirectoryViewLoader::new(views));
            Ok(AppShell::new(config, controllers::registry(), loader)?)
        },
        cmd_rx,
        event_tx,
    );

    let mut status = String::new();
    for cmd in commands {
        dispatch_shell_command(&cmd_tx, cmd, &mut status);
        if !status.is_empty() {
            bail!(status);
        }
    }

    while let Ok(event) = event_rx.recv() {
        println!("{}", serde_json::to_string(&event)?);
    }
    worker
        .join()
        .map_err(|_| anyhow!("shell worker panicked"))?;
    Ok(())
}

fn sort(count: usize, descending: bool) -> Result<()> {
    let mut records = KeyedCollection::with_key_field("id");
    let mirror = KeyOrderMirror::new();
    records.subscribe(Box::new(mirror.clone()));

    for i in 0..count {
        let priority = (i * 7919 + 13) % 97;
        records.insert_at_end(None, json!({"id": format!("r{i}"), "priority": priority}))?;
    }

    let priority = |record: &Value| record["priority"].as_u64().unwrap_or_default();
    let moves = records.sort_by(|a, b| {
        let order = priority(a).cmp(&priority(b));
        if descending {
            order.reverse()
        } else {
            order
        }
    });

    let keys: Vec<String> = records.keys().map(str::to_string).collect();
    if mirror.keys() != keys {
        bail!("mirror diverged: {:?} vs {keys:?}", mirror.keys());
    }
    println!(
        "{}",
        json!({"records": count, "moves": moves, "order": keys, "descending": descending})
    );
    Ok(())
}
