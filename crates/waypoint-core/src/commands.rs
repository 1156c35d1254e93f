use tracing::{info, instrument, warn};

use crate::calendar::calendar_events;
use crate::cli::{AddArgs, Command};
use crate::config::Config;
use crate::datastore::KeyValueStore;
use crate::filter::{Filter, filtered_list};
use crate::map::map_view;
use crate::render::Renderer;
use crate::store::{TaskStore, encode_snapshot};

#[instrument(skip(store, cfg, renderer, command))]
pub fn dispatch<S: KeyValueStore>(
    store: &mut TaskStore<S>,
    cfg: &Config,
    renderer: &mut Renderer,
    command: Option<Command>,
) -> anyhow::Result<()> {
    match command {
        Some(Command::Add(args)) => cmd_add(store, &args),
        Some(Command::List { filter }) => {
            let filter = match filter {
                Some(filter) => filter,
                None => cfg.default_filter()?,
            };
            cmd_list(store, renderer, filter)
        }
        Some(Command::Toggle { id }) => cmd_toggle(store, &id),
        Some(Command::Delete { id }) => cmd_delete(store, &id),
        Some(Command::Calendar) => cmd_calendar(store, renderer),
        Some(Command::Map) => cmd_map(store, cfg, renderer),
        Some(Command::Export) => cmd_export(store),
        Some(Command::Show) => cmd_show(cfg),
        None => cmd_list(store, renderer, cfg.default_filter()?),
    }
}

#[instrument(skip(store, args))]
fn cmd_add<S: KeyValueStore>(store: &mut TaskStore<S>, args: &AddArgs) -> anyhow::Result<()> {
    info!("command add");

    let mut draft = args.to_draft();
    if let Some(id) = store.add(&mut draft)? {
        println!("Created task {id}.");
    }
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_list<S: KeyValueStore>(
    store: &TaskStore<S>,
    renderer: &mut Renderer,
    filter: Filter,
) -> anyhow::Result<()> {
    info!("command list");

    let tasks = filtered_list(store.tasks(), filter);
    renderer.print_task_cards(&tasks)
}

#[instrument(skip(store))]
fn cmd_toggle<S: KeyValueStore>(store: &mut TaskStore<S>, id: &str) -> anyhow::Result<()> {
    info!("command toggle");

    if !store.toggle_status(id)? {
        warn!(id, "no task with that id");
        return Ok(());
    }
    if let Some(task) = store.get(id) {
        println!("Task {} is now {}.", task.id, task.status);
    }
    Ok(())
}

#[instrument(skip(store))]
fn cmd_delete<S: KeyValueStore>(store: &mut TaskStore<S>, id: &str) -> anyhow::Result<()> {
    info!("command delete");

    if store.delete(id)? {
        println!("Deleted task {id}.");
    } else {
        warn!(id, "no task with that id");
    }
    Ok(())
}

#[instrument(skip(store, renderer))]
fn cmd_calendar<S: KeyValueStore>(
    store: &TaskStore<S>,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    info!("command calendar");

    let events = calendar_events(store.tasks());
    renderer.print_calendar(&events)
}

#[instrument(skip(store, cfg, renderer))]
fn cmd_map<S: KeyValueStore>(
    store: &TaskStore<S>,
    cfg: &Config,
    renderer: &mut Renderer,
) -> anyhow::Result<()> {
    info!("command map");

    let view = map_view(store.tasks(), cfg.map_center()?, cfg.map_zoom()?);
    renderer.print_map(&view)
}

#[instrument(skip(store))]
fn cmd_export<S: KeyValueStore>(store: &TaskStore<S>) -> anyhow::Result<()> {
    info!("command export");

    println!("{}", encode_snapshot(store.tasks())?);
    Ok(())
}

fn cmd_show(cfg: &Config) -> anyhow::Result<()> {
    for (k, v) in cfg.iter() {
        println!("{k}={v}");
    }
    Ok(())
}
