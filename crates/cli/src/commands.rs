use std::{fs, path::Path};

use anyhow::{bail, Context, Result};
use gamelib_core::{AppConfig, FieldMap, Game, LaunchPlanner, LaunchSettings, Library};
use tracing::warn;

use crate::Commands;

pub(crate) fn execute(command: Commands, config: &AppConfig) -> Result<()> {
    let mut library = Library::new(&config.bundle_file);
    library
        .load(&config.library_file)
        .with_context(|| format!("failed to load {}", config.library_file.display()))?;

    let changed = match command {
        Commands::List { all } => {
            list(&library, all);
            false
        }
        Commands::Show { id } => {
            let game = library.require(&id)?;
            println!("{}", serde_json::to_string_pretty(&game.to_fields())?);
            false
        }
        Commands::Plan { id } => {
            plan(&library, &id, config)?;
            false
        }
        Commands::ImportPackages => {
            let migrated = library.import_packages()?;
            println!("Migrated {migrated} package members");
            migrated > 0
        }
        Commands::Add { file } => {
            let added = add(&mut library, &file)?;
            println!("Merged {added} games");
            true
        }
        Commands::Finish { id } => {
            library.finish(&id)?;
            true
        }
        Commands::Unfinish { id } => {
            library.unfinish(&id)?;
            true
        }
        Commands::Hide { id } => {
            library.set_hidden(&id, true)?;
            true
        }
        Commands::Unhide { id } => {
            library.set_hidden(&id, false)?;
            true
        }
        Commands::Delete { id } => {
            let game = library.require(&id)?.clone();
            let removed = library.delete(&game)?;
            println!("Deleted {removed}");
            true
        }
        Commands::Package { id } => {
            package(&library, &id)?;
            false
        }
    };

    if changed {
        library
            .save(&config.library_file)
            .with_context(|| format!("failed to save {}", config.library_file.display()))?;
    }
    Ok(())
}

fn list(library: &Library, all: bool) {
    for game in library.list() {
        if game.hidden && !all {
            continue;
        }
        let id = game.game_id().unwrap_or_default();
        let status = if game.finished { "done" } else { game.priority.label() };
        println!(
            "{id:<40} {:<50} {status:<14} {}",
            game.to_string(),
            game.last_played_nice()
        );
    }
}

fn plan(library: &Library, id: &str, config: &AppConfig) -> Result<()> {
    let game = library.require(id)?;
    let planner = LaunchPlanner::new(LaunchSettings::from(config));

    if game.missing_steam_launch(&planner) {
        warn!(
            "no Steam shortcut for {} yet; add it to Steam and create a desktop shortcut named \"{}.url\"",
            game.name,
            game.shortcut_name()
        );
    }

    let plan = game.build_launch(&planner)?;
    println!("cwd:  {}", plan.working_dir.display());
    println!("args: {}", plan.args.join(" "));
    Ok(())
}

fn add(library: &mut Library, file: &Path) -> Result<usize> {
    let content =
        fs::read_to_string(file).with_context(|| format!("failed to read {}", file.display()))?;
    let records: Vec<FieldMap> = serde_json::from_str(&content)
        .with_context(|| format!("{} is not a JSON array of games", file.display()))?;
    let candidates = records
        .iter()
        .map(Game::from_fields)
        .collect::<gamelib_core::Result<Vec<_>>>()?;

    let count = candidates.len();
    library.add_games(candidates)?;
    Ok(count)
}

fn package(library: &Library, id: &str) -> Result<()> {
    let package = library.require(id)?;
    if !package.is_package {
        bail!("{id} is not a package");
    }

    for game in library.games_for_package(package)? {
        println!("{game}");
    }
    if let Some(members) = library.package_contents(id) {
        for member in members {
            let name = library.get(member).map(|game| game.name.as_str());
            println!("{member} {}", name.unwrap_or("(not in library)"));
        }
    }
    Ok(())
}
