//! Launch planning: turns a game into the command line and working
//! directory an external executor should use. Nothing is spawned here.

pub mod shortcut;

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, info, warn};

use crate::{
    config::AppConfig,
    error::{LibraryError, Result},
    models::Game,
    source::{self, SourceRegistry},
};

/// Working directory used by plans that run from wherever the app runs.
pub const CURRENT_DIR: &str = ".";

/// Extension of shell links resolved instead of wrapped in a script.
const LINK_EXTENSION: &str = ".lnk";

#[cfg(windows)]
const SCRIPT_EXTENSION: &str = "bat";
#[cfg(not(windows))]
const SCRIPT_EXTENSION: &str = "sh";

/// Paths and switches the planner needs.
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    /// Steam client executable.
    pub steam_executable: PathBuf,
    /// Emulator used for GBA ROMs.
    pub gba_emulator: PathBuf,
    /// Root of generated launch artifacts.
    pub cache_root: PathBuf,
    /// Where Steam drops freshly created desktop shortcuts.
    pub desktop_dir: Option<PathBuf>,
    /// Run non-Steam games through their Steam shortcut when one exists.
    pub route_through_steam: bool,
}

impl From<&AppConfig> for LaunchSettings {
    fn from(config: &AppConfig) -> Self {
        Self {
            steam_executable: config.steam_executable.clone(),
            gba_emulator: config.gba_emulator.clone(),
            cache_root: config.cache_root.clone(),
            desktop_dir: config.desktop_dir.clone(),
            route_through_steam: config.route_through_steam,
        }
    }
}

/// How to start a game: the argument list (program first) and its working directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    /// Program followed by its arguments.
    pub args: Vec<String>,
    /// Directory the program should start in.
    pub working_dir: PathBuf,
}

impl LaunchPlan {
    fn new(args: Vec<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            args,
            working_dir: working_dir.into(),
        }
    }
}

/// Builds launch plans using the per-source rules of a [`SourceRegistry`].
#[derive(Debug, Clone)]
pub struct LaunchPlanner {
    settings: LaunchSettings,
    registry: SourceRegistry,
}

impl LaunchPlanner {
    /// Planner using the built-in source rules.
    pub fn new(settings: LaunchSettings) -> Self {
        Self::with_registry(settings, source::registry().clone())
    }

    /// Planner using custom source rules.
    pub fn with_registry(settings: LaunchSettings, registry: SourceRegistry) -> Self {
        Self { settings, registry }
    }

    /// Settings the planner was built with.
    pub fn settings(&self) -> &LaunchSettings {
        &self.settings
    }

    /// Compute the launch plan for `game`.
    pub fn plan(&self, game: &Game) -> Result<LaunchPlan> {
        let plan = self.registry.build_launch(self, game)?;
        debug!(game = %game.name, args = ?plan.args, dir = %plan.working_dir.display(), "launch plan");
        Ok(plan)
    }

    /// Whether `game` should run through Steam but has no cached shortcut yet.
    pub fn missing_steam_launch(&self, game: &Game) -> bool {
        self.registry.missing_steam_launch(self, game)
    }

    /// Folder holding generated launch scripts.
    pub fn script_dir(&self) -> PathBuf {
        self.settings.cache_root.join("batches")
    }

    /// Generated launch script for a game id.
    pub fn script_path(&self, game_id: &str) -> PathBuf {
        self.script_dir()
            .join(format!("{game_id}.{SCRIPT_EXTENSION}"))
    }

    /// Folder holding Steam `.url` shortcuts for non-Steam games.
    pub fn steam_shortcut_dir(&self) -> PathBuf {
        self.settings.cache_root.join("steamshortcuts")
    }

    /// Cached Steam shortcut for a game.
    pub fn steam_shortcut_path(&self, game: &Game) -> PathBuf {
        self.steam_shortcut_dir()
            .join(format!("{}.url", game.shortcut_name()))
    }

    /// Move a Steam shortcut created on the desktop into the cache.
    ///
    /// Returns `true` when a shortcut was moved.
    pub fn migrate_desktop_shortcut(&self, game: &Game) -> Result<bool> {
        let Some(desktop) = &self.settings.desktop_dir else {
            return Ok(false);
        };
        let from = desktop.join(format!("{}.url", game.shortcut_name()));
        if !from.is_file() {
            return Ok(false);
        }

        let to = self.steam_shortcut_path(game);
        fs::create_dir_all(self.steam_shortcut_dir())?;
        if fs::rename(&from, &to).is_err() {
            fs::copy(&from, &to)?;
            fs::remove_file(&from)?;
        }
        info!("moved Steam shortcut {} to {}", from.display(), to.display());
        Ok(true)
    }

    fn write_launch_script(&self, game: &Game, game_id: &str) -> Result<PathBuf> {
        let path = self.script_path(game_id);
        fs::create_dir_all(self.script_dir())?;
        fs::write(&path, script_body(game.install_folder(), &game.install_path))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&path, fs::Permissions::from_mode(0o755))?;
        }
        Ok(path)
    }
}

#[cfg(windows)]
fn script_body(folder: &str, executable: &str) -> String {
    format!("pushd \"{folder}\"\r\n\"{executable}\"\r\n")
}

#[cfg(not(windows))]
fn script_body(folder: &str, executable: &str) -> String {
    format!("#!/bin/sh\ncd \"{folder}\"\nexec \"{executable}\"\n")
}

fn display_id(game: &Game) -> String {
    game.game_id().unwrap_or_else(|_| game.name.clone())
}

fn path_string(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// `steam -applaunch <steamid>`.
pub(crate) fn steam_launch(planner: &LaunchPlanner, game: &Game) -> Result<LaunchPlan> {
    if game.steam_id.is_empty() {
        return Err(LibraryError::InvalidIdentity {
            kind: game.source,
            field: "steamid",
        });
    }
    Ok(LaunchPlan::new(
        vec![
            path_string(&planner.settings.steam_executable),
            "-applaunch".to_string(),
            game.steam_id.clone(),
        ],
        CURRENT_DIR,
    ))
}

/// Emulator with the ROM as its only argument.
pub(crate) fn emulator_launch(planner: &LaunchPlanner, game: &Game) -> Result<LaunchPlan> {
    if game.install_path.is_empty() {
        return Err(LibraryError::MissingPath(display_id(game)));
    }
    Ok(LaunchPlan::new(
        vec![
            path_string(&planner.settings.gba_emulator),
            game.install_path.clone(),
        ],
        CURRENT_DIR,
    ))
}

/// Native executable: resolve shell links, otherwise go through a generated
/// script, or through the cached Steam shortcut when routing via Steam.
pub(crate) fn native_launch(planner: &LaunchPlanner, game: &Game) -> Result<LaunchPlan> {
    if game.install_path.is_empty() {
        return Err(LibraryError::MissingPath(display_id(game)));
    }

    if game.install_path.to_lowercase().ends_with(LINK_EXTENSION) {
        let link = shortcut::read_shell_link(Path::new(&game.install_path))?;
        let mut args = vec![link.target];
        args.extend(shortcut::split_command_line(&link.arguments));
        let working_dir = link
            .working_dir
            .filter(|dir| !dir.is_empty())
            .unwrap_or_else(|| game.install_folder().to_string());
        return Ok(LaunchPlan::new(args, working_dir));
    }

    let game_id = game.game_id()?;
    let script = planner.write_launch_script(game, &game_id)?;
    let mut plan = LaunchPlan::new(vec![path_string(&script)], planner.script_dir());

    if planner.settings.route_through_steam && !planner.missing_steam_launch(game) {
        plan = LaunchPlan::new(
            vec![path_string(&planner.steam_shortcut_path(game))],
            CURRENT_DIR,
        );
    }
    Ok(plan)
}

/// True when routing through Steam and no cached `.url` shortcut exists,
/// after pulling a fresh one off the desktop.
pub(crate) fn missing_steam_shortcut(planner: &LaunchPlanner, game: &Game) -> bool {
    if !planner.settings.route_through_steam {
        return false;
    }
    if let Err(err) = planner.migrate_desktop_shortcut(game) {
        warn!("failed to move Steam shortcut for {}: {err}", game.name);
    }
    !planner.steam_shortcut_path(game).is_file()
}

/// Steam games launch through Steam already.
pub(crate) fn never_missing(_planner: &LaunchPlanner, _game: &Game) -> bool {
    false
}
