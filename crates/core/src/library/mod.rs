//! The game collection: keyed store, merge-on-update, package handling and
//! persistence.

mod shared;

use std::{
    cmp::Reverse,
    collections::BTreeMap,
    path::{Path, PathBuf},
};

use chrono::NaiveDateTime;
use tracing::{info, warn};

use crate::{
    error::{LibraryError, Result},
    manifest::BundleManifest,
    models::{Game, Priority},
    save::{self, LibraryPayload},
    source::SourceKind,
};

pub use shared::SharedLibrary;

/// All known games keyed by game id, plus the bundle membership side table.
///
/// `Library` has a single owner. Merges read and then write the stored
/// record without any locking; wrap it in a [`SharedLibrary`] when several
/// writers need it.
#[derive(Debug, Clone)]
pub struct Library {
    games: BTreeMap<String, Game>,
    multipack: BundleManifest,
    bundle_file: PathBuf,
}

impl Library {
    /// Empty library whose bundle manifest lives at `bundle_file`.
    pub fn new(bundle_file: impl Into<PathBuf>) -> Self {
        Self {
            games: BTreeMap::new(),
            multipack: BundleManifest::default(),
            bundle_file: bundle_file.into(),
        }
    }

    /// Location of the bundle manifest.
    pub fn bundle_file(&self) -> &Path {
        &self.bundle_file
    }

    /// Load the snapshot at `path` and the bundle manifest.
    ///
    /// A missing snapshot leaves the library empty.
    pub fn load(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        self.multipack = BundleManifest::load(&self.bundle_file)?;

        let Some(payload) = save::read_payload(path)? else {
            warn!("no library file to load at {}", path.display());
            return Ok(());
        };
        for (id, fields) in payload.games {
            let game = Game::from_fields(&fields)?;
            self.games.insert(id, game);
        }
        info!("loaded {} games from {}", self.games.len(), path.display());
        Ok(())
    }

    /// Write the snapshot to `path` and the bundle manifest to its own file.
    ///
    /// Both documents are staged before either is moved into place. A failure
    /// while staging leaves both files as they were; if the bundle manifest
    /// cannot be moved into place, the previous snapshot is restored.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let payload = LibraryPayload {
            games: self
                .games
                .iter()
                .map(|(id, game)| (id.clone(), game.to_fields()))
                .collect(),
        };

        let games = save::stage_json(path, &payload)?;
        let bundles = save::stage_json(&self.bundle_file, &self.multipack)?;
        let previous = save::backup(path)?;
        games.commit()?;
        if let Err(err) = bundles.commit() {
            warn!("restoring {} after failed save: {err}", path.display());
            previous.restore()?;
            return Err(err);
        }
        info!("saved {} games to {}", self.games.len(), path.display());
        Ok(())
    }

    /// Split dotted GOG ids (`<base>.<package>`) into a package entry and a
    /// package member. Returns the number of games migrated.
    ///
    /// Every new id is derived before any record moves, so a failure leaves
    /// the library unchanged.
    pub fn import_packages(&mut self) -> Result<usize> {
        let migrations = self
            .games
            .iter()
            .filter(|(_, game)| game.source == SourceKind::Gog && game.gog_id.contains('.'))
            .map(|(old_id, game)| split_package_member(old_id, game))
            .collect::<Result<Vec<_>>>()?;

        let count = migrations.len();
        for migration in migrations {
            self.games.remove(&migration.old_id);
            self.games
                .entry(migration.package_id)
                .or_insert(migration.package);
            self.games.insert(migration.member_id, migration.member);
        }

        if count > 0 {
            info!("imported {count} GOG package members");
        }
        Ok(count)
    }

    /// Merge every candidate under its own game id.
    ///
    /// Ids are derived for all candidates first, so one invalid candidate
    /// leaves the library unchanged.
    pub fn add_games(&mut self, candidates: impl IntoIterator<Item = Game>) -> Result<()> {
        let keyed = candidates
            .into_iter()
            .map(|game| game.game_id().map(|id| (id, game)))
            .collect::<Result<Vec<_>>>()?;
        for (id, game) in keyed {
            self.update_game(&id, game, false);
        }
        Ok(())
    }

    /// Merge `candidate` into the record stored under `game_id`.
    ///
    /// Without an existing record, or with `force`, the candidate is stored
    /// as is. Otherwise the stored record adopts a non-empty icon, a larger
    /// play time, a finished flag, a newer last-played time, and always the
    /// candidate's package flag and package id. The candidate is returned
    /// unchanged.
    pub fn update_game(&mut self, game_id: &str, candidate: Game, force: bool) -> Game {
        match self.games.get_mut(game_id) {
            Some(current) if !force => merge_into(current, &candidate),
            _ => {
                self.games.insert(game_id.to_string(), candidate.clone());
            }
        }
        candidate
    }

    /// Store an edited game verbatim, re-keying it when its id changed.
    pub fn force_update(&mut self, old_id: Option<&str>, game: Game) -> Result<String> {
        let new_id = game.game_id()?;
        if let Some(old_id) = old_id.filter(|old_id| *old_id != new_id) {
            self.games.remove(old_id);
            self.rename_member(old_id, &new_id);
        }
        self.update_game(&new_id, game, true);
        Ok(new_id)
    }

    fn rename_member(&mut self, old_id: &str, new_id: &str) {
        let renamed: Vec<(String, Vec<String>)> = self
            .multipack
            .iter()
            .map(|(bundle, members)| {
                let members = members
                    .iter()
                    .map(|member| {
                        if member == old_id {
                            new_id.to_string()
                        } else {
                            member.clone()
                        }
                    })
                    .collect();
                (bundle.to_string(), members)
            })
            .collect();
        for (bundle, members) in renamed {
            self.multipack.set_members(bundle, members);
        }
    }

    /// Games sorted unfinished first, then by priority, most recently played,
    /// and name.
    pub fn list(&self) -> Vec<&Game> {
        let mut games: Vec<&Game> = self.games.values().collect();
        games.sort_by(|a, b| {
            sort_key(a)
                .cmp(&sort_key(b))
                .then_with(|| a.name.cmp(&b.name))
        });
        games
    }

    /// Remove `game`, also dropping it from every bundle member list.
    pub fn delete(&mut self, game: &Game) -> Result<Game> {
        let id = game.game_id()?;
        let removed = self
            .games
            .remove(&id)
            .ok_or_else(|| LibraryError::NotFound(id.clone()))?;
        self.multipack.remove_member(&id);
        Ok(removed)
    }

    /// Game stored under `game_id`.
    pub fn get(&self, game_id: &str) -> Option<&Game> {
        self.games.get(game_id)
    }

    /// Mutable access for edits that bypass merging.
    pub fn get_mut(&mut self, game_id: &str) -> Option<&mut Game> {
        self.games.get_mut(game_id)
    }

    /// Look up a game or fail with `NotFound`.
    pub fn require(&self, game_id: &str) -> Result<&Game> {
        self.get(game_id)
            .ok_or_else(|| LibraryError::NotFound(game_id.to_string()))
    }

    fn require_mut(&mut self, game_id: &str) -> Result<&mut Game> {
        self.games
            .get_mut(game_id)
            .ok_or_else(|| LibraryError::NotFound(game_id.to_string()))
    }

    /// Ids and games in id order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Game)> {
        self.games.iter().map(|(id, game)| (id.as_str(), game))
    }

    /// Number of stored games.
    pub fn len(&self) -> usize {
        self.games.len()
    }

    /// Whether no game is stored.
    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }

    /// Mark a game finished.
    pub fn finish(&mut self, game_id: &str) -> Result<()> {
        self.require_mut(game_id)?.finished = true;
        Ok(())
    }

    /// Explicit user action; the only way a finished game becomes unfinished.
    pub fn unfinish(&mut self, game_id: &str) -> Result<()> {
        self.require_mut(game_id)?.finished = false;
        Ok(())
    }

    /// Hide or show a game in the default listing.
    pub fn set_hidden(&mut self, game_id: &str, hidden: bool) -> Result<()> {
        self.require_mut(game_id)?.hidden = hidden;
        Ok(())
    }

    /// Add a tracked play session: `seconds` of play that began at `started`.
    pub fn record_play(&mut self, game_id: &str, started: NaiveDateTime, seconds: f64) -> Result<()> {
        let game = self.require_mut(game_id)?;
        game.playtime += seconds.max(0.0);
        if game.last_played.map_or(true, |seen| started > seen) {
            game.last_played = Some(started);
        }
        Ok(())
    }

    /// Games contained in `package`.
    pub fn games_for_package(&self, package: &Game) -> Result<Vec<&Game>> {
        package.games_for_package(self.games.values())
    }

    /// Recorded member ids of a bundle.
    pub fn package_contents(&self, bundle_id: &str) -> Option<&[String]> {
        self.multipack.members(bundle_id)
    }

    /// Bundle membership side table.
    pub fn multipack(&self) -> &BundleManifest {
        &self.multipack
    }

    /// Record `members` as the contents of the package stored under
    /// `package_id`, merging each member into the library. Returns the member
    /// ids in order.
    pub fn set_package_contents(
        &mut self,
        package_id: &str,
        members: impl IntoIterator<Item = Game>,
    ) -> Result<Vec<String>> {
        if !self.require(package_id)?.is_package {
            return Err(LibraryError::NotAPackage(package_id.to_string()));
        }
        let keyed = members
            .into_iter()
            .map(|game| game.game_id().map(|id| (id, game)))
            .collect::<Result<Vec<_>>>()?;

        let ids: Vec<String> = keyed.iter().map(|(id, _)| id.clone()).collect();
        for (id, game) in keyed {
            self.update_game(&id, game, false);
        }
        self.multipack.set_members(package_id, ids.clone());
        Ok(ids)
    }
}

struct PackageMigration {
    old_id: String,
    package_id: String,
    package: Game,
    member_id: String,
    member: Game,
}

fn split_package_member(old_id: &str, game: &Game) -> Result<PackageMigration> {
    let mut member = game.clone();
    if let Some((base, package)) = game.gog_id.rsplit_once('.') {
        member.gog_id = base.to_string();
        member.package_id = package.to_string();
    }

    let package = Game {
        name: package_title(&member.gog_id),
        is_package: true,
        source: SourceKind::Gog,
        gog_id: member.gog_id.clone(),
        ..Game::default()
    };
    Ok(PackageMigration {
        old_id: old_id.to_string(),
        package_id: package.game_id()?,
        package,
        member_id: member.game_id()?,
        member,
    })
}

fn merge_into(current: &mut Game, candidate: &Game) {
    if !candidate.icon_url.is_empty() {
        current.icon_url = candidate.icon_url.clone();
    }
    if candidate.playtime > current.playtime {
        current.playtime = candidate.playtime;
    }
    if candidate.finished {
        current.finished = true;
    }
    if let Some(played) = candidate.last_played {
        if current.last_played.map_or(true, |seen| played > seen) {
            current.last_played = Some(played);
        }
    }
    current.is_package = candidate.is_package;
    current.package_id = candidate.package_id.clone();
}

fn sort_key(game: &Game) -> (bool, Priority, Reverse<i64>) {
    (game.finished, game.priority, Reverse(game.last_played_epoch()))
}

/// `"the_witcher_2"` -> `"The Witcher 2"`.
fn package_title(base: &str) -> String {
    base.split('_')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first
                    .to_uppercase()
                    .chain(chars.flat_map(char::to_lowercase))
                    .collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
