//! Lock-guarded handle for sharing one library between threads.

use std::{path::Path, sync::Arc};

use parking_lot::{Mutex, MutexGuard};

use super::Library;
use crate::{error::Result, models::Game};

/// Cloneable handle serializing access to one [`Library`].
///
/// Each call holds the lock for the whole read-merge-write, so concurrent
/// merges into the same record cannot interleave.
#[derive(Debug, Clone)]
pub struct SharedLibrary {
    inner: Arc<Mutex<Library>>,
}

impl SharedLibrary {
    /// Share `library` behind a lock.
    pub fn new(library: Library) -> Self {
        Self {
            inner: Arc::new(Mutex::new(library)),
        }
    }

    /// Exclusive access for compound operations.
    pub fn lock(&self) -> MutexGuard<'_, Library> {
        self.inner.lock()
    }

    /// See [`Library::load`].
    pub fn load(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.lock().load(path)
    }

    /// Save a consistent snapshot; writers wait until it is on disk.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        self.inner.lock().save(path)
    }

    /// See [`Library::add_games`].
    pub fn add_games(&self, candidates: impl IntoIterator<Item = Game>) -> Result<()> {
        self.inner.lock().add_games(candidates)
    }

    /// Merge under the lock; see [`Library::update_game`].
    pub fn update_game(&self, game_id: &str, candidate: Game, force: bool) -> Game {
        self.inner.lock().update_game(game_id, candidate, force)
    }

    /// See [`Library::import_packages`].
    pub fn import_packages(&self) -> Result<usize> {
        self.inner.lock().import_packages()
    }

    /// See [`Library::delete`].
    pub fn delete(&self, game: &Game) -> Result<Game> {
        self.inner.lock().delete(game)
    }

    /// Owned copy of a single record.
    pub fn get(&self, game_id: &str) -> Option<Game> {
        self.inner.lock().get(game_id).cloned()
    }

    /// Owned copy of [`Library::list`].
    pub fn list(&self) -> Vec<Game> {
        self.inner.lock().list().into_iter().cloned().collect()
    }

    /// Number of stored games.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Whether no game is stored.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    /// Take the library back once every other handle is gone.
    pub fn into_inner(self) -> std::result::Result<Library, Self> {
        Arc::try_unwrap(self.inner)
            .map(Mutex::into_inner)
            .map_err(|inner| Self { inner })
    }
}

impl From<Library> for SharedLibrary {
    fn from(library: Library) -> Self {
        Self::new(library)
    }
}
