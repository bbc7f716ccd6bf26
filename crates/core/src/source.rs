//! Distribution sources and the strategy table that gives each one its
//! identity, editable fields and launch rules.

use std::{collections::HashMap, fmt, str::FromStr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{
    error::{LibraryError, Result},
    launch::{self, LaunchPlan, LaunchPlanner},
    models::{FieldSpec, FieldType, Game, GameField},
};

/// Storefront or channel a game comes from.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Steam, launched through the Steam client.
    #[default]
    Steam,
    /// GOG, launched from the local install.
    Gog,
    /// Humble Bundle, launched from the local install.
    Humble,
    /// Game Boy Advance ROM run by an emulator.
    Gba,
    /// Manually added game.
    None,
    /// Origin, launched from the local install.
    Origin,
}

impl SourceKind {
    /// Every known source.
    pub const ALL: [SourceKind; 6] = [
        SourceKind::Steam,
        SourceKind::Gog,
        SourceKind::Humble,
        SourceKind::Gba,
        SourceKind::None,
        SourceKind::Origin,
    ];

    /// Persisted name.
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Steam => "steam",
            SourceKind::Gog => "gog",
            SourceKind::Humble => "humble",
            SourceKind::Gba => "gba",
            SourceKind::None => "none",
            SourceKind::Origin => "origin",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = LibraryError;

    fn from_str(value: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| LibraryError::invalid_field("source", format!("unknown source {value:?}")))
    }
}

/// Rules a source applies to its games.
#[derive(Clone, Copy)]
pub struct SourceStrategy {
    /// Editable fields specific to the source.
    pub args: &'static [FieldSpec],
    /// Base game id, before any package suffix.
    pub game_id: fn(&Game) -> Result<String>,
    /// Launch plan for a game of this source.
    pub build_launch: fn(&LaunchPlanner, &Game) -> Result<LaunchPlan>,
    /// Whether Steam routing wants a shortcut that is not in the cache yet.
    pub missing_steam_launch: fn(&LaunchPlanner, &Game) -> bool,
}

impl fmt::Debug for SourceStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceStrategy")
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

const INSTALL_PATH_ARGS: &[FieldSpec] = &[(GameField::InstallPath, FieldType::String)];
const STEAM_ARGS: &[FieldSpec] = &[(GameField::SteamId, FieldType::Integer)];
const GOG_ARGS: &[FieldSpec] = &[
    (GameField::GogId, FieldType::String),
    (GameField::InstallPath, FieldType::String),
];
const HUMBLE_ARGS: &[FieldSpec] = &[
    (GameField::HumbleMachineName, FieldType::String),
    (GameField::InstallPath, FieldType::String),
    (GameField::HumblePackage, FieldType::String),
];

impl SourceStrategy {
    /// Name-derived id, native executable launch.
    pub const DEFAULT: Self = Self {
        args: INSTALL_PATH_ARGS,
        game_id: name_game_id,
        build_launch: launch::native_launch,
        missing_steam_launch: launch::missing_steam_shortcut,
    };

    const STEAM: Self = Self {
        args: STEAM_ARGS,
        game_id: steam_game_id,
        build_launch: launch::steam_launch,
        missing_steam_launch: launch::never_missing,
    };

    const GOG: Self = Self {
        args: GOG_ARGS,
        game_id: gog_game_id,
        ..Self::DEFAULT
    };

    const HUMBLE: Self = Self {
        args: HUMBLE_ARGS,
        game_id: humble_game_id,
        ..Self::DEFAULT
    };

    const EMULATOR: Self = Self {
        build_launch: launch::emulator_launch,
        ..Self::DEFAULT
    };
}

/// Strategy table keyed by source.
#[derive(Debug, Clone)]
pub struct SourceRegistry {
    strategies: HashMap<SourceKind, SourceStrategy>,
}

impl SourceRegistry {
    /// Registry holding the built-in rules for every [`SourceKind`].
    pub fn builtin() -> Self {
        let strategies = HashMap::from([
            (SourceKind::Steam, SourceStrategy::STEAM),
            (SourceKind::Gog, SourceStrategy::GOG),
            (SourceKind::Humble, SourceStrategy::HUMBLE),
            (SourceKind::Gba, SourceStrategy::EMULATOR),
            (SourceKind::None, SourceStrategy::DEFAULT),
            (SourceKind::Origin, SourceStrategy::DEFAULT),
        ]);
        Self { strategies }
    }

    /// Replace the rules for one source, returning the previous ones.
    pub fn register(&mut self, kind: SourceKind, strategy: SourceStrategy) -> Option<SourceStrategy> {
        self.strategies.insert(kind, strategy)
    }

    /// Rules for `kind`.
    pub fn strategy(&self, kind: SourceKind) -> &SourceStrategy {
        self.strategies.get(&kind).unwrap_or(&SourceStrategy::DEFAULT)
    }

    /// Editable fields specific to `kind`.
    pub fn args(&self, kind: SourceKind) -> &'static [FieldSpec] {
        self.strategy(kind).args
    }

    /// Full game id: the source's base id plus `.<packageid>` when set.
    pub fn game_id(&self, game: &Game) -> Result<String> {
        let base = (self.strategy(game.source).game_id)(game)?;
        if game.package_id.is_empty() {
            Ok(base)
        } else {
            Ok(format!("{base}.{}", game.package_id))
        }
    }

    /// Dispatch launch planning to the game's source.
    pub fn build_launch(&self, planner: &LaunchPlanner, game: &Game) -> Result<LaunchPlan> {
        (self.strategy(game.source).build_launch)(planner, game)
    }

    /// Dispatch the Steam shortcut check to the game's source.
    pub fn missing_steam_launch(&self, planner: &LaunchPlanner, game: &Game) -> bool {
        (self.strategy(game.source).missing_steam_launch)(planner, game)
    }
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

static BUILTIN: Lazy<SourceRegistry> = Lazy::new(SourceRegistry::builtin);

/// Process-wide registry with the built-in rules.
pub fn registry() -> &'static SourceRegistry {
    &BUILTIN
}

fn required<'a>(game: &'a Game, value: &'a str, field: &'static str) -> Result<&'a str> {
    if value.is_empty() {
        return Err(LibraryError::InvalidIdentity {
            kind: game.source,
            field,
        });
    }
    Ok(value)
}

/// Lowercased name with everything outside `[a-z0-9 -]` dropped and spaces turned into `_`.
///
/// Hyphens are kept (`"Half-Life 2"` -> `"half-life_2"`), so ids differ from
/// libraries whose rule stripped them; such entries need re-keying on import.
pub fn name_game_id(game: &Game) -> Result<String> {
    static DISALLOWED: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"[^a-z0-9 \-]").expect("invalid game id regex"));

    let name = required(game, &game.name, "name")?.to_lowercase();
    let id = DISALLOWED.replace_all(&name, "").replace(' ', "_");
    if id.is_empty() {
        return Err(LibraryError::InvalidIdentity {
            kind: game.source,
            field: "name",
        });
    }
    Ok(id)
}

fn steam_game_id(game: &Game) -> Result<String> {
    required(game, &game.steam_id, "steamid").map(|id| format!("steam_{id}"))
}

fn gog_game_id(game: &Game) -> Result<String> {
    required(game, &game.gog_id, "gogid").map(|id| format!("gog_{id}"))
}

fn humble_game_id(game: &Game) -> Result<String> {
    required(game, &game.humble_machine_name, "humble_machinename")
        .map(|id| format!("humble_{id}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game(source: SourceKind) -> Game {
        Game {
            source,
            ..Game::default()
        }
    }

    #[test]
    fn steam_ids_use_steamid() {
        let mut steam = game(SourceKind::Steam);
        steam.steam_id = "400".to_string();
        assert_eq!(steam.game_id().unwrap(), "steam_400");

        steam.steam_id.clear();
        let err = steam.game_id().unwrap_err();
        assert!(matches!(
            err,
            LibraryError::InvalidIdentity {
                kind: SourceKind::Steam,
                field: "steamid"
            }
        ));
    }

    #[test]
    fn storefront_ids_require_their_field() {
        let mut gog = game(SourceKind::Gog);
        assert!(gog.game_id().is_err());
        gog.gog_id = "the_witcher".to_string();
        assert_eq!(gog.game_id().unwrap(), "gog_the_witcher");

        let mut humble = game(SourceKind::Humble);
        humble.name = "Named but unidentified".to_string();
        assert!(humble.game_id().is_err());
        humble.humble_machine_name = "spelunky_pc".to_string();
        assert_eq!(humble.game_id().unwrap(), "humble_spelunky_pc");
    }

    #[test]
    fn default_rule_derives_from_name() {
        for source in [SourceKind::Gba, SourceKind::None, SourceKind::Origin] {
            let mut entry = game(source);
            entry.name = "Half-Life 2: Episode One!".to_string();
            assert_eq!(entry.game_id().unwrap(), "half-life_2_episode_one");
        }

        let mut empty = game(SourceKind::None);
        assert!(empty.game_id().is_err());
        empty.name = "???".to_string();
        assert!(empty.game_id().is_err());
    }

    #[test]
    fn package_suffix_is_appended() {
        let mut entry = game(SourceKind::Gog);
        entry.gog_id = "foo".to_string();
        entry.package_id = "bar".to_string();
        assert_eq!(entry.game_id().unwrap(), "gog_foo.bar");
    }

    #[test]
    fn args_per_source() {
        let registry = SourceRegistry::builtin();
        assert_eq!(registry.args(SourceKind::Steam), STEAM_ARGS);
        assert_eq!(registry.args(SourceKind::Origin), INSTALL_PATH_ARGS);
        assert_eq!(registry.args(SourceKind::Humble).len(), 3);
        assert_eq!(
            registry.args(SourceKind::Gog)[0],
            (GameField::GogId, FieldType::String)
        );
    }

    #[test]
    fn registered_strategy_overrides_builtin() {
        fn origin_id(game: &Game) -> Result<String> {
            Ok(format!("origin_{}", game.name.to_lowercase()))
        }

        let mut registry = SourceRegistry::builtin();
        let previous = registry.register(
            SourceKind::Origin,
            SourceStrategy {
                game_id: origin_id,
                ..SourceStrategy::DEFAULT
            },
        );
        assert!(previous.is_some());

        let mut entry = game(SourceKind::Origin);
        entry.name = "Titanfall".to_string();
        assert_eq!(registry.game_id(&entry).unwrap(), "origin_titanfall");
        assert_eq!(entry.game_id().unwrap(), "titanfall");
    }

    #[test]
    fn source_names_parse() {
        assert_eq!("humble".parse::<SourceKind>().unwrap(), SourceKind::Humble);
        assert!("uplay".parse::<SourceKind>().is_err());
        assert_eq!(SourceKind::None.to_string(), "none");
    }
}
