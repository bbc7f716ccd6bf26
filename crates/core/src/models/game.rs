use std::fmt;

use chrono::{Local, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{
    error::{LibraryError, Result},
    launch::{LaunchPlan, LaunchPlanner},
    source::{self, SourceKind},
};

use super::{format_timestamp, parse_timestamp, FieldSpec, FieldType, Priority};

/// Persisted representation of a game: field name to JSON value.
pub type FieldMap = Map<String, Value>;

/// Convenience key accepted by [`Game::from_fields`]; converted into `playtime`.
const MINUTES_KEY: &str = "minutes";

/// Every field a [`Game`] persists, keyed by its on-disk name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GameField {
    /// `name`
    Name,
    /// `playtime`, seconds.
    Playtime,
    /// `finished`
    Finished,
    /// `hidden`
    Hidden,
    /// `is_package`
    IsPackage,
    /// `lastplayed`
    LastPlayed,
    /// `source`
    Source,
    /// `packageid`
    PackageId,
    /// `genre`
    Genre,
    /// `icon_url`
    IconUrl,
    /// `notes`
    Notes,
    /// `priority`, stored as the integer level.
    Priority,
    /// `steamid`
    SteamId,
    /// `gogid`
    GogId,
    /// `humble_machinename`
    HumbleMachineName,
    /// `humble_package`
    HumblePackage,
    /// `install_path`
    InstallPath,
    /// `website`
    Website,
}

impl GameField {
    /// All persisted fields.
    pub const ALL: [GameField; 18] = [
        GameField::Name,
        GameField::Playtime,
        GameField::Finished,
        GameField::Hidden,
        GameField::IsPackage,
        GameField::LastPlayed,
        GameField::Source,
        GameField::PackageId,
        GameField::Genre,
        GameField::IconUrl,
        GameField::Notes,
        GameField::Priority,
        GameField::SteamId,
        GameField::GogId,
        GameField::HumbleMachineName,
        GameField::HumblePackage,
        GameField::InstallPath,
        GameField::Website,
    ];

    /// Editable fields shared by every source.
    pub const BASE_ARGS: [FieldSpec; 12] = [
        (GameField::Name, FieldType::String),
        (GameField::Playtime, FieldType::Float),
        (GameField::Finished, FieldType::Flag),
        (GameField::Genre, FieldType::String),
        (GameField::Source, FieldType::String),
        (GameField::Hidden, FieldType::Flag),
        (GameField::IconUrl, FieldType::String),
        (GameField::PackageId, FieldType::String),
        (GameField::IsPackage, FieldType::Flag),
        (GameField::Notes, FieldType::String),
        (GameField::Priority, FieldType::Priority),
        (GameField::Website, FieldType::String),
    ];

    /// Name used in the persisted snapshot.
    pub fn key(self) -> &'static str {
        match self {
            GameField::Name => "name",
            GameField::Playtime => "playtime",
            GameField::Finished => "finished",
            GameField::Hidden => "hidden",
            GameField::IsPackage => "is_package",
            GameField::LastPlayed => "lastplayed",
            GameField::Source => "source",
            GameField::PackageId => "packageid",
            GameField::Genre => "genre",
            GameField::IconUrl => "icon_url",
            GameField::Notes => "notes",
            GameField::Priority => "priority",
            GameField::SteamId => "steamid",
            GameField::GogId => "gogid",
            GameField::HumbleMachineName => "humble_machinename",
            GameField::HumblePackage => "humble_package",
            GameField::InstallPath => "install_path",
            GameField::Website => "website",
        }
    }

    /// Resolve a persisted key. Unknown keys yield `None`.
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|field| field.key() == key)
    }
}

impl fmt::Display for GameField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// One library entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "FieldMap", into = "FieldMap")]
pub struct Game {
    /// Display title.
    pub name: String,
    /// Total tracked play time in seconds.
    pub playtime: f64,
    /// Completed by the user.
    pub finished: bool,
    /// Hidden from the default listing.
    pub hidden: bool,
    /// Synthetic bundle entry grouping several games.
    pub is_package: bool,
    /// When the game was last started, in local time.
    pub last_played: Option<NaiveDateTime>,
    /// Distribution channel the game was obtained from.
    pub source: SourceKind,
    /// Id of this title inside a bundle, appended to the game id.
    pub package_id: String,
    /// Free-form genre label.
    pub genre: String,
    /// Remote icon or cover image.
    pub icon_url: String,
    /// User notes.
    pub notes: String,
    /// How soon the user wants to play it.
    pub priority: Priority,
    /// Steam app id.
    pub steam_id: String,
    /// GOG product slug.
    pub gog_id: String,
    /// Humble Bundle machine name.
    pub humble_machine_name: String,
    /// Humble order the game came from.
    pub humble_package: String,
    /// Executable, shortcut or ROM used to launch the game.
    pub install_path: String,
    /// Store or homepage url.
    pub website: String,
}

impl Default for Game {
    fn default() -> Self {
        Self {
            name: String::new(),
            playtime: 0.0,
            finished: false,
            hidden: false,
            is_package: false,
            last_played: None,
            source: SourceKind::default(),
            package_id: String::new(),
            genre: String::new(),
            icon_url: String::new(),
            notes: String::new(),
            priority: Priority::default(),
            steam_id: String::new(),
            gog_id: String::new(),
            humble_machine_name: String::new(),
            humble_package: String::new(),
            install_path: String::new(),
            website: String::new(),
        }
    }
}

impl Game {
    /// Build a game from a field mapping.
    ///
    /// Keys outside [`GameField`] are ignored. `minutes` sets `playtime` in seconds.
    pub fn from_fields(fields: &FieldMap) -> Result<Self> {
        let mut game = Self::default();
        for (key, value) in fields {
            if let Some(field) = GameField::from_key(key) {
                game.set_field(field, value)?;
            }
        }
        if let Some(minutes) = fields.get(MINUTES_KEY) {
            let minutes = as_f64(minutes)
                .ok_or_else(|| LibraryError::invalid_field("minutes", "expected a number"))?;
            game.playtime = minutes * 60.0;
        }
        Ok(game)
    }

    /// Persisted mapping containing exactly the [`GameField`] keys.
    pub fn to_fields(&self) -> FieldMap {
        GameField::ALL
            .into_iter()
            .map(|field| (field.key().to_string(), self.field_value(field)))
            .collect()
    }

    /// Assign a single field from its persisted representation.
    pub fn set_field(&mut self, field: GameField, value: &Value) -> Result<()> {
        match field {
            GameField::Name => self.name = as_text(field, value)?,
            GameField::Playtime => {
                self.playtime = as_f64(value)
                    .ok_or_else(|| LibraryError::invalid_field("playtime", "expected a number"))?
            }
            GameField::Finished => self.finished = as_flag(field, value)?,
            GameField::Hidden => self.hidden = as_flag(field, value)?,
            GameField::IsPackage => self.is_package = as_flag(field, value)?,
            GameField::LastPlayed => {
                self.last_played = match value {
                    Value::Null => None,
                    Value::String(text) => parse_timestamp(text)?,
                    other => {
                        return Err(LibraryError::invalid_field(
                            "lastplayed",
                            format!("expected a timestamp string, got {other}"),
                        ))
                    }
                }
            }
            GameField::Source => self.source = as_text(field, value)?.parse()?,
            GameField::PackageId => self.package_id = as_text(field, value)?,
            GameField::Genre => self.genre = as_text(field, value)?,
            GameField::IconUrl => self.icon_url = as_text(field, value)?,
            GameField::Notes => self.notes = as_text(field, value)?,
            GameField::Priority => {
                let level = value
                    .as_i64()
                    .ok_or_else(|| LibraryError::invalid_field("priority", "expected an integer"))?;
                self.priority = Priority::try_from(level)?;
            }
            GameField::SteamId => self.steam_id = as_text(field, value)?,
            GameField::GogId => self.gog_id = as_text(field, value)?,
            GameField::HumbleMachineName => self.humble_machine_name = as_text(field, value)?,
            GameField::HumblePackage => self.humble_package = as_text(field, value)?,
            GameField::InstallPath => self.install_path = as_text(field, value)?,
            GameField::Website => self.website = as_text(field, value)?,
        }
        Ok(())
    }

    /// Persisted representation of a single field.
    pub fn field_value(&self, field: GameField) -> Value {
        match field {
            GameField::Name => Value::from(self.name.as_str()),
            GameField::Playtime => Value::from(self.playtime),
            GameField::Finished => Value::from(self.finished),
            GameField::Hidden => Value::from(self.hidden),
            GameField::IsPackage => Value::from(self.is_package),
            GameField::LastPlayed => self
                .last_played
                .as_ref()
                .map(|stamp| Value::from(format_timestamp(stamp)))
                .unwrap_or(Value::Null),
            GameField::Source => Value::from(self.source.as_str()),
            GameField::PackageId => Value::from(self.package_id.as_str()),
            GameField::Genre => Value::from(self.genre.as_str()),
            GameField::IconUrl => Value::from(self.icon_url.as_str()),
            GameField::Notes => Value::from(self.notes.as_str()),
            GameField::Priority => Value::from(self.priority.level()),
            GameField::SteamId => steam_id_value(&self.steam_id),
            GameField::GogId => Value::from(self.gog_id.as_str()),
            GameField::HumbleMachineName => Value::from(self.humble_machine_name.as_str()),
            GameField::HumblePackage => Value::from(self.humble_package.as_str()),
            GameField::InstallPath => Value::from(self.install_path.as_str()),
            GameField::Website => Value::from(self.website.as_str()),
        }
    }

    /// Stable library key derived by the game's source.
    pub fn game_id(&self) -> Result<String> {
        source::registry().game_id(self)
    }

    /// Name as Steam stores it for non-Steam shortcuts.
    pub fn shortcut_name(&self) -> String {
        self.name.replace(':', "")
    }

    /// Directory containing the executable named by `install_path`.
    pub fn install_folder(&self) -> &str {
        match self.install_path.rfind(|c| c == '\\' || c == '/') {
            Some(0) => &self.install_path[..1],
            Some(index) => &self.install_path[..index],
            None => ".",
        }
    }

    /// Play time split into whole hours and remaining minutes.
    pub fn hours_minutes(&self) -> (u64, f64) {
        let minutes = self.playtime.max(0.0) / 60.0;
        let hours = (minutes / 60.0).floor();
        (hours as u64, minutes - hours * 60.0)
    }

    /// Seconds since the epoch of the last play, `0` when never played.
    pub fn last_played_epoch(&self) -> i64 {
        self.last_played
            .map(|stamp| stamp.and_utc().timestamp())
            .unwrap_or(0)
    }

    /// Human readable last-played time.
    pub fn last_played_nice(&self) -> String {
        match &self.last_played {
            Some(stamp) => stamp.format("%a, %d %b %Y %H:%M:%S").to_string(),
            None => "never".to_string(),
        }
    }

    /// Mark the game as played right now.
    pub fn played(&mut self) {
        self.last_played = Some(Local::now().naive_local());
    }

    /// Record a play at `when`.
    pub fn set_played(&mut self, when: NaiveDateTime) {
        self.last_played = Some(when);
    }

    /// Every field an editor should expose for this game.
    pub fn valid_args(&self) -> Vec<FieldSpec> {
        let mut args = GameField::BASE_ARGS.to_vec();
        args.extend_from_slice(source::registry().args(self.source));
        args
    }

    /// Compute how to start this game. Nothing is executed.
    pub fn build_launch(&self, planner: &LaunchPlanner) -> Result<LaunchPlan> {
        planner.plan(self)
    }

    /// Whether the game should run through a Steam shortcut that does not exist yet.
    pub fn missing_steam_launch(&self, planner: &LaunchPlanner) -> bool {
        planner.missing_steam_launch(self)
    }

    /// Games contained in this package, found by shared GOG id or Humble package.
    pub fn games_for_package<'a, I>(&self, games: I) -> Result<Vec<&'a Game>>
    where
        I: IntoIterator<Item = &'a Game>,
    {
        if !self.is_package {
            let id = self.game_id().unwrap_or_else(|_| self.name.clone());
            return Err(LibraryError::NotAPackage(id));
        }

        Ok(games
            .into_iter()
            .filter(|game| !std::ptr::eq(*game, self) && !game.is_package)
            .filter(|game| {
                let same_gog = self.source == SourceKind::Gog
                    && game.source == SourceKind::Gog
                    && game.gog_id == self.gog_id;
                let same_humble = self.source == SourceKind::Humble
                    && game.source == SourceKind::Humble
                    && game.humble_package == self.humble_package;
                same_gog || same_humble
            })
            .collect())
    }
}

impl fmt::Display for Game {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (hours, minutes) = self.hours_minutes();
        write!(f, "{} ({:02}:{:02})", self.name, hours, minutes as u64)
    }
}

impl TryFrom<FieldMap> for Game {
    type Error = LibraryError;

    fn try_from(fields: FieldMap) -> Result<Self> {
        Self::from_fields(&fields)
    }
}

impl From<Game> for FieldMap {
    fn from(game: Game) -> Self {
        game.to_fields()
    }
}

fn as_text(field: GameField, value: &Value) -> Result<String> {
    match value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        Value::Null => Ok(String::new()),
        other => Err(LibraryError::invalid_field(
            field.key(),
            format!("expected text, got {other}"),
        )),
    }
}

/// Numeric Steam ids persist as JSON integers; anything else stays text.
fn steam_id_value(steam_id: &str) -> Value {
    match steam_id.parse::<u64>() {
        Ok(id) if id.to_string() == steam_id => Value::from(id),
        _ => Value::from(steam_id),
    }
}

fn as_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse().ok(),
        _ => None,
    }
}

fn as_flag(field: GameField, value: &Value) -> Result<bool> {
    match value {
        Value::Bool(flag) => Ok(*flag),
        Value::Number(number) => Ok(number.as_f64().map(|n| n != 0.0).unwrap_or(false)),
        Value::String(text) => match text.trim() {
            "" | "0" | "false" => Ok(false),
            "1" | "true" => Ok(true),
            other => Err(LibraryError::invalid_field(
                field.key(),
                format!("expected a flag, got {other:?}"),
            )),
        },
        Value::Null => Ok(false),
        other => Err(LibraryError::invalid_field(
            field.key(),
            format!("expected a flag, got {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TIMESTAMP_FORMAT;
    use anyhow::Result;
    use serde_json::json;

    fn fields(value: Value) -> FieldMap {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected an object"),
        }
    }

    #[test]
    fn unknown_keys_are_ignored_and_minutes_convert() -> Result<()> {
        let game = Game::from_fields(&fields(json!({
            "name": "Braid",
            "source": "gog",
            "gogid": "braid",
            "minutes": 90,
            "favourite_colour": "blue",
        })))?;

        assert_eq!(game.name, "Braid");
        assert_eq!(game.source, SourceKind::Gog);
        assert_eq!(game.playtime, 5400.0);
        assert!(!game.to_fields().contains_key("favourite_colour"));
        assert!(!game.to_fields().contains_key("minutes"));
        Ok(())
    }

    #[test]
    fn legacy_integer_flags_and_sentinel_timestamp() -> Result<()> {
        let game = Game::from_fields(&fields(json!({
            "name": "Quake",
            "steamid": 2310,
            "finished": 1,
            "hidden": 0,
            "lastplayed": "19:00:00 1969-12-31",
        })))?;

        assert!(game.finished);
        assert!(!game.hidden);
        assert_eq!(game.steam_id, "2310");
        assert_eq!(game.last_played, None);
        assert_eq!(game.last_played_nice(), "never");
        Ok(())
    }

    #[test]
    fn numeric_steam_ids_stay_integers() -> Result<()> {
        let game = Game::from_fields(&fields(json!({
            "name": "Portal",
            "source": "steam",
            "steamid": 400,
        })))?;
        let dict = game.to_fields();
        assert_eq!(dict["steamid"], json!(400));
        assert_eq!(Game::from_fields(&dict)?.steam_id, "400");

        let padded = Game {
            steam_id: "0400".to_string(),
            ..Game::default()
        };
        assert_eq!(padded.to_fields()["steamid"], json!("0400"));
        assert_eq!(Game::default().to_fields()["steamid"], json!(""));
        Ok(())
    }

    #[test]
    fn dict_round_trip_preserves_field_set() -> Result<()> {
        let mut game = Game {
            name: "Owlboy".to_string(),
            source: SourceKind::Humble,
            humble_machine_name: "owlboy".to_string(),
            humble_package: "owlboy_bundle".to_string(),
            priority: Priority::Soon,
            playtime: 1234.5,
            ..Game::default()
        };
        game.set_played(NaiveDateTime::parse_from_str(
            "12:30:00 2018-06-01",
            TIMESTAMP_FORMAT,
        )?);

        let dict = game.to_fields();
        assert_eq!(dict.len(), GameField::ALL.len());
        let rebuilt = Game::from_fields(&dict)?;
        assert_eq!(rebuilt, game);
        assert_eq!(rebuilt.to_fields(), dict);

        let json = serde_json::to_value(&game)?;
        let parsed: Game = serde_json::from_value(json)?;
        assert_eq!(parsed, game);
        Ok(())
    }

    #[test]
    fn copy_is_independent() {
        let original = Game {
            name: "Celeste".to_string(),
            ..Game::default()
        };
        let mut copy = original.clone();
        copy.name.push_str(" Farewell");
        copy.finished = true;
        assert_eq!(original.name, "Celeste");
        assert!(!original.finished);
    }

    #[test]
    fn derived_properties() {
        let game = Game {
            name: "Deus Ex: Human Revolution".to_string(),
            install_path: r"C:\Games\DXHR\DXHR.exe".to_string(),
            playtime: 2.0 * 3600.0 + 30.0 * 60.0,
            ..Game::default()
        };
        assert_eq!(game.shortcut_name(), "Deus Ex Human Revolution");
        assert_eq!(game.install_folder(), r"C:\Games\DXHR");
        assert_eq!(game.hours_minutes(), (2, 30.0));
        assert_eq!(game.to_string(), "Deus Ex: Human Revolution (02:30)");

        let bare = Game {
            install_path: "game.exe".to_string(),
            ..Game::default()
        };
        assert_eq!(bare.install_folder(), ".");
    }

    #[test]
    fn rejects_bad_values() {
        assert!(Game::from_fields(&fields(json!({"priority": 4}))).is_err());
        assert!(Game::from_fields(&fields(json!({"source": "itch"}))).is_err());
        assert!(Game::from_fields(&fields(json!({"lastplayed": 5}))).is_err());
        assert!(Game::from_fields(&fields(json!({"playtime": "lots"}))).is_err());
    }

    #[test]
    fn valid_args_include_source_fields() {
        let game = Game {
            source: SourceKind::Steam,
            ..Game::default()
        };
        let args = game.valid_args();
        assert_eq!(args.len(), GameField::BASE_ARGS.len() + 1);
        assert_eq!(args.last(), Some(&(GameField::SteamId, FieldType::Integer)));
    }

    #[test]
    fn packages_collect_matching_members() -> Result<()> {
        let bundle = Game {
            name: "Humble Indie Bundle".to_string(),
            source: SourceKind::Humble,
            humble_machine_name: "hib1".to_string(),
            humble_package: "hib1".to_string(),
            is_package: true,
            ..Game::default()
        };
        let member = |name: &str, package: &str| Game {
            name: name.to_string(),
            source: SourceKind::Humble,
            humble_machine_name: name.to_lowercase(),
            humble_package: package.to_string(),
            ..Game::default()
        };
        let games = vec![
            bundle.clone(),
            member("Braid", "hib1"),
            member("Lugaru", "hib1"),
            member("Bastion", "hib2"),
            Game {
                name: "Braid".to_string(),
                source: SourceKind::Gog,
                gog_id: "braid".to_string(),
                ..Game::default()
            },
        ];

        let contents = bundle.games_for_package(&games)?;
        let names: Vec<_> = contents.iter().map(|game| game.name.as_str()).collect();
        assert_eq!(names, vec!["Braid", "Lugaru"]);

        let err = games[1].games_for_package(&games).unwrap_err();
        assert!(matches!(err, LibraryError::NotAPackage(_)));
        Ok(())
    }
}
