use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::*;

pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum RestoreError {
    #[error("saved board is invalid: {0}")]
    Map(#[from] MapError),
    #[error("saved game is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported save version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
    #[error("saved game has {count} hunters, at most {limit} are allowed")]
    TooManyHunters { count: usize, limit: usize },
}

/// Everything needed to resume a game exactly where it stopped. The board is
/// stored as map rows and re-parsed on restore; nothing else is re-derived.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SavedGame {
    pub version: u32,
    pub tiles: Vec<String>,
    pub runner: Runner,
    pub hunters: Vec<Hunter>,
    #[serde(rename = "fruitSpawn")]
    pub fruit_spawn: Option<Vec2>,
    #[serde(rename = "fruitTurnsLeft")]
    pub fruit_turns_left: u32,
    #[serde(rename = "fruitThresholds")]
    pub fruit_thresholds: [u32; 2],
    pub turn: u32,
    pub score: i32,
    #[serde(rename = "lastScore")]
    pub last_score: i32,
    #[serde(rename = "totalConsumables")]
    pub total_consumables: u32,
    pub remaining: u32,
    #[serde(rename = "lastInput")]
    pub last_input: Option<TurnInput>,
    #[serde(rename = "fastForward")]
    pub fast_forward: bool,
    #[serde(rename = "helpShown")]
    pub help_shown: bool,
    pub status: GameStatus,
    pub rng: Rng,
    pub config: GameConfig,
    #[serde(rename = "lastPlayedMs")]
    pub last_played_ms: u64,
}

impl SavedGame {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(raw: &str) -> Result<Self, RestoreError> {
        Ok(serde_json::from_str(raw)?)
    }
}

impl GameEngine {
    pub fn to_saved(&self) -> SavedGame {
        SavedGame {
            version: SAVE_VERSION,
            tiles: self.grid.rows(),
            runner: self.runner.clone(),
            hunters: self.hunters.clone(),
            fruit_spawn: self.fruit_spawn,
            fruit_turns_left: self.fruit_turns_left,
            fruit_thresholds: self.fruit_thresholds,
            turn: self.turn,
            score: self.score,
            last_score: self.last_score,
            total_consumables: self.total_consumables,
            remaining: self.remaining,
            last_input: self.last_input,
            fast_forward: self.fast_forward,
            help_shown: self.help_shown,
            status: self.status,
            rng: self.rng.clone(),
            config: self.config.clone(),
            last_played_ms: self.last_played_ms,
        }
    }

    pub fn from_saved(saved: SavedGame) -> Result<Self, RestoreError> {
        if saved.version != SAVE_VERSION {
            return Err(RestoreError::UnsupportedVersion {
                found: saved.version,
                expected: SAVE_VERSION,
            });
        }
        if saved.hunters.len() > MAX_HUNTERS {
            return Err(RestoreError::TooManyHunters {
                count: saved.hunters.len(),
                limit: MAX_HUNTERS,
            });
        }
        let grid = Grid::from_rows(&saved.tiles)?;
        let runner = Runner {
            pos: grid.wrap(saved.runner.pos),
            ..saved.runner
        };
        let hunters = saved
            .hunters
            .into_iter()
            .map(|hunter| Hunter {
                pos: grid.wrap(hunter.pos),
                ..hunter
            })
            .collect();

        Ok(Self {
            config: saved.config,
            grid,
            rng: saved.rng,
            runner,
            hunters,
            fruit_spawn: saved.fruit_spawn,
            fruit_turns_left: saved.fruit_turns_left,
            fruit_thresholds: saved.fruit_thresholds,
            events: Vec::new(),
            turn: saved.turn,
            score: saved.score,
            last_score: saved.last_score,
            total_consumables: saved.total_consumables,
            remaining: saved.remaining,
            last_input: saved.last_input,
            fast_forward: saved.fast_forward,
            help_shown: saved.help_shown,
            status: saved.status,
            last_played_ms: saved.last_played_ms,
        })
    }
}
