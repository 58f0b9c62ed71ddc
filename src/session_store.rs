use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::engine::{GameEngine, SavedGame};
use crate::types::GameStatus;

const STORE_VERSION: u8 = 1;

#[derive(Clone, Debug, Serialize, Deserialize)]
struct StoredSession {
    #[serde(rename = "savedAtIso", alias = "saved_at_iso")]
    saved_at_iso: String,
    game: SavedGame,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct SessionStoreFile {
    version: u8,
    sessions: HashMap<String, StoredSession>,
}

#[derive(Clone, Debug, Deserialize)]
struct SessionStoreFileRaw {
    version: u8,
    sessions: HashMap<String, serde_json::Value>,
}

/// Saved games keyed by channel id, mirrored to one JSON file. Disk failures
/// are logged and never reach gameplay.
pub struct SessionStore {
    file_path: PathBuf,
    sessions: HashMap<String, StoredSession>,
}

impl SessionStore {
    pub fn new(file_path: PathBuf) -> Self {
        let sessions = load_sessions(&file_path);
        Self {
            file_path,
            sessions,
        }
    }

    /// Stores a running game; finished games are dropped from the store.
    pub fn checkpoint(&mut self, channel: &str, engine: &GameEngine) {
        let key = channel_key(channel);
        if key.is_empty() {
            return;
        }
        if engine.status() != GameStatus::Active {
            if self.sessions.remove(&key).is_some() {
                self.save();
            }
            return;
        }
        self.sessions.insert(
            key,
            StoredSession {
                saved_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
                game: engine.to_saved(),
            },
        );
        self.save();
    }

    pub fn get(&self, channel: &str) -> Option<&SavedGame> {
        self.sessions
            .get(&channel_key(channel))
            .map(|session| &session.game)
    }

    /// Rebuilds the engine for `channel`. A save that no longer restores is
    /// logged and discarded.
    pub fn restore(&mut self, channel: &str) -> Option<GameEngine> {
        let key = channel_key(channel);
        let saved = self.sessions.get(&key)?.game.clone();
        match GameEngine::from_saved(saved) {
            Ok(engine) => Some(engine),
            Err(error) => {
                eprintln!("[session-store] dropping unrestorable session '{key}': {error}");
                self.sessions.remove(&key);
                self.save();
                None
            }
        }
    }

    pub fn remove(&mut self, channel: &str) -> bool {
        let removed = self.sessions.remove(&channel_key(channel)).is_some();
        if removed {
            self.save();
        }
        removed
    }

    pub fn channels(&self) -> Vec<String> {
        let mut channels: Vec<String> = self.sessions.keys().cloned().collect();
        channels.sort();
        channels
    }

    /// Drops sessions whose last input is at least `idle_ms` old and returns
    /// their channels.
    pub fn expire_idle(&mut self, now_ms: u64, idle_ms: u64) -> Vec<String> {
        let mut expired: Vec<String> = self
            .sessions
            .iter()
            .filter(|(_, session)| now_ms.saturating_sub(session.game.last_played_ms) >= idle_ms)
            .map(|(channel, _)| channel.clone())
            .collect();
        if expired.is_empty() {
            return expired;
        }
        expired.sort();
        for channel in &expired {
            self.sessions.remove(channel);
        }
        self.save();
        expired
    }

    fn save(&self) {
        if let Some(parent) = self.file_path.parent() {
            if let Err(error) = fs::create_dir_all(parent) {
                eprintln!(
                    "[session-store] failed to create parent dir {}: {error}",
                    parent.display()
                );
                return;
            }
        }

        let payload = SessionStoreFile {
            version: STORE_VERSION,
            sessions: self.sessions.clone(),
        };
        match serde_json::to_string(&payload) {
            Ok(text) => {
                if let Err(error) = fs::write(&self.file_path, text) {
                    eprintln!(
                        "[session-store] failed to write {}: {error}",
                        self.file_path.display()
                    );
                }
            }
            Err(error) => {
                eprintln!(
                    "[session-store] failed to serialize payload for {}: {error}",
                    self.file_path.display()
                );
            }
        }
    }
}

fn load_sessions(path: &Path) -> HashMap<String, StoredSession> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                eprintln!("[session-store] failed to read {}: {error}", path.display());
            }
            return HashMap::new();
        }
    };
    let parsed = match serde_json::from_str::<SessionStoreFileRaw>(&text) {
        Ok(value) if value.version == STORE_VERSION => value,
        Ok(value) => {
            eprintln!(
                "[session-store] unsupported version {} at {}",
                value.version,
                path.display()
            );
            return HashMap::new();
        }
        Err(error) => {
            eprintln!(
                "[session-store] failed to parse {}: {error}",
                path.display()
            );
            return HashMap::new();
        }
    };

    let mut sessions = HashMap::new();
    for (channel, raw_value) in parsed.sessions {
        let session: StoredSession = match serde_json::from_value(raw_value) {
            Ok(entry) => entry,
            Err(error) => {
                eprintln!(
                    "[session-store] failed to parse session '{}' in {}: {error}",
                    channel,
                    path.display()
                );
                continue;
            }
        };
        let key = channel_key(&channel);
        if key.is_empty() || session.game.status != GameStatus::Active {
            continue;
        }
        sessions.insert(key, session);
    }
    sessions
}

fn channel_key(channel: &str) -> String {
    channel.trim().to_string()
}
