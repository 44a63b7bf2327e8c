//! Concurrent name-to-id interning for players, events and sites.
//!
//! Each category keeps its own map behind its own mutex so unrelated
//! categories never block each other. The critical section deliberately spans
//! the existence check, the sequential id assignment and the durable insert:
//! two threads racing on the same new name cannot both insert it or observe
//! different ids. Ids start at 1 and are never reused or renumbered.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::db::writer::{NameCategory, Writer};
use crate::error::Result;

#[derive(Default)]
pub struct NameInterner {
    players: Mutex<HashMap<String, i64>>,
    events: Mutex<HashMap<String, i64>>,
    sites: Mutex<HashMap<String, i64>>,
}

impl NameInterner {
    pub fn new() -> NameInterner {
        NameInterner::default()
    }

    /// Insert-or-fetch for one name. The Elo only applies to players and only
    /// on first sight (first-write-wins, not part of the identity key).
    pub fn intern(
        &self,
        writer: &Writer,
        category: NameCategory,
        name: &str,
        elo: Option<i32>,
    ) -> Result<i64> {
        let table = match category {
            NameCategory::Player => &self.players,
            NameCategory::Event => &self.events,
            NameCategory::Site => &self.sites,
        };
        let mut map = table.lock().unwrap();
        if let Some(&id) = map.get(name) {
            return Ok(id);
        }
        let id = map.len() as i64 + 1;
        writer.insert_name(category, id, name, elo)?;
        map.insert(name.to_string(), id);
        Ok(id)
    }

    pub fn player_id(&self, writer: &Writer, name: &str, elo: i32) -> Result<i64> {
        let elo = if elo > 0 { Some(elo) } else { None };
        self.intern(writer, NameCategory::Player, name, elo)
    }

    pub fn event_id(&self, writer: &Writer, name: &str) -> Result<i64> {
        self.intern(writer, NameCategory::Event, name, None)
    }

    pub fn site_id(&self, writer: &Writer, name: &str) -> Result<i64> {
        self.intern(writer, NameCategory::Site, name, None)
    }

    pub fn player_count(&self) -> u64 {
        self.players.lock().unwrap().len() as u64
    }

    pub fn event_count(&self) -> u64 {
        self.events.lock().unwrap().len() as u64
    }

    pub fn site_count(&self) -> u64 {
        self.sites.lock().unwrap().len() as u64
    }
}
