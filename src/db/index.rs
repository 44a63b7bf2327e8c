//! In-memory position-hash index built during ingestion.
//!
//! Maps a 64-bit Zobrist signature to the ids of every game that reached the
//! position. One coarse mutex guards the whole map; each critical section is
//! an O(1)-amortized lookup plus append, and a worker takes the lock once per
//! game rather than once per position.

use std::collections::HashMap;
use std::sync::Mutex;

/// How repeat visits of one game to the same position are suppressed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dedup {
    /// Only compare against the most recently appended id for the hash.
    RecentOnly,
    /// Check the hash's full id list; a game id appears at most once per hash.
    Exact,
}

pub struct PositionIndex {
    dedup: Dedup,
    map: Mutex<HashMap<u64, Vec<i64>>>,
}

impl PositionIndex {
    pub fn new(dedup: Dedup) -> PositionIndex {
        PositionIndex {
            dedup,
            map: Mutex::new(HashMap::new()),
        }
    }

    /// Records every position one game reached, under a single lock
    /// acquisition so interleaving games cannot defeat the duplicate check.
    pub fn record_game(&self, game_id: i64, hashes: &[u64]) {
        if hashes.is_empty() {
            return;
        }
        let mut map = self.map.lock().unwrap();
        for &hash in hashes {
            let ids = map.entry(hash).or_default();
            let seen = match self.dedup {
                Dedup::RecentOnly => ids.last() == Some(&game_id),
                Dedup::Exact => ids.contains(&game_id),
            };
            if !seen {
                ids.push(game_id);
            }
        }
    }

    /// Single-entry form of [`record_game`](Self::record_game).
    pub fn record(&self, hash: u64, game_id: i64) {
        self.record_game(game_id, &[hash]);
    }

    /// Distinct positions seen.
    pub fn position_count(&self) -> u64 {
        self.map.lock().unwrap().len() as u64
    }

    /// Total (hash, game id) pairs held.
    pub fn entry_count(&self) -> u64 {
        self.map
            .lock()
            .unwrap()
            .values()
            .map(|ids| ids.len() as u64)
            .sum()
    }

    pub fn for_each<F: FnMut(u64, &[i64])>(&self, mut f: F) {
        for (&hash, ids) in self.map.lock().unwrap().iter() {
            f(hash, ids);
        }
    }
}
