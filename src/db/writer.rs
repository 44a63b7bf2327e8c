//! Single shared storage connection and its write protocol.
//!
//! All threads write through one SQLite connection guarded by a mutex.
//! Statements are served from the connection's prepared-statement cache, so
//! each logical insert is prepared once and reused for the whole run. Writes
//! run inside long batched transactions: one is opened at creation, committed
//! every [`TXN_BATCH`] game inserts, and the last one at finalize.

use std::sync::Mutex;

use log::{info, warn};
use rusqlite::{params, Connection};

use crate::db::{self, PositionIndex};
use crate::error::Result;
use crate::record::GameRecord;

/// Game inserts per transaction.
pub const TXN_BATCH: usize = 5000;

const INSERT_GAME_SQL: &str = "INSERT INTO games (event_id, white_id, black_id, site_id, \
     result, ply_count, white_elo, black_elo, round, date, eco, time_control, fen, moves) \
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)";

const INSERT_HASH_SQL: &str = "INSERT INTO position_index (hash, game_id) VALUES (?1, ?2)";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NameCategory {
    Player,
    Event,
    Site,
}

impl NameCategory {
    fn insert_sql(self) -> &'static str {
        match self {
            NameCategory::Player => "INSERT INTO players (id, name, elo) VALUES (?1, ?2, ?3)",
            NameCategory::Event => "INSERT INTO events (id, name) VALUES (?1, ?2)",
            NameCategory::Site => "INSERT INTO sites (id, name) VALUES (?1, ?2)",
        }
    }
}

/// End-of-run totals written to the `info` table.
pub struct SummaryCounts {
    pub games: u64,
    pub players: u64,
    pub events: u64,
    pub sites: u64,
}

struct Inner {
    conn: Connection,
    pending: usize,
}

pub struct Writer {
    inner: Mutex<Inner>,
}

impl Writer {
    /// Opens the database, creates the schema if absent and starts the first
    /// bulk transaction. Failure here is fatal to the run.
    pub fn create(path: &str) -> Result<Writer> {
        let conn = db::open_for_ingest(path)?;
        conn.execute_batch("BEGIN")?;
        Ok(Writer {
            inner: Mutex::new(Inner { conn, pending: 0 }),
        })
    }

    /// Executes the prepared game insert and returns the storage-assigned id.
    pub fn insert_game(
        &self,
        record: &GameRecord,
        event_id: i64,
        white_id: i64,
        black_id: i64,
        site_id: Option<i64>,
    ) -> Result<i64> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        {
            let mut stmt = inner.conn.prepare_cached(INSERT_GAME_SQL)?;
            stmt.execute(params![
                event_id,
                white_id,
                black_id,
                site_id,
                record.result.as_str(),
                record.ply_count,
                record.white_elo,
                record.black_elo,
                record.round,
                record.date,
                record.eco,
                record.time_control,
                record.fen,
                record.moves,
            ])?;
        }
        let id = inner.conn.last_insert_rowid();
        inner.pending += 1;
        if inner.pending >= TXN_BATCH {
            inner.conn.execute_batch("COMMIT; BEGIN")?;
            inner.pending = 0;
        }
        Ok(id)
    }

    /// Durable insert for a freshly interned name. Called by the interner
    /// while it holds the category lock, so a name row is written exactly
    /// once per (category, name).
    pub fn insert_name(
        &self,
        category: NameCategory,
        id: i64,
        name: &str,
        elo: Option<i32>,
    ) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let mut stmt = inner.conn.prepare_cached(category.insert_sql())?;
        match category {
            NameCategory::Player => stmt.execute(params![id, name, elo])?,
            NameCategory::Event | NameCategory::Site => stmt.execute(params![id, name])?,
        };
        Ok(())
    }

    /// Drains the in-memory position index into `position_index` rows.
    /// Runs inside the final bulk transaction. A row that fails to insert is
    /// skipped and counted; the transaction and the run continue. Returns
    /// `(rows written, rows skipped)`; `Err` is reserved for the statement
    /// itself failing to prepare.
    pub fn flush_position_index(&self, index: &PositionIndex) -> Result<(u64, u64)> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        let mut stmt = inner.conn.prepare_cached(INSERT_HASH_SQL)?;
        let mut rows = 0u64;
        let mut skipped = 0u64;
        index.for_each(|hash, game_ids| {
            for &game_id in game_ids {
                match stmt.execute(params![hash as i64, game_id]) {
                    Ok(_) => rows += 1,
                    Err(e) => {
                        warn!("skipping position index row: {e}");
                        skipped += 1;
                    }
                }
            }
        });
        Ok((rows, skipped))
    }

    /// Commits the outstanding transaction, creates the read indexes and
    /// records the run totals in the `info` table.
    pub fn finalize(&self, counts: &SummaryCounts) -> Result<()> {
        let mut guard = self.inner.lock().unwrap();
        let inner = &mut *guard;
        inner.conn.execute_batch("COMMIT")?;
        inner.pending = 0;
        info!("creating indexes");
        inner.conn.execute_batch(db::INDEXES_SQL)?;
        let totals = [
            ("GameCount", counts.games),
            ("PlayerCount", counts.players),
            ("EventCount", counts.events),
            ("SiteCount", counts.sites),
        ];
        let mut stmt = inner.conn.prepare_cached(
            "INSERT INTO info (name, value) VALUES (?1, ?2) \
             ON CONFLICT(name) DO UPDATE SET value = excluded.value",
        )?;
        for (name, value) in totals {
            stmt.execute(params![name, value.to_string()])?;
        }
        Ok(())
    }
}
