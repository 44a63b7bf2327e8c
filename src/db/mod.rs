pub mod index;
pub mod interner;
pub mod writer;

pub use index::{Dedup, PositionIndex};
pub use interner::NameInterner;
pub use writer::{NameCategory, SummaryCounts, Writer};

use rusqlite::{Connection, OpenFlags};

use crate::error::Result;

const SCHEMA_SQL: &str = "
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS sites (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE
);
CREATE TABLE IF NOT EXISTS players (
    id INTEGER PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    elo INTEGER
);
CREATE TABLE IF NOT EXISTS games (
    id INTEGER PRIMARY KEY,
    event_id INTEGER NOT NULL,
    white_id INTEGER NOT NULL,
    black_id INTEGER NOT NULL,
    site_id INTEGER,
    result TEXT NOT NULL,
    ply_count INTEGER NOT NULL,
    white_elo INTEGER NOT NULL,
    black_elo INTEGER NOT NULL,
    round INTEGER NOT NULL,
    date TEXT,
    eco TEXT,
    time_control TEXT,
    fen TEXT,
    moves TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS position_index (
    hash INTEGER NOT NULL,
    game_id INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS info (
    name TEXT PRIMARY KEY,
    value TEXT
);
";

// Bulk-load tuning; durability is recovered by the final commit and the
// read indexes are created after the import, not before.
const IMPORT_PRAGMAS: &str = "
PRAGMA journal_mode = OFF;
PRAGMA synchronous = OFF;
PRAGMA temp_store = MEMORY;
PRAGMA cache_size = -65536;
";

pub(crate) const INDEXES_SQL: &str = "
CREATE INDEX IF NOT EXISTS idx_position_index_hash ON position_index(hash);
CREATE INDEX IF NOT EXISTS idx_games_event ON games(event_id);
CREATE INDEX IF NOT EXISTS idx_games_white ON games(white_id);
CREATE INDEX IF NOT EXISTS idx_games_black ON games(black_id);
";

/// Opens (or creates) a database for ingestion and ensures the schema exists.
pub fn open_for_ingest(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch(IMPORT_PRAGMAS)?;
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(conn)
}

pub fn open_read_only(path: &str) -> Result<Connection> {
    Ok(Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?)
}
