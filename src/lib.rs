//! Parallel PGN to SQLite chess game database builder.
//!
//! Ingests large PGN files with a pool of worker threads, deduplicating
//! player/event/site names into interned id tables and building a Zobrist
//! position-hash index for fast "which games reached this position" lookups.

pub mod bench;
pub mod db;
pub mod error;
pub mod ingest;
pub mod pgn;
pub mod record;

pub use crate::bench::{bench, bench_moves, BenchReport};
pub use crate::db::{Dedup, NameInterner, PositionIndex, Writer};
pub use crate::error::{Error, Result};
pub use crate::ingest::{ingest, IngestOptions, IngestReport};
pub use crate::record::{GameRecord, GameResult};
