//! Read-throughput benchmarks against a finished database.
//!
//! Pure consumers of the schema produced by ingestion; nothing here mutates
//! state.

use std::time::{Duration, Instant};

use log::info;
use rusqlite::params;

use crate::db;
use crate::error::Result;

const FETCH_GAME_SQL: &str = "SELECT g.id, e.name, w.name, b.name, s.name, \
     g.result, g.ply_count, g.round, g.moves \
     FROM games g \
     JOIN events e ON e.id = g.event_id \
     JOIN players w ON w.id = g.white_id \
     JOIN players b ON b.id = g.black_id \
     LEFT JOIN sites s ON s.id = g.site_id \
     WHERE g.id = ?1";

#[derive(Debug)]
pub struct BenchReport {
    pub queries: u64,
    pub rows: u64,
    pub elapsed: Duration,
}

impl BenchReport {
    pub fn throughput(&self) -> f64 {
        self.queries as f64 / self.elapsed.as_secs_f64().max(f64::EPSILON)
    }
}

/// Fetches every game (joined with its interned names) one query at a time
/// and reports the resulting query rate.
pub fn bench(db_path: &str) -> Result<BenchReport> {
    let conn = db::open_read_only(db_path)?;
    let max_id: i64 = conn.query_row("SELECT COALESCE(MAX(id), 0) FROM games", [], |row| {
        row.get(0)
    })?;
    let mut stmt = conn.prepare(FETCH_GAME_SQL)?;

    let start = Instant::now();
    let mut queries = 0u64;
    let mut rows = 0u64;
    for id in 1..=max_id {
        queries += 1;
        match stmt.query_row(params![id], |row| {
            let _event: String = row.get(1)?;
            let _white: String = row.get(2)?;
            let _black: String = row.get(3)?;
            let _moves: String = row.get(8)?;
            Ok(())
        }) {
            Ok(()) => rows += 1,
            Err(rusqlite::Error::QueryReturnedNoRows) => {}
            Err(e) => return Err(e.into()),
        }
    }
    let report = BenchReport {
        queries,
        rows,
        elapsed: start.elapsed(),
    };
    info!(
        "bench: {} game fetches in {:.1?} ({:.0} queries/s)",
        report.queries,
        report.elapsed,
        report.throughput()
    );
    Ok(report)
}

/// Measures position-index lookups: samples distinct hashes, then queries the
/// game-id list for each and reports the lookup rate.
pub fn bench_moves(db_path: &str) -> Result<BenchReport> {
    let conn = db::open_read_only(db_path)?;
    let hashes: Vec<i64> = conn
        .prepare("SELECT DISTINCT hash FROM position_index LIMIT 10000")?
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<_, _>>()?;
    let mut stmt = conn.prepare("SELECT game_id FROM position_index WHERE hash = ?1")?;

    let start = Instant::now();
    let mut rows = 0u64;
    for &hash in &hashes {
        for row in stmt.query_map(params![hash], |row| row.get::<_, i64>(0))? {
            row?;
            rows += 1;
        }
    }
    let report = BenchReport {
        queries: hashes.len() as u64,
        rows,
        elapsed: start.elapsed(),
    };
    info!(
        "benchmoves: {} position lookups, {} rows in {:.1?} ({:.0} lookups/s)",
        report.queries,
        report.rows,
        report.elapsed,
        report.throughput()
    );
    Ok(report)
}
