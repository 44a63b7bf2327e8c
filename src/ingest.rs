//! Parallel PGN ingestion.
//!
//! One reading loop produces boundary-safe units and feeds them over a
//! bounded channel to a fixed pool of worker threads. Each worker owns its
//! extraction context and local counters; the interning tables, the position
//! index and the database writer are shared by reference and arbitrated by
//! their own mutexes. Ordering across games or units is neither guaranteed
//! nor required.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::db::{Dedup, NameInterner, PositionIndex, SummaryCounts, Writer};
use crate::error::{Error, Result};
use crate::pgn::{self, BlockReader, Extracted, Extractor, DEFAULT_BLOCK_SIZE};

pub struct IngestOptions {
    /// Worker threads; 0 means all available cores.
    pub threads: usize,
    pub block_size: usize,
    pub dedup: Dedup,
}

impl Default for IngestOptions {
    fn default() -> IngestOptions {
        IngestOptions {
            threads: 0,
            block_size: DEFAULT_BLOCK_SIZE,
            dedup: Dedup::Exact,
        }
    }
}

#[derive(Debug)]
pub struct IngestReport {
    pub games: u64,
    pub errors: u64,
    pub players: u64,
    pub events: u64,
    pub sites: u64,
    pub positions: u64,
    pub elapsed: Duration,
}

/// Converts one PGN file into an indexed database. Setup failures (input or
/// database cannot be opened) abort before any thread starts; per-game and
/// per-unit failures are counted and skipped.
pub fn ingest(pgn_path: &Path, db_path: &str, options: &IngestOptions) -> Result<IngestReport> {
    let start = Instant::now();

    let source = pgn::open_source(pgn_path)?;
    let writer = Writer::create(db_path)?;
    let interner = NameInterner::new();
    let index = PositionIndex::new(options.dedup);

    let threads = if options.threads == 0 {
        num_cpus::get()
    } else {
        options.threads
    };
    info!(
        "ingesting {} into {} with {} worker threads",
        pgn_path.display(),
        db_path,
        threads
    );

    let games = AtomicU64::new(0);
    let errors = AtomicU64::new(0);

    let mut reader = BlockReader::with_block_size(source, options.block_size);
    let (tx, rx) = crossbeam_channel::bounded::<Vec<u8>>(threads * 2);
    let mut read_err: Option<Error> = None;

    thread::scope(|s| {
        for _ in 0..threads {
            let rx = rx.clone();
            let (writer, interner, index) = (&writer, &interner, &index);
            let (games, errors) = (&games, &errors);
            s.spawn(move || {
                let mut worker = Worker::new();
                for unit in rx {
                    worker.process_unit(&unit, writer, interner, index);
                }
                games.fetch_add(worker.games, Ordering::Relaxed);
                errors.fetch_add(worker.errors, Ordering::Relaxed);
            });
        }
        drop(rx);

        loop {
            match reader.next_unit() {
                Ok(Some(unit)) => {
                    if tx.send(unit).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    read_err = Some(e);
                    break;
                }
            }
        }
        drop(tx);
    });

    if let Some(e) = read_err {
        return Err(e);
    }

    let (flushed, skipped) = writer.flush_position_index(&index)?;
    let report = IngestReport {
        games: games.load(Ordering::Relaxed),
        errors: errors.load(Ordering::Relaxed) + skipped,
        players: interner.player_count(),
        events: interner.event_count(),
        sites: interner.site_count(),
        positions: index.position_count(),
        elapsed: start.elapsed(),
    };
    writer.finalize(&SummaryCounts {
        games: report.games,
        players: report.players,
        events: report.events,
        sites: report.sites,
    })?;

    info!(
        "loaded {} games ({} errors), {} players, {} events, {} sites, \
         {} positions ({} index rows) in {:.1?}",
        report.games,
        report.errors,
        report.players,
        report.events,
        report.sites,
        report.positions,
        flushed,
        report.elapsed
    );
    Ok(report)
}

/// Per-thread worker state: the reusable extraction context plus local
/// counters, folded into the shared totals when the worker finishes.
struct Worker {
    extractor: Extractor,
    games: u64,
    errors: u64,
}

impl Worker {
    fn new() -> Worker {
        Worker {
            extractor: Extractor::new(),
            games: 0,
            errors: 0,
        }
    }

    fn process_unit(
        &mut self,
        unit: &[u8],
        writer: &Writer,
        interner: &NameInterner,
        index: &PositionIndex,
    ) {
        for raw in pgn::split_games(unit) {
            match self.extractor.extract(raw) {
                Err(e) => {
                    debug!("skipping game: {e}");
                    self.errors += 1;
                }
                Ok(game) => {
                    if let Some(e) = &game.move_error {
                        debug!("partial game kept: {e}");
                        self.errors += 1;
                    }
                    match store(&game, writer, interner, index) {
                        Ok(()) => self.games += 1,
                        Err(e) => {
                            warn!("failed to store game: {e}");
                            self.errors += 1;
                        }
                    }
                }
            }
        }
    }
}

fn store(
    game: &Extracted<'_>,
    writer: &Writer,
    interner: &NameInterner,
    index: &PositionIndex,
) -> Result<()> {
    let record = &game.record;
    let event_id = interner.event_id(writer, &record.event)?;
    let white_id = interner.player_id(writer, &record.white, record.white_elo)?;
    let black_id = interner.player_id(writer, &record.black, record.black_elo)?;
    let site_id = match &record.site {
        Some(site) => Some(interner.site_id(writer, site)?),
        None => None,
    };
    let game_id = writer.insert_game(record, event_id, white_id, black_id, site_id)?;
    index.record_game(game_id, game.hashes);
    Ok(())
}
