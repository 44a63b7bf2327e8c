use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use pgnbase::error::{Error, Result};
use pgnbase::{bench, bench_moves, ingest, IngestOptions};

#[derive(Parser)]
#[command(name = "pgnbase", version, about = "Parallel PGN to SQLite chess game database builder")]
struct Args {
    /// PGN game file to import (.pgn, optionally .bz2 or .zst compressed)
    #[arg(long)]
    pgn: Option<PathBuf>,

    /// Database path; use ":memory:" for an ephemeral run
    #[arg(long)]
    db: Option<String>,

    /// Worker thread count; omit to use all available cores
    #[arg(long)]
    cpu: Option<usize>,

    /// Benchmark full-game query speed against --db
    #[arg(long)]
    bench: bool,

    /// Benchmark position-matching query speed against --db
    #[arg(long = "benchmoves")]
    bench_moves: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<()> {
    if args.bench && args.bench_moves {
        return Err(Error::Usage(
            "--bench and --benchmoves are mutually exclusive".into(),
        ));
    }
    if args.bench || args.bench_moves {
        let db = args
            .db
            .ok_or_else(|| Error::Usage("--bench and --benchmoves require --db".into()))?;
        let report = if args.bench {
            bench(&db)?
        } else {
            bench_moves(&db)?
        };
        println!(
            "{} queries, {} rows in {:.1?} ({:.0} queries/s)",
            report.queries,
            report.rows,
            report.elapsed,
            report.throughput()
        );
        return Ok(());
    }

    let pgn = args
        .pgn
        .ok_or_else(|| Error::Usage("ingestion requires --pgn and --db".into()))?;
    let db = args
        .db
        .ok_or_else(|| Error::Usage("ingestion requires --pgn and --db".into()))?;

    let options = IngestOptions {
        threads: args.cpu.unwrap_or(0),
        ..IngestOptions::default()
    };
    let report = ingest(&pgn, &db, &options)?;
    println!(
        "games: {}, errors: {}, players: {}, events: {}, sites: {}, positions: {}, elapsed: {:.1?}",
        report.games,
        report.errors,
        report.players,
        report.events,
        report.sites,
        report.positions,
        report.elapsed
    );
    Ok(())
}
