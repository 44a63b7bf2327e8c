//! End-to-end ingestion and benchmark runs over a temporary database.

use std::io::Write;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use shakmaty::san::San;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{Chess, EnPassantMode, Position};
use tempfile::TempDir;

use pgnbase::{bench, bench_moves, ingest, IngestOptions};

// Two games share an event and a site, one game carries comments, NAGs and a
// variation, one game has an illegal fourth ply, one game is missing its
// White tag. Expected: 4 games loaded, 2 errors.
const SAMPLE: &str = "\
[Event \"World Championship\"]
[Site \"London\"]
[Date \"2023.04.09\"]
[Round \"1\"]
[White \"Carlsen, Magnus\"]
[Black \"Caruana, Fabiano\"]
[Result \"1-0\"]
[WhiteElo \"2850\"]
[BlackElo \"2800\"]
[ECO \"C50\"]

1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 1-0

[Event \"World Championship\"]
[Site \"London\"]
[Round \"2\"]
[White \"Ding, Liren\"]
[Black \"Nepomniachtchi, Ian\"]
[Result \"1/2-1/2\"]

1. d4 d5 2. c4 e6 3. Nc3 Nf6 1/2-1/2

[Event \"Casual Game\"]
[White \"Alice\"]
[Black \"Bob\"]
[Result \"0-1\"]

1. e4 {king pawn} c5 $1 2. Nf3 (2. Nc3 Nc6) 2... d6 0-1

[Event \"Blunderfest\"]
[White \"Carol\"]
[Black \"Dave\"]
[Result \"1-0\"]

1. e4 e5 2. Nf3 Nf3 3. Bc4 1-0

[Event \"Casual Game\"]
[Black \"Nobody\"]
[Result \"*\"]

1. e4 *
";

fn write_sample(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("games.pgn");
    std::fs::write(&path, SAMPLE).unwrap();
    path
}

fn run_ingest(pgn: &Path, db: &Path, threads: usize, block_size: usize) -> pgnbase::IngestReport {
    let options = IngestOptions {
        threads,
        block_size,
        ..IngestOptions::default()
    };
    ingest(pgn, db.to_str().unwrap(), &options).unwrap()
}

fn hash_after_e4() -> i64 {
    let mut pos = Chess::default();
    let m = San::from_ascii(b"e4").unwrap().to_move(&pos).unwrap();
    pos.play_unchecked(&m);
    pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0 as i64
}

#[test]
fn ingests_counts_and_dedups() {
    let dir = tempfile::tempdir().unwrap();
    let pgn = write_sample(&dir);
    let db = dir.path().join("games.db3");

    let report = run_ingest(&pgn, &db, 2, 128);
    assert_eq!(report.games, 4);
    assert_eq!(report.errors, 2);
    assert_eq!(report.players, 8);
    assert_eq!(report.events, 3);
    assert_eq!(report.sites, 1);
    assert!(report.positions > 0);

    let conn = Connection::open(&db).unwrap();
    let games: i64 = conn
        .query_row("SELECT COUNT(*) FROM games", [], |r| r.get(0))
        .unwrap();
    assert_eq!(games, 4);

    // Both championship games resolve to the one interned event row.
    let event_rows: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM events WHERE name = 'World Championship'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(event_rows, 1);
    let distinct_event_ids: i64 = conn
        .query_row(
            "SELECT COUNT(DISTINCT g.event_id) FROM games g \
             JOIN events e ON e.id = g.event_id WHERE e.name = 'World Championship'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(distinct_event_ids, 1);

    // The skipped game's players were never interned.
    let nobody: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM players WHERE name = 'Nobody'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(nobody, 0);

    // Summary counts land in the info table.
    let game_count: String = conn
        .query_row("SELECT value FROM info WHERE name = 'GameCount'", [], |r| {
            r.get(0)
        })
        .unwrap();
    assert_eq!(game_count, "4");
}

#[test]
fn illegal_game_keeps_its_valid_prefix() {
    let dir = tempfile::tempdir().unwrap();
    let pgn = write_sample(&dir);
    let db = dir.path().join("games.db3");
    run_ingest(&pgn, &db, 2, 4096);

    let conn = Connection::open(&db).unwrap();
    let ply_count: i64 = conn
        .query_row(
            "SELECT g.ply_count FROM games g \
             JOIN players b ON b.id = g.black_id WHERE b.name = 'Dave'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(ply_count, 2);
}

#[test]
fn position_index_covers_every_game_once() {
    let dir = tempfile::tempdir().unwrap();
    let pgn = write_sample(&dir);
    let db = dir.path().join("games.db3");
    run_ingest(&pgn, &db, 2, 4096);

    // Three of the loaded games open 1. e4; each appears exactly once.
    let conn = Connection::open(&db).unwrap();
    let mut stmt = conn
        .prepare("SELECT game_id FROM position_index WHERE hash = ?1")
        .unwrap();
    let ids: Vec<i64> = stmt
        .query_map([hash_after_e4()], |r| r.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(ids.len(), 3);
    let mut sorted = ids.clone();
    sorted.sort_unstable();
    sorted.dedup();
    assert_eq!(sorted.len(), 3);
}

#[test]
fn compressed_input_matches_plain_text() {
    let dir = tempfile::tempdir().unwrap();
    let plain = write_sample(&dir);

    let bz2 = dir.path().join("games.pgn.bz2");
    let mut encoder = bzip2::write::BzEncoder::new(
        std::fs::File::create(&bz2).unwrap(),
        bzip2::Compression::default(),
    );
    encoder.write_all(SAMPLE.as_bytes()).unwrap();
    encoder.finish().unwrap();

    let zst = dir.path().join("games.pgn.zst");
    std::fs::write(&zst, zstd::stream::encode_all(SAMPLE.as_bytes(), 0).unwrap()).unwrap();

    let expected = run_ingest(&plain, &dir.path().join("plain.db3"), 2, 4096);
    for (path, db) in [(&bz2, "bz2.db3"), (&zst, "zst.db3")] {
        let report = run_ingest(path, &dir.path().join(db), 2, 4096);
        assert_eq!(report.games, expected.games);
        assert_eq!(report.errors, expected.errors);
        assert_eq!(report.players, expected.players);
        assert_eq!(report.positions, expected.positions);
    }
}

#[test]
fn counts_are_deterministic_across_runs() {
    let dir = tempfile::tempdir().unwrap();
    let pgn = write_sample(&dir);

    let first = run_ingest(&pgn, &dir.path().join("a.db3"), 4, 64);
    let second = run_ingest(&pgn, &dir.path().join("b.db3"), 1, 8 * 1024 * 1024);
    assert_eq!(first.games, second.games);
    assert_eq!(first.errors, second.errors);
    assert_eq!(first.players, second.players);
    assert_eq!(first.events, second.events);
    assert_eq!(first.sites, second.sites);
    assert_eq!(first.positions, second.positions);
}

#[test]
fn bench_fetches_every_game() {
    let dir = tempfile::tempdir().unwrap();
    let pgn = write_sample(&dir);
    let db = dir.path().join("games.db3");
    let report = run_ingest(&pgn, &db, 2, 4096);

    let bench_report = bench(db.to_str().unwrap()).unwrap();
    assert_eq!(bench_report.queries, report.games);
    assert_eq!(bench_report.rows, report.games);
    assert!(bench_report.throughput() > 0.0);

    let moves_report = bench_moves(db.to_str().unwrap()).unwrap();
    assert!(moves_report.queries > 0);
    assert!(moves_report.rows >= moves_report.queries);
}
