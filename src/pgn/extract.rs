//! Turns raw game text into [`GameRecord`]s.
//!
//! Tag pairs are parsed here; move text is replayed through shakmaty to
//! validate legality and to derive the Zobrist signature of every position
//! reached. A game whose moves fail validation partway through is still
//! recorded with the plies reached so far, it is never silently dropped once
//! its tags parse.

use shakmaty::fen::Fen;
use shakmaty::san::SanPlus;
use shakmaty::zobrist::{Zobrist64, ZobristHash};
use shakmaty::{CastlingMode, Chess, EnPassantMode, Position};

use crate::error::{Error, Result};
use crate::record::{GameRecord, GameResult};

/// Splits a boundary-safe unit into per-game byte spans. A new game begins at
/// a `[`-line that follows a blank line once move text has been seen. Content
/// before the first tag line (a malformed carry-over tail) is forwarded as its
/// own span so it surfaces as an extraction error instead of vanishing.
pub fn split_games(unit: &[u8]) -> Vec<&[u8]> {
    let mut games = Vec::new();
    let mut start: Option<usize> = None;
    let mut in_moves = false;
    let mut prev_blank = true;

    let mut i = 0;
    while i < unit.len() {
        let line_start = i;
        while i < unit.len() && unit[i] != b'\n' {
            i += 1;
        }
        let mut line_end = i;
        if i < unit.len() {
            i += 1;
        }
        if line_end > line_start && unit[line_end - 1] == b'\r' {
            line_end -= 1;
        }
        let line = &unit[line_start..line_end];

        if line.iter().all(u8::is_ascii_whitespace) {
            prev_blank = true;
            continue;
        }
        if line[0] == b'[' {
            match start {
                None => start = Some(line_start),
                Some(s) if in_moves && prev_blank => {
                    games.push(&unit[s..line_start]);
                    start = Some(line_start);
                    in_moves = false;
                }
                Some(_) => {}
            }
        } else {
            if start.is_none() {
                start = Some(line_start);
            }
            in_moves = true;
        }
        prev_blank = false;
    }
    if let Some(s) = start {
        games.push(&unit[s..]);
    }
    games
}

#[derive(Debug)]
pub struct Extracted<'a> {
    pub record: GameRecord,
    /// Zobrist signature of every position reached, in move order.
    pub hashes: &'a [u64],
    /// Why move validation broke off early, if it did; `record.ply_count`
    /// holds the plies that did validate.
    pub move_error: Option<Error>,
}

/// Per-worker extraction context. Owns the scratch buffers reused across all
/// games a worker processes; never shared between threads.
#[derive(Default)]
pub struct Extractor {
    hashes: Vec<u64>,
}

impl Extractor {
    pub fn new() -> Extractor {
        Extractor::default()
    }

    pub fn extract(&mut self, raw: &[u8]) -> Result<Extracted<'_>> {
        self.hashes.clear();

        let text = String::from_utf8_lossy(raw);
        let (tags, movetext) = split_sections(&text);

        let mut event = None;
        let mut white = None;
        let mut black = None;
        let mut site = None;
        let mut time_control = None;
        let mut date = None;
        let mut eco = None;
        let mut fen = None;
        let mut round = -1;
        let mut white_elo = 0;
        let mut black_elo = 0;
        let mut result = GameResult::NoResult;

        for (key, value) in tags {
            match key {
                "Event" => event = Some(value),
                "White" => white = Some(value),
                "Black" => black = Some(value),
                "Site" => site = optional(value),
                "TimeControl" => time_control = optional(value),
                "Date" => date = optional(value),
                "ECO" => eco = optional(value),
                "FEN" => fen = optional(value),
                "Result" => result = GameResult::from_tag(&value),
                "WhiteElo" => white_elo = parse_elo(&value),
                "BlackElo" => black_elo = parse_elo(&value),
                "Round" => round = parse_round(&value),
                _ => {}
            }
        }

        let event = event.ok_or(Error::MissingTag("Event"))?;
        let white = white.ok_or(Error::MissingTag("White"))?;
        let black = black.ok_or(Error::MissingTag("Black"))?;

        let (ply_count, move_error) = self.replay(movetext, fen.as_deref());

        Ok(Extracted {
            record: GameRecord {
                event,
                white,
                black,
                site,
                time_control,
                date,
                eco,
                fen,
                round,
                white_elo,
                black_elo,
                ply_count,
                result,
                moves: movetext.to_string(),
            },
            hashes: &self.hashes,
            move_error,
        })
    }

    /// Replays the main line, pushing a position hash per validated ply.
    /// Returns the plies applied and the validation failure, if any.
    fn replay(&mut self, movetext: &str, fen: Option<&str>) -> (u32, Option<Error>) {
        let mut pos = match fen {
            None => Chess::default(),
            Some(fen) => match start_position(fen) {
                Some(pos) => pos,
                None => return (0, Some(Error::InvalidFen(fen.to_string()))),
            },
        };

        let bytes = movetext.as_bytes();
        let len = bytes.len();
        let mut i = 0;
        let mut depth = 0usize;
        let mut plies = 0u32;

        while i < len {
            match bytes[i] {
                b' ' | b'\t' | b'\r' | b'\n' => i += 1,
                b'{' => {
                    while i < len && bytes[i] != b'}' {
                        i += 1;
                    }
                    i += 1;
                }
                b';' => {
                    while i < len && bytes[i] != b'\n' {
                        i += 1;
                    }
                }
                b'(' => {
                    depth += 1;
                    i += 1;
                }
                b')' => {
                    depth = depth.saturating_sub(1);
                    i += 1;
                }
                b'$' => {
                    i += 1;
                    while i < len && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                b'*' => break,
                _ => {
                    let start = i;
                    while i < len
                        && !bytes[i].is_ascii_whitespace()
                        && !matches!(bytes[i], b'{' | b'(' | b')' | b';')
                    {
                        i += 1;
                    }
                    if depth > 0 {
                        continue; // main line only
                    }
                    let token = &bytes[start..i];
                    if token == b"1-0" || token == b"0-1" || token == b"1/2-1/2" {
                        break;
                    }
                    let san = trim_annotations(strip_move_number(token));
                    if san.is_empty() {
                        continue;
                    }
                    let illegal = |plies: u32| Error::IllegalMove {
                        san: String::from_utf8_lossy(san).into_owned(),
                        ply: plies + 1,
                    };
                    let parsed = match SanPlus::from_ascii(san) {
                        Ok(parsed) => parsed,
                        Err(_) => return (plies, Some(illegal(plies))),
                    };
                    let m = match parsed.san.to_move(&pos) {
                        Ok(m) => m,
                        Err(_) => return (plies, Some(illegal(plies))),
                    };
                    pos.play_unchecked(&m);
                    plies += 1;
                    self.hashes
                        .push(pos.zobrist_hash::<Zobrist64>(EnPassantMode::Legal).0);
                }
            }
        }
        (plies, None)
    }
}

fn start_position(fen: &str) -> Option<Chess> {
    Fen::from_ascii(fen.as_bytes())
        .ok()?
        .into_position(CastlingMode::Chess960)
        .ok()
}

/// Strips a leading move number ("12." / "5...") off a token; tokens that are
/// nothing but a move number yield an empty remainder.
fn strip_move_number(token: &[u8]) -> &[u8] {
    if !token[0].is_ascii_digit() {
        return token;
    }
    let mut k = 0;
    while k < token.len() && token[k].is_ascii_digit() {
        k += 1;
    }
    while k < token.len() && token[k] == b'.' {
        k += 1;
    }
    &token[k..]
}

fn trim_annotations(token: &[u8]) -> &[u8] {
    let mut end = token.len();
    while end > 0 && matches!(token[end - 1], b'!' | b'?') {
        end -= 1;
    }
    &token[..end]
}

fn optional(value: String) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed == "?" {
        None
    } else {
        Some(value)
    }
}

fn parse_elo(value: &str) -> i32 {
    btoi::btoi(value.trim().as_bytes()).unwrap_or(0)
}

fn parse_round(value: &str) -> i32 {
    let digits = value.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return -1;
    }
    btoi::btoi(&value.as_bytes()[..digits]).unwrap_or(-1)
}

/// Separates the leading tag block from the move text.
fn split_sections(text: &str) -> (Vec<(&str, String)>, &str) {
    let mut tags = Vec::new();
    let len = text.len();
    let mut i = 0;
    while i < len {
        let end = text[i..].find('\n').map(|p| i + p).unwrap_or(len);
        let line = text[i..end].trim_end_matches('\r').trim();
        if line.is_empty() {
            i = end + 1;
            continue;
        }
        if !line.starts_with('[') {
            return (tags, text[i..].trim());
        }
        if let Some(tag) = parse_tag(line) {
            tags.push(tag);
        }
        i = end + 1;
    }
    (tags, "")
}

/// Parses one `[Key "Value"]` line, honoring backslash escapes in the value.
fn parse_tag(line: &str) -> Option<(&str, String)> {
    let inner = line.strip_prefix('[')?;
    let (key, rest) = inner.split_once(char::is_whitespace)?;
    let rest = rest.trim_start().strip_prefix('"')?;
    let mut value = String::new();
    let mut chars = rest.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    value.push(escaped);
                }
            }
            '"' => return Some((key, value)),
            _ => value.push(c),
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const GAME: &str = "[Event \"World Championship\"]\n\
                        [Site \"London\"]\n\
                        [Date \"2023.04.09\"]\n\
                        [Round \"5\"]\n\
                        [White \"Carlsen, Magnus\"]\n\
                        [Black \"Caruana, Fabiano\"]\n\
                        [Result \"1-0\"]\n\
                        [WhiteElo \"2850\"]\n\
                        [BlackElo \"2800\"]\n\
                        [ECO \"C50\"]\n\
                        \n\
                        1. e4 e5 2. Nf3 Nc6 3. Bc4 Bc5 1-0\n";

    #[test]
    fn extracts_full_record() {
        let mut extractor = Extractor::new();
        let game = extractor.extract(GAME.as_bytes()).unwrap();
        assert_eq!(game.record.event, "World Championship");
        assert_eq!(game.record.white, "Carlsen, Magnus");
        assert_eq!(game.record.black, "Caruana, Fabiano");
        assert_eq!(game.record.site.as_deref(), Some("London"));
        assert_eq!(game.record.eco.as_deref(), Some("C50"));
        assert_eq!(game.record.round, 5);
        assert_eq!(game.record.white_elo, 2850);
        assert_eq!(game.record.black_elo, 2800);
        assert_eq!(game.record.result, GameResult::WhiteWin);
        assert_eq!(game.record.ply_count, 6);
        assert_eq!(game.hashes.len(), 6);
        assert!(game.move_error.is_none());
    }

    #[test]
    fn missing_white_is_a_tag_error() {
        let text = "[Event \"Casual\"]\n[Black \"b\"]\n\n1. e4 *\n";
        let mut extractor = Extractor::new();
        match extractor.extract(text.as_bytes()) {
            Err(Error::MissingTag("White")) => {}
            other => panic!("expected missing tag error, got {other:?}"),
        }
    }

    #[test]
    fn illegal_move_keeps_valid_prefix() {
        let text = "[Event \"E\"]\n[White \"w\"]\n[Black \"b\"]\n\n\
                    1. e4 e5 2. Nf3 Nf3 3. Bc4 1-0\n";
        let mut extractor = Extractor::new();
        let game = extractor.extract(text.as_bytes()).unwrap();
        assert!(game.move_error.is_some());
        assert_eq!(game.record.ply_count, 2);
        assert_eq!(game.hashes.len(), 2);
    }

    #[test]
    fn comments_variations_and_nags_are_skipped() {
        let text = "[Event \"E\"]\n[White \"w\"]\n[Black \"b\"]\n\n\
                    1. e4 {king pawn} c5 $1 2. Nf3 (2. Nc3 Nc6 3. g3) 2... d6 0-1\n";
        let mut extractor = Extractor::new();
        let game = extractor.extract(text.as_bytes()).unwrap();
        assert!(game.move_error.is_none());
        assert_eq!(game.record.ply_count, 4);
    }

    #[test]
    fn fen_tag_sets_the_starting_position() {
        // Position after 1. e4; Black to move.
        let text = "[Event \"E\"]\n[White \"w\"]\n[Black \"b\"]\n\
                    [FEN \"rnbqkbnr/pppppppp/8/8/4P3/8/PPPP1PPP/RNBQKBNR b KQkq - 0 1\"]\n\n\
                    1... e5 2. Nf3 *\n";
        let mut extractor = Extractor::new();
        let game = extractor.extract(text.as_bytes()).unwrap();
        assert!(game.move_error.is_none());
        assert_eq!(game.record.ply_count, 2);
    }

    #[test]
    fn bad_fen_counts_as_move_error() {
        let text = "[Event \"E\"]\n[White \"w\"]\n[Black \"b\"]\n[FEN \"nonsense\"]\n\n1. e4 *\n";
        let mut extractor = Extractor::new();
        let game = extractor.extract(text.as_bytes()).unwrap();
        assert!(game.move_error.is_some());
        assert_eq!(game.record.ply_count, 0);
    }

    #[test]
    fn tag_values_unescape() {
        let line = r#"[Event "The \"Big\" One"]"#;
        let (key, value) = parse_tag(line).unwrap();
        assert_eq!(key, "Event");
        assert_eq!(value, "The \"Big\" One");
    }

    #[test]
    fn splits_unit_into_games() {
        let unit = format!("{GAME}\n{GAME}");
        let games = split_games(unit.as_bytes());
        assert_eq!(games.len(), 2);
        assert!(games[1].starts_with(b"[Event"));
    }

    #[test]
    fn orphan_movetext_is_forwarded_not_dropped() {
        let unit = b"e5 2. Nf3 Nc6 1-0\n\n[Event \"E\"]\n[White \"w\"]\n[Black \"b\"]\n\n1. e4 *\n";
        let games = split_games(unit);
        assert_eq!(games.len(), 2);
        let mut extractor = Extractor::new();
        assert!(extractor.extract(games[0]).is_err());
        assert!(extractor.extract(games[1]).is_ok());
    }
}
