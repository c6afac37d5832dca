extern crate core;

use std::collections::{HashMap, HashSet};
use std::fmt::{Debug, Formatter};
use std::fs;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use bit_set::BitSet;
use instant::{Duration, Instant};
use log::{debug, info};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use smallvec::{smallvec, SmallVec};
use thiserror::Error;

/// The conventional puzzle size: a 5x5 grid filled with five-letter words.
pub const WORD_LENGTH: usize = 5;

/// The expected maximum side length for a grid. Word squares get dramatically harder to fill
/// beyond this, so it's only used to size inline buffers, not enforced.
pub const MAX_GRID_SIZE: usize = 8;

/// The expected maximum number of cells in a grid.
pub const MAX_CELL_COUNT: usize = MAX_GRID_SIZE * MAX_GRID_SIZE;

/// How many times `generate_puzzle` restarts the search from scratch before giving up. Because
/// candidate order is randomized, a retry can succeed where the previous attempt bottomed out.
pub const MAX_RETRIES: usize = 10;

/// How many word placements a single search may try before it's declared hopeless. This bounds
/// runaway searches against pathological dictionaries; a well-stocked dictionary fills a 5x5
/// grid in a tiny fraction of this.
pub const MAX_PLACEMENTS: u64 = 500_000;

/// An identifier for a given word, based on its index in the Lexicon's `words` field.
pub type WordId = usize;

/// Direction that a line of the grid is read in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Across,
    Down,
}

/// Scrabble point value for a single letter; zero for anything that isn't an ASCII letter.
pub fn letter_points(letter: char) -> u32 {
    match letter.to_ascii_uppercase() {
        'A' | 'E' | 'I' | 'L' | 'N' | 'O' | 'R' | 'S' | 'T' | 'U' => 1,
        'D' | 'G' => 2,
        'B' | 'C' | 'M' | 'P' => 3,
        'F' | 'H' | 'V' | 'W' | 'Y' => 4,
        'K' => 5,
        'J' | 'X' => 8,
        'Q' | 'Z' => 10,
        _ => 0,
    }
}

/// Scrabble score for a whole word.
pub fn word_points(word: &str) -> u32 {
    word.chars().map(letter_points).sum()
}

/// A case-insensitive dictionary membership test, shared by every game mode. Minimum-length
/// gating is up to the caller.
pub struct WordSet {
    words: HashSet<String>,
}

impl WordSet {
    pub fn new<I, S>(words: I) -> WordSet
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        WordSet {
            words: words.into_iter().map(|w| w.as_ref().to_lowercase()).collect(),
        }
    }

    pub fn contains(&self, candidate: &str) -> bool {
        self.words.contains(&candidate.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// A struct representing a word that can be placed in the grid.
struct Word {
    string: String,
    letters: SmallVec<[char; MAX_GRID_SIZE]>,
}

/// The subset of a dictionary usable for one grid size, plus a per-position index from letter to
/// the words carrying that letter there. Built once; read-only during search, so it can be shared
/// across any number of generation calls.
pub struct Lexicon {
    length: usize,
    words: Vec<Word>,
    by_position: Vec<HashMap<char, Vec<WordId>>>,
}

impl Debug for Lexicon {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexicon")
            .field("length", &self.length)
            .field("words", &(["(", &self.words.len().to_string(), " entries)"].join("")))
            .finish()
    }
}

impl Lexicon {
    /// Build a lexicon from a flat word list, keeping only entries of exactly `length` letters,
    /// uppercased and deduplicated. Input order is preserved, so one build is deterministic.
    pub fn new<I, S>(word_list: I, length: usize) -> Lexicon
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: HashSet<String> = HashSet::new();
        let mut words: Vec<Word> = vec![];

        for raw in word_list {
            let word = raw.as_ref().trim().to_uppercase();
            if word.chars().count() != length || !seen.insert(word.clone()) {
                continue;
            }
            let letters = word.chars().collect();
            words.push(Word { string: word, letters });
        }

        let mut by_position: Vec<HashMap<char, Vec<WordId>>> =
            (0..length).map(|_| HashMap::new()).collect();

        for (word_id, word) in words.iter().enumerate() {
            for (pos, &letter) in word.letters.iter().enumerate() {
                by_position[pos].entry(letter).or_insert_with(Vec::new).push(word_id);
            }
        }

        debug!("indexed {} {}-letter words", words.len(), length);

        Lexicon { length, words, by_position }
    }

    /// The word length this lexicon was built for, which is also the grid side length.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, word_id: WordId) -> &str {
        &self.words[word_id].string
    }

    fn word_letters(&self, word_id: WordId) -> &[char] {
        &self.words[word_id].letters
    }

    /// All words with the given letter at the given position, in dictionary order.
    fn words_with_letter_at(&self, pos: usize, letter: char) -> &[WordId] {
        self.by_position[pos].get(&letter).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All words consistent with the already-placed letters of the given line, in dictionary
    /// order. A line with no fixed letters matches the whole lexicon. We seed the scan from the
    /// fixed cell with the smallest index bucket, then verify the rest of the fixed cells.
    pub fn candidates(&self, grid: &Grid, dir: Direction, index: usize) -> Vec<WordId> {
        let fixed: SmallVec<[(usize, char); MAX_GRID_SIZE]> = (0..self.length)
            .filter_map(|cell_idx| {
                grid.line_cell(dir, index, cell_idx).map(|letter| (cell_idx, letter))
            })
            .collect();

        let seed = fixed
            .iter()
            .min_by_key(|&&(pos, letter)| self.words_with_letter_at(pos, letter).len());

        match seed {
            None => (0..self.words.len()).collect(),
            Some(&(seed_pos, seed_letter)) => self
                .words_with_letter_at(seed_pos, seed_letter)
                .iter()
                .copied()
                .filter(|&word_id| {
                    let letters = self.word_letters(word_id);
                    fixed.iter().all(|&(pos, letter)| letters[pos] == letter)
                })
                .collect(),
        }
    }
}

/// A square grid of cells, each empty or holding one uppercase letter.
#[derive(Clone)]
pub struct Grid {
    size: usize,
    cells: SmallVec<[Option<char>; MAX_CELL_COUNT]>,
}

impl Grid {
    pub fn empty(size: usize) -> Grid {
        Grid { size, cells: smallvec![None; size * size] }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn get(&self, row: usize, col: usize) -> Option<char> {
        self.cells[row * self.size + col]
    }

    fn set(&mut self, row: usize, col: usize, letter: char) {
        self.cells[row * self.size + col] = Some(letter);
    }

    fn clear(&mut self, row: usize, col: usize) {
        self.cells[row * self.size + col] = None;
    }

    /// The cell at offset `cell_idx` along the given line: rows are read left to right, columns
    /// top to bottom.
    fn line_cell(&self, dir: Direction, index: usize, cell_idx: usize) -> Option<char> {
        match dir {
            Direction::Across => self.get(index, cell_idx),
            Direction::Down => self.get(cell_idx, index),
        }
    }

    /// Turn the grid into a rendered string, with `.` for empty cells.
    pub fn render(&self) -> String {
        (0..self.size)
            .map(|row| {
                (0..self.size)
                    .map(|col| self.get(row, col).unwrap_or('.'))
                    .collect::<String>()
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

impl Debug for Grid {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Grid({}x{})\n{}", self.size, self.size, self.render())
    }
}

/// A struct tracking statistics about the search process.
#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub states: u64,
    pub backtracks: u64,
    pub retries: u64,
    pub duration: Duration,
}

/// A struct representing the results of a successful fill: a complete grid where every row and
/// every column is a distinct dictionary word.
#[derive(Debug)]
pub struct FillSuccess {
    pub statistics: Statistics,
    pub grid: Grid,
    pub across_words: Vec<WordId>,
    pub down_words: Vec<WordId>,
}

#[derive(Debug, Error)]
pub enum FillFailure {
    #[error("search space exhausted without completing the grid")]
    Exhausted,
    #[error("gave up after {0} word placements")]
    PlacementLimitReached(u64),
}

/// The live state of one in-progress search. Exclusively owned by that search; the lexicon is
/// the only thing shared between searches.
struct FillState {
    grid: Grid,
    filled_rows: BitSet,
    filled_cols: BitSet,
    used_words: HashSet<WordId>,
    across_words: Vec<Option<WordId>>,
    down_words: Vec<Option<WordId>>,
}

impl FillState {
    fn empty(size: usize) -> FillState {
        FillState {
            grid: Grid::empty(size),
            filled_rows: BitSet::with_capacity(size),
            filled_cols: BitSet::with_capacity(size),
            used_words: HashSet::new(),
            across_words: vec![None; size],
            down_words: vec![None; size],
        }
    }

    fn is_complete(&self, size: usize) -> bool {
        self.filled_rows.len() == size && self.filled_cols.len() == size
    }
}

struct Searcher<'a, R: Rng> {
    lexicon: &'a Lexicon,
    rng: &'a mut R,
    state: FillState,
    statistics: Statistics,
    placements: u64,
    placement_limit: u64,
    hit_limit: bool,
}

impl<'a, R: Rng> Searcher<'a, R> {
    fn new(lexicon: &'a Lexicon, rng: &'a mut R) -> Searcher<'a, R> {
        Searcher {
            lexicon,
            rng,
            state: FillState::empty(lexicon.length()),
            statistics: Statistics::default(),
            placements: 0,
            placement_limit: MAX_PLACEMENTS,
            hit_limit: false,
        }
    }

    /// Candidates for the given line that aren't already committed to another slot.
    fn available_candidates(&self, dir: Direction, index: usize) -> Vec<WordId> {
        self.lexicon
            .candidates(&self.state.grid, dir, index)
            .into_iter()
            .filter(|word_id| !self.state.used_words.contains(word_id))
            .collect()
    }

    /// Does every unfilled row and column still have at least one unused candidate? This is a
    /// necessary condition, not a sufficient one: surviving candidates can still conflict with
    /// each other deeper in the search, so the caller must still backtrack on deeper failures.
    /// It exists purely to cut off hopeless branches early.
    fn has_viable_continuation(&self) -> bool {
        let size = self.lexicon.length();

        for row in 0..size {
            if !self.state.filled_rows.contains(row)
                && !self.has_unused_candidate(Direction::Across, row)
            {
                return false;
            }
        }

        for col in 0..size {
            if !self.state.filled_cols.contains(col)
                && !self.has_unused_candidate(Direction::Down, col)
            {
                return false;
            }
        }

        true
    }

    fn has_unused_candidate(&self, dir: Direction, index: usize) -> bool {
        self.lexicon
            .candidates(&self.state.grid, dir, index)
            .iter()
            .any(|word_id| !self.state.used_words.contains(word_id))
    }

    /// Write the word's letters along the line and commit it to the slot.
    fn place(&mut self, dir: Direction, index: usize, word_id: WordId) {
        for (cell_idx, &letter) in self.lexicon.word_letters(word_id).iter().enumerate() {
            match dir {
                Direction::Across => self.state.grid.set(index, cell_idx, letter),
                Direction::Down => self.state.grid.set(cell_idx, index, letter),
            }
        }

        match dir {
            Direction::Across => {
                self.state.filled_rows.insert(index);
                self.state.across_words[index] = Some(word_id);
            }
            Direction::Down => {
                self.state.filled_cols.insert(index);
                self.state.down_words[index] = Some(word_id);
            }
        }

        self.state.used_words.insert(word_id);
    }

    /// Undo exactly one placement. A cell is only cleared if no filled perpendicular line pins
    /// it; clearing a pinned cell would corrupt the crossing slot's committed word.
    fn unplace(&mut self, dir: Direction, index: usize, word_id: WordId) {
        let size = self.lexicon.length();

        match dir {
            Direction::Across => {
                for col in 0..size {
                    if !self.state.filled_cols.contains(col) {
                        self.state.grid.clear(index, col);
                    }
                }
                self.state.filled_rows.remove(index);
                self.state.across_words[index] = None;
            }
            Direction::Down => {
                for row in 0..size {
                    if !self.state.filled_rows.contains(row) {
                        self.state.grid.clear(row, index);
                    }
                }
                self.state.filled_cols.remove(index);
                self.state.down_words[index] = None;
            }
        }

        self.state.used_words.remove(&word_id);
    }

    /// Alternating backtracking: place a row word, then a column word, then a row word, and so
    /// on. Even steps target row `step / 2`, odd steps target column `step / 2`. Candidate order
    /// is shuffled per call, which is the only randomness in the algorithm and the reason
    /// repeated runs against the same dictionary yield different grids.
    fn fill(&mut self, step: usize) -> bool {
        let size = self.lexicon.length();

        if self.state.is_complete(size) {
            return true;
        }
        if step >= 2 * size {
            return false;
        }

        let is_row_step = step % 2 == 0;
        let index = step / 2;
        let (dir, already_filled) = if is_row_step {
            (Direction::Across, self.state.filled_rows.contains(index))
        } else {
            (Direction::Down, self.state.filled_cols.contains(index))
        };

        // Both axes interleave, so this is a guard against double-processing a slot; each slot
        // is normally reached exactly once.
        if already_filled {
            return self.fill(step + 1);
        }

        self.statistics.states += 1;

        let mut options = self.available_candidates(dir, index);
        options.shuffle(self.rng);

        for word_id in options {
            self.placements += 1;
            if self.placements >= self.placement_limit {
                self.hit_limit = true;
                return false;
            }

            self.place(dir, index, word_id);

            if self.has_viable_continuation() && self.fill(step + 1) {
                return true;
            }

            self.unplace(dir, index, word_id);
            self.statistics.backtracks += 1;

            if self.hit_limit {
                return false;
            }
        }

        false
    }
}

/// Search for a complete word square over the given lexicon. The lexicon is read-only and may be
/// shared; everything mutable is owned by this one call.
pub fn find_fill<R: Rng>(lexicon: &Lexicon, rng: &mut R) -> Result<FillSuccess, FillFailure> {
    let start = Instant::now();
    let mut searcher = Searcher::new(lexicon, rng);

    let solved = searcher.fill(0);
    searcher.statistics.duration = start.elapsed();

    if !solved {
        return Err(if searcher.hit_limit {
            FillFailure::PlacementLimitReached(searcher.placements)
        } else {
            FillFailure::Exhausted
        });
    }

    debug!(
        "filled {}x{} grid in {:?} ({} states, {} backtracks)",
        lexicon.length(),
        lexicon.length(),
        searcher.statistics.duration,
        searcher.statistics.states,
        searcher.statistics.backtracks,
    );

    let across_words =
        searcher.state.across_words.iter().map(|w| w.expect("complete grid")).collect();
    let down_words = searcher.state.down_words.iter().map(|w| w.expect("complete grid")).collect();

    Ok(FillSuccess {
        statistics: searcher.statistics,
        grid: searcher.state.grid,
        across_words,
        down_words,
    })
}

/// A finished puzzle. The serialized shape matches the corpus JSON consumed by the game modes:
/// camelCase keys and a grid of single-uppercase-letter strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Puzzle {
    pub id: u32,
    pub date: String,
    pub grid: Vec<Vec<char>>,
    pub horizontal_words: Vec<String>,
    pub vertical_words: Vec<String>,
    pub total_score: u32,
}

impl Puzzle {
    /// Flatten the grid into the tile deck handed to the game modes, row by row.
    pub fn deck(&self) -> Vec<char> {
        self.grid.iter().flatten().copied().collect()
    }

    /// Re-derive the total score from the grid. Matches `total_score` for any well-formed record.
    pub fn recompute_score(&self) -> u32 {
        self.grid.iter().flatten().map(|&letter| letter_points(letter)).sum()
    }
}

/// A struct representing the results of a generation call.
#[derive(Debug)]
pub struct GenerateSuccess {
    pub puzzle: Puzzle,
    pub statistics: Statistics,
}

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("no puzzle found after {attempts} attempt(s)")]
    NoPuzzle { attempts: usize },
}

/// Generate one puzzle with the default retry budget.
pub fn generate_puzzle<R: Rng>(
    lexicon: &Lexicon,
    rng: &mut R,
    id: u32,
    date: &str,
) -> Result<GenerateSuccess, GenerateError> {
    generate_puzzle_with_retries(lexicon, rng, id, date, MAX_RETRIES)
}

/// Generate one puzzle, restarting the search from scratch up to `max_retries` times. Restarts
/// can succeed where earlier attempts failed because candidate order is randomized. Exhaustion
/// is an expected outcome of a combinatorial search, reported as an ordinary error value.
pub fn generate_puzzle_with_retries<R: Rng>(
    lexicon: &Lexicon,
    rng: &mut R,
    id: u32,
    date: &str,
    max_retries: usize,
) -> Result<GenerateSuccess, GenerateError> {
    let mut statistics = Statistics::default();

    for attempt in 0..max_retries {
        match find_fill(lexicon, rng) {
            Ok(success) => {
                statistics.states += success.statistics.states;
                statistics.backtracks += success.statistics.backtracks;
                statistics.duration += success.statistics.duration;
                statistics.retries = attempt as u64;

                let puzzle = assemble_puzzle(lexicon, &success, id, date);
                return Ok(GenerateSuccess { puzzle, statistics });
            }
            Err(failure) => {
                debug!("fill attempt {} failed: {}", attempt + 1, failure);
            }
        }
    }

    Err(GenerateError::NoPuzzle { attempts: max_retries })
}

/// Package a successful fill into an immutable puzzle record, scoring every cell with the
/// letter point table.
fn assemble_puzzle(lexicon: &Lexicon, fill: &FillSuccess, id: u32, date: &str) -> Puzzle {
    let size = lexicon.length();

    let grid: Vec<Vec<char>> = (0..size)
        .map(|row| {
            (0..size)
                .map(|col| fill.grid.get(row, col).expect("complete grid"))
                .collect()
        })
        .collect();

    let total_score = grid.iter().flatten().map(|&letter| letter_points(letter)).sum();

    Puzzle {
        id,
        date: date.to_string(),
        grid,
        horizontal_words: fill
            .across_words
            .iter()
            .map(|&w| lexicon.word(w).to_string())
            .collect(),
        vertical_words: fill.down_words.iter().map(|&w| lexicon.word(w).to_string()).collect(),
        total_score,
    }
}

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("failed to read corpus file: {0}")]
    Io(#[from] std::io::Error),
    #[error("corpus is not a valid puzzle array: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A pre-generated collection of puzzles, used for instant random/daily selection without live
/// generation.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    puzzles: Vec<Puzzle>,
}

impl Corpus {
    pub fn new(puzzles: Vec<Puzzle>) -> Corpus {
        Corpus { puzzles }
    }

    pub fn from_json(json: &str) -> Result<Corpus, CorpusError> {
        let puzzles: Vec<Puzzle> = serde_json::from_str(json)?;
        Ok(Corpus { puzzles })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Corpus, CorpusError> {
        Corpus::from_json(&fs::read_to_string(path)?)
    }

    pub fn to_json(&self) -> Result<String, CorpusError> {
        Ok(serde_json::to_string_pretty(&self.puzzles)?)
    }

    pub fn len(&self) -> usize {
        self.puzzles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.puzzles.is_empty()
    }

    pub fn puzzles(&self) -> &[Puzzle] {
        &self.puzzles
    }

    /// A uniformly random puzzle, or None if the corpus is empty.
    pub fn random<R: Rng>(&self, rng: &mut R) -> Option<&Puzzle> {
        self.puzzles.choose(rng)
    }

    /// The puzzle for the given day number. Stable for a whole calendar day and cycles through
    /// the corpus with period equal to its size as days pass.
    pub fn daily_for_day(&self, days_since_epoch: u64) -> Option<&Puzzle> {
        if self.puzzles.is_empty() {
            return None;
        }
        let daily_index = (days_since_epoch % self.puzzles.len() as u64) as usize;
        self.puzzles.get(daily_index)
    }

    /// Today's puzzle, based on the system clock.
    pub fn daily(&self) -> Option<&Puzzle> {
        let puzzle = self.daily_for_day(days_since_unix_epoch());
        if let Some(puzzle) = puzzle {
            info!("selected daily puzzle #{} ({})", puzzle.id, puzzle.date);
        }
        puzzle
    }

    pub fn by_id(&self, id: u32) -> Option<&Puzzle> {
        self.puzzles.iter().find(|puzzle| puzzle.id == id)
    }
}

/// A random puzzle from the corpus, falling back to live generation when the corpus is empty or
/// missing. Live puzzles get id 0 and today's date, like any other transient record.
pub fn random_or_generate<R: Rng>(
    corpus: &Corpus,
    lexicon: &Lexicon,
    rng: &mut R,
) -> Option<Puzzle> {
    if let Some(puzzle) = corpus.random(rng) {
        info!("selected pre-generated puzzle #{} ({})", puzzle.id, puzzle.date);
        return Some(puzzle.clone());
    }

    info!("corpus unavailable, generating a live puzzle");
    let date = format_date(days_since_unix_epoch() as i64);
    generate_puzzle(lexicon, rng, 0, &date).ok().map(|success| success.puzzle)
}

/// Whole days elapsed since the Unix epoch, per the system clock.
pub fn days_since_unix_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_secs() / 86_400)
        .unwrap_or(0)
}

/// Format a day number (days since 1970-01-01, possibly negative) as YYYY-MM-DD. Uses the
/// standard civil-from-days conversion over the proleptic Gregorian calendar.
pub fn format_date(days_since_epoch: i64) -> String {
    let z = days_since_epoch + 719_468;
    let era = if z >= 0 { z } else { z - 146_096 } / 146_097;
    let doe = (z - era * 146_097) as u64;
    let yoe = (doe - doe / 1_460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    let mp = (5 * doy + 2) / 153;
    let day = doy - (153 * mp + 2) / 5 + 1;
    let month = if mp < 10 { mp + 3 } else { mp - 9 };
    let mut year = yoe as i64 + era * 400;
    if month <= 2 {
        year += 1;
    }

    format!("{:04}-{:02}-{:02}", year, month, day)
}

/// Parse a YYYY-MM-DD string into a day number, the inverse of `format_date`. Returns None for
/// anything that doesn't look like a date.
pub fn parse_date(date: &str) -> Option<i64> {
    let mut parts = date.split('-');
    let year: i64 = parts.next()?.parse().ok()?;
    let month: u64 = parts.next()?.parse().ok()?;
    let day: u64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || !(1..=12).contains(&month) || !(1..=31).contains(&day) {
        return None;
    }

    let adjusted_year = if month <= 2 { year - 1 } else { year };
    let era = if adjusted_year >= 0 { adjusted_year } else { adjusted_year - 399 } / 400;
    let yoe = (adjusted_year - era * 400) as u64;
    let mp = if month > 2 { month - 3 } else { month + 9 };
    let doy = (153 * mp + 2) / 5 + day - 1;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + doy;

    Some(era * 146_097 + doe as i64 - 719_468)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn lexicon(words: &[&str], length: usize) -> Lexicon {
        Lexicon::new(words.iter().copied(), length)
    }

    fn word_strings(lexicon: &Lexicon, ids: &[WordId]) -> Vec<String> {
        ids.iter().map(|&id| lexicon.word(id).to_string()).collect()
    }

    #[test]
    fn test_letter_points_table() {
        assert_eq!(letter_points('A'), 1);
        assert_eq!(letter_points('D'), 2);
        assert_eq!(letter_points('B'), 3);
        assert_eq!(letter_points('F'), 4);
        assert_eq!(letter_points('K'), 5);
        assert_eq!(letter_points('J'), 8);
        assert_eq!(letter_points('Q'), 10);
        assert_eq!(letter_points('z'), 10, "lowercase input maps to the same value");
        assert_eq!(letter_points('?'), 0);

        let alphabet_total: u32 = ('A'..='Z').map(letter_points).sum();
        assert_eq!(alphabet_total, 87, "standard tile table sums to 87");
    }

    #[test]
    fn test_word_points() {
        assert_eq!(word_points("QUIZ"), 22);
        assert_eq!(word_points("cat"), 5);
        assert_eq!(word_points(""), 0);
    }

    #[test]
    fn test_word_set_is_case_insensitive() {
        let words = WordSet::new(["Apple", "GRAPE"]);
        assert!(words.contains("apple"));
        assert!(words.contains("APPLE"));
        assert!(words.contains("grape"));
        assert!(!words.contains("lemon"));
        assert_eq!(words.len(), 2);
    }

    #[test]
    fn test_lexicon_filters_and_uppercases() {
        let lex = lexicon(&["cat", "dog", "horse", "CAT", "cow", "ox"], 3);

        assert_eq!(lex.len(), 3, "wrong lengths and duplicates are dropped");
        assert_eq!(lex.word(0), "CAT");
        assert_eq!(lex.word(1), "DOG");
        assert_eq!(lex.word(2), "COW");
    }

    #[test]
    fn test_lexicon_position_index() {
        let lex = lexicon(&["cat", "cut", "dog", "cot"], 3);

        assert_eq!(lex.words_with_letter_at(0, 'C'), &[0, 1, 3]);
        assert_eq!(lex.words_with_letter_at(2, 'T'), &[0, 1, 3]);
        assert_eq!(lex.words_with_letter_at(1, 'O'), &[2, 3]);
        assert!(lex.words_with_letter_at(1, 'Z').is_empty());
    }

    #[test]
    fn test_empty_lexicon_is_not_an_error() {
        let lex = lexicon(&[], 5);
        assert!(lex.is_empty());

        let grid = Grid::empty(5);
        assert!(lex.candidates(&grid, Direction::Across, 0).is_empty());
    }

    #[test]
    fn test_candidates_match_fixed_letters_exactly() {
        let lex = lexicon(&["cat", "cut", "dog"], 3);

        // Line "C_T": row 0 with C and T fixed.
        let mut grid = Grid::empty(3);
        grid.set(0, 0, 'C');
        grid.set(0, 2, 'T');

        let candidates = word_strings(&lex, &lex.candidates(&grid, Direction::Across, 0));
        assert_eq!(candidates, ["CAT", "CUT"]);

        grid.set(0, 1, 'A');
        let candidates = word_strings(&lex, &lex.candidates(&grid, Direction::Across, 0));
        assert_eq!(candidates, ["CAT"]);
    }

    #[test]
    fn test_candidates_for_unconstrained_line_return_whole_lexicon() {
        let lex = lexicon(&["cat", "cut", "dog"], 3);
        let grid = Grid::empty(3);

        assert_eq!(lex.candidates(&grid, Direction::Across, 1), [0, 1, 2]);
        assert_eq!(lex.candidates(&grid, Direction::Down, 2), [0, 1, 2]);
    }

    #[test]
    fn test_candidates_read_columns_top_to_bottom() {
        let lex = lexicon(&["cat", "cut", "dog", "dug"], 3);

        let mut grid = Grid::empty(3);
        grid.set(0, 1, 'D');
        grid.set(2, 1, 'G');

        let candidates = word_strings(&lex, &lex.candidates(&grid, Direction::Down, 1));
        assert_eq!(candidates, ["DOG", "DUG"]);
    }

    #[test]
    fn test_feasibility_rejects_line_with_no_unused_candidates() {
        let lex = lexicon(&["cat", "cut", "dog"], 3);
        let mut rng = StdRng::seed_from_u64(0);
        let mut searcher = Searcher::new(&lex, &mut rng);

        // Place DOG in row 0; column 0 now needs a word starting with D, which doesn't exist.
        searcher.place(Direction::Across, 0, 2);
        assert!(!searcher.has_viable_continuation());

        searcher.unplace(Direction::Across, 0, 2);
        assert!(searcher.has_viable_continuation());
    }

    #[test]
    fn test_feasibility_accounts_for_used_words() {
        // Both CAT and COT start with C, but once CAT is committed to row 0 it can't also serve
        // as the column 0 word; COT remains, so the state is still viable.
        let lex = lexicon(&["cat", "cot", "ate", "tot"], 3);
        let mut rng = StdRng::seed_from_u64(0);
        let mut searcher = Searcher::new(&lex, &mut rng);

        searcher.place(Direction::Across, 0, 0);
        assert!(searcher.has_unused_candidate(Direction::Down, 0));
        assert!(!searcher.available_candidates(Direction::Down, 0).contains(&0));
    }

    #[test]
    fn test_unplace_preserves_cells_pinned_by_crossing_lines() {
        let lex = lexicon(&["cat", "cot", "ate", "tot"], 3);
        let mut rng = StdRng::seed_from_u64(0);
        let mut searcher = Searcher::new(&lex, &mut rng);

        searcher.place(Direction::Across, 0, 0); // CAT in row 0
        searcher.place(Direction::Down, 0, 1); // COT in column 0

        // Undoing the column must leave row 0 intact but clear the rest of the column.
        searcher.unplace(Direction::Down, 0, 1);
        assert_eq!(searcher.state.grid.get(0, 0), Some('C'));
        assert_eq!(searcher.state.grid.get(0, 1), Some('A'));
        assert_eq!(searcher.state.grid.get(1, 0), None);
        assert_eq!(searcher.state.grid.get(2, 0), None);

        // And undoing the row in turn empties the grid completely.
        searcher.unplace(Direction::Across, 0, 0);
        assert!(searcher.state.grid.render().chars().all(|c| c == '.' || c == '\n'));
        assert!(searcher.state.used_words.is_empty());
    }

    /// LACK IRON MERE BAKE across, LIMB AREA CORK KNEE down: the classic 4x4 double word square,
    /// with all eight words distinct.
    const DOUBLE_SQUARE_WORDS: [&str; 10] =
        ["lack", "iron", "mere", "bake", "limb", "area", "cork", "knee", "tide", "army"];

    #[test]
    fn test_find_fill_for_4x4_double_square() {
        let lex = lexicon(&DOUBLE_SQUARE_WORDS, 4);
        let mut rng = StdRng::seed_from_u64(7);

        let result = find_fill(&lex, &mut rng).expect("failed to find a fill");

        let across = word_strings(&lex, &result.across_words);
        let down = word_strings(&lex, &result.down_words);
        let words = WordSet::new(DOUBLE_SQUARE_WORDS);

        for word in across.iter().chain(&down) {
            assert!(words.contains(word), "{} is not in the dictionary", word);
        }

        let mut all_words: Vec<&String> = across.iter().chain(&down).collect();
        all_words.sort();
        all_words.dedup();
        assert_eq!(all_words.len(), 8, "no word is reused between rows and columns");

        // The grid agrees with the word lists on every cell.
        for row in 0..4 {
            for col in 0..4 {
                let cell = result.grid.get(row, col).expect("complete grid");
                assert_eq!(across[row].chars().nth(col), Some(cell));
                assert_eq!(down[col].chars().nth(row), Some(cell));
            }
        }
    }

    #[test]
    fn test_find_fill_for_2x2_square() {
        let lex = lexicon(&["as", "no", "an", "so"], 2);
        let mut rng = StdRng::seed_from_u64(1);

        let result = find_fill(&lex, &mut rng).expect("failed to find a fill");

        let mut all_words = word_strings(&lex, &result.across_words);
        all_words.extend(word_strings(&lex, &result.down_words));
        all_words.sort();
        all_words.dedup();
        assert_eq!(all_words.len(), 4);
    }

    #[test]
    fn test_fill_fails_gracefully_with_too_few_words() {
        // Completeness needs at least N distinct words for the rows alone, so a 3-word lexicon
        // can never fill a 5x5 grid.
        let lex = lexicon(&["apple", "grape", "lemon"], 5);
        let mut rng = StdRng::seed_from_u64(0);

        find_fill(&lex, &mut rng).expect_err("found an impossible fill??");
    }

    #[test]
    fn test_fill_fails_on_empty_lexicon() {
        let lex = lexicon(&[], 5);
        let mut rng = StdRng::seed_from_u64(0);

        assert!(matches!(find_fill(&lex, &mut rng), Err(FillFailure::Exhausted)));
    }

    #[test]
    fn test_generate_puzzle_end_to_end() {
        let lex = lexicon(&DOUBLE_SQUARE_WORDS, 4);
        let mut rng = StdRng::seed_from_u64(42);

        let success =
            generate_puzzle(&lex, &mut rng, 3, "2024-01-03").expect("failed to generate a puzzle");
        let puzzle = success.puzzle;

        assert_eq!(puzzle.id, 3);
        assert_eq!(puzzle.date, "2024-01-03");
        assert_eq!(puzzle.grid.len(), 4);
        assert!(puzzle.grid.iter().all(|row| row.len() == 4));
        assert_eq!(puzzle.horizontal_words.len(), 4);
        assert_eq!(puzzle.vertical_words.len(), 4);
        assert_eq!(puzzle.total_score, puzzle.recompute_score());
        assert_eq!(puzzle.deck().len(), 16);
    }

    #[test]
    fn test_generate_puzzle_is_deterministic_for_a_fixed_seed() {
        let lex = lexicon(&DOUBLE_SQUARE_WORDS, 4);

        let first = generate_puzzle(&lex, &mut StdRng::seed_from_u64(99), 1, "2024-01-01")
            .expect("failed to generate a puzzle");
        let second = generate_puzzle(&lex, &mut StdRng::seed_from_u64(99), 1, "2024-01-01")
            .expect("failed to generate a puzzle");

        assert_eq!(first.puzzle, second.puzzle);
    }

    #[test]
    fn test_generate_puzzle_reports_exhaustion() {
        let lex = lexicon(&["apple", "grape", "lemon"], 5);
        let mut rng = StdRng::seed_from_u64(0);

        let err = generate_puzzle_with_retries(&lex, &mut rng, 1, "2024-01-01", 3)
            .expect_err("generated a puzzle from a 3-word lexicon??");
        assert!(matches!(err, GenerateError::NoPuzzle { attempts: 3 }));
    }

    #[test]
    fn test_puzzle_json_shape() {
        let puzzle = Puzzle {
            id: 1,
            date: "2024-01-01".to_string(),
            grid: vec![vec!['A', 'S'], vec!['N', 'O']],
            horizontal_words: vec!["AS".to_string(), "NO".to_string()],
            vertical_words: vec!["AN".to_string(), "SO".to_string()],
            total_score: 4,
        };

        let value = serde_json::to_value(&puzzle).expect("failed to serialize");
        assert_eq!(value["id"], 1);
        assert_eq!(value["date"], "2024-01-01");
        assert_eq!(value["grid"][0][0], "A", "grid cells serialize as one-letter strings");
        assert_eq!(value["horizontalWords"][1], "NO");
        assert_eq!(value["verticalWords"][0], "AN");
        assert_eq!(value["totalScore"], 4);

        let parsed: Puzzle = serde_json::from_value(value).expect("failed to deserialize");
        assert_eq!(parsed, puzzle);
    }

    fn sample_corpus() -> Corpus {
        let puzzles = (1..=3)
            .map(|id| Puzzle {
                id,
                date: format!("2024-01-{:02}", id),
                grid: vec![vec!['A', 'S'], vec!['N', 'O']],
                horizontal_words: vec!["AS".to_string(), "NO".to_string()],
                vertical_words: vec!["AN".to_string(), "SO".to_string()],
                total_score: 4,
            })
            .collect();
        Corpus::new(puzzles)
    }

    #[test]
    fn test_corpus_round_trips_through_json() {
        let corpus = sample_corpus();
        let json = corpus.to_json().expect("failed to serialize corpus");
        let reloaded = Corpus::from_json(&json).expect("failed to reload corpus");

        assert_eq!(reloaded.puzzles(), corpus.puzzles());
    }

    #[test]
    fn test_malformed_corpus_is_an_error_not_a_panic() {
        assert!(matches!(
            Corpus::from_json("{\"not\": \"an array\"}"),
            Err(CorpusError::Malformed(_))
        ));
        assert!(matches!(Corpus::load("/nonexistent/corpus.json"), Err(CorpusError::Io(_))));
    }

    #[test]
    fn test_corpus_lookup_by_id() {
        let corpus = sample_corpus();
        assert_eq!(corpus.by_id(2).map(|p| p.date.as_str()), Some("2024-01-02"));
        assert!(corpus.by_id(17).is_none());
    }

    #[test]
    fn test_daily_selection_is_stable_and_cycles() {
        let corpus = sample_corpus();
        let len = corpus.len() as u64;

        for day in 0..10 {
            let today = corpus.daily_for_day(day).expect("non-empty corpus");
            assert_eq!(corpus.daily_for_day(day), Some(today), "same day, same puzzle");
            assert_eq!(corpus.daily_for_day(day + len), Some(today), "cycles with corpus size");
        }

        assert_ne!(corpus.daily_for_day(0), corpus.daily_for_day(1));
    }

    #[test]
    fn test_empty_corpus_selection_degrades_to_none() {
        let corpus = Corpus::default();
        let mut rng = StdRng::seed_from_u64(0);

        assert!(corpus.daily_for_day(123).is_none());
        assert!(corpus.random(&mut rng).is_none());
        assert!(corpus.by_id(1).is_none());
    }

    #[test]
    fn test_random_selection_returns_a_corpus_member() {
        let corpus = sample_corpus();
        let mut rng = StdRng::seed_from_u64(5);

        for _ in 0..20 {
            let puzzle = corpus.random(&mut rng).expect("non-empty corpus");
            assert!(corpus.puzzles().contains(puzzle));
        }
    }

    #[test]
    fn test_random_or_generate_falls_back_to_live_generation() {
        let lex = lexicon(&DOUBLE_SQUARE_WORDS, 4);
        let mut rng = StdRng::seed_from_u64(11);

        let puzzle = random_or_generate(&Corpus::default(), &lex, &mut rng)
            .expect("fallback generation failed");
        assert_eq!(puzzle.id, 0, "live puzzles are transient records");
        assert_eq!(puzzle.total_score, puzzle.recompute_score());
    }

    #[test]
    fn test_date_conversions() {
        assert_eq!(format_date(0), "1970-01-01");
        assert_eq!(format_date(19_723), "2024-01-01");
        assert_eq!(format_date(19_753), "2024-01-31");

        assert_eq!(parse_date("1970-01-01"), Some(0));
        assert_eq!(parse_date("2024-01-01"), Some(19_723));
        assert_eq!(parse_date("2024-13-01"), None);
        assert_eq!(parse_date("not a date"), None);

        for days in [0, 59, 365, 19_723, 20_000] {
            assert_eq!(parse_date(&format_date(days)), Some(days));
        }
    }
}
