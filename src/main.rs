use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context};
use clap::Parser;
use instant::Instant;
use log::{info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;

use wordgrid::{format_date, generate_puzzle, parse_date, Corpus, Lexicon, Puzzle, WORD_LENGTH};

/// How many failed generations in a row we tolerate before concluding the dictionary can't
/// support the requested grid size.
const MAX_CONSECUTIVE_FAILURES: u32 = 25;

/// Batch-generate word-square puzzles and write them to a JSON corpus for random/daily lookup.
#[derive(Debug, Parser)]
#[command(version, about)]
struct Opts {
    /// Path to a dictionary file with one word per line.
    #[arg(short, long)]
    dictionary: PathBuf,

    /// How many puzzles to generate.
    #[arg(short, long, default_value_t = 20)]
    count: usize,

    /// Word length, which is also the grid side length.
    #[arg(short, long, default_value_t = WORD_LENGTH)]
    length: usize,

    /// Output path for the JSON corpus.
    #[arg(short, long, default_value = "crosswords.json")]
    output: PathBuf,

    /// Date assigned to the first puzzle; later puzzles get consecutive days.
    #[arg(long, default_value = "2024-01-01")]
    start_date: String,

    /// RNG seed, for reproducible corpora. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> anyhow::Result<()> {
    env_logger::init();
    let opts = Opts::parse();

    let raw = fs::read_to_string(&opts.dictionary)
        .with_context(|| format!("failed to read dictionary {}", opts.dictionary.display()))?;
    let lexicon = Lexicon::new(raw.lines(), opts.length);
    if lexicon.is_empty() {
        bail!("dictionary has no {}-letter words", opts.length);
    }
    info!(
        "loaded {} {}-letter words from {}",
        lexicon.len(),
        opts.length,
        opts.dictionary.display()
    );

    let start_days = parse_date(&opts.start_date)
        .with_context(|| format!("invalid start date {:?}", opts.start_date))?;

    let mut rng = match opts.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let mut puzzles: Vec<Puzzle> = Vec::with_capacity(opts.count);
    let mut consecutive_failures = 0u32;

    while puzzles.len() < opts.count {
        let id = puzzles.len() as u32 + 1;
        let date = format_date(start_days + puzzles.len() as i64);
        let started = Instant::now();

        match generate_puzzle(&lexicon, &mut rng, id, &date) {
            Ok(success) => {
                info!(
                    "generated #{} ({}) in {:?} ({} states, {} backtracks, {} retries)",
                    id,
                    date,
                    started.elapsed(),
                    success.statistics.states,
                    success.statistics.backtracks,
                    success.statistics.retries,
                );
                puzzles.push(success.puzzle);
                consecutive_failures = 0;
            }
            Err(err) => {
                consecutive_failures += 1;
                warn!("generation failed after {:?}: {}", started.elapsed(), err);
                if consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
                    bail!(
                        "{} generations failed in a row; the dictionary likely can't fill a \
                         {}x{} grid",
                        consecutive_failures,
                        opts.length,
                        opts.length,
                    );
                }
            }
        }
    }

    let corpus = Corpus::new(puzzles);
    fs::write(&opts.output, corpus.to_json()?)
        .with_context(|| format!("failed to write corpus {}", opts.output.display()))?;
    info!("wrote {} puzzles to {}", corpus.len(), opts.output.display());

    Ok(())
}
