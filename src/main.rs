use std::{
    fs,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
    time::Instant,
};

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use uq_words::{Config, HashWordSet, OversizedPolicy, SplitReduce, TrieWordSet, WordSet};

#[derive(Parser)]
#[command(name = "uq-words")]
#[command(about = "Counts the distinct space-separated words of a file")]
#[command(version)]
struct Cli {
    /// File to scan
    file: PathBuf,

    /// Target chunk size in bytes, rounded down to the page size
    #[arg(long, default_value_t = 1024 * 1024)]
    chunk_size: usize,

    /// Worker threads (defaults to the available parallelism)
    #[arg(short, long)]
    workers: Option<usize>,

    /// Scan or merge tasks allowed in flight per worker
    #[arg(long, default_value_t = 128)]
    load_factor: usize,

    /// Queue probe rounds before a submitter or worker blocks
    #[arg(long, default_value_t = 32)]
    spins: usize,

    /// Set implementation used for partial and final results
    #[arg(long, value_enum, default_value_t = Backend::Hash)]
    backend: Backend,

    /// Fail instead of growing the chunk when a single word is larger than it
    #[arg(long)]
    fail_on_oversized: bool,

    /// Print the elapsed wall-clock time to stderr
    #[arg(long)]
    time: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Backend {
    /// Hash set of owned words; accepts any bytes
    Hash,
    /// Arena trie; lowercase a-z words only
    Trie,
}

impl Cli {
    fn config(&self) -> Config {
        let defaults = Config::default();
        Config {
            chunk_size: self.chunk_size,
            workers: self.workers.unwrap_or(defaults.workers),
            load_factor: self.load_factor,
            spins: self.spins,
            oversized: if self.fail_on_oversized {
                OversizedPolicy::Fail
            } else {
                OversizedPolicy::Grow
            },
            ..defaults
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();
    validate_input(&cli.file)?;

    let mut buffered_stdout = BufWriter::new(std::io::stdout());
    let started = Instant::now();
    let engine = SplitReduce::new(cli.config())?;
    let count = match cli.backend {
        Backend::Hash => distinct::<HashWordSet>(&engine, &cli.file)?,
        Backend::Trie => distinct::<TrieWordSet>(&engine, &cli.file)?,
    };
    let elapsed = started.elapsed();
    // the pool is joined before anything is printed
    drop(engine);

    writeln!(buffered_stdout, "{count}")?;
    buffered_stdout.flush()?;
    if cli.time {
        eprintln!("dT = {:.3} s", elapsed.as_secs_f64());
    }
    Ok(())
}

fn distinct<S: WordSet>(engine: &SplitReduce, path: &Path) -> Result<usize> {
    let words: S = engine
        .apply_to_file_at_path(path)
        .with_context(|| format!("failed to process '{}'", path.display()))?;
    Ok(words.len())
}

/// Existence and emptiness checks happen here, before the engine runs.
fn validate_input(path: &Path) -> Result<()> {
    let Ok(metadata) = fs::metadata(path) else {
        bail!("File '{}' not found", path.display());
    };
    if !metadata.is_file() {
        bail!("'{}' is not a regular file", path.display());
    }
    if metadata.len() == 0 {
        bail!("File '{}' is empty!", path.display());
    }
    Ok(())
}
