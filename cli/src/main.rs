use anyhow::{Context, bail};
use callfilter::{DEFAULT_CHUNK_SIZE, Direction, FilterParams, TranslateStats};
use clap::{Args, Parser, Subcommand};
use memmap2::Mmap;
use mimalloc::MiMalloc;
use std::{
    fmt,
    fs::File,
    io::Write,
    path::{Path, PathBuf},
    time::{Duration, Instant},
};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

/// Apply or undo CALL-address translation on executable images
#[derive(Parser, Debug)]
#[command(name = "callfilter", version, arg_required_else_help = true)]
struct Cli {
    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Rewrite call displacements into absolute targets (before diffing)
    Encode(IoArgs),
    /// Rewrite absolute targets back into call displacements (after patching)
    Decode(IoArgs),
    /// Encode then decode in memory and check the input comes back intact
    Cycle {
        input: PathBuf,
        #[command(flatten)]
        filter: FilterArgs,
    },
}

#[derive(Args, Debug)]
struct IoArgs {
    input: PathBuf,
    output: PathBuf,
    #[command(flatten)]
    filter: FilterArgs,
}

#[derive(Args, Debug)]
struct FilterArgs {
    /// Size of independently translated chunks
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,
    /// Translation file size (defaults to the input's length)
    #[arg(long)]
    file_size: Option<u64>,
    /// Max threads to use
    #[arg(long)]
    threads: Option<usize>,
}

impl FilterArgs {
    fn params(&self) -> anyhow::Result<FilterParams> {
        FilterParams::with_threads(self.chunk_size, self.file_size, self.threads)
            .context("invalid filter parameters")
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Cmd::Encode(args) => do_filter(&args, Direction::Forward),
        Cmd::Decode(args) => do_filter(&args, Direction::Inverse),
        Cmd::Cycle { input, filter } => do_cycle(&input, &filter),
    }
}

fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    if file.metadata()?.len() == 0 {
        return Ok(Vec::new());
    }
    // SAFETY: the mapping is copied out immediately and not kept around
    let map = unsafe { Mmap::map(&file) }.with_context(|| format!("mapping {}", path.display()))?;
    Ok(map.to_vec())
}

fn write_output(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("creating temporary file in {}", dir.display()))?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

fn do_filter(args: &IoArgs, direction: Direction) -> anyhow::Result<()> {
    let start = Instant::now();
    let params = args.filter.params()?;

    let mut buf = read_input(&args.input)?;
    let stats = callfilter::filter(&mut buf, direction, &params)
        .with_context(|| format!("filtering {}", args.input.display()))?;
    write_output(&args.output, &buf)?;

    report(&stats, buf.len(), start.elapsed());
    Ok(())
}

fn do_cycle(input: &Path, filter: &FilterArgs) -> anyhow::Result<()> {
    let start = Instant::now();
    let params = filter.params()?;

    let original = read_input(input)?;
    let before = blake3::hash(&original);

    let mut buf = original.clone();
    let encoded = callfilter::filter(&mut buf, Direction::Forward, &params)?;
    let changed = buf
        .iter()
        .zip(original.iter())
        .filter(|(a, b)| a != b)
        .count();
    info!("encoding changed {} bytes", changed);

    let decoded = callfilter::filter(&mut buf, Direction::Inverse, &params)?;
    let after = blake3::hash(&buf);

    report(&encoded, buf.len(), start.elapsed());
    if before != after {
        bail!(
            "hash mismatch after cycle: {} != {} ({} sites encoded, {} decoded)",
            before.to_hex(),
            after.to_hex(),
            encoded.rewritten,
            decoded.rewritten
        );
    }
    info!("cycle ok, blake3 {}", after.to_hex());
    Ok(())
}

fn report(stats: &TranslateStats, size: usize, elapsed: Duration) {
    info!(
        "{} chunks, {} sites, {} rewritten in {}",
        stats.chunks,
        stats.sites,
        stats.rewritten,
        DurationSpeed(size as u64, elapsed)
    );
}

struct DurationSpeed(u64, Duration);

impl fmt::Display for DurationSpeed {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let (size, duration) = (self.0, self.1);
        let per_sec = size as f64 / duration.as_secs_f64();
        write!(f, "{:?} ({} / s)", duration, Size(per_sec as u64))
    }
}

struct Size(u64);

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let x = self.0;

        if x > 1024 * 1024 {
            write!(f, "{:.2} MiB", x as f64 / (1024.0 * 1024.0))
        } else if x > 1024 {
            write!(f, "{:.1} KiB", x as f64 / (1024.0))
        } else {
            write!(f, "{} B", x)
        }
    }
}
