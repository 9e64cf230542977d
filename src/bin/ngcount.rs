use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;
use rust_ngramcount::file;
use rust_ngramcount::ngram::{CountSession, CounterConfig, InputFormat, NgramCounter, SpillFiles};
use walkdir::WalkDir;

#[derive(Parser, Debug)]
#[command(version, about = "Count n-grams, spilling partial counts to numbered files", long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 7,
          value_parser = clap::value_parser!(u32).range(1..=32),
          help = "Maximum n-gram length")]
    tokens: u32,

    #[arg(short = 'u', long, default_value_t = 1024,
          value_parser = clap::value_parser!(u64).range(64..=262144),
          help = "Memory budget in MiB")]
    memusage: u64,

    #[arg(short, long, value_enum, default_value_t = InputFormat::Spaced)]
    format: InputFormat,

    #[arg(short, long, help = "Count sentence boundaries as <S> and </S>")]
    boundary: bool,

    #[arg(short, long, help = "Sort each output file")]
    sort: bool,

    #[arg(short, long, help = "Output file prefix [default: ngms-%Y%m%d-%H%M%S]")]
    prefix: Option<String>,

    #[arg(short, long, default_value = "gz", help = "Output file extension, empty for none")]
    extension: String,

    #[arg(short = 'n', long, default_value_t = 100,
          value_parser = clap::value_parser!(u32).range(1..=10000),
          help = "Maximum number of output files")]
    files: u32,

    #[arg(short, long)]
    verbose: bool,

    /// Input files or directories; none or `-` reads stdin
    inputs: Vec<PathBuf>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

/// Files to count in order. `None` stands for stdin.
fn expand_inputs(inputs: &[PathBuf]) -> anyhow::Result<Vec<Option<PathBuf>>> {
    if inputs.is_empty() {
        return Ok(vec![None]);
    }
    let mut files = Vec::new();
    for input in inputs {
        if input.as_os_str() == "-" {
            files.push(None);
        } else if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.with_context(|| format!("failed to walk {}", input.display()))?;
                if entry.file_type().is_file() {
                    files.push(Some(entry.into_path()));
                }
            }
        } else {
            files.push(Some(input.clone()));
        }
    }
    Ok(files)
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = CounterConfig {
        max_ngram_length: args.tokens as usize,
        memory_limit: (args.memusage as usize) << 20,
        format: args.format,
        boundary: args.boundary,
        sort: args.sort,
    };
    let prefix = args
        .prefix
        .clone()
        .unwrap_or_else(rust_ngramcount::default_output_prefix);
    info!(
        "max n-gram length: {}, memory: {} MiB, format: {:?}, boundary: {}, sort: {}",
        config.max_ngram_length, args.memusage, config.format, config.boundary, config.sort
    );

    let mut session = CountSession::new(
        NgramCounter::new(config),
        SpillFiles::new(prefix, args.extension.clone(), args.files as usize),
    );
    let tty = atty::is(atty::Stream::Stderr);
    let started = Instant::now();
    session.on_progress(move |counter| {
        let status = format!(
            "sentences: {}, tokens: {}, vocabulary: {}, nodes: {} ({:.0?})",
            counter.sentence_count(),
            counter.token_count(),
            counter.vocabulary_size(),
            counter.trie().num_nodes(),
            started.elapsed()
        );
        if tty {
            eprint!("\r{}", status);
        } else {
            info!("{}", status);
        }
    });

    for input in expand_inputs(&args.inputs)? {
        let name = input
            .as_ref()
            .map_or_else(|| "(standard input)".to_string(), |p| p.display().to_string());
        info!("input: {}", name);
        let reader = file::open_input(input.as_deref())
            .with_context(|| format!("failed to open input file: {}", name))?;
        session
            .count(reader)
            .with_context(|| format!("failed to count {}", name))?;
    }

    let sentences = session.counter().sentence_count();
    let tokens = session.counter().token_count();
    let spills = session.finish().context("failed to write output file")?;
    if tty && !spills.is_empty() {
        eprintln!();
    }
    info!(
        "{} sentences, {} tokens, {} output files ({:.2?})",
        sentences,
        tokens,
        spills.len(),
        started.elapsed()
    );
    for path in &spills {
        println!("{}", path.display());
    }
    Ok(())
}
