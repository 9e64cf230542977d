use std::io::BufRead;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::Parser;
use env_logger::Env;
use log::info;
use rust_ngramcount::file::{self, OutputFile};
use rust_ngramcount::ngram::Merger;

#[derive(Parser, Debug)]
#[command(version, about = "Merge sorted n-gram count files", long_about = None)]
struct Args {
    #[arg(short = 'n', long, default_value_t = 0,
          help = "Drop n-grams whose total frequency is below N")]
    threshold: u64,

    #[arg(short, long, help = "Write the result to FILE (default: stdout)")]
    output: Option<PathBuf>,

    #[arg(short, long)]
    verbose: bool,

    /// Sorted input files; none or `-` reads stdin
    inputs: Vec<PathBuf>,
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();
}

fn display_name(path: Option<&PathBuf>) -> String {
    match path {
        Some(p) if p.as_os_str() != "-" => p.display().to_string(),
        _ => "(standard input)".to_string(),
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(args.verbose);

    let output_name = args
        .output
        .as_ref()
        .map_or_else(|| "(standard output)".to_string(), |p| p.display().to_string());
    info!("output: {}", output_name);

    let mut inputs: Vec<(String, Box<dyn BufRead>)> = Vec::new();
    if args.inputs.is_empty() {
        inputs.push((display_name(None), file::open_input(None)?));
    }
    for path in &args.inputs {
        let name = display_name(Some(path));
        let reader = file::open_input(Some(path))
            .with_context(|| format!("failed to open input file: {}", name))?;
        inputs.push((name, reader));
    }

    let mut out = OutputFile::create(args.output.as_deref())
        .with_context(|| format!("failed to open output file: {}", output_name))?;

    let mut merger = Merger::new(args.threshold);
    let tty = atty::is(atty::Stream::Stderr);
    let started = Instant::now();
    merger.on_progress(move |stats| {
        let status = format!(
            "input: {}, output: {} ({:.2}%) ({:.0?})",
            stats.input_lines,
            stats.output_lines,
            stats.output_ratio(),
            started.elapsed()
        );
        if tty {
            eprint!("\r{}", status);
        } else {
            info!("{}", status);
        }
    });

    let stats = merger.merge(inputs, &mut out).context("merge failed")?;
    out.finish()
        .with_context(|| format!("failed to write result: {}", output_name))?;
    if tty && stats.input_lines >= rust_ngramcount::ngram::merge::PROGRESS_INTERVAL {
        eprintln!();
    }
    Ok(())
}
