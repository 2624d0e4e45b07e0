mod logic;
mod util;

use anyhow::{Context, Result, bail};
use clap::Parser;
use colored::Colorize;
use std::fs::File;
use std::io::{BufWriter, Write, stdout};
use std::path::PathBuf;
use std::time::Instant;

use logic::{CaseTester, LearnerStrategy, StrategyResult, TesterAssets};
use util::{parse_seeds, split_csv};

#[derive(Debug, Parser)]
#[command(name = "clinsim-tester", version = "0.1.0")]
#[command(about = "Automated play-through testing for Clinsim clinical cases")]
struct Args {
    /// Case definition JSON to test (defaults to the bundled demo case)
    #[arg(long)]
    case: Option<PathBuf>,

    /// Learner strategies to run (comma-separated, or `all`)
    #[arg(long, default_value = "all")]
    strategies: String,

    /// List all available strategies and exit
    #[arg(long)]
    list_strategies: bool,

    /// Seeds to run (comma-separated)
    #[arg(long, default_value = "1337")]
    seeds: String,

    /// Number of play-throughs per strategy and seed
    #[arg(long, default_value_t = 10)]
    iterations: usize,

    /// Maximum learner actions before a play-through is abandoned
    #[arg(long, default_value_t = 200)]
    max_steps: usize,

    /// Output report format
    #[arg(long, default_value = "console")]
    #[arg(value_parser = ["json", "markdown", "console"])]
    report: String,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Optional path to write the report output instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if maybe_list_strategies(&args)? {
        return Ok(());
    }

    announce_banner();

    let start_time = Instant::now();
    let assets = load_assets(&args)?;
    let strategies = expand_strategies(&args.strategies)?;
    let seeds = parse_seeds(&split_csv(&args.seeds))?;
    let title = assets.case().title.clone();
    let tester = CaseTester::new(assets, args.max_steps, args.verbose);

    println!(
        "{} {} {}",
        "🩺 Testing case".bright_yellow().bold(),
        tester.case_id().bright_white(),
        title.dimmed()
    );
    println!("{}", "-".repeat(30).yellow());

    let results: Vec<StrategyResult> = strategies
        .iter()
        .flat_map(|&strategy| tester.run_strategy(strategy, &seeds, args.iterations))
        .collect();

    write_reports(&args, &results, start_time)?;

    if results.iter().any(|r| !r.passed) {
        std::process::exit(1);
    }

    Ok(())
}

fn maybe_list_strategies(args: &Args) -> Result<bool> {
    if !args.list_strategies {
        return Ok(false);
    }
    let mut output_target = OutputTarget::new(args.output.clone())?;
    writeln!(output_target.writer(), "Available strategies:")?;
    for strategy in LearnerStrategy::ALL {
        writeln!(
            output_target.writer(),
            "  {:10} - {}",
            strategy.key(),
            strategy.description()
        )?;
    }
    output_target.flush_inner()?;
    Ok(true)
}

fn announce_banner() {
    println!("{}", "🏥 Clinsim Case Tester".bright_cyan().bold());
    println!("{}", "======================".cyan());
}

fn load_assets(args: &Args) -> Result<TesterAssets> {
    match &args.case {
        Some(path) => TesterAssets::from_path(path)
            .with_context(|| format!("failed to load case {}", path.display())),
        None => TesterAssets::load_default().context("bundled case is invalid"),
    }
}

fn expand_strategies(strategies_arg: &str) -> Result<Vec<LearnerStrategy>> {
    let mut strategies = Vec::new();
    for token in split_csv(strategies_arg) {
        if token.eq_ignore_ascii_case("all") {
            strategies.extend(LearnerStrategy::ALL);
        } else if let Some(strategy) = LearnerStrategy::from_key(&token) {
            strategies.push(strategy);
        } else {
            eprintln!("⚠️  Unknown strategy: {}", token.yellow());
        }
    }
    let mut seen = Vec::new();
    strategies.retain(|strategy| {
        if seen.contains(strategy) {
            false
        } else {
            seen.push(*strategy);
            true
        }
    });
    if strategies.is_empty() {
        bail!("no known strategies in `{strategies_arg}`");
    }
    Ok(strategies)
}

fn write_reports(args: &Args, results: &[StrategyResult], start_time: Instant) -> Result<()> {
    let mut output_target = OutputTarget::new(args.output.clone())?;

    match args.report.as_str() {
        "json" => logic::reports::generate_json_report(&mut output_target, results)?,
        "markdown" => {
            if results.is_empty() {
                writeln!(
                    &mut output_target,
                    "# Clinsim Case Test Results\n\n_No play-throughs executed._"
                )?;
            } else {
                logic::reports::generate_markdown_report(&mut output_target, results)?;
            }
        }
        _ => {
            if results.is_empty() {
                writeln!(&mut output_target, "No play-throughs executed.")?;
            } else {
                logic::reports::generate_console_report(
                    &mut output_target,
                    results,
                    start_time.elapsed(),
                )?;
            }
            let duration = start_time.elapsed();
            writeln!(&mut output_target)?;
            writeln!(&mut output_target, "🏁 Total time: {duration:?}")?;
        }
    }

    output_target.flush_inner()?;
    Ok(())
}

enum OutputTarget {
    Stdout(BufWriter<std::io::Stdout>),
    File(BufWriter<File>),
}

impl OutputTarget {
    fn new(path: Option<PathBuf>) -> Result<Self> {
        if let Some(path) = path {
            let file = File::create(&path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Self::File(BufWriter::new(file)))
        } else {
            Ok(Self::Stdout(BufWriter::new(stdout())))
        }
    }

    fn writer(&mut self) -> &mut dyn Write {
        match self {
            Self::Stdout(w) => w,
            Self::File(w) => w,
        }
    }

    fn flush_inner(&mut self) -> std::io::Result<()> {
        match self {
            Self::Stdout(w) => w.flush(),
            Self::File(w) => w.flush(),
        }
    }
}

impl Write for OutputTarget {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.writer().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.flush_inner()
    }
}
