//! CLI entry point for `mboxclog`.

use std::path::{Path, PathBuf};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mboxclog::config::{self, Config};
use mboxclog::pipeline::filter::TargetYear;
use mboxclog::pipeline::{self, ExportJob, RunReport};

#[derive(Parser)]
#[command(
    name = "mboxclog",
    version,
    about = "Export Subject, From, To and Date of every message in an MBOX file to CSV",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// MBOX file to export
    #[arg(value_name = "MBOX")]
    file: Option<PathBuf>,

    /// Destination CSV (default: the MBOX path with a .csv extension)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Only export messages dated in this year
    #[arg(short, long, value_name = "YYYY")]
    year: Option<TargetYear>,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Completions { shell }) => cmd_completions(shell),
        Some(Commands::Manpage) => cmd_manpage(),
        None => match cli.file {
            Some(path) => {
                let output = cli
                    .output
                    .unwrap_or_else(|| config::default_output_path(&path));
                let job = ExportJob {
                    source: path,
                    target_year: cli.year,
                    output,
                    verbose: cli.verbose > 0,
                };
                cmd_export(job, &config, cli.json)
            }
            None => {
                Cli::command().print_help()?;
                anyhow::bail!("no MBOX file given");
            }
        },
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = config::cache_dir(config);
    if config.general.log_to_file && std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "mboxclog.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mboxclog", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}

/// Export one MBOX file to CSV and print the summary.
fn cmd_export(job: ExportJob, config: &Config, json: bool) -> anyhow::Result<()> {
    if !json {
        println!(
            "Beginning export of {} to {}...",
            job.source.display(),
            job.output.display()
        );
    }

    let pb = if json || job.verbose {
        ProgressBar::hidden()
    } else {
        ProgressBar::new_spinner()
    };
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} Scanning {pos} message(s) ({elapsed})")
            .expect("valid template"),
    );

    let report = pipeline::run_export(job, config, Some(&|seen| pb.set_position(seen)));
    pb.finish_and_clear();
    let report = report?;

    if json {
        print_report_json(&report)?;
    } else {
        print_report_table(&report);
    }

    Ok(())
}

/// Print the run summary as a human-readable table.
fn print_report_table(report: &RunReport) {
    use humansize::{format_size, BINARY};

    let stats = &report.stats;
    println!();
    println!("  {:<20} {}", "Source", report.source.display());
    println!("  {:<20} {}", "Output", report.output.display());
    if let Some(year) = report.target_year {
        println!("  {:<20} {}", "Year", year);
    }
    println!("  {:<20} {}", "Messages seen", stats.total_seen);
    println!("  {:<20} {}", "Exported", stats.included_count);
    println!("  {:<20} {}", "Ignored", stats.ignored_count);
    if stats.ignored_count > 0 {
        println!("  {:<20} {}", "  unparseable date", stats.unresolved_dates);
        println!("  {:<20} {}", "  other year", stats.year_mismatches);
        println!("  {:<20} {}", "  malformed", stats.malformed);
    }
    println!(
        "  {:<20} {}",
        "Output size",
        format_size(report.output_bytes, BINARY)
    );
    println!("  {:<20} {:.2?}", "Completed in", report.elapsed);
    println!();
    println!(
        "{} emails were found and {} exported to {}.",
        stats.total_seen,
        stats.included_count,
        display_path(&report.output)
    );
}

/// Print the run summary as JSON.
fn print_report_json(report: &RunReport) -> anyhow::Result<()> {
    let output = serde_json::json!({
        "source": report.source.to_string_lossy(),
        "output": report.output.to_string_lossy(),
        "target_year": report.target_year.map(|y| y.value()),
        "stats": report.stats,
        "output_bytes": report.output_bytes,
        "elapsed_ms": report.elapsed.as_millis() as u64,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

fn display_path(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
