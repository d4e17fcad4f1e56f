//! pagecompare: visual regression testing for documentation builds.
//!
//! Builds every test case under a working root, rasterizes each output
//! variant into page images, and compares a later run against the
//! stored reference pixel by pixel.
//!
//! # Usage
//!
//! ```text
//! pagecompare reference [OPTIONS]       render the reference set
//! pagecompare compare [OPTIONS]         render again and diff against it
//! pagecompare view [--annotate DIR]     list (and outline) the last findings
//! pagecompare clean [--keep-state]      remove generated folders
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG` (default `info`);
//! result listings go to stdout.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand, ValueEnum};
use log::error;
use pagecompare_core::{OutputType, RunConfig, RunMode};
use pagecompare_run::{CommandBuilder, CommandRenderer, RunOptions, RunSummary, run, view};

/// Visual regression testing for documentation builds.
#[derive(Parser)]
#[command(name = "pagecompare", version)]
struct Cli {
    /// Working root; every visible subdirectory is a test case.
    #[arg(long, global = true, default_value = ".")]
    testcases: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Build and render every test case into the reference set.
    Reference(BuildArgs),
    /// Build and render into the comparison set, then diff against the
    /// reference.
    Compare(BuildArgs),
    /// Show the findings of the last compare run.
    View {
        /// Write each changed page with its changes outlined into DIR.
        #[arg(long, value_name = "DIR")]
        annotate: Option<PathBuf>,
    },
    /// Remove build output, rendered pages, and difference rasters.
    Clean {
        /// Keep the variant registry and result manifest.
        #[arg(long)]
        keep_state: bool,
    },
}

#[derive(Args)]
struct BuildArgs {
    /// Output formats, comma separated.
    #[arg(long, value_enum, value_delimiter = ',', default_values_t = [Format::Pdf])]
    formats: Vec<Format>,

    /// Raster widths for the HTML-family formats, comma separated.
    #[arg(long, value_delimiter = ',', default_values_t = [RunConfig::DEFAULT_HTML_WIDTH])]
    html_width: Vec<u32>,

    /// Raster resolution for PDF pages.
    #[arg(long, default_value_t = RunConfig::DEFAULT_PDF_DPI)]
    pdf_dpi: u32,

    /// Time limit in seconds for each build and render invocation.
    #[arg(long, default_value_t = RunConfig::DEFAULT_TIMEOUT_SECS, value_parser = clap::builder::RangedU64ValueParser::<u64>::new().range(1..))]
    timeout: u64,

    /// Number of worker threads (default: one per CPU).
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    jobs: Option<usize>,

    /// Also render every variant recorded in the registry by earlier runs.
    #[arg(long)]
    load_config: bool,

    /// Full run config as a JSON string.
    ///
    /// When provided, the format, width, dpi, timeout, and jobs flags
    /// are ignored. The JSON must be a valid `RunConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Build program, run once per format inside each test case.
    #[arg(long, default_value = CommandBuilder::DEFAULT_PROGRAM)]
    build_cmd: String,

    /// Argument passed to the build program before the format name.
    /// Repeatable; replaces the default arguments.
    #[arg(long, allow_hyphen_values = true)]
    build_arg: Vec<String>,

    /// Render program, run once per variant.
    #[arg(long, default_value = CommandRenderer::DEFAULT_PROGRAM)]
    render_cmd: String,

    /// Argument passed to the render program before the generated ones.
    /// Repeatable.
    #[arg(long, allow_hyphen_values = true)]
    render_arg: Vec<String>,
}

/// Output format selection.
#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Pdf,
    Html,
    SingleHtml,
    Epub,
}

impl From<Format> for OutputType {
    fn from(format: Format) -> Self {
        match format {
            Format::Pdf => Self::Pdf,
            Format::Html => Self::Html,
            Format::SingleHtml => Self::SingleHtml,
            Format::Epub => Self::Epub,
        }
    }
}

/// Build a [`RunConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and the
/// individual parameter flags are ignored.
fn config_from_args(args: &BuildArgs) -> Result<RunConfig, String> {
    if let Some(ref json) = args.config_json {
        return serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"));
    }

    Ok(RunConfig {
        formats: args.formats.iter().copied().map(OutputType::from).collect(),
        html_widths: args.html_width.clone(),
        pdf_dpi: args.pdf_dpi,
        build_timeout_secs: args.timeout,
        render_timeout_secs: args.timeout,
        jobs: args.jobs,
    })
}

fn collaborators(args: Option<&BuildArgs>, config: &RunConfig) -> (CommandBuilder, CommandRenderer) {
    let mut builder = CommandBuilder::from_config(config);
    let mut renderer = CommandRenderer::from_config(config);
    if let Some(args) = args {
        builder.program.clone_from(&args.build_cmd);
        if !args.build_arg.is_empty() || args.build_cmd != CommandBuilder::DEFAULT_PROGRAM {
            builder.args.clone_from(&args.build_arg);
        }
        renderer.program.clone_from(&args.render_cmd);
        renderer.args.clone_from(&args.render_arg);
    }
    (builder, renderer)
}

fn options_from_cli(cli: &Cli) -> Result<(RunOptions, Option<&BuildArgs>), String> {
    let (mode, args) = match &cli.command {
        Command::Reference(args) => (RunMode::Reference, Some(args)),
        Command::Compare(args) => (RunMode::Compare, Some(args)),
        Command::View { .. } => (RunMode::View, None),
        Command::Clean { .. } => (RunMode::Clean, None),
    };

    let mut options = RunOptions::new(&cli.testcases, mode);
    if let Some(args) = args {
        options.config = config_from_args(args)?;
        options.merge_known = args.load_config;
    }
    match &cli.command {
        Command::View { annotate } => options.annotate.clone_from(annotate),
        Command::Clean { keep_state } => options.keep_state = *keep_state,
        Command::Reference(_) | Command::Compare(_) => {}
    }
    Ok((options, args))
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    let (options, args) = match options_from_cli(&cli) {
        Ok(parsed) => parsed,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };
    let (builder, renderer) = collaborators(args, &options.config);

    match run(&options, &builder, &renderer) {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn print_summary(summary: &RunSummary) {
    match summary {
        RunSummary::Built { report, registered } => {
            eprintln!(
                "Rendered {} test cases ({} failed), {registered} variants registered",
                report.completed,
                report.failures.len()
            );
        }
        RunSummary::Compared { report, manifest } => {
            if !report.failures.is_empty() {
                eprintln!("{} test cases failed", report.failures.len());
            }
            print!("{}", view::report(manifest));
        }
        RunSummary::Viewed { manifest, annotated } => {
            print!("{}", view::report(manifest));
            if !annotated.is_empty() {
                eprintln!("Wrote {} annotated pages", annotated.len());
            }
        }
        RunSummary::NothingToDo => eprintln!("No compare results found."),
        RunSummary::Cleaned { test_cases } => eprintln!("Cleaned {test_cases} test cases"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::time::Duration;

    use clap::CommandFactory;

    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("pagecompare").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn defaults_match_run_config() {
        let cli = parse(&["reference"]);
        let (options, _) = options_from_cli(&cli).unwrap();
        assert_eq!(options.mode, RunMode::Reference);
        assert_eq!(options.root, PathBuf::from("."));
        assert_eq!(options.config, RunConfig::default());
        assert_eq!(options.config.build_timeout(), Duration::from_secs(600));
    }

    #[test]
    fn format_and_width_lists_are_comma_separated() {
        let cli = parse(&[
            "compare",
            "--testcases",
            "/work",
            "--formats",
            "pdf,single-html",
            "--html-width",
            "800,1280",
            "--jobs",
            "2",
        ]);
        let (options, _) = options_from_cli(&cli).unwrap();
        assert_eq!(options.root, PathBuf::from("/work"));
        assert_eq!(options.config.formats, [OutputType::Pdf, OutputType::SingleHtml]);
        assert_eq!(options.config.html_widths, [800, 1280]);
        assert_eq!(options.config.jobs, Some(2));
    }

    #[test]
    fn config_json_overrides_flags() {
        let cli = parse(&[
            "reference",
            "--formats",
            "epub",
            "--config-json",
            r#"{"formats":["html"],"html_widths":[640]}"#,
        ]);
        let (options, _) = options_from_cli(&cli).unwrap();
        assert_eq!(options.config.formats, [OutputType::Html]);
        assert_eq!(options.config.html_widths, [640]);
        assert_eq!(options.config.pdf_dpi, RunConfig::DEFAULT_PDF_DPI);
    }

    #[test]
    fn malformed_config_json_is_reported() {
        let cli = parse(&["reference", "--config-json", "{"]);
        assert!(options_from_cli(&cli).is_err());
    }

    #[test]
    fn build_arguments_replace_the_defaults() {
        let cli = parse(&["reference"]);
        let (options, args) = options_from_cli(&cli).unwrap();
        let (builder, _) = collaborators(args, &options.config);
        assert_eq!(builder.program, CommandBuilder::DEFAULT_PROGRAM);
        assert_eq!(builder.args, ["--force"]);

        let cli = parse(&["reference", "--build-cmd", "make", "--render-arg", "--quiet"]);
        let (options, args) = options_from_cli(&cli).unwrap();
        let (builder, renderer) = collaborators(args, &options.config);
        assert_eq!(builder.program, "make");
        assert!(builder.args.is_empty());
        assert_eq!(renderer.args, ["--quiet"]);
    }

    #[test]
    fn view_and_clean_flags() {
        let (options, _) = options_from_cli(&parse(&["view", "--annotate", "out"])).unwrap();
        assert_eq!(options.mode, RunMode::View);
        assert_eq!(options.annotate, Some(PathBuf::from("out")));

        let (options, _) = options_from_cli(&parse(&["clean", "--keep-state"])).unwrap();
        assert_eq!(options.mode, RunMode::Clean);
        assert!(options.keep_state);
    }
}
