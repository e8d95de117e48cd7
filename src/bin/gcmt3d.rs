use std::process::ExitCode;

use camino::Utf8PathBuf;
use clap::error::ErrorKind;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use gcmt3d::config::{ConfigLoader, InputParams};
use gcmt3d::error::Gcmt3dError;
use gcmt3d::fetch::{CommandFetcher, WorkerEnv};
use gcmt3d::init::{InitProgress, Initializer};
use gcmt3d::layout::{WorkspacePaths, layout};
use gcmt3d::output::{JsonOutput, OutputMode};
use gcmt3d::progress::{LogSink, ProgressSink};
use gcmt3d::registry::DirectoryRegistry;
use gcmt3d::scheduler::{DownloadScheduler, plan_downloads};
use gcmt3d::solution::{CmtSolutionReader, SolutionReader, SourceSolution};
use gcmt3d::synthetics::SyntheticsStep;

#[derive(Parser)]
#[command(name = "gcmt3d")]
#[command(about = "Workspace orchestration for centroid moment tensor inversions")]
#[command(version)]
struct Cli {
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Fetch observed data for every event not yet downloaded")]
    Download(DownloadArgs),
    #[command(about = "Create and seed the workspace of one event")]
    Init(EventArgs),
    #[command(about = "Print the workspace paths of one event")]
    Layout(LayoutArgs),
    #[command(about = "Process raw synthetics of an initialized workspace")]
    ProcessSynt(ProcessSyntArgs),
}

#[derive(Args)]
struct DownloadArgs {
    input: Utf8PathBuf,

    /// Cap on events per run; 0 means no cap. Overrides `max_downloads`.
    #[arg(long)]
    max_downloads: Option<usize>,

    #[arg(long)]
    workers: Option<usize>,

    #[arg(long, default_value = "logs")]
    log_dir: Utf8PathBuf,

    /// Program run once per event with the workspace root appended.
    #[arg(long, required = true, num_args = 1.., allow_hyphen_values = true)]
    fetch_cmd: Vec<String>,
}

#[derive(Args)]
struct EventArgs {
    input: Utf8PathBuf,
    solution: Utf8PathBuf,
}

#[derive(Args)]
struct LayoutArgs {
    #[command(flatten)]
    event: EventArgs,

    #[arg(long)]
    create: bool,
}

#[derive(Args)]
struct ProcessSyntArgs {
    eventdir: Utf8PathBuf,
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let _ = err.print();
            return ExitCode::from(usage_exit_code(&err));
        }
    };
    if let Err(report) = run(cli) {
        eprintln!("{report:?}");
        if let Some(err) = report.downcast_ref::<Gcmt3dError>() {
            return ExitCode::from(map_exit_code(err));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &Gcmt3dError) -> u8 {
    match error {
        Gcmt3dError::ConfigRead(_)
        | Gcmt3dError::ConfigParse { .. }
        | Gcmt3dError::MissingConfigKey { .. }
        | Gcmt3dError::UnknownParameter(_) => 2,
        Gcmt3dError::Fetch { .. } | Gcmt3dError::MissingTool(_) | Gcmt3dError::ProcessStep(_) => 3,
        _ => 1,
    }
}

// Bad arguments share the generic failure code; 2 is reserved for configuration errors.
fn usage_exit_code(err: &clap::Error) -> u8 {
    match err.kind() {
        ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
        _ => 1,
    }
}

fn run(cli: Cli) -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Human
    };

    match cli.command {
        Commands::Download(args) => run_download(args, mode),
        Commands::Init(args) => run_init(args, mode),
        Commands::Layout(args) => run_layout(args, mode),
        Commands::ProcessSynt(args) => run_process_synt(args),
    }
}

fn run_download(args: DownloadArgs, mode: OutputMode) -> miette::Result<()> {
    let params = ConfigLoader::resolve(&args.input)?;
    let registry = DirectoryRegistry::from_input(&args.input)?;
    let max_count = args.max_downloads.unwrap_or(params.max_downloads);

    let (program, fetch_args) = args
        .fetch_cmd
        .split_first()
        .ok_or_else(|| Gcmt3dError::MissingTool("--fetch-cmd".to_string()))?;
    let fetcher = CommandFetcher::locate(program, fetch_args.to_vec(), WorkerEnv::default())?;

    let planned = plan_downloads(&registry, max_count)?;
    let mut scheduler = DownloadScheduler::new(fetcher, registry.database(), args.log_dir);
    if let Some(workers) = args.workers {
        scheduler = scheduler.with_workers(workers);
    }

    let sink: &dyn ProgressSink = match mode {
        OutputMode::Json => &JsonOutput,
        OutputMode::Human => &LogSink,
    };
    let report = scheduler.run(planned, sink);

    match mode {
        OutputMode::Json => JsonOutput::print_download(&report).into_diagnostic()?,
        OutputMode::Human => {
            for outcome in &report.outcomes {
                match &outcome.error {
                    None => println!("ok     {} ({} ms)", outcome.event, outcome.elapsed_ms),
                    Some(error) => println!("failed {}: {error}", outcome.event),
                }
            }
            for skipped in &report.skipped {
                println!("skipped {}: {}", skipped.source, skipped.reason);
            }
            println!(
                "{} downloaded, {} failed, {} skipped",
                report.succeeded(),
                report.failed(),
                report.skipped.len()
            );
        }
    }

    if let Some(failed) = report.first_error() {
        return Err(Gcmt3dError::Fetch {
            event: failed.event.clone(),
            message: format!("{} of {} downloads failed", report.failed(), report.outcomes.len()),
        }
        .into());
    }
    Ok(())
}

fn resolve_workspace(
    args: &EventArgs,
    create: bool,
) -> miette::Result<(InputParams, WorkspacePaths)> {
    let params = ConfigLoader::resolve(&args.input)?;
    let solution = CmtSolutionReader.read(&args.solution)?;
    let workspace = layout(&params.database, solution.event_name(), create)?;
    Ok((params, workspace))
}

fn run_init(args: EventArgs, mode: OutputMode) -> miette::Result<()> {
    let (params, workspace) = resolve_workspace(&args, true)?;
    let report = Initializer::gcmt().initialize(&args.solution, &workspace, &params)?;
    match mode {
        OutputMode::Json => JsonOutput::print_init(&report).into_diagnostic()?,
        OutputMode::Human => {
            println!("initialized {} at {}", report.event, report.root);
            println!("waves:      {}", report.waves.join(", "));
            println!("parameters: {}", report.parameters.join(", "));
            println!("stations:   {}", report.stations);
        }
    }
    Ok(())
}

fn run_layout(args: LayoutArgs, mode: OutputMode) -> miette::Result<()> {
    let (_, workspace) = resolve_workspace(&args.event, args.create)?;
    let progress = InitProgress::inspect(&workspace);
    match mode {
        OutputMode::Json => JsonOutput::print_layout(&workspace, &progress).into_diagnostic()?,
        OutputMode::Human => {
            for dir in workspace.dirs() {
                println!("{dir}");
            }
            println!(
                "initialized: inputs={} model={} stations={}",
                progress.inputs, progress.model, progress.stations
            );
        }
    }
    Ok(())
}

fn run_process_synt(args: ProcessSyntArgs) -> miette::Result<()> {
    let workspace = WorkspacePaths::from_root(&args.eventdir)?;
    SyntheticsStep::from_env(WorkerEnv::single_threaded())?.run(&workspace)?;
    Ok(())
}
