use std::path::PathBuf;
use std::sync::atomic::Ordering;
use clap::{Parser, Subcommand};
use anyhow::{bail, Context, Result};
use chrono::NaiveDateTime;
use log::*;

use speedgraph::{filter_store, find_nearest_by_time, parse_period, print_summary, print_summary_header, request_stop, ChartEngine, Measurement, Metric, PidFile, ResultParser, ResultStore, Runner, Settings, SpeedTester};
use speedgraph::parser::reference_day;

#[derive(Debug, Parser)]
#[clap(version, about, long_about = None)]
pub struct Opts
{
    /// Configuration file
    #[arg(short = 'c', long, value_name = "file.toml", global = true)]
    config: Option<PathBuf>,
    /// Results file, overrides the configuration file
    #[arg(short = 'r', long, value_name = "file", global = true)]
    results: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands
{
    /// Run one speed test and store the result
    Measure,
    /// Run a speed test repeatedly
    Schedule {
        /// How often to run, eg. 5 min (units: sec, min, hour, day)
        #[arg(short = 'f', long, num_args = 2, value_names = ["amount", "unit"], required = true)]
        frequency: Vec<String>,
        /// How long to run
        #[arg(short = 'd', long, num_args = 2, value_names = ["amount", "unit"], default_values = ["24", "hour"])]
        duration: Vec<String>,
        /// Blank file to write the process id in; emptying it stops the runner
        #[arg(short = 'p', long, value_name = "file")]
        pidfile: Option<PathBuf>,
    },
    /// Ask a scheduled runner to stop by emptying its pid file
    Stop {
        #[arg(short = 'p', long, value_name = "file")]
        pidfile: PathBuf,
    },
    /// Draw the measurement history into a png or svg file
    Draw {
        /// Primary series
        #[arg(short = 'm', long, value_enum, default_value_t = Metric::Download)]
        metric: Metric,
        /// Only use records with this attribute value, eg. ssid=HomeNet
        #[arg(short = 'F', long, value_name = "key=value")]
        filter: Option<String>,
        /// Put all days on one time of day axis
        #[arg(long)]
        overlay_days: bool,
        /// Annotate the point nearest to this time
        #[arg(long, value_name = "YYYY-MM-DD HH:MM:SS", conflicts_with = "inspect")]
        hover: Option<String>,
        /// Show the speed test output of the point nearest to this time
        #[arg(long, value_name = "YYYY-MM-DD HH:MM:SS")]
        inspect: Option<String>,
        /// Chart caption
        #[arg(short = 't', long, default_value = "Internet Speeds")]
        title: String,
        /// Output file
        #[arg(short = 'o', long, value_name = "file", default_value = "speedresults.png")]
        output: PathBuf,
    },
    /// Print minimum, average and maximum per SSID
    Summary {
        /// Only use records with this attribute value, eg. Provider=Example
        #[arg(short = 'F', long, value_name = "key=value")]
        filter: Option<String>,
    },
}

fn load_filtered(
    settings: &Settings,
    filter: Option<&str>,
) -> Result<ResultStore>
{
    let store = ResultStore::load(&settings.results_file)
        .with_context(|| format!("loading results from {}", settings.results_file.display()))?;
    let store = match filter {
        Some(filter) => {
            let Some((key, value)) = filter.split_once('=') else { bail!("filter `{}` should be key=value", filter) };
            filter_store(&store, key, value)
        },
        None => store,
    };
    if store.is_empty() { bail!("no measurements found in {}", settings.results_file.display()) };
    Ok(store)
}

fn query_time(
    parser: &ResultParser,
    text: &str,
    overlay_days: bool,
) -> Result<NaiveDateTime>
{
    let at = parser.parse_timestamp(text.trim())?;
    Ok(if overlay_days { reference_day().and_time(at.time()) } else { at })
}

#[tokio::main]
async fn main() -> Result<()>
{
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Opts::parse();

    let mut settings = Settings::load(args.config.as_deref()).context("reading configuration")?;
    if let Some(results) = args.results { settings.results_file = results };

    match args.command {
        Commands::Measure => {
            let mut store = ResultStore::load(&settings.results_file)?;
            let mut tester = SpeedTester::new(settings.speedtest_command.clone(), settings.ssid_command.clone());
            let (timestamp, record) = tester.measure().context("running speed test")?;
            store.insert(timestamp, record)?;
            store.save(&settings.results_file, settings.pretty)
                .with_context(|| format!("saving results to {}", settings.results_file.display()))?;
        },
        Commands::Schedule { frequency, duration, pidfile } => {
            let interval = parse_period(&frequency[0], &frequency[1]).context("frequency")?;
            let duration = parse_period(&duration[0], &duration[1]).context("duration")?;
            let store = ResultStore::load(&settings.results_file)?;
            let tester = SpeedTester::new(settings.speedtest_command.clone(), settings.ssid_command.clone());
            let mut runner = Runner::new(tester, store, settings.results_file.clone(), interval, duration)
                .with_pretty(settings.pretty);
            if let Some(pidfile) = pidfile
            {
                runner = runner.with_pidfile(PidFile::claim(&pidfile)?);
            }
            let stop = runner.stop_flag();
            ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst)).context("installing ctrl-c handler")?;
            let executions = runner.run().await?;
            info!("runner finished after {} execution(s)", executions);
        },
        Commands::Stop { pidfile } => {
            request_stop(&pidfile)?;
        },
        Commands::Draw { metric, filter, overlay_days, hover, inspect, title, output } => {
            let store = load_filtered(&settings, filter.as_deref())?;
            let parser = ResultParser::new();
            let parsed = parser.parse(&store, overlay_days).context("parsing results")?;
            let mut engine = ChartEngine::new(parsed, metric)?.with_title(title);
            if let Some(at) = hover
            {
                engine.pointer_moved(query_time(&parser, &at, overlay_days)?)?;
            }
            if let Some(at) = inspect
            {
                let index = find_nearest_by_time(engine.primary(), query_time(&parser, &at, overlay_days)?)?;
                engine.point_picked(index);
            }
            engine.render(&output, (settings.chart_width, settings.chart_height))
                .with_context(|| format!("drawing {}", output.display()))?;
        },
        Commands::Summary { filter } => {
            let store = load_filtered(&settings, filter.as_deref())?;
            let parsed = ResultParser::new().parse(&store, false).context("parsing results")?;
            print_summary_header();
            print_summary(&parsed);
        },
    }
    Ok(())
}
