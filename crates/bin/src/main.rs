//! Gini CLI binary.
//!
//! Downloads California census tracts, runs the pooling analysis and the
//! three county estimators, and writes the HTML report.

mod pipeline;

use clap::{Args, Parser, Subcommand, ValueEnum};
use gini::{California, Region};
use gini_data::census::Survey;
use gini_models::{EstimationMethod, SimpsonReport};
use gini_output::{ExportFormat, Exporter, multilevel_table};
use indicatif::{ProgressBar, ProgressStyle};
use pipeline::analysis::{Analysis, run_analysis, run_simpson};
use pipeline::cache_manager::{default_cache_path, open_cache, print_cache_info};
use pipeline::config::AppConfig;
use pipeline::data_pipeline::{FetchConfig, LoadedTracts, load_tracts};
use pipeline::report_builder::build_report;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gini")]
#[command(about = "Income inequality and home values across California census tracts", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Where tracts come from.
#[derive(Args, Debug, Clone)]
struct DataArgs {
    /// Read tracts from a CSV file instead of the census API
    #[arg(long)]
    input: Option<PathBuf>,

    /// Restrict to counties, by name or FIPS code (repeatable, comma separated)
    #[arg(long = "county", value_delimiter = ',')]
    counties: Vec<String>,

    /// ACS end year
    #[arg(long)]
    year: Option<u16>,

    /// ACS product (acs5 or acs1)
    #[arg(long)]
    survey: Option<Survey>,

    /// Disable caching (always fetch fresh data)
    #[arg(long)]
    no_cache: bool,

    /// Force refresh cached data
    #[arg(long)]
    refresh: bool,
}

impl DataArgs {
    fn apply(&self, config: &mut AppConfig) {
        if let Some(year) = self.year {
            config.census.year = year;
        }
        if let Some(survey) = self.survey {
            config.census.survey = survey;
        }
    }

    const fn fetch_config(&self) -> FetchConfig {
        FetchConfig {
            use_cache: !self.no_cache,
            force_refresh: self.refresh,
        }
    }
}

/// Model overrides.
#[derive(Args, Debug, Clone)]
struct ModelArgs {
    /// Minimum tracts for a county to get its own slope
    #[arg(long)]
    min_tracts: Option<usize>,

    /// Sampling chains
    #[arg(long)]
    chains: Option<usize>,

    /// Iterations per chain, warmup included
    #[arg(long)]
    iterations: Option<usize>,

    /// Warmup iterations per chain
    #[arg(long)]
    warmup: Option<usize>,

    /// Random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Adjust county estimates for median home value
    #[arg(long)]
    include_home_value: bool,
}

impl ModelArgs {
    fn apply(&self, config: &mut AppConfig) {
        let model = &mut config.model;
        if let Some(min_tracts) = self.min_tracts {
            model.min_tracts = min_tracts;
        }
        if let Some(chains) = self.chains {
            model.chains = chains;
        }
        if let Some(iterations) = self.iterations {
            model.iterations = iterations;
        }
        if let Some(warmup) = self.warmup {
            model.warmup = warmup;
        }
        if let Some(seed) = self.seed {
            model.seed = seed;
        }
        if self.include_home_value {
            model.include_home_value = true;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// List California counties and their FIPS codes
    Counties,

    /// Download tracts and write them to CSV
    Fetch {
        #[command(flatten)]
        data: DataArgs,

        /// Output CSV path
        #[arg(short, long, default_value = "tracts.csv")]
        output: PathBuf,
    },

    /// Compare pooled and within-county slopes
    Simpson {
        #[command(flatten)]
        data: DataArgs,

        /// Minimum tracts for a county to get its own slope
        #[arg(long)]
        min_tracts: Option<usize>,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Compare county estimates from all three methods
    Compare {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// Output format
        #[arg(long, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Run every analysis and write the HTML report
    Report {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// HTML report path (defaults to the configured path)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Also export county estimates (.csv or .json)
        #[arg(long)]
        export: Option<PathBuf>,
    },

    /// Inspect or clear the tract cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Show cache location and contents
    Stats,
    /// Delete every cached tract
    Clear,
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Counties => list_counties(),
        Commands::Fetch { data, output } => {
            data.apply(&mut config);
            fetch(&config, &data, &output).await?;
        }
        Commands::Simpson {
            data,
            min_tracts,
            format,
        } => {
            data.apply(&mut config);
            if let Some(min_tracts) = min_tracts {
                config.model.min_tracts = min_tracts;
            }
            simpson(&config, &data, format).await?;
        }
        Commands::Compare {
            data,
            model,
            format,
        } => {
            data.apply(&mut config);
            model.apply(&mut config);
            config.validate()?;
            compare(&config, &data, format).await?;
        }
        Commands::Report {
            data,
            model,
            output,
            export,
        } => {
            data.apply(&mut config);
            model.apply(&mut config);
            if let Some(output) = output {
                config.output.report = output;
            }
            config.validate()?;
            report(&config, &data, export.as_deref()).await?;
        }
        Commands::Cache { action } => match action {
            CacheAction::Stats => print_cache_info()?,
            CacheAction::Clear => {
                open_cache()?.clear()?;
                println!("Cleared cache at {}", default_cache_path().display());
            }
        },
    }

    Ok(())
}

fn print_header(title: &str) {
    println!("\n╔══════════════════════════════════════════════════════════════╗");
    println!("║{:^62}║", title);
    println!("╚══════════════════════════════════════════════════════════════╝\n");
}

fn list_counties() {
    print_header("CALIFORNIA COUNTIES");
    for county in California.counties() {
        println!("  {}{}  {}", California.state_fips(), county.fips, county.name);
    }
    println!("\n{} counties", California.size());
}

/// Load tracts with a progress bar when they come from the API.
async fn load_with_progress(
    config: &AppConfig,
    data: &DataArgs,
) -> Result<LoadedTracts, Box<dyn std::error::Error>> {
    if data.input.is_some() {
        return Ok(load_tracts(config, data.input.as_deref(), &data.counties, &data.fetch_config(), None).await?);
    }

    let pb = ProgressBar::new(data.counties.len().max(1) as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("█▓░"),
    );
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message("Fetching census tracts...");

    match load_tracts(config, None, &data.counties, &data.fetch_config(), Some(&pb)).await {
        Ok(loaded) => {
            pb.finish_with_message(format!(
                "Loaded {} tracts in {} counties",
                loaded.tracts.len(),
                loaded.tracts.counties().len()
            ));
            if !loaded.failed.is_empty() {
                println!("Missing (fetch failed): {}", loaded.failed.join(", "));
            }
            Ok(loaded)
        }
        Err(e) => {
            pb.finish_with_message("Failed!");
            Err(format!("Failed to load tracts: {}", e).into())
        }
    }
}

async fn fetch(config: &AppConfig, data: &DataArgs, output: &Path) -> Result<(), Box<dyn std::error::Error>> {
    print_header(&format!(
        "CENSUS TRACTS: ACS {} {}",
        config.census.survey, config.census.year
    ));
    let tracts = load_with_progress(config, data).await?.tracts;
    tracts.write_csv(output)?;
    println!("\nWrote {} tracts to {}", tracts.len(), output.display());
    Ok(())
}

async fn simpson(config: &AppConfig, data: &DataArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    if format == OutputFormat::Text {
        print_header("POOLED VS WITHIN-COUNTY SLOPES");
    }
    let tracts = load_with_progress_quiet(config, data, format).await?.tracts;
    let report = run_simpson(&tracts, &config.model)?;

    match format {
        OutputFormat::Json => println!("{}", report.export_to_string(ExportFormat::PrettyJson)?),
        OutputFormat::Text => print_simpson(&report),
    }
    Ok(())
}

/// JSON output keeps stdout machine readable, so no progress bar.
async fn load_with_progress_quiet(
    config: &AppConfig,
    data: &DataArgs,
    format: OutputFormat,
) -> Result<LoadedTracts, Box<dyn std::error::Error>> {
    match format {
        OutputFormat::Text => load_with_progress(config, data).await,
        OutputFormat::Json => Ok(load_tracts(
            config,
            data.input.as_deref(),
            &data.counties,
            &data.fetch_config(),
            None,
        )
        .await?),
    }
}

fn print_simpson(report: &SimpsonReport) {
    println!();
    println!("{:<32} {:>12} {:>12} {:>12}", "Slope", "Estimate", "Std. Error", "p-value");
    println!("{}", "─".repeat(71));
    let rows = [
        Some(("Pooled (all tracts)", &report.pooled_slope)),
        Some(("Within county (fixed effects)", &report.within_slope)),
        report.between_slope.as_ref().map(|c| ("Between county (county means)", c)),
    ];
    for (label, c) in rows.into_iter().flatten() {
        println!(
            "{:<32} {:>12.5} {:>12.5} {:>12.4}",
            label, c.estimate, c.std_error, c.p_value
        );
    }

    if let Some(share) = report.opposite_share() {
        println!(
            "\n{} of {} counties ({:.0}%) slope against the pooled trend",
            report.n_opposite,
            report.county_slopes.len(),
            share * 100.0
        );
    }
    println!("\n{}", report.headline());
}

fn sampler_spinner(config: &AppConfig) -> Result<ProgressBar, Box<dyn std::error::Error>> {
    let pb = ProgressBar::new_spinner();
    pb.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb.set_message(format!(
        "Sampling multilevel model ({} chains x {} iterations)...",
        config.model.chains, config.model.iterations
    ));
    Ok(pb)
}

async fn compare(config: &AppConfig, data: &DataArgs, format: OutputFormat) -> Result<(), Box<dyn std::error::Error>> {
    if format == OutputFormat::Text {
        print_header("COUNTY GINI ESTIMATES");
    }
    let tracts = load_with_progress_quiet(config, data, format).await?.tracts;

    let analysis = match format {
        OutputFormat::Text => {
            let pb = sampler_spinner(config)?;
            let analysis = run_analysis(&tracts, &config.model);
            pb.finish_and_clear();
            analysis?
        }
        OutputFormat::Json => run_analysis(&tracts, &config.model)?,
    };

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&analysis)?),
        OutputFormat::Text => print_comparison(&analysis),
    }
    Ok(())
}

fn print_comparison(analysis: &Analysis) {
    let comparison = &analysis.comparison;
    let methods = EstimationMethod::all();

    println!(
        "\n{} tracts, {} counties (smallest first)\n",
        analysis.n_tracts, analysis.n_counties
    );
    print!("{:<24} {:>6}", "County", "Tracts");
    for method in methods {
        print!("  {:^24}", method.label());
    }
    println!();
    println!("{}", "─".repeat(31 + 26 * methods.len()));

    for county in comparison.counties_by_size() {
        let n = comparison.for_county(&county).iter().map(|e| e.n_tracts).max().unwrap_or(0);
        print!("{:<24} {:>6}", county, n);
        for method in methods {
            match comparison.get(&county, method) {
                Some(e) => print!("  {:.3} [{:.3}, {:.3}]    ", e.estimate, e.lower, e.upper),
                None => print!("  {:^24}", "-"),
            }
        }
        println!();
    }

    println!("\nMean interval width:");
    for method in methods {
        if let Some(width) = comparison.mean_interval_width(method) {
            println!("  {:<24} {:.4}", method.label(), width);
        }
    }

    println!("\nMultilevel hyper-parameters:");
    let table = multilevel_table(&analysis.multilevel);
    println!("  {:<10} {:>8} {:>8} {:>8} {:>8} {:>7}", "", "Mean", "SD", "Lower", "Upper", "R-hat");
    for row in &table.rows {
        println!(
            "  {:<10} {:>8} {:>8} {:>8} {:>8} {:>7}",
            row[0], row[1], row[2], row[3], row[4], row[5]
        );
    }
    if !analysis.multilevel.converged() {
        println!(
            "\nWarning: max R-hat {:.3}; increase --iterations",
            analysis.multilevel.max_rhat()
        );
    }
}

async fn report(config: &AppConfig, data: &DataArgs, export: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    print_header("INEQUALITY AND HOME VALUES REPORT");
    let LoadedTracts { tracts, failed } = load_with_progress(config, data).await?;

    let pb = sampler_spinner(config)?;
    let analysis = run_analysis(&tracts, &config.model);
    pb.finish_and_clear();
    let analysis = analysis?;

    println!("{}", analysis.simpson.headline());

    let report = build_report(&tracts, &analysis, config, &failed)?;
    report.write_html(&config.output.report)?;
    info!(path = %config.output.report.display(), figures = report.figure_count(), "wrote report");
    println!("\nReport written to {}", config.output.report.display());

    if let Some(path) = export {
        let format = ExportFormat::from_path(path)?;
        analysis.comparison.export_to_file(path, format)?;
        println!("Estimates exported to {} ({})", path.display(), format);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_compare() {
        let cli = Cli::try_parse_from([
            "gini",
            "-vv",
            "compare",
            "--county",
            "Alameda,Marin",
            "--chains",
            "2",
            "--include-home-value",
            "--format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        let Commands::Compare { data, model, format } = cli.command else {
            panic!("expected compare");
        };
        assert_eq!(data.counties, vec!["Alameda", "Marin"]);
        assert_eq!(format, OutputFormat::Json);

        let mut config = AppConfig::default();
        model.apply(&mut config);
        assert_eq!(config.model.chains, 2);
        assert!(config.model.include_home_value);
        assert_eq!(config.model.iterations, 2000);
    }

    #[test]
    fn test_parse_fetch_survey() {
        let cli = Cli::try_parse_from(["gini", "fetch", "--survey", "acs1", "--year", "2021", "-o", "out.csv"]).unwrap();
        let Commands::Fetch { data, output } = cli.command else {
            panic!("expected fetch");
        };
        let mut config = AppConfig::default();
        data.apply(&mut config);
        assert_eq!(config.census.survey, Survey::Acs1);
        assert_eq!(config.census.year, 2021);
        assert_eq!(output, PathBuf::from("out.csv"));
        assert!(data.fetch_config().use_cache);
    }

    #[test]
    fn test_unknown_survey_rejected() {
        assert!(Cli::try_parse_from(["gini", "fetch", "--survey", "decennial"]).is_err());
    }
}
