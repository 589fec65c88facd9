use anyhow::Context;
use clap::{Parser, Subcommand};
use comfy_table::Table;
use configuration::{init_tracing, load_config, LogFormat};
use engine::{
    frame_to_rows, AssembledTable, BenchmarkQuery, DataEngine, FinancialProfile, JsonRow,
    LookupOutcome, RevenueSeries, SectorReport, TimeseriesQuery,
};
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use partition_source::{HuggingFaceSource, PartitionSource};
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;

/// The main entry point for the RFSD query engine.
#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

// ==============================================================================
// CLI Structure
// ==============================================================================

/// Query the Russian Financial Statements Database by company, year and sector.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file. A missing file means defaults.
    #[arg(long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Overrides the configured log format.
    #[arg(long, global = true, value_enum)]
    log_format: Option<LogFormat>,

    /// Years to load into the cache before running the command (e.g. "2022,2023").
    /// Overrides `cache.preload_years`.
    #[arg(long, global = true, value_delimiter = ',')]
    preload: Option<Vec<i32>>,

    /// Print results as JSON instead of tables.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the available partition years.
    Years,
    /// Show the columns of one partition.
    Schema {
        #[arg(long)]
        year: i32,
    },
    /// Show the first rows of one partition.
    Sample {
        #[arg(long)]
        year: i32,
        /// Columns to show; all when omitted.
        #[arg(long, value_delimiter = ',')]
        columns: Vec<String>,
        #[arg(long, default_value_t = 10)]
        rows: usize,
    },
    /// Find a company's rows in one year.
    Lookup {
        #[arg(long)]
        inn: String,
        #[arg(long)]
        year: i32,
        /// Columns to show; all when omitted.
        #[arg(long, value_delimiter = ',')]
        fields: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Collect a company's rows across years into one table.
    Timeseries {
        #[arg(long)]
        inn: String,
        #[arg(long, value_delimiter = ',')]
        years: Option<Vec<i32>>,
        #[arg(long, value_delimiter = ',')]
        fields: Option<Vec<String>>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Show a company's revenue per year.
    Revenue {
        #[arg(long)]
        inn: String,
        #[arg(long, value_delimiter = ',')]
        years: Option<Vec<i32>>,
    },
    /// Show every financial statement line of a company across years.
    Profile {
        #[arg(long)]
        inn: String,
        #[arg(long, value_delimiter = ',')]
        years: Option<Vec<i32>>,
    },
    /// Compare one or more companies with the median of their sector.
    Benchmark {
        /// Repeat or comma-separate to benchmark several companies concurrently.
        #[arg(long, required = true, value_delimiter = ',')]
        inn: Vec<String>,
        #[arg(long, value_delimiter = ',')]
        years: Option<Vec<i32>>,
        #[arg(long, value_delimiter = ',')]
        metrics: Option<Vec<String>>,
        /// Maximum category rows scanned per year.
        #[arg(long)]
        scan_cap: Option<usize>,
    },
    /// Show what the partition cache holds.
    CacheStats,
}

// ==============================================================================
// Command Dispatch
// ==============================================================================

async fn run() -> anyhow::Result<()> {
    // A missing .env file is fine; the token may come from the real environment.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)
        .with_context(|| format!("Failed to load configuration from {}", cli.config.display()))?;
    if let Some(format) = cli.log_format {
        config.logging.format = format;
    }
    let _log_guard = init_tracing(&config.logging)?;

    let source: Arc<dyn PartitionSource> = Arc::new(HuggingFaceSource::new(&config.remote)?);
    let engine = DataEngine::from_config(&config, source)?;

    let preload_years = cli.preload.clone().unwrap_or_else(|| config.cache.preload_years.clone());
    if !preload_years.is_empty() {
        preload_with_progress(&engine, &preload_years).await?;
    }

    let show_stats = matches!(cli.command, Commands::CacheStats) || !preload_years.is_empty();
    match cli.command {
        Commands::Years => {
            let years: Vec<i32> = engine.list_years().iter().map(|y| y.value()).collect();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&years)?);
            } else {
                let listed: Vec<String> = years.iter().map(|y| y.to_string()).collect();
                println!("{}", listed.join(", "));
            }
        }
        Commands::Schema { year } => {
            let columns = engine.schema_columns(year).await?;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&columns)?);
            } else {
                for column in columns {
                    println!("{column}");
                }
            }
        }
        Commands::Sample { year, columns, rows } => {
            let frame = engine.sample(year, &columns, rows).await?;
            let columns = frame.get_column_names().iter().map(|c| c.to_string()).collect();
            print_rows(columns, &frame_to_rows(&frame)?, cli.json)?;
        }
        Commands::Lookup {
            inn,
            year,
            fields,
            limit,
        } => match engine.lookup(year, &inn, &fields, limit).await? {
            LookupOutcome::Found(frame) => {
                let columns = frame.get_column_names().iter().map(|c| c.to_string()).collect();
                print_rows(columns, &frame_to_rows(&frame)?, cli.json)?;
            }
            LookupOutcome::Empty { .. } if cli.json => println!("[]"),
            LookupOutcome::Empty { .. } => println!("No rows for INN {inn} in {year}."),
        },
        Commands::Timeseries {
            inn,
            years,
            fields,
            limit,
        } => {
            let query = TimeseriesQuery {
                key: inn,
                years,
                fields,
                limit,
            };
            let table = engine.assemble(&query).await?;
            print_assembled(&table, cli.json)?;
        }
        Commands::Revenue { inn, years } => {
            let series = engine.revenue_timeseries(&inn, years.as_deref()).await?;
            print_revenue(&series, cli.json)?;
        }
        Commands::Profile { inn, years } => {
            let profile = engine.financial_profile(&inn, years.as_deref()).await?;
            print_profile(&profile, cli.json)?;
        }
        Commands::Benchmark {
            inn,
            years,
            metrics,
            scan_cap,
        } => {
            let queries = inn.into_iter().map(|key| BenchmarkQuery {
                key,
                years: years.clone(),
                metrics: metrics.clone(),
                scan_cap,
            });
            let engine = &engine;
            let reports = join_all(queries.map(|query| async move {
                let report = engine.sector_benchmark(&query).await;
                (query.key, report)
            }))
            .await;

            for (key, report) in reports {
                match report {
                    Ok(report) => print_benchmark(&report, cli.json)?,
                    Err(e) => eprintln!("Benchmark for INN {key} failed: {e}"),
                }
            }
        }
        Commands::CacheStats => {}
    }

    if show_stats {
        let stats = engine.cache_stats().await;
        if cli.json {
            println!("{}", serde_json::to_string_pretty(&stats)?);
        } else {
            println!(
                "Cache: {} partition(s) {:?}, {} rows, ~{:.1} MiB",
                stats.count,
                stats.cached_years,
                stats.total_rows,
                stats.approx_megabytes()
            );
        }
    }

    Ok(())
}

/// Loads each year into the cache one by one behind a progress bar.
/// A year that fails to load is logged and skipped.
async fn preload_with_progress(engine: &DataEngine, years: &[i32]) -> anyhow::Result<()> {
    for &year in years {
        engine.registry().validate(year)?;
    }

    let progress_bar = ProgressBar::new(years.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")?
            .progress_chars("#>-"),
    );

    for &year in years {
        progress_bar.set_message(format!("Loading {year}..."));
        if let Err(e) = engine.preload_year(year).await {
            tracing::warn!(year, error = %e, "Preload failed, continuing without this year.");
        }
        progress_bar.inc(1);
    }
    progress_bar.finish_with_message("Preload complete!");
    Ok(())
}

// ==============================================================================
// Output Rendering
// ==============================================================================

fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

fn number(value: Option<f64>) -> String {
    value.map(|v| format!("{v:.2}")).unwrap_or_default()
}

fn rows_table(columns: &[String], rows: &[JsonRow]) -> Table {
    let mut table = Table::new();
    table.set_header(columns);
    for row in rows {
        table.add_row(columns.iter().map(|c| cell(row.get(c))));
    }
    table
}

fn print_rows(columns: Vec<String>, rows: &[JsonRow], json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(rows)?);
        return Ok(());
    }
    println!("{}", rows_table(&columns, rows));
    Ok(())
}

fn print_assembled(table: &AssembledTable, json: bool) -> anyhow::Result<()> {
    let output = table.to_output()?;
    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }
    println!("{}", rows_table(&output.columns, &output.rows));
    let meta = &output.meta;
    println!(
        "{} row(s) from years {:?} in {:.2} ms",
        meta.matched_rows, meta.years_scanned, meta.elapsed_ms
    );
    if !meta.dropped_fields.is_empty() {
        println!("Dropped fields (absent from the first year): {}", meta.dropped_fields.join(", "));
    }
    for (year, error) in &meta.year_errors {
        println!("Year {year} failed: {error}");
    }
    Ok(())
}

fn print_revenue(series: &RevenueSeries, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(series)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec!["Year", "Revenue (line_2110)"]);
    for point in &series.series {
        table.add_row(vec![point.year.to_string(), number(point.revenue)]);
    }
    println!("INN {}\n{table}", series.key);
    Ok(())
}

fn print_profile(profile: &FinancialProfile, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(profile)?);
        return Ok(());
    }
    let mut table = Table::new();
    let mut header = vec!["Indicator".to_string()];
    header.extend(profile.years.iter().map(|y| y.to_string()));
    table.set_header(header);
    for indicator in &profile.indicators {
        let mut row = vec![indicator.code.clone()];
        row.extend(indicator.values.iter().map(|v| number(*v)));
        table.add_row(row);
    }
    println!(
        "INN {} (indicators from {}, generated {})\n{table}",
        profile.key,
        profile.reference_year,
        profile.generated_at.to_rfc3339()
    );
    Ok(())
}

fn print_benchmark(report: &SectorReport, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }
    let mut table = Table::new();
    table.set_header(vec![
        "Year", "Sector", "Metric", "Company", "Sector median", "Sampled rows",
    ]);
    for result in &report.results {
        for metric in &result.metrics {
            let sampled = if result.truncated {
                format!("{} (capped)", result.sampled_rows)
            } else {
                result.sampled_rows.to_string()
            };
            table.add_row(vec![
                result.year.to_string(),
                result.category.clone(),
                metric.metric.clone(),
                number(metric.company_value),
                number(metric.sector_median),
                sampled,
            ]);
        }
    }
    println!("INN {} by {}\n{table}", report.key, report.category_column);
    if !report.meta.rate_limit_errors.is_empty() {
        println!("Rate limited years: {:?}", report.meta.rate_limit_errors);
    }
    if let Some(hint) = &report.meta.hint {
        println!("{hint}");
    }
    Ok(())
}
