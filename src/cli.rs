//! CLI definition and dispatch.

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::{read_shares, CsvAdapter, CsvHoldingsAdapter};
use crate::adapters::csv_report_adapter::CsvReportAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_adapter::{error_response, weights_response, AllocationRequest, JsonReportAdapter};
use crate::domain::config_validation::{parse_double, validate_config, view_sections};
use crate::domain::error::LittermanError;
use crate::domain::estimator::ReturnMethod;
use crate::domain::metrics::{normalize_base100, PortfolioSummary};
use crate::domain::model::{Allocation, BlackLitterman};
use crate::domain::optimizer::{OptimizerConfig, DEFAULT_MAX_DEVIATION};
use crate::domain::posterior::DEFAULT_TAU;
use crate::domain::universe::{parse_assets, MarketComposition};
use crate::domain::view::View;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::{DataPort, HoldingsPort};
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "litterman", about = "Black-Litterman portfolio allocation")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Compute bounded optimal weights from an INI configuration
    Optimize {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        prices: Option<PathBuf>,
        #[arg(long)]
        composition: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        max_deviation: Option<f64>,
    },
    /// Answer a JSON allocation request
    Request {
        #[arg(short, long)]
        input: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the implied equilibrium returns
    Equilibrium {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Validate a configuration without running the model
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Summarize the risk of a share-count portfolio
    Analyze {
        #[arg(long)]
        prices: PathBuf,
        #[arg(long)]
        shares: PathBuf,
    },
}

/// Report output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    Csv,
    Json,
}

impl ReportFormat {
    pub fn port(self) -> Box<dyn ReportPort> {
        match self {
            ReportFormat::Csv => Box::new(CsvReportAdapter),
            ReportFormat::Json => Box::new(JsonReportAdapter),
        }
    }
}

/// Model and optimizer parameters read from `[model]` and `[optimizer]`.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSettings {
    pub risk_aversion: f64,
    pub tau: f64,
    pub return_method: ReturnMethod,
    pub annualize: bool,
    pub optimizer: OptimizerConfig,
    pub max_deviation: f64,
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Optimize {
            config,
            prices,
            composition,
            output,
            max_deviation,
        } => run_optimize(
            &config,
            prices.as_ref(),
            composition.as_ref(),
            output.as_ref(),
            max_deviation,
        ),
        Command::Request { input, output } => run_request(&input, output.as_ref()),
        Command::Equilibrium { config } => run_equilibrium(&config),
        Command::Validate { config } => run_validate(&config),
        Command::Analyze { prices, shares } => run_analyze(&prices, &shares),
    }
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|err| {
        eprintln!("error: {err}");
        ExitCode::from(&err)
    })
}

fn fail(err: LittermanError) -> ExitCode {
    eprintln!("error: {err}");
    (&err).into()
}

fn run_optimize(
    config_path: &Path,
    prices_override: Option<&PathBuf>,
    composition_override: Option<&PathBuf>,
    output_override: Option<&PathBuf>,
    max_deviation_override: Option<f64>,
) -> ExitCode {
    // Stage 1: Load and validate config
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&adapter) {
        return fail(e);
    }

    // Stage 2: Resolve inputs
    let prices = match resolve_path(prices_override, &adapter, "data", "prices") {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let composition = match resolve_path(composition_override, &adapter, "data", "composition") {
        Ok(p) => p,
        Err(e) => return fail(e),
    };
    let format = match report_format(&adapter) {
        Ok(f) => f,
        Err(e) => return fail(e),
    };
    let output = output_override
        .cloned()
        .or_else(|| adapter.get_string("report", "output").map(PathBuf::from))
        .unwrap_or_else(|| match format {
            ReportFormat::Csv => PathBuf::from("weights.csv"),
            ReportFormat::Json => PathBuf::from("weights.json"),
        });

    // Stages 3-6: Estimate, combine views, optimize, report
    let data_port = CsvAdapter::new(prices);
    let holdings = CsvHoldingsAdapter::new(composition);
    let report = format.port();
    match run_optimize_pipeline(
        &adapter,
        &data_port,
        &holdings,
        report.as_ref(),
        &output,
        max_deviation_override,
    ) {
        Ok(allocation) => {
            print_allocation(&allocation);
            eprintln!("\nReport written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(e),
    }
}

/// Builds the model from the configured ports, applies the configured
/// views and writes the allocation through `report`.
pub fn run_optimize_pipeline(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
    holdings: &dyn HoldingsPort,
    report: &dyn ReportPort,
    output: &Path,
    max_deviation_override: Option<f64>,
) -> Result<Allocation, LittermanError> {
    let settings = build_model_settings(config)?;
    let views = build_views(config)?;
    let model = build_model(config, &settings, data_port, holdings)?;

    let max_deviation = max_deviation_override.unwrap_or(settings.max_deviation);
    eprintln!(
        "Optimizing {} assets with {} views (max deviation {:.0}%)",
        model.universe().len(),
        views.len(),
        max_deviation * 100.0
    );
    let allocation = model.allocate(&views, max_deviation)?;
    report.write(&allocation, output)?;
    Ok(allocation)
}

pub fn build_model(
    config: &dyn ConfigPort,
    settings: &ModelSettings,
    data_port: &dyn DataPort,
    holdings: &dyn HoldingsPort,
) -> Result<BlackLitterman, LittermanError> {
    let composition = configured_composition(config, holdings)?;
    let start_date = config_date(config, "start_date")?;
    let end_date = config_date(config, "end_date")?;
    let prices = data_port.fetch_prices(start_date, end_date)?;
    eprintln!(
        "Loaded {} price rows for {} assets",
        prices.len(),
        composition.entries().len()
    );

    BlackLitterman::builder(composition, prices)
        .risk_aversion(settings.risk_aversion)
        .tau(settings.tau)
        .return_method(settings.return_method)
        .annualize(settings.annualize)
        .optimizer(settings.optimizer)
        .build()
}

/// Holdings with the `[data] exclude` assets removed.
pub fn configured_composition(
    config: &dyn ConfigPort,
    holdings: &dyn HoldingsPort,
) -> Result<MarketComposition, LittermanError> {
    let mut composition = holdings.fetch_composition()?;
    if let Some(exclude) = config.get_string("data", "exclude") {
        for asset in parse_assets(&exclude) {
            composition = composition.without(&asset)?;
        }
    }
    Ok(composition)
}

/// What `validate` learned about the configured inputs.
#[derive(Debug, Clone, PartialEq)]
pub struct InputCheck {
    /// Price columns available in the data source.
    pub assets: Vec<String>,
    /// Composition after exclusions, in percent.
    pub composition: MarketComposition,
    pub data_range: Option<(NaiveDate, NaiveDate, usize)>,
}

/// Cross-checks holdings against the price source without estimating
/// anything. Every composition asset must have a price column.
pub fn check_inputs(
    config: &dyn ConfigPort,
    data_port: &dyn DataPort,
    holdings: &dyn HoldingsPort,
) -> Result<InputCheck, LittermanError> {
    let assets = data_port.list_assets()?;
    let composition = configured_composition(config, holdings)?;
    let missing: Vec<String> = composition
        .assets()
        .into_iter()
        .filter(|a| !assets.contains(a))
        .collect();
    if !missing.is_empty() {
        return Err(LittermanError::InputMismatch {
            reason: format!("assets missing from price data: {}", missing.join(", ")),
        });
    }
    Ok(InputCheck {
        assets,
        composition: composition.normalized_to_100(),
        data_range: data_port.get_data_range()?,
    })
}

pub fn build_model_settings(config: &dyn ConfigPort) -> Result<ModelSettings, LittermanError> {
    let risk_aversion =
        parse_double(config, "model", "risk_aversion")?.ok_or_else(|| LittermanError::ConfigMissing {
            section: "model".into(),
            key: "risk_aversion".into(),
        })?;
    let return_method = match config.get_string("model", "return_method") {
        Some(s) => s.parse::<ReturnMethod>().map_err(|e| LittermanError::ConfigInvalid {
            section: "model".into(),
            key: "return_method".into(),
            reason: e.to_string(),
        })?,
        None => ReturnMethod::default(),
    };
    let defaults = OptimizerConfig::default();

    Ok(ModelSettings {
        risk_aversion,
        tau: parse_double(config, "model", "tau")?.unwrap_or(DEFAULT_TAU),
        return_method,
        annualize: config.get_bool("model", "annualize", true),
        optimizer: OptimizerConfig {
            max_iterations: config
                .get_int("optimizer", "max_iterations", defaults.max_iterations as i64)
                .max(1) as usize,
            tolerance: parse_double(config, "optimizer", "tolerance")?.unwrap_or(defaults.tolerance),
        },
        max_deviation: parse_double(config, "optimizer", "max_deviation")?
            .unwrap_or(DEFAULT_MAX_DEVIATION),
    })
}

/// Views from every `[view.<name>]` section, in section-name order.
pub fn build_views(config: &dyn ConfigPort) -> Result<Vec<View>, LittermanError> {
    let mut views = Vec::new();
    for section in view_sections(config) {
        let mut view = match config.get_string(&section, "assets") {
            Some(assets) => View::on(&assets),
            None => View::default(),
        };
        if let Some(excess) = parse_double(config, &section, "excess_return")? {
            view = view.with_excess_return(excess);
        }
        if let Some(confidence) = parse_double(config, &section, "confidence")? {
            view = view.with_confidence(confidence);
        }
        views.push(view);
    }
    Ok(views)
}

pub fn report_format(config: &dyn ConfigPort) -> Result<ReportFormat, LittermanError> {
    match config.get_string("report", "format") {
        None => Ok(ReportFormat::Csv),
        Some(s) => match s.trim().to_ascii_lowercase().as_str() {
            "csv" => Ok(ReportFormat::Csv),
            "json" => Ok(ReportFormat::Json),
            other => Err(LittermanError::ConfigInvalid {
                section: "report".into(),
                key: "format".into(),
                reason: format!("unknown report format '{other}'"),
            }),
        },
    }
}

fn resolve_path(
    override_path: Option<&PathBuf>,
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
) -> Result<PathBuf, LittermanError> {
    match override_path {
        Some(p) => Ok(p.clone()),
        None => config
            .get_string(section, key)
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| LittermanError::ConfigMissing {
                section: section.into(),
                key: key.into(),
            }),
    }
}

fn config_date(config: &dyn ConfigPort, key: &str) -> Result<Option<NaiveDate>, LittermanError> {
    config
        .get_string("data", key)
        .map(|s| {
            NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| LittermanError::ConfigInvalid {
                section: "data".into(),
                key: key.into(),
                reason: "invalid date format (expected YYYY-MM-DD)".into(),
            })
        })
        .transpose()
}

fn print_allocation(allocation: &Allocation) {
    eprintln!("\n=== Allocation ===");
    eprintln!(
        "  {:<16} {:>10} {:>12} {:>12} {:>10}",
        "asset", "market", "equilibrium", "posterior", "weight"
    );
    for (i, (asset, weight)) in allocation.weights.iter().enumerate() {
        eprintln!(
            "  {:<16} {:>9.2}% {:>11.2}% {:>11.2}% {:>9.2}%",
            asset,
            allocation.market_weights[i] * 100.0,
            allocation.equilibrium[i] * 100.0,
            allocation.posterior[i] * 100.0,
            weight * 100.0,
        );
    }
    eprintln!("Views applied:    {}", allocation.view_count);
    eprintln!(
        "Expected return:  {:.2}%",
        allocation.weights.expected_return() * 100.0
    );
    eprintln!(
        "Volatility:       {:.2}%",
        allocation.weights.volatility() * 100.0
    );
}

fn run_request(input: &Path, output: Option<&PathBuf>) -> ExitCode {
    let body = match fs::read_to_string(input) {
        Ok(b) => b,
        Err(e) => return fail(e.into()),
    };

    let (response, code) =
        match AllocationRequest::from_json(&body).and_then(AllocationRequest::allocate) {
            Ok(allocation) => (weights_response(&allocation.weights), ExitCode::SUCCESS),
            Err(e) => {
                eprintln!("error: {e}");
                (error_response(&e), ExitCode::from(&e))
            }
        };

    let rendered = match serde_json::to_string_pretty(&response) {
        Ok(s) => s,
        Err(e) => return fail(e.into()),
    };
    match output {
        Some(path) => {
            if let Err(e) = fs::write(path, rendered) {
                return fail(e.into());
            }
            eprintln!("Response written to: {}", path.display());
        }
        None => println!("{rendered}"),
    }
    code
}

fn run_equilibrium(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&adapter) {
        return fail(e);
    }

    let result = resolve_path(None, &adapter, "data", "prices").and_then(|prices| {
        let composition = resolve_path(None, &adapter, "data", "composition")?;
        let settings = build_model_settings(&adapter)?;
        build_model(
            &adapter,
            &settings,
            &CsvAdapter::new(prices),
            &CsvHoldingsAdapter::new(composition),
        )
    });
    let model = match result {
        Ok(m) => m,
        Err(e) => return fail(e),
    };

    println!("asset,equilibrium_return");
    for (asset, pi) in model.universe().iter().zip(model.equilibrium_returns().iter()) {
        println!("{asset},{pi}");
    }
    ExitCode::SUCCESS
}

fn run_validate(config_path: &Path) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    if let Err(e) = validate_config(&adapter) {
        return fail(e);
    }

    let views = match build_views(&adapter) {
        Ok(v) => v,
        Err(e) => return fail(e),
    };
    eprintln!("Config validated successfully");
    eprintln!("  views: {}", views.len());

    let (Ok(prices), Ok(composition)) = (
        resolve_path(None, &adapter, "data", "prices"),
        resolve_path(None, &adapter, "data", "composition"),
    ) else {
        return ExitCode::SUCCESS;
    };
    let check = match check_inputs(
        &adapter,
        &CsvAdapter::new(prices),
        &CsvHoldingsAdapter::new(composition),
    ) {
        Ok(c) => c,
        Err(e) => return fail(e),
    };
    eprintln!("  price columns: {}", check.assets.join(", "));
    match check.data_range {
        Some((start, end, rows)) => eprintln!("  prices: {rows} rows, {start} to {end}"),
        None => eprintln!("  prices: no rows"),
    }
    eprintln!("  composition:");
    for (asset, pct) in check.composition.entries() {
        eprintln!("    {asset:<16} {pct:>6.2}%");
    }
    ExitCode::SUCCESS
}

fn run_analyze(prices_path: &Path, shares_path: &Path) -> ExitCode {
    let result = read_shares(shares_path).and_then(|shares| {
        let prices = CsvAdapter::new(prices_path.to_path_buf()).fetch_prices(None, None)?;
        PortfolioSummary::compute(&prices, &shares)
    });
    let summary = match result {
        Ok(s) => s,
        Err(e) => return fail(e),
    };

    let values: Vec<f64> = summary.values.iter().map(|p| p.value).collect();
    let base100 = normalize_base100(&values);

    println!("=== Portfolio Summary ===");
    println!("Assets:            {}", summary.assets.join(", "));
    println!("Observations:      {}", summary.values.len());
    println!("Last value:        {:.2}", summary.last_value);
    println!("Last return:       {:.2}%", summary.last_return * 100.0);
    println!("Cumulative return: {:.2}%", summary.cumulative_return * 100.0);
    if let Some(last) = base100.last() {
        println!("Base 100:          {:.2}", last);
    }
    for (level, var) in &summary.value_at_risk {
        println!("VaR {:>4.0}%:         {:.2}%", level * 100.0, var * 100.0);
    }
    println!("Volatility:        {:.2}%", summary.volatility * 100.0);
    println!("Max drawdown:      {:.2}%", summary.max_drawdown * 100.0);

    println!("\n=== Correlation ===");
    for (i, asset) in summary.assets.iter().enumerate() {
        let row: Vec<String> = (0..summary.assets.len())
            .map(|j| format!("{:>6.2}", summary.correlation[(i, j)]))
            .collect();
        println!("{:<16} {}", asset, row.join(" "));
    }
    ExitCode::SUCCESS
}
