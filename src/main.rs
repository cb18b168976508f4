//! conflux-slither - Slither audits for verified ConfluxScan contracts
//!
//! Fetches the verified source of one contract, rebuilds its project tree,
//! activates a matching solc and writes `analysis_summary.md` next to the
//! analyzer's JSON report.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use conflux_slither::utils::constants::{APP_NAME, APP_VERSION};
use conflux_slither::{AnalysisConfig, AuditPipeline, Network, RangeUpperBound, RunSummary};

#[derive(Debug, Parser)]
#[command(
    name = "conflux-slither",
    version,
    about = "Run Slither on a verified ConfluxScan contract"
)]
struct Cli {
    /// Contract address (0x... for eSpace, cfx:... for Core Space)
    #[arg(required_unless_present = "analyze_existing")]
    address: Option<String>,

    /// Re-analyze a `<address>_analysis` directory from an earlier run
    #[arg(long, value_name = "DIR", conflicts_with_all = ["address", "download_only"])]
    analyze_existing: Option<PathBuf>,

    /// Explorer network: espace, espace-testnet or core
    #[arg(long, default_value = "espace")]
    network: Network,

    /// Directory in which `<address>_analysis` is created
    #[arg(long, short = 'o', default_value = ".")]
    output_dir: PathBuf,

    /// Only download and resolve sources, skip compiler and analyzer
    #[arg(long)]
    download_only: bool,

    /// Render finding line numbers as ranges (3-5, 9)
    #[arg(long)]
    compact_lines: bool,

    /// Pass --solc-remaps for every dependency directory
    #[arg(long)]
    remap_dependencies: bool,

    /// Treat `<B` in `>=A <B` pragmas as inclusive, component by component
    #[arg(long)]
    inclusive_range_upper_bound: bool,

    /// Explorer API base URL (overrides the network default)
    #[arg(long, env = "EXPLORER_API_URL")]
    explorer_url: Option<String>,

    /// Debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

/// What to analyze
#[derive(Debug, PartialEq, Eq)]
enum Target {
    Address(String),
    Existing(PathBuf),
}

impl Cli {
    fn into_config(self) -> (Target, AnalysisConfig) {
        let mut config = AnalysisConfig::default().with_network(self.network);
        if let Some(url) = self.explorer_url {
            config = config.with_explorer_url(url);
        }
        config.output_dir = self.output_dir;
        config.download_only = self.download_only;
        config.compact_lines = self.compact_lines;
        config.remap_dependencies = self.remap_dependencies;
        if self.inclusive_range_upper_bound {
            config.range_upper_bound = RangeUpperBound::InclusiveComponentwise;
        }
        let target = match (self.analyze_existing, self.address) {
            (Some(dir), _) => Target::Existing(dir),
            (None, address) => Target::Address(address.unwrap_or_default()),
        };
        (target, config)
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();
}

fn print_summary(summary: &RunSummary) {
    println!("\n📊 Run Summary:");
    println!("   Address:       {} ({})", summary.address, summary.network);
    println!("   Project:       {}", summary.layout.root.display());
    println!("   Main contract: {}", summary.layout.main_contract_rel_path.display());
    println!(
        "   Dependencies:  {} fetched, {} linked, {} present, {} failed",
        summary.resolution.fetched.len(),
        summary.resolution.linked.len(),
        summary.resolution.skipped,
        summary.resolution.failures.len()
    );
    for failure in &summary.resolution.failures {
        println!(
            "     ⚠️ {} (from {}): {}",
            failure.specifier,
            failure.importer.display(),
            failure.reason
        );
    }
    if let Some(choice) = &summary.compiler {
        println!("   Compiler:      solc {}", choice.version);
    }
    if let Some(json) = &summary.report_json {
        println!("   JSON report:   {}", json.display());
    }
    if let Some(code) = summary.analyzer_exit_code {
        println!("   Analyzer exit: {}", code);
    }
    if let Some(md) = &summary.summary_markdown {
        println!("   Summary:       {}", md.display());
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    tracing::info!("🚀 {} v{}", APP_NAME, APP_VERSION);

    let (target, config) = cli.into_config();
    let pipeline = match AuditPipeline::new(config) {
        Ok(p) => p,
        Err(e) => {
            eprintln!("❌ {}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = match &target {
        Target::Address(address) => pipeline.run(address).await,
        Target::Existing(dir) => pipeline.analyze_existing(dir).await,
    };
    match result {
        Ok(summary) => {
            print_summary(&summary);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("❌ {}", e);
            ExitCode::FAILURE
        }
    }
}
