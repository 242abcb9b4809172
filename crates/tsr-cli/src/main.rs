use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use tsr_lib::{
    route_or_report, CostModel, FailureSummary, FeatureConfig, GradientCurves, NodeKind,
    RasterSources, RouteOutcome, RouteRenderMode, RouteSummary, SearchOptions, TriangleMesh,
};

/// Exit status used when the search finishes without reaching the goal.
const NO_ROUTE_EXIT: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about = "Least-cost routing over triangulated terrain")]
struct Cli {
    /// Output format for command results.
    #[arg(long, value_enum, default_value_t = OutputFormat::Text, global = true)]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Rich,
    Json,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute the cheapest route between two mesh vertices.
    Route {
        /// Mesh document (JSON with `vertices`, `faces` and optional `warnings`).
        #[arg(long)]
        mesh: PathBuf,
        /// Feature graph document. Defaults to the built-in hiking model.
        #[arg(long)]
        features: Option<PathBuf>,
        /// Starting vertex index.
        #[arg(long = "from")]
        from: usize,
        /// Destination vertex index.
        #[arg(long = "to")]
        to: usize,
        /// Walking speed on flat ground, in metres per second.
        #[arg(long, default_value_t = 1.33)]
        base_speed: f64,
        /// Give up after this many vertex expansions.
        #[arg(long)]
        max_expansions: Option<usize>,
    },
    /// Validate a feature graph document without routing.
    Check {
        /// Feature graph document. Defaults to the built-in hiking model.
        #[arg(long)]
        features: Option<PathBuf>,
    },
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Route {
            mesh,
            features,
            from,
            to,
            base_speed,
            max_expansions,
        } => {
            let mut options = SearchOptions::default();
            if let Some(limit) = max_expansions {
                options.max_expansions = limit;
            }
            let request = RouteArgs {
                mesh: &mesh,
                features: features.as_deref(),
                from,
                to,
                base_speed,
                options,
            };
            handle_route(&request, cli.format)
        }
        Command::Check { features } => handle_check(features.as_deref(), cli.format),
    }
}

struct RouteArgs<'a> {
    mesh: &'a Path,
    features: Option<&'a Path>,
    from: usize,
    to: usize,
    base_speed: f64,
    options: SearchOptions,
}

fn handle_route(args: &RouteArgs<'_>, format: OutputFormat) -> Result<ExitCode> {
    let mesh = TriangleMesh::load(args.mesh)
        .with_context(|| format!("failed to load mesh from {}", args.mesh.display()))?;
    let model = load_model(args.features)?;
    let curves = speed_curves(&model);

    let outcome = route_or_report(&mesh, &model, args.from, args.to, &args.options)
        .with_context(|| format!("failed to plan a route from {} to {}", args.from, args.to))?;
    let route = match outcome {
        RouteOutcome::Found(route) => route,
        RouteOutcome::Unreachable { error, report } => {
            eprintln!("Error: {error}");
            let summary = FailureSummary::from_failure(&report);
            match format {
                OutputFormat::Json => {
                    let json = serde_json::to_string_pretty(&summary)
                        .context("failed to serialise failure summary")?;
                    println!("{json}");
                }
                OutputFormat::Text => print!("{}", summary.render(RouteRenderMode::PlainText)),
                OutputFormat::Rich => print!("{}", summary.render(RouteRenderMode::RichText)),
            }
            return Ok(ExitCode::from(NO_ROUTE_EXIT));
        }
    };

    let summary = RouteSummary::from_route(&route, &curves, args.base_speed);
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&summary)
                .context("failed to serialise route summary")?;
            println!("{json}");
        }
        OutputFormat::Text => print!("{}", summary.render(RouteRenderMode::PlainText)),
        OutputFormat::Rich => print!("{}", summary.render(RouteRenderMode::RichText)),
    }

    Ok(ExitCode::SUCCESS)
}

fn handle_check(features: Option<&Path>, format: OutputFormat) -> Result<ExitCode> {
    let model = load_model(features)?;
    let graph = model.graph();
    let root = graph
        .node(model.root())
        .context("root feature missing from graph")?;

    match format {
        OutputFormat::Json => {
            let report = serde_json::json!({
                "features": graph.len(),
                "root": root.name(),
                "output": root.kind().output_kind(),
            });
            println!("{report}");
        }
        OutputFormat::Text | OutputFormat::Rich => println!(
            "Feature graph OK: {} features, root {} ({})",
            graph.len(),
            root.name(),
            root.kind().output_kind()
        ),
    }
    Ok(ExitCode::SUCCESS)
}

fn load_model(path: Option<&Path>) -> Result<CostModel> {
    let config = match path {
        Some(path) => FeatureConfig::load(path)
            .with_context(|| format!("failed to read feature graph from {}", path.display()))?,
        None => FeatureConfig::hiking().context("built-in feature graph is invalid")?,
    };
    config
        .build(&RasterSources::new())
        .context("failed to build feature graph")
}

/// Curves used for the travel-time estimate: those of the first gradient
/// speed feature in the model, or the defaults.
fn speed_curves(model: &CostModel) -> GradientCurves {
    model
        .graph()
        .iter()
        .find_map(|(_, node)| match node.kind() {
            NodeKind::GradientSpeed(curves) => Some(curves.clone()),
            _ => None,
        })
        .unwrap_or_default()
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
}
