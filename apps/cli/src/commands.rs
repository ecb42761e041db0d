//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use techtree_core::{CorpusSelector, GraphvizRenderer, Route, RouteOptions};
use techtree_search::SearchIndex;
use techtree_shared::{AppConfig, StepDraft, init_config, load_config};
use tracing::{debug, info};

use crate::prompt::{self, PromptChooser};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// techtree — plan a tech-tree of steps, products, and prerequisites.
#[derive(Parser)]
#[command(
    name = "techtree",
    version,
    about = "Build a tech-tree of steps linked by the products they need, and render it with Graphviz.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Route file (defaults to `defaults.route_file` from the config).
    #[arg(long, global = true, env = "TECHTREE_ROUTE")]
    pub route: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Corpora a `search` runs against.
#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub(crate) enum SearchTarget {
    All,
    Titles,
    Products,
}

impl From<SearchTarget> for CorpusSelector {
    fn from(target: SearchTarget) -> Self {
        match target {
            SearchTarget::All => Self::Both,
            SearchTarget::Titles => Self::Titles,
            SearchTarget::Products => Self::Products,
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Interactively append steps to the route.
    Add,

    /// Search step titles and products, then pick a match.
    Search {
        /// Query words; every word must match.
        #[arg(required = true)]
        query: Vec<String>,

        /// Corpora to search.
        #[arg(long = "in", value_enum, default_value = "all")]
        target: SearchTarget,
    },

    /// Print every step of the route.
    List,

    /// Render the route graph.
    Export {
        /// Print the node/edge payload as JSON instead of rendering.
        #[arg(long)]
        json: bool,

        /// Output format passed to Graphviz (overrides `render.format`).
        #[arg(short, long)]
        format: Option<String>,

        /// Open the rendered image.
        #[arg(long)]
        view: bool,
    },

    /// Replace the route file with the steps of a grouped outline.
    Import {
        /// JSON outline: an array of steps and `{ "title", "steps" }` groupings.
        outline: PathBuf,

        /// Overwrite an existing route file.
        #[arg(long)]
        force: bool,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write the default config file.
    Init,
    /// Print the resolved config.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "techtree=info",
        1 => "techtree=debug",
        _ => "techtree=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    if let Command::Config { action } = &cli.command {
        return match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        };
    }

    let config = load_config()?;
    let route_path = cli
        .route
        .clone()
        .unwrap_or_else(|| PathBuf::from(&config.defaults.route_file));
    debug!(route = %route_path.display(), "route file resolved");

    match cli.command {
        Command::Add => cmd_add(&route_path, &config).await,
        Command::Search { query, target } => {
            cmd_search(&route_path, &config, &query.join(" "), target.into()).await
        }
        Command::List => cmd_list(&route_path, &config).await,
        Command::Export { json, format, view } => {
            cmd_export(&route_path, config, json, format, view).await
        }
        Command::Import { outline, force } => {
            cmd_import(&route_path, &config, &outline, force).await
        }
        Command::Config { .. } => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

fn route_options(config: &AppConfig) -> RouteOptions {
    RouteOptions {
        search_limit: config.search.limit,
    }
}

async fn open_index(config: &AppConfig) -> Result<SearchIndex> {
    Ok(SearchIndex::open(Path::new(&config.defaults.index_dir)).await?)
}

async fn open_route(route_path: &Path, config: &AppConfig) -> Result<Route> {
    let index = open_index(config).await?;
    let route = Route::load(route_path, index, route_options(config)).await?;
    info!(steps = route.steps().len(), path = %route_path.display(), "route loaded");
    Ok(route)
}

async fn cmd_add(route_path: &Path, config: &AppConfig) -> Result<()> {
    let mut route = open_route(route_path, config).await?;
    let mut chooser = PromptChooser;

    while prompt::confirm("Would you like to enter another step?")? {
        let title = prompt::text("Step title")?.to_lowercase();
        let details = prompt::text("Step details")?.to_lowercase();
        let products = parse_products(&prompt::text(
            "Products from step (separate with semicolons)",
        )?);

        let mut draft = StepDraft {
            title,
            details,
            products,
            ..Default::default()
        };
        if prompt::confirm("Would you like to add prereqs?")? {
            collect_prereqs(&route, &mut draft, &mut chooser).await?;
        }

        let id = route.append(draft).await?;
        println!("Added step {id}.");
    }

    Ok(())
}

/// Prereq loop of `add`: search the products corpus until the user stops.
async fn collect_prereqs(
    route: &Route,
    draft: &mut StepDraft,
    chooser: &mut PromptChooser,
) -> Result<()> {
    loop {
        let query = prompt::text("Search products (empty to finish)")?;
        if query.trim().is_empty() {
            return Ok(());
        }

        match route.search(CorpusSelector::Products, &query, chooser).await {
            Ok(Some(resolution)) => {
                draft.link(resolution.producer, resolution.matched);
                if !prompt::confirm("Adding more?")? {
                    return Ok(());
                }
            }
            Ok(None) => println!("No matching search results, try again."),
            Err(e) if e.is_recoverable() => println!("{e}"),
            Err(e) => return Err(e.into()),
        }
    }
}

async fn cmd_search(
    route_path: &Path,
    config: &AppConfig,
    query: &str,
    selector: CorpusSelector,
) -> Result<()> {
    let route = open_route(route_path, config).await?;
    let mut chooser = PromptChooser;

    match route.search(selector, query, &mut chooser).await? {
        Some(resolution) => {
            let title = route
                .step(resolution.producer)
                .map(|step| step.title.as_str())
                .unwrap_or_default();
            println!(
                "Step {} ({title}) provides \"{}\"",
                resolution.producer, resolution.matched
            );
        }
        None => println!("No match."),
    }
    Ok(())
}

async fn cmd_list(route_path: &Path, config: &AppConfig) -> Result<()> {
    let route = open_route(route_path, config).await?;
    let steps = route.steps();

    if steps.is_empty() {
        println!("Route {} is empty.", route_path.display());
        return Ok(());
    }
    for step in steps {
        print!("{step}");
    }
    Ok(())
}

async fn cmd_export(
    route_path: &Path,
    mut config: AppConfig,
    json: bool,
    format: Option<String>,
    view: bool,
) -> Result<()> {
    let route = open_route(route_path, &config).await?;

    if json {
        let graph = route.export(&config.render.palette);
        println!("{}", serde_json::to_string_pretty(&graph)?);
        return Ok(());
    }

    if let Some(format) = format {
        config.render.format = format;
    }
    config.render.view |= view;

    let renderer = GraphvizRenderer::new(&config.render, &config.defaults.output_dir);
    let spinner = spinner(format!("Rendering {}...", route.export_name()));
    let rendered = route.render(&renderer, &config.render.palette);
    spinner.finish_and_clear();

    let path = rendered?;
    println!("Graph written to {}", path.display());
    Ok(())
}

async fn cmd_import(
    route_path: &Path,
    config: &AppConfig,
    outline_path: &Path,
    force: bool,
) -> Result<()> {
    if route_path.exists() && !force {
        return Err(eyre!(
            "route file {} already exists (use --force to overwrite)",
            route_path.display()
        ));
    }

    let content = std::fs::read_to_string(outline_path)
        .map_err(|e| eyre!("failed to read {}: {e}", outline_path.display()))?;
    let outline: serde_json::Value = serde_json::from_str(&content)
        .map_err(|e| eyre!("{} is not valid JSON: {e}", outline_path.display()))?;

    let spinner = spinner(format!("Importing {}...", outline_path.display()));
    let index = open_index(config).await?;
    let imported = Route::from_outline(outline, outline_path, index, route_options(config)).await;
    spinner.finish_and_clear();

    let route = imported?.with_path(route_path);
    route.persist()?;
    println!(
        "Imported {} steps into {}",
        route.steps().len(),
        route_path.display()
    );
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(message);
    spinner.enable_steady_tick(std::time::Duration::from_millis(80));
    spinner
}

/// Split a semicolon-separated product list; entries are trimmed and
/// empty ones dropped.
pub(crate) fn parse_products(input: &str) -> Vec<String> {
    input
        .split(';')
        .map(str::trim)
        .filter(|product| !product.is_empty())
        .map(str::to_string)
        .collect()
}
