//! `statsig-mcp`: operator CLI for the Statsig `OpenAPI` tool source.
//!
//! Loads the console API's `OpenAPI` document, compiles it into MCP tools and lets an operator
//! list them, check how the document compiled, or call one tool directly.

mod config;

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use rmcp::model::CallToolResult;
use serde_json::{Map, Value};
use statsig_openapi_tools::OpenApiToolSource;
use std::path::PathBuf;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Overrides, load_config};

const DEFAULT_LOG_FILTER: &str = "statsig_mcp=info,statsig_openapi_tools=info";

#[derive(Debug, Parser)]
#[command(name = "statsig-mcp", version, about)]
struct Cli {
    /// YAML config file (camelCase keys, see `ApiServerConfig`).
    #[arg(long, env = "STATSIG_MCP_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Base URL of the console API.
    #[arg(long, env = "STATSIG_BASE_URL", global = true)]
    base_url: Option<String>,

    /// `OpenAPI` document location (URL or file). Defaults to `{baseUrl}/openapi.json`.
    #[arg(long, env = "STATSIG_SPEC_URL", global = true)]
    spec_url: Option<String>,

    #[arg(long, env = "STATSIG_API_KEY", global = true, hide_env_values = true)]
    api_key: Option<String>,

    #[arg(long, env = "STATSIG_API_VERSION", global = true)]
    api_version: Option<String>,

    /// Per-request timeout in seconds (0 disables).
    #[arg(long, env = "STATSIG_TIMEOUT_SECS", global = true)]
    timeout_secs: Option<u64>,

    /// Only expose operations carrying the inclusion tag.
    #[arg(long, global = true)]
    include_only_tagged: bool,

    #[arg(long, value_enum, env = "STATSIG_WAREHOUSE_NATIVE", global = true)]
    warehouse_native: Option<WarehouseNative>,

    /// Reject untyped schemas instead of accepting any value.
    #[arg(long, global = true)]
    strict_schemas: bool,

    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the compiled tools.
    Tools {
        /// Print full MCP tool definitions as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Compile the document and report skipped operations.
    Check {
        /// Exit with an error if any operation was skipped.
        #[arg(long)]
        deny_skipped: bool,
    },
    /// Call one tool and print the response.
    Call {
        tool: String,
        /// HTTP verb; defaults to the first verb declared on the path.
        #[arg(long)]
        method: Option<String>,
        /// Tool arguments as a JSON object.
        #[arg(long, default_value = "{}")]
        args: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum WarehouseNative {
    All,
    Exclude,
    Only,
}

impl WarehouseNative {
    fn as_config_value(self) -> &'static str {
        match self {
            WarehouseNative::All => "all",
            WarehouseNative::Exclude => "exclude",
            WarehouseNative::Only => "only",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

fn init_tracing(format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
            .init(),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let overrides = Overrides {
        base_url: cli.base_url.clone(),
        spec_url: cli.spec_url.clone(),
        api_key: cli.api_key.clone(),
        api_version: cli.api_version.clone(),
        timeout_secs: cli.timeout_secs,
        include_only_tagged: cli.include_only_tagged,
        warehouse_native: cli.warehouse_native.map(WarehouseNative::as_config_value),
        strict_schemas: cli.strict_schemas,
    };
    let cfg = load_config(cli.config.as_deref(), &overrides)?;
    let source = OpenApiToolSource::build(&cfg)
        .await
        .with_context(|| format!("load OpenAPI document from {}", cfg.spec_location()))?;

    match cli.command {
        Command::Tools { json } => print_tools(&source, json),
        Command::Check { deny_skipped } => check(&source, deny_skipped),
        Command::Call { tool, method, args } => call(&source, &tool, method, &args).await,
    }
}

fn print_tools(source: &OpenApiToolSource, json: bool) -> anyhow::Result<()> {
    if json {
        let tools = source.list_tools();
        println!(
            "{}",
            serde_json::to_string_pretty(&tools).context("serialize tools")?
        );
        return Ok(());
    }

    for entry in source.registry().entries() {
        let verbs: Vec<String> = entry.verbs().map(|v| v.to_string()).collect();
        let summary = entry.description.lines().next().unwrap_or_default();
        println!("{}\t{}\t{}", entry.id, verbs.join(","), summary);
    }
    Ok(())
}

fn check(source: &OpenApiToolSource, deny_skipped: bool) -> anyhow::Result<()> {
    let registry = source.registry();
    let operations: usize = registry.entries().iter().map(|e| e.operations.len()).sum();
    println!(
        "{}: {} tools, {} operations, {} skipped",
        source.spec_title().unwrap_or("untitled API"),
        registry.len(),
        operations,
        source.skipped().len()
    );
    for s in source.skipped() {
        match s.verb {
            Some(verb) => println!("  skipped {verb} {}: {}", s.path, s.error),
            None => println!("  skipped {}: {}", s.path, s.error),
        }
    }

    if deny_skipped && !source.skipped().is_empty() {
        anyhow::bail!("{} operations were skipped", source.skipped().len());
    }
    Ok(())
}

async fn call(
    source: &OpenApiToolSource,
    tool: &str,
    method: Option<String>,
    args: &str,
) -> anyhow::Result<()> {
    let mut arguments: Map<String, Value> =
        serde_json::from_str(args).context("--args must be a JSON object")?;
    if let Some(m) = method {
        arguments.insert("method".to_string(), Value::String(m));
    }

    let result = source
        .call_tool(tool, Value::Object(arguments))
        .await
        .with_context(|| format!("call {tool}"))?;
    print_result(&result)
}

fn print_result(result: &CallToolResult) -> anyhow::Result<()> {
    if let Some(structured) = &result.structured_content {
        println!(
            "{}",
            serde_json::to_string_pretty(structured).context("serialize response")?
        );
        return Ok(());
    }
    for content in &result.content {
        match content.as_text() {
            Some(text) => println!("{}", text.text),
            None => println!(
                "{}",
                serde_json::to_string(content).context("serialize content")?
            ),
        }
    }
    Ok(())
}
