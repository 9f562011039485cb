use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use serde_json::Value as Json;
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};

use liquid_jsonpath::config::Config;
use liquid_jsonpath::policy::DefaultPolicy;
use liquid_jsonpath::template::{Environment, Value};
use liquid_jsonpath::Applied;

/// liquid-jsonpath - JSONPath queries in Liquid-style templates
#[derive(Parser)]
#[command(name = "liquid-jsonpath")]
#[command(version)]
#[command(about = "Render templates that query JSON with JSONPath", long_about = None)]
struct Cli {
    /// Config file (default: ~/.config/liquid-jsonpath/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Render a template file
    Render {
        /// Template file
        template: PathBuf,

        /// JSON object to render with (omit to read from stdin if piped)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// What a failed query produces (overrides the config file)
        #[arg(short, long, value_enum)]
        policy: Option<DefaultPolicy>,

        /// Fail on undefined values
        #[arg(long)]
        strict: bool,

        /// Render with the asynchronous renderer
        #[arg(long = "async")]
        use_async: bool,
    },
    /// Apply a JSONPath query to a JSON document and print the matches
    Query {
        /// JSONPath query, e.g. '$.users[?@.age > 21].name'
        path: String,

        /// JSON document (omit to read from stdin if piped)
        #[arg(short, long)]
        data: Option<PathBuf>,

        /// What a failed query produces (overrides the config file)
        #[arg(short, long, value_enum)]
        policy: Option<DefaultPolicy>,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load(),
    };

    match cli.command {
        Command::Render {
            template,
            data,
            policy,
            strict,
            use_async,
        } => {
            if let Some(policy) = policy {
                config.default_policy = policy;
            }
            config.strict_undefined |= strict;
            let data = read_data(data.as_deref())?;
            let output = render(&config.environment(), &template, &data, use_async)?;
            io::stdout().write_all(output.as_bytes())?;
        }
        Command::Query { path, data, policy } => {
            if let Some(policy) = policy {
                config.default_policy = policy;
            }
            let data = read_data(data.as_deref())?;
            let globals = Json::Object(config.globals.clone());
            match config.apply_config().apply(&Value::from(data), &path, &globals)? {
                Applied::Matches(matches) => {
                    println!("{}", serde_json::to_string_pretty(&matches)?);
                }
                Applied::Undefined(undefined) => {
                    log::warn!("{}", undefined.hint());
                }
            }
        }
    }

    Ok(())
}

fn render(env: &Environment, template: &Path, data: &Json, use_async: bool) -> Result<String> {
    let source = std::fs::read_to_string(template)
        .with_context(|| format!("failed to read {}", template.display()))?;
    let template = env
        .parse(&source)
        .with_context(|| format!("failed to parse {}", template.display()))?;

    let output = if use_async {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .context("failed to start the async runtime")?;
        runtime.block_on(template.render_async(data))?
    } else {
        template.render(data)?
    };
    Ok(output)
}

/// Reads JSON from `path`, or from stdin when it is piped. No input at all is `null`.
fn read_data(path: Option<&Path>) -> Result<Json> {
    let contents = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?,
        None if !io::stdin().is_terminal() => {
            let mut contents = String::new();
            io::stdin().read_to_string(&mut contents)?;
            contents
        }
        None => return Ok(Json::Null),
    };

    if contents.trim().is_empty() {
        bail!("no JSON data to read");
    }
    serde_json::from_str(&contents).context("invalid JSON data")
}
