use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use request_registry::config::{load_config, ClientConfig};
use request_registry::observability::logging::init_logging;
use request_registry::registry::RequestId;
use request_registry::{CallOptions, Client, RegistryEvent, RequestError};
use serde_json::Value;
use tokio::sync::broadcast::{self, error::RecvError};

#[derive(Parser)]
#[command(name = "reqctl")]
#[command(about = "Issue HTTP requests through the request registry", long_about = None)]
struct Cli {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Base URL for relative request paths (overrides the config file).
    #[arg(short, long)]
    base_url: Option<String>,

    /// Extra header, `name: value`. Repeatable.
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Log level (overrides the config file).
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Target {
    url: String,

    /// JSON request data.
    #[arg(short, long)]
    data: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Send a GET request
    Get {
        #[command(flatten)]
        target: Target,

        /// Cancel any outstanding request with the same identifier
        #[arg(long)]
        single: bool,

        /// Cancellation key (defaults to the URL)
        #[arg(long)]
        identifier: Option<String>,
    },
    /// Send a POST request
    Post(Target),
    /// Send a PUT request
    Put(Target),
    /// Send a PATCH request
    Patch(Target),
    /// Send a DELETE request
    Delete(Target),
    /// Upload multipart fields, `key=value`
    Upload {
        url: String,

        #[arg(short, long = "field")]
        fields: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ClientConfig::default(),
    };
    if let Some(base_url) = cli.base_url {
        config.transport.base_url = Some(base_url);
    }
    if let Some(level) = cli.log_level {
        config.observability.log_level = level;
    }
    init_logging(&config.observability)?;

    let mut options = CallOptions::default();
    for header in &cli.headers {
        let (name, value) = header
            .split_once(':')
            .ok_or_else(|| format!("header `{}` must be `name: value`", header))?;
        options = options.header(name.trim(), value.trim());
    }

    let client = Client::from_config(&config)?;
    let mut events = client.subscribe();

    let response = match cli.command {
        Commands::Get { target, single, identifier } => {
            let data = parse_data(target.data.as_deref())?;
            let options = match identifier {
                Some(identifier) => options.identifier(identifier),
                None => options,
            };
            let options = if single { options.single() } else { options };
            client.get(target.url, data, options)
        }
        Commands::Post(target) => {
            client.post(target.url, parse_data(target.data.as_deref())?, options)
        }
        Commands::Put(target) => {
            client.put(target.url, parse_data(target.data.as_deref())?, options)
        }
        Commands::Patch(target) => {
            client.patch(target.url, parse_data(target.data.as_deref())?, options)
        }
        Commands::Delete(target) => {
            client.delete(target.url, parse_data(target.data.as_deref())?, options)
        }
        Commands::Upload { url, fields } => client.post_file(url, parse_fields(&fields)?, options),
    };
    let id = response.id();

    tokio::select! {
        result = response => print_result(result),
        () = wait_for_hold(&mut events, id) => {
            eprintln!(
                "Error: request {} answered 401 Unauthorized and is held for resubmission",
                id
            );
            Ok(ExitCode::FAILURE)
        }
    }
}

/// Resolve once the registry reports `id` as held after a 401.
async fn wait_for_hold(events: &mut broadcast::Receiver<RegistryEvent>, id: RequestId) {
    loop {
        match events.recv().await {
            Ok(RegistryEvent::Held { id: held }) if held == id => return,
            Ok(_) | Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => std::future::pending::<()>().await,
        }
    }
}

fn parse_data(data: Option<&str>) -> Result<Option<Value>, serde_json::Error> {
    data.map(serde_json::from_str).transpose()
}

fn parse_fields(fields: &[String]) -> Result<Value, String> {
    let mut map = serde_json::Map::new();
    for field in fields {
        let (key, value) = field
            .split_once('=')
            .ok_or_else(|| format!("field `{}` must be `key=value`", field))?;
        map.insert(key.to_string(), Value::String(value.to_string()));
    }
    Ok(Value::Object(map))
}

fn print_result(
    result: Result<Value, RequestError>,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    match result {
        Ok(body) => {
            println!("{}", serde_json::to_string_pretty(&body)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            if let Some(body) = e.body() {
                eprintln!("Response: {}", serde_json::to_string_pretty(body)?);
            }
            Ok(ExitCode::FAILURE)
        }
    }
}
