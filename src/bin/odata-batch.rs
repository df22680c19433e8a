//! Sends a set of OData GETs through one `$batch` request and prints the
//! decoded parts as a JSON array.
//!
//! ```bash
//! odata-batch --base-url https://host/sap/opu/odata/sap/SRV/ Products Suppliers
//! odata-batch --config batch.toml "Products?\$top=5"
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

use odata_batch::{BatchClient, BatchConfig, ParseMode, TokenPolicy};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum CliParseMode {
    Strict,
    Legacy,
}

impl From<CliParseMode> for ParseMode {
    fn from(mode: CliParseMode) -> Self {
        match mode {
            CliParseMode::Strict => ParseMode::Strict,
            CliParseMode::Legacy => ParseMode::Legacy,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "odata-batch")]
#[command(version, about, long_about = None)]
struct Args {
    /// Service root the `$batch` suffix is appended to
    #[arg(long, required_unless_present = "config")]
    base_url: Option<String>,

    /// TOML config file; flags override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[arg(long, value_enum)]
    parse_mode: Option<CliParseMode>,

    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Send the batch without a CSRF token when the service offers none
    #[arg(long)]
    optional_token: bool,

    #[arg(long)]
    json_logs: bool,

    /// Resource paths relative to the service root, in result order
    #[arg(required = true)]
    urls: Vec<String>,
}

fn init_logging(json_logs: bool) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .try_init()?;
    }
    Ok(())
}

fn resolve_config(args: &Args) -> odata_batch::Result<BatchConfig> {
    let mut config = match (&args.config, &args.base_url) {
        (Some(path), _) => BatchConfig::from_path(path)?,
        (None, Some(base_url)) => BatchConfig::new(base_url.clone()),
        (None, None) => {
            return Err(odata_batch::BatchError::Config(
                "either --base-url or --config is required".to_string(),
            ));
        }
    };
    if let (Some(_), Some(base_url)) = (&args.config, &args.base_url) {
        config.base_url = base_url.clone();
    }
    if let Some(mode) = args.parse_mode {
        config.parse_mode = mode.into();
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.timeout_secs = timeout_secs;
    }
    if args.optional_token {
        config.token_policy = TokenPolicy::Optional;
    }
    config.validate()?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(args.json_logs)?;

    let config = resolve_config(&args)?;
    tracing::info!(url = %config.batch_url(), parts = args.urls.len(), "running batch");

    let client = BatchClient::from_config(config)?;
    let results = client.create_multipart_request(args.urls.as_slice()).await?;
    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
