use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cloudscope::backend::HttpBackend;
use cloudscope::config::Config;
use cloudscope::error::ConfigError;
use cloudscope::model::InstanceState;
use cloudscope::normalize::{TimeWindow, MAX_WINDOW_HOURS};
use cloudscope::overview::build_overview;
use cloudscope::providers::logs::DEFAULT_EVENT_LIMIT;
use cloudscope::providers::{
    InstanceFilter, InventoryProvider, LogsProvider, MetricsProvider, ProviderSettings,
};
use log::{error, info, warn};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Command-line arguments for cloudscope
#[derive(Parser)]
#[command(
    name = "cloudscope",
    about = "Cloud compute inventory, metrics and logs, normalized to JSON",
    long_about = "Queries a telemetry gateway for compute instances, CPU/network/disk metrics, \
                  alarms and logs, and prints uniform JSON records. Falls back to offline \
                  sample data when the gateway cannot be reached."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(
        short,
        long,
        help = "Enable verbose logging output (sets RUST_LOG=debug)"
    )]
    verbose: bool,

    /// Region override
    #[arg(short, long, help = "Region to query (overrides config and environment)")]
    region: Option<String>,

    /// Force offline mode
    #[arg(long, help = "Skip the backend probe and use offline sample data")]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Args, Debug, Clone, Copy)]
struct WindowArgs {
    /// Hours to look back, at most 744 (defaults to metrics.default_window_hours)
    #[arg(long, value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_WINDOW_HOURS)))]
    hours: Option<u32>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Instance summary with a CPU alert per instance
    Overview,
    /// List instances, optionally filtered
    Instances {
        #[arg(long)]
        state: Option<InstanceState>,
        #[arg(long = "type")]
        instance_type: Option<String>,
        /// Case-insensitive substring of the instance name
        #[arg(long)]
        name: Option<String>,
    },
    /// Show a single instance
    Instance { instance_id: String },
    /// Health checks of an instance
    Status { instance_id: String },
    /// Console output of an instance
    Console { instance_id: String },
    /// Count instances by state and type
    Summary,
    /// Available regions
    Regions,
    /// CPU utilization series
    Cpu {
        instance_id: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Network in/out series
    Network {
        instance_id: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Disk read/write series
    Disk {
        instance_id: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// CPU, network and disk together
    Metrics {
        instance_id: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Any other per-instance metric
    CustomMetric {
        instance_id: String,
        metric_name: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Names of the metrics recorded for an instance
    MetricNames { instance_id: String },
    /// Alarms configured for an instance
    Alarms { instance_id: String },
    /// List log groups
    LogGroups,
    /// Describe the first log group matching a name prefix
    LogGroup { name: String },
    /// Most recently active streams of a log group
    LogStreams { group: String },
    /// Events of a single stream
    LogEvents {
        group: String,
        stream: String,
        /// Start, epoch milliseconds
        #[arg(long)]
        start: Option<i64>,
        /// End, epoch milliseconds
        #[arg(long)]
        end: Option<i64>,
        #[arg(long, default_value_t = DEFAULT_EVENT_LIMIT)]
        limit: usize,
    },
    /// Newest events across a group's recent streams
    RecentLogs {
        group: String,
        #[command(flatten)]
        window: WindowArgs,
        #[arg(long, default_value_t = DEFAULT_EVENT_LIMIT)]
        limit: usize,
    },
    /// Filter-pattern search in a log group
    SearchLogs {
        group: String,
        pattern: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Logs correlated to an instance by log group naming
    InstanceLogs {
        instance_id: String,
        #[command(flatten)]
        window: WindowArgs,
    },
    /// Recent logs of every group whose name contains the application name
    AppLogs {
        application: String,
        #[command(flatten)]
        window: WindowArgs,
    },
}

impl Cli {
    /// Validate the CLI arguments
    ///
    /// # Returns
    ///
    /// `Ok(())` if all arguments are valid, `Err(String)` with error message otherwise
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in load_config
            if config_path.exists() {
                if !config_path.is_file() {
                    return Err(format!(
                        "Configuration path is not a file: {}",
                        config_path.display()
                    ));
                }

                if let Some(extension) = config_path.extension() {
                    if extension != "toml" {
                        warn!(
                            "Configuration file does not have .toml extension: {}",
                            config_path.display()
                        );
                    }
                }
            }
        }

        if let Some(ref region) = self.region {
            if region.trim().is_empty() {
                return Err("Region must not be empty".to_string());
            }
        }

        Ok(())
    }
}

/// Load configuration, falling back to defaults when the file is missing or invalid
fn load_config(config_path: Option<&Path>) -> Config {
    match config_path {
        Some(path) => {
            info!("Loading configuration from: {}", path.display());
            match Config::from_file(path) {
                Ok(config) => config,
                Err(ConfigError::ReadError(_)) => {
                    warn!(
                        "Configuration file '{}' not found or unreadable, using defaults",
                        path.display()
                    );
                    Config::default()
                }
                Err(e) => {
                    error!("Configuration error in '{}': {}", path.display(), e);
                    warn!("Using default configuration due to invalid config file");
                    Config::default()
                }
            }
        }
        None => {
            info!("Using default configuration");
            Config::default()
        }
    }
}

/// The three providers, built against one backend scope
struct App {
    inventory: InventoryProvider,
    metrics: MetricsProvider,
    logs: LogsProvider,
    cpu_threshold: f64,
    default_hours: u32,
}

impl App {
    async fn connect(config: &Config) -> Result<Self> {
        let settings = ProviderSettings::from_config(config);

        let (inventory, metrics, logs) = if config.offline.force {
            info!("Offline mode forced by configuration");
            (
                InventoryProvider::offline(&settings),
                MetricsProvider::offline(&settings),
                LogsProvider::offline(&settings),
            )
        } else {
            let backend = Arc::new(
                HttpBackend::new(
                    &config.backend.endpoint,
                    config.region.clone(),
                    config.backend.timeout(),
                )
                .context("Failed to create telemetry backend")?,
            );
            (
                InventoryProvider::connect(backend.clone(), &settings).await,
                MetricsProvider::connect(backend.clone(), &settings).await,
                LogsProvider::connect(backend, &settings).await,
            )
        };

        Ok(Self {
            inventory,
            metrics,
            logs,
            cpu_threshold: config.alerts.cpu_threshold,
            default_hours: config.metrics.default_window_hours,
        })
    }

    fn window(&self, args: WindowArgs) -> TimeWindow {
        TimeWindow::last_hours(args.hours.unwrap_or(self.default_hours))
    }

    async fn execute(&self, command: Command) -> Result<Value> {
        match command {
            Command::Overview => json(
                &build_overview(
                    &self.inventory,
                    &self.metrics,
                    self.cpu_threshold,
                    chrono::Utc::now(),
                )
                .await?,
            ),
            Command::Instances {
                state,
                instance_type,
                name,
            } => {
                let filter = InstanceFilter {
                    state,
                    instance_type,
                    name_pattern: name,
                };
                json(&self.inventory.filter_instances(&filter).await?)
            }
            Command::Instance { instance_id } => {
                json(&self.inventory.get_instance(&instance_id).await?)
            }
            Command::Status { instance_id } => {
                json(&self.inventory.instance_status(&instance_id).await?)
            }
            Command::Console { instance_id } => {
                Ok(Value::String(self.inventory.console_output(&instance_id).await))
            }
            Command::Summary => {
                let instances = self.inventory.list_instances().await?;
                json(&InventoryProvider::summarize(&instances))
            }
            Command::Regions => json(&self.inventory.list_regions().await),
            Command::Cpu {
                instance_id,
                window,
            } => json(&self.metrics.cpu(&instance_id, &self.window(window)).await?),
            Command::Network {
                instance_id,
                window,
            } => json(
                &self
                    .metrics
                    .network(&instance_id, &self.window(window))
                    .await?,
            ),
            Command::Disk {
                instance_id,
                window,
            } => json(&self.metrics.disk(&instance_id, &self.window(window)).await?),
            Command::Metrics {
                instance_id,
                window,
            } => json(&self.metrics.all(&instance_id, &self.window(window)).await?),
            Command::CustomMetric {
                instance_id,
                metric_name,
                window,
            } => json(
                &self
                    .metrics
                    .custom_metric(&instance_id, &metric_name, &self.window(window))
                    .await?,
            ),
            Command::MetricNames { instance_id } => {
                json(&self.metrics.available_metric_names(&instance_id).await?)
            }
            Command::Alarms { instance_id } => json(&self.metrics.alarms(&instance_id).await?),
            Command::LogGroups => json(&self.logs.list_log_groups().await?),
            Command::LogGroup { name } => json(&self.logs.describe_log_group(&name).await?),
            Command::LogStreams { group } => json(&self.logs.list_log_streams(&group).await?),
            Command::LogEvents {
                group,
                stream,
                start,
                end,
                limit,
            } => json(
                &self
                    .logs
                    .log_events(&group, &stream, start, end, limit)
                    .await?,
            ),
            Command::RecentLogs {
                group,
                window,
                limit,
            } => json(
                &self
                    .logs
                    .recent_logs(&group, &self.window(window), limit)
                    .await?,
            ),
            Command::SearchLogs {
                group,
                pattern,
                window,
            } => json(
                &self
                    .logs
                    .search_logs(&group, &pattern, &self.window(window))
                    .await?,
            ),
            Command::InstanceLogs {
                instance_id,
                window,
            } => json(
                &self
                    .logs
                    .correlate_instance_logs(&instance_id, &self.window(window))
                    .await?,
            ),
            Command::AppLogs {
                application,
                window,
            } => json(
                &self
                    .logs
                    .application_logs(&application, &self.window(window))
                    .await?,
            ),
        }
    }
}

fn json<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).context("Failed to serialize result")
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref());
    config
        .apply_env_overrides()
        .context("Invalid environment override")?;
    if let Some(region) = cli.region {
        config.region = region;
        config.validate().context("Invalid --region")?;
    }
    if cli.offline {
        config.offline.force = true;
    }

    let app = App::connect(&config).await?;
    let output = app.execute(cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    if cli.verbose {
        std::env::set_var("RUST_LOG", "debug");
    }
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = cli.validate() {
        error!("Invalid arguments: {}", e);
        std::process::exit(1);
    }

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}
