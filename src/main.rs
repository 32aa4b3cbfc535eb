//! crewline - run a crew of role-playing agents from the command line

use crewline::config::{ConfigError, CrewConfig};
use crewline::crew::{FileSink, LlmBackend, OutputFormat, ResultSink, StdoutSink};
use crewline::error::{sanitize_error_message, CrewError, CrewResult};
use crewline::llm::provider::LlmProvider;
use crewline::observability::init_default_logging;
use clap::{Parser, Subcommand};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

/// Sequential role-playing agent crews
#[derive(Parser)]
#[command(name = "crewline")]
#[command(about = "Run a planner/writer/editor style agent crew over a topic")]
#[command(version)]
struct Cli {
    /// Crew configuration file (defaults to crew.toml, then the built-in article crew)
    #[arg(short, long, value_name = "FILE", env = "CREWLINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the crew and print the final article
    Run {
        /// Shorthand for --input topic=<TOPIC>
        #[arg(long)]
        topic: Option<String>,

        /// Run-time input as key=value (repeatable)
        #[arg(short, long = "input", value_name = "KEY=VALUE", value_parser = parse_input)]
        inputs: Vec<(String, String)>,

        /// Write the article to this file instead of stdout
        #[arg(short, long, value_name = "FILE")]
        output: Option<PathBuf>,

        /// Emit the whole run (every task output, token usage) as JSON
        #[arg(long)]
        json: bool,
    },
    /// Validate the crew configuration
    Config {
        /// Print the resolved configuration
        #[arg(long)]
        show: bool,

        /// Also verify the LLM provider accepts the configured API key
        #[arg(long)]
        check: bool,
    },
}

fn parse_input(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty input name in '{raw}'"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init_default_logging();

    info!("Starting crewline v{}", env!("CARGO_PKG_VERSION"));

    let config = match load_configuration(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e.sanitized_message());
            process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Run {
            topic,
            inputs,
            output,
            json,
        } => {
            let format = if json {
                OutputFormat::Json
            } else {
                OutputFormat::Markdown
            };
            run_crew(config, topic, inputs, output, format).await
        }
        Commands::Config { show, check } => handle_config_command(&config, show, check).await,
    };

    if let Err(e) = result {
        error!("Command failed: {}", sanitize_error_message(&e.to_string()));
        process::exit(1);
    }
}

fn load_configuration(config_path: &Option<PathBuf>) -> CrewResult<CrewConfig> {
    if let Some(path) = config_path {
        info!("Loading configuration from: {}", path.display());
        return Ok(CrewConfig::load_from_file(path)?);
    }

    for path_str in ["crew.toml", "config/crew.toml"] {
        let path = PathBuf::from(path_str);
        if path.exists() {
            info!("Loading configuration from: {}", path.display());
            return Ok(CrewConfig::load_from_file(&path)?);
        }
    }

    info!("No crew.toml found, using the built-in article crew");
    Ok(CrewConfig::article()?)
}

/// Provider factory for creating LLM providers from configuration
struct LlmProviderFactory;

impl LlmProviderFactory {
    fn create_provider(config: &CrewConfig) -> CrewResult<Arc<dyn LlmProvider>> {
        use crewline::llm::providers::{
            AnthropicConfig, AnthropicProvider, OpenAiConfig, OpenAiProvider,
        };

        let api_key = config.get_llm_api_key()?;

        match config.llm.provider.as_str() {
            "openai" => {
                let defaults = OpenAiConfig::default();
                let openai_config = OpenAiConfig {
                    api_key,
                    base_url: config.llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout: config.llm.timeout(),
                };
                Ok(Arc::new(OpenAiProvider::new(openai_config)?))
            }
            "anthropic" => {
                let defaults = AnthropicConfig::default();
                let anthropic_config = AnthropicConfig {
                    api_key,
                    base_url: config.llm.base_url.clone().unwrap_or(defaults.base_url),
                    timeout: config.llm.timeout(),
                    ..defaults
                };
                Ok(Arc::new(AnthropicProvider::new(anthropic_config)?))
            }
            provider => Err(CrewError::Config(ConfigError::InvalidConfig(format!(
                "Unsupported LLM provider: {provider}"
            )))),
        }
    }
}

async fn run_crew(
    config: CrewConfig,
    topic: Option<String>,
    inputs: Vec<(String, String)>,
    output: Option<PathBuf>,
    format: OutputFormat,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut overrides: HashMap<String, String> = inputs.into_iter().collect();
    if let Some(topic) = topic {
        overrides.insert("topic".to_string(), topic);
    }
    let inputs = config.merged_inputs(&overrides);

    let provider = LlmProviderFactory::create_provider(&config)?;
    let backend = LlmBackend::new(provider, config.llm.model.clone())
        .with_temperature(config.llm.temperature)
        .with_max_tokens(config.llm.max_tokens);
    let crew = config.build_crew(Arc::new(backend))?;

    let sink: Box<dyn ResultSink> = match output {
        Some(path) => Box::new(FileSink::new(path).with_format(format)),
        None => Box::new(StdoutSink::new(format)),
    };

    info!(crew = %crew.name(), tasks = crew.tasks().len(), "Kicking off crew");

    // Dropping the run future on Ctrl-C discards its accumulated context
    let result = tokio::select! {
        result = crew.kickoff(&inputs) => result,
        _ = signal::ctrl_c() => {
            warn!("Received Ctrl-C, abandoning crew run");
            return Err("crew run cancelled".into());
        }
    };

    let crew_output = result?;
    sink.publish(&crew_output).await?;
    Ok(())
}

async fn check_provider(provider: &dyn LlmProvider) -> CrewResult<()> {
    provider.health_check().await?;
    info!(provider = provider.name(), "LLM provider health check passed");
    Ok(())
}

async fn handle_config_command(
    config: &CrewConfig,
    show: bool,
    check: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if show {
        println!("{}", toml::to_string_pretty(config)?);
    }

    if check {
        let provider = LlmProviderFactory::create_provider(config)?;
        check_provider(provider.as_ref()).await?;
    }

    info!(
        crew = %config.crew.name,
        agents = config.agents.len(),
        tasks = config.tasks.len(),
        "Configuration validation complete"
    );
    Ok(())
}
