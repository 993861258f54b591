use advisor::config;
use advisor::dispatch::RateLimitedDispatcher;
use advisor::intent::{Intent, IntentClassifier};
use advisor::llm::GeminiClient;
use advisor::oracle::{FridayOracle, DEFAULT_TIMEZONE};
use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "advisor")]
#[command(about = "Slack deploy advisor", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the gateway (Slack events, health probes, /test-backend).
    Serve {
        /// Config file path (default: ADVISOR_CONFIG_PATH or ~/.advisor/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,

        /// HTTP port (default from PORT env, config, or 3000)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Send one message to the model through the rate-limited dispatcher and print the reply.
    Ask {
        message: String,

        /// Config file path (default: ADVISOR_CONFIG_PATH or ~/.advisor/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<PathBuf>,
    },

    /// Print the intent a message would be classified as.
    Classify { text: String },

    /// Print whether it is Friday right now in a timezone.
    Friday {
        /// IANA timezone name
        #[arg(long, default_value = DEFAULT_TIMEZONE)]
        tz: String,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let default_filter = match cli.command {
        Some(Commands::Serve { .. }) => "info",
        _ => "warn",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    match cli.command {
        Some(Commands::Version) => {
            println!("advisor {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Serve { config, port }) => {
            if let Err(e) = run_serve(config, port).await {
                log::error!("gateway failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Ask { message, config }) => {
            if let Err(e) = run_ask(config, message).await {
                log::error!("ask failed: {:#}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Classify { text }) => run_classify(&text),
        Some(Commands::Friday { tz }) => {
            if let Err(e) = run_friday(&tz) {
                log::error!("friday failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_serve(config_path: Option<PathBuf>, port: Option<u16>) -> anyhow::Result<()> {
    let (mut config, path) = config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{} (config {})",
        config.gateway.bind,
        config.gateway.port,
        path.display()
    );
    advisor::gateway::run_gateway(config).await
}

async fn run_ask(config_path: Option<PathBuf>, message: String) -> anyhow::Result<()> {
    let (config, _) = config::load_config(config_path)?;
    let api_key = config::resolve_backend_api_key(&config)
        .context("no backend API key: set GEMINI_API_KEY or backend.apiKey")?;
    let backend = Arc::new(GeminiClient::new(
        api_key,
        config.backend.model.clone(),
        config.backend.base_url.clone(),
    ));
    let dispatcher = RateLimitedDispatcher::new(backend, config.dispatch);
    println!("{}", dispatcher.dispatch(&message).await);
    Ok(())
}

fn run_classify(text: &str) {
    let c = IntentClassifier::new().classify_detailed(text);
    match c.rule {
        Some(rule) => println!("{} (rule: {})", c.intent, rule),
        None if c.intent == Intent::Generic && c.mentions_deploy => {
            println!("{} (mentions deploy: canned verdict)", c.intent)
        }
        None => println!("{} (model)", c.intent),
    }
}

fn run_friday(tz: &str) -> anyhow::Result<()> {
    let oracle = FridayOracle::default();
    let weekday = oracle.weekday(tz)?;
    let friday = oracle.is_friday(tz)?;
    println!(
        "{} in {} ({})",
        if friday { "yes, it is Friday" } else { "no, it is not Friday" },
        tz.trim(),
        weekday
    );
    Ok(())
}
