use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use podlinks::{
    checker::LinkChecker,
    export::{self, ExportFormat},
    pipeline::{Credentials, Pipeline, PipelineRequest, PipelineStatus},
    policy::ExclusionPolicy,
    server, ApiKey, PipelineConfig, Provider,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "podlinks")]
#[command(version)]
#[command(about = "Find, validate and export links for the topics of a podcast transcript.", long_about = None)]
struct Cli {
    /// Configuration file (TOML or JSON). Environment variables prefixed with
    /// `PODLINKS__` override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Credential for the text-generation provider
    #[arg(long, env = "PODLINKS_GENERATION_KEY", hide_env_values = true, global = true)]
    generation_key: Option<String>,

    /// Credential for the web search provider
    #[arg(long, env = "PODLINKS_SEARCH_KEY", hide_env_values = true, global = true)]
    search_key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a transcript through the whole pipeline and print the export
    Run {
        /// Transcript file
        transcript: PathBuf,

        /// Number of topics to extract (1-10)
        #[arg(short, long, default_value_t = 5)]
        count: usize,

        /// Providers to ask for links
        #[arg(short, long, value_delimiter = ',', default_values = ["primary", "secondary"])]
        provider: Vec<Provider>,

        /// Domains whose links are dropped
        #[arg(long = "exclude-domain")]
        exclude_domains: Vec<String>,

        /// Topics to leave out
        #[arg(long)]
        avoid: Vec<String>,

        /// Export format: markdown, text or html
        #[arg(short, long, default_value = "markdown")]
        format: ExportFormat,
    },
    /// Check one or more URLs
    Validate {
        urls: Vec<String>,

        /// Fetch each page instead of checking syntax only
        #[arg(long)]
        deep: bool,
    },
    /// Serve the validation endpoint
    Serve {
        /// Overrides `server.bind` from the configuration
        #[arg(long)]
        bind: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("podlinks=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = PipelineConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Run {
            transcript,
            count,
            provider,
            exclude_domains,
            avoid,
            format,
        } => {
            let credentials = Credentials {
                generation: cli.generation_key.and_then(ApiKey::new),
                search: cli.search_key.and_then(ApiKey::new),
            };
            let transcript = tokio::fs::read_to_string(&transcript)
                .await
                .with_context(|| format!("Failed to read transcript {}", transcript.display()))?;

            let start_time = Instant::now();
            let pipeline = Pipeline::from_config(&config, credentials).context("Failed to build pipeline")?;
            let request = PipelineRequest {
                transcript,
                desired_count: count,
                providers: provider,
                policy: ExclusionPolicy::new(exclude_domains, avoid),
            };

            let outcome = pipeline.run(&request).await;
            info!("Pipeline finished in {:.2?}", start_time.elapsed());

            match outcome.status {
                PipelineStatus::Ready => println!("{}", export::render(&outcome.items, format)),
                PipelineStatus::MissingCredential => {
                    bail!("No generation credential supplied; set PODLINKS_GENERATION_KEY")
                }
                PipelineStatus::NoTopics(reason) => warn!("No topics found: {:?}", reason),
                PipelineStatus::NoLinks => {
                    warn!("No valid links found for {} topics", outcome.topics.len())
                }
            }
        }
        Commands::Validate { urls, deep } => {
            if urls.is_empty() {
                bail!("No URLs given");
            }
            let checker = LinkChecker::from_config(&config).context("Failed to build validator")?;

            for url in urls {
                let outcome = if deep {
                    checker.check(&url, false).await
                } else {
                    checker.check_syntax(&url)
                };
                println!("{}", serde_json::to_string(&outcome)?);
                if !outcome.is_valid {
                    error!("{} is not valid", url);
                }
            }
        }
        Commands::Serve { bind } => {
            let bind = bind.unwrap_or_else(|| config.server.bind.clone());
            let checker = Arc::new(LinkChecker::from_config(&config).context("Failed to build validator")?);
            server::serve(&bind, checker)
                .await
                .with_context(|| format!("Validation service on {} failed", bind))?;
        }
    }

    Ok(())
}
