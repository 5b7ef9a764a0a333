use dbkeeper::cli::{Cli, Commands};
use dbkeeper::postgres::tag_error;
use dbkeeper::{Config, ConnectionManager, Dependencies, ErrorClassifier, PostgresDriver};
use std::process;
use tracing_subscriber::EnvFilter;

// Allow println in main CLI binary
#[allow(clippy::disallowed_methods)]
fn main() {
    init_logging();

    let cli = Cli::parse();
    tracing::info!("dbkeeper CLI initialized");

    let mut config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: cannot load {}: {}", cli.config.display(), e);
            process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Check { uri }) => {
            if let Some(uri) = uri {
                config.database.uri = uri;
            }
            tokio::runtime::Runtime::new()
                .map_err(anyhow::Error::from)
                .and_then(|rt| rt.block_on(run_check(config)))
        }
        Some(Commands::ShowConfig) => show_config(config),
        None => {
            println!("dbkeeper - Use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run_check(config: Config) -> anyhow::Result<()> {
    let mut deps = Dependencies::new(config.database, PostgresDriver::new()).on_connect(
        |deps| async move {
            let row = deps
                .handle
                .client()
                .query_one("SELECT version()", &[])
                .await
                .map_err(tag_error)?;
            let version: String = row.get(0);
            deps.log.info(&format!("server version: {version}"));
            anyhow::Ok(())
        },
    );
    if let Some(prefix) = config.classifier.prefix {
        deps = deps.with_classifier(ErrorClassifier::new(prefix));
    }

    let (manager, connected) = ConnectionManager::start(deps);
    connected.await?;
    println!("✅ Connected to {}", manager.config().redacted_uri());

    manager.disconnect().await?;
    println!("✅ Disconnected");
    Ok(())
}

#[allow(clippy::disallowed_methods)]
fn show_config(mut config: Config) -> anyhow::Result<()> {
    config.database.uri = config.database.redacted_uri();
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Initialize logging based on environment variables
fn init_logging() {
    // Default to INFO level, can be overridden by RUST_LOG environment variable
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dbkeeper=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}
