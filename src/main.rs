//! text2sql - Main entry point.
//!
//! Loads the YAML configuration, connects to ClickHouse, translates one
//! question into SQL and prints the result set.

use clap::Parser;
use clickhouse_text2sql::config::{AppConfig, Config};
use clickhouse_text2sql::db::ClickHouseConnector;
use clickhouse_text2sql::error::{AppError, AppResult};
use clickhouse_text2sql::format;
use clickhouse_text2sql::llm::OpenAiClient;
use clickhouse_text2sql::pipeline::{Pipeline, check_schema_template};
use clickhouse_text2sql::schema::SchemaDescriber;
use clickhouse_text2sql::translator::Text2Sql;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Initialize the tracing subscriber for logging. Logs go to stderr so stdout
/// carries only the result.
fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    let subscriber = tracing_subscriber::registry().with(filter);

    if config.json_logs {
        subscriber
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        subscriber
            .with(
                fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

async fn run(config: &Config) -> AppResult<()> {
    let app_config = AppConfig::load(&config.config_path)?;

    let model = OpenAiClient::new(app_config.models.openai)?;
    let translator = Text2Sql::with_builtin(model, config.template);
    check_schema_template(config.schema_mode, translator.template())?;

    let client = ClickHouseConnector::new(app_config.connections.clickhouse)
        .with_connect_timeout(config.connect_timeout_duration())
        .create_connection()
        .await?;

    let describer = SchemaDescriber::new(config.schema_mode)
        .with_catalog(&config.schema_catalog)
        .with_excluded_tables(config.exclude_tables.clone());

    let pipeline = Pipeline::new(&client, translator, describer);
    let output = pipeline.run(&config.question).await?;

    if config.show_sql {
        println!("{}\n", output.sql.trim());
    }
    println!("{}", format::render(&output.result, config.format)?);
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Parse configuration from command line and environment
    let config = Config::parse();

    // Initialize logging
    init_tracing(&config);

    info!(
        config = %config.config_path.display(),
        schema_mode = %config.schema_mode,
        template = %config.template,
        "Starting text2sql v{}",
        env!("CARGO_PKG_VERSION")
    );

    if let Err(e) = run(&config).await {
        error!(error = %e, "Run failed");
        report(&e);
        std::process::exit(e.exit_code());
    }
}

fn report(err: &AppError) {
    eprintln!("Error: {}", err);
    if let Some(suggestion) = err.suggestion() {
        eprintln!("Hint: {}", suggestion);
    }
}
