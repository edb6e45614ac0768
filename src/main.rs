use anyhow::Result;
use clap::Parser;
use querychat::catalog::SchemaCatalog;
use querychat::config::AppConfig;
use querychat::executor::QueryExecutor;
use querychat::llm::LlmClient;
use querychat::pipeline::ChatPipeline;
use querychat::summarizer::{ModelSummarizer, PlainSummarizer, Summarize};
use querychat::synthesizer::QuerySynthesizer;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "querychat")]
#[command(about = "Ask the database a question in plain language")]
struct Args {
    /// The question, e.g. "show me products under $50"
    question: String,

    /// MySQL connection string (or set DATABASE_URL)
    #[arg(long)]
    database_url: Option<String>,

    /// Skip the second model call and format results deterministically
    #[arg(long)]
    plain_summary: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    let args = Args::parse();

    let mut config = AppConfig::from_env()?;
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!("Connecting to {}", config.database_url);
    let pool = MySqlPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;

    let llm = LlmClient::new(&config)?;
    let summarizer: Box<dyn Summarize> = if args.plain_summary {
        Box::new(PlainSummarizer)
    } else {
        Box::new(ModelSummarizer::new(LlmClient::new(&config)?))
    };

    let pipeline = ChatPipeline::new(
        Arc::new(SchemaCatalog::new(pool.clone())),
        QuerySynthesizer::new(llm),
        QueryExecutor::new(pool, config.query_timeout),
        summarizer,
    );

    let reply = pipeline.handle(&args.question).await?;

    println!("SQL: {}", reply.sql_query);
    println!("Rows: {}", reply.results.len());
    println!("\n{}", reply.summary);

    Ok(())
}
