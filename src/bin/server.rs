//! HTTP server for the chat endpoint.
//! Plain tokio TCP handling, no external HTTP framework.

use querychat::catalog::SchemaCatalog;
use querychat::config::AppConfig;
use querychat::executor::QueryExecutor;
use querychat::llm::LlmClient;
use querychat::pipeline::{self, ChatPipeline};
use querychat::summarizer::{ModelSummarizer, PlainSummarizer, Summarize};
use querychat::synthesizer::QuerySynthesizer;
use serde::Deserialize;
use sqlx::mysql::MySqlPoolOptions;
use std::sync::Arc;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{error, info, warn};

struct AppState {
    pipeline: ChatPipeline,
    catalog: Arc<SchemaCatalog>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt::init();

    info!("Starting querychat API server...");

    // Fail fast on missing API key rather than on the first request.
    let config = AppConfig::from_env()?;

    let pool = MySqlPoolOptions::new()
        .max_connections(10)
        .connect(&config.database_url)
        .await?;
    info!("Connected to database");

    let catalog = Arc::new(SchemaCatalog::new(pool.clone()));

    let summarizer: Box<dyn Summarize> =
        if std::env::var("SUMMARY_MODE").as_deref() == Ok("plain") {
            info!("Using deterministic summaries");
            Box::new(PlainSummarizer)
        } else {
            Box::new(ModelSummarizer::new(LlmClient::new(&config)?))
        };

    let state = Arc::new(AppState {
        pipeline: ChatPipeline::new(
            Arc::clone(&catalog),
            QuerySynthesizer::new(LlmClient::new(&config)?),
            QueryExecutor::new(pool, config.query_timeout),
            summarizer,
        ),
        catalog,
    });

    let bind_addr =
        std::env::var("BIND_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    let listener = TcpListener::bind(&bind_addr).await?;
    info!("Server listening on {}", bind_addr);

    loop {
        let (stream, addr) = listener.accept().await?;
        info!("New connection from: {}", addr);
        tokio::spawn(handle_connection(stream, Arc::clone(&state)));
    }
}

async fn handle_connection(mut stream: TcpStream, state: Arc<AppState>) {
    use tokio::time::{timeout, Duration};

    // Read request with timeout to prevent hanging
    let mut buffer = Vec::new();
    let mut temp_buf = [0; 8192];

    let read_result = timeout(Duration::from_secs(5), async {
        loop {
            match stream.read(&mut temp_buf).await {
                Ok(0) => break, // EOF
                Ok(n) => {
                    buffer.extend_from_slice(&temp_buf[..n]);
                    // Check if we've reached the end of HTTP headers + body
                    if let Ok(s) = std::str::from_utf8(&buffer) {
                        if s.contains("\r\n\r\n") {
                            if let Some(content_length) = extract_content_length(s) {
                                let headers_end = s.find("\r\n\r\n").unwrap() + 4;
                                if buffer.len() >= headers_end + content_length {
                                    break; // We have the complete request
                                }
                            } else if n < temp_buf.len() {
                                break;
                            }
                        }
                    }
                    // Cap the request size
                    if buffer.len() > 1_000_000 {
                        break;
                    }
                }
                Err(e) => {
                    error!("Failed to read from stream: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(())
    })
    .await;

    if read_result.is_err() {
        warn!("Request read timeout");
        return;
    }

    if buffer.is_empty() {
        return;
    }

    match String::from_utf8(buffer) {
        Ok(request) => {
            let response = handle_request(&request, &state).await;
            if let Err(e) = stream.write_all(response.as_bytes()).await {
                error!("Failed to write response: {}", e);
            }
        }
        Err(e) => {
            error!("Failed to parse request as UTF-8: {}", e);
        }
    }
}

fn extract_content_length(request: &str) -> Option<usize> {
    for line in request.lines() {
        if line.to_lowercase().starts_with("content-length:") {
            if let Some(value) = line.split(':').nth(1) {
                return value.trim().parse().ok();
            }
        }
    }
    None
}

async fn handle_request(request: &str, state: &AppState) -> String {
    let lines: Vec<&str> = request.lines().collect();
    if lines.is_empty() {
        return create_response(400, "Bad Request", "{}");
    }

    let request_line = lines[0];
    let parts: Vec<&str> = request_line.split_whitespace().collect();

    if parts.len() < 2 {
        return create_response(400, "Bad Request", "{}");
    }

    let method = parts[0];
    let full_path = parts[1];

    // Normalize path (drop query string and trailing slash)
    let path_str = full_path.split('?').next().unwrap_or(full_path);
    let mut normalized_path = path_str.trim_end_matches('/').to_string();
    if normalized_path.is_empty() {
        normalized_path = "/".to_string();
    }
    let path = normalized_path.as_str();

    info!("Request: {} {}", method, path);

    match (method, path) {
        ("GET", "/api/health") => {
            create_response(200, "OK", r#"{"status":"ok","service":"querychat"}"#)
        }
        ("GET", "/api/tables") => match state.catalog.table_names().await {
            Ok(tables) => {
                let body = serde_json::json!({ "tables": tables });
                create_response(200, "OK", &body.to_string())
            }
            Err(e) => {
                error!("Failed to list tables: {}", e);
                create_response(500, "Internal Server Error", r#"{"tables":[]}"#)
            }
        },
        ("POST", "/api/chat") => handle_chat(request, state).await,
        ("OPTIONS", _) => create_response(200, "OK", "{}"),
        _ => create_response(404, "Not Found", r#"{"error":"Not found"}"#),
    }
}

async fn handle_chat(request: &str, state: &AppState) -> String {
    let body_start = request.find("\r\n\r\n").unwrap_or(request.len());
    let body = request[body_start..].trim();

    let json_str = if body.starts_with('{') {
        body
    } else if let Some(json_start) = body.find('{') {
        &body[json_start..]
    } else {
        ""
    };

    #[derive(Deserialize)]
    struct ChatRequest {
        input: Option<String>,
    }

    let input = match serde_json::from_str::<ChatRequest>(json_str) {
        Ok(req) => req.input.unwrap_or_default(),
        Err(_) => String::new(),
    };

    match state.pipeline.handle(&input).await {
        Ok(reply) => {
            let body = pipeline::success_response(&reply);
            create_response(200, "OK", &body.to_string())
        }
        Err(e) => {
            error!("Chat request failed: {}", e);
            let (status, body) = pipeline::error_response(&e, &input);
            let status_text = match status {
                400 => "Bad Request",
                _ => "Internal Server Error",
            };
            create_response(status, status_text, &body.to_string())
        }
    }
}

fn create_response(status: u16, status_text: &str, body: &str) -> String {
    format!(
        "HTTP/1.1 {} {}\r\n\
         Content-Type: application/json\r\n\
         Access-Control-Allow-Origin: *\r\n\
         Access-Control-Allow-Methods: GET, POST, OPTIONS\r\n\
         Access-Control-Allow-Headers: Content-Type\r\n\
         Content-Length: {}\r\n\
         \r\n\
         {}",
        status,
        status_text,
        body.len(),
        body
    )
}
