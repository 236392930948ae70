//! Replays a batch of synthetic requests through an access logger.
//!
//! ```text
//! tagline-demo --requests 20
//! tagline-demo --config access-log.yaml --format '${status} ${url}\n'
//! RUST_LOG=tagline=debug tagline-demo
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use http::{HeaderMap, HeaderValue, Method, StatusCode, Uri};
use serde_json::json;
use tagline::{Config, Data, Exchange, LineBuffer, Locals, Logger, Settings, REQUEST_ID_KEY};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "tagline-demo", about = "Replay synthetic requests through an access logger")]
struct Cli {
    /// YAML settings file applied on top of the defaults
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Format string; overrides the settings file
    #[arg(short, long)]
    format: Option<String>,

    /// Number of requests to replay
    #[arg(short = 'n', long, default_value_t = 10)]
    requests: usize,

    /// Simulated handler time per request, in milliseconds
    #[arg(long, default_value_t = 3)]
    work_ms: u64,

    /// Do not log requests for /health
    #[arg(long)]
    skip_health: bool,
}

/// One request/response pair as a toy server would hold it.
struct DemoExchange {
    method: Method,
    uri: Uri,
    route: &'static str,
    request_headers: HeaderMap,
    response_headers: HeaderMap,
    status: StatusCode,
    remote_addr: SocketAddr,
    request_body: Vec<u8>,
    response_body: Vec<u8>,
    locals: Locals,
}

impl DemoExchange {
    fn synthetic(n: usize) -> Result<Self> {
        let (method, target, route) = match n % 5 {
            0 => (Method::GET, format!("/users/{}", n), "/users/:id"),
            1 => (Method::POST, "/users".to_string(), "/users"),
            2 => (Method::GET, format!("/search?q=item+{}&page=2", n), "/search"),
            3 => (Method::DELETE, format!("/users/{}", n), "/users/:id"),
            _ => (Method::GET, "/health".to_string(), "/health"),
        };

        let mut request_headers = HeaderMap::new();
        request_headers.insert(http::header::HOST, HeaderValue::from_static("demo.local"));
        request_headers.insert(http::header::USER_AGENT, HeaderValue::from_static("tagline-demo/0.3"));

        let mut locals = Locals::new();
        locals.insert(REQUEST_ID_KEY.to_string(), json!(format!("req-{:04}", n)));
        locals.insert("attempt".to_string(), json!(n % 3));

        Ok(Self {
            method,
            uri: target.parse().context("building request target")?,
            route,
            request_headers,
            response_headers: HeaderMap::new(),
            status: StatusCode::OK,
            remote_addr: SocketAddr::from(([127, 0, 0, 1], 40000 + (n % 1000) as u16)),
            request_body: Vec::new(),
            response_body: Vec::new(),
            locals,
        })
    }
}

impl Exchange for DemoExchange {
    fn method(&self) -> &Method {
        &self.method
    }

    fn uri(&self) -> &Uri {
        &self.uri
    }

    fn route(&self) -> &str {
        self.route
    }

    fn request_headers(&self) -> &HeaderMap {
        &self.request_headers
    }

    fn response_headers(&self) -> &HeaderMap {
        &self.response_headers
    }

    fn status(&self) -> StatusCode {
        self.status
    }

    fn remote_addr(&self) -> Option<SocketAddr> {
        Some(self.remote_addr)
    }

    fn request_body(&self) -> &[u8] {
        &self.request_body
    }

    fn response_body(&self) -> &[u8] {
        &self.response_body
    }

    fn locals(&self) -> &Locals {
        &self.locals
    }
}

/// The downstream handler: picks a status, writes a body, sometimes fails.
async fn respond(exchange: &mut DemoExchange, work: Duration) -> Result<(), String> {
    tokio::time::sleep(work).await;
    let (status, body) = if exchange.method == Method::POST {
        (StatusCode::CREATED, r#"{"id":42}"#)
    } else if exchange.method == Method::DELETE {
        (StatusCode::FORBIDDEN, "forbidden")
    } else {
        match exchange.route {
            "/search" => (StatusCode::OK, "[]"),
            "/health" => (StatusCode::NO_CONTENT, ""),
            _ => (StatusCode::OK, r#"{"name":"ann"}"#),
        }
    };
    exchange.status = status;
    exchange.response_body = body.as_bytes().to_vec();
    exchange
        .response_headers
        .insert(http::header::CONTENT_LENGTH, HeaderValue::from(body.len()));

    if status == StatusCode::FORBIDDEN {
        return Err("user may not delete accounts".to_string());
    }
    Ok(())
}

fn build_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::new().custom_tag(
        "attempt",
        |out: &mut LineBuffer, data: &Data<'_>, _: &str| match data.local("attempt") {
            Some(value) => tagline::format_local(value, out),
            None => Ok(0),
        },
    );

    if let Some(path) = &cli.config {
        let settings = Settings::from_file(path)
            .with_context(|| format!("loading settings from {}", path.display()))?;
        config = settings.apply(config);
    }
    if let Some(format) = &cli.format {
        config = config.format(format.replace("\\n", "\n"));
    }
    if cli.skip_health {
        config = config.skip(|exchange| exchange.uri().path() == "/health");
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let logger = Logger::new(build_config(&cli)?).context("invalid logger configuration")?;
    let work = Duration::from_millis(cli.work_ms);

    let mut tasks = Vec::with_capacity(cli.requests);
    for n in 0..cli.requests {
        let logger = logger.clone();
        let mut exchange = DemoExchange::synthetic(n)?;
        tasks.push(tokio::spawn(async move {
            let Some(pending) = logger.start(&exchange) else {
                return respond(&mut exchange, work).await;
            };
            let result = respond(&mut exchange, work).await;
            pending.finish(&exchange, result)
        }));
    }

    let mut failed = 0;
    for task in tasks {
        if task.await.context("request task panicked")?.is_err() {
            failed += 1;
        }
    }

    logger.shutdown();
    tracing::info!(
        requests = cli.requests,
        failed,
        written = logger.lines_written(),
        skipped = logger.skipped(),
        write_errors = logger.write_errors(),
        render_errors = logger.render_errors(),
        "replay finished"
    );
    Ok(())
}
