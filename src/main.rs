use std::{io::Read, sync::Arc};

use anyhow::Context;
use clap::Parser;
use codec_prefs::{
    EncodingConfiguration, JsonFileStore, MediaKind, StaticCatalog, codec::default_priority,
    engine::PluginList, negotiation::negotiate_offer,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod cli;
mod http;
mod shell;
mod state;

use cli::{Cli, Command};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .with_level(true)
        .with_ansi(true)
        .init();

    let cli = Cli::parse();

    let store = JsonFileStore::open(&cli.config)
        .with_context(|| format!("opening {}", cli.config.display()))?;
    let store_path = store.path().to_path_buf();
    let config = Arc::new(EncodingConfiguration::with_prefix(
        Arc::new(StaticCatalog::builtin()),
        Arc::new(store),
        cli.prefix,
    ));
    info!(
        "Priorities under {}.* persisted to {}",
        config.prefix(),
        store_path.display()
    );

    match cli.command {
        Command::Shell => {
            let config = Arc::clone(&config);
            tokio::task::spawn_blocking(move || shell::run(config)).await??;
        }
        Command::Serve { listen } => serve(config, &listen).await?,
        command => execute(&config, command)?,
    }
    Ok(())
}

/// Runs one of the non-interactive commands, printing its result.
pub fn execute(config: &EncodingConfiguration, command: Command) -> anyhow::Result<()> {
    match command {
        Command::List { kind, all } => {
            let kinds = match kind {
                Some(kind) => vec![kind],
                None => MediaKind::ALL.to_vec(),
            };
            for kind in kinds {
                println!("{kind}:");
                for (format, priority) in config.ordered_encodings(kind) {
                    if priority <= 0 && !all {
                        continue;
                    }
                    let state = if priority > 0 { "" } else { " (disabled)" };
                    println!("  {:>6}  {}{}", priority, format, state);
                }
            }
        }
        Command::Get { format } => {
            let format = state::resolve(config, None, &format.encoding, format.clock_rate);
            println!(
                "{} {} (default {})",
                format,
                config.priority(&format),
                default_priority(&format.encoding, format.clock_rate)
            );
        }
        Command::Set { format, priority } => {
            let format = state::resolve(config, None, &format.encoding, format.clock_rate);
            config.set_priority(&format, priority);
            println!("{} {}", format, config.priority(&format));
        }
        Command::Move {
            kind,
            format,
            direction,
        } => {
            let format = state::resolve(config, Some(kind), &format.encoding, format.clock_rate);
            let index = config
                .move_encoding(kind, &format, direction.into())
                .with_context(|| format!("cannot move {format} {direction:?}"))?;
            println!("{} is now #{}", format, index + 1);
        }
        Command::Negotiate { file } => {
            let sdp = if file.as_os_str() == "-" {
                let mut sdp = String::new();
                std::io::stdin().read_to_string(&mut sdp)?;
                sdp
            } else {
                std::fs::read_to_string(&file)
                    .with_context(|| format!("reading {}", file.display()))?
            };
            let media = negotiate_offer(config, &sdp)?;
            println!(
                "{}",
                serde_json::to_string_pretty(&http::negotiated_json(config, &media))?
            );
        }
        Command::Shell | Command::Serve { .. } => {
            anyhow::bail!("command must be run at top level")
        }
    }
    Ok(())
}

async fn serve(config: Arc<EncodingConfiguration>, listen: &str) -> anyhow::Result<()> {
    let mut plugins = PluginList::default();
    let registered = config.register_custom_codecs(&mut plugins);
    config.register_custom_packages(&mut plugins);
    info!(
        "Registered {} codec plugins, {} packages",
        registered,
        plugins.packages.len()
    );

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = http::router(AppState::new(config))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        version = ?request.version(),
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            status = %response.status(),
                            latency_ms = %latency.as_millis(),
                            "response"
                        );
                    },
                ),
        )
        .layer(cors);

    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("binding {listen}"))?;

    info!("Codec preference API listening on http://{}", listen);
    info!("GET /encodings/{{kind}} | PUT /encodings/{{kind}}/{{name}}/{{rate}} | POST /negotiate | POST /answer");

    axum::serve(listener, app).await?;
    Ok(())
}
