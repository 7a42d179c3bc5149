use std::{net::SocketAddr, path::Path, sync::Arc};

use axum::{
    Router,
    body::Body,
    extract::Request,
    response::Response,
    routing::any,
};
use clap::Parser;
use color_eyre::{
    Result,
    eyre::{Context, eyre},
};
use portico::{
    GatewayService, HealthChecker, HttpClient, HttpClientAdapter, HttpHandler,
    config::{ServerConfig, ServerConfigValidator, loader::load_config},
    tracing_setup,
};

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    #[clap(subcommand)]
    command: Option<Commands>,

    #[clap(short, long, default_value = "config.yaml")]
    config: String,

    /// Use human-readable console output instead of JSON logs
    #[clap(long)]
    pretty: bool,

    /// Log filter directive (e.g. "debug" or "portico=trace")
    #[clap(long)]
    log_level: Option<String>,
}

#[derive(Parser, Debug)]
enum Commands {
    /// Validate configuration file
    Validate {
        /// Configuration file to validate
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Initialize a new configuration file
    Init {
        /// Output path for the new config file
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
    /// Start the gateway server (default)
    Serve {
        /// Configuration file to use
        #[clap(short, long, default_value = "config.yaml")]
        config: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    let pretty = args.pretty;
    let log_level = args.log_level.clone();

    let (command, config_path) = match args.command {
        Some(Commands::Validate { config }) => ("validate", config),
        Some(Commands::Init { config }) => ("init", config),
        Some(Commands::Serve { config }) => ("serve", config),
        None => ("serve", args.config), // Default to serve with config from args
    };

    match command {
        "validate" => {
            return validate_config_command(&config_path).await;
        }
        "init" => {
            return init_config_command(&config_path).await;
        }
        "serve" => {
            // Continue with normal server startup
        }
        _ => unreachable!(),
    }

    if let Some(level) = &log_level {
        tracing_setup::init_tracing_with_config(level, !pretty)
    } else if pretty {
        tracing_setup::init_console_tracing()
    } else {
        tracing_setup::init_tracing()
    }
    .map_err(|e| eyre!("Failed to initialize tracing: {}", e))?;

    tracing::info!("Loading configuration from {config_path}");
    let config: ServerConfig = load_config(&config_path)
        .await
        .with_context(|| format!("Failed to load config from {config_path}"))?;

    ServerConfigValidator::validate(&config)
        .map_err(|e| eyre!("Invalid configuration: {e}"))?;

    let config = Arc::new(config);
    let gateway_service = Arc::new(GatewayService::new(config.clone()));

    let http_client: Arc<dyn HttpClient> =
        Arc::new(HttpClientAdapter::new().context("Failed to create HTTP client adapter")?);

    // The probe loop runs as an independent task; it shares only the
    // registry's atomics with request handling.
    let mut health_checker_handle = None;
    if config.health_check.enabled {
        let health_checker =
            HealthChecker::new(gateway_service.clone(), http_client.clone());
        tracing::info!(
            "Starting health checker. Interval: {}s, Path: {}, Unhealthy Threshold: {}, Healthy Threshold: {}",
            config.health_check.interval_secs,
            config.health_check.path,
            config.health_check.unhealthy_threshold,
            config.health_check.healthy_threshold
        );
        health_checker_handle = Some(tokio::spawn(async move {
            if let Err(e) = health_checker.run().await {
                tracing::error!("Health checker run error: {}", e);
            }
        }));
    } else {
        tracing::info!("Health checking disabled; static table is authoritative");
    }

    let http_handler = Arc::new(HttpHandler::new(gateway_service.clone(), http_client));

    let addr: SocketAddr = config
        .listen_addr
        .parse()
        .context("Failed to parse listen address")?;

    for (service, addresses) in &config.static_services {
        tracing::info!("Configured service: {} -> {:?}", service, addresses);
    }

    let make_request_route = |handler: Arc<HttpHandler>| {
        any(move |req: Request| {
            let handler = handler.clone();
            async move {
                match handler.handle_request(req).await {
                    Ok(response) => response,
                    Err(e) => {
                        tracing::error!("Request handling error: {:?}", e);
                        Response::builder()
                            .status(500)
                            .body(Body::from("Internal Server Error"))
                            .unwrap_or_else(|_| Response::new(Body::from("Internal Server Error")))
                    }
                }
            }
        })
    };

    let app = Router::new()
        .route("/{*path}", make_request_route(http_handler.clone()))
        .route("/", make_request_route(http_handler.clone()));

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    tracing::info!(
        "Portico gateway listening on {} (prefix: /{}, registration: {})",
        addr,
        config.routing.prefix,
        config.registration.enabled
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if let Some(handle) = health_checker_handle.take() {
        tracing::info!("Shutting down health checker...");
        handle.abort();
    }

    tracing::info!("Graceful shutdown completed");
    Ok(())
}

/// Resolve when the process receives ctrl-c or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

/// Validate configuration file and exit
async fn validate_config_command(config_path: &str) -> Result<()> {
    println!("🔍 Validating configuration file: {config_path}");

    if !Path::new(config_path).exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' not found");
        std::process::exit(1);
    }

    let config = match load_config(config_path).await {
        Ok(config) => {
            println!("✅ Configuration parsing: OK");
            config
        }
        Err(e) => {
            eprintln!("❌ Configuration parsing failed:");
            eprintln!("   {e}");
            std::process::exit(1);
        }
    };

    match ServerConfigValidator::validate(&config) {
        Ok(()) => {
            println!("✅ Configuration validation: OK");
            println!();
            println!("📋 Configuration Summary:");
            println!("   • Listen Address: {}", config.listen_addr);
            println!("   • Route Prefix: /{}", config.routing.prefix);
            println!("   • Static Services: {}", config.static_services.len());
            println!("   • Registration: {}", config.registration.enabled);
            println!("   • Health Checks: {}", config.health_check.enabled);
            println!();
            println!("🎉 Configuration is valid and ready to use!");
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Configuration validation failed:");
            eprintln!("{e}");
            println!();
            println!("💡 Common fixes:");
            println!("   • Ensure all service addresses start with http:// or https://");
            println!("   • Verify listen address format (e.g., '127.0.0.1:8080')");
            println!("   • Probe intervals and thresholds must be greater than zero");
            std::process::exit(1);
        }
    }
}

/// Initialize a new configuration file
async fn init_config_command(config_path: &str) -> Result<()> {
    let path = Path::new(config_path);
    if path.exists() {
        eprintln!("❌ Error: Configuration file '{config_path}' already exists");
        std::process::exit(1);
    }

    let default_config = r#"# Portico Gateway Configuration

# The address to listen on
listen_addr: "127.0.0.1:8080"

# Path convention: /<prefix>/<service>/<rest> -> <service><service_suffix>
routing:
  prefix: "api"
  service_suffix: "-service"

# Backends may register/deregister themselves at runtime
registration:
  enabled: true

# Health probing of registered instances
health_check:
  enabled: true
  interval_secs: 10
  timeout_secs: 1
  path: "/health"
  unhealthy_threshold: 3
  healthy_threshold: 2

# Static serviceName -> base URLs table
static_services:
  users-service:
    - "http://localhost:8081"
  products-service:
    - "http://localhost:8082"
"#;

    tokio::fs::write(path, default_config)
        .await
        .context("Failed to write config file")?;
    println!("✅ Created default configuration at: {config_path}");
    println!("   Run 'portico serve --config {config_path}' to start the gateway");
    Ok(())
}
