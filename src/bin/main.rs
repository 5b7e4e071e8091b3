//! AFIP WSAA ticket client CLI
//!
//! Obtains login tickets for AFIP web services, reusing the cached ticket
//! while it is still valid, and manages the configuration file.

use afip_ws::{
    adapters::NtpTimeSource,
    domain::time::format_offset,
    infra::config::{ensure_readable, ConfigManager, ExportFormat, WsaaConfiguration, WsaaSettings},
    pipelines::ticket::{trusted_clock, trusted_now, TicketSettings},
    services::TraBuilder,
    Environment, TicketManager,
};
use clap::{Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "afip-ws")]
#[command(about = "Obtain AFIP WSAA login tickets")]
#[command(long_about = "
AFIP WS - WSAA login ticket client

Signs a login ticket request with the taxpayer certificate, submits it to
WSAA and caches the returned ticket per web service until it expires.

EXAMPLES:
    # Ticket for the padron A4 service (testing environment)
    afip-ws ticket --web-service ws_sr_padron_a4

    # Production ticket with explicit certificate and key
    afip-ws ticket -w wsfe --production --certificate prod.crt --private-key private.key

    # Inspect the request that would be signed
    afip-ws tra -w wsfe

    # Encrypted key, passphrase read from a file
    afip-ws ticket -w wsfe --passphrase-file ~/.afip/key.pass

    # Check the time servers
    afip-ws test-time

The key passphrase is never accepted as a command line argument. It comes
from --passphrase-file, AFIP_WS_KEY_PASSPHRASE or the configuration file, in
that order of precedence.

ENVIRONMENT VARIABLES:
    AFIP_WS_KEY_PASSPHRASE  Private key passphrase (overrides config)
    RUST_LOG                Logging level (debug, info, warn, error)
")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Obtain a login ticket, reusing the cached one while valid
    Ticket {
        #[command(flatten)]
        target: TargetArgs,

        /// Certificate issued by AFIP (overrides config)
        #[arg(short, long, value_name = "CERT")]
        certificate: Option<PathBuf>,

        /// Private key (overrides config)
        #[arg(short = 'k', long, value_name = "KEY")]
        private_key: Option<PathBuf>,

        /// CA bundle trusted for WSAA (overrides config)
        #[arg(long, value_name = "CA")]
        ca_cert: Option<PathBuf>,

        /// File holding the private key passphrase
        #[arg(long, value_name = "FILE")]
        passphrase_file: Option<PathBuf>,

        /// Ticket directory (overrides config)
        #[arg(short, long, value_name = "DIR")]
        output_dir: Option<PathBuf>,

        /// Sign in process instead of running openssl
        #[arg(long)]
        native_signer: bool,

        /// Request a new ticket even if the cached one is valid
        #[arg(short, long)]
        force: bool,
    },

    /// Print the login ticket request that would be signed
    Tra {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Test time server connectivity
    TestTime {
        /// Test a specific server (host or host:port)
        #[arg(short, long)]
        server: Option<String>,
    },

    /// Configuration management
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args)]
struct TargetArgs {
    /// Web service to request access to (e.g. ws_sr_padron_a4, wsfe)
    #[arg(short, long, value_name = "NAME")]
    web_service: String,

    /// Use the production environment instead of testing
    #[arg(short, long)]
    production: bool,
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show current configuration
    Show,

    /// Create default configuration file
    Init,

    /// Set a configuration value
    Set {
        /// Configuration key
        key: String,
        /// Configuration value
        value: String,
    },

    /// Export configuration
    Export {
        /// Export format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
        /// Output file (defaults to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Import configuration
    Import {
        /// Configuration file to import
        file: PathBuf,
        /// Import format
        #[arg(short, long, value_enum, default_value = "toml")]
        format: ExportFormatArg,
    },
}

#[derive(ValueEnum, Clone)]
enum ExportFormatArg {
    Toml,
    Json,
    Yaml,
}

impl From<ExportFormatArg> for ExportFormat {
    fn from(arg: ExportFormatArg) -> Self {
        match arg {
            ExportFormatArg::Toml => ExportFormat::Toml,
            ExportFormatArg::Json => ExportFormat::Json,
            ExportFormatArg::Yaml => ExportFormat::Yaml,
        }
    }
}

/// Parameters for the ticket command
struct TicketCommandArgs {
    target: TargetArgs,
    certificate: Option<PathBuf>,
    private_key: Option<PathBuf>,
    ca_cert: Option<PathBuf>,
    passphrase_file: Option<PathBuf>,
    output_dir: Option<PathBuf>,
    native_signer: bool,
    force: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let config_manager = match cli.config {
        Some(path) => ConfigManager::with_path(path),
        None => ConfigManager::new().into_diagnostic()?,
    };

    match cli.command {
        Commands::Ticket {
            target,
            certificate,
            private_key,
            ca_cert,
            passphrase_file,
            output_dir,
            native_signer,
            force,
        } => {
            let args = TicketCommandArgs {
                target,
                certificate,
                private_key,
                ca_cert,
                passphrase_file,
                output_dir,
                native_signer,
                force,
            };
            handle_ticket_command(&config_manager, args).await?;
        }

        Commands::Tra { target } => {
            handle_tra_command(&config_manager, &target).await?;
        }

        Commands::TestTime { server } => {
            handle_test_time_command(&config_manager, server).await?;
        }

        Commands::Config(config_cmd) => {
            handle_config_command(&config_manager, config_cmd)?;
        }
    }

    Ok(())
}

fn resolve_settings(config_manager: &ConfigManager, target: &TargetArgs) -> Result<WsaaSettings> {
    let config = config_manager
        .load_or_default()
        .into_diagnostic()
        .context("Failed to load configuration")?;

    let mut settings = config
        .resolve(&target.web_service, Environment::from_production_flag(target.production))
        .into_diagnostic()?;

    if let Ok(passphrase) = std::env::var(afip_ws::domain::constants::PASSPHRASE_ENV_VAR) {
        settings.passphrase = Some(passphrase);
    }
    Ok(settings)
}

async fn handle_ticket_command(config_manager: &ConfigManager, args: TicketCommandArgs) -> Result<()> {
    let mut settings = resolve_settings(config_manager, &args.target)?;

    if let Some(certificate) = args.certificate {
        settings.certificate = certificate;
    }
    if let Some(private_key) = args.private_key {
        settings.private_key = private_key;
    }
    if let Some(ca_cert) = args.ca_cert {
        settings.ca_cert = Some(ca_cert);
    }
    if let Some(path) = args.passphrase_file {
        settings.passphrase = Some(read_passphrase_file(&path)?);
    }
    if let Some(output_dir) = args.output_dir {
        settings.output_dir = output_dir;
    }
    if args.native_signer {
        settings.signer = afip_ws::infra::config::SignerKind::Native;
    }
    settings.force_renewal = args.force;

    log::info!(
        "Web service: {} | Environment: {}",
        settings.service,
        settings.environment
    );

    let manager = TicketManager::from_settings(&settings).into_diagnostic()?;
    match manager.get_ticket().await {
        Ok(outcome) => {
            println!("✅ Ticket {} for {}", outcome.origin, settings.service);
            println!("  File: {}", outcome.path.display());
            println!("  Token: {}", abbreviate(&outcome.ticket.token));
            println!("  Sign: {}", abbreviate(&outcome.ticket.sign));
            println!("  Expires: {}", outcome.ticket.expiration_time);
            Ok(())
        }
        Err(e) => {
            eprintln!("❌ Could not obtain a ticket for {}", settings.service);
            Err(e).into_diagnostic()
        }
    }
}

fn read_passphrase_file(path: &Path) -> Result<String> {
    ensure_readable(path, "passphrase file").into_diagnostic()?;
    let contents = std::fs::read_to_string(path)
        .into_diagnostic()
        .with_context(|| format!("Failed to read {}", path.display()))?;
    Ok(contents.trim_end_matches(['\r', '\n']).to_string())
}

async fn handle_tra_command(config_manager: &ConfigManager, target: &TargetArgs) -> Result<()> {
    let settings = resolve_settings(config_manager, target)?;
    let now = trusted_now(&trusted_clock(&settings)).await;
    let request = TicketSettings::from(&settings).ticket_request(now);

    let tra = TraBuilder::new().build(&request).into_diagnostic()?;
    log::info!(
        "UTC offset: {}",
        format_offset(*request.generation_time.offset())
    );
    print!("{}", String::from_utf8_lossy(&tra));
    Ok(())
}

async fn handle_test_time_command(config_manager: &ConfigManager, server: Option<String>) -> Result<()> {
    println!("🌐 Testing time server connectivity...");
    let config: WsaaConfiguration = config_manager.load_or_default().into_diagnostic()?;
    let timeout = Duration::from_secs(config.time_server_timeout_seconds);

    let client = match server {
        Some(server) => NtpTimeSource::new(Some(server), Vec::new(), timeout),
        None => NtpTimeSource::new(
            config.primary_time_server.clone(),
            config.fallback_time_servers.clone(),
            timeout,
        ),
    };

    let results = client.test_server_connectivity().await;
    if results.is_empty() {
        println!("⚠️  No time servers configured");
        return Ok(());
    }

    println!("\n📊 Server Connectivity Results:");
    for (server, result) in results {
        match result {
            Ok(now) => println!("  {server}: ✅ {now}"),
            Err(e) => println!("  {server}: ❌ {e}"),
        }
    }
    Ok(())
}

fn handle_config_command(config_manager: &ConfigManager, config_cmd: ConfigCommands) -> Result<()> {
    match config_cmd {
        ConfigCommands::Show => match config_manager.load() {
            Ok(config) => {
                println!("📋 Current Configuration:");
                println!("  Testing certificate: {}", config.testing_certificate.display());
                println!(
                    "  Production certificate: {}",
                    config.production_certificate.display()
                );
                println!("  Private key: {}", config.private_key.display());
                if let Some(ca_cert) = &config.ca_cert {
                    println!("  CA bundle: {}", ca_cert.display());
                }
                println!("  Output directory: {}", config.output_dir.display());
                println!("  Signer: {:?}", config.signer);
                println!(
                    "  Time servers: {}",
                    config
                        .primary_time_server
                        .iter()
                        .chain(config.fallback_time_servers.iter())
                        .cloned()
                        .collect::<Vec<_>>()
                        .join(", ")
                );
                println!("  Web services: {}", config.web_services.join(", "));
                println!(
                    "  Configuration file: {}",
                    config_manager.config_path().display()
                );
            }
            Err(e) if config_manager.config_path().exists() => {
                return Err(e)
                    .into_diagnostic()
                    .with_context(|| {
                        format!(
                            "Failed to load {}",
                            config_manager.config_path().display()
                        )
                    });
            }
            Err(_) => {
                println!("📋 No configuration file found. Use 'config init' to create one.");
            }
        },

        ConfigCommands::Init => {
            config_manager.load_or_create_default().into_diagnostic()?;
            println!(
                "✅ Configuration initialized: {}",
                config_manager.config_path().display()
            );
            println!("   Edit the file to customize settings, or use 'config set' commands.");
        }

        ConfigCommands::Set { key, value } => {
            config_manager
                .update_value(&key, &value)
                .into_diagnostic()?;
            println!("✅ Configuration updated: {key}");
        }

        ConfigCommands::Export { format, output } => {
            let content = config_manager
                .export_config(format.into())
                .into_diagnostic()?;

            if let Some(output_path) = output {
                std::fs::write(&output_path, content).into_diagnostic()?;
                println!("✅ Configuration exported to: {}", output_path.display());
            } else {
                println!("{content}");
            }
        }

        ConfigCommands::Import { file, format } => {
            let content = std::fs::read_to_string(&file).into_diagnostic()?;
            config_manager
                .import_config(&content, format.into())
                .into_diagnostic()?;
            println!("✅ Configuration imported from: {}", file.display());
        }
    }

    Ok(())
}

/// First 25 characters followed by `...`
fn abbreviate(value: &str) -> String {
    let head: String = value.chars().take(25).collect();
    format!("{head}...")
}
