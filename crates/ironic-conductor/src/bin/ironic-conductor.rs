//! Ironic conductor CLI - configuration, status and boot assets for a
//! conductor unit.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ironic_conductor::actions::{self, SecretOutcome};
use ironic_conductor::openstack::{IdentityCredentials, OpenStackClients};
use ironic_conductor::pxe::PxeBootLayout;
use ironic_conductor::release;
use ironic_conductor::state::RelationState;
use ironic_conductor::{CharmConfig, InterfaceCatalog, IronicConductorCharm, UnitState};

/// Ironic conductor CLI.
#[derive(Parser)]
#[command(name = "ironic-conductor")]
#[command(about = "Configure and assess an Ironic conductor unit")]
struct Cli {
    /// Operator configuration file (YAML).
    #[arg(long, env = "IRONIC_CONDUCTOR_CONFIG", default_value = "config.yaml")]
    config: PathBuf,

    /// Directory holding the unit state file.
    #[arg(
        long,
        env = "IRONIC_CONDUCTOR_STATE_DIR",
        default_value = "/var/lib/ironic-conductor"
    )]
    state_dir: PathBuf,

    /// OpenStack release codename; detected from the package version when
    /// omitted.
    #[arg(long, env = "IRONIC_RELEASE")]
    release: Option<String>,

    /// Installed `ironic-common` package version (e.g. `1:15.0.0-0ubuntu1`).
    #[arg(long, env = "IRONIC_COMMON_VERSION")]
    package_version: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the resolved driver interfaces and packages as JSON.
    Resolve,

    /// Print the release codename in effect.
    DetectRelease,

    /// Print the unit's workload status.
    Status,

    /// Write the template context and mark configuration complete.
    Render {
        /// Output file for the context (JSON).
        #[arg(long, default_value = "ironic-context.json")]
        output: PathBuf,
    },

    /// Record the state of a relation.
    Relation {
        /// Relation endpoint name (e.g. amqp, shared-db).
        name: String,

        /// The remote side has published all data.
        #[arg(long)]
        available: bool,
    },

    /// Record whether this unit holds leadership.
    Leader {
        /// Leadership flag.
        #[arg(long, action = clap::ArgAction::Set, default_value_t = true)]
        elected: bool,
    },

    /// Record a setting published by the leader (e.g. temp_url_secret).
    LeaderSettings {
        /// Setting name.
        key: String,

        /// Setting value.
        value: String,
    },

    /// Copy PXE/iPXE boot binaries into the TFTP root.
    InstallBootAssets {
        /// TFTP root directory.
        #[arg(long, default_value = "/tftpboot")]
        tftp_root: PathBuf,

        /// HTTP boot root directory.
        #[arg(long, default_value = "/httpboot")]
        http_root: PathBuf,
    },

    /// Generate and publish the Swift temp URL secret (leader only), then
    /// re-render the context when it changed.
    SetTempUrlSecret {
        #[command(flatten)]
        identity: IdentityArgs,

        /// Output file for the re-rendered context (JSON).
        #[arg(long, default_value = "ironic-context.json")]
        output: PathBuf,
    },
}

/// Keystone service credentials.
#[derive(Args)]
struct IdentityArgs {
    #[arg(long, env = "OS_USERNAME")]
    username: String,

    #[arg(long, env = "OS_PASSWORD", hide_env_values = true)]
    password: String,

    #[arg(long, env = "OS_PROJECT_NAME", default_value = "services")]
    project_name: String,

    /// Keystone host.
    #[arg(long, env = "OS_AUTH_HOST")]
    auth_host: String,

    #[arg(long, env = "OS_AUTH_PROTOCOL", default_value = "http")]
    auth_protocol: String,

    #[arg(long, env = "OS_AUTH_PORT", default_value = "5000")]
    auth_port: u16,

    /// Identity API version (`3` or `2.0`).
    #[arg(long, env = "OS_IDENTITY_API_VERSION", default_value = "3")]
    api_version: String,

    #[arg(long, env = "OS_PROJECT_DOMAIN_NAME", default_value = "default")]
    project_domain_name: String,

    #[arg(long, env = "OS_USER_DOMAIN_NAME", default_value = "default")]
    user_domain_name: String,
}

impl From<IdentityArgs> for IdentityCredentials {
    fn from(args: IdentityArgs) -> Self {
        Self {
            username: args.username,
            password: args.password,
            project_name: args.project_name,
            auth_protocol: args.auth_protocol,
            auth_host: args.auth_host,
            credentials_port: args.auth_port,
            api_version: args.api_version,
            project_domain_name: args.project_domain_name,
            user_domain_name: args.user_domain_name,
        }
    }
}

fn load_config(path: &Path) -> Result<CharmConfig> {
    if path.exists() {
        CharmConfig::load(path).with_context(|| format!("Failed to load {}", path.display()))
    } else {
        warn!(path = %path.display(), "Configuration file not found, using defaults");
        Ok(CharmConfig::default())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let release = cli
        .release
        .clone()
        .unwrap_or_else(|| release::select_release(cli.package_version.as_deref()).to_string());
    let mut state = UnitState::load(&cli.state_dir).context("Failed to load unit state")?;

    match cli.command {
        Commands::Resolve => {
            let charm = build_charm(&cli.config, &release)?;
            let output = serde_json::json!({
                "release": charm.release(),
                "catalog_release": charm.resolution().release,
                "interfaces": charm.resolution().config,
                "packages": charm.packages(),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }

        Commands::DetectRelease => {
            println!("{release}");
        }

        Commands::Status => {
            let charm = build_charm(&cli.config, &release)?;
            println!("{}", charm.assess_status(&state));
        }

        Commands::Render { output } => {
            let charm = build_charm(&cli.config, &release)?;
            println!("{}", charm.render(&mut state, &output)?);
        }

        Commands::Relation { name, available } => {
            let relation_state = if available {
                RelationState::Available
            } else {
                RelationState::Connected
            };
            state.set_relation(&name, relation_state)?;
            info!(relation = %name, state = ?relation_state, "Relation recorded");
        }

        Commands::Leader { elected } => {
            state.is_leader = elected;
            state.save()?;
            info!(leader = elected, "Leadership recorded");
        }

        Commands::LeaderSettings { key, value } => {
            state.record_leader_setting(&key, &value)?;
        }

        Commands::InstallBootAssets {
            tftp_root,
            http_root,
        } => {
            let layout = PxeBootLayout::default().with_roots(tftp_root, http_root);
            layout
                .copy_resources()
                .context("Failed to install boot assets")?;
            println!("Boot assets installed in {}", layout.tftp_root.display());
        }

        Commands::SetTempUrlSecret { identity, output } => {
            let creds = IdentityCredentials::from(identity);
            let outcome =
                actions::set_temp_url_secret(&mut state, || OpenStackClients::connect(&creds))
                    .await?;
            match outcome {
                SecretOutcome::Rotated => {
                    println!("Temp URL secret published");
                    // Leader picks the secret up now; peers on their next render.
                    let charm = build_charm(&cli.config, &release)?;
                    println!("{}", charm.render(&mut state, &output)?);
                }
                SecretOutcome::Unchanged => println!("Temp URL secret unchanged"),
            }
        }
    }

    Ok(())
}

fn build_charm(config: &Path, release: &str) -> Result<IronicConductorCharm> {
    let config = load_config(config)?;
    Ok(IronicConductorCharm::new(
        config,
        release,
        InterfaceCatalog::builtin(),
    ))
}
