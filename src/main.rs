use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde_json::{json, Map, Value};
use tracing::info;

use theta_client::client::StaticAddress;
use theta_client::commands::params::{AuthenticationMode, FileType};
use theta_client::utils::logging;
use theta_client::{ClientConfig, ThetaClient};

#[derive(Parser)]
#[command(name = "theta", version, about = "Command client for OSC-compatible cameras")]
struct AppCli {
    /// Config file path
    #[arg(short, long, default_value = "theta.json", global = true)]
    config: String,

    /// Camera base URL, overrides the config file
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Subcommands
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Security {
    None,
    Wep,
    Wpa,
    Wpa3,
}

impl From<Security> for AuthenticationMode {
    fn from(value: Security) -> Self {
        match value {
            Security::None => AuthenticationMode::None,
            Security::Wep => AuthenticationMode::Wep,
            Security::Wpa => AuthenticationMode::Wpa,
            Security::Wpa3 => AuthenticationMode::Wpa3,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum Files {
    All,
    Image,
    Video,
}

impl From<Files> for FileType {
    fn from(value: Files) -> Self {
        match value {
            Files::All => FileType::All,
            Files::Image => FileType::Image,
            Files::Video => FileType::Video,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Register an access point for client mode
    SetAccessPoint {
        ssid: String,
        #[arg(long, value_enum, default_value = "wpa")]
        security: Security,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        stealth: bool,
        #[arg(long, default_value_t = 1)]
        priority: u8,
        /// Use a static address instead of DHCP
        #[arg(long)]
        ip_address: Option<String>,
        #[arg(long)]
        subnet_mask: Option<String>,
        #[arg(long)]
        default_gateway: Option<String>,
    },
    /// Remove a registered access point
    DeleteAccessPoint { ssid: String },
    /// Show registered access points
    ListAccessPoints,
    /// Take a still picture and print its URL
    TakePicture,
    /// List files stored on the camera
    ListFiles {
        #[arg(long, value_enum, default_value = "image")]
        file_type: Files,
        #[arg(long, default_value_t = 0)]
        start: u32,
        #[arg(long, default_value_t = 100)]
        count: u32,
    },
    /// Read option values
    GetOptions { names: Vec<String> },
    /// Reset all settings
    Reset,
    /// Check a long-running command by id
    Status { id: String },
    /// Execute any command with JSON parameters
    Exec {
        name: String,
        #[arg(default_value = "{}")]
        parameters: String,
    },
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    logging::init("info");

    let args = AppCli::parse();
    let mut config = ClientConfig::load_or_default(&args.config)?;
    if let Some(endpoint) = args.endpoint {
        config.endpoint = endpoint;
    }
    info!(endpoint = %config.endpoint, "using camera endpoint");
    let client = ThetaClient::new(&config)?;

    match args.command {
        Commands::SetAccessPoint {
            ssid,
            security,
            password,
            stealth,
            priority,
            ip_address,
            subnet_mask,
            default_gateway,
        } => {
            match ip_address {
                Some(ip_address) => {
                    let address = StaticAddress {
                        ip_address,
                        subnet_mask: subnet_mask.context("--subnet-mask is required with --ip-address")?,
                        default_gateway: default_gateway
                            .context("--default-gateway is required with --ip-address")?,
                    };
                    client
                        .set_access_point_statically(
                            &ssid,
                            stealth,
                            security.into(),
                            password.as_deref(),
                            priority,
                            address,
                            None,
                        )
                        .await?;
                }
                None => {
                    if subnet_mask.is_some() || default_gateway.is_some() {
                        bail!("--subnet-mask and --default-gateway need --ip-address");
                    }
                    client
                        .set_access_point_dynamically(&ssid, stealth, security.into(), password.as_deref(), priority, None)
                        .await?;
                }
            }
            info!(ssid = %ssid, "access point registered");
        }
        Commands::DeleteAccessPoint { ssid } => {
            client.delete_access_point(&ssid).await?;
            info!(ssid = %ssid, "access point deleted");
        }
        Commands::ListAccessPoints => {
            let aps = client.list_access_points().await?;
            print_json(&serde_json::to_value(aps)?)?;
        }
        Commands::TakePicture => {
            let url = client.take_picture().await?;
            print_json(&json!({ "fileUrl": url }))?;
        }
        Commands::ListFiles { file_type, start, count } => {
            let files = client.list_files(file_type.into(), start, count).await?;
            print_json(&serde_json::to_value(files)?)?;
        }
        Commands::GetOptions { names } => {
            let options = client.get_options(names).await?;
            print_json(&Value::Object(options))?;
        }
        Commands::Reset => client.reset().await?,
        Commands::Status { id } => {
            let result = client.command_status(&id).await?;
            print_json(&result.to_wire())?;
        }
        Commands::Exec { name, parameters } => {
            let parameters: Map<String, Value> =
                serde_json::from_str(&parameters).context("parameters must be a JSON object")?;
            let result = client.execute_raw(&name, parameters).await?;
            print_json(&result.to_wire())?;
        }
    }

    Ok(())
}
