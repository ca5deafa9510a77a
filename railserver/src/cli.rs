//! CLI flags and environment variables: these belong to the
//! external runner, not the core, so they live entirely in this crate.

use clap::Parser;

use railcore::config::Profile;

#[derive(Parser, Debug)]
#[command(name = "railserver", about = "Rail logistics game server")]
pub struct Cli {
    /// Server bind address.
    #[arg(long, env = "SERVER_ADDR")]
    pub address: Option<String>,

    /// Server bind port.
    #[arg(long, env = "SERVER_PORT")]
    pub port: Option<u16>,

    /// `tracing_subscriber::EnvFilter` directive, e.g. "info" or "railcore=debug".
    #[arg(long = "log-level", env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// sqlite connection URI for the action log / player table.
    #[arg(long = "db-uri", env = "DB_URI")]
    pub db_uri: Option<String>,

    /// Glob pattern used to discover map definition files.
    #[arg(long = "maps-glob", env = "MAPS_DISCOVERY")]
    pub maps_discovery: Option<String>,

    /// Configuration profile: "production", "testing", or "testing_with_events".
    #[arg(long, env = "SERVER_CONFIG", default_value = "production")]
    pub profile: String,

    /// Directory log files are written to; unset logs to stderr only.
    #[arg(long, env = "LOG_DIR")]
    pub log_dir: Option<String>,
}

impl Cli {
    pub fn into_config(self) -> railcore::config::Config {
        let mut config = railcore::config::Config::for_profile(Profile::parse(&self.profile)).apply_env();
        if let Some(addr) = self.address {
            config.server_addr = addr;
        }
        if let Some(port) = self.port {
            config.server_port = port;
        }
        if let Some(uri) = self.db_uri {
            config.db_uri = uri;
        }
        if let Some(glob) = self.maps_discovery {
            config.maps_discovery = glob;
        }
        config
    }
}
