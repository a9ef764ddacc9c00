//! Command line interface
//!
//! ```bash
//! devserve                      # port 8000, current directory
//! devserve 9000 -d ./public     # another port and root
//! devserve -b 127.0.0.1 -c dev  # loopback only, settings from dev.toml
//! ```

use clap::Parser;
use std::path::PathBuf;

use crate::config::{Overrides, DEFAULT_CONFIG_PATH};

#[derive(Debug, Clone, Parser)]
#[command(name = "devserve", version)]
#[command(about = "Serve a directory over HTTP with CORS and caching disabled")]
pub struct Cli {
    /// Port to listen on [default: 8000]
    pub port: Option<u16>,

    /// Address to bind [default: 0.0.0.0]
    #[arg(short, long, value_name = "ADDRESS")]
    pub bind: Option<String>,

    /// Directory to serve [default: current directory]
    #[arg(short, long, value_name = "DIR")]
    pub directory: Option<PathBuf>,

    /// Config file, without extension
    #[arg(short, long, value_name = "FILE", default_value = DEFAULT_CONFIG_PATH, env = "DEVSERVE_CONFIG")]
    pub config: String,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            host: self.bind.clone(),
            port: self.port,
            root: self
                .directory
                .as_ref()
                .map(|d| d.to_string_lossy().into_owned()),
        }
    }
}
