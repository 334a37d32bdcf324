use std::path::PathBuf;

use alps::AlpsConfig;
use clap::{Args, Subcommand};
use clap_handler::Handler;
use fake_user_agent::get_chrome_rua;

mod inspect;
mod process;

#[derive(Subcommand, Clone, Handler)]
pub enum AlpsCommand {
    Inspect(inspect::InspectCommand),
    Process(process::ProcessCommand),
}

#[derive(Args, Clone, Debug, Default)]
pub struct ConfigOptions {
    /// Configuration file
    #[clap(short, long, env = "ALPS_CONFIG")]
    pub config: Option<PathBuf>,

    /// Additional HTTP headers, overriding the ones in the configuration file
    #[clap(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// HTTP timeout, in seconds
    #[clap(short, long)]
    pub timeout: Option<u64>,
}

impl ConfigOptions {
    pub fn load(&self) -> anyhow::Result<AlpsConfig> {
        let mut config = match &self.config {
            Some(path) => {
                tracing::debug!("Loading configuration from {}", path.display());
                AlpsConfig::load(path)?
            }
            None => AlpsConfig::default(),
        };

        config.http.headers.extend(self.headers.iter().cloned());
        if let Some(timeout) = self.timeout {
            config.http.timeout_secs = timeout;
        }
        if config.http.user_agent.is_none() {
            config.http.user_agent = Some(get_chrome_rua().to_string());
        }

        Ok(config)
    }
}
