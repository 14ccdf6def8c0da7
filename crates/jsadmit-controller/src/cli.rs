//! Command line flags (each also readable from `ENV_JSA_*`).

use clap::Parser;

use jsadmit_core::error::Result;

use crate::config::ControllerConfig;

#[derive(Debug, Clone, Parser)]
#[command(name = "jsadmit-controller", version, about = "Admission controller running JavaScript policies")]
pub struct Cli {
    /// YAML config file; built-in defaults when omitted.
    #[arg(long, env = "ENV_JSA_CONFIG")]
    pub config: Option<String>,

    /// Bind address, overrides `server.listen`.
    #[arg(long, env = "ENV_JSA_LISTEN")]
    pub listen: Option<String>,

    /// Script execution timeout in seconds, overrides `script.timeout_ms`.
    #[arg(long, env = "ENV_JSA_TIMEOUT", value_name = "SECONDS")]
    pub timeout: Option<u64>,

    /// Verbose mode (with script logs).
    #[arg(short, long, env = "ENV_JSA_VERBOSE")]
    pub verbose: bool,

    /// Debug mode (all logs).
    #[arg(short, long, env = "ENV_JSA_DEBUG")]
    pub debug: bool,
}

impl Cli {
    /// Filter used when `RUST_LOG` is not set.
    pub fn default_filter(&self) -> &'static str {
        if self.debug {
            "trace"
        } else if self.verbose {
            "info,script=debug"
        } else {
            "info,script=warn"
        }
    }

    /// Apply flag overrides and re-validate.
    pub fn apply(&self, cfg: &mut ControllerConfig) -> Result<()> {
        if let Some(listen) = &self.listen {
            cfg.server.listen = listen.clone();
        }
        if let Some(secs) = self.timeout {
            cfg.script.timeout_ms = secs.saturating_mul(1000);
        }
        cfg.validate()
    }
}
