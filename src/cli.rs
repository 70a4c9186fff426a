//! Command-line interface.

use crate::config::Config;
use crate::job::JobConfig;
use clap::error::ErrorKind;
use clap::{ArgAction, CommandFactory, Parser};
use std::fs::File;
use std::path::PathBuf;

/// Compress the PNG and JPEG images inside a zip archive with the tinypng
/// service, caching results so unchanged images are never sent twice.
#[derive(Parser, Debug)]
#[command(name = "shrinkzip", version, about)]
pub struct Cli {
    /// Input zip archive
    #[arg(long, value_name = "PATH")]
    pub zip: PathBuf,

    /// tinypng API key
    #[arg(long, env = "TINYPNG_KEY", hide_env_values = true)]
    pub key: Option<String>,

    /// Output zip archive
    #[arg(short, long, value_name = "PATH", default_value = "a.zip")]
    pub output: PathBuf,

    /// Cache directory
    #[arg(long, value_name = "PATH", default_value = "img.db")]
    pub db: PathBuf,

    /// TOML config file
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Images compressed at once
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Remote request timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Also compress images under __MACOSX/.svn style paths
    #[arg(long)]
    pub no_skip_noise: bool,

    /// More logging (-v, -vv)
    #[arg(short, long, action = ArgAction::Count, conflicts_with = "quiet")]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long)]
    pub quiet: bool,
}

impl Cli {
    /// Check the arguments the run can't start without, reporting failures
    /// as usage errors.
    pub fn validate(&self) -> Result<(), clap::Error> {
        if self.key().is_none() {
            return Err(Cli::command().error(
                ErrorKind::MissingRequiredArgument,
                "an API key is required: pass --key or set TINYPNG_KEY",
            ));
        }
        if let Err(e) = File::open(&self.zip) {
            return Err(Cli::command().error(
                ErrorKind::Io,
                format!("can't read input archive {}: {}", self.zip.display(), e),
            ));
        }
        Ok(())
    }

    /// Non-empty API key, if given.
    pub fn key(&self) -> Option<&str> {
        self.key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Default log filter for this crate.
    pub fn log_level(&self) -> &'static str {
        if self.quiet {
            return "warn";
        }
        match self.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    }

    /// Config file (or defaults) with command-line overrides applied.
    pub fn resolve_config(&self) -> anyhow::Result<Config> {
        let mut config = match &self.config {
            Some(path) => Config::load(path)?,
            None => Config::default(),
        };
        if let Some(jobs) = self.jobs {
            config.concurrency = jobs;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if self.no_skip_noise {
            config.skip_noise = false;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn job_config(&self) -> anyhow::Result<JobConfig> {
        Ok(JobConfig {
            input: self.zip.clone(),
            output: self.output.clone(),
            cache_path: self.db.clone(),
            key: self.key().unwrap_or_default().to_string(),
            config: self.resolve_config()?,
        })
    }
}
