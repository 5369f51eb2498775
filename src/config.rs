//! Layered settings for the host binary.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, `SLURMWATCH_*` environment variables, then command-line flags.
//!
//! ```toml
//! delay_secs = 30
//! timeout_secs = 20
//!
//! [config]
//! delay_secs = 300
//!
//! [jobs]
//! command = ["squeue", "--all", "--noheader", "--Format=JobID:64|,Account:64|,UserName:64|,State:24|,SubmitTime:24|,EligibleTime:24"]
//! ```
//!
//! Nested keys come from the environment with a `__` separator, for example
//! `SLURMWATCH_NODES__DELAY_SECS=10`. Command overrides given through the
//! environment are split on spaces.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, ensure, Context, Result};
use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;

use slurmwatch_adapters::command::TIME_FORMAT_ENV;
use slurmwatch_engine::{CommandSpec, EngineBuilder, Facet};

const ENV_PREFIX: &str = "SLURMWATCH";

/// Engine settings after all sources are merged.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Seconds between the starts of two refresh cycles.
    pub delay_secs: u64,
    /// Hard timeout for each status command, in seconds.
    pub timeout_secs: u64,
    pub nodes: FacetSettings,
    pub jobs: FacetSettings,
    pub config: FacetSettings,
}

/// Per-facet overrides.
#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(default)]
pub struct FacetSettings {
    pub delay_secs: Option<u64>,
    /// Replacement argv; the first element is the program.
    pub command: Option<Vec<String>>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            delay_secs: 30,
            timeout_secs: 20,
            nodes: FacetSettings::default(),
            jobs: FacetSettings::default(),
            config: FacetSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from an optional file plus the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::from_sources(path, environment())
    }

    fn from_sources(path: Option<&Path>, env: Environment) -> Result<Self> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }
        let merged = builder
            .add_source(env)
            .build()
            .with_context(|| match path {
                Some(p) => format!("failed to load settings from {}", p.display()),
                None => "failed to load settings from the environment".to_string(),
            })?;

        merged
            .try_deserialize()
            .context("invalid settings")
    }

    /// Apply command-line flags on top of the loaded settings.
    pub fn with_overrides(mut self, delay_secs: Option<u64>, timeout_secs: Option<u64>) -> Self {
        if let Some(delay) = delay_secs {
            self.delay_secs = delay;
        }
        if let Some(timeout) = timeout_secs {
            self.timeout_secs = timeout;
        }
        self
    }

    pub fn facet(&self, facet: Facet) -> &FacetSettings {
        match facet {
            Facet::Nodes => &self.nodes,
            Facet::Jobs => &self.jobs,
            Facet::Config => &self.config,
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        ensure!(self.delay_secs >= 1, "delay_secs must be at least 1 second");
        ensure!(self.timeout_secs >= 1, "timeout_secs must be at least 1 second");

        for facet in Facet::ALL {
            let settings = self.facet(facet);
            if let Some(delay) = settings.delay_secs {
                ensure!(delay >= 1, "{}.delay_secs must be at least 1 second", facet);
            }
            if let Some(argv) = &settings.command {
                if CommandSpec::from_argv(argv.iter().cloned()).is_none() {
                    bail!("{}.command must name a program", facet);
                }
            }
        }
        Ok(())
    }

    /// Translate into an engine builder.
    pub fn engine_builder(&self) -> Result<EngineBuilder> {
        self.validate()?;

        let mut builder = EngineBuilder::new()
            .interval(Duration::from_secs(self.delay_secs))
            .timeout(Duration::from_secs(self.timeout_secs));

        for facet in Facet::ALL {
            let settings = self.facet(facet);
            if let Some(delay) = settings.delay_secs {
                builder = builder.facet_interval(facet, Duration::from_secs(delay));
            }
            if let Some(spec) = self.command(facet)? {
                tracing::debug!(%facet, command = %spec, "using configured command");
                builder = builder.command(facet, spec);
            }
        }
        Ok(builder)
    }

    fn command(&self, facet: Facet) -> Result<Option<CommandSpec>> {
        let Some(argv) = &self.facet(facet).command else {
            return Ok(None);
        };
        let spec = CommandSpec::from_argv(argv.iter().cloned())
            .with_context(|| format!("{}.command must name a program", facet))?;

        // The parsers expect epoch timestamps whatever the command is.
        Ok(Some(match facet {
            Facet::Nodes | Facet::Jobs => spec.env(TIME_FORMAT_ENV.0, TIME_FORMAT_ENV.1),
            Facet::Config => spec,
        }))
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
        .list_separator(" ")
        .with_list_parse_key("nodes.command")
        .with_list_parse_key("jobs.command")
        .with_list_parse_key("config.command")
}
