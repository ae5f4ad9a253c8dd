use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::Path;

use crate::models::{Environment, Source, System, SystemType};

/// Configuration file structure for ciquery.
///
/// Describes the environments to query: each environment groups the CI
/// systems it is made of, and each system lists the sources its data can be
/// pulled from. Configuration files are loaded from the current directory,
/// the user configuration directory, or a specified path.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// Environments keyed by name, in file order
    pub environments: IndexMap<String, EnvironmentConfig>,
}

/// Systems of one environment, keyed by system name.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct EnvironmentConfig {
    pub systems: IndexMap<String, SystemConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SystemConfig {
    /// Kind of backend the system runs
    pub system_type: SystemType,

    /// Whether the system takes part in queries
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Data sources keyed by name, in file order
    #[serde(default)]
    pub sources: IndexMap<String, SourceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct SourceConfig {
    /// Backend protocol the source speaks
    pub driver: SystemType,

    /// Base URL of the backend
    pub url: String,

    /// Username for authenticated requests
    pub username: Option<String>,

    /// API token or password for authenticated requests
    pub token: Option<String>,

    /// Path to a PEM certificate bundle for TLS verification
    pub cert: Option<String>,

    /// Zuul tenants the source is restricted to
    #[serde(default)]
    pub tenants: Vec<String>,
}

fn default_enabled() -> bool {
    true
}

impl Config {
    /// Load configuration from a file.
    ///
    /// Searches for configuration files in this order:
    /// 1. Specified path
    /// 2. ./ciquery.toml
    /// 3. ./ciquery.json
    /// 4. ./ciquery.yaml
    /// 5. ./ciquery.yml
    /// 6. The same names under the user configuration directory, in a
    ///    `ciquery` subdirectory (e.g., ~/.config/ciquery/ciquery.yaml)
    ///
    /// # Errors
    ///
    /// Fails if no configuration file is found anywhere: there is no
    /// sensible default environment to query.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        // Try common configuration file names
        let candidates = ["ciquery.toml", "ciquery.json", "ciquery.yaml", "ciquery.yml"];

        for candidate in &candidates {
            let path = Path::new(candidate);
            if path.exists() {
                return Self::load_from_path(path);
            }
        }

        if let Some(config_dir) = dirs::config_dir() {
            for candidate in &candidates {
                let path = config_dir.join("ciquery").join(candidate);
                if path.exists() {
                    return Self::load_from_path(&path);
                }
            }
        }

        anyhow::bail!(
            "No configuration file found. Looked for ciquery.{{toml,json,yaml,yml}} \
             in the current directory and the user configuration directory"
        )
    }

    /// Load configuration from a specific file path.
    fn load_from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let extension = path.extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("");

        match extension {
            "toml" => {
                toml::from_str(&contents)
                    .with_context(|| format!("Failed to parse TOML config: {}", path.display()))
            }
            "json" => {
                serde_json::from_str(&contents)
                    .with_context(|| format!("Failed to parse JSON config: {}", path.display()))
            }
            "yaml" | "yml" => {
                serde_yaml::from_str(&contents)
                    .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
            }
            _ => {
                // Try TOML first, then JSON, then YAML
                toml::from_str(&contents)
                    .or_else(|_| serde_json::from_str(&contents))
                    .or_else(|_| serde_yaml::from_str(&contents))
                    .with_context(|| format!("Failed to parse config file: {}", path.display()))
            }
        }
    }

    /// Turn the raw configuration into the environment model a query runs
    /// against. Sources always start out enabled; only validation turns
    /// them off.
    pub fn build_environments(&self) -> Vec<Environment> {
        self.environments
            .iter()
            .map(|(env_name, env)| Environment {
                name: env_name.clone(),
                systems: env
                    .systems
                    .iter()
                    .map(|(system_name, system)| System {
                        name: system_name.clone(),
                        system_type: system.system_type,
                        enabled: system.enabled,
                        sources: system
                            .sources
                            .iter()
                            .map(|(source_name, source)| Source {
                                name: source_name.clone(),
                                driver: source.driver,
                                url: source.url.clone(),
                                username: source.username.clone(),
                                token: source.token.clone(),
                                cert: source.cert.clone(),
                                tenants: source.tenants.clone(),
                                enabled: true,
                            })
                            .collect(),
                        jobs: IndexMap::new(),
                    })
                    .collect(),
            })
            .collect()
    }
}
