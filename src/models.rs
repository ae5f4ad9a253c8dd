use chrono::{DateTime, Utc};
use clap::ValueEnum;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A named query-argument slot.
///
/// Every filter the CLI accepts is modelled as one of these: the slot knows
/// its canonical name, the alternate argument spellings that feed it, and
/// whether a data source is expected to populate the data it asks for.
#[derive(Debug, Clone)]
pub struct Attribute<T> {
    /// Canonical name of the argument (e.g., "jobs")
    pub name: String,
    /// Parsed value, present once the user supplied the argument
    pub value: Option<T>,
    /// Alternate CLI spellings that map onto this slot
    pub arguments: Vec<String>,
    /// Whether a data source is expected to fill in the requested data
    pub populate: bool,
}

impl<T> Attribute<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: None,
            arguments: Vec::new(),
            populate: false,
        }
    }

    pub fn with_arguments<I, S>(mut self, arguments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.arguments = arguments.into_iter().map(Into::into).collect();
        self
    }

    /// Marks the slot as one a data source fills in during a query.
    pub fn populated_by_source(mut self) -> Self {
        self.populate = true;
        self
    }

    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    /// Whether the user supplied a value for this argument.
    pub fn is_set(&self) -> bool {
        self.value.is_some()
    }
}

/// Kind of CI system a configuration entry describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum SystemType {
    Jenkins,
    Zuul,
}

impl std::fmt::Display for SystemType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Jenkins => write!(f, "jenkins"),
            Self::Zuul => write!(f, "zuul"),
        }
    }
}

/// A named group of CI systems queried together.
#[derive(Debug, Clone, Serialize)]
pub struct Environment {
    /// Environment name as given in the configuration
    pub name: String,
    /// Systems in configuration order
    pub systems: Vec<System>,
}

/// A single CI system inside an environment.
///
/// Holds the sources it can be queried through and, after a query ran, the
/// jobs collected from the first source that answered.
#[derive(Debug, Clone, Serialize)]
pub struct System {
    /// System name as given in the configuration
    pub name: String,
    /// Kind of backend this system runs
    pub system_type: SystemType,
    /// Whether the system takes part in queries
    pub enabled: bool,
    /// Data sources, in configuration order. Never serialized: they carry
    /// credentials.
    #[serde(skip_serializing)]
    pub sources: Vec<Source>,
    /// Jobs collected for this system, keyed by job name
    pub jobs: IndexMap<String, Job>,
}

impl System {
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A way of reaching a CI system's data.
#[derive(Debug, Clone)]
pub struct Source {
    /// Source name as given in the configuration
    pub name: String,
    /// Backend protocol this source speaks
    pub driver: SystemType,
    /// Base URL of the backend
    pub url: String,
    /// Username for authenticated requests
    pub username: Option<String>,
    /// API token or password for authenticated requests
    pub token: Option<String>,
    /// Path to a PEM certificate bundle for TLS verification
    pub cert: Option<String>,
    /// Zuul tenants this source is restricted to
    pub tenants: Vec<String>,
    /// Whether the source may be used for queries
    pub enabled: bool,
}

impl Source {
    /// Takes the source out of the query rotation. There is no way back:
    /// a disabled source stays disabled for the rest of the run.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// A CI job together with the builds collected for it.
#[derive(Debug, Clone, Serialize)]
pub struct Job {
    /// Job name
    pub name: String,
    /// Web URL of the job
    pub url: Option<String>,
    /// Builds keyed by build id, newest first when the backend orders them so
    pub builds: IndexMap<String, Build>,
    /// Deployment summary derived from the job's variables, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deployment: Option<Deployment>,
}

impl Job {
    pub fn new(name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            url,
            builds: IndexMap::new(),
            deployment: None,
        }
    }

    pub fn add_build(&mut self, build: Build) {
        self.builds.insert(build.build_id.clone(), build);
    }
}

/// A single execution of a job.
#[derive(Debug, Clone, Serialize)]
pub struct Build {
    /// Backend identifier of the build (number or uuid)
    pub build_id: String,
    /// Final result reported by the backend (e.g., "SUCCESS", "FAILURE")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    /// Run time in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
    /// Moment the build started
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// What a job deploys, read from its configuration variables.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Deployment {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub release: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featureset: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub infra_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topology: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cinder_backend: Option<String>,
}

/// Everything a query run produced, ready for rendering or export.
#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    /// When the query finished collecting data
    pub collected_at: DateTime<Utc>,
    /// Environments with their query results filled in
    pub environments: Vec<Environment>,
}
