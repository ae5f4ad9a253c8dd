use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::error::Result;

/// Low-level view of a Zuul host.
///
/// The traits below mirror the hierarchy Zuul itself exposes: a host has
/// tenants, a tenant has projects and jobs, and so on downwards. Everything
/// above this layer talks to these traits only, so tests can swap the REST
/// implementation for a canned one.
pub(super) trait ZuulApi {
    fn tenants(&self) -> Result<Vec<Arc<dyn TenantApi>>>;
}

pub(super) trait TenantApi {
    fn name(&self) -> &str;

    fn projects(&self) -> Result<Vec<Arc<dyn ProjectApi>>>;

    fn jobs(&self) -> Result<Vec<Arc<dyn JobApi>>>;
}

pub(super) trait ProjectApi {
    /// The tenant this project belongs to.
    fn tenant(&self) -> Arc<dyn TenantApi>;

    fn name(&self) -> &str;

    /// Web URL of the project on the host.
    fn url(&self) -> String;

    fn pipelines(&self) -> Result<Vec<Arc<dyn PipelineApi>>>;
}

pub(super) trait PipelineApi {
    /// The project this pipeline was read from.
    fn project(&self) -> Arc<dyn ProjectApi>;

    fn name(&self) -> &str;

    fn jobs(&self) -> Result<Vec<Arc<dyn JobApi>>>;
}

pub(super) trait JobApi {
    /// The tenant this job belongs to.
    fn tenant(&self) -> Arc<dyn TenantApi>;

    fn name(&self) -> &str;

    /// Web URL of the job on the host.
    fn url(&self) -> String;

    fn variants(&self) -> Result<Vec<Arc<dyn VariantApi>>>;

    /// Builds of the job, newest first.
    fn builds(&self) -> Result<Vec<BuildData>>;
}

pub(super) trait VariantApi {
    /// The job this variant defines.
    fn job(&self) -> Arc<dyn JobApi>;

    fn name(&self) -> &str;

    /// Variables of the variant. With `recursive` the variables of every
    /// parent job are folded in, nearer definitions shadowing farther ones.
    fn variables(&self, recursive: bool) -> Result<Map<String, Value>>;
}

/// One build as the host reports it.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct BuildData {
    /// Identifier of the build
    pub uuid: String,
    /// Final result, absent while the build runs
    pub result: Option<String>,
    /// Project the build ran for
    #[serde(default)]
    pub project: Option<String>,
    /// Pipeline that triggered the build
    #[serde(default)]
    pub pipeline: Option<String>,
    /// Run time in seconds
    #[serde(default)]
    pub duration: Option<f64>,
    /// Start of the build, e.g. "2022-03-21T12:08:05"
    #[serde(default)]
    pub start_time: Option<String>,
}
