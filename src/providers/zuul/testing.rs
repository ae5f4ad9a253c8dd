use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Result;

use super::api::{BuildData, JobApi, PipelineApi, ProjectApi, TenantApi, VariantApi, ZuulApi};

// Canned implementations of the low-level API, for tests that want to
// exercise the request layer without a host to talk to.

#[derive(Default)]
pub(super) struct FakeZuul {
    pub tenants: Vec<Arc<dyn TenantApi>>,
}

impl ZuulApi for FakeZuul {
    fn tenants(&self) -> Result<Vec<Arc<dyn TenantApi>>> {
        Ok(self.tenants.clone())
    }
}

#[derive(Default)]
pub(super) struct FakeTenant {
    pub name: String,
    pub projects: Vec<Arc<dyn ProjectApi>>,
    pub jobs: Vec<Arc<dyn JobApi>>,
}

impl FakeTenant {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

impl TenantApi for FakeTenant {
    fn name(&self) -> &str {
        &self.name
    }

    fn projects(&self) -> Result<Vec<Arc<dyn ProjectApi>>> {
        Ok(self.projects.clone())
    }

    fn jobs(&self) -> Result<Vec<Arc<dyn JobApi>>> {
        Ok(self.jobs.clone())
    }
}

pub(super) struct FakeProject {
    pub tenant: String,
    pub name: String,
    pub pipelines: Vec<Arc<dyn PipelineApi>>,
}

impl ProjectApi for FakeProject {
    fn tenant(&self) -> Arc<dyn TenantApi> {
        Arc::new(FakeTenant::named(&self.tenant))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> String {
        format!("https://zuul.example.org/t/{}/project/{}", self.tenant, self.name)
    }

    fn pipelines(&self) -> Result<Vec<Arc<dyn PipelineApi>>> {
        Ok(self.pipelines.clone())
    }
}

pub(super) struct FakePipeline {
    pub tenant: String,
    pub project: String,
    pub name: String,
    pub jobs: Vec<Arc<dyn JobApi>>,
}

impl PipelineApi for FakePipeline {
    fn project(&self) -> Arc<dyn ProjectApi> {
        Arc::new(FakeProject {
            tenant: self.tenant.clone(),
            name: self.project.clone(),
            pipelines: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn jobs(&self) -> Result<Vec<Arc<dyn JobApi>>> {
        Ok(self.jobs.clone())
    }
}

#[derive(Default)]
pub(super) struct FakeJob {
    pub tenant: String,
    pub name: String,
    pub variants: Vec<Arc<dyn VariantApi>>,
    pub builds: Vec<BuildData>,
}

impl JobApi for FakeJob {
    fn tenant(&self) -> Arc<dyn TenantApi> {
        Arc::new(FakeTenant::named(&self.tenant))
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> String {
        format!("https://zuul.example.org/t/{}/job/{}", self.tenant, self.name)
    }

    fn variants(&self) -> Result<Vec<Arc<dyn VariantApi>>> {
        Ok(self.variants.clone())
    }

    fn builds(&self) -> Result<Vec<BuildData>> {
        Ok(self.builds.clone())
    }
}

pub(super) struct FakeVariant {
    pub tenant: String,
    pub job: String,
    pub name: String,
    pub variables: Map<String, Value>,
}

impl FakeVariant {
    /// A variant of the given job whose variables come from a JSON object.
    pub fn with_variables(job: &str, variables: Value) -> Self {
        Self {
            tenant: "openstack".to_string(),
            job: job.to_string(),
            name: job.to_string(),
            variables: variables.as_object().cloned().unwrap_or_default(),
        }
    }
}

impl VariantApi for FakeVariant {
    fn job(&self) -> Arc<dyn JobApi> {
        Arc::new(FakeJob {
            tenant: self.tenant.clone(),
            name: self.job.clone(),
            ..FakeJob::default()
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self, _recursive: bool) -> Result<Map<String, Value>> {
        Ok(self.variables.clone())
    }
}
