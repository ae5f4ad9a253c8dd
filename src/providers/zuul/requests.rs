use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::Result;
use crate::filtering::{apply_filters, Filter, Matcher};

use super::api::{BuildData, JobApi, PipelineApi, ProjectApi, TenantApi, VariantApi, ZuulApi};

/// High-level request for the tenants of a host.
///
/// Like every request here, it starts out asking for everything its scope
/// holds and narrows down with each `with_*` call: the patterns of one call
/// are alternatives, separate calls all have to hold. Nothing is fetched
/// until `get`, which wraps what survived the filters into responses.
pub(super) struct TenantsRequest {
    zuul: Arc<dyn ZuulApi>,
    filters: Vec<Filter<Arc<dyn TenantApi>>>,
}

impl TenantsRequest {
    pub(super) fn new(zuul: Arc<dyn ZuulApi>) -> Self {
        Self {
            zuul,
            filters: Vec::new(),
        }
    }

    /// Limit the request to tenants whose name follows one of the patterns.
    pub(super) fn with_name<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |tenant: &Arc<dyn TenantApi>| {
            matcher.matches(tenant.name())
        }));

        Ok(self)
    }

    /// Performs the request.
    pub(super) fn get(&self) -> Result<Vec<TenantResponse>> {
        let tenants = apply_filters(self.zuul.tenants()?, &self.filters);

        Ok(tenants.into_iter().map(TenantResponse::new).collect())
    }
}

/// High-level request for the projects of a tenant.
pub(super) struct ProjectsRequest {
    tenant: Arc<dyn TenantApi>,
    filters: Vec<Filter<Arc<dyn ProjectApi>>>,
}

impl ProjectsRequest {
    pub(super) fn new(tenant: Arc<dyn TenantApi>) -> Self {
        Self {
            tenant,
            filters: Vec::new(),
        }
    }

    /// Limit the request to projects whose name follows one of the
    /// patterns.
    pub(super) fn with_name<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |project: &Arc<dyn ProjectApi>| {
            matcher.matches(project.name())
        }));

        Ok(self)
    }

    /// Performs the request.
    pub(super) fn get(&self) -> Result<Vec<ProjectResponse>> {
        let projects = apply_filters(self.tenant.projects()?, &self.filters);

        Ok(projects.into_iter().map(ProjectResponse::new).collect())
    }
}

/// High-level request for the pipelines of a project.
pub(super) struct PipelinesRequest {
    project: Arc<dyn ProjectApi>,
    filters: Vec<Filter<Arc<dyn PipelineApi>>>,
}

impl PipelinesRequest {
    pub(super) fn new(project: Arc<dyn ProjectApi>) -> Self {
        Self {
            project,
            filters: Vec::new(),
        }
    }

    /// Limit the request to pipelines whose name follows one of the
    /// patterns.
    pub(super) fn with_name<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |pipeline: &Arc<dyn PipelineApi>| {
            matcher.matches(pipeline.name())
        }));

        Ok(self)
    }

    /// Performs the request.
    pub(super) fn get(&self) -> Result<Vec<PipelineResponse>> {
        let pipelines = apply_filters(self.project.pipelines()?, &self.filters);

        Ok(pipelines.into_iter().map(PipelineResponse::new).collect())
    }
}

/// Where a jobs request reads its jobs from.
pub(super) enum JobsScope {
    Tenant(Arc<dyn TenantApi>),
    Pipeline(Arc<dyn PipelineApi>),
}

/// High-level request for jobs, either all of a tenant's or just one
/// pipeline's.
pub(super) struct JobsRequest {
    scope: JobsScope,
    filters: Vec<Filter<Arc<dyn JobApi>>>,
}

impl JobsRequest {
    pub(super) fn for_tenant(tenant: Arc<dyn TenantApi>) -> Self {
        Self {
            scope: JobsScope::Tenant(tenant),
            filters: Vec::new(),
        }
    }

    pub(super) fn for_pipeline(pipeline: Arc<dyn PipelineApi>) -> Self {
        Self {
            scope: JobsScope::Pipeline(pipeline),
            filters: Vec::new(),
        }
    }

    /// Limit the request to jobs whose name follows one of the patterns.
    pub(super) fn with_name<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |job: &Arc<dyn JobApi>| {
            matcher.matches(job.name())
        }));

        Ok(self)
    }

    /// Limit the request to jobs whose URL follows one of the patterns.
    pub(super) fn with_url<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |job: &Arc<dyn JobApi>| {
            matcher.matches(&job.url())
        }));

        Ok(self)
    }

    /// Performs the request.
    pub(super) fn get(&self) -> Result<Vec<JobResponse>> {
        let jobs = match &self.scope {
            JobsScope::Tenant(tenant) => tenant.jobs()?,
            JobsScope::Pipeline(pipeline) => pipeline.jobs()?,
        };
        let jobs = apply_filters(jobs, &self.filters);

        Ok(jobs.into_iter().map(JobResponse::new).collect())
    }
}

/// High-level request for the variants of a job.
pub(super) struct VariantsRequest {
    job: Arc<dyn JobApi>,
}

impl VariantsRequest {
    pub(super) fn new(job: Arc<dyn JobApi>) -> Self {
        Self { job }
    }

    /// Performs the request.
    pub(super) fn get(&self) -> Result<Vec<VariantResponse>> {
        let variants = self.job.variants()?;

        Ok(variants.into_iter().map(VariantResponse::new).collect())
    }
}

/// High-level request for the builds of a job.
pub(super) struct BuildsRequest {
    job: Arc<dyn JobApi>,
    filters: Vec<Filter<BuildData>>,
    last_build_only: bool,
}

impl BuildsRequest {
    pub(super) fn new(job: Arc<dyn JobApi>) -> Self {
        Self {
            job,
            filters: Vec::new(),
            last_build_only: false,
        }
    }

    /// Limit the request to builds whose uuid follows one of the patterns.
    pub(super) fn with_uuid<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |build: &BuildData| {
            matcher.matches(&build.uuid)
        }));

        Ok(self)
    }

    /// Limit the request to builds whose result follows one of the
    /// patterns. Builds still running have no result and never match.
    pub(super) fn with_status<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |build: &BuildData| {
            build
                .result
                .as_deref()
                .is_some_and(|result| matcher.matches(result))
        }));

        Ok(self)
    }

    /// Limit the request to builds of projects following one of the
    /// patterns.
    pub(super) fn with_project<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |build: &BuildData| {
            build
                .project
                .as_deref()
                .is_some_and(|project| matcher.matches(project))
        }));

        Ok(self)
    }

    /// Limit the request to builds triggered by pipelines following one of
    /// the patterns.
    pub(super) fn with_pipeline<I, S>(mut self, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let matcher = Matcher::new(patterns)?;
        self.filters.push(Box::new(move |build: &BuildData| {
            build
                .pipeline
                .as_deref()
                .is_some_and(|pipeline| matcher.matches(pipeline))
        }));

        Ok(self)
    }

    /// Keep only the newest build that meets the filters, no matter where
    /// in the chain this call sits.
    pub(super) fn with_last_build_only(mut self) -> Self {
        self.last_build_only = true;
        self
    }

    /// Performs the request.
    pub(super) fn get(&self) -> Result<Vec<BuildResponse>> {
        let mut builds = apply_filters(self.job.builds()?, &self.filters);

        if self.last_build_only {
            // The host answers newest first.
            builds.truncate(1);
        }

        Ok(builds
            .into_iter()
            .map(|data| BuildResponse::new(Arc::clone(&self.job), data))
            .collect())
    }
}

/// Response for a [`TenantsRequest`].
pub(super) struct TenantResponse {
    tenant: Arc<dyn TenantApi>,
}

impl TenantResponse {
    pub(super) fn new(tenant: Arc<dyn TenantApi>) -> Self {
        Self { tenant }
    }

    pub(super) fn name(&self) -> &str {
        self.tenant.name()
    }

    /// A request for this tenant's projects.
    pub(super) fn projects(&self) -> ProjectsRequest {
        ProjectsRequest::new(Arc::clone(&self.tenant))
    }

    /// A request for this tenant's jobs.
    pub(super) fn jobs(&self) -> JobsRequest {
        JobsRequest::for_tenant(Arc::clone(&self.tenant))
    }
}

/// Response for a [`ProjectsRequest`]. Two projects are the same if they
/// carry the same name under the same tenant.
pub(super) struct ProjectResponse {
    project: Arc<dyn ProjectApi>,
}

impl ProjectResponse {
    pub(super) fn new(project: Arc<dyn ProjectApi>) -> Self {
        Self { project }
    }

    /// Response for this project's tenant.
    pub(super) fn tenant(&self) -> TenantResponse {
        TenantResponse::new(self.project.tenant())
    }

    pub(super) fn name(&self) -> &str {
        self.project.name()
    }

    pub(super) fn url(&self) -> String {
        self.project.url()
    }

    /// A request for this project's pipelines.
    pub(super) fn pipelines(&self) -> PipelinesRequest {
        PipelinesRequest::new(Arc::clone(&self.project))
    }
}

impl PartialEq for ProjectResponse {
    fn eq(&self, other: &Self) -> bool {
        if self.name() != other.name() {
            return false;
        }

        self.tenant().name() == other.tenant().name()
    }
}

impl std::fmt::Debug for ProjectResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectResponse")
            .field("tenant", &self.tenant().name())
            .field("name", &self.name())
            .finish()
    }
}

/// Response for a [`PipelinesRequest`]. Two pipelines are the same if they
/// carry the same name under the same project.
pub(super) struct PipelineResponse {
    pipeline: Arc<dyn PipelineApi>,
}

impl PipelineResponse {
    pub(super) fn new(pipeline: Arc<dyn PipelineApi>) -> Self {
        Self { pipeline }
    }

    /// Response for this pipeline's project.
    pub(super) fn project(&self) -> ProjectResponse {
        ProjectResponse::new(self.pipeline.project())
    }

    pub(super) fn name(&self) -> &str {
        self.pipeline.name()
    }

    /// A request for this pipeline's jobs.
    pub(super) fn jobs(&self) -> JobsRequest {
        JobsRequest::for_pipeline(Arc::clone(&self.pipeline))
    }
}

impl PartialEq for PipelineResponse {
    fn eq(&self, other: &Self) -> bool {
        if self.name() != other.name() {
            return false;
        }

        self.project().name() == other.project().name()
    }
}

impl std::fmt::Debug for PipelineResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineResponse")
            .field("project", &self.project().name())
            .field("name", &self.name())
            .finish()
    }
}

/// Response for a [`JobsRequest`]. Two jobs are the same if they carry the
/// same name under the same tenant.
pub(super) struct JobResponse {
    job: Arc<dyn JobApi>,
}

impl JobResponse {
    pub(super) fn new(job: Arc<dyn JobApi>) -> Self {
        Self { job }
    }

    /// Response for this job's tenant.
    pub(super) fn tenant(&self) -> TenantResponse {
        TenantResponse::new(self.job.tenant())
    }

    pub(super) fn name(&self) -> &str {
        self.job.name()
    }

    pub(super) fn url(&self) -> String {
        self.job.url()
    }

    /// A request for this job's variants.
    pub(super) fn variants(&self) -> VariantsRequest {
        VariantsRequest::new(Arc::clone(&self.job))
    }

    /// A request for this job's builds.
    pub(super) fn builds(&self) -> BuildsRequest {
        BuildsRequest::new(Arc::clone(&self.job))
    }
}

impl PartialEq for JobResponse {
    fn eq(&self, other: &Self) -> bool {
        if self.name() != other.name() {
            return false;
        }

        self.tenant().name() == other.tenant().name()
    }
}

impl std::fmt::Debug for JobResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobResponse")
            .field("tenant", &self.tenant().name())
            .field("name", &self.name())
            .finish()
    }
}

/// Response for a [`VariantsRequest`].
pub(super) struct VariantResponse {
    variant: Arc<dyn VariantApi>,
}

impl VariantResponse {
    pub(super) fn new(variant: Arc<dyn VariantApi>) -> Self {
        Self { variant }
    }

    /// Response for this variant's job.
    pub(super) fn job(&self) -> JobResponse {
        JobResponse::new(self.variant.job())
    }

    /// The variant's name. Most likely it matches its job's name.
    pub(super) fn name(&self) -> &str {
        self.variant.name()
    }

    /// Variables of this variant, with the parents folded in when asked
    /// for.
    pub(super) fn variables(&self, recursive: bool) -> Result<Map<String, Value>> {
        self.variant.variables(recursive)
    }
}

/// Response for a [`BuildsRequest`].
pub(super) struct BuildResponse {
    job: Arc<dyn JobApi>,
    data: BuildData,
}

impl BuildResponse {
    pub(super) fn new(job: Arc<dyn JobApi>, data: BuildData) -> Self {
        Self { job, data }
    }

    /// Response for this build's job.
    pub(super) fn job(&self) -> JobResponse {
        JobResponse::new(Arc::clone(&self.job))
    }

    /// Raw data of this build.
    pub(super) fn data(&self) -> &BuildData {
        &self.data
    }
}
