use std::sync::Arc;

use chrono::NaiveDateTime;
use indexmap::IndexMap;
use log::debug;
use serde_json::{Map, Value};

use crate::error::Result;
use crate::filtering::Matcher;
use crate::models::{Build, Deployment, Job, Source};
use crate::query::QueryArgs;

use super::api::{BuildData, ZuulApi};
use super::requests::{JobResponse, JobsRequest, TenantResponse, TenantsRequest, VariantResponse};
use super::rest::ZuulClient;
use super::vars::{
    as_plain_string, FeatureSetOverridesSearch, FeatureSetSearch, ReleaseSearch, VariableSearch,
};

/// Variable names that carry the topology of a deployment.
const TOPOLOGY_TERMS: &[&str] = &["topology"];

/// Variable names that carry the infrastructure type, most specific first.
const INFRA_TYPE_TERMS: &[&str] = &["environment_type", "infra_type"];

/// Variable names that carry the IP version, most specific first.
const IP_VERSION_TERMS: &[&str] = &["network_protocol", "ip_version"];

/// Variable names that carry the cinder backend, most specific first.
const CINDER_BACKEND_TERMS: &[&str] = &["storage_backend", "cinder_backend"];

/// Queries a Zuul host for jobs, builds and deployment summaries.
pub struct ZuulProvider {
    api: Arc<dyn ZuulApi>,
    /// Tenants the source is restricted to; empty means all of them
    tenants: Vec<String>,
    summarizer: DeploymentSummarizer,
}

impl ZuulProvider {
    pub fn new(source: &Source) -> Result<Self> {
        Ok(Self::with_api(
            Arc::new(ZuulClient::new(source)?),
            source.tenants.clone(),
        ))
    }

    fn with_api(api: Arc<dyn ZuulApi>, tenants: Vec<String>) -> Self {
        Self {
            api,
            tenants,
            summarizer: DeploymentSummarizer::new(),
        }
    }

    /// Collects the jobs the arguments ask for, tenant by tenant.
    ///
    /// Jobs are normally read straight off each tenant. As soon as the
    /// arguments mention projects or pipelines, the walk goes through them
    /// instead, so only jobs actually wired into a matching pipeline come
    /// back.
    ///
    /// # Errors
    ///
    /// Returns an error if the host cannot be reached or answers with
    /// something unexpected.
    pub fn query(&self, args: &QueryArgs) -> Result<IndexMap<String, Job>> {
        let mut jobs = IndexMap::new();

        for tenant in self.tenants_for(args)? {
            debug!("Looking at tenant '{}'", tenant.name());

            if args.projects.is_set() || args.pipelines.is_set() {
                self.collect_project_jobs(&tenant, args, &mut jobs)?;
            } else {
                self.collect_tenant_jobs(&tenant, args, &mut jobs)?;
            }
        }

        Ok(jobs)
    }

    /// Tenants to query: the ones configured for the source, narrowed down
    /// by the patterns on the command line.
    fn tenants_for(&self, args: &QueryArgs) -> Result<Vec<TenantResponse>> {
        let mut request = TenantsRequest::new(Arc::clone(&self.api));

        if !self.tenants.is_empty() {
            // The configuration names tenants literally, not by pattern.
            let patterns: Vec<String> = self
                .tenants
                .iter()
                .map(|name| format!("^{}$", regex::escape(name)))
                .collect();

            request = request.with_name(patterns)?;
        }

        if let Some(patterns) = &args.tenants.value {
            request = request.with_name(patterns)?;
        }

        request.get()
    }

    fn collect_tenant_jobs(
        &self,
        tenant: &TenantResponse,
        args: &QueryArgs,
        jobs: &mut IndexMap<String, Job>,
    ) -> Result<()> {
        for response in self.jobs_request(tenant.jobs(), args)?.get()? {
            self.collect_job(&response, args, jobs)?;
        }

        Ok(())
    }

    fn collect_project_jobs(
        &self,
        tenant: &TenantResponse,
        args: &QueryArgs,
        jobs: &mut IndexMap<String, Job>,
    ) -> Result<()> {
        let mut projects = tenant.projects();

        if let Some(patterns) = &args.projects.value {
            if !patterns.is_empty() {
                projects = projects.with_name(patterns)?;
            }
        }

        for project in projects.get()? {
            debug!(
                "Looking at project '{}' of tenant '{}' ({})",
                project.name(),
                project.tenant().name(),
                project.url()
            );

            let mut pipelines = project.pipelines();

            if let Some(patterns) = &args.pipelines.value {
                if !patterns.is_empty() {
                    pipelines = pipelines.with_name(patterns)?;
                }
            }

            for pipeline in pipelines.get()? {
                debug!(
                    "Looking at pipeline '{}' of project '{}'",
                    pipeline.name(),
                    pipeline.project().name()
                );

                for response in self.jobs_request(pipeline.jobs(), args)?.get()? {
                    self.collect_job(&response, args, jobs)?;
                }
            }
        }

        Ok(())
    }

    /// Applies the job filters of the arguments to the request.
    fn jobs_request(&self, mut request: JobsRequest, args: &QueryArgs) -> Result<JobsRequest> {
        if let Some(patterns) = &args.jobs.value {
            // A bare --jobs asks for all of them.
            if !patterns.is_empty() {
                request = request.with_name(patterns)?;
            }
        }

        if let Some(patterns) = &args.job_url.value {
            request = request.with_url(patterns)?;
        }

        Ok(request)
    }

    fn collect_job(
        &self,
        response: &JobResponse,
        args: &QueryArgs,
        jobs: &mut IndexMap<String, Job>,
    ) -> Result<()> {
        if jobs.contains_key(response.name()) {
            // Already collected through another pipeline.
            return Ok(());
        }

        debug!(
            "Collecting job '{}' of tenant '{}'",
            response.name(),
            response.tenant().name()
        );

        let mut job = Job::new(response.name(), Some(response.url()));

        if args.wants_deployment() {
            let deployment = self.summarizer.summarize(response)?;

            if !deployment_matches(&deployment, args)? {
                debug!("Dropping job '{}': deployment does not match", job.name);
                return Ok(());
            }

            job.deployment = Some(deployment);
        }

        if args.wants_builds() {
            self.collect_builds(response, args, &mut job)?;
        }

        jobs.insert(job.name.clone(), job);

        Ok(())
    }

    fn collect_builds(
        &self,
        response: &JobResponse,
        args: &QueryArgs,
        job: &mut Job,
    ) -> Result<()> {
        let mut request = response.builds();

        if let Some(patterns) = &args.builds.value {
            // A bare --builds asks for all of them.
            if !patterns.is_empty() {
                request = request.with_uuid(patterns)?;
            }
        }

        if let Some(patterns) = &args.build_status.value {
            request = request.with_status(patterns)?;
        }

        if let Some(patterns) = &args.projects.value {
            if !patterns.is_empty() {
                request = request.with_project(patterns)?;
            }
        }

        if let Some(patterns) = &args.pipelines.value {
            if !patterns.is_empty() {
                request = request.with_pipeline(patterns)?;
            }
        }

        if args.last_build {
            request = request.with_last_build_only();
        }

        for build in request.get()? {
            debug!(
                "Collected build '{}' of job '{}'",
                build.data().uuid,
                build.job().name()
            );

            job.add_build(to_build(build.data()));
        }

        Ok(())
    }
}

/// Derives the deployment summary of a job from its variant variables.
struct DeploymentSummarizer {
    release: ReleaseSearch,
    featureset: FeatureSetSearch,
    overrides: FeatureSetOverridesSearch,
    infra_type: VariableSearch,
    topology: VariableSearch,
    ip_version: VariableSearch,
    cinder_backend: VariableSearch,
}

impl DeploymentSummarizer {
    fn new() -> Self {
        Self {
            release: ReleaseSearch::new(),
            featureset: FeatureSetSearch::new(),
            overrides: FeatureSetOverridesSearch::new(),
            infra_type: VariableSearch::new(INFRA_TYPE_TERMS),
            topology: VariableSearch::new(TOPOLOGY_TERMS),
            ip_version: VariableSearch::new(IP_VERSION_TERMS),
            cinder_backend: VariableSearch::new(CINDER_BACKEND_TERMS),
        }
    }

    /// Reads the deployment out of the job's first variant. A job without
    /// variants gets an empty summary.
    fn summarize(&self, job: &JobResponse) -> Result<Deployment> {
        let variants = job.variants().get()?;

        let Some(variant) = variants.first() else {
            debug!(
                "Job '{}' has no variants to read a deployment from",
                job.name()
            );
            return Ok(Deployment::default());
        };

        debug!(
            "Reading the deployment of job '{}' from variant '{}'",
            variant.job().name(),
            variant.name()
        );

        // Featureset overrides outrank what the variables themselves say.
        let overrides = self.overrides.search(variant)?.unwrap_or_default();

        Ok(Deployment {
            release: self.release.search(variant)?,
            featureset: self.featureset.search(variant)?,
            infra_type: self.value_of(&self.infra_type, &overrides, variant)?,
            topology: self.value_of(&self.topology, &overrides, variant)?,
            ip_version: self.value_of(&self.ip_version, &overrides, variant)?,
            cinder_backend: self.value_of(&self.cinder_backend, &overrides, variant)?,
        })
    }

    /// Value of one deployment field, with the overrides consulted first.
    fn value_of(
        &self,
        search: &VariableSearch,
        overrides: &Map<String, Value>,
        variant: &VariantResponse,
    ) -> Result<Option<String>> {
        if let Some(value) = search.find_in(overrides) {
            return Ok(Some(as_plain_string(&value)));
        }

        Ok(search.search(variant)?.map(|value| as_plain_string(&value)))
    }
}

/// Whether a deployment survives the deployment filters of the arguments.
///
/// A filter with patterns wants its field to match one of them, and a field
/// the job does not define fails it. A bare argument only asks for the
/// field to be shown and drops nothing.
fn deployment_matches(deployment: &Deployment, args: &QueryArgs) -> Result<bool> {
    let checks = [
        (&args.release, &deployment.release),
        (&args.infra_type, &deployment.infra_type),
        (&args.topology, &deployment.topology),
        (&args.ip_version, &deployment.ip_version),
        (&args.cinder_backend, &deployment.cinder_backend),
    ];

    for (slot, value) in checks {
        let Some(patterns) = &slot.value else {
            continue;
        };

        if patterns.is_empty() {
            continue;
        }

        let matcher = Matcher::new(patterns)?;

        match value {
            Some(value) if matcher.matches(value) => {}
            _ => return Ok(false),
        }
    }

    Ok(true)
}

/// Translates a raw Zuul build into the model. Durations come in as
/// seconds and leave in milliseconds.
fn to_build(data: &BuildData) -> Build {
    Build {
        build_id: data.uuid.clone(),
        status: data.result.clone(),
        duration: data.duration.map(|seconds| (seconds * 1000.0) as u64),
        timestamp: data.start_time.as_deref().and_then(|text| {
            NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
                .ok()
                .map(|naive| naive.and_utc())
        }),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::providers::zuul::api::JobApi;
    use crate::providers::zuul::testing::{
        FakeJob, FakePipeline, FakeProject, FakeTenant, FakeVariant, FakeZuul,
    };

    fn create_provider(zuul: FakeZuul, tenants: Vec<String>) -> ZuulProvider {
        ZuulProvider::with_api(Arc::new(zuul), tenants)
    }

    fn create_job(name: &str) -> Arc<dyn JobApi> {
        create_job_for_tenant("openstack", name)
    }

    fn create_job_for_tenant(tenant: &str, name: &str) -> Arc<dyn JobApi> {
        Arc::new(FakeJob {
            tenant: tenant.to_string(),
            name: name.to_string(),
            ..FakeJob::default()
        })
    }

    fn create_build(uuid: &str, result: &str) -> BuildData {
        BuildData {
            uuid: uuid.to_string(),
            result: Some(result.to_string()),
            project: Some("neutron".to_string()),
            pipeline: Some("gate".to_string()),
            duration: Some(754.0),
            start_time: Some("2023-05-17T14:30:00".to_string()),
        }
    }

    fn single_tenant_with_jobs(jobs: Vec<Arc<dyn JobApi>>) -> FakeZuul {
        FakeZuul {
            tenants: vec![Arc::new(FakeTenant {
                name: "openstack".to_string(),
                jobs,
                ..FakeTenant::default()
            })],
        }
    }

    mod tenant_tests {
        use super::*;

        #[test]
        fn test_configured_tenants_are_taken_literally() {
            let zuul = FakeZuul {
                tenants: vec![
                    Arc::new(FakeTenant {
                        name: "tripleo".to_string(),
                        jobs: vec![create_job_for_tenant("tripleo", "tempest")],
                        ..FakeTenant::default()
                    }),
                    Arc::new(FakeTenant {
                        name: "tripleo-extra".to_string(),
                        jobs: vec![create_job_for_tenant("tripleo-extra", "linters")],
                        ..FakeTenant::default()
                    }),
                ],
            };
            let provider = create_provider(zuul, vec!["tripleo".to_string()]);

            let jobs = provider.query(&QueryArgs::new()).unwrap();

            // "tripleo" must not reach into "tripleo-extra".
            assert_eq!(jobs.len(), 1);
            assert!(jobs.contains_key("tempest"));
        }

        #[test]
        fn test_tenant_patterns_narrow_the_configured_set() {
            let zuul = FakeZuul {
                tenants: vec![
                    Arc::new(FakeTenant {
                        name: "tripleo".to_string(),
                        jobs: vec![create_job_for_tenant("tripleo", "tempest")],
                        ..FakeTenant::default()
                    }),
                    Arc::new(FakeTenant {
                        name: "ansible".to_string(),
                        jobs: vec![create_job_for_tenant("ansible", "molecule")],
                        ..FakeTenant::default()
                    }),
                ],
            };
            let provider = create_provider(
                zuul,
                vec!["tripleo".to_string(), "ansible".to_string()],
            );

            let mut args = QueryArgs::new();
            args.tenants.set(vec!["^ansible$".to_string()]);

            let jobs = provider.query(&args).unwrap();

            assert_eq!(jobs.len(), 1);
            assert!(jobs.contains_key("molecule"));
        }
    }

    mod job_tests {
        use super::*;

        #[test]
        fn test_job_patterns() {
            let zuul = single_tenant_with_jobs(vec![
                create_job("tempest-full"),
                create_job("linters"),
            ]);
            let provider = create_provider(zuul, Vec::new());

            let mut args = QueryArgs::new();
            args.jobs.set(vec!["tempest".to_string()]);

            let jobs = provider.query(&args).unwrap();

            assert_eq!(jobs.len(), 1);
            assert!(jobs.contains_key("tempest-full"));
        }

        #[test]
        fn test_jobs_met_through_two_pipelines_are_collected_once() {
            let zuul = FakeZuul {
                tenants: vec![Arc::new(FakeTenant {
                    name: "openstack".to_string(),
                    projects: vec![Arc::new(FakeProject {
                        tenant: "openstack".to_string(),
                        name: "neutron".to_string(),
                        pipelines: vec![
                            Arc::new(FakePipeline {
                                tenant: "openstack".to_string(),
                                project: "neutron".to_string(),
                                name: "check".to_string(),
                                jobs: vec![create_job("tempest")],
                            }),
                            Arc::new(FakePipeline {
                                tenant: "openstack".to_string(),
                                project: "neutron".to_string(),
                                name: "gate".to_string(),
                                jobs: vec![create_job("tempest")],
                            }),
                        ],
                    })],
                    ..FakeTenant::default()
                })],
            };
            let provider = create_provider(zuul, Vec::new());

            let mut args = QueryArgs::new();
            args.pipelines.set(Vec::new());

            let jobs = provider.query(&args).unwrap();

            assert_eq!(jobs.len(), 1);
            assert!(jobs.contains_key("tempest"));
        }

        #[test]
        fn test_pipeline_patterns_pick_the_pipeline() {
            let zuul = FakeZuul {
                tenants: vec![Arc::new(FakeTenant {
                    name: "openstack".to_string(),
                    projects: vec![Arc::new(FakeProject {
                        tenant: "openstack".to_string(),
                        name: "neutron".to_string(),
                        pipelines: vec![
                            Arc::new(FakePipeline {
                                tenant: "openstack".to_string(),
                                project: "neutron".to_string(),
                                name: "check".to_string(),
                                jobs: vec![create_job("linters")],
                            }),
                            Arc::new(FakePipeline {
                                tenant: "openstack".to_string(),
                                project: "neutron".to_string(),
                                name: "gate".to_string(),
                                jobs: vec![create_job("tempest")],
                            }),
                        ],
                    })],
                    ..FakeTenant::default()
                })],
            };
            let provider = create_provider(zuul, Vec::new());

            let mut args = QueryArgs::new();
            args.pipelines.set(vec!["^gate$".to_string()]);

            let jobs = provider.query(&args).unwrap();

            assert_eq!(jobs.len(), 1);
            assert!(jobs.contains_key("tempest"));
        }
    }

    mod build_tests {
        use super::*;

        #[test]
        fn test_build_filters_and_last_build() {
            let job = Arc::new(FakeJob {
                tenant: "openstack".to_string(),
                name: "tempest".to_string(),
                builds: vec![
                    create_build("b3", "FAILURE"),
                    create_build("b2", "SUCCESS"),
                    create_build("b1", "SUCCESS"),
                ],
                ..FakeJob::default()
            });
            let provider = create_provider(single_tenant_with_jobs(vec![job]), Vec::new());

            let mut args = QueryArgs::new();
            args.build_status.set(vec!["SUCCESS".to_string()]);
            args.last_build = true;

            let jobs = provider.query(&args).unwrap();
            let job = &jobs["tempest"];

            assert_eq!(job.builds.len(), 1);

            let build = &job.builds["b2"];
            assert_eq!(build.status.as_deref(), Some("SUCCESS"));
            assert_eq!(build.duration, Some(754_000));
            assert!(build.timestamp.is_some());
        }

        #[test]
        fn test_bare_builds_argument_fetches_all_of_them() {
            let job = Arc::new(FakeJob {
                tenant: "openstack".to_string(),
                name: "tempest".to_string(),
                builds: vec![create_build("b2", "SUCCESS"), create_build("b1", "FAILURE")],
                ..FakeJob::default()
            });
            let provider = create_provider(single_tenant_with_jobs(vec![job]), Vec::new());

            let mut args = QueryArgs::new();
            args.builds.set(Vec::new());

            let jobs = provider.query(&args).unwrap();

            assert_eq!(jobs["tempest"].builds.len(), 2);
        }
    }

    mod deployment_tests {
        use super::*;

        fn job_with_release(name: &str, release: &str) -> Arc<dyn JobApi> {
            Arc::new(FakeJob {
                tenant: "openstack".to_string(),
                name: name.to_string(),
                variants: vec![Arc::new(FakeVariant::with_variables(
                    name,
                    json!({ "release": release }),
                ))],
                ..FakeJob::default()
            })
        }

        #[test]
        fn test_deployment_filters_drop_jobs() {
            let zuul = single_tenant_with_jobs(vec![
                job_with_release("periodic-17", "17.1"),
                job_with_release("periodic-wallaby", "wallaby"),
                create_job("no-deployment-at-all"),
            ]);
            let provider = create_provider(zuul, Vec::new());

            let mut args = QueryArgs::new();
            args.release.set(vec!["17".to_string()]);

            let jobs = provider.query(&args).unwrap();

            assert_eq!(jobs.len(), 1);

            let deployment = jobs["periodic-17"].deployment.as_ref().unwrap();
            assert_eq!(deployment.release.as_deref(), Some("17.1"));
        }

        #[test]
        fn test_bare_deployment_argument_only_shows_the_field() {
            let zuul = single_tenant_with_jobs(vec![
                job_with_release("periodic-17", "17.1"),
                job_with_release("periodic-wallaby", "wallaby"),
            ]);
            let provider = create_provider(zuul, Vec::new());

            let mut args = QueryArgs::new();
            args.release.set(Vec::new());

            let jobs = provider.query(&args).unwrap();

            assert_eq!(jobs.len(), 2);

            let deployment = jobs["periodic-wallaby"].deployment.as_ref().unwrap();
            assert_eq!(deployment.release.as_deref(), Some("wallaby"));
        }
    }

    mod summarizer_tests {
        use super::*;

        fn summarize(variables: serde_json::Value) -> Deployment {
            let job = Arc::new(FakeJob {
                tenant: "openstack".to_string(),
                name: "tempest".to_string(),
                variants: vec![Arc::new(FakeVariant::with_variables("tempest", variables))],
                ..FakeJob::default()
            });

            DeploymentSummarizer::new()
                .summarize(&JobResponse::new(job))
                .unwrap()
        }

        #[test]
        fn test_overrides_outrank_variant_variables() {
            let deployment = summarize(json!({
                "featureset_override": { "storage_backend": "ceph" },
                "storage_backend": "lvm",
                "topology": "3ctrl_2comp",
            }));

            assert_eq!(deployment.cinder_backend.as_deref(), Some("ceph"));
            assert_eq!(deployment.topology.as_deref(), Some("3ctrl_2comp"));
        }

        #[test]
        fn test_specific_terms_are_understood() {
            let deployment = summarize(json!({
                "environment_type": "ovb",
                "network_protocol": "ipv6",
                "featureset": "052",
            }));

            assert_eq!(deployment.infra_type.as_deref(), Some("ovb"));
            assert_eq!(deployment.ip_version.as_deref(), Some("ipv6"));
            assert_eq!(deployment.featureset.as_deref(), Some("052"));
        }

        #[test]
        fn test_job_without_variants_gets_an_empty_summary() {
            let deployment = DeploymentSummarizer::new()
                .summarize(&JobResponse::new(create_job("bare")))
                .unwrap();

            assert!(deployment.release.is_none());
            assert!(deployment.topology.is_none());
        }
    }

    mod deployment_matches_tests {
        use super::*;

        #[test]
        fn test_bare_argument_drops_nothing() {
            let mut args = QueryArgs::new();
            args.topology.set(Vec::new());

            assert!(deployment_matches(&Deployment::default(), &args).unwrap());
        }

        #[test]
        fn test_pattern_against_a_missing_value_fails() {
            let mut args = QueryArgs::new();
            args.topology.set(vec!["3ctrl".to_string()]);

            assert!(!deployment_matches(&Deployment::default(), &args).unwrap());
        }

        #[test]
        fn test_pattern_against_a_matching_value_holds() {
            let mut args = QueryArgs::new();
            args.topology.set(vec!["3ctrl".to_string()]);

            let deployment = Deployment {
                topology: Some("3ctrl_2comp".to_string()),
                ..Deployment::default()
            };

            assert!(deployment_matches(&deployment, &args).unwrap());
        }
    }
}
