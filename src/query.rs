use chrono::Utc;
use indexmap::IndexMap;
use log::{debug, warn};

use crate::error::{CiQueryError, Result};
use crate::filtering::Matcher;
use crate::models::{Attribute, Environment, Job, QueryReport, Source, System, SystemType};
use crate::providers::{JenkinsProvider, ZuulProvider};

/// Everything the user asked for on the command line, in slot form.
///
/// Each filter is an [`Attribute`] so the rest of the program can reason
/// about arguments uniformly: the validator inspects the configuration
/// slots, the providers inspect the data slots and fetch only what was
/// requested.
#[derive(Debug, Clone)]
pub struct QueryArgs {
    /// Environments to query, by exact name
    pub env_name: Attribute<Vec<String>>,
    /// Systems to query, by exact name
    pub systems: Attribute<Vec<String>>,
    /// System kinds to query
    pub system_type: Attribute<Vec<SystemType>>,
    /// Sources to query through, by exact name
    pub sources: Attribute<Vec<String>>,
    /// Zuul tenants to look at, as search patterns
    pub tenants: Attribute<Vec<String>>,
    /// Zuul projects to look at, as search patterns
    pub projects: Attribute<Vec<String>>,
    /// Zuul pipelines to look at, as search patterns
    pub pipelines: Attribute<Vec<String>>,
    /// Job name patterns
    pub jobs: Attribute<Vec<String>>,
    /// Job URL patterns
    pub job_url: Attribute<Vec<String>>,
    /// Build id patterns; an empty list fetches all builds
    pub builds: Attribute<Vec<String>>,
    /// Build status patterns (e.g., "SUCCESS")
    pub build_status: Attribute<Vec<String>>,
    /// Keep only the newest build of each job
    pub last_build: bool,
    /// Deployment release patterns
    pub release: Attribute<Vec<String>>,
    /// Deployment infrastructure type patterns
    pub infra_type: Attribute<Vec<String>>,
    /// Deployment topology patterns
    pub topology: Attribute<Vec<String>>,
    /// Deployment IP version patterns
    pub ip_version: Attribute<Vec<String>>,
    /// Deployment cinder backend patterns
    pub cinder_backend: Attribute<Vec<String>>,
}

impl QueryArgs {
    pub fn new() -> Self {
        Self {
            env_name: Attribute::new("env_name").with_arguments(["--env-name"]),
            systems: Attribute::new("systems").with_arguments(["--systems"]),
            system_type: Attribute::new("system_type").with_arguments(["--system-type"]),
            sources: Attribute::new("sources").with_arguments(["--sources"]),
            tenants: Attribute::new("tenants").with_arguments(["--tenants"]),
            projects: Attribute::new("projects")
                .with_arguments(["--projects"])
                .populated_by_source(),
            pipelines: Attribute::new("pipelines")
                .with_arguments(["--pipelines"])
                .populated_by_source(),
            jobs: Attribute::new("jobs")
                .with_arguments(["--jobs"])
                .populated_by_source(),
            job_url: Attribute::new("job_url").with_arguments(["--job-url"]),
            builds: Attribute::new("builds")
                .with_arguments(["--builds"])
                .populated_by_source(),
            build_status: Attribute::new("build_status").with_arguments(["--build-status"]),
            last_build: false,
            release: Attribute::new("release")
                .with_arguments(["--release"])
                .populated_by_source(),
            infra_type: Attribute::new("infra_type")
                .with_arguments(["--infra-type"])
                .populated_by_source(),
            topology: Attribute::new("topology")
                .with_arguments(["--topology"])
                .populated_by_source(),
            ip_version: Attribute::new("ip_version")
                .with_arguments(["--ip-version"])
                .populated_by_source(),
            cinder_backend: Attribute::new("cinder_backend")
                .with_arguments(["--cinder-backend"])
                .populated_by_source(),
        }
    }

    /// Whether any build data has to be fetched at all.
    pub fn wants_builds(&self) -> bool {
        self.builds.is_set() || self.build_status.is_set() || self.last_build
    }

    /// Names of the slots a data source is expected to populate, among the
    /// ones the user actually asked for.
    pub fn requested_data(&self) -> Vec<&str> {
        let slots = [
            &self.projects,
            &self.pipelines,
            &self.jobs,
            &self.builds,
            &self.release,
            &self.infra_type,
            &self.topology,
            &self.ip_version,
            &self.cinder_backend,
        ];

        slots
            .into_iter()
            .filter(|slot| slot.populate && slot.is_set())
            .map(|slot| slot.name.as_str())
            .collect()
    }

    /// Whether any deployment detail has to be derived from job variables.
    pub fn wants_deployment(&self) -> bool {
        self.release.is_set()
            || self.infra_type.is_set()
            || self.topology.is_set()
            || self.ip_version.is_set()
            || self.cinder_backend.is_set()
    }
}

impl Default for QueryArgs {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs the query across every enabled system of the given environments.
///
/// Sources of a system are tried in configuration order; the first one that
/// answers wins and its jobs become the system's result. A failing source
/// is logged and the next one is tried, so one broken backend does not sink
/// the whole run.
///
/// # Errors
///
/// Returns an error if any of the supplied filter patterns is not a valid
/// regex. Source failures are not errors at this level.
pub fn run_query(mut environments: Vec<Environment>, args: &QueryArgs) -> Result<QueryReport> {
    verify_patterns(args)?;

    debug!(
        "Data the sources are asked to populate: {:?}",
        args.requested_data()
    );

    for environment in &mut environments {
        for system in &mut environment.systems {
            if !system.is_enabled() {
                continue;
            }

            query_system(system, args);
        }
    }

    Ok(QueryReport {
        collected_at: Utc::now(),
        environments,
    })
}

/// Compiles every pattern argument once, so a bad regex fails the run
/// up front instead of surfacing as a per-source warning.
fn verify_patterns(args: &QueryArgs) -> Result<()> {
    let pattern_slots = [
        &args.tenants,
        &args.projects,
        &args.pipelines,
        &args.jobs,
        &args.job_url,
        &args.builds,
        &args.build_status,
        &args.release,
        &args.infra_type,
        &args.topology,
        &args.ip_version,
        &args.cinder_backend,
    ];

    for slot in pattern_slots {
        if let Some(patterns) = &slot.value {
            Matcher::new(patterns).map_err(|e| {
                CiQueryError::Config(format!(
                    "Invalid pattern for {}: {e}",
                    slot.arguments.join(", ")
                ))
            })?;
        }
    }

    Ok(())
}

fn query_system(system: &mut System, args: &QueryArgs) {
    let mut result = None;

    for source in &system.sources {
        if !source.is_enabled() {
            continue;
        }

        debug!(
            "Querying system '{}' through source '{}' ({})",
            system.name, source.name, source.url
        );

        match query_source(source, args) {
            Ok(jobs) => {
                result = Some(jobs);
                break;
            }
            Err(e) => {
                warn!("Source '{}' failed, trying the next one: {e}", source.name);
            }
        }
    }

    match result {
        Some(jobs) => system.jobs = jobs,
        None => warn!("No source could answer for system '{}'", system.name),
    }
}

fn query_source(source: &Source, args: &QueryArgs) -> Result<IndexMap<String, Job>> {
    match source.driver {
        SystemType::Jenkins => JenkinsProvider::new(source)?.query(args),
        SystemType::Zuul => ZuulProvider::new(source)?.query(args),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_source(name: &str, url: &str) -> Source {
        Source {
            name: name.to_string(),
            driver: SystemType::Jenkins,
            url: url.to_string(),
            username: None,
            token: None,
            cert: None,
            tenants: Vec::new(),
            enabled: true,
        }
    }

    fn create_environment(sources: Vec<Source>) -> Environment {
        Environment {
            name: "production".to_string(),
            systems: vec![System {
                name: "jenkins-master".to_string(),
                system_type: SystemType::Jenkins,
                enabled: true,
                sources,
                jobs: IndexMap::new(),
            }],
        }
    }

    mod query_args_tests {
        use super::*;

        #[test]
        fn test_defaults_are_unset() {
            let args = QueryArgs::new();

            assert!(!args.jobs.is_set());
            assert!(!args.wants_builds());
            assert!(!args.wants_deployment());
            assert_eq!(args.jobs.arguments, vec!["--jobs".to_string()]);
            assert!(args.jobs.populate);
            assert!(!args.systems.populate);
        }

        #[test]
        fn test_build_arguments_imply_builds() {
            let mut args = QueryArgs::new();
            args.build_status.set(vec!["FAILURE".to_string()]);

            assert!(args.wants_builds());
        }

        #[test]
        fn test_deployment_arguments_imply_deployment() {
            let mut args = QueryArgs::new();
            args.release.set(vec!["17".to_string()]);

            assert!(args.wants_deployment());
        }

        #[test]
        fn test_requested_data_lists_populated_slots() {
            let mut args = QueryArgs::new();
            args.tenants.set(vec!["openstack".to_string()]);
            args.jobs.set(Vec::new());
            args.release.set(Vec::new());

            // Tenants are a filter, not data a source fills in.
            assert_eq!(args.requested_data(), vec!["jobs", "release"]);
        }
    }

    mod run_query_tests {
        use super::*;

        #[test]
        fn test_invalid_pattern_fails_the_run() {
            let mut args = QueryArgs::new();
            args.jobs.set(vec!["[".to_string()]);

            match run_query(Vec::new(), &args) {
                Err(CiQueryError::Config(message)) => assert!(message.contains("--jobs")),
                other => panic!("unexpected result: {other:?}"),
            }
        }

        #[test]
        fn test_jobs_are_collected_from_the_source() {
            let mut server = mockito::Server::new();
            let mock = server
                .mock("GET", "/api/json")
                .match_query(mockito::Matcher::Any)
                .with_body(
                    r#"{"jobs": [
                        {"_class": "hudson.model.FreeStyleProject",
                         "name": "deploy", "url": "https://ci.example.org/job/deploy/"},
                        {"_class": "hudson.model.FreeStyleProject",
                         "name": "lint", "url": "https://ci.example.org/job/lint/"}
                    ]}"#,
                )
                .create();

            let environments =
                vec![create_environment(vec![create_source("main", &server.url())])];

            let report = run_query(environments, &QueryArgs::new()).unwrap();

            mock.assert();
            let system = &report.environments[0].systems[0];
            assert_eq!(system.jobs.len(), 2);
            assert!(system.jobs.contains_key("deploy"));
        }

        #[test]
        fn test_failing_source_falls_back_to_the_next_one() {
            let mut broken = mockito::Server::new();
            broken
                .mock("GET", "/api/json")
                .match_query(mockito::Matcher::Any)
                .with_status(500)
                .create();

            let mut healthy = mockito::Server::new();
            healthy
                .mock("GET", "/api/json")
                .match_query(mockito::Matcher::Any)
                .with_body(
                    r#"{"jobs": [
                        {"_class": "hudson.model.FreeStyleProject",
                         "name": "deploy", "url": "https://ci.example.org/job/deploy/"}
                    ]}"#,
                )
                .create();

            let environments = vec![create_environment(vec![
                create_source("primary", &broken.url()),
                create_source("fallback", &healthy.url()),
            ])];

            let report = run_query(environments, &QueryArgs::new()).unwrap();

            let system = &report.environments[0].systems[0];
            assert_eq!(system.jobs.len(), 1);
            assert!(system.jobs.contains_key("deploy"));
        }

        #[test]
        fn test_disabled_system_is_left_alone() {
            let mut environment = create_environment(vec![create_source(
                "main",
                "http://127.0.0.1:1", // nothing listens here
            )]);
            environment.systems[0].disable();

            let report = run_query(vec![environment], &QueryArgs::new()).unwrap();

            assert!(report.environments[0].systems[0].jobs.is_empty());
        }
    }
}
