use chrono::{TimeZone, Utc};
use indexmap::IndexMap;
use log::{debug, warn};

use crate::error::Result;
use crate::filtering::{apply_filters, Filter, Matcher};
use crate::models::{Build, Job, Source};
use crate::query::QueryArgs;

use super::client::{JenkinsBuildData, JenkinsClient, JenkinsJobData};

/// Answers queries through a Jenkins instance.
pub struct JenkinsProvider {
    client: JenkinsClient,
}

impl JenkinsProvider {
    pub fn new(source: &Source) -> Result<Self> {
        Ok(Self {
            client: JenkinsClient::new(source)?,
        })
    }

    /// Collects the jobs the query asks for, together with their builds
    /// when any build argument was given.
    ///
    /// # Errors
    ///
    /// Fails on the first request the instance does not answer; the caller
    /// decides whether another source gets a try.
    pub fn query(&self, args: &QueryArgs) -> Result<IndexMap<String, Job>> {
        if args.wants_deployment() {
            warn!("Deployment filters are not supported by jenkins sources, ignoring them");
        }

        if args.projects.is_set() || args.pipelines.is_set() {
            warn!("Project and pipeline filters are not supported by jenkins sources, ignoring them");
        }

        if args.last_build {
            return self.query_with_last_build(args);
        }

        let jobs = filter_jobs(self.client.get_jobs()?, args)?;

        let mut result = IndexMap::new();
        for data in jobs {
            let Some(name) = data.name else {
                debug!("Skipping job with no name");
                continue;
            };

            let mut job = Job::new(&name, data.url);

            if args.wants_builds() {
                let builds = filter_builds(self.client.get_builds(&name)?, args)?;
                for build in builds {
                    job.add_build(to_build(build));
                }
            }

            result.insert(name, job);
        }

        Ok(result)
    }

    /// The newest build of every job comes back in a single jobs request,
    /// so asking per job would only slow things down. Build filters do not
    /// apply here: there is exactly one build to show, or none.
    fn query_with_last_build(&self, args: &QueryArgs) -> Result<IndexMap<String, Job>> {
        let jobs = filter_jobs(self.client.get_jobs_with_last_build()?, args)?;

        let mut result = IndexMap::new();
        for data in jobs {
            let Some(name) = data.name else {
                debug!("Skipping job with no name");
                continue;
            };

            let mut job = Job::new(&name, data.url);
            if let Some(build) = data.last_build {
                job.add_build(to_build(build));
            }

            result.insert(name, job);
        }

        Ok(result)
    }
}

fn filter_jobs(jobs: Vec<JenkinsJobData>, args: &QueryArgs) -> Result<Vec<JenkinsJobData>> {
    let mut filters: Vec<Filter<JenkinsJobData>> = Vec::new();

    if let Some(patterns) = &args.jobs.value {
        if !patterns.is_empty() {
            let matcher = Matcher::new(patterns)?;
            filters.push(Box::new(move |job: &JenkinsJobData| {
                job.name.as_deref().is_some_and(|name| matcher.matches(name))
            }));
        }
    }

    if let Some(patterns) = &args.job_url.value {
        let matcher = Matcher::new(patterns)?;
        filters.push(Box::new(move |job: &JenkinsJobData| {
            job.url.as_deref().is_some_and(|url| matcher.matches(url))
        }));
    }

    Ok(apply_filters(jobs, &filters))
}

fn filter_builds(builds: Vec<JenkinsBuildData>, args: &QueryArgs) -> Result<Vec<JenkinsBuildData>> {
    let mut filters: Vec<Filter<JenkinsBuildData>> = Vec::new();

    if let Some(patterns) = &args.builds.value {
        // A bare --builds asks for all of them.
        if !patterns.is_empty() {
            let matcher = Matcher::new(patterns)?;
            filters.push(Box::new(move |build: &JenkinsBuildData| {
                matcher.matches(&build.number.to_string())
            }));
        }
    }

    if let Some(patterns) = &args.build_status.value {
        let matcher = Matcher::new(patterns)?;
        filters.push(Box::new(move |build: &JenkinsBuildData| {
            build
                .result
                .as_deref()
                .is_some_and(|result| matcher.matches(result))
        }));
    }

    Ok(apply_filters(builds, &filters))
}

fn to_build(data: JenkinsBuildData) -> Build {
    Build {
        build_id: data.number.to_string(),
        status: data.result,
        duration: data.duration,
        timestamp: data
            .timestamp
            .and_then(|ts| Utc.timestamp_millis_opt(ts).single()),
    }
}
