use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{CiQueryError, Result};
use crate::models::Source;

/// Projection of the jobs list, enough to identify each job.
const JOBS_QUERY: &str = "?tree=jobs[name,url]";

/// Projection of every build of one job.
const BUILDS_QUERY: &str = "?tree=allBuilds[number,result,duration,timestamp]";

/// Projection of the jobs list with only their newest build attached.
const LAST_BUILD_QUERY: &str = "?tree=jobs[name,url,lastBuild[number,result,duration,timestamp]]";

/// Jenkins REST client built around the `api/json` endpoint.
///
/// Every request narrows the answer with a `tree` query so Jenkins only
/// sends the fields ciquery reads.
pub(super) struct JenkinsClient {
    /// HTTP client
    client: reqwest::blocking::Client,
    /// Base URL of the Jenkins instance, without a trailing slash
    url: String,
    /// Username for basic auth
    username: Option<String>,
    /// API token for basic auth
    token: Option<String>,
}

impl JenkinsClient {
    /// Create a new Jenkins API client for the given source.
    ///
    /// # Errors
    ///
    /// Fails if the source's certificate cannot be read or the HTTP client
    /// cannot be built.
    pub(super) fn new(source: &Source) -> Result<Self> {
        let mut builder = reqwest::blocking::Client::builder();

        if let Some(cert) = &source.cert {
            let pem = std::fs::read(cert).map_err(|e| {
                CiQueryError::Config(format!("Failed to read certificate {cert}: {e}"))
            })?;
            let certificate = reqwest::Certificate::from_pem(&pem)
                .map_err(|e| CiQueryError::Config(format!("Invalid certificate {cert}: {e}")))?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|e| CiQueryError::Config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            url: source.url.trim_end_matches('/').to_string(),
            username: source.username.clone(),
            token: source.token.clone(),
        })
    }

    /// Fetch all jobs known to the instance. Folders only group jobs on the
    /// Jenkins side and are left out of the answer.
    pub(super) fn get_jobs(&self) -> Result<Vec<JenkinsJobData>> {
        let page: JobsPage = self.send_request(JOBS_QUERY, None)?;

        Ok(page.jobs.into_iter().filter(|job| !job.is_folder()).collect())
    }

    /// Fetch every build of the given job.
    pub(super) fn get_builds(&self, job_name: &str) -> Result<Vec<JenkinsBuildData>> {
        let item = format!("job/{job_name}");
        let page: BuildsPage = self.send_request(BUILDS_QUERY, Some(&item))?;

        Ok(page.all_builds)
    }

    /// Fetch all jobs with their newest build in one request, instead of
    /// one builds request per job.
    pub(super) fn get_jobs_with_last_build(&self) -> Result<Vec<JenkinsJobData>> {
        let page: JobsPage = self.send_request(LAST_BUILD_QUERY, None)?;

        Ok(page.jobs.into_iter().filter(|job| !job.is_folder()).collect())
    }

    /// Send a request to the `api/json` endpoint of the instance, or of one
    /// of its items, and decode the answer.
    ///
    /// # Arguments
    ///
    /// * `query` - Query string to append, including the leading `?`
    /// * `item` - Optional path of the item to ask, e.g. `job/deploy`
    fn send_request<T: DeserializeOwned>(&self, query: &str, item: Option<&str>) -> Result<T> {
        let url = match item {
            Some(item) => format!("{}/{}/api/json{}", self.url, item, query),
            None => format!("{}/api/json{}", self.url, query),
        };

        debug!("GET {url}");

        let mut request = self.client.get(&url);
        if let (Some(username), Some(token)) = (&self.username, &self.token) {
            request = request.basic_auth(username, Some(token));
        }

        let response = request
            .send()
            .map_err(|e| CiQueryError::Jenkins(format!("Request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CiQueryError::Jenkins(format!(
                "Request to {url} failed with status {status}"
            )));
        }

        response.json().map_err(|e| {
            CiQueryError::Jenkins(format!("Could not decode response from {url}: {e}"))
        })
    }
}

/// One entry of the Jenkins jobs listing.
#[derive(Debug, Deserialize)]
pub(super) struct JenkinsJobData {
    /// Java class of the entry, used to tell folders and jobs apart
    #[serde(rename = "_class", default)]
    pub class: String,
    /// Job name. Folder entries may not carry one.
    pub name: Option<String>,
    /// Web URL of the job
    pub url: Option<String>,
    /// Newest build, present only when asked for
    #[serde(rename = "lastBuild")]
    pub last_build: Option<JenkinsBuildData>,
}

impl JenkinsJobData {
    pub(super) fn is_folder(&self) -> bool {
        self.class.to_lowercase().contains("folder")
    }
}

/// One build as Jenkins reports it.
#[derive(Debug, Deserialize)]
pub(super) struct JenkinsBuildData {
    /// Build number
    pub number: u64,
    /// Final result, absent while the build runs
    pub result: Option<String>,
    /// Run time in milliseconds
    pub duration: Option<u64>,
    /// Start of the build as epoch milliseconds
    pub timestamp: Option<i64>,
}

/// Response page for the jobs queries.
#[derive(Deserialize)]
struct JobsPage {
    #[serde(default)]
    jobs: Vec<JenkinsJobData>,
}

/// Response page for the builds query.
#[derive(Deserialize)]
struct BuildsPage {
    #[serde(rename = "allBuilds", default)]
    all_builds: Vec<JenkinsBuildData>,
}
