use std::collections::HashSet;
use std::sync::Arc;

use log::debug;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{Map, Value};
use url::Url;

use crate::error::{CiQueryError, Result};
use crate::models::Source;

use super::api::{BuildData, JobApi, PipelineApi, ProjectApi, TenantApi, VariantApi, ZuulApi};

/// Connection to one Zuul host.
///
/// All REST endpoints hang off `{host}/api/`; the session owns that prefix
/// and the HTTP client, and every wrapper below shares it through an `Arc`.
pub(super) struct ZuulSession {
    /// HTTP client
    client: reqwest::blocking::Client,
    /// Host URL, always with a trailing slash
    host: String,
    /// API root, `{host}api/`
    api: String,
    /// Bearer token for authenticated requests
    token: Option<String>,
}

impl ZuulSession {
    /// Opens a session against the source's URL.
    ///
    /// # Errors
    ///
    /// Fails if the URL does not parse, the certificate cannot be read or
    /// the HTTP client cannot be built.
    pub(super) fn new(source: &Source) -> Result<Self> {
        // Every endpoint is derived from this URL, so validate it once here.
        Url::parse(&source.url).map_err(|e| {
            CiQueryError::Config(format!("Invalid Zuul URL '{}': {e}", source.url))
        })?;

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

        let mut host = source.url.clone();
        if !host.ends_with('/') {
            host.push('/');
        }
        let api = format!("{host}api/");

        Ok(Self {
            client,
            host,
            api,
            token: source.token.clone(),
        })
    }

    pub(super) fn host(&self) -> &str {
        &self.host
    }

    /// Ask a service of the API and decode its answer.
    ///
    /// # Errors
    ///
    /// A non-success status becomes [`CiQueryError::Zuul`] carrying the
    /// status and whatever body the host sent along.
    pub(super) fn get<T: DeserializeOwned>(&self, service: &str) -> Result<T> {
        let url = format!("{}{}", self.api, service);

        debug!("GET {url}");

        let mut request = self.client.get(&url);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send()?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .unwrap_or_else(|_| String::from("<no body>"));
            return Err(CiQueryError::Zuul {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json()?)
    }
}

/// REST implementation of the low-level API.
pub(super) struct ZuulClient {
    session: Arc<ZuulSession>,
}

impl ZuulClient {
    pub(super) fn new(source: &Source) -> Result<Self> {
        Ok(Self {
            session: Arc::new(ZuulSession::new(source)?),
        })
    }
}

impl ZuulApi for ZuulClient {
    fn tenants(&self) -> Result<Vec<Arc<dyn TenantApi>>> {
        let tenants: Vec<TenantData> = self.session.get("tenants")?;

        Ok(tenants
            .into_iter()
            .map(|data| {
                Arc::new(RestTenant {
                    session: Arc::clone(&self.session),
                    name: data.name,
                }) as Arc<dyn TenantApi>
            })
            .collect())
    }
}

struct RestTenant {
    session: Arc<ZuulSession>,
    name: String,
}

impl TenantApi for RestTenant {
    fn name(&self) -> &str {
        &self.name
    }

    fn projects(&self) -> Result<Vec<Arc<dyn ProjectApi>>> {
        let projects: Vec<ProjectData> =
            self.session.get(&format!("tenant/{}/projects", self.name))?;

        Ok(projects
            .into_iter()
            .map(|data| {
                Arc::new(RestProject {
                    session: Arc::clone(&self.session),
                    tenant: self.name.clone(),
                    name: data.name,
                }) as Arc<dyn ProjectApi>
            })
            .collect())
    }

    fn jobs(&self) -> Result<Vec<Arc<dyn JobApi>>> {
        let jobs: Vec<JobData> = self.session.get(&format!("tenant/{}/jobs", self.name))?;

        Ok(jobs
            .into_iter()
            .map(|data| {
                Arc::new(RestJob {
                    session: Arc::clone(&self.session),
                    tenant: self.name.clone(),
                    name: data.name,
                }) as Arc<dyn JobApi>
            })
            .collect())
    }
}

struct RestProject {
    session: Arc<ZuulSession>,
    tenant: String,
    name: String,
}

impl ProjectApi for RestProject {
    fn tenant(&self) -> Arc<dyn TenantApi> {
        Arc::new(RestTenant {
            session: Arc::clone(&self.session),
            name: self.tenant.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> String {
        format!("{}t/{}/project/{}", self.session.host(), self.tenant, self.name)
    }

    fn pipelines(&self) -> Result<Vec<Arc<dyn PipelineApi>>> {
        let info: ProjectInfo = self
            .session
            .get(&format!("tenant/{}/project/{}", self.tenant, self.name))?;

        // The same pipeline can show up in more than one config of the
        // project; the first appearance wins.
        let mut seen = HashSet::new();
        let mut pipelines: Vec<Arc<dyn PipelineApi>> = Vec::new();

        for config in info.configs {
            for pipeline in config.pipelines {
                let Some(name) = pipeline.get("name").and_then(Value::as_str).map(String::from)
                else {
                    continue;
                };

                if !seen.insert(name.clone()) {
                    continue;
                }

                pipelines.push(Arc::new(RestPipeline {
                    session: Arc::clone(&self.session),
                    tenant: self.tenant.clone(),
                    project: self.name.clone(),
                    name,
                    data: pipeline,
                }));
            }
        }

        Ok(pipelines)
    }
}

struct RestPipeline {
    session: Arc<ZuulSession>,
    tenant: String,
    project: String,
    name: String,
    /// Raw pipeline entry from the project's configs
    data: Value,
}

impl PipelineApi for RestPipeline {
    fn project(&self) -> Arc<dyn ProjectApi> {
        Arc::new(RestProject {
            session: Arc::clone(&self.session),
            tenant: self.tenant.clone(),
            name: self.project.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn jobs(&self) -> Result<Vec<Arc<dyn JobApi>>> {
        let Some(entries) = self.data.get("jobs").and_then(Value::as_array) else {
            return Ok(Vec::new());
        };

        let mut jobs: Vec<Arc<dyn JobApi>> = Vec::new();
        for entry in entries {
            let Some(name) = job_entry_name(entry) else {
                debug!("Skipping unrecognized job entry in pipeline '{}'", self.name);
                continue;
            };

            jobs.push(Arc::new(RestJob {
                session: Arc::clone(&self.session),
                tenant: self.tenant.clone(),
                name: name.to_string(),
            }));
        }

        Ok(jobs)
    }
}

/// A job inside a pipeline comes as a plain name, an object holding one, or
/// a list of variant objects. The first recognizable name wins.
fn job_entry_name(entry: &Value) -> Option<&str> {
    match entry {
        Value::String(name) => Some(name),
        Value::Object(map) => map.get("name").and_then(Value::as_str),
        Value::Array(variants) => variants.first().and_then(job_entry_name),
        _ => None,
    }
}

struct RestJob {
    session: Arc<ZuulSession>,
    tenant: String,
    name: String,
}

impl JobApi for RestJob {
    fn tenant(&self) -> Arc<dyn TenantApi> {
        Arc::new(RestTenant {
            session: Arc::clone(&self.session),
            name: self.tenant.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn url(&self) -> String {
        format!("{}t/{}/job/{}", self.session.host(), self.tenant, self.name)
    }

    fn variants(&self) -> Result<Vec<Arc<dyn VariantApi>>> {
        let variants: Vec<Value> = self
            .session
            .get(&format!("tenant/{}/job/{}", self.tenant, self.name))?;

        Ok(variants
            .into_iter()
            .map(|data| {
                let name = data
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or(self.name.as_str())
                    .to_string();

                Arc::new(RestVariant {
                    session: Arc::clone(&self.session),
                    tenant: self.tenant.clone(),
                    job: self.name.clone(),
                    name,
                    data,
                }) as Arc<dyn VariantApi>
            })
            .collect())
    }

    fn builds(&self) -> Result<Vec<BuildData>> {
        self.session
            .get(&format!("tenant/{}/builds?job_name={}", self.tenant, self.name))
    }
}

struct RestVariant {
    session: Arc<ZuulSession>,
    tenant: String,
    /// Name of the job the variant was read from
    job: String,
    name: String,
    /// Raw variant entry from the job's listing
    data: Value,
}

impl VariantApi for RestVariant {
    fn job(&self) -> Arc<dyn JobApi> {
        Arc::new(RestJob {
            session: Arc::clone(&self.session),
            tenant: self.tenant.clone(),
            name: self.job.clone(),
        })
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn variables(&self, recursive: bool) -> Result<Map<String, Value>> {
        let own = variables_of(&self.data);

        if !recursive {
            return Ok(own);
        }

        // Walk up the inheritance chain through the first variant of each
        // parent. A job name seen before stops the walk.
        let mut chain = Vec::new();
        let mut seen = HashSet::from([self.job.clone()]);
        let mut parent = parent_of(&self.data);

        while let Some(name) = parent {
            if !seen.insert(name.clone()) {
                debug!("Job '{name}' shows up twice in the parents of '{}'", self.job);
                break;
            }

            let variants: Vec<Value> = self
                .session
                .get(&format!("tenant/{}/job/{}", self.tenant, name))?;
            let Some(variant) = variants.into_iter().next() else {
                break;
            };

            chain.push(variables_of(&variant));
            parent = parent_of(&variant);
        }

        // Parents first, the variant itself last: the nearer a definition
        // sits to the variant, the stronger its say.
        let mut variables = Map::new();
        for layer in chain.into_iter().rev() {
            variables.extend(layer);
        }
        variables.extend(own);

        Ok(variables)
    }
}

fn variables_of(variant: &Value) -> Map<String, Value> {
    variant
        .get("variables")
        .and_then(Value::as_object)
        .cloned()
        .unwrap_or_default()
}

fn parent_of(variant: &Value) -> Option<String> {
    variant.get("parent").and_then(Value::as_str).map(String::from)
}

#[derive(Deserialize)]
struct TenantData {
    name: String,
}

#[derive(Deserialize)]
struct ProjectData {
    name: String,
}

#[derive(Deserialize)]
struct JobData {
    name: String,
}

/// Answer of the project info endpoint.
#[derive(Deserialize)]
struct ProjectInfo {
    #[serde(default)]
    configs: Vec<ProjectConfig>,
}

#[derive(Deserialize)]
struct ProjectConfig {
    #[serde(default)]
    pipelines: Vec<Value>,
}
