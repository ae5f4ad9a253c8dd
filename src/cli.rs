use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use crate::config::Config;
use crate::models::{Attribute, SystemType};
use crate::output::{print_summary, PhaseProgress};
use crate::query::{run_query, QueryArgs};
use crate::validator::Validator;

#[derive(Parser)]
#[command(name = "ciquery")]
#[command(author, version, about = "CI Query Tool", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(short, long, global = true, env = "CIQUERY_CONFIG")]
    config: Option<PathBuf>,

    /// Write the JSON report to this file
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,

    /// How to render the report on stdout
    #[arg(short, long, global = true, value_enum, default_value_t = OutputFormat::Summary)]
    format: OutputFormat,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Summary,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Query jobs, builds and deployments across the configured CI systems
    Query(QueryOptions),
}

/// Filters of the query subcommand.
///
/// Most of them take regex patterns. The ones marked "bare" may also be
/// given without a value, which asks for that data to be fetched or shown
/// without narrowing anything down.
#[derive(Args)]
struct QueryOptions {
    /// Environments to query, by exact name
    #[arg(long, num_args = 1..)]
    env_name: Option<Vec<String>>,

    /// Systems to query, by exact name
    #[arg(long, num_args = 1..)]
    systems: Option<Vec<String>>,

    /// Kinds of system to query
    #[arg(long, value_enum, num_args = 1..)]
    system_type: Option<Vec<SystemType>>,

    /// Sources to query through, by exact name
    #[arg(long, num_args = 1..)]
    sources: Option<Vec<String>>,

    /// Zuul tenants to look at
    #[arg(long, num_args = 1..)]
    tenants: Option<Vec<String>>,

    /// Zuul projects to look at
    #[arg(long, num_args = 1..)]
    projects: Option<Vec<String>>,

    /// Zuul pipelines to look at
    #[arg(long, num_args = 1..)]
    pipelines: Option<Vec<String>>,

    /// Job name patterns; bare, every job is fetched
    #[arg(long, num_args = 0..)]
    jobs: Option<Vec<String>>,

    /// Job URL patterns
    #[arg(long, num_args = 1..)]
    job_url: Option<Vec<String>>,

    /// Build id patterns; bare, every build is fetched
    #[arg(long, num_args = 0..)]
    builds: Option<Vec<String>>,

    /// Build status patterns (SUCCESS, FAILURE, ...)
    #[arg(long, num_args = 1..)]
    build_status: Option<Vec<String>>,

    /// Keep only the newest build of each job
    #[arg(long)]
    last_build: bool,

    /// Release patterns; bare, the release is only shown
    #[arg(long, num_args = 0..)]
    release: Option<Vec<String>>,

    /// Infrastructure type patterns; bare, the value is only shown
    #[arg(long, num_args = 0..)]
    infra_type: Option<Vec<String>>,

    /// Topology patterns; bare, the value is only shown
    #[arg(long, num_args = 0..)]
    topology: Option<Vec<String>>,

    /// IP version patterns; bare, the value is only shown
    #[arg(long, num_args = 0..)]
    ip_version: Option<Vec<String>>,

    /// Cinder backend patterns; bare, the value is only shown
    #[arg(long, num_args = 0..)]
    cinder_backend: Option<Vec<String>>,
}

impl QueryOptions {
    fn to_query_args(&self) -> QueryArgs {
        let mut args = QueryArgs::new();

        fill(&mut args.env_name, &self.env_name);
        fill(&mut args.systems, &self.systems);
        fill(&mut args.system_type, &self.system_type);
        fill(&mut args.sources, &self.sources);
        fill(&mut args.tenants, &self.tenants);
        fill(&mut args.projects, &self.projects);
        fill(&mut args.pipelines, &self.pipelines);
        fill(&mut args.jobs, &self.jobs);
        fill(&mut args.job_url, &self.job_url);
        fill(&mut args.builds, &self.builds);
        fill(&mut args.build_status, &self.build_status);
        args.last_build = self.last_build;
        fill(&mut args.release, &self.release);
        fill(&mut args.infra_type, &self.infra_type);
        fill(&mut args.topology, &self.topology);
        fill(&mut args.ip_version, &self.ip_version);
        fill(&mut args.cinder_backend, &self.cinder_backend);

        args
    }
}

/// Carries a parsed command line value over into its query slot. Arguments
/// the user did not give leave the slot unset.
fn fill<T: Clone>(slot: &mut Attribute<T>, values: &Option<T>) {
    if let Some(values) = values {
        slot.set(values.clone());
    }
}

impl Cli {
    pub fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Query(options) => self.execute_query(options),
        }
    }

    fn execute_query(&self, options: &QueryOptions) -> Result<()> {
        info!("Running a query across the configured CI systems");

        let args = options.to_query_args();

        let progress = PhaseProgress::start();

        let config = Config::load(self.config.as_deref())?;
        let environments = config.build_environments();
        let environments = Validator::new(&args).validate_environments(environments)?;

        let progress = progress.advance();

        let report = run_query(environments, &args)?;

        let progress = progress.advance();

        let json = if self.pretty {
            serde_json::to_string_pretty(&report)?
        } else {
            serde_json::to_string(&report)?
        };

        progress.finish();

        match self.format {
            OutputFormat::Summary => {
                print_summary(&report);

                if let Some(path) = &self.output {
                    std::fs::write(path, &json)?;
                    info!("Report written to: {}", path.display());
                }
            }
            OutputFormat::Json => {
                if let Some(path) = &self.output {
                    std::fs::write(path, &json)?;
                    info!("Report written to: {}", path.display());
                } else {
                    println!("{json}");
                }
            }
        }

        Ok(())
    }
}
