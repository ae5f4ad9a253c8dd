use std::fmt::Write;

use comfy_table::{Cell, Color as TableColor};

use crate::models::{Deployment, QueryReport, System};

use super::styling::{bright, bright_yellow, dim};
use super::tables::{create_table, duration_cell, status_cell};

/// Prints a human-readable summary of a query report to stdout.
///
/// Shows an overview of what the run collected, then one table per system
/// with the jobs that came back. Build columns appear once any job carries
/// builds, a deployment column once any job carries a deployment summary.
///
/// Color coding:
/// - Green: successful builds
/// - Red: failed builds
/// - Yellow: any other build state (UNSTABLE, ABORTED, ...)
pub fn print_summary(report: &QueryReport) {
    println!("{}", render_summary(report));
}

// Helper functions

fn create_cyan_header(labels: &[&str]) -> Vec<Cell> {
    labels
        .iter()
        .map(|label| Cell::new(*label).fg(TableColor::Cyan))
        .collect()
}

fn add_section_header(output: &mut String, emoji: &str, title: &str) {
    let _ = writeln!(output, "{} {}", bright(emoji), bright(title).underlined());
}

fn format_deployment(deployment: &Deployment) -> String {
    let fields = [
        ("release", &deployment.release),
        ("featureset", &deployment.featureset),
        ("infra", &deployment.infra_type),
        ("topology", &deployment.topology),
        ("ip", &deployment.ip_version),
        ("cinder", &deployment.cinder_backend),
    ];

    let parts: Vec<String> = fields
        .iter()
        .filter_map(|(label, value)| value.as_ref().map(|value| format!("{label}={value}")))
        .collect();

    if parts.is_empty() {
        "-".to_string()
    } else {
        parts.join("\n")
    }
}

fn render_summary(report: &QueryReport) -> String {
    let mut output = String::new();

    // Overview section
    add_section_header(&mut output, "📊", "Overview");

    let total_systems: usize = report
        .environments
        .iter()
        .map(|environment| environment.systems.len())
        .sum();
    let total_jobs: usize = report
        .environments
        .iter()
        .flat_map(|environment| &environment.systems)
        .map(|system| system.jobs.len())
        .sum();
    let total_builds: usize = report
        .environments
        .iter()
        .flat_map(|environment| &environment.systems)
        .flat_map(|system| system.jobs.values())
        .map(|job| job.builds.len())
        .sum();

    let _ = write!(
        output,
        "  {} {}\n  {} {}\n  {} {}\n  {} {}\n  {} {}\n\n",
        dim("Environments:"),
        bright_yellow(report.environments.len()),
        dim("Systems:"),
        bright_yellow(total_systems),
        dim("Jobs collected:"),
        bright_yellow(total_jobs),
        dim("Builds collected:"),
        bright_yellow(total_builds),
        dim("Collected at:"),
        dim(report.collected_at.format("%Y-%m-%d %H:%M UTC"))
    );

    for environment in &report.environments {
        for system in &environment.systems {
            render_system(&mut output, &environment.name, system);
        }
    }

    output
}

fn render_system(output: &mut String, environment: &str, system: &System) {
    add_section_header(
        output,
        "🌐",
        &format!("{environment} / {} ({})", system.name, system.system_type),
    );

    if !system.is_enabled() {
        let _ = writeln!(output, "  {}\n", dim("Skipped: system is disabled."));
        return;
    }

    if system.jobs.is_empty() {
        let _ = writeln!(output, "  {}\n", dim("No jobs matched the query."));
        return;
    }

    let with_builds = system.jobs.values().any(|job| !job.builds.is_empty());
    let with_deployment = system.jobs.values().any(|job| job.deployment.is_some());

    let mut headers = vec!["Job", "URL"];
    if with_builds {
        headers.extend(["Builds", "Last Build", "Status", "Duration"]);
    }
    if with_deployment {
        headers.push("Deployment");
    }

    let mut table = create_table();
    table.set_header(create_cyan_header(&headers));

    for job in system.jobs.values() {
        let mut row = vec![
            Cell::new(&job.name),
            Cell::new(job.url.as_deref().unwrap_or("-")),
        ];

        if with_builds {
            // Backends answer newest first, so the first entry is the
            // latest build.
            let last = job.builds.values().next();

            row.push(Cell::new(job.builds.len()));
            row.push(Cell::new(last.map_or("-", |build| build.build_id.as_str())));
            row.push(status_cell(last.and_then(|build| build.status.as_deref())));
            row.push(duration_cell(last.and_then(|build| build.duration)));
        }

        if with_deployment {
            row.push(Cell::new(
                job.deployment
                    .as_ref()
                    .map_or_else(|| "-".to_string(), format_deployment),
            ));
        }

        table.add_row(row);
    }

    let _ = writeln!(output, "{table}\n");
}
