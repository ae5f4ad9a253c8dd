mod progress;
mod styling;
mod summary;
mod tables;

use styling::{dim, magenta_bold};

pub use progress::PhaseProgress;
pub use summary::print_summary;

/// Prints the name and version banner to stderr, ahead of any progress
/// output.
pub fn print_banner() {
    eprintln!(
        r"
{} {}
  {}
",
        magenta_bold("🔍 ciquery"),
        dim(env!("CARGO_PKG_VERSION")),
        dim("CI Query Tool")
    );
}
