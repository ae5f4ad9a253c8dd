use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::styling::{bright, bright_green, bright_yellow};

/// What the run is doing in each phase, and how a done phase reads.
const PHASES: [(&str, &str); 3] = [
    ("Loading configuration", "Configuration loaded"),
    ("Querying CI systems", "CI systems queried"),
    ("Rendering the report", "Report ready"),
];

/// Spinner that walks a run through its phases on stderr, keeping stdout
/// free for the report itself.
pub struct PhaseProgress {
    pb: ProgressBar,
    current: usize,
}

impl PhaseProgress {
    /// Prints the phase header and starts the first spinner.
    pub fn start() -> Self {
        eprintln!("{}  {}", bright("⚙️"), bright("Phases").underlined());

        Self {
            pb: create_spinner(0),
            current: 0,
        }
    }

    /// Marks the running phase as done and spins up the next one.
    pub fn advance(mut self) -> Self {
        self.finish_current();
        self.current += 1;
        self.pb = create_spinner(self.current);
        self
    }

    /// Marks the last phase as done and closes the display.
    pub fn finish(self) {
        self.finish_current();
        eprintln!("\n");
    }

    fn finish_current(&self) {
        let (_, done) = PHASES[self.current];
        let message = format!("Phase {}/{}: {done} ✓", self.current + 1, PHASES.len());

        self.pb.finish_with_message(bright_green(message).to_string());
    }
}

fn create_spinner(phase: usize) -> ProgressBar {
    let (running, _) = PHASES[phase];
    let message = format!("Phase {}/{}: {running}", phase + 1, PHASES.len());

    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap(),
    );
    pb.set_message(bright_yellow(message).to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
