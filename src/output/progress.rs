use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use crate::models::JobKind;

use super::styling::{bright_green, bright_red, bright_yellow};

/// Spinner shown while one build is being fetched.
pub struct FetchProgress {
    pb: ProgressBar,
    label: String,
}

impl FetchProgress {
    pub fn start(kind: JobKind, job_id: u64) -> Self {
        let label = format!("Fetching {kind} #{job_id}");
        let pb = create_spinner(bright_yellow(&label).to_string());
        Self { pb, label }
    }

    pub fn finish(self) {
        self.pb
            .finish_with_message(bright_green(format!("{} ✓", self.label)).to_string());
    }

    pub fn abandon(self) {
        self.pb
            .finish_with_message(bright_red(format!("{} ✗", self.label)).to_string());
    }
}

fn create_spinner(message: String) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_draw_target(ProgressDrawTarget::stderr());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {msg} {spinner}")
            .unwrap(),
    );
    pb.set_message(message);
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}
