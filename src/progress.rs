//! Terminal progress display for a patching run

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::PatchEvent;
use crate::pipeline::report::Stage;
use crate::pipeline::PipelineObserver;

/// Progress display driven by pipeline observer callbacks.
///
/// A single bar advances over the patch events of the apply stage; stage
/// transitions update the bar message, and per-patch failures are printed
/// above the bar as they stream in.
pub struct ProgressDisplay {
    bar: ProgressBar,
}

impl ProgressDisplay {
    /// Create a progress display over the number of selected patches
    pub fn new(total_patches: u64) -> Self {
        let style = ProgressStyle::default_bar()
            .template("[{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-");

        let bar = ProgressBar::new(total_patches);
        bar.set_style(style);

        Self { bar }
    }

    /// Finish and clear the bar
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Abandon on error, leaving the bar visible in its last state
    pub fn abandon(&self) {
        self.bar.abandon();
    }
}

impl PipelineObserver for ProgressDisplay {
    fn stage_started(&self, stage: Stage) {
        self.bar.set_message(stage.to_string());
    }

    fn stage_finished(&self, stage: Stage, success: bool) {
        if !success {
            self.bar
                .println(format!("{} {stage} failed", Style::new().red().apply_to("✗")));
        }
    }

    fn patch_finished(&self, event: &PatchEvent) {
        self.bar.inc(1);
        if event.success {
            self.bar.println(format!(
                "{} {}",
                Style::new().green().apply_to("✓"),
                event.name
            ));
        } else {
            let detail = event.error.as_deref().unwrap_or("failed");
            self.bar.println(format!(
                "{} {}: {detail}",
                Style::new().red().apply_to("✗"),
                event.name
            ));
        }
    }
}
