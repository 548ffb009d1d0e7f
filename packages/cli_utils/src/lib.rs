#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Terminal plumbing shared by the levee census binaries: the overlay
//! progress bar, a stage counter for the one-pass `run` command, and a
//! logger that stays out of the bars' way.

use std::sync::Arc;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use levee_census_weights::progress::ProgressSink;

pub use indicatif::MultiProgress;

const OVERLAY_TEMPLATE: &str =
    "{prefix:.bold} [{bar:32.cyan/blue}] {pos}/{len} targets  {msg}  ({per_sec}, eta {eta})";

/// Per-target overlay bar.
///
/// Spins until the engine announces how many leveed areas it will overlay,
/// then counts them. The engine's label (leveed areas against indexed
/// tracts) is shown beside the counter.
pub struct OverlayBar {
    bar: ProgressBar,
}

impl OverlayBar {
    #[must_use]
    pub fn attach(multi: &MultiProgress) -> Arc<dyn ProgressSink> {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.set_prefix("overlay");
        bar.set_message("indexing tracts");
        bar.enable_steady_tick(Duration::from_millis(120));
        Arc::new(Self { bar })
    }
}

impl ProgressSink for OverlayBar {
    fn start(&self, units: u64) {
        let style = ProgressStyle::with_template(OVERLAY_TEMPLATE)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        self.bar.set_style(style);
        self.bar.set_length(units);
        self.bar.reset_eta();
    }

    fn tick(&self) {
        self.bar.inc(1);
    }

    fn label(&self, text: &str) {
        self.bar.set_message(text.to_string());
    }

    fn finish(&self, summary: &str) {
        self.bar.finish_with_message(summary.to_string());
    }
}

/// Fixed list of named stages, advanced one at a time.
pub struct Stages {
    bar: ProgressBar,
    names: &'static [&'static str],
}

impl Stages {
    #[must_use]
    pub fn attach(multi: &MultiProgress, names: &'static [&'static str]) -> Self {
        let bar = multi.add(ProgressBar::new(names.len() as u64));
        bar.set_style(
            ProgressStyle::with_template("stage {pos}/{len} {msg:.green} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        if let Some(first) = names.first() {
            bar.set_message(*first);
        }
        Self { bar, names }
    }

    /// Marks the current stage done and shows the next one's name.
    pub fn advance(&self) {
        self.bar.inc(1);
        let next = usize::try_from(self.bar.position()).unwrap_or(usize::MAX);
        match self.names.get(next) {
            Some(name) => self.bar.set_message(*name),
            None => self.bar.finish_with_message("done"),
        }
    }
}

/// Installs `pretty_env_logger` (filtered by `RUST_LOG`) behind
/// `indicatif-log-bridge`, and returns the [`MultiProgress`] every bar
/// must be attached to for log lines to print cleanly above it.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // Already set when called twice in one process.
    indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .ok();

    log::set_max_level(level);

    multi
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stages_walk_through_names_then_finish() {
        let multi = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let stages = Stages::attach(&multi, &["load", "weigh", "write"]);
        assert_eq!(stages.bar.message(), "load");

        stages.advance();
        assert_eq!(stages.bar.message(), "weigh");
        stages.advance();
        stages.advance();
        assert!(stages.bar.is_finished());
        assert_eq!(stages.bar.message(), "done");
    }

    #[test]
    fn overlay_bar_counts_ticks() {
        let multi = MultiProgress::with_draw_target(indicatif::ProgressDrawTarget::hidden());
        let bar = multi.add(ProgressBar::new_spinner());
        let overlay = OverlayBar { bar: bar.clone() };

        overlay.start(3);
        overlay.tick();
        overlay.tick();
        overlay.label("2 leveed areas x 5 tracts");

        assert_eq!(bar.length(), Some(3));
        assert_eq!(bar.position(), 2);
        assert_eq!(bar.message(), "2 leveed areas x 5 tracts");
    }
}
