//! Terminal progress bars for the windowed grid operations.

use grid_processor::Progress;
use indicatif::{ProgressBar, ProgressStyle};

/// indicatif bar driven by [`Progress`] callbacks.
///
/// One bar is reused across operations; `start` rewinds it.
pub struct BarProgress {
    bar: ProgressBar,
}

impl BarProgress {
    /// A bar that never draws.
    pub fn hidden() -> Self {
        Self {
            bar: ProgressBar::hidden(),
        }
    }

    /// Visible bar for interactive runs.
    pub fn terminal() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{msg} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len}")
        {
            bar.set_style(style.progress_chars("##-"));
        }
        Self { bar }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }
}

impl Progress for BarProgress {
    fn start(&self, total: u64, message: &str) {
        self.bar.reset();
        self.bar.set_length(total);
        self.bar.set_message(message.to_string());
    }

    fn advance(&self, n: u64) {
        self.bar.inc(n);
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hidden_bar_counts() {
        let progress = BarProgress::hidden();
        progress.start(4, "windows");
        progress.advance(1);
        progress.advance(2);
        assert_eq!(progress.position(), 3);

        progress.start(2, "again");
        assert_eq!(progress.position(), 0);
        progress.finish();
    }
}
