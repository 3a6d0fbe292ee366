//! Progress rendering for download jobs.
//!
//! Draws a file bar and a byte bar when stderr is a terminal, and falls back
//! to plain status lines otherwise.

use std::io::{self, IsTerminal};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use demtiles::download::{JobReport, ProgressReporter};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};

// ============================================================================
// Reporter
// ============================================================================

/// Renders engine callbacks on the terminal.
pub struct CliReporter {
    inner: Render,
}

enum Render {
    Fancy(FancyProgress),
    Plain(PlainProgress),
}

impl CliReporter {
    /// Create a reporter, auto-detecting terminal capability.
    pub fn new() -> Self {
        let inner = if io::stderr().is_terminal() {
            Render::Fancy(FancyProgress::new())
        } else {
            Render::Plain(PlainProgress::default())
        };
        Self { inner }
    }
}

impl Default for CliReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressReporter for CliReporter {
    fn file_progress(&self, current: usize, total: usize) {
        match &self.inner {
            Render::Fancy(inner) => inner.file_progress(current, total),
            Render::Plain(_) => {}
        }
    }

    fn byte_progress(&self, downloaded: u64, total: u64) {
        match &self.inner {
            Render::Fancy(inner) => inner.byte_progress(downloaded, total),
            Render::Plain(inner) => inner.byte_progress(downloaded, total),
        }
    }

    fn status(&self, message: &str) {
        match &self.inner {
            Render::Fancy(inner) => inner.files.set_message(message.to_string()),
            Render::Plain(_) => eprintln!("{}", message),
        }
    }

    fn error(&self, message: &str) {
        match &self.inner {
            Render::Fancy(inner) => {
                if inner.multi.println(message).is_err() {
                    eprintln!("{}", message);
                }
            }
            Render::Plain(_) => eprintln!("{}", message),
        }
    }

    fn finished(&self, _report: &JobReport) {
        if let Render::Fancy(inner) = &self.inner {
            inner.finish();
        }
    }
}

// ============================================================================
// Fancy Terminal Progress (indicatif)
// ============================================================================

struct FancyProgress {
    multi: MultiProgress,
    files: ProgressBar,
    bytes: ProgressBar,
}

impl FancyProgress {
    fn new() -> Self {
        let multi = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());

        let files = multi.add(ProgressBar::new(0));
        files.set_style(Self::files_style());
        files.enable_steady_tick(Duration::from_millis(120));

        let bytes = multi.add(ProgressBar::new(0));
        bytes.set_style(Self::bytes_style());

        Self {
            multi,
            files,
            bytes,
        }
    }

    fn file_progress(&self, current: usize, total: usize) {
        self.files.set_length(total as u64);
        self.files.set_position(current as u64);
    }

    fn byte_progress(&self, downloaded: u64, total: u64) {
        // The estimate skips tiles whose size probe failed.
        self.bytes.set_length(total.max(downloaded));
        self.bytes.set_position(downloaded);
    }

    fn finish(&self) {
        self.files.finish_and_clear();
        self.bytes.finish_and_clear();
    }

    fn files_style() -> ProgressStyle {
        ProgressStyle::with_template("{spinner} [{pos}/{len}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
    }

    fn bytes_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "  {bar:32.cyan/blue} {bytes:>10} / {total_bytes:>10} @ {binary_bytes_per_sec} ETA {eta}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ")
    }
}

// ============================================================================
// Plain Progress (non-terminal)
// ============================================================================

/// Prints overall progress every ten percent.
#[derive(Default)]
struct PlainProgress {
    last_decile: AtomicU64,
}

impl PlainProgress {
    fn byte_progress(&self, downloaded: u64, total: u64) {
        if total == 0 {
            return;
        }
        let decile = (downloaded.min(total) * 10 / total).min(10);
        if decile > self.last_decile.fetch_max(decile, Ordering::Relaxed) {
            eprintln!("  {}% downloaded", decile * 10);
        }
    }
}
