//! Progress bar for a lookup run.

use indicatif::{ProgressBar, ProgressStyle};

/// Bar tracking processed records out of `total`.
pub fn lookup_progress(total: u64) -> ProgressBar {
    let bar = ProgressBar::new(total);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} {msg} [{bar:30.cyan/blue}] {pos}/{len} ({per_sec}, eta {eta})")
            .unwrap()
            .progress_chars("█▓░"),
    );
    bar.set_message("Looking up");
    bar
}
