//! Progress reporting for CLI

use crate::application::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;

const DECRYPT_TEMPLATE: &str =
    "{msg}\n{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} files ({eta})";

/// Progress reporter using indicatif
pub struct ProgressReporter {
    bar: Arc<ProgressBar>,
}

impl ProgressReporter {
    /// Creates a progress bar counting backup files
    pub fn for_decryption() -> Self {
        let bar = ProgressBar::new(0);
        if let Ok(style) = ProgressStyle::default_bar().template(DECRYPT_TEMPLATE) {
            bar.set_style(style.progress_chars("#>-"));
        }
        bar.set_message("Decrypting backup files...".to_string());

        Self { bar: Arc::new(bar) }
    }

    /// Hidden reporter, used when output is not a terminal
    pub fn hidden() -> Self {
        Self {
            bar: Arc::new(ProgressBar::hidden()),
        }
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    /// Finishes with a message
    pub fn finish(&self, message: &str) {
        self.bar.finish_with_message(message.to_string());
    }

    /// Gets a `(current, total)` callback for the decryption engine
    pub fn callback(&self) -> ProgressCallback {
        let bar = Arc::clone(&self.bar);
        Box::new(move |current: usize, total: usize| {
            bar.set_length(total as u64);
            bar.set_position(current as u64);
        })
    }
}
