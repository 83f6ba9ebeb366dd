//! Progress bar for tile packing

use std::sync::Arc;

use butterfly_tiles::ProgressCallback;
use indicatif::{ProgressBar, ProgressStyle};

/// Creates a progress bar counting tiles
pub fn create_progress_bar(total_tiles: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_tiles);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} tiles ({percent}%) ETA: {eta}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("#>-"),
    );
    pb
}

/// Owns the bar shared by the extract and traffic stages
pub struct ProgressManager {
    pub pb: ProgressBar,
}

impl ProgressManager {
    pub fn new(message: &str) -> Self {
        eprintln!("{message}");
        Self {
            pb: create_progress_bar(0),
        }
    }

    /// Callback that resizes the bar when a new stage starts
    pub fn callback(&self) -> ProgressCallback {
        let pb = self.pb.clone();
        Arc::new(move |done, total| {
            if pb.length().unwrap_or(0) != total || done < pb.position() {
                pb.reset();
                pb.set_length(total);
            }
            pb.set_position(done);
        })
    }

    pub fn finish(&self) {
        self.pb.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_progress_bar_template() {
        let pb = create_progress_bar(1000);
        assert_eq!(pb.length().unwrap(), 1000);
        pb.set_position(100);
        pb.finish();
    }

    #[test]
    fn test_callback_follows_stages() {
        let manager = ProgressManager::new("test");
        let callback = manager.callback();

        callback(3, 10);
        assert_eq!(manager.pb.length(), Some(10));
        assert_eq!(manager.pb.position(), 3);

        callback(1, 4);
        assert_eq!(manager.pb.length(), Some(4));
        assert_eq!(manager.pb.position(), 1);
        manager.finish();
    }
}
