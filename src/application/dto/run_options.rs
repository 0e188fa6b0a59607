//! Run options DTO

use std::path::PathBuf;

/// Options for running extraction modules
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Run only the module with this name
    pub module: Option<String>,
    /// Folder for JSON snapshots and timelines
    pub output: Option<PathBuf>,
    /// Skip slow optional parsing
    pub fast_mode: bool,
}

impl RunOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the output folder
    pub fn with_output(mut self, output: Option<PathBuf>) -> Self {
        self.output = output;
        self
    }

    /// Restricts the run to one module
    pub fn only(mut self, module: Option<String>) -> Self {
        self.module = module;
        self
    }

    pub fn fast(mut self, fast_mode: bool) -> Self {
        self.fast_mode = fast_mode;
        self
    }
}
