use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;
use serde::{Deserialize, Serialize};

use gdc_analysis::{ClassifierOptions, ContextMode, ExceptionScope, ListPaths, TOP_N};

/// Settings for a classification and GdC run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub lists: ListPaths,
    pub evidence_dir: PathBuf,
    pub theoretical: PathBuf,
    pub output_dir: PathBuf,
    pub top_n: usize,
    pub classifier: ClassifierOptions,
    /// Blocking worker threads; defaults to the available parallelism
    pub workers: Option<usize>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            lists: ListPaths::default(),
            evidence_dir: PathBuf::from("wec-evidences"),
            theoretical: PathBuf::from("theoretical_analysis.json"),
            output_dir: PathBuf::from("results"),
            top_n: TOP_N,
            classifier: ClassifierOptions::default(),
            workers: None,
        }
    }
}

impl RunConfig {
    pub fn worker_count(&self) -> usize {
        self.workers
            .filter(|&n| n > 0)
            .or_else(|| std::thread::available_parallelism().ok().map(|n| n.get()))
            .unwrap_or(1)
    }
}

pub fn load_config(path: &Path) -> Result<RunConfig, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read config '{}': {}", path.display(), e))?;
    serde_json::from_str(&content)
        .map_err(|e| format!("Invalid config '{}': {}", path.display(), e))
}

/// Config and path flags shared by the subcommands. Flags override the file.
#[derive(Debug, Clone, Default, Args)]
pub struct ConfigArgs {
    /// JSON run config
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// EasyList filter list
    #[arg(long)]
    pub easylist: Option<PathBuf>,

    /// EasyPrivacy filter list
    #[arg(long)]
    pub easyprivacy: Option<PathBuf>,

    /// Fanboy's Annoyance filter list
    #[arg(long)]
    pub fanboy: Option<PathBuf>,

    /// Directory of <website>/inspection.json evidence
    #[arg(long)]
    pub evidence: Option<PathBuf>,

    /// Theoretical analysis JSON
    #[arg(long)]
    pub theoretical: Option<PathBuf>,

    /// Output directory for result files
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Entries kept in rankings
    #[arg(long)]
    pub top: Option<usize>,

    /// Treat every request as a third-party script
    #[arg(long)]
    pub assume_third_party_script: bool,

    /// Let an exception in any list clear a block in any list
    #[arg(long)]
    pub global_exceptions: bool,

    /// Worker threads for classification
    #[arg(long)]
    pub workers: Option<usize>,
}

impl ConfigArgs {
    pub fn resolve(&self) -> Result<RunConfig, String> {
        let mut config = match &self.config {
            Some(path) => {
                let config = load_config(path)?;
                log::info!("Loaded configuration from {}", path.display());
                config
            }
            None => RunConfig::default(),
        };
        self.apply(&mut config);
        Ok(config)
    }

    fn apply(&self, config: &mut RunConfig) {
        if let Some(path) = &self.easylist {
            config.lists.easylist = path.clone();
        }
        if let Some(path) = &self.easyprivacy {
            config.lists.easyprivacy = path.clone();
        }
        if let Some(path) = &self.fanboy {
            config.lists.fanboy_annoyance = path.clone();
        }
        if let Some(path) = &self.evidence {
            config.evidence_dir = path.clone();
        }
        if let Some(path) = &self.theoretical {
            config.theoretical = path.clone();
        }
        if let Some(path) = &self.output {
            config.output_dir = path.clone();
        }
        if let Some(top) = self.top {
            config.top_n = top;
        }
        if self.assume_third_party_script {
            config.classifier.context = ContextMode::AssumeThirdPartyScript;
        }
        if self.global_exceptions {
            config.classifier.exception_scope = ExceptionScope::Global;
        }
        if let Some(workers) = self.workers {
            config.workers = Some(workers);
        }
    }
}
