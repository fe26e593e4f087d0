//! Session-level accumulation of analysis outcomes

use super::writer::write_json_atomic;
use crate::error::PersistenceError;
use crate::model::{AudioAnalysisRecord, AudioResult, SessionRecord};
use chrono::{DateTime, Local};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Collects per-item results for one analysis session
#[derive(Debug)]
pub struct ResultAggregator {
    output_dir: PathBuf,
    input_dir: Option<PathBuf>,
    started_at: DateTime<Local>,
    results: Vec<AudioAnalysisRecord>,
    classifiers_used: BTreeSet<String>,
    failed: usize,
}

impl ResultAggregator {
    pub fn new(output_dir: PathBuf, input_dir: Option<PathBuf>) -> Self {
        Self {
            output_dir,
            input_dir,
            started_at: Local::now(),
            results: Vec::new(),
            classifiers_used: BTreeSet::new(),
            failed: 0,
        }
    }

    /// Fix the session timestamp (used for the default file name)
    pub fn with_timestamp(mut self, started_at: DateTime<Local>) -> Self {
        self.started_at = started_at;
        self
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    pub fn successful(&self) -> usize {
        self.results.len()
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn total(&self) -> usize {
        self.results.len() + self.failed
    }

    pub fn records(&self) -> &[AudioAnalysisRecord] {
        &self.results
    }

    /// Record a successfully analysed item
    pub fn append(&mut self, record: AudioAnalysisRecord) {
        for prediction in &record.predictions {
            self.classifiers_used
                .insert(prediction.classifier_name.clone());
        }
        log::debug!("Recorded result for: {:?}", record.audio_path);
        self.results.push(record);
    }

    /// Record an item that could not be analysed. Only the count is kept.
    pub fn append_failure(&mut self, audio_path: &Path, message: &str) {
        self.failed += 1;
        log::error!("Failed to process {:?}: {}", audio_path, message);
    }

    /// Current state as a persistable record
    pub fn snapshot(&self) -> SessionRecord {
        SessionRecord {
            session_timestamp: self.started_at.to_rfc3339(),
            input_directory: self
                .input_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default(),
            output_directory: self.output_dir.to_string_lossy().into_owned(),
            total_files: self.total(),
            successful_files: self.successful(),
            failed_files: self.failed,
            classifiers_used: self.classifiers_used.iter().cloned().collect(),
            results: self.results.iter().map(AudioResult::from_record).collect(),
        }
    }

    /// Write the current snapshot to `path`
    pub fn persist(&self, path: &Path) -> Result<(), PersistenceError> {
        write_json_atomic(path, &self.snapshot())?;
        log::info!("Results saved to: {:?}", path);
        Ok(())
    }

    /// Default session file name, `results_<YYYYmmdd_HHMMSS>.json`
    pub fn default_filename(&self) -> String {
        format!("results_{}.json", self.started_at.format("%Y%m%d_%H%M%S"))
    }

    /// Persist into the output directory, returning the written path
    pub fn save(&self, filename: Option<&str>) -> Result<PathBuf, PersistenceError> {
        let filename = filename
            .map(str::to_string)
            .unwrap_or_else(|| self.default_filename());
        let path = self.output_dir.join(filename);
        self.persist(&path)?;
        Ok(path)
    }

    /// Print counts and the top class of every classifier per file
    pub fn print_summary(&self) {
        let session = self.snapshot();
        let rule = "=".repeat(60);
        let thin = "-".repeat(60);

        println!("\n{}", rule);
        println!("TechnoTaggr Analysis Summary");
        println!("{}", rule);
        println!("Session: {}", session.session_timestamp);
        println!("Input:   {}", session.input_directory);
        println!("Output:  {}", session.output_directory);
        println!("{}", thin);
        println!("Total files:      {}", session.total_files);
        println!("Successful:       {}", session.successful_files);
        println!("Failed:           {}", session.failed_files);
        println!("Classifiers used: {}", session.classifiers_used.len());
        println!("{}", thin);

        if !self.results.is_empty() {
            println!("\nPer-file Results:");
            for record in &self.results {
                let name = record
                    .audio_path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                println!("\n  {}", name);
                println!("    Duration: {:.1}s", record.duration_seconds);
                for prediction in &record.predictions {
                    if let Some((label, probability)) = prediction.aggregated_predictions.top() {
                        println!(
                            "    {}: {} ({:.2}%)",
                            prediction.classifier_name,
                            label,
                            probability * 100.0
                        );
                    }
                }
            }
        }

        println!("\n{}", rule);
    }
}
