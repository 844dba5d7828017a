//! Drives one merge run end to end: load, harmonize, aggregate, link, enrich, write.
//!
//! Every input is loaded before anything is written, so a run that fails on a
//! mandatory source leaves the output directory untouched.

use chrono::Utc;
use std::path::PathBuf;
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::constants;
use crate::error::{MergeError, Result};
use crate::metrics::{self, MatchingMetrics};
use crate::pipeline::ingestion::csv_source::{read_record_set, LoadedTable};
use crate::pipeline::processing::aggregate::{AggregatedCandidates, SourceAggregator, SourceBatch};
use crate::pipeline::processing::conflation::{Linkage, Matcher};
use crate::pipeline::processing::enrich::{EnrichedDataset, Enricher};
use crate::pipeline::processing::normalize::Normalizer;
use crate::pipeline::storage::csv_sink::write_record_set;
use crate::pipeline::summary::{InputDigest, OperatorCoverage, RunSummary};
use crate::types::{FacilityRecord, MatchRule, RecordSet};

/// Everything read from disk for one run
#[derive(Debug, Clone)]
pub struct LoadedInputs {
    pub reference: RecordSet,
    pub batches: Vec<SourceBatch>,
    pub digests: Vec<InputDigest>,
    /// Optional sources that were missing or empty
    pub skipped_sources: Vec<String>,
}

/// Files written by a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub aggregated: PathBuf,
    pub enriched: PathBuf,
    pub audit: PathBuf,
    pub summary: PathBuf,
    pub metrics: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub summary: RunSummary,
    pub linkage: Linkage,
    pub enriched: EnrichedDataset,
    pub artifacts: ArtifactPaths,
}

/// Result of a dry input check
#[derive(Debug, Clone)]
pub struct InputCheck {
    pub reference_rows: usize,
    pub inputs: Vec<InputDigest>,
    pub skipped_sources: Vec<String>,
    pub missing_enrichment_columns: Vec<String>,
}

pub struct MergeOrchestrator {
    config: Config,
    normalizer: Normalizer,
    matcher: Matcher,
    enricher: Enricher,
}

impl MergeOrchestrator {
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let normalizer = Normalizer::new(config.lookups.clone());
        let enricher = Enricher::new(config.enrichment.columns.clone())?;
        Ok(Self {
            config,
            normalizer,
            matcher: Matcher::new(),
            enricher,
        })
    }

    /// Replace the match cascade
    pub fn with_matcher(mut self, matcher: Matcher) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn artifact_paths(&self) -> ArtifactPaths {
        let outputs = &self.config.outputs;
        ArtifactPaths {
            aggregated: self.config.resolve(&outputs.aggregated),
            enriched: self.config.resolve(&outputs.enriched),
            audit: self.config.resolve(&outputs.audit),
            summary: self.config.resolve(&outputs.summary),
            metrics: outputs.metrics.as_ref().map(|p| self.config.resolve(p)),
        }
    }

    /// Load the reference register and every configured source.
    ///
    /// The reference and mandatory sources must exist and hold at least one
    /// record. Optional sources that fail are skipped with a warning.
    pub fn load_inputs(&self) -> Result<LoadedInputs> {
        let reference_cfg = &self.config.reference;
        let reference_path = self.config.resolve(&reference_cfg.file);
        let reference = read_record_set(&reference_cfg.name, &reference_path)?;
        if reference.records.is_empty() {
            return Err(MergeError::source_unavailable(
                &reference_cfg.name,
                &reference_path,
                "no records",
            ));
        }

        let mut digests = vec![digest(&reference_cfg.name, reference_path, &reference)];
        let mut batches = Vec::new();
        let mut skipped_sources = Vec::new();

        for source in &self.config.sources {
            let path = self.config.resolve(&source.file);
            let loaded = read_record_set(&source.name, &path).and_then(|table| {
                if table.records.is_empty() {
                    Err(MergeError::source_unavailable(&source.name, &path, "no records"))
                } else {
                    Ok(table)
                }
            });

            match loaded {
                Ok(table) => {
                    digests.push(digest(&source.name, path, &table));
                    batches.push(SourceBatch::new(source.name.clone(), table.records));
                }
                Err(e) if source.mandatory => {
                    error!("❌ Mandatory source '{}' unavailable: {}", source.name, e);
                    return Err(e);
                }
                Err(e) => {
                    warn!("⚠️ Skipping optional source '{}': {}", source.name, e);
                    skipped_sources.push(source.name.clone());
                }
            }
        }

        Ok(LoadedInputs {
            reference: reference.records,
            batches,
            digests,
            skipped_sources,
        })
    }

    /// Harmonize and concatenate the candidate sources
    pub fn aggregate(&self, batches: Vec<SourceBatch>) -> AggregatedCandidates {
        SourceAggregator::aggregate(
            batches
                .into_iter()
                .map(|batch| {
                    let records = harmonize_set(batch.records, |r| self.normalizer.harmonize(r));
                    SourceBatch::new(batch.source, records)
                }),
        )
    }

    /// Load and aggregate, writing only the aggregated artifact
    pub fn aggregate_only(&self) -> Result<(AggregatedCandidates, PathBuf)> {
        let inputs = self.load_inputs()?;
        let candidates = self.aggregate(inputs.batches);
        let path = self.artifact_paths().aggregated;
        write_record_set(&path, &candidates.to_record_set())?;
        Ok((candidates, path))
    }

    /// Load every input and report what a run would see, writing nothing
    pub fn check(&self) -> Result<InputCheck> {
        let inputs = self.load_inputs()?;
        let reference_rows = inputs.reference.len();
        let candidates = self.aggregate(inputs.batches);
        let missing_enrichment_columns = self
            .enricher
            .columns()
            .iter()
            .filter(|c| !candidates.has_column(c))
            .cloned()
            .collect();
        Ok(InputCheck {
            reference_rows,
            inputs: inputs.digests,
            skipped_sources: inputs.skipped_sources,
            missing_enrichment_columns,
        })
    }

    /// Full merge run
    pub fn run(&self) -> Result<MergeOutcome> {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let span = info_span!("merge_run", run_id = %run_id);
        let _enter = span.enter();

        info!("🚀 Starting merge run, work dir {}", self.config.work_dir.display());

        let inputs = self.load_inputs()?;
        let artifacts = self.artifact_paths();

        let reference = harmonize_set(inputs.reference, |r| self.normalizer.harmonize_district(r));
        let candidates = self.aggregate(inputs.batches);
        write_record_set(&artifacts.aggregated, &candidates.to_record_set())?;
        info!(
            "✅ Aggregated {} candidates from {} sources",
            candidates.len(),
            candidates.reports.len()
        );

        MatchingMetrics::record_inputs(reference.len(), candidates.len());
        let reference_keys = self.normalizer.keys_for_all(&reference.records);
        let candidate_keys = self.normalizer.keys_for_all(&candidates.records);
        let linkage = self.matcher.run(&reference_keys, &candidate_keys)?;
        info!(
            "🔗 Linked {} of {} reference records ({} email, {} phone, {} fuzzy name)",
            linkage.matches.len(),
            linkage.reference_count,
            linkage.count_for(MatchRule::Email),
            linkage.count_for(MatchRule::Phone),
            linkage.count_for(MatchRule::FuzzyName)
        );

        let enriched = self.enricher.enrich(&reference, &candidates, &linkage)?;
        write_record_set(&artifacts.enriched, &enriched.to_record_set())?;
        write_record_set(&artifacts.audit, &enriched.to_audit_set())?;

        let coverage = OperatorCoverage::measure(&candidates, &enriched);
        info!(
            "📊 Operator coverage: {} scraped, {} landed in enriched output",
            coverage.scraped_with_operator, coverage.enriched_with_operator
        );

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            lookup_version: self.normalizer.tables().version.clone(),
            inputs: inputs.digests,
            skipped_sources: inputs.skipped_sources,
            sources: candidates.reports.clone(),
            reference_rows: reference.len(),
            candidate_rows: candidates.len(),
            stages: linkage.stages.clone(),
            matched_by_rule: RunSummary::matched_by_rule(&linkage),
            matched_total: linkage.matches.len(),
            unmatched_references: linkage.unmatched_references(),
            missing_enrichment_columns: enriched.missing_columns.clone(),
            coverage,
        };
        summary.write(&artifacts.summary)?;

        if let Some(path) = &artifacts.metrics {
            if !metrics::write_snapshot(path)? {
                warn!("⚠️ No metrics recorder installed, skipping snapshot {}", path.display());
            }
        }

        info!("🎉 Merge run finished");
        Ok(MergeOutcome {
            summary,
            linkage,
            enriched,
            artifacts,
        })
    }
}

fn digest(name: &str, path: PathBuf, table: &LoadedTable) -> InputDigest {
    InputDigest {
        name: name.to_string(),
        path,
        sha256: table.sha256.clone(),
        rows: table.records.len(),
    }
}

/// Harmonize every record, registering any derived column the set lacked
fn harmonize_set<F>(set: RecordSet, harmonize: F) -> RecordSet
where
    F: Fn(&FacilityRecord) -> FacilityRecord,
{
    let RecordSet { mut columns, records } = set;
    let records: Vec<_> = records.iter().map(harmonize).collect();
    for derived in [constants::FIELD_BEZIRK, constants::FIELD_TRAEGER] {
        if !columns.iter().any(|c| c == derived) && records.iter().any(|r| r.has(derived)) {
            columns.push(derived.to_string());
        }
    }
    RecordSet::new(columns, records)
}
