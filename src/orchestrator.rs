//! Diff Orchestrator
//!
//! Runs list → fetch → diff → emit once per object category, in the fixed
//! order TABLE, VIEW, FUNCTION, PROCEDURE, TRIGGER.

use crate::accessor::{Accessor, NameFilter};
use crate::config::DEFAULT_ROUTINE_DELIMITER;
use crate::diff::{DiffResult, ScriptDiffer, TableDiffer};
use crate::error::{Side, SyncError, SyncResult};
use crate::fetch::{FetchOptions, MetadataFetcher};
use crate::output::OutputSink;
use crate::schema::{NamedObjects, ObjectKind, Script, Table};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

const BANNER_RULE: &str = "-- ----------------------------------------- --";

/// Per-category outcome of a run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub kind: ObjectKind,
    pub differences: usize,
}

/// Outcome of a full comparison run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub categories: Vec<CategorySummary>,
    pub changes_found: bool,
}

impl RunSummary {
    pub fn differences(&self, kind: ObjectKind) -> usize {
        self.categories
            .iter()
            .find(|c| c.kind == kind)
            .map(|c| c.differences)
            .unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.categories.iter().map(|c| c.differences).sum()
    }
}

pub struct DiffOrchestrator {
    source: Arc<dyn Accessor>,
    destination: Arc<dyn Accessor>,
    filter: NameFilter,
    fetcher: MetadataFetcher,
    delimiter: String,
    generated_at: Option<DateTime<Utc>>,
}

impl DiffOrchestrator {
    pub fn new(source: Arc<dyn Accessor>, destination: Arc<dyn Accessor>) -> Self {
        Self {
            source,
            destination,
            filter: NameFilter::allow_all(),
            fetcher: MetadataFetcher::new(FetchOptions::default()),
            delimiter: DEFAULT_ROUTINE_DELIMITER.to_string(),
            generated_at: None,
        }
    }

    pub fn with_filter(mut self, filter: NameFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_fetch_options(mut self, options: FetchOptions) -> Self {
        self.fetcher = MetadataFetcher::new(options);
        self
    }

    pub fn with_delimiter(mut self, delimiter: impl Into<String>) -> Self {
        self.delimiter = delimiter.into();
        self
    }

    /// Pin the header timestamp (defaults to the time of the run)
    pub fn with_timestamp(mut self, generated_at: DateTime<Utc>) -> Self {
        self.generated_at = Some(generated_at);
        self
    }

    /// Compare every category and write the script into `sink`.
    ///
    /// The sink is closed in every case: kept when anything differed,
    /// discarded when nothing did or when the run failed.
    pub async fn run(&self, sink: &mut dyn OutputSink) -> SyncResult<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("schema_diff", %run_id);

        async move {
            sink.open()?;

            match self.run_categories(sink).await {
                Ok(categories) => {
                    let changes_found = categories.iter().any(|c| c.differences > 0);
                    sink.close(changes_found)?;
                    Ok(RunSummary {
                        run_id,
                        categories,
                        changes_found,
                    })
                }
                Err(e) => {
                    // A partial script is worse than none
                    sink.close(false)?;
                    Err(e)
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn run_categories(&self, sink: &mut dyn OutputSink) -> SyncResult<Vec<CategorySummary>> {
        let generated_at = self.generated_at.unwrap_or_else(Utc::now);
        write!(sink, "-- Create Date : {}\n", generated_at.format("%Y-%m-%d %H:%M:%S %z"));

        let mut categories = Vec::with_capacity(ObjectKind::ALL.len());
        for kind in ObjectKind::ALL {
            info!("compare {}....", kind);

            let results = match kind {
                ObjectKind::Table => self.diff_tables().await?,
                _ => self.diff_scripts(kind).await?,
            };

            self.emit(sink, kind, &results);
            info!("finish {}....{}", kind, results.len());

            categories.push(CategorySummary {
                kind,
                differences: results.len(),
            });
        }

        Ok(categories)
    }

    async fn diff_tables(&self) -> SyncResult<Vec<DiffResult>> {
        let (src, dst) = tokio::try_join!(
            self.load_tables(self.source.clone(), Side::Source),
            self.load_tables(self.destination.clone(), Side::Destination),
        )?;

        Ok(TableDiffer::diff(&src, &dst))
    }

    async fn load_tables(
        &self,
        accessor: Arc<dyn Accessor>,
        side: Side,
    ) -> SyncResult<NamedObjects<Table>> {
        let names = accessor
            .list_objects(ObjectKind::Table, &self.filter)
            .await
            .map_err(|source| SyncError::Listing {
                kind: ObjectKind::Table,
                side,
                source,
            })?;

        info!("{}: fetching {} tables", side, names.len());
        self.fetcher
            .fetch_tables(accessor, &names)
            .await?
            .into_complete(side)
    }

    async fn diff_scripts(&self, kind: ObjectKind) -> SyncResult<Vec<DiffResult>> {
        let (src, dst) = tokio::try_join!(
            self.load_scripts(self.source.as_ref(), kind, Side::Source),
            self.load_scripts(self.destination.as_ref(), kind, Side::Destination),
        )?;

        Ok(ScriptDiffer::diff(kind, &src, &dst, &self.delimiter))
    }

    async fn load_scripts(
        &self,
        accessor: &dyn Accessor,
        kind: ObjectKind,
        side: Side,
    ) -> SyncResult<NamedObjects<Script>> {
        let scripts = accessor
            .list_scripts(kind, &self.filter)
            .await
            .map_err(|source| SyncError::Listing { kind, side, source })?;

        let mut objects = NamedObjects::with_capacity(scripts.len());
        for script in scripts {
            if script.kind != kind {
                return Err(SyncError::Listing {
                    kind,
                    side,
                    source: crate::error::AccessError::Fatal(format!(
                        "listing returned {} {} as {}",
                        script.kind, script.name, kind
                    )),
                });
            }
            if let Err(dup) = objects.insert(script.name.clone(), script) {
                return Err(SyncError::DuplicateName {
                    kind,
                    name: dup.name,
                });
            }
        }
        Ok(objects)
    }

    fn emit(&self, sink: &mut dyn OutputSink, kind: ObjectKind, results: &[DiffResult]) {
        if results.is_empty() {
            return;
        }

        write!(sink, "\n{}\n", BANNER_RULE);
        write!(sink, "-- GENERATE {} SCHEMA \n", kind);
        write!(sink, "{}\n", BANNER_RULE);
        if kind.needs_delimiter() {
            write!(sink, "DELIMITER {}\n", self.delimiter);
        }

        for result in results {
            write!(sink, "\n-- {} ...\n", result.name);
            sink.write_line(&result.sql);
        }

        if kind.needs_delimiter() {
            sink.write_line("\nDELIMITER ;");
        }
    }
}
