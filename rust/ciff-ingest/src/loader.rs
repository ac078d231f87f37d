//! Bulk loading and relational normalization of a CIFF stream.

use std::{fmt, io::BufRead};

use arrow_schema::{DataType, SchemaRef};
use ciff_common::{Result, error::Error};
use ciff_format::{
    CiffReader,
    tables::{
        ALL_TABLES, DICT_TABLE, DOCS_TABLE, POSTINGS_TABLE, STAGING_DOCS_TABLE,
        STAGING_POSTINGS_TABLE, STATS_TABLE, columns, dict_schema, docs_schema, postings_schema,
        stats_schema,
    },
};
use ciff_store::{
    TableRef, TableStats, TableStore, create_table_from_batches, describe_schema,
    ops::{ColumnProjection, project, unnest},
};
use serde::Serialize;

use crate::{
    batches::{DocsBatchStream, PostingsBatchStream, stats_batch},
    params::LoadParams,
    term_ids::TermIdAssigner,
};

/// Steps of an ingestion run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStep {
    Prepare,
    Stats,
    StagePostings,
    StageDocs,
    Dict,
    Postings,
    Docs,
    DropStaging,
}

impl fmt::Display for LoadStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadStep::Prepare => "prepare destination",
            LoadStep::Stats => "create stats",
            LoadStep::StagePostings => "stage postings",
            LoadStep::StageDocs => "stage docs",
            LoadStep::Dict => "create dict",
            LoadStep::Postings => "unnest postings",
            LoadStep::Docs => "create docs",
            LoadStep::DropStaging => "drop staging tables",
        };
        f.write_str(name)
    }
}

/// Outcome of a successful ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadSummary {
    pub schema_name: String,
    /// Number of postings lists, and of `dict` rows.
    pub terms: u64,
    /// Number of `postings` rows, the sum of `df` over all terms.
    pub postings: u64,
    /// Number of `docs` rows.
    pub docs: u64,
    pub postings_batches: u64,
    pub docs_batches: u64,
    pub num_docs: u64,
    pub avgdl: f64,
}

/// Loads a CIFF stream into a [`TableStore`].
///
/// The run creates, inside the `schema_name` namespace:
/// - `stats(num_docs, avgdl)`: one row from the header.
/// - `ciff_postings`, `ciff_docs`: staging tables filled from the batch
///   streams, dropped at the end.
/// - `dict(term_id, term, df[, cf])`: projected from `ciff_postings`.
/// - `postings(term_id, docid, tf)`: the nested postings of `ciff_postings`,
///   unnested.
/// - `docs(docid, name, len)`: projected and widened from `ciff_docs`.
///
/// A run either leaves all four output tables behind or none: on failure,
/// every table created by the run is dropped again.
pub struct IndexLoader<'a> {
    store: &'a dyn TableStore,
    params: LoadParams,
}

/// Destination objects created by the current run.
#[derive(Default)]
struct LoadRun {
    step: Option<LoadStep>,
    created_namespace: bool,
    created: Vec<TableRef>,
}

impl LoadRun {
    fn enter(&mut self, step: LoadStep) {
        log::info!("Step: {step}");
        self.step = Some(step);
    }
}

impl<'a> IndexLoader<'a> {
    pub fn new(store: &'a dyn TableStore, params: LoadParams) -> Result<IndexLoader<'a>> {
        params.validate()?;
        Ok(IndexLoader { store, params })
    }

    pub fn table(&self, name: &str) -> TableRef {
        TableRef::new(&self.params.schema_name, name)
    }

    /// Runs the whole ingestion of `reader`, which must be positioned right
    /// after the header.
    pub fn load<R: BufRead>(&self, reader: &mut CiffReader<R>) -> Result<LoadSummary> {
        let mut run = LoadRun::default();
        match self.run(reader, &mut run) {
            Ok(summary) => {
                log::info!(
                    "Loaded {} terms, {} postings and {} docs into schema {}",
                    summary.terms,
                    summary.postings,
                    summary.docs,
                    summary.schema_name
                );
                Ok(summary)
            }
            Err(e) => {
                let step = run
                    .step
                    .map_or_else(|| "start".to_string(), |step| step.to_string());
                match e.record_ordinal() {
                    Some(ordinal) => log::error!(
                        "Ingestion failed at step '{step}' ({} phase, record {ordinal}): {e}",
                        e.phase()
                    ),
                    None => log::error!(
                        "Ingestion failed at step '{step}' ({} phase): {e}",
                        e.phase()
                    ),
                }
                self.rollback(&run);
                Err(e)
            }
        }
    }

    fn run<R: BufRead>(&self, reader: &mut CiffReader<R>, run: &mut LoadRun) -> Result<LoadSummary> {
        let store = self.store;
        let params = &self.params;
        let header = reader.header().clone();
        let mut summary = LoadSummary {
            schema_name: params.schema_name.clone(),
            num_docs: reader.num_docs(),
            avgdl: header.average_doclength,
            ..Default::default()
        };

        run.enter(LoadStep::Prepare);
        self.prepare(run)?;

        run.enter(LoadStep::Stats);
        let stats = self.table(STATS_TABLE);
        create_table_from_batches(store, &stats, stats_schema(), vec![stats_batch(&header)?])?;
        run.created.push(stats);

        run.enter(LoadStep::StagePostings);
        let staging_postings = self.table(STAGING_POSTINGS_TABLE);
        let mut postings_stream =
            PostingsBatchStream::new(reader, TermIdAssigner::new(), params.postings_batch_size)?;
        let staged = store.create_table(&staging_postings, &mut postings_stream)?;
        run.created.push(staging_postings.clone());
        summary.terms = postings_stream.terms();
        summary.postings = postings_stream.postings();
        summary.postings_batches = staged.batches;
        let term_ids = postings_stream.into_term_ids();
        expect_rows(&staging_postings, staged, term_ids.assigned())?;

        run.enter(LoadStep::StageDocs);
        let staging_docs = self.table(STAGING_DOCS_TABLE);
        let mut docs_stream = DocsBatchStream::new(reader, params.docs_batch_size)?;
        let staged = store.create_table(&staging_docs, &mut docs_stream)?;
        run.created.push(staging_docs.clone());
        summary.docs = docs_stream.docs();
        summary.docs_batches = staged.batches;
        expect_rows(&staging_docs, staged, summary.num_docs)?;

        run.enter(LoadStep::Dict);
        let dict = self.table(DICT_TABLE);
        let mut dict_columns = vec![
            ColumnProjection::column(columns::TERM_ID),
            ColumnProjection::column(columns::TERM),
            ColumnProjection::column(columns::DF),
        ];
        if params.cf_policy.keeps_cf() {
            dict_columns.push(ColumnProjection::column(columns::CF));
        }
        let created = project(store, &staging_postings, &dict, &dict_columns)?;
        run.created.push(dict.clone());
        self.check_output(&dict, dict_schema(params.cf_policy.keeps_cf()))?;
        expect_rows(&dict, created, summary.terms)?;

        run.enter(LoadStep::Postings);
        let postings = self.table(POSTINGS_TABLE);
        let created = unnest(
            store,
            &staging_postings,
            &postings,
            &[columns::TERM_ID],
            columns::POSTINGS,
        )?;
        run.created.push(postings.clone());
        self.check_output(&postings, postings_schema())?;
        expect_rows(&postings, created, summary.postings)?;

        run.enter(LoadStep::Docs);
        let docs = self.table(DOCS_TABLE);
        let created = project(
            store,
            &staging_docs,
            &docs,
            &[
                ColumnProjection::column(columns::DOCID).cast_to(DataType::Int64),
                ColumnProjection::renamed(columns::COLLECTION_DOCID, columns::NAME),
                ColumnProjection::renamed(columns::DOCLENGTH, columns::LEN)
                    .cast_to(DataType::Int64),
            ],
        )?;
        run.created.push(docs.clone());
        self.check_output(&docs, docs_schema())?;
        expect_rows(&docs, created, summary.num_docs)?;

        run.enter(LoadStep::DropStaging);
        for staging in [staging_postings, staging_docs] {
            store.drop_table(&staging)?;
            run.created.retain(|t| *t != staging);
        }
        Ok(summary)
    }

    /// Ensures the namespace exists and none of the run's table names are
    /// taken.
    fn prepare(&self, run: &mut LoadRun) -> Result<()> {
        let namespace = &self.params.schema_name;
        if self.store.namespace_exists(namespace)? {
            if self.params.replace_existing {
                log::warn!("Dropping existing schema {namespace}");
                self.store.drop_namespace(namespace)?;
            } else {
                for name in ALL_TABLES {
                    let table = self.table(name);
                    if self.store.table_exists(&table)? {
                        return Err(Error::name_collision(table.to_string()));
                    }
                }
                return Ok(());
            }
        }
        self.store.create_namespace(namespace)?;
        run.created_namespace = true;
        log::info!("Created schema {namespace}");
        Ok(())
    }

    fn check_output(&self, table: &TableRef, expected: SchemaRef) -> Result<()> {
        let actual = self.store.table_schema(table)?;
        if actual.fields() != expected.fields() {
            return Err(Error::schema_mismatch(
                table.to_string(),
                describe_schema(&expected),
                describe_schema(&actual),
            ));
        }
        Ok(())
    }

    /// Drops everything the failed run created. Errors are logged, the
    /// original failure is what the caller sees.
    fn rollback(&self, run: &LoadRun) {
        if run.created_namespace {
            log::warn!("Rolling back: dropping schema {}", self.params.schema_name);
            if let Err(e) = self.store.drop_namespace(&self.params.schema_name) {
                log::error!("Rollback of schema {} failed: {e}", self.params.schema_name);
            }
            return;
        }
        for table in run.created.iter().rev() {
            log::warn!("Rolling back: dropping table {table}");
            if let Err(e) = self.store.drop_table(table) {
                log::error!("Rollback of table {table} failed: {e}");
            }
        }
    }
}

fn expect_rows(table: &TableRef, stats: TableStats, expected: u64) -> Result<()> {
    if stats.rows != expected {
        return Err(Error::invalid_operation(format!(
            "row count check of {table}: expected {expected} rows, got {}",
            stats.rows
        )));
    }
    Ok(())
}
