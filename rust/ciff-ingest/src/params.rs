use ciff_common::{Result, verify_arg};
use ciff_store::validate_name;
use serde::{Deserialize, Serialize};

/// Default destination namespace.
pub const DEFAULT_SCHEMA_NAME: &str = "ows";
/// Default number of postings lists per postings batch.
pub const DEFAULT_POSTINGS_BATCH_SIZE: usize = 4096;
/// Default number of documents per docs batch.
pub const DEFAULT_DOCS_BATCH_SIZE: usize = 128 * 1024;

/// Whether the `dict` table keeps the collection frequency column.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CfPolicy {
    /// `dict(term_id, term, df)`
    #[default]
    Drop,
    /// `dict(term_id, term, df, cf)`
    Keep,
}

impl CfPolicy {
    pub fn keeps_cf(&self) -> bool {
        matches!(self, CfPolicy::Keep)
    }
}

/// Parameters of one ingestion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadParams {
    /// Destination namespace holding the output tables.
    pub schema_name: String,
    pub postings_batch_size: usize,
    pub docs_batch_size: usize,
    pub cf_policy: CfPolicy,
    /// Drop an existing destination namespace, with all its tables, instead
    /// of failing with a name collision.
    pub replace_existing: bool,
}

impl Default for LoadParams {
    fn default() -> Self {
        LoadParams {
            schema_name: DEFAULT_SCHEMA_NAME.to_string(),
            postings_batch_size: DEFAULT_POSTINGS_BATCH_SIZE,
            docs_batch_size: DEFAULT_DOCS_BATCH_SIZE,
            cf_policy: CfPolicy::Drop,
            replace_existing: false,
        }
    }
}

impl LoadParams {
    pub fn validate(&self) -> Result<()> {
        validate_name("schema_name", &self.schema_name)?;
        verify_arg!(postings_batch_size, self.postings_batch_size > 0);
        verify_arg!(docs_batch_size, self.docs_batch_size > 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let params = LoadParams::default();
        assert_eq!(params.schema_name, "ows");
        assert!(params.postings_batch_size < params.docs_batch_size);
        assert!(!params.cf_policy.keeps_cf());
        params.validate().unwrap();
    }

    #[test]
    fn test_partial_json() {
        let params: LoadParams =
            serde_json::from_str(r#"{"cf_policy": "keep", "docs_batch_size": 10}"#).unwrap();
        assert_eq!(params.cf_policy, CfPolicy::Keep);
        assert_eq!(params.docs_batch_size, 10);
        assert_eq!(params.postings_batch_size, DEFAULT_POSTINGS_BATCH_SIZE);
    }

    #[test]
    fn test_validate() {
        let params = LoadParams {
            postings_batch_size: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = LoadParams {
            schema_name: "bad name".into(),
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
