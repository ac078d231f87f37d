//! Declared Arrow schemas of the destination tables.
//!
//! Staging tables keep the CIFF record shape (postings nested under their
//! term); the output tables are the normalized relational split.

use std::sync::Arc;

use arrow_schema::{DataType, Field, Fields, Schema, SchemaRef};

pub const STATS_TABLE: &str = "stats";
pub const DICT_TABLE: &str = "dict";
pub const POSTINGS_TABLE: &str = "postings";
pub const DOCS_TABLE: &str = "docs";
pub const STAGING_POSTINGS_TABLE: &str = "ciff_postings";
pub const STAGING_DOCS_TABLE: &str = "ciff_docs";

/// Every table name an ingestion run creates, in creation order.
pub const ALL_TABLES: [&str; 6] = [
    STATS_TABLE,
    STAGING_POSTINGS_TABLE,
    STAGING_DOCS_TABLE,
    DICT_TABLE,
    POSTINGS_TABLE,
    DOCS_TABLE,
];

pub mod columns {
    pub const TERM: &str = "term";
    pub const TERM_ID: &str = "term_id";
    pub const DF: &str = "df";
    pub const CF: &str = "cf";
    pub const POSTINGS: &str = "postings";
    pub const DOCID: &str = "docid";
    pub const TF: &str = "tf";
    pub const COLLECTION_DOCID: &str = "collection_docid";
    pub const DOCLENGTH: &str = "doclength";
    pub const NAME: &str = "name";
    pub const LEN: &str = "len";
    pub const NUM_DOCS: &str = "num_docs";
    pub const AVGDL: &str = "avgdl";
}

/// Fields of one decoded posting: `(docid: int32, tf: int32)`.
pub fn posting_fields() -> Fields {
    Fields::from(vec![
        Field::new(columns::DOCID, DataType::Int32, false),
        Field::new(columns::TF, DataType::Int32, false),
    ])
}

/// Element field of the nested `postings` list column.
pub fn posting_list_item_field() -> Arc<Field> {
    Arc::new(Field::new_list_field(
        DataType::Struct(posting_fields()),
        false,
    ))
}

/// `ciff_postings(term, term_id, df, cf, postings: list<struct<docid, tf>>)`
pub fn staging_postings_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(columns::TERM, DataType::Utf8, false),
        Field::new(columns::TERM_ID, DataType::Int64, false),
        Field::new(columns::DF, DataType::Int64, false),
        Field::new(columns::CF, DataType::Int64, false),
        Field::new(
            columns::POSTINGS,
            DataType::List(posting_list_item_field()),
            false,
        ),
    ]))
}

/// `ciff_docs(docid: int32, collection_docid: utf8, doclength: int32)`
pub fn staging_docs_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(columns::DOCID, DataType::Int32, false),
        Field::new(columns::COLLECTION_DOCID, DataType::Utf8, false),
        Field::new(columns::DOCLENGTH, DataType::Int32, false),
    ]))
}

/// `stats(num_docs: int64, avgdl: float64)`
pub fn stats_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(columns::NUM_DOCS, DataType::Int64, false),
        Field::new(columns::AVGDL, DataType::Float64, false),
    ]))
}

/// `dict(term_id: int64, term: utf8, df: int64[, cf: int64])`
pub fn dict_schema(include_cf: bool) -> SchemaRef {
    let mut fields = vec![
        Field::new(columns::TERM_ID, DataType::Int64, false),
        Field::new(columns::TERM, DataType::Utf8, false),
        Field::new(columns::DF, DataType::Int64, false),
    ];
    if include_cf {
        fields.push(Field::new(columns::CF, DataType::Int64, false));
    }
    Arc::new(Schema::new(fields))
}

/// `postings(term_id: int64, docid: int32, tf: int32)`
pub fn postings_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(columns::TERM_ID, DataType::Int64, false),
        Field::new(columns::DOCID, DataType::Int32, false),
        Field::new(columns::TF, DataType::Int32, false),
    ]))
}

/// `docs(docid: int64, name: utf8, len: int64)`
pub fn docs_schema() -> SchemaRef {
    Arc::new(Schema::new(vec![
        Field::new(columns::DOCID, DataType::Int64, false),
        Field::new(columns::NAME, DataType::Utf8, false),
        Field::new(columns::LEN, DataType::Int64, false),
    ]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dict_schema_cf_policy() {
        assert_eq!(dict_schema(false).fields().len(), 3);
        let with_cf = dict_schema(true);
        assert_eq!(with_cf.fields().len(), 4);
        assert_eq!(with_cf.field(3).name(), columns::CF);
    }

    #[test]
    fn test_staging_postings_nesting() {
        let schema = staging_postings_schema();
        let postings = schema.field_with_name(columns::POSTINGS).unwrap();
        match postings.data_type() {
            DataType::List(item) => match item.data_type() {
                DataType::Struct(fields) => {
                    assert_eq!(fields.len(), 2);
                    assert_eq!(fields[0].name(), columns::DOCID);
                    assert_eq!(fields[1].name(), columns::TF);
                }
                other => panic!("unexpected item type {other}"),
            },
            other => panic!("unexpected postings type {other}"),
        }
    }
}
