use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

const ATTRIBUTE_PREFIX: &str = "_lf_attributes/";
const RESOURCE_ATTRIBUTE_PREFIX: &str = "_lf_otel_resource_attributes/";

/// One row of `SHOW COLUMNS FROM records`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaRow {
    pub column_name: String,
    pub data_type: String,
    /// "YES" or "NO"
    pub is_nullable: String,
}

impl SchemaRow {
    pub fn new(column_name: &str, data_type: &str, nullable: bool) -> Self {
        Self {
            column_name: column_name.to_string(),
            data_type: data_type.to_string(),
            is_nullable: if nullable { "YES" } else { "NO" }.to_string(),
        }
    }

    fn not_null_suffix(&self) -> &'static str {
        if self.is_nullable == "NO" {
            " IS NOT NULL"
        } else {
            ""
        }
    }
}

/// `Dictionary(Int32, Utf8)` is an encoding detail; only the value type matters
fn remove_dictionary_encoding(data_type: &str) -> String {
    static DICTIONARY: OnceLock<Option<Regex>> = OnceLock::new();
    match DICTIONARY.get_or_init(|| Regex::new(r"Dictionary\([^,]+, ([^,]+)\)").ok()) {
        Some(re) => re.replace_all(data_type, "$1").into_owned(),
        None => data_type.to_string(),
    }
}

/// Render the records table schema as pseudo-DDL plus attribute listings.
///
/// JSON attribute columns (`_lf_attributes/<path>`) are listed by their
/// dotted sub-field name as `attributes->>'<path>'`.
pub fn build_schema_description(rows: &[SchemaRow]) -> String {
    let mut columns = Vec::new();
    let mut attributes = Vec::new();
    let mut resource_attributes = Vec::new();

    for row in rows {
        let data_type = remove_dictionary_encoding(&row.data_type);
        let modifier = row.not_null_suffix();

        if let Some(name) = row.column_name.strip_prefix(ATTRIBUTE_PREFIX) {
            attributes.push(format!(
                "* attributes->>'{}' (type: {}{})",
                name, data_type, modifier
            ));
        } else if let Some(name) = row.column_name.strip_prefix(RESOURCE_ATTRIBUTE_PREFIX) {
            resource_attributes.push(format!(
                "* otel_resource_attributes->>'{}' (type: {}{})",
                name, data_type, modifier
            ));
        } else {
            columns.push(format!("    {} {}{}", row.column_name, data_type, modifier));
        }
    }

    format!(
        r#"Columns of the Logfire `records` table, from "SHOW COLUMNS FROM records".
Shown as pseudo-Postgres DDL; the database is DataFusion, but JSON columns support the `->` and `->>` operators.

CREATE TABLE records AS (
{columns}
)

The `attributes` column behaves like Postgres JSONB. Besides arbitrary user fields it carries these semantic-convention fields:
{attributes}

And `otel_resource_attributes`:
{resource_attributes}
"#,
        columns = columns.join(",\n"),
        attributes = attributes.join("\n"),
        resource_attributes = resource_attributes.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dictionary_encoding_removed() {
        assert_eq!(remove_dictionary_encoding("Dictionary(Int32, Utf8)"), "Utf8");
        assert_eq!(remove_dictionary_encoding("Utf8"), "Utf8");
    }

    #[test]
    fn test_schema_description_sections() {
        let rows = vec![
            SchemaRow::new("trace_id", "Utf8", false),
            SchemaRow::new("span_name", "Dictionary(Int32, Utf8)", true),
            SchemaRow::new("_lf_attributes/gen_ai.request.model", "Utf8", true),
            SchemaRow::new("_lf_otel_resource_attributes/service.name", "Utf8", false),
        ];

        let description = build_schema_description(&rows);

        assert!(description.contains("CREATE TABLE records AS (\n    trace_id Utf8 IS NOT NULL,\n    span_name Utf8\n)"));
        assert!(description.contains("* attributes->>'gen_ai.request.model' (type: Utf8)"));
        assert!(description
            .contains("* otel_resource_attributes->>'service.name' (type: Utf8 IS NOT NULL)"));
    }

    #[test]
    fn test_schema_row_deserializes_extra_columns() {
        let row: SchemaRow = serde_json::from_str(
            r#"{"column_name":"kind","data_type":"Utf8","is_nullable":"NO","table_name":"records","table_catalog":"x","table_schema":"public"}"#,
        )
        .unwrap();
        assert_eq!(row, SchemaRow::new("kind", "Utf8", false));
    }
}
