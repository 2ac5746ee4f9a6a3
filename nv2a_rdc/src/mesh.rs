//! Convert vertices exported from RenderDoc's mesh viewer to host calls for test programs.
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseCsvError {
    #[error("error reading CSV")]
    Csv(#[from] csv::Error),

    #[error("expected a header row but the file is empty")]
    MissingHeader,
}

const COMPONENTS: [&str; 4] = [".x", ".y", ".z", ".w"];

// Attributes are set before the position since setting the position submits the vertex.
const SETTERS: [(&str, &str); 13] = [
    ("v1", "SetWeight"),
    ("v2", "SetNormal"),
    ("v3", "SetDiffuse"),
    ("v4", "SetSpecular"),
    ("v5", "SetFogCoord"),
    ("v6", "SetPointSize"),
    ("v7", "SetBackDiffuse"),
    ("v8", "SetBackSpecular"),
    ("v9", "SetTexCoord0"),
    ("v10", "SetTexCoord1"),
    ("v11", "SetTexCoord2"),
    ("v12", "SetTexCoord3"),
    ("v0", "SetVertex"),
];

/// A single CSV row with values keyed by the trimmed header names.
pub type Row = IndexMap<String, String>;

/// Parse CSV text with a header row into rows.
/// Quoted fields use `|` and may contain delimiters, newlines, or doubled `||`.
/// Rows with fewer fields than the header only contain the fields that are present.
pub fn parse_rows(text: &str) -> Result<Vec<Row>, ParseCsvError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b',')
        .quote(b'|')
        .flexible(true)
        .from_reader(text.as_bytes());

    let header: Vec<String> = reader
        .headers()?
        .iter()
        .map(|key| key.trim().to_string())
        .collect();
    if header.is_empty() {
        return Err(ParseCsvError::MissingHeader);
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        // Blank lines don't contain any values.
        if record.len() == 1 && record[0].is_empty() {
            continue;
        }
        rows.push(header.iter().cloned().zip(record.iter().map(str::to_string)).collect());
    }
    Ok(rows)
}

/// Find the values for consecutive components of `register` like `v0.x, v0.y, v0.z`.
fn register_values<'a>(row: &'a Row, register: &str) -> Vec<&'a str> {
    COMPONENTS
        .iter()
        .map_while(|c| row.get(&format!("{register}{c}")).map(String::as_str))
        .collect()
}

/// The host calls that submit the vertex in `row`.
pub fn vertex_calls(row: &Row) -> Vec<String> {
    SETTERS
        .iter()
        .filter_map(|(register, setter)| {
            let values = register_values(row, register);
            (!values.is_empty()).then(|| format!("  host_.{setter}({});", values.join(", ")))
        })
        .collect()
}

/// Convert an exported CSV file to host calls with a blank line after each vertex.
pub fn mesh_to_vertices(text: &str) -> Result<String, ParseCsvError> {
    let mut output = String::new();
    for row in parse_rows(text)? {
        for call in vertex_calls(&row) {
            output.push_str(&call);
            output.push('\n');
        }
        output.push('\n');
    }
    Ok(output)
}
