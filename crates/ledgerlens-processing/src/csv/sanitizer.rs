//! Formula-injection neutralization for exported CSV
//!
//! Spreadsheet apps evaluate cells starting with `=`, `+`, `-` or `@`, and some
//! treat a leading tab or carriage return the same way. Such cells get a leading
//! single quote so they render as text.

const FORMULA_TRIGGERS: [char; 6] = ['=', '+', '-', '@', '\t', '\r'];

pub fn sanitize_field(value: Option<&str>) -> String {
    match value {
        None | Some("") => String::new(),
        Some(v) if v.starts_with(FORMULA_TRIGGERS) => format!("'{}", v),
        Some(v) => v.to_string(),
    }
}

pub fn sanitize_row<S: AsRef<str>>(row: &[Option<S>]) -> Vec<String> {
    row.iter()
        .map(|field| sanitize_field(field.as_ref().map(|f| f.as_ref())))
        .collect()
}

pub fn sanitize_table<S: AsRef<str>>(rows: &[Vec<Option<S>>]) -> Vec<Vec<String>> {
    rows.iter().map(|row| sanitize_row(row)).collect()
}

/// Wrap in double quotes when the field holds a comma, quote, CR or LF
pub fn quote_field(field: &str) -> String {
    if field.contains([',', '"', '\r', '\n']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

/// Sanitize every field, then quote, then join lines with `\n`.
pub fn render<S: AsRef<str>>(rows: &[Vec<Option<S>>]) -> String {
    sanitize_table(rows)
        .iter()
        .map(|row| {
            row.iter()
                .map(|field| quote_field(field))
                .collect::<Vec<_>>()
                .join(",")
        })
        .collect::<Vec<_>>()
        .join("\n")
}
