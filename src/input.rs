//! Worklist loading
//!
//! Reads the first column of a comma-separated file into an ordered list of
//! identifiers. Duplicates are kept; each occurrence is fetched independently.

use crate::error::{Error, Result};
use crate::types::ProductId;
use std::path::Path;

/// Load identifiers from the first column of a CSV file
///
/// When `has_header` is set the first non-blank line is skipped.
pub fn load_identifiers(path: &Path, has_header: bool) -> Result<Vec<ProductId>> {
    let contents = std::fs::read_to_string(path).map_err(|source| Error::InputUnreadable {
        path: path.to_path_buf(),
        source,
    })?;
    let ids = parse_identifiers(&contents, has_header);
    tracing::info!(path = %path.display(), count = ids.len(), "Loaded identifier list");
    Ok(ids)
}

/// Parse identifiers from CSV text (first column only)
pub fn parse_identifiers(contents: &str, has_header: bool) -> Vec<ProductId> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .skip(usize::from(has_header))
        .filter_map(first_column)
        .map(ProductId::new)
        .collect()
}

fn first_column(line: &str) -> Option<String> {
    let line = line.trim_start_matches('\u{feff}');
    let field = if let Some(rest) = line.strip_prefix('"') {
        // Quoted field: runs to the next unescaped quote
        let mut value = String::new();
        let mut chars = rest.chars().peekable();
        while let Some(c) = chars.next() {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    value.push('"');
                    chars.next();
                } else {
                    break;
                }
            } else {
                value.push(c);
            }
        }
        value
    } else {
        line.split(',').next().unwrap_or_default().to_string()
    };

    let field = field.trim();
    if field.is_empty() {
        return None;
    }
    Some(normalize_integer_key(field).to_string())
}

/// Spreadsheet exports write integer keys as `123.0`
fn normalize_integer_key(field: &str) -> &str {
    match field.strip_suffix(".0") {
        Some(int) if !int.is_empty() && int.bytes().all(|b| b.is_ascii_digit()) => int,
        _ => field,
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ids(list: &[ProductId]) -> Vec<&str> {
        list.iter().map(ProductId::as_str).collect()
    }

    #[test]
    fn takes_first_column_and_skips_header() {
        let csv = "id,name\n101,foo\n102,bar\n";
        assert_eq!(ids(&parse_identifiers(csv, true)), ["101", "102"]);
    }

    #[test]
    fn without_header_keeps_first_line() {
        let csv = "101\n102\n";
        assert_eq!(ids(&parse_identifiers(csv, false)), ["101", "102"]);
    }

    #[test]
    fn keeps_duplicates_in_order() {
        let csv = "id\n5\n3\n5\n";
        assert_eq!(ids(&parse_identifiers(csv, true)), ["5", "3", "5"]);
    }

    #[test]
    fn skips_blank_lines_and_empty_fields() {
        let csv = "id\n\n  \n7\n,orphan\n8\r\n";
        assert_eq!(ids(&parse_identifiers(csv, true)), ["7", "8"]);
    }

    #[test]
    fn unquotes_and_normalizes_float_keys() {
        let csv = "\u{feff}\"id\"\n\"42\",x\n43.0\n\"a,\"\"b\"\"\",y\n1.5\n";
        assert_eq!(
            ids(&parse_identifiers(csv, true)),
            ["42", "43", "a,\"b\"", "1.5"]
        );
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "id").unwrap();
        writeln!(file, "1").unwrap();
        writeln!(file, "2").unwrap();

        let list = load_identifiers(file.path(), true).unwrap();
        assert_eq!(ids(&list), ["1", "2"]);
    }

    #[test]
    fn missing_file_is_input_unreadable() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_identifiers(&dir.path().join("missing.csv"), true).unwrap_err();
        assert!(matches!(err, Error::InputUnreadable { .. }));
    }
}
