//! Assertions over the files a run leaves behind

use std::path::Path;

use product_harvest::{ErrorCategory, ProductRecord, Summary};

/// Read every `products_<n>.json` in `dir`, sorted by index
pub fn read_batches(dir: &Path) -> Vec<(u32, Vec<ProductRecord>)> {
    let mut batches: Vec<(u32, Vec<ProductRecord>)> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("reading {}: {e}", dir.display()))
        .filter_map(|entry| {
            let path = entry.ok()?.path();
            let name = path.file_name()?.to_str()?.to_string();
            let index: u32 = name
                .strip_prefix("products_")?
                .strip_suffix(".json")?
                .parse()
                .ok()?;
            let text = std::fs::read_to_string(&path).ok()?;
            let records: Vec<ProductRecord> = serde_json::from_str(&text)
                .unwrap_or_else(|e| panic!("{} is not a record array: {e}", path.display()));
            Some((index, records))
        })
        .collect();
    batches.sort_by_key(|(index, _)| *index);
    batches
}

/// Batch indices run 1..=n and all but the last batch are full
pub fn assert_contiguous_batches(batches: &[(u32, Vec<ProductRecord>)], batch_size: usize) {
    for (position, (index, records)) in batches.iter().enumerate() {
        assert_eq!(*index as usize, position + 1, "batch indices must be contiguous from 1");
        assert!(records.len() <= batch_size, "batch {index} exceeds {batch_size}");
        if position + 1 < batches.len() {
            assert_eq!(records.len(), batch_size, "batch {index} sealed before it was full");
        }
        assert!(!records.is_empty(), "batch {index} is empty");
    }
}

/// Lines of `<dir>/<category>.txt`
pub fn read_line_log(dir: &Path, category: ErrorCategory) -> Vec<String> {
    let path = dir.join(format!("{category}.txt"));
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("reading {}: {e}", path.display()))
        .lines()
        .map(str::to_string)
        .collect()
}

/// Successes plus errors account for every identifier
pub fn assert_reconciled(summary: &Summary, attempted: usize) {
    assert_eq!(summary.attempted, attempted);
    assert_eq!(
        summary.total_success + summary.total_errors,
        attempted,
        "summary does not conserve identifiers: {summary:?}"
    );
    assert_eq!(
        summary.per_category.values().sum::<usize>(),
        summary.total_errors
    );
}
