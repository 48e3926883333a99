//! Result shaping — from raw rows to the bounded payload the agent sees.
//!
//! The shaper owns the total-count vs. visible-count semantics: `totalCount`
//! always reflects the full match count, `results` holds at most the
//! effective limit of rows in executor order, and `limited` is the caller's
//! sole signal that more data exists. The schema is inferred from the
//! returned rows, not from a catalog, because the caller may not have one.

use serde_json::Value;
use tableward_core::{
    ColumnDescriptor, DEFAULT_LIMIT, InferredType, NO_LIMIT, Row, ShapingError,
};

/// Maximum sample values retained per column.
const MAX_SAMPLES: usize = 3;

/// Shaped rows plus the derived bookkeeping, ready to assemble into a
/// `QueryResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct Shaped {
    pub results: Vec<Row>,
    pub schema: Vec<ColumnDescriptor>,
    pub total_count: usize,
    pub returned_count: usize,
    pub limited: bool,
}

/// Resolve the caller's limit against the full match count.
///
/// `-1` means every row; an omitted limit means 10; anything else is clamped
/// at zero.
pub fn effective_limit(limit: Option<i64>, total_count: usize) -> usize {
    match limit {
        None => DEFAULT_LIMIT as usize,
        Some(NO_LIMIT) => total_count,
        Some(n) => n.max(0) as usize,
    }
}

/// Truncate and describe one result set.
///
/// `rows` must be the full match set (`rows.len() == total_count`) for
/// reads, or empty with `total_count` carrying the affected-row count for
/// writes. A `rows`/`total_count` inconsistency is an internal invariant
/// breach and returns `ShapingError` instead of inconsistent counts.
pub fn shape(
    columns: &[String],
    rows: Vec<Row>,
    total_count: usize,
    limit: Option<i64>,
) -> Result<Shaped, ShapingError> {
    debug_assert!(
        rows.len() <= total_count,
        "shaper received {} rows but total_count {}",
        rows.len(),
        total_count
    );
    if rows.len() > total_count {
        return Err(ShapingError::CountMismatch {
            returned: rows.len(),
            total: total_count,
        });
    }

    let effective = effective_limit(limit, total_count);
    let mut results = rows;
    results.truncate(effective);

    let schema = infer_schema(columns, &results);
    let returned_count = results.len();

    Ok(Shaped {
        results,
        schema,
        total_count,
        returned_count,
        limited: returned_count < total_count,
    })
}

/// Derive column descriptors from the returned rows.
///
/// Inference looks only at the rows the caller will actually see. Empty
/// results produce an empty schema, not an error.
pub fn infer_schema(columns: &[String], results: &[Row]) -> Vec<ColumnDescriptor> {
    if results.is_empty() {
        return Vec::new();
    }

    columns
        .iter()
        .map(|name| {
            let mut samples: Vec<Value> = Vec::new();
            let mut all_numeric = true;
            let mut all_boolean = true;
            let mut observed_any = false;

            for row in results {
                let Some(value) = row.get(name) else {
                    continue;
                };
                if value.is_null() {
                    continue;
                }
                observed_any = true;
                all_numeric = all_numeric && is_numeric(value);
                all_boolean = all_boolean && is_boolean_like(value);
                if samples.len() < MAX_SAMPLES && !samples.contains(value) {
                    samples.push(value.clone());
                }
            }

            let inferred_type = if !observed_any {
                InferredType::String
            } else if all_boolean {
                InferredType::Boolean
            } else if all_numeric {
                InferredType::Number
            } else {
                InferredType::String
            };

            ColumnDescriptor {
                name: name.clone(),
                inferred_type,
                sample_values: samples,
            }
        })
        .collect()
}

fn is_numeric(value: &Value) -> bool {
    match value {
        Value::Number(_) => true,
        Value::String(s) => s.trim().parse::<f64>().is_ok(),
        _ => false,
    }
}

fn is_boolean_like(value: &Value) -> bool {
    match value {
        Value::Bool(_) => true,
        Value::String(s) => {
            let lower = s.trim().to_ascii_lowercase();
            lower == "true" || lower == "false"
        }
        _ => false,
    }
}
