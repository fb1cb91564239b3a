//! The discrepancy metric.

use serde_json::Value;

/// Score the divergence between two state snapshots on [0, 1].
///
/// Field-wise over the union of top-level keys of both objects:
/// - numeric fields cost `|a - b| / max(|a|, |b|)`, clamped to [0, 1];
/// - any other mismatch (string, bool, null, nested structure) costs 1;
/// - a field present on only one side costs 1;
/// - equal fields cost 0.
///
/// The score is the mean cost over the union; an empty union scores 0.
/// Non-object snapshots degrade to strict equality (0 or 1).
pub fn discrepancy_score(local: &Value, canonical: &Value) -> f64 {
    let (Value::Object(local), Value::Object(canonical)) = (local, canonical) else {
        return if local == canonical { 0.0 } else { 1.0 };
    };

    let mut fields: Vec<&String> = local.keys().chain(canonical.keys()).collect();
    fields.sort_unstable();
    fields.dedup();
    if fields.is_empty() {
        return 0.0;
    }

    let total: f64 = fields
        .iter()
        .map(|field| match (local.get(*field), canonical.get(*field)) {
            (Some(a), Some(b)) => field_cost(a, b),
            _ => 1.0,
        })
        .sum();
    total / fields.len() as f64
}

fn field_cost(a: &Value, b: &Value) -> f64 {
    if a == b {
        return 0.0;
    }
    match (a.as_f64(), b.as_f64()) {
        (Some(x), Some(y)) => {
            let denom = x.abs().max(y.abs());
            if denom == 0.0 {
                0.0
            } else {
                ((x - y).abs() / denom).clamp(0.0, 1.0)
            }
        }
        _ => 1.0,
    }
}
