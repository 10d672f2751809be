use std::cmp::Ordering;

use serde_json::{Map, Value};

use super::filter::Filter;
use super::types::{Condition, FilterOp, FilterWhereInfo, SortDirection};

/// Evaluates a parsed filter against in-memory documents, mirroring the SQL the
/// same filter compiles to. Missing fields behave like JSON `null`.
pub fn matches(condition: &Condition, doc: &Map<String, Value>) -> bool {
    match condition {
        Condition::All(parts) => parts.iter().all(|c| matches(c, doc)),
        Condition::Any(parts) => parts.iter().any(|c| matches(c, doc)),
        Condition::Not(inner) => !matches(inner, doc),
        Condition::Field(info) => matches_field(info, doc.get(&info.field).unwrap_or(&Value::Null)),
    }
}

fn matches_field(info: &FilterWhereInfo, value: &Value) -> bool {
    match info.operator {
        FilterOp::Eq => values_equal(value, &info.data),
        FilterOp::Ne => !values_equal(value, &info.data),
        FilterOp::Gt => ordered(value, &info.data).is_some_and(|o| o == Ordering::Greater),
        FilterOp::Gte => ordered(value, &info.data).is_some_and(|o| o != Ordering::Less),
        FilterOp::Lt => ordered(value, &info.data).is_some_and(|o| o == Ordering::Less),
        FilterOp::Lte => ordered(value, &info.data).is_some_and(|o| o != Ordering::Greater),
        FilterOp::In => info
            .data
            .as_array()
            .is_some_and(|candidates| candidates.iter().any(|c| values_equal(value, c))),
        FilterOp::NIn => info
            .data
            .as_array()
            .map_or(true, |candidates| !candidates.iter().any(|c| values_equal(value, c))),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// Range comparison; only numbers with numbers and strings with strings are comparable
fn ordered(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Total order used for sorting: null < bool < number < string < everything else
fn sort_key_cmp(a: &Value, b: &Value) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }
    ordered(a, b).unwrap_or_else(|| rank(a).cmp(&rank(b)))
}

/// Apply filter, order, offset and limit to a slice of documents
pub fn apply(filter: &Filter, docs: &[Map<String, Value>]) -> Vec<Map<String, Value>> {
    let mut selected: Vec<Map<String, Value>> = docs
        .iter()
        .filter(|doc| matches(filter.condition(), doc))
        .cloned()
        .collect();

    if !filter.order_data().is_empty() {
        selected.sort_by(|a, b| {
            for info in filter.order_data() {
                let left = a.get(&info.field).unwrap_or(&Value::Null);
                let right = b.get(&info.field).unwrap_or(&Value::Null);
                let ord = match info.sort {
                    SortDirection::Asc => sort_key_cmp(left, right),
                    SortDirection::Desc => sort_key_cmp(right, left),
                };
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }

    let offset = filter.offset_value().unwrap_or(0).max(0) as usize;
    let limit = filter.limit_value().map(|l| l.max(0) as usize).unwrap_or(usize::MAX);
    selected.into_iter().skip(offset).take(limit).collect()
}
