use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Document;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Filter {
    Eq(String, Value),
    NotEq(String, Value),
    ArrayContains(String, Value),
}

impl Filter {
    pub fn eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::Eq(field.to_string(), value.into())
    }

    pub fn not_eq(field: &str, value: impl Into<Value>) -> Self {
        Filter::NotEq(field.to_string(), value.into())
    }

    pub fn array_contains(field: &str, value: impl Into<Value>) -> Self {
        Filter::ArrayContains(field.to_string(), value.into())
    }

    /// Missing fields never match, and `NotEq` also skips nulls.
    pub fn matches(&self, doc: &Document) -> bool {
        match self {
            Filter::Eq(field, value) => doc.get(field) == Some(value),
            Filter::NotEq(field, value) => match doc.get(field) {
                Some(Value::Null) | None => false,
                Some(found) => found != value,
            },
            Filter::ArrayContains(field, value) => match doc.get(field) {
                Some(Value::Array(items)) => items.contains(value),
                _ => false,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBy {
    pub field: String,
    pub direction: Direction,
}

/// Position of a result document inside a sorted query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cursor {
    pub id: String,
    pub key: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Query {
    pub collection: String,
    pub filters: Vec<Filter>,
    pub order_by: Option<OrderBy>,
    pub start_after: Option<Cursor>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new(collection: impl Into<String>) -> Self {
        Query {
            collection: collection.into(),
            filters: Vec::new(),
            order_by: None,
            start_after: None,
            limit: None,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order_by(mut self, field: &str, direction: Direction) -> Self {
        self.order_by = Some(OrderBy {
            field: field.to_string(),
            direction,
        });
        self
    }

    pub fn start_after(mut self, cursor: Cursor) -> Self {
        self.start_after = Some(cursor);
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Cursor pointing at `doc` under this query's ordering.
    pub fn cursor_for(&self, doc: &Document) -> Cursor {
        let key = match &self.order_by {
            Some(order) => doc.get(&order.field).cloned().unwrap_or(Value::Null),
            None => Value::Null,
        };
        Cursor {
            id: doc.id.clone(),
            key,
        }
    }

    /// Evaluate the query over every document of its collection.
    pub fn run(&self, docs: Vec<Document>) -> Vec<Document> {
        let mut matched: Vec<Document> = docs
            .into_iter()
            .filter(|doc| self.filters.iter().all(|f| f.matches(doc)))
            .filter(|doc| match &self.order_by {
                Some(order) => doc.get(&order.field).is_some(),
                None => true,
            })
            .collect();

        matched.sort_by(|a, b| self.compare(&self.sort_key(a), &a.id, &self.sort_key(b), &b.id));

        if let Some(cursor) = &self.start_after {
            matched.retain(|doc| {
                self.compare(&self.sort_key(doc), &doc.id, &cursor.key, &cursor.id)
                    == Ordering::Greater
            });
        }

        if let Some(limit) = self.limit {
            matched.truncate(limit);
        }
        matched
    }

    fn sort_key(&self, doc: &Document) -> Value {
        match &self.order_by {
            Some(order) => doc.get(&order.field).cloned().unwrap_or(Value::Null),
            None => Value::Null,
        }
    }

    fn compare(&self, key_a: &Value, id_a: &str, key_b: &Value, id_b: &str) -> Ordering {
        let ord = compare_values(key_a, key_b).then_with(|| id_a.cmp(id_b));
        match self.order_by.as_ref().map(|o| o.direction) {
            Some(Direction::Descending) => ord.reverse(),
            _ => ord,
        }
    }
}

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

/// Total order over JSON values: nulls, booleans, numbers, strings, arrays, objects.
pub fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => {
                let x = x.as_f64().unwrap_or(f64::NAN);
                let y = y.as_f64().unwrap_or(f64::NAN);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
        },
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Array(x), Value::Array(y)) => {
            for (left, right) in x.iter().zip(y.iter()) {
                let ord = compare_values(left, right);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            x.len().cmp(&y.len())
        }
        _ => type_rank(a).cmp(&type_rank(b)),
    }
}
