use std::cmp::Ordering;
use std::collections::HashMap;

use mongodb::bson::{oid::ObjectId, Bson, Document};
use rocket::tokio::sync::Mutex;

use crate::error::{Error, Result};

use super::{Id, Store};

/// An in-process store. Each operation holds the lock for its whole duration,
/// so every operation is atomic with respect to every other.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[rocket::async_trait]
impl Store for MemoryStore {
    async fn find_one(
        &self,
        kind: &str,
        filter: Document,
        sort: Option<Document>,
    ) -> Result<Option<Document>> {
        let collections = self.collections.lock().await;
        let mut matching = collections
            .get(kind)
            .into_iter()
            .flatten()
            .filter(|record| matches(record, &filter))
            .collect::<Vec<_>>();
        if let Some(sort) = sort {
            matching.sort_by(|a, b| compare_by(a, b, &sort));
        }
        Ok(matching.first().map(|record| (*record).clone()))
    }

    async fn find_many(&self, kind: &str, filter: Document) -> Result<Vec<Document>> {
        let collections = self.collections.lock().await;
        Ok(collections
            .get(kind)
            .into_iter()
            .flatten()
            .filter(|record| matches(record, &filter))
            .cloned()
            .collect())
    }

    async fn insert(&self, kind: &str, mut record: Document) -> Result<Id> {
        let id = match record.get("_id") {
            Some(Bson::ObjectId(id)) => *id,
            Some(other) => {
                return Err(Error::Internal(format!(
                    "Record `_id` must be an object ID, got {other}"
                )))
            }
            None => {
                let id = ObjectId::new();
                record.insert("_id", id);
                id
            }
        };
        let mut collections = self.collections.lock().await;
        let records = collections.entry(kind.to_string()).or_default();
        if records.iter().any(|r| r.get("_id") == Some(&Bson::ObjectId(id))) {
            return Err(Error::Internal(format!("Duplicate `_id` {id} in {kind}")));
        }
        records.push(record);
        Ok(id.into())
    }

    async fn update_one(&self, kind: &str, filter: Document, set: Document) -> Result<u64> {
        let mut collections = self.collections.lock().await;
        let target = collections
            .get_mut(kind)
            .and_then(|records| records.iter_mut().find(|record| matches(record, &filter)));
        match target {
            Some(record) => {
                apply(record, set);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn upsert(&self, kind: &str, filter: Document, set: Document) -> Result<()> {
        let mut collections = self.collections.lock().await;
        let records = collections.entry(kind.to_string()).or_default();
        if let Some(record) = records.iter_mut().find(|record| matches(record, &filter)) {
            apply(record, set);
        } else {
            let mut record = Document::new();
            record.insert("_id", ObjectId::new());
            apply(&mut record, filter);
            apply(&mut record, set);
            records.push(record);
        }
        Ok(())
    }

    async fn count(&self, kind: &str, filter: Document) -> Result<u64> {
        let collections = self.collections.lock().await;
        let count = collections
            .get(kind)
            .into_iter()
            .flatten()
            .filter(|record| matches(record, &filter))
            .count();
        Ok(count as u64)
    }

    async fn group_count(&self, kind: &str, key: &str) -> Result<Vec<(Bson, u64)>> {
        let collections = self.collections.lock().await;
        // `Bson` is not `Hash`, and groups must come out in first-seen order anyway.
        let mut groups: Vec<(Bson, u64)> = Vec::new();
        for record in collections.get(kind).into_iter().flatten() {
            let value = record.get(key).cloned().unwrap_or(Bson::Null);
            match groups.iter_mut().find(|(group, _)| *group == value) {
                Some((_, count)) => *count += 1,
                None => groups.push((value, 1)),
            }
        }
        Ok(groups)
    }

    async fn collection_names(&self) -> Result<Vec<String>> {
        let collections = self.collections.lock().await;
        let mut names = collections.keys().cloned().collect::<Vec<_>>();
        names.sort();
        Ok(names)
    }
}

/// Whether `record` satisfies every equality constraint in `filter`.
fn matches(record: &Document, filter: &Document) -> bool {
    filter
        .iter()
        .all(|(field, expected)| record.get(field).unwrap_or(&Bson::Null) == expected)
}

/// Overwrite the fields of `record` named in `set`.
fn apply(record: &mut Document, set: Document) {
    for (field, value) in set {
        record.insert(field, value);
    }
}

/// Order two records by the keys of a sort document, falling back to
/// insertion order (the sort is stable) when all keys are equal.
fn compare_by(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let ordering = compare_values(a.get(field), b.get(field));
        let ordering = match direction {
            Bson::Int32(d) if *d < 0 => ordering.reverse(),
            Bson::Int64(d) if *d < 0 => ordering.reverse(),
            _ => ordering,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (Some(Bson::DateTime(a)), Some(Bson::DateTime(b))) => a.cmp(b),
        (Some(Bson::ObjectId(a)), Some(Bson::ObjectId(b))) => a.cmp(b),
        (Some(Bson::String(a)), Some(Bson::String(b))) => a.cmp(b),
        (Some(Bson::Boolean(a)), Some(Bson::Boolean(b))) => a.cmp(b),
        (Some(a), Some(b)) => match (as_number(a), as_number(b)) {
            (Some(a), Some(b)) => a.partial_cmp(&b).unwrap_or(Ordering::Equal),
            _ => Ordering::Equal,
        },
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn as_number(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(n) => Some(f64::from(*n)),
        Bson::Int64(n) => Some(*n as f64),
        Bson::Double(n) => Some(*n),
        _ => None,
    }
}
