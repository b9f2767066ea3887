//! In-process document store
//!
//! Applies the same filter, sort and grouping rules as the PostgreSQL
//! store. Used by the test suites and by `DATABASE_BACKEND=memory`.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{DocumentStore, NumericStats, StoredDocument};
use crate::document::CollectionSchema;
use crate::query::{Filter, Sort, SortDirection, CREATED_AT};
use crate::{NewsdeskError, Result};

type Table = HashMap<Uuid, StoredDocument>;

#[derive(Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<&'static str, Table>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn matching(&self, schema: &CollectionSchema, filter: &Filter) -> Vec<StoredDocument> {
        let collections = self.collections.read().await;
        collections
            .get(schema.name)
            .map(|table| {
                table
                    .values()
                    .filter(|doc| filter.matches(doc))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Case-insensitive text used for unique comparisons
fn unique_key(doc: &StoredDocument, field: &str) -> Option<String> {
    doc.body
        .get(field)
        .and_then(Value::as_str)
        .map(str::to_lowercase)
}

fn check_unique(schema: &CollectionSchema, table: &Table, doc: &StoredDocument) -> Result<()> {
    for field in schema.unique {
        let Some(key) = unique_key(doc, field) else {
            continue;
        };
        let clash = table
            .values()
            .any(|other| other.id != doc.id && unique_key(other, field).as_deref() == Some(&key));
        if clash {
            return Err(NewsdeskError::Conflict(format!(
                "{} with this {field} already exists",
                schema.name
            )));
        }
    }
    Ok(())
}

/// Sort value of a field; JSON null and absent fields are both `None`
fn sort_value<'a>(doc: &'a StoredDocument, field: &str) -> Option<&'a Value> {
    doc.body.get(field).filter(|v| !v.is_null())
}

/// Rank of a JSON type in PostgreSQL's jsonb ordering
fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::String(_) => 1,
        Value::Number(_) => 2,
        Value::Bool(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_json(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        _ => type_rank(a).cmp(&type_rank(b)).then_with(|| a.to_string().cmp(&b.to_string())),
    }
}

fn compare_docs(sort: &Sort, a: &StoredDocument, b: &StoredDocument) -> Ordering {
    let primary = if sort.field == CREATED_AT {
        let ord = a.created_at.cmp(&b.created_at);
        match sort.direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    } else {
        // Missing values sort last in either direction
        match (sort_value(a, &sort.field), sort_value(b, &sort.field)) {
            (Some(x), Some(y)) => {
                let ord = compare_json(x, y);
                match sort.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }
    };

    primary
        .then_with(|| b.created_at.cmp(&a.created_at))
        .then_with(|| a.id.cmp(&b.id))
}

/// Shallow merge of `patch` into `body`
fn merge(body: &mut Value, patch: Value) {
    match (body, patch) {
        (Value::Object(target), Value::Object(fields)) => {
            for (key, value) in fields {
                target.insert(key, value);
            }
        }
        (body, patch) => *body = patch,
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn insert(&self, schema: &CollectionSchema, doc: StoredDocument) -> Result<()> {
        let mut collections = self.collections.write().await;
        let table = collections.entry(schema.name).or_default();

        if table.contains_key(&doc.id) {
            return Err(NewsdeskError::Conflict(format!(
                "{} {} already exists",
                schema.name, doc.id
            )));
        }
        check_unique(schema, table, &doc)?;

        table.insert(doc.id, doc);
        Ok(())
    }

    async fn find_by_id(&self, schema: &CollectionSchema, id: Uuid) -> Result<Option<StoredDocument>> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(schema.name)
            .and_then(|table| table.get(&id))
            .cloned())
    }

    async fn find(
        &self,
        schema: &CollectionSchema,
        filter: &Filter,
        sort: &Sort,
        skip: u64,
        limit: u64,
    ) -> Result<Vec<StoredDocument>> {
        let mut docs = self.matching(schema, filter).await;
        docs.sort_by(|a, b| compare_docs(sort, a, b));

        let skip = usize::try_from(skip).unwrap_or(usize::MAX);
        let limit = usize::try_from(limit).unwrap_or(usize::MAX);
        Ok(docs.into_iter().skip(skip).take(limit).collect())
    }

    async fn count(&self, schema: &CollectionSchema, filter: &Filter) -> Result<u64> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(schema.name)
            .map(|table| table.values().filter(|doc| filter.matches(doc)).count() as u64)
            .unwrap_or(0))
    }

    async fn patch(
        &self,
        schema: &CollectionSchema,
        id: Uuid,
        patch: Value,
    ) -> Result<Option<StoredDocument>> {
        let mut collections = self.collections.write().await;
        let Some(table) = collections.get_mut(schema.name) else {
            return Ok(None);
        };
        let Some(existing) = table.get(&id) else {
            return Ok(None);
        };

        let mut updated = existing.clone();
        merge(&mut updated.body, patch);
        check_unique(schema, table, &updated)?;

        table.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn replace(&self, schema: &CollectionSchema, doc: StoredDocument) -> Result<bool> {
        let mut collections = self.collections.write().await;
        let Some(table) = collections.get_mut(schema.name) else {
            return Ok(false);
        };
        let Some(existing) = table.get(&doc.id) else {
            return Ok(false);
        };

        let updated = StoredDocument {
            created_at: existing.created_at,
            ..doc
        };
        check_unique(schema, table, &updated)?;

        table.insert(updated.id, updated);
        Ok(true)
    }

    async fn delete_many(&self, schema: &CollectionSchema, ids: &[Uuid]) -> Result<u64> {
        let mut collections = self.collections.write().await;
        let Some(table) = collections.get_mut(schema.name) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| table.remove(id).is_some()).count() as u64)
    }

    async fn group_count(
        &self,
        schema: &CollectionSchema,
        field: &str,
        filter: &Filter,
    ) -> Result<Vec<(Value, u64)>> {
        let mut groups: BTreeMap<String, (Value, u64)> = BTreeMap::new();
        for doc in self.matching(schema, filter).await {
            let key = doc.body.get(field).cloned().unwrap_or(Value::Null);
            groups
                .entry(key.to_string())
                .or_insert_with(|| (key, 0))
                .1 += 1;
        }
        Ok(groups.into_values().collect())
    }

    async fn numeric_stats(
        &self,
        schema: &CollectionSchema,
        field: &str,
        filter: &Filter,
    ) -> Result<NumericStats> {
        let docs = self.matching(schema, filter).await;
        Ok(NumericStats::from_values(
            docs.iter()
                .filter_map(|doc| doc.body.get(field).and_then(Value::as_f64)),
        ))
    }

    async fn daily_counts(
        &self,
        schema: &CollectionSchema,
        filter: &Filter,
    ) -> Result<Vec<(NaiveDate, u64)>> {
        let mut days: BTreeMap<NaiveDate, u64> = BTreeMap::new();
        for doc in self.matching(schema, filter).await {
            *days.entry(doc.created_at.date_naive()).or_default() += 1;
        }
        Ok(days.into_iter().collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use serde_json::json;

    static PEOPLE: CollectionSchema = CollectionSchema {
        name: "people",
        filterable: &[],
        search_fields: &["name"],
        sortable: &["createdAt", "name", "score"],
        unique: &["email"],
    };

    fn person(name: &str, email: &str, score: Option<i64>, age_days: i64) -> StoredDocument {
        let mut body = json!({ "name": name, "email": email });
        if let Some(score) = score {
            body["score"] = json!(score);
        }
        StoredDocument {
            id: Uuid::new_v4(),
            created_at: Utc::now() - Duration::days(age_days),
            body,
        }
    }

    async fn seeded() -> MemoryStore {
        let store = MemoryStore::new();
        store.insert(&PEOPLE, person("Carol", "carol@example.com", Some(7), 0)).await.unwrap();
        store.insert(&PEOPLE, person("alice", "alice@example.com", Some(3), 1)).await.unwrap();
        store.insert(&PEOPLE, person("Bob", "bob@example.com", None, 2)).await.unwrap();
        store
    }

    fn names(docs: &[StoredDocument]) -> Vec<&str> {
        docs.iter()
            .map(|d| d.body["name"].as_str().unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_unique_fields_are_case_insensitive() {
        let store = seeded().await;
        let err = store
            .insert(&PEOPLE, person("Imposter", "ALICE@example.com", None, 0))
            .await
            .unwrap_err();
        assert!(matches!(err, NewsdeskError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_default_sort_is_newest_first() {
        let store = seeded().await;
        let docs = store
            .find(&PEOPLE, &Filter::new(), &Sort::default(), 0, 10)
            .await
            .unwrap();
        assert_eq!(names(&docs), ["Carol", "alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_missing_values_sort_last() {
        let store = seeded().await;
        let asc = store
            .find(&PEOPLE, &Filter::new(), &Sort::new("score", SortDirection::Asc), 0, 10)
            .await
            .unwrap();
        assert_eq!(names(&asc), ["alice", "Carol", "Bob"]);

        let desc = store
            .find(&PEOPLE, &Filter::new(), &Sort::new("score", SortDirection::Desc), 0, 10)
            .await
            .unwrap();
        assert_eq!(names(&desc), ["Carol", "alice", "Bob"]);
    }

    #[tokio::test]
    async fn test_skip_and_limit() {
        let store = seeded().await;
        let docs = store
            .find(&PEOPLE, &Filter::new(), &Sort::default(), 1, 1)
            .await
            .unwrap();
        assert_eq!(names(&docs), ["alice"]);

        let past_end = store
            .find(&PEOPLE, &Filter::new(), &Sort::default(), 10, 10)
            .await
            .unwrap();
        assert!(past_end.is_empty());
    }

    #[tokio::test]
    async fn test_patch_merges_fields() {
        let store = seeded().await;
        let doc = person("Dave", "dave@example.com", Some(1), 0);
        let id = doc.id;
        store.insert(&PEOPLE, doc).await.unwrap();

        let updated = store
            .patch(&PEOPLE, id, json!({ "score": 9, "team": "red" }))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.body["name"], "Dave");
        assert_eq!(updated.body["score"], 9);
        assert_eq!(updated.body["team"], "red");

        assert!(store
            .patch(&PEOPLE, Uuid::new_v4(), json!({}))
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_delete_many_counts_existing() {
        let store = seeded().await;
        let docs = store
            .find(&PEOPLE, &Filter::new(), &Sort::default(), 0, 10)
            .await
            .unwrap();
        let ids = [docs[0].id, Uuid::new_v4()];

        assert_eq!(store.delete_many(&PEOPLE, &ids).await.unwrap(), 1);
        assert_eq!(store.count(&PEOPLE, &Filter::new()).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_aggregations() {
        let store = seeded().await;

        let stats = store
            .numeric_stats(&PEOPLE, "score", &Filter::new())
            .await
            .unwrap();
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, 5.0);

        let groups = store
            .group_count(&PEOPLE, "score", &Filter::new())
            .await
            .unwrap();
        assert_eq!(groups.len(), 3);
        assert!(groups.contains(&(Value::Null, 1)));

        let days = store.daily_counts(&PEOPLE, &Filter::new()).await.unwrap();
        assert_eq!(days.len(), 3);
        assert!(days.windows(2).all(|w| w[0].0 < w[1].0));
    }
}
