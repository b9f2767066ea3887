//! Aggregation reports
//!
//! A report covers one collection over the last N days: scalar metrics,
//! grouped counts and an optional daily trend. Every declared bucket and
//! every day of the window is present in the output, zero when nothing was
//! observed.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Duration, NaiveDate, Utc};
use futures::future::try_join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;

use crate::config::AnalyticsConfig;
use crate::document::CollectionSchema;
use crate::query::Filter;
use crate::store::DocumentStore;
use crate::Result;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnalyticsError {
    #[error("days must be between 1 and {max}, got {days}")]
    InvalidWindow { days: u32, max: u32 },
}

/// The last `days` calendar days (UTC), today included
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub days: u32,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn last_days(days: u32, end: DateTime<Utc>) -> Self {
        Self {
            days: days.max(1),
            end,
        }
    }

    /// Window for an optional `days` request parameter
    pub fn from_param(days: Option<u32>, config: &AnalyticsConfig) -> std::result::Result<Self, AnalyticsError> {
        let days = days.unwrap_or(config.default_days);
        if days == 0 || days > config.max_days {
            return Err(AnalyticsError::InvalidWindow {
                days,
                max: config.max_days,
            });
        }
        Ok(Self::last_days(days, Utc::now()))
    }

    pub fn first_day(&self) -> NaiveDate {
        self.end.date_naive() - Duration::days(i64::from(self.days) - 1)
    }

    /// Midnight UTC at the start of the first day
    pub fn start(&self) -> DateTime<Utc> {
        self.first_day().and_time(chrono::NaiveTime::MIN).and_utc()
    }

    /// Every day in the window, oldest first
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> {
        self.first_day().iter_days().take(self.days as usize)
    }

    pub fn filter(&self) -> Filter {
        Filter::new().created_between(Some(self.start()), None)
    }
}

/// Count documents per value of a field
#[derive(Debug, Clone)]
pub struct Grouping {
    /// Key in the report's `groups` map
    pub name: &'static str,
    pub field: &'static str,
    /// Keys that always appear, in addition to any observed ones
    pub buckets: Vec<String>,
}

impl Grouping {
    pub fn new<S: ToString>(
        name: &'static str,
        field: &'static str,
        buckets: impl IntoIterator<Item = S>,
    ) -> Self {
        Self {
            name,
            field,
            buckets: buckets.into_iter().map(|b| b.to_string()).collect(),
        }
    }

    /// Histogram over the integer ratings `1..=max`
    pub fn rating_histogram(name: &'static str, field: &'static str, max: u8) -> Self {
        Self::new(name, field, 1..=max)
    }
}

/// A scalar computed over the window
#[derive(Debug, Clone, Copy)]
pub enum Metric {
    Count { name: &'static str },
    Sum { name: &'static str, field: &'static str },
    /// 0 over an empty set
    Avg { name: &'static str, field: &'static str },
}

impl Metric {
    pub fn name(&self) -> &'static str {
        match self {
            Metric::Count { name } | Metric::Sum { name, .. } | Metric::Avg { name, .. } => name,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AggregationRequest {
    pub schema: &'static CollectionSchema,
    pub window: TimeWindow,
    /// Applied in addition to the window
    pub filter: Filter,
    pub metrics: Vec<Metric>,
    pub groupings: Vec<Grouping>,
    pub trend: bool,
}

impl AggregationRequest {
    pub fn new(schema: &'static CollectionSchema, window: TimeWindow) -> Self {
        Self {
            schema,
            window,
            filter: Filter::new(),
            metrics: Vec::new(),
            groupings: Vec::new(),
            trend: false,
        }
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filter = filter;
        self
    }

    pub fn metric(mut self, metric: Metric) -> Self {
        self.metrics.push(metric);
        self
    }

    pub fn group(mut self, grouping: Grouping) -> Self {
        self.groupings.push(grouping);
        self
    }

    pub fn with_trend(mut self) -> Self {
        self.trend = true;
        self
    }

    fn scoped_filter(&self) -> Filter {
        let mut filter = self.filter.clone();
        filter
            .conditions
            .extend(self.window.filter().conditions);
        filter
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct WindowSummary {
    pub days: u32,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub collection: String,
    pub window: WindowSummary,
    #[schema(value_type = Object)]
    pub metrics: BTreeMap<String, Value>,
    pub groups: BTreeMap<String, BTreeMap<String, u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Vec<TrendPoint>>,
}

impl Report {
    pub fn metric_u64(&self, name: &str) -> u64 {
        self.metrics.get(name).and_then(Value::as_u64).unwrap_or(0)
    }
}

/// Bucket key for a grouped value; `None` for documents missing the field
fn bucket_key(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        other => Some(other.to_string()),
    }
}

fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Runs aggregation requests against a document store
#[derive(Clone)]
pub struct AggregationReporter {
    store: Arc<dyn DocumentStore>,
}

impl AggregationReporter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// Run every read of the request concurrently and assemble the report
    pub async fn aggregate(&self, request: &AggregationRequest) -> Result<Report> {
        let filter = request.scoped_filter();
        let schema = request.schema;

        let metrics = try_join_all(request.metrics.iter().map(|metric| {
            let filter = &filter;
            async move {
                let value = match *metric {
                    Metric::Count { .. } => Value::from(self.store.count(schema, filter).await?),
                    Metric::Sum { field, .. } => {
                        let stats = self.store.numeric_stats(schema, field, filter).await?;
                        Value::from(round2(stats.sum))
                    }
                    Metric::Avg { field, .. } => {
                        let stats = self.store.numeric_stats(schema, field, filter).await?;
                        Value::from(round2(stats.average))
                    }
                };
                Ok::<_, crate::NewsdeskError>((metric.name().to_string(), value))
            }
        }));

        let groups = try_join_all(request.groupings.iter().map(|grouping| {
            let filter = &filter;
            async move {
                let observed = self.store.group_count(schema, grouping.field, filter).await?;
                let mut buckets: BTreeMap<String, u64> =
                    grouping.buckets.iter().map(|b| (b.clone(), 0)).collect();
                for (value, count) in observed {
                    if let Some(key) = bucket_key(&value) {
                        *buckets.entry(key).or_default() += count;
                    }
                }
                Ok::<_, crate::NewsdeskError>((grouping.name.to_string(), buckets))
            }
        }));

        let trend = async {
            if !request.trend {
                return Ok(None);
            }
            let observed: HashMap<NaiveDate, u64> = self
                .store
                .daily_counts(schema, &filter)
                .await?
                .into_iter()
                .collect();
            let points = request
                .window
                .dates()
                .map(|date| TrendPoint {
                    date,
                    count: observed.get(&date).copied().unwrap_or(0),
                })
                .collect();
            Ok::<_, crate::NewsdeskError>(Some(points))
        };

        let (metrics, groups, trend) = tokio::try_join!(metrics, groups, trend)?;

        tracing::debug!(
            collection = schema.name,
            days = request.window.days,
            "Aggregation complete"
        );

        Ok(Report {
            collection: schema.name.to_string(),
            window: WindowSummary {
                days: request.window.days,
                from: request.window.start(),
                to: request.window.end,
            },
            metrics: metrics.into_iter().collect(),
            groups: groups.into_iter().collect(),
            trend,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Feedback, FeedbackCategory, FeedbackStatus, MAX_RATING};
    use crate::store::{Collection, MemoryStore};
    use crate::Document;
    use uuid::Uuid;

    fn feedback(rating: u8, category: FeedbackCategory, age_days: i64) -> Feedback {
        let created = Utc::now() - Duration::days(age_days);
        Feedback {
            id: Uuid::new_v4(),
            name: "Reader".to_string(),
            email: "reader@example.com".to_string(),
            rating,
            category,
            message: "Nice".to_string(),
            status: FeedbackStatus::Pending,
            submitted_by: None,
            created_at: created,
            updated_at: created,
        }
    }

    fn feedback_request(days: u32) -> AggregationRequest {
        AggregationRequest::new(Feedback::collection_schema(), TimeWindow::last_days(days, Utc::now()))
            .metric(Metric::Count { name: "total" })
            .metric(Metric::Avg {
                name: "averageRating",
                field: "rating",
            })
            .group(Grouping::rating_histogram("ratings", "rating", MAX_RATING))
            .group(Grouping::new(
                "categories",
                "category",
                FeedbackCategory::VALUES,
            ))
            .with_trend()
    }

    #[tokio::test]
    async fn test_empty_collection_is_zero_filled() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let report = AggregationReporter::new(store)
            .aggregate(&feedback_request(7))
            .await
            .unwrap();

        let ratings = &report.groups["ratings"];
        let expected: BTreeMap<String, u64> =
            (1..=5).map(|r: u8| (r.to_string(), 0)).collect();
        assert_eq!(ratings, &expected);

        assert_eq!(report.groups["categories"].len(), 4);
        assert_eq!(report.metric_u64("total"), 0);
        assert_eq!(report.metrics["averageRating"], Value::from(0.0));

        let trend = report.trend.unwrap();
        assert_eq!(trend.len(), 7);
        assert!(trend.iter().all(|p| p.count == 0));
    }

    #[tokio::test]
    async fn test_window_excludes_older_documents() {
        let store: Arc<dyn DocumentStore> = Arc::new(MemoryStore::new());
        let collection: Collection<Feedback> = Collection::new(Arc::clone(&store));
        collection.insert(&feedback(5, FeedbackCategory::Bug, 0)).await.unwrap();
        collection.insert(&feedback(4, FeedbackCategory::Bug, 1)).await.unwrap();
        collection.insert(&feedback(1, FeedbackCategory::General, 40)).await.unwrap();

        let report = AggregationReporter::new(store)
            .aggregate(&feedback_request(30))
            .await
            .unwrap();

        assert_eq!(report.metric_u64("total"), 2);
        assert_eq!(report.metrics["averageRating"], Value::from(4.5));
        assert_eq!(report.groups["ratings"]["5"], 1);
        assert_eq!(report.groups["ratings"]["1"], 0);
        assert_eq!(report.groups["categories"]["bug"], 2);
        assert_eq!(report.groups["categories"]["content"], 0);

        let trend = report.trend.unwrap();
        assert_eq!(trend.len(), 30);
        assert_eq!(trend.last().map(|p| p.count), Some(1));
        assert_eq!(trend.iter().map(|p| p.count).sum::<u64>(), 2);
    }

    #[test]
    fn test_window_bounds() {
        let config = AnalyticsConfig::default();
        assert_eq!(TimeWindow::from_param(None, &config).unwrap().days, 30);
        assert!(TimeWindow::from_param(Some(0), &config).is_err());
        assert!(TimeWindow::from_param(Some(366), &config).is_err());

        let window = TimeWindow::last_days(3, Utc::now());
        let dates: Vec<_> = window.dates().collect();
        assert_eq!(dates.len(), 3);
        assert_eq!(dates[2], Utc::now().date_naive());
        assert_eq!(window.start().date_naive(), dates[0]);
    }
}
