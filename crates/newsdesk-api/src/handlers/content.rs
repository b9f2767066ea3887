//! Operations shared by the news and video handlers
//!
//! Both content types carry an editorial status; the only difference
//! between them is their fields, which the per-type modules own.

use chrono::Utc;
use newsdesk_core::query;
use newsdesk_core::{Collection, ContentStatus, Paginated, Publishable};
use uuid::Uuid;

use super::{list_request, ListParams, StatusUpdateRequest};
use crate::error::AppError;
use crate::state::AppState;

fn collection<T: Publishable>(state: &AppState) -> Collection<T> {
    Collection::new(state.store.clone())
}

/// List with the client's filters; `public_only` pins `status=published`
/// over whatever status the client asked for.
pub(crate) async fn list<T: Publishable>(
    state: &AppState,
    params: &ListParams,
    public_only: bool,
) -> Result<Paginated<T>, AppError> {
    let mut request = list_request(state, T::collection_schema(), params)?;
    if public_only {
        request.filter = request
            .filter
            .force_eq("status", ContentStatus::Published.as_str());
    }
    Ok(query::list(&collection::<T>(state), &request).await?)
}

pub(crate) async fn get<T: Publishable>(
    state: &AppState,
    id: Uuid,
    label: &str,
) -> Result<T, AppError> {
    collection::<T>(state)
        .find_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound(label.to_string()))
}

pub(crate) async fn insert<T: Publishable>(state: &AppState, item: &T) -> Result<(), AppError> {
    Ok(collection::<T>(state).insert(item).await?)
}

pub(crate) async fn save<T: Publishable>(
    state: &AppState,
    item: &T,
    label: &str,
) -> Result<(), AppError> {
    if collection::<T>(state).replace(item).await? {
        Ok(())
    } else {
        Err(AppError::NotFound(label.to_string()))
    }
}

pub(crate) async fn set_status<T: Publishable>(
    state: &AppState,
    id: Uuid,
    request: &StatusUpdateRequest,
    label: &str,
) -> Result<T, AppError> {
    let status: ContentStatus = request.parse(ContentStatus::VALUES)?;
    let mut item: T = get(state, id, label).await?;
    item.apply_status(status, Utc::now());
    save(state, &item, label).await?;
    tracing::info!(collection = T::collection_schema().name, %id, status = %status, "Content status changed");
    Ok(item)
}

pub(crate) async fn delete<T: Publishable>(
    state: &AppState,
    id: Uuid,
    label: &str,
) -> Result<(), AppError> {
    match collection::<T>(state).delete_many(&[id]).await? {
        0 => Err(AppError::NotFound(label.to_string())),
        _ => Ok(()),
    }
}

pub(crate) async fn bulk_delete<T: Publishable>(
    state: &AppState,
    ids: &[Uuid],
) -> Result<u64, AppError> {
    let deleted = collection::<T>(state).delete_many(ids).await?;
    tracing::info!(collection = T::collection_schema().name, requested = ids.len(), deleted, "Bulk delete");
    Ok(deleted)
}

/// Status for a new item; drafts unless the client says otherwise
pub(crate) fn initial_status(raw: Option<&str>) -> Result<ContentStatus, AppError> {
    match raw {
        None => Ok(ContentStatus::Draft),
        Some(raw) => raw.parse().map_err(|_| {
            AppError::field(
                "status",
                format!("Status must be one of: {}", ContentStatus::VALUES.join(", ")),
            )
        }),
    }
}

/// Category field, defaulting to `general`
pub(crate) fn parse_category(
    raw: Option<&str>,
) -> Result<newsdesk_core::Category, AppError> {
    match raw {
        None => Ok(newsdesk_core::Category::default()),
        Some(raw) => raw.parse().map_err(|_| {
            AppError::field(
                "category",
                format!(
                    "Category must be one of: {}",
                    newsdesk_core::Category::VALUES.join(", ")
                ),
            )
        }),
    }
}

/// Trim, drop blanks and duplicates, keep order
pub(crate) fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !cleaned.contains(&tag) {
            cleaned.push(tag);
        }
    }
    cleaned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_status_defaults_to_draft() {
        assert_eq!(initial_status(None).unwrap(), ContentStatus::Draft);
        assert_eq!(
            initial_status(Some("Published")).unwrap(),
            ContentStatus::Published
        );
        assert!(initial_status(Some("live")).is_err());
    }

    #[test]
    fn test_clean_tags() {
        let tags = vec![
            " Rust ".to_string(),
            "".to_string(),
            "rust".to_string(),
            "Web".to_string(),
        ];
        assert_eq!(clean_tags(tags), vec!["rust".to_string(), "web".to_string()]);
    }
}
