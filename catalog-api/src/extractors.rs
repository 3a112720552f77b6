//! Query-string extractors for item identity and pagination.
//!
//! Item endpoints address rows by `?id=&project_id=` rather than by path, and
//! listings take `?limit=&offset=`. The extractors here turn those into typed
//! values, rejecting malformed identifiers with an [`ApiError`].

use std::collections::HashMap;

use axum::{
    async_trait,
    extract::{FromRequestParts, Query},
    http::request::Parts,
};
use catalog_core::{ItemId, ProjectId, Window, DEFAULT_LIMIT, DEFAULT_OFFSET};

use crate::error::ApiError;

type RawQuery = HashMap<String, String>;

fn raw_query(parts: &Parts) -> Result<RawQuery, ApiError> {
    Query::<RawQuery>::try_from_uri(&parts.uri)
        .map(|Query(query)| query)
        .map_err(|e| ApiError::invalid_input(format!("Malformed query string: {}", e)))
}

fn required_i32(query: &RawQuery, field: &str) -> Result<i32, ApiError> {
    let raw = query
        .get(field)
        .ok_or_else(|| ApiError::missing_field(field))?;
    raw.trim()
        .parse::<i32>()
        .map_err(|_| ApiError::invalid_format(field, "a 32-bit integer"))
}

// ============================================================================
// ITEM IDENTITY
// ============================================================================

/// `(id, project_id)` of the item a mutation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ItemRef {
    pub id: ItemId,
    pub project_id: ProjectId,
}

#[async_trait]
impl<S> FromRequestParts<S> for ItemRef
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = raw_query(parts)?;
        Ok(Self {
            id: required_i32(&query, "id")?,
            project_id: required_i32(&query, "project_id")?,
        })
    }
}

/// Project a new item is created in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProjectRef {
    pub project_id: ProjectId,
}

#[async_trait]
impl<S> FromRequestParts<S> for ProjectRef
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let query = raw_query(parts)?;
        Ok(Self {
            project_id: required_i32(&query, "project_id")?,
        })
    }
}

// ============================================================================
// PAGINATION
// ============================================================================

/// Listing window taken from `?limit=&offset=`.
///
/// Never rejects. An absent field takes its default; if any present field
/// fails to parse, the whole window falls back to the defaults. Parsed values
/// are clamped, `limit` into `1..=MAX_LIMIT` and `offset` into
/// `0..=MAX_OFFSET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListParams(pub Window);

impl ListParams {
    pub fn from_query(query: &RawQuery) -> Self {
        let field = |name: &str, default: i64| match query.get(name) {
            Some(raw) => raw.trim().parse::<i64>().ok(),
            None => Some(default),
        };

        match (field("limit", DEFAULT_LIMIT), field("offset", DEFAULT_OFFSET)) {
            (Some(limit), Some(offset)) => Self(Window::bounded(limit, offset)),
            _ => Self(Window::default()),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for ListParams
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(raw_query(parts)
            .map(|query| Self::from_query(&query))
            .unwrap_or_else(|_| Self(Window::default())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use catalog_core::{MAX_LIMIT, MAX_OFFSET};

    async fn extract<T: FromRequestParts<(), Rejection = ApiError>>(
        uri: &str,
    ) -> Result<T, ApiError> {
        let (mut parts, _) = Request::builder()
            .uri(uri)
            .body(())
            .expect("valid request")
            .into_parts();
        T::from_request_parts(&mut parts, &()).await
    }

    #[tokio::test]
    async fn test_item_ref_parses_both_ids() {
        let item: ItemRef = extract("/item/update?id=4&project_id=9").await.unwrap();
        assert_eq!(item, ItemRef { id: 4, project_id: 9 });
    }

    #[tokio::test]
    async fn test_item_ref_rejects_bad_ids() {
        let err = extract::<ItemRef>("/item/update?project_id=9").await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::MissingField);

        let err = extract::<ItemRef>("/item/update?id=x&project_id=9").await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidFormat);

        let err = extract::<ProjectRef>("/item/create?project_id=99999999999").await.unwrap_err();
        assert_eq!(err.code, crate::error::ErrorCode::InvalidFormat);
    }

    #[tokio::test]
    async fn test_list_params_defaults() {
        let ListParams(window) = extract("/items/list").await.unwrap();
        assert_eq!(window, Window::new(10, 1));

        let ListParams(window) = extract("/items/list?limit=3").await.unwrap();
        assert_eq!(window, Window::new(3, 1));

        let ListParams(window) = extract("/items/list?limit=5&offset=20").await.unwrap();
        assert_eq!(window, Window::new(5, 20));
    }

    #[tokio::test]
    async fn test_out_of_range_pagination_is_clamped() {
        let ListParams(window) = extract("/items/list?limit=1000000000&offset=0").await.unwrap();
        assert_eq!(window, Window::new(MAX_LIMIT, 0));

        let ListParams(window) = extract("/items/list?limit=0&offset=-7").await.unwrap();
        assert_eq!(window, Window::new(1, 0));

        let ListParams(window) = extract("/items/list?offset=9223372036854775807").await.unwrap();
        assert_eq!(window, Window::new(10, MAX_OFFSET));
        assert_eq!(window.ranks().count(), 10);
    }

    #[tokio::test]
    async fn test_unparsable_pagination_falls_back_entirely() {
        let ListParams(window) = extract("/items/list?limit=5&offset=abc").await.unwrap();
        assert_eq!(window, Window::default());
    }
}
