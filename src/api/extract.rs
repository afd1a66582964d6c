//! Body and query extractors whose rejections use the API error body.

use axum::{
    async_trait,
    body::Bytes,
    extract::{rejection::JsonRejection, rejection::QueryRejection, FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

use super::error::ApiError;

/// `Json<T>` that fails with a `validation_error` instead of plain text
pub struct AppJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJson<T>
where
    Json<T>: FromRequest<S, Rejection = JsonRejection>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<T>::from_request(req, state).await?;
        Ok(AppJson(value))
    }
}

/// Optional JSON body. A missing or blank body yields `T::default()`,
/// anything else must parse as `T`.
pub struct AppJsonOrDefault<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for AppJsonOrDefault<T>
where
    T: DeserializeOwned + Default,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::validation_field("body", e.body_text()))?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(AppJsonOrDefault(T::default()));
        }
        let Json(value) = Json::<T>::from_bytes(&bytes)?;
        Ok(AppJsonOrDefault(value))
    }
}

/// `Query<T>` that fails with a `validation_error` instead of plain text
pub struct AppQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for AppQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e: QueryRejection| ApiError::from(e))?;
        Ok(AppQuery(value))
    }
}
