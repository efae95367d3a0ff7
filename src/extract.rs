use async_trait::async_trait;
use axum::body::HttpBody;
use axum::extract::{FromRequest, RequestParts};
use axum::{BoxError, Json};
use serde::de::DeserializeOwned;

use crate::Error;

/// JSON request body whose rejections are answered with the usual failure
/// envelope instead of axum's plain-text reply.
#[derive(Debug, Clone)]
pub struct JsonBody<T>(pub T);

#[async_trait]
impl<T, B> FromRequest<B> for JsonBody<T>
where
    T: DeserializeOwned + Send,
    B: HttpBody + Send,
    B::Data: Send,
    B::Error: Into<BoxError>,
{
    type Rejection = Error;

    async fn from_request(req: &mut RequestParts<B>) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => {
                log::debug!("Rejected request body: {}", rejection);
                Err(Error::invalid_payload(format!(
                    "Request body is not valid: {}",
                    rejection
                )))
            }
        }
    }
}
