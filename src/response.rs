use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::{error, warn};

use crate::error::Error;

/// The `{success, data?, error?}` shape every action answers with.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }
}

/// Handler return type: success data or an [`Error`], both rendered as an [`Envelope`].
pub type ApiResult<T> = Result<Json<Envelope<T>>, Error>;

pub fn ok<T>(data: T) -> ApiResult<T> {
    Ok(Json(Envelope::ok(data)))
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = if self.is_operational() {
            warn!(%status, "action failed: {}", self);
            self.to_string()
        } else {
            error!(%status, "action failed: {:?}", self);
            "internal server error".to_string()
        };
        (status, Json(Envelope::<()>::failure(message))).into_response()
    }
}
