use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::models::response::ApiResponse;

pub type Result<T> = std::result::Result<T, NotifierError>;

#[derive(Debug, Error)]
pub enum NotifierError {
    #[error("document store error: {0}")]
    Store(#[source] anyhow::Error),
    #[error("invalid api key")]
    Unauthorized,
    #[error("missing required fields: {0}")]
    MissingFields(String),
    #[error("{0}")]
    NotFound(String),
}

impl NotifierError {
    pub fn store(err: anyhow::Error) -> Self {
        Self::Store(err)
    }

    fn status(&self) -> StatusCode {
        match self {
            NotifierError::Unauthorized => StatusCode::UNAUTHORIZED,
            NotifierError::MissingFields(_) => StatusCode::BAD_REQUEST,
            NotifierError::NotFound(_) => StatusCode::NOT_FOUND,
            NotifierError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for NotifierError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = ApiResponse::<()>::error(self.to_string(), "Request failed".to_string());
        (status, Json(body)).into_response()
    }
}
