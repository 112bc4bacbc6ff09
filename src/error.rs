use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Invalid parameter '{parameter}': {cause}")]
    InvalidParameter { parameter: String, cause: String },

    #[error("Template not found: {template}")]
    TemplateNotFound { template: String },

    #[error("Query failed for template '{template}': {cause}")]
    QueryFailed { template: String, cause: String },

    #[error("Connection failed: {cause}")]
    ConnectionFailed { cause: String },

    #[error("Provisioning failed for schema '{schema}': {cause}")]
    ProvisioningFailed { schema: String, cause: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameter: Option<String>,
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        // Database and template failures keep their detail server-side; the
        // client only gets a generic failure indicator.
        let (status, error_response) = match &self {
            GatewayError::InvalidParameter { parameter, cause } => (
                StatusCode::BAD_REQUEST,
                ErrorResponse {
                    error: "invalid_parameter".to_string(),
                    message: format!("Invalid value for parameter '{}': {}", parameter, cause),
                    parameter: Some(parameter.clone()),
                },
            ),
            GatewayError::TemplateNotFound { template } => {
                error!("Template not found: {}", template);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal_error".to_string(),
                        message: "Gateway misconfiguration".to_string(),
                        parameter: None,
                    },
                )
            }
            GatewayError::QueryFailed { template, cause } => {
                error!("Query failed for template '{}': {}", template, cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "query_failed".to_string(),
                        message: "Query execution failed".to_string(),
                        parameter: None,
                    },
                )
            }
            GatewayError::ConnectionFailed { cause } => {
                error!("Database connection failed: {}", cause);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    ErrorResponse {
                        error: "connection_failed".to_string(),
                        message: "Failed to connect to the database".to_string(),
                        parameter: None,
                    },
                )
            }
            GatewayError::ProvisioningFailed { schema, cause } => {
                error!("Provisioning failed for schema '{}': {}", schema, cause);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "provisioning_failed".to_string(),
                        message: format!("Provisioning failed for schema '{}'", schema),
                        parameter: None,
                    },
                )
            }
            GatewayError::Internal(msg) => {
                error!("Internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse {
                        error: "internal_error".to_string(),
                        message: "Internal error".to_string(),
                        parameter: None,
                    },
                )
            }
        };

        (status, Json(error_response)).into_response()
    }
}

impl From<tokio_postgres::Error> for GatewayError {
    fn from(err: tokio_postgres::Error) -> Self {
        GatewayError::Internal(err.to_string())
    }
}

impl From<deadpool_postgres::PoolError> for GatewayError {
    fn from(err: deadpool_postgres::PoolError) -> Self {
        GatewayError::ConnectionFailed {
            cause: err.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, GatewayError>;
