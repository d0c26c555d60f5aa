// API处理器模块

pub mod files;

pub use files::*;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;

use crate::storage::{StorageError, StorageErrorCode};

/// 统一API响应格式
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    /// 状态码 (0: 成功, 其他: 错误码)
    pub code: i32,
    /// 消息
    pub message: String,
    /// 数据
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            code: 0,
            message: "Success".to_string(),
            data: Some(data),
        }
    }
}

/// 错误响应
#[derive(Debug, Serialize)]
struct ErrorResponse {
    code: i32,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl IntoResponse for StorageError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            StorageErrorCode::PathEscapesRoot => StatusCode::FORBIDDEN,
            StorageErrorCode::PathProtected => StatusCode::FORBIDDEN,
            StorageErrorCode::NotFound => StatusCode::NOT_FOUND,
            StorageErrorCode::TrashConflict => StatusCode::CONFLICT,
            StorageErrorCode::NamingExhausted => StatusCode::INSUFFICIENT_STORAGE,
            StorageErrorCode::IoFailure => StatusCode::INTERNAL_SERVER_ERROR,
            StorageErrorCode::ArchiveAborted => StatusCode::INTERNAL_SERVER_ERROR,
            StorageErrorCode::NotADirectory => StatusCode::BAD_REQUEST,
            StorageErrorCode::InvalidPath => StatusCode::BAD_REQUEST,
        };

        let body = Json(ErrorResponse {
            code: self.code.code(),
            message: self.message,
            path: self.path,
        });

        (status, body).into_response()
    }
}
