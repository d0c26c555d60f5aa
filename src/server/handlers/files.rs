// 文件API处理器
//
// 浏览/下载、上传、移动、软删除四个操作的 HTTP 入口，
// 真正的约束与搬移逻辑都在 storage 模块里

use axum::{
    body::Body,
    extract::{Multipart, Query, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Local;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

use crate::server::AppState;
use crate::storage::{SortField, SortOrder, StorageError, StorageErrorCode};

use super::ApiResponse;

/// 浏览/下载查询参数
#[derive(Debug, Deserialize)]
pub struct FileQuery {
    /// 相对根目录的路径
    #[serde(default)]
    pub path: String,
    /// 目录是否打包下载
    #[serde(default)]
    pub download: bool,
    /// 排序字段
    #[serde(default)]
    pub sort_field: SortField,
    /// 排序顺序
    #[serde(default)]
    pub sort_order: SortOrder,
}

/// 移动查询参数
#[derive(Debug, Deserialize)]
pub struct MoveQuery {
    /// 源路径
    pub path: String,
    /// 目标路径
    pub dest: String,
}

/// 删除查询参数
#[derive(Debug, Deserialize)]
pub struct DeleteQuery {
    /// 待删除路径
    pub path: String,
}

/// 上传查询参数
#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    /// 目标目录（缺省为上传暂存目录）
    #[serde(default)]
    pub dir: Option<String>,
}

/// 上传响应数据
#[derive(Debug, Serialize)]
pub struct UploadData {
    /// 落盘后的相对路径（冲突解析之后）
    pub path: String,
}

/// 删除响应数据
#[derive(Debug, Serialize)]
pub struct DeleteData {
    /// 回收站内的相对路径
    pub quarantined: String,
}

/// GET /api/v1/file?path=&download=
///
/// 文件返回字节流；目录默认返回列表，带 download=true 时打包为 tar 流
pub async fn get_file(
    State(state): State<AppState>,
    Query(query): Query<FileQuery>,
) -> Result<Response, StorageError> {
    let (abs, metadata) = state.storage.stat(&query.path)?;

    if metadata.is_dir() {
        if query.download {
            let (name, stream) = state.storage.archive(&query.path)?;
            info!("打包下载目录: {}", query.path);

            let headers = [
                (header::CONTENT_TYPE, "application/x-tar".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", name),
                ),
            ];
            // 归档中途失败会使响应体提前终止，传输层据此观察到截断
            return Ok((headers, Body::from_stream(stream)).into_response());
        }

        let data = state
            .storage
            .list(&query.path, &query.sort_field, &query.sort_order)?;
        return Ok(Json(ApiResponse::success(data)).into_response());
    }

    // 普通文件：流式下载
    let file = tokio::fs::File::open(&abs)
        .await
        .map_err(|e| StorageError::from_io(e).with_path(query.path.clone()))?;

    let file_name = abs
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "download".to_string());
    let mime = mime_guess::from_path(&abs).first_or_octet_stream();

    let headers = [
        (header::CONTENT_TYPE, mime.to_string()),
        (header::CONTENT_LENGTH, metadata.len().to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", file_name),
        ),
    ];

    Ok((headers, Body::from_stream(ReaderStream::new(file))).into_response())
}

/// POST /api/v1/file
///
/// 多部分表单上传（file 字段），返回冲突解析后的落盘相对路径
pub async fn upload_file(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UploadData>>, StorageError> {
    while let Some(mut field) = multipart.next_field().await.map_err(|e| {
        StorageError::new(StorageErrorCode::InvalidPath)
            .with_message(format!("解析上传表单失败: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }

        let desired = field.file_name().unwrap_or_default().to_string();
        let target = state.storage.reserve_upload(query.dir.as_deref(), &desired)?;
        let mut file = tokio::fs::File::from_std(target.file);

        loop {
            let chunk = match field.chunk().await {
                Ok(Some(chunk)) => chunk,
                Ok(None) => break,
                Err(e) => {
                    // 传输中断时清掉预留出的半成品文件
                    let _ = tokio::fs::remove_file(&target.absolute).await;
                    return Err(StorageError::new(StorageErrorCode::IoFailure)
                        .with_message(format!("接收上传数据失败: {}", e))
                        .with_path(target.relative));
                }
            };

            if let Err(e) = file.write_all(&chunk).await {
                let _ = tokio::fs::remove_file(&target.absolute).await;
                return Err(StorageError::from_io(e).with_path(target.relative));
            }
        }

        file.flush()
            .await
            .map_err(|e| StorageError::from_io(e).with_path(target.relative.clone()))?;

        info!("上传完成: {}", target.relative);

        return Ok(Json(ApiResponse::success(UploadData {
            path: target.relative,
        })));
    }

    warn!("上传请求缺少 file 字段");
    Err(StorageError::new(StorageErrorCode::InvalidPath).with_message("上传请求缺少 file 字段"))
}

/// PUT /api/v1/file?path=&dest=
///
/// 移动/重命名，源路径受保护时拒绝
pub async fn move_file(
    State(state): State<AppState>,
    Query(query): Query<MoveQuery>,
) -> Result<Json<ApiResponse<()>>, StorageError> {
    state.storage.move_entry(&query.path, &query.dest)?;
    Ok(Json(ApiResponse::success(())))
}

/// DELETE /api/v1/file?path=
///
/// 软删除：移入回收站的当前时间批次
pub async fn delete_file(
    State(state): State<AppState>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<ApiResponse<DeleteData>>, StorageError> {
    let quarantined = state.storage.soft_delete(&query.path, Local::now())?;
    Ok(Json(ApiResponse::success(DeleteData { quarantined })))
}
