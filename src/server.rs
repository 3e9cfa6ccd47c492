// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/server.rs - HTTP 接口
//
// 本文件根据 Apache 许可证第 2.0 版（以下简称“许可证”）授权使用；
// 除非遵守该许可证条款，否则您不得使用本文件。
// 您可通过以下网址获取许可证副本：
// http://www.apache.org/licenses/LICENSE-2.0
// 除非适用法律要求或书面同意，根据本许可协议分发的软件均按“原样”提供，
// 不附带任何形式的明示或暗示的保证或条件。
// 有关许可权限与限制的具体条款，请参阅本许可协议。
//
// Copyright (C) 2026 Johann Li <me@qinka.pro>, Wareless Group

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{DefaultBodyLimit, Multipart, Path, State, multipart::MultipartError},
  http::{StatusCode, header},
  response::{IntoResponse, Response},
  routing::{get, post},
};
use serde::Serialize;
use thiserror::Error;
use tower_http::{
  cors::{Any, CorsLayer},
  trace::TraceLayer,
};
use tracing::{error, info, warn};

use crate::{
  model::Model,
  pipeline::{DetectionReport, Pipeline, PipelineError},
  store::{ARTIFACT_CONTENT_TYPE, ArtifactId, ArtifactStore},
};

/// 上传图像可以放在这两个表单字段中的任意一个
pub const UPLOAD_FIELDS: [&str; 2] = ["file", "image"];
pub const DEFAULT_BODY_LIMIT: usize = 20 * 1024 * 1024;

/// 以 MiB 为单位的请求体上限换算为字节，溢出时取最大值
pub fn body_limit_from_mib(mib: usize) -> usize {
  mib.saturating_mul(1024 * 1024)
}

#[derive(Error, Debug)]
pub enum AppError {
  #[error("请求无效: {0}")]
  BadRequest(String),
  #[error("请求体过大: {0}")]
  PayloadTooLarge(String),
  #[error("未找到: {0}")]
  NotFound(String),
  #[error("内部错误: {0}")]
  Internal(String),
}

#[derive(Serialize)]
struct ErrorBody {
  detail: String,
}

impl IntoResponse for AppError {
  fn into_response(self) -> Response {
    let code = match &self {
      AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
      AppError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
      code,
      Json(ErrorBody {
        detail: self.to_string(),
      }),
    )
      .into_response()
  }
}

impl From<PipelineError> for AppError {
  fn from(err: PipelineError) -> Self {
    if err.is_client_error() {
      warn!("拒绝请求: {}", err);
      AppError::BadRequest(err.to_string())
    } else {
      error!("{}阶段失败: {}", err.stage(), err);
      AppError::Internal(err.to_string())
    }
  }
}

impl From<MultipartError> for AppError {
  fn from(err: MultipartError) -> Self {
    warn!("表单数据无效: {}", err);
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
      AppError::PayloadTooLarge(err.body_text())
    } else {
      AppError::BadRequest(err.body_text())
    }
  }
}

impl From<tokio::task::JoinError> for AppError {
  fn from(err: tokio::task::JoinError) -> Self {
    error!("后台任务失败: {}", err);
    AppError::Internal(err.to_string())
  }
}

#[derive(Serialize)]
struct WelcomeResponse {
  message: &'static str,
}

#[derive(Serialize)]
struct HealthResponse {
  status: &'static str,
  model_loaded: bool,
}

async fn root() -> Json<WelcomeResponse> {
  Json(WelcomeResponse {
    message: "Welcome to Liefeng",
  })
}

// 流程在构造时已持有模型，能响应即代表模型已加载
async fn health() -> Json<HealthResponse> {
  Json(HealthResponse {
    status: "healthy",
    model_loaded: true,
  })
}

async fn detect_crack<M, S>(
  State(pipeline): State<Arc<Pipeline<M, S>>>,
  mut multipart: Multipart,
) -> Result<Json<DetectionReport>, AppError>
where
  M: Model + Send + Sync + 'static,
  S: ArtifactStore + Send + Sync + 'static,
{
  let mut upload = None;
  while let Some(field) = multipart.next_field().await? {
    let name = field.name().map(str::to_owned);
    if !name
      .as_deref()
      .is_some_and(|name| UPLOAD_FIELDS.contains(&name))
    {
      continue;
    }

    let file_name = field.file_name().map(str::to_owned);
    let data = field.bytes().await?;
    info!(
      "收到上传: 字段 {:?}, 文件名 {:?}, {} 字节",
      name,
      file_name,
      data.len()
    );
    upload = Some(data);
    break;
  }

  let data = upload.ok_or_else(|| {
    AppError::BadRequest(format!("缺少上传字段，应为 {}", UPLOAD_FIELDS.join(" 或 ")))
  })?;

  let report = tokio::task::spawn_blocking(move || pipeline.detect(&data)).await??;
  Ok(Json(report))
}

async fn get_result<M, S>(
  State(pipeline): State<Arc<Pipeline<M, S>>>,
  Path(file_id): Path<String>,
) -> Result<Response, AppError>
where
  M: Model + Send + Sync + 'static,
  S: ArtifactStore + Send + Sync + 'static,
{
  let not_found = || AppError::NotFound(format!("结果 {file_id} 不存在"));

  let Ok(id) = file_id.parse::<ArtifactId>() else {
    return Err(not_found());
  };

  match tokio::task::spawn_blocking(move || pipeline.fetch(&id)).await?? {
    Some(bytes) => Ok(([(header::CONTENT_TYPE, ARTIFACT_CONTENT_TYPE)], bytes).into_response()),
    None => Err(not_found()),
  }
}

pub fn router<M, S>(pipeline: Arc<Pipeline<M, S>>, body_limit: usize) -> Router
where
  M: Model + Send + Sync + 'static,
  S: ArtifactStore + Send + Sync + 'static,
{
  let cors = CorsLayer::new()
    .allow_origin(Any)
    .allow_methods(Any)
    .allow_headers(Any);

  Router::new()
    .route("/", get(root))
    .route("/health", get(health))
    .route("/detect-crack", post(detect_crack::<M, S>))
    .route("/result/:file_id", get(get_result::<M, S>))
    .layer(DefaultBodyLimit::max(body_limit))
    .layer(cors)
    .layer(TraceLayer::new_for_http())
    .with_state(pipeline)
}
