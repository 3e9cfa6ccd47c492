// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/pipeline.rs - 单次请求的检测流程
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

use std::{fmt, time::Instant};

use serde::{Serialize, Serializer};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  detection::{self, DetectionRecord, DetectionSummary},
  mask::MaskError,
  model::Model,
  output::{Draw, Render},
  store::{ArtifactId, ArtifactStore, StoreError},
};

const DEFAULT_RESULT_URL_PREFIX: &str = "/result/";
const DEFAULT_LABEL_PREFIX: &str = "crack";
const DEFAULT_LINE_THICKNESS: u32 = 3;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
  /// 报告中 `image_url` 的前缀，后接结果标识
  pub result_url_prefix: String,
  /// 标签文本前缀，标签形如 `crack 1 0.87`
  pub label_prefix: String,
  pub line_thickness: u32,
}

impl Default for PipelineConfig {
  fn default() -> Self {
    Self {
      result_url_prefix: DEFAULT_RESULT_URL_PREFIX.to_string(),
      label_prefix: DEFAULT_LABEL_PREFIX.to_string(),
      line_thickness: DEFAULT_LINE_THICKNESS,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
  Decoding,
  Inferring,
  Aggregating,
  Rendering,
  Persisting,
  Reporting,
}

impl fmt::Display for Stage {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      Stage::Decoding => "解码",
      Stage::Inferring => "推理",
      Stage::Aggregating => "汇总",
      Stage::Rendering => "渲染",
      Stage::Persisting => "保存",
      Stage::Reporting => "报告",
    };
    f.write_str(name)
  }
}

#[derive(Error, Debug)]
pub enum PipelineError {
  #[error("图像解码错误: {0}")]
  Decode(#[source] image::ImageError),
  #[error("模型推理错误: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("掩码处理错误: {0}")]
  Mask(#[from] MaskError),
  #[error("结果保存错误: {0}")]
  Persist(#[from] StoreError),
}

impl PipelineError {
  pub fn stage(&self) -> Stage {
    match self {
      PipelineError::Decode(_) => Stage::Decoding,
      PipelineError::Inference(_) => Stage::Inferring,
      PipelineError::Mask(_) => Stage::Aggregating,
      PipelineError::Persist(_) => Stage::Persisting,
    }
  }

  /// 仅输入无法解码属于调用方的问题，其余均为服务端错误
  pub fn is_client_error(&self) -> bool {
    matches!(self, PipelineError::Decode(_))
  }
}

/// 返回给调用方的检测报告，字段名与对外接口一致
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionReport {
  #[serde(rename = "file_id")]
  pub artifact_id: ArtifactId,
  pub image_url: String,
  #[serde(rename = "has_crack")]
  pub has_detection: bool,
  #[serde(rename = "confidence")]
  pub max_confidence: f32,
  #[serde(rename = "crack_count")]
  pub count: usize,
  #[serde(rename = "bounding_boxes", serialize_with = "serialize_boxes")]
  pub records: Box<[DetectionRecord]>,
}

fn serialize_boxes<S: Serializer>(
  records: &[DetectionRecord],
  serializer: S,
) -> Result<S::Ok, S::Error> {
  serializer.collect_seq(records.iter().map(|record| &record.bbox))
}

impl DetectionReport {
  fn new(artifact_id: ArtifactId, url_prefix: &str, summary: DetectionSummary) -> Self {
    Self {
      artifact_id,
      image_url: format!("{url_prefix}{artifact_id}"),
      has_detection: summary.has_detection,
      max_confidence: summary.max_confidence,
      count: summary.count(),
      records: summary.records,
    }
  }
}

/// 解码 → 推理 → 汇总 → 渲染 → 保存 → 报告。
///
/// 每个请求相互独立，只共享结果存储；保存只在渲染完成后进行一次，
/// 之前任何阶段失败都不会留下结果文件。
pub struct Pipeline<M, S> {
  model: M,
  store: S,
  draw: Draw,
  config: PipelineConfig,
}

impl<M: Model, S: ArtifactStore> Pipeline<M, S> {
  pub fn new(model: M, store: S, config: PipelineConfig) -> Self {
    let draw = Draw::default()
      .with_label_prefix(config.label_prefix.clone())
      .with_thickness(config.line_thickness);

    Self {
      model,
      store,
      draw,
      config,
    }
  }

  pub fn detect(&self, data: &[u8]) -> Result<DetectionReport, PipelineError> {
    let now = Instant::now();

    debug!("{}: 输入 {} 字节", Stage::Decoding, data.len());
    let image = image::load_from_memory(data)
      .map_err(|e| {
        warn!("{}失败: {}", Stage::Decoding, e);
        PipelineError::Decode(e)
      })?
      .to_rgb8();
    let (width, height) = image.dimensions();
    info!("图像解码完成: {}x{}", width, height);

    debug!("{}: 开始", Stage::Inferring);
    let result = self
      .model
      .infer(&image)
      .map_err(|e| PipelineError::Inference(Box::new(e)))?;
    info!(
      "推理完成，耗时: {:.2?}，共 {} 个实例",
      now.elapsed(),
      result.instances().len()
    );

    debug!("{}: 开始", Stage::Aggregating);
    let summary = detection::aggregate(width, height, result.instances())?;

    debug!("{}: {} 个边框", Stage::Rendering, summary.count());
    let rendered = self.draw.render_result(&image, &summary);

    debug!("{}: 开始", Stage::Persisting);
    let artifact_id = self.store.put(&rendered)?;

    debug!("{}: 结果 {}", Stage::Reporting, artifact_id);
    let report = DetectionReport::new(artifact_id, &self.config.result_url_prefix, summary);
    info!(
      "检测完成，耗时: {:.2?}，结果 {}: 检测到 {} 处裂缝，最高置信度 {:.4}",
      now.elapsed(),
      report.artifact_id,
      report.count,
      report.max_confidence
    );

    Ok(report)
  }

  /// 按标识取回已保存的结果图像，未知标识返回 `Ok(None)`
  pub fn fetch(&self, id: &ArtifactId) -> Result<Option<Vec<u8>>, PipelineError> {
    Ok(self.store.get(id)?)
  }
}
