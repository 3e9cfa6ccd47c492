// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/model/replay.rs - 回放预先录制的模型输出
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

use std::convert::Infallible;

use image::RgbImage;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{InferResult, Model},
};

#[derive(Error, Debug)]
pub enum ReplayModelError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("录制文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
}

/// 对任意输入都返回同一份录制好的推理结果。
///
/// 录制文件为 JSON：
///
/// ```json
/// {"instances": [{"mask": {"width": 2, "height": 1, "data": [0.0, 0.9]}, "confidence": 0.8}]}
/// ```
///
/// `instances` 可以为 `null`，`confidence` 可以省略。
#[derive(Debug, Clone)]
pub struct ReplayModel {
  recorded: InferResult,
}

impl FromUrlWithScheme for ReplayModel {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayModel {
  type Error = ReplayModelError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(ReplayModelError::SchemeMismatch(url.scheme().to_string()));
    }

    info!("加载录制文件: {}", url.path());
    let data = std::fs::read(url.path())?;
    let model = Self::from_json(&data)?;
    info!("录制文件加载完成，共 {} 个实例", model.recorded.instances().len());
    Ok(model)
  }
}

impl ReplayModel {
  pub fn new(recorded: InferResult) -> Self {
    Self { recorded }
  }

  pub fn from_json(data: &[u8]) -> Result<Self, ReplayModelError> {
    Ok(Self::new(serde_json::from_slice(data)?))
  }
}

impl Model for ReplayModel {
  type Error = Infallible;

  fn infer(&self, image: &RgbImage) -> Result<InferResult, Self::Error> {
    debug!(
      "回放推理: 输入 {}x{}, 输出 {} 个实例",
      image.width(),
      image.height(),
      self.recorded.instances().len()
    );
    Ok(self.recorded.clone())
  }
}
