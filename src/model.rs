// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/model.rs - 模型
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

use image::RgbImage;
use serde::Deserialize;

use crate::mask::ProbMask;

/// 分割模型。推理对调用方是同步的，实现需要允许多个请求并发调用。
pub trait Model {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, image: &RgbImage) -> Result<InferResult, Self::Error>;
}

impl<M: Model + ?Sized> Model for std::sync::Arc<M> {
  type Error = M::Error;

  fn infer(&self, image: &RgbImage) -> Result<InferResult, Self::Error> {
    (**self).infer(image)
  }
}

/// 模型给出的单个实例
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawInstance {
  pub mask: ProbMask,
  #[serde(default)]
  pub confidence: Option<f32>,
}

impl RawInstance {
  /// 缺失的置信度按 0 处理
  pub fn confidence(&self) -> f32 {
    self.confidence.unwrap_or(0.0)
  }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct InferResult {
  /// `None` 表示模型没有给出任何掩码，与空列表等价
  #[serde(default)]
  pub instances: Option<Box<[RawInstance]>>,
}

impl InferResult {
  pub fn instances(&self) -> &[RawInstance] {
    self.instances.as_deref().unwrap_or(&[])
  }

  pub fn is_empty(&self) -> bool {
    self.instances().is_empty()
  }
}

impl From<Vec<RawInstance>> for InferResult {
  fn from(instances: Vec<RawInstance>) -> Self {
    Self {
      instances: Some(instances.into_boxed_slice()),
    }
  }
}

#[cfg(feature = "model_replay")]
mod replay;
#[cfg(feature = "model_replay")]
pub use self::replay::{ReplayModel, ReplayModelError};
