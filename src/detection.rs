// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/detection.rs - 检测结果汇总
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

use serde::Serialize;
use tracing::debug;

use crate::{mask::MaskError, model::RawInstance};

/// 原图像素坐标系下的轴对齐边框
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct BoundingBox {
  pub x: u32,
  pub y: u32,
  pub width: u32,
  pub height: u32,
}

impl BoundingBox {
  /// 由前景像素的极值坐标构造，`width = x_max - x_min`
  pub fn from_extremes(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Self {
    Self {
      x: x_min,
      y: y_min,
      width: x_max - x_min,
      height: y_max - y_min,
    }
  }

  pub fn x_max(&self) -> u32 {
    self.x + self.width
  }

  pub fn y_max(&self) -> u32 {
    self.y + self.height
  }

  pub fn contains(&self, x: u32, y: u32) -> bool {
    (self.x..=self.x_max()).contains(&x) && (self.y..=self.y_max()).contains(&y)
  }

  pub fn fits_within(&self, width: u32, height: u32) -> bool {
    self.x_max() < width && self.y_max() < height
  }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionRecord {
  /// 在模型输出中的序号，从 1 开始
  pub ordinal: usize,
  pub bbox: BoundingBox,
  pub confidence: f32,
}

/// 单张图像的检测汇总，尚未渲染也未持久化
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DetectionSummary {
  pub has_detection: bool,
  pub max_confidence: f32,
  pub records: Box<[DetectionRecord]>,
}

impl DetectionSummary {
  pub fn count(&self) -> usize {
    self.records.len()
  }
}

/// 逐个实例缩放掩码、求外接框并汇总。
///
/// 掩码为空的实例被直接跳过，不占用记录也不影响最大置信度；
/// 序号保持模型输出中的原始位置。
pub fn aggregate(
  width: u32,
  height: u32,
  instances: &[RawInstance],
) -> Result<DetectionSummary, MaskError> {
  let mut records = Vec::with_capacity(instances.len());
  let mut max_confidence = 0.0f32;

  for (idx, instance) in instances.iter().enumerate() {
    let ordinal = idx + 1;
    let binary = instance.mask.rescale(width, height)?;

    let Some(bbox) = binary.bounding_box() else {
      debug!("实例 {} 掩码为空，跳过", ordinal);
      continue;
    };

    let confidence = instance.confidence();
    debug!(
      "实例 {}: 置信度 {:.4}, 边框 ({}, {}, {}x{})",
      ordinal, confidence, bbox.x, bbox.y, bbox.width, bbox.height
    );

    max_confidence = max_confidence.max(confidence);
    records.push(DetectionRecord {
      ordinal,
      bbox,
      confidence,
    });
  }

  Ok(DetectionSummary {
    has_detection: !records.is_empty(),
    max_confidence,
    records: records.into_boxed_slice(),
  })
}
