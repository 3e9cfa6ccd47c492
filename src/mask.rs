// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/mask.rs - 实例掩码的缩放与二值化
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

use image::{
  GrayImage, ImageBuffer, Luma,
  imageops::{self, FilterType},
};
use serde::Deserialize;
use thiserror::Error;

use crate::detection::BoundingBox;

/// 缩放到 0..=255 后严格大于该值的像素视为前景（即 0.5 概率）
pub const MASK_FOREGROUND_THRESHOLD: u8 = 127;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MaskError {
  #[error("掩码尺寸无效: {width}x{height}")]
  InvalidShape { width: u32, height: u32 },
  #[error("掩码数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
  #[error("目标尺寸无效: {width}x{height}")]
  InvalidTarget { width: u32, height: u32 },
}

fn check_shape(width: u32, height: u32, len: usize) -> Result<(), MaskError> {
  if width == 0 || height == 0 {
    return Err(MaskError::InvalidShape { width, height });
  }
  let expected = width as usize * height as usize;
  if len != expected {
    return Err(MaskError::LengthMismatch {
      expected,
      actual: len,
    });
  }
  Ok(())
}

/// 模型输出分辨率下的概率掩码，按行优先存储，取值范围 [0, 1]
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ProbMaskRepr")]
pub struct ProbMask {
  width: u32,
  height: u32,
  data: Box<[f32]>,
}

#[derive(Deserialize)]
struct ProbMaskRepr {
  width: u32,
  height: u32,
  data: Vec<f32>,
}

impl TryFrom<ProbMaskRepr> for ProbMask {
  type Error = MaskError;

  fn try_from(repr: ProbMaskRepr) -> Result<Self, Self::Error> {
    ProbMask::new(repr.width, repr.height, repr.data)
  }
}

impl ProbMask {
  pub fn new(width: u32, height: u32, data: Vec<f32>) -> Result<Self, MaskError> {
    check_shape(width, height, data.len())?;
    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn from_fn(
    width: u32,
    height: u32,
    f: impl Fn(u32, u32) -> f32,
  ) -> Result<Self, MaskError> {
    let data = (0..height)
      .flat_map(|y| (0..width).map(move |x| (x, y)))
      .map(|(x, y)| f(x, y))
      .collect();
    Self::new(width, height, data)
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn get(&self, x: u32, y: u32) -> f32 {
    self.data[(y as usize) * (self.width as usize) + (x as usize)]
  }

  /// 将掩码缩放到原图分辨率并二值化。
  ///
  /// 先把概率量化到 u8（截断，与 `mask * 255` 后转 u8 一致），再用最近邻插值缩放，
  /// 保证边缘不会出现插值产生的中间值，最后以 [`MASK_FOREGROUND_THRESHOLD`] 二值化。
  pub fn rescale(&self, width: u32, height: u32) -> Result<BinaryMask, MaskError> {
    if width == 0 || height == 0 {
      return Err(MaskError::InvalidTarget { width, height });
    }

    let quantized: GrayImage = ImageBuffer::from_fn(self.width, self.height, |x, y| {
      Luma([probability_to_u8(self.get(x, y))])
    });
    let resized = imageops::resize(&quantized, width, height, FilterType::Nearest);

    Ok(BinaryMask::from_gray(&resized))
  }
}

fn probability_to_u8(p: f32) -> u8 {
  // NaN 经 `as` 转换为 0
  (p.clamp(0.0, 1.0) * 255.0) as u8
}

/// 原图分辨率下的二值掩码
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryMask {
  width: u32,
  height: u32,
  data: Box<[bool]>,
}

impl BinaryMask {
  pub fn new(width: u32, height: u32, data: Vec<bool>) -> Result<Self, MaskError> {
    check_shape(width, height, data.len())?;
    Ok(Self {
      width,
      height,
      data: data.into_boxed_slice(),
    })
  }

  pub fn from_gray(image: &GrayImage) -> Self {
    Self {
      width: image.width(),
      height: image.height(),
      data: image
        .pixels()
        .map(|Luma([v])| *v > MASK_FOREGROUND_THRESHOLD)
        .collect(),
    }
  }

  pub fn width(&self) -> u32 {
    self.width
  }

  pub fn height(&self) -> u32 {
    self.height
  }

  pub fn is_foreground(&self, x: u32, y: u32) -> bool {
    self.data[(y as usize) * (self.width as usize) + (x as usize)]
  }

  pub fn foreground_count(&self) -> usize {
    self.data.iter().filter(|v| **v).count()
  }

  /// 前景像素的紧致外接矩形，没有前景时返回 `None`
  pub fn bounding_box(&self) -> Option<BoundingBox> {
    let width = self.width as usize;
    self
      .data
      .iter()
      .enumerate()
      .filter(|(_, v)| **v)
      .map(|(idx, _)| ((idx % width) as u32, (idx / width) as u32))
      .fold(None::<(u32, u32, u32, u32)>, |extent, (x, y)| {
        Some(match extent {
          None => (x, y, x, y),
          Some((x_min, y_min, x_max, y_max)) => {
            (x_min.min(x), y_min.min(y), x_max.max(x), y_max.max(y))
          }
        })
      })
      .map(|(x_min, y_min, x_max, y_max)| BoundingBox::from_extremes(x_min, y_min, x_max, y_max))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn rect_mask(
    width: u32,
    height: u32,
    cols: std::ops::Range<u32>,
    rows: std::ops::Range<u32>,
  ) -> ProbMask {
    ProbMask::from_fn(width, height, |x, y| {
      if cols.contains(&x) && rows.contains(&y) {
        0.9
      } else {
        0.0
      }
    })
    .unwrap()
  }

  fn assert_close(actual: u32, expected: u32) {
    assert!(
      actual.abs_diff(expected) <= 1,
      "expected {expected} (±1), got {actual}"
    );
  }

  #[test]
  fn rejects_bad_shapes() {
    assert_eq!(
      ProbMask::new(0, 4, vec![]),
      Err(MaskError::InvalidShape { width: 0, height: 4 })
    );
    assert_eq!(
      ProbMask::new(2, 2, vec![0.0; 3]),
      Err(MaskError::LengthMismatch {
        expected: 4,
        actual: 3
      })
    );
  }

  #[test]
  fn rescale_rejects_empty_target() {
    let mask = rect_mask(4, 4, 0..2, 0..2);
    assert_eq!(
      mask.rescale(0, 10),
      Err(MaskError::InvalidTarget {
        width: 0,
        height: 10
      })
    );
    assert!(mask.rescale(10, 0).is_err());
  }

  #[test]
  fn threshold_is_strictly_above_half() {
    let mask = ProbMask::new(4, 1, vec![0.5, 0.502, 1.0, f32::NAN]).unwrap();
    let binary = mask.rescale(4, 1).unwrap();
    assert!(!binary.is_foreground(0, 0));
    assert!(binary.is_foreground(1, 0));
    assert!(binary.is_foreground(2, 0));
    assert!(!binary.is_foreground(3, 0));
  }

  #[test]
  fn rescale_keeps_hard_edges() {
    let mask = rect_mask(8, 8, 2..6, 2..6);
    let binary = mask.rescale(32, 32).unwrap();
    assert_eq!(binary.width(), 32);
    assert_eq!(binary.height(), 32);
    // 最近邻放大 4 倍后前景面积正好是 16 * 16
    assert_eq!(binary.foreground_count(), 16 * 16);
  }

  #[test]
  fn empty_mask_has_no_box() {
    let mask = ProbMask::from_fn(16, 16, |_, _| 0.3).unwrap();
    let binary = mask.rescale(64, 48).unwrap();
    assert_eq!(binary.foreground_count(), 0);
    assert_eq!(binary.bounding_box(), None);
  }

  #[test]
  fn box_is_tight() {
    let shapes: [&[(u32, u32)]; 4] = [
      &[(3, 4)],
      &[(0, 0), (9, 7)],
      &[(2, 1), (2, 2), (2, 3), (3, 3), (4, 3)],
      &[(5, 0), (0, 5), (9, 5), (5, 7)],
    ];

    for points in shapes {
      let mut data = vec![false; 10 * 8];
      for (x, y) in points {
        data[(*y * 10 + *x) as usize] = true;
      }
      let mask = BinaryMask::new(10, 8, data).unwrap();
      let bbox = mask.bounding_box().unwrap();

      for (x, y) in points {
        assert!(bbox.contains(*x, *y), "{bbox:?} misses ({x}, {y})");
      }
      assert!(points.iter().any(|(x, _)| *x == bbox.x));
      assert!(points.iter().any(|(_, y)| *y == bbox.y));
      assert!(points.iter().any(|(x, _)| *x == bbox.x + bbox.width));
      assert!(points.iter().any(|(_, y)| *y == bbox.y + bbox.height));
    }
  }

  #[test]
  fn single_pixel_box_has_zero_extent() {
    let mut data = vec![false; 25];
    data[12] = true;
    let bbox = BinaryMask::new(5, 5, data).unwrap().bounding_box().unwrap();
    assert_eq!(bbox, BoundingBox::from_extremes(2, 2, 2, 2));
    assert_eq!((bbox.width, bbox.height), (0, 0));
  }

  #[test]
  fn box_maps_into_original_resolution() {
    let mask = rect_mask(160, 160, 20..60, 10..50);
    let binary = mask.rescale(640, 640).unwrap();
    let bbox = binary.bounding_box().unwrap();

    assert_close(bbox.x, 80);
    assert_close(bbox.y, 40);
    assert_close(bbox.width, 160);
    assert_close(bbox.height, 160);
    assert!(bbox.fits_within(640, 640));
  }

  #[test]
  fn non_square_target_stays_in_bounds() {
    let mask = ProbMask::from_fn(160, 160, |_, _| 1.0).unwrap();
    let bbox = mask.rescale(333, 97).unwrap().bounding_box().unwrap();
    assert_eq!(bbox, BoundingBox::from_extremes(0, 0, 332, 96));
    assert!(bbox.fits_within(333, 97));
  }

  #[test]
  fn rescale_round_trip_is_resolution_invariant() {
    let mask = rect_mask(40, 30, 7..21, 5..13);
    let original = mask.rescale(40, 30).unwrap().bounding_box().unwrap();

    let up = mask.rescale(120, 90).unwrap();
    let back = ProbMask::from_fn(120, 90, |x, y| {
      if up.is_foreground(x, y) {
        1.0
      } else {
        0.0
      }
    })
    .unwrap()
    .rescale(40, 30)
    .unwrap()
    .bounding_box()
    .unwrap();

    assert_close(back.x, original.x);
    assert_close(back.y, original.y);
    assert_close(back.width, original.width);
    assert_close(back.height, original.height);
  }
}
