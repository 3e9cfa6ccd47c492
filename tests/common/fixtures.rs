use std::io::Cursor;

use image::{ImageFormat, Rgb, RgbImage};
use liefeng::{
  mask::ProbMask,
  model::{InferResult, Model, RawInstance},
  store::{ArtifactId, ArtifactStore, StoreError},
};

/// 总是返回同一份结果的模型
pub struct FixedModel(pub InferResult);

impl Model for FixedModel {
  type Error = std::convert::Infallible;

  fn infer(&self, _image: &RgbImage) -> Result<InferResult, Self::Error> {
    Ok(self.0.clone())
  }
}

#[derive(Debug, thiserror::Error)]
#[error("推理后端不可用")]
pub struct BackendOffline;

pub struct FailingModel;

impl Model for FailingModel {
  type Error = BackendOffline;

  fn infer(&self, _image: &RgbImage) -> Result<InferResult, Self::Error> {
    Err(BackendOffline)
  }
}

/// 写入总是失败的存储，模拟磁盘已满
pub struct FailingStore;

impl ArtifactStore for FailingStore {
  fn put(&self, _image: &RgbImage) -> Result<ArtifactId, StoreError> {
    Err(StoreError::IoError(std::io::Error::other("磁盘已满")))
  }

  fn get(&self, _id: &ArtifactId) -> Result<Option<Vec<u8>>, StoreError> {
    Ok(None)
  }
}

/// 在 `width x height` 的掩码上，`cols x rows` 区域概率为 0.9，其余为 0
pub fn rect_instance(
  width: u32,
  height: u32,
  cols: std::ops::Range<u32>,
  rows: std::ops::Range<u32>,
  confidence: Option<f32>,
) -> RawInstance {
  RawInstance {
    mask: ProbMask::from_fn(width, height, |x, y| {
      if cols.contains(&x) && rows.contains(&y) {
        0.9
      } else {
        0.0
      }
    })
    .unwrap(),
    confidence,
  }
}

pub fn empty_instance(width: u32, height: u32, confidence: f32) -> RawInstance {
  RawInstance {
    mask: ProbMask::from_fn(width, height, |_, _| 0.1).unwrap(),
    confidence: Some(confidence),
  }
}

pub fn test_image(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    Rgb([(x % 251) as u8, (y % 241) as u8, ((x + y) % 7 * 30) as u8])
  })
}

pub fn encode(image: &RgbImage, format: ImageFormat) -> Vec<u8> {
  let mut bytes = Vec::new();
  image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
  bytes
}

pub fn png_bytes(image: &RgbImage) -> Vec<u8> {
  encode(image, ImageFormat::Png)
}

pub fn decode(bytes: &[u8]) -> RgbImage {
  image::load_from_memory(bytes).unwrap().to_rgb8()
}

pub fn assert_close(actual: u32, expected: u32) {
  assert!(
    actual.abs_diff(expected) <= 1,
    "expected {expected} (±1), got {actual}"
  );
}
