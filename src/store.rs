// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/store.rs - 标注结果存储
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

use std::{fmt, io::Cursor, str::FromStr, sync::Arc};

use image::{ImageFormat, RgbImage};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::FromUrl;
#[cfg(any(feature = "directory_store", feature = "memory_store"))]
use crate::FromUrlWithScheme;

/// 存储的图像格式，无损以保证未标注的图像与原图逐像素一致
pub const ARTIFACT_FORMAT: ImageFormat = ImageFormat::Png;
pub const ARTIFACT_CONTENT_TYPE: &str = "image/png";

/// 随机生成的不透明标识，不包含顺序或数量信息
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(Uuid);

impl ArtifactId {
  pub fn generate() -> Self {
    Self(Uuid::new_v4())
  }
}

impl fmt::Display for ArtifactId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0.hyphenated())
  }
}

impl FromStr for ArtifactId {
  type Err = uuid::Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Uuid::parse_str(s).map(Self)
  }
}

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像编码错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// 扁平的键值存储：标识 -> 编码后的图像。
///
/// 写入后不可变；`get` 对未知或已被外部清理的标识返回 `Ok(None)`。
pub trait ArtifactStore {
  fn put(&self, image: &RgbImage) -> Result<ArtifactId, StoreError>;
  fn get(&self, id: &ArtifactId) -> Result<Option<Vec<u8>>, StoreError>;
}

impl<S: ArtifactStore + ?Sized> ArtifactStore for Arc<S> {
  fn put(&self, image: &RgbImage) -> Result<ArtifactId, StoreError> {
    (**self).put(image)
  }

  fn get(&self, id: &ArtifactId) -> Result<Option<Vec<u8>>, StoreError> {
    (**self).get(id)
  }
}

pub(crate) fn encode_artifact(image: &RgbImage) -> Result<Vec<u8>, StoreError> {
  let mut bytes = Vec::new();
  image.write_to(&mut Cursor::new(&mut bytes), ARTIFACT_FORMAT)?;
  Ok(bytes)
}

#[cfg(feature = "directory_store")]
mod directory_store;
#[cfg(feature = "directory_store")]
pub use self::directory_store::DirectoryStore;

#[cfg(feature = "memory_store")]
mod memory_store;
#[cfg(feature = "memory_store")]
pub use self::memory_store::MemoryStore;

pub enum StoreWrapper {
  #[cfg(feature = "directory_store")]
  DirectoryStore(DirectoryStore),
  #[cfg(feature = "memory_store")]
  MemoryStore(MemoryStore),
}

impl FromUrl for StoreWrapper {
  type Error = StoreError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      #[cfg(feature = "directory_store")]
      DirectoryStore::SCHEME => Ok(StoreWrapper::DirectoryStore(DirectoryStore::from_url(url)?)),
      #[cfg(feature = "memory_store")]
      MemoryStore::SCHEME => Ok(StoreWrapper::MemoryStore(MemoryStore::from_url(url)?)),
      scheme => Err(StoreError::SchemeMismatch(scheme.to_string())),
    }
  }
}

impl ArtifactStore for StoreWrapper {
  fn put(&self, image: &RgbImage) -> Result<ArtifactId, StoreError> {
    match self {
      #[cfg(feature = "directory_store")]
      StoreWrapper::DirectoryStore(store) => store.put(image),
      #[cfg(feature = "memory_store")]
      StoreWrapper::MemoryStore(store) => store.put(image),
    }
  }

  fn get(&self, id: &ArtifactId) -> Result<Option<Vec<u8>>, StoreError> {
    match self {
      #[cfg(feature = "directory_store")]
      StoreWrapper::DirectoryStore(store) => store.get(id),
      #[cfg(feature = "memory_store")]
      StoreWrapper::MemoryStore(store) => store.get(id),
    }
  }
}
