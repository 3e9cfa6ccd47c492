// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/store/directory_store.rs - 目录存储
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

use std::{
  io::ErrorKind,
  path::{Path, PathBuf},
};

use image::RgbImage;
use tracing::{debug, info, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  store::{ArtifactId, ArtifactStore, StoreError, encode_artifact},
};

/// 每个结果保存为 `<目录>/<标识>.png`
pub struct DirectoryStore {
  directory: PathBuf,
}

impl FromUrlWithScheme for DirectoryStore {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryStore {
  type Error = StoreError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(StoreError::SchemeMismatch(uri.scheme().to_string()));
    }

    Self::new(uri.path())
  }
}

impl DirectoryStore {
  /// 目录不存在时会被创建
  pub fn new(directory: impl Into<PathBuf>) -> Result<Self, StoreError> {
    let directory = directory.into();
    std::fs::create_dir_all(&directory)?;
    info!("结果保存目录: {}", directory.display());
    Ok(Self { directory })
  }

  pub fn directory(&self) -> &Path {
    &self.directory
  }

  fn artifact_path(&self, id: &ArtifactId) -> PathBuf {
    self.directory.join(format!("{id}.png"))
  }
}

/// 先写入临时文件再重命名，读取方不会看到写了一半的文件。
/// 任一步失败都会删除临时文件。
fn write_then_rename(partial: &Path, path: &Path, bytes: &[u8]) -> std::io::Result<()> {
  let result = std::fs::write(partial, bytes).and_then(|_| std::fs::rename(partial, path));
  if result.is_err() {
    let _ = std::fs::remove_file(partial);
  }
  result
}

impl ArtifactStore for DirectoryStore {
  fn put(&self, image: &RgbImage) -> Result<ArtifactId, StoreError> {
    let id = ArtifactId::generate();
    let bytes = encode_artifact(image)?;

    let partial = self.directory.join(format!(".{id}.png.partial"));
    let path = self.artifact_path(&id);
    write_then_rename(&partial, &path, &bytes)?;

    debug!("保存结果 {} 到文件: {} ({} 字节)", id, path.display(), bytes.len());
    Ok(id)
  }

  fn get(&self, id: &ArtifactId) -> Result<Option<Vec<u8>>, StoreError> {
    let path = self.artifact_path(id);
    match std::fs::read(&path) {
      Ok(bytes) => Ok(Some(bytes)),
      Err(e) if e.kind() == ErrorKind::NotFound => {
        warn!("结果文件不存在: {}", path.display());
        Ok(None)
      }
      Err(e) => Err(e.into()),
    }
  }
}
