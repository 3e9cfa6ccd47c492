// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/store/memory_store.rs - 进程内存储
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
  collections::HashMap,
  sync::{Arc, PoisonError, RwLock},
};

use image::RgbImage;
use tracing::debug;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  store::{ArtifactId, ArtifactStore, StoreError, encode_artifact},
};

/// 结果只保存在进程内，进程退出即丢失
#[derive(Default)]
pub struct MemoryStore {
  artifacts: RwLock<HashMap<ArtifactId, Arc<[u8]>>>,
}

impl FromUrlWithScheme for MemoryStore {
  const SCHEME: &'static str = "memory";
}

impl FromUrl for MemoryStore {
  type Error = StoreError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(StoreError::SchemeMismatch(uri.scheme().to_string()));
    }
    Ok(Self::default())
  }
}

impl MemoryStore {
  pub fn len(&self) -> usize {
    self
      .artifacts
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

impl ArtifactStore for MemoryStore {
  fn put(&self, image: &RgbImage) -> Result<ArtifactId, StoreError> {
    let id = ArtifactId::generate();
    let bytes: Arc<[u8]> = encode_artifact(image)?.into();
    debug!("保存结果 {} 到内存 ({} 字节)", id, bytes.len());

    self
      .artifacts
      .write()
      .unwrap_or_else(PoisonError::into_inner)
      .insert(id, bytes);
    Ok(id)
  }

  fn get(&self, id: &ArtifactId) -> Result<Option<Vec<u8>>, StoreError> {
    let artifacts = self.artifacts.read().unwrap_or_else(PoisonError::into_inner);
    Ok(artifacts.get(id).map(|bytes| bytes.to_vec()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn put_then_get_round_trips() {
    let store = MemoryStore::default();
    assert!(store.is_empty());

    let id = store.put(&RgbImage::new(5, 3)).unwrap();
    let bytes = store.get(&id).unwrap().unwrap();
    let decoded = image::load_from_memory(&bytes).unwrap();
    assert_eq!((decoded.width(), decoded.height()), (5, 3));
    assert_eq!(store.get(&ArtifactId::generate()).unwrap(), None);
  }

  #[test]
  fn concurrent_puts_do_not_collide() {
    let store = Arc::new(MemoryStore::default());
    let handles: Vec<_> = (0..8)
      .map(|_| {
        let store = Arc::clone(&store);
        std::thread::spawn(move || {
          (0..4)
            .map(|_| store.put(&RgbImage::new(2, 2)).unwrap())
            .collect::<Vec<_>>()
        })
      })
      .collect();

    let mut ids: Vec<_> = handles
      .into_iter()
      .flat_map(|handle| handle.join().unwrap())
      .collect();
    ids.sort_by_key(|id| id.to_string());
    ids.dedup();

    assert_eq!(ids.len(), 32);
    assert_eq!(store.len(), 32);
  }
}
