#![allow(dead_code)]

mod fixtures;
pub use fixtures::*;

pub use image::RgbImage;
pub use liefeng::{
  model::{InferResult, Model},
  pipeline::{Pipeline, PipelineConfig, PipelineError},
  store::{ArtifactId, ArtifactStore, MemoryStore},
};
