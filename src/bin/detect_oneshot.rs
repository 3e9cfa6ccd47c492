// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/bin/detect_oneshot.rs - 单张图像检测
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

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;
use url::Url;

use liefeng::{
  FromUrl,
  model::ReplayModel,
  pipeline::{Pipeline, PipelineConfig},
  store::StoreWrapper,
};

/// Liefeng 单张图像检测参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 replay:///path/to/instances.json
  #[arg(long, value_name = "MODEL", env = "LIEFENG_MODEL")]
  pub model: Url,
  /// 输入图像文件
  #[arg(long, value_name = "FILE")]
  pub input: PathBuf,
  /// 结果存储地址
  #[arg(
    long,
    value_name = "STORE",
    env = "LIEFENG_STORE",
    default_value = "folder:///tmp/result"
  )]
  pub store: Url,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("输入文件: {}", args.input.display());
  info!("存储地址: {}", args.store);

  let data = std::fs::read(&args.input)
    .with_context(|| format!("无法读取输入文件: {}", args.input.display()))?;

  let model = ReplayModel::from_url(&args.model)?;
  let store = StoreWrapper::from_url(&args.store)?;
  let pipeline = Pipeline::new(model, store, PipelineConfig::default());

  let report = pipeline.detect(&data)?;
  println!("{}", serde_json::to_string_pretty(&report)?);

  Ok(())
}
