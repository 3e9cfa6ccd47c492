// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/bin/serve.rs - HTTP 检测服务
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

use std::{net::SocketAddr, sync::Arc};

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use url::Url;

use liefeng::{
  FromUrl,
  model::ReplayModel,
  pipeline::{Pipeline, PipelineConfig},
  server,
  store::StoreWrapper,
};

/// Liefeng 检测服务参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型地址，例如 replay:///path/to/instances.json
  #[arg(long, value_name = "MODEL", env = "LIEFENG_MODEL")]
  pub model: Url,
  /// 结果存储地址，支持 folder:///path 与 memory://
  #[arg(
    long,
    value_name = "STORE",
    env = "LIEFENG_STORE",
    default_value = "folder:///tmp/result"
  )]
  pub store: Url,
  /// 监听地址
  #[arg(
    long,
    value_name = "ADDR",
    env = "LIEFENG_LISTEN",
    default_value = "0.0.0.0:8000"
  )]
  pub listen: SocketAddr,
  /// 请求体大小上限（MiB）
  #[arg(long, value_name = "MB", env = "LIEFENG_BODY_LIMIT_MB", default_value_t = 20)]
  pub body_limit_mb: usize,
  /// 报告中结果图像地址的前缀
  #[arg(long, value_name = "PREFIX", default_value = "/result/")]
  pub result_url_prefix: String,
}

async fn shutdown_signal() {
  if let Err(e) = tokio::signal::ctrl_c().await {
    error!("无法监听中断信号: {}", e);
    return;
  }
  info!("收到中断信号，准备退出...");
}

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .init();

  let args = Args::parse();

  info!("模型地址: {}", args.model);
  info!("存储地址: {}", args.store);

  let model = ReplayModel::from_url(&args.model)?;
  let store = StoreWrapper::from_url(&args.store)?;
  let config = PipelineConfig {
    result_url_prefix: args.result_url_prefix,
    ..PipelineConfig::default()
  };
  let pipeline = Arc::new(Pipeline::new(model, store, config));

  let app = server::router(pipeline, server::body_limit_from_mib(args.body_limit_mb));
  let listener = tokio::net::TcpListener::bind(args.listen).await?;
  info!("服务监听于 http://{}", args.listen);

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await?;

  info!("服务已退出");
  Ok(())
}
