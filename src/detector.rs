// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector.rs - 装甲板检测流水线
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

use thiserror::Error;

mod blob;
mod config;
mod dispatcher;
mod nms;
mod proposal;

pub use self::blob::build_blob;
pub use self::config::{BlobConfig, DetectorConfig};
pub use self::dispatcher::{ArmorDetector, DetectionHandle, DetectorCallback, Outcome};
pub use self::nms::{DetectionFilter, nms_boxes};
pub use self::proposal::{ProposalDecoder, Proposals};

#[derive(Error, Debug)]
pub enum DetectorError {
  #[error("模型推理失败: {0}")]
  Inference(#[source] Box<dyn std::error::Error + Send + Sync>),
  #[error("输出张量形状不匹配: 期望 1 x N x {columns}, 实际 {shape:?}")]
  OutputShape { columns: usize, shape: Vec<usize> },
  #[error("推理任务在返回结果前退出")]
  WorkerLost,
  #[error("线程池创建失败: {0}")]
  ThreadPool(#[from] rayon::ThreadPoolBuildError),
  #[error("配置无效: {0}")]
  InvalidConfig(String),
}
