// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/replay.rs - 回放录制的输出张量
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

use ndarray::Array3;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  model::{InputTensor, Model, OutputTensor},
};

#[derive(Error, Debug)]
pub enum ReplayError {
  #[error("URI scheme 不匹配: 期望 '{expected}', 实际 '{actual}'")]
  SchemeMismatch { expected: String, actual: String },
  #[error("读取张量文件失败: {0}")]
  Io(#[from] std::io::Error),
  #[error("解析张量文件失败: {0}")]
  Json(#[from] serde_json::Error),
  #[error("张量文件格式错误: {0}")]
  Format(String),
  #[error("参数错误: {0}")]
  InvalidParameter(String),
  #[error("输入张量形状不匹配: 期望 {expected:?}, 实际 {actual:?}")]
  InputShape {
    expected: [usize; 4],
    actual: Vec<usize>,
  },
}

/// 每次推理都返回同一个录制张量的模型，用于在没有推理后端时驱动流水线
#[derive(Debug, Clone)]
pub struct ReplayModel {
  output: OutputTensor,
  input_size: Option<(usize, usize)>,
}

impl ReplayModel {
  pub fn new(output: OutputTensor) -> Self {
    Self {
      output,
      input_size: None,
    }
  }

  /// 要求输入张量为 1x3xHxW
  pub fn with_input_size(mut self, width: usize, height: usize) -> Self {
    self.input_size = Some((width, height));
    self
  }

  pub fn output(&self) -> &OutputTensor {
    &self.output
  }
}

impl Model for ReplayModel {
  type Error = ReplayError;

  fn infer(&self, input: &InputTensor) -> Result<OutputTensor, Self::Error> {
    if let Some((width, height)) = self.input_size {
      let expected = [1, 3, height, width];
      if input.shape() != expected.as_slice() {
        error!("输入张量形状不匹配: {:?}", input.shape());
        return Err(ReplayError::InputShape {
          expected,
          actual: input.shape().to_vec(),
        });
      }
    }
    Ok(self.output.clone())
  }
}

const REPLAY_SCHEME: &str = "replay";

pub struct ReplayModelBuilder {
  tensor_path: String,
  input_size: Option<(usize, usize)>,
}

impl FromUrl for ReplayModelBuilder {
  type Error = ReplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != REPLAY_SCHEME {
      return Err(ReplayError::SchemeMismatch {
        expected: REPLAY_SCHEME.to_string(),
        actual: url.scheme().to_string(),
      });
    }

    let mut input_size = None;
    for (key, value) in url.query_pairs() {
      if key == "size" {
        input_size = Some(parse_size(&value)?);
      }
    }

    Ok(ReplayModelBuilder {
      tensor_path: url.path().to_string(),
      input_size,
    })
  }
}

impl FromUrlWithScheme for ReplayModelBuilder {
  const SCHEME: &'static str = REPLAY_SCHEME;
}

impl ReplayModelBuilder {
  pub fn build(self) -> Result<ReplayModel, ReplayError> {
    info!("加载录制张量: {}", self.tensor_path);
    let text = std::fs::read_to_string(&self.tensor_path)?;
    let output = parse_tensor(&text)?;
    debug!("录制张量形状: {:?}", output.shape());

    let model = ReplayModel::new(output);
    Ok(match self.input_size {
      Some((w, h)) => model.with_input_size(w, h),
      None => model,
    })
  }
}

fn parse_size(value: &str) -> Result<(usize, usize), ReplayError> {
  let invalid = || ReplayError::InvalidParameter(format!("size={}", value));
  let (w, h) = value.split_once(['x', 'X']).ok_or_else(invalid)?;
  let w = w.trim().parse().map_err(|_| invalid())?;
  let h = h.trim().parse().map_err(|_| invalid())?;
  Ok((w, h))
}

/// 解析 `{"shape": [1, rows, cols], "data": [...]}`
pub fn parse_tensor(text: &str) -> Result<OutputTensor, ReplayError> {
  let value: Value = serde_json::from_str(text)?;

  let shape = value
    .get("shape")
    .and_then(Value::as_array)
    .ok_or_else(|| ReplayError::Format("缺少 shape 字段".to_string()))?
    .iter()
    .map(|v| v.as_u64().map(|n| n as usize))
    .collect::<Option<Vec<_>>>()
    .ok_or_else(|| ReplayError::Format("shape 必须为非负整数".to_string()))?;

  let &[batch, rows, cols] = shape.as_slice() else {
    return Err(ReplayError::Format(format!(
      "shape 必须为三维, 实际为 {:?}",
      shape
    )));
  };

  let data = value
    .get("data")
    .and_then(Value::as_array)
    .ok_or_else(|| ReplayError::Format("缺少 data 字段".to_string()))?
    .iter()
    .map(|v| v.as_f64().map(|n| n as f32))
    .collect::<Option<Vec<_>>>()
    .ok_or_else(|| ReplayError::Format("data 必须为数值".to_string()))?;

  Array3::from_shape_vec((batch, rows, cols), data)
    .map_err(|e| ReplayError::Format(format!("数据长度与 shape 不一致: {}", e)))
}
