// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector/proposal.rs - 候选框解码
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

use ndarray::{ArrayView1, Axis, s};
use tracing::debug;

use crate::{
  detector::DetectorError,
  model::{
    ArmorColor, ArmorNumber, ArmorObject, BoundingBox, OutputLayout, OutputTensor, Point2,
    WithLabel,
  },
  transform::Affine,
};

/// 通过置信度阈值的候选，三个数组按输出行顺序一一对应
#[derive(Debug, Clone, Default)]
pub struct Proposals {
  pub objects: Vec<ArmorObject>,
  pub boxes: Vec<BoundingBox>,
  pub scores: Vec<f32>,
}

impl Proposals {
  pub fn len(&self) -> usize {
    self.objects.len()
  }

  pub fn is_empty(&self) -> bool {
    self.objects.is_empty()
  }

  /// 按下标取出对应的检测结果
  pub fn select(self, indices: &[usize]) -> Vec<ArmorObject> {
    let mut objects: Vec<Option<ArmorObject>> = self.objects.into_iter().map(Some).collect();
    indices
      .iter()
      .filter_map(|&i| objects.get_mut(i).and_then(Option::take))
      .collect()
  }
}

/// 第一个最大值的下标
fn arg_max(values: ArrayView1<f32>) -> usize {
  let mut best = 0;
  let mut best_value = f32::NEG_INFINITY;
  for (i, &v) in values.iter().enumerate() {
    if v > best_value {
      best = i;
      best_value = v;
    }
  }
  best
}

#[derive(Debug, Clone, Copy)]
pub struct ProposalDecoder {
  layout: OutputLayout,
  conf_threshold: f32,
}

impl ProposalDecoder {
  pub fn new(layout: OutputLayout, conf_threshold: f32) -> Self {
    Self {
      layout,
      conf_threshold,
    }
  }

  pub fn layout(&self) -> &OutputLayout {
    &self.layout
  }

  /// 解码 1 x rows x columns 的输出张量，角点经 `transform` 映射回源图像坐标
  pub fn decode(
    &self,
    output: &OutputTensor,
    transform: &Affine,
  ) -> Result<Proposals, DetectorError> {
    let shape = output.shape();
    if shape[0] != 1 || shape[2] != self.layout.columns() {
      return Err(DetectorError::OutputShape {
        columns: self.layout.columns(),
        shape: shape.to_vec(),
      });
    }

    let rows = output.index_axis(Axis(0), 0);
    let mut proposals = Proposals::default();

    for row in rows.rows() {
      let confidence = row[self.layout.confidence()];
      // 阈值包含等号，NaN 被丢弃
      if !(confidence >= self.conf_threshold) {
        continue;
      }

      let color = arg_max(row.slice(s![self.layout.colors()]));
      let number = arg_max(row.slice(s![self.layout.classes()]));

      let mut pts = [Point2::default(); 4];
      for (i, p) in pts.iter_mut().enumerate() {
        *p = transform.apply(Point2::new(row[2 * i], row[2 * i + 1]));
      }
      let bbox = BoundingBox::enclosing(&pts);

      proposals.objects.push(ArmorObject {
        pts,
        bbox,
        color: ArmorColor::from_label_id(color as u32),
        number: ArmorNumber::from_label_id(number as u32),
        prob: confidence,
      });
      proposals.boxes.push(bbox);
      proposals.scores.push(confidence);
    }

    debug!(
      "候选解码: {} 行中 {} 个通过阈值 {}",
      rows.nrows(),
      proposals.len(),
      self.conf_threshold
    );
    Ok(proposals)
  }
}
