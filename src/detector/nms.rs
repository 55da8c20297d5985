// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector/nms.rs - 非极大值抑制
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

use tracing::debug;

use crate::model::BoundingBox;

/// 贪心 NMS，与类别无关，在轴对齐外接框上计算 IoU
#[derive(Debug, Clone, Copy)]
pub struct DetectionFilter {
  conf_threshold: f32,
  nms_threshold: f32,
  top_k: usize,
}

impl DetectionFilter {
  pub fn new(conf_threshold: f32, nms_threshold: f32, top_k: usize) -> Self {
    Self {
      conf_threshold,
      nms_threshold,
      top_k,
    }
  }

  /// 返回保留下来的候选下标，按置信度降序
  pub fn filter(&self, boxes: &[BoundingBox], scores: &[f32]) -> Vec<usize> {
    nms_boxes(
      boxes,
      scores,
      self.conf_threshold,
      self.nms_threshold,
      self.top_k,
    )
  }
}

/// `top_k == 0` 时不限制数量
pub fn nms_boxes(
  boxes: &[BoundingBox],
  scores: &[f32],
  conf_threshold: f32,
  nms_threshold: f32,
  top_k: usize,
) -> Vec<usize> {
  let n = boxes.len().min(scores.len());

  let mut order: Vec<usize> = (0..n).filter(|&i| scores[i] >= conf_threshold).collect();
  // 稳定排序，同分时保持原始顺序
  order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

  let mut keep: Vec<usize> = Vec::new();
  for idx in order {
    if top_k > 0 && keep.len() >= top_k {
      break;
    }
    let suppressed = keep
      .iter()
      .any(|&k| boxes[k].iou(&boxes[idx]) > nms_threshold);
    if !suppressed {
      keep.push(idx);
    }
  }

  debug!("NMS: {} 个候选保留 {} 个", n, keep.len());
  keep
}

#[cfg(test)]
mod tests {
  use super::*;

  fn bbox(x: i32, y: i32, w: i32, h: i32) -> BoundingBox {
    BoundingBox {
      x,
      y,
      width: w,
      height: h,
    }
  }

  #[test]
  fn suppresses_overlapping_lower_score() {
    let boxes = [bbox(0, 0, 10, 10), bbox(1, 0, 10, 10), bbox(50, 50, 10, 10)];
    let scores = [0.8, 0.9, 0.7];
    assert_eq!(nms_boxes(&boxes, &scores, 0.5, 0.5, 0), vec![1, 2]);
  }

  #[test]
  fn overlap_equal_to_threshold_is_kept() {
    // IoU = 50 / 150
    let boxes = [bbox(0, 0, 10, 10), bbox(5, 0, 10, 10)];
    let scores = [0.9, 0.8];
    let iou = boxes[0].iou(&boxes[1]);
    assert_eq!(nms_boxes(&boxes, &scores, 0.0, iou, 0), vec![0, 1]);
    assert_eq!(nms_boxes(&boxes, &scores, 0.0, iou - 1e-3, 0), vec![0]);
  }

  #[test]
  fn drops_low_confidence() {
    let boxes = [bbox(0, 0, 10, 10), bbox(20, 0, 10, 10)];
    let scores = [0.5, 0.49];
    assert_eq!(nms_boxes(&boxes, &scores, 0.5, 0.5, 0), vec![0]);
  }

  #[test]
  fn equal_scores_keep_input_order() {
    let boxes = [bbox(0, 0, 10, 10), bbox(20, 0, 10, 10), bbox(40, 0, 10, 10)];
    let scores = [0.7, 0.7, 0.7];
    assert_eq!(nms_boxes(&boxes, &scores, 0.0, 0.5, 0), vec![0, 1, 2]);
  }

  #[test]
  fn top_k_keeps_best_survivors() {
    // 第 1 个被第 0 个抑制，剩下的按分数取前 3
    let boxes = [
      bbox(0, 0, 10, 10),
      bbox(0, 0, 10, 10),
      bbox(20, 0, 10, 10),
      bbox(40, 0, 10, 10),
      bbox(60, 0, 10, 10),
      bbox(80, 0, 10, 10),
    ];
    let scores = [0.99, 0.98, 0.6, 0.9, 0.7, 0.8];
    let filter = DetectionFilter::new(0.5, 0.45, 3);
    assert_eq!(filter.filter(&boxes, &scores), vec![0, 3, 5]);
  }

  #[test]
  fn filtering_survivors_again_is_identity() {
    let boxes = [
      bbox(0, 0, 20, 20),
      bbox(2, 2, 20, 20),
      bbox(15, 15, 20, 20),
      bbox(100, 100, 5, 5),
      bbox(101, 100, 5, 5),
    ];
    let scores = [0.9, 0.85, 0.8, 0.7, 0.95];
    let filter = DetectionFilter::new(0.5, 0.3, 0);
    let first = filter.filter(&boxes, &scores);

    let survivor_boxes: Vec<_> = first.iter().map(|&i| boxes[i]).collect();
    let survivor_scores: Vec<_> = first.iter().map(|&i| scores[i]).collect();
    let second = filter.filter(&survivor_boxes, &survivor_scores);
    assert_eq!(second, (0..first.len()).collect::<Vec<_>>());
  }
}
