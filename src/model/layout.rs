// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/layout.rs - 输出张量列布局
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

use std::ops::Range;

pub const POINT_VALUES: usize = 8;
pub const CONFIDENCE_COLUMN: usize = 8;

/// 每行候选的列偏移表，与导出模型的约定一致。
///
/// | 0..8 四个角点 (x, y) | 8 置信度 | 颜色得分 | 编号得分 |
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputLayout {
  num_colors: usize,
  num_classes: usize,
}

impl Default for OutputLayout {
  fn default() -> Self {
    Self::new(4, 8)
  }
}

impl OutputLayout {
  pub fn new(num_colors: usize, num_classes: usize) -> Self {
    Self {
      num_colors,
      num_classes,
    }
  }

  pub fn num_colors(&self) -> usize {
    self.num_colors
  }

  pub fn num_classes(&self) -> usize {
    self.num_classes
  }

  pub fn points(&self) -> Range<usize> {
    0..POINT_VALUES
  }

  pub fn confidence(&self) -> usize {
    CONFIDENCE_COLUMN
  }

  pub fn colors(&self) -> Range<usize> {
    let start = CONFIDENCE_COLUMN + 1;
    start..start + self.num_colors
  }

  pub fn classes(&self) -> Range<usize> {
    let start = self.colors().end;
    start..start + self.num_classes
  }

  pub fn columns(&self) -> usize {
    self.classes().end
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_layout_has_21_columns() {
    let layout = OutputLayout::default();
    assert_eq!(layout.colors(), 9..13);
    assert_eq!(layout.classes(), 13..21);
    assert_eq!(layout.columns(), 21);
  }

  #[test]
  fn ranges_follow_counts() {
    let layout = OutputLayout::new(2, 3);
    assert_eq!(layout.confidence(), 8);
    assert_eq!(layout.colors(), 9..11);
    assert_eq!(layout.classes(), 11..14);
    assert_eq!(layout.columns(), 14);
  }
}
