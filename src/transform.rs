// 该文件是 Shanan （山南西风） 项目的一部分。
// src/transform.rs - 齐次坐标仿射变换
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

use crate::model::Point2;

/// 3x3 齐次变换矩阵（行主序）
///
/// | a11 a12 b1 |
/// | a21 a22 b2 |
/// |  0   0   1 |
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
  m: [[f32; 3]; 3],
}

impl Default for Affine {
  fn default() -> Self {
    Self::identity()
  }
}

impl Affine {
  pub fn identity() -> Self {
    Self::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, 0.0, 1.0]])
  }

  pub fn from_rows(m: [[f32; 3]; 3]) -> Self {
    Self { m }
  }

  pub fn rows(&self) -> [[f32; 3]; 3] {
    self.m
  }

  pub fn translation(dx: f32, dy: f32) -> Self {
    Self::from_rows([[1.0, 0.0, dx], [0.0, 1.0, dy], [0.0, 0.0, 1.0]])
  }

  pub fn scale(sx: f32, sy: f32) -> Self {
    Self::from_rows([[sx, 0.0, 0.0], [0.0, sy, 0.0], [0.0, 0.0, 1.0]])
  }

  /// 矩阵组合 (self * other)，先作用 other 再作用 self
  pub fn compose(&self, other: &Self) -> Self {
    let mut m = [[0.0f32; 3]; 3];
    for (i, row) in m.iter_mut().enumerate() {
      for (j, value) in row.iter_mut().enumerate() {
        *value = (0..3).map(|k| self.m[i][k] * other.m[k][j]).sum();
      }
    }
    Self { m }
  }

  /// 仿射部分的逆矩阵，不可逆时返回 `None`
  pub fn inverse(&self) -> Option<Self> {
    let [[a11, a12, b1], [a21, a22, b2], _] = self.m;
    let det = a11 * a22 - a12 * a21;
    if det.abs() < 1e-10 {
      return None;
    }

    let inv_det = 1.0 / det;
    Some(Self::from_rows([
      [
        a22 * inv_det,
        -a12 * inv_det,
        (a12 * b2 - a22 * b1) * inv_det,
      ],
      [
        -a21 * inv_det,
        a11 * inv_det,
        (a21 * b1 - a11 * b2) * inv_det,
      ],
      [0.0, 0.0, 1.0],
    ]))
  }

  /// 变换点 (x, y, 1)，结果按齐次分量归一化
  pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
    let [r0, r1, r2] = self.m;
    let tx = r0[0] * x + r0[1] * y + r0[2];
    let ty = r1[0] * x + r1[1] * y + r1[2];
    let w = r2[0] * x + r2[1] * y + r2[2];
    if w == 1.0 || w == 0.0 {
      (tx, ty)
    } else {
      (tx / w, ty / w)
    }
  }

  pub fn apply(&self, p: Point2) -> Point2 {
    let (x, y) = self.transform_point(p.x, p.y);
    Point2::new(x, y)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_identity_transform() {
    let (x, y) = Affine::identity().transform_point(10.0, 20.0);
    assert_eq!(x, 10.0);
    assert_eq!(y, 20.0);
  }

  #[test]
  fn test_translation_and_scale() {
    let (x, y) = Affine::translation(5.0, 10.0).transform_point(10.0, 20.0);
    assert_eq!((x, y), (15.0, 30.0));

    let (x, y) = Affine::scale(2.0, 3.0).transform_point(10.0, 20.0);
    assert_eq!((x, y), (20.0, 60.0));
  }

  #[test]
  fn test_compose_order() {
    // 先缩放再平移
    let m = Affine::translation(1.0, 2.0).compose(&Affine::scale(2.0, 2.0));
    assert_eq!(m.transform_point(3.0, 4.0), (7.0, 10.0));
  }

  #[test]
  fn test_inverse() {
    let m = Affine::translation(5.0, -3.0).compose(&Affine::scale(0.5, 4.0));
    let inv = m.inverse().unwrap();
    let composed = m.compose(&inv);
    let id = Affine::identity().rows();
    for (row, expected) in composed.rows().iter().zip(id.iter()) {
      for (v, e) in row.iter().zip(expected.iter()) {
        assert!((v - e).abs() < 1e-6);
      }
    }
  }

  #[test]
  fn test_singular_has_no_inverse() {
    assert!(Affine::scale(0.0, 1.0).inverse().is_none());
  }
}
