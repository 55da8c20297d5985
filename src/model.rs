// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model.rs - 模型接口与装甲板检测结果
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

use ndarray::{Array3, Array4};

/// 网络输入张量，形状 1 x 3 x H x W
pub type InputTensor = Array4<f32>;
/// 网络输出张量，形状 1 x rows x columns
pub type OutputTensor = Array3<f32>;

/// 已编译模型：一次输入，一次输出。
///
/// 派发器在工作线程中通过共享引用调用 `infer`，默认会串行化调用；
/// 设备加载、后端选择等都由实现方负责。
pub trait Model: Send + Sync + 'static {
  type Error: std::error::Error + Send + Sync + 'static;

  fn infer(&self, input: &InputTensor) -> Result<OutputTensor, Self::Error>;
}

pub trait WithLabel: Sized + std::fmt::Debug {
  fn to_label_str(&self) -> String;
  fn to_label_id(&self) -> u32;
  fn from_label_id(id: u32) -> Self;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmorColor {
  Blue,
  Red,
  None,
  Purple,
  Unknown(u32),
}

impl WithLabel for ArmorColor {
  fn to_label_str(&self) -> String {
    match self {
      ArmorColor::Blue => "blue".to_string(),
      ArmorColor::Red => "red".to_string(),
      ArmorColor::None => "none".to_string(),
      ArmorColor::Purple => "purple".to_string(),
      ArmorColor::Unknown(id) => format!("color-{}", id),
    }
  }

  fn to_label_id(&self) -> u32 {
    match self {
      ArmorColor::Blue => 0,
      ArmorColor::Red => 1,
      ArmorColor::None => 2,
      ArmorColor::Purple => 3,
      ArmorColor::Unknown(id) => *id,
    }
  }

  fn from_label_id(id: u32) -> Self {
    match id {
      0 => ArmorColor::Blue,
      1 => ArmorColor::Red,
      2 => ArmorColor::None,
      3 => ArmorColor::Purple,
      other => ArmorColor::Unknown(other),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArmorNumber {
  Sentry,
  No1,
  No2,
  No3,
  No4,
  No5,
  Outpost,
  Base,
  Unknown(u32),
}

impl WithLabel for ArmorNumber {
  fn to_label_str(&self) -> String {
    match self {
      ArmorNumber::Sentry => "sentry".to_string(),
      ArmorNumber::No1 => "1".to_string(),
      ArmorNumber::No2 => "2".to_string(),
      ArmorNumber::No3 => "3".to_string(),
      ArmorNumber::No4 => "4".to_string(),
      ArmorNumber::No5 => "5".to_string(),
      ArmorNumber::Outpost => "outpost".to_string(),
      ArmorNumber::Base => "base".to_string(),
      ArmorNumber::Unknown(id) => format!("number-{}", id),
    }
  }

  fn to_label_id(&self) -> u32 {
    match self {
      ArmorNumber::Sentry => 0,
      ArmorNumber::No1 => 1,
      ArmorNumber::No2 => 2,
      ArmorNumber::No3 => 3,
      ArmorNumber::No4 => 4,
      ArmorNumber::No5 => 5,
      ArmorNumber::Outpost => 6,
      ArmorNumber::Base => 7,
      ArmorNumber::Unknown(id) => *id,
    }
  }

  fn from_label_id(id: u32) -> Self {
    match id {
      0 => ArmorNumber::Sentry,
      1 => ArmorNumber::No1,
      2 => ArmorNumber::No2,
      3 => ArmorNumber::No3,
      4 => ArmorNumber::No4,
      5 => ArmorNumber::No5,
      6 => ArmorNumber::Outpost,
      7 => ArmorNumber::Base,
      other => ArmorNumber::Unknown(other),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point2 {
  pub x: f32,
  pub y: f32,
}

impl Point2 {
  pub fn new(x: f32, y: f32) -> Self {
    Self { x, y }
  }
}

/// 像素网格上的轴对齐外接矩形
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BoundingBox {
  pub x: i32,
  pub y: i32,
  pub width: i32,
  pub height: i32,
}

fn span(start: i32, last: i32) -> i32 {
  (i64::from(last) - i64::from(start) + 1).clamp(i64::from(i32::MIN), i64::from(i32::MAX)) as i32
}

impl BoundingBox {
  /// 包含全部点的最小像素矩形，边界按 floor 取整，右下角像素计入
  pub fn enclosing(points: &[Point2]) -> Self {
    if points.is_empty() {
      return Self::default();
    }

    let (mut x_min, mut y_min) = (f32::INFINITY, f32::INFINITY);
    let (mut x_max, mut y_max) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
    for p in points {
      x_min = x_min.min(p.x);
      y_min = y_min.min(p.y);
      x_max = x_max.max(p.x);
      y_max = y_max.max(p.y);
    }

    // f32 -> i32 饱和转换，宽高在 i64 中计算后再截断
    let x = x_min.floor() as i32;
    let y = y_min.floor() as i32;
    Self {
      x,
      y,
      width: span(x, x_max.floor() as i32),
      height: span(y, y_max.floor() as i32),
    }
  }

  pub fn area(&self) -> f32 {
    (self.width.max(0) as f32) * (self.height.max(0) as f32)
  }

  pub fn intersection_area(&self, another: &BoundingBox) -> f32 {
    let end = |start: i32, len: i32| i64::from(start) + i64::from(len);
    let l = i64::from(self.x.max(another.x));
    let r = end(self.x, self.width).min(end(another.x, another.width));
    let t = i64::from(self.y.max(another.y));
    let b = end(self.y, self.height).min(end(another.y, another.height));
    ((r - l).max(0) as f32) * ((b - t).max(0) as f32)
  }

  pub fn iou(&self, another: &BoundingBox) -> f32 {
    let intersection = self.intersection_area(another);
    let union = self.area() + another.area() - intersection;
    if union > 0.0 { intersection / union } else { 0.0 }
  }
}

/// 一块装甲板的检测结果，角点位于源图像像素坐标系
#[derive(Debug, Clone, PartialEq)]
pub struct ArmorObject {
  /// 四个角点，顺序与网络输出一致
  pub pts: [Point2; 4],
  pub bbox: BoundingBox,
  pub color: ArmorColor,
  pub number: ArmorNumber,
  pub prob: f32,
}

mod layout;
pub use self::layout::OutputLayout;

pub mod replay;
pub use self::replay::{ReplayModel, ReplayModelBuilder, ReplayError};
