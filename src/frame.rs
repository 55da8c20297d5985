// 该文件是 Shanan （山南西风） 项目的一部分。
// src/frame.rs - 源图像帧定义
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

use std::sync::Arc;

use image::{Rgb, RgbImage};
use thiserror::Error;

const COLOR_CHANNELS: usize = 3;

/// 三通道像素在内存中的排列顺序
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelOrder {
  #[default]
  Rgb,
  Bgr,
}

impl ChannelOrder {
  pub fn parse(s: &str) -> Option<Self> {
    match s.to_ascii_lowercase().as_str() {
      "rgb" => Some(ChannelOrder::Rgb),
      "bgr" => Some(ChannelOrder::Bgr),
      _ => None,
    }
  }
}

#[derive(Error, Debug)]
pub enum FrameError {
  #[error("数据长度不匹配: 期望长度 {expected}, 实际长度 {actual}")]
  LengthMismatch { expected: usize, actual: usize },
}

/// 源图像帧，HWC 交错排列的 8 位三通道像素。
///
/// 像素数据由 `Arc` 共享，克隆帧不会复制像素，派发器把原始帧交给回调时依赖这一点。
#[derive(Debug, Clone)]
pub struct Frame {
  image: Arc<RgbImage>,
  order: ChannelOrder,
}

impl Frame {
  pub fn new(image: RgbImage, order: ChannelOrder) -> Self {
    Self {
      image: Arc::new(image),
      order,
    }
  }

  /// 从交错排列的原始字节构建帧
  pub fn from_raw(
    width: u32,
    height: u32,
    order: ChannelOrder,
    data: Vec<u8>,
  ) -> Result<Self, FrameError> {
    let expected = COLOR_CHANNELS * width as usize * height as usize;
    if data.len() != expected {
      return Err(FrameError::LengthMismatch {
        expected,
        actual: data.len(),
      });
    }

    let actual = data.len();
    let image = RgbImage::from_raw(width, height, data)
      .ok_or(FrameError::LengthMismatch { expected, actual })?;
    Ok(Self::new(image, order))
  }

  /// 宽或高为零的空帧
  pub fn empty() -> Self {
    Self::new(RgbImage::new(0, 0), ChannelOrder::default())
  }

  pub fn width(&self) -> u32 {
    self.image.width()
  }

  pub fn height(&self) -> u32 {
    self.image.height()
  }

  pub fn dimensions(&self) -> (u32, u32) {
    self.image.dimensions()
  }

  pub fn channels(&self) -> usize {
    COLOR_CHANNELS
  }

  pub fn order(&self) -> ChannelOrder {
    self.order
  }

  pub fn is_empty(&self) -> bool {
    self.width() == 0 || self.height() == 0
  }

  /// 按内存顺序访问像素，不做通道交换
  pub fn image(&self) -> &RgbImage {
    &self.image
  }

  pub fn as_nhwc(&self) -> &[u8] {
    self.image.as_raw()
  }

  /// 转换为 RGB 顺序的图像，BGR 帧会交换 R/B 通道
  pub fn to_rgb_image(&self) -> RgbImage {
    match self.order {
      ChannelOrder::Rgb => self.image.as_ref().clone(),
      ChannelOrder::Bgr => {
        let mut image = self.image.as_ref().clone();
        for Rgb(pixel) in image.pixels_mut() {
          pixel.swap(0, 2);
        }
        image
      }
    }
  }
}

impl From<RgbImage> for Frame {
  fn from(image: RgbImage) -> Self {
    Frame::new(image, ChannelOrder::Rgb)
  }
}
