// 该文件是 Shanan （山南西风） 项目的一部分。
// src/letterbox.rs - 等比缩放与边缘填充
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

use image::{Rgb, RgbImage, imageops};
use tracing::debug;

use crate::{
  frame::{ChannelOrder, Frame},
  transform::Affine,
};

pub const LETTERBOX_PAD_VALUE: u8 = 114;

/// 四边填充像素数
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Padding {
  pub top: u32,
  pub bottom: u32,
  pub left: u32,
  pub right: u32,
}

/// 缩放填充后的网络输入图像以及从网络坐标回到源图像坐标的变换
#[derive(Debug, Clone)]
pub struct Letterboxed {
  pub image: RgbImage,
  pub order: ChannelOrder,
  pub transform: Affine,
  pub scale: f32,
  pub padding: Padding,
}

impl Letterboxed {
  /// 源图像坐标到网络坐标的正向映射，按实际写入的整数填充计算
  pub fn forward(&self) -> Affine {
    Affine::translation(self.padding.left as f32, self.padding.top as f32)
      .compose(&Affine::scale(self.scale, self.scale))
  }
}

#[derive(Debug, Clone, Copy)]
pub struct Letterbox {
  width: u32,
  height: u32,
  pad_value: u8,
}

impl Letterbox {
  pub fn new(width: u32, height: u32) -> Self {
    Self {
      width,
      height,
      pad_value: LETTERBOX_PAD_VALUE,
    }
  }

  pub fn with_pad_value(mut self, pad_value: u8) -> Self {
    self.pad_value = pad_value;
    self
  }

  pub fn size(&self) -> (u32, u32) {
    (self.width, self.height)
  }

  /// 等比缩放到网络输入尺寸，居中填充。
  ///
  /// 空帧需要调用方提前拦截。
  pub fn apply(&self, frame: &Frame) -> Letterboxed {
    let (src_w, src_h) = frame.dimensions();

    let scale = (self.height as f32 / src_h as f32).min(self.width as f32 / src_w as f32);
    let resize_w = ((src_w as f32 * scale).round() as u32).clamp(1, self.width);
    let resize_h = ((src_h as f32 * scale).round() as u32).clamp(1, self.height);

    let pad_w = self.width - resize_w;
    let pad_h = self.height - resize_h;

    let half_w = pad_w as f32 / 2.0;
    let half_h = pad_h as f32 / 2.0;

    // 奇数填充时较小的一半放在前面
    let padding = Padding {
      top: (half_h - 0.1).round().max(0.0) as u32,
      bottom: (half_h + 0.1).round() as u32,
      left: (half_w - 0.1).round().max(0.0) as u32,
      right: (half_w + 0.1).round() as u32,
    };

    debug!(
      "letterbox: {}x{} -> {}x{}, scale={:.4}, padding={:?}",
      src_w, src_h, resize_w, resize_h, scale, padding
    );

    let resized = imageops::resize(
      frame.image(),
      resize_w,
      resize_h,
      imageops::FilterType::Triangle,
    );

    let mut image = RgbImage::from_pixel(self.width, self.height, Rgb([self.pad_value; 3]));
    imageops::replace(
      &mut image,
      &resized,
      padding.left as i64,
      padding.top as i64,
    );

    let transform = Affine::from_rows([
      [1.0 / scale, 0.0, -half_w / scale],
      [0.0, 1.0 / scale, -half_h / scale],
      [0.0, 0.0, 1.0],
    ]);

    Letterboxed {
      image,
      order: frame.order(),
      transform,
      scale,
      padding,
    }
  }
}
