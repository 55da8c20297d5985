// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector/blob.rs - 网络输入张量构建
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

use image::RgbImage;
use ndarray::Array4;

use crate::{detector::BlobConfig, frame::ChannelOrder, model::InputTensor};

/// HWC 交错像素转为 1x3xHxW 平面张量。
///
/// 像素顺序与模型顺序不同时交换第 0 与第 2 通道，之后按模型通道减均值再乘缩放系数。
pub fn build_blob(image: &RgbImage, order: ChannelOrder, config: &BlobConfig) -> InputTensor {
  let (width, height) = image.dimensions();
  let swap = order != config.order;

  let mut blob = Array4::<f32>::zeros((1, 3, height as usize, width as usize));
  for (x, y, pixel) in image.enumerate_pixels() {
    for c in 0..3 {
      let src = if swap { 2 - c } else { c };
      blob[[0, c, y as usize, x as usize]] = (pixel.0[src] as f32 - config.mean[c]) * config.scale;
    }
  }
  blob
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgb;

  fn image() -> RgbImage {
    let mut image = RgbImage::new(3, 2);
    image.put_pixel(0, 0, Rgb([10, 20, 30]));
    image.put_pixel(2, 1, Rgb([200, 100, 50]));
    image
  }

  fn rgb_model() -> BlobConfig {
    BlobConfig {
      order: ChannelOrder::Rgb,
      ..BlobConfig::default()
    }
  }

  #[test]
  fn planar_layout_with_batch_dimension() {
    let blob = build_blob(&image(), ChannelOrder::Rgb, &rgb_model());
    assert_eq!(blob.shape(), &[1, 3, 2, 3]);
    assert_eq!(blob[[0, 0, 0, 0]], 10.0);
    assert_eq!(blob[[0, 1, 0, 0]], 20.0);
    assert_eq!(blob[[0, 2, 0, 0]], 30.0);
    assert_eq!(blob[[0, 0, 1, 2]], 200.0);
    assert_eq!(blob[[0, 2, 1, 2]], 50.0);
  }

  #[test]
  fn swaps_channels_when_orders_differ() {
    let blob = build_blob(&image(), ChannelOrder::Bgr, &rgb_model());
    assert_eq!(blob[[0, 0, 0, 0]], 30.0);
    assert_eq!(blob[[0, 2, 0, 0]], 10.0);

    let blob = build_blob(&image(), ChannelOrder::Bgr, &BlobConfig::default());
    assert_eq!(blob[[0, 0, 0, 0]], 10.0);
  }

  #[test]
  fn default_model_order_swaps_rgb_frames() {
    let blob = build_blob(&image(), ChannelOrder::Rgb, &BlobConfig::default());
    assert_eq!(blob[[0, 0, 0, 0]], 30.0);
    assert_eq!(blob[[0, 1, 0, 0]], 20.0);
    assert_eq!(blob[[0, 2, 0, 0]], 10.0);
    assert_eq!(blob[[0, 0, 1, 2]], 50.0);
  }

  #[test]
  fn applies_mean_and_scale() {
    let config = BlobConfig {
      order: ChannelOrder::Rgb,
      mean: [10.0, 0.0, 30.0],
      scale: 0.5,
    };
    let blob = build_blob(&image(), ChannelOrder::Rgb, &config);
    assert_eq!(blob[[0, 0, 0, 0]], 0.0);
    assert_eq!(blob[[0, 1, 0, 0]], 10.0);
    assert_eq!(blob[[0, 2, 1, 2]], 10.0);
  }
}
