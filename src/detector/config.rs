// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detector/config.rs - 检测器配置
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

use std::str::FromStr;

use tracing::warn;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme, detector::DetectorError, frame::ChannelOrder,
  letterbox::LETTERBOX_PAD_VALUE, model::OutputLayout,
};

/// 输入张量的数值约定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BlobConfig {
  /// 模型期望的通道顺序，默认 BGR
  pub order: ChannelOrder,
  /// 按模型通道顺序排列的均值
  pub mean: [f32; 3],
  pub scale: f32,
}

impl Default for BlobConfig {
  fn default() -> Self {
    Self {
      order: ChannelOrder::Bgr,
      mean: [0.0; 3],
      scale: 1.0,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorConfig {
  pub input_width: u32,
  pub input_height: u32,
  pub conf_threshold: f32,
  pub nms_threshold: f32,
  /// 最多输出的检测数，0 表示不限制
  pub top_k: usize,
  pub num_colors: usize,
  pub num_classes: usize,
  pub pad_value: u8,
  pub blob: BlobConfig,
  /// 推理线程数，0 表示每个核心一个
  pub workers: usize,
  /// 同一时刻只允许一次模型调用
  pub serialize_inference: bool,
}

impl Default for DetectorConfig {
  fn default() -> Self {
    Self {
      input_width: 416,
      input_height: 416,
      conf_threshold: 0.65,
      nms_threshold: 0.45,
      top_k: 128,
      num_colors: 4,
      num_classes: 8,
      pad_value: LETTERBOX_PAD_VALUE,
      blob: BlobConfig::default(),
      workers: 0,
      serialize_inference: true,
    }
  }
}

impl DetectorConfig {
  pub fn layout(&self) -> OutputLayout {
    OutputLayout::new(self.num_colors, self.num_classes)
  }

  pub fn validate(&self) -> Result<(), DetectorError> {
    if self.input_width == 0 || self.input_height == 0 {
      return Err(DetectorError::InvalidConfig(format!(
        "输入尺寸不能为零: {}x{}",
        self.input_width, self.input_height
      )));
    }
    if !(0.0..=1.0).contains(&self.conf_threshold) {
      return Err(DetectorError::InvalidConfig(format!(
        "置信度阈值超出 [0, 1]: {}",
        self.conf_threshold
      )));
    }
    if !(0.0..=1.0).contains(&self.nms_threshold) {
      return Err(DetectorError::InvalidConfig(format!(
        "NMS 阈值超出 [0, 1]: {}",
        self.nms_threshold
      )));
    }
    if self.num_colors == 0 || self.num_classes == 0 {
      return Err(DetectorError::InvalidConfig(format!(
        "颜色数与编号数必须大于零: colors={}, classes={}",
        self.num_colors, self.num_classes
      )));
    }
    if !self.blob.scale.is_finite() || self.blob.mean.iter().any(|m| !m.is_finite()) {
      return Err(DetectorError::InvalidConfig(format!(
        "输入归一化参数无效: {:?}",
        self.blob
      )));
    }
    Ok(())
  }
}

const DETECTOR_SCHEME: &str = "armor";

impl FromUrlWithScheme for DetectorConfig {
  const SCHEME: &'static str = DETECTOR_SCHEME;
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, DetectorError> {
  value
    .trim()
    .parse()
    .map_err(|_| DetectorError::InvalidConfig(format!("无法解析参数 {}={}", key, value)))
}

fn parse_bool(key: &str, value: &str) -> Result<bool, DetectorError> {
  match value.trim().to_ascii_lowercase().as_str() {
    "" | "1" | "true" | "yes" | "on" => Ok(true),
    "0" | "false" | "no" | "off" => Ok(false),
    _ => Err(DetectorError::InvalidConfig(format!(
      "无法解析参数 {}={}",
      key, value
    ))),
  }
}

impl FromUrl for DetectorConfig {
  type Error = DetectorError;

  /// `armor://detector?size=416x416&conf=0.65&nms=0.45&top_k=128&order=bgr`
  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != DETECTOR_SCHEME {
      return Err(DetectorError::InvalidConfig(format!(
        "URI scheme 不匹配: 期望 '{}', 实际 '{}'",
        DETECTOR_SCHEME,
        url.scheme()
      )));
    }

    let mut config = DetectorConfig::default();
    for (key, value) in url.query_pairs() {
      match &*key {
        "size" => {
          let (w, h) = value.split_once(['x', 'X']).ok_or_else(|| {
            DetectorError::InvalidConfig(format!("尺寸格式应为 WxH: {}", value))
          })?;
          config.input_width = parse_value("size", w)?;
          config.input_height = parse_value("size", h)?;
        }
        "conf" => config.conf_threshold = parse_value(&key, &value)?,
        "nms" => config.nms_threshold = parse_value(&key, &value)?,
        "top_k" => config.top_k = parse_value(&key, &value)?,
        "colors" => config.num_colors = parse_value(&key, &value)?,
        "classes" => config.num_classes = parse_value(&key, &value)?,
        "pad" => config.pad_value = parse_value(&key, &value)?,
        "order" => {
          config.blob.order = ChannelOrder::parse(&value).ok_or_else(|| {
            DetectorError::InvalidConfig(format!("未知的通道顺序: {}", value))
          })?;
        }
        "scale" => config.blob.scale = parse_value(&key, &value)?,
        "mean" => {
          let values = value
            .split(',')
            .map(|v| parse_value::<f32>("mean", v))
            .collect::<Result<Vec<_>, _>>()?;
          config.blob.mean = match values[..] {
            [m] => [m; 3],
            [a, b, c] => [a, b, c],
            _ => {
              return Err(DetectorError::InvalidConfig(format!(
                "mean 需要 1 个或 3 个数值: {}",
                value
              )));
            }
          };
        }
        "workers" => config.workers = parse_value(&key, &value)?,
        "serialize" => config.serialize_inference = parse_bool(&key, &value)?,
        other => warn!("忽略未知的检测器参数: {}", other),
      }
    }

    config.validate()?;
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn default_config_is_valid() {
    let config = DetectorConfig::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.layout().columns(), 21);
    assert_eq!(config.pad_value, 114);
    assert_eq!(config.blob.order, ChannelOrder::Bgr);
  }

  #[test]
  fn parses_full_url() {
    let url = Url::parse(
      "armor://detector?size=640x384&conf=0.5&nms=0.3&top_k=0&colors=2&classes=9&pad=0&order=rgb&scale=0.0039215686&mean=1,2,3&workers=2&serialize=false",
    )
    .unwrap();
    let config = DetectorConfig::from_url(&url).unwrap();
    assert_eq!((config.input_width, config.input_height), (640, 384));
    assert_eq!(config.conf_threshold, 0.5);
    assert_eq!(config.nms_threshold, 0.3);
    assert_eq!(config.top_k, 0);
    assert_eq!(config.layout().columns(), 9 + 2 + 9);
    assert_eq!(config.pad_value, 0);
    assert_eq!(config.blob.order, ChannelOrder::Rgb);
    assert_eq!(config.blob.mean, [1.0, 2.0, 3.0]);
    assert_eq!(config.workers, 2);
    assert!(!config.serialize_inference);
  }

  #[test]
  fn single_mean_applies_to_all_channels() {
    let url = Url::parse("armor://detector?mean=0.5").unwrap();
    assert_eq!(DetectorConfig::from_url(&url).unwrap().blob.mean, [0.5; 3]);
  }

  #[test]
  fn rejects_bad_values() {
    for bad in [
      "armor://detector?size=416",
      "armor://detector?conf=1.5",
      "armor://detector?colors=0",
      "armor://detector?order=yuv",
      "armor://detector?mean=1,2",
      "armor://detector?serialize=maybe",
      "replay://detector",
    ] {
      let url = Url::parse(bad).unwrap();
      assert!(
        matches!(
          DetectorConfig::from_url(&url),
          Err(DetectorError::InvalidConfig(_))
        ),
        "{bad}"
      );
    }
  }
}
