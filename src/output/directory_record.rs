// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::{
  path::{Path, PathBuf},
  sync::{Mutex, PoisonError},
};

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Frame,
  model::ArmorObject,
  output::{
    Render,
    draw::{Draw, Record},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

pub enum DrawWrapper {
  Draw(Draw),
  Record(Record),
}

impl DrawWrapper {
  pub fn save_result(
    &self,
    path: &Path,
    frame: &Frame,
    objects: &[ArmorObject],
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      DrawWrapper::Draw(draw) => {
        draw.draw_detection(frame, objects).save(path)?;
      }
      DrawWrapper::Record(record) => {
        frame.to_rgb_image().save(path)?;
        record.record(objects, path)?;
      }
    };

    Ok(())
  }

  pub fn with(kind: &str) -> Self {
    match kind {
      "record-name" => DrawWrapper::Record(Record {
        label_with_name: true,
      }),
      "record-id" => DrawWrapper::Record(Record {
        label_with_name: false,
      }),
      _ => DrawWrapper::Draw(Draw::default()),
    }
  }
}

/// 按日期分目录保存帧：`dir/YYYY/MM/DD/HH-MM-SS-XXXX.png`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: DrawWrapper,
  frame_counter: Mutex<u16>,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = uri
      .query_pairs()
      .find(|(k, _)| k == "record")
      .map(|(_, v)| if v == "id" { "record-id" } else { "record-name" })
      .unwrap_or("draw");

    let always = uri.query_pairs().any(|(k, _)| k == "always");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: DrawWrapper::with(kind),
      frame_counter: Mutex::new(0),
      always,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_id(&self) -> u16 {
    let mut counter = self
      .frame_counter
      .lock()
      .unwrap_or_else(PoisonError::into_inner);
    *counter = counter.wrapping_add(1);
    *counter
  }

  fn frame_path(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let now = Utc::now();
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    if !directory.exists() {
      std::fs::create_dir_all(&directory)?;
    }

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<Frame, [ArmorObject]> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &[ArmorObject]) -> Result<(), Self::Error> {
    if !self.always && result.is_empty() {
      return Ok(());
    }
    let path = self.frame_path()?;
    debug!("记录帧到 {}", path.display());
    self.draw.save_result(&path, frame, result)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{ArmorColor, ArmorNumber, BoundingBox, Point2};
  use image::RgbImage;

  fn files_under(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    if let Ok(entries) = std::fs::read_dir(dir) {
      for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
          found.extend(files_under(&path));
        } else {
          found.push(path);
        }
      }
    }
    found.sort();
    found
  }

  fn object() -> ArmorObject {
    let pts = [
      Point2::new(1.0, 1.0),
      Point2::new(1.0, 4.0),
      Point2::new(6.0, 4.0),
      Point2::new(6.0, 1.0),
    ];
    ArmorObject {
      pts,
      bbox: BoundingBox::enclosing(&pts),
      color: ArmorColor::Blue,
      number: ArmorNumber::Sentry,
      prob: 0.9,
    }
  }

  #[test]
  fn skips_empty_results_unless_always() {
    let dir = std::env::temp_dir().join(format!("shanan-armor-record-{}", std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);

    let url = url::Url::parse(&format!("folder://{}?record=id", dir.display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    let frame = Frame::from(RgbImage::new(8, 8));

    output.render_result(&frame, &[]).unwrap();
    assert!(files_under(&dir).is_empty());

    output.render_result(&frame, &[object()]).unwrap();
    let files = files_under(&dir);
    assert_eq!(files.len(), 2);
    assert!(files.iter().any(|p| p.extension().is_some_and(|e| e == "json")));
    assert!(files.iter().any(|p| p.extension().is_some_and(|e| e == "png")));

    let url =
      url::Url::parse(&format!("folder://{}?always", dir.join("always").display())).unwrap();
    let output = DirectoryRecordOutput::from_url(&url).unwrap();
    output.render_result(&frame, &[]).unwrap();
    assert_eq!(files_under(&dir).len(), 3);
  }
}
