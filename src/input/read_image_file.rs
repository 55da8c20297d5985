// 该文件是 Shanan （山南西风） 项目的一部分。
// src/input/read_image_file.rs - 图像文件输入
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
  collections::VecDeque,
  path::{Path, PathBuf},
};

use image::ImageReader;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::Frame};

#[derive(Error, Debug)]
pub enum ImageFileInputError {
  #[error("URI scheme 不匹配: 期望 'image', 实际 '{0}'")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像加载错误: {0}")]
  ImageLoadError(#[from] image::ImageError),
  #[error("目录中没有图像文件: {0}")]
  NoImages(String),
}

const READ_IMAGE_FILE_SCHEME: &str = "image";
const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

fn is_image_file(path: &Path) -> bool {
  path.is_file()
    && path
      .extension()
      .and_then(|ext| ext.to_str())
      .map(|ext| {
        IMAGE_EXTENSIONS
          .iter()
          .any(|known| ext.eq_ignore_ascii_case(known))
      })
      .unwrap_or(false)
}

fn load_frame(path: &Path) -> Result<Frame, ImageFileInputError> {
  let image = ImageReader::open(path)?.decode()?;
  debug!("读取图像 {}: {}x{}", path.display(), image.width(), image.height());
  Ok(Frame::from(image.into_rgb8()))
}

/// 单个图像文件，或按文件名顺序遍历目录中的图像
pub struct ImageFileInput {
  first: Option<Frame>,
  pending: VecDeque<PathBuf>,
}

impl FromUrlWithScheme for ImageFileInput {
  const SCHEME: &'static str = READ_IMAGE_FILE_SCHEME;
}

impl FromUrl for ImageFileInput {
  type Error = ImageFileInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != READ_IMAGE_FILE_SCHEME {
      error!(
        "URI scheme 不匹配: 期望 '{}', 实际 '{}'",
        READ_IMAGE_FILE_SCHEME,
        url.scheme()
      );
      return Err(ImageFileInputError::SchemeMismatch(url.scheme().to_string()));
    }

    Self::open(url.path())
  }
}

impl ImageFileInput {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, ImageFileInputError> {
    let path = path.as_ref();

    if !path.is_dir() {
      return Ok(ImageFileInput {
        first: Some(load_frame(path)?),
        pending: VecDeque::new(),
      });
    }

    let mut files = std::fs::read_dir(path)?
      .map(|entry| entry.map(|e| e.path()))
      .collect::<Result<Vec<_>, _>>()?;
    files.retain(|p| is_image_file(p));
    files.sort();

    if files.is_empty() {
      return Err(ImageFileInputError::NoImages(path.display().to_string()));
    }
    info!("图像目录 {}: {} 个文件", path.display(), files.len());

    Ok(ImageFileInput {
      first: None,
      pending: files.into(),
    })
  }

  pub fn remaining(&self) -> usize {
    self.first.iter().count() + self.pending.len()
  }
}

impl Iterator for ImageFileInput {
  type Item = Frame;

  fn next(&mut self) -> Option<Self::Item> {
    if let Some(frame) = self.first.take() {
      return Some(frame);
    }

    while let Some(path) = self.pending.pop_front() {
      match load_frame(&path) {
        Ok(frame) => return Some(frame),
        Err(e) => error!("跳过无法读取的图像 {}: {}", path.display(), e),
      }
    }
    None
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::{Rgb, RgbImage};

  fn scratch_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("shanan-armor-{}-{}", name, std::process::id()));
    let _ = std::fs::remove_dir_all(&dir);
    std::fs::create_dir_all(&dir).unwrap();
    dir
  }

  #[test]
  fn reads_single_file() {
    let dir = scratch_dir("single");
    let path = dir.join("frame.png");
    RgbImage::from_pixel(6, 4, Rgb([1, 2, 3])).save(&path).unwrap();

    let url = Url::parse(&format!("image://{}", path.display())).unwrap();
    let mut input = ImageFileInput::from_url(&url).unwrap();
    let frame = input.next().unwrap();
    assert_eq!(frame.dimensions(), (6, 4));
    assert_eq!(frame.image().get_pixel(0, 0).0, [1, 2, 3]);
    assert!(input.next().is_none());
  }

  #[test]
  fn walks_directory_in_name_order() {
    let dir = scratch_dir("directory");
    RgbImage::new(2, 2).save(dir.join("b.png")).unwrap();
    RgbImage::new(3, 3).save(dir.join("a.png")).unwrap();
    RgbImage::new(4, 4).save(dir.join("c.bmp")).unwrap();
    std::fs::write(dir.join("notes.txt"), "skip").unwrap();
    std::fs::write(dir.join("broken.png"), "not an image").unwrap();

    let input = ImageFileInput::open(&dir).unwrap();
    assert_eq!(input.remaining(), 4);
    let sizes: Vec<_> = input.map(|f| f.width()).collect();
    assert_eq!(sizes, vec![3, 2, 4]);
  }

  #[test]
  fn empty_directory_is_an_error() {
    let dir = scratch_dir("empty");
    assert!(matches!(
      ImageFileInput::open(&dir),
      Err(ImageFileInputError::NoImages(_))
    ));
  }

  #[test]
  fn rejects_other_schemes() {
    let url = Url::parse("folder:///tmp").unwrap();
    assert!(matches!(
      ImageFileInput::from_url(&url),
      Err(ImageFileInputError::SchemeMismatch(_))
    ));
  }
}
