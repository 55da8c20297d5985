// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 装甲板检测结果可视化
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

use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_filled_circle_mut, draw_hollow_rect_mut, draw_line_segment_mut},
  rect::Rect,
};
use serde_json::json;

use crate::{
  frame::Frame,
  model::{ArmorColor, ArmorObject, WithLabel},
};

const BBOX_COLOR: [u8; 3] = [0, 255, 0];
const CORNER_MARK_RADIUS: i32 = 3;
const LINE_THICKNESS: i32 = 2;

fn armor_color_rgb(color: &ArmorColor) -> [u8; 3] {
  match color {
    ArmorColor::Blue => [0, 0, 255],
    ArmorColor::Red => [255, 0, 0],
    ArmorColor::None => [160, 160, 160],
    ArmorColor::Purple => [160, 32, 240],
    ArmorColor::Unknown(_) => [255, 255, 0],
  }
}

/// 绘制四边形、外接框以及第一个角点标记
pub struct Draw {
  line_thickness: i32,
  bbox_color: [u8; 3],
  show_bbox: bool,
}

impl Default for Draw {
  fn default() -> Self {
    Self {
      line_thickness: LINE_THICKNESS,
      bbox_color: BBOX_COLOR,
      show_bbox: true,
    }
  }
}

impl Draw {
  pub fn with_bbox(mut self, show_bbox: bool) -> Self {
    self.show_bbox = show_bbox;
    self
  }

  fn draw_quad(&self, image: &mut RgbImage, object: &ArmorObject) {
    let color = Rgb(armor_color_rgb(&object.color));
    for i in 0..4 {
      let a = object.pts[i];
      let b = object.pts[(i + 1) % 4];
      // 加粗: 沿两个方向各偏移若干像素
      for t in 0..self.line_thickness {
        let t = t as f32;
        draw_line_segment_mut(image, (a.x + t, a.y), (b.x + t, b.y), color);
        draw_line_segment_mut(image, (a.x, a.y + t), (b.x, b.y + t), color);
      }
    }

    let first = object.pts[0];
    draw_filled_circle_mut(
      image,
      (first.x.round() as i32, first.y.round() as i32),
      CORNER_MARK_RADIUS,
      color,
    );
  }

  fn draw_bbox(&self, image: &mut RgbImage, object: &ArmorObject) {
    let bbox = &object.bbox;
    if bbox.width <= 0 || bbox.height <= 0 {
      return;
    }
    let rect = Rect::at(bbox.x, bbox.y).of_size(bbox.width as u32, bbox.height as u32);
    draw_hollow_rect_mut(image, rect, Rgb(self.bbox_color));
  }

  pub fn draw_detections_on_image(&self, image: &mut RgbImage, objects: &[ArmorObject]) {
    for object in objects {
      if self.show_bbox {
        self.draw_bbox(image, object);
      }
      self.draw_quad(image, object);
    }
  }

  pub fn draw_detection(&self, frame: &Frame, objects: &[ArmorObject]) -> RgbImage {
    let mut image = frame.to_rgb_image();
    self.draw_detections_on_image(&mut image, objects);
    image
  }
}

/// 检测结果写入与图像同名的 JSON 文件
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn to_json(&self, objects: &[ArmorObject], timestamp_ns: Option<i64>) -> serde_json::Value {
    let items: Vec<_> = objects
      .iter()
      .map(|object| {
        let (color, number) = if self.label_with_name {
          (
            json!(object.color.to_label_str()),
            json!(object.number.to_label_str()),
          )
        } else {
          (
            json!(object.color.to_label_id()),
            json!(object.number.to_label_id()),
          )
        };
        json!({
          "color": color,
          "number": number,
          "prob": object.prob,
          "pts": object.pts.iter().map(|p| [p.x, p.y]).collect::<Vec<_>>(),
          "bbox": [object.bbox.x, object.bbox.y, object.bbox.width, object.bbox.height],
        })
      })
      .collect();

    json!({
      "timestamp_ns": timestamp_ns,
      "objects": items,
    })
  }

  pub fn record(
    &self,
    objects: &[ArmorObject],
    path: &std::path::Path,
  ) -> Result<(), std::io::Error> {
    let text = serde_json::to_string_pretty(&self.to_json(objects, None))?;
    std::fs::write(path.with_extension("json"), text)
  }
}
