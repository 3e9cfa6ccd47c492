// 该文件是 Liefeng （裂缝检测） 项目的一部分。
// src/output/draw.rs - 检测结果可视化
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

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut, text_size},
  rect::Rect,
};

use crate::{
  detection::{DetectionRecord, DetectionSummary},
  output::Render,
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_MARGIN: i32 = 10; // 标签底部距边框上沿的距离
const LABEL_PREFIX: &str = "crack";
const BOX_THICKNESS: u32 = 3;
const HIGHLIGHT_COLOR: [u8; 3] = [255, 0, 0]; // 红色

pub struct Draw {
  font: FontArc,
  font_size: f32,
  label_margin: i32,
  label_prefix: String,
  thickness: u32,
  color: [u8; 3],
}

impl Default for Draw {
  fn default() -> Self {
    let font_data: &'static [u8] = include_bytes!("../../assets/DejaVuSans.ttf");
    let font = FontArc::try_from_slice(font_data).expect("无法加载嵌入的字体文件");

    Self {
      font,
      font_size: LABEL_FONT_SIZE,
      label_margin: LABEL_MARGIN,
      label_prefix: LABEL_PREFIX.to_string(),
      thickness: BOX_THICKNESS,
      color: HIGHLIGHT_COLOR,
    }
  }
}

impl Draw {
  pub fn with_label_prefix(mut self, prefix: impl Into<String>) -> Self {
    self.label_prefix = prefix.into();
    self
  }

  /// 边框线宽，至少为 1
  pub fn with_thickness(mut self, thickness: u32) -> Self {
    self.thickness = thickness.max(1);
    self
  }

  pub fn with_color(mut self, color: [u8; 3]) -> Self {
    self.color = color;
    self
  }

  pub fn label_text(&self, record: &DetectionRecord) -> String {
    format!(
      "{} {} {:.2}",
      self.label_prefix, record.ordinal, record.confidence
    )
  }

  fn draw_record(&self, image: &mut RgbImage, record: &DetectionRecord) {
    let color = Rgb(self.color);
    let bbox = &record.bbox;
    let (x, y) = (bbox.x as i32, bbox.y as i32);
    // 边框覆盖 x..=x_max，因此尺寸比宽高多 1
    let (w, h) = (bbox.width as i32 + 1, bbox.height as i32 + 1);

    // 线宽以边框为中心向内外扩展，超出图像的部分由 imageproc 裁剪
    let half = (self.thickness / 2) as i32;
    for offset in 0..self.thickness as i32 {
      let grow = offset - half;
      let (rw, rh) = (w + 2 * grow, h + 2 * grow);
      if rw <= 0 || rh <= 0 {
        continue;
      }
      let rect = Rect::at(x - grow, y - grow).of_size(rw as u32, rh as u32);
      draw_hollow_rect_mut(image, rect, color);
    }

    let label = self.label_text(record);
    let scale = PxScale::from(self.font_size);
    let (_, text_height) = text_size(scale, &self.font, &label);
    let label_y = (y - self.label_margin - text_height as i32).max(0);

    draw_text_mut(image, color, x, label_y, scale, &self.font, &label);
  }
}

impl Render<RgbImage, DetectionSummary> for Draw {
  fn render_result(&self, frame: &RgbImage, result: &DetectionSummary) -> RgbImage {
    let mut image = frame.clone();
    for record in result.records.iter() {
      self.draw_record(&mut image, record);
    }
    image
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::detection::BoundingBox;

  const BACKGROUND: Rgb<u8> = Rgb([0, 80, 0]);

  fn summary(records: Vec<DetectionRecord>) -> DetectionSummary {
    DetectionSummary {
      has_detection: !records.is_empty(),
      max_confidence: records.iter().map(|r| r.confidence).fold(0.0, f32::max),
      records: records.into_boxed_slice(),
    }
  }

  fn record(ordinal: usize, bbox: BoundingBox, confidence: f32) -> DetectionRecord {
    DetectionRecord {
      ordinal,
      bbox,
      confidence,
    }
  }

  #[test]
  fn no_records_leave_image_untouched() {
    let frame = RgbImage::from_pixel(64, 48, BACKGROUND);
    let rendered = Draw::default().render_result(&frame, &summary(vec![]));
    assert_eq!(rendered, frame);
  }

  #[test]
  fn draws_box_outline_and_label() {
    let frame = RgbImage::from_pixel(200, 200, BACKGROUND);
    let original = frame.clone();
    let bbox = BoundingBox::from_extremes(40, 80, 160, 180);

    let rendered = Draw::default().render_result(&frame, &summary(vec![record(1, bbox, 0.87)]));

    // 原图不变
    assert_eq!(frame, original);

    for (x, y) in [(40, 80), (160, 180), (100, 80), (40, 130), (39, 79), (161, 181)] {
      assert_eq!(*rendered.get_pixel(x, y), Rgb(HIGHLIGHT_COLOR), "({x}, {y})");
    }
    assert_eq!(*rendered.get_pixel(100, 130), BACKGROUND);
    assert_eq!(*rendered.get_pixel(37, 130), BACKGROUND);

    // 标签位于边框左上角上方
    let label_touched = (40..140)
      .flat_map(|x| (40..70).map(move |y| (x, y)))
      .any(|(x, y)| *rendered.get_pixel(x, y) != BACKGROUND);
    assert!(label_touched);
  }

  #[test]
  fn label_shows_ordinal_and_confidence() {
    let draw = Draw::default().with_label_prefix("crack");
    let text = draw.label_text(&record(3, BoundingBox::from_extremes(0, 0, 1, 1), 0.8749));
    assert_eq!(text, "crack 3 0.87");
  }

  #[test]
  fn boxes_touching_the_border_are_clipped() {
    let frame = RgbImage::from_pixel(32, 32, BACKGROUND);
    let records = vec![
      record(1, BoundingBox::from_extremes(0, 0, 31, 31), 0.5),
      record(2, BoundingBox::from_extremes(31, 31, 31, 31), 0.25),
      record(4, BoundingBox::from_extremes(5, 20, 5, 31), 0.0),
    ];

    let rendered = Draw::default()
      .with_thickness(5)
      .render_result(&frame, &summary(records));
    assert_eq!(rendered.dimensions(), (32, 32));
    assert_eq!(*rendered.get_pixel(0, 31), Rgb(HIGHLIGHT_COLOR));
    assert_eq!(*rendered.get_pixel(31, 31), Rgb(HIGHLIGHT_COLOR));
    assert_eq!(*rendered.get_pixel(5, 28), Rgb(HIGHLIGHT_COLOR));
  }

  #[test]
  fn later_boxes_are_drawn_independently() {
    let frame = RgbImage::from_pixel(120, 120, BACKGROUND);
    let first = record(1, BoundingBox::from_extremes(10, 60, 40, 100), 0.9);
    let second = record(2, BoundingBox::from_extremes(70, 60, 110, 100), 0.6);

    let draw = Draw::default().with_color([0, 0, 255]);
    let both = draw.render_result(&frame, &summary(vec![first, second]));
    let only_second = draw.render_result(&frame, &summary(vec![second]));

    for y in 55..105 {
      for x in 66..115 {
        assert_eq!(both.get_pixel(x, y), only_second.get_pixel(x, y), "({x}, {y})");
      }
    }
  }
}
