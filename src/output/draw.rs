// 该文件是 Kanwu （看物） 项目的一部分。
// src/output/draw.rs - 检测结果叠加绘制
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

use std::path::{Path, PathBuf};

use ab_glyph::{Font, FontArc, FontVec, PxScale, ScaleFont};
use image::{Rgba, RgbaImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info};

use crate::model::{Border, MlObject};

const STROKE_WIDTH: i32 = 4;
const STROKE_COLOR: [u8; 4] = [255, 255, 0, 255]; // 黄色
const LABEL_FONT_SIZE: f32 = 16.0;
const LABEL_COLOR: [u8; 4] = [0, 0, 0, 255]; // 黑色
const LABEL_OFFSET: (i32, i32) = (20, 20);

static BUNDLED_FONT: &[u8] = include_bytes!("../../assets/font.ttf"); // DejaVu Sans

#[derive(Error, Debug)]
pub enum FontError {
  #[error("字体文件读取失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 标签字体
pub struct LabelFont {
  font: FontArc,
  path: Option<PathBuf>,
}

impl LabelFont {
  /// 内置字体
  pub fn bundled() -> Result<Self, FontError> {
    let font = FontArc::try_from_slice(BUNDLED_FONT)?;
    Ok(Self { font, path: None })
  }

  pub fn load(path: impl AsRef<Path>) -> Result<Self, FontError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontVec::try_from_vec(data)?;
    debug!("加载字体: {}", path.display());
    Ok(Self {
      font: FontArc::new(font),
      path: Some(path.to_path_buf()),
    })
  }

  /// 字体文件路径，内置字体为 None
  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }
}

/// 单个检测结果的绘制计划
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OverlayMark {
  pub border: Border,
  pub label: &'static str,
  /// 标签基线起点
  pub anchor: (i32, i32),
}

pub struct Overlay {
  stroke_width: i32,
  stroke_color: Rgba<u8>,
  font_size: f32,
  label_color: Rgba<u8>,
  label_offset: (i32, i32),
  font: LabelFont,
}

impl Overlay {
  pub fn new(font: LabelFont) -> Self {
    match font.path() {
      Some(path) => info!("标签字体: {}", path.display()),
      None => info!("标签字体: 内置 DejaVu Sans"),
    }

    Self {
      stroke_width: STROKE_WIDTH,
      stroke_color: Rgba(STROKE_COLOR),
      font_size: LABEL_FONT_SIZE,
      label_color: Rgba(LABEL_COLOR),
      label_offset: LABEL_OFFSET,
      font,
    }
  }

  /// 使用内置字体
  pub fn with_bundled_font() -> Result<Self, FontError> {
    Ok(Self::new(LabelFont::bundled()?))
  }

  /// 按输入顺序为每个检测结果生成绘制计划
  pub fn layout(&self, objects: &[MlObject]) -> Vec<OverlayMark> {
    objects
      .iter()
      .map(|object| OverlayMark {
        border: object.border,
        label: object.type_identity.label(),
        anchor: (
          object.border.left.saturating_add(self.label_offset.0),
          object.border.top.saturating_add(self.label_offset.1),
        ),
      })
      .collect()
  }

  /// 在图像副本上绘制检测结果，输入图像保持不变
  pub fn render(&self, image: &RgbaImage, objects: &[MlObject]) -> RgbaImage {
    let mut canvas = image.clone();
    for (object, mark) in objects.iter().zip(self.layout(objects)) {
      info!(
        "边框: {} 类型: {} 可能性: {:.4}",
        object.border, mark.label, object.type_possibility
      );
      self.draw_border(&mut canvas, &mark.border);
      self.draw_label(&mut canvas, &mark);
    }
    canvas
  }

  // 描边以边框线为中心
  fn draw_border(&self, canvas: &mut RgbaImage, border: &Border) {
    // 左右、上下颠倒的边框按排序后的边绘制
    let (left, right) = (border.left.min(border.right), border.left.max(border.right));
    let (top, bottom) = (border.top.min(border.bottom), border.top.max(border.bottom));

    let half = self.stroke_width / 2;
    for k in -half..(self.stroke_width - half) {
      let left = left.saturating_add(k);
      let top = top.saturating_add(k);
      let right = right.saturating_sub(k);
      let bottom = bottom.saturating_sub(k);
      if right < left || bottom < top {
        continue;
      }

      // 画布外的边收到画布外一像素，可见部分不变
      let (w, h) = (canvas.width() as i32, canvas.height() as i32);
      let (left, right) = (left.clamp(-1, w), right.clamp(-1, w));
      let (top, bottom) = (top.clamp(-1, h), bottom.clamp(-1, h));
      let rect =
        Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
      draw_hollow_rect_mut(canvas, rect, self.stroke_color);
    }
  }

  fn draw_label(&self, canvas: &mut RgbaImage, mark: &OverlayMark) {
    let scale = PxScale::from(self.font_size);
    let ascent = self.font.font.as_scaled(scale).ascent().round() as i32;
    let (x, baseline) = mark.anchor;
    let top = baseline.saturating_sub(ascent);

    // 整个标签都在画布外时不绘制，imageproc 对极大坐标会溢出
    let (w, h) = (canvas.width() as i32, canvas.height() as i32);
    if x >= w || top >= h || baseline < 0 {
      debug!("标签 {} 在画布外: ({}, {})", mark.label, x, baseline);
      return;
    }

    draw_text_mut(
      canvas,
      self.label_color,
      x,
      top,
      scale,
      &self.font.font,
      mark.label,
    );
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::MlObjectType;

  const YELLOW: Rgba<u8> = Rgba([255, 255, 0, 255]);

  fn white(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]))
  }

  fn overlay() -> Overlay {
    Overlay::with_bundled_font().unwrap()
  }

  fn dark_box(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    image
      .enumerate_pixels()
      .filter(|(_, _, p)| p[0] < 128 && p[1] < 128 && p[2] < 128)
      .fold(None, |acc, (x, y, _)| match acc {
        None => Some((x, y, x, y)),
        Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
      })
  }

  fn plant() -> MlObject {
    MlObject::new(Border::new(10, 10, 50, 50), MlObjectType::Plant, 0.9)
  }

  #[test]
  fn layout_follows_input_order() {
    let overlay = overlay();
    let objects = vec![
      plant(),
      MlObject::new(Border::new(0, 0, 5, 5), MlObjectType::Unrecognized(1), 0.1),
      MlObject::new(Border::new(-30, -40, 5, 5), MlObjectType::Face, 0.7),
    ];

    let marks = overlay.layout(&objects);
    assert_eq!(
      marks,
      vec![
        OverlayMark {
          border: Border::new(10, 10, 50, 50),
          label: "Plant",
          anchor: (30, 30),
        },
        OverlayMark {
          border: Border::new(0, 0, 5, 5),
          label: "No match",
          anchor: (20, 20),
        },
        OverlayMark {
          border: Border::new(-30, -40, 5, 5),
          label: "Face",
          anchor: (-10, -20),
        },
      ]
    );
  }

  #[test]
  fn render_draws_yellow_border_on_a_copy() {
    let overlay = overlay();
    let input = white(64, 64);
    let before = input.clone();

    let output = overlay.render(&input, &[plant()]);
    assert_eq!(input, before);

    for (x, y) in [(10, 10), (50, 50), (10, 50), (50, 10), (30, 10), (10, 30)] {
      assert_eq!(*output.get_pixel(x, y), YELLOW, "({}, {})", x, y);
    }
    // 描边宽 4，以边框线为中心
    assert_eq!(*output.get_pixel(8, 30), YELLOW);
    assert_eq!(*output.get_pixel(11, 30), YELLOW);
    assert_eq!(*output.get_pixel(7, 30), Rgba([255, 255, 255, 255]));
    assert_eq!(*output.get_pixel(12, 30), Rgba([255, 255, 255, 255]));
    // 不填充
    assert_eq!(*output.get_pixel(30, 45), Rgba([255, 255, 255, 255]));
  }

  #[test]
  fn empty_result_is_an_identical_copy() {
    let overlay = overlay();
    let mut input = white(16, 9);
    input.put_pixel(3, 4, Rgba([9, 8, 7, 6]));

    let output = overlay.render(&input, &[]);
    assert_eq!(output, input);
  }

  #[test]
  fn out_of_bounds_border_is_partially_drawn() {
    let overlay = overlay();
    let input = white(32, 32);
    let object = MlObject::new(Border::new(-100, 20, 200, 300), MlObjectType::Food, 0.5);

    let output = overlay.render(&input, &[object]);
    assert_eq!(*output.get_pixel(0, 20), YELLOW);
    assert_eq!(*output.get_pixel(31, 21), YELLOW);
    assert_eq!(*output.get_pixel(16, 10), Rgba([255, 255, 255, 255]));

    let far_away = MlObject::new(Border::new(500, 500, 600, 600), MlObjectType::Food, 0.5);
    assert_eq!(overlay.render(&input, &[far_away]), input);
  }

  #[test]
  fn label_is_drawn_in_black_above_the_anchor_baseline() {
    let input = white(96, 64);
    let output = overlay().render(&input, &[plant()]);

    let (x0, y0, x1, y1) = dark_box(&output).unwrap();
    // 锚点 (30, 30) 是基线左端
    assert!(x0 >= 30, "{:?}", (x0, y0, x1, y1));
    assert!(y1 <= 29, "{:?}", (x0, y0, x1, y1));
    assert!(y0 >= 30 - 16, "{:?}", (x0, y0, x1, y1));
    assert!(x1 > x0 + 16, "{:?}", (x0, y0, x1, y1));
  }

  #[test]
  fn loaded_font_overrides_bundled_one() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("label.ttf");
    std::fs::write(&path, BUNDLED_FONT).unwrap();

    let font = LabelFont::load(&path).unwrap();
    assert_eq!(font.path(), Some(path.as_path()));
    assert!(LabelFont::bundled().unwrap().path().is_none());

    let output = Overlay::new(font).render(&white(96, 64), &[plant()]);
    assert!(dark_box(&output).is_some());
  }

  #[test]
  fn invalid_font_file_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.ttf");
    std::fs::write(&path, b"not a font").unwrap();

    assert!(matches!(LabelFont::load(&path), Err(FontError::InvalidFont(_))));
    assert!(matches!(
      LabelFont::load(dir.path().join("missing.ttf")),
      Err(FontError::IoError(_))
    ));
  }

  #[test]
  fn label_far_off_canvas_is_skipped() {
    let input = white(32, 32);
    let objects = [
      MlObject::new(
        Border::new(i32::MAX - 5, i32::MAX - 5, i32::MAX, i32::MAX),
        MlObjectType::Food,
        0.5,
      ),
      MlObject::new(Border::new(i32::MAX - 5, 0, i32::MAX, 5), MlObjectType::Food, 0.5),
      MlObject::new(Border::new(0, i32::MAX - 5, 5, i32::MAX), MlObjectType::Food, 0.5),
      MlObject::new(
        Border::new(i32::MIN, i32::MIN, i32::MIN + 5, i32::MIN + 5),
        MlObjectType::Food,
        0.5,
      ),
    ];

    let output = overlay().render(&input, &objects);
    assert_eq!(dark_box(&output), None);
  }

  #[test]
  fn inverted_border_is_drawn_sorted() {
    let input = white(64, 64);
    let inverted = MlObject::new(Border::new(50, 50, 10, 10), MlObjectType::Plant, 0.9);

    let sorted = overlay().render(&input, &[plant()]);
    let output = overlay().render(&input, &[inverted]);
    for (x, y) in [(10, 10), (50, 50), (10, 50), (50, 10)] {
      assert_eq!(*output.get_pixel(x, y), YELLOW, "({}, {})", x, y);
    }
    // 边框相同，标签锚点取原始的 left/top
    assert_eq!(*output.get_pixel(8, 30), *sorted.get_pixel(8, 30));
    assert_eq!(*output.get_pixel(30, 45), Rgba([255, 255, 255, 255]));
  }
}
