// 该文件是 Kanwu （看物） 项目的一部分。
// src/frame.rs - 检测引擎输入帧定义
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

use image::RgbaImage;
use url::Url;

const RGB_CHANNELS: usize = 3;

/// 检测引擎的输入帧：NHWC 排列的 RGB 数据
///
/// 只做像素格式转换（丢弃 alpha 通道），不缩放、不裁剪。
#[derive(Debug, Clone)]
pub struct MlFrame {
  data: Box<[u8]>,
  width: usize,
  height: usize,
  source: Option<Url>,
}

impl MlFrame {
  pub fn from_image(image: &RgbaImage) -> Self {
    let (width, height) = image.dimensions();
    let mut data = Vec::with_capacity(width as usize * height as usize * RGB_CHANNELS);
    for pixel in image.pixels() {
      data.extend_from_slice(&pixel.0[..RGB_CHANNELS]);
    }

    Self {
      data: data.into_boxed_slice(),
      width: width as usize,
      height: height as usize,
      source: None,
    }
  }

  /// 附带图像来源，供需要原始引用的引擎使用
  pub fn with_source(mut self, source: Option<Url>) -> Self {
    self.source = source;
    self
  }

  pub fn height(&self) -> usize {
    self.height
  }

  pub fn width(&self) -> usize {
    self.width
  }

  pub fn channels(&self) -> usize {
    RGB_CHANNELS
  }

  pub fn source(&self) -> Option<&Url> {
    self.source.as_ref()
  }

  pub fn as_nhwc(&self) -> &[u8] {
    &self.data
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::Rgba;

  #[test]
  fn from_image_keeps_shape_and_drops_alpha() {
    let mut image = RgbaImage::new(3, 2);
    image.put_pixel(2, 1, Rgba([10, 20, 30, 40]));

    let frame = MlFrame::from_image(&image);
    assert_eq!(frame.width(), 3);
    assert_eq!(frame.height(), 2);
    assert_eq!(frame.as_nhwc().len(), 3 * 2 * 3);

    // 第 1 行第 2 列
    let idx = (3 + 2) * frame.channels();
    assert_eq!(&frame.as_nhwc()[idx..idx + 3], &[10, 20, 30]);
    assert!(frame.source().is_none());
  }
}
