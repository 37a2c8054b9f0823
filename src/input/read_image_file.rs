// 该文件是 Kanwu （看物） 项目的一部分。
// src/input/read_image_file.rs - 图像文件解码
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

use image::{ImageReader, RgbaImage};
use thiserror::Error;
use tracing::{debug, error};
use url::Url;

use crate::url_file_path;

#[derive(Error, Debug)]
pub enum DecodeError {
  #[error("URI scheme mismatch: {0}")]
  SchemaMismatch(String),
  #[error("I/O error: {0}")]
  IoError(#[from] std::io::Error),
  #[error("Image loading error: {0}")]
  ImageLoadError(#[from] image::ImageError),
}

const FILE_SCHEME: &str = "file";
const READ_IMAGE_FILE_SCHEME: &str = "image";

/// 把选中的图片引用完整解码为 RGBA 图像
pub fn decode(content: &Url) -> Result<RgbaImage, DecodeError> {
  if content.scheme() != FILE_SCHEME && content.scheme() != READ_IMAGE_FILE_SCHEME {
    error!(
      "URI scheme mismatch: expected '{}' or '{}', found '{}'",
      FILE_SCHEME,
      READ_IMAGE_FILE_SCHEME,
      content.scheme()
    );
    return Err(DecodeError::SchemaMismatch(content.scheme().to_string()));
  }

  let path = url_file_path(content);
  let image = ImageReader::open(&path)?.with_guessed_format()?.decode()?;
  debug!(
    "解码图片 {}: {}x{}",
    path.display(),
    image.width(),
    image.height()
  );

  Ok(image.into_rgba8())
}
