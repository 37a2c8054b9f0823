// 该文件是 Kanwu （看物） 项目的一部分。
// src/output.rs - 输出定义
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
use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme};

/// 显示界面：接收一张图像用于展示
pub trait Display {
  fn show(&mut self, image: &RgbaImage) -> Result<(), DisplayError>;
}

pub mod draw;
pub use self::draw::{FontError, LabelFont, Overlay, OverlayMark};

mod save_image_file;
pub use self::save_image_file::SaveImageFileOutput;

#[cfg(feature = "directory_record")]
mod directory_record;
#[cfg(feature = "directory_record")]
pub use self::directory_record::DirectoryRecordOutput;

#[derive(Error, Debug)]
pub enum DisplayError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

pub enum DisplayWrapper {
  SaveImageFileOutput(SaveImageFileOutput),
  #[cfg(feature = "directory_record")]
  DirectoryRecordOutput(DirectoryRecordOutput),
}

impl FromUrl for DisplayWrapper {
  type Error = DisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      SaveImageFileOutput::SCHEME => Ok(DisplayWrapper::SaveImageFileOutput(
        SaveImageFileOutput::from_url(url)?,
      )),
      #[cfg(feature = "directory_record")]
      DirectoryRecordOutput::SCHEME => Ok(DisplayWrapper::DirectoryRecordOutput(
        DirectoryRecordOutput::from_url(url)?,
      )),
      other => Err(DisplayError::SchemeMismatch(format!(
        "不支持的输出方案 '{}'",
        other
      ))),
    }
  }
}

impl Display for DisplayWrapper {
  fn show(&mut self, image: &RgbaImage) -> Result<(), DisplayError> {
    match self {
      DisplayWrapper::SaveImageFileOutput(output) => output.show(image),
      #[cfg(feature = "directory_record")]
      DisplayWrapper::DirectoryRecordOutput(output) => output.show(image),
    }
  }
}
