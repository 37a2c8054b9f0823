// 该文件是 Kanwu （看物） 项目的一部分。
// src/input.rs - 图片选取与解码
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

use image::{ImageFormat, RgbaImage};
use tracing::debug;
use url::Url;

use crate::url_file_path;

mod line_picker;
mod read_image_file;

pub use self::line_picker::LinePicker;
pub use self::read_image_file::{DecodeError, decode};

/// 选图请求使用的请求码
pub const IMAGE_REQUEST_CODE: u32 = 30;

/// 选图器的内容过滤条件（MIME 形式）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentFilter {
  mime: String,
}

impl ContentFilter {
  /// `image/*`
  pub fn any_image() -> Self {
    Self {
      mime: "image/*".to_string(),
    }
  }

  pub fn mime(&self) -> &str {
    &self.mime
  }

  pub fn matches(&self, content: &Url) -> bool {
    let Ok(format) = ImageFormat::from_path(url_file_path(content)) else {
      return self.mime == "*/*";
    };
    match self.mime.as_str() {
      "*/*" | "image/*" => true,
      mime => ImageFormat::from_mime_type(mime) == Some(format),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PickRequest {
  pub request_code: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickStatus {
  Ok,
  Cancelled,
}

/// 选图结果，通过请求码与请求对应
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PickResponse {
  pub request_code: u32,
  pub status: PickStatus,
  pub content: Option<Url>,
}

impl PickResponse {
  pub fn ok(request_code: u32, content: Url) -> Self {
    Self {
      request_code,
      status: PickStatus::Ok,
      content: Some(content),
    }
  }

  pub fn cancelled(request_code: u32) -> Self {
    Self {
      request_code,
      status: PickStatus::Cancelled,
      content: None,
    }
  }
}

/// 系统选图器
pub trait ImagePicker {
  /// 等待一次用户操作。返回 `None` 表示不再有操作。
  fn pick(&mut self, request: &PickRequest, filter: &ContentFilter) -> Option<PickResponse>;
}

pub struct PickedImage {
  pub image: RgbaImage,
  pub source: Url,
}

pub enum Acquisition {
  Picked(PickedImage),
  Cancelled,
  /// 请求码不匹配的结果
  Ignored,
}

/// 处理一次选图结果：校验请求码，解码所选图片
pub fn acquire(request: &PickRequest, response: PickResponse) -> Result<Acquisition, DecodeError> {
  if response.request_code != request.request_code {
    debug!(
      "忽略请求码 {} 的选图结果（期望 {}）",
      response.request_code, request.request_code
    );
    return Ok(Acquisition::Ignored);
  }

  let content = match (response.status, response.content) {
    (PickStatus::Ok, Some(content)) => content,
    _ => return Ok(Acquisition::Cancelled),
  };

  let image = decode(&content)?;
  Ok(Acquisition::Picked(PickedImage {
    image,
    source: content,
  }))
}
