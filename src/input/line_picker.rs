// 该文件是 Kanwu （看物） 项目的一部分。
// src/input/line_picker.rs - 逐行读取的选图器
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

use std::io::BufRead;

use tracing::{error, warn};
use url::Url;

use crate::input::{ContentFilter, ImagePicker, PickRequest, PickResponse};

/// 每行一次用户操作
///
/// 空行或 `-` 表示取消；其余内容可以是 `file:`/`image:` URL，也可以是文件路径。
pub struct LinePicker<R> {
  reader: R,
}

impl<R: BufRead> LinePicker<R> {
  pub fn new(reader: R) -> Self {
    Self { reader }
  }

  fn to_url(line: &str) -> Option<Url> {
    if let Ok(url) = Url::parse(line)
      && matches!(url.scheme(), "file" | "image")
    {
      return Some(url);
    }

    let path = match std::path::absolute(line) {
      Ok(path) => path,
      Err(e) => {
        warn!("无法解析路径 '{}': {}", line, e);
        return None;
      }
    };
    Url::from_file_path(&path).ok()
  }
}

impl<R: BufRead> ImagePicker for LinePicker<R> {
  fn pick(&mut self, request: &PickRequest, filter: &ContentFilter) -> Option<PickResponse> {
    let mut line = String::new();
    match self.reader.read_line(&mut line) {
      Ok(0) => return None,
      Ok(_) => {}
      Err(e) => {
        error!("读取选图输入失败: {}", e);
        return None;
      }
    }

    let line = line.trim();
    if line.is_empty() || line == "-" {
      return Some(PickResponse::cancelled(request.request_code));
    }

    match Self::to_url(line) {
      Some(url) if filter.matches(&url) => Some(PickResponse::ok(request.request_code, url)),
      Some(url) => {
        warn!("'{}' 不符合过滤条件 {}", url, filter.mime());
        Some(PickResponse::cancelled(request.request_code))
      }
      None => Some(PickResponse::cancelled(request.request_code)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::input::{IMAGE_REQUEST_CODE, PickStatus};
  use std::io::Cursor;

  #[test]
  fn one_response_per_line() {
    let input = "image:///tmp/a.png\n\n/tmp/b.jpg\nnotes.txt\n-\n";
    let mut picker = LinePicker::new(Cursor::new(input));
    let request = PickRequest {
      request_code: IMAGE_REQUEST_CODE,
    };
    let filter = ContentFilter::any_image();

    let first = picker.pick(&request, &filter).unwrap();
    assert_eq!(first.status, PickStatus::Ok);
    assert_eq!(first.content.unwrap().as_str(), "image:///tmp/a.png");

    let second = picker.pick(&request, &filter).unwrap();
    assert_eq!(second.status, PickStatus::Cancelled);

    let third = picker.pick(&request, &filter).unwrap();
    assert_eq!(third.status, PickStatus::Ok);
    assert_eq!(third.content.unwrap().scheme(), "file");

    let filtered = picker.pick(&request, &filter).unwrap();
    assert_eq!(filtered.status, PickStatus::Cancelled);

    let dashed = picker.pick(&request, &filter).unwrap();
    assert_eq!(dashed.status, PickStatus::Cancelled);
    assert_eq!(dashed.request_code, IMAGE_REQUEST_CODE);

    assert!(picker.pick(&request, &filter).is_none());
  }
}
