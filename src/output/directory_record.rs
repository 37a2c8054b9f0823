// 该文件是 Kanwu （看物） 项目的一部分。
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

use std::path::PathBuf;

use image::RgbaImage;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{Display, DisplayError},
  url_file_path,
};

/// 每次展示写入一个带时间戳的新文件
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  shown: u64,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "dir";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DisplayError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(DisplayError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let directory = url_file_path(url);
    std::fs::create_dir_all(&directory)?;
    info!("输出目录: {}", directory.display());

    Ok(Self {
      directory,
      shown: 0,
    })
  }
}

impl Display for DirectoryRecordOutput {
  fn show(&mut self, image: &RgbaImage) -> Result<(), DisplayError> {
    let now = chrono::Local::now();
    // 同一毫秒内展示多次时靠序号区分
    let name = format!("{}-{:04}.png", now.format("%Y%m%d-%H%M%S%.3f"), self.shown);
    let path = self.directory.join(name);

    image.save(&path)?;
    self.shown += 1;
    info!("保存图像到文件: {}", path.display());

    Ok(())
  }
}
