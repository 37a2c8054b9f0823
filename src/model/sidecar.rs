// 该文件是 Kanwu （看物） 项目的一部分。
// src/model/sidecar.rs - 读取伴随文件的检测引擎
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
  path::{Path, PathBuf},
  sync::atomic::{AtomicBool, Ordering},
};

use serde::Deserialize;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::MlFrame,
  model::{AnalyzerSetting, Border, EngineError, MlObject, MlObjectType, ObjectEngine},
  url_file_path,
};

#[derive(Deserialize, Debug)]
struct SidecarBorder {
  left: i32,
  top: i32,
  right: i32,
  bottom: i32,
}

#[derive(Deserialize, Debug)]
struct SidecarRecord {
  border: SidecarBorder,
  type_identity: i32,
  #[serde(default)]
  type_possibility: f32,
}

impl From<SidecarRecord> for MlObject {
  fn from(record: SidecarRecord) -> Self {
    let SidecarBorder {
      left,
      top,
      right,
      bottom,
    } = record.border;
    MlObject::new(
      Border::new(left, top, right, bottom),
      MlObjectType::from_code(record.type_identity),
      record.type_possibility,
    )
  }
}

/// 回放预先计算好的检测结果
///
/// `photo.jpg` 对应 `photo.json`，默认与图片放在同一目录；
/// URL 带路径时（`sidecar:///labels`）在该目录下查找。
pub struct SidecarEngine {
  directory: Option<PathBuf>,
  setting: AnalyzerSetting,
  stopped: AtomicBool,
}

impl FromUrlWithScheme for SidecarEngine {
  const SCHEME: &'static str = "sidecar";
}

impl FromUrl for SidecarEngine {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    Self::new(url, AnalyzerSetting::default_picture())
  }
}

impl SidecarEngine {
  pub fn new(url: &Url, setting: AnalyzerSetting) -> Result<Self, EngineError> {
    if url.scheme() != Self::SCHEME {
      return Err(EngineError::SchemeMismatch(format!(
        "期望引擎 '{}', 实际引擎 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }

    let directory = if url.path().is_empty() {
      None
    } else {
      Some(url_file_path(url))
    };

    match &directory {
      Some(dir) => info!("创建伴随文件引擎，结果目录: {}", dir.display()),
      None => info!("创建伴随文件引擎，结果与图片同目录"),
    }

    Ok(Self {
      directory,
      setting,
      stopped: AtomicBool::new(false),
    })
  }

  fn sidecar_path(&self, image_path: &Path) -> Result<PathBuf, EngineError> {
    match &self.directory {
      None => Ok(image_path.with_extension("json")),
      Some(dir) => {
        let stem = image_path.file_stem().ok_or(EngineError::MissingSource)?;
        let mut name = stem.to_os_string();
        name.push(".json");
        Ok(dir.join(name))
      }
    }
  }
}

impl ObjectEngine for SidecarEngine {
  fn name(&self) -> &'static str {
    "sidecar"
  }

  fn analyse_frame(&self, frame: &MlFrame) -> Result<Vec<MlObject>, EngineError> {
    if self.stopped.load(Ordering::Acquire) {
      return Err(EngineError::Stopped);
    }

    let source = frame.source().ok_or(EngineError::MissingSource)?;
    let path = self.sidecar_path(&url_file_path(source))?;
    debug!("读取检测结果文件: {}", path.display());

    let records: Vec<SidecarRecord> = serde_json::from_slice(&std::fs::read(&path)?)?;
    let objects = records.into_iter().map(MlObject::from).collect();
    Ok(self.setting.apply(objects))
  }

  fn stop(&self) -> Result<(), EngineError> {
    self.stopped.store(true, Ordering::Release);
    Ok(())
  }
}
