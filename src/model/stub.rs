// 该文件是 Kanwu （看物） 项目的一部分。
// src/model/stub.rs - 空检测引擎
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

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::MlFrame,
  model::{AnalyzerSetting, EngineError, MlObject, ObjectEngine},
};

/// 什么都检测不到的引擎，用于检查整条流程
pub struct StubEngine {
  setting: AnalyzerSetting,
  stopped: AtomicBool,
}

impl StubEngine {
  pub fn new(setting: AnalyzerSetting) -> Self {
    info!("创建空检测引擎");
    Self {
      setting,
      stopped: AtomicBool::new(false),
    }
  }
}

impl FromUrlWithScheme for StubEngine {
  const SCHEME: &'static str = "stub";
}

impl FromUrl for StubEngine {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(EngineError::SchemeMismatch(format!(
        "期望引擎 '{}', 实际引擎 '{}'",
        Self::SCHEME,
        url.scheme()
      )));
    }
    Ok(Self::new(AnalyzerSetting::default_picture()))
  }
}

impl ObjectEngine for StubEngine {
  fn name(&self) -> &'static str {
    "stub"
  }

  fn analyse_frame(&self, frame: &MlFrame) -> Result<Vec<MlObject>, EngineError> {
    if self.stopped.load(Ordering::Acquire) {
      return Err(EngineError::Stopped);
    }
    debug!("空引擎收到 {}x{} 帧", frame.width(), frame.height());
    Ok(self.setting.apply(Vec::new()))
  }

  fn stop(&self) -> Result<(), EngineError> {
    self.stopped.store(true, Ordering::Release);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use image::RgbaImage;

  #[test]
  fn stub_returns_nothing_until_stopped() {
    let engine = StubEngine::from_url(&Url::parse("stub:").unwrap()).unwrap();
    let frame = MlFrame::from_image(&RgbaImage::new(4, 4));

    assert!(engine.analyse_frame(&frame).unwrap().is_empty());
    engine.stop().unwrap();
    assert!(matches!(
      engine.analyse_frame(&frame),
      Err(EngineError::Stopped)
    ));
  }
}
