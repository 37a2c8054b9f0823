// 该文件是 Kanwu （看物） 项目的一部分。
// src/model.rs - 检测数据模型与检测引擎
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

use std::fmt;

use thiserror::Error;
use url::Url;

use crate::{FromUrl, FromUrlWithScheme, frame::MlFrame};

/// 物体边框，图像像素坐标，不做任何裁剪
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Border {
  pub left: i32,
  pub top: i32,
  pub right: i32,
  pub bottom: i32,
}

impl Border {
  pub fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
    Self {
      left,
      top,
      right,
      bottom,
    }
  }

  pub fn width(&self) -> i32 {
    self.right - self.left
  }

  pub fn height(&self) -> i32 {
    self.bottom - self.top
  }
}

impl fmt::Display for Border {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "Rect({}, {} - {}, {})",
      self.left, self.top, self.right, self.bottom
    )
  }
}

/// 引擎返回的物体类别
///
/// 引擎使用一组固定的整数代码标识类别；未列出的代码（包括商品类 1）
/// 统一归为 `Unrecognized`，并保留原始代码。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MlObjectType {
  Other,
  Face,
  Food,
  Furniture,
  Place,
  Plant,
  Unrecognized(i32),
}

impl MlObjectType {
  pub const TYPE_OTHER: i32 = 0;
  pub const TYPE_GOODS: i32 = 1;
  pub const TYPE_FOOD: i32 = 2;
  pub const TYPE_FURNITURE: i32 = 3;
  pub const TYPE_PLANT: i32 = 4;
  pub const TYPE_PLACE: i32 = 5;
  pub const TYPE_FACE: i32 = 6;

  pub fn from_code(code: i32) -> Self {
    match code {
      Self::TYPE_OTHER => MlObjectType::Other,
      Self::TYPE_FOOD => MlObjectType::Food,
      Self::TYPE_FURNITURE => MlObjectType::Furniture,
      Self::TYPE_PLANT => MlObjectType::Plant,
      Self::TYPE_PLACE => MlObjectType::Place,
      Self::TYPE_FACE => MlObjectType::Face,
      other => MlObjectType::Unrecognized(other),
    }
  }

  pub fn code(&self) -> i32 {
    match self {
      MlObjectType::Other => Self::TYPE_OTHER,
      MlObjectType::Face => Self::TYPE_FACE,
      MlObjectType::Food => Self::TYPE_FOOD,
      MlObjectType::Furniture => Self::TYPE_FURNITURE,
      MlObjectType::Place => Self::TYPE_PLACE,
      MlObjectType::Plant => Self::TYPE_PLANT,
      MlObjectType::Unrecognized(code) => *code,
    }
  }

  /// 显示用标签
  pub fn label(&self) -> &'static str {
    match self {
      MlObjectType::Other => "Other",
      MlObjectType::Face => "Face",
      MlObjectType::Food => "Food",
      MlObjectType::Furniture => "Furniture",
      MlObjectType::Place => "Place",
      MlObjectType::Plant => "Plant",
      MlObjectType::Unrecognized(_) => "No match",
    }
  }
}

/// 单个检测结果
#[derive(Debug, Clone, PartialEq)]
pub struct MlObject {
  pub border: Border,
  pub type_identity: MlObjectType,
  pub type_possibility: f32,
}

impl MlObject {
  pub fn new(border: Border, type_identity: MlObjectType, type_possibility: f32) -> Self {
    Self {
      border,
      type_identity,
      type_possibility,
    }
  }
}

/// 分析模式。当前只支持静态图片。
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyzerType {
  #[default]
  Picture,
}

/// 分析器配置，启动时创建一次，之后只读
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnalyzerSetting {
  analyzer_type: AnalyzerType,
  multi_results: bool,
  classification: bool,
}

#[derive(Debug, Default)]
pub struct AnalyzerSettingFactory {
  analyzer_type: AnalyzerType,
  multi_results: bool,
  classification: bool,
}

impl AnalyzerSettingFactory {
  pub fn analyzer_type(mut self, analyzer_type: AnalyzerType) -> Self {
    self.analyzer_type = analyzer_type;
    self
  }

  pub fn allow_multi_results(mut self) -> Self {
    self.multi_results = true;
    self
  }

  pub fn allow_classification(mut self) -> Self {
    self.classification = true;
    self
  }

  pub fn create(self) -> AnalyzerSetting {
    AnalyzerSetting {
      analyzer_type: self.analyzer_type,
      multi_results: self.multi_results,
      classification: self.classification,
    }
  }
}

impl AnalyzerSetting {
  pub fn factory() -> AnalyzerSettingFactory {
    AnalyzerSettingFactory::default()
  }

  /// 静态图片、多结果、分类均开启
  pub fn default_picture() -> Self {
    Self::factory()
      .analyzer_type(AnalyzerType::Picture)
      .allow_multi_results()
      .allow_classification()
      .create()
  }

  pub fn analyzer_type(&self) -> AnalyzerType {
    self.analyzer_type
  }

  pub fn multi_results(&self) -> bool {
    self.multi_results
  }

  pub fn classification(&self) -> bool {
    self.classification
  }

  /// 按配置裁剪引擎的原始输出
  pub fn apply(&self, mut objects: Vec<MlObject>) -> Vec<MlObject> {
    if !self.multi_results {
      objects.truncate(1);
    }
    if !self.classification {
      for object in objects.iter_mut() {
        object.type_identity = MlObjectType::Other;
      }
    }
    objects
  }
}

#[derive(Error, Debug)]
pub enum EngineError {
  #[error("引擎已停止")]
  Stopped,
  #[error("帧缺少来源信息")]
  MissingSource,
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[cfg(feature = "engine_sidecar")]
  #[error("检测结果文件解析错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("引擎错误: {0}")]
  Other(String),
}

/// 外部物体检测能力
///
/// 引擎本身是不透明的：给定一帧，返回检测到的物体或错误。
/// 实现必须可以在工作线程中共享调用。
pub trait ObjectEngine: Send + Sync {
  fn name(&self) -> &'static str;

  fn analyse_frame(&self, frame: &MlFrame) -> Result<Vec<MlObject>, EngineError>;

  /// 释放引擎持有的资源
  fn stop(&self) -> Result<(), EngineError> {
    Ok(())
  }
}

mod stub;
pub use self::stub::StubEngine;

#[cfg(feature = "engine_sidecar")]
mod sidecar;
#[cfg(feature = "engine_sidecar")]
pub use self::sidecar::SidecarEngine;

pub enum EngineWrapper {
  Stub(StubEngine),
  #[cfg(feature = "engine_sidecar")]
  Sidecar(SidecarEngine),
}

impl ObjectEngine for EngineWrapper {
  fn name(&self) -> &'static str {
    match self {
      EngineWrapper::Stub(engine) => engine.name(),
      #[cfg(feature = "engine_sidecar")]
      EngineWrapper::Sidecar(engine) => engine.name(),
    }
  }

  fn analyse_frame(&self, frame: &MlFrame) -> Result<Vec<MlObject>, EngineError> {
    match self {
      EngineWrapper::Stub(engine) => engine.analyse_frame(frame),
      #[cfg(feature = "engine_sidecar")]
      EngineWrapper::Sidecar(engine) => engine.analyse_frame(frame),
    }
  }

  fn stop(&self) -> Result<(), EngineError> {
    match self {
      EngineWrapper::Stub(engine) => engine.stop(),
      #[cfg(feature = "engine_sidecar")]
      EngineWrapper::Sidecar(engine) => engine.stop(),
    }
  }
}

/// 引擎构建器：URL 选择实现，配置在构建时固定
pub struct EngineBuilder {
  url: Url,
  setting: AnalyzerSetting,
}

impl FromUrl for EngineBuilder {
  type Error = EngineError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      StubEngine::SCHEME => {}
      #[cfg(feature = "engine_sidecar")]
      SidecarEngine::SCHEME => {}
      other => {
        return Err(EngineError::SchemeMismatch(format!(
          "不支持的引擎方案 '{}'",
          other
        )));
      }
    }

    Ok(EngineBuilder {
      url: url.clone(),
      setting: AnalyzerSetting::default_picture(),
    })
  }
}

impl EngineBuilder {
  pub fn setting(mut self, setting: AnalyzerSetting) -> Self {
    self.setting = setting;
    self
  }

  pub fn build(self) -> Result<EngineWrapper, EngineError> {
    match self.url.scheme() {
      #[cfg(feature = "engine_sidecar")]
      SidecarEngine::SCHEME => Ok(EngineWrapper::Sidecar(SidecarEngine::new(
        &self.url,
        self.setting,
      )?)),
      StubEngine::SCHEME => Ok(EngineWrapper::Stub(StubEngine::new(self.setting))),
      other => Err(EngineError::SchemeMismatch(format!(
        "不支持的引擎方案 '{}'",
        other
      ))),
    }
  }
}
