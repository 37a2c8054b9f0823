// 该文件是 Kanwu （看物） 项目的一部分。
// src/analyzer.rs - 异步物体分析器
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
  fmt,
  panic::{self, AssertUnwindSafe},
  sync::{
    Arc,
    mpsc::{self, Receiver, Sender, TryRecvError},
  },
  thread,
};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  frame::MlFrame,
  model::{AnalyzerSetting, EngineError, MlObject, ObjectEngine},
};

/// 提交编号，每次选图递增
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Generation(pub u64);

impl Generation {
  pub fn next(self) -> Self {
    Generation(self.0.wrapping_add(1))
  }
}

impl fmt::Display for Generation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{}", self.0)
  }
}

/// 分析失败，只携带不透明的描述
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{description}")]
pub struct DetectionError {
  pub description: String,
}

impl From<EngineError> for DetectionError {
  fn from(err: EngineError) -> Self {
    DetectionError {
      description: err.to_string(),
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnalyzerState {
  Idle,
  Analyzing,
  Succeeded,
  Failed,
}

/// 一次提交的唯一回调
#[derive(Debug)]
pub struct Completion {
  pub generation: Generation,
  pub outcome: Result<Vec<MlObject>, DetectionError>,
}

impl Completion {
  pub fn state(&self) -> AnalyzerState {
    match self.outcome {
      Ok(_) => AnalyzerState::Succeeded,
      Err(_) => AnalyzerState::Failed,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
  Block,
  Poll,
}

/// 检测引擎的持有者
///
/// 每次 `analyze` 在独立线程中运行引擎，结果按到达顺序经由
/// `next_completion` 取得。`stop` 或析构时释放引擎。
pub struct Analyzer {
  engine: Arc<dyn ObjectEngine>,
  setting: AnalyzerSetting,
  tx: Sender<Completion>,
  rx: Receiver<Completion>,
  in_flight: usize,
  stopped: bool,
}

impl Analyzer {
  pub fn acquire(engine: Arc<dyn ObjectEngine>, setting: AnalyzerSetting) -> Self {
    info!(
      "创建分析器: 引擎 {}, 模式 {:?}, 多结果 {}, 分类 {}",
      engine.name(),
      setting.analyzer_type(),
      setting.multi_results(),
      setting.classification()
    );
    let (tx, rx) = mpsc::channel();
    Self {
      engine,
      setting,
      tx,
      rx,
      in_flight: 0,
      stopped: false,
    }
  }

  pub fn setting(&self) -> &AnalyzerSetting {
    &self.setting
  }

  pub fn engine_name(&self) -> &'static str {
    self.engine.name()
  }

  pub fn state(&self) -> AnalyzerState {
    if self.in_flight > 0 {
      AnalyzerState::Analyzing
    } else {
      AnalyzerState::Idle
    }
  }

  pub fn in_flight(&self) -> usize {
    self.in_flight
  }

  /// 提交一帧，立即返回
  pub fn analyze(&mut self, frame: MlFrame, generation: Generation) {
    let engine = Arc::clone(&self.engine);
    let tx = self.tx.clone();
    self.in_flight += 1;
    debug!("提交分析 {}，进行中 {}", generation, self.in_flight);

    let spawned = thread::Builder::new()
      .name(format!("kanwu-analyze-{}", generation.0))
      .spawn(move || {
        // 引擎 panic 时同样回调一次
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| engine.analyse_frame(&frame)))
          .unwrap_or_else(|_| Err(EngineError::Other("引擎异常退出".to_string())))
          .map_err(DetectionError::from);
        // 接收端已释放时结果直接丢弃
        let _ = tx.send(Completion {
          generation,
          outcome,
        });
      });

    if let Err(e) = spawned {
      warn!("无法启动分析线程: {}", e);
      let _ = self.tx.send(Completion {
        generation,
        outcome: Err(DetectionError {
          description: format!("无法启动分析线程: {}", e),
        }),
      });
    }
  }

  /// 取下一个到达的结果；没有进行中的提交时返回 `None`
  pub fn next_completion(&mut self, wait: Wait) -> Option<Completion> {
    if self.in_flight == 0 {
      return None;
    }

    let completion = match wait {
      Wait::Block => self.rx.recv().ok()?,
      Wait::Poll => match self.rx.try_recv() {
        Ok(completion) => completion,
        Err(TryRecvError::Empty) => return None,
        Err(TryRecvError::Disconnected) => return None,
      },
    };

    self.in_flight -= 1;
    debug!(
      "分析 {} 完成: {:?}，进行中 {}",
      completion.generation,
      completion.state(),
      self.in_flight
    );
    Some(completion)
  }

  /// 显式释放引擎
  pub fn stop(mut self) -> Result<(), EngineError> {
    self.release()
  }

  fn release(&mut self) -> Result<(), EngineError> {
    if self.stopped {
      return Ok(());
    }
    self.stopped = true;
    if self.in_flight > 0 {
      warn!("释放分析器时仍有 {} 个分析未完成", self.in_flight);
    }
    info!("释放分析器: 引擎 {}", self.engine.name());
    self.engine.stop()
  }
}

impl Drop for Analyzer {
  fn drop(&mut self) {
    if let Err(e) = self.release() {
      warn!("释放分析器失败: {}", e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::model::{Border, MlObjectType};
  use image::RgbaImage;
  use std::sync::{
    Mutex,
    atomic::{AtomicBool, Ordering},
  };

  struct FixedEngine {
    result: Mutex<Option<Result<Vec<MlObject>, String>>>,
    stopped: Arc<AtomicBool>,
  }

  impl ObjectEngine for FixedEngine {
    fn name(&self) -> &'static str {
      "fixed"
    }

    fn analyse_frame(&self, _frame: &MlFrame) -> Result<Vec<MlObject>, EngineError> {
      match self.result.lock().unwrap().take() {
        Some(Ok(objects)) => Ok(objects),
        Some(Err(msg)) => Err(EngineError::Other(msg)),
        None => Ok(Vec::new()),
      }
    }

    fn stop(&self) -> Result<(), EngineError> {
      self.stopped.store(true, Ordering::SeqCst);
      Ok(())
    }
  }

  fn analyzer_with(result: Result<Vec<MlObject>, String>) -> (Analyzer, Arc<AtomicBool>) {
    let stopped = Arc::new(AtomicBool::new(false));
    let engine = FixedEngine {
      result: Mutex::new(Some(result)),
      stopped: Arc::clone(&stopped),
    };
    (
      Analyzer::acquire(Arc::new(engine), AnalyzerSetting::default_picture()),
      stopped,
    )
  }

  fn frame() -> MlFrame {
    MlFrame::from_image(&RgbaImage::new(16, 16))
  }

  #[test]
  fn success_resolves_once_and_returns_to_idle() {
    let plant = MlObject::new(Border::new(10, 10, 50, 50), MlObjectType::Plant, 0.8);
    let (mut analyzer, _) = analyzer_with(Ok(vec![plant.clone()]));
    assert_eq!(analyzer.state(), AnalyzerState::Idle);

    analyzer.analyze(frame(), Generation(1));
    assert_eq!(analyzer.state(), AnalyzerState::Analyzing);

    let completion = analyzer.next_completion(Wait::Block).unwrap();
    assert_eq!(completion.generation, Generation(1));
    assert_eq!(completion.state(), AnalyzerState::Succeeded);
    assert_eq!(completion.outcome.unwrap(), vec![plant]);

    assert_eq!(analyzer.state(), AnalyzerState::Idle);
    assert!(analyzer.next_completion(Wait::Block).is_none());
  }

  #[test]
  fn failure_carries_description() {
    let (mut analyzer, _) = analyzer_with(Err("模型不可用".to_string()));
    analyzer.analyze(frame(), Generation(3));

    let completion = analyzer.next_completion(Wait::Block).unwrap();
    assert_eq!(completion.state(), AnalyzerState::Failed);
    let err = completion.outcome.unwrap_err();
    assert!(err.description.contains("模型不可用"));
    assert_eq!(analyzer.state(), AnalyzerState::Idle);
  }

  #[test]
  fn every_submission_is_honoured() {
    let (mut analyzer, _) = analyzer_with(Ok(Vec::new()));
    analyzer.analyze(frame(), Generation(1));
    analyzer.analyze(frame(), Generation(2));
    assert_eq!(analyzer.in_flight(), 2);

    let mut seen = vec![
      analyzer.next_completion(Wait::Block).unwrap().generation,
      analyzer.next_completion(Wait::Block).unwrap().generation,
    ];
    seen.sort();
    assert_eq!(seen, vec![Generation(1), Generation(2)]);
    assert_eq!(analyzer.state(), AnalyzerState::Idle);
  }

  #[test]
  fn stop_and_drop_release_the_engine() {
    let (analyzer, stopped) = analyzer_with(Ok(Vec::new()));
    analyzer.stop().unwrap();
    assert!(stopped.load(Ordering::SeqCst));

    let (analyzer, stopped) = analyzer_with(Ok(Vec::new()));
    drop(analyzer);
    assert!(stopped.load(Ordering::SeqCst));
  }
}
