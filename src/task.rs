// 该文件是 Kanwu （看物） 项目的一部分。
// src/task.rs - 选图、检测、绘制、展示流程
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
  collections::HashMap,
  sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
  },
  thread,
  time::Duration,
};

use image::RgbaImage;
use tracing::{debug, error, info, warn};

use crate::{
  analyzer::{Analyzer, Completion, Generation, Wait},
  frame::MlFrame,
  input::{
    Acquisition, ContentFilter, IMAGE_REQUEST_CODE, ImagePicker, PickRequest, PickResponse,
    acquire,
  },
  model::EngineError,
  output::{Display, Overlay},
};

const FORCE_EXIT_AFTER: Duration = Duration::from_secs(30);

/// 过期结果（不属于最近一次选图）的处理方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StalePolicy {
  /// 丢弃
  #[default]
  Discard,
  /// 仍然绘制在产生它的那张图上并展示
  Deliver,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickOutcome {
  Cancelled,
  Ignored,
  DecodeFailed,
  Submitted(Generation),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionOutcome {
  Displayed { generation: Generation, objects: usize },
  Failed(Generation),
  Discarded(Generation),
  /// 绘制完成但展示失败
  DisplayFailed(Generation),
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ScreenSummary {
  pub picks: u64,
  pub displayed: u64,
  pub failed: u64,
  pub discarded: u64,
  pub objects: u64,
}

/// 单屏流程：选一张图，异步检测，把结果画在图上展示
///
/// 分析器随屏幕创建，`close` 或析构时释放。
pub struct DetectionScreen<D> {
  analyzer: Analyzer,
  overlay: Overlay,
  display: D,
  filter: ContentFilter,
  request: PickRequest,
  stale_policy: StalePolicy,
  generation: Generation,
  current: Option<Arc<RgbaImage>>,
  // 每个进行中的分析对应的原图
  pending: HashMap<Generation, Arc<RgbaImage>>,
  summary: ScreenSummary,
}

impl<D: Display> DetectionScreen<D> {
  pub fn new(analyzer: Analyzer, overlay: Overlay, display: D) -> Self {
    Self {
      analyzer,
      overlay,
      display,
      filter: ContentFilter::any_image(),
      request: PickRequest {
        request_code: IMAGE_REQUEST_CODE,
      },
      stale_policy: StalePolicy::default(),
      generation: Generation(0),
      current: None,
      pending: HashMap::new(),
      summary: ScreenSummary::default(),
    }
  }

  pub fn with_stale_policy(mut self, stale_policy: StalePolicy) -> Self {
    self.stale_policy = stale_policy;
    self
  }

  pub fn analyzer(&self) -> &Analyzer {
    &self.analyzer
  }

  pub fn display(&self) -> &D {
    &self.display
  }

  pub fn current_image(&self) -> Option<&RgbaImage> {
    self.current.as_deref()
  }

  pub fn generation(&self) -> Generation {
    self.generation
  }

  pub fn summary(&self) -> ScreenSummary {
    self.summary
  }

  pub fn request(&self) -> &PickRequest {
    &self.request
  }

  pub fn filter(&self) -> &ContentFilter {
    &self.filter
  }

  /// 处理一次选图结果；成功解码后立即提交分析
  pub fn on_pick(&mut self, response: PickResponse) -> PickOutcome {
    let picked = match acquire(&self.request, response) {
      Ok(Acquisition::Picked(picked)) => picked,
      Ok(Acquisition::Cancelled) => {
        info!("用户取消选图");
        return PickOutcome::Cancelled;
      }
      Ok(Acquisition::Ignored) => return PickOutcome::Ignored,
      Err(e) => {
        error!("图片解码失败: {}", e);
        return PickOutcome::DecodeFailed;
      }
    };

    self.summary.picks += 1;
    self.generation = self.generation.next();
    let generation = self.generation;
    info!(
      "选中图片 {} ({}x{})，提交分析 {}",
      picked.source,
      picked.image.width(),
      picked.image.height(),
      generation
    );

    let frame = MlFrame::from_image(&picked.image).with_source(Some(picked.source));
    let image = Arc::new(picked.image);
    self.current = Some(Arc::clone(&image));
    self.pending.insert(generation, image);
    self.analyzer.analyze(frame, generation);

    PickOutcome::Submitted(generation)
  }

  /// 处理一次分析回调
  pub fn on_completion(&mut self, completion: Completion) -> CompletionOutcome {
    let Completion {
      generation,
      outcome,
    } = completion;
    let source = self.pending.remove(&generation);

    let objects = match outcome {
      Ok(objects) => objects,
      Err(e) => {
        error!("物体检测失败 {}: {}", generation, e);
        self.summary.failed += 1;
        return CompletionOutcome::Failed(generation);
      }
    };

    let stale = generation != self.generation;
    let image = match (stale, self.stale_policy, source) {
      (false, _, Some(image)) => image,
      (true, StalePolicy::Deliver, Some(image)) => {
        warn!("分析 {} 已过期（最新 {}），仍然展示", generation, self.generation);
        image
      }
      _ => {
        warn!(
          "丢弃过期的分析结果 {}（最新 {}）",
          generation, self.generation
        );
        self.summary.discarded += 1;
        return CompletionOutcome::Discarded(generation);
      }
    };

    info!("分析 {} 检测到 {} 个物体", generation, objects.len());
    let rendered = self.overlay.render(&image, &objects);
    let count = objects.len();

    if let Err(e) = self.display.show(&rendered) {
      error!("展示失败 {}: {}", generation, e);
      return CompletionOutcome::DisplayFailed(generation);
    }

    self.summary.displayed += 1;
    self.summary.objects += count as u64;
    CompletionOutcome::Displayed {
      generation,
      objects: count,
    }
  }

  /// 处理下一个到达的回调
  pub fn step(&mut self, wait: Wait) -> Option<CompletionOutcome> {
    let completion = self.analyzer.next_completion(wait)?;
    Some(self.on_completion(completion))
  }

  /// 处理所有已到达的回调
  pub fn pump(&mut self, wait: Wait) -> Vec<CompletionOutcome> {
    let mut outcomes = Vec::new();
    while let Some(outcome) = self.step(wait) {
      outcomes.push(outcome);
    }
    outcomes
  }

  /// 不断选图直到选图器没有更多操作或收到停止信号，然后等待剩余的分析
  pub fn run<P: ImagePicker>(&mut self, picker: &mut P, stop: &AtomicBool) -> ScreenSummary {
    info!("开始选图...");
    while !stop.load(Ordering::Acquire) {
      let Some(response) = picker.pick(&self.request, &self.filter) else {
        debug!("选图器没有更多操作");
        break;
      };
      let outcome = self.on_pick(response);
      debug!("选图结果: {:?}", outcome);
      self.pump(Wait::Poll);
    }

    if stop.load(Ordering::Acquire) {
      warn!("收到停止信号，不再等待进行中的分析");
    } else if self.analyzer.in_flight() > 0 {
      info!("等待 {} 个进行中的分析...", self.analyzer.in_flight());
      self.pump(Wait::Block);
    }

    info!("选图结束: {:?}", self.summary);
    self.summary
  }

  /// 屏幕关闭，释放分析器
  pub fn close(self) -> Result<ScreenSummary, EngineError> {
    let summary = self.summary;
    self.analyzer.stop()?;
    Ok(summary)
  }
}

/// 监听 Ctrl-C 的停止标志
pub fn stop_on_interrupt() -> Result<Arc<AtomicBool>, ctrlc::Error> {
  let stop = Arc::new(AtomicBool::new(false));
  let flag = Arc::clone(&stop);
  ctrlc::set_handler(move || {
    info!("收到中断信号，准备退出...");
    flag.store(true, Ordering::Release);
    // 选图器可能阻塞在读取上
    thread::spawn(|| {
      thread::sleep(FORCE_EXIT_AFTER);
      warn!("强制退出程序");
      std::process::exit(1);
    });
  })?;
  Ok(stop)
}
