// 该文件是 Kanwu （看物） 项目的一部分。
// src/bin/kanwu.rs - 选图检测程序
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

use std::{io::Cursor, path::PathBuf, sync::Arc};

use anyhow::Result;
use clap::{Parser, ValueEnum};
use tracing::info;
use url::Url;

use kanwu::{
  FromUrl,
  analyzer::Analyzer,
  input::LinePicker,
  model::{AnalyzerSetting, AnalyzerType, EngineBuilder},
  output::{DisplayWrapper, LabelFont, Overlay},
  task::{DetectionScreen, StalePolicy, stop_on_interrupt},
};

#[derive(ValueEnum, Clone, Copy, Debug)]
pub enum Stale {
  /// 丢弃不属于最近一次选图的结果
  Discard,
  /// 仍然展示过期结果
  Deliver,
}

impl From<Stale> for StalePolicy {
  fn from(stale: Stale) -> Self {
    match stale {
      Stale::Discard => StalePolicy::Discard,
      Stale::Deliver => StalePolicy::Deliver,
    }
  }
}

/// Kanwu 选图检测
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 检测引擎（stub: 或 sidecar:[///结果目录]）
  #[arg(long, value_name = "ENGINE", default_value = "sidecar:")]
  pub engine: Url,
  /// 展示输出（image:///out.png 或 dir:///out/）
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 标签字体文件，不指定时使用内置字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 过期结果的处理方式
  #[arg(long, value_enum, default_value_t = Stale::Discard)]
  pub stale: Stale,
  /// 每张图只返回一个结果
  #[arg(long)]
  pub single_result: bool,
  /// 关闭分类
  #[arg(long)]
  pub no_classification: bool,
  /// 依次选取的图片；为空时从标准输入逐行读取
  #[arg(value_name = "IMAGE")]
  pub images: Vec<String>,
}

fn setting_from(args: &Args) -> AnalyzerSetting {
  let mut factory = AnalyzerSetting::factory().analyzer_type(AnalyzerType::Picture);
  if !args.single_result {
    factory = factory.allow_multi_results();
  }
  if !args.no_classification {
    factory = factory.allow_classification();
  }
  factory.create()
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("检测引擎: {}", args.engine);
  info!("展示输出: {}", args.output);

  let setting = setting_from(&args);
  let engine = EngineBuilder::from_url(&args.engine)?
    .setting(setting.clone())
    .build()?;
  let analyzer = Analyzer::acquire(Arc::new(engine), setting);

  let font = match &args.font {
    Some(path) => LabelFont::load(path)?,
    None => LabelFont::bundled()?,
  };
  let overlay = Overlay::new(font);
  let display = DisplayWrapper::from_url(&args.output)?;

  let stop = stop_on_interrupt()?;
  let mut screen =
    DetectionScreen::new(analyzer, overlay, display).with_stale_policy(args.stale.into());

  if args.images.is_empty() {
    info!("从标准输入读取图片路径，每行一张，空行表示取消");
    let mut picker = LinePicker::new(std::io::stdin().lock());
    screen.run(&mut picker, &stop);
  } else {
    let mut picker = LinePicker::new(Cursor::new(args.images.join("\n")));
    screen.run(&mut picker, &stop);
  }

  let summary = screen.close()?;
  info!(
    "处理完成: 选图 {} 次, 展示 {} 次, 失败 {} 次, 丢弃 {} 次, 共 {} 个物体",
    summary.picks, summary.displayed, summary.failed, summary.discarded, summary.objects
  );

  Ok(())
}
