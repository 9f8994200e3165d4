// 该文件是 Shanan （山南西风） 项目的一部分。
// src/bin/ssd_oneshot.rs - 单张图像 SSD 检测结果绘制
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

use anyhow::{Context, Result};
use clap::Parser;
use url::Url;

use shanan_ssd::{
  FromUrl,
  category::CategoryRegistry,
  input::InputWrapper,
  model::TensorDumpModelBuilder,
  output::{DetectionPainter, OutputWrapper},
  output::draw::{Draw, DrawConfig, LabelIndexing},
  task::{OneShotTask, Task},
};
use tracing::info;

/// Shanan SSD 参数配置
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
  /// 模型输出路径，例如 tensor:///path/to/ssd_output.json
  #[arg(long, value_name = "MODEL")]
  pub model: Url,
  /// 输入来源，例如 image:///path/to/input.jpg
  #[arg(long, value_name = "SOURCE")]
  pub input: Url,
  /// 输出路径，例如 image:///path/to/out.png 或 folder:///path/to/dir?record=name
  #[arg(long, value_name = "OUTPUT")]
  pub output: Url,
  /// 类别文件，每行一个类别名称
  #[arg(long, value_name = "FILE", default_value = "labels/coco_class_labels.txt")]
  pub labels: PathBuf,
  /// 置信度阈值 (0.0 - 1.0)，严格大于阈值才绘制
  #[arg(long, default_value_t = 0.5, value_name = "THRESHOLD")]
  pub threshold: f32,
  /// 类别颜色随机种子
  #[arg(long, default_value_t = 0, value_name = "SEED")]
  pub seed: u64,
  /// 标签字体文件 (TTF/OTF)，不指定时使用内置字体
  #[arg(long, value_name = "FONT")]
  pub font: Option<PathBuf>,
  /// 边框宽度（像素）
  #[arg(long, default_value_t = 2, value_name = "PIXELS")]
  pub stroke: u32,
  /// 类别编号方式: direct, shifted, legacy
  #[arg(long, default_value_t = LabelIndexing::Direct, value_name = "INDEXING")]
  pub indexing: LabelIndexing,
}

fn main() -> Result<()> {
  tracing_subscriber::fmt::init();

  let args = Args::parse();

  info!("模型路径: {}", args.model);
  info!("输入来源: {}", args.input);
  info!("输出路径: {}", args.output);
  info!("类别文件: {}", args.labels.display());
  info!("置信度阈值: {}", args.threshold);

  if !(0.0..=1.0).contains(&args.threshold) {
    anyhow::bail!("置信度阈值必须在 0.0 到 1.0 之间: {}", args.threshold);
  }

  let registry = CategoryRegistry::load_seeded(&args.labels, args.seed)
    .with_context(|| format!("无法加载类别文件: {}", args.labels.display()))?;

  let mut draw = Draw::new(DrawConfig {
    stroke_width: args.stroke,
    indexing: args.indexing,
    ..DrawConfig::default()
  });
  if let Some(font) = &args.font {
    draw = draw
      .with_font_file(font)
      .with_context(|| format!("无法加载字体: {}", font.display()))?;
  }

  let input = InputWrapper::from_url(&args.input)?;
  let model = TensorDumpModelBuilder::from_url(&args.model)?.build()?;
  let output = OutputWrapper::from_url(&args.output)?;

  let task = OneShotTask::new(DetectionPainter::new(draw, registry, args.threshold));
  let annotated = task.run_task(input, model, output)?;

  info!("绘制检测框 {} 个", annotated.boxes.len());

  Ok(())
}
