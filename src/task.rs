// 该文件是 Shanan （山南西风） 项目的一部分。
// src/task.rs - 推理任务
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

use image::RgbImage;
use tracing::{info, warn};

use crate::{
  detection::DetectionTensor,
  model::Model,
  output::{DetectionPainter, Render, draw::Annotated},
};

pub trait Task<I, M, O>: Sized {
  type Output;
  type Error;
  fn run_task(self, input: I, model: M, output: O) -> Result<Self::Output, Self::Error>;
}

/// 对单张图像执行一次 推理 → 绘制 → 输出
pub struct OneShotTask {
  painter: DetectionPainter,
}

impl OneShotTask {
  pub fn new(painter: DetectionPainter) -> Self {
    Self { painter }
  }
}

impl<
  ME: std::error::Error + Sync + Send + 'static,
  RE: std::error::Error + Sync + Send + 'static,
  I: Iterator<Item = RgbImage>,
  M: Model<Input = RgbImage, Output = DetectionTensor, Error = ME>,
  O: Render<RgbImage, Annotated, Error = RE>,
> Task<I, M, O> for OneShotTask
{
  type Output = Annotated;
  type Error = anyhow::Error;

  fn run_task(self, mut input: I, model: M, output: O) -> Result<Self::Output, Self::Error> {
    info!("开始任务...");
    let frame = input.next().ok_or_else(|| anyhow::anyhow!("没有输入帧"))?;
    info!("输入帧获取成功，开始推理...");

    let now = std::time::Instant::now();
    let detections = model.infer(&frame)?;
    info!(
      "推理完成，耗时: {:.2?}，候选检测 {} 个",
      now.elapsed(),
      detections.len()
    );

    let now = std::time::Instant::now();
    let annotated = self.painter.paint(&frame, &detections);
    info!(
      "绘制完成，耗时: {:.2?}，置信度高于 {} 的检测 {} 个",
      now.elapsed(),
      self.painter.threshold(),
      annotated.boxes.len()
    );
    for item in &annotated.boxes {
      info!("  - {} at {:?}", item.label, item.pixel_box);
    }
    if !annotated.skipped.is_empty() {
      warn!("跳过无效检测记录 {} 个", annotated.skipped.len());
    }

    output.render_result(&frame, &annotated)?;
    info!("输出完成");

    Ok(annotated)
  }
}
