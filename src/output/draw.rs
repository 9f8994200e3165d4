// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/draw.rs - 目标检测结果可视化
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

use std::{cmp::Ordering, fmt, path::Path, str::FromStr};

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
  drawing::{draw_hollow_rect_mut, draw_text_mut},
  rect::Rect,
};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::{
  category::CategoryRegistry,
  detection::{DetectionRecord, DetectionTensor, MalformedDetection, PixelBox},
};

// 文本渲染常量
const LABEL_FONT_SIZE: f32 = 20.0;
const LABEL_OFFSET_X: i32 = 10;
const LABEL_OFFSET_Y: i32 = 10;
const STROKE_WIDTH: u32 = 2;

static DEFAULT_FONT: &[u8] = include_bytes!("../../assets/DejaVuSans.ttf");

#[derive(Error, Debug)]
pub enum DrawError {
  #[error("字体文件读取失败: {0}")]
  FontIo(#[from] std::io::Error),
  #[error("字体文件无效: {0}")]
  InvalidFont(#[from] ab_glyph::InvalidFont),
}

/// 网络类别编号到类别表下标的换算方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LabelIndexing {
  /// 名称与颜色都使用 `id`，类别文件第 0 行为 background
  #[default]
  Direct,
  /// 名称与颜色都使用 `id - 1`，类别文件不含 background
  Shifted,
  /// 名称使用 `id - 1`，颜色使用 `id`
  Legacy,
}

impl LabelIndexing {
  /// 返回 (名称下标, 颜色下标)
  pub fn indices(self, id: u32) -> Option<(usize, usize)> {
    let id = id as usize;
    match self {
      LabelIndexing::Direct => Some((id, id)),
      LabelIndexing::Shifted => id.checked_sub(1).map(|i| (i, i)),
      LabelIndexing::Legacy => id.checked_sub(1).map(|i| (i, id)),
    }
  }
}

impl FromStr for LabelIndexing {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "direct" => Ok(LabelIndexing::Direct),
      "shifted" => Ok(LabelIndexing::Shifted),
      "legacy" => Ok(LabelIndexing::Legacy),
      other => Err(format!(
        "未知的类别编号方式 '{}'，可选 direct, shifted, legacy",
        other
      )),
    }
  }
}

impl fmt::Display for LabelIndexing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      LabelIndexing::Direct => "direct",
      LabelIndexing::Shifted => "shifted",
      LabelIndexing::Legacy => "legacy",
    };
    f.write_str(name)
  }
}

#[derive(Debug, Clone)]
pub struct DrawConfig {
  pub stroke_width: u32,
  pub label_offset: (i32, i32),
  pub font_size: f32,
  pub indexing: LabelIndexing,
}

impl Default for DrawConfig {
  fn default() -> Self {
    Self {
      stroke_width: STROKE_WIDTH,
      label_offset: (LABEL_OFFSET_X, LABEL_OFFSET_Y),
      font_size: LABEL_FONT_SIZE,
      indexing: LabelIndexing::default(),
    }
  }
}

/// 一个被绘制的检测框
#[derive(Debug, Clone, PartialEq)]
pub struct DrawnBox {
  /// 在网络输出中的序号
  pub index: usize,
  pub category_id: u32,
  pub name: String,
  pub confidence: f32,
  pub color: Rgb<u8>,
  /// 归一化坐标 [x_min, y_min, x_max, y_max]
  pub bbox: [f32; 4],
  pub pixel_box: PixelBox,
  pub label: String,
}

/// 渲染结果，`image` 为输入图像的副本
#[derive(Debug, Clone)]
pub struct Annotated {
  pub image: RgbImage,
  pub boxes: Vec<DrawnBox>,
  pub skipped: Vec<(usize, MalformedDetection)>,
}

pub struct Draw {
  config: DrawConfig,
  font: FontArc,
}

impl Default for Draw {
  fn default() -> Self {
    Self::new(DrawConfig::default())
  }
}

impl Draw {
  pub fn new(config: DrawConfig) -> Self {
    let font = FontArc::try_from_slice(DEFAULT_FONT).expect("无法加载嵌入的字体文件");
    Self { config, font }
  }

  /// 替换内置字体
  pub fn with_font(mut self, font: FontArc) -> Self {
    self.font = font;
    self
  }

  /// 从 TTF/OTF 文件加载标签字体
  pub fn with_font_file(self, path: impl AsRef<Path>) -> Result<Self, DrawError> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    let font = FontArc::try_from_vec(data)?;
    info!("加载字体文件: {}", path.display());
    Ok(self.with_font(font))
  }

  pub fn config(&self) -> &DrawConfig {
    &self.config
  }

  /// 在输入图像的副本上绘制置信度高于 `threshold` 的检测结果
  ///
  /// 记录按网络给出的顺序处理，不排序也不做 NMS。置信度等于阈值的记录不绘制。
  /// 数据无效的记录会被跳过并记入 `Annotated::skipped`。
  pub fn render_detections(
    &self,
    image: &RgbImage,
    detections: &DetectionTensor,
    registry: &CategoryRegistry,
    threshold: f32,
  ) -> Annotated {
    let mut canvas = image.clone();
    let mut boxes = Vec::new();
    let mut skipped = Vec::new();

    for (index, record) in detections.records().enumerate() {
      match self.place(index, &record, registry, threshold, image.width(), image.height()) {
        Ok(Some(placed)) => {
          self.draw_bbox(&mut canvas, &placed);
          self.draw_label(&mut canvas, &placed);
          boxes.push(placed);
        }
        Ok(None) => {}
        Err(e) => {
          warn!("跳过第 {} 条检测记录: {}", index, e);
          skipped.push((index, e));
        }
      }
    }

    debug!(
      "候选检测 {} 个，绘制 {} 个，跳过无效记录 {} 个",
      detections.len(),
      boxes.len(),
      skipped.len()
    );

    Annotated {
      image: canvas,
      boxes,
      skipped,
    }
  }

  fn place(
    &self,
    index: usize,
    record: &DetectionRecord,
    registry: &CategoryRegistry,
    threshold: f32,
    width: u32,
    height: u32,
  ) -> Result<Option<DrawnBox>, MalformedDetection> {
    let confidence = record.checked_confidence()?;
    if confidence.partial_cmp(&threshold) != Some(Ordering::Greater) {
      return Ok(None);
    }

    let category_id = record.category_id()?;
    let out_of_range = MalformedDetection::CategoryOutOfRange {
      id: category_id,
      len: registry.len(),
    };
    let (name_idx, color_idx) = self
      .config
      .indexing
      .indices(category_id)
      .ok_or_else(|| out_of_range.clone())?;
    let name = registry.name(name_idx).ok_or_else(|| out_of_range.clone())?;
    let color = registry.color(color_idx).ok_or(out_of_range)?;

    let pixel_box = record.pixel_box(width, height)?;
    let label = format!("{}: {:.2}", name, confidence);

    Ok(Some(DrawnBox {
      index,
      category_id,
      name: name.to_string(),
      confidence,
      color,
      bbox: record.bbox,
      pixel_box,
      label,
    }))
  }

  fn draw_bbox(&self, image: &mut RgbImage, placed: &DrawnBox) {
    let (w, h) = (image.width() as i32, image.height() as i32);
    let b = &placed.pixel_box;

    let (x_min, x_max) = (b.x_min.min(b.x_max), b.x_min.max(b.x_max));
    let (y_min, y_max) = (b.y_min.min(b.y_max), b.y_min.max(b.y_max));

    // 完全在图像外
    if x_max < 0 || y_max < 0 || x_min >= w || y_min >= h {
      return;
    }

    let x_min = x_min.clamp(0, w - 1);
    let y_min = y_min.clamp(0, h - 1);
    let x_max = x_max.clamp(0, w - 1);
    let y_max = y_max.clamp(0, h - 1);

    // 边框向内加粗
    for t in 0..self.config.stroke_width as i32 {
      let (left, top, right, bottom) = (x_min + t, y_min + t, x_max - t, y_max - t);
      if left > right || top > bottom {
        break;
      }
      let rect =
        Rect::at(left, top).of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
      draw_hollow_rect_mut(image, rect, placed.color);
    }
  }

  // 标签锚定在未裁剪的左上角 (x_ul, y_ul)，超出图像的部分由 draw_text_mut 裁掉
  fn draw_label(&self, image: &mut RgbImage, placed: &DrawnBox) {
    let (dx, dy) = self.config.label_offset;
    draw_text_mut(
      image,
      placed.color,
      placed.pixel_box.x_min + dx,
      placed.pixel_box.y_min + dy,
      PxScale::from(self.config.font_size),
      &self.font,
      &placed.label,
    );
  }
}

/// 以文本形式记录检测结果
pub struct Record {
  pub label_with_name: bool,
}

impl Record {
  pub fn format(&self, boxes: &[DrawnBox]) -> String {
    boxes
      .iter()
      .map(|item| {
        let name = if self.label_with_name {
          item.name.clone()
        } else {
          format!("{}", item.category_id)
        };
        format!(
          "{}, {:.4}, {:.4}, {:.4}, {:.4}, {:.4}",
          name, item.confidence, item.bbox[0], item.bbox[1], item.bbox[2], item.bbox[3]
        )
      })
      .collect::<Vec<_>>()
      .join("\n")
  }

  pub fn record(&self, boxes: &[DrawnBox], path: &Path) -> Result<(), std::io::Error> {
    std::fs::write(path.with_extension("txt"), self.format(boxes))
  }
}
