// 该文件是 Shanan （山南西风） 项目的一部分。
// src/detection.rs - 检测输出张量与检测记录
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

use ndarray::{Array4, ArrayView1};
use thiserror::Error;

/// 每条检测记录的长度: (unused, category_id, confidence, x_min, y_min, x_max, y_max)
pub const DETECTION_RECORD_LEN: usize = 7;

#[derive(Error, Debug)]
pub enum DetectionError {
  #[error("检测记录长度错误: 期望 {expected}, 实际 {actual}")]
  Arity { expected: usize, actual: usize },
  #[error("张量形状错误: {0}")]
  Shape(#[from] ndarray::ShapeError),
}

/// 单条检测记录的数据错误，渲染时跳过该记录
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MalformedDetection {
  #[error("置信度无效: {0}")]
  Confidence(f32),
  #[error("类别编号无效: {0}")]
  CategoryId(f32),
  #[error("类别编号 {id} 超出类别表范围 (类别数量 {len})")]
  CategoryOutOfRange { id: u32, len: usize },
  #[error("边界框坐标无效: {0:?}")]
  Coordinates([f32; 4]),
}

/// 像素坐标下的边界框，两角均包含在内
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBox {
  pub x_min: i32,
  pub y_min: i32,
  pub x_max: i32,
  pub y_max: i32,
}

/// 网络输出的一条原始检测记录
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionRecord {
  pub raw_category: f32,
  pub confidence: f32,
  pub bbox: [f32; 4], // [x_min, y_min, x_max, y_max]，归一化坐标
}

impl From<[f32; DETECTION_RECORD_LEN]> for DetectionRecord {
  fn from(row: [f32; DETECTION_RECORD_LEN]) -> Self {
    Self {
      raw_category: row[1],
      confidence: row[2],
      bbox: [row[3], row[4], row[5], row[6]],
    }
  }
}

impl DetectionRecord {
  fn from_lane(row: ArrayView1<'_, f32>) -> Self {
    Self {
      raw_category: row[1],
      confidence: row[2],
      bbox: [row[3], row[4], row[5], row[6]],
    }
  }

  /// 置信度必须是 [0, 1] 内的有限值
  pub fn checked_confidence(&self) -> Result<f32, MalformedDetection> {
    if self.confidence.is_finite() && (0.0..=1.0).contains(&self.confidence) {
      Ok(self.confidence)
    } else {
      Err(MalformedDetection::Confidence(self.confidence))
    }
  }

  /// 类别编号必须是非负整数
  pub fn category_id(&self) -> Result<u32, MalformedDetection> {
    let id = self.raw_category;
    if !id.is_finite() || id < 0.0 || id.fract() != 0.0 || id > u32::MAX as f32 {
      return Err(MalformedDetection::CategoryId(id));
    }
    Ok(id as u32)
  }

  /// 按原图尺寸将归一化坐标换算为像素坐标
  pub fn pixel_box(&self, width: u32, height: u32) -> Result<PixelBox, MalformedDetection> {
    if self.bbox.iter().any(|v| !v.is_finite()) {
      return Err(MalformedDetection::Coordinates(self.bbox));
    }

    let (w, h) = (width as f32, height as f32);
    Ok(PixelBox {
      x_min: (self.bbox[0] * w).round() as i32,
      y_min: (self.bbox[1] * h).round() as i32,
      x_max: (self.bbox[2] * w).round() as i32,
      y_max: (self.bbox[3] * h).round() as i32,
    })
  }
}

/// 检测网络前向输出，形状为 [batch, 1, N, 7]
#[derive(Debug, Clone, PartialEq)]
pub struct DetectionTensor {
  data: Array4<f32>,
}

impl DetectionTensor {
  pub fn new(data: Array4<f32>) -> Result<Self, DetectionError> {
    let actual = data.shape()[3];
    if actual != DETECTION_RECORD_LEN {
      return Err(DetectionError::Arity {
        expected: DETECTION_RECORD_LEN,
        actual,
      });
    }
    Ok(Self { data })
  }

  pub fn from_shape_vec(shape: [usize; 4], data: Vec<f32>) -> Result<Self, DetectionError> {
    if shape[3] != DETECTION_RECORD_LEN {
      return Err(DetectionError::Arity {
        expected: DETECTION_RECORD_LEN,
        actual: shape[3],
      });
    }
    let data = Array4::from_shape_vec((shape[0], shape[1], shape[2], shape[3]), data)?;
    Ok(Self { data })
  }

  /// 以 [1, 1, N, 7] 形状构造
  pub fn from_records(records: &[[f32; DETECTION_RECORD_LEN]]) -> Self {
    let data = Array4::from_shape_fn(
      (1, 1, records.len(), DETECTION_RECORD_LEN),
      |(_, _, i, j)| records[i][j],
    );
    Self { data }
  }

  pub fn empty() -> Self {
    Self::from_records(&[])
  }

  /// 候选检测数量
  pub fn len(&self) -> usize {
    self.data.len() / DETECTION_RECORD_LEN
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn shape(&self) -> [usize; 4] {
    let s = self.data.shape();
    [s[0], s[1], s[2], s[3]]
  }

  /// 按网络给出的顺序遍历检测记录
  pub fn records(&self) -> impl Iterator<Item = DetectionRecord> + '_ {
    self.data.rows().into_iter().map(DetectionRecord::from_lane)
  }

  pub fn as_array(&self) -> &Array4<f32> {
    &self.data
  }
}
