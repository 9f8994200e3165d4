// 该文件是 Shanan （山南西风） 项目的一部分。
// src/output/directory_record.rs - 目录记录输出
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

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU16, Ordering};

use chrono::{DateTime, Datelike, Utc};
use image::RgbImage;
use thiserror::Error;
use tracing::{debug, info};

use crate::{
  FromUrl, FromUrlWithScheme,
  output::{
    Render,
    draw::{Annotated, Record},
  },
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 保存方式：带框图像，或原图加文本记录
pub enum RecordMode {
  Draw,
  Record(Record),
}

impl RecordMode {
  pub fn with(kind: &str) -> Self {
    match kind {
      "record-name" => RecordMode::Record(Record {
        label_with_name: true,
      }),
      "record-id" => RecordMode::Record(Record {
        label_with_name: false,
      }),
      _ => RecordMode::Draw,
    }
  }

  fn save_result(
    &self,
    path: &Path,
    frame: &RgbImage,
    result: &Annotated,
  ) -> Result<(), DirectoryRecordOutputError> {
    match self {
      RecordMode::Draw => {
        result.image.save(path)?;
      }
      RecordMode::Record(record) => {
        frame.save(path)?;
        record.record(&result.boxes, path)?;
      }
    };

    Ok(())
  }
}

/// 按日期分目录保存结果: `<dir>/YYYY/MM/DD/HH-MM-SS-XXXX.png`
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  mode: RecordMode,
  frame_counter: AtomicU16,
  always: bool,
}

impl FromUrlWithScheme for DirectoryRecordOutput {
  const SCHEME: &'static str = "folder";
}

impl FromUrl for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn from_url(uri: &url::Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(DirectoryRecordOutputError::SchemeMismatch);
    }

    let kind = {
      let mut kind = "draw";
      for (k, v) in uri.query_pairs() {
        if k == "record" {
          if v == "id" {
            kind = "record-id";
          } else {
            kind = "record-name";
          }
          break;
        }
      }
      kind
    };

    let always = uri.query_pairs().any(|(k, _)| k == "always");
    debug!("目录记录输出: 方式 {}, 无检测也保存 {}", kind, always);

    Ok(Self::new(uri.path(), RecordMode::with(kind), always))
  }
}

impl DirectoryRecordOutput {
  pub fn new(directory: impl AsRef<Path>, mode: RecordMode, always: bool) -> Self {
    DirectoryRecordOutput {
      directory: directory.as_ref().to_path_buf(),
      mode,
      frame_counter: AtomicU16::new(0),
      always,
    }
  }

  fn frame_id(&self) -> u16 {
    self.frame_counter.fetch_add(1, Ordering::Relaxed).wrapping_add(1)
  }

  fn frame_path(&self, now: DateTime<Utc>) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = self
      .directory
      .join(now.year().to_string())
      .join(format!("{:02}", now.month()))
      .join(format!("{:02}", now.day()));
    std::fs::create_dir_all(&directory)?;

    Ok(directory.join(format!(
      "{}-{:04X}.png",
      now.format("%H-%M-%S"),
      self.frame_id()
    )))
  }
}

impl Render<RgbImage, Annotated> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &RgbImage, result: &Annotated) -> Result<(), Self::Error> {
    if !self.always && result.boxes.is_empty() {
      debug!("无检测结果，跳过保存");
      return Ok(());
    }

    let path = self.frame_path(Utc::now())?;
    self.mode.save_result(&path, frame, result)?;
    info!("保存结果到: {}", path.display());
    Ok(())
  }
}
