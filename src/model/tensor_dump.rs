// 该文件是 Shanan （山南西风） 项目的一部分。
// src/model/tensor_dump.rs - 回放已记录的检测网络输出
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

use std::path::Path;

use image::RgbImage;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  detection::{DetectionError, DetectionTensor},
  model::Model,
};

#[derive(Error, Debug)]
pub enum TensorDumpError {
  #[error("模型加载错误: {0}")]
  ModelLoadError(#[from] std::io::Error),
  #[error("张量文件解析错误: {0}")]
  ParseError(#[from] serde_json::Error),
  #[error("张量无效: {0}")]
  TensorInvalid(#[from] DetectionError),
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
}

/// 检测网络前向输出的 JSON 记录，`data` 按行优先排列
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TensorDump {
  pub shape: [usize; 4],
  pub data: Vec<f32>,
}

impl From<&DetectionTensor> for TensorDump {
  fn from(tensor: &DetectionTensor) -> Self {
    Self {
      shape: tensor.shape(),
      data: tensor.as_array().iter().copied().collect(),
    }
  }
}

impl TryFrom<TensorDump> for DetectionTensor {
  type Error = DetectionError;

  fn try_from(dump: TensorDump) -> Result<Self, Self::Error> {
    DetectionTensor::from_shape_vec(dump.shape, dump.data)
  }
}

impl TensorDump {
  pub fn save(&self, path: impl AsRef<Path>) -> Result<(), TensorDumpError> {
    let content = serde_json::to_string(self)?;
    std::fs::write(path, content)?;
    Ok(())
  }
}

/// 以记录的输出代替真实推理的模型，与输入图像无关
pub struct TensorDumpModel {
  output: DetectionTensor,
}

pub struct TensorDumpModelBuilder {
  dump_path: String,
}

impl FromUrlWithScheme for TensorDumpModelBuilder {
  const SCHEME: &'static str = "tensor";
}

impl FromUrl for TensorDumpModelBuilder {
  type Error = TensorDumpError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      return Err(TensorDumpError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(TensorDumpModelBuilder {
      dump_path: url.path().to_string(),
    })
  }
}

impl TensorDumpModelBuilder {
  pub fn with_path(path: impl AsRef<Path>) -> Self {
    Self {
      dump_path: path.as_ref().to_string_lossy().into_owned(),
    }
  }

  pub fn build(self) -> Result<TensorDumpModel, TensorDumpError> {
    info!("加载张量文件: {}", self.dump_path);
    let content = std::fs::read_to_string(&self.dump_path)?;
    debug!("张量文件大小: {:.2} KB", content.len() as f64 / 1024.0);

    let dump: TensorDump = serde_json::from_str(&content)?;
    let output = DetectionTensor::try_from(dump).inspect_err(|e| {
      error!("张量文件内容无效: {}", e);
    })?;

    info!(
      "模型加载完成，输出形状 {:?}，候选检测 {} 个",
      output.shape(),
      output.len()
    );
    Ok(TensorDumpModel { output })
  }
}

impl TensorDumpModel {
  pub fn from_tensor(output: DetectionTensor) -> Self {
    Self { output }
  }
}

impl Model for TensorDumpModel {
  type Input = RgbImage;
  type Output = DetectionTensor;
  type Error = TensorDumpError;

  fn infer(&self, input: &Self::Input) -> Result<Self::Output, Self::Error> {
    debug!("执行模型推理，输入尺寸 {}x{}", input.width(), input.height());
    Ok(self.output.clone())
  }
}
