// 该文件是 Shanan （山南西风） 项目的一部分。
// src/category.rs - 类别名称与显示颜色
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

use image::Rgb;
use rand::{Rng, SeedableRng, rngs::StdRng};
use thiserror::Error;
use tracing::{debug, error, info};

#[derive(Error, Debug)]
pub enum CategoryError {
  #[error("类别文件不存在: {}", .0.display())]
  ResourceNotFound(PathBuf),
  #[error("读取类别文件失败: {0}")]
  Io(#[from] std::io::Error),
}

/// 类别表
///
/// 名称与颜色一一对应，加载后不可变。颜色在构造时一次性生成，
/// 同一次运行中同一类别始终使用同一颜色。
#[derive(Debug, Clone, Default)]
pub struct CategoryRegistry {
  names: Box<[String]>,
  colors: Box<[Rgb<u8>]>,
}

/// 从文本文件加载类别表，每行一个类别名称
pub fn load_categories<R: Rng + ?Sized>(
  path: impl AsRef<Path>,
  rng: &mut R,
) -> Result<CategoryRegistry, CategoryError> {
  let path = path.as_ref();
  info!("加载类别文件: {}", path.display());

  let content = match std::fs::read_to_string(path) {
    Ok(content) => content,
    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
      error!("类别文件不存在: {}", path.display());
      return Err(CategoryError::ResourceNotFound(path.to_path_buf()));
    }
    Err(e) => return Err(CategoryError::Io(e)),
  };

  let names: Vec<String> = content.lines().map(|line| line.trim().to_string()).collect();
  let registry = CategoryRegistry::from_names(names, rng);
  info!("类别数量: {}", registry.len());

  Ok(registry)
}

impl CategoryRegistry {
  pub fn from_names<R: Rng + ?Sized>(names: Vec<String>, rng: &mut R) -> Self {
    let colors: Vec<Rgb<u8>> = names
      .iter()
      .map(|_| {
        Rgb([
          rng.gen_range(0..=255u8),
          rng.gen_range(0..=255u8),
          rng.gen_range(0..=255u8),
        ])
      })
      .collect();

    debug!("生成 {} 种类别颜色", colors.len());

    Self {
      names: names.into_boxed_slice(),
      colors: colors.into_boxed_slice(),
    }
  }

  /// 使用固定种子加载，相同种子得到相同颜色
  pub fn load_seeded(path: impl AsRef<Path>, seed: u64) -> Result<Self, CategoryError> {
    let mut rng = StdRng::seed_from_u64(seed);
    load_categories(path, &mut rng)
  }

  pub fn len(&self) -> usize {
    self.names.len()
  }

  pub fn is_empty(&self) -> bool {
    self.names.is_empty()
  }

  pub fn name(&self, index: usize) -> Option<&str> {
    self.names.get(index).map(String::as_str)
  }

  pub fn color(&self, index: usize) -> Option<Rgb<u8>> {
    self.colors.get(index).copied()
  }

  pub fn names(&self) -> &[String] {
    &self.names
  }

  pub fn colors(&self) -> &[Rgb<u8>] {
    &self.colors
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;

  fn write_labels(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
  }

  #[test]
  fn missing_file_is_resource_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("no_such_labels.txt");
    match CategoryRegistry::load_seeded(&path, 0) {
      Err(CategoryError::ResourceNotFound(p)) => assert_eq!(p, path),
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn empty_file_gives_empty_registry() {
    let file = write_labels("");
    let registry = CategoryRegistry::load_seeded(file.path(), 0).unwrap();
    assert!(registry.is_empty());
    assert!(registry.colors().is_empty());
    assert_eq!(registry.name(0), None);
  }

  #[test]
  fn non_utf8_file_is_invalid_data() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(b"\xff\xfe\n").unwrap();
    match CategoryRegistry::load_seeded(file.path(), 0) {
      Err(CategoryError::Io(e)) => assert_eq!(e.kind(), std::io::ErrorKind::InvalidData),
      other => panic!("unexpected result: {:?}", other),
    }
  }

  #[test]
  fn lines_keep_order_and_trailing_newline_adds_nothing() {
    let file = write_labels("background\r\nperson\nbicycle\n");
    let registry = CategoryRegistry::load_seeded(file.path(), 0).unwrap();
    assert_eq!(registry.names(), &["background", "person", "bicycle"]);
    assert_eq!(registry.colors().len(), 3);
    assert_eq!(registry.name(1), Some("person"));
  }

  #[test]
  fn interior_blank_line_keeps_ids_aligned() {
    let file = write_labels("a\n\nc\n");
    let registry = CategoryRegistry::load_seeded(file.path(), 0).unwrap();
    assert_eq!(registry.len(), 3);
    assert_eq!(registry.name(1), Some(""));
    assert_eq!(registry.name(2), Some("c"));
  }

  #[test]
  fn same_seed_gives_same_colors() {
    let file = write_labels("cat\ndog\nbird\n");
    let a = CategoryRegistry::load_seeded(file.path(), 42).unwrap();
    let b = CategoryRegistry::load_seeded(file.path(), 42).unwrap();
    assert_eq!(a.colors(), b.colors());
  }

  #[test]
  fn colors_are_fixed_after_load() {
    let mut rng = StdRng::seed_from_u64(7);
    let registry = CategoryRegistry::from_names(vec!["x".into(), "y".into()], &mut rng);
    let first = registry.color(1);
    assert_eq!(registry.color(1), first);
    assert_eq!(registry.color(2), None);
  }
}
