// 该文件是 Shanan （山南西风） 项目的一部分。
// tests/render_pipeline.rs - 检测结果绘制流程测试
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

#![cfg(all(
  feature = "read_image_file",
  feature = "model_tensor_dump",
  feature = "save_image_file"
))]

use std::path::Path;

use image::{Rgb, RgbImage};
use url::Url;

use shanan_ssd::{
  CategoryRegistry, DetectionTensor, Draw, FromUrl,
  input::ImageFileInput,
  model::{TensorDump, TensorDumpModelBuilder},
  output::{DetectionPainter, SaveImageFileOutput},
  task::{OneShotTask, Task},
};

const COCO_LABELS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/labels/coco_class_labels.txt");

fn gradient(width: u32, height: u32) -> RgbImage {
  RgbImage::from_fn(width, height, |x, y| {
    Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
  })
}

fn sample_detections() -> DetectionTensor {
  DetectionTensor::from_records(&[
    [0.0, 1.0, 0.97, 0.05, 0.10, 0.40, 0.90],
    [0.0, 18.0, 0.81, 0.50, 0.55, 0.95, 0.95],
    [0.0, 3.0, 0.62, 0.30, 0.20, 0.70, 0.60],
    [0.0, 62.0, 0.44, 0.10, 0.10, 0.20, 0.20],
    [0.0, 44.0, 0.12, 0.60, 0.05, 0.65, 0.30],
  ])
}

fn write_labels(dir: &Path, names: &[String]) -> std::path::PathBuf {
  let path = dir.join("labels.txt");
  std::fs::write(&path, names.join("\n")).unwrap();
  path
}

#[test]
fn shipped_coco_labels_index_by_network_id() {
  let registry = CategoryRegistry::load_seeded(COCO_LABELS, 0).unwrap();
  assert_eq!(registry.len(), 91);
  assert_eq!(registry.name(0), Some("background"));
  assert_eq!(registry.name(1), Some("person"));
  assert_eq!(registry.name(18), Some("dog"));
  assert_eq!(registry.name(53), Some("apple"));
}

#[test]
fn raising_threshold_never_adds_boxes() {
  let registry = CategoryRegistry::load_seeded(COCO_LABELS, 3).unwrap();
  let image = gradient(320, 240);
  let detections = sample_detections();
  let draw = Draw::default();

  let mut previous = usize::MAX;
  for step in 0..=20 {
    let threshold = step as f32 / 20.0;
    let count = draw
      .render_detections(&image, &detections, &registry, threshold)
      .boxes
      .len();
    assert!(count <= previous, "threshold {} drew {} > {}", threshold, count, previous);
    previous = count;
  }
  assert_eq!(previous, 0);
}

#[test]
fn input_image_is_left_untouched() {
  let registry = CategoryRegistry::load_seeded(COCO_LABELS, 3).unwrap();
  let image = gradient(320, 240);
  let before = image.clone();

  let out = Draw::default().render_detections(&image, &sample_detections(), &registry, 0.5);

  assert_eq!(image, before);
  assert_ne!(out.image, image);
  assert_eq!(out.boxes.len(), 3);
  // 框外区域与原图一致
  assert_eq!(out.image.get_pixel(315, 5), image.get_pixel(315, 5));
}

#[test]
fn repeated_render_is_identical() {
  let registry = CategoryRegistry::load_seeded(COCO_LABELS, 11).unwrap();
  let image = gradient(200, 150);
  let detections = sample_detections();
  let draw = Draw::default();

  let a = draw.render_detections(&image, &detections, &registry, 0.3);
  let b = draw.render_detections(&image, &detections, &registry, 0.3);
  assert_eq!(a.image.as_raw(), b.image.as_raw());
  assert_eq!(a.boxes, b.boxes);
}

#[test]
fn empty_detections_give_plain_copy() {
  let registry = CategoryRegistry::load_seeded(COCO_LABELS, 0).unwrap();
  let image = gradient(64, 48);

  let out = Draw::default().render_detections(&image, &DetectionTensor::empty(), &registry, 0.5);
  assert_eq!(out.image, image);
  assert!(out.boxes.is_empty());
  assert!(out.skipped.is_empty());
}

#[test]
fn category_52_maps_to_line_52() {
  let dir = tempfile::tempdir().unwrap();
  let mut names: Vec<String> = (0..60).map(|i| format!("class{}", i)).collect();
  names[52] = "apple".to_string();
  let path = write_labels(dir.path(), &names);
  let registry = CategoryRegistry::load_seeded(&path, 0).unwrap();

  let image = gradient(100, 100);
  let detections = DetectionTensor::from_records(&[[0.0, 52.0, 0.9, 0.1, 0.1, 0.9, 0.9]]);
  let out = Draw::default().render_detections(&image, &detections, &registry, 0.5);

  assert_eq!(out.boxes.len(), 1);
  assert!(out.boxes[0].label.contains("apple"));
  assert_eq!(out.boxes[0].label, "apple: 0.90");
}

#[test]
fn one_shot_task_writes_annotated_image() {
  let dir = tempfile::tempdir().unwrap();

  let input_path = dir.path().join("input.png");
  let image = gradient(160, 120);
  image.save(&input_path).unwrap();

  let dump_path = dir.path().join("ssd_output.json");
  TensorDump::from(&sample_detections()).save(&dump_path).unwrap();

  let output_path = dir.path().join("out").join("annotated.png");

  let input =
    ImageFileInput::from_url(&Url::parse(&format!("image://{}", input_path.display())).unwrap())
      .unwrap();
  let model = TensorDumpModelBuilder::from_url(
    &Url::parse(&format!("tensor://{}", dump_path.display())).unwrap(),
  )
  .unwrap()
  .build()
  .unwrap();
  let output = SaveImageFileOutput::from_url(
    &Url::parse(&format!("image://{}", output_path.display())).unwrap(),
  )
  .unwrap();

  let registry = CategoryRegistry::load_seeded(COCO_LABELS, 5).unwrap();
  let task = OneShotTask::new(DetectionPainter::new(Draw::default(), registry, 0.5));
  let annotated = task.run_task(input, model, output).unwrap();

  let names: Vec<&str> = annotated.boxes.iter().map(|b| b.name.as_str()).collect();
  assert_eq!(names, vec!["person", "dog", "car"]);

  let saved = image::open(&output_path).unwrap().to_rgb8();
  assert_eq!(saved, annotated.image);
}
