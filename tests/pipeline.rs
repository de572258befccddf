// 该文件是 Kuangxuan （框选） 项目的一部分。
// tests/pipeline.rs - 端到端检测流程测试
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

#![cfg(feature = "model_replay")]

use image::RgbImage;
use url::Url;

use kuangxuan::{
  FromUrl,
  config::DetectConfig,
  geometry::{ClassBoxMap, ClassId, PixelBox},
  input::InputWrapper,
  model::{ReplayDetector, ReplayDetectorBuilder},
  output::OutputWrapper,
  pipeline::Pipeline,
  task::{BatchTask, Task},
};

fn pipeline(json: &str) -> Pipeline<ReplayDetector> {
  Pipeline::new(
    ReplayDetector::from_json(json).unwrap(),
    DetectConfig::default(),
  )
}

fn boxes(map: &ClassBoxMap, class: u32) -> Vec<[i32; 4]> {
  map[&ClassId(class)].iter().map(|b| (*b).into()).collect()
}

#[test]
fn hd_frame_maps_back_through_pre_resize_and_padding() {
  // 1280x720 -> 640x360, 画布 384x672, pad (16, 12), 总增益 0.5
  let p = pipeline("[[[100, 100, 300, 300, 0.9, 0]]]");
  let out = p.process_image(&RgbImage::new(1280, 720)).unwrap();
  assert_eq!(out.len(), 1);
  assert_eq!(boxes(&out, 0), vec![[168, 176, 568, 576]]);
}

#[test]
fn small_frame_is_only_padded() {
  // 320x240 不缩放, 画布 512x672, pad (176, 136)
  let p = pipeline(r#"[[{"bbox": [276, 236, 376, 336], "scores": {"0": 0.8}}]]"#);
  let prepared = p.prepare(&RgbImage::new(320, 240)).unwrap();
  assert_eq!(prepared.tensor.shape(), [1, 3, 512, 672]);
  assert_eq!(prepared.transform.pad, (176.0, 136.0));

  let out = p.process_image(&RgbImage::new(320, 240)).unwrap();
  assert_eq!(boxes(&out, 0), vec![[100, 100, 200, 200]]);
}

#[test]
fn emission_floor_is_strict() {
  let p = pipeline(
    "[[[100, 100, 300, 300, 0.2, 0], [400, 100, 500, 200, 0.2001, 0], [400, 250, 500, 350, 0.1, 1]]]",
  );
  let out = p.process_image(&RgbImage::new(1280, 720)).unwrap();
  assert_eq!(out.len(), 1);
  assert_eq!(boxes(&out, 0), vec![[768, 176, 968, 376]]);
}

#[test]
fn main_class_stays_in_output_after_size_filter() {
  // 类别 0 还原后宽 1 像素, 被尺寸过滤清空但键仍保留
  let p = pipeline("[[[100, 100, 100.5, 300, 0.9, 0], [400, 100, 500, 200, 0.8, 1]]]");
  let out = p.process_image(&RgbImage::new(1280, 720)).unwrap();
  assert_eq!(
    serde_json::to_value(&out).unwrap(),
    serde_json::json!({ "0": [], "1": [[768, 176, 968, 376]] })
  );
}

#[test]
fn classes_pass_through_without_main_label() {
  // 主类别 0 不存在, 类别 2 内嵌在类别 1 中也保留
  let p = pipeline("[[[100, 100, 300, 300, 0.9, 1], [150, 150, 200, 200, 0.8, 2]]]");
  let out = p.process_image(&RgbImage::new(1280, 720)).unwrap();
  assert_eq!(boxes(&out, 1), vec![[168, 176, 568, 576]]);
  assert_eq!(boxes(&out, 2), vec![[268, 276, 368, 376]]);
}

#[test]
fn main_label_removes_nested_other_classes() {
  let p = pipeline("[[[100, 100, 300, 300, 0.9, 0], [150, 150, 200, 200, 0.8, 2]]]");
  let out = p.process_image(&RgbImage::new(1280, 720)).unwrap();
  assert_eq!(out.keys().copied().collect::<Vec<_>>(), vec![ClassId(0)]);
}

#[test]
fn batch_over_folder_writes_json_and_counts_failures() {
  let dir = tempfile::tempdir().unwrap();
  let images = dir.path().join("images");
  std::fs::create_dir(&images).unwrap();
  for name in ["a", "b", "c"] {
    RgbImage::new(1280, 720)
      .save(images.join(format!("{}.png", name)))
      .unwrap();
  }
  std::fs::write(images.join("d.png"), b"broken").unwrap();

  let replay = dir.path().join("replay.json");
  std::fs::write(&replay, "[[[100, 100, 300, 300, 0.9, 0]]]").unwrap();
  let detector =
    ReplayDetectorBuilder::from_url(&Url::parse(&format!("replay://{}", replay.display())).unwrap())
      .unwrap()
      .build()
      .unwrap();
  let p = Pipeline::new(detector, DetectConfig::default());

  let input = InputWrapper::from_url(&Url::parse(&format!("folder://{}", images.display())).unwrap())
    .unwrap();
  let out_path = dir.path().join("out.json");
  let output =
    OutputWrapper::from_url(&Url::parse(&format!("json://{}", out_path.display())).unwrap())
      .unwrap();

  let summary = BatchTask::default()
    .with_workers(2)
    .run_task(input, &p, output)
    .unwrap();
  assert_eq!(summary.processed, 3);
  assert_eq!(summary.failed, 1);
  assert_eq!(summary.detections, 3);

  let json: serde_json::Value =
    serde_json::from_str(&std::fs::read_to_string(&out_path).unwrap()).unwrap();
  let expected = vec![PixelBox::new(168, 176, 568, 576)];
  for name in ["a", "b", "c"] {
    let map: ClassBoxMap = serde_json::from_value(json[name].clone()).unwrap();
    assert_eq!(map[&ClassId(0)], expected);
  }
}
