// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/dataset.rs - darknet 标签格式
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

use std::{fmt, path::Path, str::FromStr};

use thiserror::Error;

use crate::geometry::{ClassBoxMap, ClassId, ClassIdError, PixelBox};

#[derive(Error, Debug)]
pub enum DarknetError {
  #[error("标签行字段数错误, 期望 5 个, 实际 {0} 个")]
  FieldCount(usize),
  #[error("标签数值无效: {0}")]
  InvalidNumber(String),
  #[error("标签类别无效: {0}")]
  InvalidClass(#[from] ClassIdError),
  #[error("第 {line} 行: {source}")]
  Line {
    line: usize,
    #[source]
    source: Box<DarknetError>,
  },
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
}

/// 一行 darknet 标签：`class x_center y_center width height`，坐标按图像宽高归一化
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DarknetLabel {
  pub class_id: ClassId,
  pub x: f32,
  pub y: f32,
  pub w: f32,
  pub h: f32,
}

impl DarknetLabel {
  /// 像素框 -> 归一化中心格式，中心点沿用 VOC 标注的 1 像素起点偏移
  pub fn from_box(class_id: ClassId, iw: u32, ih: u32, b: &PixelBox) -> Self {
    let (iw, ih) = (iw as f32, ih as f32);
    let x = (b.x_min + b.x_max) as f32 / 2.0 - 1.0;
    let y = (b.y_min + b.y_max) as f32 / 2.0 - 1.0;
    Self {
      class_id,
      x: x / iw,
      y: y / ih,
      w: b.width() as f32 / iw,
      h: b.height() as f32 / ih,
    }
  }

  /// 归一化中心格式 -> 像素框，半宽半高向下取整
  pub fn to_box(&self, iw: u32, ih: u32) -> PixelBox {
    let (iw, ih) = (iw as f32, ih as f32);
    let (x, y, w, h) = (self.x * iw, self.y * ih, self.w * iw, self.h * ih);
    let half_w = (w / 2.0).floor();
    let half_h = (h / 2.0).floor();
    PixelBox::new(
      (x - half_w) as i32,
      (y - half_h) as i32,
      (x + half_w) as i32,
      (y + half_h) as i32,
    )
  }
}

fn round6(v: f32) -> f32 {
  (v * 1e6).round() / 1e6
}

impl fmt::Display for DarknetLabel {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "{} {} {} {} {}",
      self.class_id,
      round6(self.x),
      round6(self.y),
      round6(self.w),
      round6(self.h)
    )
  }
}

impl FromStr for DarknetLabel {
  type Err = DarknetError;

  fn from_str(line: &str) -> Result<Self, Self::Err> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() != 5 {
      return Err(DarknetError::FieldCount(fields.len()));
    }
    let num = |s: &str| {
      s.parse::<f32>()
        .map_err(|_| DarknetError::InvalidNumber(s.to_string()))
    };
    Ok(Self {
      class_id: fields[0].parse()?,
      x: num(fields[1])?,
      y: num(fields[2])?,
      w: num(fields[3])?,
      h: num(fields[4])?,
    })
  }
}

/// 像素框 -> 归一化的 `(x_center, y_center, width, height)`
pub fn to_darknet(iw: u32, ih: u32, b: &PixelBox) -> (f32, f32, f32, f32) {
  let label = DarknetLabel::from_box(ClassId(0), iw, ih, b);
  (label.x, label.y, label.w, label.h)
}

/// 解析一行标签并还原为像素框
pub fn from_darknet_line(iw: u32, ih: u32, line: &str) -> Result<(ClassId, PixelBox), DarknetError> {
  let label: DarknetLabel = line.parse()?;
  Ok((label.class_id, label.to_box(iw, ih)))
}

/// 检测结果 -> 标签行
pub fn labels_from_map(map: &ClassBoxMap, iw: u32, ih: u32) -> Vec<DarknetLabel> {
  map
    .iter()
    .flat_map(|(class_id, boxes)| {
      boxes
        .iter()
        .map(move |b| DarknetLabel::from_box(*class_id, iw, ih, b))
    })
    .collect()
}

/// 标签行 -> 检测结果
pub fn map_from_labels(labels: &[DarknetLabel], iw: u32, ih: u32) -> ClassBoxMap {
  let mut map = ClassBoxMap::new();
  for label in labels {
    map
      .entry(label.class_id)
      .or_default()
      .push(label.to_box(iw, ih));
  }
  map
}

/// 解析标签文本，空行被忽略
pub fn parse_labels(text: &str) -> Result<Vec<DarknetLabel>, DarknetError> {
  text
    .lines()
    .enumerate()
    .filter(|(_, line)| !line.trim().is_empty())
    .map(|(idx, line)| {
      line.parse().map_err(|e| DarknetError::Line {
        line: idx + 1,
        source: Box::new(e),
      })
    })
    .collect()
}

pub fn read_labels(path: &Path) -> Result<Vec<DarknetLabel>, DarknetError> {
  parse_labels(&std::fs::read_to_string(path)?)
}

pub fn write_labels(path: &Path, labels: &[DarknetLabel]) -> Result<(), DarknetError> {
  let lines: Vec<String> = labels.iter().map(ToString::to_string).collect();
  std::fs::write(path, lines.join("\n"))?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use approx::assert_relative_eq;

  #[test]
  fn converts_pixel_box_to_center_format() {
    let label = DarknetLabel::from_box(ClassId(0), 200, 100, &PixelBox::new(20, 10, 60, 50));
    assert_relative_eq!(label.x, 39.0 / 200.0);
    assert_relative_eq!(label.y, 29.0 / 100.0);
    assert_relative_eq!(label.w, 0.2);
    assert_relative_eq!(label.h, 0.4);
    assert_eq!(label.to_string(), "0 0.195 0.29 0.2 0.4");
  }

  #[test]
  fn parses_label_back_to_pixels() {
    let label: DarknetLabel = "1 0.5 0.5 0.25 0.1".parse().unwrap();
    assert_eq!(label.class_id, ClassId(1));
    // w = 50 -> 半宽 25; h = 10 -> 半高 5
    assert_eq!(label.to_box(200, 100), PixelBox::new(75, 45, 125, 55));
  }

  #[test]
  fn free_functions_match_label_methods() {
    let (x, y, w, h) = to_darknet(200, 100, &PixelBox::new(20, 10, 60, 50));
    assert_relative_eq!(x, 0.195);
    assert_relative_eq!(y, 0.29);
    assert_relative_eq!(w, 0.2);
    assert_relative_eq!(h, 0.4);

    let (class_id, b) = from_darknet_line(200, 100, "  7 0.5 0.5 0.25 0.1 ").unwrap();
    assert_eq!(class_id, ClassId(7));
    assert_eq!(b, PixelBox::new(75, 45, 125, 55));
  }

  #[test]
  fn round_trip_shifts_by_center_offset_only() {
    let b = PixelBox::new(100, 40, 180, 120);
    let label = DarknetLabel::from_box(ClassId(2), 512, 256, &b);
    let back = label.to_box(512, 256);
    assert_eq!(back, PixelBox::new(99, 39, 179, 119));
  }

  #[test]
  fn rejects_malformed_lines() {
    assert!(matches!(
      "0 0.5 0.5 0.1".parse::<DarknetLabel>(),
      Err(DarknetError::FieldCount(4))
    ));
    assert!(matches!(
      "0 0.5 abc 0.1 0.1".parse::<DarknetLabel>(),
      Err(DarknetError::InvalidNumber(_))
    ));
    assert!(matches!(
      "x 0.5 0.5 0.1 0.1".parse::<DarknetLabel>(),
      Err(DarknetError::InvalidClass(_))
    ));

    let err = parse_labels("0 0.5 0.5 0.1 0.1\n\n0 1 2\n").unwrap_err();
    assert!(matches!(err, DarknetError::Line { line: 3, .. }));
  }

  #[test]
  fn map_round_trips_through_files() {
    let mut map = ClassBoxMap::new();
    map.insert(ClassId(0), vec![PixelBox::new(11, 21, 51, 61)]);
    map.insert(ClassId(3), vec![PixelBox::new(101, 1, 201, 41)]);

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("labels.txt");
    write_labels(&path, &labels_from_map(&map, 320, 256)).unwrap();

    let labels = read_labels(&path).unwrap();
    assert_eq!(labels.len(), 2);
    let back = map_from_labels(&labels, 320, 256);
    assert_eq!(back[&ClassId(0)], vec![PixelBox::new(10, 20, 50, 60)]);
    assert_eq!(back[&ClassId(3)], vec![PixelBox::new(100, 0, 200, 40)]);
  }
}
