// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/geometry.rs - 边界框、坐标空间与类别定义
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

use std::{collections::BTreeMap, fmt, marker::PhantomData, str::FromStr};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 坐标空间标记
pub trait CoordSpace: Copy + Default + PartialEq + fmt::Debug + 'static {
  const NAME: &'static str;
}

/// 模型输入空间（letterbox 之后的画布像素坐标）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModelSpace;

/// 原图空间
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OriginalSpace;

impl CoordSpace for ModelSpace {
  const NAME: &'static str = "model";
}

impl CoordSpace for OriginalSpace {
  const NAME: &'static str = "original";
}

/// 带坐标空间标记的边界框 [x1, y1, x2, y2]
#[derive(Clone, Copy, PartialEq)]
pub struct BBox<S: CoordSpace> {
  pub x1: f32,
  pub y1: f32,
  pub x2: f32,
  pub y2: f32,
  _space: PhantomData<S>,
}

impl<S: CoordSpace> fmt::Debug for BBox<S> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "BBox<{}>[{:.2}, {:.2}, {:.2}, {:.2}]",
      S::NAME,
      self.x1,
      self.y1,
      self.x2,
      self.y2
    )
  }
}

impl<S: CoordSpace> BBox<S> {
  pub fn new(x1: f32, y1: f32, x2: f32, y2: f32) -> Self {
    Self {
      x1,
      y1,
      x2,
      y2,
      _space: PhantomData,
    }
  }

  pub fn from_array([x1, y1, x2, y2]: [f32; 4]) -> Self {
    Self::new(x1, y1, x2, y2)
  }

  pub fn to_array(&self) -> [f32; 4] {
    [self.x1, self.y1, self.x2, self.y2]
  }

  pub fn width(&self) -> f32 {
    (self.x2 - self.x1).max(0.0)
  }

  pub fn height(&self) -> f32 {
    (self.y2 - self.y1).max(0.0)
  }

  pub fn area(&self) -> f32 {
    self.width() * self.height()
  }

  /// 两个框的交集面积
  pub fn intersection(&self, other: &Self) -> f32 {
    let x1 = self.x1.max(other.x1);
    let y1 = self.y1.max(other.y1);
    let x2 = self.x2.min(other.x2);
    let y2 = self.y2.min(other.y2);
    (x2 - x1).max(0.0) * (y2 - y1).max(0.0)
  }

  /// 交并比
  pub fn iou(&self, other: &Self) -> f32 {
    let inter = self.intersection(other);
    let union = self.area() + other.area() - inter;
    if union > 0.0 { inter / union } else { 0.0 }
  }

  /// 交集除以较小框的面积。
  /// 小框被大框完全包含时为 1.0，与两者面积差无关。
  pub fn min_iou(&self, other: &Self) -> f32 {
    let smaller = self.area().min(other.area());
    if smaller > 0.0 {
      self.intersection(other) / smaller
    } else {
      0.0
    }
  }
}

/// 原图中的整数像素框，序列化为 [x_min, y_min, x_max, y_max]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[i32; 4]", into = "[i32; 4]")]
pub struct PixelBox {
  pub x_min: i32,
  pub y_min: i32,
  pub x_max: i32,
  pub y_max: i32,
}

impl PixelBox {
  pub fn new(x_min: i32, y_min: i32, x_max: i32, y_max: i32) -> Self {
    Self {
      x_min,
      y_min,
      x_max,
      y_max,
    }
  }

  pub fn width(&self) -> i32 {
    (self.x_max - self.x_min).max(0)
  }

  pub fn height(&self) -> i32 {
    (self.y_max - self.y_min).max(0)
  }

  pub fn as_bbox(&self) -> BBox<OriginalSpace> {
    BBox::new(
      self.x_min as f32,
      self.y_min as f32,
      self.x_max as f32,
      self.y_max as f32,
    )
  }
}

impl From<[i32; 4]> for PixelBox {
  fn from([x_min, y_min, x_max, y_max]: [i32; 4]) -> Self {
    Self::new(x_min, y_min, x_max, y_max)
  }
}

impl From<PixelBox> for [i32; 4] {
  fn from(b: PixelBox) -> Self {
    [b.x_min, b.y_min, b.x_max, b.y_max]
  }
}

// 截断取整，与下游数据集导出的像素约定一致
impl From<BBox<OriginalSpace>> for PixelBox {
  fn from(b: BBox<OriginalSpace>) -> Self {
    Self::new(b.x1 as i32, b.y1 as i32, b.x2 as i32, b.y2 as i32)
  }
}

/// 归一化后的类别编号
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClassId(pub u32);

#[derive(Error, Debug, PartialEq)]
pub enum ClassIdError {
  #[error("无效的类别编号: {0}")]
  Invalid(String),
}

impl fmt::Display for ClassId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<u32> for ClassId {
  fn from(id: u32) -> Self {
    ClassId(id)
  }
}

impl TryFrom<f64> for ClassId {
  type Error = ClassIdError;

  // 检测器常以浮点张量输出类别，必须是非负整数值
  fn try_from(value: f64) -> Result<Self, Self::Error> {
    if value.is_finite() && value >= 0.0 && value.fract() == 0.0 && value <= u32::MAX as f64 {
      Ok(ClassId(value as u32))
    } else {
      Err(ClassIdError::Invalid(value.to_string()))
    }
  }
}

impl FromStr for ClassId {
  type Err = ClassIdError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let s = s.trim();
    if let Ok(id) = s.parse::<u32>() {
      return Ok(ClassId(id));
    }
    s.parse::<f64>()
      .map_err(|_| ClassIdError::Invalid(s.to_string()))
      .and_then(ClassId::try_from)
  }
}

/// 单个检测结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Detection<S: CoordSpace> {
  pub bbox: BBox<S>,
  pub confidence: f32,
  pub class_id: ClassId,
}

/// 类别 -> 原图像素框列表
pub type ClassBoxMap = BTreeMap<ClassId, Vec<PixelBox>>;

pub fn count_boxes(map: &ClassBoxMap) -> usize {
  map.values().map(Vec::len).sum()
}
