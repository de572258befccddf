// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/model/replay.rs - 回放检测器，从 JSON 文件读取预先计算的原始检测
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

use std::{
  collections::BTreeMap,
  path::PathBuf,
  sync::atomic::{AtomicUsize, Ordering},
};

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::NchwTensor,
  geometry::{BBox, ClassId, ClassIdError},
  model::{ClassScore, Detector, RawDetection},
};

#[derive(Error, Debug)]
pub enum ReplayDetectorError {
  #[error("模型路径错误: {0}")]
  ModelPathError(String),
  #[error("读取回放文件失败: {0}")]
  IoError(#[from] std::io::Error),
  #[error("回放文件格式错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("回放文件中的类别无效: {0}")]
  InvalidClass(#[from] ClassIdError),
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ClassLabel {
  Number(f64),
  Text(String),
}

impl TryFrom<ClassLabel> for ClassId {
  type Error = ClassIdError;

  fn try_from(label: ClassLabel) -> Result<Self, Self::Error> {
    match label {
      ClassLabel::Number(v) => ClassId::try_from(v),
      ClassLabel::Text(s) => s.parse(),
    }
  }
}

// 每行为 [x1, y1, x2, y2, conf, cls]，或带多类别得分的 {"bbox": [...], "scores": {"0": 0.9}}
#[derive(Deserialize)]
#[serde(untagged)]
enum ReplayRow {
  Flat(f32, f32, f32, f32, f32, ClassLabel),
  Scored {
    bbox: [f32; 4],
    scores: BTreeMap<String, f32>,
  },
}

impl TryFrom<ReplayRow> for RawDetection {
  type Error = ClassIdError;

  fn try_from(row: ReplayRow) -> Result<Self, Self::Error> {
    match row {
      ReplayRow::Flat(x1, y1, x2, y2, confidence, label) => Ok(RawDetection::new(
        BBox::new(x1, y1, x2, y2),
        confidence,
        ClassId::try_from(label)?,
      )),
      ReplayRow::Scored { bbox, scores } => {
        let scores = scores
          .into_iter()
          .map(|(class, confidence)| {
            Ok(ClassScore {
              class_id: class.parse()?,
              confidence,
            })
          })
          .collect::<Result<Vec<_>, ClassIdError>>()?;
        Ok(RawDetection::with_scores(BBox::from_array(bbox), scores))
      }
    }
  }
}

/// 按调用顺序循环返回记录的检测器，用于离线调试后处理与批处理流程
#[derive(Debug)]
pub struct ReplayDetector {
  records: Vec<Vec<RawDetection>>,
  cursor: AtomicUsize,
}

impl ReplayDetector {
  pub fn from_records(records: Vec<Vec<RawDetection>>) -> Self {
    Self {
      records,
      cursor: AtomicUsize::new(0),
    }
  }

  pub fn from_json(json: &str) -> Result<Self, ReplayDetectorError> {
    let rows: Vec<Vec<ReplayRow>> = serde_json::from_str(json)?;
    let records = rows
      .into_iter()
      .map(|image| {
        image
          .into_iter()
          .map(RawDetection::try_from)
          .collect::<Result<Vec<_>, _>>()
      })
      .collect::<Result<Vec<_>, _>>()?;
    Ok(Self::from_records(records))
  }

  pub fn len(&self) -> usize {
    self.records.len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.is_empty()
  }
}

impl Detector for ReplayDetector {
  type Error = ReplayDetectorError;

  fn infer(&self, input: &NchwTensor) -> Result<Vec<Vec<RawDetection>>, Self::Error> {
    let batch = input.batch();
    if self.records.is_empty() {
      debug!("回放记录为空，返回 {} 组空检测", batch);
      return Ok(vec![Vec::new(); batch]);
    }

    let start = self.cursor.fetch_add(batch, Ordering::Relaxed);
    Ok(
      (start..start + batch)
        .map(|i| self.records[i % self.records.len()].clone())
        .collect(),
    )
  }
}

pub struct ReplayDetectorBuilder {
  path: PathBuf,
}

impl FromUrlWithScheme for ReplayDetectorBuilder {
  const SCHEME: &'static str = "replay";
}

impl FromUrl for ReplayDetectorBuilder {
  type Error = ReplayDetectorError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!("模型 URI 方案不匹配: {}", url.scheme());
      return Err(ReplayDetectorError::ModelPathError(format!(
        "模型路径必须使用 {} 方案",
        Self::SCHEME
      )));
    }

    Ok(ReplayDetectorBuilder {
      path: PathBuf::from(url.path()),
    })
  }
}

impl ReplayDetectorBuilder {
  pub fn build(self) -> Result<ReplayDetector, ReplayDetectorError> {
    info!("加载回放文件: {}", self.path.display());
    let json = std::fs::read_to_string(&self.path)?;
    let detector = ReplayDetector::from_json(&json)?;
    info!("回放文件加载完成，共 {} 条记录", detector.len());
    Ok(detector)
  }
}
