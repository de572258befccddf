// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/output/json_record.rs - 检测结果 JSON 输出
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
  sync::{Mutex, PoisonError},
};

use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  geometry::ClassBoxMap,
  input::Frame,
  output::Render,
};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
}

/// 把检测结果写成 JSON。
///
/// 只有一帧时文件内容就是该帧的 `{类别: [[x_min, y_min, x_max, y_max], ...]}`；
/// 多帧时按帧名组织成 `{帧名: {类别: ...}}`。结果先缓存在内存中，`finish` 时一次写出。
pub struct JsonRecordOutput {
  path: PathBuf,
  records: Mutex<BTreeMap<String, ClassBoxMap>>,
}

impl FromUrlWithScheme for JsonRecordOutput {
  const SCHEME: &'static str = "json";
}

impl FromUrl for JsonRecordOutput {
  type Error = JsonRecordError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(JsonRecordError::SchemeMismatch(uri.scheme().to_string()));
    }
    Ok(JsonRecordOutput::new(uri.path()))
  }
}

impl JsonRecordOutput {
  pub fn new(path: impl Into<PathBuf>) -> Self {
    Self {
      path: path.into(),
      records: Mutex::new(BTreeMap::new()),
    }
  }

  fn write(&self, records: &BTreeMap<String, ClassBoxMap>) -> Result<(), JsonRecordError> {
    if let Some(parent) = self.path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    let json = match records.values().next() {
      Some(only) if records.len() == 1 => serde_json::to_string_pretty(only)?,
      _ => serde_json::to_string_pretty(records)?,
    };
    std::fs::write(&self.path, json)?;
    Ok(())
  }
}

impl Render<Frame, ClassBoxMap> for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, frame: &Frame, result: &ClassBoxMap) -> Result<(), Self::Error> {
    let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
    if records.insert(frame.name.clone(), result.clone()).is_some() {
      warn!("帧名 {} 重复，覆盖之前的结果", frame.name);
    }
    Ok(())
  }

  fn finish(&self) -> Result<(), Self::Error> {
    let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
    debug!("写入 {} 帧检测结果到 {}", records.len(), self.path.display());
    self.write(&records)
  }
}
