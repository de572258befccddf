// 该文件是 Kuangxuan （框选） 项目的一部分。
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

use std::path::PathBuf;

use chrono::{Datelike, Utc};
use thiserror::Error;
use tracing::debug;

use crate::{
  FromUrl, FromUrlWithScheme,
  dataset::{DarknetError, labels_from_map, write_labels},
  geometry::ClassBoxMap,
  input::Frame,
  output::{Render, draw::Draw},
};

#[derive(Error, Debug)]
pub enum DirectoryRecordOutputError {
  #[error("URI 方案不匹配")]
  SchemeMismatch,
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("JSON 序列化错误: {0}")]
  JsonError(#[from] serde_json::Error),
  #[error("标签写入错误: {0}")]
  LabelError(#[from] DarknetError),
}

/// 每帧写出 `<帧名>.png`（带框）和 `<帧名>.json`，帧名中的子目录会被创建。
///
/// URI 参数：`dated` 按 `YYYY/MM/DD` 分子目录；`label` 额外写出 darknet 格式的 `<帧名>.txt`。
pub struct DirectoryRecordOutput {
  directory: PathBuf,
  draw: Draw,
  dated: bool,
  label: bool,
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

    let dated = uri.query_pairs().any(|(k, _)| k == "dated");
    let label = uri.query_pairs().any(|(k, _)| k == "label");

    Ok(DirectoryRecordOutput {
      directory: PathBuf::from(uri.path()),
      draw: Draw::default(),
      dated,
      label,
    })
  }
}

impl DirectoryRecordOutput {
  fn frame_directory(&self) -> Result<PathBuf, DirectoryRecordOutputError> {
    let directory = if self.dated {
      let now = Utc::now();
      self
        .directory
        .join(now.year().to_string())
        .join(format!("{:02}", now.month()))
        .join(format!("{:02}", now.day()))
    } else {
      self.directory.clone()
    };
    std::fs::create_dir_all(&directory)?;
    Ok(directory)
  }
}

impl Render<Frame, ClassBoxMap> for DirectoryRecordOutput {
  type Error = DirectoryRecordOutputError;

  fn render_result(&self, frame: &Frame, result: &ClassBoxMap) -> Result<(), Self::Error> {
    let directory = self.frame_directory()?;
    let path = |ext: &str| directory.join(format!("{}.{}", frame.name, ext));
    // 目录输入的帧名可能带子目录
    if let Some(parent) = path("png").parent() {
      std::fs::create_dir_all(parent)?;
    }

    self
      .draw
      .draw_detection(&frame.image, result)
      .save(path("png"))?;
    std::fs::write(path("json"), serde_json::to_string_pretty(result)?)?;

    if self.label {
      let (w, h) = frame.image.dimensions();
      write_labels(&path("txt"), &labels_from_map(result, w, h))?;
    }

    debug!("记录第 {} 帧 {} 到 {}", frame.index, frame.name, directory.display());
    Ok(())
  }
}
