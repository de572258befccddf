// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input.rs - 图像输入
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

use image::{ImageReader, RgbImage};
use thiserror::Error;

use crate::{FromUrl, FromUrlWithScheme};

/// 支持的图像扩展名
pub const IMAGE_EXTENSIONS: [&str; 6] = ["jpg", "jpeg", "png", "bmp", "gif", "webp"];

/// 一帧待检测的图像
#[derive(Debug, Clone)]
pub struct Frame {
  /// 不含扩展名的文件名，用于命名输出；目录输入中为相对路径
  pub name: String,
  /// 在输入中的序号
  pub index: usize,
  pub image: RgbImage,
}

mod read_folder;
mod read_image_file;

pub use self::read_folder::FolderInput;
pub use self::read_image_file::ImageFileInput;

#[derive(Error, Debug)]
pub enum InputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("目录遍历错误: {0}")]
  WalkError(#[from] walkdir::Error),
  #[error("图像解码错误 {path}: {source}")]
  ImageLoadError {
    path: String,
    #[source]
    source: image::ImageError,
  },
  #[error("URI 参数错误: {0}")]
  InvalidQuery(String),
}

pub fn is_image_file(path: &Path) -> bool {
  path
    .extension()
    .and_then(|e| e.to_str())
    .map(|e| {
      let e = e.to_ascii_lowercase();
      IMAGE_EXTENSIONS.contains(&e.as_str())
    })
    .unwrap_or(false)
}

/// 读取并解码为 RGB 图像
pub fn read_rgb_image(path: &Path) -> Result<RgbImage, InputError> {
  let load_error = |source| InputError::ImageLoadError {
    path: path.display().to_string(),
    source,
  };
  let image = ImageReader::open(path)?
    .with_guessed_format()?
    .decode()
    .map_err(load_error)?;
  Ok(image.to_rgb8())
}

pub(crate) fn frame_name(path: &Path) -> String {
  path
    .file_stem()
    .map(|s| s.to_string_lossy().into_owned())
    .unwrap_or_default()
}

pub enum InputWrapper {
  ReadImageFile(ImageFileInput),
  ReadFolder(FolderInput),
}

impl FromUrl for InputWrapper {
  type Error = InputError;

  fn from_url(url: &url::Url) -> Result<Self, Self::Error> {
    match url.scheme() {
      ImageFileInput::SCHEME => Ok(InputWrapper::ReadImageFile(ImageFileInput::from_url(url)?)),
      FolderInput::SCHEME => Ok(InputWrapper::ReadFolder(FolderInput::from_url(url)?)),
      other => Err(InputError::SchemeMismatch(other.to_string())),
    }
  }
}

impl Iterator for InputWrapper {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    match self {
      InputWrapper::ReadImageFile(input) => input.next(),
      InputWrapper::ReadFolder(input) => input.next(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn recognizes_image_extensions() {
    assert!(is_image_file(Path::new("a/b/c.JPG")));
    assert!(is_image_file(Path::new("c.webp")));
    assert!(!is_image_file(Path::new("c.txt")));
    assert!(!is_image_file(Path::new("jpg")));
  }

  #[test]
  fn unknown_scheme_is_rejected() {
    let url = url::Url::parse("rtsp://camera/stream").unwrap();
    assert!(matches!(
      InputWrapper::from_url(&url),
      Err(InputError::SchemeMismatch(_))
    ));
  }
}
