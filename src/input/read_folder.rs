// 该文件是 Kuangxuan （框选） 项目的一部分。
// src/input/read_folder.rs - 目录图像输入
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

use tracing::{debug, error, info};
use url::Url;
use walkdir::WalkDir;

use crate::{
  FromUrl, FromUrlWithScheme,
  input::{Frame, InputError, frame_name, is_image_file, read_rgb_image},
};

/// 按路径排序遍历目录中的图像，逐个解码。
///
/// URI 参数：`limit=N` 只读取前 N 个，`recursive` 递归子目录。
/// 递归时不进入指向目录的符号链接；帧名为相对目录根的路径（去掉扩展名，以 `/` 分隔）。
pub struct FolderInput {
  root: PathBuf,
  paths: std::vec::IntoIter<PathBuf>,
  index: usize,
}

impl FromUrlWithScheme for FolderInput {
  const SCHEME: &'static str = "folder";
}

fn collect_images(dir: &Path, recursive: bool) -> Result<Vec<PathBuf>, InputError> {
  let mut walker = WalkDir::new(dir).min_depth(1).sort_by_file_name();
  if !recursive {
    walker = walker.max_depth(1);
  }

  let mut out = Vec::new();
  for entry in walker {
    let entry = entry?;
    // 指向文件的符号链接照常读取
    let is_file =
      entry.file_type().is_file() || (entry.path_is_symlink() && entry.path().is_file());
    if is_file && is_image_file(entry.path()) {
      out.push(entry.into_path());
    }
  }
  Ok(out)
}

fn relative_name(root: &Path, path: &Path) -> String {
  let relative = path.strip_prefix(root).unwrap_or(path);
  let mut parts: Vec<String> = relative
    .parent()
    .into_iter()
    .flat_map(Path::components)
    .map(|c| c.as_os_str().to_string_lossy().into_owned())
    .collect();
  parts.push(frame_name(path));
  parts.join("/")
}

impl FolderInput {
  pub fn open(dir: &Path, recursive: bool, limit: Option<usize>) -> Result<Self, InputError> {
    let mut paths = collect_images(dir, recursive)?;
    paths.sort();
    if let Some(limit) = limit {
      paths.truncate(limit);
    }
    info!("目录 {} 中共 {} 张图像", dir.display(), paths.len());

    Ok(FolderInput {
      root: dir.to_path_buf(),
      paths: paths.into_iter(),
      index: 0,
    })
  }

  pub fn remaining(&self) -> usize {
    self.paths.len()
  }
}

impl FromUrl for FolderInput {
  type Error = InputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI scheme mismatch: expected '{}', found '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(InputError::SchemeMismatch(url.scheme().to_string()));
    }

    let mut limit = None;
    let mut recursive = false;
    for (k, v) in url.query_pairs() {
      match k.as_ref() {
        "limit" => {
          limit = Some(
            v.parse::<usize>()
              .map_err(|_| InputError::InvalidQuery(format!("limit={}", v)))?,
          )
        }
        "recursive" => recursive = true,
        _ => debug!("忽略未知参数 {}={}", k, v),
      }
    }

    FolderInput::open(Path::new(url.path()), recursive, limit)
  }
}

impl Iterator for FolderInput {
  type Item = Result<Frame, InputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.paths.next()?;
    let index = self.index;
    self.index += 1;

    Some(read_rgb_image(&path).map(|image| Frame {
      name: relative_name(&self.root, &path),
      index,
      image,
    }))
  }
}
