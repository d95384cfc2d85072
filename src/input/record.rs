// 该文件是 Sibian （四边） 项目的一部分。
// src/input/record.rs - 推理结果记录文件输入
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
  fs,
  path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info};
use url::Url;

use super::{FrameContext, RecordedFrame};
use crate::{
  FromUrl, FromUrlWithScheme,
  frame::Dimensions,
  model::{InferenceOutputs, RawTensor, TensorError},
};

#[derive(Error, Debug)]
pub enum RecordInputError {
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("记录文件 {path} 解析错误: {source}")]
  ParseError {
    path: PathBuf,
    source: serde_json::Error,
  },
  #[error("记录文件 {path} 中的张量 {name} 无效: {source}")]
  TensorError {
    path: PathBuf,
    name: String,
    source: TensorError,
  },
}

/// 单个张量的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TensorRecord {
  pub shape: Vec<usize>,
  pub data: Vec<f32>,
}

/// 一帧推理结果的记录文件内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameRecord {
  pub source: Dimensions,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display: Option<Dimensions>,
  /// 帧图像路径，相对路径以记录文件所在目录为基准
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub image: Option<String>,
  pub outputs: BTreeMap<String, TensorRecord>,
}

/// `record://` 输入：目录下的 `*.json` 按文件名排序逐帧读取，或单个文件
pub struct RecordInput {
  files: std::vec::IntoIter<PathBuf>,
  index: usize,
}

impl FromUrlWithScheme for RecordInput {
  const SCHEME: &'static str = "record";
}

impl FromUrl for RecordInput {
  type Error = RecordInputError;

  fn from_url(url: &Url) -> Result<Self, Self::Error> {
    if url.scheme() != Self::SCHEME {
      error!(
        "URI 方案不匹配: 期望 '{}', 实际 '{}'",
        Self::SCHEME,
        url.scheme()
      );
      return Err(RecordInputError::SchemeMismatch(url.scheme().to_string()));
    }
    Self::open(url.path())
  }
}

impl RecordInput {
  pub fn open(path: impl AsRef<Path>) -> Result<Self, RecordInputError> {
    let path = path.as_ref();
    let files = if path.is_dir() {
      let mut files = fs::read_dir(path)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
      files.retain(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"));
      files.sort();
      files
    } else {
      // 单个文件，不存在时在此报错
      fs::metadata(path)?;
      vec![path.to_path_buf()]
    };

    info!("打开推理记录: {}, 共 {} 帧", path.display(), files.len());
    Ok(Self {
      files: files.into_iter(),
      index: 0,
    })
  }

  fn load(&self, path: &Path) -> Result<RecordedFrame, RecordInputError> {
    let content = fs::read_to_string(path)?;
    let record: FrameRecord =
      serde_json::from_str(&content).map_err(|source| RecordInputError::ParseError {
        path: path.to_path_buf(),
        source,
      })?;

    let mut outputs = InferenceOutputs::new();
    for (name, tensor) in record.outputs {
      let raw = RawTensor::new(tensor.shape, tensor.data).map_err(|source| {
        RecordInputError::TensorError {
          path: path.to_path_buf(),
          name: name.clone(),
          source,
        }
      })?;
      outputs.insert(name, raw);
    }

    let image = record.image.map(|image| {
      let image = PathBuf::from(image);
      match path.parent() {
        Some(parent) if image.is_relative() => parent.join(image),
        _ => image,
      }
    });

    debug!("读取第 {} 帧记录: {}, {} 个输出", self.index, path.display(), outputs.len());
    Ok(RecordedFrame {
      context: FrameContext {
        index: self.index,
        source: record.source,
        display: record.display.unwrap_or(record.source),
        image,
      },
      outputs,
    })
  }
}

impl Iterator for RecordInput {
  type Item = Result<RecordedFrame, RecordInputError>;

  fn next(&mut self) -> Option<Self::Item> {
    let path = self.files.next()?;
    let frame = self.load(&path);
    self.index += 1;
    Some(frame)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn write_record(dir: &Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
  }

  #[test]
  fn directory_is_read_in_name_order() {
    let dir = tempfile::tempdir().unwrap();
    write_record(
      dir.path(),
      "0002.json",
      r#"{"source":{"width":640,"height":480},"outputs":{}}"#,
    );
    write_record(
      dir.path(),
      "0001.json",
      r#"{"source":{"width":320,"height":240},"display":{"width":160,"height":120},
          "image":"frame.png","outputs":{"t":{"shape":[1,2],"data":[0.5,1.0]}}}"#,
    );
    write_record(dir.path(), "notes.txt", "ignored");

    let frames: Vec<_> = RecordInput::open(dir.path())
      .unwrap()
      .collect::<Result<_, _>>()
      .unwrap();
    assert_eq!(frames.len(), 2);

    let first = &frames[0];
    assert_eq!(first.context.index, 0);
    assert_eq!(first.context.source, Dimensions::new(320, 240));
    assert_eq!(first.context.display, Dimensions::new(160, 120));
    assert_eq!(first.context.image, Some(dir.path().join("frame.png")));
    assert_eq!(first.outputs.len(), 1);

    let second = &frames[1];
    assert_eq!(second.context.index, 1);
    assert_eq!(second.context.display, second.context.source);
    assert!(second.context.image.is_none());
  }

  #[test]
  fn invalid_tensor_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    write_record(
      dir.path(),
      "bad.json",
      r#"{"source":{"width":8,"height":8},"outputs":{"t":{"shape":[2,2],"data":[1.0]}}}"#,
    );
    let mut input = RecordInput::open(dir.path().join("bad.json")).unwrap();
    assert!(matches!(
      input.next(),
      Some(Err(RecordInputError::TensorError { .. }))
    ));
    assert!(input.next().is_none());
  }

  #[test]
  fn scheme_is_checked() {
    let url = Url::parse("image:///tmp/frames").unwrap();
    assert!(matches!(
      RecordInput::from_url(&url),
      Err(RecordInputError::SchemeMismatch(_))
    ));
  }
}
