// 该文件是 Sibian （四边） 项目的一部分。
// src/model/tensor.rs - 原始输出张量
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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
  #[error("张量数据长度不匹配: 形状 {shape:?} 需要 {expected} 个元素, 实际 {actual} 个")]
  LengthMismatch {
    shape: Vec<usize>,
    expected: usize,
    actual: usize,
  },
  #[error("张量形状为空")]
  EmptyShape,
}

/// 行主序连续存储的 f32 张量，创建后不可修改
#[derive(Debug, Clone, PartialEq)]
pub struct RawTensor {
  shape: Box<[usize]>,
  data: Box<[f32]>,
}

impl RawTensor {
  pub fn new(
    shape: impl Into<Box<[usize]>>,
    data: impl Into<Box<[f32]>>,
  ) -> Result<Self, TensorError> {
    let shape = shape.into();
    let data = data.into();
    if shape.is_empty() {
      return Err(TensorError::EmptyShape);
    }
    let expected = shape.iter().product::<usize>();
    if expected != data.len() {
      return Err(TensorError::LengthMismatch {
        shape: shape.to_vec(),
        expected,
        actual: data.len(),
      });
    }
    Ok(Self { shape, data })
  }

  pub fn shape(&self) -> &[usize] {
    &self.shape
  }

  pub fn rank(&self) -> usize {
    self.shape.len()
  }

  pub fn data(&self) -> &[f32] {
    &self.data
  }

  pub fn get(&self, index: usize) -> Option<f32> {
    self.data.get(index).copied()
  }
}

/// 一次推理调用的全部命名输出，保持插入顺序
#[derive(Debug, Default, Clone)]
pub struct InferenceOutputs {
  entries: Vec<(String, RawTensor)>,
}

impl InferenceOutputs {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn insert(&mut self, name: impl Into<String>, tensor: RawTensor) {
    self.entries.push((name.into(), tensor));
  }

  pub fn with(mut self, name: impl Into<String>, tensor: RawTensor) -> Self {
    self.insert(name, tensor);
    self
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.entries.is_empty()
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &RawTensor)> {
    self.entries.iter().map(|(name, tensor)| (name.as_str(), tensor))
  }
}

impl IntoIterator for InferenceOutputs {
  type Item = (String, RawTensor);
  type IntoIter = std::vec::IntoIter<(String, RawTensor)>;

  fn into_iter(self) -> Self::IntoIter {
    self.entries.into_iter()
  }
}

impl FromIterator<(String, RawTensor)> for InferenceOutputs {
  fn from_iter<T: IntoIterator<Item = (String, RawTensor)>>(iter: T) -> Self {
    Self {
      entries: iter.into_iter().collect(),
    }
  }
}
