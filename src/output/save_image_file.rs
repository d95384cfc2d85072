// 该文件是 Sibian （四边） 项目的一部分。
// src/output/save_image_file.rs - 保存叠加图像文件
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

use image::RgbaImage;
use thiserror::Error;
#[cfg(feature = "read_image_file")]
use tracing::warn;
use tracing::{debug, info};
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  config::OverlayColor,
  input::FrameContext,
  output::{Render, draw::Draw},
  pipeline::{FrameOutcome, PipelineError},
};

#[derive(Error, Debug)]
pub enum SaveImageFileError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("图像错误: {0}")]
  ImageError(#[from] image::ImageError),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// `image:///path/prefix.png`：每帧保存一张显示尺寸的叠加图像，
/// 文件名追加帧序号
pub struct SaveImageFileOutput {
  path: PathBuf,
  draw: Draw,
}

impl FromUrlWithScheme for SaveImageFileOutput {
  const SCHEME: &'static str = "image";
}

impl FromUrl for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn from_url(uri: &Url) -> Result<Self, Self::Error> {
    if uri.scheme() != Self::SCHEME {
      return Err(SaveImageFileError::SchemeMismatch(format!(
        "期望保存方式 '{}', 实际保存方式 '{}'",
        Self::SCHEME,
        uri.scheme()
      )));
    }

    Ok(SaveImageFileOutput {
      path: PathBuf::from(uri.path()),
      draw: Draw::default(),
    })
  }
}

impl SaveImageFileOutput {
  pub fn with_overlay(mut self, overlay: OverlayColor) -> Self {
    self.draw = self.draw.with_overlay(overlay);
    self
  }

  /// 第 `index` 帧的文件路径
  pub fn frame_path(&self, index: usize) -> PathBuf {
    let stem = self
      .path
      .file_stem()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "frame".to_string());
    let extension = self
      .path
      .extension()
      .map(|s| s.to_string_lossy().into_owned())
      .unwrap_or_else(|| "png".to_string());
    self
      .path
      .with_file_name(format!("{}_{:06}.{}", stem, index, extension))
  }

  /// 显示尺寸的画布，有帧图像时以其为背景
  fn canvas(&self, ctx: &FrameContext) -> RgbaImage {
    let (width, height) = (ctx.display.width, ctx.display.height);

    #[cfg(feature = "read_image_file")]
    if let Some(path) = &ctx.image {
      match image::open(path) {
        Ok(background) => {
          return image::imageops::resize(
            &background.to_rgba8(),
            width,
            height,
            image::imageops::FilterType::Triangle,
          );
        }
        Err(err) => warn!("无法读取帧图像 {}: {}", path.display(), err),
      }
    }

    RgbaImage::new(width, height)
  }

  fn save_image(&self, index: usize, image: &RgbaImage) -> Result<(), SaveImageFileError> {
    let path = self.frame_path(index);
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }

    image.save(&path)?;
    debug!("保存图像到文件: {}", path.display());
    Ok(())
  }
}

impl Render for SaveImageFileOutput {
  type Error = SaveImageFileError;

  fn render_result(&self, ctx: &FrameContext, outcome: &FrameOutcome) -> Result<(), Self::Error> {
    let mut canvas = self.canvas(ctx);
    self.draw.draw_outcome(&mut canvas, outcome);
    self.save_image(ctx.index, &canvas)
  }

  fn render_error(&self, ctx: &FrameContext, _error: &PipelineError) -> Result<(), Self::Error> {
    let canvas = self.canvas(ctx);
    self.save_image(ctx.index, &canvas)
  }

  fn show_status(&self, status: &str) -> Result<(), Self::Error> {
    info!("{}", status);
    Ok(())
  }
}
