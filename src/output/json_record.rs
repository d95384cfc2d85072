// 该文件是 Sibian （四边） 项目的一部分。
// src/output/json_record.rs - JSON Lines 结果记录
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
  cell::RefCell,
  fs::{File, OpenOptions},
  io::{BufWriter, Write},
  path::PathBuf,
};

use chrono::{SecondsFormat, Utc};
use serde_json::{Value, json};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::{
  FromUrl, FromUrlWithScheme,
  frame::{DisplaySpace, Point2D},
  input::FrameContext,
  output::Render,
  pipeline::{FrameOutcome, PipelineError},
};

#[derive(Error, Debug)]
pub enum JsonRecordError {
  #[error("I/O 错误: {0}")]
  IoError(#[from] std::io::Error),
  #[error("序列化错误: {0}")]
  SerializeError(#[from] serde_json::Error),
  #[error("URI 方案不匹配: {0}")]
  SchemeMismatch(String),
}

/// `json:///path/file.jsonl`：每帧结果与状态各追加一行 JSON
pub struct JsonRecordOutput {
  path: PathBuf,
  writer: RefCell<BufWriter<File>>,
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

    let path = PathBuf::from(uri.path());
    if let Some(parent) = path.parent()
      && !parent.as_os_str().is_empty()
    {
      std::fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new().create(true).append(true).open(&path)?;
    info!("记录结果到文件: {}", path.display());

    Ok(JsonRecordOutput {
      path,
      writer: RefCell::new(BufWriter::new(file)),
    })
  }
}

fn point(p: &Point2D<DisplaySpace>) -> Value {
  json!([p.x, p.y])
}

fn timestamp() -> String {
  Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// 一帧结果的 JSON 摘要
fn outcome_summary(ctx: &FrameContext, outcome: &FrameOutcome) -> Value {
  match outcome {
    FrameOutcome::Empty(reason) => json!({
      "kind": "frame",
      "frame": ctx.index,
      "detected": false,
      "reason": reason.as_str(),
    }),
    FrameOutcome::Detected(detection) => {
      let candidate = &detection.candidate;
      let roi = &detection.roi;
      let quad = match &detection.quad {
        Ok(quad) => json!({
          "top_left": point(&quad.top_left),
          "top_right": point(&quad.top_right),
          "bottom_right": point(&quad.bottom_right),
          "bottom_left": point(&quad.bottom_left),
        }),
        Err(_) => Value::Null,
      };
      json!({
        "kind": "frame",
        "frame": ctx.index,
        "detected": true,
        "score": candidate.score,
        "box": [candidate.x1, candidate.y1, candidate.x2, candidate.y2],
        "roi": [roi.x0, roi.y0, roi.x1, roi.y1],
        "mask_foreground": detection.mask.foreground_count(),
        "quad": quad,
        "quad_failure": detection.quad.as_ref().err().map(|f| f.to_string()),
      })
    }
  }
}

impl JsonRecordOutput {
  pub fn path(&self) -> &PathBuf {
    &self.path
  }

  fn write_line(&self, mut value: Value) -> Result<(), JsonRecordError> {
    if let Value::Object(map) = &mut value {
      map.insert("timestamp".to_string(), Value::String(timestamp()));
    }
    let mut writer = self.writer.borrow_mut();
    serde_json::to_writer(&mut *writer, &value)?;
    writer.write_all(b"\n")?;
    writer.flush()?;
    Ok(())
  }
}

impl Render for JsonRecordOutput {
  type Error = JsonRecordError;

  fn render_result(&self, ctx: &FrameContext, outcome: &FrameOutcome) -> Result<(), Self::Error> {
    self.write_line(outcome_summary(ctx, outcome))
  }

  fn render_error(&self, ctx: &FrameContext, error: &PipelineError) -> Result<(), Self::Error> {
    self.write_line(json!({
      "kind": "frame",
      "frame": ctx.index,
      "detected": false,
      "error": error.to_string(),
    }))
  }

  fn show_status(&self, status: &str) -> Result<(), Self::Error> {
    self.write_line(json!({
      "kind": "status",
      "status": status,
    }))
  }
}
