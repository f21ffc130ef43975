//! # 解析器模块
//!
//! - `cif`: 晶胞与空间群
//! - `pattern`: 测量谱（XY 单谱、2D CSV 多谱）
//!
//! ## 依赖关系
//! - 被 `phase.rs`、`commands/`、`batch/` 使用
//! - 使用 `models/` 数据模型

pub mod cif;
pub mod pattern;

use crate::error::{PawleyError, Result};
use crate::models::Pattern1D;
use std::path::Path;

/// 按扩展名读取单谱文件；CSV 多谱会被聚焦为单谱
pub fn parse_pattern_file(path: &Path) -> Result<Pattern1D> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|s| s.to_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "xy" | "dat" | "txt" | "xye" => pattern::parse_xy_file(path),
        "csv" => pattern::parse_csv2d_file(path)?.focus(),
        _ => Err(PawleyError::InvalidArgument(format!(
            "Cannot determine pattern format for: {}",
            path.display()
        ))),
    }
}
