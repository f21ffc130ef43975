//! # 数据模型模块
//!
//! 测量谱容器与精修参数向量。
//!
//! ## 依赖关系
//! - 被 `parsers/`、`pawley/` 和 `commands/` 使用
//! - 子模块: pattern, params

pub mod params;
pub mod pattern;

pub use params::ParameterVector;
pub use pattern::{Pattern1D, Pattern2D, Spectrum};
