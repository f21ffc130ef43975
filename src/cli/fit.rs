//! # fit / fit2d / fit-batch 子命令 CLI 定义
//!
//! ## 依赖关系
//! - 被 `cli/mod.rs` 使用
//! - 参数传递给 `commands/` 相应模块

use crate::cli::common::{FitOptionArgs, OutputArgs, PhaseArgs};

use clap::Args;
use std::path::PathBuf;

// ─────────────────────────────────────────────────────────────
// fit
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct FitArgs {
    /// Pattern file (.xy/.dat/.xye, or .csv focused to one spectrum)
    pub input: PathBuf,

    #[command(flatten)]
    pub phases: PhaseArgs,

    #[command(flatten)]
    pub options: FitOptionArgs,

    #[command(flatten)]
    pub output: OutputArgs,
}

// ─────────────────────────────────────────────────────────────
// fit2d
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct Fit2dArgs {
    /// 2D CSV file: d_spacing,<2θ>,<2θ>,...
    pub input: PathBuf,

    #[command(flatten)]
    pub phases: PhaseArgs,

    #[command(flatten)]
    pub options: FitOptionArgs,

    #[command(flatten)]
    pub output: OutputArgs,

    /// Refine a separate intensity set for each spectrum
    #[arg(long)]
    pub per_spectrum: bool,

    /// Ignore points whose wavelength 2·d·sinθ exceeds this value (Å)
    #[arg(long)]
    pub lambda_max: Option<f64>,

    /// Seed the 2D fit from a 1D fit of the focused pattern
    #[arg(long)]
    pub seed_1d: bool,
}

// ─────────────────────────────────────────────────────────────
// fit-batch
// ─────────────────────────────────────────────────────────────

#[derive(Args, Debug)]
pub struct FitBatchArgs {
    /// Directory (or single file) of patterns
    pub input: PathBuf,

    /// File name pattern(s), comma separated
    #[arg(short, long, default_value = "*.xy,*.xye,*.dat")]
    pub pattern: String,

    /// Search subdirectories
    #[arg(short, long)]
    pub recursive: bool,

    /// Parallel jobs (0 = all CPUs)
    #[arg(short, long, default_value_t = 0)]
    pub jobs: usize,

    #[command(flatten)]
    pub phases: PhaseArgs,

    #[command(flatten)]
    pub options: FitOptionArgs,

    /// Summary CSV (one row per file)
    #[arg(long, default_value = "pawley_summary.csv")]
    pub summary: PathBuf,
}
