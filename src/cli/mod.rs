//! # CLI 模块
//!
//! 使用 `clap` 定义命令行参数和子命令。
//!
//! ## 命令结构
//! - `hkls`: 列出物相在 d 范围内允许的衍射
//! - `fit`: 单谱 Pawley 精修
//! - `fit2d`: 多散射角 Pawley 精修
//! - `fit-batch`: 对目录下多个谱文件批量做单谱精修
//!
//! ## 依赖关系
//! - 被 `main.rs` 使用
//! - 子模块: common, hkls, fit

pub mod common;
pub mod fit;
pub mod hkls;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// pawley - 中子粉末衍射 Pawley 精修
#[derive(Parser)]
#[command(name = "pawley")]
#[command(author = "Changjiang Wu")]
#[command(version)]
#[command(about = "Pawley refinement of neutron powder-diffraction patterns", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Also write logs to this file
    #[arg(long, global = true, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 可用的子命令
#[derive(Subcommand)]
pub enum Commands {
    /// List the reflections a phase allows within a d-spacing window
    Hkls(hkls::HklsArgs),

    /// Pawley-fit a single diffraction pattern
    Fit(fit::FitArgs),

    /// Pawley-fit a multi-angle (2D) pattern
    Fit2d(fit::Fit2dArgs),

    /// Fit every pattern file in a directory independently
    FitBatch(fit::FitBatchArgs),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_fit() {
        let cli = Cli::try_parse_from([
            "pawley",
            "-vv",
            "fit",
            "si.xy",
            "--lattice",
            "5.43",
            "--spacegroup",
            "Fd-3m",
            "--max-nfev",
            "50",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        match cli.command {
            Commands::Fit(args) => {
                assert_eq!(args.input, PathBuf::from("si.xy"));
                assert_eq!(args.options.max_nfev, Some(50));
                assert_eq!(args.phases.lattice, Some(vec![5.43]));
            }
            _ => panic!("expected fit"),
        }
    }
}
