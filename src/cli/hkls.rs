//! # hkls 子命令 CLI 定义

use crate::cli::common::PhaseArgs;

use clap::Args;

#[derive(Args, Debug)]
pub struct HklsArgs {
    #[command(flatten)]
    pub phases: PhaseArgs,

    /// Lower d-spacing limit (Å)
    #[arg(long, default_value_t = 1.0)]
    pub d_min: f64,

    /// Upper d-spacing limit (Å)
    #[arg(long, default_value_t = 5.0)]
    pub d_max: f64,

    /// Write the reflection list to this CSV file
    #[arg(long, value_name = "FILE")]
    pub csv: Option<std::path::PathBuf>,
}
