//! # pawley 命令行入口
//!
//! ## 子命令
//! - `hkls` - 列出允许的衍射
//! - `fit` - 单谱精修
//! - `fit2d` - 多散射角精修
//! - `fit-batch` - 批量单谱精修

use clap::Parser;
use pawley::cli::Cli;
use pawley::{commands, logging, utils};

fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = logging::setup_logging(cli.verbose, cli.quiet, cli.log_file.as_deref()) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
