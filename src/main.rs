//! # defectkit 命令行入口
//!
//! ## 子命令
//! - `generate` - 生成点缺陷与超胞条目
//! - `fermi` - 自洽费米能级与缺陷浓度

use clap::Parser;
use defectkit::cli::Cli;
use defectkit::{commands, utils};

fn main() {
    // Initialize colored output for Windows compatibility
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let cli = Cli::parse();

    if let Err(e) = commands::run(cli.command) {
        utils::output::print_error(&format!("{}", e));
        std::process::exit(1);
    }
}
