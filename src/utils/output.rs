//! # 美化输出工具
//!
//! 统一的终端输出样式：带颜色标签的单行消息、标题栏与表格块。
//! 警告与错误写到 stderr，结果表写到 stdout。
//!
//! ## 依赖关系
//! - 被 `commands/`, `generation/`, `fermi/` 使用
//! - 使用 `colored` crate

use colored::Colorize;

const RULE_WIDTH: usize = 60;

/// 打印成功消息
pub fn print_success(msg: &str) {
    println!("{} {}", "[OK]".green().bold(), msg);
}

/// 打印错误消息
pub fn print_error(msg: &str) {
    eprintln!("{} {}", "[ERR]".red().bold(), msg);
}

/// 打印警告消息（非致命）
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", "[WARN]".yellow().bold(), msg);
}

pub fn print_info(msg: &str) {
    println!("{} {}", "[*]".blue().bold(), msg);
}

pub fn print_done(msg: &str) {
    println!("{} {}", "[DONE]".green().bold(), msg);
}

fn rule() -> String {
    "─".repeat(RULE_WIDTH)
}

/// 打印标题栏
pub fn print_header(title: &str) {
    println!("\n{}", rule().dimmed());
    println!("  {}", title.bold());
    println!("{}\n", rule().dimmed());
}

/// 打印带标题的表格块
pub fn print_table(title: &str, table: &str) {
    println!("{}", title.bold());
    println!("{}", table.trim_end());
    println!("{}", rule().dimmed());
}
