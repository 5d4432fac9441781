/*
 * j-- CLI - メインエントリーポイント
 *
 * j--言語のコンパイラCLIツールのエントリーポイントです。
 * コマンドライン引数の解析と処理ロジックを呼び出します。
 */

use std::process;

use clap::Parser;
use env_logger::{Builder, Env};
use log::{debug, error, LevelFilter};

mod cli;

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    // RUST_LOG が設定されていればそちらを優先する
    let mut builder = Builder::new();
    builder.filter_level(level);
    builder.parse_env(Env::default());
    builder.format_timestamp(None);
    builder.init();
}

fn main() {
    let cli = cli::Cli::parse();
    init_logging(cli.verbose);
    if cli.no_color {
        colored::control::set_override(false);
    }
    debug!("jmm v{} を起動しています", jminusminus_compiler::VERSION);

    match cli::run_command(&cli) {
        Ok(code) => process::exit(code),
        Err(err) => {
            error!("{:#}", err);
            eprintln!("エラー: {:#}", err);
            process::exit(2);
        }
    }
}
