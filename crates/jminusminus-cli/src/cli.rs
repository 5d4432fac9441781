/*
 * j-- CLI - コマンドライン引数処理モジュール
 *
 * このモジュールでは、jmm のコマンドライン引数を処理し、
 * 適切なコンパイラAPIの呼び出しに変換します。
 */

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use log::{debug, info};

use jminusminus_compiler::ast::PrettyPrinter;
use jminusminus_compiler::backend::Machine;
use jminusminus_compiler::lexer::TokenKind;
use jminusminus_compiler::{
    ClassFile, Compilation, Compiler, CompilerConfig, Diagnostics, MachineError, Phase, Severity, VERSION,
};

/// j--言語のコンパイラCLIツール
#[derive(Parser)]
#[command(name = "jmm")]
#[command(version = VERSION)]
#[command(about = "j--（Javaのサブセット）のコンパイラ", long_about = None)]
pub struct Cli {
    /// ログ出力を詳細にする（-v で info、-vv で debug、それ以上で trace）
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// コンパイル設定ファイル（TOML）へのパス
    #[arg(short, long, value_name = "FILE", global = true)]
    pub config: Option<PathBuf>,

    /// 色付き出力を無効にする
    #[arg(long, global = true)]
    pub no_color: bool,

    /// サブコマンド
    #[command(subcommand)]
    pub command: Commands,
}

/// jmm のサブコマンド
#[derive(Subcommand)]
pub enum Commands {
    /// トークン列を表示
    Tokens(SourceArgs),

    /// 抽象構文木を表示
    Ast(AstArgs),

    /// コンパイルして生成されたクラスを表示
    Build(BuildArgs),

    /// コンパイルして main を実行
    Run(RunArgs),
}

/// 入力ファイルだけを取る引数
#[derive(Args)]
pub struct SourceArgs {
    /// 入力ファイル
    pub input: PathBuf,
}

/// ast サブコマンドの引数
#[derive(Args)]
pub struct AstArgs {
    /// 入力ファイル
    pub input: PathBuf,

    /// 意味解析後の構文木を表示する
    #[arg(long)]
    pub analyzed: bool,
}

/// コンパイル動作を上書きするフラグ
#[derive(Args)]
pub struct CompileFlags {
    /// 警告をエラーとして扱う
    #[arg(short = 'W', long)]
    pub warnings_as_errors: bool,

    /// 表示する診断の最大件数
    #[arg(long, value_name = "N")]
    pub max_errors: Option<usize>,
}

/// build サブコマンドの引数
#[derive(Args)]
pub struct BuildArgs {
    /// 入力ファイル
    pub input: PathBuf,

    #[command(flatten)]
    pub flags: CompileFlags,

    /// 指定したフェーズで止める
    #[arg(long, value_parser = parse_phase, value_name = "PHASE")]
    pub stop_after: Option<Phase>,

    /// 診断をJSONで標準出力に書き出す
    #[arg(long)]
    pub json: bool,

    /// クラス一覧だけを表示し、命令列を省く
    #[arg(short, long)]
    pub summary: bool,
}

/// run サブコマンドの引数
#[derive(Args)]
pub struct RunArgs {
    /// 入力ファイル
    pub input: PathBuf,

    #[command(flatten)]
    pub flags: CompileFlags,

    /// main を持つクラス名（省略時は最初に見つかったもの）
    #[arg(long, value_name = "CLASS")]
    pub class: Option<String>,

    /// 実行する命令数の上限
    #[arg(long, value_name = "STEPS")]
    pub step_limit: Option<u64>,
}

const MAIN_DESCRIPTOR: &str = "([Ljava/lang/String;)V";

fn parse_phase(value: &str) -> std::result::Result<Phase, String> {
    match value {
        "parse" => Ok(Phase::Parse),
        "analyze" => Ok(Phase::Analyze),
        "codegen" => Ok(Phase::Codegen),
        other => Err(format!("不明なフェーズです: {} (parse, analyze, codegen のいずれか)", other)),
    }
}

/// 設定ファイルとフラグから設定を組み立てる
pub fn load_config(path: Option<&Path>) -> Result<CompilerConfig> {
    match path {
        Some(path) => {
            let config = CompilerConfig::from_file(path)
                .with_context(|| format!("設定ファイルの読み込みに失敗しました: {}", path.display()))?;
            debug!("設定ファイルを読み込みました: {:?}", config);
            Ok(config)
        }
        None => Ok(CompilerConfig::default()),
    }
}

fn apply_flags(mut config: CompilerConfig, flags: &CompileFlags) -> CompilerConfig {
    if flags.warnings_as_errors {
        config.warnings_as_errors = true;
    }
    if flags.max_errors.is_some() {
        config.max_errors = flags.max_errors;
    }
    config
}

fn read_source(path: &Path) -> Result<(String, String)> {
    let source =
        fs::read_to_string(path).with_context(|| format!("ファイルを読み込めません: {}", path.display()))?;
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((source, file_name))
}

/// 診断を標準エラーに表示する
fn print_diagnostics(diagnostics: &Diagnostics, max_errors: Option<usize>) {
    let limit = max_errors.unwrap_or(usize::MAX);
    for diagnostic in diagnostics.iter().take(limit) {
        let line = diagnostic.to_string();
        match diagnostic.severity {
            Severity::Error => eprintln!("{}", line.red()),
            Severity::Warning => eprintln!("{}", line.yellow()),
        }
    }
    if diagnostics.len() > limit {
        eprintln!("... 他{}件の診断を省略しました", diagnostics.len() - limit);
    }
}

fn print_summary(compilation: &Compilation) {
    let errors = compilation.diagnostics.error_count();
    let warnings = compilation.diagnostics.warning_count();
    if compilation.has_errors() {
        eprintln!("{}", format!("{}件のエラー, {}件の警告", errors, warnings).red().bold());
    } else if warnings > 0 {
        eprintln!("{}", format!("{}件の警告", warnings).yellow());
    }
}

/// CLIのコマンドを実行する。戻り値はプロセスの終了コード。
pub fn run_command(cli: &Cli) -> Result<i32> {
    let config = load_config(cli.config.as_deref())?;
    match &cli.command {
        Commands::Tokens(args) => tokens(args, &config),
        Commands::Ast(args) => ast(args, config),
        Commands::Build(args) => build(args, config),
        Commands::Run(args) => run(args, config),
    }
}

fn tokens(args: &SourceArgs, config: &CompilerConfig) -> Result<i32> {
    let (source, file_name) = read_source(&args.input)?;
    let compiler = Compiler::new(config.clone());
    let (tokens, diagnostics) = compiler.tokenize(&source, &file_name);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    for token in tokens.iter().filter(|t| t.kind != TokenKind::Eof) {
        writeln!(out, "{:>4}: {} = {}", token.line, token.kind, token.image)?;
    }
    print_diagnostics(&diagnostics, config.max_errors);
    Ok(if diagnostics.has_errors() { 1 } else { 0 })
}

fn ast(args: &AstArgs, config: CompilerConfig) -> Result<i32> {
    let (source, file_name) = read_source(&args.input)?;
    let phase = if args.analyzed { Phase::Analyze } else { Phase::Parse };
    let max_errors = config.max_errors;
    let compilation = Compiler::new(config.with_stop_after(phase)).compile(&source, &file_name)?;

    print!("{}", PrettyPrinter::dump(&compilation.unit));
    print_diagnostics(&compilation.diagnostics, max_errors);
    Ok(if compilation.diagnostics.has_errors() { 1 } else { 0 })
}

fn build(args: &BuildArgs, config: CompilerConfig) -> Result<i32> {
    let (source, file_name) = read_source(&args.input)?;
    let mut config = apply_flags(config, &args.flags);
    if let Some(phase) = args.stop_after {
        config.stop_after = phase;
    }
    let max_errors = config.max_errors;
    let compilation = Compiler::new(config).compile(&source, &file_name)?;

    if args.json {
        println!("{}", compilation.diagnostics.to_json()?);
        return Ok(if compilation.has_errors() { 1 } else { 0 });
    }

    print_diagnostics(&compilation.diagnostics, max_errors);
    print_summary(&compilation);
    if compilation.has_errors() {
        return Ok(1);
    }

    for class in &compilation.classes {
        if args.summary {
            println!("{} ({}個のメソッド)", class.name.bold(), class.methods.len());
        } else {
            print!("{}", class.listing());
        }
    }
    info!("{}個のクラスを生成しました", compilation.classes.len());
    Ok(0)
}

fn run(args: &RunArgs, config: CompilerConfig) -> Result<i32> {
    let (source, file_name) = read_source(&args.input)?;
    let config = apply_flags(config, &args.flags).with_stop_after(Phase::Codegen);
    let max_errors = config.max_errors;
    let compilation = Compiler::new(config).compile(&source, &file_name)?;

    print_diagnostics(&compilation.diagnostics, max_errors);
    if compilation.has_errors() {
        print_summary(&compilation);
        return Ok(1);
    }
    let classes = compilation.into_result()?;
    let entry = entry_class(&classes, args.class.as_deref())?;
    debug!("実行するクラス: {}", entry);

    let mut machine = Machine::new(&classes);
    if let Some(limit) = args.step_limit {
        machine = machine.with_step_limit(limit);
    }
    let result = machine.run_main(&entry);

    let stdout = io::stdout();
    let mut out = stdout.lock();
    out.write_all(machine.take_output().as_bytes())?;
    out.flush()?;

    match result {
        Ok(()) => Ok(0),
        Err(MachineError::UncaughtException { class, message }) => {
            let detail = message.map(|m| format!(": {}", m)).unwrap_or_default();
            eprintln!("{}", format!("Exception in thread \"main\" {}{}", class, detail).red());
            Ok(1)
        }
        Err(err) => Err(err).context("実行に失敗しました"),
    }
}

/// 実行する main を持つクラスを選ぶ
fn entry_class(classes: &[ClassFile], requested: Option<&str>) -> Result<String> {
    let has_main = |class: &ClassFile| {
        class
            .method("main", MAIN_DESCRIPTOR)
            .map_or(false, |method| method.is_static())
    };
    match requested {
        Some(name) => {
            let internal = name.replace('.', "/");
            match classes.iter().find(|c| c.name == internal) {
                Some(class) if has_main(class) => Ok(internal),
                Some(_) => bail!("クラス '{}' に main メソッドがありません", name),
                None => bail!("クラス '{}' が見つかりません", name),
            }
        }
        None => classes
            .iter()
            .find(|class| has_main(class))
            .map(|class| class.name.clone())
            .context("main メソッドを持つクラスがありません"),
    }
}
