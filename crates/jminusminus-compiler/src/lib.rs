//! # j-- Compiler
//!
//! Java のサブセットである j-- のコンパイラライブラリです。
//! ソースコードを字句解析・構文解析して抽象構文木を作り、意味解析で型を付けた後、
//! JVM 風の命令列を持つクラスを生成します。生成したクラスは
//! [`backend::Machine`] でそのまま実行できます。
//!
//! ```no_run
//! use jminusminus_compiler::{Compiler, CompilerConfig};
//! use jminusminus_compiler::backend::Machine;
//!
//! let source = "public class Hello { public static void main(String[] args) { System.out.println(42); } }";
//! let compilation = Compiler::new(CompilerConfig::default()).compile(source, "Hello.java")?;
//! let classes = compilation.into_result()?;
//! let mut machine = Machine::new(&classes);
//! machine.run_main("Hello")?;
//! assert_eq!(machine.output(), "42\n");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::collections::HashMap;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

pub mod backend;
pub mod config;
pub mod diagnostics;
pub mod frontend;
pub mod typesystem;

// 再エクスポート
pub use self::backend::{ClassFile, Machine, MachineError};
pub use self::config::{CompilerConfig, Phase};
pub use self::diagnostics::{Diagnostic, Diagnostics, Severity};
pub use self::frontend::ast;
pub use self::frontend::error::{CompilerError, ErrorKind, Result};
pub use self::frontend::lexer;
pub use self::frontend::parser;

use self::backend::{ClassEmitter, CodeGenerator};
use self::frontend::ast::CompilationUnit;
use self::frontend::lexer::Token;
use self::frontend::semantic::Analyzer;

/// コンパイラのバージョン
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// コンパイル統計情報
#[derive(Debug, Default, Clone)]
pub struct CompilationStats {
    /// 処理された行数
    pub lines_processed: usize,

    /// 検出されたエラー数
    pub errors_count: usize,

    /// 検出された警告数
    pub warnings_count: usize,

    /// 各フェーズの実行時間
    pub phase_timings: HashMap<Phase, Duration>,
}

/// コンパイル1回分の結果
///
/// エラーがあってもパイプラインは可能な限り進み、診断はすべてここに集まります。
/// エラーが一件でも記録された場合 `classes` は空のままです。
#[derive(Debug)]
pub struct Compilation {
    /// 解析済み（`stop_after` によっては構文解析のみ）のコンパイル単位
    pub unit: CompilationUnit,
    pub diagnostics: Diagnostics,
    /// 生成されたクラス
    pub classes: Vec<ClassFile>,
    /// 実際に最後まで実行したフェーズ
    pub completed: Option<Phase>,
    pub stats: CompilationStats,
    warnings_as_errors: bool,
}

impl Compilation {
    /// コード生成を止めるべき診断があるか
    pub fn has_errors(&self) -> bool {
        self.diagnostics.has_errors() || (self.warnings_as_errors && self.diagnostics.warning_count() > 0)
    }

    /// 生成されたクラスを取り出す。エラーがあれば [`CompilerError::Aborted`]。
    pub fn into_result(self) -> Result<Vec<ClassFile>> {
        if self.has_errors() {
            let errors = if self.warnings_as_errors {
                self.diagnostics.len()
            } else {
                self.diagnostics.error_count()
            };
            return Err(CompilerError::Aborted { errors });
        }
        Ok(self.classes)
    }
}

/// コンパイラのメインクラス
#[derive(Debug, Default)]
pub struct Compiler {
    /// コンパイラの設定
    config: CompilerConfig,
}

impl Compiler {
    /// 新しいコンパイラインスタンスを作成
    pub fn new(config: CompilerConfig) -> Self {
        Self { config }
    }

    /// コンパイラの設定を取得
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// 字句解析だけを行う
    pub fn tokenize(&self, source: &str, file_name: &str) -> (Vec<Token>, Diagnostics) {
        let (tokens, diagnostics) = lexer::tokenize(source, file_name);
        info!("字句解析完了: {} ({}個のトークン)", file_name, tokens.len());
        (tokens, diagnostics)
    }

    /// 構文解析までを行う
    pub fn parse(&self, source: &str, file_name: &str) -> (CompilationUnit, Diagnostics) {
        let mut diagnostics = Diagnostics::new(file_name);
        let unit = parser::parse(source, file_name, &mut diagnostics);
        (unit, diagnostics)
    }

    /// 設定されたフェーズまでパイプラインを実行する
    ///
    /// 字句・構文・意味エラーは [`Compilation::diagnostics`] に積まれ、`Err` にはなりません。
    /// `Err` になるのはパイプライン自体を続けられない場合だけです。
    pub fn compile(&self, source: &str, file_name: &str) -> Result<Compilation> {
        info!("コンパイル開始: {}", file_name);
        let mut stats = CompilationStats {
            lines_processed: source.lines().count(),
            ..CompilationStats::default()
        };

        let started = Instant::now();
        let (mut unit, mut diagnostics) = self.parse(source, file_name);
        stats.phase_timings.insert(Phase::Parse, started.elapsed());
        let mut completed = Some(Phase::Parse);
        let mut classes = Vec::new();

        if self.config.stop_after >= Phase::Analyze {
            let started = Instant::now();
            let mut analyzer =
                Analyzer::new(&mut diagnostics).with_package_prefix(self.config.package_prefix_in_class_names);
            analyzer.analyze(&mut unit)?;
            let (registry, _) = analyzer.into_parts();
            stats.phase_timings.insert(Phase::Analyze, started.elapsed());
            completed = Some(Phase::Analyze);

            let blocked = diagnostics.has_errors()
                || (self.config.warnings_as_errors && diagnostics.warning_count() > 0);
            if self.config.stop_after >= Phase::Codegen {
                if blocked {
                    warn!(
                        "{}件のエラーがあるためコード生成を行いません",
                        diagnostics.error_count()
                    );
                } else {
                    let started = Instant::now();
                    let mut generator = CodeGenerator::new(ClassEmitter::new(), &registry);
                    match generator.generate(&unit) {
                        Ok(()) => {
                            classes = generator.into_emitter().finish();
                            completed = Some(Phase::Codegen);
                        }
                        Err(CompilerError::Unsupported { construct, line }) => {
                            diagnostics.error(
                                ErrorKind::Unsupported,
                                line,
                                format!("未実装の構文です: {}", construct),
                            );
                        }
                        Err(err) => return Err(err),
                    }
                    stats.phase_timings.insert(Phase::Codegen, started.elapsed());
                }
            }
        }

        stats.errors_count = diagnostics.error_count();
        stats.warnings_count = diagnostics.warning_count();
        debug!("フェーズ別所要時間: {:?}", stats.phase_timings);
        info!(
            "コンパイル完了: {} (エラー{}件, 警告{}件, クラス{}個)",
            file_name,
            stats.errors_count,
            stats.warnings_count,
            classes.len()
        );

        Ok(Compilation {
            unit,
            diagnostics,
            classes,
            completed,
            stats,
            warnings_as_errors: self.config.warnings_as_errors,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HELLO: &str = "public class Hello {\n    public static void main(String[] args) {\n        System.out.println(\"Hello\");\n    }\n}\n";

    #[test]
    fn test_compile_produces_runnable_class() {
        let compilation = Compiler::default().compile(HELLO, "Hello.java").unwrap();
        assert_eq!(compilation.completed, Some(Phase::Codegen));
        let classes = compilation.into_result().unwrap();
        let mut machine = Machine::new(&classes);
        machine.run_main("Hello").unwrap();
        assert_eq!(machine.output(), "Hello\n");
    }

    #[test]
    fn test_errors_prevent_code_generation() {
        let source = "public class Bad { public static void main(String[] args) { int x = true; } }";
        let compilation = Compiler::default().compile(source, "Bad.java").unwrap();
        assert!(compilation.diagnostics.has_errors());
        assert!(compilation.classes.is_empty());
        assert!(matches!(
            compilation.into_result(),
            Err(CompilerError::Aborted { errors }) if errors > 0
        ));
    }

    #[test]
    fn test_stop_after_parse_skips_analysis() {
        let config = CompilerConfig::default().with_stop_after(Phase::Parse);
        let compilation = Compiler::new(config).compile(HELLO, "Hello.java").unwrap();
        assert_eq!(compilation.completed, Some(Phase::Parse));
        assert_eq!(compilation.unit.state, ast::AnalysisState::Parsed);
        assert!(compilation.classes.is_empty());
    }

    #[test]
    fn test_warnings_as_errors_blocks_output() {
        let source = "public class W { ; public static void main(String[] args) { } }";
        let lenient = Compiler::default().compile(source, "W.java").unwrap();
        assert_eq!(lenient.diagnostics.warning_count(), 1);
        assert!(lenient.into_result().is_ok());

        let strict = Compiler::new(CompilerConfig::default().with_warnings_as_errors(true))
            .compile(source, "W.java")
            .unwrap();
        assert!(strict.classes.is_empty());
        assert!(matches!(strict.into_result(), Err(CompilerError::Aborted { .. })));
    }
}
