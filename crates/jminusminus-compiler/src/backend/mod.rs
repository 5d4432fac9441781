//! # j-- コンパイラバックエンド
//!
//! 解析済みの AST から JVM 風のクラス（[`ClassFile`]）を生成し、
//! それをスタックマシン（[`Machine`]）で実行します。
//!
//! コード生成は [`Emitter`] トレイトを通して命令を出力するので、
//! 出力先を差し替えても生成規則は変わりません。

pub mod codegen;
pub mod emitter;
pub mod machine;

pub use self::codegen::CodeGenerator;
pub use self::emitter::{access, ClassEmitter, ClassFile, Emitter, Instruction, Label, MethodInfo, Opcode};
pub use self::machine::{Machine, MachineError, Value};
