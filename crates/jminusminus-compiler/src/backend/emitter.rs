//! # 命令エミッタ
//!
//! コード生成器が命令・ラベル・例外表を書き込む先の抽象と、
//! それをメモリ上のクラスファイルとして記録する実装です。
//!
//! ラベルは出力全体で一意な番号を持ち、命令列の中に疑似命令として置かれます。

use std::collections::HashMap;
use std::fmt;

use serde::Serialize;

use crate::typesystem::{parse_method_descriptor, FieldRef, MethodRef, Type};

/// アクセスフラグ
pub mod access {
    pub const PUBLIC: u16 = 0x0001;
    pub const PRIVATE: u16 = 0x0002;
    pub const PROTECTED: u16 = 0x0004;
    pub const STATIC: u16 = 0x0008;
    pub const FINAL: u16 = 0x0010;
    pub const SUPER: u16 = 0x0020;
    pub const INTERFACE: u16 = 0x0200;
    pub const ABSTRACT: u16 = 0x0400;
}

/// 分岐先ラベル
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Label(usize);

impl Label {
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "L{}", self.0)
    }
}

/// 命令コード
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Opcode {
    Nop,
    AconstNull,
    // 算術
    IAdd,
    LAdd,
    FAdd,
    DAdd,
    ISub,
    LSub,
    FSub,
    DSub,
    IMul,
    LMul,
    FMul,
    DMul,
    IDiv,
    LDiv,
    FDiv,
    DDiv,
    IRem,
    LRem,
    FRem,
    DRem,
    INeg,
    LNeg,
    FNeg,
    DNeg,
    IShl,
    IShr,
    IUshr,
    IAnd,
    IOr,
    IXor,
    // 変換
    I2L,
    I2F,
    I2D,
    L2I,
    L2F,
    L2D,
    F2I,
    F2L,
    F2D,
    D2I,
    D2L,
    D2F,
    I2C,
    // 比較
    LCmp,
    FCmpl,
    FCmpg,
    DCmpl,
    DCmpg,
    // ローカル変数
    ILoad,
    LLoad,
    FLoad,
    DLoad,
    ALoad,
    IStore,
    LStore,
    FStore,
    DStore,
    AStore,
    // 配列
    IALoad,
    LALoad,
    FALoad,
    DALoad,
    AALoad,
    BALoad,
    CALoad,
    IAStore,
    LAStore,
    FAStore,
    DAStore,
    AAStore,
    BAStore,
    CAStore,
    ArrayLength,
    NewArray,
    ANewArray,
    MultiANewArray,
    // スタック操作
    Pop,
    Pop2,
    Dup,
    DupX1,
    DupX2,
    Dup2,
    Dup2X1,
    Dup2X2,
    Swap,
    // 分岐
    IfEq,
    IfNe,
    IfLt,
    IfGe,
    IfGt,
    IfLe,
    IfICmpEq,
    IfICmpNe,
    IfICmpLt,
    IfICmpGe,
    IfICmpGt,
    IfICmpLe,
    IfACmpEq,
    IfACmpNe,
    IfNull,
    IfNonNull,
    Goto,
    // 復帰と例外
    IReturn,
    LReturn,
    FReturn,
    DReturn,
    AReturn,
    Return,
    AThrow,
    // オブジェクト
    New,
    CheckCast,
    InstanceOf,
    GetField,
    PutField,
    GetStatic,
    PutStatic,
    InvokeVirtual,
    InvokeSpecial,
    InvokeStatic,
    InvokeInterface,
    Ldc,
}

impl Opcode {
    /// 表示用の名前（小文字）
    pub fn mnemonic(&self) -> String {
        format!("{:?}", self).to_lowercase()
    }

    pub fn is_branch(&self) -> bool {
        matches!(
            self,
            Opcode::IfEq
                | Opcode::IfNe
                | Opcode::IfLt
                | Opcode::IfGe
                | Opcode::IfGt
                | Opcode::IfLe
                | Opcode::IfICmpEq
                | Opcode::IfICmpNe
                | Opcode::IfICmpLt
                | Opcode::IfICmpGe
                | Opcode::IfICmpGt
                | Opcode::IfICmpLe
                | Opcode::IfACmpEq
                | Opcode::IfACmpNe
                | Opcode::IfNull
                | Opcode::IfNonNull
                | Opcode::Goto
        )
    }

    /// 条件を反転した分岐命令
    pub fn negated(&self) -> Option<Opcode> {
        let op = match self {
            Opcode::IfEq => Opcode::IfNe,
            Opcode::IfNe => Opcode::IfEq,
            Opcode::IfLt => Opcode::IfGe,
            Opcode::IfGe => Opcode::IfLt,
            Opcode::IfGt => Opcode::IfLe,
            Opcode::IfLe => Opcode::IfGt,
            Opcode::IfICmpEq => Opcode::IfICmpNe,
            Opcode::IfICmpNe => Opcode::IfICmpEq,
            Opcode::IfICmpLt => Opcode::IfICmpGe,
            Opcode::IfICmpGe => Opcode::IfICmpLt,
            Opcode::IfICmpGt => Opcode::IfICmpLe,
            Opcode::IfICmpLe => Opcode::IfICmpGt,
            Opcode::IfACmpEq => Opcode::IfACmpNe,
            Opcode::IfACmpNe => Opcode::IfACmpEq,
            Opcode::IfNull => Opcode::IfNonNull,
            Opcode::IfNonNull => Opcode::IfNull,
            _ => return None,
        };
        Some(op)
    }
}

/// 定数プールに置かれる定数
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Constant {
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
}

impl fmt::Display for Constant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constant::Int(v) => write!(f, "{}", v),
            Constant::Long(v) => write!(f, "{}L", v),
            Constant::Float(v) => write!(f, "{}F", v),
            Constant::Double(v) => write!(f, "{}D", v),
            Constant::String(v) => write!(f, "{:?}", v),
        }
    }
}

/// 命令
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Instruction {
    /// オペランドなし
    Simple(Opcode),
    /// ローカル変数のスロットをとる命令
    Local(Opcode, usize),
    /// ローカル int 変数への加算
    Iinc(usize, i32),
    /// 定数のプッシュ
    Constant(Constant),
    /// 分岐
    Branch(Opcode, Label),
    /// フィールド操作
    Field(Opcode, FieldRef),
    /// メソッド呼び出し
    Invoke(Opcode, MethodRef),
    /// 型をとる命令（NEW, CHECKCAST, INSTANCEOF, ANEWARRAY）。内部名か配列記述子。
    Type(Opcode, String),
    /// プリミティブ型の配列生成
    NewArray(Type),
    /// 多次元配列の生成（配列記述子、次元数）
    MultiNewArray(String, usize),
    /// ラベルの位置
    Label(Label),
}

impl Instruction {
    pub fn opcode(&self) -> Option<Opcode> {
        match self {
            Instruction::Simple(op)
            | Instruction::Local(op, _)
            | Instruction::Branch(op, _)
            | Instruction::Field(op, _)
            | Instruction::Invoke(op, _)
            | Instruction::Type(op, _) => Some(*op),
            Instruction::Iinc(..) => None,
            Instruction::Constant(_) => Some(Opcode::Ldc),
            Instruction::NewArray(_) => Some(Opcode::NewArray),
            Instruction::MultiNewArray(..) => Some(Opcode::MultiANewArray),
            Instruction::Label(_) => None,
        }
    }

    /// この命令が書き込むローカル変数領域の上端
    fn local_extent(&self) -> usize {
        match self {
            Instruction::Local(Opcode::LLoad | Opcode::DLoad | Opcode::LStore | Opcode::DStore, slot) => slot + 2,
            Instruction::Local(_, slot) | Instruction::Iinc(slot, _) => slot + 1,
            _ => 0,
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Simple(op) => write!(f, "{}", op.mnemonic()),
            Instruction::Local(op, slot) => write!(f, "{} {}", op.mnemonic(), slot),
            Instruction::Iinc(slot, delta) => write!(f, "iinc {} {}", slot, delta),
            Instruction::Constant(c) => write!(f, "ldc {}", c),
            Instruction::Branch(op, label) => write!(f, "{} {}", op.mnemonic(), label),
            Instruction::Field(op, field) => {
                write!(f, "{} {}.{} {}", op.mnemonic(), field.owner, field.name, field.ty.descriptor())
            }
            Instruction::Invoke(op, method) => {
                write!(f, "{} {}.{}{}", op.mnemonic(), method.owner, method.name, method.descriptor)
            }
            Instruction::Type(op, name) => write!(f, "{} {}", op.mnemonic(), name),
            Instruction::NewArray(ty) => write!(f, "newarray {}", ty),
            Instruction::MultiNewArray(descriptor, dims) => write!(f, "multianewarray {} {}", descriptor, dims),
            Instruction::Label(label) => write!(f, "{}:", label),
        }
    }
}

/// 例外表のエントリ。`catch_type` が `None` なら全例外を捕捉する（finally 用）。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExceptionHandler {
    pub start: Label,
    pub end: Label,
    pub handler: Label,
    pub catch_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldInfo {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodInfo {
    pub access: u16,
    pub name: String,
    pub descriptor: String,
    pub exceptions: Vec<String>,
    pub code: Vec<Instruction>,
    pub handlers: Vec<ExceptionHandler>,
    pub max_locals: usize,
}

impl MethodInfo {
    pub fn is_static(&self) -> bool {
        self.access & access::STATIC != 0
    }

    pub fn is_abstract(&self) -> bool {
        self.access & access::ABSTRACT != 0
    }

    /// ラベルから命令位置への表
    pub fn label_positions(&self) -> HashMap<Label, usize> {
        self.code
            .iter()
            .enumerate()
            .filter_map(|(pc, instruction)| match instruction {
                Instruction::Label(label) => Some((*label, pc)),
                _ => None,
            })
            .collect()
    }
}

/// 生成されたクラス
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassFile {
    pub access: u16,
    /// 内部名
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub fields: Vec<FieldInfo>,
    pub methods: Vec<MethodInfo>,
}

impl ClassFile {
    pub fn is_interface(&self) -> bool {
        self.access & access::INTERFACE != 0
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodInfo> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor == descriptor)
    }

    /// 人が読むための命令一覧
    pub fn listing(&self) -> String {
        let mut out = String::new();
        let kind = if self.is_interface() { "interface" } else { "class" };
        out.push_str(&format!("{} {}", kind, self.name));
        if let Some(super_name) = &self.super_name {
            out.push_str(&format!(" extends {}", super_name));
        }
        if !self.interfaces.is_empty() {
            out.push_str(&format!(" implements {}", self.interfaces.join(", ")));
        }
        out.push('\n');
        for field in &self.fields {
            out.push_str(&format!("  field {} {}\n", field.name, field.descriptor));
        }
        for method in &self.methods {
            out.push_str(&format!(
                "  method {}{} (locals={})\n",
                method.name, method.descriptor, method.max_locals
            ));
            for instruction in &method.code {
                match instruction {
                    Instruction::Label(_) => out.push_str(&format!("   {}\n", instruction)),
                    _ => out.push_str(&format!("      {}\n", instruction)),
                }
            }
            for handler in &method.handlers {
                out.push_str(&format!(
                    "    catch {} [{}, {}) -> {}\n",
                    handler.catch_type.as_deref().unwrap_or("any"),
                    handler.start,
                    handler.end,
                    handler.handler
                ));
            }
        }
        out
    }
}

/// コード生成器が使う出力先
pub trait Emitter {
    /// 型の出力を始める
    fn begin_class(&mut self, access: u16, name: &str, super_name: Option<&str>, interfaces: &[String]);

    /// 型の出力を終える
    fn end_class(&mut self);

    fn add_field(&mut self, access: u16, name: &str, descriptor: &str);

    /// メソッドの出力を始める。以降の命令はこのメソッドに入る。
    fn begin_method(&mut self, access: u16, name: &str, descriptor: &str, exceptions: &[String]);

    fn end_method(&mut self);

    fn emit(&mut self, instruction: Instruction);

    /// 出力全体で一意な新しいラベル
    fn new_label(&mut self) -> Label;

    /// ラベルを現在位置に置く
    fn place_label(&mut self, label: Label) {
        self.emit(Instruction::Label(label));
    }

    fn add_exception_handler(&mut self, start: Label, end: Label, handler: Label, catch_type: Option<&str>);

    /// オペランドなしの命令
    fn emit_simple(&mut self, opcode: Opcode) {
        self.emit(Instruction::Simple(opcode));
    }

    /// スロットを一つとる命令
    fn emit_local(&mut self, opcode: Opcode, slot: usize) {
        self.emit(Instruction::Local(opcode, slot));
    }

    fn emit_branch(&mut self, opcode: Opcode, label: Label) {
        self.emit(Instruction::Branch(opcode, label));
    }

    /// 直前に出力した命令
    fn last_instruction(&self) -> Option<&Instruction>;
}

/// クラスをメモリ上に記録するエミッタ
#[derive(Debug, Default)]
pub struct ClassEmitter {
    classes: Vec<ClassFile>,
    current: Option<ClassFile>,
    method: Option<MethodInfo>,
    next_label: usize,
}

impl ClassEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    /// 出力済みのクラス
    pub fn classes(&self) -> &[ClassFile] {
        &self.classes
    }

    pub fn finish(mut self) -> Vec<ClassFile> {
        self.end_class();
        self.classes
    }

    pub fn label_count(&self) -> usize {
        self.next_label
    }
}

impl Emitter for ClassEmitter {
    fn begin_class(&mut self, access: u16, name: &str, super_name: Option<&str>, interfaces: &[String]) {
        self.end_class();
        self.current = Some(ClassFile {
            access,
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: interfaces.to_vec(),
            fields: Vec::new(),
            methods: Vec::new(),
        });
    }

    fn end_class(&mut self) {
        self.end_method();
        if let Some(class) = self.current.take() {
            self.classes.push(class);
        }
    }

    fn add_field(&mut self, access: u16, name: &str, descriptor: &str) {
        if let Some(class) = self.current.as_mut() {
            class.fields.push(FieldInfo {
                access,
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            });
        }
    }

    fn begin_method(&mut self, flags: u16, name: &str, descriptor: &str, exceptions: &[String]) {
        self.end_method();
        let receiver = usize::from(flags & access::STATIC == 0);
        let parameter_slots = parse_method_descriptor(descriptor)
            .map(|(params, _)| params.iter().map(Type::slot_size).sum::<usize>())
            .unwrap_or(0);
        self.method = Some(MethodInfo {
            access: flags,
            name: name.to_string(),
            descriptor: descriptor.to_string(),
            exceptions: exceptions.to_vec(),
            code: Vec::new(),
            handlers: Vec::new(),
            max_locals: receiver + parameter_slots,
        });
    }

    fn end_method(&mut self) {
        if let Some(method) = self.method.take() {
            if let Some(class) = self.current.as_mut() {
                class.methods.push(method);
            }
        }
    }

    fn emit(&mut self, instruction: Instruction) {
        if let Some(method) = self.method.as_mut() {
            method.max_locals = method.max_locals.max(instruction.local_extent());
            method.code.push(instruction);
        }
    }

    fn new_label(&mut self) -> Label {
        let label = Label(self.next_label);
        self.next_label += 1;
        label
    }

    fn add_exception_handler(&mut self, start: Label, end: Label, handler: Label, catch_type: Option<&str>) {
        if let Some(method) = self.method.as_mut() {
            method.handlers.push(ExceptionHandler {
                start,
                end,
                handler,
                catch_type: catch_type.map(str::to_string),
            });
        }
    }

    fn last_instruction(&self) -> Option<&Instruction> {
        self.method.as_ref().and_then(|m| m.code.last())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_unique_across_classes() {
        let mut emitter = ClassEmitter::new();
        emitter.begin_class(access::PUBLIC, "A", Some("java/lang/Object"), &[]);
        let a = emitter.new_label();
        emitter.begin_class(access::PUBLIC, "B", Some("java/lang/Object"), &[]);
        let b = emitter.new_label();
        assert_ne!(a, b);
        assert_eq!(emitter.finish().len(), 2);
    }

    #[test]
    fn test_max_locals_tracks_wide_slots() {
        let mut emitter = ClassEmitter::new();
        emitter.begin_class(access::PUBLIC, "A", None, &[]);
        emitter.begin_method(access::STATIC, "f", "(I)V", &[]);
        emitter.emit_local(Opcode::DStore, 3);
        emitter.emit_simple(Opcode::Return);
        let classes = emitter.finish();
        let method = &classes[0].methods[0];
        assert_eq!(method.max_locals, 5);
        assert_eq!(method.code.len(), 2);
    }

    #[test]
    fn test_instance_method_reserves_receiver() {
        let mut emitter = ClassEmitter::new();
        emitter.begin_class(access::PUBLIC, "A", None, &[]);
        emitter.begin_method(access::PUBLIC, "f", "(JI)V", &[]);
        emitter.end_method();
        let classes = emitter.finish();
        assert_eq!(classes[0].methods[0].max_locals, 4);
    }

    #[test]
    fn test_negated_branches() {
        assert_eq!(Opcode::IfICmpLt.negated(), Some(Opcode::IfICmpGe));
        assert_eq!(Opcode::IfNull.negated(), Some(Opcode::IfNonNull));
        assert_eq!(Opcode::Goto.negated(), None);
    }
}
