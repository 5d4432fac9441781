//! # スタックマシン
//!
//! [`ClassEmitter`](super::emitter::ClassEmitter) が出力したクラスを読み込み、命令を解釈実行します。
//! 生成コードの振る舞いをテストで確かめるためのもので、組み込みライブラリクラスは
//! ネイティブ実装で置き換えています。
//!
//! 値は一スロットに一つずつ積みます。long/double もスタック上では一要素ですが、
//! `dup2`・`pop2` などは型の大きさ（カテゴリ）に従って振る舞います。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::Rc;

use log::{debug, trace};
use thiserror::Error;

use crate::typesystem::{ClassRegistry, Invocation, MethodRef, Type, OBJECT, STRING, STRING_BUILDER, THROWABLE};

use super::emitter::{access, ClassFile, Constant, Instruction, Label, MethodInfo, Opcode};

const PRINT_STREAM: &str = "java/io/PrintStream";
const DEFAULT_STEP_LIMIT: u64 = 10_000_000;
const MAX_CALL_DEPTH: usize = 512;

/// 実行時エラー
#[derive(Debug, Clone, Error, PartialEq)]
pub enum MachineError {
    #[error("捕捉されない例外: {class}{}", message.as_ref().map(|m| format!(": {}", m)).unwrap_or_default())]
    UncaughtException { class: String, message: Option<String> },

    #[error("クラス '{0}' が見つかりません")]
    ClassNotFound(String),

    #[error("メソッド '{class}.{name}{descriptor}' が見つかりません")]
    MethodNotFound {
        class: String,
        name: String,
        descriptor: String,
    },

    #[error("フィールド '{class}.{name}' が見つかりません")]
    FieldNotFound { class: String, name: String },

    #[error("オペランドスタックが空です")]
    StackUnderflow,

    #[error("型の不一致: {0}")]
    TypeMismatch(String),

    #[error("ラベル {0} が見つかりません")]
    LabelNotFound(Label),

    #[error("メソッド '{0}' が return せずに終了しました")]
    FellOffEnd(String),

    #[error("実行ステップ数が上限 {0} を超えました")]
    StepLimit(u64),

    #[error("呼び出しの深さが上限 {0} を超えました")]
    StackOverflow(usize),
}

/// スタックとローカル変数に置かれる値
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// int・char・boolean
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Null,
    /// ヒープ上のオブジェクト
    Ref(usize),
}

impl Value {
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(v) => Some(*v),
            _ => None,
        }
    }

    /// long・double か
    fn is_wide(&self) -> bool {
        matches!(self, Value::Long(_) | Value::Double(_))
    }

    fn default_for(ty: &Type) -> Value {
        match ty {
            Type::Int | Type::Char | Type::Boolean => Value::Int(0),
            Type::Long => Value::Long(0),
            Type::Float => Value::Float(0.0),
            Type::Double => Value::Double(0.0),
            _ => Value::Null,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(v) => write!(f, "{}", v),
            Value::Long(v) => write!(f, "{}L", v),
            Value::Float(v) => write!(f, "{}F", v),
            Value::Double(v) => write!(f, "{}D", v),
            Value::Null => write!(f, "null"),
            Value::Ref(r) => write!(f, "#{}", r),
        }
    }
}

/// ヒープ上のオブジェクト
#[derive(Debug, Clone, PartialEq)]
enum Object {
    /// 一般のインスタンス。フィールドは `宣言クラス.名前` で引く。
    Instance {
        class: String,
        fields: HashMap<String, Value>,
        /// Throwable の詳細メッセージ
        message: Option<String>,
    },
    Array { element: Type, values: Vec<Value> },
    Str(String),
    Builder(String),
    PrintStream,
}

/// 実行の巻き戻し理由
enum Unwind {
    /// 実行中の例外（ヒープ上の Throwable）
    Exception(usize),
    Error(MachineError),
}

impl From<MachineError> for Unwind {
    fn from(err: MachineError) -> Self {
        Unwind::Error(err)
    }
}

type Exec<T> = std::result::Result<T, Unwind>;

/// 読み込み済みメソッド
#[derive(Debug)]
struct LoadedMethod {
    owner: String,
    info: MethodInfo,
    labels: HashMap<Label, usize>,
}

impl LoadedMethod {
    fn position(&self, label: Label) -> Result<usize, MachineError> {
        self.labels
            .get(&label)
            .copied()
            .ok_or(MachineError::LabelNotFound(label))
    }
}

#[derive(Debug)]
struct LoadedClass {
    file: ClassFile,
    methods: Vec<Rc<LoadedMethod>>,
}

struct Frame {
    locals: Vec<Value>,
    stack: Vec<Value>,
}

impl Frame {
    fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    fn pop(&mut self) -> Result<Value, MachineError> {
        self.stack.pop().ok_or(MachineError::StackUnderflow)
    }

    fn pop_int(&mut self) -> Result<i32, MachineError> {
        match self.pop()? {
            Value::Int(v) => Ok(v),
            other => Err(MachineError::TypeMismatch(format!("int が必要ですが {} でした", other))),
        }
    }

    fn pop_long(&mut self) -> Result<i64, MachineError> {
        match self.pop()? {
            Value::Long(v) => Ok(v),
            other => Err(MachineError::TypeMismatch(format!("long が必要ですが {} でした", other))),
        }
    }

    fn pop_float(&mut self) -> Result<f32, MachineError> {
        match self.pop()? {
            Value::Float(v) => Ok(v),
            other => Err(MachineError::TypeMismatch(format!("float が必要ですが {} でした", other))),
        }
    }

    fn pop_double(&mut self) -> Result<f64, MachineError> {
        match self.pop()? {
            Value::Double(v) => Ok(v),
            other => Err(MachineError::TypeMismatch(format!("double が必要ですが {} でした", other))),
        }
    }

    fn load(&self, slot: usize) -> Result<Value, MachineError> {
        self.locals
            .get(slot)
            .copied()
            .ok_or_else(|| MachineError::TypeMismatch(format!("ローカル変数 {} は範囲外です", slot)))
    }

    fn store(&mut self, slot: usize, value: Value) {
        if slot >= self.locals.len() {
            self.locals.resize(slot + 1, Value::Null);
        }
        self.locals[slot] = value;
    }
}

/// クラスを実行するスタックマシン
pub struct Machine {
    classes: HashMap<String, LoadedClass>,
    builtins: ClassRegistry,
    heap: Vec<Object>,
    statics: HashMap<(String, String), Value>,
    initialized: HashSet<String>,
    interned: HashMap<String, usize>,
    out: usize,
    output: String,
    steps: u64,
    step_limit: u64,
    depth: usize,
}

impl Machine {
    pub fn new(classes: &[ClassFile]) -> Self {
        let loaded = classes
            .iter()
            .map(|file| {
                let methods = file
                    .methods
                    .iter()
                    .map(|info| {
                        Rc::new(LoadedMethod {
                            owner: file.name.clone(),
                            labels: info.label_positions(),
                            info: info.clone(),
                        })
                    })
                    .collect();
                (
                    file.name.clone(),
                    LoadedClass {
                        file: file.clone(),
                        methods,
                    },
                )
            })
            .collect();
        debug!("{} 個のクラスを読み込みました", classes.len());
        Self {
            classes: loaded,
            builtins: ClassRegistry::with_builtins(),
            heap: vec![Object::PrintStream],
            statics: HashMap::new(),
            initialized: HashSet::new(),
            interned: HashMap::new(),
            out: 0,
            output: String::new(),
            steps: 0,
            step_limit: DEFAULT_STEP_LIMIT,
            depth: 0,
        }
    }

    pub fn with_step_limit(mut self, limit: u64) -> Self {
        self.step_limit = limit;
        self
    }

    /// `System.out` に書かれたテキスト
    pub fn output(&self) -> &str {
        &self.output
    }

    pub fn take_output(&mut self) -> String {
        std::mem::take(&mut self.output)
    }

    /// 参照が文字列オブジェクトならその内容
    pub fn string_value(&self, value: &Value) -> Option<&str> {
        match value {
            Value::Ref(r) => match self.heap.get(*r)? {
                Object::Str(s) => Some(s),
                _ => None,
            },
            _ => None,
        }
    }

    /// 参照が配列ならその要素
    pub fn array_values(&self, value: &Value) -> Option<&[Value]> {
        match value {
            Value::Ref(r) => match self.heap.get(*r)? {
                Object::Array { values, .. } => Some(values),
                _ => None,
            },
            _ => None,
        }
    }

    /// 文字列を生成して参照を返す
    pub fn new_string(&mut self, text: &str) -> Value {
        Value::Ref(self.allocate(Object::Str(text.to_string())))
    }

    /// static メソッドを呼び出す
    pub fn invoke_static(&mut self, class: &str, name: &str, descriptor: &str, args: Vec<Value>) -> Result<Option<Value>, MachineError> {
        let result = self.ensure_initialized(class).and_then(|()| {
            let method = self.find_declared(class, name, descriptor)?;
            self.execute(method, args)
        });
        self.finish(result)
    }

    /// `public static void main(String[])` を実行する
    pub fn run_main(&mut self, class: &str) -> Result<(), MachineError> {
        let args = self.allocate(Object::Array {
            element: Type::string(),
            values: Vec::new(),
        });
        self.invoke_static(class, "main", "([Ljava/lang/String;)V", vec![Value::Ref(args)])
            .map(|_| ())
    }

    fn finish<T>(&mut self, result: Exec<T>) -> Result<T, MachineError> {
        match result {
            Ok(value) => Ok(value),
            Err(Unwind::Error(err)) => Err(err),
            Err(Unwind::Exception(exception)) => {
                let (class, message) = match self.heap.get(exception) {
                    Some(Object::Instance { class, message, .. }) => (class.replace('/', "."), message.clone()),
                    _ => (THROWABLE.replace('/', "."), None),
                };
                Err(MachineError::UncaughtException { class, message })
            }
        }
    }

    fn allocate(&mut self, object: Object) -> usize {
        self.heap.push(object);
        self.heap.len() - 1
    }

    fn object(&self, reference: usize) -> Result<&Object, MachineError> {
        self.heap
            .get(reference)
            .ok_or_else(|| MachineError::TypeMismatch(format!("不正な参照 #{}", reference)))
    }

    fn object_mut(&mut self, reference: usize) -> Result<&mut Object, MachineError> {
        self.heap
            .get_mut(reference)
            .ok_or_else(|| MachineError::TypeMismatch(format!("不正な参照 #{}", reference)))
    }

    /// 組み込みの実行時例外を生成して投げる
    fn throw<T>(&mut self, class: &str, message: Option<String>) -> Exec<T> {
        trace!("実行時例外: {} {:?}", class, message);
        let exception = self.allocate(Object::Instance {
            class: class.to_string(),
            fields: HashMap::new(),
            message,
        });
        Err(Unwind::Exception(exception))
    }

    fn class_of(&self, reference: usize) -> Result<String, MachineError> {
        Ok(match self.object(reference)? {
            Object::Instance { class, .. } => class.clone(),
            Object::Array { element, .. } => Type::array_of(element.clone()).descriptor(),
            Object::Str(_) => STRING.to_string(),
            Object::Builder(_) => STRING_BUILDER.to_string(),
            Object::PrintStream => PRINT_STREAM.to_string(),
        })
    }

    /// `class` が `target`（クラスまたはインターフェース）の派生型か
    fn is_subclass(&self, class: &str, target: &str) -> bool {
        if class == target || target == OBJECT {
            return true;
        }
        match self.classes.get(class) {
            Some(loaded) => {
                loaded.file.interfaces.iter().any(|i| self.is_subclass(i, target))
                    || loaded
                        .file
                        .super_name
                        .as_deref()
                        .map_or(false, |s| self.is_subclass(s, target))
            }
            None => self.builtins.is_subclass(class, target),
        }
    }

    fn is_instance(&self, reference: usize, target: &str) -> Result<bool, MachineError> {
        if target == OBJECT {
            return Ok(true);
        }
        if let Object::Array { element, .. } = self.object(reference)? {
            let Some(Type::Array(wanted)) = Type::from_descriptor(target) else {
                return Ok(false);
            };
            return Ok(match (element, wanted.as_ref()) {
                (a, b) if a == b => true,
                (Type::Reference(a), Type::Reference(b)) => self.is_subclass(a, b),
                (a, Type::Reference(b)) => a.is_reference() && b == OBJECT,
                _ => false,
            });
        }
        let class = self.class_of(reference)?;
        Ok(self.is_subclass(&class, target))
    }

    /// static 初期化子を一度だけ実行する
    fn ensure_initialized(&mut self, class: &str) -> Exec<()> {
        if self.initialized.contains(class) || !self.classes.contains_key(class) {
            return Ok(());
        }
        self.initialized.insert(class.to_string());
        let (super_name, fields) = match self.classes.get(class) {
            Some(loaded) => (loaded.file.super_name.clone(), loaded.file.fields.clone()),
            None => return Ok(()),
        };
        if let Some(super_name) = super_name {
            self.ensure_initialized(&super_name)?;
        }
        for field in fields.iter().filter(|f| f.access & access::STATIC != 0) {
            let ty = Type::from_descriptor(&field.descriptor).unwrap_or(Type::Any);
            self.statics
                .insert((class.to_string(), field.name.clone()), Value::default_for(&ty));
        }
        if let Ok(clinit) = self.find_declared(class, "<clinit>", "()V") {
            debug!("static 初期化: {}", class);
            self.execute(clinit, Vec::new())?;
        }
        Ok(())
    }

    /// クラス自身に宣言されたメソッド
    fn find_declared(&self, class: &str, name: &str, descriptor: &str) -> Result<Rc<LoadedMethod>, MachineError> {
        let loaded = self
            .classes
            .get(class)
            .ok_or_else(|| MachineError::ClassNotFound(class.to_string()))?;
        loaded
            .methods
            .iter()
            .find(|m| m.info.name == name && m.info.descriptor == descriptor && !m.info.is_abstract())
            .cloned()
            .ok_or_else(|| MachineError::MethodNotFound {
                class: class.to_string(),
                name: name.to_string(),
                descriptor: descriptor.to_string(),
            })
    }

    /// `start` から祖先へ実装を探す。組み込みクラスに達したらその名前を返す。
    fn resolve(&self, start: &str, name: &str, descriptor: &str) -> Result<Target, MachineError> {
        let mut current = start.to_string();
        loop {
            let Some(loaded) = self.classes.get(&current) else {
                return Ok(Target::Native(current));
            };
            if let Ok(method) = self.find_declared(&current, name, descriptor) {
                return Ok(Target::Compiled(method));
            }
            match &loaded.file.super_name {
                Some(super_name) => current = super_name.clone(),
                None => {
                    return Err(MachineError::MethodNotFound {
                        class: start.to_string(),
                        name: name.to_string(),
                        descriptor: descriptor.to_string(),
                    })
                }
            }
        }
    }

    fn invoke(&mut self, frame: &mut Frame, opcode: Opcode, method: &MethodRef) -> Exec<()> {
        let mut args = Vec::with_capacity(method.params.len() + 1);
        for _ in 0..method.params.len() {
            args.push(frame.pop()?);
        }
        args.reverse();

        let result = if opcode == Opcode::InvokeStatic {
            self.ensure_initialized(&method.owner)?;
            match self.resolve(&method.owner, &method.name, &method.descriptor)? {
                Target::Compiled(target) => self.execute(target, args)?,
                Target::Native(_) => self.call_static_native(method, &args)?,
            }
        } else {
            let receiver = match frame.pop()? {
                Value::Ref(r) => r,
                Value::Null => return self.throw("java/lang/NullPointerException", None),
                other => return Err(MachineError::TypeMismatch(format!("参照が必要ですが {} でした", other)).into()),
            };
            let start = if opcode == Opcode::InvokeSpecial {
                method.owner.clone()
            } else {
                match self.object(receiver)? {
                    Object::Array { .. } => OBJECT.to_string(),
                    _ => self.class_of(receiver)?,
                }
            };
            match self.resolve(&start, &method.name, &method.descriptor)? {
                Target::Compiled(target) => {
                    args.insert(0, Value::Ref(receiver));
                    self.execute(target, args)?
                }
                Target::Native(owner) => self.call_native(&owner, receiver, method, &args)?,
            }
        };
        if let Some(value) = result {
            frame.push(value);
        }
        Ok(())
    }

    // ---- 組み込みクラス ----

    fn call_static_native(&mut self, method: &MethodRef, args: &[Value]) -> Exec<Option<Value>> {
        let int_arg = |i: usize| match args.get(i) {
            Some(Value::Int(v)) => Ok(*v),
            _ => Err(MachineError::TypeMismatch(format!("{} の引数 {} は int ではありません", method.name, i))),
        };
        let value = match (method.owner.as_str(), method.name.as_str(), method.descriptor.as_str()) {
            (STRING, "valueOf", "(I)Ljava/lang/String;") | ("java/lang/Integer", "toString", _) => {
                let text = int_arg(0)?.to_string();
                self.new_string(&text)
            }
            (STRING, "valueOf", _) => {
                let value = args.first().copied().unwrap_or(Value::Null);
                let text = self.display(value, &Type::object())?;
                self.new_string(&text)
            }
            ("java/lang/Integer", "parseInt", _) => {
                let text = args
                    .first()
                    .and_then(|v| self.string_value(v))
                    .map(str::to_string);
                match text.as_deref().map(str::trim).map(str::parse::<i32>) {
                    Some(Ok(v)) => Value::Int(v),
                    Some(Err(_)) => {
                        let message = text.map(|t| format!("For input string: \"{}\"", t));
                        return self.throw("java/lang/IllegalArgumentException", message);
                    }
                    None => return self.throw("java/lang/NullPointerException", None),
                }
            }
            ("java/lang/Math", "abs", _) => Value::Int(int_arg(0)?.wrapping_abs()),
            ("java/lang/Math", "max", _) => Value::Int(int_arg(0)?.max(int_arg(1)?)),
            ("java/lang/Math", "min", _) => Value::Int(int_arg(0)?.min(int_arg(1)?)),
            _ => {
                return Err(MachineError::MethodNotFound {
                    class: method.owner.clone(),
                    name: method.name.clone(),
                    descriptor: method.descriptor.clone(),
                }
                .into())
            }
        };
        Ok(Some(value))
    }

    fn call_native(&mut self, owner: &str, receiver: usize, method: &MethodRef, args: &[Value]) -> Exec<Option<Value>> {
        let param = method.params.first().cloned().unwrap_or(Type::Void);
        let arg = args.first().copied().unwrap_or(Value::Null);
        let name = method.name.as_str();

        if name == "<init>" {
            let text = match arg {
                Value::Ref(_) => self.string_value(&arg).map(str::to_string),
                _ => None,
            };
            match self.object_mut(receiver)? {
                Object::Builder(content) => *content = text.unwrap_or_default(),
                Object::Instance { message, .. } => {
                    if method.params.len() == 1 {
                        *message = text;
                    }
                }
                _ => {}
            }
            return Ok(None);
        }

        let object = self.object(receiver)?.clone();
        let result = match (&object, name) {
            (Object::PrintStream, "print" | "println") => {
                let text = if args.is_empty() {
                    String::new()
                } else {
                    self.display(arg, &param)?
                };
                self.output.push_str(&text);
                if name == "println" {
                    self.output.push('\n');
                }
                None
            }
            (Object::Builder(content), "append") => {
                let text = self.display(arg, &param)?;
                let appended = format!("{}{}", content, text);
                *self.object_mut(receiver)? = Object::Builder(appended);
                Some(Value::Ref(receiver))
            }
            (Object::Builder(content), "toString") => Some(self.new_string(&content.clone())),
            (Object::Builder(content), "length") => Some(Value::Int(content.chars().count() as i32)),
            (Object::Str(s), "length") => Some(Value::Int(s.chars().count() as i32)),
            (Object::Str(s), "isEmpty") => Some(Value::Int(i32::from(s.is_empty()))),
            (Object::Str(_), "toString") => Some(Value::Ref(receiver)),
            (Object::Str(s), "charAt") => {
                let index = arg.as_int().unwrap_or(-1);
                match usize::try_from(index).ok().and_then(|i| s.chars().nth(i)) {
                    Some(c) => Some(Value::Int(c as i32)),
                    None => {
                        let message = Some(format!("Index {} out of bounds for length {}", index, s.chars().count()));
                        return self.throw("java/lang/ArrayIndexOutOfBoundsException", message);
                    }
                }
            }
            (Object::Str(s), "equals") => {
                let equal = self.string_value(&arg).map_or(false, |other| other == s);
                Some(Value::Int(i32::from(equal)))
            }
            (Object::Str(s), "concat") => {
                let Some(other) = self.string_value(&arg).map(str::to_string) else {
                    return self.throw("java/lang/NullPointerException", None);
                };
                Some(self.new_string(&format!("{}{}", s, other)))
            }
            (Object::Str(s), "substring") => {
                let begin = args.first().and_then(Value::as_int).unwrap_or(-1);
                let end = args.get(1).and_then(Value::as_int).unwrap_or(-1);
                let chars: Vec<char> = s.chars().collect();
                if begin < 0 || end < begin || end as usize > chars.len() {
                    let message = Some(format!("begin {}, end {}, length {}", begin, end, chars.len()));
                    return self.throw("java/lang/ArrayIndexOutOfBoundsException", message);
                }
                let text: String = chars[begin as usize..end as usize].iter().collect();
                Some(self.new_string(&text))
            }
            (Object::Str(s), "hashCode") => {
                let hash = s
                    .chars()
                    .fold(0i32, |h, c| h.wrapping_mul(31).wrapping_add(c as i32));
                Some(Value::Int(hash))
            }
            (Object::Instance { message, .. }, "getMessage") => {
                let message = message.clone();
                Some(match message {
                    Some(m) => self.new_string(&m),
                    None => Value::Null,
                })
            }
            (_, "toString") => {
                let text = self.default_to_string(receiver)?;
                Some(self.new_string(&text))
            }
            (_, "equals") => Some(Value::Int(i32::from(arg == Value::Ref(receiver)))),
            (_, "hashCode") => Some(Value::Int(receiver as i32)),
            _ => {
                return Err(MachineError::MethodNotFound {
                    class: owner.to_string(),
                    name: method.name.clone(),
                    descriptor: method.descriptor.clone(),
                }
                .into())
            }
        };
        Ok(result)
    }

    /// `Object.toString` と `Throwable.toString` の既定の表現
    fn default_to_string(&self, receiver: usize) -> Result<String, MachineError> {
        let class = self.class_of(receiver)?;
        let dotted = class.replace('/', ".");
        if let Object::Instance { message, .. } = self.object(receiver)? {
            if self.is_subclass(&class, THROWABLE) {
                return Ok(match message {
                    Some(m) => format!("{}: {}", dotted, m),
                    None => dotted,
                });
            }
        }
        Ok(format!("{}@{:x}", dotted, receiver))
    }

    /// print や文字列連結での値の表現。参照は toString() を呼ぶ。
    fn display(&mut self, value: Value, ty: &Type) -> Exec<String> {
        Ok(match (value, ty) {
            (Value::Int(v), Type::Char) => char::from_u32(v as u32).map(String::from).unwrap_or_default(),
            (Value::Int(v), Type::Boolean) => (v != 0).to_string(),
            (Value::Int(v), _) => v.to_string(),
            (Value::Long(v), _) => v.to_string(),
            (Value::Float(v), _) => java_float(f64::from(v)),
            (Value::Double(v), _) => java_float(v),
            (Value::Null, _) => "null".to_string(),
            (Value::Ref(r), _) => {
                if let Object::Str(s) = self.object(r)? {
                    return Ok(s.clone());
                }
                let to_string = MethodRef {
                    owner: OBJECT.to_string(),
                    name: "toString".to_string(),
                    descriptor: "()Ljava/lang/String;".to_string(),
                    params: Vec::new(),
                    return_type: Type::string(),
                    invocation: Invocation::Virtual,
                };
                let mut frame = Frame {
                    locals: Vec::new(),
                    stack: vec![value],
                };
                self.invoke(&mut frame, Opcode::InvokeVirtual, &to_string)?;
                let result = frame.pop()?;
                self.string_value(&result).unwrap_or("null").to_string()
            }
        })
    }

    fn intern(&mut self, text: &str) -> Value {
        if let Some(&r) = self.interned.get(text) {
            return Value::Ref(r);
        }
        let r = self.allocate(Object::Str(text.to_string()));
        self.interned.insert(text.to_string(), r);
        Value::Ref(r)
    }

    fn instantiate(&mut self, class: &str) -> Exec<usize> {
        self.ensure_initialized(class)?;
        let object = match class {
            STRING_BUILDER => Object::Builder(String::new()),
            STRING => Object::Str(String::new()),
            _ => {
                if !self.classes.contains_key(class) && self.builtins.get(class).is_none() {
                    return Err(MachineError::ClassNotFound(class.to_string()).into());
                }
                let mut fields = HashMap::new();
                let mut current = Some(class.to_string());
                while let Some(name) = current {
                    let Some(loaded) = self.classes.get(&name) else {
                        break;
                    };
                    for field in loaded
                        .file
                        .fields
                        .iter()
                        .filter(|f| f.access & access::STATIC == 0)
                    {
                        let ty = Type::from_descriptor(&field.descriptor).unwrap_or(Type::Any);
                        fields.insert(field_key(&name, &field.name), Value::default_for(&ty));
                    }
                    current = loaded.file.super_name.clone();
                }
                Object::Instance {
                    class: class.to_string(),
                    fields,
                    message: None,
                }
            }
        };
        Ok(self.allocate(object))
    }

    fn new_array(&mut self, element: Type, length: i32) -> Exec<Value> {
        if length < 0 {
            return self.throw("java/lang/NegativeArraySizeException", Some(length.to_string()));
        }
        let values = vec![Value::default_for(&element); length as usize];
        Ok(Value::Ref(self.allocate(Object::Array { element, values })))
    }

    fn new_multi_array(&mut self, ty: &Type, counts: &[i32]) -> Exec<Value> {
        let Type::Array(element) = ty else {
            return Err(MachineError::TypeMismatch(format!("'{}' は配列型ではありません", ty)).into());
        };
        let array = self.new_array((**element).clone(), counts[0])?;
        if counts.len() > 1 {
            for index in 0..counts[0] as usize {
                let inner = self.new_multi_array(element, &counts[1..])?;
                if let Value::Ref(r) = array {
                    if let Object::Array { values, .. } = self.object_mut(r)? {
                        values[index] = inner;
                    }
                }
            }
        }
        Ok(array)
    }

    fn array_ref(&mut self, array: Value) -> Exec<usize> {
        match array {
            Value::Ref(r) => Ok(r),
            Value::Null => self.throw("java/lang/NullPointerException", None),
            other => Err(MachineError::TypeMismatch(format!("配列が必要ですが {} でした", other)).into()),
        }
    }

    fn array_load(&mut self, frame: &mut Frame) -> Exec<()> {
        let index = frame.pop_int()?;
        let array = frame.pop()?;
        let r = self.array_ref(array)?;
        let length = match self.object(r)? {
            Object::Array { values, .. } => values.len(),
            _ => return Err(MachineError::TypeMismatch("配列ではありません".to_string()).into()),
        };
        if index < 0 || index as usize >= length {
            let message = Some(format!("Index {} out of bounds for length {}", index, length));
            return self.throw("java/lang/ArrayIndexOutOfBoundsException", message);
        }
        if let Object::Array { values, .. } = self.object(r)? {
            frame.push(values[index as usize]);
        }
        Ok(())
    }

    fn array_store(&mut self, frame: &mut Frame) -> Exec<()> {
        let value = frame.pop()?;
        let index = frame.pop_int()?;
        let array = frame.pop()?;
        let r = self.array_ref(array)?;
        let length = match self.object(r)? {
            Object::Array { values, .. } => values.len(),
            _ => return Err(MachineError::TypeMismatch("配列ではありません".to_string()).into()),
        };
        if index < 0 || index as usize >= length {
            let message = Some(format!("Index {} out of bounds for length {}", index, length));
            return self.throw("java/lang/ArrayIndexOutOfBoundsException", message);
        }
        if let Object::Array { values, .. } = self.object_mut(r)? {
            values[index as usize] = value;
        }
        Ok(())
    }

    fn get_static(&mut self, owner: &str, name: &str) -> Exec<Value> {
        match (owner, name) {
            ("java/lang/System", "out") => return Ok(Value::Ref(self.out)),
            ("java/lang/Integer", "MAX_VALUE") => return Ok(Value::Int(i32::MAX)),
            ("java/lang/Integer", "MIN_VALUE") => return Ok(Value::Int(i32::MIN)),
            _ => {}
        }
        self.ensure_initialized(owner)?;
        self.statics
            .get(&(owner.to_string(), name.to_string()))
            .copied()
            .ok_or_else(|| {
                MachineError::FieldNotFound {
                    class: owner.to_string(),
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// メソッド本体を実行する
    fn execute(&mut self, method: Rc<LoadedMethod>, args: Vec<Value>) -> Exec<Option<Value>> {
        if self.depth >= MAX_CALL_DEPTH {
            return Err(MachineError::StackOverflow(MAX_CALL_DEPTH).into());
        }
        trace!("実行: {}.{}{}", method.owner, method.info.name, method.info.descriptor);
        let mut frame = Frame {
            locals: vec![Value::Null; method.info.max_locals],
            stack: Vec::new(),
        };
        let mut slot = 0;
        for arg in args {
            frame.store(slot, arg);
            slot += if arg.is_wide() { 2 } else { 1 };
        }

        self.depth += 1;
        let result = self.run(&method, &mut frame);
        self.depth -= 1;
        result
    }

    fn run(&mut self, method: &LoadedMethod, frame: &mut Frame) -> Exec<Option<Value>> {
        let code = &method.info.code;
        let mut pc = 0;
        loop {
            let Some(instruction) = code.get(pc) else {
                return Err(MachineError::FellOffEnd(format!("{}.{}", method.owner, method.info.name)).into());
            };
            self.steps += 1;
            if self.steps > self.step_limit {
                return Err(MachineError::StepLimit(self.step_limit).into());
            }
            match self.step(method, frame, instruction) {
                Ok(Flow::Next) => pc += 1,
                Ok(Flow::Jump(label)) => pc = method.position(label)?,
                Ok(Flow::Return(value)) => return Ok(value),
                Err(Unwind::Exception(exception)) => {
                    pc = self.find_handler(method, pc, exception)?;
                    frame.stack.clear();
                    frame.push(Value::Ref(exception));
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// 例外表から `pc` を保護するハンドラを探す。なければ呼び出し元へ伝播する。
    fn find_handler(&self, method: &LoadedMethod, pc: usize, exception: usize) -> Exec<usize> {
        let class = self.class_of(exception)?;
        for handler in &method.info.handlers {
            let start = method.position(handler.start)?;
            let end = method.position(handler.end)?;
            let matches = handler
                .catch_type
                .as_deref()
                .map_or(true, |catch_type| self.is_subclass(&class, catch_type));
            if (start..end).contains(&pc) && matches {
                trace!("例外 {} をハンドラ {} で捕捉", class, handler.handler);
                return Ok(method.position(handler.handler)?);
            }
        }
        Err(Unwind::Exception(exception))
    }

    fn step(&mut self, method: &LoadedMethod, frame: &mut Frame, instruction: &Instruction) -> Exec<Flow> {
        match instruction {
            Instruction::Label(_) => {}
            Instruction::Constant(constant) => {
                let value = match constant {
                    Constant::Int(v) => Value::Int(*v),
                    Constant::Long(v) => Value::Long(*v),
                    Constant::Float(v) => Value::Float(*v),
                    Constant::Double(v) => Value::Double(*v),
                    Constant::String(s) => self.intern(s),
                };
                frame.push(value);
            }
            Instruction::Local(op, slot) => match op {
                Opcode::ILoad | Opcode::LLoad | Opcode::FLoad | Opcode::DLoad | Opcode::ALoad => {
                    let value = frame.load(*slot)?;
                    frame.push(value);
                }
                _ => {
                    let value = frame.pop()?;
                    frame.store(*slot, value);
                }
            },
            Instruction::Iinc(slot, delta) => match frame.load(*slot)? {
                Value::Int(v) => frame.store(*slot, Value::Int(v.wrapping_add(*delta))),
                other => return Err(MachineError::TypeMismatch(format!("iinc の対象が int ではありません: {}", other)).into()),
            },
            Instruction::Branch(op, label) => {
                if self.branch_taken(frame, *op)? {
                    return Ok(Flow::Jump(*label));
                }
            }
            Instruction::Field(op, field) => match op {
                Opcode::GetStatic => {
                    let value = self.get_static(&field.owner, &field.name)?;
                    frame.push(value);
                }
                Opcode::PutStatic => {
                    let value = frame.pop()?;
                    self.ensure_initialized(&field.owner)?;
                    self.statics.insert((field.owner.clone(), field.name.clone()), value);
                }
                Opcode::GetField => {
                    let r = self.array_ref(frame.pop()?)?;
                    let key = field_key(&field.owner, &field.name);
                    let value = match self.object(r)? {
                        Object::Instance { fields, .. } => fields.get(&key).copied(),
                        _ => None,
                    };
                    let value = value.ok_or_else(|| MachineError::FieldNotFound {
                        class: field.owner.clone(),
                        name: field.name.clone(),
                    })?;
                    frame.push(value);
                }
                _ => {
                    let value = frame.pop()?;
                    let r = self.array_ref(frame.pop()?)?;
                    let key = field_key(&field.owner, &field.name);
                    match self.object_mut(r)? {
                        Object::Instance { fields, .. } => {
                            fields.insert(key, value);
                        }
                        _ => {
                            return Err(MachineError::FieldNotFound {
                                class: field.owner.clone(),
                                name: field.name.clone(),
                            }
                            .into())
                        }
                    }
                }
            },
            Instruction::Invoke(op, target) => self.invoke(frame, *op, target)?,
            Instruction::Type(op, name) => match op {
                Opcode::New => {
                    let r = self.instantiate(name)?;
                    frame.push(Value::Ref(r));
                }
                Opcode::ANewArray => {
                    let length = frame.pop_int()?;
                    let element = element_type(name);
                    let array = self.new_array(element, length)?;
                    frame.push(array);
                }
                Opcode::CheckCast => {
                    let value = frame.pop()?;
                    if let Value::Ref(r) = value {
                        if !self.is_instance(r, name)? {
                            let message = Some(format!(
                                "{} cannot be cast to {}",
                                self.class_of(r)?.replace('/', "."),
                                name.replace('/', ".")
                            ));
                            return self.throw("java/lang/ClassCastException", message);
                        }
                    }
                    frame.push(value);
                }
                _ => {
                    let value = frame.pop()?;
                    let result = match value {
                        Value::Ref(r) => self.is_instance(r, name)?,
                        _ => false,
                    };
                    frame.push(Value::Int(i32::from(result)));
                }
            },
            Instruction::NewArray(element) => {
                let length = frame.pop_int()?;
                let array = self.new_array(element.clone(), length)?;
                frame.push(array);
            }
            Instruction::MultiNewArray(descriptor, dimensions) => {
                let mut counts = Vec::with_capacity(*dimensions);
                for _ in 0..*dimensions {
                    counts.push(frame.pop_int()?);
                }
                counts.reverse();
                if let Some(negative) = counts.iter().find(|c| **c < 0) {
                    return self.throw("java/lang/NegativeArraySizeException", Some(negative.to_string()));
                }
                let ty = Type::from_descriptor(descriptor)
                    .ok_or_else(|| MachineError::TypeMismatch(format!("不正な配列記述子 '{}'", descriptor)))?;
                let array = self.new_multi_array(&ty, &counts)?;
                frame.push(array);
            }
            Instruction::Simple(op) => return self.simple(method, frame, *op),
        }
        Ok(Flow::Next)
    }

    fn branch_taken(&mut self, frame: &mut Frame, op: Opcode) -> Exec<bool> {
        Ok(match op {
            Opcode::Goto => true,
            Opcode::IfEq | Opcode::IfNe | Opcode::IfLt | Opcode::IfGe | Opcode::IfGt | Opcode::IfLe => {
                let v = frame.pop_int()?;
                compare(op, v, 0)
            }
            Opcode::IfICmpEq
            | Opcode::IfICmpNe
            | Opcode::IfICmpLt
            | Opcode::IfICmpGe
            | Opcode::IfICmpGt
            | Opcode::IfICmpLe => {
                let rhs = frame.pop_int()?;
                let lhs = frame.pop_int()?;
                compare(op, lhs, rhs)
            }
            Opcode::IfACmpEq | Opcode::IfACmpNe => {
                let rhs = frame.pop()?;
                let lhs = frame.pop()?;
                (lhs == rhs) == (op == Opcode::IfACmpEq)
            }
            Opcode::IfNull | Opcode::IfNonNull => {
                let value = frame.pop()?;
                (value == Value::Null) == (op == Opcode::IfNull)
            }
            other => return Err(MachineError::TypeMismatch(format!("分岐命令ではありません: {}", other.mnemonic())).into()),
        })
    }

    fn simple(&mut self, method: &LoadedMethod, frame: &mut Frame, op: Opcode) -> Exec<Flow> {
        use Opcode::*;
        match op {
            Nop => {}
            AconstNull => frame.push(Value::Null),
            IAdd | ISub | IMul | IDiv | IRem | IShl | IShr | IUshr | IAnd | IOr | IXor => {
                let b = frame.pop_int()?;
                let a = frame.pop_int()?;
                if matches!(op, IDiv | IRem) && b == 0 {
                    return self.throw("java/lang/ArithmeticException", Some("/ by zero".to_string()));
                }
                let value = match op {
                    IAdd => a.wrapping_add(b),
                    ISub => a.wrapping_sub(b),
                    IMul => a.wrapping_mul(b),
                    IDiv => a.wrapping_div(b),
                    IRem => a.wrapping_rem(b),
                    IShl => a.wrapping_shl((b & 31) as u32),
                    IShr => a.wrapping_shr((b & 31) as u32),
                    IUshr => ((a as u32) >> (b & 31)) as i32,
                    IAnd => a & b,
                    IOr => a | b,
                    _ => a ^ b,
                };
                frame.push(Value::Int(value));
            }
            LAdd | LSub | LMul | LDiv | LRem => {
                let b = frame.pop_long()?;
                let a = frame.pop_long()?;
                if matches!(op, LDiv | LRem) && b == 0 {
                    return self.throw("java/lang/ArithmeticException", Some("/ by zero".to_string()));
                }
                let value = match op {
                    LAdd => a.wrapping_add(b),
                    LSub => a.wrapping_sub(b),
                    LMul => a.wrapping_mul(b),
                    LDiv => a.wrapping_div(b),
                    _ => a.wrapping_rem(b),
                };
                frame.push(Value::Long(value));
            }
            FAdd | FSub | FMul | FDiv | FRem => {
                let b = frame.pop_float()?;
                let a = frame.pop_float()?;
                let value = match op {
                    FAdd => a + b,
                    FSub => a - b,
                    FMul => a * b,
                    FDiv => a / b,
                    _ => a % b,
                };
                frame.push(Value::Float(value));
            }
            DAdd | DSub | DMul | DDiv | DRem => {
                let b = frame.pop_double()?;
                let a = frame.pop_double()?;
                let value = match op {
                    DAdd => a + b,
                    DSub => a - b,
                    DMul => a * b,
                    DDiv => a / b,
                    _ => a % b,
                };
                frame.push(Value::Double(value));
            }
            INeg => {
                let v = frame.pop_int()?;
                frame.push(Value::Int(v.wrapping_neg()));
            }
            LNeg => {
                let v = frame.pop_long()?;
                frame.push(Value::Long(v.wrapping_neg()));
            }
            FNeg => {
                let v = frame.pop_float()?;
                frame.push(Value::Float(-v));
            }
            DNeg => {
                let v = frame.pop_double()?;
                frame.push(Value::Double(-v));
            }
            I2L | I2F | I2D | I2C => {
                let v = frame.pop_int()?;
                frame.push(match op {
                    I2L => Value::Long(i64::from(v)),
                    I2F => Value::Float(v as f32),
                    I2D => Value::Double(f64::from(v)),
                    _ => Value::Int(i32::from(v as u16)),
                });
            }
            L2I | L2F | L2D => {
                let v = frame.pop_long()?;
                frame.push(match op {
                    L2I => Value::Int(v as i32),
                    L2F => Value::Float(v as f32),
                    _ => Value::Double(v as f64),
                });
            }
            F2I | F2L | F2D => {
                let v = frame.pop_float()?;
                frame.push(match op {
                    F2I => Value::Int(v as i32),
                    F2L => Value::Long(v as i64),
                    _ => Value::Double(f64::from(v)),
                });
            }
            D2I | D2L | D2F => {
                let v = frame.pop_double()?;
                frame.push(match op {
                    D2I => Value::Int(v as i32),
                    D2L => Value::Long(v as i64),
                    _ => Value::Float(v as f32),
                });
            }
            LCmp => {
                let b = frame.pop_long()?;
                let a = frame.pop_long()?;
                frame.push(Value::Int(a.cmp(&b) as i32));
            }
            FCmpl | FCmpg => {
                let b = f64::from(frame.pop_float()?);
                let a = f64::from(frame.pop_float()?);
                frame.push(Value::Int(float_compare(a, b, op == FCmpg)));
            }
            DCmpl | DCmpg => {
                let b = frame.pop_double()?;
                let a = frame.pop_double()?;
                frame.push(Value::Int(float_compare(a, b, op == DCmpg)));
            }
            IALoad | LALoad | FALoad | DALoad | AALoad | BALoad | CALoad => self.array_load(frame)?,
            IAStore | LAStore | FAStore | DAStore | AAStore | BAStore | CAStore => self.array_store(frame)?,
            ArrayLength => {
                let r = self.array_ref(frame.pop()?)?;
                match self.object(r)? {
                    Object::Array { values, .. } => frame.push(Value::Int(values.len() as i32)),
                    _ => return Err(MachineError::TypeMismatch("arraylength の対象が配列ではありません".to_string()).into()),
                }
            }
            Pop => {
                frame.pop()?;
            }
            Pop2 => {
                if !frame.pop()?.is_wide() {
                    frame.pop()?;
                }
            }
            Dup | DupX1 | DupX2 | Dup2 | Dup2X1 | Dup2X2 | Swap => stack_shuffle(frame, op)?,
            IReturn | LReturn | FReturn | DReturn | AReturn => return Ok(Flow::Return(Some(frame.pop()?))),
            Return => return Ok(Flow::Return(None)),
            AThrow => {
                return match frame.pop()? {
                    Value::Ref(r) => Err(Unwind::Exception(r)),
                    _ => self.throw("java/lang/NullPointerException", None),
                }
            }
            other => {
                return Err(MachineError::TypeMismatch(format!(
                    "{}.{}: オペランドなしでは実行できない命令 {}",
                    method.owner,
                    method.info.name,
                    other.mnemonic()
                ))
                .into())
            }
        }
        Ok(Flow::Next)
    }
}

/// 命令実行後の制御
enum Flow {
    Next,
    Jump(Label),
    Return(Option<Value>),
}

/// メソッドの実装の所在
enum Target {
    Compiled(Rc<LoadedMethod>),
    /// 組み込みクラス（クラス名）
    Native(String),
}

fn field_key(owner: &str, name: &str) -> String {
    format!("{}.{}", owner, name)
}

fn element_type(name: &str) -> Type {
    if name.starts_with('[') {
        Type::from_descriptor(name).unwrap_or(Type::object())
    } else {
        Type::reference(name)
    }
}

fn compare(op: Opcode, lhs: i32, rhs: i32) -> bool {
    match op {
        Opcode::IfEq | Opcode::IfICmpEq => lhs == rhs,
        Opcode::IfNe | Opcode::IfICmpNe => lhs != rhs,
        Opcode::IfLt | Opcode::IfICmpLt => lhs < rhs,
        Opcode::IfGe | Opcode::IfICmpGe => lhs >= rhs,
        Opcode::IfGt | Opcode::IfICmpGt => lhs > rhs,
        _ => lhs <= rhs,
    }
}

/// fcmp/dcmp。NaN のとき `greater_on_nan` なら 1、そうでなければ -1。
fn float_compare(a: f64, b: f64, greater_on_nan: bool) -> i32 {
    match a.partial_cmp(&b) {
        Some(ordering) => ordering as i32,
        None if greater_on_nan => 1,
        None => -1,
    }
}

/// Java の Float/Double.toString に近い表現
fn java_float(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_string()
    } else if value.is_infinite() {
        if value > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if value.fract() == 0.0 && value.abs() < 1e7 {
        format!("{:.1}", value)
    } else {
        value.to_string()
    }
}

/// dup 系命令。long・double はカテゴリ2として一要素で二スロット分に数える。
fn stack_shuffle(frame: &mut Frame, op: Opcode) -> Result<(), MachineError> {
    let v1 = frame.pop()?;
    match op {
        Opcode::Dup => {
            frame.push(v1);
            frame.push(v1);
        }
        Opcode::Swap => {
            let v2 = frame.pop()?;
            frame.push(v1);
            frame.push(v2);
        }
        Opcode::DupX1 => {
            let v2 = frame.pop()?;
            frame.push(v1);
            frame.push(v2);
            frame.push(v1);
        }
        Opcode::DupX2 => {
            let v2 = frame.pop()?;
            if v2.is_wide() {
                frame.push(v1);
                frame.push(v2);
            } else {
                let v3 = frame.pop()?;
                frame.push(v1);
                frame.push(v3);
                frame.push(v2);
            }
            frame.push(v1);
        }
        Opcode::Dup2 => {
            if v1.is_wide() {
                frame.push(v1);
                frame.push(v1);
            } else {
                let v2 = frame.pop()?;
                frame.push(v2);
                frame.push(v1);
                frame.push(v2);
                frame.push(v1);
            }
        }
        Opcode::Dup2X1 => {
            if v1.is_wide() {
                let v2 = frame.pop()?;
                frame.push(v1);
                frame.push(v2);
                frame.push(v1);
            } else {
                let v2 = frame.pop()?;
                let v3 = frame.pop()?;
                frame.push(v2);
                frame.push(v1);
                frame.push(v3);
                frame.push(v2);
                frame.push(v1);
            }
        }
        _ => {
            // dup2_x2: 上位の値を、その下の二スロット分の下へ複製する
            let mut values = vec![v1];
            let mut width = if v1.is_wide() { 2 } else { 1 };
            while width < 2 {
                let v = frame.pop()?;
                width += if v.is_wide() { 2 } else { 1 };
                values.push(v);
            }
            let mut below = Vec::new();
            let mut width = 0;
            while width < 2 {
                let v = frame.pop()?;
                width += if v.is_wide() { 2 } else { 1 };
                below.push(v);
            }
            for v in values.iter().rev() {
                frame.push(*v);
            }
            for v in below.iter().rev() {
                frame.push(*v);
            }
            for v in values.iter().rev() {
                frame.push(*v);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::emitter::{ClassEmitter, Emitter};

    fn single_method(descriptor: &str, build: impl FnOnce(&mut ClassEmitter)) -> Vec<ClassFile> {
        let mut emitter = ClassEmitter::new();
        emitter.begin_class(access::PUBLIC, "T", Some(OBJECT), &[]);
        emitter.begin_method(access::PUBLIC | access::STATIC, "f", descriptor, &[]);
        build(&mut emitter);
        emitter.finish()
    }

    #[test]
    fn test_integer_arithmetic() {
        let classes = single_method("(II)I", |e| {
            e.emit_local(Opcode::ILoad, 0);
            e.emit_local(Opcode::ILoad, 1);
            e.emit_simple(Opcode::IMul);
            e.emit_simple(Opcode::IReturn);
        });
        let mut machine = Machine::new(&classes);
        let result = machine
            .invoke_static("T", "f", "(II)I", vec![Value::Int(6), Value::Int(7)])
            .unwrap();
        assert_eq!(result, Some(Value::Int(42)));
    }

    #[test]
    fn test_division_by_zero_is_catchable() {
        let classes = single_method("(I)I", |e| {
            let start = e.new_label();
            let end = e.new_label();
            let handler = e.new_label();
            e.place_label(start);
            e.emit(Instruction::Constant(Constant::Int(1)));
            e.emit_local(Opcode::ILoad, 0);
            e.emit_simple(Opcode::IDiv);
            e.emit_simple(Opcode::IReturn);
            e.place_label(end);
            e.place_label(handler);
            e.emit_simple(Opcode::Pop);
            e.emit(Instruction::Constant(Constant::Int(-1)));
            e.emit_simple(Opcode::IReturn);
            e.add_exception_handler(start, end, handler, Some("java/lang/ArithmeticException"));
        });
        let mut machine = Machine::new(&classes);
        assert_eq!(
            machine.invoke_static("T", "f", "(I)I", vec![Value::Int(0)]).unwrap(),
            Some(Value::Int(-1))
        );
        assert_eq!(
            machine.invoke_static("T", "f", "(I)I", vec![Value::Int(1)]).unwrap(),
            Some(Value::Int(1))
        );
    }

    #[test]
    fn test_uncaught_exception_reports_class() {
        let classes = single_method("()V", |e| {
            e.emit(Instruction::Type(Opcode::New, "java/lang/IllegalStateException".to_string()));
            e.emit_simple(Opcode::Dup);
            e.emit(Instruction::Constant(Constant::String("boom".to_string())));
            e.emit(Instruction::Invoke(
                Opcode::InvokeSpecial,
                MethodRef {
                    owner: "java/lang/IllegalStateException".to_string(),
                    name: "<init>".to_string(),
                    descriptor: "(Ljava/lang/String;)V".to_string(),
                    params: vec![Type::string()],
                    return_type: Type::Void,
                    invocation: Invocation::Special,
                },
            ));
            e.emit_simple(Opcode::AThrow);
        });
        let mut machine = Machine::new(&classes);
        let err = machine.invoke_static("T", "f", "()V", vec![]).unwrap_err();
        assert_eq!(
            err,
            MachineError::UncaughtException {
                class: "java.lang.IllegalStateException".to_string(),
                message: Some("boom".to_string()),
            }
        );
    }

    #[test]
    fn test_step_limit_stops_infinite_loop() {
        let classes = single_method("()V", |e| {
            let top = e.new_label();
            e.place_label(top);
            e.emit_branch(Opcode::Goto, top);
        });
        let mut machine = Machine::new(&classes).with_step_limit(1000);
        assert_eq!(
            machine.invoke_static("T", "f", "()V", vec![]),
            Err(MachineError::StepLimit(1000))
        );
    }

    #[test]
    fn test_dup2_x2_with_wide_value() {
        let mut frame = Frame {
            locals: Vec::new(),
            stack: vec![Value::Ref(1), Value::Int(0), Value::Long(5)],
        };
        stack_shuffle(&mut frame, Opcode::Dup2X2).unwrap();
        assert_eq!(
            frame.stack,
            vec![Value::Long(5), Value::Ref(1), Value::Int(0), Value::Long(5)]
        );
    }

    #[test]
    fn test_java_float_formatting() {
        assert_eq!(java_float(1.0), "1.0");
        assert_eq!(java_float(2.5), "2.5");
        assert_eq!(java_float(f64::NAN), "NaN");
    }
}
