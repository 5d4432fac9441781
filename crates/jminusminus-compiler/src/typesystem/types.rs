//! # 型定義
//!
//! 解決済みの型と、その記述子（descriptor）表現を扱います。
//! 参照型の名前はすべて内部名（`java/lang/String` のようにスラッシュ区切り）で保持します。

use std::fmt;

use serde::Serialize;

pub const OBJECT: &str = "java/lang/Object";
pub const STRING: &str = "java/lang/String";
pub const STRING_BUILDER: &str = "java/lang/StringBuilder";
pub const THROWABLE: &str = "java/lang/Throwable";
pub const RUNTIME_EXCEPTION: &str = "java/lang/RuntimeException";
pub const ERROR: &str = "java/lang/Error";
pub const ITERABLE: &str = "java/lang/Iterable";
pub const ITERATOR: &str = "java/util/Iterator";

/// 解決済みの型
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum Type {
    Int,
    Long,
    Float,
    Double,
    Char,
    Boolean,
    Void,
    /// `null` リテラルの型
    Null,
    /// 解決に失敗した式の型。エラーの連鎖を防ぐため何にでも代入できる。
    Any,
    /// クラス・インターフェース（内部名）
    Reference(String),
    /// 配列
    Array(Box<Type>),
}

impl Type {
    pub fn object() -> Type {
        Type::Reference(OBJECT.to_string())
    }

    pub fn string() -> Type {
        Type::Reference(STRING.to_string())
    }

    pub fn reference(name: &str) -> Type {
        Type::Reference(name.to_string())
    }

    pub fn array_of(element: Type) -> Type {
        Type::Array(Box::new(element))
    }

    /// `dimensions` 次元の配列型を作る
    pub fn with_dimensions(base: Type, dimensions: usize) -> Type {
        (0..dimensions).fold(base, |ty, _| Type::array_of(ty))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            Type::Int | Type::Long | Type::Float | Type::Double | Type::Char | Type::Boolean
        )
    }

    /// 参照型か（`null` 型を含む）
    pub fn is_reference(&self) -> bool {
        matches!(self, Type::Reference(_) | Type::Array(_) | Type::Null)
    }

    pub fn is_numeric(&self) -> bool {
        matches!(self, Type::Int | Type::Long | Type::Float | Type::Double | Type::Char)
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Type::Array(_))
    }

    pub fn is_string(&self) -> bool {
        matches!(self, Type::Reference(name) if name == STRING)
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Type::Any)
    }

    /// 配列の要素型
    pub fn component_type(&self) -> Option<&Type> {
        match self {
            Type::Array(element) => Some(element),
            _ => None,
        }
    }

    /// クラス型の内部名
    pub fn class_name(&self) -> Option<&str> {
        match self {
            Type::Reference(name) => Some(name),
            _ => None,
        }
    }

    /// 二項数値演算での昇格。`char` は `int` として扱う。
    pub fn promoted(&self) -> Type {
        match self {
            Type::Char => Type::Int,
            other => other.clone(),
        }
    }

    /// ローカル変数領域で占めるスロット数
    pub fn slot_size(&self) -> usize {
        match self {
            Type::Long | Type::Double => 2,
            Type::Void => 0,
            _ => 1,
        }
    }

    /// 型記述子
    pub fn descriptor(&self) -> String {
        match self {
            Type::Int => "I".to_string(),
            Type::Long => "J".to_string(),
            Type::Float => "F".to_string(),
            Type::Double => "D".to_string(),
            Type::Char => "C".to_string(),
            Type::Boolean => "Z".to_string(),
            Type::Void => "V".to_string(),
            Type::Null | Type::Any => format!("L{};", OBJECT),
            Type::Reference(name) => format!("L{};", name),
            Type::Array(element) => format!("[{}", element.descriptor()),
        }
    }

    /// `new`・`checkcast`・`instanceof` などで使う内部名。配列は記述子そのもの。
    pub fn internal_name(&self) -> String {
        match self {
            Type::Reference(name) => name.clone(),
            Type::Array(_) => self.descriptor(),
            Type::Null | Type::Any => OBJECT.to_string(),
            other => other.descriptor(),
        }
    }

    /// 型記述子を解釈する
    pub fn from_descriptor(descriptor: &str) -> Option<Type> {
        let chars: Vec<char> = descriptor.chars().collect();
        match parse_field_type(&chars, 0) {
            Some((ty, end)) if end == chars.len() => Some(ty),
            _ => None,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Long => write!(f, "long"),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Char => write!(f, "char"),
            Type::Boolean => write!(f, "boolean"),
            Type::Void => write!(f, "void"),
            Type::Null => write!(f, "null"),
            Type::Any => write!(f, "<any>"),
            Type::Reference(name) => write!(f, "{}", name.replace('/', ".")),
            Type::Array(element) => write!(f, "{}[]", element),
        }
    }
}

fn parse_field_type(chars: &[char], start: usize) -> Option<(Type, usize)> {
    let ty = match chars.get(start)? {
        'I' => Type::Int,
        'J' => Type::Long,
        'F' => Type::Float,
        'D' => Type::Double,
        'C' => Type::Char,
        'Z' => Type::Boolean,
        'V' => Type::Void,
        'L' => {
            let end = start + chars[start..].iter().position(|&c| c == ';')?;
            let name: String = chars[start + 1..end].iter().collect();
            return Some((Type::Reference(name), end + 1));
        }
        '[' => {
            let (element, end) = parse_field_type(chars, start + 1)?;
            return Some((Type::array_of(element), end));
        }
        _ => return None,
    };
    Some((ty, start + 1))
}

/// メソッド記述子を作る
pub fn method_descriptor(params: &[Type], return_type: &Type) -> String {
    let params: String = params.iter().map(Type::descriptor).collect();
    format!("({}){}", params, return_type.descriptor())
}

/// メソッド記述子を引数型と戻り値型に分解する
pub fn parse_method_descriptor(descriptor: &str) -> Option<(Vec<Type>, Type)> {
    let chars: Vec<char> = descriptor.chars().collect();
    if chars.first() != Some(&'(') {
        return None;
    }
    let mut params = Vec::new();
    let mut position = 1;
    while *chars.get(position)? != ')' {
        let (ty, next) = parse_field_type(&chars, position)?;
        params.push(ty);
        position = next;
    }
    let (return_type, end) = parse_field_type(&chars, position + 1)?;
    if end != chars.len() {
        return None;
    }
    Some((params, return_type))
}

/// メソッド呼び出しの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Invocation {
    Static,
    Virtual,
    Interface,
    /// コンストラクタと `super.m()`
    Special,
}

/// 解決済みフィールド参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldRef {
    /// 宣言しているクラスの内部名
    pub owner: String,
    pub name: String,
    pub ty: Type,
    pub is_static: bool,
}

/// 解決済みメソッド参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MethodRef {
    /// 宣言しているクラスの内部名
    pub owner: String,
    pub name: String,
    pub descriptor: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub invocation: Invocation,
}

impl MethodRef {
    pub fn is_static(&self) -> bool {
        self.invocation == Invocation::Static
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptors() {
        assert_eq!(Type::array_of(Type::Int).descriptor(), "[I");
        assert_eq!(Type::string().descriptor(), "Ljava/lang/String;");
        assert_eq!(
            method_descriptor(&[Type::Int, Type::array_of(Type::string())], &Type::Void),
            "(I[Ljava/lang/String;)V"
        );
    }

    #[test]
    fn test_parse_method_descriptor() {
        let (params, ret) = parse_method_descriptor("(IJ[Ljava/lang/Object;)Z").unwrap();
        assert_eq!(params, vec![Type::Int, Type::Long, Type::array_of(Type::object())]);
        assert_eq!(ret, Type::Boolean);
        assert!(parse_method_descriptor("(I").is_none());
    }

    #[test]
    fn test_slot_sizes() {
        assert_eq!(Type::Long.slot_size(), 2);
        assert_eq!(Type::Double.slot_size(), 2);
        assert_eq!(Type::string().slot_size(), 1);
        assert_eq!(Type::Void.slot_size(), 0);
    }

    #[test]
    fn test_display_uses_source_names() {
        assert_eq!(Type::with_dimensions(Type::string(), 2).to_string(), "java.lang.String[][]");
    }
}
