//! # クラス登録簿
//!
//! 組み込みライブラリクラスとコンパイル単位で宣言されたクラスの形（スーパークラス、
//! フィールド、メソッド、コンストラクタ）を保持し、メンバ解決と代入可能性判定を行います。

use std::collections::{HashMap, HashSet, VecDeque};

use super::types::{
    method_descriptor, FieldRef, Invocation, MethodRef, Type, ERROR, ITERABLE, ITERATOR, OBJECT,
    RUNTIME_EXCEPTION, STRING, STRING_BUILDER, THROWABLE,
};

/// フィールドの形
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSig {
    pub name: String,
    pub ty: Type,
    pub is_static: bool,
}

/// メソッド・コンストラクタの形
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSig {
    pub name: String,
    pub params: Vec<Type>,
    pub return_type: Type,
    pub is_static: bool,
    pub is_abstract: bool,
}

impl MethodSig {
    pub fn new(name: &str, params: Vec<Type>, return_type: Type) -> Self {
        Self {
            name: name.to_string(),
            params,
            return_type,
            is_static: false,
            is_abstract: false,
        }
    }

    pub fn descriptor(&self) -> String {
        method_descriptor(&self.params, &self.return_type)
    }

    /// `name(int, java.lang.String)` 形式
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.params.iter().map(Type::to_string).collect();
        format!("{}({})", self.name, params.join(", "))
    }
}

/// クラス・インターフェースの形
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// 内部名
    pub name: String,
    pub super_name: Option<String>,
    pub interfaces: Vec<String>,
    pub is_interface: bool,
    pub is_abstract: bool,
    pub is_final: bool,
    /// 組み込みライブラリのクラスか
    pub is_builtin: bool,
    pub fields: Vec<FieldSig>,
    pub methods: Vec<MethodSig>,
    pub constructors: Vec<MethodSig>,
}

impl ClassInfo {
    pub fn new(name: &str, super_name: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            super_name: super_name.map(str::to_string),
            interfaces: Vec::new(),
            is_interface: false,
            is_abstract: false,
            is_final: false,
            is_builtin: false,
            fields: Vec::new(),
            methods: Vec::new(),
            constructors: Vec::new(),
        }
    }

    pub fn method(&self, name: &str, descriptor: &str) -> Option<&MethodSig> {
        self.methods
            .iter()
            .find(|m| m.name == name && m.descriptor() == descriptor)
    }

    pub fn field(&self, name: &str) -> Option<&FieldSig> {
        self.fields.iter().find(|f| f.name == name)
    }
}

/// クラス登録簿
#[derive(Debug, Clone, Default)]
pub struct ClassRegistry {
    classes: HashMap<String, ClassInfo>,
}

impl ClassRegistry {
    /// 空の登録簿を作成
    pub fn new() -> Self {
        Self::default()
    }

    /// 組み込みクラスを登録済みの登録簿を作成
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for class in builtin_classes() {
            registry.define(class);
        }
        registry
    }

    pub fn define(&mut self, class: ClassInfo) {
        self.classes.insert(class.name.clone(), class);
    }

    pub fn get(&self, name: &str) -> Option<&ClassInfo> {
        self.classes.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ClassInfo> {
        self.classes.get_mut(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    pub fn classes(&self) -> impl Iterator<Item = &ClassInfo> {
        self.classes.values()
    }

    pub fn is_interface(&self, name: &str) -> bool {
        self.get(name).map_or(false, |c| c.is_interface)
    }

    /// `name` 自身から始まる祖先の列。スーパークラス連鎖を先に、次にインターフェース。
    pub fn lineage(&self, name: &str) -> Vec<String> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(name.to_string());
        while let Some(class) = current {
            if !seen.insert(class.clone()) {
                break;
            }
            current = self.get(&class).and_then(|c| c.super_name.clone());
            chain.push(class);
        }

        let mut queue: VecDeque<String> = chain
            .iter()
            .filter_map(|c| self.get(c))
            .flat_map(|c| c.interfaces.iter().cloned())
            .collect();
        while let Some(interface) = queue.pop_front() {
            if !seen.insert(interface.clone()) {
                continue;
            }
            if let Some(info) = self.get(&interface) {
                queue.extend(info.interfaces.iter().cloned());
            }
            chain.push(interface);
        }

        if !seen.contains(OBJECT) {
            chain.push(OBJECT.to_string());
        }
        chain
    }

    /// `sub` が `sup` 自身またはそのサブタイプか
    pub fn is_subclass(&self, sub: &str, sup: &str) -> bool {
        sub == sup || sup == OBJECT || self.lineage(sub).iter().any(|c| c == sup)
    }

    /// `from` 型の値を `to` 型の場所へ代入できるか
    pub fn is_assignable(&self, from: &Type, to: &Type) -> bool {
        if from == to || from.is_any() || to.is_any() {
            return true;
        }
        match (from, to) {
            (Type::Char, Type::Int) => true,
            (Type::Null, target) => target.is_reference(),
            (Type::Reference(a), Type::Reference(b)) => self.is_subclass(a, b),
            (Type::Array(_), Type::Reference(b)) => b == OBJECT,
            (Type::Array(a), Type::Array(b)) => {
                a.is_reference() && b.is_reference() && self.is_assignable(a, b)
            }
            _ => false,
        }
    }

    /// フィールドを祖先をたどって探す
    pub fn find_field(&self, class: &str, name: &str) -> Option<FieldRef> {
        self.lineage(class).iter().find_map(|owner| {
            self.get(owner)?.field(name).map(|f| FieldRef {
                owner: owner.clone(),
                name: f.name.clone(),
                ty: f.ty.clone(),
                is_static: f.is_static,
            })
        })
    }

    /// メソッドを探す。完全一致を優先し、なければ代入可能な最初の候補を選ぶ。
    pub fn find_method(&self, class: &str, name: &str, args: &[Type]) -> Option<MethodRef> {
        let lineage = self.lineage(class);
        let candidates: Vec<(&str, &MethodSig)> = lineage
            .iter()
            .filter_map(|owner| self.get(owner).map(|info| (owner.as_str(), info)))
            .flat_map(|(owner, info)| {
                info.methods
                    .iter()
                    .filter(move |m| m.name == name && m.params.len() == args.len())
                    .map(move |m| (owner, m))
            })
            .collect();

        let chosen = candidates
            .iter()
            .find(|(_, m)| m.params.as_slice() == args)
            .or_else(|| {
                candidates.iter().find(|(_, m)| {
                    m.params
                        .iter()
                        .zip(args)
                        .all(|(param, arg)| self.is_assignable(arg, param))
                })
            })?;

        let (owner, sig) = *chosen;
        let invocation = if sig.is_static {
            Invocation::Static
        } else if self.is_interface(owner) {
            Invocation::Interface
        } else {
            Invocation::Virtual
        };
        Some(MethodRef {
            owner: owner.to_string(),
            name: sig.name.clone(),
            descriptor: sig.descriptor(),
            params: sig.params.clone(),
            return_type: sig.return_type.clone(),
            invocation,
        })
    }

    /// コンストラクタを探す（継承はしない）
    pub fn find_constructor(&self, class: &str, args: &[Type]) -> Option<MethodRef> {
        let info = self.get(class)?;
        let applicable = |m: &&MethodSig| {
            m.params.len() == args.len()
                && m.params
                    .iter()
                    .zip(args)
                    .all(|(param, arg)| self.is_assignable(arg, param))
        };
        let sig = info
            .constructors
            .iter()
            .find(|m| m.params.as_slice() == args)
            .or_else(|| info.constructors.iter().find(applicable))?;
        Some(MethodRef {
            owner: class.to_string(),
            name: "<init>".to_string(),
            descriptor: sig.descriptor(),
            params: sig.params.clone(),
            return_type: Type::Void,
            invocation: Invocation::Special,
        })
    }

    /// 具象クラスが実装していない抽象メソッドの一覧（`name(params)` 形式）
    pub fn unimplemented_methods(&self, class: &str) -> Vec<String> {
        let lineage = self.lineage(class);
        let mut missing = Vec::new();
        let mut seen = HashSet::new();
        for owner in &lineage {
            let Some(info) = self.get(owner) else { continue };
            for method in info.methods.iter().filter(|m| m.is_abstract) {
                let key = (method.name.clone(), method.descriptor());
                if !seen.insert(key) {
                    continue;
                }
                let implemented = lineage.iter().any(|c| {
                    self.get(c)
                        .and_then(|i| i.method(&method.name, &method.descriptor()))
                        .map_or(false, |m| !m.is_abstract)
                });
                if !implemented {
                    missing.push(method.signature());
                }
            }
        }
        missing
    }
}

fn method(name: &str, params: Vec<Type>, return_type: Type) -> MethodSig {
    MethodSig::new(name, params, return_type)
}

fn static_method(name: &str, params: Vec<Type>, return_type: Type) -> MethodSig {
    MethodSig {
        is_static: true,
        ..MethodSig::new(name, params, return_type)
    }
}

fn abstract_method(name: &str, params: Vec<Type>, return_type: Type) -> MethodSig {
    MethodSig {
        is_abstract: true,
        ..MethodSig::new(name, params, return_type)
    }
}

fn constructor(params: Vec<Type>) -> MethodSig {
    MethodSig::new("<init>", params, Type::Void)
}

fn builtin(name: &str, super_name: Option<&str>) -> ClassInfo {
    ClassInfo {
        is_builtin: true,
        ..ClassInfo::new(name, super_name)
    }
}

fn throwable_class(name: &str, super_name: &str) -> ClassInfo {
    let mut class = builtin(name, Some(super_name));
    class.constructors = vec![constructor(vec![]), constructor(vec![Type::string()])];
    class
}

/// 組み込みライブラリクラス
pub fn builtin_classes() -> Vec<ClassInfo> {
    let printable = [
        Type::Int,
        Type::Long,
        Type::Float,
        Type::Double,
        Type::Char,
        Type::Boolean,
        Type::string(),
        Type::object(),
    ];

    let mut object = builtin(OBJECT, None);
    object.constructors = vec![constructor(vec![])];
    object.methods = vec![
        method("toString", vec![], Type::string()),
        method("equals", vec![Type::object()], Type::Boolean),
        method("hashCode", vec![], Type::Int),
    ];

    let mut string = builtin(STRING, Some(OBJECT));
    string.is_final = true;
    string.methods = vec![
        method("length", vec![], Type::Int),
        method("charAt", vec![Type::Int], Type::Char),
        method("equals", vec![Type::object()], Type::Boolean),
        method("concat", vec![Type::string()], Type::string()),
        method("substring", vec![Type::Int, Type::Int], Type::string()),
        method("isEmpty", vec![], Type::Boolean),
        method("toString", vec![], Type::string()),
        static_method("valueOf", vec![Type::Int], Type::string()),
        static_method("valueOf", vec![Type::object()], Type::string()),
    ];

    let mut builder = builtin(STRING_BUILDER, Some(OBJECT));
    builder.is_final = true;
    builder.constructors = vec![constructor(vec![]), constructor(vec![Type::string()])];
    builder.methods = printable
        .iter()
        .map(|ty| method("append", vec![ty.clone()], Type::reference(STRING_BUILDER)))
        .collect();
    builder.methods.push(method("toString", vec![], Type::string()));
    builder.methods.push(method("length", vec![], Type::Int));

    let mut print_stream = builtin("java/io/PrintStream", Some(OBJECT));
    print_stream.methods.push(method("println", vec![], Type::Void));
    for ty in &printable {
        print_stream.methods.push(method("print", vec![ty.clone()], Type::Void));
        print_stream.methods.push(method("println", vec![ty.clone()], Type::Void));
    }

    let mut system = builtin("java/lang/System", Some(OBJECT));
    system.is_final = true;
    system.fields.push(FieldSig {
        name: "out".to_string(),
        ty: Type::reference("java/io/PrintStream"),
        is_static: true,
    });

    let mut integer = builtin("java/lang/Integer", Some(OBJECT));
    integer.is_final = true;
    for name in ["MAX_VALUE", "MIN_VALUE"] {
        integer.fields.push(FieldSig {
            name: name.to_string(),
            ty: Type::Int,
            is_static: true,
        });
    }
    integer.methods = vec![
        static_method("parseInt", vec![Type::string()], Type::Int),
        static_method("toString", vec![Type::Int], Type::string()),
    ];

    let mut math = builtin("java/lang/Math", Some(OBJECT));
    math.is_final = true;
    math.methods = vec![
        static_method("abs", vec![Type::Int], Type::Int),
        static_method("max", vec![Type::Int, Type::Int], Type::Int),
        static_method("min", vec![Type::Int, Type::Int], Type::Int),
    ];

    let mut throwable = throwable_class(THROWABLE, OBJECT);
    throwable.methods = vec![
        method("getMessage", vec![], Type::string()),
        method("toString", vec![], Type::string()),
    ];

    let mut iterable = builtin(ITERABLE, Some(OBJECT));
    iterable.is_interface = true;
    iterable.is_abstract = true;
    iterable.methods = vec![abstract_method("iterator", vec![], Type::reference(ITERATOR))];

    let mut iterator = builtin(ITERATOR, Some(OBJECT));
    iterator.is_interface = true;
    iterator.is_abstract = true;
    iterator.methods = vec![
        abstract_method("hasNext", vec![], Type::Boolean),
        abstract_method("next", vec![], Type::object()),
    ];

    vec![
        object,
        string,
        builder,
        print_stream,
        system,
        integer,
        math,
        throwable,
        throwable_class("java/lang/Exception", THROWABLE),
        throwable_class(ERROR, THROWABLE),
        throwable_class(RUNTIME_EXCEPTION, "java/lang/Exception"),
        throwable_class("java/lang/NullPointerException", RUNTIME_EXCEPTION),
        throwable_class("java/lang/ArithmeticException", RUNTIME_EXCEPTION),
        throwable_class("java/lang/ArrayIndexOutOfBoundsException", RUNTIME_EXCEPTION),
        throwable_class("java/lang/IllegalArgumentException", RUNTIME_EXCEPTION),
        throwable_class("java/lang/IllegalStateException", RUNTIME_EXCEPTION),
        throwable_class("java/lang/ClassCastException", RUNTIME_EXCEPTION),
        throwable_class("java/lang/NegativeArraySizeException", RUNTIME_EXCEPTION),
        iterable,
        iterator,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_hierarchy_assignability() {
        let registry = ClassRegistry::with_builtins();
        let npe = Type::reference("java/lang/NullPointerException");
        assert!(registry.is_assignable(&npe, &Type::reference(THROWABLE)));
        assert!(registry.is_assignable(&npe, &Type::object()));
        assert!(!registry.is_assignable(&Type::reference(THROWABLE), &npe));
        assert!(registry.is_subclass("java/lang/NullPointerException", RUNTIME_EXCEPTION));
        assert!(!registry.is_subclass("java/lang/Exception", RUNTIME_EXCEPTION));
    }

    #[test]
    fn test_primitive_assignability_is_strict() {
        let registry = ClassRegistry::with_builtins();
        assert!(registry.is_assignable(&Type::Int, &Type::Int));
        assert!(registry.is_assignable(&Type::Char, &Type::Int));
        assert!(!registry.is_assignable(&Type::Int, &Type::Long));
        assert!(!registry.is_assignable(&Type::Boolean, &Type::Int));
        assert!(registry.is_assignable(&Type::Null, &Type::string()));
        assert!(!registry.is_assignable(&Type::Null, &Type::Int));
    }

    #[test]
    fn test_array_covariance_for_references_only() {
        let registry = ClassRegistry::with_builtins();
        let strings = Type::array_of(Type::string());
        let objects = Type::array_of(Type::object());
        assert!(registry.is_assignable(&strings, &objects));
        assert!(registry.is_assignable(&strings, &Type::object()));
        assert!(!registry.is_assignable(&Type::array_of(Type::Int), &objects));
    }

    #[test]
    fn test_find_method_prefers_exact_overload() {
        let registry = ClassRegistry::with_builtins();
        let found = registry
            .find_method("java/io/PrintStream", "println", &[Type::Char])
            .unwrap();
        assert_eq!(found.descriptor, "(C)V");
        let found = registry
            .find_method("java/io/PrintStream", "println", &[Type::array_of(Type::Int)])
            .unwrap();
        assert_eq!(found.descriptor, "(Ljava/lang/Object;)V");
    }

    #[test]
    fn test_interface_methods_use_interface_invocation() {
        let registry = ClassRegistry::with_builtins();
        let found = registry.find_method(ITERATOR, "hasNext", &[]).unwrap();
        assert_eq!(found.invocation, Invocation::Interface);
        let found = registry.find_method(ITERATOR, "toString", &[]).unwrap();
        assert_eq!(found.owner, OBJECT);
    }

    #[test]
    fn test_unimplemented_methods() {
        let mut registry = ClassRegistry::with_builtins();
        let mut class = ClassInfo::new("Numbers", Some(OBJECT));
        class.interfaces.push(ITERABLE.to_string());
        registry.define(class.clone());
        assert_eq!(registry.unimplemented_methods("Numbers"), vec!["iterator()"]);

        class
            .methods
            .push(MethodSig::new("iterator", vec![], Type::reference(ITERATOR)));
        registry.define(class);
        assert!(registry.unimplemented_methods("Numbers").is_empty());
    }
}
