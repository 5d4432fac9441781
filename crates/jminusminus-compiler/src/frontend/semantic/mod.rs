//! # 意味解析モジュール
//!
//! 構文解析で生成された抽象構文木に対して、名前解決、型検査、
//! 構文糖の展開を行います。解析は二段階です。
//!
//! 1. 事前解析（[`Analyzer::pre_analyze`]）: すべての型とメンバの形を
//!    クラス登録簿に登録し、前方参照を解決できるようにする
//! 2. 本解析（[`Analyzer::analyze`]）: メソッド本体を解析し、各式に型を付け、
//!    拡張 for 文などを基本的な構文へ書き換える
//!
//! 解析はノードを受け取って新しいノードを返す変換として書かれています。
//! 型の付いた式は解析済みとみなされ、再解析されません。

use log::{debug, info};

use crate::diagnostics::Diagnostics;
use crate::frontend::ast::{AnalysisState, CompilationUnit, Member, MethodDeclaration, Modifier, TypeName};
use crate::frontend::error::{CompilerError, ErrorKind, Result};
use crate::typesystem::{
    method_descriptor, ClassInfo, ClassRegistry, FieldSig, MethodSig, Type, OBJECT, THROWABLE,
};

pub mod context;

mod declaration;
mod expression;
mod statement;

pub use context::{ContextError, ContextId, ContextKind, ContextTree, Defn};

/// 解析中のクラス
#[derive(Debug, Clone)]
struct ClassScope {
    name: String,
    super_name: Option<String>,
}

/// 意味解析器
pub struct Analyzer<'d> {
    diagnostics: &'d mut Diagnostics,
    registry: ClassRegistry,
    contexts: ContextTree,
    /// クラスの内部名にパッケージ名を付けるか
    package_prefix: bool,
    class: Option<ClassScope>,
    /// 解析中のメソッドが宣言する throws
    throws: Vec<Type>,
    /// 初期化子・初期化ブロックの解析中か
    in_initializer: bool,
    /// 次に解析する式が this(...)/super(...) であってよいか
    allow_construction: bool,
}

impl<'d> Analyzer<'d> {
    /// 組み込みクラスを登録済みの解析器を作成
    pub fn new(diagnostics: &'d mut Diagnostics) -> Self {
        Self {
            diagnostics,
            registry: ClassRegistry::with_builtins(),
            contexts: ContextTree::new(),
            package_prefix: true,
            class: None,
            throws: Vec::new(),
            in_initializer: false,
            allow_construction: false,
        }
    }

    /// クラスの内部名にパッケージ名を付けるかを設定
    pub fn with_package_prefix(mut self, package_prefix: bool) -> Self {
        self.package_prefix = package_prefix;
        self
    }

    pub fn registry(&self) -> &ClassRegistry {
        &self.registry
    }

    pub fn contexts(&self) -> &ContextTree {
        &self.contexts
    }

    /// 登録簿とコンテキスト木を取り出す
    pub fn into_parts(self) -> (ClassRegistry, ContextTree) {
        (self.registry, self.contexts)
    }

    fn error(&mut self, line: usize, message: impl Into<String>) {
        self.diagnostics.error(ErrorKind::Semantic, line, message);
    }

    fn unsupported(&mut self, line: usize, construct: &str) {
        self.diagnostics.error(
            ErrorKind::Unsupported,
            line,
            format!("未実装の構文です: {}", construct),
        );
    }

    /// 事前解析。型とメンバの形を登録する。
    pub fn pre_analyze(&mut self, unit: &mut CompilationUnit) -> Result<()> {
        if unit.state != AnalysisState::Parsed {
            return Err(CompilerError::AlreadyAnalyzed);
        }
        debug!("事前解析開始: {}", unit.file_name);
        let root = self.contexts.root();

        let java_lang: Vec<String> = self
            .registry
            .classes()
            .map(|c| c.name.clone())
            .filter(|name| name.strip_prefix("java/lang/").map_or(false, |rest| !rest.contains('/')))
            .collect();
        for name in java_lang {
            let simple = simple_name(&name).to_string();
            self.contexts.bind_type(root, &simple, Type::Reference(name));
        }

        for import in &unit.imports {
            let internal = import.name.replace('.', "/");
            if !self.registry.contains(&internal) {
                self.diagnostics.error(
                    ErrorKind::Semantic,
                    import.line,
                    format!("インポートされた型 '{}' が見つかりません", import.name),
                );
                continue;
            }
            let simple = simple_name(&internal).to_string();
            // 同じ単純名の再インポートは後勝ち
            self.contexts.bind_type(root, &simple, Type::Reference(internal));
        }

        for class in &mut unit.type_declarations {
            let internal = match (&unit.package, self.package_prefix) {
                (Some(package), true) => format!("{}/{}", package.replace('.', "/"), class.name),
                _ => class.name.clone(),
            };
            if self.registry.get(&internal).map_or(false, |c| !c.is_builtin) {
                let message = format!("型 '{}' は既に定義されています", class.name);
                self.error(class.line, message);
            }
            self.contexts.bind_type(root, &class.name, Type::Reference(internal.clone()));
            let mut info = ClassInfo::new(&internal, Some(OBJECT));
            info.is_interface = class.is_interface;
            info.is_abstract = class.modifiers.is_abstract();
            info.is_final = class.modifiers.contains(Modifier::Final);
            self.registry.define(info);
            class.internal_name = Some(internal);
        }

        for class in &mut unit.type_declarations {
            let internal = class.internal_name().to_string();
            let (super_name, interfaces) = self.resolve_supertypes(class.line, class.is_interface, class.super_class.as_ref(), &class.interfaces);
            if let Some(info) = self.registry.get_mut(&internal) {
                info.super_name = super_name;
                info.interfaces = interfaces;
            }
        }

        for class in &mut unit.type_declarations {
            let internal = class.internal_name().to_string();
            let super_name = self.registry.get(&internal).and_then(|c| c.super_name.clone());
            if let Some(super_name) = super_name {
                if self.registry.lineage(&super_name).contains(&internal) {
                    let message = format!("クラス '{}' の継承が循環しています", class.name);
                    self.error(class.line, message);
                    if let Some(info) = self.registry.get_mut(&internal) {
                        info.super_name = Some(OBJECT.to_string());
                    }
                }
            }
            self.pre_analyze_members(class.line, &internal, class.is_interface, &mut class.members, &class.name);
        }

        unit.state = AnalysisState::PreAnalyzed;
        info!(
            "事前解析完了: {} ({}個の型)",
            unit.file_name,
            unit.type_declarations.len()
        );
        Ok(())
    }

    fn resolve_supertypes(
        &mut self,
        line: usize,
        is_interface: bool,
        super_class: Option<&TypeName>,
        interfaces: &[TypeName],
    ) -> (Option<String>, Vec<String>) {
        let root = self.contexts.root();
        let mut super_name = Some(OBJECT.to_string());
        if let Some(type_name) = super_class {
            match self.resolve_type(type_name, root) {
                Type::Reference(name) if self.registry.is_interface(&name) => {
                    let message = format!("インターフェース '{}' は継承できません（implements を使ってください）", type_name);
                    self.error(line, message);
                }
                Type::Reference(name) => {
                    if self.registry.get(&name).map_or(false, |c| c.is_final) {
                        let message = format!("final クラス '{}' は継承できません", type_name);
                        self.error(line, message);
                    }
                    super_name = Some(name);
                }
                Type::Any => {}
                other => {
                    let message = format!("型 '{}' は継承できません", other);
                    self.error(line, message);
                }
            }
        }
        let mut resolved = Vec::new();
        for type_name in interfaces {
            match self.resolve_type(type_name, root) {
                Type::Reference(name) if self.registry.is_interface(&name) => resolved.push(name),
                Type::Any => {}
                other => {
                    let message = if is_interface {
                        format!("インターフェースが継承できるのはインターフェースだけです: '{}'", other)
                    } else {
                        format!("'{}' はインターフェースではありません", other)
                    };
                    self.error(line, message);
                }
            }
        }
        (super_name, resolved)
    }

    fn pre_analyze_members(&mut self, line: usize, internal: &str, is_interface: bool, members: &mut Vec<Member>, class_name: &str) {
        let root = self.contexts.root();
        let mut fields = Vec::new();
        let mut methods: Vec<MethodSig> = Vec::new();
        let mut constructors: Vec<MethodSig> = Vec::new();
        let is_abstract_class = self.registry.get(internal).map_or(false, |c| c.is_abstract);

        for member in members.iter_mut() {
            match member {
                Member::Field(field) => {
                    for declarator in &mut field.declarators {
                        let ty = self.resolve_type(&declarator.type_name, root);
                        if ty == Type::Void {
                            self.error(declarator.line, format!("フィールド '{}' に void 型は使えません", declarator.name));
                        }
                        if fields.iter().any(|f: &FieldSig| f.name == declarator.name) {
                            self.error(declarator.line, format!("フィールド '{}' は既に定義されています", declarator.name));
                            continue;
                        }
                        declarator.ty = Some(ty.clone());
                        fields.push(FieldSig {
                            name: declarator.name.clone(),
                            ty,
                            is_static: field.modifiers.is_static(),
                        });
                    }
                }
                Member::Method(method) => {
                    let sig = self.pre_analyze_method(method, is_interface, is_abstract_class, class_name);
                    let list = if method.is_constructor() { &mut constructors } else { &mut methods };
                    if list.iter().any(|m| m.name == sig.name && m.params == sig.params) {
                        let message = format!("メソッド '{}' は既に定義されています", sig.signature());
                        self.error(method.line, message);
                        continue;
                    }
                    list.push(sig);
                }
                Member::Initializer(_) => {}
                Member::Type(inner) => {
                    let construct = format!("入れ子の型宣言 '{}'", inner.name);
                    self.unsupported(inner.line, &construct);
                }
            }
        }

        if !is_interface && constructors.is_empty() {
            debug!("暗黙のコンストラクタを追加: {}", internal);
            constructors.push(MethodSig::new("<init>", Vec::new(), Type::Void));
            members.push(Member::Method(implicit_constructor(line, class_name)));
        }

        if let Some(info) = self.registry.get_mut(internal) {
            info.fields = fields;
            info.methods = methods;
            info.constructors = constructors;
        }
    }

    fn pre_analyze_method(&mut self, method: &mut MethodDeclaration, is_interface: bool, is_abstract_class: bool, class_name: &str) -> MethodSig {
        let root = self.contexts.root();
        let params: Vec<Type> = method
            .parameters
            .iter()
            .map(|p| self.resolve_type(&p.type_name, root))
            .collect::<Vec<_>>();
        for (parameter, ty) in method.parameters.iter().zip(&params) {
            if *ty == Type::Void {
                self.error(parameter.line, format!("引数 '{}' に void 型は使えません", parameter.name));
            }
        }
        let return_type = self.resolve_type(&method.return_type, root);
        let mut exceptions = Vec::new();
        for type_name in &method.throws {
            match self.resolve_type(type_name, root) {
                Type::Reference(name) if self.registry.is_subclass(&name, THROWABLE) => exceptions.push(name),
                Type::Any => {}
                other => {
                    let message = format!("throws に書けるのは Throwable の派生型だけです: '{}'", other);
                    self.error(type_name.line, message);
                }
            }
        }

        if method.is_constructor() && method.name != class_name {
            let message = format!("戻り値の型がありません（コンストラクタ名 '{}' がクラス名と異なります）", method.name);
            self.error(method.line, message);
        }
        if method.modifiers.contains(Modifier::Native) {
            self.unsupported(method.line, "native メソッド");
        }
        let is_abstract = method.modifiers.is_abstract();
        match (&method.body, is_abstract) {
            (Some(_), true) => {
                let message = format!("抽象メソッド '{}' は本体を持てません", method.name);
                self.error(method.line, message);
            }
            (None, false) if !method.modifiers.contains(Modifier::Native) => {
                let message = format!("メソッド '{}' に本体がありません", method.name);
                self.error(method.line, message);
            }
            _ => {}
        }
        if is_abstract && !is_interface && !is_abstract_class {
            let message = format!("抽象メソッド '{}' は抽象クラスにしか宣言できません", method.name);
            self.error(method.line, message);
        }
        if is_interface && method.body.is_some() {
            let message = format!("インターフェースのメソッド '{}' は本体を持てません", method.name);
            self.error(method.line, message);
        }

        method.descriptor = Some(method_descriptor(&params, &return_type));
        method.exceptions = exceptions;
        let name = if method.is_constructor() { "<init>" } else { method.name.as_str() };
        MethodSig {
            is_static: method.modifiers.is_static(),
            is_abstract,
            ..MethodSig::new(name, params, return_type)
        }
    }

    /// 型名を解決する。解決できなければ報告して `Any` を返す。
    fn resolve_type(&mut self, type_name: &TypeName, context: ContextId) -> Type {
        if type_name.is_erroneous() {
            return Type::Any;
        }
        let base = match type_name.name.as_str() {
            "int" => Some(Type::Int),
            "long" => Some(Type::Long),
            "float" => Some(Type::Float),
            "double" => Some(Type::Double),
            "char" => Some(Type::Char),
            "boolean" => Some(Type::Boolean),
            "void" => Some(Type::Void),
            name => self.find_class(name, context).map(Type::Reference),
        };
        match base {
            Some(Type::Void) if type_name.dimensions > 0 => {
                self.error(type_name.line, "void の配列は作れません");
                Type::Any
            }
            Some(base) => Type::with_dimensions(base, type_name.dimensions),
            None => {
                let message = format!("型 '{}' が見つかりません", type_name.name);
                self.error(type_name.line, message);
                Type::Any
            }
        }
    }

    /// ドット区切りまたは単純なクラス名から内部名を探す（報告しない）
    fn find_class(&self, name: &str, context: ContextId) -> Option<String> {
        if name.contains('.') {
            let internal = name.replace('.', "/");
            return self.registry.contains(&internal).then_some(internal);
        }
        match self.contexts.lookup_type(context, name) {
            Some(Type::Reference(internal)) => Some(internal.clone()),
            _ => None,
        }
    }

    /// 本解析。未解析なら事前解析から行う。解析済みの単位は受け付けない。
    pub fn analyze(&mut self, unit: &mut CompilationUnit) -> Result<()> {
        match unit.state {
            AnalysisState::Analyzed => return Err(CompilerError::AlreadyAnalyzed),
            AnalysisState::Parsed => self.pre_analyze(unit)?,
            AnalysisState::PreAnalyzed => {}
        }
        debug!("意味解析開始: {}", unit.file_name);
        let errors_before = self.diagnostics.error_count();
        let classes = std::mem::take(&mut unit.type_declarations);
        unit.type_declarations = classes
            .into_iter()
            .map(|class| self.analyze_class(class))
            .collect();
        unit.state = AnalysisState::Analyzed;
        info!(
            "意味解析完了: {} (新たなエラー{}件, コンテキスト{}個)",
            unit.file_name,
            self.diagnostics.error_count() - errors_before,
            self.contexts.len()
        );
        Ok(())
    }
}

/// 内部名の最後の要素
fn simple_name(internal: &str) -> &str {
    internal.rsplit('/').next().unwrap_or(internal)
}

/// 引数なしで super() を呼ぶだけの public コンストラクタ
fn implicit_constructor(line: usize, class_name: &str) -> MethodDeclaration {
    use crate::frontend::ast::{Block, MethodKind, Modifiers};
    MethodDeclaration {
        line,
        modifiers: Modifiers::new().with(Modifier::Public),
        kind: MethodKind::Constructor,
        name: class_name.to_string(),
        return_type: TypeName::new(line, "void"),
        parameters: Vec::new(),
        throws: Vec::new(),
        body: Some(Block::new(line, Vec::new())),
        descriptor: Some("()V".to_string()),
        exceptions: Vec::new(),
    }
}
