//! # コンテキスト管理
//!
//! 名前解決に使う入れ子のスコープ（コンテキスト）を管理するモジュールです。
//! コンテキストは配列上のレコードとして保持し、親へは ID で参照します。
//! 検索は現在のコンテキストから親へ向かってたどります。

use std::collections::HashMap;
use std::fmt;

use thiserror::Error;

use crate::typesystem::Type;

/// コンテキストの ID
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContextId(usize);

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// コンテキストの種類
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContextKind {
    /// コンパイル単位（型名を保持する）
    CompilationUnit,
    /// クラス本体
    Class { name: String },
    /// メソッド本体。引数もここに置かれる。
    Method { is_static: bool, return_type: Type },
    /// ブロック・for 文・catch 節などの局所スコープ
    Local,
}

impl ContextKind {
    /// ローカル変数を置けるか
    pub fn allows_locals(&self) -> bool {
        matches!(self, ContextKind::Method { .. } | ContextKind::Local)
    }
}

/// 名前の定義
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Defn {
    /// ローカル変数（引数を含む）
    Local {
        ty: Type,
        offset: usize,
        initialized: bool,
    },
    /// 型名
    Type(Type),
}

/// 定義の登録に失敗した理由
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ContextError {
    #[error("名前 '{0}' は別のローカル変数を隠しています")]
    Shadowing(String),
    #[error("名前 '{0}' は既に定義されています")]
    Redefinition(String),
    #[error("コンテキスト {0} にはローカル変数を置けません")]
    NotLocal(ContextId),
}

#[derive(Debug)]
struct ContextRecord {
    kind: ContextKind,
    parent: Option<ContextId>,
    entries: HashMap<String, Defn>,
    /// 次に割り当てるスロット
    next_offset: usize,
    /// このコンテキスト以下で使われた最大スロット数（メソッドで意味を持つ）
    high_water: usize,
    open: bool,
}

/// コンテキストの木
#[derive(Debug)]
pub struct ContextTree {
    records: Vec<ContextRecord>,
    opened: usize,
    closed: usize,
}

impl Default for ContextTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextTree {
    /// コンパイル単位コンテキストだけを持つ木を作成
    pub fn new() -> Self {
        Self {
            records: vec![ContextRecord {
                kind: ContextKind::CompilationUnit,
                parent: None,
                entries: HashMap::new(),
                next_offset: 0,
                high_water: 0,
                open: true,
            }],
            opened: 0,
            closed: 0,
        }
    }

    pub fn root(&self) -> ContextId {
        ContextId(0)
    }

    /// 子コンテキストを開く。ローカルは親の現在のスロット位置から続ける。
    pub fn open(&mut self, parent: ContextId, kind: ContextKind) -> ContextId {
        let next_offset = match &kind {
            ContextKind::Method { is_static, .. } => usize::from(!*is_static),
            ContextKind::Local => self.records[parent.0].next_offset,
            _ => 0,
        };
        let id = ContextId(self.records.len());
        self.records.push(ContextRecord {
            kind,
            parent: Some(parent),
            entries: HashMap::new(),
            next_offset,
            high_water: next_offset,
            open: true,
        });
        self.opened += 1;
        id
    }

    /// コンテキストを閉じ、使用スロット数を親へ伝える
    pub fn close(&mut self, id: ContextId) {
        let record = &mut self.records[id.0];
        if !record.open {
            return;
        }
        record.open = false;
        self.closed += 1;
        let high_water = record.high_water;
        if let Some(parent) = record.parent {
            let parent = &mut self.records[parent.0];
            if parent.kind.allows_locals() {
                parent.high_water = parent.high_water.max(high_water);
            }
        }
    }

    pub fn kind(&self, id: ContextId) -> &ContextKind {
        &self.records[id.0].kind
    }

    pub fn parent(&self, id: ContextId) -> Option<ContextId> {
        self.records[id.0].parent
    }

    pub fn is_open(&self, id: ContextId) -> bool {
        self.records[id.0].open
    }

    /// 名前を外側へ向かって探す
    pub fn lookup(&self, id: ContextId, name: &str) -> Option<&Defn> {
        let mut current = Some(id);
        while let Some(context) = current {
            let record = &self.records[context.0];
            if let Some(defn) = record.entries.get(name) {
                return Some(defn);
            }
            current = record.parent;
        }
        None
    }

    /// 型名を探す
    pub fn lookup_type(&self, id: ContextId, name: &str) -> Option<&Type> {
        match self.lookup(id, name) {
            Some(Defn::Type(ty)) => Some(ty),
            _ => None,
        }
    }

    /// 定義を登録する。ローカル変数は、クラス境界までの開いたスコープにある
    /// 同名のローカル変数と衝突してはならない。衝突したら最初の束縛を残す。
    pub fn add_entry(&mut self, id: ContextId, name: &str, defn: Defn) -> Result<(), ContextError> {
        match &defn {
            Defn::Local { .. } => self.check_local(id, name)?,
            Defn::Type(_) => {
                if self.records[id.0].entries.contains_key(name) {
                    return Err(ContextError::Redefinition(name.to_string()));
                }
            }
        }
        self.records[id.0].entries.insert(name.to_string(), defn);
        Ok(())
    }

    /// 型名を束縛する。同じコンテキストの既存の束縛は置き換える。
    pub fn bind_type(&mut self, id: ContextId, name: &str, ty: Type) {
        self.records[id.0].entries.insert(name.to_string(), Defn::Type(ty));
    }

    /// ローカル変数を宣言してスロットを返す。宣言できなければスロットは消費しない。
    pub fn declare_local(&mut self, id: ContextId, name: &str, ty: Type, initialized: bool) -> Result<usize, ContextError> {
        self.check_local(id, name)?;
        let offset = self.next_offset(id, &ty);
        let defn = Defn::Local {
            ty,
            offset,
            initialized,
        };
        self.records[id.0].entries.insert(name.to_string(), defn);
        Ok(offset)
    }

    fn check_local(&self, id: ContextId, name: &str) -> Result<(), ContextError> {
        if !self.records[id.0].kind.allows_locals() {
            return Err(ContextError::NotLocal(id));
        }
        if self.local_in_scope(id, name) {
            return Err(ContextError::Shadowing(name.to_string()));
        }
        Ok(())
    }

    fn local_in_scope(&self, id: ContextId, name: &str) -> bool {
        let mut current = Some(id);
        while let Some(context) = current {
            let record = &self.records[context.0];
            if !record.kind.allows_locals() {
                return false;
            }
            if matches!(record.entries.get(name), Some(Defn::Local { .. })) {
                return true;
            }
            current = record.parent;
        }
        false
    }

    /// `ty` の値を置くスロットを割り当てる。long と double は 2 スロット使う。
    pub fn next_offset(&mut self, id: ContextId, ty: &Type) -> usize {
        let record = &mut self.records[id.0];
        let offset = record.next_offset;
        record.next_offset += ty.slot_size().max(1);
        record.high_water = record.high_water.max(record.next_offset);
        offset
    }

    /// 現在のスロット位置
    pub fn current_offset(&self, id: ContextId) -> usize {
        self.records[id.0].next_offset
    }

    /// スロット位置を進める（引数領域の確保などに使う）
    pub fn reserve_until(&mut self, id: ContextId, offset: usize) {
        let record = &mut self.records[id.0];
        record.next_offset = record.next_offset.max(offset);
        record.high_water = record.high_water.max(record.next_offset);
    }

    /// ローカル変数を初期化済みにする
    pub fn set_initialized(&mut self, id: ContextId, name: &str) {
        let mut current = Some(id);
        while let Some(context) = current {
            let record = &mut self.records[context.0];
            if let Some(Defn::Local { initialized, .. }) = record.entries.get_mut(name) {
                *initialized = true;
                return;
            }
            current = record.parent;
        }
    }

    /// このコンテキスト以下で使われたスロット数
    pub fn max_locals(&self, id: ContextId) -> usize {
        self.records[id.0].high_water
    }

    /// 囲んでいるメソッドの情報
    pub fn enclosing_method(&self, id: ContextId) -> Option<(bool, &Type)> {
        let mut current = Some(id);
        while let Some(context) = current {
            let record = &self.records[context.0];
            if let ContextKind::Method { is_static, return_type } = &record.kind {
                return Some((*is_static, return_type));
            }
            current = record.parent;
        }
        None
    }

    pub fn open_count(&self) -> usize {
        self.opened
    }

    pub fn close_count(&self) -> usize {
        self.closed
    }

    /// 開いたコンテキストがすべて閉じているか
    pub fn is_balanced(&self) -> bool {
        self.opened == self.closed
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn method_context(tree: &mut ContextTree) -> ContextId {
        let class = tree.open(tree.root(), ContextKind::Class { name: "A".to_string() });
        tree.open(
            class,
            ContextKind::Method {
                is_static: false,
                return_type: Type::Void,
            },
        )
    }

    #[test]
    fn test_lookup_walks_outward() {
        let mut tree = ContextTree::new();
        tree.add_entry(tree.root(), "A", Defn::Type(Type::reference("A"))).unwrap();
        let method = method_context(&mut tree);
        let block = tree.open(method, ContextKind::Local);
        assert_eq!(tree.lookup_type(block, "A"), Some(&Type::reference("A")));
        assert!(tree.lookup(block, "missing").is_none());
    }

    #[test]
    fn test_shadowing_keeps_first_binding() {
        let mut tree = ContextTree::new();
        let method = method_context(&mut tree);
        let outer = tree.open(method, ContextKind::Local);
        assert_eq!(tree.declare_local(outer, "x", Type::Int, true), Ok(1));
        let inner = tree.open(outer, ContextKind::Local);
        assert_eq!(
            tree.declare_local(inner, "x", Type::Double, true),
            Err(ContextError::Shadowing("x".to_string()))
        );
        assert!(matches!(tree.lookup(inner, "x"), Some(Defn::Local { ty: Type::Int, .. })));
    }

    #[test]
    fn test_rejected_declaration_keeps_slot_free() {
        let mut tree = ContextTree::new();
        let method = method_context(&mut tree);
        let block = tree.open(method, ContextKind::Local);
        assert_eq!(tree.declare_local(block, "x", Type::Int, true), Ok(1));
        assert!(tree.declare_local(block, "x", Type::Long, true).is_err());
        assert_eq!(tree.declare_local(block, "y", Type::Int, true), Ok(2));
        assert_eq!(
            tree.declare_local(tree.root(), "z", Type::Int, true),
            Err(ContextError::NotLocal(tree.root()))
        );
    }

    #[test]
    fn test_sibling_scopes_reuse_slots() {
        let mut tree = ContextTree::new();
        let method = method_context(&mut tree);
        let first = tree.open(method, ContextKind::Local);
        assert_eq!(tree.declare_local(first, "a", Type::Long, true), Ok(1));
        assert_eq!(tree.declare_local(first, "b", Type::Int, true), Ok(3));
        tree.close(first);
        let second = tree.open(method, ContextKind::Local);
        assert_eq!(tree.declare_local(second, "c", Type::Int, true), Ok(1));
        tree.close(second);
        tree.close(method);
        assert_eq!(tree.max_locals(method), 4);
    }

    #[test]
    fn test_static_method_starts_at_zero() {
        let mut tree = ContextTree::new();
        let class = tree.open(tree.root(), ContextKind::Class { name: "A".to_string() });
        let method = tree.open(
            class,
            ContextKind::Method {
                is_static: true,
                return_type: Type::Int,
            },
        );
        assert_eq!(tree.declare_local(method, "args", Type::array_of(Type::string()), true), Ok(0));
        assert_eq!(tree.enclosing_method(method), Some((true, &Type::Int)));
    }

    #[test]
    fn test_locals_rejected_outside_methods() {
        let mut tree = ContextTree::new();
        let root = tree.root();
        assert!(matches!(
            tree.declare_local(root, "x", Type::Int, true),
            Err(ContextError::NotLocal(_))
        ));
    }

    #[test]
    fn test_open_close_balance() {
        let mut tree = ContextTree::new();
        let method = method_context(&mut tree);
        assert!(!tree.is_balanced());
        let class = tree.parent(method).unwrap();
        tree.close(method);
        tree.close(method);
        tree.close(class);
        assert!(tree.is_balanced());
        assert_eq!(tree.open_count(), 2);
    }
}
