//! # j-- 型システム
//!
//! 解決済みの型表現（[`Type`]）と、クラス・メンバの形を保持する
//! [`ClassRegistry`] を提供します。代入可能性はここで定義された半順序
//! （完全一致、`char` から `int`、参照型のサブタイプ関係）だけで判定します。

pub mod registry;
pub mod types;

pub use registry::{builtin_classes, ClassInfo, ClassRegistry, FieldSig, MethodSig};
pub use types::{
    method_descriptor, parse_method_descriptor, FieldRef, Invocation, MethodRef, Type, ERROR, ITERABLE,
    ITERATOR, OBJECT, RUNTIME_EXCEPTION, STRING, STRING_BUILDER, THROWABLE,
};
