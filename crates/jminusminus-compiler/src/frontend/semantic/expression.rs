//! 式の解析。各式に型を付け、曖昧な名前を分類し直す。

use crate::frontend::ast::{
    AssignOp, BinaryOp, Expression, ExpressionKind, IncrementOp, Literal, LiteralKind, TypeName, UnaryOp,
};
use crate::typesystem::{Invocation, Type, OBJECT};

use super::{Analyzer, ContextId, Defn};

/// 曖昧な接頭辞を分類し直した結果
enum Qualifier {
    /// 値（ローカル変数・フィールドの連鎖）
    Value(Expression),
    /// クラス名（内部名）
    Class(String),
}

/// 代入・インクリメントの対象になれる解析済みの式か
fn is_variable(expression: &Expression) -> bool {
    matches!(
        expression.kind,
        ExpressionKind::Variable { slot: Some(_), .. }
            | ExpressionKind::FieldSelection { field: Some(_), .. }
            | ExpressionKind::ArrayAccess { .. }
    )
}

fn type_list(types: &[Type]) -> String {
    types.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

impl<'d> Analyzer<'d> {
    pub(super) fn analyze_expression(&mut self, expression: Expression, context: ContextId) -> Expression {
        if expression.is_analyzed() {
            return expression;
        }
        let allow_construction = std::mem::replace(&mut self.allow_construction, false);
        let line = expression.line;
        match expression.kind {
            ExpressionKind::Literal(literal) => self.analyze_literal(line, literal),
            ExpressionKind::Variable { name, .. } => self.analyze_name(line, name, context, true),
            ExpressionKind::This => {
                self.check_instance_context(line, context, "this");
                Expression::typed(line, ExpressionKind::This, self.current_class_type())
            }
            ExpressionKind::Super => {
                self.check_instance_context(line, context, "super");
                let ty = self
                    .class
                    .as_ref()
                    .and_then(|c| c.super_name.as_deref())
                    .map_or(Type::Any, Type::reference);
                Expression::typed(line, ExpressionKind::Super, ty)
            }
            ExpressionKind::Binary { op, lhs, rhs } => {
                let lhs = self.analyze_expression(*lhs, context);
                let rhs = self.analyze_expression(*rhs, context);
                let ty = self.binary_result(line, op, lhs.ty(), rhs.ty());
                Expression::typed(
                    line,
                    ExpressionKind::Binary {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                    ty,
                )
            }
            ExpressionKind::Unary { op, operand } => self.analyze_unary(line, op, *operand, context),
            ExpressionKind::Increment { op, operand } => self.analyze_increment(line, op, *operand, context),
            ExpressionKind::Assign { op, lhs, rhs } => self.analyze_assignment(line, op, *lhs, *rhs, context),
            ExpressionKind::Conditional {
                condition,
                then_part,
                else_part,
            } => self.analyze_conditional(line, *condition, *then_part, *else_part, context),
            ExpressionKind::Message {
                target,
                ambiguous,
                name,
                arguments,
                ..
            } => self.analyze_message(line, target, ambiguous, name, arguments, context),
            ExpressionKind::FieldSelection {
                target, ambiguous, name, ..
            } => {
                let qualifier = match (target, ambiguous) {
                    (Some(target), _) => Qualifier::Value(self.analyze_expression(*target, context)),
                    (None, Some(prefix)) => self.reclassify(line, &prefix, context),
                    (None, None) => return self.analyze_name(line, name, context, true),
                };
                self.select_field(line, qualifier, &name)
            }
            ExpressionKind::ArrayLength(array) => {
                let array = self.analyze_expression(*array, context);
                if !array.ty().is_array() && !array.ty().is_any() {
                    let message = format!("'{}' は配列ではありません", array.ty());
                    self.error(line, message);
                }
                Expression::typed(line, ExpressionKind::ArrayLength(Box::new(array)), Type::Int)
            }
            ExpressionKind::ArrayAccess { array, index } => {
                let array = self.analyze_expression(*array, context);
                let index = self.analyze_expression(*index, context);
                let ty = match array.ty() {
                    Type::Array(element) => (**element).clone(),
                    Type::Any => Type::Any,
                    other => {
                        let message = format!("'{}' は配列ではありません", other);
                        self.error(line, message);
                        Type::Any
                    }
                };
                self.check_index(&index);
                Expression::typed(
                    line,
                    ExpressionKind::ArrayAccess {
                        array: Box::new(array),
                        index: Box::new(index),
                    },
                    ty,
                )
            }
            ExpressionKind::Cast { type_name, operand } => {
                let target = self.resolve_type(&type_name, context);
                let operand = self.analyze_expression(*operand, context);
                if !self.is_castable(operand.ty(), &target) {
                    let message = format!("型 '{}' を '{}' にキャストできません", operand.ty(), target);
                    self.error(line, message);
                }
                Expression::typed(
                    line,
                    ExpressionKind::Cast {
                        type_name,
                        operand: Box::new(operand),
                    },
                    target,
                )
            }
            ExpressionKind::InstanceOf { operand, type_name } => {
                let operand = self.analyze_expression(*operand, context);
                let target = self.resolve_type(&type_name, context);
                let from = operand.ty();
                if !from.is_reference() && !from.is_any() {
                    let message = format!("instanceof の左辺は参照型でなければなりません: '{}'", from);
                    self.error(line, message);
                } else if !target.is_reference() && !target.is_any() {
                    let message = format!("instanceof の右辺は参照型でなければなりません: '{}'", target);
                    self.error(line, message);
                } else if !self.is_castable(from, &target) {
                    let message = format!("型 '{}' と '{}' は互換性がありません", from, target);
                    self.error(line, message);
                }
                // コード生成が名前を解決し直さずに済むよう、解決済みの型名に置き換える
                let type_name = if target.is_any() {
                    type_name
                } else {
                    TypeName::from_type(&target, type_name.line)
                };
                Expression::typed(
                    line,
                    ExpressionKind::InstanceOf {
                        operand: Box::new(operand),
                        type_name,
                    },
                    Type::Boolean,
                )
            }
            ExpressionKind::New {
                type_name, arguments, ..
            } => self.analyze_new(line, type_name, arguments, context),
            ExpressionKind::NewArray {
                type_name,
                dimensions,
            } => {
                let ty = self.resolve_type(&type_name, context);
                let dimensions: Vec<Expression> = dimensions
                    .into_iter()
                    .map(|d| self.analyze_expression(d, context))
                    .collect();
                for dimension in &dimensions {
                    self.check_index(dimension);
                }
                Expression::typed(
                    line,
                    ExpressionKind::NewArray {
                        type_name,
                        dimensions,
                    },
                    ty,
                )
            }
            ExpressionKind::ArrayInitializer { type_name, elements } => {
                self.analyze_array_initializer(line, type_name, elements, context)
            }
            ExpressionKind::ThisConstruction { arguments, .. } => {
                self.analyze_construction(line, true, arguments, allow_construction, context)
            }
            ExpressionKind::SuperConstruction { arguments, .. } => {
                self.analyze_construction(line, false, arguments, allow_construction, context)
            }
            ExpressionKind::Wild => Expression::typed(line, ExpressionKind::Wild, Type::Any),
        }
    }

    /// 条件式を解析する。boolean でなければ報告する。
    pub(super) fn analyze_condition(&mut self, condition: Expression, context: ContextId) -> Expression {
        let condition = self.analyze_expression(condition, context);
        if !matches!(condition.ty(), Type::Boolean | Type::Any) {
            let message = format!("条件式は boolean でなければなりません: '{}'", condition.ty());
            self.error(condition.line, message);
        }
        condition
    }

    /// `from` 型の値を `to` 型の場所に置けるか検査する
    pub(super) fn check_assignable(&mut self, line: usize, from: &Type, to: &Type) {
        if *from == Type::Void {
            self.error(line, "void の値は使えません");
        } else if !self.registry.is_assignable(from, to) {
            let message = format!("型 '{}' の値を '{}' 型に代入できません", from, to);
            self.error(line, message);
        }
    }

    fn check_index(&mut self, index: &Expression) {
        if index.ty().promoted() != Type::Int && !index.ty().is_any() {
            let message = format!("配列の添字・長さは int でなければなりません: '{}'", index.ty());
            self.error(index.line, message);
        }
    }

    fn current_class_type(&self) -> Type {
        self.class
            .as_ref()
            .map_or(Type::Any, |c| Type::reference(&c.name))
    }

    fn is_static_context(&self, context: ContextId) -> bool {
        self.contexts
            .enclosing_method(context)
            .map_or(true, |(is_static, _)| is_static)
    }

    fn check_instance_context(&mut self, line: usize, context: ContextId, what: &str) {
        if self.is_static_context(context) {
            let message = format!("static コンテキストでは '{}' を使えません", what);
            self.error(line, message);
        }
    }

    fn analyze_literal(&mut self, line: usize, literal: Literal) -> Expression {
        let (ty, valid) = match literal.kind {
            LiteralKind::Int => (Type::Int, literal.int_value().is_some()),
            LiteralKind::Long => (Type::Long, literal.long_value().is_some()),
            LiteralKind::Float => (Type::Float, literal.float_value().is_some()),
            LiteralKind::Double => (Type::Double, literal.double_value().is_some()),
            LiteralKind::Char => (Type::Char, literal.char_value().is_some()),
            LiteralKind::String => (Type::string(), true),
            LiteralKind::Boolean => (Type::Boolean, true),
            LiteralKind::Null => (Type::Null, true),
        };
        if !valid {
            let message = format!("リテラル '{}' は '{}' 型の範囲外です", literal.image, ty);
            self.error(line, message);
        }
        Expression::typed(line, ExpressionKind::Literal(literal), ty)
    }

    /// 単純名を解決する。ローカル変数、次にフィールドの順に探す。
    fn analyze_name(&mut self, line: usize, name: String, context: ContextId, must_be_initialized: bool) -> Expression {
        if let Some(Defn::Local {
            ty,
            offset,
            initialized,
        }) = self.contexts.lookup(context, &name).cloned()
        {
            if must_be_initialized && !initialized {
                let message = format!("変数 '{}' は初期化されていない可能性があります", name);
                self.error(line, message);
            }
            return Expression::typed(
                line,
                ExpressionKind::Variable {
                    name,
                    slot: Some(offset),
                },
                ty,
            );
        }
        let class = self.class.as_ref().map(|c| c.name.clone());
        if let Some(field) = class.and_then(|c| self.registry.find_field(&c, &name)) {
            let target = if field.is_static {
                None
            } else {
                if self.is_static_context(context) {
                    let message = format!("static コンテキストからインスタンスフィールド '{}' は参照できません", name);
                    self.error(line, message);
                }
                Some(Box::new(Expression::typed(line, ExpressionKind::This, self.current_class_type())))
            };
            let ty = field.ty.clone();
            return Expression::typed(
                line,
                ExpressionKind::FieldSelection {
                    target,
                    ambiguous: None,
                    name,
                    field: Some(field),
                },
                ty,
            );
        }
        let message = format!("名前 '{}' が見つかりません", name);
        self.error(line, message);
        Expression::typed(line, ExpressionKind::Variable { name, slot: None }, Type::Any)
    }

    /// `a.b.c` の `a.b` を、ローカル変数・フィールド・最長のクラス名の順に分類する
    fn reclassify(&mut self, line: usize, prefix: &str, context: ContextId) -> Qualifier {
        let segments: Vec<&str> = prefix.split('.').collect();
        let first = segments[0];
        let is_value = matches!(self.contexts.lookup(context, first), Some(Defn::Local { .. }))
            || self
                .class
                .as_ref()
                .map_or(false, |c| self.registry.find_field(&c.name, first).is_some());

        let (mut qualifier, rest) = if is_value {
            let value = self.analyze_name(line, first.to_string(), context, true);
            (Qualifier::Value(value), &segments[1..])
        } else {
            let found = (1..=segments.len())
                .rev()
                .find_map(|k| self.find_class(&segments[..k].join("."), context).map(|class| (class, k)));
            match found {
                Some((class, k)) => (Qualifier::Class(class), &segments[k..]),
                None => {
                    let message = format!("名前 '{}' が見つかりません", prefix);
                    self.error(line, message);
                    return Qualifier::Value(Expression::typed(line, ExpressionKind::Wild, Type::Any));
                }
            }
        };
        for segment in rest {
            qualifier = Qualifier::Value(self.select_field(line, qualifier, segment));
        }
        qualifier
    }

    /// 修飾子からフィールドを選ぶ。配列の `length` は専用の式になる。
    fn select_field(&mut self, line: usize, qualifier: Qualifier, name: &str) -> Expression {
        let wild = |name: &str| {
            Expression::typed(
                line,
                ExpressionKind::FieldSelection {
                    target: None,
                    ambiguous: None,
                    name: name.to_string(),
                    field: None,
                },
                Type::Any,
            )
        };
        match qualifier {
            Qualifier::Class(class) => match self.registry.find_field(&class, name) {
                Some(field) if field.is_static => {
                    let ty = field.ty.clone();
                    Expression::typed(
                        line,
                        ExpressionKind::FieldSelection {
                            target: None,
                            ambiguous: None,
                            name: name.to_string(),
                            field: Some(field),
                        },
                        ty,
                    )
                }
                Some(_) => {
                    let message = format!("インスタンスフィールド '{}' を static に参照できません", name);
                    self.error(line, message);
                    wild(name)
                }
                None => {
                    let message = format!("クラス '{}' にフィールド '{}' がありません", Type::Reference(class), name);
                    self.error(line, message);
                    wild(name)
                }
            },
            Qualifier::Value(target) => match target.ty().clone() {
                Type::Array(_) if name == "length" => {
                    Expression::typed(line, ExpressionKind::ArrayLength(Box::new(target)), Type::Int)
                }
                Type::Any => wild(name),
                Type::Reference(class) => match self.registry.find_field(&class, name) {
                    Some(field) => {
                        let ty = field.ty.clone();
                        let target = (!field.is_static).then(|| Box::new(target));
                        Expression::typed(
                            line,
                            ExpressionKind::FieldSelection {
                                target,
                                ambiguous: None,
                                name: name.to_string(),
                                field: Some(field),
                            },
                            ty,
                        )
                    }
                    None => {
                        let message = format!("型 '{}' にフィールド '{}' がありません", Type::Reference(class), name);
                        self.error(line, message);
                        wild(name)
                    }
                },
                other => {
                    let message = format!("型 '{}' にフィールド '{}' はありません", other, name);
                    self.error(line, message);
                    wild(name)
                }
            },
        }
    }

    /// メソッドを呼び出せる型ならその探索先クラスを返す
    fn receiver_class(&mut self, line: usize, ty: &Type) -> Option<String> {
        match ty {
            Type::Reference(class) => Some(class.clone()),
            Type::Array(_) => Some(OBJECT.to_string()),
            Type::Any => None,
            other => {
                let message = format!("型 '{}' の値に対してメソッドは呼び出せません", other);
                self.error(line, message);
                None
            }
        }
    }

    fn analyze_message(
        &mut self,
        line: usize,
        target: Option<Box<Expression>>,
        ambiguous: Option<String>,
        name: String,
        arguments: Vec<Expression>,
        context: ContextId,
    ) -> Expression {
        let arguments: Vec<Expression> = arguments
            .into_iter()
            .map(|a| self.analyze_expression(a, context))
            .collect();
        let arg_types: Vec<Type> = arguments.iter().map(|a| a.ty().clone()).collect();
        let unresolved = |target: Option<Expression>, name: String, arguments: Vec<Expression>| {
            Expression::typed(
                line,
                ExpressionKind::Message {
                    target: target.map(Box::new),
                    ambiguous: None,
                    name,
                    arguments,
                    method: None,
                },
                Type::Any,
            )
        };

        let qualifier = match (target, ambiguous) {
            (Some(target), _) => Some(Qualifier::Value(self.analyze_expression(*target, context))),
            (None, Some(prefix)) => Some(self.reclassify(line, &prefix, context)),
            (None, None) => None,
        };
        let (target, class, via_type) = match qualifier {
            Some(Qualifier::Value(target)) => match self.receiver_class(line, target.ty()) {
                Some(class) => (Some(target), class, false),
                None => return unresolved(Some(target), name, arguments),
            },
            Some(Qualifier::Class(class)) => (None, class, true),
            None => match self.class.as_ref() {
                Some(scope) => (None, scope.name.clone(), false),
                None => return unresolved(None, name, arguments),
            },
        };
        let is_super = target
            .as_ref()
            .map_or(false, |t| matches!(t.kind, ExpressionKind::Super));

        let Some(mut method) = self.registry.find_method(&class, &name, &arg_types) else {
            let message = format!(
                "メソッド '{}({})' が型 '{}' に見つかりません",
                name,
                type_list(&arg_types),
                Type::Reference(class)
            );
            self.error(line, message);
            return unresolved(target, name, arguments);
        };

        let target = if method.is_static() {
            None
        } else {
            match target {
                Some(target) => Some(Box::new(target)),
                None => {
                    if via_type {
                        let message = format!("static でないメソッド '{}' を static に参照できません", name);
                        self.error(line, message);
                    } else if self.is_static_context(context) {
                        let message = format!("static コンテキストからインスタンスメソッド '{}' は呼び出せません", name);
                        self.error(line, message);
                    }
                    Some(Box::new(Expression::typed(line, ExpressionKind::This, self.current_class_type())))
                }
            }
        };
        if is_super {
            method.invocation = Invocation::Special;
        }
        let ty = method.return_type.clone();
        Expression::typed(
            line,
            ExpressionKind::Message {
                target,
                ambiguous: None,
                name,
                arguments,
                method: Some(method),
            },
            ty,
        )
    }

    fn binary_result(&mut self, line: usize, op: BinaryOp, lhs: &Type, rhs: &Type) -> Type {
        let concatenation = op == BinaryOp::Add && (lhs.is_string() || rhs.is_string());
        if lhs.is_any() || rhs.is_any() {
            return if op.is_boolean_valued() {
                Type::Boolean
            } else if concatenation {
                Type::string()
            } else {
                Type::Any
            };
        }
        if concatenation {
            if *lhs == Type::Void || *rhs == Type::Void {
                self.error(line, "void の値は文字列に連結できません");
                return Type::Any;
            }
            return Type::string();
        }
        let numeric = lhs.is_numeric() && rhs.is_numeric() && lhs.promoted() == rhs.promoted();
        let valid = match op {
            BinaryOp::Add
            | BinaryOp::Subtract
            | BinaryOp::Multiply
            | BinaryOp::Divide
            | BinaryOp::Remainder
            | BinaryOp::Less
            | BinaryOp::LessEqual
            | BinaryOp::Greater
            | BinaryOp::GreaterEqual => numeric,
            BinaryOp::ShiftLeft
            | BinaryOp::ShiftRight
            | BinaryOp::UnsignedShiftRight
            | BinaryOp::BitAnd
            | BinaryOp::BitOr
            | BinaryOp::BitXor => lhs.promoted() == Type::Int && rhs.promoted() == Type::Int,
            BinaryOp::LogicalAnd | BinaryOp::LogicalOr => *lhs == Type::Boolean && *rhs == Type::Boolean,
            BinaryOp::Equal | BinaryOp::NotEqual => {
                numeric
                    || (*lhs == Type::Boolean && *rhs == Type::Boolean)
                    || (lhs.is_reference() && rhs.is_reference())
            }
        };
        if !valid {
            let message = format!(
                "演算子 '{}' を '{}' と '{}' に適用できません",
                op.symbol(),
                lhs,
                rhs
            );
            self.error(line, message);
        }
        if op.is_boolean_valued() {
            Type::Boolean
        } else if valid {
            lhs.promoted()
        } else {
            Type::Any
        }
    }

    fn analyze_unary(&mut self, line: usize, op: UnaryOp, operand: Expression, context: ContextId) -> Expression {
        let operand = self.analyze_expression(operand, context);
        let ty = operand.ty();
        let result = match op {
            _ if ty.is_any() => {
                if op == UnaryOp::Not {
                    Type::Boolean
                } else {
                    Type::Any
                }
            }
            UnaryOp::Negate | UnaryOp::Plus if ty.is_numeric() => ty.promoted(),
            UnaryOp::Complement if ty.promoted() == Type::Int => Type::Int,
            UnaryOp::Not if *ty == Type::Boolean => Type::Boolean,
            _ => {
                let message = format!("単項演算子 '{}' を '{}' に適用できません", op.symbol(), ty);
                self.error(line, message);
                if op == UnaryOp::Not {
                    Type::Boolean
                } else {
                    Type::Any
                }
            }
        };
        Expression::typed(
            line,
            ExpressionKind::Unary {
                op,
                operand: Box::new(operand),
            },
            result,
        )
    }

    fn analyze_increment(&mut self, line: usize, op: IncrementOp, operand: Expression, context: ContextId) -> Expression {
        let operand = self.analyze_expression(operand, context);
        let ty = operand.ty().clone();
        if !ty.is_any() {
            if !is_variable(&operand) {
                let message = format!("'{}' の対象は変数でなければなりません", op.symbol());
                self.error(line, message);
            } else if !ty.is_numeric() {
                let message = format!("'{}' を '{}' 型に適用できません", op.symbol(), ty);
                self.error(line, message);
            }
        }
        Expression::typed(
            line,
            ExpressionKind::Increment {
                op,
                operand: Box::new(operand),
            },
            ty,
        )
    }

    fn analyze_assignment(&mut self, line: usize, op: AssignOp, lhs: Expression, rhs: Expression, context: ContextId) -> Expression {
        // 単純代入の左辺は読まないので初期化済みである必要はない
        let lhs = match lhs {
            Expression {
                line: lhs_line,
                kind: ExpressionKind::Variable { name, .. },
                ty: None,
            } if op == AssignOp::Assign => self.analyze_name(lhs_line, name, context, false),
            other => self.analyze_expression(other, context),
        };
        let rhs = self.analyze_expression(rhs, context);
        let ty = lhs.ty().clone();

        if !is_variable(&lhs) {
            if !ty.is_any() {
                self.error(line, "代入の左辺は変数でなければなりません");
            }
        } else {
            match op {
                AssignOp::Assign => self.check_assignable(line, rhs.ty(), &ty),
                AssignOp::Compound(BinaryOp::Add) if ty.is_string() => {
                    if *rhs.ty() == Type::Void {
                        self.error(line, "void の値は文字列に連結できません");
                    }
                }
                AssignOp::Compound(inner) => {
                    self.binary_result(line, inner, &ty, rhs.ty());
                }
            }
            if let ExpressionKind::Variable { name, .. } = &lhs.kind {
                self.contexts.set_initialized(context, name);
            }
        }
        Expression::typed(
            line,
            ExpressionKind::Assign {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            ty,
        )
    }

    fn analyze_conditional(
        &mut self,
        line: usize,
        condition: Expression,
        then_part: Expression,
        else_part: Expression,
        context: ContextId,
    ) -> Expression {
        let condition = self.analyze_condition(condition, context);
        let then_part = self.analyze_expression(then_part, context);
        let else_part = self.analyze_expression(else_part, context);
        let (t, e) = (then_part.ty().clone(), else_part.ty().clone());
        let ty = if t == e {
            t
        } else if t.is_any() || e.is_any() {
            Type::Any
        } else if self.registry.is_assignable(&t, &e) {
            e
        } else if self.registry.is_assignable(&e, &t) {
            t
        } else {
            let message = format!("条件演算子の型 '{}' と '{}' が一致しません", t, e);
            self.error(line, message);
            Type::Any
        };
        Expression::typed(
            line,
            ExpressionKind::Conditional {
                condition: Box::new(condition),
                then_part: Box::new(then_part),
                else_part: Box::new(else_part),
            },
            ty,
        )
    }

    fn is_castable(&self, from: &Type, to: &Type) -> bool {
        if from == to || from.is_any() || to.is_any() {
            return true;
        }
        if from.is_numeric() && to.is_numeric() {
            return true;
        }
        if from.is_reference() && to.is_reference() {
            let involves_interface = [from, to]
                .iter()
                .any(|t| matches!(t, Type::Reference(name) if self.registry.is_interface(name)));
            return *from == Type::Null
                || involves_interface
                || self.registry.is_assignable(from, to)
                || self.registry.is_assignable(to, from);
        }
        false
    }

    fn analyze_new(&mut self, line: usize, type_name: TypeName, arguments: Vec<Expression>, context: ContextId) -> Expression {
        let ty = self.resolve_type(&type_name, context);
        let arguments: Vec<Expression> = arguments
            .into_iter()
            .map(|a| self.analyze_expression(a, context))
            .collect();
        let arg_types: Vec<Type> = arguments.iter().map(|a| a.ty().clone()).collect();
        let mut constructor = None;
        match &ty {
            Type::Reference(class) => {
                let is_abstract = self
                    .registry
                    .get(class)
                    .map_or(false, |info| info.is_abstract || info.is_interface);
                if is_abstract {
                    let message = format!("抽象型 '{}' はインスタンス化できません", ty);
                    self.error(line, message);
                }
                constructor = self.registry.find_constructor(class, &arg_types);
                if constructor.is_none() {
                    let message = format!("コンストラクタ '{}({})' が見つかりません", ty, type_list(&arg_types));
                    self.error(line, message);
                }
            }
            Type::Any => {}
            other => {
                let message = format!("型 '{}' のインスタンスは new で生成できません", other);
                self.error(line, message);
            }
        }
        Expression::typed(
            line,
            ExpressionKind::New {
                type_name,
                arguments,
                constructor,
            },
            ty,
        )
    }

    fn analyze_array_initializer(
        &mut self,
        line: usize,
        type_name: Option<TypeName>,
        elements: Vec<Expression>,
        context: ContextId,
    ) -> Expression {
        let ty = match &type_name {
            Some(type_name) => self.resolve_type(type_name, context),
            None => Type::Any,
        };
        let element_type = match &ty {
            Type::Array(element) => (**element).clone(),
            Type::Any => Type::Any,
            other => {
                let message = format!("配列の初期化子は '{}' 型には使えません", other);
                self.error(line, message);
                Type::Any
            }
        };
        let elements = elements
            .into_iter()
            .map(|element| {
                let element = self.analyze_expression(element, context);
                self.check_assignable(element.line, element.ty(), &element_type);
                element
            })
            .collect();
        Expression::typed(line, ExpressionKind::ArrayInitializer { type_name, elements }, ty)
    }

    fn analyze_construction(
        &mut self,
        line: usize,
        is_this: bool,
        arguments: Vec<Expression>,
        allowed: bool,
        context: ContextId,
    ) -> Expression {
        let keyword = if is_this { "this" } else { "super" };
        if !allowed {
            let message = format!("{}(...) はコンストラクタの先頭でしか呼び出せません", keyword);
            self.error(line, message);
        }
        let arguments: Vec<Expression> = arguments
            .into_iter()
            .map(|a| self.analyze_expression(a, context))
            .collect();
        let arg_types: Vec<Type> = arguments.iter().map(|a| a.ty().clone()).collect();
        let class = self.class.as_ref().and_then(|c| {
            if is_this {
                Some(c.name.clone())
            } else {
                c.super_name.clone()
            }
        });
        let constructor = class
            .as_deref()
            .and_then(|c| self.registry.find_constructor(c, &arg_types));
        if constructor.is_none() {
            let message = format!(
                "コンストラクタ '{}({})' が見つかりません",
                class.map_or_else(|| keyword.to_string(), |c| Type::Reference(c).to_string()),
                type_list(&arg_types)
            );
            self.error(line, message);
        }
        let kind = if is_this {
            ExpressionKind::ThisConstruction {
                arguments,
                constructor,
            }
        } else {
            ExpressionKind::SuperConstruction {
                arguments,
                constructor,
            }
        };
        Expression::typed(line, kind, Type::Void)
    }
}
