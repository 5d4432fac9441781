//! 文の解析と拡張 for 文の展開

use crate::frontend::ast::{
    AssignOp, BinaryOp, Block, CatchClause, Expression, ExpressionKind, FormalParameter,
    IncrementOp, LiteralKind, Statement, StatementKind, TypeName, VariableDeclarator,
};
use crate::typesystem::{Type, ITERABLE, THROWABLE};

use super::{Analyzer, ContextId, ContextKind};

impl<'d> Analyzer<'d> {
    pub(super) fn analyze_statement(&mut self, statement: Statement, context: ContextId) -> Statement {
        let line = statement.line;
        let kind = match statement.kind {
            StatementKind::Block(block) => StatementKind::Block(self.analyze_block(block, context)),
            StatementKind::If {
                condition,
                then_part,
                else_part,
            } => StatementKind::If {
                condition: self.analyze_condition(condition, context),
                then_part: Box::new(self.analyze_statement(*then_part, context)),
                else_part: else_part.map(|s| Box::new(self.analyze_statement(*s, context))),
            },
            StatementKind::While { condition, body } => StatementKind::While {
                condition: self.analyze_condition(condition, context),
                body: Box::new(self.analyze_statement(*body, context)),
            },
            StatementKind::DoWhile { body, condition } => {
                let body = Box::new(self.analyze_statement(*body, context));
                StatementKind::DoWhile {
                    body,
                    condition: self.analyze_condition(condition, context),
                }
            }
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                let for_context = self.contexts.open(context, ContextKind::Local);
                let init = init
                    .into_iter()
                    .map(|s| self.analyze_statement(s, for_context))
                    .collect();
                let condition = condition.map(|c| self.analyze_condition(c, for_context));
                let update = update
                    .into_iter()
                    .map(|s| self.analyze_statement(s, for_context))
                    .collect();
                let body = Box::new(self.analyze_statement(*body, for_context));
                self.contexts.close(for_context);
                StatementKind::For {
                    init,
                    condition,
                    update,
                    body,
                }
            }
            StatementKind::ForEach {
                parameter,
                iterable,
                body,
            } => return self.desugar_for_each(line, parameter, iterable, *body, context),
            StatementKind::Try {
                body,
                catches,
                finally,
                ..
            } => self.analyze_try(body, catches, finally, context),
            StatementKind::Throw(exception) => {
                let exception = self.analyze_expression(exception, context);
                self.check_throw(exception.line, exception.ty().clone());
                StatementKind::Throw(exception)
            }
            StatementKind::Return(value) => self.analyze_return(line, value, context),
            StatementKind::LocalVariable { declarators, .. } => self.analyze_local_variables(declarators, context),
            StatementKind::Expression(expression) => {
                StatementKind::Expression(self.analyze_expression(expression, context))
            }
            StatementKind::Empty => StatementKind::Empty,
        };
        Statement::new(line, kind)
    }

    /// 宣言を登録し、初期化子を代入式に書き換える
    fn analyze_local_variables(&mut self, declarators: Vec<VariableDeclarator>, context: ContextId) -> StatementKind {
        let mut analyzed = Vec::with_capacity(declarators.len());
        let mut initializations = Vec::new();
        for mut declarator in declarators {
            let ty = self.resolve_type(&declarator.type_name, context);
            if ty == Type::Void {
                let message = format!("変数 '{}' に void 型は使えません", declarator.name);
                self.error(declarator.line, message);
            }
            let initializer = declarator
                .initializer
                .take()
                .map(|init| self.analyze_expression(init, context));
            if let Some(init) = &initializer {
                self.check_assignable(init.line, init.ty(), &ty);
            }
            match self
                .contexts
                .declare_local(context, &declarator.name, ty.clone(), initializer.is_some())
            {
                Ok(slot) => {
                    declarator.slot = Some(slot);
                    if let Some(init) = initializer {
                        let target = Expression::typed(
                            declarator.line,
                            ExpressionKind::Variable {
                                name: declarator.name.clone(),
                                slot: Some(slot),
                            },
                            ty.clone(),
                        );
                        initializations.push(Expression::typed(
                            declarator.line,
                            ExpressionKind::Assign {
                                op: AssignOp::Assign,
                                lhs: Box::new(target),
                                rhs: Box::new(init),
                            },
                            ty.clone(),
                        ));
                    }
                }
                Err(err) => self.error(declarator.line, err.to_string()),
            }
            declarator.ty = Some(ty);
            analyzed.push(declarator);
        }
        StatementKind::LocalVariable {
            declarators: analyzed,
            initializations,
        }
    }

    fn analyze_return(&mut self, line: usize, value: Option<Expression>, context: ContextId) -> StatementKind {
        if self.in_initializer {
            self.error(line, "初期化ブロックの中では return できません");
        }
        let return_type = self
            .contexts
            .enclosing_method(context)
            .map_or(Type::Void, |(_, ty)| ty.clone());
        match value {
            None => {
                if return_type != Type::Void && !return_type.is_any() {
                    let message = format!("'{}' 型の戻り値が必要です", return_type);
                    self.error(line, message);
                }
                StatementKind::Return(None)
            }
            Some(value) => {
                let value = self.analyze_expression(value, context);
                if return_type == Type::Void {
                    self.error(line, "void メソッドは値を返せません");
                } else {
                    self.check_assignable(line, value.ty(), &return_type);
                }
                StatementKind::Return(Some(value))
            }
        }
    }

    fn analyze_try(&mut self, body: Block, catches: Vec<CatchClause>, finally: Option<Block>, context: ContextId) -> StatementKind {
        // finally 用の退避スロットは本体より先に確保する
        let finally_slot = finally
            .as_ref()
            .map(|_| self.contexts.next_offset(context, &Type::object()));
        let catch_types: Vec<Type> = catches
            .iter()
            .map(|c| self.resolve_type(&c.parameter.type_name, context))
            .collect();

        let body = self.analyze_block(body, context);

        let catches = catches
            .into_iter()
            .zip(catch_types)
            .map(|(clause, ty)| self.analyze_catch(clause, ty, context))
            .collect();
        let finally = finally.map(|block| self.analyze_block(block, context));
        StatementKind::Try {
            body,
            catches,
            finally,
            finally_slot,
        }
    }

    fn analyze_catch(&mut self, mut clause: CatchClause, ty: Type, context: ContextId) -> CatchClause {
        clause.exception_type = match &ty {
            Type::Reference(name) if self.registry.is_subclass(name, THROWABLE) => Some(name.clone()),
            Type::Any => None,
            other => {
                let message = format!("catch の引数は Throwable の派生型でなければなりません: '{}'", other);
                self.error(clause.line, message);
                None
            }
        };
        let catch_context = self.contexts.open(context, ContextKind::Local);
        match self
            .contexts
            .declare_local(catch_context, &clause.parameter.name, ty, true)
        {
            Ok(slot) => clause.slot = Some(slot),
            Err(err) => self.error(clause.parameter.line, err.to_string()),
        }
        clause.body = self.analyze_block(clause.body, catch_context);
        self.contexts.close(catch_context);
        clause
    }

    /// 投げられる型を検査する。throws に宣言された型（またはその派生型）でなければならない。
    fn check_throw(&mut self, line: usize, ty: Type) {
        let name = match ty {
            Type::Any | Type::Null => return,
            Type::Reference(name) if self.registry.is_subclass(&name, THROWABLE) => name,
            other => {
                let message = format!("throw できるのは Throwable の派生型だけです: '{}'", other);
                self.error(line, message);
                return;
            }
        };
        let declared = self.throws.iter().any(|declared| match declared {
            Type::Reference(declared) => self.registry.is_subclass(&name, declared),
            Type::Any => true,
            _ => false,
        });
        if !declared {
            let message = format!(
                "例外 '{}' が throws に宣言されていません",
                Type::Reference(name)
            );
            self.error(line, message);
        }
    }

    /// 拡張 for 文を、一時変数と従来形式の for 文を含むブロックに書き換える
    fn desugar_for_each(
        &mut self,
        line: usize,
        parameter: FormalParameter,
        iterable: Expression,
        body: Statement,
        context: ContextId,
    ) -> Statement {
        let iterable = self.analyze_expression(iterable, context);
        let iterable_type = iterable.ty().clone();
        match &iterable_type {
            Type::Array(_) => {
                let array = self.unique_name("$array", context);
                let index = self.unique_name("$index", context);
                let declare_array = local_declaration(
                    line,
                    &array,
                    TypeName::from_type(&iterable_type, line),
                    iterable,
                );
                let declare_index = local_declaration(
                    line,
                    &index,
                    TypeName::new(line, "int"),
                    Expression::literal(line, LiteralKind::Int, "0"),
                );
                let condition = Expression::new(
                    line,
                    ExpressionKind::Binary {
                        op: BinaryOp::Less,
                        lhs: Box::new(Expression::variable(line, &index)),
                        rhs: Box::new(field_selection(line, Expression::variable(line, &array), "length")),
                    },
                );
                let update = Statement::expression(Expression::new(
                    line,
                    ExpressionKind::Increment {
                        op: IncrementOp::PostIncrement,
                        operand: Box::new(Expression::variable(line, &index)),
                    },
                ));
                let element = Expression::new(
                    line,
                    ExpressionKind::ArrayAccess {
                        array: Box::new(Expression::variable(line, &array)),
                        index: Box::new(Expression::variable(line, &index)),
                    },
                );
                let bind = local_declaration(line, &parameter.name, parameter.type_name, element);
                let for_loop = Statement::new(
                    line,
                    StatementKind::For {
                        init: vec![declare_index],
                        condition: Some(condition),
                        update: vec![update],
                        body: Box::new(block(line, vec![bind, body])),
                    },
                );
                let desugared = block(line, vec![declare_array, for_loop]);
                self.analyze_statement(desugared, context)
            }
            Type::Reference(name) if self.registry.is_subclass(name, ITERABLE) => {
                let iterator = self.unique_name("$iterator", context);
                let declare_iterator = local_declaration(
                    line,
                    &iterator,
                    TypeName::new(line, "java.util.Iterator"),
                    message(line, iterable, "iterator"),
                );
                let condition = message(line, Expression::variable(line, &iterator), "hasNext");
                let element = Expression::new(
                    line,
                    ExpressionKind::Cast {
                        type_name: parameter.type_name.clone(),
                        operand: Box::new(message(line, Expression::variable(line, &iterator), "next")),
                    },
                );
                let bind = local_declaration(line, &parameter.name, parameter.type_name, element);
                let for_loop = Statement::new(
                    line,
                    StatementKind::For {
                        init: Vec::new(),
                        condition: Some(condition),
                        update: Vec::new(),
                        body: Box::new(block(line, vec![bind, body])),
                    },
                );
                let desugared = block(line, vec![declare_iterator, for_loop]);
                self.analyze_statement(desugared, context)
            }
            other => {
                if !other.is_any() {
                    let message = format!("拡張 for 文の対象は配列か Iterable でなければなりません: '{}'", other);
                    self.error(line, message);
                }
                // 本体のエラーも報告できるよう、ループ変数を宣言して本体だけ解析する
                let loop_context = self.contexts.open(context, ContextKind::Local);
                let ty = self.resolve_type(&parameter.type_name, loop_context);
                if let Err(err) = self.contexts.declare_local(loop_context, &parameter.name, ty, true) {
                    self.error(parameter.line, err.to_string());
                }
                let _ = self.analyze_statement(body, loop_context);
                self.contexts.close(loop_context);
                Statement::empty(line)
            }
        }
    }

    /// 見えている名前と衝突しない合成変数名
    fn unique_name(&self, base: &str, context: ContextId) -> String {
        let mut name = base.to_string();
        while self.contexts.lookup(context, &name).is_some() {
            name.push('_');
        }
        name
    }
}

fn local_declaration(line: usize, name: &str, type_name: TypeName, initializer: Expression) -> Statement {
    Statement::new(
        line,
        StatementKind::LocalVariable {
            declarators: vec![VariableDeclarator::new(line, name, type_name, Some(initializer))],
            initializations: Vec::new(),
        },
    )
}

fn block(line: usize, statements: Vec<Statement>) -> Statement {
    Statement::new(line, StatementKind::Block(Block::new(line, statements)))
}

fn field_selection(line: usize, target: Expression, name: &str) -> Expression {
    Expression::new(
        line,
        ExpressionKind::FieldSelection {
            target: Some(Box::new(target)),
            ambiguous: None,
            name: name.to_string(),
            field: None,
        },
    )
}

fn message(line: usize, target: Expression, name: &str) -> Expression {
    Expression::new(
        line,
        ExpressionKind::Message {
            target: Some(Box::new(target)),
            ambiguous: None,
            name: name.to_string(),
            arguments: Vec::new(),
            method: None,
        },
    )
}
