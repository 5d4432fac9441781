//! クラスとメンバの本解析

use log::debug;

use crate::frontend::ast::{
    Block, ClassDeclaration, Expression, ExpressionKind, Member, MethodDeclaration, Statement,
    StatementKind, VariableDeclarator,
};
use crate::typesystem::{parse_method_descriptor, Type};

use super::{Analyzer, ClassScope, ContextId, ContextKind};

impl<'d> Analyzer<'d> {
    pub(super) fn analyze_class(&mut self, mut class: ClassDeclaration) -> ClassDeclaration {
        let internal = class.internal_name().to_string();
        debug!("クラス解析: {}", internal);
        let root = self.contexts.root();
        let context = self.contexts.open(root, ContextKind::Class { name: internal.clone() });
        let super_name = self.registry.get(&internal).and_then(|c| c.super_name.clone());
        self.class = Some(ClassScope {
            name: internal.clone(),
            super_name,
        });

        if !class.is_interface && !class.modifiers.is_abstract() {
            for missing in self.registry.unimplemented_methods(&internal) {
                let message = format!("クラス '{}' は抽象メソッド '{}' を実装していません", class.name, missing);
                self.error(class.line, message);
            }
        }

        // 初期化子は <clinit> と各コンストラクタに展開される。インスタンス側の
        // ローカル変数はどのコンストラクタの引数とも重ならない位置から割り当てる。
        let static_init = self.contexts.open(
            context,
            ContextKind::Method {
                is_static: true,
                return_type: Type::Void,
            },
        );
        let instance_init = self.contexts.open(
            context,
            ContextKind::Method {
                is_static: false,
                return_type: Type::Void,
            },
        );
        let parameter_slots = self
            .registry
            .get(&internal)
            .and_then(|info| {
                info.constructors
                    .iter()
                    .map(|c| c.params.iter().map(Type::slot_size).sum::<usize>())
                    .max()
            })
            .unwrap_or(0);
        self.contexts.reserve_until(instance_init, 1 + parameter_slots);

        let members = std::mem::take(&mut class.members);
        class.members = members
            .into_iter()
            .map(|member| self.analyze_member(member, context, static_init, instance_init))
            .collect();

        self.contexts.close(instance_init);
        self.contexts.close(static_init);
        self.contexts.close(context);
        self.class = None;
        class
    }

    fn analyze_member(&mut self, member: Member, context: ContextId, static_init: ContextId, instance_init: ContextId) -> Member {
        match member {
            Member::Field(mut field) => {
                let init_context = if field.modifiers.is_static() {
                    static_init
                } else {
                    instance_init
                };
                field.declarators = field
                    .declarators
                    .into_iter()
                    .map(|declarator| self.analyze_field_declarator(declarator, init_context))
                    .collect();
                Member::Field(field)
            }
            Member::Method(method) => Member::Method(self.analyze_method(method, context)),
            Member::Initializer(mut initializer) => {
                let init_context = if initializer.is_static {
                    static_init
                } else {
                    instance_init
                };
                self.in_initializer = true;
                self.throws.clear();
                initializer.body = self.analyze_block(initializer.body, init_context);
                self.in_initializer = false;
                Member::Initializer(initializer)
            }
            Member::Type(inner) => Member::Type(inner),
        }
    }

    fn analyze_field_declarator(&mut self, mut declarator: VariableDeclarator, context: ContextId) -> VariableDeclarator {
        let ty = match declarator.ty.clone() {
            Some(ty) => ty,
            None => self.resolve_type(&declarator.type_name, context),
        };
        if let Some(initializer) = declarator.initializer.take() {
            self.in_initializer = true;
            self.throws.clear();
            let initializer = self.analyze_expression(initializer, context);
            self.check_assignable(initializer.line, initializer.ty(), &ty);
            self.in_initializer = false;
            declarator.initializer = Some(initializer);
        }
        declarator.ty = Some(ty);
        declarator
    }

    fn analyze_method(&mut self, mut method: MethodDeclaration, class_context: ContextId) -> MethodDeclaration {
        let is_static = method.modifiers.is_static();
        let (params, return_type) = method
            .descriptor
            .as_deref()
            .and_then(parse_method_descriptor)
            .unwrap_or_else(|| (vec![Type::Any; method.parameters.len()], Type::Any));
        let context = self.contexts.open(
            class_context,
            ContextKind::Method {
                is_static,
                return_type,
            },
        );
        for (parameter, ty) in method.parameters.iter().zip(params) {
            if let Err(err) = self.contexts.declare_local(context, &parameter.name, ty, true) {
                self.error(parameter.line, err.to_string());
            }
        }
        self.throws = method.exceptions.iter().map(|e| Type::reference(e)).collect();

        if let Some(body) = method.body.take() {
            let body = if method.is_constructor() {
                self.analyze_constructor_body(body, context)
            } else {
                self.analyze_block(body, context)
            };
            method.body = Some(body);
        }

        self.throws.clear();
        self.contexts.close(context);
        method
    }

    /// コンストラクタ本体。先頭に this(...)/super(...) がなければ super() を補う。
    fn analyze_constructor_body(&mut self, body: Block, context: ContextId) -> Block {
        let mut statements = body.statements;
        let explicit = statements.first().map_or(false, |s| {
            matches!(
                &s.kind,
                StatementKind::Expression(e)
                    if matches!(e.kind, ExpressionKind::ThisConstruction { .. } | ExpressionKind::SuperConstruction { .. })
            )
        });
        if !explicit {
            let call = Expression::new(
                body.line,
                ExpressionKind::SuperConstruction {
                    arguments: Vec::new(),
                    constructor: None,
                },
            );
            statements.insert(0, Statement::expression(call));
        }

        let block_context = self.contexts.open(context, ContextKind::Local);
        let mut analyzed = Vec::with_capacity(statements.len());
        for (index, statement) in statements.into_iter().enumerate() {
            self.allow_construction = index == 0;
            analyzed.push(self.analyze_statement(statement, block_context));
        }
        self.allow_construction = false;
        self.contexts.close(block_context);
        Block::new(body.line, analyzed)
    }

    /// ブロックを新しい局所コンテキストで解析する
    pub(super) fn analyze_block(&mut self, block: Block, parent: ContextId) -> Block {
        let context = self.contexts.open(parent, ContextKind::Local);
        let statements = block
            .statements
            .into_iter()
            .map(|statement| self.analyze_statement(statement, context))
            .collect();
        self.contexts.close(context);
        Block::new(block.line, statements)
    }
}
