//! # コード生成
//!
//! 解析済みの抽象構文木をたどり、[`Emitter`] へ命令を出力します。
//! 解析でエラーが報告された木に対して呼び出してはいけません。
//!
//! 条件式は値を積まずに分岐命令へ直接変換します（[`CodeGenerator::gen_branch`]）。
//! finally 節は正常終了・各 catch 節の後・全例外捕捉ハンドラの三か所に複製されます。

use log::{debug, info, trace};

use crate::frontend::ast::{
    AnalysisState, AssignOp, BinaryOp, Block, CatchClause, ClassDeclaration, CompilationUnit, Expression, ExpressionKind,
    IncrementOp, LiteralKind, Member, MethodDeclaration, Statement, StatementKind, TypeName, UnaryOp,
};
use crate::frontend::error::{CompilerError, Result};
use crate::typesystem::{
    method_descriptor, parse_method_descriptor, ClassRegistry, FieldRef, Invocation, MethodRef, Type, OBJECT, STRING,
    STRING_BUILDER,
};

use super::emitter::{access, Constant, Emitter, Instruction, Label, Opcode};

/// 代入先。接頭部（対象オブジェクトや配列と添字）を積んだ後の状態を表す。
enum LValue<'e> {
    Local { slot: usize, ty: Type },
    Field { field: &'e FieldRef },
    Array { element: Type },
}

/// コード生成器
pub struct CodeGenerator<'r, E: Emitter> {
    emitter: E,
    registry: &'r ClassRegistry,
    /// 囲んでいる try の finally 節（内側が後ろ）
    finally_stack: Vec<Block>,
    /// 生成中のメソッドの戻り値型
    return_type: Type,
    /// 出力中のクラスの内部名
    current_class: Option<String>,
}

impl<'r, E: Emitter> CodeGenerator<'r, E> {
    pub fn new(emitter: E, registry: &'r ClassRegistry) -> Self {
        Self {
            emitter,
            registry,
            finally_stack: Vec::new(),
            return_type: Type::Void,
            current_class: None,
        }
    }

    pub fn emitter(&self) -> &E {
        &self.emitter
    }

    pub fn into_emitter(self) -> E {
        self.emitter
    }

    /// コンパイル単位のすべての型を出力する
    pub fn generate(&mut self, unit: &CompilationUnit) -> Result<()> {
        if unit.state != AnalysisState::Analyzed {
            return Err(CompilerError::internal("解析されていないコンパイル単位のコード生成が要求されました"));
        }
        info!("コード生成開始: {}", unit.file_name);
        for class in &unit.type_declarations {
            self.gen_class(class)?;
        }
        info!("コード生成完了: {} 個の型", unit.type_declarations.len());
        Ok(())
    }

    fn gen_class(&mut self, class: &ClassDeclaration) -> Result<()> {
        let name = class.internal_name();
        debug!("クラス出力: {}", name);
        let info = self.registry.get(name);
        let super_name = info.and_then(|c| c.super_name.clone());
        let interfaces = info.map(|c| c.interfaces.clone()).unwrap_or_default();
        self.current_class = Some(name.to_string());
        let mut flags = class.modifiers.access_flags();
        if class.is_interface {
            flags |= access::INTERFACE | access::ABSTRACT;
        } else {
            flags |= access::SUPER;
        }
        self.emitter
            .begin_class(flags, name, super_name.as_deref().or(Some(OBJECT)), &interfaces);

        let mut instance_inits = Vec::new();
        let mut static_inits = Vec::new();
        for member in &class.members {
            match member {
                Member::Field(field) => {
                    for declarator in &field.declarators {
                        let ty = declarator.ty.as_ref().ok_or_else(|| unresolved(declarator.line))?;
                        self.emitter
                            .add_field(field.modifiers.access_flags(), &declarator.name, &ty.descriptor());
                    }
                    if field.modifiers.is_static() {
                        static_inits.push(member);
                    } else {
                        instance_inits.push(member);
                    }
                }
                Member::Initializer(initializer) if initializer.is_static => static_inits.push(member),
                Member::Initializer(_) => instance_inits.push(member),
                Member::Method(_) => {}
                Member::Type(inner) => return Err(CompilerError::unsupported("入れ子の型宣言", inner.line)),
            }
        }

        for member in &class.members {
            if let Member::Method(method) = member {
                self.gen_method(method, class.is_interface, &instance_inits)?;
            }
        }

        if static_inits.iter().any(|m| has_initialization(m)) {
            self.emitter.begin_method(access::STATIC, "<clinit>", "()V", &[]);
            self.return_type = Type::Void;
            self.gen_initializers(&static_inits, true)?;
            self.emitter.emit_simple(Opcode::Return);
            self.emitter.end_method();
        }
        self.emitter.end_class();
        self.current_class = None;
        Ok(())
    }

    fn gen_method(&mut self, method: &MethodDeclaration, in_interface: bool, instance_inits: &[&Member]) -> Result<()> {
        let descriptor = method.descriptor.as_deref().ok_or_else(|| unresolved(method.line))?;
        let (_, return_type) = parse_method_descriptor(descriptor).ok_or_else(|| unresolved(method.line))?;
        let mut flags = method.modifiers.access_flags();
        if in_interface && method.body.is_none() {
            flags |= access::ABSTRACT;
        }
        trace!("メソッド出力: {}{}", method.emitted_name(), descriptor);
        self.emitter
            .begin_method(flags, method.emitted_name(), descriptor, &method.exceptions);
        self.return_type = return_type;
        self.finally_stack.clear();

        if let Some(body) = &method.body {
            for (index, statement) in body.statements.iter().enumerate() {
                self.gen_statement(statement)?;
                // フィールド初期化子は super(...) の直後に展開する。this(...) の後では二重になる。
                if index == 0 && method.is_constructor() && is_super_construction(statement) {
                    self.gen_initializers(instance_inits, false)?;
                }
            }
            let terminated = matches!(
                self.emitter.last_instruction(),
                Some(Instruction::Simple(Opcode::Return | Opcode::AThrow))
            );
            if self.return_type == Type::Void && !terminated {
                self.emitter.emit_simple(Opcode::Return);
            }
        }
        self.emitter.end_method();
        Ok(())
    }

    /// フィールド初期化子と初期化ブロックを宣言順に出力する
    fn gen_initializers(&mut self, members: &[&Member], is_static: bool) -> Result<()> {
        for member in members {
            match member {
                Member::Field(field) => {
                    for declarator in &field.declarators {
                        let Some(initializer) = &declarator.initializer else {
                            continue;
                        };
                        let ty = declarator.ty.clone().ok_or_else(|| unresolved(declarator.line))?;
                        let field_ref = FieldRef {
                            owner: self.current_owner(declarator.line)?,
                            name: declarator.name.clone(),
                            ty,
                            is_static,
                        };
                        if is_static {
                            self.gen_expression(initializer)?;
                            self.emitter.emit(Instruction::Field(Opcode::PutStatic, field_ref));
                        } else {
                            self.emitter.emit_local(Opcode::ALoad, 0);
                            self.gen_expression(initializer)?;
                            self.emitter.emit(Instruction::Field(Opcode::PutField, field_ref));
                        }
                    }
                }
                Member::Initializer(initializer) => self.gen_block(&initializer.body)?,
                _ => {}
            }
        }
        Ok(())
    }

    fn current_owner(&self, line: usize) -> Result<String> {
        self.current_class
            .clone()
            .ok_or_else(|| CompilerError::internal(format!("{} 行目: 出力中のクラスがありません", line)))
    }

    // ---- 文 ----

    fn gen_block(&mut self, block: &Block) -> Result<()> {
        for statement in &block.statements {
            self.gen_statement(statement)?;
        }
        Ok(())
    }

    fn gen_statement(&mut self, statement: &Statement) -> Result<()> {
        match &statement.kind {
            StatementKind::Block(block) => self.gen_block(block),
            StatementKind::If {
                condition,
                then_part,
                else_part,
            } => {
                let else_label = self.emitter.new_label();
                let end_label = self.emitter.new_label();
                self.gen_branch(condition, false, else_label)?;
                self.gen_statement(then_part)?;
                if let Some(else_part) = else_part {
                    self.emitter.emit_branch(Opcode::Goto, end_label);
                    self.emitter.place_label(else_label);
                    self.gen_statement(else_part)?;
                } else {
                    self.emitter.place_label(else_label);
                }
                self.emitter.place_label(end_label);
                Ok(())
            }
            StatementKind::While { condition, body } => {
                let test = self.emitter.new_label();
                let exit = self.emitter.new_label();
                self.emitter.place_label(test);
                self.gen_branch(condition, false, exit)?;
                self.gen_statement(body)?;
                self.emitter.emit_branch(Opcode::Goto, test);
                self.emitter.place_label(exit);
                Ok(())
            }
            StatementKind::DoWhile { body, condition } => {
                let top = self.emitter.new_label();
                self.emitter.place_label(top);
                self.gen_statement(body)?;
                self.gen_branch(condition, true, top)
            }
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                for statement in init {
                    self.gen_statement(statement)?;
                }
                let test = self.emitter.new_label();
                let exit = self.emitter.new_label();
                self.emitter.place_label(test);
                if let Some(condition) = condition {
                    self.gen_branch(condition, false, exit)?;
                }
                self.gen_statement(body)?;
                for statement in update {
                    self.gen_statement(statement)?;
                }
                self.emitter.emit_branch(Opcode::Goto, test);
                self.emitter.place_label(exit);
                Ok(())
            }
            StatementKind::ForEach { .. } => Err(CompilerError::internal(format!(
                "{} 行目: 拡張 for 文が展開されていません",
                statement.line
            ))),
            StatementKind::Try {
                body,
                catches,
                finally,
                finally_slot,
            } => self.gen_try(statement.line, body, catches, finally.as_ref(), *finally_slot),
            StatementKind::Throw(expression) => {
                self.gen_expression(expression)?;
                self.emitter.emit_simple(Opcode::AThrow);
                Ok(())
            }
            StatementKind::Return(value) => {
                if let Some(value) = value {
                    self.gen_expression(value)?;
                }
                self.gen_pending_finally()?;
                let op = match value {
                    Some(_) => return_opcode(&self.return_type),
                    None => Opcode::Return,
                };
                self.emitter.emit_simple(op);
                Ok(())
            }
            StatementKind::LocalVariable { initializations, .. } => {
                for initialization in initializations {
                    self.gen_statement_expression(initialization)?;
                }
                Ok(())
            }
            StatementKind::Expression(expression) => self.gen_statement_expression(expression),
            StatementKind::Empty => Ok(()),
        }
    }

    /// return の前に、囲んでいるすべての finally 節を内側から順に出力する
    fn gen_pending_finally(&mut self) -> Result<()> {
        let pending = std::mem::take(&mut self.finally_stack);
        for depth in (0..pending.len()).rev() {
            self.finally_stack = pending[..depth].to_vec();
            self.gen_block(&pending[depth])?;
        }
        self.finally_stack = pending;
        Ok(())
    }

    fn gen_try(
        &mut self,
        line: usize,
        body: &Block,
        catches: &[CatchClause],
        finally: Option<&Block>,
        finally_slot: Option<usize>,
    ) -> Result<()> {
        let start = self.emitter.new_label();
        let end = self.emitter.new_label();
        let after = self.emitter.new_label();

        self.emitter.place_label(start);
        if let Some(finally) = finally {
            self.finally_stack.push(finally.clone());
        }
        self.gen_block(body)?;
        self.emitter.place_label(end);
        if finally.is_some() {
            self.finally_stack.pop();
        }
        if let Some(finally) = finally {
            self.gen_block(finally)?;
        }
        self.emitter.emit_branch(Opcode::Goto, after);

        let mut protected = vec![(start, end)];
        for catch in catches {
            let handler = self.emitter.new_label();
            let handler_end = self.emitter.new_label();
            let exception_type = catch.exception_type.as_deref().ok_or_else(|| unresolved(catch.line))?;
            let slot = catch.slot.ok_or_else(|| unresolved(catch.line))?;
            self.emitter.place_label(handler);
            self.emitter
                .add_exception_handler(start, end, handler, Some(exception_type));
            self.emitter.emit_local(Opcode::AStore, slot);
            if let Some(finally) = finally {
                self.finally_stack.push(finally.clone());
            }
            self.gen_block(&catch.body)?;
            if finally.is_some() {
                self.finally_stack.pop();
            }
            self.emitter.place_label(handler_end);
            protected.push((handler, handler_end));
            if let Some(finally) = finally {
                self.gen_block(finally)?;
            }
            self.emitter.emit_branch(Opcode::Goto, after);
        }

        if let Some(finally) = finally {
            let slot = finally_slot.ok_or_else(|| unresolved(line))?;
            let handler = self.emitter.new_label();
            for (from, to) in protected {
                self.emitter.add_exception_handler(from, to, handler, None);
            }
            self.emitter.place_label(handler);
            self.emitter.emit_local(Opcode::AStore, slot);
            self.gen_block(finally)?;
            self.emitter.emit_local(Opcode::ALoad, slot);
            self.emitter.emit_simple(Opcode::AThrow);
        }
        self.emitter.place_label(after);
        Ok(())
    }

    /// 値を捨てる文脈で式を出力する
    fn gen_statement_expression(&mut self, expression: &Expression) -> Result<()> {
        match &expression.kind {
            ExpressionKind::Assign { op, lhs, rhs } => self.gen_assignment(*op, lhs, rhs, true),
            ExpressionKind::Increment { op, operand } => self.gen_increment(*op, operand, true),
            _ => {
                self.gen_expression(expression)?;
                match expression.ty().slot_size() {
                    0 => {}
                    1 => self.emitter.emit_simple(Opcode::Pop),
                    _ => self.emitter.emit_simple(Opcode::Pop2),
                }
                Ok(())
            }
        }
    }

    // ---- 式 ----

    /// 式の値をスタックに積む
    fn gen_expression(&mut self, expression: &Expression) -> Result<()> {
        let line = expression.line;
        match &expression.kind {
            ExpressionKind::Literal(literal) => {
                let constant = match literal.kind {
                    LiteralKind::Int => Constant::Int(literal.int_value().ok_or_else(|| unresolved(line))?),
                    LiteralKind::Long => Constant::Long(literal.long_value().ok_or_else(|| unresolved(line))?),
                    LiteralKind::Float => Constant::Float(literal.float_value().ok_or_else(|| unresolved(line))?),
                    LiteralKind::Double => {
                        Constant::Double(literal.double_value().ok_or_else(|| unresolved(line))?)
                    }
                    LiteralKind::Char => {
                        Constant::Int(literal.char_value().map_or(0, |c| c as i32))
                    }
                    LiteralKind::String => Constant::String(literal.string_value()),
                    LiteralKind::Boolean => Constant::Int(i32::from(literal.boolean_value())),
                    LiteralKind::Null => {
                        self.emitter.emit_simple(Opcode::AconstNull);
                        return Ok(());
                    }
                };
                self.emitter.emit(Instruction::Constant(constant));
            }
            ExpressionKind::Variable { slot, .. } => {
                let slot = slot.ok_or_else(|| unresolved(line))?;
                self.emitter.emit_local(load_opcode(expression.ty()), slot);
            }
            ExpressionKind::This | ExpressionKind::Super => self.emitter.emit_local(Opcode::ALoad, 0),
            ExpressionKind::Binary { op, lhs, rhs } => self.gen_binary(expression, *op, lhs, rhs)?,
            ExpressionKind::Unary { op, operand } => match op {
                UnaryOp::Not => self.gen_boolean_value(expression)?,
                UnaryOp::Plus => self.gen_expression(operand)?,
                UnaryOp::Negate => {
                    self.gen_expression(operand)?;
                    let op = match operand.ty().promoted() {
                        Type::Long => Opcode::LNeg,
                        Type::Float => Opcode::FNeg,
                        Type::Double => Opcode::DNeg,
                        _ => Opcode::INeg,
                    };
                    self.emitter.emit_simple(op);
                }
                UnaryOp::Complement => {
                    self.gen_expression(operand)?;
                    self.emitter.emit(Instruction::Constant(Constant::Int(-1)));
                    self.emitter.emit_simple(Opcode::IXor);
                }
            },
            ExpressionKind::Increment { op, operand } => self.gen_increment(*op, operand, false)?,
            ExpressionKind::Assign { op, lhs, rhs } => self.gen_assignment(*op, lhs, rhs, false)?,
            ExpressionKind::Conditional {
                condition,
                then_part,
                else_part,
            } => {
                let else_label = self.emitter.new_label();
                let end_label = self.emitter.new_label();
                self.gen_branch(condition, false, else_label)?;
                self.gen_expression(then_part)?;
                self.emitter.emit_branch(Opcode::Goto, end_label);
                self.emitter.place_label(else_label);
                self.gen_expression(else_part)?;
                self.emitter.place_label(end_label);
            }
            ExpressionKind::Message {
                target,
                arguments,
                method,
                ..
            } => {
                let method = method.as_ref().ok_or_else(|| unresolved(line))?;
                if let Some(target) = target {
                    self.gen_expression(target)?;
                }
                for argument in arguments {
                    self.gen_expression(argument)?;
                }
                self.emitter
                    .emit(Instruction::Invoke(invoke_opcode(method.invocation), method.clone()));
            }
            ExpressionKind::FieldSelection { target, field, .. } => {
                let field = field.as_ref().ok_or_else(|| unresolved(line))?;
                match target {
                    Some(target) if !field.is_static => {
                        self.gen_expression(target)?;
                        self.emitter.emit(Instruction::Field(Opcode::GetField, field.clone()));
                    }
                    _ => self.emitter.emit(Instruction::Field(Opcode::GetStatic, field.clone())),
                }
            }
            ExpressionKind::ArrayLength(array) => {
                self.gen_expression(array)?;
                self.emitter.emit_simple(Opcode::ArrayLength);
            }
            ExpressionKind::ArrayAccess { array, index } => {
                self.gen_expression(array)?;
                self.gen_expression(index)?;
                self.emitter.emit_simple(array_load_opcode(expression.ty()));
            }
            ExpressionKind::Cast { operand, .. } => {
                self.gen_expression(operand)?;
                self.gen_conversion(operand.ty(), expression.ty());
            }
            ExpressionKind::InstanceOf { operand, type_name } => {
                self.gen_expression(operand)?;
                let target = type_from_name(type_name);
                self.emitter
                    .emit(Instruction::Type(Opcode::InstanceOf, target.internal_name()));
            }
            ExpressionKind::New {
                arguments,
                constructor,
                ..
            } => {
                let constructor = constructor.as_ref().ok_or_else(|| unresolved(line))?;
                self.emitter
                    .emit(Instruction::Type(Opcode::New, expression.ty().internal_name()));
                self.emitter.emit_simple(Opcode::Dup);
                for argument in arguments {
                    self.gen_expression(argument)?;
                }
                self.emitter
                    .emit(Instruction::Invoke(Opcode::InvokeSpecial, constructor.clone()));
            }
            ExpressionKind::NewArray { dimensions, .. } => {
                for dimension in dimensions {
                    self.gen_expression(dimension)?;
                }
                let ty = expression.ty();
                if dimensions.len() == 1 {
                    let element = ty.component_type().ok_or_else(|| unresolved(line))?;
                    self.gen_new_array(element);
                } else {
                    self.emitter
                        .emit(Instruction::MultiNewArray(ty.descriptor(), dimensions.len()));
                }
            }
            ExpressionKind::ArrayInitializer { elements, .. } => {
                let element = expression.ty().component_type().ok_or_else(|| unresolved(line))?.clone();
                self.emitter
                    .emit(Instruction::Constant(Constant::Int(elements.len() as i32)));
                self.gen_new_array(&element);
                for (index, value) in elements.iter().enumerate() {
                    self.emitter.emit_simple(Opcode::Dup);
                    self.emitter.emit(Instruction::Constant(Constant::Int(index as i32)));
                    self.gen_expression(value)?;
                    self.emitter.emit_simple(array_store_opcode(&element));
                }
            }
            ExpressionKind::ThisConstruction {
                arguments,
                constructor,
            }
            | ExpressionKind::SuperConstruction {
                arguments,
                constructor,
            } => {
                let constructor = constructor.as_ref().ok_or_else(|| unresolved(line))?;
                self.emitter.emit_local(Opcode::ALoad, 0);
                for argument in arguments {
                    self.gen_expression(argument)?;
                }
                self.emitter
                    .emit(Instruction::Invoke(Opcode::InvokeSpecial, constructor.clone()));
            }
            ExpressionKind::Wild => return Err(CompilerError::unsupported("不完全な式", line)),
        }
        Ok(())
    }

    fn gen_new_array(&mut self, element: &Type) {
        if element.is_primitive() {
            self.emitter.emit(Instruction::NewArray(element.clone()));
        } else {
            self.emitter
                .emit(Instruction::Type(Opcode::ANewArray, element.internal_name()));
        }
    }

    fn gen_binary(&mut self, expression: &Expression, op: BinaryOp, lhs: &Expression, rhs: &Expression) -> Result<()> {
        if op.is_boolean_valued() {
            return self.gen_boolean_value(expression);
        }
        if op == BinaryOp::Add && expression.ty().is_string() {
            self.emitter
                .emit(Instruction::Type(Opcode::New, STRING_BUILDER.to_string()));
            self.emitter.emit_simple(Opcode::Dup);
            self.emitter.emit(Instruction::Invoke(
                Opcode::InvokeSpecial,
                builder_method("<init>", vec![], Type::Void, Invocation::Special),
            ));
            self.gen_concatenation(expression)?;
            self.emitter.emit(Instruction::Invoke(
                Opcode::InvokeVirtual,
                builder_method("toString", vec![], Type::string(), Invocation::Virtual),
            ));
            return Ok(());
        }
        self.gen_expression(lhs)?;
        self.gen_expression(rhs)?;
        self.emitter.emit_simple(arithmetic_opcode(op, &lhs.ty().promoted()));
        Ok(())
    }

    /// 文字列連結の各項を StringBuilder に追加する
    fn gen_concatenation(&mut self, expression: &Expression) -> Result<()> {
        match &expression.kind {
            ExpressionKind::Binary {
                op: BinaryOp::Add,
                lhs,
                rhs,
            } if expression.ty().is_string() => {
                self.gen_concatenation(lhs)?;
                self.gen_concatenation(rhs)
            }
            _ => {
                self.gen_expression(expression)?;
                self.gen_append(expression.ty());
                Ok(())
            }
        }
    }

    fn gen_append(&mut self, ty: &Type) {
        let param = match ty {
            Type::Int | Type::Long | Type::Float | Type::Double | Type::Char | Type::Boolean => ty.clone(),
            ty if ty.is_string() => Type::string(),
            _ => Type::object(),
        };
        self.emitter.emit(Instruction::Invoke(
            Opcode::InvokeVirtual,
            builder_method("append", vec![param], Type::reference(STRING_BUILDER), Invocation::Virtual),
        ));
    }

    /// boolean の値を 0/1 として積む
    fn gen_boolean_value(&mut self, expression: &Expression) -> Result<()> {
        let false_label = self.emitter.new_label();
        let end_label = self.emitter.new_label();
        self.gen_branch(expression, false, false_label)?;
        self.emitter.emit(Instruction::Constant(Constant::Int(1)));
        self.emitter.emit_branch(Opcode::Goto, end_label);
        self.emitter.place_label(false_label);
        self.emitter.emit(Instruction::Constant(Constant::Int(0)));
        self.emitter.place_label(end_label);
        Ok(())
    }

    /// 条件式の評価結果が `on_true` のとき `target` へ分岐するコードを出力する
    pub fn gen_branch(&mut self, condition: &Expression, on_true: bool, target: Label) -> Result<()> {
        match &condition.kind {
            ExpressionKind::Literal(literal) if literal.kind == LiteralKind::Boolean => {
                if literal.boolean_value() == on_true {
                    self.emitter.emit_branch(Opcode::Goto, target);
                }
                Ok(())
            }
            ExpressionKind::Unary {
                op: UnaryOp::Not,
                operand,
            } => self.gen_branch(operand, !on_true, target),
            ExpressionKind::Binary {
                op: BinaryOp::LogicalAnd,
                lhs,
                rhs,
            } => {
                if on_true {
                    let skip = self.emitter.new_label();
                    self.gen_branch(lhs, false, skip)?;
                    self.gen_branch(rhs, true, target)?;
                    self.emitter.place_label(skip);
                } else {
                    self.gen_branch(lhs, false, target)?;
                    self.gen_branch(rhs, false, target)?;
                }
                Ok(())
            }
            ExpressionKind::Binary {
                op: BinaryOp::LogicalOr,
                lhs,
                rhs,
            } => {
                if on_true {
                    self.gen_branch(lhs, true, target)?;
                    self.gen_branch(rhs, true, target)?;
                } else {
                    let skip = self.emitter.new_label();
                    self.gen_branch(lhs, true, skip)?;
                    self.gen_branch(rhs, false, target)?;
                    self.emitter.place_label(skip);
                }
                Ok(())
            }
            ExpressionKind::Binary { op, lhs, rhs } if op.is_relational() || op.is_equality() => {
                self.gen_comparison(*op, lhs, rhs, on_true, target)
            }
            _ => {
                self.gen_expression(condition)?;
                let op = if on_true { Opcode::IfNe } else { Opcode::IfEq };
                self.emitter.emit_branch(op, target);
                Ok(())
            }
        }
    }

    fn gen_comparison(
        &mut self,
        op: BinaryOp,
        lhs: &Expression,
        rhs: &Expression,
        on_true: bool,
        target: Label,
    ) -> Result<()> {
        let op = if on_true {
            op
        } else {
            op.negated().ok_or_else(|| CompilerError::internal("比較演算子を反転できません"))?
        };
        let operand_type = lhs.ty().promoted();
        if operand_type.is_reference() || rhs.ty().is_reference() {
            // null との比較は IFNULL/IFNONNULL にまとめる
            let null_test = match (lhs.is_null_literal(), rhs.is_null_literal()) {
                (_, true) => Some(lhs),
                (true, false) => Some(rhs),
                _ => None,
            };
            if let Some(operand) = null_test {
                self.gen_expression(operand)?;
                let branch = if op == BinaryOp::Equal { Opcode::IfNull } else { Opcode::IfNonNull };
                self.emitter.emit_branch(branch, target);
                return Ok(());
            }
            self.gen_expression(lhs)?;
            self.gen_expression(rhs)?;
            let branch = if op == BinaryOp::Equal { Opcode::IfACmpEq } else { Opcode::IfACmpNe };
            self.emitter.emit_branch(branch, target);
            return Ok(());
        }

        self.gen_expression(lhs)?;
        self.gen_expression(rhs)?;
        let compared_with_zero = match operand_type {
            Type::Long => {
                self.emitter.emit_simple(Opcode::LCmp);
                true
            }
            Type::Float | Type::Double => {
                // NaN を含む比較が偽になる向きの比較命令を選ぶ
                let greater = matches!(op, BinaryOp::Less | BinaryOp::LessEqual);
                let cmp = match (operand_type == Type::Float, greater) {
                    (true, true) => Opcode::FCmpg,
                    (true, false) => Opcode::FCmpl,
                    (false, true) => Opcode::DCmpg,
                    (false, false) => Opcode::DCmpl,
                };
                self.emitter.emit_simple(cmp);
                true
            }
            _ => false,
        };
        let branch = match (op, compared_with_zero) {
            (BinaryOp::Equal, false) => Opcode::IfICmpEq,
            (BinaryOp::NotEqual, false) => Opcode::IfICmpNe,
            (BinaryOp::Less, false) => Opcode::IfICmpLt,
            (BinaryOp::LessEqual, false) => Opcode::IfICmpLe,
            (BinaryOp::Greater, false) => Opcode::IfICmpGt,
            (BinaryOp::GreaterEqual, false) => Opcode::IfICmpGe,
            (BinaryOp::Equal, true) => Opcode::IfEq,
            (BinaryOp::NotEqual, true) => Opcode::IfNe,
            (BinaryOp::Less, true) => Opcode::IfLt,
            (BinaryOp::LessEqual, true) => Opcode::IfLe,
            (BinaryOp::Greater, true) => Opcode::IfGt,
            (BinaryOp::GreaterEqual, true) => Opcode::IfGe,
            _ => return Err(CompilerError::internal(format!("比較でない演算子 '{}'", op.symbol()))),
        };
        self.emitter.emit_branch(branch, target);
        Ok(())
    }

    /// 数値型どうしの変換と参照型のキャスト
    fn gen_conversion(&mut self, from: &Type, to: &Type) {
        if from == to {
            return;
        }
        if to.is_reference() {
            if !to.is_any() && *to != Type::object() && !self.registry.is_assignable(from, to) {
                self.emitter
                    .emit(Instruction::Type(Opcode::CheckCast, to.internal_name()));
            }
            return;
        }
        let from = from.promoted();
        let widened = match (&from, to) {
            (Type::Int, Type::Long) => Some(Opcode::I2L),
            (Type::Int, Type::Float) => Some(Opcode::I2F),
            (Type::Int, Type::Double) => Some(Opcode::I2D),
            (Type::Long, Type::Int | Type::Char) => Some(Opcode::L2I),
            (Type::Long, Type::Float) => Some(Opcode::L2F),
            (Type::Long, Type::Double) => Some(Opcode::L2D),
            (Type::Float, Type::Int | Type::Char) => Some(Opcode::F2I),
            (Type::Float, Type::Long) => Some(Opcode::F2L),
            (Type::Float, Type::Double) => Some(Opcode::F2D),
            (Type::Double, Type::Int | Type::Char) => Some(Opcode::D2I),
            (Type::Double, Type::Long) => Some(Opcode::D2L),
            (Type::Double, Type::Float) => Some(Opcode::D2F),
            _ => None,
        };
        if let Some(op) = widened {
            self.emitter.emit_simple(op);
        }
        if *to == Type::Char && from != Type::Char {
            self.emitter.emit_simple(Opcode::I2C);
        }
    }

    // ---- 代入 ----

    /// 代入先の接頭部（対象オブジェクト、配列と添字）を積む
    fn gen_lvalue<'e>(&mut self, target: &'e Expression) -> Result<LValue<'e>> {
        match &target.kind {
            ExpressionKind::Variable { slot: Some(slot), .. } => Ok(LValue::Local {
                slot: *slot,
                ty: target.ty().clone(),
            }),
            ExpressionKind::FieldSelection {
                target: object,
                field: Some(field),
                ..
            } => {
                if !field.is_static {
                    let object = object.as_ref().ok_or_else(|| unresolved(target.line))?;
                    self.gen_expression(object)?;
                }
                Ok(LValue::Field { field })
            }
            ExpressionKind::ArrayAccess { array, index } => {
                self.gen_expression(array)?;
                self.gen_expression(index)?;
                Ok(LValue::Array {
                    element: target.ty().clone(),
                })
            }
            _ => Err(CompilerError::internal(format!(
                "{} 行目: 代入できない式へのコード生成が要求されました",
                target.line
            ))),
        }
    }

    /// 接頭部を残したまま現在の値を積む
    fn gen_lvalue_load(&mut self, lvalue: &LValue<'_>) {
        match lvalue {
            LValue::Local { slot, ty } => self.emitter.emit_local(load_opcode(ty), *slot),
            LValue::Field { field } if field.is_static => {
                self.emitter.emit(Instruction::Field(Opcode::GetStatic, (*field).clone()))
            }
            LValue::Field { field } => {
                self.emitter.emit_simple(Opcode::Dup);
                self.emitter.emit(Instruction::Field(Opcode::GetField, (*field).clone()));
            }
            LValue::Array { element } => {
                self.emitter.emit_simple(Opcode::Dup2);
                self.emitter.emit_simple(array_load_opcode(element));
            }
        }
    }

    /// スタック最上位の値を接頭部の下へ複製する（式の値として残すため）
    fn gen_lvalue_dup(&mut self, lvalue: &LValue<'_>, ty: &Type) {
        let wide = ty.slot_size() == 2;
        let op = match lvalue {
            LValue::Local { .. } => {
                if wide {
                    Opcode::Dup2
                } else {
                    Opcode::Dup
                }
            }
            LValue::Field { field } if field.is_static => {
                if wide {
                    Opcode::Dup2
                } else {
                    Opcode::Dup
                }
            }
            LValue::Field { .. } => {
                if wide {
                    Opcode::Dup2X1
                } else {
                    Opcode::DupX1
                }
            }
            LValue::Array { .. } => {
                if wide {
                    Opcode::Dup2X2
                } else {
                    Opcode::DupX2
                }
            }
        };
        self.emitter.emit_simple(op);
    }

    fn gen_lvalue_store(&mut self, lvalue: &LValue<'_>) {
        match lvalue {
            LValue::Local { slot, ty } => self.emitter.emit_local(store_opcode(ty), *slot),
            LValue::Field { field } => {
                let op = if field.is_static { Opcode::PutStatic } else { Opcode::PutField };
                self.emitter.emit(Instruction::Field(op, (*field).clone()));
            }
            LValue::Array { element } => self.emitter.emit_simple(array_store_opcode(element)),
        }
    }

    fn gen_assignment(&mut self, op: AssignOp, lhs: &Expression, rhs: &Expression, discard: bool) -> Result<()> {
        let ty = lhs.ty().clone();
        let lvalue = self.gen_lvalue(lhs)?;
        match op {
            AssignOp::Assign => self.gen_expression(rhs)?,
            AssignOp::Compound(BinaryOp::Add) if ty.is_string() => {
                // 左辺の値を StringBuilder(String) に渡してから右辺を追加する
                self.gen_lvalue_load(&lvalue);
                self.emitter.emit(Instruction::Invoke(
                    Opcode::InvokeStatic,
                    MethodRef {
                        owner: STRING.to_string(),
                        name: "valueOf".to_string(),
                        descriptor: format!("(L{};)L{};", OBJECT, STRING),
                        params: vec![Type::object()],
                        return_type: Type::string(),
                        invocation: Invocation::Static,
                    },
                ));
                self.emitter
                    .emit(Instruction::Type(Opcode::New, STRING_BUILDER.to_string()));
                self.emitter.emit_simple(Opcode::DupX1);
                self.emitter.emit_simple(Opcode::Swap);
                self.emitter.emit(Instruction::Invoke(
                    Opcode::InvokeSpecial,
                    builder_method("<init>", vec![Type::string()], Type::Void, Invocation::Special),
                ));
                self.gen_concatenation(rhs)?;
                self.emitter.emit(Instruction::Invoke(
                    Opcode::InvokeVirtual,
                    builder_method("toString", vec![], Type::string(), Invocation::Virtual),
                ));
            }
            AssignOp::Compound(binary) => {
                self.gen_lvalue_load(&lvalue);
                self.gen_expression(rhs)?;
                self.emitter.emit_simple(arithmetic_opcode(binary, &ty.promoted()));
                if ty == Type::Char {
                    self.emitter.emit_simple(Opcode::I2C);
                }
            }
        }
        if !discard {
            self.gen_lvalue_dup(&lvalue, &ty);
        }
        self.gen_lvalue_store(&lvalue);
        Ok(())
    }

    fn gen_increment(&mut self, op: IncrementOp, operand: &Expression, discard: bool) -> Result<()> {
        let ty = operand.ty().clone();
        // int のローカル変数は IINC で直接更新する
        if let (ExpressionKind::Variable { slot: Some(slot), .. }, Type::Int) = (&operand.kind, &ty) {
            if !discard && !op.is_prefix() {
                self.emitter.emit_local(Opcode::ILoad, *slot);
            }
            self.emitter.emit(Instruction::Iinc(*slot, op.delta()));
            if !discard && op.is_prefix() {
                self.emitter.emit_local(Opcode::ILoad, *slot);
            }
            return Ok(());
        }

        let lvalue = self.gen_lvalue(operand)?;
        self.gen_lvalue_load(&lvalue);
        if !discard && !op.is_prefix() {
            self.gen_lvalue_dup(&lvalue, &ty);
        }
        let (one, add) = match ty.promoted() {
            Type::Long => (Constant::Long(1), Opcode::LAdd),
            Type::Float => (Constant::Float(1.0), Opcode::FAdd),
            Type::Double => (Constant::Double(1.0), Opcode::DAdd),
            _ => (Constant::Int(1), Opcode::IAdd),
        };
        self.emitter.emit(Instruction::Constant(one));
        let add = if op.delta() < 0 { subtract_of(add) } else { add };
        self.emitter.emit_simple(add);
        if ty == Type::Char {
            self.emitter.emit_simple(Opcode::I2C);
        }
        if !discard && op.is_prefix() {
            self.gen_lvalue_dup(&lvalue, &ty);
        }
        self.gen_lvalue_store(&lvalue);
        Ok(())
    }
}

fn unresolved(line: usize) -> CompilerError {
    CompilerError::internal(format!("{} 行目: 解析されていないノードのコード生成が要求されました", line))
}

fn has_initialization(member: &Member) -> bool {
    match member {
        Member::Field(field) => field.declarators.iter().any(|d| d.initializer.is_some()),
        Member::Initializer(_) => true,
        _ => false,
    }
}

fn is_super_construction(statement: &Statement) -> bool {
    matches!(
        &statement.kind,
        StatementKind::Expression(Expression {
            kind: ExpressionKind::SuperConstruction { .. },
            ..
        })
    )
}

fn builder_method(name: &str, params: Vec<Type>, return_type: Type, invocation: Invocation) -> MethodRef {
    MethodRef {
        owner: STRING_BUILDER.to_string(),
        name: name.to_string(),
        descriptor: method_descriptor(&params, &return_type),
        params,
        return_type,
        invocation,
    }
}

/// 解決済みの型名（ドット区切りの完全修飾名）から型を作る
fn type_from_name(type_name: &TypeName) -> Type {
    let base = match type_name.name.as_str() {
        "int" => Type::Int,
        "long" => Type::Long,
        "float" => Type::Float,
        "double" => Type::Double,
        "char" => Type::Char,
        "boolean" => Type::Boolean,
        "void" => Type::Void,
        name => Type::Reference(name.replace('.', "/")),
    };
    Type::with_dimensions(base, type_name.dimensions)
}

fn invoke_opcode(invocation: Invocation) -> Opcode {
    match invocation {
        Invocation::Static => Opcode::InvokeStatic,
        Invocation::Virtual => Opcode::InvokeVirtual,
        Invocation::Interface => Opcode::InvokeInterface,
        Invocation::Special => Opcode::InvokeSpecial,
    }
}

fn load_opcode(ty: &Type) -> Opcode {
    match ty {
        Type::Int | Type::Char | Type::Boolean => Opcode::ILoad,
        Type::Long => Opcode::LLoad,
        Type::Float => Opcode::FLoad,
        Type::Double => Opcode::DLoad,
        _ => Opcode::ALoad,
    }
}

fn store_opcode(ty: &Type) -> Opcode {
    match ty {
        Type::Int | Type::Char | Type::Boolean => Opcode::IStore,
        Type::Long => Opcode::LStore,
        Type::Float => Opcode::FStore,
        Type::Double => Opcode::DStore,
        _ => Opcode::AStore,
    }
}

fn return_opcode(ty: &Type) -> Opcode {
    match ty {
        Type::Int | Type::Char | Type::Boolean => Opcode::IReturn,
        Type::Long => Opcode::LReturn,
        Type::Float => Opcode::FReturn,
        Type::Double => Opcode::DReturn,
        Type::Void => Opcode::Return,
        _ => Opcode::AReturn,
    }
}

fn array_load_opcode(element: &Type) -> Opcode {
    match element {
        Type::Int => Opcode::IALoad,
        Type::Long => Opcode::LALoad,
        Type::Float => Opcode::FALoad,
        Type::Double => Opcode::DALoad,
        Type::Char => Opcode::CALoad,
        Type::Boolean => Opcode::BALoad,
        _ => Opcode::AALoad,
    }
}

fn array_store_opcode(element: &Type) -> Opcode {
    match element {
        Type::Int => Opcode::IAStore,
        Type::Long => Opcode::LAStore,
        Type::Float => Opcode::FAStore,
        Type::Double => Opcode::DAStore,
        Type::Char => Opcode::CAStore,
        Type::Boolean => Opcode::BAStore,
        _ => Opcode::AAStore,
    }
}

fn subtract_of(add: Opcode) -> Opcode {
    match add {
        Opcode::LAdd => Opcode::LSub,
        Opcode::FAdd => Opcode::FSub,
        Opcode::DAdd => Opcode::DSub,
        _ => Opcode::ISub,
    }
}

/// 算術・ビット演算の命令。`ty` は昇格後の左辺の型。
fn arithmetic_opcode(op: BinaryOp, ty: &Type) -> Opcode {
    use Opcode::*;
    let [int, long, float, double] = match op {
        BinaryOp::Add => [IAdd, LAdd, FAdd, DAdd],
        BinaryOp::Subtract => [ISub, LSub, FSub, DSub],
        BinaryOp::Multiply => [IMul, LMul, FMul, DMul],
        BinaryOp::Divide => [IDiv, LDiv, FDiv, DDiv],
        BinaryOp::Remainder => [IRem, LRem, FRem, DRem],
        BinaryOp::ShiftLeft => return IShl,
        BinaryOp::ShiftRight => return IShr,
        BinaryOp::UnsignedShiftRight => return IUshr,
        BinaryOp::BitAnd => return IAnd,
        BinaryOp::BitOr => return IOr,
        _ => return IXor,
    };
    match ty {
        Type::Long => long,
        Type::Float => float,
        Type::Double => double,
        _ => int,
    }
}
