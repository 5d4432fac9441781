//! # ASTのダンプ
//!
//! 構文木をインデント付きのXML風テキストとして書き出します。
//! 解析後に呼び出すと、式には解決済みの型が `type` 属性として付きます。

use super::*;

/// インデント付きでテキストを組み立てるプリンタ
#[derive(Debug, Default)]
pub struct PrettyPrinter {
    out: String,
    indent: usize,
}

impl PrettyPrinter {
    const INDENT_WIDTH: usize = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// コンパイル単位全体をダンプする
    pub fn dump(unit: &CompilationUnit) -> String {
        let mut printer = Self::new();
        printer.compilation_unit(unit);
        printer.finish()
    }

    /// 1つの式をダンプする
    pub fn dump_expression(expression: &Expression) -> String {
        let mut printer = Self::new();
        printer.expression(expression);
        printer.finish()
    }

    pub fn finish(self) -> String {
        self.out
    }

    fn line(&mut self, text: &str) {
        self.out.push_str(&" ".repeat(self.indent));
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn open(&mut self, tag: &str, attributes: &[(&str, String)]) {
        let text = format!("<{}{}>", tag, render_attributes(attributes));
        self.line(&text);
        self.indent += Self::INDENT_WIDTH;
    }

    fn close(&mut self, tag: &str) {
        self.indent = self.indent.saturating_sub(Self::INDENT_WIDTH);
        self.line(&format!("</{}>", tag));
    }

    fn leaf(&mut self, tag: &str, attributes: &[(&str, String)]) {
        let text = format!("<{}{}/>", tag, render_attributes(attributes));
        self.line(&text);
    }

    fn wrap(&mut self, tag: &str, expression: &Expression) {
        self.open(tag, &[]);
        self.expression(expression);
        self.close(tag);
    }

    fn compilation_unit(&mut self, unit: &CompilationUnit) {
        self.open(
            "CompilationUnit",
            &[("file", unit.file_name.clone()), ("line", unit.line.to_string())],
        );
        if let Some(package) = &unit.package {
            self.leaf("Package", &[("name", package.clone())]);
        }
        for import in &unit.imports {
            self.leaf(
                "Import",
                &[("line", import.line.to_string()), ("name", import.name.clone())],
            );
        }
        for class in &unit.type_declarations {
            self.class_declaration(class);
        }
        self.close("CompilationUnit");
    }

    fn class_declaration(&mut self, class: &ClassDeclaration) {
        let tag = if class.is_interface {
            "InterfaceDeclaration"
        } else {
            "ClassDeclaration"
        };
        let mut attributes = vec![
            ("line", class.line.to_string()),
            ("name", class.name.clone()),
        ];
        if let Some(super_class) = &class.super_class {
            attributes.push(("super", super_class.to_string()));
        }
        if !class.modifiers.list.is_empty() {
            attributes.push(("modifiers", class.modifiers.to_string()));
        }
        self.open(tag, &attributes);
        if !class.interfaces.is_empty() {
            self.open("Implements", &[]);
            for interface in &class.interfaces {
                self.leaf("Type", &[("name", interface.to_string())]);
            }
            self.close("Implements");
        }
        for member in &class.members {
            self.member(member);
        }
        self.close(tag);
    }

    fn member(&mut self, member: &Member) {
        match member {
            Member::Field(field) => {
                let mut attributes = vec![("line", field.line.to_string())];
                if !field.modifiers.list.is_empty() {
                    attributes.push(("modifiers", field.modifiers.to_string()));
                }
                self.open("FieldDeclaration", &attributes);
                for declarator in &field.declarators {
                    self.declarator(declarator);
                }
                self.close("FieldDeclaration");
            }
            Member::Method(method) => self.method_declaration(method),
            Member::Initializer(initializer) => {
                let tag = if initializer.is_static {
                    "StaticInitializer"
                } else {
                    "InstanceInitializer"
                };
                self.open(tag, &[("line", initializer.line.to_string())]);
                self.block(&initializer.body);
                self.close(tag);
            }
            Member::Type(class) => self.class_declaration(class),
        }
    }

    fn method_declaration(&mut self, method: &MethodDeclaration) {
        let tag = if method.is_constructor() {
            "ConstructorDeclaration"
        } else {
            "MethodDeclaration"
        };
        let mut attributes = vec![
            ("line", method.line.to_string()),
            ("name", method.name.clone()),
        ];
        if !method.is_constructor() {
            attributes.push(("returnType", method.return_type.to_string()));
        }
        if !method.modifiers.list.is_empty() {
            attributes.push(("modifiers", method.modifiers.to_string()));
        }
        if let Some(descriptor) = &method.descriptor {
            attributes.push(("descriptor", descriptor.clone()));
        }
        self.open(tag, &attributes);
        if !method.parameters.is_empty() {
            self.open("FormalParameters", &[]);
            for parameter in &method.parameters {
                self.formal_parameter(parameter);
            }
            self.close("FormalParameters");
        }
        if !method.throws.is_empty() {
            self.open("Throws", &[]);
            for thrown in &method.throws {
                self.leaf("Type", &[("name", thrown.to_string())]);
            }
            self.close("Throws");
        }
        if let Some(body) = &method.body {
            self.block(body);
        }
        self.close(tag);
    }

    fn formal_parameter(&mut self, parameter: &FormalParameter) {
        self.leaf(
            "FormalParameter",
            &[
                ("line", parameter.line.to_string()),
                ("name", parameter.name.clone()),
                ("type", parameter.type_name.to_string()),
            ],
        );
    }

    fn declarator(&mut self, declarator: &VariableDeclarator) {
        let mut attributes = vec![
            ("line", declarator.line.to_string()),
            ("name", declarator.name.clone()),
            ("type", declarator.type_name.to_string()),
        ];
        if let Some(slot) = declarator.slot {
            attributes.push(("slot", slot.to_string()));
        }
        match &declarator.initializer {
            Some(initializer) => {
                self.open("VariableDeclarator", &attributes);
                self.wrap("Initializer", initializer);
                self.close("VariableDeclarator");
            }
            None => self.leaf("VariableDeclarator", &attributes),
        }
    }

    fn block(&mut self, block: &Block) {
        if block.statements.is_empty() {
            self.leaf("Block", &[("line", block.line.to_string())]);
            return;
        }
        self.open("Block", &[("line", block.line.to_string())]);
        for statement in &block.statements {
            self.statement(statement);
        }
        self.close("Block");
    }

    fn nested(&mut self, tag: &str, statement: &Statement) {
        self.open(tag, &[]);
        self.statement(statement);
        self.close(tag);
    }

    pub fn statement(&mut self, statement: &Statement) {
        let line = ("line", statement.line.to_string());
        match &statement.kind {
            StatementKind::Block(block) => self.block(block),
            StatementKind::If {
                condition,
                then_part,
                else_part,
            } => {
                self.open("IfStatement", &[line]);
                self.wrap("TestExpression", condition);
                self.nested("ThenClause", then_part);
                if let Some(else_part) = else_part {
                    self.nested("ElseClause", else_part);
                }
                self.close("IfStatement");
            }
            StatementKind::While { condition, body } => {
                self.open("WhileStatement", &[line]);
                self.wrap("TestExpression", condition);
                self.nested("Body", body);
                self.close("WhileStatement");
            }
            StatementKind::DoWhile { body, condition } => {
                self.open("DoWhileStatement", &[line]);
                self.nested("Body", body);
                self.wrap("TestExpression", condition);
                self.close("DoWhileStatement");
            }
            StatementKind::For {
                init,
                condition,
                update,
                body,
            } => {
                self.open("ForStatement", &[line]);
                if !init.is_empty() {
                    self.open("Init", &[]);
                    for statement in init {
                        self.statement(statement);
                    }
                    self.close("Init");
                }
                if let Some(condition) = condition {
                    self.wrap("TestExpression", condition);
                }
                if !update.is_empty() {
                    self.open("Update", &[]);
                    for statement in update {
                        self.statement(statement);
                    }
                    self.close("Update");
                }
                self.nested("Body", body);
                self.close("ForStatement");
            }
            StatementKind::ForEach {
                parameter,
                iterable,
                body,
            } => {
                self.open("ForEachStatement", &[line]);
                self.formal_parameter(parameter);
                self.wrap("Iterable", iterable);
                self.nested("Body", body);
                self.close("ForEachStatement");
            }
            StatementKind::Try {
                body,
                catches,
                finally,
                ..
            } => {
                self.open("TryStatement", &[line]);
                self.open("TryBlock", &[]);
                self.block(body);
                self.close("TryBlock");
                for clause in catches {
                    self.open("CatchClause", &[("line", clause.line.to_string())]);
                    self.formal_parameter(&clause.parameter);
                    self.block(&clause.body);
                    self.close("CatchClause");
                }
                if let Some(finally) = finally {
                    self.open("FinallyBlock", &[]);
                    self.block(finally);
                    self.close("FinallyBlock");
                }
                self.close("TryStatement");
            }
            StatementKind::Throw(expression) => {
                self.open("ThrowStatement", &[line]);
                self.expression(expression);
                self.close("ThrowStatement");
            }
            StatementKind::Return(value) => match value {
                Some(value) => {
                    self.open("ReturnStatement", &[line]);
                    self.expression(value);
                    self.close("ReturnStatement");
                }
                None => self.leaf("ReturnStatement", &[line]),
            },
            StatementKind::LocalVariable {
                declarators,
                initializations,
            } => {
                self.open("VariableDeclaration", &[line]);
                for declarator in declarators {
                    self.declarator(declarator);
                }
                if !initializations.is_empty() {
                    self.open("Initializations", &[]);
                    for initialization in initializations {
                        self.expression(initialization);
                    }
                    self.close("Initializations");
                }
                self.close("VariableDeclaration");
            }
            StatementKind::Expression(expression) => {
                self.open("StatementExpression", &[line]);
                self.expression(expression);
                self.close("StatementExpression");
            }
            StatementKind::Empty => self.leaf("EmptyStatement", &[line]),
        }
    }

    pub fn expression(&mut self, expression: &Expression) {
        let mut attributes = vec![("line", expression.line.to_string())];
        if let Some(ty) = &expression.ty {
            attributes.push(("type", ty.to_string()));
        }

        match &expression.kind {
            ExpressionKind::Literal(literal) => {
                attributes.push(("value", literal.image.clone()));
                self.leaf("Literal", &attributes);
            }
            ExpressionKind::Variable { name, slot } => {
                attributes.push(("name", name.clone()));
                if let Some(slot) = slot {
                    attributes.push(("slot", slot.to_string()));
                }
                self.leaf("Variable", &attributes);
            }
            ExpressionKind::This => self.leaf("This", &attributes),
            ExpressionKind::Super => self.leaf("Super", &attributes),
            ExpressionKind::Binary { op, lhs, rhs } => {
                attributes.push(("operator", op.symbol().to_string()));
                self.open("BinaryOperation", &attributes);
                self.wrap("Lhs", lhs);
                self.wrap("Rhs", rhs);
                self.close("BinaryOperation");
            }
            ExpressionKind::Unary { op, operand } => {
                attributes.push(("operator", op.symbol().to_string()));
                self.open("UnaryOperation", &attributes);
                self.expression(operand);
                self.close("UnaryOperation");
            }
            ExpressionKind::Increment { op, operand } => {
                attributes.push(("operator", op.symbol().to_string()));
                self.open("IncrementOperation", &attributes);
                self.expression(operand);
                self.close("IncrementOperation");
            }
            ExpressionKind::Assign { op, lhs, rhs } => {
                attributes.push(("operator", op.symbol()));
                self.open("Assignment", &attributes);
                self.wrap("Lhs", lhs);
                self.wrap("Rhs", rhs);
                self.close("Assignment");
            }
            ExpressionKind::Conditional {
                condition,
                then_part,
                else_part,
            } => {
                self.open("ConditionalExpression", &attributes);
                self.wrap("TestExpression", condition);
                self.wrap("TrueClause", then_part);
                self.wrap("FalseClause", else_part);
                self.close("ConditionalExpression");
            }
            ExpressionKind::Message {
                target,
                ambiguous,
                name,
                arguments,
                ..
            } => {
                attributes.push(("name", name.clone()));
                if let Some(ambiguous) = ambiguous {
                    attributes.push(("ambiguousPart", ambiguous.clone()));
                }
                self.open("MessageExpression", &attributes);
                if let Some(target) = target {
                    self.wrap("Target", target);
                }
                self.arguments(arguments);
                self.close("MessageExpression");
            }
            ExpressionKind::FieldSelection {
                target,
                ambiguous,
                name,
                ..
            } => {
                attributes.push(("name", name.clone()));
                if let Some(ambiguous) = ambiguous {
                    attributes.push(("ambiguousPart", ambiguous.clone()));
                }
                match target {
                    Some(target) => {
                        self.open("FieldSelection", &attributes);
                        self.wrap("Target", target);
                        self.close("FieldSelection");
                    }
                    None => self.leaf("FieldSelection", &attributes),
                }
            }
            ExpressionKind::ArrayLength(array) => {
                self.open("ArrayLength", &attributes);
                self.expression(array);
                self.close("ArrayLength");
            }
            ExpressionKind::ArrayAccess { array, index } => {
                self.open("ArrayExpression", &attributes);
                self.wrap("TheArray", array);
                self.wrap("TheIndex", index);
                self.close("ArrayExpression");
            }
            ExpressionKind::Cast { type_name, operand } => {
                attributes.push(("toType", type_name.to_string()));
                self.open("CastOp", &attributes);
                self.expression(operand);
                self.close("CastOp");
            }
            ExpressionKind::InstanceOf { operand, type_name } => {
                attributes.push(("referenceType", type_name.to_string()));
                self.open("InstanceOfOp", &attributes);
                self.expression(operand);
                self.close("InstanceOfOp");
            }
            ExpressionKind::New {
                type_name,
                arguments,
                ..
            } => {
                attributes.push(("class", type_name.to_string()));
                self.open("NewOp", &attributes);
                self.arguments(arguments);
                self.close("NewOp");
            }
            ExpressionKind::NewArray {
                type_name,
                dimensions,
            } => {
                attributes.push(("arrayType", type_name.to_string()));
                self.open("NewArrayOp", &attributes);
                for dimension in dimensions {
                    self.wrap("Dimension", dimension);
                }
                self.close("NewArrayOp");
            }
            ExpressionKind::ArrayInitializer {
                type_name,
                elements,
            } => {
                if let Some(type_name) = type_name {
                    attributes.push(("arrayType", type_name.to_string()));
                }
                self.open("ArrayInitializer", &attributes);
                for element in elements {
                    self.expression(element);
                }
                self.close("ArrayInitializer");
            }
            ExpressionKind::ThisConstruction { arguments, .. } => {
                self.open("ThisConstruction", &attributes);
                self.arguments(arguments);
                self.close("ThisConstruction");
            }
            ExpressionKind::SuperConstruction { arguments, .. } => {
                self.open("SuperConstruction", &attributes);
                self.arguments(arguments);
                self.close("SuperConstruction");
            }
            ExpressionKind::Wild => self.leaf("WildExpression", &attributes),
        }
    }

    fn arguments(&mut self, arguments: &[Expression]) {
        if arguments.is_empty() {
            return;
        }
        self.open("Arguments", &[]);
        for argument in arguments {
            self.expression(argument);
        }
        self.close("Arguments");
    }
}

fn render_attributes(attributes: &[(&str, String)]) -> String {
    attributes
        .iter()
        .map(|(name, value)| format!(" {}=\"{}\"", name, escape(value)))
        .collect()
}

fn escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expression_dump_escapes_operators() {
        let expression = Expression::new(
            3,
            ExpressionKind::Binary {
                op: BinaryOp::Less,
                lhs: Box::new(Expression::variable(3, "i")),
                rhs: Box::new(Expression::literal(3, LiteralKind::Int, "10")),
            },
        );
        let text = PrettyPrinter::dump_expression(&expression);
        assert!(text.starts_with("<BinaryOperation line=\"3\" operator=\"&lt;\">"));
        assert!(text.contains("    <Variable line=\"3\" name=\"i\"/>"));
    }
}
