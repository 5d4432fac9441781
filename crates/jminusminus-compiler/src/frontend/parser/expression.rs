//! 式の構文規則。優先順位の低い規則から順に並べてある。

use crate::frontend::ast::{
    AssignOp, BinaryOp, Expression, ExpressionKind, IncrementOp, LiteralKind, TypeName, UnaryOp,
};
use crate::frontend::lexer::TokenKind;

use super::Parser;

/// 優先順位ごとの二項演算子表
const CONDITIONAL_OR: &[(TokenKind, BinaryOp)] = &[(TokenKind::LogicalOr, BinaryOp::LogicalOr)];
const CONDITIONAL_AND: &[(TokenKind, BinaryOp)] = &[(TokenKind::LogicalAnd, BinaryOp::LogicalAnd)];
const INCLUSIVE_OR: &[(TokenKind, BinaryOp)] = &[(TokenKind::Pipe, BinaryOp::BitOr)];
const EXCLUSIVE_OR: &[(TokenKind, BinaryOp)] = &[(TokenKind::Caret, BinaryOp::BitXor)];
const AND: &[(TokenKind, BinaryOp)] = &[(TokenKind::Ampersand, BinaryOp::BitAnd)];
const EQUALITY: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Equal, BinaryOp::Equal),
    (TokenKind::NotEqual, BinaryOp::NotEqual),
];
const SHIFT: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::ShiftLeft, BinaryOp::ShiftLeft),
    (TokenKind::ShiftRight, BinaryOp::ShiftRight),
    (TokenKind::UnsignedShiftRight, BinaryOp::UnsignedShiftRight),
];
const ADDITIVE: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Plus, BinaryOp::Add),
    (TokenKind::Minus, BinaryOp::Subtract),
];
const MULTIPLICATIVE: &[(TokenKind, BinaryOp)] = &[
    (TokenKind::Star, BinaryOp::Multiply),
    (TokenKind::Slash, BinaryOp::Divide),
    (TokenKind::Percent, BinaryOp::Remainder),
];

impl<'d> Parser<'d> {
    /// 単独の式を解析する（主にテスト・デバッグ用）
    pub fn parse_expression(&mut self) -> Expression {
        self.expression()
    }

    pub(super) fn par_expression(&mut self) -> Expression {
        self.must_be(TokenKind::LeftParen);
        let expression = self.expression();
        self.must_be(TokenKind::RightParen);
        expression
    }

    pub(super) fn expression(&mut self) -> Expression {
        self.assignment_expression()
    }

    /// 代入は右結合
    fn assignment_expression(&mut self) -> Expression {
        let line = self.line();
        let lhs = self.conditional_expression();
        match AssignOp::from_token(self.token().kind) {
            Some(op) => {
                self.next();
                let rhs = self.assignment_expression();
                Expression::new(
                    line,
                    ExpressionKind::Assign {
                        op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    },
                )
            }
            None => lhs,
        }
    }

    fn conditional_expression(&mut self) -> Expression {
        let line = self.line();
        let condition = self.conditional_or_expression();
        if !self.have(TokenKind::Question) {
            return condition;
        }
        let then_part = self.expression();
        self.must_be(TokenKind::Colon);
        let else_part = self.conditional_expression();
        Expression::new(
            line,
            ExpressionKind::Conditional {
                condition: Box::new(condition),
                then_part: Box::new(then_part),
                else_part: Box::new(else_part),
            },
        )
    }

    /// 左結合の二項演算の一段
    fn binary_level(&mut self, operand: fn(&mut Self) -> Expression, table: &[(TokenKind, BinaryOp)]) -> Expression {
        let line = self.line();
        let mut lhs = operand(self);
        loop {
            let kind = self.token().kind;
            let Some(&(_, op)) = table.iter().find(|(k, _)| *k == kind) else {
                break;
            };
            self.next();
            let rhs = operand(self);
            lhs = Expression::new(
                line,
                ExpressionKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        lhs
    }

    fn conditional_or_expression(&mut self) -> Expression {
        self.binary_level(Self::conditional_and_expression, CONDITIONAL_OR)
    }

    fn conditional_and_expression(&mut self) -> Expression {
        self.binary_level(Self::inclusive_or_expression, CONDITIONAL_AND)
    }

    fn inclusive_or_expression(&mut self) -> Expression {
        self.binary_level(Self::exclusive_or_expression, INCLUSIVE_OR)
    }

    fn exclusive_or_expression(&mut self) -> Expression {
        self.binary_level(Self::and_expression, EXCLUSIVE_OR)
    }

    fn and_expression(&mut self) -> Expression {
        self.binary_level(Self::equality_expression, AND)
    }

    fn equality_expression(&mut self) -> Expression {
        self.binary_level(Self::relational_expression, EQUALITY)
    }

    /// relationalExpression ::= shiftExpression {(LT | LE | GT | GE) shiftExpression | INSTANCEOF type}
    fn relational_expression(&mut self) -> Expression {
        let line = self.line();
        let mut lhs = self.shift_expression();
        loop {
            let op = match self.token().kind {
                TokenKind::Less => BinaryOp::Less,
                TokenKind::LessEqual => BinaryOp::LessEqual,
                TokenKind::Greater => BinaryOp::Greater,
                TokenKind::GreaterEqual => BinaryOp::GreaterEqual,
                TokenKind::Instanceof => {
                    self.next();
                    let type_name = self.parse_type();
                    lhs = Expression::new(
                        line,
                        ExpressionKind::InstanceOf {
                            operand: Box::new(lhs),
                            type_name,
                        },
                    );
                    continue;
                }
                _ => break,
            };
            self.next();
            let rhs = self.shift_expression();
            lhs = Expression::new(
                line,
                ExpressionKind::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
            );
        }
        lhs
    }

    fn shift_expression(&mut self) -> Expression {
        self.binary_level(Self::additive_expression, SHIFT)
    }

    fn additive_expression(&mut self) -> Expression {
        self.binary_level(Self::multiplicative_expression, ADDITIVE)
    }

    fn multiplicative_expression(&mut self) -> Expression {
        self.binary_level(Self::unary_expression, MULTIPLICATIVE)
    }

    /// unaryExpression ::= (INC | DEC | MINUS | PLUS) unaryExpression | simpleUnaryExpression
    fn unary_expression(&mut self) -> Expression {
        let line = self.line();
        match self.token().kind {
            TokenKind::Increment | TokenKind::Decrement => {
                let op = if self.see(TokenKind::Increment) {
                    IncrementOp::PreIncrement
                } else {
                    IncrementOp::PreDecrement
                };
                self.next();
                let operand = Box::new(self.unary_expression());
                Expression::new(line, ExpressionKind::Increment { op, operand })
            }
            TokenKind::Minus | TokenKind::Plus => {
                let op = if self.see(TokenKind::Minus) {
                    UnaryOp::Negate
                } else {
                    UnaryOp::Plus
                };
                self.next();
                let operand = Box::new(self.unary_expression());
                Expression::new(line, ExpressionKind::Unary { op, operand })
            }
            _ => self.simple_unary_expression(),
        }
    }

    /// simpleUnaryExpression ::= LNOT unaryExpression | TILDE unaryExpression
    ///                         | LPAREN type RPAREN (unaryExpression | simpleUnaryExpression)
    ///                         | postfixExpression
    fn simple_unary_expression(&mut self) -> Expression {
        let line = self.line();
        if self.see(TokenKind::LogicalNot) || self.see(TokenKind::Tilde) {
            let op = if self.see(TokenKind::LogicalNot) {
                UnaryOp::Not
            } else {
                UnaryOp::Complement
            };
            self.next();
            let operand = Box::new(self.unary_expression());
            return Expression::new(line, ExpressionKind::Unary { op, operand });
        }
        if self.see_cast() {
            self.must_be(TokenKind::LeftParen);
            let type_name = self.parse_type();
            self.must_be(TokenKind::RightParen);
            // 基本型へのキャストだけが符号付きの被演算子を取れる
            let operand = if type_name.is_primitive() {
                self.unary_expression()
            } else {
                self.simple_unary_expression()
            };
            return Expression::new(
                line,
                ExpressionKind::Cast {
                    type_name,
                    operand: Box::new(operand),
                },
            );
        }
        self.postfix_expression()
    }

    /// postfixExpression ::= primary {selector} {INC | DEC}
    fn postfix_expression(&mut self) -> Expression {
        let line = self.line();
        let mut expression = self.primary();
        while self.see(TokenKind::Dot) || self.see(TokenKind::LeftBracket) {
            expression = self.selector(expression);
        }
        while self.see(TokenKind::Increment) || self.see(TokenKind::Decrement) {
            let op = if self.see(TokenKind::Increment) {
                IncrementOp::PostIncrement
            } else {
                IncrementOp::PostDecrement
            };
            self.next();
            expression = Expression::new(
                line,
                ExpressionKind::Increment {
                    op,
                    operand: Box::new(expression),
                },
            );
        }
        expression
    }

    /// selector ::= DOT IDENTIFIER [arguments] | LBRACK expression RBRACK
    fn selector(&mut self, target: Expression) -> Expression {
        let line = self.line();
        if self.have(TokenKind::Dot) {
            let name = self.identifier();
            if self.see(TokenKind::LeftParen) {
                let arguments = self.arguments();
                Expression::new(
                    line,
                    ExpressionKind::Message {
                        target: Some(Box::new(target)),
                        ambiguous: None,
                        name,
                        arguments,
                        method: None,
                    },
                )
            } else {
                Expression::new(
                    line,
                    ExpressionKind::FieldSelection {
                        target: Some(Box::new(target)),
                        ambiguous: None,
                        name,
                        field: None,
                    },
                )
            }
        } else {
            self.must_be(TokenKind::LeftBracket);
            let index = self.expression();
            self.must_be(TokenKind::RightBracket);
            Expression::new(
                line,
                ExpressionKind::ArrayAccess {
                    array: Box::new(target),
                    index: Box::new(index),
                },
            )
        }
    }

    /// primary ::= parExpression | THIS [arguments] | SUPER (arguments | DOT IDENTIFIER [arguments])
    ///           | NEW creator | qualifiedIdentifier [arguments] | literal
    fn primary(&mut self) -> Expression {
        let line = self.line();
        match self.token().kind {
            TokenKind::LeftParen => self.par_expression(),
            TokenKind::This => {
                self.next();
                if self.see(TokenKind::LeftParen) {
                    let arguments = self.arguments();
                    Expression::new(
                        line,
                        ExpressionKind::ThisConstruction {
                            arguments,
                            constructor: None,
                        },
                    )
                } else {
                    Expression::new(line, ExpressionKind::This)
                }
            }
            TokenKind::Super => {
                self.next();
                if self.see(TokenKind::LeftParen) {
                    let arguments = self.arguments();
                    return Expression::new(
                        line,
                        ExpressionKind::SuperConstruction {
                            arguments,
                            constructor: None,
                        },
                    );
                }
                self.must_be(TokenKind::Dot);
                let name = self.identifier();
                let target = Some(Box::new(Expression::new(line, ExpressionKind::Super)));
                if self.see(TokenKind::LeftParen) {
                    let arguments = self.arguments();
                    Expression::new(
                        line,
                        ExpressionKind::Message {
                            target,
                            ambiguous: None,
                            name,
                            arguments,
                            method: None,
                        },
                    )
                } else {
                    Expression::new(
                        line,
                        ExpressionKind::FieldSelection {
                            target,
                            ambiguous: None,
                            name,
                            field: None,
                        },
                    )
                }
            }
            TokenKind::New => {
                self.next();
                self.creator(line)
            }
            TokenKind::Identifier => {
                let qualified = self.qualified_identifier();
                let (ambiguous, name) = match qualified.rfind('.') {
                    Some(dot) => (Some(qualified[..dot].to_string()), qualified[dot + 1..].to_string()),
                    None => (None, qualified),
                };
                if self.see(TokenKind::LeftParen) {
                    let arguments = self.arguments();
                    Expression::new(
                        line,
                        ExpressionKind::Message {
                            target: None,
                            ambiguous,
                            name,
                            arguments,
                            method: None,
                        },
                    )
                } else if ambiguous.is_some() {
                    Expression::new(
                        line,
                        ExpressionKind::FieldSelection {
                            target: None,
                            ambiguous,
                            name,
                            field: None,
                        },
                    )
                } else {
                    Expression::variable(line, name)
                }
            }
            _ => self.literal(),
        }
    }

    /// creator ::= (basicType | qualifiedIdentifier)
    ///             (arguments | LBRACK RBRACK {LBRACK RBRACK} arrayInitializer | newArrayDeclarator)
    fn creator(&mut self, line: usize) -> Expression {
        let type_line = self.line();
        let base = if self.see_basic_type() {
            let name = self.token().image.clone();
            self.next();
            TypeName::new(type_line, name)
        } else if self.see(TokenKind::Identifier) {
            TypeName::new(type_line, self.qualified_identifier())
        } else {
            let message = format!("生成する型が必要ですが '{}' が見つかりました", self.token().image);
            self.report(message);
            return Expression::wild(line);
        };

        if self.see(TokenKind::LeftParen) {
            if base.is_primitive() {
                self.error_at(type_line, format!("基本型 '{}' のインスタンスは生成できません", base));
            }
            let arguments = self.arguments();
            return Expression::new(
                line,
                ExpressionKind::New {
                    type_name: base,
                    arguments,
                    constructor: None,
                },
            );
        }
        if self.see_dims() {
            let mut type_name = base;
            while self.see_dims() {
                self.next();
                self.next();
                type_name.dimensions += 1;
            }
            if self.see(TokenKind::LeftBrace) {
                return self.array_initializer(&type_name);
            }
            let message = format!("配列の初期化子が必要ですが '{}' が見つかりました", self.token().image);
            self.report(message);
            return Expression::wild(line);
        }
        if self.see(TokenKind::LeftBracket) {
            return self.new_array_declarator(line, base);
        }
        let message = format!("'(' か '[' が必要ですが '{}' が見つかりました", self.token().image);
        self.report(message);
        Expression::wild(line)
    }

    /// newArrayDeclarator ::= LBRACK expression RBRACK {LBRACK expression RBRACK} {LBRACK RBRACK}
    fn new_array_declarator(&mut self, line: usize, base: TypeName) -> Expression {
        let mut type_name = base;
        let mut dimensions = Vec::new();
        while self.see(TokenKind::LeftBracket) && !self.see_dims() {
            self.next();
            dimensions.push(self.expression());
            self.must_be(TokenKind::RightBracket);
            type_name.dimensions += 1;
        }
        while self.see_dims() {
            self.next();
            self.next();
            type_name.dimensions += 1;
        }
        Expression::new(
            line,
            ExpressionKind::NewArray {
                type_name,
                dimensions,
            },
        )
    }

    /// arguments ::= LPAREN [expression {COMMA expression}] RPAREN
    fn arguments(&mut self) -> Vec<Expression> {
        let mut arguments = Vec::new();
        self.must_be(TokenKind::LeftParen);
        if self.have(TokenKind::RightParen) {
            return arguments;
        }
        loop {
            arguments.push(self.expression());
            if !self.have(TokenKind::Comma) {
                break;
            }
        }
        self.must_be(TokenKind::RightParen);
        arguments
    }

    fn literal(&mut self) -> Expression {
        let line = self.line();
        let kind = match self.token().kind {
            TokenKind::IntLiteral => LiteralKind::Int,
            TokenKind::LongLiteral => LiteralKind::Long,
            TokenKind::FloatLiteral => LiteralKind::Float,
            TokenKind::DoubleLiteral => LiteralKind::Double,
            TokenKind::CharLiteral => LiteralKind::Char,
            TokenKind::StringLiteral => LiteralKind::String,
            TokenKind::True | TokenKind::False => LiteralKind::Boolean,
            TokenKind::Null => LiteralKind::Null,
            _ => {
                let message = format!("式が必要ですが '{}' が見つかりました", self.token().image);
                self.report(message);
                return Expression::wild(line);
            }
        };
        let image = self.token().image.clone();
        self.next();
        Expression::literal(line, kind, image)
    }
}

#[cfg(test)]
mod tests {
    use crate::diagnostics::Diagnostics;
    use crate::frontend::ast::{BinaryOp, ExpressionKind};

    use super::super::Parser;

    fn parse_expression(source: &str) -> (ExpressionKind, usize) {
        let mut diagnostics = Diagnostics::new("Test.java");
        let expression = Parser::new(source, "Test.java", &mut diagnostics).parse_expression();
        (expression.kind, diagnostics.error_count())
    }

    #[test]
    fn test_multiplication_binds_tighter() {
        let (kind, errors) = parse_expression("2 + 3 * 4");
        assert_eq!(errors, 0);
        match kind {
            ExpressionKind::Binary { op: BinaryOp::Add, rhs, .. } => {
                assert!(matches!(rhs.kind, ExpressionKind::Binary { op: BinaryOp::Multiply, .. }));
            }
            other => panic!("unexpected root: {:?}", other),
        }
    }

    #[test]
    fn test_assignment_is_right_associative() {
        let (kind, _) = parse_expression("a = b = 3");
        match kind {
            ExpressionKind::Assign { rhs, .. } => assert!(matches!(rhs.kind, ExpressionKind::Assign { .. })),
            other => panic!("unexpected root: {:?}", other),
        }
    }

    #[test]
    fn test_cast_versus_parenthesized() {
        let (kind, _) = parse_expression("(int) -x");
        assert!(matches!(kind, ExpressionKind::Cast { .. }));
        let (kind, _) = parse_expression("(a) - b");
        assert!(matches!(kind, ExpressionKind::Binary { op: BinaryOp::Subtract, .. }));
        let (kind, _) = parse_expression("(String) o");
        assert!(matches!(kind, ExpressionKind::Cast { .. }));
    }

    #[test]
    fn test_qualified_name_is_ambiguous() {
        let (kind, _) = parse_expression("a.b.c");
        match kind {
            ExpressionKind::FieldSelection { target, ambiguous, name, .. } => {
                assert!(target.is_none());
                assert_eq!(ambiguous.as_deref(), Some("a.b"));
                assert_eq!(name, "c");
            }
            other => panic!("unexpected root: {:?}", other),
        }
    }

    #[test]
    fn test_new_array_dimensions() {
        let (kind, _) = parse_expression("new int[3][]");
        match kind {
            ExpressionKind::NewArray { type_name, dimensions } => {
                assert_eq!(type_name.dimensions, 2);
                assert_eq!(dimensions.len(), 1);
            }
            other => panic!("unexpected root: {:?}", other),
        }
    }

    #[test]
    fn test_missing_operand_reports_once() {
        let (kind, errors) = parse_expression("1 + ;");
        assert!(matches!(kind, ExpressionKind::Binary { .. }));
        assert_eq!(errors, 1);
    }
}
