//! ブロックと文の構文規則

use crate::frontend::ast::{Block, CatchClause, ExpressionKind, Statement, StatementKind};
use crate::frontend::lexer::TokenKind;

use super::Parser;

impl<'d> Parser<'d> {
    /// block ::= LCURLY {blockStatement} RCURLY
    pub(super) fn block(&mut self) -> Block {
        let line = self.line();
        self.must_be(TokenKind::LeftBrace);
        let mut statements = Vec::new();
        while !self.see(TokenKind::RightBrace) && !self.see(TokenKind::Eof) {
            let start = self.scanner.position();
            statements.push(self.block_statement());
            if self.scanner.position() == start {
                self.next();
            }
        }
        self.must_be(TokenKind::RightBrace);
        Block::new(line, statements)
    }

    /// blockStatement ::= localVariableDeclarationStatement | statement
    fn block_statement(&mut self) -> Statement {
        if self.see_local_variable_declaration() {
            let statement = self.local_variable_declaration();
            self.must_be(TokenKind::Semicolon);
            statement
        } else {
            self.statement()
        }
    }

    /// localVariableDeclaration ::= type variableDeclarators
    fn local_variable_declaration(&mut self) -> Statement {
        let line = self.line();
        let type_name = self.parse_type();
        let declarators = self.variable_declarators(&type_name);
        Statement::new(
            line,
            StatementKind::LocalVariable {
                declarators,
                initializations: Vec::new(),
            },
        )
    }

    pub(super) fn statement(&mut self) -> Statement {
        let line = self.line();
        match self.token().kind {
            TokenKind::LeftBrace => Statement::new(line, StatementKind::Block(self.block())),
            TokenKind::If => {
                self.next();
                let condition = self.par_expression();
                let then_part = Box::new(self.statement());
                let else_part = if self.have(TokenKind::Else) {
                    Some(Box::new(self.statement()))
                } else {
                    None
                };
                Statement::new(
                    line,
                    StatementKind::If {
                        condition,
                        then_part,
                        else_part,
                    },
                )
            }
            TokenKind::While => {
                self.next();
                let condition = self.par_expression();
                let body = Box::new(self.statement());
                Statement::new(line, StatementKind::While { condition, body })
            }
            TokenKind::Do => {
                self.next();
                let body = Box::new(self.statement());
                self.must_be(TokenKind::While);
                let condition = self.par_expression();
                self.must_be(TokenKind::Semicolon);
                Statement::new(line, StatementKind::DoWhile { body, condition })
            }
            TokenKind::For => self.for_statement(line),
            TokenKind::Try => self.try_statement(line),
            TokenKind::Throw => {
                self.next();
                let exception = self.expression();
                self.must_be(TokenKind::Semicolon);
                Statement::new(line, StatementKind::Throw(exception))
            }
            TokenKind::Return => {
                self.next();
                if self.have(TokenKind::Semicolon) {
                    Statement::new(line, StatementKind::Return(None))
                } else {
                    let value = self.expression();
                    self.must_be(TokenKind::Semicolon);
                    Statement::new(line, StatementKind::Return(Some(value)))
                }
            }
            TokenKind::Semicolon => {
                self.next();
                Statement::empty(line)
            }
            TokenKind::Break
            | TokenKind::Continue
            | TokenKind::Switch
            | TokenKind::Synchronized
            | TokenKind::Case
            | TokenKind::Default
            | TokenKind::Goto
            | TokenKind::Const => self.unsupported_statement(line),
            _ => {
                let statement = self.statement_expression();
                self.must_be(TokenKind::Semicolon);
                statement
            }
        }
    }

    /// forStatement ::= FOR LPAREN [forInit] SEMI [expression] SEMI [forUpdate] RPAREN statement
    ///                | FOR LPAREN formalParameter COLON expression RPAREN statement
    fn for_statement(&mut self, line: usize) -> Statement {
        self.must_be(TokenKind::For);
        self.must_be(TokenKind::LeftParen);
        if self.see_traditional_for() {
            let init = if self.see(TokenKind::Semicolon) {
                Vec::new()
            } else if self.see_local_variable_declaration() {
                vec![self.local_variable_declaration()]
            } else {
                self.statement_expression_list()
            };
            self.must_be(TokenKind::Semicolon);
            let condition = if self.see(TokenKind::Semicolon) {
                None
            } else {
                Some(self.expression())
            };
            self.must_be(TokenKind::Semicolon);
            let update = if self.see(TokenKind::RightParen) {
                Vec::new()
            } else {
                self.statement_expression_list()
            };
            self.must_be(TokenKind::RightParen);
            let body = Box::new(self.statement());
            Statement::new(
                line,
                StatementKind::For {
                    init,
                    condition,
                    update,
                    body,
                },
            )
        } else {
            let parameter = self.formal_parameter();
            self.must_be(TokenKind::Colon);
            let iterable = self.expression();
            self.must_be(TokenKind::RightParen);
            let body = Box::new(self.statement());
            Statement::new(
                line,
                StatementKind::ForEach {
                    parameter,
                    iterable,
                    body,
                },
            )
        }
    }

    /// tryStatement ::= TRY block {CATCH LPAREN formalParameter RPAREN block} [FINALLY block]
    fn try_statement(&mut self, line: usize) -> Statement {
        self.must_be(TokenKind::Try);
        let body = self.block();
        let mut catches = Vec::new();
        while self.see(TokenKind::Catch) {
            let catch_line = self.line();
            self.next();
            self.must_be(TokenKind::LeftParen);
            let parameter = self.formal_parameter();
            self.must_be(TokenKind::RightParen);
            let body = self.block();
            catches.push(CatchClause {
                line: catch_line,
                parameter,
                body,
                slot: None,
                exception_type: None,
            });
        }
        let finally = if self.have(TokenKind::Finally) {
            Some(self.block())
        } else {
            None
        };
        if catches.is_empty() && finally.is_none() {
            self.error_at(line, "try 文には 'catch' か 'finally' が必要です");
        }
        Statement::new(
            line,
            StatementKind::Try {
                body,
                catches,
                finally,
                finally_slot: None,
            },
        )
    }

    /// 未対応の文を報告し、`;` か対応する `}` までを読み飛ばす
    fn unsupported_statement(&mut self, line: usize) -> Statement {
        let keyword = self.token().image.clone();
        self.unsupported_at(line, &format!("'{}' 文", keyword));
        self.next();
        let mut depth = 0usize;
        loop {
            match self.token().kind {
                TokenKind::Eof => break,
                TokenKind::LeftBrace => depth += 1,
                TokenKind::RightBrace => {
                    if depth == 0 {
                        break;
                    }
                    depth -= 1;
                    if depth == 0 {
                        self.next();
                        break;
                    }
                }
                TokenKind::Semicolon if depth == 0 => {
                    self.next();
                    break;
                }
                _ => {}
            }
            self.next();
        }
        Statement::empty(line)
    }

    fn statement_expression_list(&mut self) -> Vec<Statement> {
        let mut statements = vec![self.statement_expression()];
        while self.have(TokenKind::Comma) {
            statements.push(self.statement_expression());
        }
        statements
    }

    /// statementExpression ::= expression（副作用を持つものに限る）
    fn statement_expression(&mut self) -> Statement {
        let line = self.line();
        let expression = self.expression();
        if !expression.is_statement_expression() && !matches!(expression.kind, ExpressionKind::Wild) {
            self.error_at(line, "式文になれない式です");
        }
        Statement::new(line, StatementKind::Expression(expression))
    }
}
