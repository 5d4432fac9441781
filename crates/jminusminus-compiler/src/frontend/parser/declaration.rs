//! コンパイル単位・型宣言・メンバの構文規則

use crate::frontend::ast::{
    ClassDeclaration, CompilationUnit, Expression, ExpressionKind, FieldDeclaration,
    FormalParameter, Import, Initializer, Member, MethodDeclaration, MethodKind, Modifier,
    Modifiers, TypeName, VariableDeclarator,
};
use crate::frontend::lexer::TokenKind;

use super::Parser;

impl<'d> Parser<'d> {
    /// compilationUnit ::= [PACKAGE qualifiedIdentifier SEMI]
    ///                     {IMPORT qualifiedIdentifier SEMI}
    ///                     {typeDeclaration} EOF
    pub fn parse_compilation_unit(&mut self) -> CompilationUnit {
        let file_name = self.scanner.file_name().to_string();
        let mut unit = CompilationUnit::new(file_name, self.line());
        if self.have(TokenKind::Package) {
            unit.package = Some(self.qualified_identifier());
            self.must_be(TokenKind::Semicolon);
        }
        while self.see(TokenKind::Import) {
            let line = self.line();
            self.next();
            let name = self.qualified_identifier();
            self.must_be(TokenKind::Semicolon);
            unit.imports.push(Import { line, name });
        }
        while !self.see(TokenKind::Eof) {
            let start = self.scanner.position();
            if let Some(declaration) = self.type_declaration() {
                unit.type_declarations.push(declaration);
            }
            if self.scanner.position() == start {
                self.next();
            }
        }
        self.must_be(TokenKind::Eof);
        unit
    }

    fn type_declaration(&mut self) -> Option<ClassDeclaration> {
        let line = self.line();
        if self.have(TokenKind::Semicolon) {
            return None;
        }
        let modifiers = self.modifiers();
        if self.see(TokenKind::Class) {
            Some(self.class_declaration(line, modifiers))
        } else if self.see(TokenKind::Interface) {
            Some(self.interface_declaration(line, modifiers))
        } else {
            let message = format!(
                "型宣言が必要ですが '{}' が見つかりました",
                self.token().image
            );
            self.report(message);
            None
        }
    }

    /// modifiers ::= {PUBLIC | PROTECTED | PRIVATE | STATIC | ABSTRACT | ...}
    pub(super) fn modifiers(&mut self) -> Modifiers {
        let mut modifiers = Modifiers::new();
        let mut access_seen = false;
        while let Some(modifier) = Modifier::from_token(self.token().kind) {
            let line = self.line();
            self.next();
            if modifiers.contains(modifier) {
                self.error_at(line, format!("修飾子 '{}' が重複しています", modifier.keyword()));
                continue;
            }
            if modifier.is_access() {
                if access_seen {
                    self.error_at(
                        line,
                        format!("アクセス修飾子 '{}' が他のアクセス修飾子と競合しています", modifier.keyword()),
                    );
                }
                access_seen = true;
            }
            modifiers.list.push(modifier);
        }
        modifiers
    }

    /// classDeclaration ::= CLASS IDENTIFIER [EXTENDS qualifiedIdentifier]
    ///                      [IMPLEMENTS qualifiedIdentifier {COMMA qualifiedIdentifier}] classBody
    fn class_declaration(&mut self, line: usize, modifiers: Modifiers) -> ClassDeclaration {
        self.must_be(TokenKind::Class);
        let name = self.identifier();
        let super_class = if self.have(TokenKind::Extends) {
            Some(self.parse_qualified_type())
        } else {
            None
        };
        let interfaces = if self.have(TokenKind::Implements) {
            self.qualified_type_list()
        } else {
            Vec::new()
        };
        let members = self.class_body(false);
        ClassDeclaration {
            line,
            modifiers,
            name,
            is_interface: false,
            super_class,
            interfaces,
            members,
            internal_name: None,
        }
    }

    /// interfaceDeclaration ::= INTERFACE IDENTIFIER
    ///                          [EXTENDS qualifiedIdentifier {COMMA qualifiedIdentifier}] interfaceBody
    fn interface_declaration(&mut self, line: usize, modifiers: Modifiers) -> ClassDeclaration {
        self.must_be(TokenKind::Interface);
        let name = self.identifier();
        let interfaces = if self.have(TokenKind::Extends) {
            self.qualified_type_list()
        } else {
            Vec::new()
        };
        let members = self.class_body(true);
        ClassDeclaration {
            line,
            modifiers: modifiers.with(Modifier::Abstract),
            name,
            is_interface: true,
            super_class: None,
            interfaces,
            members,
            internal_name: None,
        }
    }

    fn qualified_type_list(&mut self) -> Vec<TypeName> {
        let mut types = vec![self.parse_qualified_type()];
        while self.have(TokenKind::Comma) {
            types.push(self.parse_qualified_type());
        }
        types
    }

    /// classBody ::= LCURLY {SEMI | STATIC block | block | modifiers memberDecl} RCURLY
    fn class_body(&mut self, in_interface: bool) -> Vec<Member> {
        let mut members = Vec::new();
        self.must_be(TokenKind::LeftBrace);
        while !self.see(TokenKind::RightBrace) && !self.see(TokenKind::Eof) {
            let start = self.scanner.position();
            let line = self.line();
            if self.have(TokenKind::Semicolon) {
                self.warning_at(line, "クラス本体の単独の ';' は無視されます");
                continue;
            }
            if self.see(TokenKind::LeftBrace) || self.see_static_block() {
                let is_static = self.have(TokenKind::Static);
                let body = self.block();
                if in_interface {
                    self.error_at(line, "インターフェースに初期化ブロックは書けません");
                }
                members.push(Member::Initializer(Initializer {
                    line,
                    is_static,
                    body,
                }));
            } else {
                let modifiers = self.modifiers();
                if let Some(member) = self.member_declaration(line, modifiers, in_interface) {
                    members.push(member);
                }
            }
            if self.scanner.position() == start {
                self.next();
            }
        }
        self.must_be(TokenKind::RightBrace);
        members
    }

    fn see_static_block(&mut self) -> bool {
        self.see(TokenKind::Static)
            && self.speculate(|p| {
                p.next();
                p.see(TokenKind::LeftBrace)
            })
    }

    /// memberDecl ::= IDENTIFIER formalParameters [THROWS ...] block
    ///              | (VOID | type) IDENTIFIER formalParameters [THROWS ...] (block | SEMI)
    ///              | type variableDeclarators SEMI
    ///              | classDeclaration | interfaceDeclaration
    fn member_declaration(&mut self, line: usize, modifiers: Modifiers, in_interface: bool) -> Option<Member> {
        if self.see(TokenKind::Class) {
            return Some(Member::Type(self.class_declaration(line, modifiers)));
        }
        if self.see(TokenKind::Interface) {
            return Some(Member::Type(self.interface_declaration(line, modifiers)));
        }
        if self.see_identifier_lparen() {
            let name = self.identifier();
            let parameters = self.formal_parameters();
            let throws = self.throws_clause();
            let body = Some(self.block());
            if in_interface {
                self.error_at(line, "インターフェースにコンストラクタは書けません");
            }
            return Some(Member::Method(MethodDeclaration {
                line,
                modifiers,
                kind: MethodKind::Constructor,
                name,
                return_type: TypeName::new(line, "void"),
                parameters,
                throws,
                body,
                descriptor: None,
                exceptions: Vec::new(),
            }));
        }

        let return_type = if self.see(TokenKind::Void) {
            let void_line = self.line();
            self.next();
            TypeName::new(void_line, "void")
        } else {
            self.parse_type()
        };
        if return_type.is_void() || self.see_identifier_lparen() {
            let name = self.identifier();
            let parameters = self.formal_parameters();
            let throws = self.throws_clause();
            let body = if self.have(TokenKind::Semicolon) {
                None
            } else {
                Some(self.block())
            };
            let modifiers = if in_interface {
                modifiers.with(Modifier::Public).with(Modifier::Abstract)
            } else {
                modifiers
            };
            return Some(Member::Method(MethodDeclaration {
                line,
                modifiers,
                kind: MethodKind::Method,
                name,
                return_type,
                parameters,
                throws,
                body,
                descriptor: None,
                exceptions: Vec::new(),
            }));
        }

        let declarators = self.variable_declarators(&return_type);
        self.must_be(TokenKind::Semicolon);
        let modifiers = if in_interface {
            modifiers
                .with(Modifier::Public)
                .with(Modifier::Static)
                .with(Modifier::Final)
        } else {
            modifiers
        };
        Some(Member::Field(FieldDeclaration {
            line,
            modifiers,
            declarators,
        }))
    }

    /// formalParameters ::= LPAREN [formalParameter {COMMA formalParameter}] RPAREN
    fn formal_parameters(&mut self) -> Vec<FormalParameter> {
        let mut parameters = Vec::new();
        self.must_be(TokenKind::LeftParen);
        if self.have(TokenKind::RightParen) {
            return parameters;
        }
        loop {
            parameters.push(self.formal_parameter());
            if !self.have(TokenKind::Comma) {
                break;
            }
        }
        self.must_be(TokenKind::RightParen);
        parameters
    }

    /// formalParameter ::= [FINAL] type IDENTIFIER
    pub(super) fn formal_parameter(&mut self) -> FormalParameter {
        let line = self.line();
        self.have(TokenKind::Final);
        let type_name = self.parse_type();
        let name = self.identifier();
        FormalParameter {
            line,
            name,
            type_name,
        }
    }

    fn throws_clause(&mut self) -> Vec<TypeName> {
        if self.have(TokenKind::Throws) {
            self.qualified_type_list()
        } else {
            Vec::new()
        }
    }

    /// variableDeclarators ::= variableDeclarator {COMMA variableDeclarator}
    pub(super) fn variable_declarators(&mut self, type_name: &TypeName) -> Vec<VariableDeclarator> {
        let mut declarators = vec![self.variable_declarator(type_name)];
        while self.have(TokenKind::Comma) {
            declarators.push(self.variable_declarator(type_name));
        }
        declarators
    }

    /// variableDeclarator ::= IDENTIFIER {LBRACK RBRACK} [ASSIGN variableInitializer]
    fn variable_declarator(&mut self, type_name: &TypeName) -> VariableDeclarator {
        let line = self.line();
        let name = self.identifier();
        let mut declared = type_name.clone();
        while self.see_dims() {
            self.next();
            self.next();
            declared.dimensions += 1;
        }
        let initializer = if self.have(TokenKind::Assign) {
            Some(self.variable_initializer(&declared))
        } else {
            None
        };
        VariableDeclarator::new(line, name, declared, initializer)
    }

    /// variableInitializer ::= arrayInitializer | expression
    fn variable_initializer(&mut self, type_name: &TypeName) -> Expression {
        if self.see(TokenKind::LeftBrace) {
            self.array_initializer(type_name)
        } else {
            self.expression()
        }
    }

    /// arrayInitializer ::= LCURLY [variableInitializer {COMMA variableInitializer} [COMMA]] RCURLY
    pub(super) fn array_initializer(&mut self, type_name: &TypeName) -> Expression {
        let line = self.line();
        self.must_be(TokenKind::LeftBrace);
        let element_type = type_name.element();
        let mut elements = Vec::new();
        while !self.see(TokenKind::RightBrace) && !self.see(TokenKind::Eof) {
            elements.push(self.variable_initializer(&element_type));
            if !self.have(TokenKind::Comma) {
                break;
            }
        }
        self.must_be(TokenKind::RightBrace);
        Expression::new(
            line,
            ExpressionKind::ArrayInitializer {
                type_name: Some(type_name.clone()),
                elements,
            },
        )
    }
}
