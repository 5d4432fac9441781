//! 型の構文規則

use crate::frontend::ast::TypeName;
use crate::frontend::lexer::TokenKind;

use super::Parser;

impl<'d> Parser<'d> {
    /// type ::= referenceType | basicType
    pub(super) fn parse_type(&mut self) -> TypeName {
        if self.see_reference_type() {
            self.parse_reference_type()
        } else {
            self.parse_basic_type()
        }
    }

    /// basicType ::= BOOLEAN | CHAR | INT | LONG | FLOAT | DOUBLE
    fn parse_basic_type(&mut self) -> TypeName {
        let line = self.line();
        if self.see_basic_type() {
            let name = self.token().image.clone();
            self.next();
            TypeName::new(line, name)
        } else {
            let message = format!("型が必要ですが '{}' が見つかりました", self.token().image);
            self.report(message);
            TypeName::erroneous(line)
        }
    }

    /// referenceType ::= basicType LBRACK RBRACK {LBRACK RBRACK}
    ///                 | qualifiedIdentifier {LBRACK RBRACK}
    fn parse_reference_type(&mut self) -> TypeName {
        let line = self.line();
        let mut type_name = if self.see_basic_type() {
            let element = self.parse_basic_type();
            self.must_be(TokenKind::LeftBracket);
            self.must_be(TokenKind::RightBracket);
            TypeName::array(line, element.name, 1)
        } else {
            TypeName::new(line, self.qualified_identifier())
        };
        while self.see_dims() {
            self.next();
            self.next();
            type_name.dimensions += 1;
        }
        type_name
    }

    /// extends・implements・throws に現れるクラス名
    pub(super) fn parse_qualified_type(&mut self) -> TypeName {
        let line = self.line();
        TypeName::new(line, self.qualified_identifier())
    }
}
