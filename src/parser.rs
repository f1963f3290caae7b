//! Parser for the supported JavaScript subset
//!
//! Uses recursive descent with Pratt parsing for expressions. TypeScript type
//! annotations are recognized and skipped.

use crate::ast::*;
use crate::error::CompileError;
use crate::lexer::{Lexer, Span, Token, TokenKind};

/// Parse a complete script
pub fn parse(source: &str) -> Result<Program, CompileError> {
    Parser::new(source).parse_program()
}

/// Parser for source text
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
    previous: Token,
}

/// Infix operators recognized by the Pratt loop
#[derive(Debug, Clone, Copy)]
enum Infix {
    Binary(BinaryOp),
    Logical(LogicalOp),
}

/// TypeScript modifiers skipped in front of class members
const MEMBER_MODIFIERS: [&str; 7] = [
    "public",
    "private",
    "protected",
    "readonly",
    "abstract",
    "override",
    "declare",
];

impl<'a> Parser<'a> {
    pub fn new(source: &'a str) -> Self {
        let mut lexer = Lexer::new(source);
        let current = lexer.next_token();
        Self {
            lexer,
            current,
            previous: Token::eof(0, 1, 1),
        }
    }

    /// Parse a complete program
    pub fn parse_program(&mut self) -> Result<Program, CompileError> {
        let mut body = Vec::new();

        while !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        Ok(Program { body })
    }

    // ============ STATEMENTS ============

    fn parse_statement(&mut self) -> Result<Statement, CompileError> {
        if self.check_identifier() && self.peek_is(&TokenKind::Colon) {
            return self.parse_labeled_statement();
        }
        if let Some(span) = self.skip_type_declaration()? {
            return Ok(Statement::Empty(span));
        }
        if self.check(&TokenKind::Async) && self.peek_is(&TokenKind::Function) {
            self.advance(); // async
            return Ok(Statement::FunctionDeclaration(
                self.parse_function_declaration(true)?,
            ));
        }

        match &self.current.kind {
            TokenKind::Let | TokenKind::Const | TokenKind::Var => {
                let decl = self.parse_variable_declaration()?;
                self.expect_semicolon()?;
                Ok(Statement::VariableDeclaration(decl))
            }
            TokenKind::Function => Ok(Statement::FunctionDeclaration(
                self.parse_function_declaration(false)?,
            )),
            TokenKind::Class => Ok(Statement::ClassDeclaration(self.parse_class_declaration()?)),
            TokenKind::If => self.parse_if_statement(),
            TokenKind::For => self.parse_for_statement(),
            TokenKind::While => self.parse_while_statement(),
            TokenKind::Do => self.parse_do_while_statement(),
            TokenKind::Switch => self.parse_switch_statement(),
            TokenKind::Try => self.parse_try_statement(),
            TokenKind::Return => self.parse_return_statement(),
            TokenKind::Break => self.parse_break_statement(),
            TokenKind::Continue => self.parse_continue_statement(),
            TokenKind::Throw => self.parse_throw_statement(),
            TokenKind::LBrace => Ok(Statement::Block(self.parse_block_statement()?)),
            TokenKind::Semicolon => {
                let span = self.current.span;
                self.advance();
                Ok(Statement::Empty(span))
            }
            _ => {
                let start = self.current.span;
                let expression = self.parse_expression()?;
                self.expect_semicolon()?;
                let span = self.span_from(start);
                Ok(Statement::Expression(ExpressionStatement { expression, span }))
            }
        }
    }

    /// Parse `let/const/var` declarators without the trailing semicolon
    fn parse_variable_declaration(&mut self) -> Result<VariableDeclaration, CompileError> {
        let start = self.current.span;
        let kind = match self.current.kind {
            TokenKind::Let => VariableKind::Let,
            TokenKind::Const => VariableKind::Const,
            TokenKind::Var => VariableKind::Var,
            _ => return Err(self.unexpected_token("variable declaration")),
        };
        self.advance();

        let mut declarations = vec![self.parse_variable_declarator()?];
        while self.match_token(&TokenKind::Comma) {
            declarations.push(self.parse_variable_declarator()?);
        }

        let span = self.span_from(start);
        Ok(VariableDeclaration {
            kind,
            declarations,
            span,
        })
    }

    fn parse_variable_declarator(&mut self) -> Result<VariableDeclarator, CompileError> {
        let start = self.current.span;
        let id = self.parse_binding_pattern()?;

        // Definite assignment assertion `let x!: T`
        self.match_token(&TokenKind::Bang);
        if self.match_token(&TokenKind::Colon) {
            self.skip_type()?;
        }

        let init = if self.match_token(&TokenKind::Eq) {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };

        let span = self.span_from(start);
        Ok(VariableDeclarator { id, init, span })
    }

    fn parse_binding_pattern(&mut self) -> Result<Pattern, CompileError> {
        match self.current.kind {
            TokenKind::LBrace => self.parse_object_pattern(),
            TokenKind::LBracket => self.parse_array_pattern(),
            _ => Ok(Pattern::Identifier(self.parse_identifier()?)),
        }
    }

    /// Binding pattern with an optional `= default`
    fn parse_binding_element(&mut self) -> Result<Pattern, CompileError> {
        let start = self.current.span;
        let pattern = self.parse_binding_pattern()?;
        if self.match_token(&TokenKind::Eq) {
            let right = Box::new(self.parse_assignment_expression()?);
            let span = self.span_from(start);
            return Ok(Pattern::Assignment(AssignmentPattern {
                left: Box::new(pattern),
                right,
                span,
            }));
        }
        Ok(pattern)
    }

    fn parse_rest_element(&mut self) -> Result<RestElement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::DotDotDot)?;
        let argument = Box::new(self.parse_binding_pattern()?);
        let span = self.span_from(start);
        Ok(RestElement { argument, span })
    }

    fn parse_object_pattern(&mut self) -> Result<Pattern, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut properties = vec![];
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check(&TokenKind::DotDotDot) {
                properties.push(ObjectPatternProperty::Rest(self.parse_rest_element()?));
            } else {
                let prop_start = self.current.span;
                let key = self.parse_property_name()?;
                let value = if self.match_token(&TokenKind::Colon) {
                    self.parse_binding_element()?
                } else {
                    let ObjectPropertyKey::Identifier(id) = &key else {
                        return Err(self.error("Shorthand pattern requires an identifier"));
                    };
                    let shorthand = Pattern::Identifier(id.clone());
                    if self.match_token(&TokenKind::Eq) {
                        let right = Box::new(self.parse_assignment_expression()?);
                        Pattern::Assignment(AssignmentPattern {
                            left: Box::new(shorthand),
                            right,
                            span: self.span_from(prop_start),
                        })
                    } else {
                        shorthand
                    }
                };
                let span = self.span_from(prop_start);
                properties.push(ObjectPatternProperty::KeyValue { key, value, span });
            }

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(Pattern::Object(ObjectPattern { properties, span }))
    }

    fn parse_array_pattern(&mut self) -> Result<Pattern, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;

        let mut elements = vec![];
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            if self.check(&TokenKind::Comma) {
                self.advance();
                elements.push(None);
                continue;
            }
            if self.check(&TokenKind::DotDotDot) {
                elements.push(Some(Pattern::Rest(self.parse_rest_element()?)));
            } else {
                elements.push(Some(self.parse_binding_element()?));
            }
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBracket)?;
        let span = self.span_from(start);
        Ok(Pattern::Array(ArrayPattern { elements, span }))
    }

    fn parse_function_declaration(
        &mut self,
        async_: bool,
    ) -> Result<FunctionDeclaration, CompileError> {
        let start = if async_ {
            self.previous.span
        } else {
            self.current.span
        };
        self.require_token(&TokenKind::Function)?;
        let generator = self.match_token(&TokenKind::Star);
        let id = self.parse_identifier()?;
        self.skip_type_parameters()?;
        let params = self.parse_function_params()?;
        self.skip_return_type()?;
        let body = self.parse_block_statement()?;

        let span = self.span_from(start);
        Ok(FunctionDeclaration {
            id,
            params,
            body,
            generator,
            async_,
            span,
        })
    }

    fn parse_function_params(&mut self) -> Result<Vec<FunctionParam>, CompileError> {
        self.require_token(&TokenKind::LParen)?;

        let mut params = vec![];
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            params.push(self.parse_function_param()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_function_param(&mut self) -> Result<FunctionParam, CompileError> {
        let start = self.current.span;

        // Parameter properties in constructors
        while self.check_contextual_modifier() {
            self.advance();
        }

        if self.check(&TokenKind::DotDotDot) {
            let mut rest = self.parse_rest_element()?;
            if self.match_token(&TokenKind::Colon) {
                self.skip_type()?;
            }
            rest.span = self.span_from(start);
            return Ok(FunctionParam {
                pattern: Pattern::Rest(rest),
                span: self.span_from(start),
            });
        }

        let mut pattern = self.parse_binding_pattern()?;
        self.match_token(&TokenKind::Question);
        if self.match_token(&TokenKind::Colon) {
            self.skip_type()?;
        }
        if self.match_token(&TokenKind::Eq) {
            let right = Box::new(self.parse_assignment_expression()?);
            pattern = Pattern::Assignment(AssignmentPattern {
                left: Box::new(pattern),
                right,
                span: self.span_from(start),
            });
        }

        Ok(FunctionParam {
            pattern,
            span: self.span_from(start),
        })
    }

    fn parse_class_declaration(&mut self) -> Result<ClassDeclaration, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Class)?;
        let id = self.parse_identifier()?;
        let (super_class, body) = self.parse_class_tail()?;
        let span = self.span_from(start);
        Ok(ClassDeclaration {
            id,
            super_class,
            body,
            span,
        })
    }

    /// Type parameters, heritage clause and body shared by declarations and expressions
    fn parse_class_tail(&mut self) -> Result<(Option<Box<Expression>>, ClassBody), CompileError> {
        self.skip_type_parameters()?;

        let super_class = if self.match_token(&TokenKind::Extends) {
            let expr = self.parse_left_hand_side_expression()?;
            self.skip_type_arguments()?;
            Some(Box::new(expr))
        } else {
            None
        };

        if self.check_keyword("implements") {
            self.advance();
            self.skip_type()?;
            while self.match_token(&TokenKind::Comma) {
                self.skip_type()?;
            }
        }

        let body = self.parse_class_body()?;
        Ok((super_class, body))
    }

    fn parse_class_body(&mut self) -> Result<ClassBody, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut members = vec![];
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.match_token(&TokenKind::Semicolon) {
                continue;
            }
            members.push(self.parse_class_member()?);
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(ClassBody { members, span })
    }

    fn parse_class_member(&mut self) -> Result<ClassMember, CompileError> {
        let start = self.current.span;

        while self.check_contextual_modifier() {
            self.advance();
        }

        let static_ = self.check(&TokenKind::Static) && !self.peek_is_member_terminator();
        if static_ {
            self.advance();
        }

        let is_async = self.check(&TokenKind::Async) && !self.peek_is_member_terminator();
        if is_async {
            self.advance();
        }
        let generator = self.match_token(&TokenKind::Star);

        if !static_ && self.check_keyword("constructor") && self.peek_is(&TokenKind::LParen) {
            self.advance();
            let params = self.parse_function_params()?;
            let body = self.parse_block_statement()?;
            let span = self.span_from(start);
            return Ok(ClassMember::Constructor(ClassConstructor { params, body, span }));
        }

        let kind = self.parse_accessor_kind();
        let key = self.parse_class_element_name()?;

        if self.check(&TokenKind::LParen) || self.check(&TokenKind::Lt) {
            let value = self.parse_method_function(is_async, generator, start)?;
            let span = self.span_from(start);
            return Ok(ClassMember::Method(ClassMethod {
                key,
                value,
                kind,
                static_,
                span,
            }));
        }

        self.match_token(&TokenKind::Question);
        self.match_token(&TokenKind::Bang);
        if self.match_token(&TokenKind::Colon) {
            self.skip_type()?;
        }
        let value = if self.match_token(&TokenKind::Eq) {
            Some(self.parse_assignment_expression()?)
        } else {
            None
        };
        self.expect_semicolon()?;

        let span = self.span_from(start);
        Ok(ClassMember::Property(ClassProperty {
            key,
            value,
            static_,
            span,
        }))
    }

    /// `get`/`set` prefixes, only when followed by a member name
    fn parse_accessor_kind(&mut self) -> MethodKind {
        let kind = if self.check_keyword("get") {
            MethodKind::Get
        } else if self.check_keyword("set") {
            MethodKind::Set
        } else {
            return MethodKind::Method;
        };
        if self.peek_is_member_terminator() {
            return MethodKind::Method;
        }
        self.advance();
        kind
    }

    fn parse_class_element_name(&mut self) -> Result<ObjectPropertyKey, CompileError> {
        if self.match_token(&TokenKind::LBracket) {
            let expr = self.parse_assignment_expression()?;
            self.require_token(&TokenKind::RBracket)?;
            Ok(ObjectPropertyKey::Computed(Box::new(expr)))
        } else {
            self.parse_property_name()
        }
    }

    fn parse_method_function(
        &mut self,
        async_: bool,
        generator: bool,
        start: Span,
    ) -> Result<FunctionExpression, CompileError> {
        self.skip_type_parameters()?;
        let params = self.parse_function_params()?;
        self.skip_return_type()?;
        let body = self.parse_block_statement()?;
        Ok(FunctionExpression {
            id: None,
            params,
            body,
            generator,
            async_,
            span: self.span_from(start),
        })
    }

    fn parse_block_statement(&mut self) -> Result<BlockStatement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut body = vec![];
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            body.push(self.parse_statement()?);
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(BlockStatement { body, span })
    }

    fn parse_if_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::If)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        let consequent = Box::new(self.parse_statement()?);
        let alternate = if self.match_token(&TokenKind::Else) {
            Some(Box::new(self.parse_statement()?))
        } else {
            None
        };

        let span = self.span_from(start);
        Ok(Statement::If(IfStatement {
            test,
            consequent,
            alternate,
            span,
        }))
    }

    fn parse_for_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::For)?;
        if self.check(&TokenKind::Await) {
            return Err(self.error("for await is not supported"));
        }
        self.require_token(&TokenKind::LParen)?;

        let init = if self.check(&TokenKind::Semicolon) {
            None
        } else if matches!(
            self.current.kind,
            TokenKind::Let | TokenKind::Const | TokenKind::Var
        ) {
            let decl = self.parse_variable_declaration()?;
            let single_uninit = decl.declarations.len() == 1
                && decl.declarations.first().is_some_and(|d| d.init.is_none());
            if single_uninit && (self.check(&TokenKind::Of) || self.check(&TokenKind::In)) {
                let is_of = self.check(&TokenKind::Of);
                self.advance();
                let kind = decl.kind;
                let Some(pattern) = decl.declarations.into_iter().next().map(|d| d.id) else {
                    return Err(self.error("Missing loop binding"));
                };
                return self.parse_for_in_of_rest(ForInOfLeft::Variable(kind, pattern), is_of, start);
            }
            Some(ForInit::Variable(decl))
        } else {
            let expr = self.parse_expression()?;
            if self.match_token(&TokenKind::Of) {
                let target = self.expression_to_pattern(&expr)?;
                return self.parse_for_in_of_rest(ForInOfLeft::Pattern(target), true, start);
            }
            // `for (x in obj)` parses as a binary `in`; split it back apart
            if let Expression::Binary(BinaryExpression {
                operator: BinaryOp::In,
                left,
                ..
            }) = &expr
            {
                if self.check(&TokenKind::RParen) {
                    self.expression_to_pattern(left)?;
                    self.advance();
                    self.parse_statement()?;
                    return Ok(self.unsupported_statement("for...in loop", start));
                }
            }
            Some(ForInit::Expression(expr))
        };

        self.require_token(&TokenKind::Semicolon)?;
        let test = if self.check(&TokenKind::Semicolon) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::Semicolon)?;
        let update = if self.check(&TokenKind::RParen) {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);

        let span = self.span_from(start);
        Ok(Statement::For(ForStatement {
            init,
            test,
            update,
            body,
            span,
        }))
    }

    fn parse_for_in_of_rest(
        &mut self,
        left: ForInOfLeft,
        is_of: bool,
        start: Span,
    ) -> Result<Statement, CompileError> {
        let right = if is_of {
            self.parse_assignment_expression()?
        } else {
            self.parse_expression()?
        };
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        if !is_of {
            return Ok(self.unsupported_statement("for...in loop", start));
        }
        let span = self.span_from(start);
        Ok(Statement::ForOf(ForOfStatement {
            left,
            right,
            body,
            span,
        }))
    }

    fn parse_while_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        let body = Box::new(self.parse_statement()?);
        let span = self.span_from(start);
        Ok(Statement::While(WhileStatement { test, body, span }))
    }

    fn parse_do_while_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Do)?;
        let body = Box::new(self.parse_statement()?);
        self.require_token(&TokenKind::While)?;
        self.require_token(&TokenKind::LParen)?;
        let test = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        self.match_token(&TokenKind::Semicolon);
        let span = self.span_from(start);
        Ok(Statement::DoWhile(DoWhileStatement { body, test, span }))
    }

    fn parse_switch_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Switch)?;
        self.require_token(&TokenKind::LParen)?;
        let discriminant = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        self.require_token(&TokenKind::LBrace)?;

        let mut cases = vec![];
        let mut seen_default = false;
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            let case_start = self.current.span;
            let test = if self.match_token(&TokenKind::Case) {
                Some(self.parse_expression()?)
            } else if self.match_token(&TokenKind::Default) {
                if seen_default {
                    return Err(self.error("More than one default clause in switch statement"));
                }
                seen_default = true;
                None
            } else {
                return Err(self.unexpected_token("'case' or 'default'"));
            };
            self.require_token(&TokenKind::Colon)?;

            let mut consequent = vec![];
            while !matches!(
                self.current.kind,
                TokenKind::Case | TokenKind::Default | TokenKind::RBrace | TokenKind::Eof
            ) {
                consequent.push(self.parse_statement()?);
            }

            let span = self.span_from(case_start);
            cases.push(SwitchCase {
                test,
                consequent,
                span,
            });
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(Statement::Switch(SwitchStatement {
            discriminant,
            cases,
            span,
        }))
    }

    /// `try` is parsed through its last block and then rejected by the compiler
    fn parse_try_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Try)?;
        self.parse_block_statement()?;

        let caught = self.match_token(&TokenKind::Catch);
        if caught {
            if self.match_token(&TokenKind::LParen) {
                self.parse_binding_pattern()?;
                if self.match_token(&TokenKind::Colon) {
                    self.skip_type()?;
                }
                self.require_token(&TokenKind::RParen)?;
            }
            self.parse_block_statement()?;
        }
        let finally = self.match_token(&TokenKind::Finally);
        if finally {
            self.parse_block_statement()?;
        }
        if !caught && !finally {
            return Err(self.error("Missing catch or finally after try"));
        }
        Ok(self.unsupported_statement("try statement", start))
    }

    fn unsupported_statement(&self, construct: &'static str, start: Span) -> Statement {
        Statement::Unsupported(UnsupportedStatement {
            construct,
            span: self.span_from(start),
        })
    }

    fn parse_return_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Return)?;

        let argument = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.is_at_end()
            || self.lexer.had_newline_before()
        {
            None
        } else {
            Some(self.parse_expression()?)
        };
        self.expect_semicolon()?;

        let span = self.span_from(start);
        Ok(Statement::Return(ReturnStatement { argument, span }))
    }

    fn parse_optional_label(&mut self) -> Result<Option<Identifier>, CompileError> {
        if self.check_identifier() && !self.lexer.had_newline_before() {
            Ok(Some(self.parse_identifier()?))
        } else {
            Ok(None)
        }
    }

    fn parse_break_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Break)?;
        let label = self.parse_optional_label()?;
        self.expect_semicolon()?;
        let span = self.span_from(start);
        Ok(Statement::Break(BreakStatement { label, span }))
    }

    fn parse_continue_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Continue)?;
        self.parse_optional_label()?;
        self.expect_semicolon()?;
        Ok(self.unsupported_statement("continue statement", start))
    }

    fn parse_throw_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Throw)?;
        if self.lexer.had_newline_before() {
            return Err(self.error("Illegal newline after throw"));
        }
        self.parse_expression()?;
        self.expect_semicolon()?;
        Ok(self.unsupported_statement("throw statement", start))
    }

    fn parse_labeled_statement(&mut self) -> Result<Statement, CompileError> {
        let start = self.current.span;
        self.parse_identifier()?;
        self.require_token(&TokenKind::Colon)?;
        self.parse_statement()?;
        Ok(self.unsupported_statement("labeled statement", start))
    }

    // ============ EXPRESSIONS ============

    fn parse_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        let expr = self.parse_assignment_expression()?;

        if !self.check(&TokenKind::Comma) {
            return Ok(expr);
        }

        let mut expressions = vec![expr];
        while self.match_token(&TokenKind::Comma) {
            expressions.push(self.parse_assignment_expression()?);
        }
        let span = self.span_from(start);
        Ok(Expression::Sequence(SequenceExpression { expressions, span }))
    }

    fn parse_assignment_expression(&mut self) -> Result<Expression, CompileError> {
        if self.check(&TokenKind::Yield) {
            return self.parse_yield_expression();
        }

        let start = self.current.span;

        // Single-parameter arrow `x => ...`
        if self.check_identifier() && self.peek_is(&TokenKind::Arrow) {
            let id = self.parse_identifier()?;
            let param = FunctionParam {
                span: id.span,
                pattern: Pattern::Identifier(id),
            };
            return self.parse_arrow_function_from_params(vec![param], false, start);
        }

        let expr = self.parse_conditional_expression()?;

        if let Some(operator) = self.current_assignment_op() {
            self.advance();
            let right = Box::new(self.parse_assignment_expression()?);
            let left = self.expression_to_assignment_target(expr)?;
            let span = self.span_from(start);
            return Ok(Expression::Assignment(AssignmentExpression {
                operator,
                left,
                right,
                span,
            }));
        }

        Ok(expr)
    }

    fn parse_yield_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Yield)?;
        self.match_token(&TokenKind::Star);

        let argument = if self.check(&TokenKind::Semicolon)
            || self.check(&TokenKind::RBrace)
            || self.check(&TokenKind::RParen)
            || self.check(&TokenKind::Comma)
            || self.is_at_end()
            || self.lexer.had_newline_before()
        {
            None
        } else {
            Some(Box::new(self.parse_assignment_expression()?))
        };

        let span = self.span_from(start);
        Ok(Expression::Yield(YieldExpression { argument, span }))
    }

    fn parse_conditional_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        let test = self.parse_binary_expression(0)?;

        if self.match_token(&TokenKind::Question) {
            let consequent = Box::new(self.parse_assignment_expression()?);
            self.require_token(&TokenKind::Colon)?;
            let alternate = Box::new(self.parse_assignment_expression()?);
            let span = self.span_from(start);
            return Ok(Expression::Conditional(ConditionalExpression {
                test: Box::new(test),
                consequent,
                alternate,
                span,
            }));
        }

        Ok(test)
    }

    /// Pratt parser for binary and logical expressions
    fn parse_binary_expression(&mut self, min_prec: u8) -> Result<Expression, CompileError> {
        let start = self.current.span;
        let mut left = self.parse_unary_expression()?;

        while let Some((infix, prec)) = self.current_infix_op() {
            if prec < min_prec {
                break;
            }
            self.advance();

            // ** is right associative
            let next_prec = match infix {
                Infix::Binary(BinaryOp::Exp) => prec,
                _ => prec + 1,
            };
            let right = Box::new(self.parse_binary_expression(next_prec)?);
            let left_box = Box::new(left);
            let span = self.span_from(start);

            left = match infix {
                Infix::Binary(operator) => Expression::Binary(BinaryExpression {
                    operator,
                    left: left_box,
                    right,
                    span,
                }),
                Infix::Logical(operator) => Expression::Logical(LogicalExpression {
                    operator,
                    left: left_box,
                    right,
                    span,
                }),
            };
        }

        Ok(left)
    }

    fn parse_unary_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;

        if self.check(&TokenKind::Await) {
            self.advance();
            let argument = Box::new(self.parse_unary_expression()?);
            let span = self.span_from(start);
            return Ok(Expression::Await(AwaitExpression { argument, span }));
        }

        if let Some(operator) = self.current_unary_op() {
            self.advance();
            let argument = Box::new(self.parse_unary_expression()?);
            let span = self.span_from(start);
            return Ok(Expression::Unary(UnaryExpression {
                operator,
                argument,
                span,
            }));
        }

        if let Some(operator) = self.current_update_op() {
            self.advance();
            let argument = Box::new(self.parse_unary_expression()?);
            let span = self.span_from(start);
            return Ok(Expression::Update(UpdateExpression {
                operator,
                argument,
                prefix: true,
                span,
            }));
        }

        self.parse_postfix_expression()
    }

    fn parse_postfix_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        let mut expr = self.parse_left_hand_side_expression()?;

        if !self.lexer.had_newline_before() {
            if let Some(operator) = self.current_update_op() {
                self.advance();
                let span = self.span_from(start);
                expr = Expression::Update(UpdateExpression {
                    operator,
                    argument: Box::new(expr),
                    prefix: false,
                    span,
                });
            }
        }

        Ok(expr)
    }

    fn parse_left_hand_side_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        let mut expr = self.parse_member_expression()?;

        loop {
            if self.check(&TokenKind::LParen) {
                let arguments = self.parse_call_arguments()?;
                let span = self.span_from(start);
                expr = Expression::Call(CallExpression {
                    callee: Box::new(expr),
                    arguments,
                    optional: false,
                    span,
                });
            } else if self.match_token(&TokenKind::Dot) {
                let property = self.parse_identifier_name()?;
                expr = self.member(expr, MemberProperty::Identifier(property), false, start);
            } else if self.match_token(&TokenKind::LBracket) {
                let property = self.parse_expression()?;
                self.require_token(&TokenKind::RBracket)?;
                expr = self.member(
                    expr,
                    MemberProperty::Expression(Box::new(property)),
                    false,
                    start,
                );
            } else if self.match_token(&TokenKind::QuestionDot) {
                if self.check(&TokenKind::LParen) {
                    let arguments = self.parse_call_arguments()?;
                    let span = self.span_from(start);
                    expr = Expression::Call(CallExpression {
                        callee: Box::new(expr),
                        arguments,
                        optional: true,
                        span,
                    });
                } else if self.match_token(&TokenKind::LBracket) {
                    let property = self.parse_expression()?;
                    self.require_token(&TokenKind::RBracket)?;
                    expr = self.member(
                        expr,
                        MemberProperty::Expression(Box::new(property)),
                        true,
                        start,
                    );
                } else {
                    let property = self.parse_identifier_name()?;
                    expr = self.member(expr, MemberProperty::Identifier(property), true, start);
                }
            } else if self.check(&TokenKind::Bang) && !self.lexer.had_newline_before() {
                // TypeScript non-null assertion
                self.advance();
            } else if self.check_keyword("as") && !self.lexer.had_newline_before() {
                self.advance();
                self.skip_type()?;
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn member(
        &self,
        object: Expression,
        property: MemberProperty,
        optional: bool,
        start: Span,
    ) -> Expression {
        Expression::Member(MemberExpression {
            object: Box::new(object),
            property,
            optional,
            span: self.span_from(start),
        })
    }

    /// Primary expression followed by `.x` / `[x]` accesses, without calls
    fn parse_member_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        let mut expr = self.parse_primary_expression()?;

        loop {
            if self.match_token(&TokenKind::Dot) {
                let property = self.parse_identifier_name()?;
                expr = self.member(expr, MemberProperty::Identifier(property), false, start);
            } else if self.match_token(&TokenKind::LBracket) {
                let property = self.parse_expression()?;
                self.require_token(&TokenKind::RBracket)?;
                expr = self.member(
                    expr,
                    MemberProperty::Expression(Box::new(property)),
                    false,
                    start,
                );
            } else {
                break;
            }
        }

        Ok(expr)
    }

    fn parse_new_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::New)?;

        if self.match_token(&TokenKind::Dot) {
            if !self.check_keyword("target") {
                return Err(self.unexpected_token("'target'"));
            }
            self.advance();
            return Ok(Expression::NewTarget(self.span_from(start)));
        }

        let callee = Box::new(self.parse_member_expression()?);
        self.skip_type_arguments()?;
        let arguments = if self.check(&TokenKind::LParen) {
            self.parse_call_arguments()?
        } else {
            vec![]
        };
        let span = self.span_from(start);
        Ok(Expression::New(NewExpression {
            callee,
            arguments,
            span,
        }))
    }

    fn parse_primary_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;

        let literal = |value| Expression::Literal(Literal { value, span: start });

        match &self.current.kind {
            TokenKind::Number(n) => {
                let n = *n;
                self.advance();
                Ok(literal(LiteralValue::Number(n)))
            }
            TokenKind::String(s) => {
                let s = s.clone();
                self.advance();
                Ok(literal(LiteralValue::String(s)))
            }
            TokenKind::True => {
                self.advance();
                Ok(literal(LiteralValue::Boolean(true)))
            }
            TokenKind::False => {
                self.advance();
                Ok(literal(LiteralValue::Boolean(false)))
            }
            TokenKind::Null => {
                self.advance();
                Ok(literal(LiteralValue::Null))
            }
            TokenKind::This => {
                self.advance();
                Ok(Expression::This(start))
            }
            TokenKind::Super => {
                self.advance();
                Ok(Expression::Super(start))
            }
            TokenKind::New => self.parse_new_expression(),
            TokenKind::Function => self.parse_function_expression(false, start),
            TokenKind::Async => self.parse_async_expression(),
            TokenKind::Class => self.parse_class_expression(),
            TokenKind::LParen => self.parse_parenthesized_or_arrow(),
            TokenKind::LBracket => self.parse_array_literal(),
            TokenKind::LBrace => self.parse_object_literal(),
            TokenKind::TemplateNoSub(s) => {
                let s = s.clone();
                self.advance();
                Ok(Expression::Template(TemplateLiteral {
                    quasis: vec![s],
                    expressions: vec![],
                    span: start,
                }))
            }
            TokenKind::TemplateHead(s) => {
                let s = s.clone();
                self.parse_template_literal(s, start)
            }
            TokenKind::Slash | TokenKind::SlashEq => {
                Err(self.error("Regular expression literals are not supported"))
            }
            _ => {
                let id = self.parse_identifier()?;
                Ok(Expression::Identifier(id))
            }
        }
    }

    fn parse_async_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;

        if self.peek_is(&TokenKind::Function) {
            self.advance(); // async
            return self.parse_function_expression(true, start);
        }

        let checkpoint = self.lexer.checkpoint();
        let saved_current = self.current.clone();
        let saved_previous = self.previous.clone();
        self.advance(); // async

        if !self.lexer.had_newline_before() {
            if self.check_identifier() && self.peek_is(&TokenKind::Arrow) {
                let id = self.parse_identifier()?;
                let param = FunctionParam {
                    span: id.span,
                    pattern: Pattern::Identifier(id),
                };
                return self.parse_arrow_function_from_params(vec![param], true, start);
            }
            if self.check(&TokenKind::LParen) {
                if let Ok(params) = self.try_parse_arrow_params() {
                    if self.check(&TokenKind::Arrow) || self.check(&TokenKind::Colon) {
                        return self.parse_arrow_function_from_params(params, true, start);
                    }
                }
            }
        }

        // Plain identifier named `async`
        self.lexer.restore(checkpoint);
        self.current = saved_current;
        self.previous = saved_previous;
        let id = self.parse_identifier()?;
        Ok(Expression::Identifier(id))
    }

    fn parse_function_expression(
        &mut self,
        async_: bool,
        start: Span,
    ) -> Result<Expression, CompileError> {
        self.require_token(&TokenKind::Function)?;
        let generator = self.match_token(&TokenKind::Star);
        let id = if self.check(&TokenKind::LParen) || self.check(&TokenKind::Lt) {
            None
        } else {
            Some(self.parse_identifier()?)
        };
        self.skip_type_parameters()?;
        let params = self.parse_function_params()?;
        self.skip_return_type()?;
        let body = self.parse_block_statement()?;

        let span = self.span_from(start);
        Ok(Expression::Function(FunctionExpression {
            id,
            params,
            body,
            generator,
            async_,
            span,
        }))
    }

    fn parse_class_expression(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::Class)?;
        let id = if self.check_identifier() {
            Some(self.parse_identifier()?)
        } else {
            None
        };
        let (super_class, body) = self.parse_class_tail()?;
        let span = self.span_from(start);
        Ok(Expression::Class(ClassExpression {
            id,
            super_class,
            body,
            span,
        }))
    }

    fn parse_parenthesized_or_arrow(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;

        // Save state for potential rollback
        let checkpoint = self.lexer.checkpoint();
        let saved_current = self.current.clone();
        let saved_previous = self.previous.clone();

        if let Ok(params) = self.try_parse_arrow_params() {
            if self.check(&TokenKind::Arrow) || self.check(&TokenKind::Colon) {
                return self.parse_arrow_function_from_params(params, false, start);
            }
        }

        self.lexer.restore(checkpoint);
        self.current = saved_current;
        self.previous = saved_previous;

        self.require_token(&TokenKind::LParen)?;
        let expr = self.parse_expression()?;
        self.require_token(&TokenKind::RParen)?;
        Ok(expr)
    }

    /// Parse `( params )` as arrow function parameters; fails on anything else
    fn try_parse_arrow_params(&mut self) -> Result<Vec<FunctionParam>, CompileError> {
        self.parse_function_params()
    }

    fn parse_arrow_function_from_params(
        &mut self,
        params: Vec<FunctionParam>,
        async_: bool,
        start: Span,
    ) -> Result<Expression, CompileError> {
        self.skip_return_type()?;
        self.require_token(&TokenKind::Arrow)?;

        let body = if self.check(&TokenKind::LBrace) {
            ArrowFunctionBody::Block(self.parse_block_statement()?)
        } else {
            ArrowFunctionBody::Expression(Box::new(self.parse_assignment_expression()?))
        };

        let span = self.span_from(start);
        Ok(Expression::ArrowFunction(ArrowFunctionExpression {
            params,
            body,
            async_,
            span,
        }))
    }

    fn parse_template_literal(
        &mut self,
        first: String,
        start: Span,
    ) -> Result<Expression, CompileError> {
        let mut quasis = vec![first];
        let mut expressions = vec![];
        self.advance(); // TemplateHead

        loop {
            expressions.push(self.parse_expression()?);
            if !self.check(&TokenKind::RBrace) {
                return Err(self.unexpected_token("'}' in template literal"));
            }

            let continuation = self.lexer.rescan_template_continuation(self.current.span);
            match &continuation.kind {
                TokenKind::TemplateMiddle(s) => {
                    quasis.push(s.clone());
                    self.current = continuation;
                    self.advance();
                }
                TokenKind::TemplateTail(s) => {
                    quasis.push(s.clone());
                    self.current = continuation;
                    self.advance();
                    break;
                }
                _ => return Err(self.error("Unterminated template literal")),
            }
        }

        let span = self.span_from(start);
        Ok(Expression::Template(TemplateLiteral {
            quasis,
            expressions,
            span,
        }))
    }

    fn parse_array_literal(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBracket)?;

        let mut elements = vec![];
        while !self.check(&TokenKind::RBracket) && !self.is_at_end() {
            if self.check(&TokenKind::Comma) {
                self.advance();
                elements.push(None);
                continue;
            }
            elements.push(Some(self.parse_spread_or_assignment()?));
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBracket)?;
        let span = self.span_from(start);
        Ok(Expression::Array(ArrayExpression { elements, span }))
    }

    fn parse_spread_or_assignment(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        if self.match_token(&TokenKind::DotDotDot) {
            let argument = Box::new(self.parse_assignment_expression()?);
            let span = self.span_from(start);
            return Ok(Expression::Spread(SpreadElement { argument, span }));
        }
        self.parse_assignment_expression()
    }

    fn parse_object_literal(&mut self) -> Result<Expression, CompileError> {
        let start = self.current.span;
        self.require_token(&TokenKind::LBrace)?;

        let mut properties = vec![];
        while !self.check(&TokenKind::RBrace) && !self.is_at_end() {
            if self.check(&TokenKind::DotDotDot) {
                let spread_start = self.current.span;
                self.advance();
                let argument = Box::new(self.parse_assignment_expression()?);
                let span = self.span_from(spread_start);
                properties.push(ObjectProperty::Spread(SpreadElement { argument, span }));
            } else {
                properties.push(ObjectProperty::Property(self.parse_property()?));
            }

            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RBrace)?;
        let span = self.span_from(start);
        Ok(Expression::Object(ObjectExpression { properties, span }))
    }

    fn parse_property(&mut self) -> Result<Property, CompileError> {
        let start = self.current.span;

        let is_async = self.check(&TokenKind::Async) && !self.peek_is_member_terminator();
        if is_async {
            self.advance();
        }
        let generator = self.match_token(&TokenKind::Star);
        let kind = if is_async || generator {
            MethodKind::Method
        } else {
            self.parse_accessor_kind()
        };

        let key = self.parse_class_element_name()?;

        if self.check(&TokenKind::LParen) || self.check(&TokenKind::Lt) {
            let value = self.parse_method_function(is_async, generator, start)?;
            return Ok(Property {
                key,
                value: Expression::Function(value),
                kind,
                shorthand: false,
                method: true,
                span: self.span_from(start),
            });
        }

        if self.match_token(&TokenKind::Colon) {
            let value = self.parse_assignment_expression()?;
            return Ok(Property {
                key,
                value,
                kind: MethodKind::Method,
                shorthand: false,
                method: false,
                span: self.span_from(start),
            });
        }

        let ObjectPropertyKey::Identifier(id) = &key else {
            return Err(self.unexpected_token("':'"));
        };
        let value = Expression::Identifier(id.clone());
        Ok(Property {
            key,
            value,
            kind: MethodKind::Method,
            shorthand: true,
            method: false,
            span: self.span_from(start),
        })
    }

    fn parse_call_arguments(&mut self) -> Result<Vec<Expression>, CompileError> {
        self.require_token(&TokenKind::LParen)?;

        let mut arguments = vec![];
        while !self.check(&TokenKind::RParen) && !self.is_at_end() {
            arguments.push(self.parse_spread_or_assignment()?);
            if !self.match_token(&TokenKind::Comma) {
                break;
            }
        }

        self.require_token(&TokenKind::RParen)?;
        Ok(arguments)
    }

    // ============ TYPE ANNOTATIONS ============

    /// Consume a type expression without building a tree
    fn skip_type(&mut self) -> Result<(), CompileError> {
        // Leading `|` / `&` in multi-line unions
        if self.check(&TokenKind::Pipe) || self.check(&TokenKind::Amp) {
            self.advance();
        }
        self.skip_primary_type()?;
        while self.check(&TokenKind::Pipe) || self.check(&TokenKind::Amp) {
            self.advance();
            self.skip_primary_type()?;
        }
        Ok(())
    }

    fn skip_primary_type(&mut self) -> Result<(), CompileError> {
        match &self.current.kind {
            TokenKind::LParen => {
                self.skip_balanced(&TokenKind::LParen, &TokenKind::RParen)?;
                if self.match_token(&TokenKind::Arrow) {
                    self.skip_type()?;
                }
            }
            TokenKind::LBrace => self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace)?,
            TokenKind::LBracket => {
                self.skip_balanced(&TokenKind::LBracket, &TokenKind::RBracket)?
            }
            TokenKind::Typeof => {
                self.advance();
                self.parse_identifier_name()?;
                while self.match_token(&TokenKind::Dot) {
                    self.parse_identifier_name()?;
                }
            }
            TokenKind::New => {
                self.advance();
                self.skip_primary_type()?;
            }
            TokenKind::String(_)
            | TokenKind::Number(_)
            | TokenKind::True
            | TokenKind::False
            | TokenKind::Null
            | TokenKind::Void
            | TokenKind::This
            | TokenKind::TemplateNoSub(_) => self.advance(),
            TokenKind::Minus => {
                self.advance();
                if !matches!(self.current.kind, TokenKind::Number(_)) {
                    return Err(self.unexpected_token("number literal type"));
                }
                self.advance();
            }
            _ => {
                // `keyof T`, `readonly T[]`, `unique symbol`
                if (self.check_keyword("keyof")
                    || self.check_keyword("readonly")
                    || self.check_keyword("unique"))
                    && !self.peek_is_type_terminator()
                {
                    self.advance();
                    return self.skip_primary_type();
                }
                self.parse_identifier_name()?;
                while self.match_token(&TokenKind::Dot) {
                    self.parse_identifier_name()?;
                }
                self.skip_type_arguments()?;
            }
        }

        // Array suffixes and indexed access
        while self.check(&TokenKind::LBracket) && !self.lexer.had_newline_before() {
            self.skip_balanced(&TokenKind::LBracket, &TokenKind::RBracket)?;
        }
        Ok(())
    }

    /// `type X = ...` and `interface X {...}` declarations have no runtime effect
    fn skip_type_declaration(&mut self) -> Result<Option<Span>, CompileError> {
        let start = self.current.span;
        let is_alias = self.check_keyword("type");
        let is_interface = self.check_keyword("interface");
        if !(is_alias || is_interface) {
            return Ok(None);
        }
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        if !matches!(next.kind, TokenKind::Identifier(_)) || next.span.line != start.line {
            return Ok(None);
        }

        self.advance(); // type / interface
        self.parse_identifier()?;
        self.skip_type_parameters()?;
        if is_alias {
            self.require_token(&TokenKind::Eq)?;
            self.skip_type()?;
            self.expect_semicolon()?;
        } else {
            if self.match_token(&TokenKind::Extends) {
                self.skip_type()?;
                while self.match_token(&TokenKind::Comma) {
                    self.skip_type()?;
                }
            }
            self.skip_balanced(&TokenKind::LBrace, &TokenKind::RBrace)?;
        }
        Ok(Some(self.span_from(start)))
    }

    fn peek_is_type_terminator(&mut self) -> bool {
        self.peek_is(&TokenKind::Comma)
            || self.peek_is(&TokenKind::RParen)
            || self.peek_is(&TokenKind::Eq)
            || self.peek_is(&TokenKind::Semicolon)
    }

    /// Skip from an opening token to its matching closing token (inclusive)
    fn skip_balanced(&mut self, open: &TokenKind, close: &TokenKind) -> Result<(), CompileError> {
        self.require_token(open)?;
        let mut depth = 1usize;
        while depth > 0 {
            if self.is_at_end() {
                return Err(self.unexpected_token(&format!("{:?}", close)));
            }
            if self.check(open) {
                depth += 1;
            } else if self.check(close) {
                depth -= 1;
            }
            self.advance();
        }
        Ok(())
    }

    /// Skip `<...>` when present, splitting `>>` closers
    fn skip_type_arguments(&mut self) -> Result<(), CompileError> {
        if !self.check(&TokenKind::Lt) {
            return Ok(());
        }
        self.advance();
        let mut depth = 1usize;
        while depth > 0 {
            match self.current.kind {
                TokenKind::Lt => depth += 1,
                TokenKind::Gt => depth -= 1,
                TokenKind::GtGt => depth = depth.saturating_sub(2),
                TokenKind::GtGtGt => depth = depth.saturating_sub(3),
                TokenKind::Eof => return Err(self.unexpected_token("'>'")),
                _ => {}
            }
            self.advance();
        }
        Ok(())
    }

    fn skip_type_parameters(&mut self) -> Result<(), CompileError> {
        self.skip_type_arguments()
    }

    fn skip_return_type(&mut self) -> Result<(), CompileError> {
        if self.match_token(&TokenKind::Colon) {
            // `x is T` predicates
            self.skip_type()?;
            if self.check_keyword("is") {
                self.advance();
                self.skip_type()?;
            }
        }
        Ok(())
    }

    // ============ HELPERS ============

    fn parse_identifier(&mut self) -> Result<Identifier, CompileError> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            // Contextual keywords are valid binding names
            TokenKind::Of | TokenKind::Async | TokenKind::Static => {
                self.current.kind.keyword_text().unwrap_or_default().to_string()
            }
            _ => return Err(self.unexpected_token("identifier")),
        };
        let span = self.current.span;
        self.advance();
        Ok(Identifier { name, span })
    }

    /// Identifier or keyword used as a property name (after a dot)
    fn parse_identifier_name(&mut self) -> Result<Identifier, CompileError> {
        let name = match &self.current.kind {
            TokenKind::Identifier(name) => name.clone(),
            kind => match kind.keyword_text() {
                Some(text) => text.to_string(),
                None => return Err(self.unexpected_token("identifier")),
            },
        };
        let span = self.current.span;
        self.advance();
        Ok(Identifier { name, span })
    }

    fn parse_property_name(&mut self) -> Result<ObjectPropertyKey, CompileError> {
        match &self.current.kind {
            TokenKind::String(s) => {
                let value = s.clone();
                let span = self.current.span;
                self.advance();
                Ok(ObjectPropertyKey::String(value, span))
            }
            TokenKind::Number(n) => {
                let n = *n;
                let span = self.current.span;
                self.advance();
                Ok(ObjectPropertyKey::Number(n, span))
            }
            TokenKind::LBracket => {
                self.advance();
                let expr = self.parse_assignment_expression()?;
                self.require_token(&TokenKind::RBracket)?;
                Ok(ObjectPropertyKey::Computed(Box::new(expr)))
            }
            _ => Ok(ObjectPropertyKey::Identifier(self.parse_identifier_name()?)),
        }
    }

    fn advance(&mut self) {
        self.previous = std::mem::replace(&mut self.current, self.lexer.next_token());
    }

    fn require_token(&mut self, kind: &TokenKind) -> Result<(), CompileError> {
        if self.check(kind) {
            self.advance();
            Ok(())
        } else {
            Err(self.unexpected_token(&format!("{:?}", kind)))
        }
    }

    fn expect_semicolon(&mut self) -> Result<(), CompileError> {
        if self.match_token(&TokenKind::Semicolon) {
            return Ok(());
        }

        // ASI: accept if at end, before }, or after newline
        if self.is_at_end() || self.check(&TokenKind::RBrace) || self.lexer.had_newline_before() {
            return Ok(());
        }

        Err(self.unexpected_token("';'"))
    }

    fn check(&self, kind: &TokenKind) -> bool {
        std::mem::discriminant(&self.current.kind) == std::mem::discriminant(kind)
    }

    /// Check if the next token (after current) is of the given kind
    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        let checkpoint = self.lexer.checkpoint();
        let next = self.lexer.next_token();
        self.lexer.restore(checkpoint);
        std::mem::discriminant(&next.kind) == std::mem::discriminant(kind)
    }

    /// True when the token after current ends a member name (so current is the name itself)
    fn peek_is_member_terminator(&mut self) -> bool {
        self.peek_is(&TokenKind::LParen)
            || self.peek_is(&TokenKind::Eq)
            || self.peek_is(&TokenKind::Semicolon)
            || self.peek_is(&TokenKind::Colon)
            || self.peek_is(&TokenKind::Question)
            || self.peek_is(&TokenKind::Comma)
            || self.peek_is(&TokenKind::RBrace)
    }

    fn check_contextual_modifier(&mut self) -> bool {
        let is_modifier = matches!(
            &self.current.kind,
            TokenKind::Identifier(name) if MEMBER_MODIFIERS.contains(&name.as_str())
        );
        is_modifier && !self.peek_is_member_terminator() && !self.peek_is(&TokenKind::RParen)
    }

    fn check_identifier(&self) -> bool {
        matches!(self.current.kind, TokenKind::Identifier(_))
    }

    fn check_keyword(&self, keyword: &str) -> bool {
        matches!(&self.current.kind, TokenKind::Identifier(s) if s == keyword)
    }

    fn match_token(&mut self, kind: &TokenKind) -> bool {
        if self.check(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn is_at_end(&self) -> bool {
        self.current.kind == TokenKind::Eof
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(
            start.start,
            self.previous.span.end.max(start.start),
            start.line,
            start.column,
        )
    }

    fn error(&self, message: &str) -> CompileError {
        CompileError::syntax(message, self.current.span)
    }

    fn unexpected_token(&self, expected: &str) -> CompileError {
        let message = match &self.current.kind {
            TokenKind::Invalid(c) => format!("Invalid or unexpected token '{}'", c),
            kind => format!("Unexpected {:?}, expected {}", kind, expected),
        };
        CompileError::syntax(message, self.current.span)
    }

    fn current_infix_op(&self) -> Option<(Infix, u8)> {
        let op = match &self.current.kind {
            TokenKind::QuestionQuestion => (Infix::Logical(LogicalOp::NullishCoalescing), 3),
            TokenKind::PipePipe => (Infix::Logical(LogicalOp::Or), 4),
            TokenKind::AmpAmp => (Infix::Logical(LogicalOp::And), 5),
            TokenKind::Pipe => (Infix::Binary(BinaryOp::BitOr), 6),
            TokenKind::Caret => (Infix::Binary(BinaryOp::BitXor), 7),
            TokenKind::Amp => (Infix::Binary(BinaryOp::BitAnd), 8),
            TokenKind::EqEq => (Infix::Binary(BinaryOp::Eq), 9),
            TokenKind::BangEq => (Infix::Binary(BinaryOp::NotEq), 9),
            TokenKind::EqEqEq => (Infix::Binary(BinaryOp::StrictEq), 9),
            TokenKind::BangEqEq => (Infix::Binary(BinaryOp::StrictNotEq), 9),
            TokenKind::Lt => (Infix::Binary(BinaryOp::Lt), 10),
            TokenKind::LtEq => (Infix::Binary(BinaryOp::LtEq), 10),
            TokenKind::Gt => (Infix::Binary(BinaryOp::Gt), 10),
            TokenKind::GtEq => (Infix::Binary(BinaryOp::GtEq), 10),
            TokenKind::In => (Infix::Binary(BinaryOp::In), 10),
            TokenKind::Instanceof => (Infix::Binary(BinaryOp::Instanceof), 10),
            TokenKind::LtLt => (Infix::Binary(BinaryOp::LShift), 11),
            TokenKind::GtGt => (Infix::Binary(BinaryOp::RShift), 11),
            TokenKind::GtGtGt => (Infix::Binary(BinaryOp::URShift), 11),
            TokenKind::Plus => (Infix::Binary(BinaryOp::Add), 12),
            TokenKind::Minus => (Infix::Binary(BinaryOp::Sub), 12),
            TokenKind::Star => (Infix::Binary(BinaryOp::Mul), 13),
            TokenKind::Slash => (Infix::Binary(BinaryOp::Div), 13),
            TokenKind::Percent => (Infix::Binary(BinaryOp::Mod), 13),
            TokenKind::StarStar => (Infix::Binary(BinaryOp::Exp), 14),
            _ => return None,
        };
        Some(op)
    }

    fn current_unary_op(&self) -> Option<UnaryOp> {
        match &self.current.kind {
            TokenKind::Minus => Some(UnaryOp::Minus),
            TokenKind::Plus => Some(UnaryOp::Plus),
            TokenKind::Bang => Some(UnaryOp::Not),
            TokenKind::Tilde => Some(UnaryOp::BitNot),
            TokenKind::Typeof => Some(UnaryOp::Typeof),
            TokenKind::Void => Some(UnaryOp::Void),
            TokenKind::Delete => Some(UnaryOp::Delete),
            _ => None,
        }
    }

    fn current_update_op(&self) -> Option<UpdateOp> {
        match &self.current.kind {
            TokenKind::PlusPlus => Some(UpdateOp::Increment),
            TokenKind::MinusMinus => Some(UpdateOp::Decrement),
            _ => None,
        }
    }

    fn current_assignment_op(&self) -> Option<AssignmentOp> {
        match &self.current.kind {
            TokenKind::Eq => Some(AssignmentOp::Assign),
            TokenKind::PlusEq => Some(AssignmentOp::AddAssign),
            TokenKind::MinusEq => Some(AssignmentOp::SubAssign),
            TokenKind::StarEq => Some(AssignmentOp::MulAssign),
            TokenKind::SlashEq => Some(AssignmentOp::DivAssign),
            TokenKind::PercentEq => Some(AssignmentOp::ModAssign),
            TokenKind::StarStarEq => Some(AssignmentOp::ExpAssign),
            _ => None,
        }
    }

    fn expression_to_pattern(&self, expr: &Expression) -> Result<Pattern, CompileError> {
        match expr {
            Expression::Identifier(id) => Ok(Pattern::Identifier(id.clone())),
            Expression::Object(obj) => {
                let properties = obj
                    .properties
                    .iter()
                    .map(|prop| match prop {
                        ObjectProperty::Property(p) => Ok(ObjectPatternProperty::KeyValue {
                            key: p.key.clone(),
                            value: self.expression_to_pattern(&p.value)?,
                            span: p.span,
                        }),
                        ObjectProperty::Spread(s) => Ok(ObjectPatternProperty::Rest(RestElement {
                            argument: Box::new(self.expression_to_pattern(&s.argument)?),
                            span: s.span,
                        })),
                    })
                    .collect::<Result<_, CompileError>>()?;
                Ok(Pattern::Object(ObjectPattern {
                    properties,
                    span: obj.span,
                }))
            }
            Expression::Array(arr) => {
                let elements = arr
                    .elements
                    .iter()
                    .map(|elem| {
                        elem.as_ref()
                            .map(|e| self.expression_to_pattern(e))
                            .transpose()
                    })
                    .collect::<Result<_, CompileError>>()?;
                Ok(Pattern::Array(ArrayPattern {
                    elements,
                    span: arr.span,
                }))
            }
            Expression::Spread(s) => Ok(Pattern::Rest(RestElement {
                argument: Box::new(self.expression_to_pattern(&s.argument)?),
                span: s.span,
            })),
            Expression::Assignment(a) if a.operator == AssignmentOp::Assign => {
                let left = match &a.left {
                    AssignmentTarget::Identifier(id) => Pattern::Identifier(id.clone()),
                    AssignmentTarget::Pattern(p) => p.clone(),
                    AssignmentTarget::Member(_) => {
                        return Err(CompileError::syntax("Invalid destructuring target", a.span));
                    }
                };
                Ok(Pattern::Assignment(AssignmentPattern {
                    left: Box::new(left),
                    right: a.right.clone(),
                    span: a.span,
                }))
            }
            other => Err(CompileError::syntax(
                "Invalid destructuring target",
                other.span(),
            )),
        }
    }

    fn expression_to_assignment_target(
        &self,
        expr: Expression,
    ) -> Result<AssignmentTarget, CompileError> {
        match expr {
            Expression::Identifier(id) => Ok(AssignmentTarget::Identifier(id)),
            Expression::Member(member) => Ok(AssignmentTarget::Member(member)),
            Expression::Object(_) | Expression::Array(_) => {
                Ok(AssignmentTarget::Pattern(self.expression_to_pattern(&expr)?))
            }
            other => Err(CompileError::syntax(
                "Invalid left-hand side in assignment",
                other.span(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[allow(clippy::expect_used)]
    fn parse_ok(source: &str) -> Program {
        parse(source).expect("source should parse")
    }

    #[test]
    fn test_variable_declaration_with_type() {
        let prog = parse_ok("let x: number = 1;");
        assert_eq!(prog.body.len(), 1);
    }

    #[test]
    fn test_arrow_with_typed_params() {
        let prog = parse_ok("const f = (a: number, b?: string): number => a;");
        let Some(Statement::VariableDeclaration(decl)) = prog.body.first() else {
            panic!("expected declaration");
        };
        let init = decl.declarations.first().and_then(|d| d.init.as_ref());
        assert!(matches!(init, Some(Expression::ArrowFunction(a)) if a.params.len() == 2));
    }

    #[test]
    fn test_parenthesized_is_not_arrow() {
        let prog = parse_ok("(a + b) * c;");
        let Some(Statement::Expression(stmt)) = prog.body.first() else {
            panic!("expected expression statement");
        };
        assert!(matches!(
            &stmt.expression,
            Expression::Binary(b) if b.operator == BinaryOp::Mul
        ));
    }

    #[test]
    fn test_asi_on_return() {
        let prog = parse_ok("function f() { return\n1 }");
        let Some(Statement::FunctionDeclaration(f)) = prog.body.first() else {
            panic!("expected function");
        };
        assert!(matches!(
            f.body.body.first(),
            Some(Statement::Return(ReturnStatement { argument: None, .. }))
        ));
    }

    #[test]
    fn test_for_in_split() {
        let prog = parse_ok("for (k in obj) {}");
        assert!(matches!(
            prog.body.first(),
            Some(Statement::Unsupported(UnsupportedStatement {
                construct: "for...in loop",
                ..
            }))
        ));
    }

    #[test]
    fn test_type_declarations_skipped() {
        let prog = parse_ok("type Id = string | number;\ninterface P { x: number; y: Array<Id> }\nlet a = 1;");
        assert!(matches!(prog.body.first(), Some(Statement::Empty(_))));
        assert!(matches!(prog.body.get(1), Some(Statement::Empty(_))));
        assert!(matches!(prog.body.get(2), Some(Statement::VariableDeclaration(_))));
    }

    #[test]
    fn test_class_members() {
        let prog = parse_ok(
            "class A extends B { private x: number = 1; static make() {} constructor(public y: string) { super(); } get z() { return 1; } }",
        );
        let Some(Statement::ClassDeclaration(class)) = prog.body.first() else {
            panic!("expected class");
        };
        assert!(class.super_class.is_some());
        assert_eq!(class.body.members.len(), 4);
        assert!(matches!(
            class.body.members.get(3),
            Some(ClassMember::Method(ClassMethod { kind: MethodKind::Get, .. }))
        ));
    }

    #[test]
    fn test_template_literal_parts() {
        let prog = parse_ok("`a${1}b${2}c`;");
        let Some(Statement::Expression(stmt)) = prog.body.first() else {
            panic!("expected expression statement");
        };
        let Expression::Template(template) = &stmt.expression else {
            panic!("expected template");
        };
        assert_eq!(template.quasis, vec!["a", "b", "c"]);
        assert_eq!(template.expressions.len(), 2);
    }

    #[test]
    fn test_regexp_rejected() {
        assert!(matches!(parse("let r = /a/;"), Err(CompileError::Syntax { .. })));
    }
}
