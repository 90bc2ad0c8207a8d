use crate::ast::*;
use crate::diagnostic::Diagnostic;
use crate::lexeme::Lexeme;
use crate::span::{Span, Spanned};

const MAX_NESTING_DEPTH: u32 = 256;

pub struct Parser {
    tokens: Vec<Spanned<Lexeme>>,
    pos: usize,
    diagnostics: Vec<Diagnostic>,
    depth: u32,
}

impl Parser {
    pub fn new(tokens: Vec<Spanned<Lexeme>>) -> Self {
        Self {
            tokens,
            pos: 0,
            diagnostics: Vec::new(),
            depth: 0,
        }
    }

    /// Parse a whole source: declarations, then rules. Aborts on the first
    /// syntax error.
    pub fn parse_program(mut self) -> Result<Program, Vec<Diagnostic>> {
        let mut decls = Vec::new();
        let mut rules = Vec::new();

        loop {
            match self.peek() {
                Lexeme::Enum => {
                    let decl = self.parse_enum_decl();
                    decls.push(decl);
                }
                Lexeme::Set => {
                    let decl = self.parse_set_decl();
                    decls.push(decl);
                }
                Lexeme::Pub | Lexeme::Priv => {
                    let decl = self.parse_input_decl();
                    decls.push(decl);
                }
                Lexeme::Rule => break,
                Lexeme::Eof => break,
                _ => {
                    self.error_with_help(
                        &format!(
                            "expected a declaration or rule, found {}",
                            self.peek().description()
                        ),
                        "top-level forms are 'enum', 'set', 'pub', 'priv' and 'rule'",
                    );
                    return Err(self.diagnostics);
                }
            }
            if !self.diagnostics.is_empty() {
                return Err(self.diagnostics);
            }
        }

        while self.at(&Lexeme::Rule) {
            let rule = self.parse_rule();
            rules.push(rule);
            if !self.diagnostics.is_empty() {
                return Err(self.diagnostics);
            }
        }

        if !self.at(&Lexeme::Eof) {
            self.error_with_help(
                &format!("unexpected {} after rules", self.peek().description()),
                "declarations must come before the first rule",
            );
        }

        if !self.diagnostics.is_empty() {
            return Err(self.diagnostics);
        }
        Ok(Program { decls, rules })
    }

    fn parse_enum_decl(&mut self) -> Spanned<Decl> {
        let start = self.current_span();
        self.expect(&Lexeme::Enum);
        let name = self.expect_ident();
        self.expect(&Lexeme::LBrace);
        let mut members = Vec::new();
        loop {
            members.push(self.expect_ident());
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        let end = self.expect(&Lexeme::RBrace);
        Spanned::new(Decl::Enum { name, members }, start.merge(end))
    }

    fn parse_set_decl(&mut self) -> Spanned<Decl> {
        let start = self.current_span();
        self.expect(&Lexeme::Set);
        let name = self.expect_ident();
        self.expect(&Lexeme::LBrace);
        let members = self.parse_member_list();
        let end = self.expect(&Lexeme::RBrace);
        Spanned::new(Decl::Set { name, members }, start.merge(end))
    }

    fn parse_input_decl(&mut self) -> Spanned<Decl> {
        let start = self.current_span();
        let public = self.at(&Lexeme::Pub);
        self.advance();
        let name = self.expect_ident();
        let span = start.merge(name.span);
        Spanned::new(Decl::Input { name, public }, span)
    }

    /// Comma-separated set members: integers or enum member names.
    fn parse_member_list(&mut self) -> Vec<Spanned<SetMember>> {
        let mut members = Vec::new();
        loop {
            let span = self.current_span();
            match self.peek().clone() {
                Lexeme::Integer(n) => {
                    self.advance();
                    members.push(Spanned::new(SetMember::Integer(n), span));
                }
                Lexeme::Ident(name) => {
                    self.advance();
                    members.push(Spanned::new(SetMember::Name(name), span));
                }
                other => {
                    self.error_at_current(&format!(
                        "expected a set member (integer or name), found {}",
                        other.description()
                    ));
                    break;
                }
            }
            if !self.eat(&Lexeme::Comma) {
                break;
            }
        }
        members
    }

    fn parse_rule(&mut self) -> Rule {
        self.expect(&Lexeme::Rule);
        let name = self.expect_ident();
        self.expect(&Lexeme::Colon);
        let body = self.parse_expr();
        Rule { name, body }
    }

    // --- Expressions ---
    //
    // Precedence (loosest first): or, and, not, comparison/in, + -, * /.

    fn parse_expr(&mut self) -> Spanned<Expr> {
        self.parse_or()
    }

    fn parse_or(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_and();
        while self.eat(&Lexeme::Or) {
            let rhs = self.parse_and();
            let span = lhs.span.merge(rhs.span);
            lhs = Spanned::new(
                Expr::Binary {
                    op: BinOp::Or,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_and(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_not();
        while self.eat(&Lexeme::And) {
            let rhs = self.parse_not();
            let span = lhs.span.merge(rhs.span);
            lhs = Spanned::new(
                Expr::Binary {
                    op: BinOp::And,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_not(&mut self) -> Spanned<Expr> {
        if self.at(&Lexeme::Not) {
            let start = self.current_span();
            self.advance();
            let inner = self.parse_not();
            let span = start.merge(inner.span);
            return Spanned::new(Expr::Not(Box::new(inner)), span);
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Spanned<Expr> {
        let lhs = self.parse_arith();

        if self.eat(&Lexeme::In) {
            let set = self.parse_set_ref();
            let span = lhs.span.merge(set.span);
            return Spanned::new(
                Expr::In {
                    needle: Box::new(lhs),
                    set,
                },
                span,
            );
        }

        let op = match self.peek() {
            Lexeme::EqEq => CmpOp::Eq,
            Lexeme::BangEq => CmpOp::Ne,
            Lexeme::Lt => CmpOp::Lt,
            Lexeme::Le => CmpOp::Le,
            Lexeme::Gt => CmpOp::Gt,
            Lexeme::Ge => CmpOp::Ge,
            _ => return lhs,
        };
        self.advance();
        let rhs = self.parse_arith();
        let span = lhs.span.merge(rhs.span);
        Spanned::new(
            Expr::Comparison {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            },
            span,
        )
    }

    fn parse_set_ref(&mut self) -> Spanned<SetRef> {
        if self.at(&Lexeme::LBrace) {
            let start = self.current_span();
            self.advance();
            let members = self.parse_member_list();
            let end = self.expect(&Lexeme::RBrace);
            return Spanned::new(SetRef::Inline(members), start.merge(end));
        }
        let name = self.expect_ident();
        name.map(SetRef::Named)
    }

    fn parse_arith(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_term();
        loop {
            let op = match self.peek() {
                Lexeme::Plus => BinOp::Add,
                Lexeme::Minus => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term();
            let span = lhs.span.merge(rhs.span);
            lhs = Spanned::new(
                Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_term(&mut self) -> Spanned<Expr> {
        let mut lhs = self.parse_primary();
        loop {
            let op = match self.peek() {
                Lexeme::Star => BinOp::Mul,
                Lexeme::Slash => BinOp::Div,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_primary();
            let span = lhs.span.merge(rhs.span);
            lhs = Spanned::new(
                Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                },
                span,
            );
        }
        lhs
    }

    fn parse_primary(&mut self) -> Spanned<Expr> {
        if !self.enter_nesting() {
            return Spanned::new(Expr::Literal(Literal::Integer(0)), self.current_span());
        }
        let expr = self.parse_primary_inner();
        self.exit_nesting();
        expr
    }

    fn parse_primary_inner(&mut self) -> Spanned<Expr> {
        let span = self.current_span();
        match self.peek().clone() {
            Lexeme::Integer(n) => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Integer(n)), span)
            }
            Lexeme::True => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Bool(true)), span)
            }
            Lexeme::False => {
                self.advance();
                Spanned::new(Expr::Literal(Literal::Bool(false)), span)
            }
            Lexeme::Ident(name) => {
                self.advance();
                Spanned::new(Expr::Var(name), span)
            }
            Lexeme::LParen => {
                self.advance();
                let inner = self.parse_expr();
                let end = self.expect(&Lexeme::RParen);
                Spanned::new(inner.node, span.merge(end))
            }
            other => {
                self.error_at_current(&format!(
                    "expected an expression, found {}",
                    other.description()
                ));
                Spanned::new(Expr::Literal(Literal::Integer(0)), span)
            }
        }
    }

    // --- Helpers ---

    fn enter_nesting(&mut self) -> bool {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            self.error_with_help(
                "nesting depth exceeded (maximum 256 levels)",
                "simplify the rule expression",
            );
            return false;
        }
        true
    }

    fn exit_nesting(&mut self) {
        self.depth -= 1;
    }

    fn peek(&self) -> &Lexeme {
        &self.tokens[self.pos].node
    }

    fn current_span(&self) -> Span {
        self.tokens[self.pos].span
    }

    fn advance(&mut self) -> &Spanned<Lexeme> {
        let tok = &self.tokens[self.pos];
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    fn at(&self, token: &Lexeme) -> bool {
        std::mem::discriminant(self.peek()) == std::mem::discriminant(token)
    }

    fn eat(&mut self, token: &Lexeme) -> bool {
        if self.at(token) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &Lexeme) -> Span {
        if self.at(token) {
            let span = self.current_span();
            self.advance();
            span
        } else {
            self.error_at_current(&format!(
                "expected {}, found {}",
                token.description(),
                self.peek().description()
            ));
            self.current_span()
        }
    }

    fn expect_ident(&mut self) -> Spanned<String> {
        if let Lexeme::Ident(name) = self.peek().clone() {
            let span = self.current_span();
            self.advance();
            Spanned::new(name, span)
        } else {
            self.error_at_current(&format!(
                "expected identifier, found {}",
                self.peek().description()
            ));
            Spanned::new("_error_".to_string(), self.current_span())
        }
    }

    fn error_at_current(&mut self, msg: &str) {
        self.diagnostics
            .push(Diagnostic::error(msg.to_string(), self.current_span()));
    }

    fn error_with_help(&mut self, msg: &str, help: &str) {
        self.diagnostics.push(
            Diagnostic::error(msg.to_string(), self.current_span()).with_help(help.to_string()),
        );
    }
}
