//! Recursive-descent parser turning a MiniC token stream into an `Ast`.
//!
//! Grammar (informal), matching the AST's own node kinds:
//!
//! ```text
//! program    := item*
//! item       := extern_decl | function
//! extern_decl:= "extern" identifier "(" ")" ";"
//! function   := "int" identifier "(" [ "int" identifier ] ")" block
//! block      := "{" statement* "}"
//! statement  := decl | assign | if | while | return | expr_stmt
//! decl       := "int" identifier ";"
//! assign     := identifier "=" expr ";"
//! if         := "if" "(" rel_expr ")" block [ "else" block ]
//! while      := "while" "(" rel_expr ")" block
//! return     := "return" [ expr ] ";"
//! expr_stmt  := expr ";"
//! expr       := rel_expr
//! rel_expr   := additive [ relop additive ]
//! additive   := term ( ("+" | "-") term )*
//! term       := unary ( ("*" | "/") unary )*
//! unary      := "-" unary | primary
//! primary    := identifier [ "(" [ expr ] ")" ] | int_literal | "(" expr ")"
//! ```

use crate::ast::{Ast, BinaryOperator, Expr, ExternDecl, Function, Item, RelOperator, Stmt, StmtRef, UnaryOperator};
use crate::error::Error;
use crate::lexer::{Token, TokenKind};

pub struct Parser<'toks> {
    tokens: &'toks [Token],
    pos: usize,
    ast: Ast,
}

impl<'toks> Parser<'toks> {
    pub fn new(tokens: &'toks [Token]) -> Self {
        Self {
            tokens,
            pos: 0,
            ast: Ast::new(),
        }
    }

    fn peek(&self) -> &TokenKind {
        &self.tokens[self.pos.min(self.tokens.len() - 1)].kind
    }

    fn bump(&mut self) -> TokenKind {
        let kind = self.tokens[self.pos.min(self.tokens.len() - 1)].kind.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        kind
    }

    fn expect(&mut self, expected: &TokenKind) -> Result<(), Error> {
        if self.peek() == expected {
            self.bump();
            Ok(())
        } else {
            Err(Error::ParseFailure(format!(
                "expected {expected}, found {}",
                self.peek()
            )))
        }
    }

    fn expect_identifier(&mut self) -> Result<String, Error> {
        match self.bump() {
            TokenKind::Identifier(name) => Ok(name),
            other => Err(Error::ParseFailure(format!(
                "expected identifier, found {other}"
            ))),
        }
    }

    /// Parse the whole token stream into an `Ast`, consuming `self`.
    pub fn parse(mut self) -> Result<Ast, Error> {
        while self.peek() != &TokenKind::Eof {
            let item = match self.peek() {
                TokenKind::Extern => self.parse_extern()?,
                TokenKind::Int => self.parse_function()?,
                other => {
                    return Err(Error::ParseFailure(format!(
                        "expected a function or extern declaration, found {other}"
                    )))
                }
            };
            self.ast.items.push(item);
        }
        Ok(self.ast)
    }

    fn parse_extern(&mut self) -> Result<Item, Error> {
        self.expect(&TokenKind::Extern)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(Item::Extern(ExternDecl {
            name,
            signature: "()".to_string(),
        }))
    }

    fn parse_function(&mut self) -> Result<Item, Error> {
        self.expect(&TokenKind::Int)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::LParen)?;
        let param = if self.peek() == &TokenKind::Int {
            self.bump();
            Some(self.expect_identifier()?)
        } else {
            None
        };
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(Item::Function(Function { name, param, body }))
    }

    fn parse_block(&mut self) -> Result<StmtRef, Error> {
        self.expect(&TokenKind::LBrace)?;
        let mut stmts = Vec::new();
        while self.peek() != &TokenKind::RBrace {
            if self.peek() == &TokenKind::Eof {
                return Err(Error::ParseFailure("unterminated block".to_string()));
            }
            stmts.push(self.parse_statement()?);
        }
        self.expect(&TokenKind::RBrace)?;
        Ok(self.ast.push_stmt(Stmt::Block(stmts)))
    }

    fn parse_statement(&mut self) -> Result<StmtRef, Error> {
        match self.peek() {
            TokenKind::Int => self.parse_decl(),
            TokenKind::If => self.parse_if(),
            TokenKind::While => self.parse_while(),
            TokenKind::Return => self.parse_return(),
            TokenKind::Identifier(_) => self.parse_assign_or_expr_stmt(),
            other => Err(Error::MalformedStatement(format!(
                "unexpected token {other}"
            ))),
        }
    }

    fn parse_decl(&mut self) -> Result<StmtRef, Error> {
        self.expect(&TokenKind::Int)?;
        let name = self.expect_identifier()?;
        self.expect(&TokenKind::Semicolon)?;
        Ok(self.ast.push_stmt(Stmt::Decl(name)))
    }

    fn parse_if(&mut self) -> Result<StmtRef, Error> {
        self.expect(&TokenKind::If)?;
        self.expect(&TokenKind::LParen)
            .map_err(|_| Error::MalformedIf("missing condition".to_string()))?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)
            .map_err(|_| Error::MalformedIf("missing condition".to_string()))?;
        let then_branch = self
            .parse_block()
            .map_err(|_| Error::MalformedIf("missing then-block".to_string()))?;
        let else_branch = if self.peek() == &TokenKind::Else {
            self.bump();
            Some(self.parse_block()?)
        } else {
            None
        };
        Ok(self.ast.push_stmt(Stmt::If {
            cond,
            then_branch,
            else_branch,
        }))
    }

    fn parse_while(&mut self) -> Result<StmtRef, Error> {
        self.expect(&TokenKind::While)?;
        self.expect(&TokenKind::LParen)?;
        let cond = self.parse_expr()?;
        self.expect(&TokenKind::RParen)?;
        let body = self.parse_block()?;
        Ok(self.ast.push_stmt(Stmt::While { cond, body }))
    }

    fn parse_return(&mut self) -> Result<StmtRef, Error> {
        self.expect(&TokenKind::Return)?;
        let expr = if self.peek() == &TokenKind::Semicolon {
            None
        } else {
            Some(self.parse_expr()?)
        };
        self.expect(&TokenKind::Semicolon)?;
        Ok(self.ast.push_stmt(Stmt::Return(expr)))
    }

    fn parse_assign_or_expr_stmt(&mut self) -> Result<StmtRef, Error> {
        let name = self.expect_identifier()?;
        let stmt = if self.peek() == &TokenKind::Assign {
            self.bump();
            let rhs = self.parse_expr()?;
            Stmt::Assign { name, rhs }
        } else {
            let expr = self.parse_call_or_var(name)?;
            Stmt::ExprStmt(expr)
        };
        self.expect(&TokenKind::Semicolon)?;
        Ok(self.ast.push_stmt(stmt))
    }

    fn parse_expr(&mut self) -> Result<crate::ast::ExprRef, Error> {
        self.parse_relational()
    }

    fn parse_relational(&mut self) -> Result<crate::ast::ExprRef, Error> {
        let lhs = self.parse_additive()?;
        let op = match self.peek() {
            TokenKind::EqEq => RelOperator::Eq,
            TokenKind::Neq => RelOperator::Ne,
            TokenKind::Lt => RelOperator::Lt,
            TokenKind::Le => RelOperator::Le,
            TokenKind::Gt => RelOperator::Gt,
            TokenKind::Ge => RelOperator::Ge,
            _ => return Ok(lhs),
        };
        self.bump();
        let rhs = self.parse_additive()?;
        Ok(self.ast.push_expr(Expr::RelExpr {
            operator: op,
            lhs,
            rhs,
        }))
    }

    fn parse_additive(&mut self) -> Result<crate::ast::ExprRef, Error> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                TokenKind::Plus => BinaryOperator::Add,
                TokenKind::Minus => BinaryOperator::Sub,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_term()?;
            lhs = self.ast.push_expr(Expr::BinaryExpr {
                operator: op,
                lhs,
                rhs,
            });
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<crate::ast::ExprRef, Error> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                TokenKind::Star => BinaryOperator::Mul,
                TokenKind::Slash => BinaryOperator::Div,
                _ => break,
            };
            self.bump();
            let rhs = self.parse_unary()?;
            lhs = self.ast.push_expr(Expr::BinaryExpr {
                operator: op,
                lhs,
                rhs,
            });
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<crate::ast::ExprRef, Error> {
        if self.peek() == &TokenKind::Minus {
            self.bump();
            let operand = self.parse_unary()?;
            return Ok(self.ast.push_expr(Expr::UnaryExpr {
                operator: UnaryOperator::Negate,
                operand,
            }));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<crate::ast::ExprRef, Error> {
        match self.bump() {
            TokenKind::IntLiteral(value) => Ok(self.ast.push_expr(Expr::Const(value))),
            TokenKind::Identifier(name) => self.parse_call_or_var(name),
            TokenKind::LParen => {
                let expr = self.parse_expr()?;
                self.expect(&TokenKind::RParen)?;
                Ok(expr)
            }
            other => Err(Error::ParseFailure(format!(
                "expected an expression, found {other}"
            ))),
        }
    }

    fn parse_call_or_var(&mut self, name: String) -> Result<crate::ast::ExprRef, Error> {
        if self.peek() == &TokenKind::LParen {
            self.bump();
            let arg = if self.peek() == &TokenKind::RParen {
                None
            } else {
                Some(self.parse_expr()?)
            };
            self.expect(&TokenKind::RParen)?;
            Ok(self.ast.push_expr(Expr::Call { callee: name, arg }))
        } else {
            Ok(self.ast.push_expr(Expr::Var(name)))
        }
    }
}

/// Scan and parse `source` into an `Ast`.
pub fn parse_source(source: &str) -> Result<Ast, Error> {
    let mut lexer = crate::lexer::Lexer::new(source);
    let tokens = lexer.scan()?;
    Parser::new(&tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_decl_assign_return() {
        let ast = parse_source("int func(){ int x; x = 1+2; return x; }").unwrap();
        let printed = ast.print_node();
        assert!(printed.contains("Decl(x)"));
        assert!(printed.contains("Assign(x, Add(Const(1), Const(2)))"));
        assert!(printed.contains("Return(Var(x))"));
    }

    #[test]
    fn parses_if_else_and_while() {
        let ast = parse_source(
            "int f(int n){ if (n < 1) { return 0; } else { return 1; } while (n < 1) { n = n; } return n; }",
        )
        .unwrap();
        let printed = ast.print_node();
        assert!(printed.contains("If(Lt(Var(n), Const(1)))"));
        assert!(printed.contains("While(Lt(Var(n), Const(1)))"));
    }

    #[test]
    fn parses_zero_argument_call_and_return() {
        let ast = parse_source("int f(){ g(); return; }").unwrap();
        let printed = ast.print_node();
        assert!(printed.contains("Expr(Call(g))"));
        assert!(printed.contains("Return()"));
    }

    #[test]
    fn rejects_malformed_if() {
        let err = parse_source("int f(){ if { return 1; } }").unwrap_err();
        assert!(matches!(err, Error::MalformedIf(_)));
    }
}
