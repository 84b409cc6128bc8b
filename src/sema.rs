//! Semantic analysis: lexically-scoped name resolution over the AST.
//!
//! A single depth-first traversal resolves every `Var` reference against a
//! stack of block scopes and rejects redeclaration within a scope. Entering
//! a scope returns a `ScopeGuard` whose `Drop` pops it, so a scope is popped
//! on every exit path, including an early return caused by an error, without
//! a matching hand-written pop at every `return`.

use std::collections::HashSet;

use crate::ast::{Ast, Expr, ExprRef, Item, Stmt, StmtRef};
use crate::error::Error;

/// A stack of block scopes, each a set of declared names.
#[derive(Debug, Default)]
struct ScopeStack {
    scopes: Vec<HashSet<String>>,
}

impl ScopeStack {
    fn push(&mut self) {
        self.scopes.push(HashSet::new());
    }

    fn pop(&mut self) {
        self.scopes.pop();
    }

    fn declare(&mut self, name: &str) -> Result<(), Error> {
        let top = self
            .scopes
            .last_mut()
            .expect("declare called with no active scope");
        if !top.insert(name.to_string()) {
            return Err(Error::Redeclaration {
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn resolve(&self, name: &str) -> bool {
        self.scopes.iter().rev().any(|scope| scope.contains(name))
    }
}

/// RAII guard: pushes a scope on creation, pops it on drop. Every exit path
/// out of a scoped region, including an early `?` return on error, pops
/// exactly the scope it pushed.
struct ScopeGuard<'a> {
    stack: &'a mut ScopeStack,
}

impl<'a> ScopeGuard<'a> {
    fn enter(stack: &'a mut ScopeStack) -> Self {
        stack.push();
        Self { stack }
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.stack.pop();
    }
}

/// Analyze `ast`, returning `Ok(())` if every scope/declaration rule holds,
/// or the first violation encountered in a depth-first traversal.
pub fn analyze(ast: &Ast) -> Result<(), Error> {
    let mut stack = ScopeStack::default();
    for item in &ast.items {
        if let Item::Function(func) = item {
            analyze_function(ast, &mut stack, func)?;
        }
    }
    Ok(())
}

fn analyze_function(
    ast: &Ast,
    stack: &mut ScopeStack,
    func: &crate::ast::Function,
) -> Result<(), Error> {
    let guard = ScopeGuard::enter(stack);
    if let Some(param) = &func.param {
        guard.stack.declare(param)?;
    }
    // Function parameters share the outermost scope of the body: the block
    // directly inside the function body does not push a second scope.
    analyze_block_statements(ast, guard.stack, func.body)
}

/// Analyze the statements of a `Block` without pushing a new scope. Used for
/// a function's top-level body block, which extends the parameter scope
/// rather than nesting a new one.
fn analyze_block_statements(ast: &Ast, stack: &mut ScopeStack, block: StmtRef) -> Result<(), Error> {
    let Some(Stmt::Block(stmts)) = ast.stmt(block) else {
        return Err(Error::MalformedStatement(
            "expected a block".to_string(),
        ));
    };
    for stmt in stmts {
        analyze_stmt(ast, stack, *stmt)?;
    }
    Ok(())
}

fn analyze_stmt(ast: &Ast, stack: &mut ScopeStack, stmt_ref: StmtRef) -> Result<(), Error> {
    match ast.stmt(stmt_ref) {
        Some(Stmt::Block(_)) => {
            let guard = ScopeGuard::enter(stack);
            analyze_block_statements(ast, guard.stack, stmt_ref)
        }
        Some(Stmt::Decl(name)) => stack.declare(name),
        Some(Stmt::Assign { name, rhs }) => {
            if !stack.resolve(name) {
                return Err(Error::UndeclaredVariable {
                    name: name.clone(),
                });
            }
            analyze_expr(ast, stack, *rhs)
        }
        Some(Stmt::If {
            cond,
            then_branch,
            else_branch,
        }) => {
            analyze_expr(ast, stack, *cond)?;
            analyze_stmt(ast, stack, *then_branch)?;
            if let Some(else_branch) = else_branch {
                analyze_stmt(ast, stack, *else_branch)?;
            }
            Ok(())
        }
        Some(Stmt::While { cond, body }) => {
            analyze_expr(ast, stack, *cond)?;
            analyze_stmt(ast, stack, *body)
        }
        Some(Stmt::Return(expr)) => {
            if let Some(expr) = expr {
                analyze_expr(ast, stack, *expr)?;
            }
            Ok(())
        }
        Some(Stmt::ExprStmt(expr)) => analyze_expr(ast, stack, *expr),
        None => Err(Error::MalformedStatement("dangling statement ref".to_string())),
    }
}

fn analyze_expr(ast: &Ast, stack: &mut ScopeStack, expr_ref: ExprRef) -> Result<(), Error> {
    match ast.expr(expr_ref) {
        Some(Expr::Var(name)) => {
            if stack.resolve(name) {
                Ok(())
            } else {
                Err(Error::UndeclaredVariable {
                    name: name.clone(),
                })
            }
        }
        Some(Expr::Const(_)) => Ok(()),
        Some(Expr::UnaryExpr { operand, .. }) => analyze_expr(ast, stack, *operand),
        Some(Expr::BinaryExpr { lhs, rhs, .. }) | Some(Expr::RelExpr { lhs, rhs, .. }) => {
            analyze_expr(ast, stack, *lhs)?;
            analyze_expr(ast, stack, *rhs)
        }
        Some(Expr::Call { arg, .. }) => {
            if let Some(arg) = arg {
                analyze_expr(ast, stack, *arg)?;
            }
            Ok(())
        }
        None => Err(Error::MalformedStatement("dangling expression ref".to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_source;

    fn check(source: &str) -> Result<(), Error> {
        let ast = parse_source(source).expect("source should parse");
        analyze(&ast)
    }

    #[test]
    fn accepts_well_scoped_program() {
        assert!(check("int func(){ int x; x = 1+2; return x; }").is_ok());
    }

    #[test]
    fn rejects_undeclared_variable() {
        let err = check("int f(){ y = 1; }").unwrap_err();
        assert_eq!(
            err,
            Error::UndeclaredVariable {
                name: "y".to_string()
            }
        );
    }

    #[test]
    fn rejects_redeclaration() {
        let err = check("int f(){ int x; int x; }").unwrap_err();
        assert_eq!(
            err,
            Error::Redeclaration {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn function_parameter_is_visible_in_body_without_extra_scope() {
        assert!(check("int f(int n){ return n; }").is_ok());
    }

    #[test]
    fn shadowing_in_nested_block_is_a_fresh_scope() {
        // `x` declared in the if-block does not collide with the outer `x`.
        assert!(check(
            "int f(){ int x; if (x == 0) { int x; x = 1; } return x; }"
        )
        .is_ok());
    }

    #[test]
    fn redeclaration_in_nested_block_still_fails() {
        let err = check("int f(){ if (1 == 1) { int x; int x; } }").unwrap_err();
        assert_eq!(
            err,
            Error::Redeclaration {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn variable_out_of_scope_after_block_exit() {
        let err = check("int f(){ if (1 == 1) { int x; } return x; }").unwrap_err();
        assert_eq!(
            err,
            Error::UndeclaredVariable {
                name: "x".to_string()
            }
        );
    }

    #[test]
    fn call_with_no_argument_is_legal() {
        assert!(check("int f(){ g(); return 0; }").is_ok());
    }

    #[test]
    fn function_with_no_parameters_still_creates_a_body_scope() {
        assert!(check("int f(){ int x; return x; }").is_ok());
    }
}
