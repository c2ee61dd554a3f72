//! Parser for Skald syntax.
//!
//! A precedence-climbing parser over an explicit position cursor. Binary
//! operators are left-associative with six precedence levels; assignment
//! sits below all of them and is right-associative, as are the unary
//! operators. Parenthesization is kept in the tree as a `()` wrapper node
//! so source shape survives into tests.
//!
//! Semicolons inside a block are optional after an expression that ended
//! with `}`; the last expression before the closing `}` becomes the block's
//! result.

use crate::ast::{Definition, ExprKind, Expression, LiteralValue, Location, Module};
use crate::error::CompileError;
use crate::tokenizer::{Token, TokenKind};
use crate::types::Type;

/// Left-associative binary operators, lowest precedence first.
const BINARY_PRECEDENCE: [&[&str]; 6] = [
    &["or"],
    &["and"],
    &["==", "!="],
    &["<", "<=", ">", ">="],
    &["+", "-"],
    &["*", "/", "%"],
];

/// Parse a token sequence into a module.
///
/// Top-level `fun` definitions are collected; remaining top-level
/// expressions are bundled into a single expression (a synthetic block when
/// there is more than one), whose trailing expression becomes the module's
/// result under the same semicolon rules as blocks.
pub fn parse(tokens: &[Token]) -> Result<Module, CompileError> {
    if tokens.is_empty() {
        return Err(CompileError::parse(Location::dummy(), "empty input"));
    }
    let mut parser = Parser::new(tokens);
    parser.parse_module()
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    /// Virtual token returned when peeking past the last real token.
    end: Token,
}

impl<'a> Parser<'a> {
    fn new(tokens: &'a [Token]) -> Self {
        let last_location = tokens
            .last()
            .map(|t| t.location.clone())
            .unwrap_or_else(Location::dummy);
        Parser {
            tokens,
            pos: 0,
            end: Token::new("", TokenKind::End, last_location),
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn peek(&self) -> &Token {
        self.tokens.get(self.pos).unwrap_or(&self.end)
    }

    /// Text of the most recently consumed token ("" at the start).
    fn prev_text(&self) -> &str {
        match self.pos.checked_sub(1).and_then(|i| self.tokens.get(i)) {
            Some(t) => &t.text,
            None => "",
        }
    }

    fn consume(&mut self) -> Token {
        let token = self.peek().clone();
        self.pos += 1;
        token
    }

    fn describe(token: &Token) -> String {
        if token.kind == TokenKind::End {
            "end of input".to_string()
        } else {
            format!("\"{}\"", token.text)
        }
    }

    fn expect(&mut self, expected: &str) -> Result<Token, CompileError> {
        if self.peek().text != expected {
            return Err(CompileError::parse(
                self.peek().location.clone(),
                format!("expected \"{}\", got {}", expected, Self::describe(self.peek())),
            ));
        }
        Ok(self.consume())
    }

    fn expect_one_of(&mut self, expected: &[&str]) -> Result<Token, CompileError> {
        if !expected.contains(&self.peek().text.as_str()) {
            let alternatives = expected
                .iter()
                .map(|e| format!("\"{}\"", e))
                .collect::<Vec<_>>()
                .join(", ");
            return Err(CompileError::parse(
                self.peek().location.clone(),
                format!(
                    "expected one of: {}, got {}",
                    alternatives,
                    Self::describe(self.peek())
                ),
            ));
        }
        Ok(self.consume())
    }

    fn expect_identifier(&mut self) -> Result<Token, CompileError> {
        if self.peek().kind != TokenKind::Identifier {
            return Err(CompileError::parse(
                self.peek().location.clone(),
                format!("expected an identifier, got {}", Self::describe(self.peek())),
            ));
        }
        Ok(self.consume())
    }

    /// Declarations are only legal as block-level effect expressions.
    fn ensure_not_var(&self, expr: Expression) -> Result<Expression, CompileError> {
        if matches!(expr.kind, ExprKind::Var { .. }) {
            return Err(CompileError::parse(
                expr.location,
                "unexpected variable declaration",
            ));
        }
        Ok(expr)
    }

    fn parse_module(&mut self) -> Result<Module, CompileError> {
        let first_location = self.tokens[0].location.clone();
        let mut defs: Vec<Definition> = Vec::new();
        let mut exprs: Vec<Expression> = Vec::new();
        let mut found_result = false;
        let mut ended_with_block = false;

        while !self.at_end() {
            if self.peek().text == "fun" {
                defs.push(self.parse_definition()?);
                continue;
            }
            let node = self.parse_assignment()?;
            if found_result {
                return Err(CompileError::parse(
                    node.location,
                    "result expression already encountered; did you forget a semicolon?",
                ));
            }
            exprs.push(node);
            ended_with_block = false;
            if self.prev_text() == "}" {
                if self.peek().text == ";" {
                    self.consume();
                } else {
                    ended_with_block = true;
                }
            } else if self.peek().text == ";" {
                self.consume();
            } else {
                found_result = true;
            }
        }

        let mut result = None;
        if found_result || ended_with_block {
            result = exprs.pop();
        }

        let expr = if exprs.is_empty() {
            result
        } else {
            Some(Expression::new(
                ExprKind::Block {
                    exprs,
                    result: result.map(Box::new),
                },
                first_location,
            ))
        };

        Ok(Module { defs, expr })
    }

    /// `fun` IDENT `(` [IDENT `:` type {`,` IDENT `:` type}] `)` `:` type block
    fn parse_definition(&mut self) -> Result<Definition, CompileError> {
        self.expect("fun")?;
        let name_token = self.expect_identifier()?;

        self.expect("(")?;
        let mut param_names: Vec<String> = Vec::new();
        let mut param_types: Vec<Type> = Vec::new();
        while self.peek().text != ")" {
            let param_token = self.expect_identifier()?;
            if param_names.contains(&param_token.text) {
                return Err(CompileError::parse(
                    param_token.location,
                    format!(
                        "parameter \"{}\" already used in this definition",
                        param_token.text
                    ),
                ));
            }
            self.expect(":")?;
            param_types.push(self.parse_type()?);
            param_names.push(param_token.text);
            if self.peek().text != ")" {
                self.expect(",")?;
            }
        }
        self.expect(")")?;
        self.expect(":")?;
        let result_type = self.parse_type()?;

        let body = self.parse_block()?;

        Ok(Definition {
            name: name_token.text,
            params: param_names,
            body,
            fun_type: Type::function(param_types, result_type),
            location: name_token.location,
        })
    }

    fn parse_type(&mut self) -> Result<Type, CompileError> {
        let token = self.expect_one_of(&["Int", "Bool", "Unit"])?;
        // expect_one_of already limited the text to valid names
        Ok(Type::from_name(&token.text).unwrap())
    }

    /// assignment := binary [ `=` assignment ]   (right-associative)
    fn parse_assignment(&mut self) -> Result<Expression, CompileError> {
        let left = self.parse_binary(0)?;
        if self.peek().text == "=" {
            let op_token = self.consume();
            let right = self.parse_assignment()?;
            let right = self.ensure_not_var(right)?;
            return Ok(Expression::new(
                ExprKind::BinaryOp {
                    left: Box::new(left),
                    op: op_token.text,
                    right: Box::new(right),
                },
                op_token.location,
            ));
        }
        Ok(left)
    }

    fn parse_binary(&mut self, level: usize) -> Result<Expression, CompileError> {
        if level == BINARY_PRECEDENCE.len() {
            return self.parse_unary();
        }
        let mut left = self.parse_binary(level + 1)?;
        while BINARY_PRECEDENCE[level].contains(&self.peek().text.as_str()) {
            let op_token = self.consume();
            let right = self.parse_binary(level + 1)?;
            left = Expression::new(
                ExprKind::BinaryOp {
                    left: Box::new(left),
                    op: op_token.text,
                    right: Box::new(right),
                },
                op_token.location,
            );
        }
        Ok(left)
    }

    /// unary := (`-` | `not`) unary | term   (right-associative)
    fn parse_unary(&mut self) -> Result<Expression, CompileError> {
        if self.peek().text == "-" || self.peek().text == "not" {
            let op_token = self.consume();
            let param = self.parse_unary()?;
            return Ok(Expression::new(
                ExprKind::UnaryOp {
                    op: format!("unary_{}", op_token.text),
                    param: Box::new(param),
                },
                op_token.location,
            ));
        }
        self.parse_term()
    }

    fn parse_term(&mut self) -> Result<Expression, CompileError> {
        match self.peek().text.as_str() {
            "{" => return self.parse_block(),
            "(" => return self.parse_parenthesized(),
            "if" => return self.parse_if(),
            "while" => return self.parse_while(),
            "var" => return self.parse_var(),
            "break" => {
                let token = self.consume();
                return Ok(Expression::new(ExprKind::Break, token.location));
            }
            "continue" => {
                let token = self.consume();
                return Ok(Expression::new(ExprKind::Continue, token.location));
            }
            "return" => return self.parse_return(),
            _ => {}
        }

        let term = self.parse_factor()?;
        if let ExprKind::Identifier(_) = &term.kind
            && self.peek().text == "("
        {
            return self.parse_call(term);
        }
        Ok(term)
    }

    fn parse_factor(&mut self) -> Result<Expression, CompileError> {
        match self.peek().kind {
            TokenKind::IntLiteral => {
                let token = self.consume();
                let value: i64 = token.text.parse().map_err(|_| {
                    CompileError::parse(
                        token.location.clone(),
                        format!("integer literal {} does not fit in 64 bits", token.text),
                    )
                })?;
                Ok(Expression::new(
                    ExprKind::Literal(LiteralValue::Int(value)),
                    token.location,
                ))
            }
            TokenKind::BoolLiteral => {
                let token = self.consume();
                Ok(Expression::new(
                    ExprKind::Literal(LiteralValue::Bool(token.text == "true")),
                    token.location,
                ))
            }
            TokenKind::Identifier => {
                let token = self.consume();
                Ok(Expression::new(
                    ExprKind::Identifier(token.text),
                    token.location,
                ))
            }
            _ => Err(CompileError::parse(
                self.peek().location.clone(),
                format!(
                    "expected an integer literal, a boolean literal or an identifier, got {}",
                    Self::describe(self.peek())
                ),
            )),
        }
    }

    fn parse_parenthesized(&mut self) -> Result<Expression, CompileError> {
        let open = self.expect("(")?;
        let inner = self.parse_assignment()?;
        let inner = self.ensure_not_var(inner)?;
        self.expect(")")?;
        Ok(Expression::new(
            ExprKind::UnaryOp {
                op: "()".to_string(),
                param: Box::new(inner),
            },
            open.location,
        ))
    }

    fn parse_if(&mut self) -> Result<Expression, CompileError> {
        let keyword = self.expect("if")?;
        let condition = self.parse_assignment()?;
        let condition = self.ensure_not_var(condition)?;

        self.expect("then")?;
        let true_branch = self.parse_assignment()?;
        let true_branch = self.ensure_not_var(true_branch)?;

        let mut false_branch = None;
        if self.peek().text == "else" {
            self.consume();
            let branch = self.parse_assignment()?;
            false_branch = Some(Box::new(self.ensure_not_var(branch)?));
        }

        Ok(Expression::new(
            ExprKind::If {
                condition: Box::new(condition),
                true_branch: Box::new(true_branch),
                false_branch,
            },
            keyword.location,
        ))
    }

    fn parse_while(&mut self) -> Result<Expression, CompileError> {
        let keyword = self.expect("while")?;
        let condition = self.parse_assignment()?;
        let condition = self.ensure_not_var(condition)?;
        self.expect("do")?;
        let body = self.parse_assignment()?;
        let body = self.ensure_not_var(body)?;
        Ok(Expression::new(
            ExprKind::While {
                condition: Box::new(condition),
                body: Box::new(body),
            },
            keyword.location,
        ))
    }

    fn parse_var(&mut self) -> Result<Expression, CompileError> {
        let keyword = self.expect("var")?;
        let name_token = self.expect_identifier()?;

        let mut typed = false;
        let mut declared = Type::Unit;
        if self.peek().text == ":" {
            self.consume();
            declared = self.parse_type()?;
            typed = true;
        }

        self.expect("=")?;
        let value = self.parse_assignment()?;
        let value = self.ensure_not_var(value)?;

        Ok(Expression::new(
            ExprKind::Var {
                name: name_token.text,
                value: Box::new(value),
                typed,
                declared,
            },
            keyword.location,
        ))
    }

    fn parse_call(&mut self, callee: Expression) -> Result<Expression, CompileError> {
        let name = match callee.kind {
            ExprKind::Identifier(name) => name,
            _ => unreachable!("parse_call is only reached from an identifier term"),
        };
        self.expect("(")?;
        let mut args = Vec::new();
        if self.peek().text == ")" {
            self.consume();
        } else {
            let first = self.parse_assignment()?;
            args.push(self.ensure_not_var(first)?);
            while self.peek().text != ")" {
                self.expect(",")?;
                let arg = self.parse_assignment()?;
                args.push(self.ensure_not_var(arg)?);
            }
            self.consume();
        }
        Ok(Expression::new(
            ExprKind::Call { name, args },
            callee.location,
        ))
    }

    fn parse_return(&mut self) -> Result<Expression, CompileError> {
        let keyword = self.expect("return")?;
        let expr = if self.peek().text == ";" || self.peek().text == "}" {
            None
        } else {
            Some(Box::new(self.parse_assignment()?))
        };
        Ok(Expression::new(ExprKind::Return(expr), keyword.location))
    }

    fn parse_block(&mut self) -> Result<Expression, CompileError> {
        let open = self.expect("{")?;

        let mut exprs: Vec<Expression> = Vec::new();
        let mut result: Option<Expression> = None;
        while self.peek().text != "}" {
            let expr = self.parse_assignment()?;
            if self.prev_text() == "}" || self.peek().text == ";" {
                if self.peek().text == ";" {
                    self.consume();
                }
                exprs.push(expr);
            } else {
                result = Some(expr);
                break;
            }
        }

        // A brace-terminated final expression doubles as the block's result.
        if self.prev_text() == "}" && result.is_none() && !exprs.is_empty() {
            result = exprs.pop();
        }

        if self.peek().text != "}" {
            return Err(CompileError::parse(
                self.peek().location.clone(),
                "expected \"}\" after the block's result expression (are you missing a semicolon?)",
            ));
        }
        self.consume();

        Ok(Expression::new(
            ExprKind::Block {
                exprs,
                result: result.map(Box::new),
            },
            open.location,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tokenizer::tokenize;

    fn parse_source(s: &str) -> Module {
        parse(&tokenize(s, "test").unwrap()).unwrap()
    }

    fn parse_expr(s: &str) -> Expression {
        parse_source(s).expr.expect("expected a top-level expression")
    }

    fn assert_parse_fails(s: &str) {
        let tokens = tokenize(s, "test").unwrap();
        assert!(parse(&tokens).is_err(), "parsing didn't fail for {:?}", s);
    }

    fn int(v: i64) -> Expression {
        Expression::untracked(ExprKind::Literal(LiteralValue::Int(v)))
    }

    fn boolean(v: bool) -> Expression {
        Expression::untracked(ExprKind::Literal(LiteralValue::Bool(v)))
    }

    fn ident(name: &str) -> Expression {
        Expression::untracked(ExprKind::Identifier(name.to_string()))
    }

    fn binop(left: Expression, op: &str, right: Expression) -> Expression {
        Expression::untracked(ExprKind::BinaryOp {
            left: Box::new(left),
            op: op.to_string(),
            right: Box::new(right),
        })
    }

    fn unary(op: &str, param: Expression) -> Expression {
        Expression::untracked(ExprKind::UnaryOp {
            op: op.to_string(),
            param: Box::new(param),
        })
    }

    fn parens(inner: Expression) -> Expression {
        unary("()", inner)
    }

    fn call(name: &str, args: Vec<Expression>) -> Expression {
        Expression::untracked(ExprKind::Call {
            name: name.to_string(),
            args,
        })
    }

    fn block(exprs: Vec<Expression>, result: Option<Expression>) -> Expression {
        Expression::untracked(ExprKind::Block {
            exprs,
            result: result.map(Box::new),
        })
    }

    #[test]
    fn test_addition_parsing() {
        assert_eq!(
            parse_expr("3 +5+ 7"),
            binop(binop(int(3), "+", int(5)), "+", int(7))
        );
        assert_eq!(parse_expr("a + 5"), binop(ident("a"), "+", int(5)));
        assert_eq!(parse_expr("1 + false"), binop(int(1), "+", boolean(false)));
        assert_parse_fails("3++");
    }

    #[test]
    fn test_multiplication_parsing() {
        assert_eq!(
            parse_expr("3 *5   / 7"),
            binop(binop(int(3), "*", int(5)), "/", int(7))
        );
        assert_eq!(
            parse_expr(" 3-3 *5   / 7"),
            binop(
                int(3),
                "-",
                binop(binop(int(3), "*", int(5)), "/", int(7))
            )
        );
    }

    #[test]
    fn test_parenthesis_parsing() {
        assert_eq!(
            parse_expr(" 3-((3 *5)   / 7)"),
            binop(
                int(3),
                "-",
                parens(binop(parens(binop(int(3), "*", int(5))), "/", int(7)))
            )
        );
        assert_eq!(
            parse_expr("(3-2)/ (7+5)"),
            binop(
                parens(binop(int(3), "-", int(2))),
                "/",
                parens(binop(int(7), "+", int(5)))
            )
        );
    }

    #[test]
    fn test_conditional_parsing() {
        assert_eq!(
            parse_expr("if a then b else c"),
            Expression::untracked(ExprKind::If {
                condition: Box::new(ident("a")),
                true_branch: Box::new(ident("b")),
                false_branch: Some(Box::new(ident("c"))),
            })
        );
        assert_eq!(
            parse_expr("1 + (if a then 2 else 3) * 4"),
            binop(
                int(1),
                "+",
                binop(
                    parens(Expression::untracked(ExprKind::If {
                        condition: Box::new(ident("a")),
                        true_branch: Box::new(int(2)),
                        false_branch: Some(Box::new(int(3))),
                    })),
                    "*",
                    int(4)
                )
            )
        );
        assert_eq!(
            parse_expr("if true then f(false)"),
            Expression::untracked(ExprKind::If {
                condition: Box::new(boolean(true)),
                true_branch: Box::new(call("f", vec![boolean(false)])),
                false_branch: None,
            })
        );
    }

    #[test]
    fn test_unary_parsing() {
        assert_eq!(
            parse_expr("not a + (- bbb5ifnotb)"),
            binop(
                unary("unary_not", ident("a")),
                "+",
                parens(unary("unary_-", ident("bbb5ifnotb")))
            )
        );
        assert_eq!(
            parse_expr("not not - (- not a)"),
            unary(
                "unary_not",
                unary(
                    "unary_not",
                    unary(
                        "unary_-",
                        parens(unary("unary_-", unary("unary_not", ident("a"))))
                    )
                )
            )
        );
    }

    #[test]
    fn test_function_parsing() {
        assert_eq!(parse_expr("f(a)"), call("f", vec![ident("a")]));
        assert_eq!(
            parse_expr("    f  (1,2,   4,   b     )     "),
            call("f", vec![int(1), int(2), int(4), ident("b")])
        );
        assert_eq!(parse_expr("coolfunc()"), call("coolfunc", vec![]));
        // 'fun' is only a keyword at the start of a top-level item
        assert_eq!(
            parse_expr("a + fun (a+b, not c) * 2"),
            binop(
                ident("a"),
                "+",
                binop(
                    call(
                        "fun",
                        vec![
                            binop(ident("a"), "+", ident("b")),
                            unary("unary_not", ident("c")),
                        ]
                    ),
                    "*",
                    int(2)
                )
            )
        );
    }

    #[test]
    fn test_while_parsing() {
        assert_eq!(
            parse_expr("while true do f(a)"),
            Expression::untracked(ExprKind::While {
                condition: Box::new(boolean(true)),
                body: Box::new(call("f", vec![ident("a")])),
            })
        );
    }

    #[test]
    fn test_parsing_precedence() {
        assert_eq!(
            parse_expr("4 < 5 + 7 / 6"),
            binop(int(4), "<", binop(int(5), "+", binop(int(7), "/", int(6))))
        );
        assert_eq!(
            parse_expr("4 + 3 or 2 == 7 % 5 and 2 > 2"),
            binop(
                binop(int(4), "+", int(3)),
                "or",
                binop(
                    binop(int(2), "==", binop(int(7), "%", int(5))),
                    "and",
                    binop(int(2), ">", int(2))
                )
            )
        );
    }

    #[test]
    fn test_assignment_is_right_associative() {
        assert_eq!(
            parse_expr("a = b = 5"),
            binop(ident("a"), "=", binop(ident("b"), "=", int(5)))
        );
        assert_eq!(
            parse_expr("x = 1 + 2 < 3"),
            binop(ident("x"), "=", binop(binop(int(1), "+", int(2)), "<", int(3)))
        );
    }

    #[test]
    fn test_block_parsing() {
        let source = "
{
    while f() do {
        var x: Int = 10;
        var y = if g(x) then {
            x = x + 1;
            x
        } else {
            g(x)
        }
        g(y);
    };
    123
}
";
        let var_x = Expression::untracked(ExprKind::Var {
            name: "x".to_string(),
            value: Box::new(int(10)),
            typed: true,
            declared: Type::Int,
        });
        let var_y = Expression::untracked(ExprKind::Var {
            name: "y".to_string(),
            value: Box::new(Expression::untracked(ExprKind::If {
                condition: Box::new(call("g", vec![ident("x")])),
                true_branch: Box::new(block(
                    vec![binop(ident("x"), "=", binop(ident("x"), "+", int(1)))],
                    Some(ident("x")),
                )),
                false_branch: Some(Box::new(block(vec![], Some(call("g", vec![ident("x")]))))),
            })),
            typed: false,
            declared: Type::Unit,
        });
        let loop_body = block(vec![var_x, var_y, call("g", vec![ident("y")])], None);
        let expected = block(
            vec![Expression::untracked(ExprKind::While {
                condition: Box::new(call("f", vec![])),
                body: Box::new(loop_body),
            })],
            Some(int(123)),
        );
        assert_eq!(parse_expr(source), expected);
    }

    #[test]
    fn test_optional_semicolons() {
        parse_source("{ { a } { b } }");
        parse_source("{ if true then { a } b}");
        parse_source("{ if true then { a }; b}");
        parse_source("{ if true then { a } b; c}");
        parse_source("{ if true then { a } else { b } c }");
        parse_source("{ { f(a) } { b } }");
        assert_parse_fails("{ a b }");
        assert_parse_fails("{ if true then { a } b c }");
    }

    #[test]
    fn test_trailing_tokens() {
        assert_parse_fails("1 + 2 3");
        assert_parse_fails("* 2");
        assert_parse_fails("1 2 3 4");
        assert_parse_fails("fun())");
    }

    #[test]
    fn test_var_is_not_an_operand() {
        assert_parse_fails("if var x = 2 then 1");
        assert_parse_fails("(var x = 2)");
        assert_parse_fails("f(var x = 2)");
        assert_parse_fails("x = var y = 2");
    }

    #[test]
    fn test_top_level_bundling() {
        assert_eq!(
            parse_source("1; 2; 3").expr.unwrap(),
            block(vec![int(1), int(2)], Some(int(3)))
        );
        assert_eq!(
            parse_source("1; 2;").expr.unwrap(),
            block(vec![int(1), int(2)], None)
        );
        // A single expression is not wrapped
        assert_eq!(parse_source("42").expr.unwrap(), int(42));
        // A trailing brace-terminated expression becomes the result
        assert_eq!(
            parse_source("f(); { g() }").expr.unwrap(),
            block(vec![call("f", vec![])], Some(block(vec![], Some(call("g", vec![])))))
        );
    }

    #[test]
    fn test_definition_parsing() {
        let module = parse_source("fun sq(x: Int): Int { x * x } sq(7)");
        assert_eq!(module.defs.len(), 1);
        let def = &module.defs[0];
        assert_eq!(def.name, "sq");
        assert_eq!(def.params, vec!["x".to_string()]);
        assert_eq!(def.fun_type, Type::function(vec![Type::Int], Type::Int));
        assert_eq!(
            def.body,
            block(vec![], Some(binop(ident("x"), "*", ident("x"))))
        );
        assert_eq!(module.expr.unwrap(), call("sq", vec![int(7)]));
    }

    #[test]
    fn test_definition_without_parameters() {
        let module = parse_source("fun answer(): Int { 42 } answer()");
        assert_eq!(module.defs[0].params.len(), 0);
        assert_eq!(
            module.defs[0].fun_type,
            Type::function(vec![], Type::Int)
        );
    }

    #[test]
    fn test_duplicate_parameter_names() {
        assert_parse_fails("fun f(a: Int, a: Int): Int { 1 }");
    }

    #[test]
    fn test_missing_semicolon_at_top_level() {
        assert_parse_fails("f() g()");
    }

    #[test]
    fn test_return_parsing() {
        let module = parse_source("fun f(x: Int): Int { return x; 0 } f(1)");
        match &module.defs[0].body.kind {
            ExprKind::Block { exprs, .. } => {
                assert_eq!(
                    exprs[0],
                    Expression::untracked(ExprKind::Return(Some(Box::new(ident("x")))))
                );
            }
            other => panic!("expected block body, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert_parse_fails("");
        assert_parse_fails("# only a comment");
    }

    #[test]
    fn test_parser_determinism() {
        let a = parse_source("{ var x = 1; while x < 10 do x = x + 1; x }");
        let b = parse_source("{ var x = 1; while x < 10 do x = x + 1; x }");
        assert_eq!(a, b);
    }
}
