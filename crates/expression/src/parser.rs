//! Precedence-climbing Parser

use crate::ast::{BinaryOp, Expr, Function, Literal, UnaryOp};
use crate::error::ExprError;
use crate::lexer::{tokenize, Spanned, Token};

/// Parse expression text into an untyped syntax tree
pub fn parse(source: &str) -> Result<Expr, ExprError> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        end: source.len(),
    };
    let expr = parser.parse_expr(0)?;
    if let Some(extra) = parser.tokens.get(parser.pos) {
        return Err(ExprError::parse(extra.position, "unexpected trailing input"));
    }
    Ok(expr)
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    end: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|s| &s.token)
    }

    fn position(&self) -> usize {
        self.tokens.get(self.pos).map(|s| s.position).unwrap_or(self.end)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|s| s.token.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), ExprError> {
        if self.peek() == Some(&expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(ExprError::parse(self.position(), format!("expected {}", what)))
        }
    }

    fn peek_binary(&self) -> Option<BinaryOp> {
        let op = match self.peek()? {
            Token::Plus => BinaryOp::Add,
            Token::Minus => BinaryOp::Sub,
            Token::Star => BinaryOp::Mul,
            Token::Slash => BinaryOp::Div,
            Token::Percent => BinaryOp::Rem,
            Token::EqEq => BinaryOp::Eq,
            Token::NotEq => BinaryOp::NotEq,
            Token::Lt => BinaryOp::Lt,
            Token::LtEq => BinaryOp::LtEq,
            Token::Gt => BinaryOp::Gt,
            Token::GtEq => BinaryOp::GtEq,
            Token::AndAnd => BinaryOp::And,
            Token::OrOr => BinaryOp::Or,
            _ => return None,
        };
        Some(op)
    }

    fn parse_expr(&mut self, min_precedence: u8) -> Result<Expr, ExprError> {
        let mut left = self.parse_unary()?;

        while let Some(op) = self.peek_binary() {
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.pos += 1;
            // Left associative
            let right = self.parse_expr(precedence + 1)?;
            left = Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }

        Ok(left)
    }

    fn parse_unary(&mut self) -> Result<Expr, ExprError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                Ok(match operand {
                    Expr::Literal(Literal::Int(v)) => Expr::Literal(Literal::Int(-v)),
                    Expr::Literal(Literal::Float(v)) => Expr::Literal(Literal::Float(-v)),
                    other => Expr::Unary {
                        op: UnaryOp::Neg,
                        operand: Box::new(other),
                    },
                })
            }
            Some(Token::Bang) => {
                self.pos += 1;
                let operand = self.parse_unary()?;
                Ok(Expr::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(operand),
                })
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Expr, ExprError> {
        let position = self.position();
        match self.advance() {
            Some(Token::Int(v)) => Ok(Expr::Literal(Literal::Int(v))),
            Some(Token::Float(v)) => Ok(Expr::Literal(Literal::Float(v))),
            Some(Token::Str(s)) => Ok(Expr::Literal(Literal::Str(s))),
            Some(Token::LParen) => {
                let inner = self.parse_expr(0)?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Expr::Literal(Literal::Bool(true))),
                "false" => Ok(Expr::Literal(Literal::Bool(false))),
                "null" => Ok(Expr::Literal(Literal::Null)),
                _ if self.peek() == Some(&Token::LParen) => self.parse_call(name),
                _ => Ok(Expr::Column(name)),
            },
            Some(_) => Err(ExprError::parse(position, "expected an operand")),
            None => Err(ExprError::parse(position, "unexpected end of expression")),
        }
    }

    fn parse_call(&mut self, name: String) -> Result<Expr, ExprError> {
        let func = Function::from_name(&name).ok_or(ExprError::UnknownFunction(name))?;
        self.expect(Token::LParen, "'('")?;

        let mut args = Vec::new();
        if self.peek() != Some(&Token::RParen) {
            loop {
                args.push(self.parse_expr(0)?);
                if self.peek() == Some(&Token::Comma) {
                    self.pos += 1;
                } else {
                    break;
                }
            }
        }
        self.expect(Token::RParen, "')'")?;

        let arity = func.arity();
        if !arity.accepts(args.len()) {
            return Err(ExprError::Arity {
                function: func.name(),
                expected: arity.to_string(),
                actual: args.len(),
            });
        }

        Ok(Expr::Call { func, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn col(name: &str) -> Box<Expr> {
        Box::new(Expr::Column(name.to_string()))
    }

    #[test]
    fn test_precedence() {
        let expr = parse("a + b * 2").unwrap();
        assert_eq!(
            expr,
            Expr::Binary {
                op: BinaryOp::Add,
                left: col("a"),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Mul,
                    left: col("b"),
                    right: Box::new(Expr::Literal(Literal::Int(2))),
                }),
            }
        );
    }

    #[test]
    fn test_left_associativity() {
        let expr = parse("a - b - c").unwrap();
        match expr {
            Expr::Binary { op: BinaryOp::Sub, left, right } => {
                assert!(matches!(*left, Expr::Binary { op: BinaryOp::Sub, .. }));
                assert_eq!(right, col("c"));
            }
            other => panic!("unexpected tree: {:?}", other),
        }
    }

    #[test]
    fn test_negative_literal_folded() {
        assert_eq!(parse("-3").unwrap(), Expr::Literal(Literal::Int(-3)));
    }

    #[test]
    fn test_function_call() {
        let expr = parse("coalesce(a, 0)").unwrap();
        assert!(matches!(expr, Expr::Call { func: Function::Coalesce, ref args } if args.len() == 2));
    }

    #[test]
    fn test_unknown_function() {
        assert_eq!(
            parse("frobnicate(a)").unwrap_err(),
            ExprError::UnknownFunction("frobnicate".to_string())
        );
    }

    #[test]
    fn test_wrong_arity() {
        assert!(matches!(parse("pow(a)"), Err(ExprError::Arity { function: "pow", .. })));
    }

    #[test]
    fn test_trailing_input_rejected() {
        assert!(matches!(parse("a b"), Err(ExprError::Parse { position: 2, .. })));
    }

    #[test]
    fn test_unbalanced_parens() {
        assert!(parse("(a + 1").is_err());
        assert!(parse("").is_err());
    }

    #[test]
    fn test_columns_collected() {
        let expr = parse("if(x > 0, conv_rate * val_to_add, conv_rate)").unwrap();
        let columns: Vec<_> = expr.columns().into_iter().collect();
        assert_eq!(columns, vec!["conv_rate", "val_to_add", "x"]);
    }
}
