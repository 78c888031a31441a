//! Formula Expressions
//!
//! 관리자가 정의하는 계산식 (`[calc:name]` shortcode에서 사용)
//!
//! # Grammar
//!
//! ```text
//! expr   := term (('+' | '-') term)*
//! term   := unary (('*' | '/') unary)*
//! unary  := '-' unary | atom
//! atom   := NUMBER | IDENT | '(' expr ')'
//! ```
//!
//! 변수는 계산 결과 필드 (`annual_savings`, `investment_cost`, ...)
//!
//! 괄호/단항 중첩은 `MAX_DEPTH`, 토큰 수는 `MAX_TOKENS` 까지만 허용
//! (파싱/평가가 재귀이므로 트리 깊이에 상한이 필요)

use std::collections::HashMap;

use thiserror::Error;

/// 괄호 + 단항 마이너스 최대 중첩
pub const MAX_DEPTH: usize = 64;

/// 식 하나의 최대 토큰 수
pub const MAX_TOKENS: usize = 512;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FormulaError {
    #[error("Unexpected character '{0}' at {1}")]
    UnexpectedChar(char, usize),

    #[error("Unexpected end of expression")]
    UnexpectedEnd,

    #[error("Unexpected token at {0}")]
    UnexpectedToken(usize),

    #[error("Unknown variable: {0}")]
    UnknownVariable(String),

    #[error("Division by zero")]
    DivisionByZero,

    #[error("Expression is empty")]
    Empty,

    #[error("Expression nests deeper than {0} levels")]
    TooDeep(usize),

    #[error("Expression has more than {0} tokens")]
    TooLong(usize),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
}

/// 파싱된 식
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Number(f64),
    Var(String),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, FormulaError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '+' => tokens.push((Token::Plus, start)),
            '-' => tokens.push((Token::Minus, start)),
            '*' => tokens.push((Token::Star, start)),
            '/' => tokens.push((Token::Slash, start)),
            '(' => tokens.push((Token::LParen, start)),
            ')' => tokens.push((Token::RParen, start)),
            c if c.is_ascii_digit() || c == '.' => {
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| FormulaError::UnexpectedChar(c, start))?;
                tokens.push((Token::Number(value), start));
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let name: String = chars[start..i].iter().collect();
                tokens.push((Token::Ident(name), start));
                continue;
            }
            other => return Err(FormulaError::UnexpectedChar(other, start)),
        }
        i += 1;
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    depth: usize,
}

impl Parser {
    fn descend(&mut self) -> Result<(), FormulaError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(FormulaError::TooDeep(MAX_DEPTH));
        }
        Ok(())
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Option<(Token, usize)> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn expr(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, FormulaError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, FormulaError> {
        if let Some(Token::Minus) = self.peek() {
            self.pos += 1;
            self.descend()?;
            let inner = self.unary()?;
            self.depth -= 1;
            return Ok(Expr::Neg(Box::new(inner)));
        }
        self.atom()
    }

    fn atom(&mut self) -> Result<Expr, FormulaError> {
        match self.next() {
            Some((Token::Number(n), _)) => Ok(Expr::Number(n)),
            Some((Token::Ident(name), _)) => Ok(Expr::Var(name)),
            Some((Token::LParen, _)) => {
                self.descend()?;
                let inner = self.expr()?;
                self.depth -= 1;
                match self.next() {
                    Some((Token::RParen, _)) => Ok(inner),
                    Some((_, at)) => Err(FormulaError::UnexpectedToken(at)),
                    None => Err(FormulaError::UnexpectedEnd),
                }
            }
            Some((_, at)) => Err(FormulaError::UnexpectedToken(at)),
            None => Err(FormulaError::UnexpectedEnd),
        }
    }
}

/// 식 파싱
pub fn parse(source: &str) -> Result<Expr, FormulaError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(FormulaError::Empty);
    }
    if tokens.len() > MAX_TOKENS {
        return Err(FormulaError::TooLong(MAX_TOKENS));
    }

    let mut parser = Parser {
        tokens,
        pos: 0,
        depth: 0,
    };
    let expr = parser.expr()?;

    match parser.tokens.get(parser.pos) {
        Some((_, at)) => Err(FormulaError::UnexpectedToken(*at)),
        None => Ok(expr),
    }
}

impl Expr {
    pub fn eval(&self, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
        match self {
            Expr::Number(n) => Ok(*n),
            Expr::Var(name) => vars
                .get(name)
                .copied()
                .ok_or_else(|| FormulaError::UnknownVariable(name.clone())),
            Expr::Neg(inner) => Ok(-inner.eval(vars)?),
            Expr::Binary(op, left, right) => {
                let l = left.eval(vars)?;
                let r = right.eval(vars)?;
                match op {
                    BinOp::Add => Ok(l + r),
                    BinOp::Sub => Ok(l - r),
                    BinOp::Mul => Ok(l * r),
                    BinOp::Div if r == 0.0 => Err(FormulaError::DivisionByZero),
                    BinOp::Div => Ok(l / r),
                }
            }
        }
    }

    fn collect_vars<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Expr::Number(_) => {}
            Expr::Var(name) => out.push(name),
            Expr::Neg(inner) => inner.collect_vars(out),
            Expr::Binary(_, l, r) => {
                l.collect_vars(out);
                r.collect_vars(out);
            }
        }
    }
}

/// 파싱 + 평가
pub fn evaluate(source: &str, vars: &HashMap<String, f64>) -> Result<f64, FormulaError> {
    parse(source)?.eval(vars)
}

/// 저장 전 검증: 문법 + 알려진 변수만 사용하는지
pub fn validate(source: &str, known_vars: &[&str]) -> Result<(), FormulaError> {
    let expr = parse(source)?;
    let mut used = Vec::new();
    expr.collect_vars(&mut used);

    match used.into_iter().find(|name| !known_vars.contains(name)) {
        Some(unknown) => Err(FormulaError::UnknownVariable(unknown.to_string())),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars() -> HashMap<String, f64> {
        HashMap::from([
            ("annual_savings".to_string(), 1500.0),
            ("investment_cost".to_string(), 45_000.0),
        ])
    }

    #[test]
    fn test_precedence_and_parens() {
        assert_eq!(evaluate("1 + 2 * 3", &vars()).unwrap(), 7.0);
        assert_eq!(evaluate("(1 + 2) * 3", &vars()).unwrap(), 9.0);
        assert_eq!(evaluate("-2 * -3", &vars()).unwrap(), 6.0);
        assert_eq!(evaluate("10 - 4 - 3", &vars()).unwrap(), 3.0);
    }

    #[test]
    fn test_variables() {
        assert_eq!(evaluate("annual_savings * 20", &vars()).unwrap(), 30_000.0);
        assert_eq!(
            evaluate("investment_cost / annual_savings", &vars()).unwrap(),
            30.0
        );
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            evaluate("unknown + 1", &vars()),
            Err(FormulaError::UnknownVariable("unknown".to_string()))
        );
        assert_eq!(evaluate("1 / (2 - 2)", &vars()), Err(FormulaError::DivisionByZero));
        assert_eq!(evaluate("", &vars()), Err(FormulaError::Empty));
        assert_eq!(evaluate("(1 + 2", &vars()), Err(FormulaError::UnexpectedEnd));
        assert_eq!(evaluate("1 2", &vars()), Err(FormulaError::UnexpectedToken(2)));
        assert_eq!(evaluate("1 % 2", &vars()), Err(FormulaError::UnexpectedChar('%', 2)));
    }

    #[test]
    fn test_validate_known_vars() {
        assert!(validate("annual_savings * 10", &["annual_savings"]).is_ok());
        assert_eq!(
            validate("annual_savings * rate", &["annual_savings"]),
            Err(FormulaError::UnknownVariable("rate".to_string()))
        );
    }

    #[test]
    fn test_deep_nesting_is_rejected() {
        let nested = |n: usize| format!("{}1{}", "(".repeat(n), ")".repeat(n));
        assert_eq!(evaluate(&nested(MAX_DEPTH), &vars()).unwrap(), 1.0);
        assert_eq!(
            validate(&nested(MAX_DEPTH + 1), &[]),
            Err(FormulaError::TooDeep(MAX_DEPTH))
        );
        assert_eq!(
            validate(&"-".repeat(MAX_DEPTH + 1), &[]),
            Err(FormulaError::TooDeep(MAX_DEPTH))
        );

        // 스택을 넘길 만큼 깊은 입력도 에러로 끝남
        let huge = format!("{}1{}", "(".repeat(200_000), ")".repeat(200_000));
        assert!(validate(&huge, &[]).is_err());
    }

    #[test]
    fn test_long_chain_is_rejected() {
        let chain = vec!["1"; MAX_TOKENS].join("+");
        assert_eq!(validate(&chain, &[]), Err(FormulaError::TooLong(MAX_TOKENS)));

        let short = vec!["1"; 100].join(" + ");
        assert_eq!(evaluate(&short, &vars()).unwrap(), 100.0);
    }
}
