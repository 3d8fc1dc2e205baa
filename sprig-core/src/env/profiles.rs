use std::fmt;

use crate::error::{ContainerError, ContainerResult};

/// profile 表达式，例如 `prod & (eu | us)`、`!test`
///
/// 同一层括号内不能混用 `&` 与 `|`。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileExpression {
    Profile(String),
    Not(Box<ProfileExpression>),
    And(Vec<ProfileExpression>),
    Or(Vec<ProfileExpression>),
}

impl ProfileExpression {
    pub fn parse(expression: &str) -> ContainerResult<Self> {
        let tokens = tokenize(expression);
        if tokens.is_empty() {
            return Err(malformed(expression, "must contain text"));
        }
        let mut parser = Parser {
            expression,
            tokens,
            pos: 0,
        };
        parser.group(false)
    }

    pub fn matches(&self, is_active: &dyn Fn(&str) -> bool) -> bool {
        match self {
            ProfileExpression::Profile(name) => is_active(name),
            ProfileExpression::Not(inner) => !inner.matches(is_active),
            ProfileExpression::And(items) => items.iter().all(|e| e.matches(is_active)),
            ProfileExpression::Or(items) => items.iter().any(|e| e.matches(is_active)),
        }
    }
}

impl fmt::Display for ProfileExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileExpression::Profile(name) => write!(f, "{}", name),
            ProfileExpression::Not(inner) => write!(f, "!{}", inner),
            ProfileExpression::And(items) => write!(f, "({})", join(items, " & ")),
            ProfileExpression::Or(items) => write!(f, "({})", join(items, " | ")),
        }
    }
}

fn join(items: &[ProfileExpression], op: &str) -> String {
    items.iter().map(ToString::to_string).collect::<Vec<_>>().join(op)
}

/// 一组 profile 表达式，任一匹配即接受
#[derive(Debug, Clone)]
pub struct Profiles {
    expressions: Vec<ProfileExpression>,
}

impl Profiles {
    pub fn of(expressions: &[&str]) -> ContainerResult<Self> {
        if expressions.is_empty() {
            return Err(ContainerError::IllegalArgument(
                "Must specify at least one profile expression".to_string(),
            ));
        }
        let expressions = expressions
            .iter()
            .map(|e| ProfileExpression::parse(e))
            .collect::<ContainerResult<Vec<_>>>()?;
        Ok(Self { expressions })
    }

    pub fn matches(&self, is_active: &dyn Fn(&str) -> bool) -> bool {
        self.expressions.iter().any(|e| e.matches(is_active))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Open,
    Close,
    And,
    Or,
    Not,
    Name(String),
}

fn tokenize(expression: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut name = String::new();
    let flush = |name: &mut String, tokens: &mut Vec<Token>| {
        if !name.is_empty() {
            tokens.push(Token::Name(std::mem::take(name)));
        }
    };
    for c in expression.chars() {
        let token = match c {
            '(' => Some(Token::Open),
            ')' => Some(Token::Close),
            '&' => Some(Token::And),
            '|' => Some(Token::Or),
            '!' => Some(Token::Not),
            c if c.is_whitespace() => None,
            c => {
                name.push(c);
                continue;
            }
        };
        flush(&mut name, &mut tokens);
        if let Some(token) = token {
            tokens.push(token);
        }
    }
    flush(&mut name, &mut tokens);
    tokens
}

fn malformed(expression: &str, reason: &str) -> ContainerError {
    ContainerError::IllegalArgument(format!("Malformed profile expression [{}]: {}", expression, reason))
}

struct Parser<'a> {
    expression: &'a str,
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser<'_> {
    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn group(&mut self, in_parens: bool) -> ContainerResult<ProfileExpression> {
        let mut operands = vec![self.operand()?];
        let mut operator: Option<Token> = None;
        loop {
            match self.next() {
                None if in_parens => return Err(malformed(self.expression, "missing ')'")),
                None => break,
                Some(Token::Close) if in_parens => break,
                Some(Token::Close) => return Err(malformed(self.expression, "unexpected ')'")),
                Some(op @ (Token::And | Token::Or)) => {
                    if operator.as_ref().is_some_and(|existing| *existing != op) {
                        return Err(malformed(self.expression, "mixing '&' and '|' requires parentheses"));
                    }
                    operator = Some(op);
                    operands.push(self.operand()?);
                }
                Some(_) => return Err(malformed(self.expression, "expected an operator")),
            }
        }
        Ok(match operator {
            None => operands.remove(0),
            Some(Token::And) => ProfileExpression::And(operands),
            Some(_) => ProfileExpression::Or(operands),
        })
    }

    fn operand(&mut self) -> ContainerResult<ProfileExpression> {
        match self.next() {
            Some(Token::Name(name)) => Ok(ProfileExpression::Profile(name)),
            Some(Token::Not) => Ok(ProfileExpression::Not(Box::new(self.operand()?))),
            Some(Token::Open) => self.group(true),
            _ => Err(malformed(self.expression, "expected a profile name")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn active(names: &'static [&'static str]) -> impl Fn(&str) -> bool {
        move |p| names.iter().any(|n| *n == p)
    }

    #[test]
    fn test_simple_and_negated() {
        let profiles = Profiles::of(&["dev", "!prod"]).unwrap();
        assert!(profiles.matches(&active(&[])));
        assert!(!profiles.matches(&active(&["prod"])));
        assert!(profiles.matches(&active(&["prod", "dev"])));
    }

    #[test]
    fn test_compound_expressions() {
        let expr = ProfileExpression::parse("prod & (eu | us)").unwrap();
        assert!(expr.matches(&active(&["prod", "us"])));
        assert!(!expr.matches(&active(&["prod"])));
        assert!(!expr.matches(&active(&["eu"])));

        let negated = ProfileExpression::parse("!(a & b)").unwrap();
        assert!(negated.matches(&active(&["a"])));
        assert!(!negated.matches(&active(&["a", "b"])));
    }

    #[test]
    fn test_malformed_expressions() {
        assert!(ProfileExpression::parse("a & b | c").is_err());
        assert!(ProfileExpression::parse("(a & b").is_err());
        assert!(ProfileExpression::parse("a b").is_err());
        assert!(ProfileExpression::parse("   ").is_err());
        assert!(ProfileExpression::parse("a & (b | c)").is_ok());
    }
}
