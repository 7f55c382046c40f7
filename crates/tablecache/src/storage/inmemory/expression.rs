//! A small evaluator for the table expression language.
//!
//! Supports condition expressions built from `=`, `<>`, `<`, `<=`, `>`, `>=`,
//! `BETWEEN`, `begins_with`, `attribute_exists` and `attribute_not_exists`
//! joined by `AND`, plus `SET` / `REMOVE` update expressions with optional
//! `+` / `-` arithmetic. Attribute paths are top-level names only. Anything
//! else is rejected with [`StoreError::InvalidExpression`].

use std::cmp::Ordering;

use serde_json::{Number, Value};

use tablecache_core::storage::{AttributeNames, Item, Result, StoreError};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Name(String),
    Placeholder(String),
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Plus,
    Minus,
    LParen,
    RParen,
    Comma,
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::InvalidExpression(message.into())
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn tokenize(expression: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = expression.chars().peekable();

    while let Some(c) = chars.next() {
        let token = match c {
            c if c.is_whitespace() => continue,
            '=' => Token::Eq,
            '<' => match chars.peek() {
                Some('>') => {
                    chars.next();
                    Token::Ne
                }
                Some('=') => {
                    chars.next();
                    Token::Le
                }
                _ => Token::Lt,
            },
            '>' => match chars.peek() {
                Some('=') => {
                    chars.next();
                    Token::Ge
                }
                _ => Token::Gt,
            },
            '+' => Token::Plus,
            '-' => Token::Minus,
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '#' | ':' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek().filter(|n| is_word_char(**n)) {
                    word.push(next);
                    chars.next();
                }
                if word.len() == 1 {
                    return Err(invalid(format!("Empty placeholder '{c}' in expression")));
                }
                if c == '#' {
                    Token::Name(word)
                } else {
                    Token::Placeholder(word)
                }
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut word = String::from(c);
                while let Some(&next) = chars.peek().filter(|n| is_word_char(**n)) {
                    word.push(next);
                    chars.next();
                }
                Token::Ident(word)
            }
            other => {
                return Err(invalid(format!(
                    "Unexpected character '{other}' in expression"
                )))
            }
        };
        tokens.push(token);
    }

    Ok(tokens)
}

/// Either an attribute reference or a literal bound through a `:value`.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum Operand {
    Path(String),
    Literal(Value),
}

impl Operand {
    fn resolve<'a>(&'a self, item: &'a Item) -> Option<&'a Value> {
        match self {
            Operand::Path(name) => item.get(name),
            Operand::Literal(value) => Some(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum Comparator {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A parsed condition, key condition or filter expression.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum ConditionExpr {
    Compare {
        left: Operand,
        comparator: Comparator,
        right: Operand,
    },
    Between {
        operand: Operand,
        low: Operand,
        high: Operand,
    },
    BeginsWith {
        operand: Operand,
        prefix: Operand,
    },
    AttributeExists(String),
    AttributeNotExists(String),
    And(Vec<ConditionExpr>),
}

impl ConditionExpr {
    /// Evaluates the condition against `item`. Missing attributes make
    /// comparisons false.
    pub(super) fn evaluate(&self, item: &Item) -> bool {
        match self {
            ConditionExpr::Compare {
                left,
                comparator,
                right,
            } => match (left.resolve(item), right.resolve(item)) {
                (Some(a), Some(b)) => {
                    let ordering = compare_values(a, b);
                    match comparator {
                        Comparator::Eq => ordering == Some(Ordering::Equal),
                        Comparator::Ne => ordering != Some(Ordering::Equal),
                        Comparator::Lt => ordering == Some(Ordering::Less),
                        Comparator::Le => {
                            matches!(ordering, Some(Ordering::Less | Ordering::Equal))
                        }
                        Comparator::Gt => ordering == Some(Ordering::Greater),
                        Comparator::Ge => {
                            matches!(ordering, Some(Ordering::Greater | Ordering::Equal))
                        }
                    }
                }
                _ => false,
            },
            ConditionExpr::Between { operand, low, high } => {
                match (operand.resolve(item), low.resolve(item), high.resolve(item)) {
                    (Some(v), Some(lo), Some(hi)) => {
                        matches!(
                            compare_values(lo, v),
                            Some(Ordering::Less | Ordering::Equal)
                        ) && matches!(
                            compare_values(v, hi),
                            Some(Ordering::Less | Ordering::Equal)
                        )
                    }
                    _ => false,
                }
            }
            ConditionExpr::BeginsWith { operand, prefix } => {
                match (operand.resolve(item), prefix.resolve(item)) {
                    (Some(Value::String(s)), Some(Value::String(p))) => s.starts_with(p.as_str()),
                    _ => false,
                }
            }
            ConditionExpr::AttributeExists(name) => item.contains_key(name),
            ConditionExpr::AttributeNotExists(name) => !item.contains_key(name),
            ConditionExpr::And(terms) => terms.iter().all(|term| term.evaluate(item)),
        }
    }

    /// Checks that a key condition pins `attribute` with an equality test.
    pub(super) fn require_equality_on(&self, attribute: &str) -> Result<()> {
        if self.has_equality_on(attribute) {
            Ok(())
        } else {
            Err(invalid(format!(
                "Query key condition must specify an equality condition on '{attribute}'"
            )))
        }
    }

    fn has_equality_on(&self, attribute: &str) -> bool {
        match self {
            ConditionExpr::Compare {
                left,
                comparator: Comparator::Eq,
                right,
            } => match (left, right) {
                (Operand::Path(name), Operand::Literal(_))
                | (Operand::Literal(_), Operand::Path(name)) => name == attribute,
                _ => false,
            },
            ConditionExpr::And(terms) => terms.iter().any(|t| t.has_equality_on(attribute)),
            _ => false,
        }
    }
}

/// Right-hand side of a `SET` action.
#[derive(Debug, Clone, PartialEq)]
pub(super) enum SetValue {
    Operand(Operand),
    Sum(Operand, Operand),
    Difference(Operand, Operand),
}

#[derive(Debug, Clone, PartialEq)]
pub(super) enum UpdateAction {
    Set { attribute: String, value: SetValue },
    Remove(String),
}

impl UpdateAction {
    pub(super) fn attribute(&self) -> &str {
        match self {
            UpdateAction::Set { attribute, .. } | UpdateAction::Remove(attribute) => attribute,
        }
    }
}

struct Parser<'a> {
    tokens: Vec<Token>,
    pos: usize,
    names: &'a AttributeNames,
    values: &'a Item,
}

impl<'a> Parser<'a> {
    fn new(expression: &str, names: &'a AttributeNames, values: &'a Item) -> Result<Self> {
        let tokens = tokenize(expression)?;
        if tokens.is_empty() {
            return Err(invalid("Expression must not be empty"));
        }
        Ok(Self {
            tokens,
            pos: 0,
            names,
            values,
        })
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn expect(&mut self, expected: Token) -> Result<()> {
        match self.next() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(invalid(format!(
                "Expected {expected:?} but found {token:?}"
            ))),
            None => Err(invalid(format!("Expected {expected:?} at end of expression"))),
        }
    }

    fn peek_keyword(&self, keyword: &str) -> bool {
        matches!(self.peek(), Some(Token::Ident(word)) if word.eq_ignore_ascii_case(keyword))
    }

    fn finish(&self) -> Result<()> {
        match self.peek() {
            None => Ok(()),
            Some(token) => Err(invalid(format!("Unexpected token {token:?}"))),
        }
    }

    fn path(&mut self) -> Result<String> {
        match self.next() {
            Some(Token::Ident(word)) if is_reserved(&word) => {
                Err(invalid(format!("'{word}' is not a valid attribute name here")))
            }
            Some(Token::Ident(word)) => Ok(word),
            Some(Token::Name(placeholder)) => {
                self.names.get(&placeholder).cloned().ok_or_else(|| {
                    invalid(format!("Undefined attribute name placeholder {placeholder}"))
                })
            }
            Some(token) => Err(invalid(format!("Expected attribute name, found {token:?}"))),
            None => Err(invalid("Expected attribute name at end of expression")),
        }
    }

    fn operand(&mut self) -> Result<Operand> {
        match self.peek() {
            Some(Token::Placeholder(placeholder)) => {
                let value = self.values.get(placeholder).cloned().ok_or_else(|| {
                    invalid(format!("Undefined attribute value placeholder {placeholder}"))
                })?;
                self.pos += 1;
                Ok(Operand::Literal(value))
            }
            _ => self.path().map(Operand::Path),
        }
    }

    fn condition(&mut self) -> Result<ConditionExpr> {
        let mut terms = vec![self.term()?];
        while self.peek_keyword("AND") {
            self.pos += 1;
            terms.push(self.term()?);
        }

        Ok(if terms.len() == 1 {
            terms.remove(0)
        } else {
            ConditionExpr::And(terms)
        })
    }

    fn term(&mut self) -> Result<ConditionExpr> {
        if self.peek() == Some(&Token::LParen) {
            self.pos += 1;
            let inner = self.condition()?;
            self.expect(Token::RParen)?;
            return Ok(inner);
        }

        if let (Some(Token::Ident(word)), Some(Token::LParen)) = (self.peek(), self.peek_at(1)) {
            let function = word.clone();
            self.pos += 2;
            let expr = match function.as_str() {
                "begins_with" => {
                    let operand = self.operand()?;
                    self.expect(Token::Comma)?;
                    let prefix = self.operand()?;
                    ConditionExpr::BeginsWith { operand, prefix }
                }
                "attribute_exists" => ConditionExpr::AttributeExists(self.path()?),
                "attribute_not_exists" => ConditionExpr::AttributeNotExists(self.path()?),
                other => return Err(invalid(format!("Unsupported function '{other}'"))),
            };
            self.expect(Token::RParen)?;
            return Ok(expr);
        }

        let left = self.operand()?;

        if self.peek_keyword("BETWEEN") {
            self.pos += 1;
            let low = self.operand()?;
            if !self.peek_keyword("AND") {
                return Err(invalid("BETWEEN requires 'AND' between its bounds"));
            }
            self.pos += 1;
            let high = self.operand()?;
            return Ok(ConditionExpr::Between {
                operand: left,
                low,
                high,
            });
        }

        let comparator = match self.next() {
            Some(Token::Eq) => Comparator::Eq,
            Some(Token::Ne) => Comparator::Ne,
            Some(Token::Lt) => Comparator::Lt,
            Some(Token::Le) => Comparator::Le,
            Some(Token::Gt) => Comparator::Gt,
            Some(Token::Ge) => Comparator::Ge,
            Some(token) => return Err(invalid(format!("Expected comparator, found {token:?}"))),
            None => return Err(invalid("Expected comparator at end of expression")),
        };
        let right = self.operand()?;

        Ok(ConditionExpr::Compare {
            left,
            comparator,
            right,
        })
    }

    fn update(&mut self) -> Result<Vec<UpdateAction>> {
        let mut actions = Vec::new();

        while !self.at_end() {
            let clause = match self.next() {
                Some(Token::Ident(word)) => word.to_ascii_uppercase(),
                Some(token) => {
                    return Err(invalid(format!("Expected update clause, found {token:?}")))
                }
                None => break,
            };

            match clause.as_str() {
                "SET" => loop {
                    let attribute = self.path()?;
                    self.expect(Token::Eq)?;
                    let value = self.set_value()?;
                    actions.push(UpdateAction::Set { attribute, value });
                    if self.peek() != Some(&Token::Comma) {
                        break;
                    }
                    self.pos += 1;
                },
                "REMOVE" => loop {
                    actions.push(UpdateAction::Remove(self.path()?));
                    if self.peek() != Some(&Token::Comma) {
                        break;
                    }
                    self.pos += 1;
                },
                other => return Err(invalid(format!("Unsupported update clause '{other}'"))),
            }
        }

        Ok(actions)
    }

    fn set_value(&mut self) -> Result<SetValue> {
        let first = self.operand()?;
        match self.peek() {
            Some(Token::Plus) => {
                self.pos += 1;
                Ok(SetValue::Sum(first, self.operand()?))
            }
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(SetValue::Difference(first, self.operand()?))
            }
            _ => Ok(SetValue::Operand(first)),
        }
    }

    fn projection(&mut self) -> Result<Vec<String>> {
        let mut attributes = vec![self.path()?];
        while self.peek() == Some(&Token::Comma) {
            self.pos += 1;
            attributes.push(self.path()?);
        }
        Ok(attributes)
    }
}

fn is_reserved(word: &str) -> bool {
    ["AND", "OR", "NOT", "BETWEEN", "IN", "SET", "REMOVE", "ADD", "DELETE"]
        .iter()
        .any(|reserved| word.eq_ignore_ascii_case(reserved))
}

/// Parses a condition, key condition or filter expression.
pub(super) fn parse_condition(
    expression: &str,
    names: &AttributeNames,
    values: &Item,
) -> Result<ConditionExpr> {
    let mut parser = Parser::new(expression, names, values)?;
    let condition = parser.condition()?;
    parser.finish()?;
    Ok(condition)
}

/// Parses an update expression into its actions, in order.
pub(super) fn parse_update(
    expression: &str,
    names: &AttributeNames,
    values: &Item,
) -> Result<Vec<UpdateAction>> {
    let mut parser = Parser::new(expression, names, values)?;
    parser.update()
}

/// Parses a projection expression into the attribute names it selects.
pub(super) fn parse_projection(expression: &str, names: &AttributeNames) -> Result<Vec<String>> {
    let values = Item::new();
    let mut parser = Parser::new(expression, names, &values)?;
    let attributes = parser.projection()?;
    parser.finish()?;
    Ok(attributes)
}

/// Applies `actions` to `item`. Right-hand sides read the item as it was
/// before the update.
pub(super) fn apply_update(item: &mut Item, actions: &[UpdateAction]) -> Result<()> {
    let original = item.clone();

    for action in actions {
        match action {
            UpdateAction::Set { attribute, value } => {
                let resolved = match value {
                    SetValue::Operand(operand) => resolve_required(operand, &original)?.clone(),
                    SetValue::Sum(a, b) => arithmetic(
                        resolve_required(a, &original)?,
                        resolve_required(b, &original)?,
                        false,
                    )?,
                    SetValue::Difference(a, b) => arithmetic(
                        resolve_required(a, &original)?,
                        resolve_required(b, &original)?,
                        true,
                    )?,
                };
                item.insert(attribute.clone(), resolved);
            }
            UpdateAction::Remove(attribute) => {
                item.remove(attribute);
            }
        }
    }

    Ok(())
}

fn resolve_required<'a>(operand: &'a Operand, item: &'a Item) -> Result<&'a Value> {
    operand.resolve(item).ok_or_else(|| {
        invalid("The provided expression refers to an attribute that does not exist in the item")
    })
}

fn arithmetic(a: &Value, b: &Value, subtract: bool) -> Result<Value> {
    let (Value::Number(x), Value::Number(y)) = (a, b) else {
        return Err(invalid(
            "An operand in the update expression has an incorrect data type",
        ));
    };

    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        let result = if subtract {
            x.checked_sub(y)
        } else {
            x.checked_add(y)
        };
        if let Some(result) = result {
            return Ok(Value::Number(result.into()));
        }
    }

    let (x, y) = (x.as_f64().unwrap_or(0.0), y.as_f64().unwrap_or(0.0));
    let result = if subtract { x - y } else { x + y };
    Number::from_f64(result)
        .map(Value::Number)
        .ok_or_else(|| invalid("Numeric overflow in update expression"))
}

/// Orders two attribute values the way the table store does: numbers
/// numerically, strings lexicographically. Values of different types only
/// compare as equal when identical.
pub(super) fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => match (x.as_i64(), y.as_i64()) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => x.as_f64()?.partial_cmp(&y.as_f64()?),
        },
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (a, b) if a == b => Some(Ordering::Equal),
        _ => None,
    }
}
