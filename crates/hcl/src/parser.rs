//! 표현식 파서
//!
//! Terraform 구성에서 쓰이는 표현식의 부분집합을 파싱합니다.
//!
//! # 지원 문법
//! ```text
//! expr     := additive
//! additive := term (('+' | '-') term)*
//! term     := unary (('*' | '/') unary)*
//! unary    := '-' unary | postfix
//! postfix  := primary step*
//! step     := '.' ident | '.' digits | '[' '*' ']' | '[' expr ']'
//! primary  := number | string | '[' items ']' | '{' entries '}' | '(' expr ')'
//!           | ident '(' args ')' | ident
//! ```
//!
//! 문자열은 `${ expr }` 보간과 `$${` 이스케이프를 지원합니다.
//! 중첩 깊이는 [`MAX_DEPTH`]로 제한합니다.

use serde_json::{Number, Value};

use crate::ast::{BinaryOp, Expression, Step, TemplatePart, Traversal};
use crate::error::HclError;

/// 최대 중첩 깊이
pub const MAX_DEPTH: usize = 64;

/// 최대 입력 크기 (바이트)
pub const MAX_INPUT_SIZE: usize = 64 * 1024;

/// 표현식 텍스트를 파싱합니다.
///
/// # 예시
/// ```
/// use tfacc_hcl::parser::parse_expression;
///
/// let expr = parse_expression("length(var.volume_configuration)").unwrap();
/// # let _ = expr;
/// ```
pub fn parse_expression(src: &str) -> Result<Expression, HclError> {
    let mut parser = Parser::new(src)?;
    parser.skip_trivia();
    let expr = parser.expression()?;
    parser.skip_trivia();
    if let Some(c) = parser.peek() {
        return Err(parser.error(format!("unexpected '{c}' after expression")));
    }
    Ok(expr)
}

/// 따옴표 없는 템플릿 본문을 파싱합니다.
///
/// 문서 모델의 문자열 값은 논리적 내용을 담고 있으므로 백슬래시 이스케이프를
/// 해석하지 않고 `${ }` 보간만 처리합니다.
pub fn parse_template(src: &str) -> Result<Expression, HclError> {
    let mut parser = Parser::new(src)?;
    let parts = parser.template_parts(false)?;
    Ok(Expression::Template(parts))
}

struct Parser<'a> {
    src: &'a str,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Result<Self, HclError> {
        if src.len() > MAX_INPUT_SIZE {
            return Err(HclError::Parse {
                offset: 0,
                reason: format!(
                    "input too large: {} bytes (max: {MAX_INPUT_SIZE})",
                    src.len()
                ),
            });
        }
        Ok(Self {
            src,
            pos: 0,
            depth: 0,
        })
    }

    // --- 문자 단위 헬퍼 ---

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), HclError> {
        self.skip_trivia();
        if self.eat(expected) {
            Ok(())
        } else {
            match self.peek() {
                Some(c) => Err(self.error(format!("expected '{expected}', found '{c}'"))),
                None => Err(self.error(format!("expected '{expected}', found end of input"))),
            }
        }
    }

    fn error(&self, reason: String) -> HclError {
        HclError::Parse {
            offset: self.pos,
            reason,
        }
    }

    /// 공백과 주석(`#`, `//`, `/* */`)을 건너뜁니다.
    fn skip_trivia(&mut self) {
        loop {
            let rest = self.rest();
            if rest.starts_with('#') || rest.starts_with("//") {
                let end = rest.find('\n').unwrap_or(rest.len());
                self.pos += end;
            } else if rest.starts_with("/*") {
                match rest[2..].find("*/") {
                    Some(end) => self.pos += end + 4,
                    None => self.pos = self.src.len(),
                }
            } else if let Some(c) = self.peek().filter(|c| c.is_whitespace()) {
                self.pos += c.len_utf8();
            } else {
                break;
            }
        }
    }

    fn enter(&mut self) -> Result<(), HclError> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            return Err(self.error(format!("nesting deeper than {MAX_DEPTH}")));
        }
        Ok(())
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // --- 표현식 ---

    fn expression(&mut self) -> Result<Expression, HclError> {
        self.enter()?;
        let result = self.additive();
        self.leave();
        result
    }

    fn additive(&mut self) -> Result<Expression, HclError> {
        let mut lhs = self.term()?;
        loop {
            self.skip_trivia();
            let op = match self.peek() {
                Some('+') => BinaryOp::Add,
                Some('-') => BinaryOp::Sub,
                _ => return Ok(lhs),
            };
            self.bump();
            self.skip_trivia();
            let rhs = self.term()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn term(&mut self) -> Result<Expression, HclError> {
        let mut lhs = self.unary()?;
        loop {
            self.skip_trivia();
            let op = match self.peek() {
                Some('*') => BinaryOp::Mul,
                // `//` 주석과 구분
                Some('/') if self.peek_nth(1) != Some('/') && self.peek_nth(1) != Some('*') => {
                    BinaryOp::Div
                }
                _ => return Ok(lhs),
            };
            self.bump();
            self.skip_trivia();
            let rhs = self.unary()?;
            lhs = Expression::Binary {
                op,
                lhs: Box::new(lhs),
                rhs: Box::new(rhs),
            };
        }
    }

    fn unary(&mut self) -> Result<Expression, HclError> {
        self.skip_trivia();
        if self.eat('-') {
            self.enter()?;
            let inner = self.unary();
            self.leave();
            return Ok(Expression::Negate(Box::new(inner?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expression, HclError> {
        let primary = self.primary()?;
        let steps = self.steps()?;
        if steps.is_empty() {
            return Ok(primary);
        }
        Ok(match primary {
            Expression::Traversal(mut traversal) => {
                traversal.steps.extend(steps);
                Expression::Traversal(traversal)
            }
            other => Expression::Postfix {
                target: Box::new(other),
                steps,
            },
        })
    }

    fn steps(&mut self) -> Result<Vec<Step>, HclError> {
        let mut steps = Vec::new();
        loop {
            // 접근 단계 앞에는 공백을 허용하지 않습니다 (`a [0]` 은 튜플 원소가 아님).
            match self.peek() {
                Some('.') => {
                    self.bump();
                    match self.peek() {
                        Some(c) if c.is_ascii_digit() => {
                            let digits = self.take_while(|c| c.is_ascii_digit());
                            let index: u64 = digits
                                .parse()
                                .map_err(|_| self.error(format!("invalid index '.{digits}'")))?;
                            steps.push(Step::Index(Expression::Literal(Value::from(index))));
                        }
                        Some(c) if is_ident_start(c) => {
                            steps.push(Step::Attr(self.identifier()));
                        }
                        _ => return Err(self.error("expected attribute name after '.'".to_owned())),
                    }
                }
                Some('[') => {
                    self.bump();
                    self.skip_trivia();
                    if self.eat('*') {
                        self.expect(']')?;
                        steps.push(Step::Splat);
                    } else {
                        let index = self.expression()?;
                        self.expect(']')?;
                        steps.push(Step::Index(index));
                    }
                }
                _ => return Ok(steps),
            }
        }
    }

    fn primary(&mut self) -> Result<Expression, HclError> {
        self.skip_trivia();
        let Some(c) = self.peek() else {
            return Err(self.error("unexpected end of input".to_owned()));
        };
        match c {
            '"' => {
                self.bump();
                let parts = self.template_parts(true)?;
                Ok(Expression::Template(parts))
            }
            '[' => {
                self.bump();
                self.enter()?;
                let items = self.sequence(']');
                self.leave();
                Ok(Expression::Tuple(items?))
            }
            '{' => {
                self.bump();
                self.enter()?;
                let entries = self.object_entries();
                self.leave();
                Ok(Expression::Object(entries?))
            }
            '(' => {
                self.bump();
                self.skip_trivia();
                let inner = self.expression()?;
                self.expect(')')?;
                Ok(inner)
            }
            c if c.is_ascii_digit() => self.number(),
            c if is_ident_start(c) => {
                let name = self.identifier();
                match name.as_str() {
                    "true" => return Ok(Expression::Literal(Value::Bool(true))),
                    "false" => return Ok(Expression::Literal(Value::Bool(false))),
                    "null" => return Ok(Expression::Literal(Value::Null)),
                    _ => {}
                }
                if self.peek() == Some('(') {
                    self.bump();
                    self.enter()?;
                    let args = self.sequence(')');
                    self.leave();
                    return Ok(Expression::Call { name, args: args? });
                }
                Ok(Expression::Traversal(Traversal {
                    root: name,
                    steps: Vec::new(),
                }))
            }
            other => Err(self.error(format!("unexpected '{other}'"))),
        }
    }

    /// 쉼표로 구분된 표현식 목록 (끝의 쉼표 허용)
    fn sequence(&mut self, close: char) -> Result<Vec<Expression>, HclError> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat(close) {
                return Ok(items);
            }
            items.push(self.expression()?);
            self.skip_trivia();
            if self.eat(',') {
                continue;
            }
            self.expect(close)?;
            return Ok(items);
        }
    }

    /// `{ k = v, k2 = v2 }` 또는 줄바꿈 구분 항목
    fn object_entries(&mut self) -> Result<Vec<(String, Expression)>, HclError> {
        let mut entries = Vec::new();
        loop {
            self.skip_trivia();
            if self.eat('}') {
                return Ok(entries);
            }
            let key = match self.peek() {
                Some('"') => {
                    self.bump();
                    let parts = self.template_parts(true)?;
                    match parts.as_slice() {
                        [] => String::new(),
                        [TemplatePart::Literal(s)] => s.clone(),
                        _ => {
                            return Err(
                                self.error("object keys must not be interpolated".to_owned())
                            );
                        }
                    }
                }
                Some(c) if is_ident_start(c) => self.identifier(),
                _ => return Err(self.error("expected object key".to_owned())),
            };
            self.skip_trivia();
            if !(self.eat('=') || self.eat(':')) {
                return Err(self.error(format!("expected '=' after key '{key}'")));
            }
            self.skip_trivia();
            let value = self.expression()?;
            entries.push((key, value));
            self.skip_trivia();
            self.eat(',');
        }
    }

    fn number(&mut self) -> Result<Expression, HclError> {
        let start = self.pos;
        self.take_while(|c| c.is_ascii_digit());
        let mut is_float = false;
        if self.peek() == Some('.') && self.peek_nth(1).is_some_and(|c| c.is_ascii_digit()) {
            is_float = true;
            self.bump();
            self.take_while(|c| c.is_ascii_digit());
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            is_float = true;
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if self.take_while(|c| c.is_ascii_digit()).is_empty() {
                return Err(self.error("missing exponent digits".to_owned()));
            }
        }
        let text = &self.src[start..self.pos];
        let value = if is_float {
            let f: f64 = text
                .parse()
                .map_err(|_| self.error(format!("invalid number '{text}'")))?;
            Number::from_f64(f)
                .map(Value::Number)
                .ok_or_else(|| self.error(format!("number out of range '{text}'")))?
        } else {
            let i: i64 = text
                .parse()
                .map_err(|_| self.error(format!("integer out of range '{text}'")))?;
            Value::from(i)
        };
        Ok(Expression::Literal(value))
    }

    fn identifier(&mut self) -> String {
        self.take_while(is_ident_continue).to_owned()
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.pos;
        while let Some(c) = self.peek().filter(|c| pred(*c)) {
            self.pos += c.len_utf8();
        }
        &self.src[start..self.pos]
    }

    // --- 템플릿 ---

    /// 템플릿 조각을 읽습니다.
    ///
    /// `quoted`이면 여는 따옴표 직후에서 시작해 닫는 따옴표를 소비하고 멈추며
    /// 백슬래시 이스케이프를 해석합니다. 아니면 입력 끝까지 읽습니다.
    fn template_parts(&mut self, quoted: bool) -> Result<Vec<TemplatePart>, HclError> {
        let mut parts = Vec::new();
        let mut literal = String::new();
        loop {
            let Some(c) = self.peek() else {
                if quoted {
                    return Err(self.error("unterminated string".to_owned()));
                }
                break;
            };
            match c {
                '"' if quoted => {
                    self.bump();
                    break;
                }
                '\n' if quoted => {
                    return Err(self.error("newline in quoted string".to_owned()));
                }
                '\\' if quoted => {
                    self.bump();
                    literal.push(self.escape()?);
                }
                '$' if self.rest().starts_with("$${") => {
                    self.pos += 3;
                    literal.push_str("${");
                }
                '$' if self.rest().starts_with("${") => {
                    self.pos += 2;
                    if !literal.is_empty() {
                        parts.push(TemplatePart::Literal(std::mem::take(&mut literal)));
                    }
                    self.skip_trivia();
                    self.eat('~');
                    let expr = self.expression()?;
                    self.skip_trivia();
                    self.eat('~');
                    self.expect('}')?;
                    parts.push(TemplatePart::Interpolation(expr));
                }
                _ => {
                    self.bump();
                    literal.push(c);
                }
            }
        }
        if !literal.is_empty() {
            parts.push(TemplatePart::Literal(literal));
        }
        Ok(parts)
    }

    fn escape(&mut self) -> Result<char, HclError> {
        let Some(c) = self.bump() else {
            return Err(self.error("unterminated escape".to_owned()));
        };
        Ok(match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '"' => '"',
            '\\' => '\\',
            'u' => {
                let start = self.pos;
                for _ in 0..4 {
                    match self.bump() {
                        Some(h) if h.is_ascii_hexdigit() => {}
                        _ => return Err(self.error("invalid \\u escape".to_owned())),
                    }
                }
                let code = u32::from_str_radix(&self.src[start..self.pos], 16)
                    .map_err(|_| self.error("invalid \\u escape".to_owned()))?;
                char::from_u32(code).ok_or_else(|| self.error("invalid code point".to_owned()))?
            }
            other => return Err(self.error(format!("unknown escape '\\{other}'"))),
        })
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '-'
}
