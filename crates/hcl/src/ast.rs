//! 표현식 AST
//!
//! [`parser`](crate::parser)가 만들고 [`eval`](crate::eval)과
//! [`validate`](crate::validate)가 소비합니다.

use serde_json::Value;

/// 표현식
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// `null`, `true`, 숫자 리터럴
    Literal(Value),
    /// 문자열 템플릿 (`"a-${var.b}"`). 보간이 없는 문자열도 템플릿입니다.
    Template(Vec<TemplatePart>),
    /// `[a, b]`
    Tuple(Vec<Expression>),
    /// `{ k = v }`
    Object(Vec<(String, Expression)>),
    /// 식별자로 시작하는 참조 (`var.x`, `data.t.n.names[0]`)
    Traversal(Traversal),
    /// 임의 표현식 뒤의 접근 (`element(l, 0).id`, `(x)[0]`)
    Postfix {
        /// 대상
        target: Box<Expression>,
        /// 접근 단계
        steps: Vec<Step>,
    },
    /// 함수 호출
    Call {
        /// 함수 이름
        name: String,
        /// 인자
        args: Vec<Expression>,
    },
    /// 이항 산술 연산
    Binary {
        /// 연산자
        op: BinaryOp,
        /// 좌항
        lhs: Box<Expression>,
        /// 우항
        rhs: Box<Expression>,
    },
    /// 단항 마이너스
    Negate(Box<Expression>),
}

/// 템플릿 조각
#[derive(Debug, Clone, PartialEq)]
pub enum TemplatePart {
    /// 그대로 출력할 문자열 (이스케이프 해제 후)
    Literal(String),
    /// `${ ... }` 보간
    Interpolation(Expression),
}

/// 식별자 루트 참조
#[derive(Debug, Clone, PartialEq)]
pub struct Traversal {
    /// 루트 식별자
    pub root: String,
    /// 접근 단계
    pub steps: Vec<Step>,
}

impl Traversal {
    /// 선두의 연속된 속성 이름들
    pub fn leading_attrs(&self) -> Vec<&str> {
        self.steps
            .iter()
            .map_while(|step| match step {
                Step::Attr(name) => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }
}

/// 접근 단계
#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    /// `.name`
    Attr(String),
    /// `[expr]`
    Index(Expression),
    /// `[*]` -- 이후 단계를 각 원소에 적용
    Splat,
}

/// 이항 연산자
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
}

impl BinaryOp {
    /// 연산자 기호
    pub fn symbol(self) -> char {
        match self {
            Self::Add => '+',
            Self::Sub => '-',
            Self::Mul => '*',
            Self::Div => '/',
        }
    }
}

impl Expression {
    /// 보간 없는 단일 문자열 템플릿
    pub fn string(s: impl Into<String>) -> Self {
        Self::Template(vec![TemplatePart::Literal(s.into())])
    }

    /// 표현식에 포함된 모든 식별자 루트 참조를 방문합니다.
    pub fn visit_traversals<'a>(&'a self, visit: &mut dyn FnMut(&'a Traversal)) {
        match self {
            Self::Literal(_) => {}
            Self::Template(parts) => {
                for part in parts {
                    if let TemplatePart::Interpolation(expr) = part {
                        expr.visit_traversals(visit);
                    }
                }
            }
            Self::Tuple(items) => {
                for item in items {
                    item.visit_traversals(visit);
                }
            }
            Self::Object(entries) => {
                for (_, value) in entries {
                    value.visit_traversals(visit);
                }
            }
            Self::Traversal(traversal) => {
                visit(traversal);
                visit_steps(&traversal.steps, visit);
            }
            Self::Postfix { target, steps } => {
                target.visit_traversals(visit);
                visit_steps(steps, visit);
            }
            Self::Call { args, .. } => {
                for arg in args {
                    arg.visit_traversals(visit);
                }
            }
            Self::Binary { lhs, rhs, .. } => {
                lhs.visit_traversals(visit);
                rhs.visit_traversals(visit);
            }
            Self::Negate(inner) => inner.visit_traversals(visit),
        }
    }
}

fn visit_steps<'a>(steps: &'a [Step], visit: &mut dyn FnMut(&'a Traversal)) {
    for step in steps {
        if let Step::Index(index) = step {
            index.visit_traversals(visit);
        }
    }
}
