//! 렌더러 -- 문서 모델을 `terraform fmt` 스타일 텍스트로 출력
//!
//! 규칙:
//! - 들여쓰기 2칸
//! - 연속된 속성들의 `=`를 정렬. 빈 줄, 중첩 블록, 여러 줄 값 뒤에서 정렬 그룹이 끊김
//! - 최상위 블록 사이에 빈 줄 하나
//!
//! 같은 문서는 항상 같은 텍스트를 만듭니다.

use crate::body::{Attribute, Block, Body, BodyItem, Document, Expr};

const INDENT: &str = "  ";

/// 문서를 텍스트로 렌더링합니다.
pub fn render(doc: &Document) -> String {
    let mut out = String::new();
    for (i, block) in doc.blocks().iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        render_block(block, 0, &mut out);
    }
    out
}

fn render_block(block: &Block, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    out.push_str(&pad);
    out.push_str(&block.kind);
    for label in &block.labels {
        out.push(' ');
        out.push_str(&quote(label));
    }
    if block.body.items().is_empty() {
        out.push_str(" {}\n");
        return;
    }
    out.push_str(" {\n");
    render_body(&block.body, depth + 1, out);
    out.push_str(&pad);
    out.push_str("}\n");
}

fn render_body(body: &Body, depth: usize, out: &mut String) {
    let pad = INDENT.repeat(depth);
    let mut run: Vec<(&Attribute, String)> = Vec::new();

    for item in body.items() {
        match item {
            BodyItem::Attribute(attr) => {
                let value = render_expr(&attr.value, depth);
                let multiline = value.contains('\n');
                run.push((attr, value));
                if multiline {
                    flush_run(&mut run, &pad, out);
                }
            }
            BodyItem::Block(block) => {
                flush_run(&mut run, &pad, out);
                render_block(block, depth, out);
            }
            BodyItem::Blank => {
                flush_run(&mut run, &pad, out);
                out.push('\n');
            }
        }
    }
    flush_run(&mut run, &pad, out);
}

fn flush_run(run: &mut Vec<(&Attribute, String)>, pad: &str, out: &mut String) {
    let width = run
        .iter()
        .map(|(attr, _)| key_text(&attr.name).len())
        .max()
        .unwrap_or(0);
    for (attr, value) in run.drain(..) {
        out.push_str(pad);
        out.push_str(&format!("{:<width$} = {value}\n", key_text(&attr.name)));
    }
}

/// 값을 렌더링합니다. `depth`는 값이 놓이는 줄의 들여쓰기 깊이입니다.
pub fn render_expr(expr: &Expr, depth: usize) -> String {
    match expr {
        Expr::List(items) if items.is_empty() => "[]".to_owned(),
        Expr::List(items) if items.iter().any(is_composite) => {
            let inner = INDENT.repeat(depth + 1);
            let mut s = String::from("[\n");
            for item in items {
                s.push_str(&inner);
                s.push_str(&render_inline(item));
                s.push_str(",\n");
            }
            s.push_str(&INDENT.repeat(depth));
            s.push(']');
            s
        }
        Expr::Object(entries) if entries.is_empty() => "{}".to_owned(),
        Expr::Object(entries) => {
            let inner = INDENT.repeat(depth + 1);
            let width = entries
                .iter()
                .map(|(k, _)| key_text(k).len())
                .max()
                .unwrap_or(0);
            let mut s = String::from("{\n");
            for (key, value) in entries {
                s.push_str(&inner);
                s.push_str(&format!(
                    "{:<width$} = {}\n",
                    key_text(key),
                    render_expr(value, depth + 1)
                ));
            }
            s.push_str(&INDENT.repeat(depth));
            s.push('}');
            s
        }
        other => render_inline(other),
    }
}

/// 한 줄로 렌더링합니다 (리스트 원소 등).
fn render_inline(expr: &Expr) -> String {
    match expr {
        Expr::Str(s) => quote(s),
        Expr::Int(i) => i.to_string(),
        Expr::Float(f) => f.to_string(),
        Expr::Bool(b) => b.to_string(),
        Expr::Null => "null".to_owned(),
        Expr::Raw(text) => text.clone(),
        Expr::List(items) => {
            let parts: Vec<String> = items.iter().map(render_inline).collect();
            format!("[{}]", parts.join(", "))
        }
        Expr::Object(entries) => {
            let parts: Vec<String> = entries
                .iter()
                .map(|(k, v)| format!("{} = {}", key_text(k), render_inline(v)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

fn is_composite(expr: &Expr) -> bool {
    matches!(expr, Expr::List(_) | Expr::Object(_))
}

/// 식별자가 아닌 키는 따옴표로 감쌉니다.
fn key_text(key: &str) -> String {
    if tfacc_core::types::is_identifier(key) {
        key.to_owned()
    } else {
        quote(key)
    }
}

/// 문자열 리터럴로 인용합니다. `${ }` 보간은 그대로 둡니다.
pub fn quote(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}
