#![no_main]

use libfuzzer_sys::fuzz_target;
use serde_json::json;
use tfacc_hcl::{StaticScope, evaluate, parse_expression};

fuzz_target!(|data: &[u8]| {
    let Ok(src) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(expr) = parse_expression(src) else {
        return;
    };
    let mut scope = StaticScope::new()
        .with("var", json!({"volume_configuration": [{"suffix": "a", "size": 100}]}))
        .with("local", json!({"flavor": {"properties": [{"min_broker": 3}]}}));
    let _ = evaluate(&expr, &mut scope);
});
