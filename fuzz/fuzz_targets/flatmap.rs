#![no_main]

use libfuzzer_sys::fuzz_target;
use tfacc_core::flatmap::flatten;

fuzz_target!(|data: &[u8]| {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_slice(data) {
        let _ = flatten(&map);
    }
});
