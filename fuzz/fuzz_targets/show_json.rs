#![no_main]

use libfuzzer_sys::fuzz_target;
use tfacc_runner::terraform::parse_show_json;

fuzz_target!(|data: &[u8]| {
    if let Ok(json) = std::str::from_utf8(data) {
        let _ = parse_show_json(json);
    }
});
