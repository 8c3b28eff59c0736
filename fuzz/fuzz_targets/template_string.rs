#![no_main]

use libfuzzer_sys::fuzz_target;
use tfacc_hcl::parse_template;

fuzz_target!(|data: &[u8]| {
    if let Ok(src) = std::str::from_utf8(data) {
        let _ = parse_template(src);
    }
});
