#![no_main]

use libfuzzer_sys::fuzz_target;
use riposte::config::ConfigLoader;

fuzz_target!(|data: &[u8]| {
    // Only valid UTF-8 can reach the loader
    if let Ok(yaml_str) = std::str::from_utf8(data) {
        // Any result is fine; panics are not
        let _ = ConfigLoader::with_defaults().load_from_str(yaml_str);
    }
});
