#![no_main]
use encoding_table::{ArtifactFormat, GeneratorConfig};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &str| {
    // Parsing must only ever return Ok/Err.
    let scoped = ArtifactFormat::default();
    let bare = ArtifactFormat::bare();
    for format in [&scoped, &bare] {
        let _ = format.parse_record(data);
        if let Ok(entries) = format.parse_table(data) {
            // Whatever parses must render to text that parses to the same entries.
            let text = format.render_table(&entries);
            assert_eq!(format.parse_table(&text).ok(), Some(entries));
        }
    }

    let _ = GeneratorConfig::from_toml_str(data);
});
