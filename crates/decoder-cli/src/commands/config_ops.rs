use std::fs;

use decoder_engine::settings;

pub fn settings_export() {
    print!("{}", settings::default_toml());
}

pub fn settings_validate(file: &str) {
    let content = die!(fs::read_to_string(file), "Error reading {file}: {}");
    let s = die!(settings::parse_settings_toml(&content), "Error: {}");
    println!(
        "OK: search.absolute_beam_width={}, search.relative_beam_width={:e}, active_list.strategy={:?}, log_math.log_base={}",
        s.search.absolute_beam_width,
        s.search.relative_beam_width,
        s.active_list.strategy,
        s.log_math.log_base
    );
}
