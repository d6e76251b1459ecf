const SECTIONS: &[&str] = &[
    "search",
    "active_list",
    "lookahead",
    "posterior",
    "nbest",
    "log_math",
];

fn main() {
    println!("cargo:rerun-if-changed=src/default_settings.toml");
    let content = include_str!("src/default_settings.toml");
    let value = match content.parse::<toml::Table>() {
        Ok(value) => value,
        Err(e) => panic!("src/default_settings.toml contains invalid TOML: {e}"),
    };
    for section in SECTIONS {
        if !value.get(*section).is_some_and(toml::Value::is_table) {
            panic!("src/default_settings.toml is missing the [{section}] table");
        }
    }
}
