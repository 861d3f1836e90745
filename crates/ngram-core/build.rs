/// Top-level tables every settings document must carry.
const SETTINGS_SECTIONS: &[&str] = &[
    "cache",
    "tokenizer",
    "features",
    "factored",
    "precision",
    "repetition",
    "logging",
];

fn main() {
    println!("cargo:rerun-if-changed=src/default_settings.toml");
    let table = parse_table(
        "src/default_settings.toml",
        include_str!("src/default_settings.toml"),
    );
    if let Some(missing) = SETTINGS_SECTIONS
        .iter()
        .find(|section| !table.get(**section).is_some_and(toml::Value::is_table))
    {
        panic!("src/default_settings.toml is missing the [{missing}] table");
    }
}

fn parse_table(path: &str, content: &str) -> toml::Table {
    match content.parse::<toml::Table>() {
        Ok(table) => table,
        Err(err) => panic!("{path} contains invalid TOML: {err}"),
    }
}
