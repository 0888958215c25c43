use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use dispatch::source::{CsvLayout, CsvSource, DEFAULT_BASE_NAME};
use dispatch::{RenderOptions, Unmatched};
use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct TomlConfig {
    input: InputToml,
    output: OutputToml,
    tables: HashMap<String, TableToml>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct InputToml {
    directory: Option<PathBuf>,
    base_name: Option<String>,
    header_row: Option<usize>,
    fields: Option<Vec<String>>,
    mnemonic_column: Option<String>,
    cpi_column: Option<String>,
    proxy_column: Option<String>,
    index_column: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct OutputToml {
    path: Option<PathBuf>,
    stubs_dir: Option<PathBuf>,
    function: Option<String>,
    instruction_type: Option<String>,
    state_type: Option<String>,
    result_type: Option<String>,
    handler_type: Option<String>,
    handler_module: Option<String>,
    unmatched: Option<String>,
    handler_table: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct TableToml {
    fields: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub source: CsvSource,
    pub render: RenderOptions,
    /// `None` writes the lookup module to stdout.
    pub output: Option<PathBuf>,
    pub stubs_dir: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source: CsvSource::new("."),
            render: RenderOptions::default(),
            output: None,
            stubs_dir: None,
        }
    }
}

/// Reads a config file. `None` gives the defaults.
pub fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    let Some(path) = path else {
        log::debug!("no config file, using defaults");
        return Ok(Config::default());
    };

    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    let base = path.parent().unwrap_or(Path::new(""));
    parse(&text, base).with_context(|| format!("invalid config {}", path.display()))
}

/// Relative paths are taken relative to `base`, the config file's directory.
pub fn parse(text: &str, base: &Path) -> anyhow::Result<Config> {
    let toml_config: TomlConfig = toml::from_str(text)?;
    let input = toml_config.input;
    let output = toml_config.output;
    let resolve = |p: PathBuf| if p.is_absolute() { p } else { base.join(p) };

    let defaults = CsvLayout::default();
    let layout = CsvLayout {
        header_row: input.header_row.unwrap_or(defaults.header_row),
        mnemonic: input.mnemonic_column.unwrap_or(defaults.mnemonic),
        cpi: input.cpi_column.unwrap_or(defaults.cpi),
        proxy: input.proxy_column.unwrap_or(defaults.proxy),
        index: input.index_column.unwrap_or(defaults.index),
    };

    let source = CsvSource {
        directory: resolve(input.directory.unwrap_or_else(|| PathBuf::from("."))),
        base_name: input.base_name.unwrap_or_else(|| DEFAULT_BASE_NAME.into()),
        layout,
        fields: input.fields,
        overrides: toml_config
            .tables
            .into_iter()
            .map(|(name, table)| (name, table.fields))
            .collect(),
    };

    let unmatched = match output.unmatched.as_deref() {
        None | Some("panic") => Unmatched::Panic,
        Some("none") => Unmatched::None,
        Some(other) => bail!("unmatched must be \"panic\" or \"none\", not {other:?}"),
    };

    let d = RenderOptions::default();
    let render = RenderOptions {
        function: output.function.unwrap_or(d.function),
        instruction_type: output.instruction_type.unwrap_or(d.instruction_type),
        state_type: output.state_type.unwrap_or(d.state_type),
        result_type: output.result_type.unwrap_or(d.result_type),
        handler_type: output.handler_type.unwrap_or(d.handler_type),
        handler_module: output.handler_module.or(d.handler_module),
        unmatched,
        handler_table: output.handler_table.unwrap_or(d.handler_table),
    };

    Ok(Config {
        source,
        render,
        output: output.path.map(resolve),
        stubs_dir: output.stubs_dir.map(resolve),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_is_all_defaults() {
        let config = parse("", Path::new("cfg")).unwrap();
        assert_eq!(config.source.directory, Path::new("cfg/."));
        assert_eq!(config.source.base_name, "Instruction List.csv");
        assert_eq!(config.source.layout, CsvLayout::default());
        assert_eq!(config.render, RenderOptions::default());
        assert!(config.output.is_none());
    }

    #[test]
    fn full_file() {
        let text = r#"
            [input]
            directory = "tables"
            header_row = 0
            fields = ["opcode", "funct"]
            mnemonic_column = "Name"

            [tables.cop2]
            fields = ["funct", "rs"]

            [output]
            path = "/tmp/lookup.rs"
            stubs_dir = "stubs"
            instruction_type = "crate::mips::Instruction"
            handler_module = "crate::r3000::instruction_impl"
            unmatched = "none"
            handler_table = true
        "#;
        let config = parse(text, Path::new("/work")).unwrap();
        assert_eq!(config.source.directory, Path::new("/work/tables"));
        assert_eq!(config.source.layout.header_row, 0);
        assert_eq!(config.source.layout.mnemonic, "Name");
        assert_eq!(config.source.layout.cpi, "CPI");
        assert_eq!(config.source.fields.as_deref(), Some(&["opcode".to_owned(), "funct".to_owned()][..]));
        assert_eq!(config.source.overrides["cop2"], ["funct", "rs"]);
        assert_eq!(config.output.as_deref(), Some(Path::new("/tmp/lookup.rs")));
        assert_eq!(config.stubs_dir.as_deref(), Some(Path::new("/work/stubs")));
        assert_eq!(config.render.unmatched, Unmatched::None);
        assert!(config.render.handler_table);
        assert_eq!(config.render.function, "lookup");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(parse("[input]\ndirectroy = \"x\"\n", Path::new("")).is_err());
    }

    #[test]
    fn bad_unmatched_mode() {
        let err = parse("[output]\nunmatched = \"ignore\"\n", Path::new("")).unwrap_err();
        assert!(err.to_string().contains("ignore"));
    }
}
