use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use toml_edit::{Array, DocumentMut, InlineTable, Item, Key, RawString, Table, Value};

use crate::tree::{ConfigNode, ConfigTree, ConfigValue, KeyComment};

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read configuration file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("syntax error in configuration file '{}': {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to write configuration file {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ConfigLoadError {
    pub fn path(&self) -> &Path {
        match self {
            Self::Io { path, .. }
            | Self::Parse { path, .. }
            | Self::Write { path, .. } => path,
        }
    }
}

/// Loads and saves configuration trees. Implementations own the textual
/// syntax; callers only see [`ConfigTree`].
pub trait ConfigStore {
    fn load(&self, path: &Path) -> Result<ConfigTree, ConfigLoadError>;
    fn save(&self, tree: &ConfigTree, path: &Path) -> Result<(), ConfigLoadError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TomlConfigStore;

impl ConfigStore for TomlConfigStore {
    fn load(&self, path: &Path) -> Result<ConfigTree, ConfigLoadError> {
        let raw = fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        parse_toml_tree(&raw).map_err(|message| ConfigLoadError::Parse {
            path: path.to_path_buf(),
            message,
        })
    }

    fn save(&self, tree: &ConfigTree, path: &Path) -> Result<(), ConfigLoadError> {
        fs::write(path, render_toml_tree(tree)).map_err(|source| ConfigLoadError::Write {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Parses TOML text into a tree. Comments above a key or section header, and
/// after a value on the same line, stay attached to that key.
pub fn parse_toml_tree(raw: &str) -> Result<ConfigTree, String> {
    let document: DocumentMut = raw
        .parse()
        .map_err(|err: toml_edit::TomlError| err.to_string().trim_end().to_string())?;
    let mut tree = tree_from_table(document.as_table());
    if let Some(footer) = comment_text(Some(document.trailing())) {
        tree.set_footer(footer);
    }
    Ok(tree)
}

/// TOML places plain values ahead of sub-tables within a table, so a value
/// that follows a section in the tree is written before it.
pub fn render_toml_tree(tree: &ConfigTree) -> String {
    let mut document = DocumentMut::new();
    fill_table(document.as_table_mut(), tree);
    if let Some(footer) = tree.footer() {
        document.set_trailing(footer);
    }
    document.to_string()
}

fn tree_from_table(table: &Table) -> ConfigTree {
    let mut tree = ConfigTree::new();
    for (key, item) in table.iter() {
        let (node, comment) = match item {
            Item::Value(Value::InlineTable(inline)) => (
                ConfigNode::Section(tree_from_inline(inline)),
                KeyComment {
                    leading: key_prefix(table, key),
                    trailing: comment_text(inline.decor().suffix()),
                },
            ),
            Item::Value(value) => (
                ConfigNode::Value(config_value(value)),
                KeyComment {
                    leading: key_prefix(table, key),
                    trailing: comment_text(value.decor().suffix()),
                },
            ),
            Item::Table(section) => (
                ConfigNode::Section(tree_from_table(section)),
                KeyComment {
                    leading: comment_text(section.decor().prefix()),
                    trailing: comment_text(section.decor().suffix()),
                },
            ),
            Item::ArrayOfTables(tables) => (
                ConfigNode::Value(ConfigValue::List(
                    tables
                        .iter()
                        .map(|section| ConfigValue::String(section.to_string()))
                        .collect(),
                )),
                KeyComment::default(),
            ),
            Item::None => continue,
        };
        tree.set(key, node);
        tree.set_comment(key, comment);
    }
    tree
}

fn tree_from_inline(inline: &InlineTable) -> ConfigTree {
    inline
        .iter()
        .map(|(key, value)| {
            let node = match value {
                Value::InlineTable(nested) => ConfigNode::Section(tree_from_inline(nested)),
                other => ConfigNode::Value(config_value(other)),
            };
            (key.to_string(), node)
        })
        .collect()
}

fn config_value(value: &Value) -> ConfigValue {
    match value {
        Value::String(value) => ConfigValue::String(value.value().clone()),
        Value::Integer(value) => ConfigValue::Integer(*value.value()),
        Value::Float(value) => ConfigValue::Float(*value.value()),
        Value::Boolean(value) => ConfigValue::Boolean(*value.value()),
        Value::Datetime(value) => ConfigValue::String(value.value().to_string()),
        Value::Array(values) => ConfigValue::List(values.iter().map(config_value).collect()),
        // Inline tables inside arrays have no tree equivalent; keep their text.
        Value::InlineTable(inline) => ConfigValue::String(inline.to_string().trim().to_string()),
    }
}

fn key_prefix(table: &Table, key: &str) -> Option<String> {
    table
        .key(key)
        .and_then(|key| comment_text(key.leaf_decor().prefix()))
}

/// Decor worth keeping: anything holding a comment. Bare whitespace is
/// regenerated on render.
fn comment_text(raw: Option<&RawString>) -> Option<String> {
    raw.and_then(RawString::as_str)
        .filter(|text| text.contains('#'))
        .map(str::to_string)
}

fn fill_table(table: &mut Table, tree: &ConfigTree) {
    for (key, node) in tree.iter() {
        let comment = tree.comment(key);
        let leading = comment.and_then(|comment| comment.leading.as_deref());
        let trailing = comment.and_then(|comment| comment.trailing.as_deref());

        match node {
            ConfigNode::Value(value) => {
                let mut value = toml_value(value);
                if let Some(trailing) = trailing {
                    value.decor_mut().set_suffix(trailing);
                }
                let mut formatted = Key::new(key);
                if let Some(leading) = leading {
                    formatted.leaf_decor_mut().set_prefix(leading);
                }
                table.insert_formatted(&formatted, Item::Value(value));
            }
            ConfigNode::Section(section) => {
                let mut child = Table::new();
                fill_table(&mut child, section);
                // A header with nothing but sub-tables under it is left out,
                // as a hand-written file would.
                let header_only = leading.is_none()
                    && trailing.is_none()
                    && !section.is_empty()
                    && section.iter().all(|(_, node)| node.is_section());
                child.set_implicit(header_only);
                if let Some(leading) = leading {
                    child.decor_mut().set_prefix(leading);
                }
                if let Some(trailing) = trailing {
                    child.decor_mut().set_suffix(trailing);
                }
                table.insert(key, Item::Table(child));
            }
        }
    }
}

fn toml_value(value: &ConfigValue) -> Value {
    match value {
        ConfigValue::String(value) => Value::from(value.as_str()),
        ConfigValue::Integer(value) => Value::from(*value),
        ConfigValue::Float(value) => Value::from(*value),
        ConfigValue::Boolean(value) => Value::from(*value),
        ConfigValue::List(values) => Value::Array(values.iter().map(toml_value).collect::<Array>()),
    }
}
