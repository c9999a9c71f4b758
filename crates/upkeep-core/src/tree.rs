use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    List(Vec<ConfigValue>),
}

impl ConfigValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::Boolean(value) => write!(f, "{value}"),
            Self::List(values) => {
                let rendered = values
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                write!(f, "[{rendered}]")
            }
        }
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Boolean(value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigNode {
    Value(ConfigValue),
    Section(ConfigTree),
}

impl ConfigNode {
    pub fn is_section(&self) -> bool {
        matches!(self, Self::Section(_))
    }
}

/// Comment text bound to one key, verbatim with its `#` markers and line
/// breaks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyComment {
    /// Lines above the key or section header.
    pub leading: Option<String>,
    /// The rest of the line after the value or header.
    pub trailing: Option<String>,
}

impl KeyComment {
    pub fn is_empty(&self) -> bool {
        self.leading.is_none() && self.trailing.is_none()
    }
}

/// Ordered hierarchical settings. Key order is insertion order and survives
/// merge and serialization; replacing an existing key keeps its position and
/// its comment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    entries: Vec<(String, ConfigNode)>,
    comments: BTreeMap<String, KeyComment>,
    footer: Option<String>,
}

impl ConfigTree {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.position(key).is_some()
    }

    pub fn get(&self, key: &str) -> Option<&ConfigNode> {
        self.position(key).map(|index| &self.entries[index].1)
    }

    pub fn get_mut(&mut self, key: &str) -> Option<&mut ConfigNode> {
        self.position(key).map(|index| &mut self.entries[index].1)
    }

    pub fn value(&self, key: &str) -> Option<&ConfigValue> {
        match self.get(key)? {
            ConfigNode::Value(value) => Some(value),
            ConfigNode::Section(_) => None,
        }
    }

    pub fn section(&self, key: &str) -> Option<&ConfigTree> {
        match self.get(key)? {
            ConfigNode::Section(section) => Some(section),
            ConfigNode::Value(_) => None,
        }
    }

    pub fn section_mut(&mut self, key: &str) -> Option<&mut ConfigTree> {
        match self.get_mut(key)? {
            ConfigNode::Section(section) => Some(section),
            ConfigNode::Value(_) => None,
        }
    }

    /// Returns the named section, creating it at the end if absent. A scalar
    /// under the same key is replaced by an empty section.
    pub fn ensure_section(&mut self, key: &str) -> &mut ConfigTree {
        let index = match self.position(key) {
            Some(index) => {
                if !self.entries[index].1.is_section() {
                    self.entries[index].1 = ConfigNode::Section(ConfigTree::new());
                }
                index
            }
            None => {
                self.entries
                    .push((key.to_string(), ConfigNode::Section(ConfigTree::new())));
                self.entries.len() - 1
            }
        };

        match &mut self.entries[index].1 {
            ConfigNode::Section(section) => section,
            ConfigNode::Value(_) => unreachable!("entry was just made a section"),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, node: ConfigNode) -> Option<ConfigNode> {
        let key = key.into();
        match self.position(&key) {
            Some(index) => Some(std::mem::replace(&mut self.entries[index].1, node)),
            None => {
                self.entries.push((key, node));
                None
            }
        }
    }

    pub fn set_value(
        &mut self,
        key: impl Into<String>,
        value: impl Into<ConfigValue>,
    ) -> Option<ConfigNode> {
        self.set(key, ConfigNode::Value(value.into()))
    }

    pub fn remove(&mut self, key: &str) -> Option<ConfigNode> {
        self.comments.remove(key);
        self.position(key)
            .map(|index| self.entries.remove(index).1)
    }

    pub fn comment(&self, key: &str) -> Option<&KeyComment> {
        self.comments.get(key)
    }

    /// Attaches `comment` to an existing key; an empty comment clears it.
    pub fn set_comment(&mut self, key: &str, comment: KeyComment) {
        if comment.is_empty() || !self.contains_key(key) {
            self.comments.remove(key);
        } else {
            self.comments.insert(key.to_string(), comment);
        }
    }

    /// Comment lines after the last entry of a document.
    pub fn footer(&self) -> Option<&str> {
        self.footer.as_deref()
    }

    pub fn set_footer(&mut self, footer: impl Into<String>) {
        self.footer = Some(footer.into());
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(key, _)| key.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ConfigNode)> {
        self.entries.iter().map(|(key, node)| (key.as_str(), node))
    }

    /// Dotted lookup, e.g. `Station.station_type`.
    pub fn get_path(&self, path: &str) -> Option<&ConfigNode> {
        let mut segments = path.split('.');
        let first = segments.next()?;
        let mut node = self.get(first)?;
        for segment in segments {
            match node {
                ConfigNode::Section(section) => node = section.get(segment)?,
                ConfigNode::Value(_) => return None,
            }
        }
        Some(node)
    }

    fn position(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|(existing, _)| existing == key)
    }
}

impl FromIterator<(String, ConfigNode)> for ConfigTree {
    fn from_iter<I: IntoIterator<Item = (String, ConfigNode)>>(iter: I) -> Self {
        let mut tree = ConfigTree::new();
        for (key, node) in iter {
            tree.set(key, node);
        }
        tree
    }
}
