use serde::{Deserialize, Serialize};

use crate::tree::{ConfigNode, ConfigTree};

/// What happens to keys the user has but the new template no longer names.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriftPolicy {
    /// Keep them after the template's keys in the same section.
    #[default]
    Preserve,
    Drop,
}

impl DriftPolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Preserve => "preserve",
            Self::Drop => "drop",
        }
    }

    pub fn parse(value: &str) -> anyhow::Result<Self> {
        match value {
            "preserve" => Ok(Self::Preserve),
            "drop" => Ok(Self::Drop),
            _ => Err(anyhow::anyhow!(
                "invalid drift policy '{value}' (expected 'preserve' or 'drop')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub tree: ConfigTree,
    /// Dotted paths of user keys absent from the template.
    pub unknown_keys: Vec<String>,
    /// Dotted paths where template and user disagree on section vs value;
    /// the template's shape was kept.
    pub restructured: Vec<String>,
}

/// Layers `user` onto `template`: the result has the template's structure and
/// key order, user values win wherever both name the same key.
pub fn merge_into_template(
    template: &ConfigTree,
    user: &ConfigTree,
    policy: DriftPolicy,
) -> MergeOutcome {
    let mut outcome = MergeOutcome {
        tree: ConfigTree::new(),
        unknown_keys: Vec::new(),
        restructured: Vec::new(),
    };
    outcome.tree = merge_section(template, user, policy, "", &mut outcome);
    if let Some(footer) = user.footer().or(template.footer()) {
        outcome.tree.set_footer(footer);
    }
    for path in &outcome.unknown_keys {
        tracing::warn!(
            key = %path,
            policy = policy.as_str(),
            "configuration key is not part of the new template"
        );
    }
    outcome
}

fn merge_section(
    template: &ConfigTree,
    user: &ConfigTree,
    policy: DriftPolicy,
    prefix: &str,
    outcome: &mut MergeOutcome,
) -> ConfigTree {
    let mut merged = ConfigTree::new();

    for (key, template_node) in template.iter() {
        let path = join_path(prefix, key);
        let (node, user_kept) = match (template_node, user.get(key)) {
            (_, None) => (template_node.clone(), false),
            (ConfigNode::Section(template_section), Some(ConfigNode::Section(user_section))) => {
                let section =
                    merge_section(template_section, user_section, policy, &path, outcome);
                (ConfigNode::Section(section), true)
            }
            (ConfigNode::Value(_), Some(user_node @ ConfigNode::Value(_))) => {
                (user_node.clone(), true)
            }
            (_, Some(_)) => {
                outcome.restructured.push(path);
                (template_node.clone(), false)
            }
        };
        merged.set(key, node);
        // The operator's own note wins over the template's.
        let comment = user
            .comment(key)
            .filter(|_| user_kept)
            .or_else(|| template.comment(key))
            .cloned()
            .unwrap_or_default();
        merged.set_comment(key, comment);
    }

    for (key, user_node) in user.iter() {
        if template.contains_key(key) {
            continue;
        }
        outcome.unknown_keys.push(join_path(prefix, key));
        if policy == DriftPolicy::Preserve {
            merged.set(key, user_node.clone());
            merged.set_comment(key, user.comment(key).cloned().unwrap_or_default());
        }
    }

    merged
}

fn join_path(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}
