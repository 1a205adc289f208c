use super::registry::FieldSpecRegistry;
use crate::catalog::CatalogStore;
use crate::core::Result;
use serde::Serialize;
use tracing::warn;

pub const BASIC_FIELDS_GROUP: &str = "Basic Fields";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    pub tag: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceGroup {
    pub label: String,
    pub choices: Vec<Choice>,
}

/// Selectable field-type tags, grouped for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChoiceSet {
    pub groups: Vec<ChoiceGroup>,
    /// Set when the entity catalog could not be read and only built-ins are listed.
    pub degraded: bool,
}

impl ChoiceSet {
    pub fn contains(&self, tag: &str) -> bool {
        self.groups
            .iter()
            .flat_map(|group| group.choices.iter())
            .any(|choice| choice.tag == tag)
    }

    pub fn group(&self, label: &str) -> Option<&ChoiceGroup> {
        self.groups.iter().find(|group| group.label == label)
    }

    pub fn tags(&self) -> impl Iterator<Item = &str> {
        self.groups
            .iter()
            .flat_map(|group| group.choices.iter())
            .map(|choice| choice.tag.as_str())
    }
}

fn basic_fields() -> ChoiceGroup {
    ChoiceGroup {
        label: BASIC_FIELDS_GROUP.to_string(),
        choices: FieldSpecRegistry::builtins()
            .iter()
            .map(|field| Choice {
                tag: field.tag.to_string(),
                label: field.label.to_string(),
            })
            .collect(),
    }
}

/// Read-through view of the field types an operator can pick from.
#[derive(Clone)]
pub struct ChoiceSetProvider {
    catalog: CatalogStore,
}

impl ChoiceSetProvider {
    pub fn new(catalog: CatalogStore) -> Self {
        Self { catalog }
    }

    /// Built-in kinds followed by one group per namespace listing its entities.
    ///
    /// Never fails: a catalog read error yields the built-ins alone with
    /// `degraded` set.
    pub async fn current_choices(&self) -> ChoiceSet {
        match self.entity_groups().await {
            Ok(groups) => {
                let mut all = Vec::with_capacity(groups.len() + 1);
                all.push(basic_fields());
                all.extend(groups);
                ChoiceSet {
                    groups: all,
                    degraded: false,
                }
            }
            Err(err) => {
                warn!("Entity catalog unavailable, offering built-in field types only: {}", err);
                ChoiceSet {
                    groups: vec![basic_fields()],
                    degraded: true,
                }
            }
        }
    }

    async fn entity_groups(&self) -> Result<Vec<ChoiceGroup>> {
        let mut groups = Vec::new();
        for namespace in self.catalog.namespaces().await? {
            let choices = self
                .catalog
                .entities_in(namespace.id)
                .await?
                .into_iter()
                .map(|entity| Choice {
                    tag: entity.name,
                    label: entity.label,
                })
                .collect();
            groups.push(ChoiceGroup {
                label: namespace.label,
                choices,
            });
        }
        Ok(groups)
    }
}
