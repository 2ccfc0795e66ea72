//! 规则内存存储

use crate::error::StorageError;
use crate::traits::RuleStore;
use domain::{ResourceRef, RuleDefinition};
use std::collections::BTreeMap;
use std::sync::RwLock;

/// 规则内存存储
pub struct InMemoryRuleStore {
    rules: RwLock<BTreeMap<u64, RuleDefinition>>,
}

impl InMemoryRuleStore {
    pub fn new() -> Self {
        Self {
            rules: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn with_rules(rules: impl IntoIterator<Item = RuleDefinition>) -> Self {
        Self {
            rules: RwLock::new(rules.into_iter().map(|rule| (rule.id, rule)).collect()),
        }
    }
}

impl Default for InMemoryRuleStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl RuleStore for InMemoryRuleStore {
    async fn get_rule(&self, id: u64) -> Result<Option<RuleDefinition>, StorageError> {
        let rules = self
            .rules
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(rules.get(&id).cloned())
    }

    async fn list_enabled_rules_for(
        &self,
        resource: &ResourceRef,
    ) -> Result<Vec<RuleDefinition>, StorageError> {
        let rules = self
            .rules
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        Ok(rules
            .values()
            .filter(|rule| rule.enabled && rule.references(resource))
            .cloned()
            .collect())
    }

    async fn save_rule(&self, rule: RuleDefinition) -> Result<(), StorageError> {
        let mut rules = self
            .rules
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        rules.insert(rule.id, rule);
        Ok(())
    }
}
