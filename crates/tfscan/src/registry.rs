//! rule catalogue
//!
//! Rules are registered into a [RegistryBuilder] once at startup. [RegistryBuilder::finalize] turns
//! it into an immutable [Registry] that the scanner reads; nothing can be registered after that.
use crate::rule::Rule;
use indexmap::IndexMap;

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum RegistrationError {
    #[error("a rule with code '{0}' is already registered")]
    DuplicateCode(String),
    #[error("rule '{code}' is malformed: {reason}")]
    MalformedPredicate { code: String, reason: &'static str },
}

#[derive(Debug, Default)]
pub struct RegistryBuilder {
    rules: IndexMap<String, Rule>,
}

impl RegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, rule: Rule) -> Result<(), RegistrationError> {
        let code = rule.code();
        validate(&rule).map_err(|reason| RegistrationError::MalformedPredicate {
            code: code.clone(),
            reason,
        })?;

        if self.rules.contains_key(&code) {
            return Err(RegistrationError::DuplicateCode(code));
        }

        tracing::debug!(%code, "rule registered");
        self.rules.insert(code, rule);
        Ok(())
    }

    pub fn finalize(self) -> Registry {
        tracing::info!(rules = self.rules.len(), "rule registry finalized");
        Registry {
            has_nested: self.rules.values().any(|r| r.nested_types().next().is_some()),
            rules: self.rules,
        }
    }
}

fn validate(rule: &Rule) -> Result<(), &'static str> {
    if rule.short_code().trim().is_empty() {
        return Err("short code is empty");
    }
    if rule.service().trim().is_empty() {
        return Err("service is empty");
    }
    if rule
        .required_labels()
        .iter()
        .any(|label| {
            label.is_empty() || label.find('*').is_some_and(|index| index + 1 != label.len())
        })
    {
        return Err("required labels must be non-empty and may only end in a single '*'");
    }
    if !rule.required_labels().is_empty()
        && !rule.required_types().is_empty()
        && !rule
            .required_types()
            .iter()
            .any(|kind| kind == "resource" || kind == "data")
    {
        return Err("required labels only apply to resource and data blocks");
    }
    if rule.required_types().iter().any(|kind| kind.trim().is_empty()) {
        return Err("required types must be non-empty");
    }
    Ok(())
}

/// Finalized, read-only set of rules
#[derive(Debug)]
pub struct Registry {
    rules: IndexMap<String, Rule>,
    has_nested: bool,
}

impl Registry {
    pub fn rules(&self) -> impl Iterator<Item = &Rule> {
        self.rules.values()
    }

    pub fn get(&self, code: &str) -> Option<&Rule> {
        self.rules.get(code)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Whether any rule targets nested block types, see [crate::module::TOP_LEVEL_TYPES]
    pub fn has_nested_rules(&self) -> bool {
        self.has_nested
    }
}
