//! Rule-based assignment of global matrix identifiers.
//!
//! Kernels that refer to the same matrix concept must agree on where it is stored. The
//! backend uses a small integer identifier per such matrix. Identifiers are computed by
//! an ordered list of rules; the first rule whose pattern matches a matrix name
//! determines that matrix's identifier from the pattern's capture groups.
use crate::error::{KernelError, Result};
use crate::registry::MatrixRegistry;
use log::{debug, info};
use regex::Regex;
use std::collections::BTreeMap;
use std::fmt;

type IdFunction = Box<dyn Fn(&[&str]) -> Option<usize> + Send + Sync>;

/// A name pattern together with a function computing an identifier from its captures.
pub struct GlobalMatrixIdRule {
    pattern: Regex,
    id_function: IdFunction,
}

impl GlobalMatrixIdRule {
    /// Creates a rule from a regular expression and an identifier function.
    ///
    /// The function receives the capture groups of the match (excluding the whole match)
    /// and returns `None` if it cannot compute an identifier for them.
    pub fn new<F>(pattern: &str, id_function: F) -> Result<Self>
    where
        F: Fn(&[&str]) -> Option<usize> + Send + Sync + 'static,
    {
        let pattern = Regex::new(pattern).map_err(|source| KernelError::InvalidRule {
            pattern: pattern.to_string(),
            source,
        })?;
        Ok(Self {
            pattern,
            id_function: Box::new(id_function),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// The captures of `name`, if the rule's pattern matches it.
    fn captures<'a>(&self, name: &'a str) -> Option<Vec<&'a str>> {
        self.pattern.captures(name).map(|captures| {
            captures
                .iter()
                .skip(1)
                .map(|group| group.map_or("", |m| m.as_str()))
                .collect()
        })
    }
}

impl fmt::Debug for GlobalMatrixIdRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobalMatrixIdRule")
            .field("pattern", &self.pattern.as_str())
            .finish_non_exhaustive()
    }
}

/// The outcome of matching a name against a rule list.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    /// Index of the first matching rule.
    pub rule: usize,
    pub id: usize,
}

/// An ordered list of rules. Order is significant: the first matching rule wins.
#[derive(Debug, Default)]
pub struct GlobalMatrixIdRules {
    rules: Vec<GlobalMatrixIdRule>,
}

impl GlobalMatrixIdRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule with lower priority than every rule already present.
    pub fn with_rule<F>(mut self, pattern: &str, id_function: F) -> Result<Self>
    where
        F: Fn(&[&str]) -> Option<usize> + Send + Sync + 'static,
    {
        self.push(GlobalMatrixIdRule::new(pattern, id_function)?);
        Ok(self)
    }

    pub fn push(&mut self, rule: GlobalMatrixIdRule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[GlobalMatrixIdRule] {
        &self.rules
    }

    /// Computes the identifier of `name` using the first matching rule.
    ///
    /// Returns `Ok(None)` if no rule matches, i.e. the matrix is kernel-local.
    pub fn resolve_name(&self, name: &str) -> Result<Option<RuleMatch>> {
        for (rule_index, rule) in self.rules.iter().enumerate() {
            if let Some(captures) = rule.captures(name) {
                let id = (rule.id_function)(&captures).ok_or_else(|| KernelError::RuleEvaluation {
                    rule: rule_index,
                    pattern: rule.pattern().to_string(),
                    name: name.to_string(),
                    captures: captures.iter().map(|c| c.to_string()).collect(),
                })?;
                return Ok(Some(RuleMatch { rule: rule_index, id }));
            }
        }
        Ok(None)
    }

    /// Assigns a global identifier to every matrix of the registry matched by a rule.
    ///
    /// Matrices matching no rule are left without identifier. Fails with
    /// [`KernelError::IdentifierCollision`] if two differently named matrices resolve to
    /// the same identifier; in that case the registry is left untouched.
    pub fn determine_global_matrix_ids(&self, registry: &mut MatrixRegistry) -> Result<()> {
        // id -> (name, rule)
        let mut assigned: BTreeMap<usize, (String, usize)> = BTreeMap::new();
        let mut resolved = Vec::new();
        for descriptor in registry.iter() {
            if let Some(RuleMatch { rule, id }) = self.resolve_name(descriptor.name())? {
                if let Some((first, first_rule)) = assigned.get(&id) {
                    return Err(KernelError::IdentifierCollision {
                        id,
                        first: first.clone(),
                        first_rule: *first_rule,
                        second: descriptor.name().to_string(),
                        second_rule: rule,
                    });
                }
                debug!("Matrix {} gets global id {} from rule {}", descriptor.name(), id, rule);
                assigned.insert(id, (descriptor.name().to_string(), rule));
                resolved.push((descriptor.name().to_string(), id));
            }
        }

        let mut resolved = resolved.into_iter().peekable();
        for descriptor in registry.iter_mut() {
            if let Some((_, id)) = resolved.next_if(|(name, _)| name == descriptor.name()) {
                descriptor.set_global_id(id);
            }
        }
        info!("Resolved {} global matrix ids", assigned.len());
        Ok(())
    }

    /// Checks that every matrix matched by a rule carries the identifier the rules compute.
    pub fn verify(&self, registry: &MatrixRegistry) -> Result<()> {
        for descriptor in registry.iter() {
            if let Some(RuleMatch { rule, id }) = self.resolve_name(descriptor.name())? {
                if descriptor.global_id() != Some(id) {
                    return Err(KernelError::UnresolvedGlobalId {
                        name: descriptor.name().to_string(),
                        rule,
                    });
                }
            }
        }
        Ok(())
    }
}
