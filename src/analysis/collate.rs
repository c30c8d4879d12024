//! Alias resolution and author collation.

use std::collections::HashMap;
use std::path::Path;

use crate::error::{Result, StatsError};
use crate::types::{AuthorKey, CollateBy};

/// Maps author emails to a canonical display name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AliasMap {
    names: HashMap<String, String>,
}

impl AliasMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, email: impl Into<String>, name: impl Into<String>) {
        self.names.insert(email.into(), name.into());
    }

    /// Parse `email = name` lines. Blank lines and `#` comments are skipped.
    pub fn parse(text: &str) -> Result<Self> {
        let mut aliases = Self::new();
        for (lineno, line) in text.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let (email, name) = line.split_once('=').ok_or_else(|| {
                StatsError::Config(format!("alias line {}: expected 'email = name'", lineno + 1))
            })?;
            aliases.insert(email.trim(), name.trim());
        }
        Ok(aliases)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StatsError::Config(format!("{}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    /// Canonical name for `email`, or `name` when no alias exists.
    pub fn resolve<'a>(&'a self, name: &'a str, email: &str) -> &'a str {
        self.names.get(email).map(String::as_str).unwrap_or(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl CollateBy {
    /// Ledger key for an already alias-resolved identity.
    pub fn key(self, name: &str, email: &str) -> AuthorKey {
        match self {
            CollateBy::Name => AuthorKey::Name(name.to_string()),
            CollateBy::Email => AuthorKey::Email(email.to_string()),
            CollateBy::NameAndEmail => {
                AuthorKey::NameAndEmail(name.to_string(), email.to_string())
            }
        }
    }
}
