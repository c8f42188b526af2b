//! Target architecture identifiers.
use crate::error::{KernelError, Result};
use serde::Serialize;
use std::fmt;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Precision {
    Single,
    Double,
}

impl Precision {
    pub fn bytes(&self) -> usize {
        match self {
            Precision::Single => 4,
            Precision::Double => 8,
        }
    }
}

/// A hardware target, identified by a precision letter followed by a target name, e.g. `dsnb`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Architecture {
    identifier: String,
    name: &'static str,
    precision: Precision,
    /// Width of a vector register in bytes.
    vector_width: usize,
}

const TARGETS: &[(&str, usize)] = &[
    ("noarch", 16),
    ("wsm", 16),
    ("snb", 32),
    ("hsw", 32),
    ("knc", 64),
    ("knl", 64),
    ("skx", 64),
];

impl Architecture {
    pub fn from_identifier(identifier: &str) -> Result<Self> {
        let unknown = || KernelError::UnknownArchitecture(identifier.to_string());
        let precision = match identifier.chars().next() {
            Some('d') => Precision::Double,
            Some('s') => Precision::Single,
            _ => return Err(unknown()),
        };
        let (name, vector_width) = TARGETS
            .iter()
            .find(|(name, _)| *name == &identifier[1..])
            .copied()
            .ok_or_else(unknown)?;
        Ok(Self {
            identifier: identifier.to_string(),
            name,
            precision,
            vector_width,
        })
    }

    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn name(&self) -> &str {
        self.name
    }

    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Required alignment of matrix storage in bytes.
    pub fn alignment(&self) -> usize {
        self.vector_width
    }

    /// Number of scalars that fit into one vector register.
    pub fn scalars_per_vector(&self) -> usize {
        self.vector_width / self.precision.bytes()
    }

    /// Rounds a leading dimension up so that every column starts on an aligned address.
    pub fn aligned_rows(&self, rows: usize) -> usize {
        let n = self.scalars_per_vector();
        (rows + n - 1) / n * n
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier)
    }
}
