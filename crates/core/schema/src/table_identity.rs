//! Validated dotted table identifiers.

/// Maximum length for a single identifier segment.
const MAX_IDENTIFIER_LENGTH: usize = 63;

/// A validated `schema.table` pair with an optional catalog prefix.
///
/// Parsed from `schema.table` or `catalog.schema.table`. Each segment must
/// start with a letter or underscore and contain only letters, digits, and
/// underscores, so the identity can be spliced into warehouse SQL and object
/// store keys without quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableIdentity {
    catalog: Option<String>,
    schema: String,
    table: String,
}

impl TableIdentity {
    pub fn new(
        catalog: Option<&str>,
        schema: &str,
        table: &str,
    ) -> Result<Self, TableIdentityError> {
        if let Some(catalog) = catalog {
            validate_identifier(catalog)?;
        }
        validate_identifier(schema)?;
        validate_identifier(table)?;
        Ok(Self {
            catalog: catalog.map(str::to_lowercase),
            schema: schema.to_lowercase(),
            table: table.to_lowercase(),
        })
    }

    pub fn catalog(&self) -> Option<&str> {
        self.catalog.as_deref()
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn table(&self) -> &str {
        &self.table
    }
}

impl std::fmt::Display for TableIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(catalog) = &self.catalog {
            write!(f, "{catalog}.")?;
        }
        write!(f, "{}.{}", self.schema, self.table)
    }
}

impl std::str::FromStr for TableIdentity {
    type Err = TableIdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let segments: Vec<&str> = s.split('.').collect();
        match segments.as_slice() {
            [schema, table] => TableIdentity::new(None, schema, table),
            [catalog, schema, table] => TableIdentity::new(Some(catalog), schema, table),
            _ => Err(TableIdentityError::WrongSegmentCount {
                value: s.to_string(),
                count: segments.len(),
            }),
        }
    }
}

/// Validates one identifier segment.
///
/// Checks:
/// - Not empty, not longer than 63 bytes
/// - First character is a letter or underscore
/// - All characters are letters, digits, or underscores
fn validate_identifier(segment: &str) -> Result<(), TableIdentityError> {
    if segment.is_empty() {
        return Err(TableIdentityError::EmptySegment);
    }

    if segment.len() > MAX_IDENTIFIER_LENGTH {
        return Err(TableIdentityError::SegmentTooLong {
            length: segment.len(),
        });
    }

    let mut chars = segment.chars();
    if let Some(first_char) = chars.next()
        && !(first_char.is_ascii_alphabetic() || first_char == '_')
    {
        return Err(TableIdentityError::InvalidFirstCharacter {
            character: first_char,
            value: segment.to_string(),
        });
    }

    if let Some(invalid_char) = segment
        .chars()
        .find(|&c| !(c.is_ascii_alphanumeric() || c == '_'))
    {
        return Err(TableIdentityError::InvalidCharacter {
            character: invalid_char,
            value: segment.to_string(),
        });
    }

    Ok(())
}

/// Error type for [`TableIdentity`] parsing failures.
#[derive(Debug, thiserror::Error)]
pub enum TableIdentityError {
    /// The dotted form has fewer than two or more than three segments.
    #[error("expected 'schema.table' or 'catalog.schema.table', got '{value}' ({count} segments)")]
    WrongSegmentCount { value: String, count: usize },
    /// An identifier segment is empty.
    #[error("identifier segments cannot be empty")]
    EmptySegment,
    /// An identifier segment exceeds the maximum length.
    #[error("identifier segment is too long ({length} bytes, maximum is {MAX_IDENTIFIER_LENGTH})")]
    SegmentTooLong { length: usize },
    /// An identifier segment starts with an invalid character.
    #[error("identifier '{value}' must start with a letter or underscore, not '{character}'")]
    InvalidFirstCharacter { character: char, value: String },
    /// An identifier segment contains an invalid character.
    #[error("invalid character '{character}' in identifier '{value}'")]
    InvalidCharacter { character: char, value: String },
}
