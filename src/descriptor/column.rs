use serde::{Deserialize, Serialize};

use super::error::DescriptorError;

/// Storage class of a column, derived from the base type of its spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Int,
    Decimal,
    DateTime,
    Date,
    Time,
    Bool,
    Text,
}

impl ColumnKind {
    pub fn from_base_type(base: &str) -> Self {
        // "decimal(10,2)" -> "decimal"
        let base = base
            .split('(')
            .next()
            .unwrap_or(base)
            .trim()
            .to_ascii_lowercase();

        match base.as_str() {
            "int" | "integer" | "bigint" | "smallint" | "tinyint" | "serial" | "bigserial" => ColumnKind::Int,
            "decimal" | "numeric" | "float" | "real" | "double" | "money" | "smallmoney" => ColumnKind::Decimal,
            "datetime" | "datetime2" | "smalldatetime" | "timestamp" => ColumnKind::DateTime,
            "date" => ColumnKind::Date,
            "time" => ColumnKind::Time,
            "bit" | "bool" | "boolean" => ColumnKind::Bool,
            _ => ColumnKind::Text,
        }
    }

    /// True for kinds compared by calendar date in structured filters.
    pub fn is_date_like(&self) -> bool {
        matches!(self, ColumnKind::DateTime | ColumnKind::Date)
    }

    pub fn is_text(&self) -> bool {
        matches!(self, ColumnKind::Text)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ColumnKind::Int => "int",
            ColumnKind::Decimal => "decimal",
            ColumnKind::DateTime => "datetime",
            ColumnKind::Date => "date",
            ColumnKind::Time => "time",
            ColumnKind::Bool => "bool",
            ColumnKind::Text => "text",
        }
    }
}

/// Semantic role of a column. Roles are fixed when the descriptor is built;
/// everything downstream switches on the role rather than the column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Data,
    PrimaryKey,
    Tenant,
    Auditor,
    AuditTimestamp,
    Archived,
    Geo,
    AutoToken,
}

impl ColumnRole {
    /// Role implied by the conventional column names.
    pub fn infer(name: &str, primary_key: &str) -> Self {
        if name == primary_key {
            return ColumnRole::PrimaryKey;
        }
        match name {
            "CompanyID" => ColumnRole::Tenant,
            "UpdatedByContactID" => ColumnRole::Auditor,
            "CreateUpdateDate" => ColumnRole::AuditTimestamp,
            "ArchivedDate" => ColumnRole::Archived,
            "Latitude" | "Longitude" => ColumnRole::Geo,
            "AutoToken" => ColumnRole::AutoToken,
            _ => ColumnRole::Data,
        }
    }
}

/// A declared column: name, parsed type spec and role.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSpec {
    pub name: String,
    pub sql_type: String,
    pub kind: ColumnKind,
    pub nullable: bool,
    pub default_literal: Option<String>,
    pub role: ColumnRole,
}

impl ColumnSpec {
    /// Parse a type spec such as `int`, `varchar(50) NULL` or
    /// `decimal(10,2) NOT NULL DEFAULT 0`.
    pub fn parse(name: &str, spec: &str, role: ColumnRole) -> Result<Self, DescriptorError> {
        let tokens: Vec<&str> = spec.split_whitespace().collect();
        let Some(base) = tokens.first() else {
            return Err(DescriptorError::InvalidTypeSpec {
                column: name.to_string(),
                spec: spec.to_string(),
            });
        };

        let mut nullable = false;
        let mut default_literal = None;
        let mut i = 1;
        while i < tokens.len() {
            let token = tokens[i];
            if token.eq_ignore_ascii_case("NOT")
                && tokens.get(i + 1).is_some_and(|t| t.eq_ignore_ascii_case("NULL"))
            {
                nullable = false;
                i += 2;
                continue;
            }
            if token.eq_ignore_ascii_case("NULL") {
                nullable = true;
            } else if token.eq_ignore_ascii_case("DEFAULT") {
                let rest = tokens[i + 1..].join(" ");
                if rest.is_empty() {
                    return Err(DescriptorError::InvalidTypeSpec {
                        column: name.to_string(),
                        spec: spec.to_string(),
                    });
                }
                default_literal = Some(strip_literal(&rest));
                break;
            }
            i += 1;
        }

        Ok(Self {
            name: name.to_string(),
            sql_type: base.to_string(),
            kind: ColumnKind::from_base_type(base),
            nullable,
            default_literal,
            role,
        })
    }

    /// True when a create may omit this column.
    pub fn is_optional(&self) -> bool {
        self.nullable || self.default_literal.is_some()
    }
}

fn strip_literal(raw: &str) -> String {
    let trimmed = raw.trim();
    let unparen = trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .unwrap_or(trimmed);
    unparen
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .unwrap_or(unparen)
        .to_string()
}
