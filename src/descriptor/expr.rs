use super::error::DescriptorError;

/// Maps a table name appearing in an expression to the name or alias it is
/// reachable by in the query being built.
pub trait TableResolver {
    fn resolve_table(&self, table: &str) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExprPart {
    Sql(String),
    Table(String),
}

/// A computed-field SQL fragment with its `{{table}}` references parsed out
/// once, at descriptor build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlExpr {
    parts: Vec<ExprPart>,
}

impl SqlExpr {
    pub fn parse(template: &str) -> Result<Self, DescriptorError> {
        let mut parts = Vec::new();
        let mut rest = template;

        while let Some(start) = rest.find("{{") {
            if start > 0 {
                parts.push(ExprPart::Sql(rest[..start].to_string()));
            }
            let after = &rest[start + 2..];
            let end = after
                .find("}}")
                .ok_or_else(|| DescriptorError::UnterminatedPlaceholder(template.to_string()))?;
            let table = after[..end].trim();
            if table.is_empty() {
                return Err(DescriptorError::InvalidIdentifier(template.to_string()));
            }
            parts.push(ExprPart::Table(table.to_string()));
            rest = &after[end + 2..];
        }
        if !rest.is_empty() {
            parts.push(ExprPart::Sql(rest.to_string()));
        }

        Ok(Self { parts })
    }

    /// Tables referenced through placeholders, in order of appearance.
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|p| match p {
            ExprPart::Table(t) => Some(t.as_str()),
            ExprPart::Sql(_) => None,
        })
    }

    pub fn render(&self, resolver: &dyn TableResolver) -> String {
        let mut out = String::new();
        for part in &self.parts {
            match part {
                ExprPart::Sql(s) => out.push_str(s),
                ExprPart::Table(t) => out.push_str(&resolver.resolve_table(t)),
            }
        }
        out.replace(['\n', '\r'], " ").trim().to_string()
    }

    /// An expression that is nothing but the given identifier adds no
    /// column to the select list.
    pub fn is_bare(&self, alias: &str) -> bool {
        match self.parts.as_slice() {
            [ExprPart::Sql(s)] => {
                let s = s.trim();
                s == alias || s.trim_matches('"') == alias
            }
            _ => false,
        }
    }
}
