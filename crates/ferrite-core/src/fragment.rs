//! Parameterized SQL fragments.

use crate::value::SqlValue;

/// A parameterized SQL snippet plus its ordered bound values.
///
/// Invariant: the number of `?` placeholders in `sql` equals
/// `params.len()`, and parameter order matches placeholder order
/// left-to-right. Every constructor in this crate preserves it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fragment {
    sql: String,
    params: Vec<SqlValue>,
}

impl Fragment {
    /// Creates a fragment from SQL text and its parameters.
    #[must_use]
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// Creates a fragment with no parameters.
    #[must_use]
    pub fn raw(sql: impl Into<String>) -> Self {
        Self::new(sql, vec![])
    }

    /// Returns the SQL text.
    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Returns the bound parameters in placeholder order.
    #[must_use]
    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    /// Returns the number of `?` placeholders in the SQL text.
    #[must_use]
    pub fn placeholder_count(&self) -> usize {
        self.sql.matches('?').count()
    }

    /// Consumes the fragment and returns its parts.
    #[must_use]
    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.sql, self.params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_count() {
        let frag = Fragment::new("a = ? AND b IN (?, ?)", vec![
            SqlValue::Int(1),
            SqlValue::Int(2),
            SqlValue::Int(3),
        ]);
        assert_eq!(frag.placeholder_count(), 3);
        assert_eq!(frag.placeholder_count(), frag.params().len());
    }
}
