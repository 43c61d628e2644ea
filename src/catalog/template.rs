//! Named-placeholder templates for statements the warehouse cannot prepare
//!
//! COPY is a utility statement: its source location and IAM role cannot be
//! bound as `$1` parameters. Templates name their inputs (`{log_data}`) and
//! every value is rendered through [`quote_literal`], which doubles both
//! backslashes and single quotes, so a value stays inside its literal.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::validation::quote_literal;

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([a-z_][a-z0-9_]*)\}").expect("valid regex"));

/// Error raised while rendering a template
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// The template references a value that was not supplied
    #[error("no value supplied for placeholder '{{{0}}}'")]
    MissingParameter(String),

    /// A value was supplied for a placeholder the template does not have
    #[error("template has no placeholder '{{{0}}}'")]
    UnknownParameter(String),

    /// A table is listed for loading but has no COPY template
    #[error("no COPY template for table '{0}'")]
    NoTemplate(String),
}

/// A SQL statement with named placeholders
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlTemplate {
    text: &'static str,
}

impl SqlTemplate {
    pub const fn new(text: &'static str) -> Self {
        Self { text }
    }

    /// Raw template text
    pub fn text(&self) -> &'static str {
        self.text
    }

    /// Placeholder names in order of first appearance
    pub fn placeholders(&self) -> Vec<&'static str> {
        let mut names = Vec::new();
        for m in PLACEHOLDER.find_iter(self.text) {
            let name = strip_braces(m.as_str());
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Render the template, quoting each value as a string literal
    ///
    /// Every placeholder must have a value and every value must belong to a
    /// placeholder. Rendering is a single pass, so braces inside a value are
    /// never expanded.
    pub fn render(&self, params: &[(&str, &str)]) -> Result<String, TemplateError> {
        let placeholders = self.placeholders();
        if let Some((name, _)) = params
            .iter()
            .find(|(name, _)| !placeholders.iter().any(|p| p == name))
        {
            return Err(TemplateError::UnknownParameter(name.to_string()));
        }

        let mut out = String::with_capacity(self.text.len() + 64);
        let mut last = 0;
        for m in PLACEHOLDER.find_iter(self.text) {
            let name = strip_braces(m.as_str());
            let value = params
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| *value)
                .ok_or_else(|| TemplateError::MissingParameter(name.to_string()))?;

            out.push_str(&self.text[last..m.start()]);
            out.push_str(&quote_literal(value));
            last = m.end();
        }
        out.push_str(&self.text[last..]);

        Ok(out)
    }
}

fn strip_braces(token: &str) -> &str {
    &token[1..token.len() - 1]
}

/// Check whether text still contains a placeholder token
pub fn has_placeholders(sql: &str) -> bool {
    PLACEHOLDER.is_match(sql)
}

#[cfg(test)]
mod tests {
    use super::*;

    const COPY: SqlTemplate =
        SqlTemplate::new("COPY t FROM {source} IAM_ROLE {role} REGION {region} -- {source}");

    #[test]
    fn test_placeholders_in_order() {
        assert_eq!(COPY.placeholders(), vec!["source", "role", "region"]);
    }

    #[test]
    fn test_render_quotes_values() {
        let sql = COPY
            .render(&[
                ("source", "s3://bucket/logs"),
                ("role", "arn:aws:iam::1:role/x"),
                ("region", "us-west-2"),
            ])
            .unwrap();

        assert_eq!(
            sql,
            "COPY t FROM 's3://bucket/logs' IAM_ROLE 'arn:aws:iam::1:role/x' REGION 'us-west-2' -- 's3://bucket/logs'"
        );
        assert!(!has_placeholders(&sql));
    }

    #[test]
    fn test_render_missing_parameter() {
        let err = COPY
            .render(&[("source", "s3://bucket/logs"), ("role", "r")])
            .unwrap_err();
        assert_eq!(err, TemplateError::MissingParameter("region".to_string()));
    }

    #[test]
    fn test_render_unknown_parameter() {
        let err = COPY
            .render(&[
                ("source", "a"),
                ("role", "b"),
                ("region", "c"),
                ("bucket", "d"),
            ])
            .unwrap_err();
        assert_eq!(err, TemplateError::UnknownParameter("bucket".to_string()));
    }

    #[test]
    fn test_render_does_not_expand_values() {
        let template = SqlTemplate::new("SELECT {a}, {b}");
        let sql = template.render(&[("a", "{b}"), ("b", "x")]).unwrap();
        assert_eq!(sql, "SELECT '{b}', 'x'");
    }

    #[test]
    fn test_render_escapes_quotes() {
        let template = SqlTemplate::new("COPY t FROM {source}");
        let sql = template
            .render(&[("source", "s3://b/x' IAM_ROLE 'evil")])
            .unwrap();
        assert_eq!(sql, "COPY t FROM 's3://b/x'' IAM_ROLE ''evil'");
    }

    #[test]
    fn test_render_escapes_backslashes() {
        let template = SqlTemplate::new("COPY t FROM {source} IAM_ROLE 'r'");
        let sql = template
            .render(&[("source", r"s3://b/x\' ; DROP TABLE users; --")])
            .unwrap();
        assert_eq!(
            sql,
            r"COPY t FROM 's3://b/x\\'' ; DROP TABLE users; --' IAM_ROLE 'r'"
        );

        let sql = template.render(&[("source", r"a\")]).unwrap();
        assert_eq!(sql, r"COPY t FROM 'a\\' IAM_ROLE 'r'");
    }

    #[test]
    fn test_quoted_literals_are_not_placeholders() {
        assert!(!has_placeholders("FORMAT AS JSON 'auto'"));
        assert!(has_placeholders("FROM {log_data}"));
    }
}
