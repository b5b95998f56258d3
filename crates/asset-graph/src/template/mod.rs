// SPDX-License-Identifier: AGPL-3.0-or-later
//! Template binding
//!
//! Renders a template body against a flat record of named values. This is
//! one narrow substitution step: `{{ .Field }}` placeholders, `range`
//! blocks over lists, and two helpers, `indent` and `add`. Binding is pure,
//! so the same body and record always produce the same bytes, and any
//! unresolved placeholder fails the whole file.

mod parser;
mod render;

use serde::Serialize;

use crate::error::{AssetError, Result};

/// A parsed template body
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<parser::Node>,
}

impl Template {
    /// Parse `source`, naming the template `name` in errors
    pub fn parse(name: impl Into<String>, source: &str) -> Result<Self> {
        let name = name.into();
        match parser::parse(source) {
            Ok(nodes) => Ok(Self { name, nodes }),
            Err(message) => Err(AssetError::Binding {
                file: name,
                message,
            }),
        }
    }

    /// Render against any serializable record
    pub fn render<T: Serialize>(&self, data: &T) -> Result<String> {
        let value = serde_json::to_value(data).map_err(|error| AssetError::Binding {
            file: self.name.clone(),
            message: error.to_string(),
        })?;
        self.render_value(&value)
    }

    /// Render against an already converted record
    pub fn render_value(&self, data: &serde_json::Value) -> Result<String> {
        render::render(&self.nodes, data).map_err(|message| AssetError::Binding {
            file: self.name.clone(),
            message,
        })
    }
}

/// Indent every line after the first by `width` spaces.
///
/// Used to embed a multi-line block in an indented YAML scalar whose first
/// line is already positioned by the template.
pub fn indent(width: usize, text: &str) -> String {
    let newline = format!("\n{}", " ".repeat(width));
    text.replace('\n', &newline)
}

/// Integer addition, `None` on overflow
pub fn add(left: i64, right: i64) -> Option<i64> {
    left.checked_add(right)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    #[serde(rename_all = "PascalCase")]
    struct Record {
        cluster_id: String,
        root_ca_cert: String,
        hostnames: Vec<String>,
        missing: Option<String>,
    }

    fn record() -> Record {
        Record {
            cluster_id: "0d0c7e5a".to_string(),
            root_ca_cert: "-----BEGIN CERTIFICATE-----\nMIIB\n-----END CERTIFICATE-----".to_string(),
            hostnames: vec!["etcd-0".to_string(), "etcd-1".to_string()],
            missing: None,
        }
    }

    fn bind(name: &str, source: &str) -> Result<String> {
        Template::parse(name, source)?.render(&record())
    }

    #[test]
    fn test_indent_two_lines() {
        assert_eq!(indent(2, "a\nb"), "a\n  b");
        assert_eq!(indent(4, "single"), "single");
        assert_eq!(indent(0, "a\nb"), "a\nb");
    }

    #[test]
    fn test_bind_yaml_block() {
        let source = "data:\n  ca.crt: |\n    {{ .RootCaCert | indent 4 }}\n  id: {{ .ClusterId }}\n";
        let output = bind("configmap-root-ca.yaml", source).unwrap();
        assert_eq!(
            output,
            "data:\n  ca.crt: |\n    -----BEGIN CERTIFICATE-----\n    MIIB\n    -----END CERTIFICATE-----\n  id: 0d0c7e5a\n"
        );
    }

    #[test]
    fn test_bind_deterministic() {
        let source = "{{- range $i, $h := .Hostnames }}\n- {{ $h }}:{{ add $i 10 }}\n{{- end }}\n";
        let first = bind("a", source).unwrap();
        let second = bind("a", source).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, "\n- etcd-0:10\n- etcd-1:11\n");
    }

    #[test]
    fn test_unresolved_placeholder_is_binding_error() {
        let error = bind("pull.json", "{{ .Missing }}").err().unwrap();
        match error {
            AssetError::Binding { file, .. } => assert_eq!(file, "pull.json"),
            other => panic!("Expected Binding error, got {other}"),
        }
        assert!(bind("x", "{{ .NotInSchema }}").is_err());
    }

    #[test]
    fn test_malformed_template_is_binding_error() {
        assert!(matches!(
            Template::parse("broken", "{{ range .Hostnames }}"),
            Err(AssetError::Binding { .. })
        ));
    }
}
