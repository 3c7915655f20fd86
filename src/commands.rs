pub mod init;
pub mod render;
pub mod serve;

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde_json::Value;

use crate::template::Template;

/// Make a command line path absolute against the working directory.
fn absolute(path: &Path) -> Result<PathBuf, anyhow::Error> {
    Ok(if path.is_relative() {
        std::env::current_dir()?.join(path)
    } else {
        path.to_path_buf()
    })
}

/// Read a template record from a YAML or JSON file.
pub async fn read_template(path: &Path) -> Result<Template, anyhow::Error> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read template {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("invalid template {}", path.display()))
}

/// Read the variables of a render from a YAML or JSON file. No file means
/// no variables.
pub async fn read_data(path: Option<&Path>) -> Result<Value, anyhow::Error> {
    let Some(path) = path else {
        return Ok(Value::Object(Default::default()));
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read variables {}", path.display()))?;
    serde_yaml::from_str(&text)
        .with_context(|| format!("invalid variables {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_read_template_yaml_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("template.yaml");
        std::fs::write(
            &yaml,
            "name: Convocation\ncontent: \"<p>{first_name}</p>\"\nfooter_enabled: false\n",
        )
        .unwrap();
        let t = read_template(&yaml).await.unwrap();
        assert_eq!(t.title(), "Convocation");
        assert_eq!(t.content_html(), "<p>{first_name}</p>");
        assert!(!t.footer_enabled());

        let json_path = dir.path().join("template.json");
        std::fs::write(&json_path, r#"{ "content": { "html": "<p>x</p>" } }"#).unwrap();
        assert_eq!(read_template(&json_path).await.unwrap().content_html(), "<p>x</p>");
    }

    #[tokio::test]
    async fn test_read_data() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("variables.json");
        std::fs::write(&path, r#"{ "student": { "name": "Marie" }, "hours": 35 }"#).unwrap();

        assert_eq!(
            read_data(Some(path.as_path())).await.unwrap(),
            json!({ "student": { "name": "Marie" }, "hours": 35 })
        );
        assert_eq!(read_data(None).await.unwrap(), json!({}));
        assert!(read_data(Some(dir.path().join("missing.json").as_path())).await.is_err());
    }
}
