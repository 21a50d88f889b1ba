use std::path::{Component, Path};

use serde::{de::DeserializeOwned, Deserialize, Deserializer};
use serde_json::Value;

use super::sanitize::sanitize_filename;

/// A node of the document tree
///
/// The service tags every node with `"type": "folder" | "file"`, anything
/// else is rejected while building the tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Folder(Folder),
    File(File),
}

impl Node {
    pub fn name(&self) -> &str {
        match self {
            Node::Folder(folder) => &folder.name,
            Node::File(file) => &file.name,
        }
    }
}

/// An interior node, owns its children
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Folder {
    pub name: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub folder_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub code: Option<String>,
    /// Filled in by the tree builder, never read from the raw json directly
    #[serde(skip)]
    pub children: Vec<Node>,
}

/// A document stored in the vault
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct File {
    /// Remote document id (needed for the download)
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub extension: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub deposit_date: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub user_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub folder_id: Option<String>,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_favorite: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_new: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_perso: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub is_visible: bool,
    #[serde(default, deserialize_with = "lenient_flag")]
    pub sharing_duplication: bool,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub type_code: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub issuer_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_size")]
    pub file_size: u64,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub dispatch_id: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub dispatched_doc_id: Option<String>,
    #[serde(default, deserialize_with = "or_default")]
    pub meta_datas: Vec<MetaData>,
}

/// Free form attribute attached to a document
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct MetaData {
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "opt_string_or_number")]
    pub value: Option<String>,
    #[serde(default, rename = "type", alias = "meta_type", deserialize_with = "opt_string_or_number")]
    pub meta_type: Option<String>,
}

impl Folder {
    /// Path segment used for this folder on disk
    ///
    /// Names that already form a single plain segment are kept verbatim,
    /// anything containing separators or `..` is sanitized.
    pub fn local_name(&self) -> String {
        let mut components = Path::new(&self.name).components();
        if let (Some(Component::Normal(segment)), None) = (components.next(), components.next()) {
            if segment == self.name.as_str() {
                return self.name.clone();
            }
        }
        let sanitized = sanitize_filename(&self.name);
        if !sanitized.chars().all(|c| c == '.') {
            return sanitized;
        }
        match &self.folder_id {
            Some(id) => format!("folder_{}", sanitize_filename(id)),
            None => "folder".to_string(),
        }
    }
}

impl File {
    /// File name used on disk: `<sanitized name>.<extension>`
    pub fn local_name(&self) -> String {
        let mut stem = sanitize_filename(&self.name);
        if stem.is_empty() {
            stem = match &self.id {
                Some(id) => sanitize_filename(id),
                None => "document".to_string(),
            };
        }
        match self.extension.as_deref().map(str::trim) {
            Some(extension) if !extension.is_empty() => {
                format!("{}.{}", stem, sanitize_filename(extension))
            }
            _ => stem,
        }
    }
}

/// Descriptive values are sometimes sent as numbers and sometimes as strings
///
/// Anything else is kept as its json text, so a single odd value never
/// rejects the whole node.
fn opt_string_or_number<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}

/// Flags come as booleans, `0`/`1` or `"true"`/`"false"`, anything else is unset
fn lenient_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(b)) => b,
        Some(Value::Number(n)) => n.as_f64().is_some_and(|n| n != 0.0),
        Some(Value::String(s)) => matches!(s.trim().to_ascii_lowercase().as_str(), "true" | "1"),
        _ => false,
    })
}

/// Sizes may be sent as strings, unusable values count as unknown (`0`)
fn lenient_size<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(n)) => n.as_u64().unwrap_or_default(),
        Some(Value::String(s)) => s.trim().parse().unwrap_or_default(),
        _ => 0,
    })
}

/// Falls back to the default for `null` and for values of the wrong shape
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .and_then(|value| T::deserialize(value).ok())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_file_from_normalized_json() {
        let file = File::deserialize(&json!({
            "id": 4711,
            "name": "Bulletin de paie",
            "extension": "pdf",
            "deposit_date": "2024-03-01",
            "is_favorite": null,
            "is_new": true,
            "file_size": 20480,
            "type": "file",
            "meta_datas": [
                { "name": "Mois", "value": "Mars", "type": "TEXT" },
                { "name": "Annee", "value": 2024, "meta_type": "NUMBER" }
            ]
        }))
        .unwrap();

        assert_eq!(file.id.as_deref(), Some("4711"));
        assert_eq!(file.name, "Bulletin de paie");
        assert!(!file.is_favorite);
        assert!(file.is_new);
        assert_eq!(file.file_size, 20480);
        assert_eq!(file.meta_datas.len(), 2);
        assert_eq!(file.meta_datas[0].meta_type.as_deref(), Some("TEXT"));
        assert_eq!(file.meta_datas[1].value.as_deref(), Some("2024"));
        assert_eq!(file.meta_datas[1].meta_type.as_deref(), Some("NUMBER"));
    }

    #[test]
    fn test_descriptive_fields_of_any_type() {
        let file = File::deserialize(&json!({
            "id": "5",
            "name": "odd",
            "extension": 7,
            "deposit_date": 1700000000,
            "type_code": ["A", "B"],
            "issuer_name": null,
            "is_favorite": "true",
            "is_new": 1,
            "is_perso": "maybe",
            "file_size": "1024",
            "meta_datas": "none"
        }))
        .unwrap();

        assert_eq!(file.extension.as_deref(), Some("7"));
        assert_eq!(file.deposit_date.as_deref(), Some("1700000000"));
        assert_eq!(file.type_code.as_deref(), Some(r#"["A","B"]"#));
        assert_eq!(file.issuer_name, None);
        assert!(file.is_favorite);
        assert!(file.is_new);
        assert!(!file.is_perso);
        assert_eq!(file.file_size, 1024);
        assert!(file.meta_datas.is_empty());

        let unusable_size = File::deserialize(&json!({ "name": "x", "file_size": -3 })).unwrap();
        assert_eq!(unusable_size.file_size, 0);
    }

    #[test]
    fn test_file_requires_name() {
        assert!(File::deserialize(&json!({ "id": "1", "extension": "pdf" })).is_err());
    }

    #[test]
    fn test_file_local_name() {
        let file = File {
            id: Some("1".into()),
            name: "My  Report #1".into(),
            extension: Some("pdf".into()),
            ..Default::default()
        };
        assert_eq!(file.local_name(), "My_Report_1.pdf");

        let no_extension = File {
            name: "notes".into(),
            ..Default::default()
        };
        assert_eq!(no_extension.local_name(), "notes");

        let unnamed = File {
            id: Some("42".into()),
            name: "###".into(),
            extension: Some("pdf".into()),
            ..Default::default()
        };
        assert_eq!(unnamed.local_name(), "42.pdf");
    }

    #[test]
    fn test_folder_local_name() {
        let plain = Folder {
            name: "Bulletins de paie".into(),
            ..Default::default()
        };
        assert_eq!(plain.local_name(), "Bulletins de paie");

        let nested = Folder {
            name: "2024/03".into(),
            ..Default::default()
        };
        assert_eq!(nested.local_name(), "2024_03");

        let parent = Folder {
            name: "..".into(),
            folder_id: Some("7".into()),
            ..Default::default()
        };
        assert_eq!(parent.local_name(), "folder_7");

        let empty = Folder::default();
        assert_eq!(empty.local_name(), "folder");
    }
}
