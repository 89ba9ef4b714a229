//! The nested bilancio template and the path index built over it.
//!
//! A template is a JSON object whose top-level keys are statement sections
//! (`Stato_patrimoniale`, `Conto_economico`, plus an `informazioni_generali`
//! block that is never indexed). Leaves are numbers; objects are sections.
//! Paths are the keys joined with `.`.

use crate::error::Result;
use log::debug;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

pub const GENERAL_INFO_KEY: &str = "informazioni_generali";

/// Loads a template from disk. A missing file yields an empty object.
pub fn load_existing_json<P: AsRef<Path>>(path: P) -> Result<Value> {
    let path = path.as_ref();
    if !path.exists() {
        debug!("template {} not found, starting from an empty object", path.display());
        return Ok(Value::Object(Map::new()));
    }
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Every `(key, full_path)` pair in document order, top-level keys included.
pub fn extract_keys(data: &Value) -> Vec<(String, String)> {
    fn walk(map: &Map<String, Value>, parent: &str, out: &mut Vec<(String, String)>) {
        for (key, value) in map {
            let full = if parent.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", parent, key)
            };
            out.push((key.clone(), full.clone()));
            if let Value::Object(child) = value {
                walk(child, &full, out);
            }
        }
    }

    let mut out = Vec::new();
    if let Value::Object(map) = data {
        walk(map, "", &mut out);
    }
    out
}

#[derive(Debug, Clone, PartialEq)]
pub struct PathInfo {
    pub final_key: String,
    pub depth: usize,
    pub parents: Vec<String>,
    pub has_children: bool,
}

/// Lookup tables over a template's paths.
#[derive(Debug, Clone, Default)]
pub struct HierarchicalIndex {
    by_final_key: HashMap<String, Vec<String>>,
    key_order: Vec<String>,
    by_full_path: HashMap<String, PathInfo>,
    by_context: HashMap<String, Vec<String>>,
}

impl HierarchicalIndex {
    pub fn build(data: &Value) -> Self {
        let mut index = Self::default();
        if let Value::Object(sections) = data {
            for (section_key, section) in sections {
                if section_key == GENERAL_INFO_KEY {
                    continue;
                }
                if let Value::Object(map) = section {
                    index.walk(map, section_key, 1);
                }
            }
        }
        debug!(
            "indexed {} paths under {} distinct keys",
            index.by_full_path.len(),
            index.key_order.len()
        );
        index
    }

    fn push_key(&mut self, key: &str, path: &str) {
        if !self.by_final_key.contains_key(key) {
            self.key_order.push(key.to_string());
        }
        let entry = self.by_final_key.entry(key.to_string()).or_default();
        if !entry.iter().any(|p| p == path) {
            entry.push(path.to_string());
        }
    }

    fn walk(&mut self, map: &Map<String, Value>, parent_path: &str, depth: usize) {
        for (key, value) in map {
            let full_path = format!("{}.{}", parent_path, key);

            self.push_key(key, &full_path);
            let without_apostrophes = key.replace('\'', "");
            if without_apostrophes != *key {
                self.push_key(&without_apostrophes, &full_path);
            }

            let parents: Vec<String> = parent_path.split('.').map(str::to_string).collect();
            for width in 1..=parents.len().min(3) {
                let context = parents[parents.len() - width..].join(".");
                let paths = self.by_context.entry(context).or_default();
                if !paths.contains(&full_path) {
                    paths.push(full_path.clone());
                }
            }

            self.by_full_path.insert(
                full_path.clone(),
                PathInfo {
                    final_key: key.clone(),
                    depth,
                    parents,
                    has_children: value.is_object(),
                },
            );

            if let Value::Object(child) = value {
                self.walk(child, &full_path, depth + 1);
            }
        }
    }

    pub fn contains_path(&self, path: &str) -> bool {
        self.by_full_path.contains_key(path)
    }

    pub fn info(&self, path: &str) -> Option<&PathInfo> {
        self.by_full_path.get(path)
    }

    pub fn paths_for_key(&self, key: &str) -> &[String] {
        self.by_final_key.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn paths_in_context(&self, context: &str) -> &[String] {
        self.by_context.get(context).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Final keys in first-seen order.
    pub fn final_keys(&self) -> impl Iterator<Item = &str> {
        self.key_order.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.by_full_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_full_path.is_empty()
    }
}

pub fn build_hierarchical_index(data: &Value) -> HierarchicalIndex {
    HierarchicalIndex::build(data)
}

pub fn get_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(data, |node, key| node.as_object()?.get(key))
}

pub fn get_path_mut<'a>(data: &'a mut Value, path: &str) -> Option<&'a mut Value> {
    path.split('.')
        .try_fold(data, |node, key| node.as_object_mut()?.get_mut(key))
}

pub fn get_number(data: &Value, path: &str) -> Option<f64> {
    get_path(data, path).and_then(Value::as_f64)
}

pub fn is_object_at(data: &Value, path: &str) -> bool {
    get_path(data, path).map(Value::is_object).unwrap_or(false)
}

/// Overwrites an existing numeric leaf. Never creates keys; returns whether
/// a write happened.
pub fn set_existing_leaf(data: &mut Value, path: &str, value: f64) -> bool {
    match get_path_mut(data, path) {
        Some(slot) if !slot.is_object() => {
            *slot = Value::from(value);
            true
        }
        _ => false,
    }
}
