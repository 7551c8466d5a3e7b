//! Test utilities for Lumis core

use std::collections::BTreeSet;

use chrono::{DateTime, Duration, Utc};

use crate::model::{CallEdge, CodeUnit, UnitKey};

pub const PROJECT: &str = "demo";

pub fn key(file: &str, name: &str) -> UnitKey {
    UnitKey::new(PROJECT, file, name)
}

/// A unit whose body is `def {name}(): ...`.
pub fn unit(file: &str, name: &str) -> CodeUnit {
    CodeUnit::new(key(file, name), format!("def {}(): pass", name))
}

/// A unit last modified `days` days before `now`.
pub fn aged_unit(file: &str, name: &str, now: DateTime<Utc>, days: i64) -> CodeUnit {
    unit(file, name).with_metadata(Some(now - Duration::days(days)), Some("dev@example.com".into()))
}

pub fn edge(file: &str, name: &str, target: &str) -> CallEdge {
    CallEdge::new(key(file, name), target)
}

pub fn targets(names: &[&str]) -> BTreeSet<String> {
    names.iter().map(|s| s.to_string()).collect()
}
