//! Pipeline options and the process-wide options store

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How nodes are clustered in the rendered graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum GroupMode {
    #[default]
    Package,
    Type,
    PackageType,
    None,
}

impl FromStr for GroupMode {
    type Err = Error;

    /// Accepts a comma-separated list of `pkg` and `type`, or `none`.
    fn from_str(s: &str) -> Result<Self> {
        let mut by_package = false;
        let mut by_type = false;
        for part in s.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            match part {
                "pkg" | "package" => by_package = true,
                "type" => by_type = true,
                "none" => {}
                other => {
                    return Err(Error::invalid_option(
                        "group",
                        s,
                        format!("unknown grouping {other:?}, expected pkg, type or none"),
                    ));
                }
            }
        }
        Ok(match (by_package, by_type) {
            (true, true) => GroupMode::PackageType,
            (true, false) => GroupMode::Package,
            (false, true) => GroupMode::Type,
            (false, false) => GroupMode::None,
        })
    }
}

impl fmt::Display for GroupMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GroupMode::Package => "pkg",
            GroupMode::Type => "type",
            GroupMode::PackageType => "pkg,type",
            GroupMode::None => "none",
        })
    }
}

impl TryFrom<String> for GroupMode {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<GroupMode> for String {
    fn from(mode: GroupMode) -> Self {
        mode.to_string()
    }
}

/// Layout direction handed to the layout engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum RankDir {
    #[default]
    LeftRight,
    RightLeft,
    TopBottom,
    BottomTop,
}

impl FromStr for RankDir {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "LR" => Ok(RankDir::LeftRight),
            "RL" => Ok(RankDir::RightLeft),
            "TB" => Ok(RankDir::TopBottom),
            "BT" => Ok(RankDir::BottomTop),
            _ => Err(Error::invalid_option("rankdir", s, "expected LR, RL, TB or BT")),
        }
    }
}

impl fmt::Display for RankDir {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RankDir::LeftRight => "LR",
            RankDir::RightLeft => "RL",
            RankDir::TopBottom => "TB",
            RankDir::BottomTop => "BT",
        })
    }
}

impl TryFrom<String> for RankDir {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<RankDir> for String {
    fn from(dir: RankDir) -> Self {
        dir.to_string()
    }
}

/// How far the `nointer` exception extends from the focus target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Retention {
    /// Focus nodes and their immediate callees.
    #[default]
    Direct,
    /// Everything reachable from the focus nodes.
    Transitive,
}

impl Retention {
    /// Maximum number of hops from the focus, `None` for unbounded.
    pub fn max_depth(self) -> Option<usize> {
        match self {
            Retention::Direct => Some(1),
            Retention::Transitive => None,
        }
    }
}

impl FromStr for Retention {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim() {
            "direct" => Ok(Retention::Direct),
            "transitive" => Ok(Retention::Transitive),
            _ => Err(Error::invalid_option("retention", s, "expected direct or transitive")),
        }
    }
}

/// Global style directives for the rendered graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StyleOptions {
    /// Minimum edge length in ranks.
    pub minlen: u32,
    /// Minimum space between adjacent nodes of the same rank, in inches.
    pub nodesep: f64,
    pub nodeshape: String,
    pub nodestyle: String,
    pub rankdir: RankDir,
}

impl Default for StyleOptions {
    fn default() -> Self {
        StyleOptions {
            minlen: 2,
            nodesep: 0.35,
            nodeshape: "box".to_string(),
            nodestyle: "filled,rounded".to_string(),
            rankdir: RankDir::LeftRight,
        }
    }
}

/// Every switch that affects what the pipeline produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Options {
    /// Function name, package import path or package name to highlight.
    pub focus: String,
    pub group: GroupMode,
    /// Keep only packages whose path starts with one of these prefixes.
    pub limit: Vec<String>,
    /// Drop packages whose path starts with one of these prefixes.
    pub ignore: Vec<String>,
    /// Keep only packages whose path starts with one of these prefixes;
    /// applied before `ignore`.
    pub include: Vec<String>,
    /// Omit standard-library functions.
    pub nostd: bool,
    /// Omit unexported functions not reachable from the focus.
    pub nointer: bool,
    /// Include test code.
    pub tests: bool,
    pub retention: Retention,
    pub style: StyleOptions,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            focus: "main".to_string(),
            group: GroupMode::Package,
            limit: Vec::new(),
            ignore: Vec::new(),
            include: Vec::new(),
            nostd: true,
            nointer: true,
            tests: false,
            retention: Retention::Direct,
            style: StyleOptions::default(),
        }
    }
}

/// Split a comma-separated prefix list, dropping blanks.
pub fn parse_prefixes(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Ok(true),
        "false" | "0" | "off" | "no" => Ok(false),
        _ => Err(Error::invalid_option(key, value, "expected true or false")),
    }
}

fn normalize_prefixes(prefixes: &[String]) -> Vec<String> {
    prefixes
        .iter()
        .map(|p| p.trim())
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

impl Options {
    /// Canonical form: trimmed focus, sorted and deduplicated prefix lists.
    /// Two option sets that filter identically normalize to equal values.
    pub fn normalized(&self) -> Options {
        Options {
            focus: self.focus.trim().to_string(),
            limit: normalize_prefixes(&self.limit),
            ignore: normalize_prefixes(&self.ignore),
            include: normalize_prefixes(&self.include),
            ..self.clone()
        }
    }

    /// Check values that the type system cannot.
    pub fn validate(&self) -> Result<()> {
        let style = &self.style;
        if !style.nodesep.is_finite() || style.nodesep < 0.0 {
            return Err(Error::invalid_option(
                "nodesep",
                style.nodesep.to_string(),
                "must be a non-negative number",
            ));
        }
        if style.nodeshape.trim().is_empty() {
            return Err(Error::invalid_option("nodeshape", "", "must not be empty"));
        }
        Ok(())
    }

    /// Merge `key=value` overrides. Unknown keys are ignored; the first
    /// invalid value aborts with `self` left unchanged.
    pub fn apply_overrides<'a, I>(&mut self, params: I) -> Result<usize>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut next = self.clone();
        let mut applied = 0;

        for (key, value) in params {
            match key {
                "focus" => next.focus = value.trim().to_string(),
                "group" => next.group = value.parse()?,
                "limit" => next.limit = parse_prefixes(value),
                "ignore" => next.ignore = parse_prefixes(value),
                "include" => next.include = parse_prefixes(value),
                "nostd" => next.nostd = parse_bool(key, value)?,
                "nointer" => next.nointer = parse_bool(key, value)?,
                "tests" => next.tests = parse_bool(key, value)?,
                "retention" => next.retention = value.parse()?,
                "minlen" => {
                    next.style.minlen = value
                        .trim()
                        .parse()
                        .map_err(|_| Error::invalid_option(key, value, "expected a non-negative integer"))?
                }
                "nodesep" => {
                    next.style.nodesep = value
                        .trim()
                        .parse()
                        .map_err(|_| Error::invalid_option(key, value, "expected a number"))?
                }
                "nodeshape" => next.style.nodeshape = value.trim().to_string(),
                "nodestyle" => next.style.nodestyle = value.trim().to_string(),
                "rankdir" => next.style.rankdir = value.parse()?,
                _ => {
                    tracing::trace!("Ignoring unrecognized option {}", key);
                    continue;
                }
            }
            applied += 1;
        }

        next.validate()?;
        *self = next;
        Ok(applied)
    }

    /// Merge a partial JSON object. Keys absent from the payload keep their
    /// current values; unknown keys are ignored.
    pub fn merge_json(&self, payload: &str) -> Result<Options> {
        let patch: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| Error::invalid_option("opts", payload, e.to_string()))?;
        if !patch.is_object() {
            return Err(Error::invalid_option("opts", payload, "expected a JSON object"));
        }

        let mut current = serde_json::to_value(self)
            .map_err(|e| Error::invalid_option("opts", payload, e.to_string()))?;
        merge_known_keys(&mut current, &patch);

        let merged: Options = serde_json::from_value(current)
            .map_err(|e| Error::invalid_option("opts", payload, e.to_string()))?;
        merged.validate()?;
        Ok(merged)
    }
}

/// Copy keys from `patch` into `target` where `target` already has them,
/// descending into nested objects.
fn merge_known_keys(target: &mut serde_json::Value, patch: &serde_json::Value) {
    let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) else {
        return;
    };
    for (key, value) in patch {
        if let Some(slot) = target.get_mut(key) {
            if slot.is_object() && value.is_object() {
                merge_known_keys(slot, value);
            } else {
                *slot = value.clone();
            }
        }
    }
}

/// Mutable, shared holder of the current options. Pipeline runs work on
/// snapshots so later writes never affect a run in progress.
#[derive(Debug)]
pub struct OptionsStore {
    current: Mutex<Options>,
    defaults: Options,
}

impl OptionsStore {
    pub fn new(defaults: Options) -> Self {
        OptionsStore {
            current: Mutex::new(defaults.clone()),
            defaults,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Options> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Immutable copy of the current options.
    pub fn snapshot(&self) -> Options {
        self.lock().clone()
    }


    /// Current options as JSON.
    pub fn serialize(&self) -> Result<String> {
        serde_json::to_string(&*self.lock())
            .map_err(|e| Error::invalid_option("opts", "", e.to_string()))
    }

    /// Parse a complete serialized options value.
    pub fn deserialize(bytes: &[u8]) -> Result<Options> {
        let options: Options = serde_json::from_slice(bytes).map_err(|e| {
            Error::invalid_option("opts", String::from_utf8_lossy(bytes), e.to_string())
        })?;
        options.validate()?;
        Ok(options)
    }

    /// Merge a serialized partial override into the store.
    pub fn merge_serialized(&self, payload: &str) -> Result<Options> {
        let mut guard = self.lock();
        let merged = guard.merge_json(payload)?;
        *guard = merged.clone();
        Ok(merged)
    }

    /// Merge query-style overrides into the store.
    pub fn apply_overrides<'a, I>(&self, params: I) -> Result<Options>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut guard = self.lock();
        let applied = guard.apply_overrides(params)?;
        tracing::debug!("Applied {} option overrides", applied);
        Ok(guard.clone())
    }

    /// Restore the launch-time defaults, then merge `params` on top. An
    /// invalid override leaves the store as it was.
    pub fn reset_with_overrides<'a, I>(&self, params: I) -> Result<Options>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut next = self.defaults.clone();
        let applied = next.apply_overrides(params)?;
        tracing::debug!("Reset options to defaults, then applied {} overrides", applied);
        *self.lock() = next.clone();
        Ok(next)
    }
}

impl Default for OptionsStore {
    fn default() -> Self {
        Self::new(Options::default())
    }
}
