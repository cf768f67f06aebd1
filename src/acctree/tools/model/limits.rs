use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use super::change::{Field, FieldChange, FieldValue};

/// Resource limits an association can carry. Declaration order doubles as the
/// order limits are written out by the serializer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Fairshare,
    GrpCpuMins,
    GrpCpus,
    GrpJobs,
    GrpNodes,
    GrpSubmitJobs,
    GrpWall,
    MaxCpuMinsPerJob,
    MaxCpusPerJob,
    MaxJobs,
    MaxNodesPerJob,
    MaxSubmitJobs,
    MaxWallDurationPerJob,
}

impl LimitKind {
    pub const ALL: [LimitKind; 13] = [
        LimitKind::Fairshare,
        LimitKind::GrpCpuMins,
        LimitKind::GrpCpus,
        LimitKind::GrpJobs,
        LimitKind::GrpNodes,
        LimitKind::GrpSubmitJobs,
        LimitKind::GrpWall,
        LimitKind::MaxCpuMinsPerJob,
        LimitKind::MaxCpusPerJob,
        LimitKind::MaxJobs,
        LimitKind::MaxNodesPerJob,
        LimitKind::MaxSubmitJobs,
        LimitKind::MaxWallDurationPerJob,
    ];

    /// Canonical key used in load files.
    pub fn key(self) -> &'static str {
        match self {
            LimitKind::Fairshare => "Fairshare",
            LimitKind::GrpCpuMins => "GrpCPUMins",
            LimitKind::GrpCpus => "GrpCPUs",
            LimitKind::GrpJobs => "GrpJobs",
            LimitKind::GrpNodes => "GrpNodes",
            LimitKind::GrpSubmitJobs => "GrpSubmitJobs",
            LimitKind::GrpWall => "GrpWall",
            LimitKind::MaxCpuMinsPerJob => "MaxCPUMinsPerJob",
            LimitKind::MaxCpusPerJob => "MaxCPUsPerJob",
            LimitKind::MaxJobs => "MaxJobs",
            LimitKind::MaxNodesPerJob => "MaxNodesPerJob",
            LimitKind::MaxSubmitJobs => "MaxSubmitJobs",
            LimitKind::MaxWallDurationPerJob => "MaxWallDurationPerJob",
        }
    }

    /// Resolves a key (case-insensitive, short aliases accepted).
    pub fn from_key(key: &str) -> Option<Self> {
        let lowered = key.to_ascii_lowercase();
        let alias = match lowered.as_str() {
            "shares" => Some(LimitKind::Fairshare),
            "maxcpumins" => Some(LimitKind::MaxCpuMinsPerJob),
            "maxcpus" => Some(LimitKind::MaxCpusPerJob),
            "maxnodes" => Some(LimitKind::MaxNodesPerJob),
            "maxwall" => Some(LimitKind::MaxWallDurationPerJob),
            _ => None,
        };
        alias.or_else(|| {
            Self::ALL
                .into_iter()
                .find(|kind| kind.key().eq_ignore_ascii_case(&lowered))
        })
    }

    /// Wall-clock limits take duration literals and are stored in minutes.
    pub fn is_duration(self) -> bool {
        matches!(self, LimitKind::GrpWall | LimitKind::MaxWallDurationPerJob)
    }
}

impl fmt::Display for LimitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// A limit value as written in a load file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Clears the limit.
    Unlimited,
    Value(u64),
}

impl Limit {
    /// Parses a count or duration literal for the given limit.
    ///
    /// Negative literals as well as `UNLIMITED` and `INFINITE` map to
    /// [`Limit::Unlimited`]. Durations are converted to whole minutes.
    pub fn parse(kind: LimitKind, raw: &str) -> Result<Limit, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("empty value".to_string());
        }
        if trimmed.eq_ignore_ascii_case("unlimited") || trimmed.eq_ignore_ascii_case("infinite") {
            return Ok(Limit::Unlimited);
        }
        if let Some(magnitude) = trimmed.strip_prefix('-') {
            return match magnitude.parse::<u64>() {
                Ok(_) => Ok(Limit::Unlimited),
                Err(_) => Err("not a number".to_string()),
            };
        }
        if kind.is_duration() {
            parse_minutes(trimmed).map(Limit::Value)
        } else {
            trimmed
                .parse::<u64>()
                .map(Limit::Value)
                .map_err(|err| err.to_string())
        }
    }

    /// Stored form of the limit: `None` when unlimited.
    pub fn stored(self) -> Option<u64> {
        match self {
            Limit::Unlimited => None,
            Limit::Value(value) => Some(value),
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Unlimited => f.write_str("-1"),
            Limit::Value(value) => write!(f, "{value}"),
        }
    }
}

/// Parses `minutes`, `MM:SS`, `HH:MM:SS`, `D-HH`, `D-HH:MM` or `D-HH:MM:SS`
/// into minutes, rounding leftover seconds up.
pub fn parse_minutes(raw: &str) -> Result<u64, String> {
    fn number(part: &str) -> Result<u64, String> {
        part.trim()
            .parse::<u64>()
            .map_err(|_| format!("'{part}' is not a number"))
    }

    /// Sums `(value, unit)` pairs as seconds.
    fn seconds(parts: &[(&str, u64)]) -> Result<u64, String> {
        parts.iter().try_fold(0u64, |total, (part, unit)| {
            number(part)?
                .checked_mul(*unit)
                .and_then(|value| total.checked_add(value))
                .ok_or_else(out_of_range)
        })
    }

    fn out_of_range() -> String {
        "value out of range".to_string()
    }

    let (days, clock) = match raw.split_once('-') {
        Some((days, clock)) => (number(days)?, Some(clock)),
        None => (0, None),
    };

    let total = match clock {
        Some(clock) => {
            let parts: Vec<&str> = clock.split(':').collect();
            match parts.as_slice() {
                [hours] => seconds(&[(*hours, 3600)])?,
                [hours, minutes] => seconds(&[(*hours, 3600), (*minutes, 60)])?,
                [hours, minutes, secs] => seconds(&[(*hours, 3600), (*minutes, 60), (*secs, 1)])?,
                _ => return Err("too many ':' separated parts".to_string()),
            }
        }
        None => {
            let parts: Vec<&str> = raw.split(':').collect();
            match parts.as_slice() {
                [minutes] => seconds(&[(*minutes, 60)])?,
                [minutes, secs] => seconds(&[(*minutes, 60), (*secs, 1)])?,
                [hours, minutes, secs] => seconds(&[(*hours, 3600), (*minutes, 60), (*secs, 1)])?,
                _ => return Err("too many ':' separated parts".to_string()),
            }
        }
    };

    days.checked_mul(24 * 60)
        .and_then(|minutes| minutes.checked_add(total.div_ceil(60)))
        .ok_or_else(out_of_range)
}

/// Sign attached to a key in a load file: `=`, `+=` or `-=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MergeSign {
    #[default]
    Set,
    Add,
    Remove,
}

/// Change to a set-valued field (QOS names, coordinator lists).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetPatch {
    Replace(BTreeSet<String>),
    Add(BTreeSet<String>),
    Remove(BTreeSet<String>),
}

impl SetPatch {
    /// Builds a patch from a comma separated list.
    pub fn from_list(sign: MergeSign, raw: &str) -> Self {
        let items: BTreeSet<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect();
        match sign {
            MergeSign::Set => SetPatch::Replace(items),
            MergeSign::Add => SetPatch::Add(items),
            MergeSign::Remove => SetPatch::Remove(items),
        }
    }

    pub fn apply(&self, set: &mut BTreeSet<String>) {
        match self {
            SetPatch::Replace(items) => *set = items.clone(),
            SetPatch::Add(items) => set.extend(items.iter().cloned()),
            SetPatch::Remove(items) => set.retain(|item| !items.contains(item)),
        }
    }
}

/// Applies patches in declaration order to a copy of `base`.
pub fn apply_patches(base: &BTreeSet<String>, patches: &[SetPatch]) -> BTreeSet<String> {
    let mut set = base.clone();
    for patch in patches {
        patch.apply(&mut set);
    }
    set
}

/// Limits stored on an organization or association. Absent entries are
/// unlimited.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub values: BTreeMap<LimitKind, u64>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub qos: BTreeSet<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_qos: Option<String>,
}

impl Limits {
    /// Sets or clears a single limit.
    pub fn set(&mut self, kind: LimitKind, value: Option<u64>) {
        match value {
            Some(value) => {
                self.values.insert(kind, value);
            }
            None => {
                self.values.remove(&kind);
            }
        }
    }
}

/// Limits as declared in a load file. Only declared fields are present.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LimitsDraft {
    pub values: BTreeMap<LimitKind, Limit>,
    pub qos: Vec<SetPatch>,
    pub default_qos: Option<String>,
}

impl LimitsDraft {
    /// Folds a later declaration of the same entity into this one.
    pub fn merge(&mut self, later: LimitsDraft) {
        self.values.extend(later.values);
        self.qos.extend(later.qos);
        if later.default_qos.is_some() {
            self.default_qos = later.default_qos;
        }
    }

    /// Returns `base` with every declared field applied.
    pub fn apply_to(&self, base: &Limits) -> Limits {
        let mut limits = base.clone();
        for (kind, limit) in &self.values {
            limits.set(*kind, limit.stored());
        }
        limits.qos = apply_patches(&base.qos, &self.qos);
        if let Some(default_qos) = &self.default_qos {
            limits.default_qos = non_empty(default_qos);
        }
        limits
    }

    /// Appends one change per declared field that differs from `base`.
    pub fn diff(&self, base: &Limits, changes: &mut Vec<FieldChange>) {
        for (kind, limit) in &self.values {
            let before = base.values.get(kind).copied();
            let after = limit.stored();
            if before != after {
                changes.push(FieldChange {
                    field: Field::Limit(*kind),
                    before: FieldValue::Count(before),
                    after: FieldValue::Count(after),
                });
            }
        }

        if !self.qos.is_empty() {
            let after = apply_patches(&base.qos, &self.qos);
            if after != base.qos {
                changes.push(FieldChange {
                    field: Field::Qos,
                    before: FieldValue::Tags(base.qos.clone()),
                    after: FieldValue::Tags(after),
                });
            }
        }

        if let Some(default_qos) = &self.default_qos {
            let after = non_empty(default_qos);
            if after != base.default_qos {
                changes.push(FieldChange {
                    field: Field::DefaultQos,
                    before: FieldValue::Text(base.default_qos.clone()),
                    after: FieldValue::Text(after),
                });
            }
        }
    }
}

pub(crate) fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}
