use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use crate::acctree::tools::build::{Fields, build_cluster, build_organization, build_principal};
use crate::acctree::tools::error::{Diagnostic, ParseError, Result, ToolError};
use crate::acctree::tools::hierarchy::HierarchyResolver;
use crate::acctree::tools::io::dump::write_snapshot;
use crate::acctree::tools::io::lines::LineAssembler;
use crate::acctree::tools::io::tokenize::{Declaration, DeclarationKind, parse_declaration};
use crate::acctree::tools::model::{
    ClusterDraft, Draft, EntityKey, LimitsDraft, ROOT_ORGANIZATION, Snapshot,
};
use crate::acctree::tools::reconcile::{Modification, Reconciler};

/// Source of the live state of a cluster.
pub trait SnapshotProvider {
    /// Returns `None` when the cluster is not known yet.
    fn fetch(&self, cluster: &str) -> Result<Option<Snapshot>>;
}

/// Destination for classified drafts.
pub trait CommitSink {
    fn add(&mut self, draft: &Draft) -> Result<()>;
    fn modify(&mut self, modification: &Modification) -> Result<()>;
}

/// Settings for a single load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadOptions {
    /// Loads into this cluster regardless of the file's `Cluster` line; also
    /// allows files without one.
    pub cluster: Option<String>,
}

/// Everything a load classified, plus the problems it found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadResult {
    pub cluster: Option<String>,
    pub added: Vec<Draft>,
    pub modified: Vec<Modification>,
    pub unchanged: Vec<EntityKey>,
    pub errors: Vec<Diagnostic>,
    pub advisories: Vec<String>,
    /// Set when a fatal error stopped line consumption early.
    pub halted: bool,
    /// Physical lines read.
    pub lines: usize,
}

impl LoadResult {
    pub fn has_changes(&self) -> bool {
        !self.added.is_empty() || !self.modified.is_empty()
    }

    /// The diagnostic that halted the load, if any.
    pub fn fatal(&self) -> Option<&Diagnostic> {
        self.errors.iter().find(|diagnostic| diagnostic.error.is_fatal())
    }

    fn record(&mut self, line: usize, error: ParseError) {
        warn!(line, %error, "load file problem");
        self.errors.push(Diagnostic::new(line, error));
    }
}

impl fmt::Display for LoadResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let cluster = self.cluster.as_deref().unwrap_or("(none)");
        writeln!(
            f,
            "Cluster {cluster}: {} to add, {} to modify, {} unchanged",
            self.added.len(),
            self.modified.len(),
            self.unchanged.len()
        )?;
        if !self.added.is_empty() {
            writeln!(f, " Adding:")?;
            for draft in &self.added {
                writeln!(f, "  {draft}")?;
            }
        }
        if !self.modified.is_empty() {
            writeln!(f, " Modifying:")?;
            for modification in &self.modified {
                writeln!(f, "  {}", modification.key)?;
                for change in &modification.changes {
                    writeln!(f, "    {change}")?;
                }
            }
        }
        if !self.errors.is_empty() {
            writeln!(f, " Problems:")?;
            for diagnostic in &self.errors {
                writeln!(f, "  {diagnostic}")?;
            }
        }
        for advisory in &self.advisories {
            writeln!(f, " Note: {advisory}")?;
        }
        if self.halted {
            writeln!(f, " Processing stopped early; nothing after the fatal problem was read.")?;
        }
        Ok(())
    }
}

/// Outcome of handing a load result to a [`CommitSink`].
#[derive(Debug, Default)]
pub struct CommitReport {
    pub committed: usize,
    /// First failure; nothing after it was attempted.
    pub failure: Option<ToolError>,
}

impl CommitReport {
    pub fn into_result(self) -> Result<usize> {
        match self.failure {
            Some(error) => Err(error),
            None => Ok(self.committed),
        }
    }
}

/// Parses a load file and classifies every declaration against the live
/// state of its cluster.
///
/// Only collaborator failures (reading input, fetching the snapshot) are
/// returned as errors; problems in the file end up in
/// [`LoadResult::errors`].
#[instrument(level = "info", skip_all, fields(cluster = ?options.cluster))]
pub fn load<R: BufRead>(
    reader: R,
    provider: &dyn SnapshotProvider,
    options: &LoadOptions,
) -> Result<LoadResult> {
    let mut lines = LineAssembler::new(reader);
    let mut result = LoadResult::default();

    let Some(first) = next_declaration(&mut lines, &mut result)? else {
        result.lines = lines.physical_lines();
        info!("load file has no declarations");
        return Ok(result);
    };

    let (cluster, cluster_draft, pending) = match first.kind {
        DeclarationKind::Cluster => {
            let draft = cluster_from(&first, &mut result, options);
            match draft {
                Some(draft) => (draft.name.clone(), draft, None),
                None => {
                    result.record(
                        first.line,
                        ParseError::MissingCluster {
                            kind: first.kind.to_string(),
                        },
                    );
                    result.halted = true;
                    result.lines = lines.physical_lines();
                    return Ok(result);
                }
            }
        }
        kind => match &options.cluster {
            Some(cluster) => (
                cluster.clone(),
                ClusterDraft {
                    name: cluster.clone(),
                    limits: LimitsDraft::default(),
                },
                Some(first),
            ),
            None => {
                result.record(
                    first.line,
                    ParseError::MissingCluster {
                        kind: kind.to_string(),
                    },
                );
                result.halted = true;
                result.lines = lines.physical_lines();
                return Ok(result);
            }
        },
    };

    let fetched = provider.fetch(&cluster)?;
    let cluster_exists = fetched.is_some();
    let snapshot = fetched.unwrap_or_else(|| Snapshot::empty(&cluster));
    info!(
        %cluster,
        cluster_exists,
        organizations = snapshot.organizations.len(),
        associations = snapshot.associations.len(),
        "fetched snapshot"
    );

    let mut session = Session {
        snapshot: &snapshot,
        cluster: cluster.clone(),
        override_cluster: options.cluster.is_some(),
        resolver: HierarchyResolver::new(),
        reconciler: Reconciler::new(&snapshot, cluster_exists),
    };
    session.reconciler.submit(Draft::Cluster(cluster_draft));
    result.cluster = Some(cluster);

    let mut next = pending;
    loop {
        let declaration = match next.take() {
            Some(declaration) => declaration,
            None => match next_declaration(&mut lines, &mut result)? {
                Some(declaration) => declaration,
                None => break,
            },
        };
        let line = declaration.line;
        if let Err(error) = session.apply(declaration, &mut result, options) {
            result.record(line, error);
            result.halted = true;
            break;
        }
    }

    let reconciled = session.reconciler.finish();
    result.added = reconciled.added;
    result.modified = reconciled.modified;
    result.unchanged = reconciled.unchanged;
    result.lines = lines.physical_lines();

    info!(
        added = result.added.len(),
        modified = result.modified.len(),
        unchanged = result.unchanged.len(),
        errors = result.errors.len(),
        halted = result.halted,
        "classified load file"
    );
    Ok(result)
}

/// Reads and classifies a load file from disk.
#[instrument(level = "info", skip_all, fields(input = %input.display()))]
pub fn load_file(
    input: &Path,
    provider: &dyn SnapshotProvider,
    options: &LoadOptions,
) -> Result<LoadResult> {
    if !input.exists() {
        return Err(ToolError::MissingInput(input.to_path_buf()));
    }
    let file = File::open(input)?;
    load(BufReader::new(file), provider, options)
}

/// Hands every added and modified entity to the sink, stopping at the first
/// failure.
#[instrument(
    level = "info",
    skip_all,
    fields(added = result.added.len(), modified = result.modified.len())
)]
pub fn commit(result: &LoadResult, sink: &mut dyn CommitSink) -> CommitReport {
    let mut report = CommitReport::default();

    for draft in &result.added {
        if let Err(error) = sink.add(draft) {
            warn!(key = %draft.key(), %error, "commit aborted");
            report.failure = Some(error);
            return report;
        }
        report.committed += 1;
    }

    for modification in &result.modified {
        if let Err(error) = sink.modify(modification) {
            warn!(key = %modification.key, %error, "commit aborted");
            report.failure = Some(error);
            return report;
        }
        report.committed += 1;
    }

    info!(committed = report.committed, "commit finished");
    report
}

/// Loads, then commits when the load finished, found changes and `confirm`
/// approves the result.
pub fn load_and_commit<R, F>(
    reader: R,
    provider: &dyn SnapshotProvider,
    sink: &mut dyn CommitSink,
    options: &LoadOptions,
    confirm: F,
) -> Result<(LoadResult, Option<CommitReport>)>
where
    R: BufRead,
    F: FnOnce(&LoadResult) -> bool,
{
    let result = load(reader, provider, options)?;
    if result.halted || !result.has_changes() {
        return Ok((result, None));
    }
    if !confirm(&result) {
        info!("commit declined");
        return Ok((result, None));
    }
    let report = commit(&result, sink);
    Ok((result, Some(report)))
}

/// Writes a snapshot as a load file.
#[instrument(level = "info", skip_all, fields(cluster = %snapshot.cluster))]
pub fn dump<W: Write>(snapshot: &Snapshot, mut writer: W) -> Result<()> {
    write_snapshot(snapshot, &mut writer)?;
    writer.flush()?;
    info!(
        organizations = snapshot.organizations.len(),
        associations = snapshot.associations.len(),
        "dumped snapshot"
    );
    Ok(())
}

/// Fetches a cluster and dumps it to `output`, or stdout when `None`.
#[instrument(level = "info", skip(provider))]
pub fn dump_cluster(
    provider: &dyn SnapshotProvider,
    cluster: &str,
    output: Option<&Path>,
) -> Result<()> {
    let snapshot = provider
        .fetch(cluster)?
        .ok_or_else(|| ToolError::UnknownCluster(cluster.to_string()))?;
    match output {
        Some(path) => dump(&snapshot, BufWriter::new(File::create(path)?)),
        None => dump(&snapshot, std::io::stdout().lock()),
    }
}

struct Session<'s> {
    snapshot: &'s Snapshot,
    cluster: String,
    override_cluster: bool,
    resolver: HierarchyResolver,
    reconciler: Reconciler<'s>,
}

impl Session<'_> {
    /// Folds one declaration in. Recoverable problems are recorded on
    /// `result`; a returned error is fatal.
    fn apply(
        &mut self,
        declaration: Declaration,
        result: &mut LoadResult,
        options: &LoadOptions,
    ) -> std::result::Result<(), ParseError> {
        let line = declaration.line;
        match declaration.kind {
            DeclarationKind::Cluster => {
                let Some(draft) = cluster_from(&declaration, result, options) else {
                    return Ok(());
                };
                if draft.name != self.cluster && !self.override_cluster {
                    return Err(ParseError::ClusterConflict {
                        current: self.cluster.clone(),
                        declared: draft.name,
                    });
                }
                self.reconciler.submit(Draft::Cluster(ClusterDraft {
                    name: self.cluster.clone(),
                    limits: draft.limits,
                }));
            }
            DeclarationKind::Parent => {
                let fields = collect_fields(&declaration, result);
                match fields.require_name(declaration.kind) {
                    Ok(name) => {
                        self.resolver.enter_parent(&name, self.snapshot)?;
                        debug!(line, parent = %name, "entered parent");
                    }
                    Err(error) => result.record(line, error),
                }
            }
            DeclarationKind::Account => {
                let parent = self.placement(line, result);
                let fields = collect_fields(&declaration, result);
                match build_organization(fields, &parent) {
                    Ok(draft) => {
                        match self
                            .resolver
                            .record_organization(&draft.name, &parent, self.snapshot)
                        {
                            Ok(()) => {
                                self.reconciler.submit(Draft::Organization(draft));
                            }
                            Err(error) => result.record(line, error),
                        }
                    }
                    Err(error) => result.record(line, error),
                }
            }
            DeclarationKind::User => {
                let parent = self.placement(line, result);
                let fields = collect_fields(&declaration, result);
                match build_principal(fields, &parent, &self.cluster) {
                    Ok((principal, association)) => {
                        self.reconciler.submit(Draft::Principal(principal));
                        self.reconciler.submit(Draft::Association(association));
                    }
                    Err(error) => result.record(line, error),
                }
            }
        }
        Ok(())
    }

    fn placement(&mut self, line: usize, result: &mut LoadResult) -> String {
        let placement = self.resolver.place();
        if placement.defaulted_to_root {
            let advisory = format!(
                "line {line}: no Parent declared yet, placing entries under '{ROOT_ORGANIZATION}'"
            );
            warn!("{advisory}");
            result.advisories.push(advisory);
        }
        placement.parent
    }
}

fn collect_fields(declaration: &Declaration, result: &mut LoadResult) -> Fields {
    let mut errors = Vec::new();
    let fields = Fields::collect(declaration.kind, &declaration.options, &mut errors);
    for error in errors {
        result.record(declaration.line, error);
    }
    fields
}

fn cluster_from(
    declaration: &Declaration,
    result: &mut LoadResult,
    options: &LoadOptions,
) -> Option<ClusterDraft> {
    let mut fields = collect_fields(declaration, result);
    if let Some(cluster) = &options.cluster {
        fields.name = Some(cluster.clone());
    }
    match build_cluster(fields) {
        Ok(draft) => Some(draft),
        Err(error) => {
            result.record(declaration.line, error);
            None
        }
    }
}

/// Next non-blank line that parses as a declaration. Lines whose kind cannot
/// be recognised are recorded and skipped.
fn next_declaration<R: BufRead>(
    lines: &mut LineAssembler<R>,
    result: &mut LoadResult,
) -> Result<Option<Declaration>> {
    while let Some(line) = lines.read_logical_line()? {
        if line.is_blank() {
            continue;
        }
        match parse_declaration(&line) {
            Ok((declaration, errors)) => {
                for error in errors {
                    result.record(line.number, error);
                }
                return Ok(Some(declaration));
            }
            Err(error) => result.record(line.number, error),
        }
    }
    Ok(None)
}
