use anyhow::{Context, Result};
use git2::{Commit, DiffFormat, DiffOptions, ObjectType, Oid, Repository, TreeWalkMode, TreeWalkResult};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::{
    collaborators::{LoadPredicate, RepositoryLoader, SourceControl},
    source::{ChangeRecord, SourceSnapshot},
};

/// Reads pull request changes from a local clone.
///
/// The change of a pull request is the diff from the merge base of the base branch
/// and the head to the head, as a hosting service would show it. Without an explicit
/// head, `refs/pull/<number>/head` is used, which is where hosting services publish
/// pull request heads.
pub struct GitSourceControl {
    base_branch: String,
    head: Option<String>,
}

impl GitSourceControl {
    pub fn new(base_branch: impl Into<String>, head: Option<String>) -> Self {
        GitSourceControl {
            base_branch: base_branch.into(),
            head,
        }
    }
}

impl GitSourceControl {
    fn head_spec(&self, pr_number: u64) -> String {
        self.head
            .clone()
            .unwrap_or_else(|| format!("refs/pull/{pr_number}/head"))
    }

    /// Head commit of the pull request and the commit its branch forked from.
    fn fork_point<'r>(&self, repo: &'r Repository, head_spec: &str) -> Result<(Commit<'r>, Oid)> {
        let head = resolve_commit(repo, head_spec)?;
        let base = resolve_commit(repo, &self.base_branch)?;
        let merge_base = repo
            .merge_base(base.id(), head.id())
            .with_context(|| format!("`{}` and `{head_spec}` share no history", self.base_branch))?;
        Ok((head, merge_base))
    }
}

impl SourceControl for GitSourceControl {
    fn list_changed_files(&self, repository: &str, pr_number: u64) -> Result<Vec<ChangeRecord>> {
        let repo = open(repository)?;
        let head_spec = self.head_spec(pr_number);
        let (head, merge_base) = self.fork_point(&repo, &head_spec)?;
        let old_tree = repo.find_commit(merge_base)?.tree()?;
        let new_tree = head.tree()?;

        let mut options = DiffOptions::new();
        options.context_lines(3);
        let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), Some(&mut options))?;

        let mut records: Vec<ChangeRecord> = Vec::new();
        diff.print(DiffFormat::Patch, |delta, _hunk, line| {
            let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) else {
                return true;
            };
            if records.last().map_or(true, |record| record.path != path) {
                records.push(ChangeRecord::new(path, ""));
            }
            let Some(record) = records.last_mut() else {
                return true;
            };
            let content = String::from_utf8_lossy(line.content());
            match line.origin() {
                'H' => record.patch_text.push_str(&content),
                origin @ (' ' | '+' | '-') => {
                    record.patch_text.push(origin);
                    record.patch_text.push_str(&content);
                    if !content.ends_with('\n') {
                        record.patch_text.push('\n');
                    }
                }
                '=' | '>' | '<' => record.patch_text.push_str("\\ No newline at end of file\n"),
                _ => {}
            }
            true
        })?;

        debug!(
            pr_number,
            files = records.len(),
            "listed changed files from {}",
            head_spec
        );
        Ok(records)
    }

    /// The merge base the patches were diffed from. The base branch may have moved
    /// on since, so its tip is not a valid pre-image.
    fn base_revision(&self, repository: &str, pr_number: u64) -> Result<Option<String>> {
        let repo = open(repository)?;
        let (_, merge_base) = self.fork_point(&repo, &self.head_spec(pr_number))?;
        Ok(Some(merge_base.to_string()))
    }
}

/// Reads files from a branch of a local clone without touching the working tree.
#[derive(Default)]
pub struct GitRepositoryLoader;

impl RepositoryLoader for GitRepositoryLoader {
    fn load_files(
        &self,
        repository: &str,
        branch: &str,
        predicate: &LoadPredicate,
    ) -> Result<Vec<SourceSnapshot>> {
        let repo = open(repository)?;
        let tree = resolve_commit(&repo, branch)?.tree()?;

        let mut blobs: Vec<(PathBuf, Oid)> = Vec::new();
        tree.walk(TreeWalkMode::PreOrder, |root, entry| {
            let Some(name) = entry.name() else {
                return TreeWalkResult::Skip;
            };
            match entry.kind() {
                Some(ObjectType::Tree) if predicate.excluded_dirs.iter().any(|dir| dir == name) => {
                    TreeWalkResult::Skip
                }
                Some(ObjectType::Blob) => {
                    let path = Path::new(root).join(name);
                    if predicate.accepts(&path) {
                        blobs.push((path, entry.id()));
                    }
                    TreeWalkResult::Ok
                }
                _ => TreeWalkResult::Ok,
            }
        })?;

        let mut snapshots = Vec::with_capacity(blobs.len());
        for (path, id) in blobs {
            let blob = repo.find_blob(id)?;
            if blob.is_binary() {
                debug!("skipping binary file {}", path.display());
                continue;
            }
            match std::str::from_utf8(blob.content()) {
                Ok(text) => snapshots.push(SourceSnapshot::new(path, text)),
                Err(_) => debug!("skipping non UTF-8 file {}", path.display()),
            }
        }
        Ok(snapshots)
    }
}

fn open(repository: &str) -> Result<Repository> {
    Repository::open(repository)
        .with_context(|| format!("failed to open git repository `{repository}`"))
}

/// Resolves a branch, ref or revision, falling back to the `origin` remote branch.
fn resolve_commit<'r>(repo: &'r Repository, spec: &str) -> Result<Commit<'r>> {
    let object = match repo.revparse_single(spec) {
        Ok(object) => object,
        Err(error) => repo
            .revparse_single(&format!("origin/{spec}"))
            .map_err(|_| error)
            .with_context(|| format!("unknown revision `{spec}`"))?,
    };
    Ok(object.peel_to_commit()?)
}
