use git2::{Commit, Oid, Repository, Signature};
use std::{collections::BTreeMap, path::PathBuf};
use tempfile::TempDir;

use pr_impact::{
    collaborators::{Collaborators, LoadPredicate, RepositoryLoader, RunIdentifiers, SourceControl},
    git::{GitRepositoryLoader, GitSourceControl},
    index::{HashingEmbedder, DEFAULT_DIMENSIONS},
    patch,
    pipeline::{default_excluded_dirs, Pipeline, PipelineSettings, RunStatus},
    report::MarkdownReportGenerator,
};

const SERVICE_PY: &str = "class UserService:
    def __init__(self, repo):
        self.repo = repo

    def get_user(self, user_id):
        return self.repo.find(user_id)
";

const SERVICE_PY_AFTER: &str = "class UserService:
    def __init__(self, repo):
        self.repo = repo

    def get_user(self, user_id):
        return self.repo.find_one(user_id)
";

/// `SERVICE_PY` as edited on main after the pull request branched.
const SERVICE_PY_LATER: &str = "import os

class UserService:
    def __init__(self, repo):
        self.repo = repo

    def get_user(self, user_id):
        return self.repo.find(user_id)
";

const VIEWS_PY: &str = "def show_user(service, user_id):\n    return service.get_user(user_id)\n";

fn write_tree(repo: &Repository, files: &[(String, String)]) -> Oid {
    let mut builder = repo.treebuilder(None).expect("treebuilder");
    let mut subdirs: BTreeMap<String, Vec<(String, String)>> = BTreeMap::new();
    for (path, content) in files {
        match path.split_once('/') {
            Some((dir, rest)) => subdirs
                .entry(dir.to_string())
                .or_default()
                .push((rest.to_string(), content.clone())),
            None => {
                let blob = repo.blob(content.as_bytes()).expect("blob");
                builder.insert(path.as_str(), blob, 0o100644).expect("insert blob");
            }
        }
    }
    for (dir, entries) in subdirs {
        let id = write_tree(repo, &entries);
        builder.insert(dir.as_str(), id, 0o040000).expect("insert tree");
    }
    builder.write().expect("write tree")
}

fn commit(repo: &Repository, refname: &str, files: &[(&str, &str)], parents: &[Oid]) -> Oid {
    let owned: Vec<(String, String)> = files
        .iter()
        .map(|(path, content)| (path.to_string(), content.to_string()))
        .collect();
    let tree = repo.find_tree(write_tree(repo, &owned)).expect("tree");
    let signature = Signature::now("Test", "test@example.com").expect("signature");
    let parents: Vec<Commit> = parents
        .iter()
        .map(|id| repo.find_commit(*id).expect("parent"))
        .collect();
    let parent_refs: Vec<&Commit> = parents.iter().collect();
    repo.commit(Some(refname), &signature, &signature, "change", &tree, &parent_refs)
        .expect("commit")
}

/// main: base commit, then a commit made after the pull request branched that adds
/// `later.py` and shifts every line of `service.py`.
/// feature (published as pull request 7): edits `get_user` and adds `audit.py`.
fn repository() -> TempDir {
    let dir = tempfile::tempdir().expect("tempdir");
    let repo = Repository::init(dir.path()).expect("init");

    let base_files = [
        ("README.md", "# shop\n"),
        ("app/service.py", SERVICE_PY),
        ("app/views.py", VIEWS_PY),
        ("app/data.py", "\0\0binary"),
        ("app/__pycache__/service.py", "stale = True\n"),
    ];
    let base = commit(&repo, "refs/heads/main", &base_files, &[]);

    let mut feature_files = base_files.to_vec();
    feature_files[1] = ("app/service.py", SERVICE_PY_AFTER);
    feature_files.push(("app/audit.py", "def audit():\n    return 1\n"));
    let feature = commit(&repo, "refs/heads/feature", &feature_files, &[base]);
    repo.reference("refs/pull/7/head", feature, true, "publish pull request")
        .expect("pull request ref");

    let mut later_files = base_files.to_vec();
    later_files[1] = ("app/service.py", SERVICE_PY_LATER);
    later_files.push(("app/later.py", "def later():\n    pass\n"));
    commit(&repo, "refs/heads/main", &later_files, &[base]);
    dir
}

fn path_of(dir: &TempDir) -> String {
    dir.path().to_string_lossy().to_string()
}

#[test]
fn pull_request_diff_starts_at_the_merge_base() {
    let dir = repository();
    let records = GitSourceControl::new("main", None)
        .list_changed_files(&path_of(&dir), 7)
        .expect("changes listed");

    let paths: Vec<PathBuf> = records.iter().map(|record| record.path.clone()).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("app/audit.py"), PathBuf::from("app/service.py")]
    );

    let service = &records[1];
    assert!(service.patch_text.starts_with("@@ -3,4 +3,4 @@"));
    assert!(service.patch_text.contains(
        "-        return self.repo.find(user_id)\n+        return self.repo.find_one(user_id)\n"
    ));
    assert!(!service.patch_text.contains("diff --git"));
    assert_eq!(
        patch::apply(SERVICE_PY, &service.patch_text).expect("patch applies"),
        SERVICE_PY_AFTER
    );

    let audit = &records[0];
    assert!(audit.patch_text.starts_with("@@ -0,0 +1,2 @@"));
    assert_eq!(
        patch::apply("", &audit.patch_text).expect("patch applies"),
        "def audit():\n    return 1"
    );
}

#[test]
fn explicit_head_replaces_the_pull_request_ref() {
    let dir = repository();
    let from_ref = GitSourceControl::new("main", None)
        .list_changed_files(&path_of(&dir), 7)
        .expect("changes listed");
    let from_branch = GitSourceControl::new("main", Some("feature".to_string()))
        .list_changed_files(&path_of(&dir), 999)
        .expect("changes listed");
    assert_eq!(from_ref, from_branch);
}

#[test]
fn unknown_pull_request_is_an_error() {
    let dir = repository();
    let error = GitSourceControl::new("main", None)
        .list_changed_files(&path_of(&dir), 8)
        .expect_err("no such pull request");
    assert!(format!("{error:#}").contains("refs/pull/8/head"));
}

#[test]
fn loader_reads_the_base_branch_tree() {
    let dir = repository();
    let predicate = LoadPredicate::new(&["py"], &default_excluded_dirs());
    let snapshots = GitRepositoryLoader
        .load_files(&path_of(&dir), "main", &predicate)
        .expect("files loaded");

    let paths: Vec<PathBuf> = snapshots.iter().map(|s| s.path.clone()).collect();
    assert_eq!(
        paths,
        vec![
            PathBuf::from("app/later.py"),
            PathBuf::from("app/service.py"),
            PathBuf::from("app/views.py"),
        ]
    );
    assert_eq!(snapshots[1].text, SERVICE_PY_LATER);
    assert_eq!(snapshots[1].line_count, 8);
}

#[test]
fn base_revision_is_the_merge_base() {
    let dir = repository();
    let revision = GitSourceControl::new("main", None)
        .base_revision(&path_of(&dir), 7)
        .expect("merge base found")
        .expect("revision reported");

    let repo = Repository::open(dir.path()).expect("open");
    let fork = repo.revparse_single("main~1").expect("fork commit").id();
    assert_eq!(revision, fork.to_string());

    let predicate = LoadPredicate::new(&["py"], &default_excluded_dirs());
    let snapshots = GitRepositoryLoader
        .load_files(&path_of(&dir), &revision, &predicate)
        .expect("files loaded");
    let paths: Vec<PathBuf> = snapshots.iter().map(|s| s.path.clone()).collect();
    assert_eq!(
        paths,
        vec![PathBuf::from("app/service.py"), PathBuf::from("app/views.py")]
    );
    assert_eq!(snapshots[0].text, SERVICE_PY);
}

#[test]
fn run_survives_base_branch_edits_after_branching() {
    let dir = repository();
    let source_control = GitSourceControl::new("main", None);
    let embedder = HashingEmbedder::new(DEFAULT_DIMENSIONS).expect("embedder");
    let pipeline = Pipeline::new(
        Collaborators {
            source_control: &source_control,
            loader: &GitRepositoryLoader,
            embedder: &embedder,
            report_generator: &MarkdownReportGenerator,
            sink: None,
        },
        PipelineSettings::default(),
    );

    let outcome = pipeline.run(RunIdentifiers {
        repository: path_of(&dir),
        pr_number: 7,
        pr_url: "https://example.com/acme/shop/pull/7".to_string(),
        base_branch: "main".to_string(),
    });

    assert_eq!(outcome.error, None);
    assert_eq!(outcome.status, RunStatus::Completed);
    let symbols: Vec<&str> = outcome
        .contexts
        .iter()
        .map(|context| context.symbol_name.as_str())
        .collect();
    assert_eq!(symbols, vec!["audit", "get_user"]);
    let get_user = &outcome.contexts[1];
    assert!(get_user
        .usages
        .iter()
        .any(|usage| usage.symbol_name == "show_user"));
}

#[test]
fn loader_rejects_unknown_branches() {
    let dir = repository();
    let predicate = LoadPredicate::new(&["py"], &default_excluded_dirs());
    assert!(GitRepositoryLoader
        .load_files(&path_of(&dir), "release", &predicate)
        .is_err());
}
