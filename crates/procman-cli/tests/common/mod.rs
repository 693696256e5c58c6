use std::path::{Path, PathBuf};
use std::process::Command;

/// Builds the `demos/process-worker` reference binary (a detached workspace,
/// not a member of this one) and returns the path to its executable.
/// Integration tests use it as the real `./process <name>` child so the full
/// pipe/signal round trip is exercised, not just `procman-sim`'s in-memory
/// `MockWorker` path.
pub fn ensure_worker_built() -> PathBuf {
    let manifest_dir = Path::new(env!("CARGO_MANIFEST_DIR"));
    let worker_dir = manifest_dir.join("../../demos/process-worker");

    let status = Command::new(env!("CARGO"))
        .arg("build")
        .arg("--manifest-path")
        .arg(worker_dir.join("Cargo.toml"))
        .status()
        .expect("cargo should be runnable to build the reference worker");
    assert!(status.success(), "failed to build demos/process-worker");

    worker_dir.join("target/debug/process-worker")
}

/// Stage a run directory containing `./process`, a symlink (or copy, on
/// platforms without symlink permission) to `worker_exe`, the name
/// `ChildWorker::spawn` invokes relative to the simulator's cwd.
pub fn stage_run_dir(worker_exe: &Path) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("create temp run dir");
    let link = dir.path().join("process");
    #[cfg(unix)]
    std::os::unix::fs::symlink(worker_exe, &link).expect("symlink reference worker as ./process");
    dir
}
