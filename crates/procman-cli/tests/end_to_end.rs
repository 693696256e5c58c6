//! Smoke test driving the real binary against the real reference worker:
//! one descriptor file, real spawned child processes, real pipes and
//! signals, checked against a known-good bit-exact transcript.

mod common;

use std::fs;
use std::io::Write;

use assert_cmd::Command;
use predicates::str::contains;

#[test]
fn s1_sjf_infinite_end_to_end_with_real_worker() {
    let worker_exe = common::ensure_worker_built();
    let run_dir = common::stage_run_dir(&worker_exe);

    let descriptor_path = run_dir.path().join("procs.txt");
    fs::File::create(&descriptor_path)
        .unwrap()
        .write_all(b"0 P1 6 100\n0 P2 3 100\n")
        .unwrap();

    let mut cmd = Command::cargo_bin("procman").unwrap();
    cmd.current_dir(run_dir.path())
        .arg("-f")
        .arg(&descriptor_path)
        .arg("-s")
        .arg("sjf")
        .arg("-m")
        .arg("infinite")
        .arg("-q")
        .arg("3");

    cmd.assert()
        .success()
        .stdout(contains("0,RUNNING,process_name=P2,remaining_time=3"))
        .stdout(contains("3,FINISHED,process_name=P2,proc_remaining=1"))
        .stdout(contains("3,RUNNING,process_name=P1,remaining_time=6"))
        .stdout(contains("9,FINISHED,process_name=P1,proc_remaining=0"))
        .stdout(contains("Turnaround time 6"))
        .stdout(contains("Time overhead 1.50 1.25"))
        .stdout(contains("Makespan 9"));
}
