use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::process::Command;
use std::thread::JoinHandle;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn leadsync_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("leadsync"));
    cmd.env_clear()
        .env("HOME", home)
        .env("USERPROFILE", home)
        .env("LEADSYNC_DATA_DIR", home.join("blobs"));
    cmd
}

fn seed_snapshot(home: &Path, body: &str) {
    let dir = home.join("blobs").join("leadscheckout");
    std::fs::create_dir_all(&dir).expect("create bucket dir");
    std::fs::write(dir.join("json_atual.json"), body).expect("seed snapshot");
}

/// Serve one canned response per connection, then stop.
fn stub(responses: Vec<(u16, &'static str, &'static str)>) -> (String, JoinHandle<usize>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind stub");
    let base = format!("http://{}", listener.local_addr().expect("addr"));
    let handle = std::thread::spawn(move || {
        let mut served = 0;
        for (status, reason, body) in responses {
            let (mut stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
            let mut length = 0usize;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read line");
                let line = line.trim_end();
                if line.is_empty() {
                    break;
                }
                if let Some((k, v)) = line.split_once(':') {
                    if k.eq_ignore_ascii_case("content-length") {
                        length = v.trim().parse().unwrap_or(0);
                    }
                }
            }
            let mut buf = vec![0u8; length];
            reader.read_exact(&mut buf).expect("body");
            let response = format!(
                "HTTP/1.1 {status} {reason}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            stream.write_all(response.as_bytes()).expect("write");
            served += 1;
        }
        served
    });
    (base, handle)
}

#[test]
fn snapshot_show_reports_missing_snapshot() {
    let home = TempDir::new().expect("home");
    leadsync_cmd(home.path())
        .args(["snapshot", "show"])
        .assert()
        .success()
        .stdout(contains("no snapshot yet"));
}

#[test]
fn snapshot_show_counts_and_dumps_rows() {
    let home = TempDir::new().expect("home");
    seed_snapshot(
        home.path(),
        r#"[{"ID":"1","Email":"a@x.com"},{"ID":"2","Email":"b@x.com"}]"#,
    );

    leadsync_cmd(home.path())
        .args(["snapshot", "show"])
        .assert()
        .success()
        .stdout(contains("2 rows"));

    let output = leadsync_cmd(home.path())
        .args(["snapshot", "show", "--json"])
        .output()
        .expect("run show --json");
    assert!(output.status.success());
    let rows: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json stdout");
    assert_eq!(rows[1]["Email"], "b@x.com");
}

#[test]
fn snapshot_show_fails_on_corrupt_blob() {
    let home = TempDir::new().expect("home");
    seed_snapshot(home.path(), "{not json");

    leadsync_cmd(home.path())
        .args(["snapshot", "show"])
        .assert()
        .failure()
        .stderr(contains("malformed"));
}

#[test]
fn snapshot_clear_removes_blob() {
    let home = TempDir::new().expect("home");
    seed_snapshot(home.path(), r#"[{"ID":"1"}]"#);

    leadsync_cmd(home.path())
        .args(["snapshot", "clear"])
        .assert()
        .success()
        .stdout(contains("removed"));
    assert!(!home
        .path()
        .join("blobs/leadscheckout/json_atual.json")
        .exists());

    leadsync_cmd(home.path())
        .args(["snapshot", "clear"])
        .assert()
        .success()
        .stdout(contains("nothing to remove"));
}

#[test]
fn data_dir_flag_overrides_environment() {
    let home = TempDir::new().expect("home");
    let other = TempDir::new().expect("other");
    let dir = other.path().join("leadscheckout");
    std::fs::create_dir_all(&dir).expect("bucket dir");
    std::fs::write(dir.join("json_atual.json"), r#"[{"ID":"9"}]"#).expect("seed");

    leadsync_cmd(home.path())
        .args(["snapshot", "show", "--data-dir"])
        .arg(other.path())
        .assert()
        .success()
        .stdout(contains("1 rows"));
}

#[test]
fn run_without_credentials_names_missing_variable() {
    let home = TempDir::new().expect("home");
    leadsync_cmd(home.path())
        .arg("run")
        .assert()
        .failure()
        .stderr(contains("METABASE_URL"));
}

#[test]
fn run_prints_unauthorized_response_and_exits_nonzero() {
    let home = TempDir::new().expect("home");
    seed_snapshot(home.path(), r#"[{"ID":"1"}]"#);
    let (base, server) = stub(vec![(401, "Unauthorized", r#"{"errors":{}}"#)]);

    let output = leadsync_cmd(home.path())
        .args(["run", "--dry-run"])
        .env("METABASE_URL", &base)
        .env("USERNAME", "bot")
        .env("PASSWORD", "wrong")
        .env("HUBSPOT_API_KEY", "pat-1")
        .env("HUBSPOT_API_BASE", &base)
        .output()
        .expect("run leadsync");

    assert!(!output.status.success());
    let response: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("response on stdout");
    assert_eq!(response["statusCode"], 401);
    assert_eq!(response["body"]["resposta"], "Unauthorized");
    assert_eq!(server.join().expect("server"), 1);

    let kept = std::fs::read_to_string(home.path().join("blobs/leadscheckout/json_atual.json"))
        .expect("snapshot untouched");
    assert_eq!(kept, r#"[{"ID":"1"}]"#);
}
