use std::io::Write;
use std::process::{Command, Output};

const ACCELBENCH_EXE: &str = env!("CARGO_BIN_EXE_accelbench");

fn run_with_request(request: &[u8]) -> Output {
    let mut tempfile = tempfile::NamedTempFile::new().unwrap();
    tempfile.write_all(request).unwrap();

    Command::new(ACCELBENCH_EXE)
        .args(["run", "-r"])
        .arg(tempfile.path())
        // Static credentials avoid probing the environment for them.
        .env("AB__ORIGIN__ACCESS_KEY", "AKIDEXAMPLE")
        .env("AB__ORIGIN__SECRET_KEY", "secret")
        .env("AB__ACCELERATOR__ACCESS_KEY", "AKIDEXAMPLE")
        .env("AB__ACCELERATOR__SECRET_KEY", "secret")
        .env("RUST_LOG", "off")
        .output()
        .expect("Failed to run accelbench")
}

#[test]
fn test_version() {
    let output = Command::new(ACCELBENCH_EXE)
        .arg("version")
        .output()
        .expect("Failed to run accelbench");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout).trim(),
        env!("CARGO_PKG_VERSION")
    );
}

#[test]
fn test_invalid_request_prints_error() {
    let output = run_with_request(br#"{"operation": "get", "numKeys": "5"}"#);

    assert!(!output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(
        response,
        serde_json::json!({
            "kind": "InvalidRequest",
            "errorMessage": "missing field `bucket`",
        })
    );
}

#[test]
fn test_malformed_request_prints_error() {
    let output = run_with_request(b"{not json");

    assert!(!output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(response["kind"], "InvalidRequest");
}
