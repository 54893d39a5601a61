use assert_cmd::Command;
use assert_cmd::cargo;
use mockito::Server;
use predicates::prelude::*;
use std::io::{Read, Write};
use std::net::TcpListener;
use tempfile::tempdir;

fn ghota(api_url: &str) -> Command {
    let mut cmd = Command::new(cargo::cargo_bin!("ghota"));
    cmd.env_remove("GITHUB_TOKEN").arg("--api-url").arg(api_url);
    cmd
}

/// Serves one response that declares `declared` bytes but closes after `sent`.
fn serve_truncated_once(declared: usize, sent: usize) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                declared
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&vec![0xab; sent]);
        }
    });
    format!("http://{}/firmware.bin", addr)
}

fn release_body(url: &str) -> String {
    format!(
        r#"{{
            "id": 1,
            "tag_name": "v1.2.0",
            "name": "v1.2.0",
            "prerelease": false,
            "author": {{"login": "octocat", "id": 583231, "type": "User"}},
            "assets": [
                {{
                    "id": 11,
                    "name": "firmware.bin",
                    "size": 4000,
                    "browser_download_url": "{0}/download/firmware.bin",
                    "uploader": {{"login": "octocat", "id": 583231}}
                }},
                {{
                    "id": 12,
                    "name": "spiffs.bin",
                    "size": 16,
                    "browser_download_url": "{0}/download/spiffs.bin"
                }}
            ]
        }}"#,
        url
    )
}

#[test]
fn test_tags_lists_every_release() {
    let mut server = Server::new();
    let url = server.url();

    let _mock_releases = server
        .mock("GET", "/repos/owner/repo/releases?per_page=100&page=1")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"[{"tag_name": "v1.2.0"}, {"tag_name": "v1.1.0"}, {"tag_name": "v1.0.0"}]"#)
        .create();

    ghota(&url)
        .arg("tags")
        .arg("owner/repo")
        .assert()
        .success()
        .stdout("v1.2.0\nv1.1.0\nv1.0.0\n");
}

#[test]
fn test_latest_prints_tag() {
    let mut server = Server::new();
    let url = server.url();

    let _mock_latest = server
        .mock("GET", "/repos/owner/repo/releases/latest")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(release_body(&url))
        .create();

    ghota(&url)
        .arg("latest")
        .arg("owner/repo")
        .assert()
        .success()
        .stdout("v1.2.0\n");
}

#[test]
fn test_latest_without_release_fails() {
    let mut server = Server::new();
    let url = server.url();

    let _mock_latest = server
        .mock("GET", "/repos/owner/repo/releases/latest")
        .with_status(404)
        .with_body(r#"{"message": "Not Found"}"#)
        .create();

    ghota(&url)
        .arg("latest")
        .arg("owner/repo")
        .assert()
        .failure()
        .stderr(predicate::str::contains("No release found for owner/repo"));
}

#[test]
fn test_show_prints_release_json() {
    let mut server = Server::new();
    let url = server.url();

    let _mock_tag = server
        .mock("GET", "/repos/owner/repo/releases/tags/v1.2.0")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(release_body(&url))
        .create();

    ghota(&url)
        .arg("show")
        .arg("owner/repo@v1.2.0")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""tag_name": "v1.2.0""#))
        .stdout(predicate::str::contains(r#""login": "octocat""#))
        .stdout(predicate::str::contains("spiffs.bin"));
}

#[test]
fn test_flash_firmware_to_file() {
    let mut server = Server::new();
    let url = server.url();
    let image: Vec<u8> = (0..4000u32).map(|i| (i % 256) as u8).collect();

    let _mock_latest = server
        .mock("GET", "/repos/owner/repo/releases/latest")
        .with_status(200)
        .with_body(release_body(&url))
        .create();

    let _mock_asset = server
        .mock("GET", "/repos/owner/repo/releases/assets/11")
        .match_header("accept", "application/octet-stream")
        .with_status(302)
        .with_header("location", &format!("{}/storage/firmware.bin", url))
        .create();

    let _mock_storage = server
        .mock("GET", "/storage/firmware.bin")
        .with_status(200)
        .with_body(&image)
        .create();

    let dir = tempdir().unwrap();
    let output = dir.path().join("images/firmware.bin");

    ghota(&url)
        .arg("flash")
        .arg("owner/repo")
        .arg("--output")
        .arg(&output)
        .assert()
        .success()
        .stderr(predicate::str::contains("100%"));

    assert_eq!(std::fs::read(&output).unwrap(), image);
}

#[test]
fn test_flash_download_failure_leaves_no_file() {
    let mut server = Server::new();
    let url = server.url();

    let _mock_tag = server
        .mock("GET", "/repos/owner/repo/releases/tags/v1.2.0")
        .with_status(200)
        .with_body(release_body(&url))
        .create();

    let _mock_asset = server
        .mock("GET", "/repos/owner/repo/releases/assets/12")
        .with_status(500)
        .create();

    let dir = tempdir().unwrap();
    let output = dir.path().join("spiffs.bin");

    ghota(&url)
        .arg("flash")
        .arg("owner/repo")
        .arg("--tag")
        .arg("v1.2.0")
        .arg("--region")
        .arg("filesystem")
        .arg("--output")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("code 2"));

    assert!(!output.exists());
}

#[test]
fn test_flash_truncated_download_leaves_no_partial_image() {
    let mut server = Server::new();
    let url = server.url();
    let storage_url = serve_truncated_once(4096, 1500);

    let _mock_latest = server
        .mock("GET", "/repos/owner/repo/releases/latest")
        .with_status(200)
        .with_body(release_body(&url))
        .create();

    let _mock_asset = server
        .mock("GET", "/repos/owner/repo/releases/assets/11")
        .with_status(302)
        .with_header("location", &storage_url)
        .create();

    let dir = tempdir().unwrap();
    let output = dir.path().join("firmware.bin");

    ghota(&url)
        .arg("flash")
        .arg("owner/repo")
        .arg("--output")
        .arg(&output)
        .assert()
        .failure()
        .stderr(predicate::str::contains("code 2"));

    assert!(!output.exists());
    assert!(!dir.path().join("firmware.bin.part").exists());
}
