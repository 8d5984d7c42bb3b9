#![allow(unused_crate_dependencies)]
//! servicectl actions against a scripted daemon

mod common;

use cli::{Action, CliError};
use common::{fake_daemon, run_with_timeout};
use ipc::IpcError;
use schema::ClientConfig;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::AsyncReadExt;

fn config(dir: &std::path::Path) -> ClientConfig {
    ClientConfig {
        temp_dir: dir.to_path_buf(),
    }
}

#[tokio::test]
async fn list_prints_progress_lines() {
    run_with_timeout(Duration::from_secs(10), async {
        let temp = tempfile::tempdir().unwrap();
        let daemon = fake_daemon(
            temp.path(),
            "STATE\t\tNAME\t\tGROUP\t\tPATH\t\tDIR\nrunning\t\tapi\t\tweb\t\t/bin/api\t\t/srv\n==OK:\n",
        )
        .await;

        let (sink, mut output) = tokio::io::duplex(4096);
        cli::run(&config(temp.path()), Action::List("all".into()), sink)
            .await
            .unwrap();

        let mut text = String::new();
        output.read_to_string(&mut text).await.unwrap();
        assert_eq!(
            text,
            "STATE\t\tNAME\t\tGROUP\t\tPATH\t\tDIR\nrunning\t\tapi\t\tweb\t\t/bin/api\t\t/srv\n"
        );
        assert_eq!(daemon.await.unwrap(), r#"["list","all"]"#);
    })
    .await;
}

#[tokio::test]
async fn add_sends_absolute_path() {
    run_with_timeout(Duration::from_secs(10), async {
        let temp = tempfile::tempdir().unwrap();
        let daemon = fake_daemon(temp.path(), "add group web success with 1 service\n==OK:\n").await;

        let (sink, _output) = tokio::io::duplex(4096);
        cli::run(
            &config(temp.path()),
            Action::Add(PathBuf::from("groups/web.json")),
            sink,
        )
        .await
        .unwrap();

        let request = daemon.await.unwrap();
        let parts: Vec<String> = serde_json::from_str(&request).unwrap();
        assert_eq!(parts[0], "add");
        let path = PathBuf::from(&parts[1]);
        assert!(path.is_absolute());
        assert!(path.ends_with("groups/web.json"));
    })
    .await;
}

#[tokio::test]
async fn remote_error_is_returned() {
    run_with_timeout(Duration::from_secs(10), async {
        let temp = tempfile::tempdir().unwrap();
        let _daemon = fake_daemon(
            temp.path(),
            "nope service is starting\n==ERR:group nope is not exist\n",
        )
        .await;

        let (sink, _output) = tokio::io::duplex(4096);
        let err = cli::run(&config(temp.path()), Action::Start("nope".into()), sink)
            .await
            .unwrap_err();
        assert!(matches!(err, CliError::IpcError(IpcError::Remote(_))));
        assert_eq!(err.to_string(), "group nope is not exist");
    })
    .await;
}

#[tokio::test]
async fn missing_daemon_is_reported() {
    let temp = tempfile::tempdir().unwrap();
    let (sink, _output) = tokio::io::duplex(4096);
    let err = cli::run(&config(temp.path()), Action::Stop("all".into()), sink)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        CliError::IpcError(IpcError::DiscoveryFailed(_))
    ));
}
