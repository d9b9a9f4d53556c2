#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_ttv") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "ttv.exe" } else { "ttv" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve ttv binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_env(case_name, args, &[])
}

/// Run `ttv` with extra environment. `HOME` is always pointed at a scratch
/// directory so nothing touches the real user config or logs.
pub fn run_cli_case_env(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let root = std::env::temp_dir().join("ttv-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let stamp = format!("{}-{}", sanitize(case_name), now_millis());
    let log_path = root.join(format!("{stamp}.log"));
    let home = root.join(format!("{stamp}-home"));
    fs::create_dir_all(&home).expect("create scratch home");
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command
        .args(args)
        .env("HOME", &home)
        .env_remove("TTV_OUTPUT_FORMAT")
        .env("RUST_BACKTRACE", "1");
    for (key, value) in env {
        command.env(key, value);
    }
    let output = command.output().expect("execute ttv command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("env={env:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// Write a config file pointing at `base_url` with logs under `dir`.
pub fn write_config(dir: &Path, base_url: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let body = format!(
        "[server]\nbase_url = \"{base_url}\"\nrequest_timeout_ms = 2000\n\n\
         [tail]\npoll_interval_ms = 10\n\n\
         [paths]\njsonl_log = \"{}\"\nsqlite_db = \"{}\"\n",
        dir.join("activity.jsonl").display(),
        dir.join("activity.sqlite3").display(),
    );
    fs::write(&path, body).expect("write config");
    path
}

/// [`run_cli_case_env`] on the blocking pool, so an in-process mock server
/// keeps answering while the binary runs.
pub async fn run_cli_case_async(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let case_name = case_name.to_string();
    let args: Vec<String> = args.iter().map(ToString::to_string).collect();
    let env: Vec<(String, String)> = env
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect();
    tokio::task::spawn_blocking(move || {
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let env: Vec<(&str, &str)> = env.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();
        run_cli_case_env(&case_name, &args, &env)
    })
    .await
    .expect("cli case task")
}

// ──────────────────── mock dashboard ────────────────────

const TAILER_PATH: &str = r"^/api/tailer/[^/]+/[^/]+/\d+$";

fn json_response(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_raw(body.to_string(), "application/json")
}

/// Dashboard server double on top of `wiremock`.
///
/// Tail requests are answered from queued batches in order, then with `[]`.
pub struct MockDashboard {
    server: MockServer,
}

impl MockDashboard {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(TAILER_PATH))
            .respond_with(json_response("[]"))
            .with_priority(10)
            .mount(&server)
            .await;
        Self { server }
    }

    pub fn url(&self) -> String {
        self.server.uri()
    }

    /// Answer exactly one tail request with `body`, after earlier batches.
    pub async fn push_tail_batch(&self, body: &str) {
        Mock::given(method("GET"))
            .and(path_regex(TAILER_PATH))
            .respond_with(json_response(body))
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&self.server)
            .await;
    }

    /// Answer every GET on `route` with `body`.
    pub async fn serve_grid(&self, route: &str, body: &str) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(json_response(body))
            .mount(&self.server)
            .await;
    }

    /// Paths of every request received so far.
    pub async fn requests(&self) -> Vec<String> {
        self.server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|request| request.url.path().to_string())
            .collect()
    }
}
