//! Purpose: End-to-end tests for the `kvitd` HTTP server and the remote client.
//! Exports: None (integration test module).
//! Role: Validate list-keys/get routes, status codes, and CLI reads through a context.
//! Invariants: Uses a loopback-only server with a temp database.
//! Invariants: Bounded waits avoid test flakiness; server processes are killed on drop.

use kvit::api::{ErrorKind, LocalClient, RemoteClient};
use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::sync::{Mutex, MutexGuard};
use std::thread::sleep;
use std::time::{Duration, Instant};

type TestResult<T> = Result<T, Box<dyn std::error::Error>>;

static SERVER_LOCK: Mutex<()> = Mutex::new(());

struct TestServer {
    child: Child,
    bind: String,
    base_url: String,
    _server_guard: MutexGuard<'static, ()>,
}

impl TestServer {
    fn start(db_path: &Path) -> TestResult<Self> {
        let guard = SERVER_LOCK
            .lock()
            .unwrap_or_else(|poison| poison.into_inner());
        let mut last_err: Option<Box<dyn std::error::Error>> = None;
        for _attempt in 0..3 {
            let port = pick_port()?;
            let bind = format!("127.0.0.1:{port}");
            let base_url = format!("http://{bind}");

            let mut child = Command::new(env!("CARGO_BIN_EXE_kvitd"))
                .arg("--db")
                .arg(db_path)
                .arg("--bind")
                .arg("127.0.0.1")
                .arg("--port")
                .arg(port.to_string())
                .stdout(Stdio::null())
                .stderr(Stdio::piped())
                .spawn()?;

            match wait_for_server(&mut child, bind.parse()?) {
                Ok(()) => {
                    return Ok(Self {
                        child,
                        bind,
                        base_url,
                        _server_guard: guard,
                    });
                }
                Err(err) => {
                    let _ = child.kill();
                    let _ = child.wait();
                    last_err = Some(err);
                    sleep(Duration::from_millis(30));
                }
            }
        }

        Err(last_err.unwrap_or_else(|| "server failed to start".into()))
    }

    fn client(&self) -> TestResult<RemoteClient> {
        Ok(RemoteClient::new(self.base_url.clone())?)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

fn seeded_db(dir: &Path) -> TestResult<std::path::PathBuf> {
    let db_path = dir.join("data.db");
    let local = LocalClient::new().with_db_path(&db_path);
    local.add("servers", "", "127.0.0.1")?;
    local.add("servers", "", "192.168.1.1")?;
    local.add("servers", "personal", "10.0.0.1")?;
    local.add("config", "db", "postgres")?;
    Ok(db_path)
}

#[test]
fn remote_list_keys_and_get() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = seeded_db(temp_dir.path())?;
    let server = TestServer::start(&db_path)?;
    let client = server.client()?;

    assert_eq!(
        client.list_keys()?,
        vec![
            "config/db",
            "servers/:0",
            "servers/:1",
            "servers/:len",
            "servers/personal/:0",
            "servers/personal/:len",
        ]
    );
    assert_eq!(client.get("servers", "")?, vec!["127.0.0.1", "192.168.1.1"]);
    assert_eq!(client.get("servers", "personal")?, vec!["10.0.0.1"]);
    assert_eq!(client.get("config", "db")?, vec!["postgres"]);
    assert!(client.get("missing", "")?.is_empty());
    Ok(())
}

#[test]
fn remote_sees_local_writes_made_after_start() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = seeded_db(temp_dir.path())?;
    let server = TestServer::start(&db_path)?;
    let client = server.client()?;

    LocalClient::new()
        .with_db_path(&db_path)
        .add("servers", "", "172.16.0.1")?;
    assert_eq!(
        client.get("servers", "")?,
        vec!["127.0.0.1", "192.168.1.1", "172.16.0.1"]
    );
    Ok(())
}

#[test]
fn wrong_method_is_405_and_unknown_route_404() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = seeded_db(temp_dir.path())?;
    let server = TestServer::start(&db_path)?;

    let post = ureq::post(&format!("{}/list-keys", server.base_url)).call();
    match post {
        Err(ureq::Error::Status(code, _)) => assert_eq!(code, 405),
        other => return Err(format!("unexpected response: {other:?}").into()),
    }

    let post = ureq::post(&format!("{}/get/servers", server.base_url)).call();
    match post {
        Err(ureq::Error::Status(code, _)) => assert_eq!(code, 405),
        other => return Err(format!("unexpected response: {other:?}").into()),
    }

    let missing = ureq::get(&format!("{}/nope", server.base_url)).call();
    match missing {
        Err(ureq::Error::Status(code, _)) => assert_eq!(code, 404),
        other => return Err(format!("unexpected response: {other:?}").into()),
    }
    Ok(())
}

#[test]
fn corrupt_state_is_not_a_read_error() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = seeded_db(temp_dir.path())?;
    {
        use kvit::api::{SqliteStore, Store};
        let store = SqliteStore::open(&db_path)?;
        store.set("servers/:len", "garbage")?;
        store.close()?;
    }
    let server = TestServer::start(&db_path)?;
    let client = server.client()?;

    assert_eq!(client.get("servers", "")?, vec!["127.0.0.1", "192.168.1.1"]);
    Ok(())
}

#[test]
fn remote_client_maps_connection_failure_to_io() -> TestResult<()> {
    let port = pick_port()?;
    let client = RemoteClient::for_address(&format!("127.0.0.1:{port}"))?;
    let err = client.list_keys().expect_err("nothing listening");
    assert_eq!(err.kind(), ErrorKind::Io);
    Ok(())
}

#[test]
fn cli_reads_follow_current_context() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = seeded_db(temp_dir.path())?;
    let server = TestServer::start(&db_path)?;

    let home = temp_dir.path().join("home");
    let config_path = home.join("config.yaml");
    let local_db = home.join("local.db");
    let kvit = |args: &[&str]| {
        Command::new(env!("CARGO_BIN_EXE_kvit"))
            .arg("--db")
            .arg(&local_db)
            .arg("--config")
            .arg(&config_path)
            .args(args)
            .output()
    };

    assert!(kvit(&["context", "add", "test", &server.bind])?.status.success());
    assert!(kvit(&["context", "use", "test"])?.status.success());

    let get = kvit(&["servers", "get"])?;
    assert!(get.status.success());
    assert_eq!(
        String::from_utf8_lossy(&get.stdout).lines().collect::<Vec<_>>(),
        vec!["127.0.0.1", "192.168.1.1"]
    );
    assert!(String::from_utf8_lossy(&get.stderr).contains("unencrypted"));

    let keys = kvit(&["list-keys"])?;
    assert!(keys.status.success());
    assert!(
        String::from_utf8_lossy(&keys.stdout)
            .lines()
            .any(|line| line == "config/db")
    );

    // Adds stay local even with a context selected.
    let add = kvit(&["servers", "add", "local-only"])?;
    assert!(add.status.success());
    assert_eq!(
        LocalClient::new().with_db_path(&local_db).get("servers", "")?,
        vec!["local-only"]
    );
    assert_eq!(
        server.client()?.get("servers", "")?,
        vec!["127.0.0.1", "192.168.1.1"]
    );
    Ok(())
}

#[cfg(unix)]
#[test]
fn sigterm_shuts_down_cleanly() -> TestResult<()> {
    let temp_dir = tempfile::tempdir()?;
    let db_path = seeded_db(temp_dir.path())?;
    let mut server = TestServer::start(&db_path)?;

    let status = Command::new("kill")
        .arg("-TERM")
        .arg(server.child.id().to_string())
        .status()?;
    assert!(status.success());

    let start = Instant::now();
    let exit = loop {
        if let Some(exit) = server.child.try_wait()? {
            break exit;
        }
        if start.elapsed() > Duration::from_secs(10) {
            return Err("server did not exit after SIGTERM".into());
        }
        sleep(Duration::from_millis(20));
    };
    assert!(exit.success(), "exit status: {exit}");

    // The store still opens after shutdown.
    assert_eq!(
        LocalClient::new().with_db_path(&db_path).get("config", "db")?,
        vec!["postgres"]
    );
    Ok(())
}

fn pick_port() -> TestResult<u16> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let port = listener.local_addr()?.port();
    drop(listener);
    Ok(port)
}

fn wait_for_server(child: &mut Child, addr: SocketAddr) -> TestResult<()> {
    let url = format!("http://{addr}/healthz");
    let start = Instant::now();
    loop {
        if let Ok(resp) = ureq::get(&url).call() {
            if resp.status() == 200 {
                return Ok(());
            }
        }
        if let Some(status) = child.try_wait()? {
            let mut stderr = String::new();
            if let Some(mut pipe) = child.stderr.take() {
                let _ = pipe.read_to_string(&mut stderr);
            }
            let detail = stderr.trim();
            return Err(format!(
                "server exited before ready (status: {status}, stderr: {})",
                if detail.is_empty() { "<empty>" } else { detail }
            )
            .into());
        }
        if start.elapsed() > Duration::from_secs(8) {
            return Err("server did not start in time".into());
        }
        sleep(Duration::from_millis(20));
    }
}
