mod lifecycle;
mod server_state;

use crate::server::{Installation, ServerManager};

use std::net::{Ipv4Addr, TcpListener};
use std::path::{Path, PathBuf};
use std::time::Duration;

use mm_config::{ServerConfig, ShutdownConfig};
use tempfile::TempDir;

/// Stand-in `mongod`: records each launch, logs to `--logpath`, exits 0 on TERM.
pub(crate) const GRACEFUL_SERVER: &str = r#"#!/bin/sh
dbpath=""
logpath=""
while [ $# -gt 0 ]; do
  case "$1" in
    --dbpath) dbpath="$2"; shift ;;
    --logpath) logpath="$2"; shift ;;
  esac
  shift
done
trap 'exit 0' TERM
echo '{"s":"I","msg":"Waiting for connections"}' >> "$logpath"
echo "fake mongod up"
echo "launched $$" >> "$dbpath/launches"
echo $$ > "$dbpath/mongod.pid"
while true; do sleep 1 & wait $!; done
"#;

/// Ignores SIGTERM, so only a forced kill ends it.
pub(crate) const STUBBORN_SERVER: &str = r#"#!/bin/sh
trap '' TERM
dbpath=""
while [ $# -gt 0 ]; do
  case "$1" in
    --dbpath) dbpath="$2"; shift ;;
  esac
  shift
done
echo "launched $$" >> "$dbpath/launches"
echo $$ > "$dbpath/mongod.pid"
while true; do sleep 1 & wait $!; done
"#;

/// Logs a permission error and dies shortly after launch.
pub(crate) const CRASHING_SERVER: &str = r#"#!/bin/sh
logpath=""
while [ $# -gt 0 ]; do
  case "$1" in
    --logpath) logpath="$2"; shift ;;
  esac
  shift
done
sleep 1
echo '{"s":"E","msg":"Failed to open data file: Permission denied"}' >> "$logpath"
exit 1
"#;

pub(crate) struct Sandbox {
    pub(crate) dir: TempDir,
    pub(crate) config: ServerConfig,
}

impl Sandbox {
    /// Temp installation with the given `mongod` script.
    pub(crate) fn new(server_script: &str) -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir_all(dir.path().join("resources/mongodb/bin")).unwrap();

        let config = ServerConfig {
            data_dir: dir.path().join("data"),
            log_path: dir.path().join("log/mongodb.log"),
            port: free_port(),
            auto_start: false,
        };

        let sandbox = Self { dir, config };
        write_script(&sandbox.server_binary(), server_script);
        sandbox
    }

    pub(crate) fn resource_dir(&self) -> PathBuf {
        self.dir.path().join("resources")
    }

    pub(crate) fn server_binary(&self) -> PathBuf {
        self.resource_dir().join("mongodb/bin/mongod")
    }

    /// Stand-in `mongosh` that records its arguments and asks the fake
    /// server to exit.
    pub(crate) fn install_shell(&self) {
        let script = format!(
            "#!/bin/sh\necho \"$@\" > \"{data}/mongosh.args\"\nkill -TERM \"$(cat \"{data}/mongod.pid\")\"\n",
            data = self.config.data_dir.display()
        );
        write_script(&self.resource_dir().join("mongodb/bin/mongosh"), &script);
    }

    pub(crate) fn installation(&self) -> Installation {
        Installation::new(self.resource_dir())
    }

    pub(crate) fn manager(&self) -> ServerManager {
        ServerManager::new(self.installation(), self.config.clone(), fast_shutdown())
    }

    pub(crate) fn launches(&self) -> usize {
        std::fs::read_to_string(self.config.data_dir.join("launches"))
            .map(|s| s.lines().count())
            .unwrap_or(0)
    }

    /// Wait until the fake server has recorded `count` launches.
    pub(crate) async fn wait_for_launches(&self, count: usize) {
        for _ in 0..100 {
            if self.launches() >= count && self.config.data_dir.join("mongod.pid").exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("fake mongod did not record {count} launches");
    }
}

pub(crate) fn fast_shutdown() -> ShutdownConfig {
    ShutdownConfig {
        grace_period_ms: 1_000,
        poll_interval_ms: 50,
        kill_wait_ms: 2_000,
        signal_fallback: true,
    }
}

pub(crate) fn write_script(path: &Path, content: &str) {
    use std::os::unix::fs::PermissionsExt;

    std::fs::write(path, content).unwrap();
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755)).unwrap();
}

pub(crate) fn free_port() -> u16 {
    TcpListener::bind((Ipv4Addr::LOCALHOST, 0))
        .unwrap()
        .local_addr()
        .unwrap()
        .port()
}
