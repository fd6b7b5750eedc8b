//! Shared rigs for the behavioral specs.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
pub use ne_adapters::TagBus;
use ne_adapters::{FakeServiceManager, MemoryTagBus};
use ne_core::FakeClock;
use ne_engine::{App, AppArgs, AppConfig, BusFactory, InterfaceApp, ProtocolHooks};
use ne_storage::EdgeDB;
use ne_supervisor::{ServiceRecord, SupervisorApp, SupervisorConfig, SUPERVISOR_APP_ID};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

pub const TEST_PRIVATE_PEM: &str = include_str!("testdata/test_rsa_private.pem");
pub const TEST_PUBLIC_PEM: &str = include_str!("testdata/test_rsa_public.pem");

/// Engine config tight enough for tests.
pub fn fast_engine_config() -> AppConfig {
    AppConfig {
        retry_delay: Duration::from_millis(5),
        execute_interval: Duration::from_millis(5),
        manage_interval: Duration::from_millis(10),
        exception_limit: 1,
        stop_timeout: Duration::from_millis(500),
    }
}

/// Poll until `probe` holds (or panic after ~2 s).
pub async fn wait_until(mut probe: impl FnMut() -> bool) {
    for _ in 0..400 {
        if probe() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}

pub async fn wait_for_key(bus: &MemoryTagBus, key: &str) -> serde_json::Value {
    for _ in 0..400 {
        if let Some(value) = bus.get(key).await {
            return value;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("key {key} never appeared on the bus");
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    app_id: &'a str,
    serial_number: &'a str,
    exp: u64,
}

/// Mint a signed entitlement envelope with the fixture key.
pub fn mint_token(app_id: &str, exp: u64) -> String {
    let key = EncodingKey::from_rsa_pem(TEST_PRIVATE_PEM.as_bytes()).unwrap();
    encode(
        &Header::new(Algorithm::RS256),
        &TokenClaims {
            app_id,
            serial_number: "NE-SPEC-01",
            exp,
        },
        &key,
    )
    .unwrap()
}

pub fn real_epoch() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// A full supervisor under test: real engine and reconciler, fake
/// service manager, in-memory bus, tempdir store and unit directory.
pub struct SupervisorRig {
    pub app: App<SupervisorApp<FakeServiceManager, FakeClock>>,
    pub manager: FakeServiceManager,
    pub clock: FakeClock,
    pub bus: MemoryTagBus,
    pub db: EdgeDB,
    pub unit_dir: PathBuf,
    pub license_dir: PathBuf,
    pub _tmp: tempfile::TempDir,
}

impl SupervisorRig {
    /// Build with a pre-seeded `mtc-01` connection and the fixture
    /// public key installed.
    pub fn build() -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let unit_dir = tmp.path().join("units");
        std::fs::create_dir_all(&unit_dir).unwrap();

        let license_root = tmp.path().join("license");
        std::fs::create_dir_all(&license_root).unwrap();
        let pubkey_file = license_root.join("cloud_pub.pem");
        std::fs::write(&pubkey_file, TEST_PUBLIC_PEM).unwrap();
        let license_dir = license_root.join("tokens");

        let db_path = tmp.path().join("edge.db");
        let db = EdgeDB::open(&db_path).unwrap();
        db.execute_batch(
            "INSERT INTO conns (conn, protocol, host, port, updated_at)
             VALUES ('mtc-01', 'mtc', '10.0.0.1', 502, 100);",
        )
        .unwrap();

        let cfg = SupervisorConfig {
            db_path,
            license_dir: license_dir.clone(),
            pubkey_file,
            unit_dir: unit_dir.clone(),
            interpreter: PathBuf::from("/usr/bin/python3"),
            entitlement_check_interval: Duration::from_secs(60),
        };

        let manager = FakeServiceManager::new();
        let clock = FakeClock::new();
        let hooks = SupervisorApp::new(cfg, manager.clone(), clock.clone());

        let bus = MemoryTagBus::new();
        let factory_bus = bus.clone();
        let factory: BusFactory =
            Arc::new(move |_, _| Arc::new(factory_bus.clone()) as Arc<dyn TagBus>);

        let app = App::new(
            SUPERVISOR_APP_ID,
            AppArgs::default(),
            fast_engine_config(),
            hooks,
            factory,
        );

        Self {
            app,
            manager,
            clock,
            bus,
            db,
            unit_dir,
            license_dir,
            _tmp: tmp,
        }
    }

    pub async fn start(&self) {
        self.app.start();
        let snapshot = || self.record("mtc-01").map(|r| r.active).unwrap_or(false);
        wait_until(snapshot).await;
    }

    pub fn record(&self, app_id: &str) -> Option<ServiceRecord> {
        self.app
            .hooks()
            .service_snapshot()
            .into_iter()
            .find(|r| r.app_id == app_id)
    }

    pub fn unit_path(&self, name: &str) -> PathBuf {
        self.unit_dir.join(format!("{name}.service"))
    }

    pub fn token_path(&self, app_id: &str) -> PathBuf {
        self.license_dir.join(format!("{app_id}.token"))
    }
}

/// No-op protocol body for worker specs.
#[derive(Clone, Default)]
pub struct NoopProto;

#[async_trait]
impl ProtocolHooks for NoopProto {}

/// A worker engine bound to one seeded connection.
pub struct WorkerRig {
    pub app: App<InterfaceApp<NoopProto>>,
    pub bus: MemoryTagBus,
    pub db: EdgeDB,
    pub _tmp: tempfile::TempDir,
}

impl WorkerRig {
    pub fn build(conn_id: &str) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let db_path = tmp.path().join("edge.db");
        let db = EdgeDB::open(&db_path).unwrap();
        db.execute_batch(&format!(
            "INSERT INTO conns (conn, protocol, host, port, timeout, retry, updated_at)
             VALUES ('{conn_id}', 'mtc', '10.0.0.1', 502, 3.0, 3, 100);
             INSERT INTO blocks (block, conn, direction, \"trigger\", schedule, properties, updated_at)
             VALUES ('{conn_id}-read', '{conn_id}', 'ro', 'cyc', 0.1, '{{\"unit_id\": 1}}', 100);"
        ))
        .unwrap();

        let args = AppArgs {
            clean: false,
            debug: false,
            conn_id: Some(conn_id.to_string()),
        };
        let worker = InterfaceApp::new("mtc", &args, &db_path, NoopProto).unwrap();

        let bus = MemoryTagBus::new();
        let factory_bus = bus.clone();
        let factory: BusFactory =
            Arc::new(move |_, _| Arc::new(factory_bus.clone()) as Arc<dyn TagBus>);
        let app = App::new(conn_id, args, fast_engine_config(), worker, factory);

        Self {
            app,
            bus,
            db,
            _tmp: tmp,
        }
    }

    pub async fn start(&self) {
        self.app.start();
        wait_until(|| self.app.ctx().stats().execute_count >= 1).await;
    }
}
