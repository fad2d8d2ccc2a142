#![allow(dead_code)]

use std::io::Write;

use accelbench_engine::Engine;
use accelbench_engine::in_memory::InMemoryClient;
use flate2::Compression;
use flate2::write::GzEncoder;
use tracing_subscriber::EnvFilter;

/// Initialize the logger for testing.
///
/// This logs to the stdout registered by the Rust test runner, and only captures logs from the
/// engine crate.
pub fn init_tracing() {
    let env_filter = EnvFilter::new("ERROR").add_directive("accelbench_engine=TRACE".parse().unwrap());

    tracing_subscriber::fmt::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .with_test_writer()
        .compact()
        .try_init()
        .ok();
}

/// Builds an engine over clones of the given clients, so the caller keeps handles for
/// inspecting call counts.
pub fn engine(origin: &InMemoryClient, accelerator: &InMemoryClient) -> Engine {
    init_tracing();
    Engine::new(Box::new(origin.clone()), Box::new(accelerator.clone()))
}

pub fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}
