//! Host API over real shared memory and FIFOs.

mod support;

use std::{
    sync::{Arc, Mutex, mpsc},
    thread,
    time::Duration,
};

use elaphure_core::SharedRegion;
use elaphure_harness::ProbeScript;
use elaphure_proxy::{INIT_FAILED, MappedRegion, Proxy, ProxyConfig, ResourceNames, START_FAILED};
use support::{ProbeServer, closed_port, eventually};

fn config(dir: &std::path::Path, port: u16) -> ProxyConfig {
    ProxyConfig { port, names: ResourceNames::in_dir(dir), ..ProxyConfig::default() }
}

#[test]
fn init_is_idempotent_and_config_reaches_the_region() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = Proxy::new(config(dir.path(), 3240));

    assert_eq!(proxy.init(), 0);
    assert_eq!(proxy.init(), 0);
    assert_eq!(proxy.change_config(true), 0);

    let names = &proxy.config().names;
    let view = MappedRegion::open_or_create(&names.memory_path()).unwrap();
    view.with_memory(|memory| {
        assert_eq!(memory.info.enable_vendor_command, 1);
        assert!(memory.info.version_string().starts_with(b"elaphure-proxy "));
        assert!(!memory.info.is_ready());
    });

    assert_eq!(proxy.change_config(false), 0);
    view.with_memory(|memory| assert_eq!(memory.info.enable_vendor_command, 0));

    proxy.release();
    assert!(!names.memory_path().exists());
    assert!(!names.producer_path().exists());
    assert!(!names.consumer_path().exists());
}

#[test]
fn init_fails_without_a_directory() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = Proxy::new(config(&dir.path().join("missing"), 3240));

    assert_eq!(proxy.init(), INIT_FAILED);
    assert_eq!(proxy.start_with_address("127.0.0.1"), START_FAILED);
}

#[test]
fn start_and_stop_against_a_probe() {
    let server = ProbeServer::start(ProbeScript::new());
    let dir = tempfile::tempdir().unwrap();
    let proxy = Proxy::new(config(dir.path(), server.port));

    let connects = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&connects);
    proxy.set_on_connect(Some(Arc::new(move |message: &str| {
        sink.lock().unwrap().push(message.to_string());
    })));

    assert_eq!(proxy.start_with_address("127.0.0.1"), 0);
    eventually("connect notification", || !connects.lock().unwrap().is_empty());
    assert!(proxy.is_running());
    assert_eq!(*connects.lock().unwrap(), vec!["connect succeeded".to_string()]);

    proxy.stop();
    assert!(!proxy.is_running());
    proxy.stop();
}

#[test]
fn refused_start_reports_through_the_callback() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = Proxy::new(config(dir.path(), closed_port()));

    let disconnects = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&disconnects);
    proxy.set_on_disconnect(Some(Arc::new(move |message: &str| {
        sink.lock().unwrap().push(message.to_string());
    })));

    assert_eq!(proxy.start_with_address("127.0.0.1"), START_FAILED);
    assert_eq!(disconnects.lock().unwrap().len(), 1);
    assert!(!proxy.is_running());
}

#[test]
fn bad_identifier_fails_start() {
    let server = ProbeServer::start(ProbeScript::new().handshake(0x1234_5678, 0, 1));
    let dir = tempfile::tempdir().unwrap();
    let proxy = Proxy::new(config(dir.path(), server.port));

    let disconnects = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&disconnects);
    proxy.set_on_disconnect(Some(Arc::new(move |message: &str| {
        sink.lock().unwrap().push(message.to_string());
    })));

    assert_eq!(proxy.start_with_address("127.0.0.1"), START_FAILED);
    let disconnects = disconnects.lock().unwrap();
    assert_eq!(disconnects.len(), 1);
    assert!(disconnects[0].contains("identifier"), "{disconnects:?}");
    assert!(!proxy.is_running());
}

#[test]
fn callbacks_may_call_back_into_the_proxy() {
    let dir = tempfile::tempdir().unwrap();
    let proxy = Arc::new(Proxy::new(config(dir.path(), closed_port())));

    let observed = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&observed);
    let weak = Arc::downgrade(&proxy);
    proxy.set_on_disconnect(Some(Arc::new(move |_: &str| {
        if let Some(proxy) = weak.upgrade() {
            sink.lock().unwrap().push(proxy.is_running());
            proxy.stop();
        }
    })));

    let (done, finished) = mpsc::channel();
    let caller = Arc::clone(&proxy);
    thread::spawn(move || {
        let _ = done.send(caller.start_with_address("127.0.0.1"));
    });

    let code = finished.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(code, START_FAILED);
    assert_eq!(*observed.lock().unwrap(), vec![false]);
}
