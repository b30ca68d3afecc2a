// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use crate::platform::test::{TestFib, TestHostAddrs};
use crate::platform::KernelRoute;
use crate::table::{RouteTable, OWNER_PROTOCOL};
use crate::Error;
use bird::{AddressFamily, BgpPath, Route};
use cost::{Engine, Sample, StaticSource, UnknownCostPolicy, PEER_INDEX_BASE};
use ipnetwork::IpNetwork;
use pbr_common::lock;
use std::net::IpAddr;
use std::sync::atomic::Ordering;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::UnixListener;

const LOCAL_AS: u32 = 64520;

fn idx(asn: u32) -> i64 {
    asn as i64 - PEER_INDEX_BASE
}

fn sample(latency_ms: f64) -> Sample {
    Sample {
        latency: latency_ms * 1e6,
        jitter: 0.0,
        packet_loss: 0.0,
        availability: 1.0,
    }
}

fn lossy() -> Sample {
    Sample {
        latency: 5e6,
        jitter: 0.0,
        packet_loss: 100.0,
        availability: 1.0,
    }
}

fn path(as_path: &[u32], nexthop: &str) -> BgpPath {
    BgpPath {
        neighbor_as: as_path.first().copied().unwrap_or(0),
        as_path: as_path.to_vec(),
        nexthop: nexthop.parse().unwrap(),
        ifname: "eth0".into(),
        med: 0,
        local_pref: 100,
        origin_type: "IGP".into(),
    }
}

fn route(network: &str, paths: Vec<BgpPath>) -> Route {
    Route {
        network: network.parse().unwrap(),
        origin_as: 65001,
        paths,
    }
}

fn engine(source: &StaticSource) -> Engine<&StaticSource> {
    Engine::new(
        source,
        UnknownCostPolicy::ZeroPermits,
        pbr_common::test::logger(),
    )
}

fn source_addr() -> IpAddr {
    "198.51.100.7".parse().unwrap()
}

async fn converge(
    routes: &[Route],
    engine: &Engine<&StaticSource>,
    table: &RouteTable<&TestFib>,
) -> Result<(), Error> {
    crate::converge(
        routes,
        source_addr(),
        LOCAL_AS,
        engine,
        table,
        &pbr_common::test::logger(),
    )
    .await
}

#[tokio::test]
async fn installs_minimum_cost_path() {
    let mut source = StaticSource::new();
    source.insert(idx(LOCAL_AS), idx(64513), sample(10.0));
    source.insert(idx(LOCAL_AS), idx(64514), sample(5.0));
    let engine = engine(&source);
    let fib = TestFib::default();
    let table = RouteTable::new(&fib, pbr_common::test::logger());

    let routes = vec![route(
        "10.0.0.0/24",
        vec![path(&[64513], "192.0.2.1"), path(&[64514], "192.0.2.2")],
    )];
    converge(&routes, &engine, &table).await.unwrap();

    let installed = lock!(fib.routes).clone();
    assert_eq!(installed.len(), 1);
    assert_eq!(
        installed[0].dst,
        "10.0.0.0/24".parse::<IpNetwork>().unwrap()
    );
    assert_eq!(installed[0].gw, "192.0.2.2".parse::<IpAddr>().unwrap());
    assert_eq!(installed[0].src, Some(source_addr()));
    assert_eq!(installed[0].protocol, OWNER_PROTOCOL);
}

#[tokio::test]
async fn ties_prefer_first_seen_path() {
    let mut source = StaticSource::new();
    source.insert(idx(LOCAL_AS), idx(64513), sample(5.0));
    source.insert(idx(LOCAL_AS), idx(64514), sample(5.0));
    let engine = engine(&source);
    let fib = TestFib::default();
    let table = RouteTable::new(&fib, pbr_common::test::logger());

    let routes = vec![route(
        "10.0.0.0/24",
        vec![path(&[64513], "192.0.2.1"), path(&[64514], "192.0.2.2")],
    )];
    converge(&routes, &engine, &table).await.unwrap();

    let installed = lock!(fib.routes).clone();
    assert_eq!(installed[0].gw, "192.0.2.1".parse::<IpAddr>().unwrap());
}

#[tokio::test]
async fn self_originated_prefix_is_withdrawn() {
    let source = StaticSource::new();
    let engine = engine(&source);
    let fib = TestFib::default();
    lock!(fib.routes).push(KernelRoute {
        dst: "10.0.0.0/24".parse().unwrap(),
        gw: "192.0.2.9".parse().unwrap(),
        src: None,
        protocol: OWNER_PROTOCOL,
    });
    let table = RouteTable::new(&fib, pbr_common::test::logger());

    let routes = vec![route(
        "10.0.0.0/24",
        vec![path(&[LOCAL_AS, 64513], "192.0.2.1")],
    )];
    converge(&routes, &engine, &table).await.unwrap();

    // Withdrawn exactly once, never re-imported.
    assert_eq!(lock!(fib.dels).len(), 1);
    assert!(lock!(fib.adds).is_empty());
    assert!(lock!(fib.replaces).is_empty());
    assert!(lock!(fib.routes).is_empty());
}

#[tokio::test]
async fn empty_as_path_is_withdrawn_and_pass_continues() {
    let mut source = StaticSource::new();
    source.insert(idx(LOCAL_AS), idx(64513), sample(5.0));
    let engine = engine(&source);
    let fib = TestFib::default();
    let table = RouteTable::new(&fib, pbr_common::test::logger());

    let routes = vec![
        route("10.0.0.0/24", vec![path(&[], "192.0.2.1")]),
        route("10.1.0.0/24", vec![path(&[64513], "192.0.2.2")]),
    ];
    converge(&routes, &engine, &table).await.unwrap();

    assert_eq!(
        lock!(fib.dels).clone(),
        vec!["10.0.0.0/24".parse::<IpNetwork>().unwrap()]
    );
    assert_eq!(
        lock!(fib.adds).clone(),
        vec!["10.1.0.0/24".parse::<IpNetwork>().unwrap()]
    );
}

#[tokio::test]
async fn no_usable_path_leaves_kernel_alone() {
    let mut source = StaticSource::new();
    source.insert(idx(LOCAL_AS), idx(64513), lossy());
    let engine = engine(&source);
    let fib = TestFib::default();
    // A previously installed route must survive a pass that finds no
    // usable path; only a chosen path drives mutations.
    let existing = KernelRoute {
        dst: "10.0.0.0/24".parse().unwrap(),
        gw: "192.0.2.9".parse().unwrap(),
        src: None,
        protocol: OWNER_PROTOCOL,
    };
    lock!(fib.routes).push(existing.clone());
    let table = RouteTable::new(&fib, pbr_common::test::logger());

    let routes = vec![route(
        "10.0.0.0/24",
        vec![path(&[64513, 64514], "192.0.2.1")],
    )];
    converge(&routes, &engine, &table).await.unwrap();

    assert!(lock!(fib.adds).is_empty());
    assert!(lock!(fib.replaces).is_empty());
    assert!(lock!(fib.dels).is_empty());
    assert_eq!(lock!(fib.routes).clone(), vec![existing]);
    // The infinite first edge short-circuited the second one.
    assert_eq!(source.calls(), 1);
}

#[tokio::test]
async fn routes_without_paths_are_skipped() {
    let source = StaticSource::new();
    let engine = engine(&source);
    let fib = TestFib::default();
    let table = RouteTable::new(&fib, pbr_common::test::logger());

    let routes = vec![route("10.0.0.0/24", Vec::new())];
    converge(&routes, &engine, &table).await.unwrap();

    assert!(lock!(fib.adds).is_empty());
    assert!(lock!(fib.dels).is_empty());
}

#[tokio::test]
async fn kernel_failure_aborts_pass() {
    let mut source = StaticSource::new();
    source.insert(idx(LOCAL_AS), idx(64513), sample(5.0));
    let engine = engine(&source);
    let fib = TestFib::default();
    fib.fail_mutations.store(true, Ordering::Relaxed);
    let table = RouteTable::new(&fib, pbr_common::test::logger());

    let routes = vec![
        route("10.0.0.0/24", vec![path(&[64513], "192.0.2.1")]),
        route("10.1.0.0/24", vec![path(&[64513], "192.0.2.2")]),
    ];
    let err = converge(&routes, &engine, &table).await.unwrap_err();
    assert!(matches!(err, Error::SystemError(_)));
}

#[tokio::test]
async fn reconcile_full_loop_against_scripted_daemon() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bird.ctl");
    let listener = UnixListener::bind(&path).unwrap();
    tokio::spawn(async move {
        let (mut stream, _) = listener.accept().await.unwrap();
        stream.write_all(b"0001 BIRD 2.0.8 ready.\n").await.unwrap();
        let mut buf = [0u8; 64];
        let n = stream.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"show route all\n");
        stream
            .write_all(
                b"1007-10.0.0.0/24 via 192.0.2.1 on eth0 [peer1 12:00:00] * (100) [AS65001i]\n\
                  1008-\tType: BGP unicast univ\n\
                  1012-\tBGP.origin: IGP\n\
                  \tBGP.as_path: 64513 65001\n\
                  \tBGP.next_hop: 192.0.2.1\n\
                  \tBGP.local_pref: 100\n\
                  \tBGP.med: 0\n\
                  0000 \n",
            )
            .await
            .unwrap();
    });

    let mut source = StaticSource::new();
    source.insert(idx(LOCAL_AS), idx(64513), sample(5.0));
    source.insert(idx(64513), idx(65001), sample(5.0));
    let engine = engine(&source);
    let fib = TestFib::default();
    let table = RouteTable::new(&fib, pbr_common::test::logger());
    let hosts = TestHostAddrs {
        v4: "198.51.100.7".parse().unwrap(),
        v6: "fdac:c9:1::2".parse().unwrap(),
    };
    let cfg = crate::Config {
        local_as: LOCAL_AS,
        bird4_socket: path.to_str().unwrap().to_string(),
        bird6_socket: String::new(),
        v6_source: Default::default(),
    };

    crate::reconcile(
        AddressFamily::Ipv4,
        &cfg,
        &engine,
        &table,
        &hosts,
        &pbr_common::test::logger(),
    )
    .await
    .unwrap();

    let installed = lock!(fib.routes).clone();
    assert_eq!(installed.len(), 1);
    assert_eq!(installed[0].gw, "192.0.2.1".parse::<IpAddr>().unwrap());
    assert_eq!(installed[0].src, Some(hosts.v4.into()));
}
