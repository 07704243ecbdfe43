//! Shutdown over real sockets: everything accepted reaches the consumer

use std::time::Duration;

use bytes::Bytes;
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

use daq_router::transport::{tcp, Link, Writers};
use daq_router::{launch, Envelope, Kind, RouterConfig, Variant};

const EVENTS: usize = 128;
const EVENT_SIZE: usize = 64 * 1024;

async fn connect_with_retry(addr: &str, writers: &Writers) -> Link {
    for _ in 0..100 {
        match tcp::connect(addr, 256, writers.token()).await {
            Ok(link) => return link,
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    panic!("router never started listening on {}", addr);
}

#[test]
fn test_launch_returns_after_consumer_has_every_byte() {
    let client = tokio::runtime::Runtime::new().unwrap();

    let consumer_listener = client.block_on(TcpListener::bind("127.0.0.1:0")).unwrap();
    let consumer_addr = consumer_listener.local_addr().unwrap();
    let consumer = client.spawn(async move {
        let (mut socket, _) = consumer_listener.accept().await.unwrap();
        let mut buf = vec![0u8; EVENT_SIZE];
        let mut total = 0;
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return total;
            }
            total += n;
        }
    });

    let input_port = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap()
        .port();

    let config = RouterConfig::new(Variant::FinalCollector)
        .input(format!("tcp://*:{}", input_port))
        .output(format!("tcp://{}", consumer_addr))
        .length_prefix(false);

    let router = std::thread::spawn(move || {
        let runtime = tokio::runtime::Runtime::new().unwrap();
        let stats = runtime.block_on(launch(config));
        // Anything still running on the router's runtime dies here
        drop(runtime);
        stats
    });

    let writers = Writers::new();
    let upstream = client.block_on(async {
        let upstream = connect_with_retry(&format!("127.0.0.1:{}", input_port), &writers).await;
        for _ in 0..EVENTS {
            upstream
                .try_send(Envelope::event(Bytes::from(vec![0xAB; EVENT_SIZE])))
                .unwrap();
        }
        upstream.try_send(Envelope::signal(Kind::Terminate)).unwrap();
        upstream
    });

    let stats = router.join().unwrap().unwrap();
    let received = client.block_on(consumer).unwrap();

    assert_eq!(received, EVENTS * EVENT_SIZE);
    assert_eq!(stats.counters.forwarded, EVENTS as u64 + 1);
    assert_eq!(stats.counters.send_failures, 0);

    drop(upstream);
    assert!(client.block_on(writers.finish(Duration::from_secs(5))));
}
