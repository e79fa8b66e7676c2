use std::{thread, time::Instant};

use criterion::{BenchmarkId, Criterion, Throughput};
use polytune_primitives::transport::{
    ChannelId, Link, SocketListener, TransportConfig, connect, listen,
};

pub fn transport_benchmark(c: &mut Criterion) {
    let config = TransportConfig::default();
    let listener = SocketListener::bind("127.0.0.1:0").expect("bind loopback");
    let addr = listener.local_addr().expect("bound address");
    let listen_config = config.clone();
    let server = thread::spawn(move || listen(&listener, &[1], 1, &listen_config));
    let client = connect(addr, 1, 1, &config).expect("connect loopback");
    let mut sockets = server
        .join()
        .expect("listener panicked")
        .expect("listen loopback");
    let client = Link::new(client, &config).expect("client link");
    let server = Link::new(sockets.remove(&1).unwrap_or_default(), &config).expect("server link");
    let ch = ChannelId::new(0).expect("payload channel");

    let mut g = c.benchmark_group("transport");
    for exp in [6, 12, 18] {
        let len = 2_usize.pow(exp);
        let payload = vec![0xA5; len];
        g.throughput(Throughput::Bytes(len as u64));
        g.bench_function(BenchmarkId::new("ping", len), |b| {
            b.iter_custom(|iters| {
                let now = Instant::now();
                for _ in 0..iters {
                    client.send(ch, &payload).expect("send");
                    server.receive_exact(ch, len).expect("receive");
                }
                now.elapsed()
            })
        });
    }
    g.finish();
}
