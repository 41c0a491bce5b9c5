use criterion::{criterion_group, criterion_main, Criterion};
use rtc_relay::media::run_framer;
use std::time::Duration;
use tokio::runtime::Runtime;

fn bench_framing_throughput(c: &mut Criterion) {
    let frame_size = 640 * 480 * 3 / 2;
    let frame_count = 30;
    let data = vec![128u8; frame_size * frame_count];
    let rt = Runtime::new().expect("runtime init");

    c.bench_function("frame_30x_vga_yuv420", |b| {
        b.iter(|| {
            rt.block_on(async {
                let (tx, mut rx) = tokio::sync::mpsc::channel(4);
                let drain = tokio::spawn(async move { while rx.recv().await.is_some() {} });
                let emitted = run_framer(&data[..], frame_size, Duration::from_millis(33), tx)
                    .await
                    .expect("framing");
                assert_eq!(emitted as usize, frame_count);
                drain.await.expect("drain");
            })
        })
    });
}

criterion_group!(benches, bench_framing_throughput);
criterion_main!(benches);
