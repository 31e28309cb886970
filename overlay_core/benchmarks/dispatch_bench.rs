use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use overlay_core::{EventHub, HandlerError, HurtingEvent, ItemSerial, PlayerId, ReloadingWeaponEvent};

fn bench_dispatch(c: &mut Criterion) {
    overlay_core::init_tracing();
    let mut group = c.benchmark_group("dispatch");

    for subscribers in [1usize, 8, 32, 128] {
        group.bench_with_input(
            BenchmarkId::new("reloading", subscribers),
            &subscribers,
            |b, &subscribers| {
                let hub = EventHub::<ReloadingWeaponEvent>::new("reloading");
                for index in 0..subscribers {
                    hub.subscribe(format!("sub-{index}"), |event: &mut ReloadingWeaponEvent| {
                        if event.serial.0 % 2 == 0 {
                            event.allowed = true;
                        }
                        Ok(())
                    });
                }
                b.iter_batched(
                    || ReloadingWeaponEvent::new(PlayerId(1), ItemSerial(42)),
                    |mut event| hub.dispatch(&mut event),
                    BatchSize::SmallInput,
                )
            },
        );
    }

    group.bench_function("hurting/failing_half", |b| {
        let hub = EventHub::<HurtingEvent>::new("hurting");
        for index in 0..16u32 {
            hub.subscribe(format!("sub-{index}"), move |event: &mut HurtingEvent| {
                if index % 2 == 0 {
                    event.amount *= 0.5;
                    Ok(())
                } else {
                    Err(HandlerError::Rejected("odd subscriber".into()))
                }
            });
        }
        b.iter_batched(
            || HurtingEvent::new(None, PlayerId(7), 25.0, "ballistic_carbine".into()),
            |mut event| hub.dispatch(&mut event),
            BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(dispatch_benches, bench_dispatch);
criterion_main!(dispatch_benches);
