use std::sync::Arc;
use std::thread::spawn;

use criterion::{criterion_group, criterion_main, Criterion};

use stealq::{QueueSet, Terminator, VictimRng, Worker};

// Single-threaded benchmark.
//
// `N` tasks are pushed and then popped back from the queue.
fn push_pop<const N: usize>(name: &str, c: &mut Criterion) {
    let worker = Worker::with_capacity(256);
    c.bench_function(&format!("push_pop-{}", name), |b| {
        b.iter(|| {
            for i in 0..N {
                let _ = worker.push(i);
            }
            for _ in 0..N {
                let _ = worker.pop();
            }
        })
    });
}

fn push_pop_small_batch(c: &mut Criterion) {
    push_pop::<64>("small_batch", c);
}

fn push_pop_large_batch(c: &mut Criterion) {
    push_pop::<254>("large_batch", c);
}

// Single-threaded steal benchmark.
//
// `N` tasks are pushed by the owner and drained through the stealer.
fn push_steal<const N: usize>(name: &str, c: &mut Criterion) {
    let worker = Worker::with_capacity(256);
    let stealer = worker.stealer();
    c.bench_function(&format!("push_steal-{}", name), |b| {
        b.iter(|| {
            for i in 0..N {
                let _ = worker.push(i);
            }
            for _ in 0..N {
                let _ = stealer.steal();
            }
        })
    });
}

fn push_steal_batch(c: &mut Criterion) {
    push_steal::<64>("batch", c);
}

// Multi-threaded work-stealing round.
//
// Every worker seeds its own queue with an equal share of the tasks,
// then the pool drains itself through pops and best-of-2 steals until
// the terminator detects quiescence. Thread timing makes the task
// redistribution non-deterministic, so these numbers must be taken with
// a grain of salt.
fn stealing_round(c: &mut Criterion) {
    const TASKS_PER_THREAD: usize = 4096;

    let thread_count = num_cpus::get().min(4);

    c.bench_function("stealing_round", |b| {
        b.iter(|| {
            let workers: Vec<Worker<usize>> =
                (0..thread_count).map(|_| Worker::new()).collect();
            let mut set = QueueSet::new(thread_count);
            for (i, worker) in workers.iter().enumerate() {
                set.register(i, worker.stealer());
            }
            let set = Arc::new(set);
            let terminator = Arc::new(Terminator::new(thread_count, set.clone()));

            let threads: Vec<_> = workers
                .into_iter()
                .enumerate()
                .map(|(me, worker)| {
                    let set = set.clone();
                    let terminator = terminator.clone();
                    spawn(move || {
                        let rng = VictimRng::new(me as i32 + 1);
                        for task in 0..TASKS_PER_THREAD {
                            worker.push(task).unwrap();
                        }
                        loop {
                            while worker
                                .pop()
                                .or_else(|| set.steal(me, &rng))
                                .is_some()
                            {}
                            if terminator.offer_termination() {
                                return;
                            }
                        }
                    })
                })
                .collect();

            for th in threads {
                th.join().unwrap();
            }
        })
    });
}

criterion_group!(
    benches,
    push_pop_small_batch,
    push_pop_large_batch,
    push_steal_batch,
    stealing_round,
);
criterion_main!(benches);
