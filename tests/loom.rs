#![cfg(stealq_loom)]

use loom::thread;

use stealq::{StealError, Stealer, Worker};

// The owner and a thief contend for a single task: exactly one claimant
// may come out with it and the ring must end up empty and reusable.
#[test]
fn loom_last_task_race() {
    loom::model(|| {
        let worker = Worker::with_capacity(4);
        let stealer = worker.stealer();

        worker.push(42).unwrap();

        let thief = thread::spawn(move || stealer.steal().ok());

        let popped = worker.pop();
        let stolen = thief.join().unwrap();

        assert_eq!(
            popped.into_iter().chain(stolen).collect::<Vec<_>>(),
            vec![42]
        );

        // The canonical empty state must survive the race.
        assert!(worker.is_empty());
        worker.push(7).unwrap();
        assert_eq!(worker.pop(), Some(7));
    });
}

// Two thieves and the owner drain three tasks; every task goes to
// exactly one claimant.
#[test]
fn loom_multi_stealer() {
    const NUM_TASKS: usize = 3;

    fn steal_one(stealer: Stealer<usize>) -> usize {
        match stealer.steal() {
            Ok(_) => 1,
            Err(_) => 0,
        }
    }

    loom::model(|| {
        let worker = Worker::with_capacity(8);
        let stealer1 = worker.stealer();
        let stealer2 = worker.stealer();

        for task in 0..NUM_TASKS {
            worker.push(task).unwrap();
        }

        let th1 = thread::spawn(move || steal_one(stealer1));
        let th2 = thread::spawn(move || steal_one(stealer2));

        let mut claimed = 0;
        while worker.pop().is_some() {
            claimed += 1;
        }

        claimed += th1.join().unwrap();
        claimed += th2.join().unwrap();

        assert_eq!(claimed, NUM_TASKS);
    });
}

// Pushes run concurrently with the steals; the thief observes either
// nothing, the oldest task, or a claim lost to the owner, but the total
// claim count always adds up.
#[test]
fn loom_push_and_steal() {
    loom::model(|| {
        let worker = Worker::with_capacity(4);
        let stealer = worker.stealer();

        let thief = thread::spawn(move || match stealer.steal() {
            Ok(_) => 1,
            Err(StealError::Empty) | Err(StealError::Contended) => 0,
        });

        worker.push(1).unwrap();
        worker.push(2).unwrap();

        let mut claimed = 0;
        while worker.pop().is_some() {
            claimed += 1;
        }

        claimed += thief.join().unwrap();

        assert_eq!(claimed, 2);
    });
}
