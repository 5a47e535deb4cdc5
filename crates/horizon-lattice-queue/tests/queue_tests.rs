//! Tests for cross-thread message queue behavior.

use std::collections::HashMap;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use horizon_lattice_queue::{Envelope, MessageQueue, QueueBuilder, QueueError};

const CHAIN_LENGTH: usize = 10;
const MESSAGES_PER_THREAD: usize = 100;

#[test]
fn test_per_producer_fifo_order() {
    let queue = Arc::new(MessageQueue::<(usize, usize)>::new());
    let producers: Vec<_> = (0..4)
        .map(|producer| {
            let queue = queue.clone();
            thread::spawn(move || {
                for seq in 0..250 {
                    queue.post((producer, seq)).unwrap();
                }
            })
        })
        .collect();

    let mut next_expected: HashMap<usize, usize> = HashMap::new();
    for _ in 0..1000 {
        let (producer, seq) = queue.receive().unwrap();
        let expected = next_expected.entry(producer).or_insert(0);
        assert_eq!(seq, *expected, "producer {producer} delivered out of order");
        *expected += 1;
    }

    for handle in producers {
        handle.join().unwrap();
    }
    assert!(queue.is_empty());
    assert!(next_expected.values().all(|&count| count == 250));
}

/// Each thread receives from its own queue and forwards to the next one.
/// The last thread in the chain gets the values straight from the test.
#[test]
fn test_forwarding_chain() {
    let queues: Vec<Arc<MessageQueue<Envelope<usize>>>> = (0..CHAIN_LENGTH)
        .map(|i| {
            Arc::new(
                QueueBuilder::new()
                    .name(format!("chain-{i}"))
                    .initial_capacity(MESSAGES_PER_THREAD)
                    .build(),
            )
        })
        .collect();

    let handles: Vec<_> = (0..CHAIN_LENGTH)
        .map(|i| {
            let input = queues[i].clone();
            let output = (i > 0).then(|| queues[i - 1].clone());
            thread::spawn(move || {
                let mut received = Vec::with_capacity(MESSAGES_PER_THREAD);
                loop {
                    match input.receive_timeout(Duration::from_secs(10)) {
                        Ok(Envelope::Message(value)) => {
                            received.push(value);
                            if let Some(next) = &output {
                                next.post(Envelope::Message(value)).unwrap();
                            }
                        }
                        Ok(Envelope::Shutdown) => {
                            if let Some(next) = &output {
                                next.post(Envelope::Shutdown).unwrap();
                            }
                            break;
                        }
                        Err(err) => panic!("chain thread {i} failed: {err}"),
                    }
                }
                received
            })
        })
        .collect();

    let tail = &queues[CHAIN_LENGTH - 1];
    for value in 0..MESSAGES_PER_THREAD {
        tail.post(Envelope::Message(value)).unwrap();
    }
    tail.post(Envelope::Shutdown).unwrap();

    let expected: Vec<usize> = (0..MESSAGES_PER_THREAD).collect();
    for handle in handles {
        let received = handle.join().unwrap();
        assert_eq!(received, expected);
    }
    assert!(queues.iter().all(|q| q.is_empty()));
}

#[test]
fn test_two_receivers_with_timeout() {
    let first = Arc::new(MessageQueue::<i32>::new());
    let second = Arc::new(MessageQueue::<i32>::new());

    let spawn_receiver = |queue: Arc<MessageQueue<i32>>| {
        thread::spawn(move || {
            (0..2)
                .map(|_| queue.receive_timeout(Duration::from_secs(1)))
                .collect::<Vec<_>>()
        })
    };
    let first_handle = spawn_receiver(first.clone());
    let second_handle = spawn_receiver(second.clone());

    first.post(1).unwrap();
    first.post(2).unwrap();
    second.post(3).unwrap();

    assert_eq!(first_handle.join().unwrap(), vec![Ok(1), Ok(2)]);
    assert_eq!(
        second_handle.join().unwrap(),
        vec![Ok(3), Err(QueueError::Timeout)]
    );
}

/// Wakes the waiter with a message and takes it back before the waiter can
/// grab it, so the waiter sees empty wakeups and has to wait again.
#[test]
fn test_empty_wakeups_do_not_shorten_timeout() {
    const TIMEOUT: Duration = Duration::from_millis(150);

    for _attempt in 0..20 {
        let queue = Arc::new(MessageQueue::<i32>::new());
        let waiter = {
            let queue = queue.clone();
            thread::spawn(move || {
                let start = Instant::now();
                let result = queue.receive_timeout(TIMEOUT);
                (result, start.elapsed())
            })
        };

        let mut reclaimed = 0;
        while !waiter.is_finished() {
            thread::sleep(Duration::from_millis(10));
            queue.post(1).unwrap();
            if queue.try_receive().unwrap().is_some() {
                reclaimed += 1;
            }
        }

        match waiter.join().unwrap() {
            // The waiter won a race for the message; try again.
            (Ok(_), _) => continue,
            (result, elapsed) => {
                assert_eq!(result, Err(QueueError::Timeout));
                assert!(reclaimed > 0);
                assert!(elapsed >= TIMEOUT, "timed out early after {elapsed:?}");
                assert!(elapsed < Duration::from_secs(2));
                return;
            }
        }
    }
    panic!("waiter never saw only empty wakeups");
}

#[test]
fn test_multiple_waiters_each_get_one_message() {
    let queue = Arc::new(MessageQueue::<usize>::new());
    let waiters: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            thread::spawn(move || queue.receive_timeout(Duration::from_secs(5)))
        })
        .collect();

    thread::sleep(Duration::from_millis(20));
    for i in 0..4 {
        queue.post(i).unwrap();
    }

    let mut got: Vec<usize> = waiters
        .into_iter()
        .map(|handle| handle.join().unwrap().unwrap())
        .collect();
    got.sort_unstable();
    assert_eq!(got, vec![0, 1, 2, 3]);
}

#[test]
fn test_queue_with_tracing_subscriber() {
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .finish();

    tracing::subscriber::with_default(subscriber, || {
        let queue = QueueBuilder::new().name("traced").build::<u32>();
        queue.post(1).unwrap();
        assert_eq!(queue.receive_timeout(Duration::from_millis(10)), Ok(1));
        assert_eq!(
            queue.receive_timeout(Duration::from_millis(1)),
            Err(QueueError::Timeout)
        );
        queue.clear().unwrap();
    });
}
