use std::{
    collections::HashSet,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use futures_util::FutureExt;
use loyalty_engine::worker_pool::{JobHandler, WorkerPool, WorkerPoolError};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;

fn sleeper(slow: HashSet<u32>, slow_for: Duration) -> JobHandler<u32, u32, ()> {
    Arc::new(move |_cancel: CancellationToken, job: u32| {
        let delay = if slow.contains(&job) { slow_for } else { Duration::from_millis(1) };
        async move {
            tokio::time::sleep(delay).await;
            Ok(job)
        }
        .boxed()
    })
}

#[tokio::test]
async fn slow_jobs_do_not_get_lost() {
    let slow = HashSet::from([1, 3]);
    let mut pool = WorkerPool::new(2, 4, CancellationToken::new(), sleeper(slow, Duration::from_millis(200))).unwrap();
    for job in 0..4 {
        pool.submit(job).await.unwrap();
    }
    pool.stop_and_wait().await;
    let mut results = pool.outcomes().map(Result::unwrap).collect::<Vec<_>>();
    results.sort();
    assert_eq!(results, vec![0, 1, 2, 3]);
    assert_eq!(pool.outstanding(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrency_is_bounded_by_the_number_of_workers() {
    let in_flight = Arc::new(AtomicUsize::new(0));
    let max_in_flight = Arc::new(AtomicUsize::new(0));
    let handler: JobHandler<u32, (), ()> = {
        let in_flight = Arc::clone(&in_flight);
        let max_in_flight = Arc::clone(&max_in_flight);
        Arc::new(move |_cancel: CancellationToken, _job: u32| {
            let in_flight = Arc::clone(&in_flight);
            let max_in_flight = Arc::clone(&max_in_flight);
            async move {
                let now = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                max_in_flight.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(20)).await;
                in_flight.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            }
            .boxed()
        })
    };
    let mut pool = WorkerPool::new(3, 6, CancellationToken::new(), handler).unwrap();
    for job in 0..12 {
        pool.submit(job).await.unwrap();
    }
    pool.stop_and_wait().await;
    assert_eq!(pool.outcomes().count(), 12);
    let max = max_in_flight.load(Ordering::SeqCst);
    assert!(max >= 1 && max <= 3, "{max} jobs ran at the same time");
}

#[tokio::test]
async fn full_queues_block_submission() {
    let release = Arc::new(Notify::new());
    let handler: JobHandler<u32, u32, ()> = {
        let release = Arc::clone(&release);
        Arc::new(move |_cancel: CancellationToken, job: u32| {
            let release = Arc::clone(&release);
            async move {
                release.notified().await;
                Ok(job)
            }
            .boxed()
        })
    };
    let mut pool = WorkerPool::new(1, 1, CancellationToken::new(), handler).unwrap();
    pool.submit(0).await.unwrap();
    // Let the worker pick up the first job so that the second one fills the queue
    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.submit(1).await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(100), pool.submit(2)).await;
    assert!(blocked.is_err(), "submit should wait while the queue is full");
    assert_eq!(pool.submitted(), 2);

    release.notify_one();
    tokio::time::sleep(Duration::from_millis(20)).await;
    release.notify_one();
    pool.stop_and_wait().await;
    let mut results = pool.outcomes().map(Result::unwrap).collect::<Vec<_>>();
    results.sort();
    assert_eq!(results, vec![0, 1]);
}

#[tokio::test]
async fn cancellation_abandons_queued_jobs() {
    let cancel = CancellationToken::new();
    let handler = sleeper(HashSet::from([0, 1, 2, 3, 4]), Duration::from_millis(100));
    let mut pool = WorkerPool::new(1, 10, cancel.clone(), handler).unwrap();
    for job in 0..5 {
        pool.submit(job).await.unwrap();
    }
    tokio::time::sleep(Duration::from_millis(30)).await;
    cancel.cancel();
    pool.stop_and_wait().await;
    // The job in hand finishes; the rest are left behind
    let results = pool.outcomes().map(Result::unwrap).collect::<Vec<_>>();
    assert_eq!(results, vec![0]);
    assert_eq!(pool.submitted(), 5);
    assert_eq!(pool.outstanding(), 4);
    assert_eq!(pool.submit(5).await, Err(WorkerPoolError::Stopped));
}

#[tokio::test]
async fn cancellation_unblocks_a_waiting_submitter() {
    let cancel = CancellationToken::new();
    let mut pool = WorkerPool::new(1, 1, cancel.clone(), sleeper(HashSet::from([0]), Duration::from_secs(1))).unwrap();
    pool.submit(0).await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    pool.submit(1).await.unwrap();
    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
    });
    assert_eq!(pool.submit(2).await, Err(WorkerPoolError::Cancelled));
    canceller.await.unwrap();
    pool.stop_and_wait().await;
    assert_eq!(pool.outstanding(), 1);
}

#[tokio::test]
async fn dropping_a_running_pool_cancels_it() {
    let parent = CancellationToken::new();
    let started = Arc::new(AtomicUsize::new(0));
    let cancelled = Arc::new(AtomicUsize::new(0));
    let (s, c) = (started.clone(), cancelled.clone());
    let handler: JobHandler<u32, u32, ()> = Arc::new(move |cancel: CancellationToken, job: u32| {
        let (started, cancelled) = (s.clone(), c.clone());
        async move {
            started.fetch_add(1, Ordering::SeqCst);
            tokio::select! {
                _ = cancel.cancelled() => {
                    cancelled.fetch_add(1, Ordering::SeqCst);
                },
                _ = tokio::time::sleep(Duration::from_millis(200)) => {},
            }
            Ok(job)
        }
        .boxed()
    });
    let mut pool = WorkerPool::new(1, 10, parent.clone(), handler).unwrap();
    for job in 0..5 {
        pool.submit(job).await.unwrap();
    }
    // Let the only worker pick up the first job
    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(pool);
    tokio::time::sleep(Duration::from_millis(400)).await;
    // The queued jobs are never started and the running one sees the cancellation
    assert_eq!(started.load(Ordering::SeqCst), 1);
    assert_eq!(cancelled.load(Ordering::SeqCst), 1);
    assert!(!parent.is_cancelled());
}
