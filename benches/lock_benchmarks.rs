//! Бенчмарки блокировок для RustKV

use criterion::{criterion_group, criterion_main, Criterion};
use rustkv::core::{Lock, LockMode, TransactionId};
use rustkv::Database;

fn lock_request_release_benchmark(c: &mut Criterion) {
    c.bench_function("lock_request_release", |b| {
        let txn = TransactionId::new(1);
        b.iter(|| {
            let mut lock = Lock::new();
            lock.request(txn, LockMode::Exclusive);
            lock.release(txn);
        });
    });
}

fn lock_queue_cycle_benchmark(c: &mut Criterion) {
    c.bench_function("lock_queue_cycle", |b| {
        let txn1 = TransactionId::new(1);
        let txn2 = TransactionId::new(2);
        b.iter(|| {
            let mut lock = Lock::new();
            lock.request(txn1, LockMode::Exclusive);
            lock.request(txn2, LockMode::Shared);
            lock.release(txn1);
            lock.release(txn2);
        });
    });
}

fn transaction_put_commit_benchmark(c: &mut Criterion) {
    c.bench_function("transaction_put_commit", |b| {
        let db = Database::new().unwrap();
        b.iter(|| {
            let mut txn = db.begin_transaction().unwrap();
            txn.perform_put("bench", "1").unwrap();
            txn.commit().unwrap();
        });
    });
}

fn deadlock_detection_benchmark(c: &mut Criterion) {
    c.bench_function("deadlock_detection", |b| {
        let db = Database::new().unwrap();
        let mut txn1 = db.begin_transaction().unwrap();
        let mut txn2 = db.begin_transaction().unwrap();
        txn1.perform_put("a", "1").unwrap();
        txn2.perform_put("b", "2").unwrap();
        txn1.perform_get("b").unwrap();
        txn2.perform_get("a").unwrap();

        b.iter(|| {
            let _ = db.detect_deadlocks().unwrap();
        });
    });
}

criterion_group!(
    benches,
    lock_request_release_benchmark,
    lock_queue_cycle_benchmark,
    transaction_put_commit_benchmark,
    deadlock_detection_benchmark
);
criterion_main!(benches);
