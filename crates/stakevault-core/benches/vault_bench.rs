//! # Vault Benchmarks
//!
//! Performance benchmarks for stakevault-core selection, rate and ledger paths.
//!
//! Run with: `cargo bench -p stakevault-core`

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use stakevault_core::{
    AccountId, AssetMetadata, Epoch, InitParams, PoolId, PoolRegistry, PoolSelector, Session,
    SimulatedNetwork, UnlockPolicy, Weight, WithdrawalEntry, WithdrawalLedger, snapshot_to_bytes,
};
use std::hint::black_box;

fn registry_with(pools: usize) -> PoolRegistry {
    let mut reg = PoolRegistry::new(AccountId::new("0xtreasury"));
    for i in 0..pools {
        reg.set_pool_weight(PoolId::new(format!("pool-{i:05}")), Weight::new(1 + i as u128), true)
            .expect("insert");
    }
    reg
}

/// Initialized session with `pools` weighted pools and a funded staker.
fn session_with(pools: usize) -> Session {
    let admin = AccountId::new("0xadmin");
    let mut session = Session::new(admin.clone(), SimulatedNetwork::with_manual_clock(0));
    for i in 0..pools {
        session
            .register_pool(PoolId::new(format!("pool-{i:05}")))
            .expect("register");
    }
    session
        .fund(&AccountId::new("0xalice"), u64::MAX / 2)
        .expect("fund");
    session
        .initialize(
            &admin,
            InitParams {
                admin: admin.clone(),
                custody: AccountId::new("0xvault"),
                reward_receipt: AccountId::new("0xtreasury"),
                metadata: AssetMetadata {
                    name: "Staked".to_string(),
                    symbol: "stX".to_string(),
                    decimals: 8,
                },
                unlock_policy: UnlockPolicy::Weighted,
            },
        )
        .expect("init");
    for i in 0..pools {
        session
            .set_pool_weight(&admin, PoolId::new(format!("pool-{i:05}")), Weight::new(1))
            .expect("weight");
    }
    session
}

// =============================================================================
// BENCHMARKS
// =============================================================================

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("pool_selection");

    for size in [10, 100, 1000].iter() {
        let reg = registry_with(*size);
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            let mut sample = 0u64;
            b.iter(|| {
                sample = sample.wrapping_add(7);
                black_box(PoolSelector::choose_at(&reg, sample))
            });
        });
    }

    group.finish();
}

fn bench_stake(c: &mut Criterion) {
    let mut group = c.benchmark_group("stake");

    for size in [1, 10, 100].iter() {
        let mut session = session_with(*size);
        let alice = AccountId::new("0xalice");
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(session.stake(&alice, 1_000)));
        });
    }

    group.finish();
}

fn bench_drain(c: &mut Criterion) {
    let mut group = c.benchmark_group("drain_claimable");
    let account = AccountId::new("0xalice");

    for size in [10, 100, 1000].iter() {
        let mut ledger = WithdrawalLedger::new();
        for i in 0..*size {
            let epoch = if i % 2 == 0 { 0 } else { 9 };
            ledger.record_unlock(
                account.clone(),
                WithdrawalEntry::new(1, PoolId::new("p"), 0, Epoch::new(epoch)),
            );
        }

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| {
                let mut staged = ledger.clone();
                black_box(staged.drain_claimable(&account, |_| Ok(Epoch::new(1)), |_| Ok(())))
            });
        });
    }

    group.finish();
}

fn bench_snapshot(c: &mut Criterion) {
    let mut group = c.benchmark_group("snapshot_to_bytes");

    for size in [10, 100].iter() {
        let mut session = session_with(*size);
        let alice = AccountId::new("0xalice");
        for _ in 0..*size {
            let _ = session.stake(&alice, 1_000);
            let _ = session.tick(1);
        }
        let snapshot = session.snapshot();

        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
            b.iter(|| black_box(snapshot_to_bytes(&snapshot)));
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_selection,
    bench_stake,
    bench_drain,
    bench_snapshot,
);

criterion_main!(benches);
