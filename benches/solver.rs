//! Benchmarks for the upgrade placement solver.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};

use upgrade_solver::geometry::{all_rotations, anchor_base_offset};
use upgrade_solver::grid::{format_board, EquipGrid, GridMap, PATTERN_ENABLED};
use upgrade_solver::persistence::{parse_puzzle, DEMO_PUZZLE};
use upgrade_solver::solver::{can_fit_all, solve, AnchorOffsetCache};
use upgrade_solver::upgrades::{Carrier, GearKind, Pattern, Rarity, Upgrade, UpgradeId};
use upgrade_solver::Workbench;

const GEAR: Carrier = Carrier::Gear {
    id: 1,
    kind: GearKind::Equipment,
};

/// Four 2x2 blocks and four dominoes on an open 6x4 grid.
fn tiling_set() -> Vec<Upgrade> {
    let block = GridMap::from_rows(&["##", "##"], PATTERN_ENABLED).unwrap();
    let domino = GridMap::from_rows(&["##"], PATTERN_ENABLED).unwrap();
    let block = std::sync::Arc::new(Pattern::new(block));
    let domino = std::sync::Arc::new(Pattern::new(domino));
    (0..8)
        .map(|id| {
            let pattern = if id < 4 { block.clone() } else { domino.clone() };
            Upgrade::new(UpgradeId(id), format!("Piece {id}"), Rarity::Rare, pattern)
        })
        .collect()
}

/// Benchmark a complete search with one rotation.
fn bench_solve(c: &mut Criterion) {
    let upgrades = tiling_set();
    c.bench_function("solve_tiling", |b| {
        b.iter_batched(
            || (Workbench::new(EquipGrid::open(6, 4)), upgrades.clone()),
            |(mut bench, upgrades)| solve(black_box(upgrades), &mut bench, GEAR, 1),
            BatchSize::SmallInput,
        )
    });
}

/// Benchmark the demo puzzle with all six rotations.
fn bench_solve_demo_rotating(c: &mut Criterion) {
    let puzzle = parse_puzzle(DEMO_PUZZLE).unwrap();
    let selection = puzzle.selection();
    c.bench_function("solve_demo_rotating", |b| {
        b.iter_batched(
            || (puzzle.workbench.clone(), selection.clone()),
            |(mut bench, selection)| solve(black_box(selection), &mut bench, puzzle.carrier, 6),
            BatchSize::SmallInput,
        )
    });
}

/// Benchmark computing all rotations plus anchor offsets for one pattern.
fn bench_rotations(c: &mut Criterion) {
    let map = GridMap::from_rows(&["##.##", "#####"], PATTERN_ENABLED).unwrap();

    c.bench_function("all_rotations", |b| {
        b.iter(|| {
            all_rotations(black_box(&map))
                .iter()
                .map(anchor_base_offset)
                .collect::<Vec<_>>()
        })
    });
}

/// Benchmark cached anchor offset lookups.
fn bench_offset_cache(c: &mut Criterion) {
    let upgrades = tiling_set();
    let mut cache = AnchorOffsetCache::new();

    c.bench_function("anchor_offset_cache", |b| {
        b.iter(|| {
            for upgrade in &upgrades {
                for rotation in 0..6 {
                    black_box(cache.offset_for(upgrade, rotation, (3, 2)));
                }
            }
        })
    });
}

fn bench_can_fit_all(c: &mut Criterion) {
    let upgrades = tiling_set();
    c.bench_function("can_fit_all", |b| {
        b.iter(|| can_fit_all(black_box(&upgrades), 6, 4))
    });
}

/// Benchmark formatting a solved board for display.
fn bench_format_board(c: &mut Criterion) {
    let upgrades = tiling_set();
    let mut bench = Workbench::new(EquipGrid::open(6, 4));
    solve(upgrades.clone(), &mut bench, GEAR, 1);

    c.bench_function("format_board", |b| {
        b.iter(|| format_board(black_box(bench.grid()), &upgrades))
    });
}

criterion_group!(
    benches,
    bench_solve,
    bench_solve_demo_rotating,
    bench_rotations,
    bench_offset_cache,
    bench_can_fit_all,
    bench_format_board
);
criterion_main!(benches);
