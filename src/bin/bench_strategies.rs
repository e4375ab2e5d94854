use rand::{Rng, SeedableRng};
use std::time::Instant;
use tiled_deposit::{Array3, Box2, ComponentMap, DepositConfig, DepositEngine, Field, Stencil, Strategy};

struct Cloud {
    pos: Vec<[f64; 2]>,
    q: Vec<f64>,
}

fn seed_cloud(side: i32, per_cell: usize) -> Cloud {
    let n = (side * side) as usize * per_cell;
    let mut rng = rand::rngs::StdRng::seed_from_u64(0x5EED_1234_ABCD_EF01);
    let hi = side as f64 - 1.0;
    Cloud {
        pos: (0..n).map(|_| [rng.random_range(1.0..hi), rng.random_range(1.0..hi)]).collect(),
        q: (0..n).map(|_| rng.random_range(0.5..1.5)).collect(),
    }
}

fn start_cell(ip: usize, c: &Cloud) -> [i32; 2] {
    [c.pos[ip][0].floor() as i32 - 1, c.pos[ip][1].floor() as i32 - 1]
}

fn deposit_tsc(ip: usize, c: &Cloud, field: Array3<'_>, _: &ComponentMap<0>, depos: &ComponentMap<1>) {
    let Some(rho) = depos.get(0) else {
        return;
    };
    let [i0, j0] = start_cell(ip, c);
    let w = |x: f64| {
        let d = x - x.floor() - 0.5;
        [0.5 * (0.5 - d) * (0.5 - d), 0.75 - d * d, 0.5 * (0.5 + d) * (0.5 + d)]
    };
    let (wx, wy) = (w(c.pos[ip][0]), w(c.pos[ip][1]));
    for (b, wyb) in wy.iter().enumerate() {
        for (a, wxa) in wx.iter().enumerate() {
            field.add(i0 + a as i32, j0 + b as i32, 0, rho, c.q[ip] * wxa * wyb);
        }
    }
}

fn bench(engine: &DepositEngine, side: i32, cloud: &Cloud, iterations: u32) -> (f64, usize) {
    let bounds = Box2::from_size(side, side);
    let mut field = Field::new(bounds, 1, &["rho"]);
    let mut tiles = 0;
    let start = Instant::now();
    for _ in 0..iterations {
        field.fill_component(0, 0.0);
        let stats = engine.deposit(
            Stencil::<3, 3>,
            cloud.q.len(),
            |_, _: &Cloud| true,
            start_cell,
            deposit_tsc,
            &mut field,
            bounds,
            cloud,
            ComponentMap::new([]),
            ComponentMap::new([0]),
        );
        tiles = stats.tiles;
    }
    std::hint::black_box(field.component_sum(0));
    (start.elapsed().as_secs_f64() * 1000.0, tiles)
}

fn main() {
    env_logger::init();
    let scales: &[(i32, usize, u32)] = &[
        (128, 4, 50),  // fits in cache
        (256, 16, 20),
        (512, 16, 10),
        (1024, 8, 5),  // ~4096 host tiles
        (2048, 2, 3),
    ];

    println!(
        "{:<10} {:>10} {:<15} {:>8} {:>12} {:>10}",
        "Grid", "Particles", "Strategy", "Tiles", "Total(ms)", "Avg(ms)"
    );
    println!("{}", "-".repeat(70));

    for &(side, per_cell, iters) in scales {
        let cloud = seed_cloud(side, per_cell);
        for strategy in Strategy::ALL {
            let engine = DepositEngine::with_config(DepositConfig::default().strategy(strategy))
                .unwrap_or_else(|e| panic!("{e}"));
            let (total_ms, tiles) = bench(&engine, side, &cloud, iters);
            println!(
                "{:<10} {:>10} {:<15} {:>8} {:>12.1} {:>10.4}",
                format!("{}x{}", side, side),
                cloud.q.len(),
                strategy.name(),
                tiles,
                total_ms,
                total_ms / iters as f64
            );
        }
    }
}
