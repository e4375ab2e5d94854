#![allow(dead_code)]

use rand::{Rng, SeedableRng};
use tiled_deposit::{Array3, ComponentMap, DepositConfig, DepositEngine, Strategy};

/// Structure-of-arrays particle set in cell units.
pub struct Particles {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub vx: Vec<f64>,
    pub vy: Vec<f64>,
    pub q: Vec<f64>,
    pub alive: Vec<bool>,
}

impl Particles {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    /// Charge carried by alive particles.
    pub fn alive_charge(&self) -> f64 {
        self.q.iter().zip(&self.alive).filter(|(_, a)| **a).map(|(q, _)| q).sum()
    }

    pub fn alive_count(&self) -> usize {
        self.alive.iter().filter(|a| **a).count()
    }
}

/// Particles uniformly spread over `[margin, size - margin)` in both axes.
pub fn random_particles(n: usize, size: f64, margin: f64, alive_fraction: f64, seed: u64) -> Particles {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut p = Particles {
        x: Vec::with_capacity(n),
        y: Vec::with_capacity(n),
        vx: Vec::with_capacity(n),
        vy: Vec::with_capacity(n),
        q: Vec::with_capacity(n),
        alive: Vec::with_capacity(n),
    };
    for _ in 0..n {
        p.x.push(rng.random_range(margin..size - margin));
        p.y.push(rng.random_range(margin..size - margin));
        p.vx.push(rng.random_range(-1.0..1.0));
        p.vy.push(rng.random_range(-1.0..1.0));
        p.q.push(rng.random_range(0.5..1.5));
        p.alive.push(rng.random_bool(alive_fraction));
    }
    p
}

pub fn engine(strategy: Strategy) -> DepositEngine {
    engine_with(DepositConfig::default().thread_count(4).strategy(strategy))
}

pub fn engine_with(config: DepositConfig) -> DepositEngine {
    DepositEngine::with_config(config).expect("engine config should be valid")
}

pub fn is_alive(ip: usize, p: &Particles) -> bool {
    p.alive[ip]
}

pub fn ngp_cell(ip: usize, p: &Particles) -> [i32; 2] {
    [p.x[ip].floor() as i32, p.y[ip].floor() as i32]
}

pub fn tsc_start(ip: usize, p: &Particles) -> [i32; 2] {
    [p.x[ip].floor() as i32 - 1, p.y[ip].floor() as i32 - 1]
}

/// Nearest-grid-point charge into deposit slot 0.
pub fn deposit_ngp(ip: usize, p: &Particles, field: Array3<'_>, _: &ComponentMap<0>, depos: &ComponentMap<1>) {
    if let Some(rho) = depos.get(0) {
        let [i, j] = ngp_cell(ip, p);
        field.add(i, j, 0, rho, p.q[ip]);
    }
}

#[inline]
fn tsc_weights(x: f64) -> (i32, [f64; 3]) {
    let c = x.floor();
    let d = x - c - 0.5;
    (c as i32 - 1, [0.5 * (0.5 - d) * (0.5 - d), 0.75 - d * d, 0.5 * (0.5 + d) * (0.5 + d)])
}

/// Quadratic-spline charge and current: slots are `[rho, jx, jy]`.
pub fn deposit_tsc(ip: usize, p: &Particles, field: Array3<'_>, _: &ComponentMap<0>, depos: &ComponentMap<3>) {
    let (i0, wx) = tsc_weights(p.x[ip]);
    let (j0, wy) = tsc_weights(p.y[ip]);
    let q = p.q[ip];
    let amounts = [q, q * p.vx[ip], q * p.vy[ip]];
    for (b, wyb) in wy.iter().enumerate() {
        for (a, wxa) in wx.iter().enumerate() {
            let w = wxa * wyb;
            for (slot, c) in depos.enabled() {
                field.add(i0 + a as i32, j0 + b as i32, 0, c, amounts[slot] * w);
            }
        }
    }
}

/// Element-wise comparison with a relative tolerance.
pub fn assert_close(a: &[f64], b: &[f64], rel: f64, what: &str) {
    assert_eq!(a.len(), b.len(), "{what}: length mismatch");
    for (i, (x, y)) in a.iter().zip(b).enumerate() {
        let scale = x.abs().max(y.abs()).max(1.0);
        assert!((x - y).abs() <= rel * scale, "{what}: cell {i} differs: {x} vs {y}");
    }
}
