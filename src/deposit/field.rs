//! Field storage and the addressable view handed to deposit functions.
//!
//! A `Field` covers a rectangular `Box2` in the two tiled dimensions, `nz`
//! untiled slices and a fixed set of named components. Every value is an
//! `AtomicReal`, so concurrent workers can add into shared cells without
//! locks. Layout is x fastest, then y, then z, then component.
//!
//! `Array3` is the borrowed view used for both the global field and the
//! per-tile scratch buffers of the shared-scratch path.

use std::sync::atomic::{AtomicU64, Ordering};

/// An `f64` cell with atomic add, backed by its bit pattern.
#[derive(Debug, Default)]
#[repr(transparent)]
pub struct AtomicReal(AtomicU64);

impl AtomicReal {
    #[inline]
    pub fn new(value: f64) -> Self {
        Self(AtomicU64::new(value.to_bits()))
    }

    #[inline(always)]
    pub fn load(&self) -> f64 {
        f64::from_bits(self.0.load(Ordering::Relaxed))
    }

    #[inline(always)]
    pub fn store(&self, value: f64) {
        self.0.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Atomically add `value`, returning the previous contents.
    #[inline(always)]
    pub fn fetch_add(&self, value: f64) -> f64 {
        let mut current = self.0.load(Ordering::Relaxed);
        loop {
            let next = (f64::from_bits(current) + value).to_bits();
            match self
                .0
                .compare_exchange_weak(current, next, Ordering::Relaxed, Ordering::Relaxed)
            {
                Ok(prev) => return f64::from_bits(prev),
                Err(actual) => current = actual,
            }
        }
    }

    #[inline]
    pub fn into_inner(self) -> f64 {
        f64::from_bits(self.0.into_inner())
    }
}

/// Inclusive index range in the two tiled dimensions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Box2 {
    pub lo: [i32; 2],
    pub hi: [i32; 2],
}

impl Box2 {
    #[inline]
    pub const fn new(lo: [i32; 2], hi: [i32; 2]) -> Self {
        Self { lo, hi }
    }

    /// Box of `nx × ny` cells starting at the origin.
    #[inline]
    pub const fn from_size(nx: i32, ny: i32) -> Self {
        Self { lo: [0, 0], hi: [nx - 1, ny - 1] }
    }

    #[inline]
    pub const fn is_empty(&self) -> bool {
        self.hi[0] < self.lo[0] || self.hi[1] < self.lo[1]
    }

    /// Number of cells along `dim`, zero for an empty box.
    #[inline]
    pub fn length(&self, dim: usize) -> usize {
        (self.hi[dim] - self.lo[dim] + 1).max(0) as usize
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.length(0) * self.length(1)
    }

    #[inline]
    pub fn contains(&self, cell: [i32; 2]) -> bool {
        cell[0] >= self.lo[0] && cell[0] <= self.hi[0] && cell[1] >= self.lo[1] && cell[1] <= self.hi[1]
    }

    /// Whether the `extent` cells starting at `cell` all lie in the box.
    #[inline]
    pub fn contains_footprint(&self, cell: [i32; 2], extent: [usize; 2]) -> bool {
        extent[0] > 0
            && extent[1] > 0
            && self.contains(cell)
            && self.contains([cell[0] + extent[0] as i32 - 1, cell[1] + extent[1] as i32 - 1])
    }

    #[inline]
    pub fn contains_box(&self, other: &Box2) -> bool {
        other.is_empty() || (self.contains(other.lo) && self.contains(other.hi))
    }

    /// Grow the box by `n` cells on every side.
    #[inline]
    pub const fn grow(&self, n: i32) -> Self {
        Self {
            lo: [self.lo[0] - n, self.lo[1] - n],
            hi: [self.hi[0] + n, self.hi[1] + n],
        }
    }
}

/// Borrowed 3D view with `ncomp` components over a slice of `AtomicReal`.
///
/// `begin` is inclusive and `end` exclusive. The view is `Copy`, so deposit
/// functions take it by value.
#[derive(Clone, Copy, Debug)]
pub struct Array3<'a> {
    data: &'a [AtomicReal],
    begin: [i32; 3],
    end: [i32; 3],
    jstride: usize,
    kstride: usize,
    nstride: usize,
    ncomp: usize,
}

impl<'a> Array3<'a> {
    pub fn new(data: &'a [AtomicReal], begin: [i32; 3], end: [i32; 3], ncomp: usize) -> Self {
        let nx = (end[0] - begin[0]).max(0) as usize;
        let ny = (end[1] - begin[1]).max(0) as usize;
        let nz = (end[2] - begin[2]).max(0) as usize;
        let jstride = nx;
        let kstride = nx * ny;
        let nstride = kstride * nz;
        assert!(
            data.len() >= nstride * ncomp,
            "array storage too small: {} < {}",
            data.len(),
            nstride * ncomp
        );
        Self { data, begin, end, jstride, kstride, nstride, ncomp }
    }

    #[inline]
    pub fn begin(&self) -> [i32; 3] {
        self.begin
    }

    #[inline]
    pub fn end(&self) -> [i32; 3] {
        self.end
    }

    #[inline]
    pub fn ncomp(&self) -> usize {
        self.ncomp
    }

    #[inline]
    pub fn contains(&self, i: i32, j: i32, k: i32) -> bool {
        i >= self.begin[0]
            && i < self.end[0]
            && j >= self.begin[1]
            && j < self.end[1]
            && k >= self.begin[2]
            && k < self.end[2]
    }

    #[inline(always)]
    fn index(&self, i: i32, j: i32, k: i32, n: usize) -> usize {
        debug_assert!(
            self.contains(i, j, k),
            "cell ({i}, {j}, {k}) outside [{:?}, {:?})",
            self.begin,
            self.end
        );
        debug_assert!(n < self.ncomp, "component {n} out of range ({})", self.ncomp);
        (i - self.begin[0]) as usize
            + (j - self.begin[1]) as usize * self.jstride
            + (k - self.begin[2]) as usize * self.kstride
            + n * self.nstride
    }

    #[inline(always)]
    pub fn cell(&self, i: i32, j: i32, k: i32, n: usize) -> &'a AtomicReal {
        &self.data[self.index(i, j, k, n)]
    }

    #[inline(always)]
    pub fn get(&self, i: i32, j: i32, k: i32, n: usize) -> f64 {
        self.cell(i, j, k, n).load()
    }

    #[inline(always)]
    pub fn add(&self, i: i32, j: i32, k: i32, n: usize, value: f64) {
        self.cell(i, j, k, n).fetch_add(value);
    }

    #[inline(always)]
    pub(crate) fn store(&self, i: i32, j: i32, k: i32, n: usize, value: f64) {
        self.cell(i, j, k, n).store(value);
    }
}

/// Caller-owned field region with named components.
#[derive(Debug)]
pub struct Field {
    bounds: Box2,
    nz: usize,
    names: Vec<String>,
    data: Vec<AtomicReal>,
}

impl Field {
    /// Zero-initialized field over `bounds` with `nz` untiled slices.
    pub fn new<S: AsRef<str>>(bounds: Box2, nz: usize, components: &[S]) -> Self {
        assert!(!bounds.is_empty(), "field bounds must be non-empty: {bounds:?}");
        assert!(nz > 0, "field needs at least one z slice");
        let names: Vec<String> = components.iter().map(|s| s.as_ref().to_owned()).collect();
        let len = bounds.num_cells() * nz * names.len();
        let data = (0..len).map(|_| AtomicReal::default()).collect();
        Self { bounds, nz, names, data }
    }

    #[inline]
    pub fn bounds(&self) -> Box2 {
        self.bounds
    }

    #[inline]
    pub fn nz(&self) -> usize {
        self.nz
    }

    #[inline]
    pub fn ncomp(&self) -> usize {
        self.names.len()
    }

    pub fn component_names(&self) -> &[String] {
        &self.names
    }

    /// Index of the component called `name`.
    pub fn component(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// View over the whole field.
    #[inline]
    pub fn array(&self) -> Array3<'_> {
        Array3::new(
            &self.data,
            [self.bounds.lo[0], self.bounds.lo[1], 0],
            [self.bounds.hi[0] + 1, self.bounds.hi[1] + 1, self.nz as i32],
            self.ncomp(),
        )
    }

    #[inline]
    pub fn get(&self, i: i32, j: i32, k: i32, n: usize) -> f64 {
        self.array().get(i, j, k, n)
    }

    #[inline]
    pub fn set(&mut self, i: i32, j: i32, k: i32, n: usize, value: f64) {
        self.array().store(i, j, k, n, value);
    }

    fn component_slice(&self, n: usize) -> &[AtomicReal] {
        assert!(n < self.ncomp(), "component {n} out of range ({})", self.ncomp());
        let len = self.bounds.num_cells() * self.nz;
        &self.data[n * len..(n + 1) * len]
    }

    pub fn fill_component(&mut self, n: usize, value: f64) {
        for cell in self.component_slice(n) {
            cell.store(value);
        }
    }

    /// Sum over every cell of component `n`.
    pub fn component_sum(&self, n: usize) -> f64 {
        self.component_slice(n).iter().map(AtomicReal::load).sum()
    }

    /// Snapshot of component `n` in storage order.
    pub fn component_values(&self, n: usize) -> Vec<f64> {
        self.component_slice(n).iter().map(AtomicReal::load).collect()
    }
}
