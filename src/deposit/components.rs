//! Component index maps for cached (read) and deposited (write) components.

/// Sentinel component index: the slot is skipped entirely.
pub const DISABLED: u32 = u32::MAX;

/// Fixed-length list of field component indices, some possibly `DISABLED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ComponentMap<const N: usize> {
    idx: [u32; N],
}

impl<const N: usize> ComponentMap<N> {
    #[inline]
    pub const fn new(idx: [u32; N]) -> Self {
        Self { idx }
    }

    /// Map with every slot disabled.
    #[inline]
    pub const fn disabled() -> Self {
        Self { idx: [DISABLED; N] }
    }

    /// Component behind slot `n`, `None` if the slot is disabled.
    #[inline(always)]
    pub fn get(&self, n: usize) -> Option<usize> {
        match self.idx[n] {
            DISABLED => None,
            c => Some(c as usize),
        }
    }

    #[inline(always)]
    pub fn is_disabled(&self, n: usize) -> bool {
        self.idx[n] == DISABLED
    }

    #[inline]
    pub fn raw(&self) -> [u32; N] {
        self.idx
    }

    /// `(slot, component)` pairs for every enabled slot.
    #[inline]
    pub fn enabled(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        (0..N).filter_map(|n| self.get(n).map(|c| (n, c)))
    }

    /// Largest referenced component, if any slot is enabled.
    pub fn max_component(&self) -> Option<usize> {
        self.enabled().map(|(_, c)| c).max()
    }

    /// Tile-local remap: enabled slot `n` becomes `offset + n`.
    pub fn to_local(&self, offset: usize) -> Self {
        let mut idx = [DISABLED; N];
        for (n, slot) in idx.iter_mut().enumerate() {
            if !self.is_disabled(n) {
                *slot = (offset + n) as u32;
            }
        }
        Self { idx }
    }
}

impl<const N: usize> From<[u32; N]> for ComponentMap<N> {
    fn from(idx: [u32; N]) -> Self {
        Self::new(idx)
    }
}
