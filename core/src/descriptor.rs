/// Structure-of-arrays descriptor storage: all vectors live in one flat
/// buffer of `len * dim` values. Keeps the distance loop cache-friendly and
/// makes the index invariant (`data.len() == len * dim`) structural.
#[derive(Debug, Clone)]
pub struct Descriptors {
    data: Vec<f32>,
    dim: usize,
}

impl Descriptors {
    /// `dim` is fixed for the lifetime of the set; every pushed descriptor
    /// must have exactly this length.
    pub fn new(dim: usize) -> Self {
        assert!(dim > 0, "descriptor dimension must be non-zero");
        Self {
            data: Vec::new(),
            dim,
        }
    }

    pub fn with_capacity(dim: usize, capacity: usize) -> Self {
        assert!(dim > 0, "descriptor dimension must be non-zero");
        Self {
            data: Vec::with_capacity(dim * capacity),
            dim,
        }
    }

    pub fn push(&mut self, descriptor: &[f32]) {
        assert_eq!(descriptor.len(), self.dim, "descriptor length mismatch");
        self.data.extend_from_slice(descriptor);
    }

    pub fn len(&self) -> usize {
        self.data.len() / self.dim
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, index: usize) -> &[f32] {
        let start = index * self.dim;
        &self.data[start..start + self.dim]
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.data.chunks_exact(self.dim)
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Euclidean distance between two descriptor vectors of equal length.
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum::<f32>()
        .sqrt()
}
