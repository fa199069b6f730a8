//! Per-call write configuration.

use tessera_store::CreateOptions;

/// Target size of one chunk when compression is requested.
pub const CHUNK_TARGET_BYTES: usize = 1 << 20;

/// How hard the container should compress a new object. Level 0 stores it uncompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompressionHint {
    /// Deflate level, 0 to 9
    pub level: u8,
}

impl CompressionHint {
    /// No compression.
    pub const NONE: Self = Self { level: 0 };

    /// Compression at `level`, capped at 9.
    pub fn new(level: u8) -> Self {
        Self {
            level: level.min(9),
        }
    }

    /// True if compression was requested.
    pub fn is_enabled(&self) -> bool {
        self.level > 0
    }
}

/// Options for writing a table or array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct WriteOptions {
    /// Compression hint passed to the container
    pub compression: CompressionHint,
    /// Replace an existing object at the same path instead of failing
    pub overwrite: bool,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            compression: CompressionHint::NONE,
            overwrite: true,
        }
    }
}

impl WriteOptions {
    /// Set the compression hint.
    pub fn with_compression(mut self, compression: CompressionHint) -> Self {
        self.compression = compression;
        self
    }

    /// Set whether an existing object is replaced.
    pub fn with_overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// The container settings for an object of `dims` with `element_size`-byte elements.
    ///
    /// Empty and uncompressed objects are stored contiguously. Byte shuffling is only requested
    /// for elements wider than one byte.
    pub(crate) fn create_options(&self, dims: &[usize], element_size: usize) -> CreateOptions {
        let count: usize = dims.iter().product();
        if !self.compression.is_enabled() || count == 0 || dims.is_empty() {
            return CreateOptions::default();
        }
        CreateOptions {
            chunk_dims: Some(plan_chunks(dims, element_size)),
            deflate_level: self.compression.level,
            shuffle: element_size > 1,
        }
    }
}

/// Chunk extents for an object of `dims` with `element_size`-byte elements.
///
/// Starting from the full extent, the largest axis is halved (rounding up) until a chunk fits in
/// [`CHUNK_TARGET_BYTES`] or every axis is 1.
pub fn plan_chunks(dims: &[usize], element_size: usize) -> Vec<usize> {
    let mut chunk: Vec<usize> = dims.iter().map(|d| (*d).max(1)).collect();
    let bytes = |chunk: &[usize]| {
        chunk
            .iter()
            .fold(element_size, |acc, d| acc.saturating_mul(*d))
    };
    while bytes(&chunk) > CHUNK_TARGET_BYTES {
        let largest = chunk.iter().copied().max().unwrap_or(1);
        if largest <= 1 {
            break;
        }
        // ties go to the first axis
        let Some(axis) = chunk.iter().position(|d| *d == largest) else {
            break;
        };
        chunk[axis] = largest.div_ceil(2);
    }
    chunk
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(&[100], 8, vec![100])]
    #[case(&[1 << 20], 8, vec![1 << 17])]
    #[case(&[3_000_000], 1, vec![750_000])]
    #[case(&[4096, 4096], 8, vec![256, 512])]
    #[case(&[1, 1], 1 << 24, vec![1, 1])]
    fn chunk_plans(#[case] dims: &[usize], #[case] size: usize, #[case] expected: Vec<usize>) {
        let plan = plan_chunks(dims, size);
        assert_eq!(plan, expected);
    }

    #[test]
    fn chunks_fit_target() {
        for dims in [vec![1000, 1000, 3], vec![7, 999_999], vec![12_345_678]] {
            let plan = plan_chunks(&dims, 8);
            assert!(plan.iter().product::<usize>() * 8 <= CHUNK_TARGET_BYTES);
            assert!(plan.iter().zip(&dims).all(|(c, d)| c <= d));
        }
    }

    #[test]
    fn uncompressed_is_contiguous() {
        let opts = WriteOptions::default();
        assert_eq!(opts.create_options(&[10_000_000], 8), CreateOptions::default());
        let opts = opts.with_compression(CompressionHint::new(12));
        assert_eq!(opts.compression.level, 9);
        assert_eq!(opts.create_options(&[0], 8), CreateOptions::default());
        let created = opts.create_options(&[10], 1);
        assert_eq!(created.chunk_dims, Some(vec![10]));
        assert!(!created.shuffle);
    }
}
