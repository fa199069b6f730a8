//! Reordering of flat N-dimensional buffers between the two axis-order conventions.
//!
//! The host lays arrays out with the first axis varying fastest; the container lays them out with
//! the last axis varying fastest. [`transpose`] converts between the two on raw bytes, so it
//! serves numeric, text-handle and opaque elements alike.

/// Which axis varies fastest through a flat buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum AxisOrder {
    /// The first axis varies fastest (the host's convention).
    FirstFast,
    /// The last axis varies fastest (the container's convention).
    LastFast,
}

impl AxisOrder {
    /// The direction that converts a buffer in this order into `target`, if they differ.
    pub fn direction_to(self, target: AxisOrder) -> Option<Direction> {
        match (self, target) {
            (Self::LastFast, Self::FirstFast) => Some(Direction::ToFirstFast),
            (Self::FirstFast, Self::LastFast) => Some(Direction::ToLastFast),
            _ => None,
        }
    }
}

/// The conversion a [`transpose`] performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// From last-axis-fastest to first-axis-fastest.
    ToFirstFast,
    /// From first-axis-fastest to last-axis-fastest.
    ToLastFast,
}

impl Direction {
    /// The opposite conversion.
    pub fn reverse(self) -> Self {
        match self {
            Self::ToFirstFast => Self::ToLastFast,
            Self::ToLastFast => Self::ToFirstFast,
        }
    }

    /// The order of the buffer being converted.
    pub fn source_order(self) -> AxisOrder {
        match self {
            Self::ToFirstFast => AxisOrder::LastFast,
            Self::ToLastFast => AxisOrder::FirstFast,
        }
    }

    /// The order of the converted buffer.
    pub fn target_order(self) -> AxisOrder {
        match self {
            Self::ToFirstFast => AxisOrder::FirstFast,
            Self::ToLastFast => AxisOrder::LastFast,
        }
    }
}

/// Element strides of `dims` laid out in `order`.
pub fn strides(dims: &[usize], order: AxisOrder) -> Vec<usize> {
    let rank = dims.len();
    let mut strides = vec![1; rank];
    match order {
        AxisOrder::FirstFast => {
            for i in 1..rank {
                strides[i] = strides[i - 1] * dims[i - 1];
            }
        }
        AxisOrder::LastFast => {
            for i in (0..rank.saturating_sub(1)).rev() {
                strides[i] = strides[i + 1] * dims[i + 1];
            }
        }
    }
    strides
}

/// Reorder `src` into `dst`, both holding `product(dims)` elements of `element_size` bytes.
///
/// Ranks 0 and 1 are copied unchanged.
pub fn transpose_into(
    src: &[u8],
    dst: &mut [u8],
    dims: &[usize],
    element_size: usize,
    direction: Direction,
) {
    debug_assert_eq!(src.len(), dst.len());
    let rank = dims.len();
    let count: usize = dims.iter().product();
    if rank <= 1 || count == 0 || element_size == 0 {
        dst.copy_from_slice(src);
        return;
    }

    let dst_strides = strides(dims, direction.target_order());
    // the odometer ticks the source's fastest axis first
    let axes: Vec<usize> = match direction.source_order() {
        AxisOrder::FirstFast => (0..rank).collect(),
        AxisOrder::LastFast => (0..rank).rev().collect(),
    };

    let mut coord = vec![0usize; rank];
    for element in src.chunks_exact(element_size).take(count) {
        let offset: usize = coord
            .iter()
            .zip(&dst_strides)
            .map(|(c, s)| c * s)
            .sum::<usize>()
            * element_size;
        dst[offset..offset + element_size].copy_from_slice(element);

        for &axis in &axes {
            coord[axis] += 1;
            if coord[axis] < dims[axis] {
                break;
            }
            coord[axis] = 0;
        }
    }
}

/// Reorder a flat buffer of `product(dims)` elements of `element_size` bytes.
pub fn transpose(src: &[u8], dims: &[usize], element_size: usize, direction: Direction) -> Vec<u8> {
    let mut dst = vec![0u8; src.len()];
    transpose_into(src, &mut dst, dims, element_size, direction);
    dst
}
