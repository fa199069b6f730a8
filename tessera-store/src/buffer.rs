use tessera_dtype::TEXT_HANDLE_SIZE;
use tessera_error::{TesseraResult, tessera_bail, tessera_err};

/// Owned storage for the variable-length text referenced from a [`NativeBuffer`].
///
/// A text handle is the 1-based position of its string in the heap; handle 0 is the null
/// (missing) handle.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextHeap {
    strings: Vec<String>,
}

impl TextHeap {
    /// The handle that denotes missing text.
    pub const NULL: u64 = 0;

    /// Store a string and return its handle.
    pub fn insert(&mut self, value: impl Into<String>) -> u64 {
        self.strings.push(value.into());
        self.strings.len() as u64
    }

    /// The string behind `handle`, or `None` for the null handle.
    pub fn get(&self, handle: u64) -> TesseraResult<Option<&str>> {
        if handle == Self::NULL {
            return Ok(None);
        }
        usize::try_from(handle - 1)
            .ok()
            .and_then(|idx| self.strings.get(idx))
            .map(|s| Some(s.as_str()))
            .ok_or_else(|| tessera_err!("dangling text handle {}", handle))
    }

    /// Number of strings held.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// True if no strings are held.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// Drop every string.
    pub fn clear(&mut self) {
        self.strings.clear();
    }
}

/// A contiguous buffer in a native layout, plus the text its handles point at.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NativeBuffer {
    bytes: Vec<u8>,
    heap: TextHeap,
}

impl NativeBuffer {
    /// Allocate `len` zeroed bytes, reporting allocation failure instead of aborting.
    pub fn try_zeroed(len: usize) -> TesseraResult<Self> {
        let mut bytes = Vec::new();
        bytes
            .try_reserve_exact(len)
            .map_err(|e| tessera_err!(OutOfMemory: "cannot allocate {} bytes: {}", len, e))?;
        bytes.resize(len, 0);
        Ok(Self {
            bytes,
            heap: TextHeap::default(),
        })
    }

    /// Wrap existing bytes with an empty heap.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self {
            bytes,
            heap: TextHeap::default(),
        }
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// True if the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// The raw bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }

    /// The raw bytes, mutably.
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.bytes
    }

    /// Consume the buffer, returning its bytes. Text handles in the bytes become dangling.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The text heap.
    pub fn heap(&self) -> &TextHeap {
        &self.heap
    }

    /// The text heap, mutably.
    pub fn heap_mut(&mut self) -> &mut TextHeap {
        &mut self.heap
    }

    /// Read the text handle stored at `offset`.
    #[allow(clippy::host_endian_bytes)]
    pub fn handle_at(&self, offset: usize) -> TesseraResult<u64> {
        let cell = self
            .bytes
            .get(offset..offset + TEXT_HANDLE_SIZE)
            .ok_or_else(|| tessera_err!("text handle at {} is out of bounds", offset))?;
        let mut raw = [0u8; TEXT_HANDLE_SIZE];
        raw.copy_from_slice(cell);
        Ok(u64::from_ne_bytes(raw))
    }

    /// Store a text handle at `offset`.
    #[allow(clippy::host_endian_bytes)]
    pub fn set_handle(&mut self, offset: usize, handle: u64) -> TesseraResult<()> {
        let Some(cell) = self.bytes.get_mut(offset..offset + TEXT_HANDLE_SIZE) else {
            tessera_bail!("text handle at {} is out of bounds", offset);
        };
        cell.copy_from_slice(&handle.to_ne_bytes());
        Ok(())
    }

    /// The text referenced from `offset`, `None` if the handle is null.
    pub fn text_at(&self, offset: usize) -> TesseraResult<Option<&str>> {
        self.heap.get(self.handle_at(offset)?)
    }

    /// Store `value` in the heap and its handle at `offset`; `None` stores the null handle.
    pub fn put_text(&mut self, offset: usize, value: Option<&str>) -> TesseraResult<()> {
        let handle = match value {
            Some(s) => self.heap.insert(s),
            None => TextHeap::NULL,
        };
        self.set_handle(offset, handle)
    }
}
