mod codec;

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::Mutex;
use tessera_dtype::{Realization, ScalarKind, TextLength};
use tessera_error::{TesseraResult, tessera_bail, tessera_err};

use self::codec::{TextStore, Value, WireStrings, convert, decode, encode};
use crate::{
    Container, CreateOptions, Handle, MemberDescriptor, NativeBuffer, ObjectHandle,
    RecordDescriptor, SpaceHandle, StoreType, TextHeap, TypeHandle,
};

/// A [`Container`] that keeps every object in memory, in its wire layout.
///
/// Objects are stored as little-endian bytes plus a per-object string table for
/// variable-length text. Reads and writes convert between the stored wire type and the caller's
/// native type member by member, matching record members by name.
///
/// Failures can be injected per object path to exercise error paths, and every outstanding
/// handle is counted.
#[derive(Debug, Default)]
pub struct MemoryContainer {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    next_handle: u64,
    types: HashMap<TypeHandle, TypeEntry>,
    spaces: HashMap<SpaceHandle, Vec<usize>>,
    open: HashMap<ObjectHandle, String>,
    objects: BTreeMap<String, StoredObject>,
    faults: Faults,
}

#[derive(Debug, Clone)]
struct TypeEntry {
    realization: Realization,
    ty: StoreType,
}

#[derive(Debug)]
struct StoredObject {
    ty: StoreType,
    dims: Vec<usize>,
    options: CreateOptions,
    data: Vec<u8>,
    strings: WireStrings,
    label_name: Option<String>,
    links: BTreeMap<usize, Vec<String>>,
}

#[derive(Debug, Default)]
struct Faults {
    writes: HashSet<String>,
    reads: HashSet<String>,
    deletes: HashSet<String>,
}

/// Join a group path and a member name into an absolute object path.
pub fn object_path(parent: &str, name: &str) -> String {
    let parent = parent.trim_end_matches('/');
    let name = name.trim_start_matches('/');
    if parent.is_empty() {
        format!("/{name}")
    } else if parent.starts_with('/') {
        format!("{parent}/{name}")
    } else {
        format!("/{parent}/{name}")
    }
}

fn element_count(dims: &[usize]) -> usize {
    dims.iter().product()
}

fn type_size(ty: &StoreType, realization: Realization) -> usize {
    match ty {
        StoreType::Scalar(kind) => kind.byte_size(realization),
        StoreType::Record(record) => record.size,
    }
}

/// The (source kind, source offset, destination kind, destination offset) cells a conversion
/// between two types walks for every element.
type MemberPlan = Vec<(ScalarKind, usize, ScalarKind, usize)>;

fn member_plan(src: &StoreType, dst: &StoreType) -> TesseraResult<MemberPlan> {
    match (src, dst) {
        (StoreType::Scalar(s), StoreType::Scalar(d)) => Ok(vec![(s.clone(), 0, d.clone(), 0)]),
        (StoreType::Record(s), StoreType::Record(d)) => Ok(d
            .members
            .iter()
            .filter_map(|dm| {
                s.member(&dm.name)
                    .map(|sm| (sm.kind.clone(), sm.offset, dm.kind.clone(), dm.offset))
            })
            .collect()),
        _ => tessera_bail!(Storage: "cannot convert between {} and {}", src, dst),
    }
}

fn check_compatible(src: &ScalarKind, dst: &ScalarKind) -> TesseraResult<()> {
    let ok = match (src, dst) {
        (
            ScalarKind::Integer { .. } | ScalarKind::Float(_),
            ScalarKind::Integer { .. } | ScalarKind::Float(_) | ScalarKind::Complex(_),
        ) => true,
        (ScalarKind::Complex(_), ScalarKind::Complex(_)) => true,
        (ScalarKind::Text { .. }, ScalarKind::Text { .. }) => true,
        (ScalarKind::Binary(a), ScalarKind::Binary(b)) => a == b,
        (ScalarKind::Categorical(_), ScalarKind::Categorical(_)) => true,
        (ScalarKind::Categorical(_), ScalarKind::Integer { .. } | ScalarKind::Float(_)) => true,
        (ScalarKind::Integer { .. }, ScalarKind::Categorical(_)) => true,
        _ => false,
    };
    if !ok {
        tessera_bail!(Storage: "no conversion from {} to {}", src, dst);
    }
    Ok(())
}

fn convert_elements<S: TextStore, D: TextStore>(
    plan: &MemberPlan,
    count: usize,
    (src_bytes, src_size, src_realization, src_text): (&[u8], usize, Realization, &S),
    (dst_bytes, dst_size, dst_realization, dst_text): (&mut [u8], usize, Realization, &mut D),
) -> TesseraResult<()> {
    for (src_kind, _, dst_kind, _) in plan {
        check_compatible(src_kind, dst_kind)?;
    }
    for row in 0..count {
        for (src_kind, src_offset, dst_kind, dst_offset) in plan {
            let start = row * src_size + src_offset;
            let src_cell = &src_bytes[start..start + src_kind.byte_size(src_realization)];
            let value = decode(src_kind, src_realization, src_cell, src_text)?;
            let value: Value = convert(value, src_kind, dst_kind)?;
            let start = row * dst_size + dst_offset;
            let dst_cell = &mut dst_bytes[start..start + dst_kind.byte_size(dst_realization)];
            encode(dst_kind, dst_realization, &value, dst_cell, dst_text)?;
        }
    }
    Ok(())
}

impl Inner {
    fn next(&mut self) -> u64 {
        self.next_handle += 1;
        self.next_handle
    }

    fn type_entry(&self, ty: TypeHandle) -> TesseraResult<&TypeEntry> {
        self.types
            .get(&ty)
            .ok_or_else(|| tessera_err!(Storage: "unknown type handle {}", ty.0))
    }

    fn space(&self, space: SpaceHandle) -> TesseraResult<&Vec<usize>> {
        self.spaces
            .get(&space)
            .ok_or_else(|| tessera_err!(Storage: "unknown space handle {}", space.0))
    }

    fn object_path(&self, object: ObjectHandle) -> TesseraResult<&String> {
        self.open
            .get(&object)
            .ok_or_else(|| tessera_err!(Storage: "unknown object handle {}", object.0))
    }

    fn object(&self, object: ObjectHandle) -> TesseraResult<(&String, &StoredObject)> {
        let path = self.object_path(object)?;
        let stored = self
            .objects
            .get(path)
            .ok_or_else(|| tessera_err!(NotFound: "object '{}' no longer exists", path))?;
        Ok((path, stored))
    }

    fn object_mut(&mut self, object: ObjectHandle) -> TesseraResult<&mut StoredObject> {
        let path = self.object_path(object)?.clone();
        self.objects
            .get_mut(&path)
            .ok_or_else(|| tessera_err!(NotFound: "object '{}' no longer exists", path))
    }

    fn add_type(&mut self, entry: TypeEntry) -> TypeHandle {
        let handle = TypeHandle(self.next());
        self.types.insert(handle, entry);
        handle
    }

    fn add_space(&mut self, dims: Vec<usize>) -> SpaceHandle {
        let handle = SpaceHandle(self.next());
        self.spaces.insert(handle, dims);
        handle
    }

    fn open_path(&mut self, path: String) -> ObjectHandle {
        let handle = ObjectHandle(self.next());
        self.open.insert(handle, path);
        handle
    }
}

impl MemoryContainer {
    /// Create an empty container.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles handed out and not yet released.
    pub fn open_handles(&self) -> usize {
        let inner = self.inner.lock();
        inner.types.len() + inner.spaces.len() + inner.open.len()
    }

    /// Make every subsequent write to the object at `path` fail.
    pub fn fail_writes_to(&self, path: &str) {
        self.inner.lock().faults.writes.insert(path.to_string());
    }

    /// Make every subsequent read from the object at `path` fail.
    pub fn fail_reads_from(&self, path: &str) {
        self.inner.lock().faults.reads.insert(path.to_string());
    }

    /// Make every subsequent delete of the object at `path` fail.
    pub fn fail_deletes_of(&self, path: &str) {
        self.inner.lock().faults.deletes.insert(path.to_string());
    }

    /// Remove every injected failure.
    pub fn clear_faults(&self) {
        self.inner.lock().faults = Faults::default();
    }

    /// Paths of every stored object, in order.
    pub fn paths(&self) -> Vec<String> {
        self.inner.lock().objects.keys().cloned().collect()
    }

    /// The raw little-endian bytes stored for the object at `path`.
    pub fn wire_bytes(&self, path: &str) -> TesseraResult<Vec<u8>> {
        self.inner
            .lock()
            .objects
            .get(path)
            .map(|o| o.data.clone())
            .ok_or_else(|| tessera_err!(NotFound: "no object at '{}'", path))
    }

    /// The creation options of the object at `path`.
    pub fn create_options(&self, path: &str) -> TesseraResult<CreateOptions> {
        self.inner
            .lock()
            .objects
            .get(path)
            .map(|o| o.options.clone())
            .ok_or_else(|| tessera_err!(NotFound: "no object at '{}'", path))
    }

    /// The display name the object at `path` was marked with as a label array.
    pub fn label_name(&self, path: &str) -> TesseraResult<Option<String>> {
        self.inner
            .lock()
            .objects
            .get(path)
            .map(|o| o.label_name.clone())
            .ok_or_else(|| tessera_err!(NotFound: "no object at '{}'", path))
    }
}

impl Container for MemoryContainer {
    fn create_scalar_type(
        &self,
        kind: &ScalarKind,
        realization: Realization,
    ) -> TesseraResult<TypeHandle> {
        Ok(self.inner.lock().add_type(TypeEntry {
            realization,
            ty: StoreType::Scalar(kind.clone()),
        }))
    }

    fn create_record_type(
        &self,
        size: usize,
        realization: Realization,
    ) -> TesseraResult<TypeHandle> {
        Ok(self.inner.lock().add_type(TypeEntry {
            realization,
            ty: StoreType::Record(RecordDescriptor {
                size,
                members: Vec::new(),
            }),
        }))
    }

    fn insert_member(
        &self,
        record: TypeHandle,
        name: &str,
        offset: usize,
        member: TypeHandle,
    ) -> TesseraResult<()> {
        let mut inner = self.inner.lock();
        let member = inner.type_entry(member)?.clone();
        let StoreType::Scalar(kind) = member.ty else {
            tessera_bail!(Storage: "record member '{}' must be a scalar type", name);
        };
        let entry = inner
            .types
            .get_mut(&record)
            .ok_or_else(|| tessera_err!(Storage: "unknown type handle {}", record.0))?;
        if entry.realization != member.realization {
            tessera_bail!(Storage: "member '{}' realization does not match its record", name);
        }
        let realization = entry.realization;
        let StoreType::Record(descriptor) = &mut entry.ty else {
            tessera_bail!(Storage: "type handle {} is not a record type", record.0);
        };
        if descriptor.member(name).is_some() {
            tessera_bail!(Storage: "record already has a member named '{}'", name);
        }
        if offset + kind.byte_size(realization) > descriptor.size {
            tessera_bail!(
                Storage: "member '{}' at offset {} overruns a {}-byte record",
                name,
                offset,
                descriptor.size
            );
        }
        descriptor.members.push(MemberDescriptor {
            name: Arc::from(name),
            offset,
            kind,
        });
        Ok(())
    }

    fn create_array_space(&self, dims: &[usize]) -> TesseraResult<SpaceHandle> {
        Ok(self.inner.lock().add_space(dims.to_vec()))
    }

    fn create_object(
        &self,
        parent: &str,
        name: &str,
        ty: TypeHandle,
        space: SpaceHandle,
        options: &CreateOptions,
    ) -> TesseraResult<ObjectHandle> {
        if name.is_empty() {
            tessera_bail!("object name must not be empty");
        }
        let path = object_path(parent, name);
        let mut inner = self.inner.lock();
        let entry = inner.type_entry(ty)?.clone();
        if entry.realization != Realization::Wire {
            tessera_bail!(Storage: "object '{}' must be created with a wire type", path);
        }
        let dims = inner.space(space)?.clone();
        if let Some(chunks) = &options.chunk_dims {
            if chunks.len() != dims.len() || chunks.contains(&0) {
                tessera_bail!(
                    Storage: "invalid chunk shape [{}] for '{}'",
                    chunks.iter().join(", "),
                    path
                );
            }
        }
        if inner.objects.contains_key(&path) {
            tessera_bail!(Storage: "object '{}' already exists", path);
        }
        let len = element_count(&dims)
            .checked_mul(type_size(&entry.ty, Realization::Wire))
            .ok_or_else(|| tessera_err!(OutOfMemory: "object '{}' is too large", path))?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|e| tessera_err!(OutOfMemory: "object '{}': {}", path, e))?;
        data.resize(len, 0);
        log::debug!(
            "creating {} {} with dims [{}]",
            path,
            entry.ty,
            dims.iter().join(", ")
        );
        inner.objects.insert(
            path.clone(),
            StoredObject {
                ty: entry.ty,
                dims,
                options: options.clone(),
                data,
                strings: WireStrings::default(),
                label_name: None,
                links: BTreeMap::new(),
            },
        );
        Ok(inner.open_path(path))
    }

    fn open_object(&self, parent: &str, name: &str) -> TesseraResult<ObjectHandle> {
        let path = object_path(parent, name);
        let mut inner = self.inner.lock();
        if !inner.objects.contains_key(&path) {
            tessera_bail!(NotFound: "no object at '{}'", path);
        }
        Ok(inner.open_path(path))
    }

    fn object_type(&self, object: ObjectHandle) -> TesseraResult<TypeHandle> {
        let mut inner = self.inner.lock();
        let ty = inner.object(object)?.1.ty.clone();
        Ok(inner.add_type(TypeEntry {
            realization: Realization::Wire,
            ty,
        }))
    }

    fn object_space(&self, object: ObjectHandle) -> TesseraResult<SpaceHandle> {
        let mut inner = self.inner.lock();
        let dims = inner.object(object)?.1.dims.clone();
        Ok(inner.add_space(dims))
    }

    fn describe_type(&self, ty: TypeHandle) -> TesseraResult<StoreType> {
        Ok(self.inner.lock().type_entry(ty)?.ty.clone())
    }

    fn space_dims(&self, space: SpaceHandle) -> TesseraResult<Vec<usize>> {
        Ok(self.inner.lock().space(space)?.clone())
    }

    fn read(
        &self,
        object: ObjectHandle,
        mem_type: TypeHandle,
        buffer: &mut NativeBuffer,
    ) -> TesseraResult<()> {
        let inner = self.inner.lock();
        let (path, stored) = inner.object(object)?;
        if inner.faults.reads.contains(path) {
            tessera_bail!(Storage: "injected read failure on '{}'", path);
        }
        let mem = inner.type_entry(mem_type)?;
        if mem.realization != Realization::Native {
            tessera_bail!(Storage: "reads must target a native type");
        }
        let count = element_count(&stored.dims);
        let mem_size = type_size(&mem.ty, Realization::Native);
        if buffer.len() != count * mem_size {
            tessera_bail!(
                Storage: "buffer of {} bytes cannot hold {} elements of {} bytes",
                buffer.len(),
                count,
                mem_size
            );
        }
        let plan = member_plan(&stored.ty, &mem.ty)?;
        let mut heap = TextHeap::default();
        convert_elements(
            &plan,
            count,
            (
                &stored.data,
                type_size(&stored.ty, Realization::Wire),
                Realization::Wire,
                &stored.strings,
            ),
            (buffer.as_mut_slice(), mem_size, Realization::Native, &mut heap),
        )?;
        *buffer.heap_mut() = heap;
        Ok(())
    }

    fn write(
        &self,
        object: ObjectHandle,
        mem_type: TypeHandle,
        buffer: &NativeBuffer,
    ) -> TesseraResult<()> {
        let mut inner = self.inner.lock();
        let (path, stored) = inner.object(object)?;
        if inner.faults.writes.contains(path) {
            tessera_bail!(Storage: "injected write failure on '{}'", path);
        }
        let mem = inner.type_entry(mem_type)?;
        if mem.realization != Realization::Native {
            tessera_bail!(Storage: "writes must come from a native type");
        }
        let count = element_count(&stored.dims);
        let mem_size = type_size(&mem.ty, Realization::Native);
        if buffer.len() != count * mem_size {
            tessera_bail!(
                Storage: "buffer of {} bytes does not hold {} elements of {} bytes",
                buffer.len(),
                count,
                mem_size
            );
        }
        let plan = member_plan(&mem.ty, &stored.ty)?;
        let wire_size = type_size(&stored.ty, Realization::Wire);
        let mut data = vec![0u8; stored.data.len()];
        let mut strings = WireStrings::default();
        convert_elements(
            &plan,
            count,
            (buffer.as_slice(), mem_size, Realization::Native, buffer.heap()),
            (&mut data, wire_size, Realization::Wire, &mut strings),
        )?;
        let stored = inner.object_mut(object)?;
        stored.data = data;
        stored.strings = strings;
        Ok(())
    }

    fn mark_label(&self, object: ObjectHandle, name: &str) -> TesseraResult<()> {
        let mut inner = self.inner.lock();
        inner.object_mut(object)?.label_name = Some(name.to_string());
        Ok(())
    }

    fn link_label(
        &self,
        parent: ObjectHandle,
        axis: usize,
        label: ObjectHandle,
    ) -> TesseraResult<()> {
        let mut inner = self.inner.lock();
        let (label_path, label_obj) = inner.object(label)?;
        if label_obj.label_name.is_none() {
            tessera_bail!(Storage: "'{}' is not marked as a label array", label_path);
        }
        let label_path = label_path.clone();
        let (parent_path, parent_obj) = inner.object(parent)?;
        if parent_path == &label_path {
            tessera_bail!(Storage: "'{}' cannot label itself", label_path);
        }
        // scalars have no axes, but a table's single row axis is axis 0
        if axis >= parent_obj.dims.len().max(1) {
            tessera_bail!(
                Storage: "'{}' has no axis {}",
                parent_path,
                axis
            );
        }
        let links = inner.object_mut(parent)?.links.entry(axis).or_default();
        if !links.contains(&label_path) {
            links.push(label_path);
        }
        Ok(())
    }

    fn find_first_label(
        &self,
        parent: ObjectHandle,
        axis: usize,
    ) -> TesseraResult<Option<ObjectHandle>> {
        let mut inner = self.inner.lock();
        let (_, parent_obj) = inner.object(parent)?;
        let first = parent_obj
            .links
            .get(&axis)
            .and_then(|links| links.iter().find(|p| inner.objects.contains_key(*p)))
            .cloned();
        Ok(first.map(|path| inner.open_path(path)))
    }

    fn reclaim_variable_length(
        &self,
        ty: TypeHandle,
        space: SpaceHandle,
        buffer: &mut NativeBuffer,
    ) -> TesseraResult<()> {
        let inner = self.inner.lock();
        let entry = inner.type_entry(ty)?;
        let count = element_count(inner.space(space)?);
        let size = type_size(&entry.ty, Realization::Native);
        let text_offsets: Vec<usize> = match &entry.ty {
            StoreType::Scalar(kind) => vec![(kind, 0)],
            StoreType::Record(record) => record.members.iter().map(|m| (&m.kind, m.offset)).collect(),
        }
        .into_iter()
        .filter(|(kind, _)| {
            matches!(
                kind,
                ScalarKind::Text {
                    length: TextLength::Variable,
                    ..
                }
            )
        })
        .map(|(_, offset)| offset)
        .collect();
        for row in 0..count {
            for offset in &text_offsets {
                buffer.set_handle(row * size + offset, TextHeap::NULL)?;
            }
        }
        buffer.heap_mut().clear();
        Ok(())
    }

    fn exists(&self, parent: &str, name: &str) -> TesseraResult<bool> {
        let path = object_path(parent, name);
        let prefix = format!("{path}/");
        let inner = self.inner.lock();
        Ok(inner.objects.contains_key(&path) || inner.objects.keys().any(|p| p.starts_with(&prefix)))
    }

    fn delete(&self, parent: &str, name: &str) -> TesseraResult<()> {
        let path = object_path(parent, name);
        let prefix = format!("{path}/");
        let mut inner = self.inner.lock();
        if inner.faults.deletes.contains(&path) {
            tessera_bail!(Storage: "injected delete failure on '{}'", path);
        }
        let doomed: Vec<String> = inner
            .objects
            .keys()
            .filter(|p| **p == path || p.starts_with(&prefix))
            .cloned()
            .collect();
        if doomed.is_empty() {
            tessera_bail!(NotFound: "no object at '{}'", path);
        }
        log::debug!("deleting {}", path);
        for p in &doomed {
            inner.objects.remove(p);
        }
        for stored in inner.objects.values_mut() {
            for links in stored.links.values_mut() {
                links.retain(|l| !doomed.contains(l));
            }
        }
        Ok(())
    }

    fn release(&self, handle: Handle) -> TesseraResult<()> {
        let mut inner = self.inner.lock();
        let released = match handle {
            Handle::Type(h) => inner.types.remove(&h).is_some(),
            Handle::Space(h) => inner.spaces.remove(&h).is_some(),
            Handle::Object(h) => inner.open.remove(&h).is_some(),
        };
        if !released {
            tessera_bail!(Storage: "{} was already released", handle);
        }
        Ok(())
    }
}
