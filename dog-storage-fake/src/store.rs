use bytes::Bytes;

use crate::StorageResult;

/// Entities that can be checked for existence and deleted.
///
/// Implemented by [`crate::Bucket`] and [`crate::Blob`]; test fakes layered on
/// top of the emulator implement it to stand in for either.
pub trait Existence: Send + Sync {
    /// Whether the entity is still live
    fn exists(&self) -> bool;

    /// Delete the entity and everything it owns
    fn delete(&self) -> StorageResult<()>;
}

/// Byte-addressable content
pub trait ByteContent: Send + Sync {
    /// Replace the entire content
    fn write_bytes(&self, data: Bytes) -> StorageResult<()>;

    /// Bytes in `[start, end)`, `end` defaulting to the current size
    fn read_range(&self, start: u64, end: Option<u64>) -> StorageResult<Bytes>;

    /// `None` until the first write
    fn size(&self) -> Option<u64>;
}

/// Delete every still-existing entity, stopping at the first failure.
///
/// An entity deleted elsewhere between the existence check and the delete
/// is skipped rather than treated as a failure.
pub fn delete_all<'a, E, I>(entities: I) -> StorageResult<usize>
where
    E: Existence + ?Sized + 'a,
    I: IntoIterator<Item = &'a E>,
{
    let mut deleted = 0;
    for entity in entities {
        if !entity.exists() {
            continue;
        }
        match entity.delete() {
            Ok(()) => deleted += 1,
            Err(err) if err.is_not_found() => {}
            Err(err) => return Err(err),
        }
    }
    Ok(deleted)
}
