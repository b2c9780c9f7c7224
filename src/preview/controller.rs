use std::fmt;

use super::entry::{EntryId, LocalFile, PreviewEntry, RemovalTicket};
use crate::config::MediaConfig;
use crate::error::{MediaError, MediaResult};
use crate::handles::{OwnerId, PreviewHandle, SharedRegistry};
use crate::reference::ImageReference;
use crate::resolve::{AddressResolver, Resolution};
use crate::upload::{materialize, DeleteOperation, TransportError, UploadOperation};

#[derive(Debug)]
struct Entry {
    id: EntryId,
    reference: ImageReference,
    handle: Option<PreviewHandle>,
}

/// Editable, bounded list of images for one entity (product images, a
/// carousel slide, the branding logo).
///
/// The controller owns every preview handle it acquires; all of them are
/// released when the controller is dropped.
pub struct PreviewListController<U, D> {
    max_len: usize,
    uploader: U,
    deleter: D,
    resolver: AddressResolver,
    registry: SharedRegistry,
    owner: OwnerId,
    entries: Vec<Entry>,
    next_entry: u64,
}

impl<U, D> PreviewListController<U, D>
where
    U: UploadOperation,
    D: DeleteOperation,
{
    pub fn new(
        max_len: usize,
        uploader: U,
        deleter: D,
        resolver: AddressResolver,
        registry: SharedRegistry,
    ) -> Self {
        let owner = registry.register_owner();
        Self {
            max_len,
            uploader,
            deleter,
            resolver,
            registry,
            owner,
            entries: Vec::new(),
            next_entry: 1,
        }
    }

    pub fn from_config(
        config: &MediaConfig,
        uploader: U,
        deleter: D,
        registry: SharedRegistry,
    ) -> Self {
        Self::new(
            config.max_images,
            uploader,
            deleter,
            AddressResolver::new(config.clone()),
            registry,
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_len(&self) -> usize {
        self.max_len
    }

    pub fn owner(&self) -> OwnerId {
        self.owner
    }

    pub fn references(&self) -> Vec<ImageReference> {
        self.entries
            .iter()
            .map(|entry| entry.reference.clone())
            .collect()
    }

    pub fn entry_ids(&self) -> Vec<EntryId> {
        self.entries.iter().map(|entry| entry.id).collect()
    }

    /// Stages local files. A batch that would overflow the bound is
    /// rejected as a whole.
    pub fn add(&mut self, files: Vec<LocalFile>) -> MediaResult<Vec<EntryId>> {
        self.ensure_room(files.len())?;
        let ids = files
            .into_iter()
            .map(|file| self.push(ImageReference::pending(file.blob, file.name)))
            .collect::<Vec<_>>();
        tracing::debug!(owner = %self.owner, added = ids.len(), len = self.len(), "staged local images");
        Ok(ids)
    }

    /// Appends a typed address.
    pub fn add_address(&mut self, address: impl Into<String>) -> MediaResult<EntryId> {
        self.ensure_room(1)?;
        let id = self.push(ImageReference::remote(address));
        tracing::debug!(owner = %self.owner, %id, len = self.len(), "added image address");
        Ok(id)
    }

    /// Replaces the whole list, e.g. with freshly persisted addresses.
    pub fn reset(&mut self, references: Vec<ImageReference>) -> MediaResult<()> {
        if references.len() > self.max_len {
            return Err(MediaError::CountLimitExceeded {
                current: 0,
                requested: references.len(),
                max: self.max_len,
            });
        }
        self.registry.release_all(self.owner);
        self.entries.clear();
        for reference in references {
            self.push(reference);
        }
        Ok(())
    }

    /// Swaps the image at `index`, returning the old reference.
    pub fn replace(&mut self, index: usize, reference: ImageReference) -> MediaResult<ImageReference> {
        let len = self.len();
        let entry = self
            .entries
            .get_mut(index)
            .ok_or(MediaError::IndexOutOfRange { index, len })?;
        let previous = std::mem::replace(&mut entry.reference, reference);
        if let Some(handle) = entry.handle.take() {
            self.registry.release(&handle);
        }
        tracing::debug!(owner = %self.owner, index, "replaced image");
        Ok(previous)
    }

    pub fn move_entry(&mut self, from: usize, to: usize) -> MediaResult<()> {
        let len = self.len();
        if from >= len {
            return Err(MediaError::IndexOutOfRange { index: from, len });
        }
        if to >= len {
            return Err(MediaError::IndexOutOfRange { index: to, len });
        }
        let entry = self.entries.remove(from);
        self.entries.insert(to, entry);
        Ok(())
    }

    /// Removes the image at `index`.
    ///
    /// Stored images are deleted on the server first and stay in the list
    /// if that fails. Pending images are dropped immediately.
    pub fn remove(&mut self, index: usize) -> MediaResult<ImageReference> {
        let ticket = self.begin_remove(index)?;
        let outcome = match ticket.address() {
            Some(address) => self.deleter.delete(address),
            None => Ok(()),
        };
        self.finish_remove(ticket, outcome)
    }

    pub fn begin_remove(&self, index: usize) -> MediaResult<RemovalTicket> {
        let entry = self.entries.get(index).ok_or(MediaError::IndexOutOfRange {
            index,
            len: self.len(),
        })?;
        Ok(RemovalTicket {
            entry: entry.id,
            address: entry.reference.address().map(str::to_string),
        })
    }

    /// Completes a removal once the server answered. The entry is located
    /// by id, so other removals finishing first cannot shift the target.
    pub fn finish_remove(
        &mut self,
        ticket: RemovalTicket,
        outcome: Result<(), TransportError>,
    ) -> MediaResult<ImageReference> {
        if let Err(source) = outcome {
            let address = ticket.address.unwrap_or_default();
            tracing::warn!(owner = %self.owner, entry = %ticket.entry, %address, %source, "image delete failed; keeping entry");
            return Err(MediaError::DeleteFailed { address, source });
        }
        let position = self
            .entries
            .iter()
            .position(|entry| entry.id == ticket.entry)
            .ok_or(MediaError::EntryMissing {
                entry: ticket.entry,
            })?;
        let removed = self.entries.remove(position);
        if let Some(handle) = &removed.handle {
            self.registry.release(handle);
        }
        tracing::debug!(owner = %self.owner, entry = %removed.id, position, len = self.len(), "removed image");
        Ok(removed.reference)
    }

    /// Rebuilds every preview tile from the current list.
    ///
    /// Pending images get one handle on first render, reused afterwards.
    /// A handle that cannot be created degrades to the placeholder.
    pub fn render(&mut self) -> Vec<PreviewEntry> {
        let registry = &self.registry;
        let owner = self.owner;
        let resolver = &self.resolver;
        self.entries
            .iter_mut()
            .enumerate()
            .map(|(position, entry)| {
                let display_address = match resolver.resolve(&entry.reference) {
                    Resolution::Address(address) => address,
                    Resolution::NeedsHandle => {
                        if let Some(handle) = &entry.handle {
                            handle.uri().to_string()
                        } else if let ImageReference::Pending { blob, .. } = &entry.reference {
                            match registry.acquire(owner, blob) {
                                Ok(handle) => {
                                    let uri = handle.uri().to_string();
                                    entry.handle = Some(handle);
                                    uri
                                }
                                Err(err) => {
                                    tracing::warn!(%owner, entry = %entry.id, ?err, "preview handle unavailable");
                                    resolver.placeholder().to_string()
                                }
                            }
                        } else {
                            resolver.placeholder().to_string()
                        }
                    }
                };
                PreviewEntry {
                    id: entry.id,
                    position,
                    pending: entry.reference.is_pending(),
                    reference: entry.reference.clone(),
                    display_address,
                }
            })
            .collect()
    }

    /// Uploads pending images and returns the address list to persist.
    /// The list itself is left untouched either way.
    pub fn materialize_for_save(&self) -> MediaResult<Vec<String>> {
        let references = self.references();
        materialize(&references, &self.uploader)
    }

    fn ensure_room(&self, requested: usize) -> MediaResult<()> {
        if self.len() + requested > self.max_len {
            let err = self.count_limit(requested);
            tracing::warn!(owner = %self.owner, %err, "rejecting image batch");
            return Err(err);
        }
        Ok(())
    }

    fn count_limit(&self, requested: usize) -> MediaError {
        MediaError::CountLimitExceeded {
            current: self.len(),
            requested,
            max: self.max_len,
        }
    }

    fn push(&mut self, reference: ImageReference) -> EntryId {
        let id = EntryId(self.next_entry);
        self.next_entry += 1;
        self.entries.push(Entry {
            id,
            reference,
            handle: None,
        });
        id
    }
}

impl<U, D> Drop for PreviewListController<U, D> {
    fn drop(&mut self) {
        self.registry.release_all(self.owner);
    }
}

impl<U, D> fmt::Debug for PreviewListController<U, D> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewListController")
            .field("owner", &self.owner)
            .field("max_len", &self.max_len)
            .field("entries", &self.entries)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handles::{HandleBackend, HandleError, HandleRegistry, HandleResult};
    use crate::reference::Blob;
    use std::cell::{Cell, RefCell};

    #[derive(Default)]
    struct FakeUploader {
        calls: Cell<usize>,
    }

    impl UploadOperation for FakeUploader {
        fn upload(&self, _blob: &crate::reference::Blob, name: &str) -> Result<String, TransportError> {
            self.calls.set(self.calls.get() + 1);
            Ok(format!("/uploads/{name}"))
        }
    }

    #[derive(Default)]
    struct FakeDeleter {
        fail: bool,
        deleted: RefCell<Vec<String>>,
    }

    impl DeleteOperation for FakeDeleter {
        fn delete(&self, address: &str) -> Result<(), TransportError> {
            if self.fail {
                return Err(TransportError::Status {
                    status: 404,
                    body: "gone".to_string(),
                });
            }
            self.deleted.borrow_mut().push(address.to_string());
            Ok(())
        }
    }

    fn controller(
        max_len: usize,
        deleter: FakeDeleter,
    ) -> (PreviewListController<FakeUploader, FakeDeleter>, SharedRegistry) {
        let registry = HandleRegistry::default().shared();
        let controller = PreviewListController::new(
            max_len,
            FakeUploader::default(),
            deleter,
            AddressResolver::default(),
            registry.clone(),
        );
        (controller, registry)
    }

    fn files(count: usize) -> Vec<LocalFile> {
        (0..count)
            .map(|i| LocalFile::new(format!("file-{i}.png"), Blob::new(vec![i as u8])))
            .collect()
    }

    #[test]
    fn overflowing_batch_is_rejected_whole() {
        let (mut controller, _) = controller(10, FakeDeleter::default());
        controller.add(files(9)).expect("nine fit");

        let err = controller.add(files(2)).expect_err("batch of two overflows");

        assert!(matches!(
            err,
            MediaError::CountLimitExceeded {
                current: 9,
                requested: 2,
                max: 10
            }
        ));
        assert_eq!(controller.len(), 9);
        controller.add(files(1)).expect("one more still fits");
        assert!(controller.add_address("x.png").is_err());
    }

    #[test]
    fn failed_remote_delete_keeps_entry() {
        let deleter = FakeDeleter {
            fail: true,
            ..FakeDeleter::default()
        };
        let (mut controller, _) = controller(10, deleter);
        controller.add_address("a.png").unwrap();

        let err = controller.remove(0).expect_err("server refuses");

        assert!(matches!(err, MediaError::DeleteFailed { ref address, .. } if address == "a.png"));
        assert_eq!(controller.len(), 1);
    }

    #[test]
    fn remote_removal_deletes_on_server_then_splices() {
        let (mut controller, _) = controller(10, FakeDeleter::default());
        controller.add_address("a.png").unwrap();
        controller.add_address("b.png").unwrap();

        let removed = controller.remove(0).expect("delete succeeds");

        assert_eq!(removed, ImageReference::remote("a.png"));
        assert_eq!(*controller.deleter.deleted.borrow(), vec!["a.png"]);
        assert_eq!(controller.references(), vec![ImageReference::remote("b.png")]);
    }

    #[test]
    fn pending_removal_skips_network_and_releases_handle() {
        let (mut controller, registry) = controller(10, FakeDeleter::default());
        controller.add(files(2)).unwrap();
        controller.render();
        assert_eq!(registry.live_count_for(controller.owner()), 2);

        controller.remove(1).expect("pending removal always succeeds");

        assert_eq!(controller.len(), 1);
        assert!(controller.deleter.deleted.borrow().is_empty());
        assert_eq!(registry.live_count_for(controller.owner()), 1);
    }

    #[test]
    fn render_resolves_and_reuses_handles() {
        let (mut controller, registry) = controller(10, FakeDeleter::default());
        controller.add_address("").unwrap();
        controller.add(files(1)).unwrap();

        let first = controller.render();
        let second = controller.render();

        assert_eq!(first, second);
        assert_eq!(first[0].display_address, AddressResolver::default().placeholder());
        assert!(first[1].pending);
        assert!(first[1].display_address.starts_with("blob:"));
        assert_eq!(registry.live_count(), 1);
    }

    #[test]
    fn overlapping_removals_complete_by_entry_id() {
        let (mut controller, _) = controller(10, FakeDeleter::default());
        for name in ["a.png", "b.png", "c.png"] {
            controller.add_address(name).unwrap();
        }

        let first = controller.begin_remove(0).unwrap();
        let second = controller.begin_remove(1).unwrap();
        let duplicate = controller.begin_remove(1).unwrap();

        controller.finish_remove(second, Ok(())).expect("b removed");
        controller.finish_remove(first, Ok(())).expect("a removed");

        assert_eq!(controller.references(), vec![ImageReference::remote("c.png")]);
        assert!(matches!(
            controller.finish_remove(duplicate, Ok(())),
            Err(MediaError::EntryMissing { .. })
        ));
    }

    #[test]
    fn dropping_controller_releases_all_handles() {
        let (mut controller, registry) = controller(10, FakeDeleter::default());
        controller.add(files(3)).unwrap();
        controller.render();
        assert_eq!(registry.live_count(), 3);

        drop(controller);

        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn dropping_controller_while_registry_is_borrowed_still_releases() {
        let (mut controller, registry) = controller(10, FakeDeleter::default());
        controller.add(files(1)).unwrap();
        controller.render();
        let owner = controller.owner();

        {
            let _reader = registry.borrow();
            drop(controller);
        }

        assert_eq!(registry.live_count_for(owner), 0);
        assert_eq!(registry.live_count(), 0);
    }

    struct FailingBackend;

    impl HandleBackend for FailingBackend {
        fn create(&mut self, _id: u64, _blob: &Blob) -> HandleResult<String> {
            Err(HandleError::Write {
                path: std::path::PathBuf::from("/unwritable/preview_1.png"),
                source: std::io::Error::other("disk full"),
            })
        }

        fn revoke(&mut self, _uri: &str) -> HandleResult<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_handle_creation_renders_placeholder() {
        let registry = HandleRegistry::new(FailingBackend).shared();
        let mut controller = PreviewListController::new(
            10,
            FakeUploader::default(),
            FakeDeleter::default(),
            AddressResolver::default(),
            registry.clone(),
        );
        controller.add_address("kept.png").unwrap();
        controller.add(files(1)).unwrap();

        let tiles = controller.render();

        assert_eq!(tiles.len(), 2);
        assert!(tiles[0].display_address.ends_with("/kept.png"));
        assert_eq!(tiles[1].display_address, AddressResolver::default().placeholder());
        assert!(tiles[1].pending);
        assert_eq!(registry.live_count(), 0);
    }

    #[test]
    fn oversized_reset_reports_a_replacement() {
        let (mut controller, _) = controller(2, FakeDeleter::default());
        controller.add_address("a.png").unwrap();

        let err = controller
            .reset(vec![
                ImageReference::remote("x"),
                ImageReference::remote("y"),
                ImageReference::remote("z"),
            ])
            .expect_err("three exceed the bound");

        assert!(matches!(
            err,
            MediaError::CountLimitExceeded {
                current: 0,
                requested: 3,
                max: 2
            }
        ));
        assert_eq!(controller.len(), 1);
    }

    #[test]
    fn replace_and_reset_release_superseded_handles() {
        let (mut controller, registry) = controller(1, FakeDeleter::default());
        controller.add(files(1)).unwrap();
        controller.render();

        let old = controller
            .replace(0, ImageReference::remote("logo.svg"))
            .expect("slot exists");
        assert!(old.is_pending());
        assert_eq!(registry.live_count(), 0);

        controller.reset(vec![ImageReference::pending(Blob::new(vec![9]), "n.png")]).unwrap();
        controller.render();
        assert_eq!(registry.live_count(), 1);
        controller.reset(Vec::new()).unwrap();
        assert_eq!(registry.live_count(), 0);
        assert!(controller
            .reset(vec![ImageReference::remote("a"), ImageReference::remote("b")])
            .is_err());
    }

    #[test]
    fn move_entry_reorders_slides() {
        let (mut controller, _) = controller(10, FakeDeleter::default());
        for name in ["a", "b", "c"] {
            controller.add_address(name).unwrap();
        }
        controller.move_entry(2, 0).unwrap();
        assert_eq!(
            controller.references(),
            vec![
                ImageReference::remote("c"),
                ImageReference::remote("a"),
                ImageReference::remote("b")
            ]
        );
        assert!(controller.move_entry(0, 3).is_err());
    }

    #[test]
    fn materialize_for_save_uploads_pending_and_keeps_list() {
        let (mut controller, _) = controller(10, FakeDeleter::default());
        controller.add_address("kept.png").unwrap();
        controller.add(files(1)).unwrap();

        let urls = controller.materialize_for_save().expect("uploads succeed");

        assert_eq!(urls, vec!["kept.png", "/uploads/file-0.png"]);
        assert_eq!(controller.uploader.calls.get(), 1);
        assert!(controller.references()[1].is_pending());
    }
}
