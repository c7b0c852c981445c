/// Upload pass: reconcile native objects with the logical resource state
///
/// Runs on the render thread once per frame. Queued commands are coalesced
/// per resource, uploads run before the frame executes, and destroys run
/// after it so a frame handed over with `end_frame` can still use a
/// resource dropped afterwards.
/// A dropped resource is only uploaded when the pending frame uses it.

use rustc_hash::FxHashSet;

use crate::error::Result;
use crate::renderer::command_queue::{Command, CommandQueue};
use crate::renderer::device::RenderDevice;
use crate::renderer::resource_table::{ResourceDesc, ResourceEntry, ResourceId, ResourceKind, ResourceTable};
use crate::{engine_debug, engine_error, engine_trace};

/// Coalesced work drained from the queue
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct UploadBatch {
    /// Unique ids, render targets after everything they may reference
    pub uploads: Vec<ResourceId>,
    /// Unique ids, in drop order
    pub destroys: Vec<ResourceId>,
}

impl UploadBatch {
    pub fn is_empty(&self) -> bool {
        self.uploads.is_empty() && self.destroys.is_empty()
    }
}

/// What one pass did
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadReport {
    /// Resources whose native object was created or updated
    pub uploaded: u32,
    /// Uploads that produced a new native object
    pub recreated: u32,
    /// Queued uploads with nothing to do
    pub skipped: u32,
    pub destroyed: u32,
}

enum Outcome {
    Skipped,
    Uploaded { recreated: bool },
}

fn upload_priority(kind: ResourceKind) -> u8 {
    match kind {
        ResourceKind::RenderTarget => 1,
        _ => 0,
    }
}

/// Coalesce drained commands into a batch
///
/// Uploads of ids no longer in the table are dropped here.
pub fn collect(commands: Vec<Command>, table: &ResourceTable) -> UploadBatch {
    let mut seen_uploads = FxHashSet::default();
    let mut seen_destroys = FxHashSet::default();
    let mut uploads = Vec::new();
    let mut destroys = Vec::new();

    for command in commands {
        match command {
            Command::Upload(id) => {
                if seen_uploads.insert(id) {
                    if let Some(entry) = table.get(id) {
                        uploads.push((upload_priority(entry.kind()), id));
                    }
                }
            }
            Command::Destroy(id) => {
                if seen_destroys.insert(id) {
                    destroys.push(id);
                }
            }
        }
    }

    // Stable: keeps submission order inside each priority class
    uploads.sort_by_key(|(priority, _)| *priority);

    UploadBatch {
        uploads: uploads.into_iter().map(|(_, id)| id).collect(),
        destroys,
    }
}

fn upload_one(entry: &ResourceEntry, device: &mut dyn RenderDevice, in_use: bool) -> Result<Outcome> {
    let id = entry.id();
    let mut slot = entry.lock();

    if (slot.pending_destroy && !in_use) || slot.dirty.is_empty() {
        return Ok(Outcome::Skipped);
    }

    let snapshot = slot.dirty;
    slot.state = slot.state.begin_upload();

    let result = match &slot.desc {
        ResourceDesc::Texture(texture) => device.upload_texture(id, texture, snapshot),
        ResourceDesc::Buffer(buffer) => device.upload_buffer(id, buffer, snapshot),
        ResourceDesc::RenderTarget(target) => device.upload_render_target(id, target, snapshot),
        ResourceDesc::BlendState(desc) => device.upload_blend_state(id, desc),
        ResourceDesc::DepthStencilState(desc) => device.upload_depth_stencil_state(id, desc),
    };

    match result {
        Ok(handle) => {
            let recreated = slot.handle != Some(handle);
            slot.handle = Some(handle);
            slot.dirty.remove(snapshot);
            slot.state = slot.state.complete();
            if let ResourceDesc::Texture(texture) = &mut slot.desc {
                texture.pending_levels = 0;
            }
            Ok(Outcome::Uploaded { recreated })
        }
        Err(error) => {
            slot.state = slot.state.fail();
            Err(error)
        }
    }
}

/// Upload every id of the batch, in order
///
/// `in_use` holds the ids referenced by the frame about to execute. On the
/// first failure the failing id and every id after it are requeued with
/// their dirty bits intact, and the error is returned.
pub fn upload_all(
    table: &ResourceTable,
    queue: &CommandQueue,
    device: &mut dyn RenderDevice,
    uploads: &[ResourceId],
    in_use: &FxHashSet<ResourceId>,
    report: &mut UploadReport,
) -> Result<()> {
    for (index, id) in uploads.iter().enumerate() {
        let Some(entry) = table.get(*id) else {
            continue;
        };

        match upload_one(&entry, device, in_use.contains(id)) {
            Ok(Outcome::Skipped) => report.skipped += 1,
            Ok(Outcome::Uploaded { recreated }) => {
                report.uploaded += 1;
                if recreated {
                    report.recreated += 1;
                }
                engine_trace!("kestrel::upload", "Uploaded {:?} {:?} (recreated: {})", entry.kind(), id, recreated);
            }
            Err(error) => {
                engine_error!("kestrel::upload", "Upload of {:?} {:?} failed: {}", entry.kind(), id, error);
                queue.extend(uploads[index..].iter().map(|id| Command::Upload(*id)));
                return Err(error);
            }
        }
    }
    Ok(())
}

/// Release native objects and drop table entries
pub fn destroy_all(
    table: &ResourceTable,
    device: &mut dyn RenderDevice,
    destroys: &[ResourceId],
    report: &mut UploadReport,
) {
    for id in destroys {
        if let Some(entry) = table.remove(*id) {
            device.destroy(*id);
            report.destroyed += 1;
            engine_trace!("kestrel::upload", "Destroyed {:?} {:?}", entry.kind(), id);
        }
    }
}

/// Log a one-line summary when the pass did anything
pub fn log_report(report: &UploadReport) {
    if report.uploaded > 0 || report.destroyed > 0 {
        engine_debug!(
            "kestrel::upload",
            "Upload pass: {} uploaded ({} recreated), {} skipped, {} destroyed",
            report.uploaded,
            report.recreated,
            report.skipped,
            report.destroyed
        );
    }
}

#[cfg(test)]
#[path = "upload_tests.rs"]
mod tests;
