//! Editing controller
//!
//! Owns the edit session, its baseline and presentation state for the one
//! canvas being edited, plus per-process sync status, and sequences load and
//! save against a `CanvasBackend`.
//!
//! Every async operation is split in two: `begin_*` runs synchronously and
//! hands out a ticket, `complete_*` applies the result only if the ticket is
//! still current. A load for another process bumps the generation, so a slow
//! response for the previous one is dropped on arrival.

use crate::editor::backend::CanvasBackend;
use crate::error::{EditorError, LoadError, SaveError, SessionError};
use crate::graph::{CanvasSnapshot, SavedCanvas};
use crate::layout::{LayoutEngine, LayoutResult};
use crate::reconcile::ReconciliationEngine;
use crate::session::{EditSession, Presentation};
use crate::sync::{SyncResult, SyncStatus, SyncStatusTracker};

/// An in-flight load
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadTicket {
    pub process_id: String,
    generation: u64,
    /// Structural edit count when the load started
    edits_at_begin: u64,
}

/// An in-flight save
#[derive(Debug, Clone, PartialEq)]
pub struct SaveTicket {
    pub process_id: String,
    generation: u64,
    /// Structural edit count when the payload was built
    edits_at_submit: u64,
    /// Sync status before the save entered `syncing`
    previous_status: SyncStatus,
}

/// What a completed save did to the editor
#[derive(Debug, Clone, PartialEq)]
pub struct SaveReport {
    pub process_id: String,
    pub revision: Option<i64>,
    /// Replication outcome when the server ran it inline
    pub sync_result: Option<SyncResult>,
    /// The editor had moved on to another canvas; only the saved process's
    /// sync status was updated
    pub superseded: bool,
}

pub struct CanvasEditor<B> {
    backend: B,
    layout: LayoutEngine,
    reconciler: ReconciliationEngine,
    session: EditSession,
    presentation: Presentation,
    tracker: SyncStatusTracker,
    baseline: Option<CanvasSnapshot>,
    generation: u64,
}

impl<B: CanvasBackend> CanvasEditor<B> {
    pub fn new(backend: B) -> Self {
        Self::with_layout(backend, LayoutEngine::default())
    }

    pub fn with_layout(backend: B, layout: LayoutEngine) -> Self {
        Self {
            backend,
            layout,
            reconciler: ReconciliationEngine::new(),
            session: EditSession::new(),
            presentation: Presentation::new(),
            tracker: SyncStatusTracker::new(),
            baseline: None,
            generation: 0,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    /// Mutable access for canvas gestures (they go through `EditSession::apply`)
    pub fn session_mut(&mut self) -> &mut EditSession {
        &mut self.session
    }

    pub fn presentation(&self) -> &Presentation {
        &self.presentation
    }

    pub fn presentation_mut(&mut self) -> &mut Presentation {
        &mut self.presentation
    }

    /// Sync status of the open canvas
    pub fn sync_status(&self) -> &SyncStatus {
        self.tracker.status(self.process_id().unwrap_or_default())
    }

    pub fn sync_status_of(&self, process_id: &str) -> &SyncStatus {
        self.tracker.status(process_id)
    }

    pub fn baseline(&self) -> Option<&CanvasSnapshot> {
        self.baseline.as_ref()
    }

    pub fn process_id(&self) -> Option<&str> {
        self.baseline.as_ref().map(CanvasSnapshot::process_id)
    }

    pub fn is_dirty(&self) -> bool {
        self.session.is_dirty()
    }

    /// Lay out a snapshot without touching the session (AI-generated previews)
    pub fn preview(&self, snapshot: &CanvasSnapshot) -> LayoutResult {
        self.layout.layout(snapshot)
    }

    fn guard_unsaved(&self, confirm_discard: bool) -> Result<(), SessionError> {
        if self.session.is_dirty() && !confirm_discard {
            let process_id = self.process_id().unwrap_or_default().to_string();
            tracing::warn!(
                "⚠️ Refusing to replace canvas '{}': unsaved changes not confirmed",
                process_id
            );
            return Err(SessionError::UnsavedChanges { process_id });
        }
        Ok(())
    }

    /// Start loading `process_id`, superseding any load in flight
    ///
    /// The open canvas stays editable while the fetch is outstanding; edits
    /// made in that window count as unsaved and make the load refuse to
    /// replace them.
    pub fn begin_load(
        &mut self,
        process_id: &str,
        confirm_discard: bool,
    ) -> Result<LoadTicket, SessionError> {
        self.guard_unsaved(confirm_discard)?;
        self.generation += 1;
        tracing::info!(
            "📂 Loading canvas '{}' (generation {})",
            process_id,
            self.generation
        );
        Ok(LoadTicket {
            process_id: process_id.to_string(),
            generation: self.generation,
            edits_at_begin: self.session.structural_edits(),
        })
    }

    /// Apply a fetch result; returns `Ok(false)` when the ticket was stale
    ///
    /// On failure the previous canvas stays as it was.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<CanvasSnapshot, LoadError>,
    ) -> Result<bool, LoadError> {
        if ticket.generation != self.generation {
            tracing::debug!(
                "⏭️ Ignoring stale load of '{}' (generation {}, current {})",
                ticket.process_id,
                ticket.generation,
                self.generation
            );
            return Ok(false);
        }

        match result {
            Ok(_) if self.session.structural_edits() != ticket.edits_at_begin => {
                let open = self.process_id().unwrap_or_default().to_string();
                tracing::warn!(
                    "⚠️ Not replacing canvas '{}' with '{}': it was edited during the load",
                    open,
                    ticket.process_id
                );
                Err(LoadError::EditedDuringLoad(open, ticket.process_id))
            }
            Ok(snapshot) => {
                self.install(snapshot);
                Ok(true)
            }
            Err(e) => {
                tracing::error!("❌ Failed to load canvas '{}': {}", ticket.process_id, e);
                Err(e)
            }
        }
    }

    /// Fetch and open a canvas, then poll its sync status
    pub async fn load(&mut self, process_id: &str, confirm_discard: bool) -> Result<bool, EditorError> {
        let ticket = self.begin_load(process_id, confirm_discard)?;
        let result = self.backend.fetch_canvas(process_id).await;
        let opened = self.complete_load(ticket, result)?;

        if opened {
            if let Err(e) = self.refresh_status().await {
                tracing::warn!("⚠️ Could not poll sync status for '{}': {}", process_id, e);
            }
        }
        Ok(opened)
    }

    /// Open a snapshot that did not come from the backend (e.g. a generated skeleton)
    pub fn open_snapshot(
        &mut self,
        snapshot: CanvasSnapshot,
        confirm_discard: bool,
    ) -> Result<(), SessionError> {
        self.guard_unsaved(confirm_discard)?;
        self.generation += 1;
        self.install(snapshot);
        Ok(())
    }

    fn install(&mut self, snapshot: CanvasSnapshot) {
        let layout = self.layout.layout(&snapshot);
        self.session.load_snapshot(&snapshot, &layout);
        self.presentation.clear_selection();
        self.presentation.set_focus(None);
        tracing::info!(
            "✅ Opened canvas '{}' ({} nodes, {} edges)",
            snapshot.process_id(),
            snapshot.node_count(),
            snapshot.edge_count()
        );
        self.baseline = Some(snapshot);
    }

    /// Throw away unsaved edits and reload from the baseline
    pub fn discard(&mut self, confirm_discard: bool) -> Result<(), SessionError> {
        self.guard_unsaved(confirm_discard)?;
        let baseline = self.baseline.as_ref().ok_or(SessionError::NoActiveCanvas)?;
        let layout = self.layout.layout(baseline);
        self.session.load_snapshot(baseline, &layout);
        self.presentation.retain_existing(&self.session);
        tracing::info!("↩️ Discarded edits on canvas '{}'", baseline.process_id());
        Ok(())
    }

    /// Reconcile the session and enter `syncing`
    pub fn begin_save(&mut self) -> Result<(SaveTicket, CanvasSnapshot), SaveError> {
        let baseline = self.baseline.as_ref().ok_or(SaveError::NoActiveCanvas)?;
        let payload = self.reconciler.reconcile(&self.session, baseline).map_err(|e| {
            tracing::warn!("🚫 Not saving canvas '{}': {}", baseline.process_id(), e);
            e
        })?;

        let previous_status = self.tracker.mark_syncing(payload.process_id());
        let ticket = SaveTicket {
            process_id: payload.process_id().to_string(),
            generation: self.generation,
            edits_at_submit: self.session.structural_edits(),
            previous_status,
        };
        tracing::info!(
            "💾 Saving canvas '{}' ({} nodes, {} edges)",
            ticket.process_id,
            payload.node_count(),
            payload.edge_count()
        );
        Ok((ticket, payload))
    }

    /// Apply a save result
    ///
    /// A primary failure restores the previous sync status and keeps the
    /// session dirty. A success replaces the baseline and clears dirty unless
    /// the session was structurally edited while the save was in flight; in
    /// that case the edits stay unsaved but new edges still take the ids the
    /// server assigned. A failed replication only moves the saved process to
    /// `failed`.
    pub fn complete_save(
        &mut self,
        ticket: SaveTicket,
        result: Result<SavedCanvas, SaveError>,
    ) -> Result<SaveReport, SaveError> {
        let current = ticket.generation == self.generation;

        let saved = match result {
            Ok(saved) => saved,
            Err(e) => {
                self.tracker.restore(&ticket.process_id, ticket.previous_status);
                tracing::error!("❌ Failed to save canvas '{}': {}", ticket.process_id, e);
                return Err(e);
            }
        };

        self.record_sync_result(&ticket.process_id, saved.sync_result.as_ref());

        if !current {
            tracing::info!(
                "💾 Save of '{}' finished after the editor moved on; canvas left untouched",
                ticket.process_id
            );
            return Ok(SaveReport {
                process_id: ticket.process_id,
                revision: saved.snapshot.revision,
                sync_result: saved.sync_result,
                superseded: true,
            });
        }

        if self.session.structural_edits() != ticket.edits_at_submit {
            let adopted = self.session.adopt_persisted_ids(&saved.snapshot);
            self.baseline = Some(saved.snapshot.clone());
            tracing::info!(
                "💾 Saved canvas '{}' ({} new edge id(s)); edits made during the save remain unsaved",
                ticket.process_id,
                adopted
            );
        } else {
            self.rebase(saved.snapshot.clone());
            tracing::info!("💾 Saved canvas '{}'", ticket.process_id);
        }

        Ok(SaveReport {
            process_id: ticket.process_id,
            revision: saved.snapshot.revision,
            sync_result: saved.sync_result,
            superseded: false,
        })
    }

    fn record_sync_result(&mut self, process_id: &str, sync: Option<&SyncResult>) {
        match sync {
            Some(sync) => {
                self.tracker.apply_save_result(process_id, sync);
                if sync.success {
                    tracing::info!("🔄 Replicated canvas '{}': {}", process_id, sync.message);
                } else {
                    tracing::warn!(
                        "⚠️ Canvas '{}' saved but replication failed: {}",
                        process_id,
                        sync.message
                    );
                }
            }
            None => {
                tracing::debug!(
                    "🔄 No inline sync result for '{}'; status will be polled",
                    process_id
                );
            }
        }
    }

    /// Reload the session from a persisted snapshot, keeping current node positions
    fn rebase(&mut self, snapshot: CanvasSnapshot) {
        let mut layout = self.layout.layout(&snapshot);
        for node in self.session.nodes() {
            if let Some(position) = layout.positions.get_mut(&node.node) {
                *position = node.position;
            }
        }
        self.session.load_snapshot(&snapshot, &layout);
        self.presentation.retain_existing(&self.session);
        self.baseline = Some(snapshot);
    }

    /// Persist the session, then refresh sync status
    pub async fn save(&mut self) -> Result<SaveReport, EditorError> {
        let (ticket, payload) = self.begin_save()?;
        let result = self.backend.save_canvas(&ticket.process_id, &payload).await;
        let report = self.complete_save(ticket, result)?;

        if report.sync_result.is_none() && !report.superseded {
            if let Err(e) = self.refresh_status().await {
                tracing::warn!("⚠️ Could not poll sync status for '{}': {}", report.process_id, e);
            }
        }
        Ok(report)
    }

    /// Poll the server for the open canvas's sync status
    pub async fn refresh_status(&mut self) -> anyhow::Result<SyncStatus> {
        let process_id = self
            .process_id()
            .ok_or_else(|| anyhow::anyhow!("no canvas is loaded"))?
            .to_string();

        let health = self.backend.fetch_sync_status(&process_id).await?;
        if health.process_id == process_id {
            self.tracker.apply_health(&health);
        } else {
            tracing::warn!(
                "⚠️ Asked for sync status of '{}' but got '{}'",
                process_id,
                health.process_id
            );
        }
        Ok(self.tracker.status(&process_id).clone())
    }
}
