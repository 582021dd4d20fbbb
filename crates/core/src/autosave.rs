//! # Autosave session
//!
//! One [`Autosave`] backs one editor. It holds the working draft for the bound target and
//! decides when that draft is written to the [`PersistenceBackend`]:
//!
//! - edits restart a quiescence window; the draft is written once the window elapses
//! - a target without a persisted id is created only once the form's [`Precondition`] holds,
//!   and exactly once per binding; later writes update the id the backend returned
//! - at most one backend write is in flight per binding; edits made meanwhile collapse into a
//!   single follow-up save that reads the newest draft
//! - loading or switching documents never schedules a write (the hydration guard)
//! - results that arrive after the editor switched targets are dropped
//!
//! Handles are cheap to clone; every clone drives the same session.

use crate::binding::{BindingTag, TargetBinding};
use crate::config::AutosaveConfig;
use crate::forms::{FieldKind, FieldSpec, FormKind, FormSchema};
use crate::precondition::Precondition;
use crate::repositories::{PersistenceBackend, StoredDocument};
use crate::status::{SaveStatus, StatusSignal};
use crate::{AutosaveError, AutosaveResult, DraftState};
use practice_types::{PersistedId, TargetIdentity};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Outcome of a completed write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub id: PersistedId,
    /// `true` when this write created the document.
    pub created: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Debounce { generation: u64 },
    Manual,
}

enum WriteOp {
    Create,
    Update(PersistedId),
}

struct Session {
    binding: TargetBinding,
    draft: DraftState,
    debounce: Option<JoinHandle<()>>,
    /// Bumped whenever a pending debounce is replaced or revoked.
    timer_generation: u64,
    clear: Option<JoinHandle<()>>,
    /// Bumped on every status change; a clear timer only fires if nothing happened since.
    status_seq: u64,
    in_flight: bool,
    follow_up: bool,
    manual_in_flight: bool,
    /// Serialises backend writes per target, across rebinds to the same target.
    lanes: HashMap<TargetIdentity, Arc<tokio::sync::Mutex<()>>>,
}

impl Session {
    fn new(draft: DraftState) -> Self {
        Self {
            binding: TargetBinding::default(),
            draft,
            debounce: None,
            timer_generation: 0,
            clear: None,
            status_seq: 0,
            in_flight: false,
            follow_up: false,
            manual_in_flight: false,
            lanes: HashMap::new(),
        }
    }

    fn cancel_timers(&mut self) {
        cancel(&mut self.debounce);
        cancel(&mut self.clear);
        self.timer_generation += 1;
    }
}

fn cancel(handle: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = handle.take() {
        handle.abort();
    }
}

struct Inner<B> {
    backend: Arc<B>,
    schema: FormSchema,
    precondition: Precondition,
    config: AutosaveConfig,
    status: StatusSignal,
    session: Mutex<Session>,
}

/// Builds an [`Autosave`] with a non-default config or precondition.
pub struct AutosaveBuilder<B> {
    backend: Arc<B>,
    form: FormKind,
    config: AutosaveConfig,
    precondition: Option<Precondition>,
}

impl<B: PersistenceBackend> AutosaveBuilder<B> {
    /// Use `config` instead of [`AutosaveConfig::default`].
    pub fn config(mut self, config: AutosaveConfig) -> Self {
        self.config = config;
        self
    }

    /// Override the form's default create precondition.
    pub fn precondition(mut self, precondition: Precondition) -> Self {
        self.precondition = Some(precondition);
        self
    }

    /// Create the session. It starts unbound, with the form defaults as its draft and an
    /// idle status.
    pub fn build(self) -> Autosave<B> {
        let schema = self.form.schema();
        let precondition = self
            .precondition
            .unwrap_or_else(|| self.form.default_precondition());

        Autosave {
            inner: Arc::new(Inner {
                backend: self.backend,
                schema,
                precondition,
                config: self.config,
                status: StatusSignal::new(),
                session: Mutex::new(Session::new(schema.defaults())),
            }),
        }
    }
}

/// Debounced, create-once autosave for one editor.
///
/// Must be used from within a Tokio runtime; timers run as spawned tasks.
pub struct Autosave<B> {
    inner: Arc<Inner<B>>,
}

impl<B> Clone for Autosave<B> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<B: PersistenceBackend> Autosave<B> {
    /// Creates an unbound session for `form` that writes through `backend`.
    ///
    /// # Arguments
    ///
    /// * `backend` - Where drafts are created and updated. Shared, so several sessions may
    ///   write to the same store.
    /// * `form` - Selects the field set, its defaults and the default create precondition.
    /// * `config` - Debounce window and status display durations.
    ///
    /// # Returns
    ///
    /// A session with no target; edits are rejected until [`Autosave::bind_to`] or
    /// [`Autosave::bind_and_load`] is called.
    pub fn new(backend: Arc<B>, form: FormKind, config: AutosaveConfig) -> Self {
        Self::builder(backend, form).config(config).build()
    }

    /// Start building a session that needs a non-default config or precondition.
    pub fn builder(backend: Arc<B>, form: FormKind) -> AutosaveBuilder<B> {
        AutosaveBuilder {
            backend,
            form,
            config: AutosaveConfig::default(),
            precondition: None,
        }
    }

    /// The form this session edits.
    pub fn form(&self) -> FormKind {
        self.inner.schema.kind()
    }

    /// The status the editor should currently display.
    ///
    /// `Saved` and `Failed` are transient and fall back to `Idle` after their configured
    /// display time unless something else happens first.
    pub fn status(&self) -> SaveStatus {
        self.inner.status.get()
    }

    /// Receive every status change from now on.
    pub fn subscribe(&self) -> watch::Receiver<SaveStatus> {
        self.inner.status.subscribe()
    }

    /// A snapshot of the working draft.
    pub fn draft(&self) -> DraftState {
        self.inner.lock().draft.clone()
    }

    /// Current value of one draft field.
    ///
    /// # Returns
    ///
    /// `None` if the form has no such field. Every field the form defines is present from
    /// binding onwards.
    pub fn get(&self, field: &str) -> Option<Value> {
        self.inner.lock().draft.get(field).cloned()
    }

    /// The target currently bound, or `None` before the first bind and after [`Autosave::close`].
    pub fn target(&self) -> Option<TargetIdentity> {
        self.inner.lock().binding.target().cloned()
    }

    /// The backend id of the bound target's document.
    ///
    /// Set from the initial document or a load, or by the first successful create. Once set it
    /// never changes until the session is rebound.
    pub fn persisted_id(&self) -> Option<PersistedId> {
        self.inner.lock().binding.persisted_id().cloned()
    }

    /// Whether the draft still mirrors what was loaded, with no edit since.
    pub fn is_hydrating(&self) -> bool {
        self.inner.lock().binding.is_hydrating()
    }

    /// Switch the session to `target`.
    ///
    /// The draft is replaced with `initial` (or the form defaults) without scheduling a write.
    /// Pending timers are cancelled, and a write still in flight for the previous target will
    /// have its result discarded.
    pub fn bind_to(&self, target: TargetIdentity, initial: Option<StoredDocument>) -> BindingTag {
        let mut session = self.inner.lock();
        self.inner.rebind(&mut session, target, initial)
    }

    /// Bind to `target` with defaults, then replace the draft with the stored document.
    ///
    /// A fetch failure is logged and the session stays on defaults. Edits made while the fetch
    /// is outstanding take precedence over the stored body.
    ///
    /// # Errors
    ///
    /// Returns [`AutosaveError::Superseded`] if the session was rebound before the fetch
    /// completed; the fetched document is dropped.
    pub async fn bind_and_load(
        &self,
        target: TargetIdentity,
    ) -> AutosaveResult<Option<PersistedId>> {
        let tag = self.bind_to(target.clone(), None);

        let fetched = match self.inner.backend.fetch(&target).await {
            Ok(document) => document,
            Err(e) => {
                tracing::warn!(
                    "failed to load {} document for {}: {}",
                    self.form(),
                    target,
                    e
                );
                None
            }
        };

        let mut session = self.inner.lock();
        if !session.binding.is_current(&tag) {
            tracing::debug!("dropping document loaded for {}", target);
            return Err(AutosaveError::Superseded);
        }

        let Some(document) = fetched else {
            return Ok(None);
        };

        if !session.binding.adopt_persisted_id(&tag, document.id.clone()) {
            tracing::warn!(
                "{} already has document {:?}; ignoring loaded id {}",
                target,
                session.binding.persisted_id(),
                document.id
            );
        }

        if session.binding.is_hydrating() {
            let draft = self.inner.schema.hydrate(&document.body);
            session.draft.replace(draft);
            self.inner.on_change(&mut session);
        } else {
            tracing::warn!("keeping edits made to {} while it was loading", target);
        }

        Ok(session.binding.persisted_id().cloned())
    }

    /// Overwrite the whole draft, e.g. with a document loaded outside the session.
    ///
    /// This is hydration, not an edit: no write is scheduled, and any pending or queued one is
    /// dropped. A write already in flight still completes.
    ///
    /// # Errors
    ///
    /// Returns [`AutosaveError::Unbound`] if no target is bound.
    pub fn replace(&self, draft: DraftState) -> AutosaveResult<()> {
        let mut session = self.inner.lock();
        if session.binding.tag().is_none() {
            return Err(AutosaveError::Unbound);
        }

        cancel(&mut session.debounce);
        session.timer_generation += 1;
        session.follow_up = false;
        session.binding.raise_hydration_guard();
        session.draft.replace(draft);
        self.inner.on_change(&mut session);

        if matches!(
            self.inner.status.get(),
            SaveStatus::Waiting | SaveStatus::Debouncing
        ) {
            self.inner.set_status(&mut session, SaveStatus::Idle);
        }
        Ok(())
    }

    /// [`Autosave::replace`] with a stored document mapped onto the form defaults.
    pub fn hydrate(&self, document: &Value) -> AutosaveResult<()> {
        self.replace(self.inner.schema.hydrate(document))
    }

    /// Set one field of the draft and restart the debounce window.
    ///
    /// # Arguments
    ///
    /// * `field` - Name of a field of this form.
    /// * `value` - New value as the editor holds it; normalisation happens when saving.
    ///
    /// # Errors
    ///
    /// - [`AutosaveError::Unbound`] if no target is bound
    /// - [`AutosaveError::UnknownField`] if the form has no such field; the draft is unchanged
    pub fn set(&self, field: &str, value: Value) -> AutosaveResult<()> {
        self.inner.edit(field, |draft, spec| {
            draft.set(spec.name, value);
            Ok(())
        })
    }

    /// Append an item to a list field.
    ///
    /// # Errors
    ///
    /// As [`Autosave::set`], plus [`AutosaveError::NotAList`] if `field` is not a list.
    pub fn push_item(&self, field: &str, item: Value) -> AutosaveResult<()> {
        self.inner.edit(field, |draft, spec| {
            list_of(draft, spec)?.push(item);
            Ok(())
        })
    }

    /// Remove and return the item at `index` of a list field.
    ///
    /// # Errors
    ///
    /// As [`Autosave::push_item`], plus [`AutosaveError::IndexOutOfRange`]; nothing is
    /// removed in that case.
    pub fn remove_item(&self, field: &str, index: usize) -> AutosaveResult<Value> {
        self.inner.edit(field, |draft, spec| {
            let items = list_of(draft, spec)?;
            if index >= items.len() {
                return Err(AutosaveError::IndexOutOfRange {
                    field: spec.name.to_string(),
                    index,
                });
            }
            Ok(items.remove(index))
        })
    }

    /// Write the draft now, bypassing the debounce window.
    ///
    /// Waits for any write already in flight, then writes the newest draft. The status returns
    /// to idle afterwards; the caller reports the outcome.
    ///
    /// # Errors
    ///
    /// - [`AutosaveError::SaveInProgress`] while another manual save is running
    /// - [`AutosaveError::PreconditionUnmet`] if the document does not exist yet and the draft is
    ///   not save-worthy
    /// - [`AutosaveError::CreateFailed`] / [`AutosaveError::UpdateFailed`] from the backend
    /// - [`AutosaveError::Superseded`] if the session was rebound before the write completed
    pub async fn save_now(&self) -> AutosaveResult<SaveReceipt> {
        let tag = {
            let mut session = self.inner.lock();
            let tag = session.binding.tag().ok_or(AutosaveError::Unbound)?;
            if session.manual_in_flight {
                return Err(AutosaveError::SaveInProgress);
            }
            if session.binding.persisted_id().is_none()
                && !self.inner.precondition.is_met(&session.draft)
            {
                return Err(AutosaveError::PreconditionUnmet);
            }

            session.manual_in_flight = true;
            cancel(&mut session.debounce);
            session.timer_generation += 1;
            tag
        };

        let _manual = ManualGuard {
            inner: &self.inner,
            tag: &tag,
        };
        self.inner.run_save(&tag, Trigger::Manual).await
    }

    /// End the session. Pending timers are cancelled and in-flight results are discarded.
    pub fn close(&self) {
        let mut session = self.inner.lock();
        session.cancel_timers();
        session.binding.unbind();
        session.draft.replace(self.inner.schema.defaults());
        session.in_flight = false;
        session.follow_up = false;
        session.manual_in_flight = false;
        self.inner.set_status(&mut session, SaveStatus::Idle);
        tracing::debug!("closed {} autosave session", self.form());
    }
}

fn list_of<'a>(draft: &'a mut DraftState, spec: &FieldSpec) -> AutosaveResult<&'a mut Vec<Value>> {
    if spec.kind != FieldKind::List {
        return Err(AutosaveError::NotAList(spec.name.to_string()));
    }
    draft
        .list_mut(spec.name)
        .ok_or_else(|| AutosaveError::NotAList(spec.name.to_string()))
}

impl<B: PersistenceBackend> Inner<B> {
    fn lock(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_status(&self, session: &mut Session, status: SaveStatus) {
        session.status_seq += 1;
        self.status.set(status);
    }

    fn form(&self) -> FormKind {
        self.schema.kind()
    }

    fn rebind(
        self: &Arc<Self>,
        session: &mut Session,
        target: TargetIdentity,
        initial: Option<StoredDocument>,
    ) -> BindingTag {
        session.cancel_timers();
        session.in_flight = false;
        session.follow_up = false;
        session.manual_in_flight = false;
        // A lane still held by a write outlives the binding that queued it.
        session
            .lanes
            .retain(|lane_target, lane| *lane_target == target || Arc::strong_count(lane) > 1);

        let (persisted_id, draft) = match initial {
            Some(document) => (Some(document.id), self.schema.hydrate(&document.body)),
            None => (None, self.schema.defaults()),
        };
        let tag = session.binding.bind(target, persisted_id);
        session.draft.replace(draft);
        self.on_change(session);
        self.set_status(session, SaveStatus::Idle);

        tracing::info!(
            "{} autosave bound to {} (document {:?})",
            self.form(),
            tag.target,
            session.binding.persisted_id()
        );
        tag
    }

    fn edit<T, F>(self: &Arc<Self>, field: &str, apply: F) -> AutosaveResult<T>
    where
        F: FnOnce(&mut DraftState, &FieldSpec) -> AutosaveResult<T>,
    {
        let mut session = self.lock();
        if session.binding.tag().is_none() {
            return Err(AutosaveError::Unbound);
        }
        let spec = self
            .schema
            .field(field)
            .ok_or_else(|| AutosaveError::UnknownField(field.to_string()))?;

        let out = apply(&mut session.draft, spec)?;
        if session.binding.clear_hydration_guard() {
            tracing::debug!("first edit of {} since it was loaded", self.form());
        }
        self.on_change(&mut session);
        Ok(out)
    }

    fn on_change(self: &Arc<Self>, session: &mut Session) {
        if session.binding.is_hydrating() {
            return;
        }
        if session.in_flight {
            session.follow_up = true;
            return;
        }
        self.schedule(session);
    }

    /// Restart the debounce window for the current binding.
    fn schedule(self: &Arc<Self>, session: &mut Session) {
        cancel(&mut session.debounce);
        session.timer_generation += 1;

        if session.binding.is_hydrating() {
            return;
        }
        let Some(tag) = session.binding.tag() else {
            return;
        };

        if session.binding.persisted_id().is_none() && !self.precondition.is_met(&session.draft) {
            tracing::debug!(
                "{} for {} not saved yet: {} unmet",
                self.form(),
                tag.target,
                self.precondition.name()
            );
            self.set_status(session, SaveStatus::Waiting);
            return;
        }

        let generation = session.timer_generation;
        let window = self.config.debounce();
        let inner = Arc::clone(self);
        session.debounce = Some(tokio::spawn(async move {
            tokio::time::sleep(window).await;
            inner.on_debounce_elapsed(tag, generation).await;
        }));
        self.set_status(session, SaveStatus::Debouncing);
    }

    async fn on_debounce_elapsed(self: Arc<Self>, tag: BindingTag, generation: u64) {
        {
            let mut session = self.lock();
            if !session.binding.is_current(&tag) || session.timer_generation != generation {
                return;
            }
            // Detach so later edits cannot abort the write this task is about to make.
            session.debounce = None;
            if session.in_flight {
                session.follow_up = true;
                return;
            }
        }

        if let Err(e) = self.run_save(&tag, Trigger::Debounce { generation }).await {
            tracing::debug!("autosave of {} ended without a write: {}", tag.target, e);
        }
    }

    async fn run_save(
        self: &Arc<Self>,
        tag: &BindingTag,
        trigger: Trigger,
    ) -> AutosaveResult<SaveReceipt> {
        let lane = {
            let mut session = self.lock();
            if !session.binding.is_current(tag) {
                return Err(AutosaveError::Superseded);
            }
            Arc::clone(session.lanes.entry(tag.target.clone()).or_default())
        };
        let _turn = lane.lock().await;

        let (op, payload) = {
            let mut session = self.lock();
            if !session.binding.is_current(tag) {
                return Err(AutosaveError::Superseded);
            }
            if let Trigger::Debounce { generation } = trigger {
                if session.timer_generation != generation {
                    return Err(AutosaveError::Superseded);
                }
            }
            cancel(&mut session.debounce);

            let op = match session.binding.persisted_id() {
                Some(id) => WriteOp::Update(id.clone()),
                None if self.precondition.is_met(&session.draft) => WriteOp::Create,
                None => {
                    if trigger != Trigger::Manual {
                        self.set_status(&mut session, SaveStatus::Waiting);
                    }
                    return Err(AutosaveError::PreconditionUnmet);
                }
            };

            if trigger == Trigger::Manual {
                // Supersedes any queued follow-up or debounce.
                session.follow_up = false;
                session.timer_generation += 1;
            }
            session.in_flight = true;
            cancel(&mut session.clear);
            self.set_status(&mut session, SaveStatus::Saving);
            (op, self.schema.payload(&session.draft))
        };

        let mut flight = FlightGuard {
            inner: self,
            tag,
            armed: true,
        };

        let result = match op {
            WriteOp::Create => self
                .backend
                .create(&tag.target, &payload)
                .await
                .map(|id| SaveReceipt { id, created: true })
                .map_err(AutosaveError::CreateFailed),
            WriteOp::Update(id) => match self.backend.update(&id, &payload).await {
                Ok(()) => Ok(SaveReceipt { id, created: false }),
                Err(e) => Err(AutosaveError::UpdateFailed(e)),
            },
        };
        flight.armed = false;

        let mut session = self.lock();
        if !session.binding.is_current(tag) {
            match &result {
                Ok(receipt)
                    if receipt.created
                        && session
                            .binding
                            .adopt_created_for(&tag.target, receipt.id.clone()) =>
                {
                    tracing::info!(
                        "{} was rebound while creating document {}; adopting it",
                        tag.target,
                        receipt.id
                    );
                }
                _ => tracing::warn!(
                    "discarding {} save result for {}: target is no longer bound",
                    self.form(),
                    tag.target
                ),
            }
            return Err(AutosaveError::Superseded);
        }
        session.in_flight = false;

        match &result {
            Ok(receipt) => {
                if receipt.created && !session.binding.adopt_persisted_id(tag, receipt.id.clone())
                {
                    tracing::warn!(
                        "{} already has a document; created {} is orphaned",
                        tag.target,
                        receipt.id
                    );
                }
                tracing::info!(
                    "saved {} document {} for {}",
                    self.form(),
                    receipt.id,
                    tag.target
                );
            }
            Err(e) => {
                tracing::warn!("failed to save {} for {}: {}", self.form(), tag.target, e);
            }
        }

        match trigger {
            Trigger::Debounce { .. } => {
                let (status, display) = match &result {
                    Ok(_) => (SaveStatus::Saved, self.config.saved_display()),
                    Err(_) => (SaveStatus::Failed, self.config.failed_display()),
                };
                self.set_status(&mut session, status);
                self.schedule_clear(&mut session, tag, display);
            }
            Trigger::Manual => self.set_status(&mut session, SaveStatus::Idle),
        }

        if std::mem::take(&mut session.follow_up) {
            self.schedule(&mut session);
        }

        result
    }

    /// Return a transient status to idle after `after`, unless the status changes first.
    fn schedule_clear(self: &Arc<Self>, session: &mut Session, tag: &BindingTag, after: Duration) {
        cancel(&mut session.clear);
        let seq = session.status_seq;
        let tag = tag.clone();
        let inner = Arc::clone(self);
        session.clear = Some(tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let mut session = inner.lock();
            if session.binding.is_current(&tag)
                && session.status_seq == seq
                && inner.status.get().is_transient()
            {
                inner.set_status(&mut session, SaveStatus::Idle);
            }
        }));
    }
}

/// Releases the in-flight slot if a write is abandoned mid-call.
///
/// Queued edits are not rescheduled here; the next edit schedules again.
struct FlightGuard<'a, B: PersistenceBackend> {
    inner: &'a Arc<Inner<B>>,
    tag: &'a BindingTag,
    armed: bool,
}

impl<B: PersistenceBackend> Drop for FlightGuard<'_, B> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut session = self.inner.lock();
        if session.binding.is_current(self.tag) {
            session.in_flight = false;
            session.follow_up = false;
            self.inner.set_status(&mut session, SaveStatus::Idle);
        }
    }
}

struct ManualGuard<'a, B: PersistenceBackend> {
    inner: &'a Arc<Inner<B>>,
    tag: &'a BindingTag,
}

impl<B: PersistenceBackend> Drop for ManualGuard<'_, B> {
    fn drop(&mut self) {
        let mut session = self.inner.lock();
        if session.binding.is_current(self.tag) {
            session.manual_in_flight = false;
        }
    }
}
