//! Session state and the operations that drive it.
//!
//! [`Controller`] is the single owner of [`AppState`]. Every user action goes
//! through one of its operations, which validate preconditions, call the
//! encoder or a remote service, and write the outcome back into state. Errors
//! never escape an operation; they become the user-facing `error` message.

use crate::ai::{PhotoDescriptionService, PhotoEditService};
use crate::encoder::{self, SelectedFile};
use crate::models::{EncodedImage, UploadedImage};
use crate::{prompts, Result};
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

pub const INVALID_FILE_MESSAGE: &str = "Please select a valid image file.";
pub const LOAD_FAILED_MESSAGE: &str = "Failed to load image. Please try another file.";
pub const EDIT_PRECONDITION_MESSAGE: &str = "Please upload an image and provide an edit prompt.";
pub const DESCRIBE_PRECONDITION_MESSAGE: &str = "Please upload an image first.";
pub const EDIT_FAILED_MESSAGE: &str = "Failed to edit the photo. Please try again.";
pub const DESCRIBE_FAILED_MESSAGE: &str = "Failed to generate a description. Please try again.";

/// The two remote operations a session can have in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Edit,
    Describe,
}

impl Operation {
    pub fn failure_message(self) -> &'static str {
        match self {
            Operation::Edit => EDIT_FAILED_MESSAGE,
            Operation::Describe => DESCRIBE_FAILED_MESSAGE,
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Edit => write!(f, "edit"),
            Operation::Describe => write!(f, "describe"),
        }
    }
}

/// How a controller operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing was selected; state untouched.
    Ignored,
    /// Preconditions failed; an error message was set and nothing was called.
    Rejected,
    /// An operation of the same kind was already in flight.
    Busy,
    Completed,
    /// The encoder or remote service failed; an error message was set.
    Failed,
    /// The result arrived after a later selection replaced the image it was
    /// issued for.
    Discarded,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppState {
    pub original_image: Option<UploadedImage>,
    pub edited_image: Option<EncodedImage>,
    pub description: Option<String>,
    pub prompt: String,
    pub is_editing: bool,
    pub is_describing: bool,
    pub error: Option<String>,
    /// Bumped each time a selection is accepted, before it is encoded.
    pub upload_generation: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            original_image: None,
            edited_image: None,
            description: None,
            prompt: prompts::DEFAULT_EDIT_PROMPT.to_string(),
            is_editing: false,
            is_describing: false,
            error: None,
            upload_generation: 0,
        }
    }
}

impl AppState {
    pub fn is_in_flight(&self, operation: Operation) -> bool {
        match operation {
            Operation::Edit => self.is_editing,
            Operation::Describe => self.is_describing,
        }
    }

    /// True while either remote operation is outstanding.
    pub fn is_busy(&self) -> bool {
        self.is_editing || self.is_describing
    }

    fn in_flight_mut(&mut self, operation: Operation) -> &mut bool {
        match operation {
            Operation::Edit => &mut self.is_editing,
            Operation::Describe => &mut self.is_describing,
        }
    }
}

fn lock_state(state: &Mutex<AppState>) -> MutexGuard<'_, AppState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Identifies the upload a remote call was issued against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Fence {
    generation: u64,
    image_id: Uuid,
}

impl Fence {
    fn of(state: &AppState, image: &UploadedImage) -> Self {
        Self {
            generation: state.upload_generation,
            image_id: image.id,
        }
    }

    fn holds(&self, state: &AppState) -> bool {
        state.upload_generation == self.generation
            && state.original_image.as_ref().map(|image| image.id) == Some(self.image_id)
    }
}

/// Clears an in-flight flag when the operation ends, including when its
/// future is dropped before completion.
struct InFlight {
    state: Arc<Mutex<AppState>>,
    operation: Operation,
    armed: bool,
}

impl InFlight {
    fn release(mut self, state: &mut AppState) {
        *state.in_flight_mut(self.operation) = false;
        self.armed = false;
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.armed {
            warn!("{} abandoned before completion", self.operation);
            *lock_state(&self.state).in_flight_mut(self.operation) = false;
        }
    }
}

/// Owns the session state and the remote services that update it.
///
/// Cloning is cheap and clones share state, so operations can be spawned as
/// independent tasks.
#[derive(Clone)]
pub struct Controller {
    state: Arc<Mutex<AppState>>,
    editor: Arc<dyn PhotoEditService>,
    describer: Arc<dyn PhotoDescriptionService>,
}

impl Controller {
    pub fn new(
        editor: Arc<dyn PhotoEditService>,
        describer: Arc<dyn PhotoDescriptionService>,
    ) -> Self {
        Self {
            state: Arc::new(Mutex::new(AppState::default())),
            editor,
            describer,
        }
    }

    fn lock(&self) -> MutexGuard<'_, AppState> {
        lock_state(&self.state)
    }

    /// Copy of the current state for rendering.
    pub fn snapshot(&self) -> AppState {
        self.lock().clone()
    }

    pub fn set_prompt(&self, prompt: impl Into<String>) {
        self.lock().prompt = prompt.into();
    }

    /// Loads a newly selected file as the session's original image.
    pub async fn on_file_selected(&self, file: Option<SelectedFile>) -> Outcome {
        let Some(file) = file else {
            debug!("File selection cancelled");
            return Outcome::Ignored;
        };

        let generation = {
            let mut state = self.lock();
            if !file.is_image() {
                info!(
                    "Rejected {} with declared type {}",
                    file.path.display(),
                    file.declared_type
                );
                state.error = Some(INVALID_FILE_MESSAGE.to_string());
                return Outcome::Rejected;
            }
            state.upload_generation += 1;
            state.error = None;
            state.edited_image = None;
            state.description = None;
            state.upload_generation
        };

        let encoded = encoder::encode_file(&file).await;

        let mut state = self.lock();
        if state.upload_generation != generation {
            info!(
                "Dropping {}; a later selection replaced it",
                file.path.display()
            );
            return Outcome::Discarded;
        }
        match encoded {
            Ok(encoded) => {
                let image = UploadedImage::new(encoded);
                info!(
                    "Loaded {} ({}) as upload {}",
                    file.path.display(),
                    image.encoded.mime_type,
                    image.id
                );
                state.original_image = Some(image);
                // Results for the previous image may have landed mid-encode.
                state.edited_image = None;
                state.description = None;
                state.error = None;
                Outcome::Completed
            }
            Err(e) => {
                warn!("Failed to load {}: {}", file.path.display(), e);
                state.error = Some(LOAD_FAILED_MESSAGE.to_string());
                state.original_image = None;
                Outcome::Failed
            }
        }
    }

    /// Asks the edit service to apply the current prompt to the original image.
    pub async fn request_edit(&self) -> Outcome {
        let (image, fence, prompt, in_flight) = {
            let mut state = self.lock();
            if state.is_in_flight(Operation::Edit) {
                warn!("Edit requested while another edit is in flight");
                return Outcome::Busy;
            }
            let has_prompt = !state.prompt.is_empty();
            let image = match state.original_image.clone() {
                Some(image) if has_prompt => image,
                _ => {
                    state.error = Some(EDIT_PRECONDITION_MESSAGE.to_string());
                    return Outcome::Rejected;
                }
            };
            let fence = Fence::of(&state, &image);
            let prompt = state.prompt.clone();
            state.error = None;
            state.edited_image = None;
            (image, fence, prompt, self.enter(&mut state, Operation::Edit))
        };

        info!("Editing upload {} with prompt: {}", image.id, prompt);
        let call = self.editor.edit_photo(&image.encoded, &prompt);
        self.finish(in_flight, fence, call, |state, edited| {
            state.edited_image = Some(edited);
        })
        .await
    }

    /// Asks the description service for an analysis of the original image.
    pub async fn request_describe(&self) -> Outcome {
        let (image, fence, in_flight) = {
            let mut state = self.lock();
            if state.is_in_flight(Operation::Describe) {
                warn!("Describe requested while another describe is in flight");
                return Outcome::Busy;
            }
            let Some(image) = state.original_image.clone() else {
                state.error = Some(DESCRIBE_PRECONDITION_MESSAGE.to_string());
                return Outcome::Rejected;
            };
            let fence = Fence::of(&state, &image);
            state.error = None;
            state.description = None;
            (image, fence, self.enter(&mut state, Operation::Describe))
        };

        info!("Describing upload {}", image.id);
        let call = self.describer.describe_photo(&image.encoded);
        self.finish(in_flight, fence, call, |state, description| {
            state.description = Some(description);
        })
        .await
    }

    fn enter(&self, state: &mut AppState, operation: Operation) -> InFlight {
        *state.in_flight_mut(operation) = true;
        InFlight {
            state: Arc::clone(&self.state),
            operation,
            armed: true,
        }
    }

    async fn finish<T, Fut, Store>(
        &self,
        in_flight: InFlight,
        fence: Fence,
        call: Fut,
        store: Store,
    ) -> Outcome
    where
        Fut: Future<Output = Result<T>>,
        Store: FnOnce(&mut AppState, T),
    {
        let result = call.await;
        let operation = in_flight.operation;
        let image_id = fence.image_id;

        let mut state = self.lock();
        let outcome = if !fence.holds(&state) {
            if let Err(e) = &result {
                error!("{} for upload {} failed: {}", operation, image_id, e);
            }
            warn!(
                "Discarding {} response for upload {}; the image was replaced",
                operation, image_id
            );
            Outcome::Discarded
        } else {
            match result {
                Ok(value) => {
                    store(&mut *state, value);
                    info!("{} of upload {} completed", operation, image_id);
                    Outcome::Completed
                }
                Err(e) => {
                    error!("{} for upload {} failed: {}", operation, image_id, e);
                    state.error = Some(operation.failure_message().to_string());
                    Outcome::Failed
                }
            }
        };

        in_flight.release(&mut *state);
        outcome
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::CallGate;
    use crate::ai::{MockPhotoDescriptionClient, MockPhotoEditClient};
    use std::path::Path;
    use tempfile::TempDir;

    fn controller_with(
        editor: MockPhotoEditClient,
        describer: MockPhotoDescriptionClient,
    ) -> Controller {
        Controller::new(Arc::new(editor), Arc::new(describer))
    }

    fn idle_controller() -> Controller {
        controller_with(MockPhotoEditClient::new(), MockPhotoDescriptionClient::new())
    }

    fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> SelectedFile {
        let path = dir.join(name);
        std::fs::write(&path, bytes).unwrap();
        SelectedFile::from_path(path)
    }

    async fn controller_with_upload(
        editor: MockPhotoEditClient,
        describer: MockPhotoDescriptionClient,
    ) -> (TempDir, Controller) {
        let dir = tempfile::tempdir().unwrap();
        let controller = controller_with(editor, describer);
        let file = write_file(dir.path(), "house.png", b"house");
        assert_eq!(
            controller.on_file_selected(Some(file)).await,
            Outcome::Completed
        );
        (dir, controller)
    }

    fn edited(data: &str) -> EncodedImage {
        EncodedImage::new(data.to_string(), "image/png".to_string())
    }

    #[test]
    fn test_initial_state() {
        let controller = idle_controller();
        let state = controller.snapshot();
        assert_eq!(state, AppState::default());
        assert_eq!(state.prompt, prompts::DEFAULT_EDIT_PROMPT);
        assert!(!state.is_busy());
    }

    #[tokio::test]
    async fn test_valid_upload_clears_previous_results() {
        let (dir, controller) = controller_with_upload(
            MockPhotoEditClient::new(),
            MockPhotoDescriptionClient::new(),
        )
        .await;
        controller.request_edit().await;
        controller.request_describe().await;
        controller.on_file_selected(Some(SelectedFile::from_path("notes.txt"))).await;

        let state = controller.snapshot();
        assert!(state.edited_image.is_some());
        assert!(state.description.is_some());
        assert!(state.error.is_some());

        let file = write_file(dir.path(), "tower.jpg", b"tower");
        assert_eq!(
            controller.on_file_selected(Some(file)).await,
            Outcome::Completed
        );

        let state = controller.snapshot();
        assert!(state.error.is_none());
        assert!(state.edited_image.is_none());
        assert!(state.description.is_none());
        let image = state.original_image.unwrap();
        assert_eq!(image.encoded.data, "dG93ZXI=");
        assert_eq!(image.encoded.mime_type, "image/jpeg");
    }

    #[tokio::test]
    async fn test_non_image_selection_keeps_upload() {
        let (_dir, controller) = controller_with_upload(
            MockPhotoEditClient::new(),
            MockPhotoDescriptionClient::new(),
        )
        .await;
        let before = controller.snapshot().original_image;

        let outcome = controller
            .on_file_selected(Some(SelectedFile::with_declared_type(
                "readme",
                "text/plain",
            )))
            .await;

        assert_eq!(outcome, Outcome::Rejected);
        let state = controller.snapshot();
        assert_eq!(state.error.as_deref(), Some(INVALID_FILE_MESSAGE));
        assert_eq!(state.original_image, before);
    }

    #[tokio::test]
    async fn test_no_selection_is_ignored() {
        let controller = idle_controller();
        assert_eq!(controller.on_file_selected(None).await, Outcome::Ignored);
        assert_eq!(controller.snapshot(), AppState::default());
    }

    #[tokio::test]
    async fn test_unreadable_file_clears_upload() {
        let (dir, controller) = controller_with_upload(
            MockPhotoEditClient::new(),
            MockPhotoDescriptionClient::new(),
        )
        .await;

        let missing = SelectedFile::from_path(dir.path().join("gone.png"));
        assert_eq!(
            controller.on_file_selected(Some(missing)).await,
            Outcome::Failed
        );

        let state = controller.snapshot();
        assert_eq!(state.error.as_deref(), Some(LOAD_FAILED_MESSAGE));
        assert!(state.original_image.is_none());
    }

    #[tokio::test]
    async fn test_edit_without_upload_is_rejected() {
        let editor = MockPhotoEditClient::new();
        let probe = editor.clone();
        let controller = controller_with(editor, MockPhotoDescriptionClient::new());

        assert_eq!(controller.request_edit().await, Outcome::Rejected);

        let state = controller.snapshot();
        assert_eq!(state.error.as_deref(), Some(EDIT_PRECONDITION_MESSAGE));
        assert!(!state.is_editing);
        assert_eq!(probe.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_edit_with_empty_prompt_does_not_call_service() {
        let editor = MockPhotoEditClient::new();
        let probe = editor.clone();
        let (_dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;

        controller.set_prompt("");
        assert_eq!(controller.request_edit().await, Outcome::Rejected);
        let state = controller.snapshot();
        assert_eq!(state.error.as_deref(), Some(EDIT_PRECONDITION_MESSAGE));
        assert!(!state.is_editing);
        assert_eq!(probe.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_whitespace_prompt_is_sent_as_is() {
        let editor = MockPhotoEditClient::new();
        let probe = editor.clone();
        let (_dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;

        controller.set_prompt("   ");
        assert_eq!(controller.request_edit().await, Outcome::Completed);
        assert_eq!(probe.get_call_count(), 1);
        assert_eq!(probe.received_prompts(), vec!["   ".to_string()]);
        assert!(controller.snapshot().error.is_none());
    }

    #[tokio::test]
    async fn test_successful_edit_stores_result() {
        let editor = MockPhotoEditClient::new().with_image_response(edited("QUJD"));
        let probe = editor.clone();
        let (_dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;
        controller.set_prompt("add a futuristic city in the background");

        assert_eq!(controller.request_edit().await, Outcome::Completed);

        let state = controller.snapshot();
        assert_eq!(state.edited_image, Some(edited("QUJD")));
        assert!(state.error.is_none());
        assert!(!state.is_editing);
        assert_eq!(
            probe.received_prompts(),
            vec!["add a futuristic city in the background".to_string()]
        );
    }

    #[tokio::test]
    async fn test_failed_edit_sets_generic_message() {
        let editor = MockPhotoEditClient::new()
            .with_image_response(edited("QUJD"))
            .with_failure("upstream exploded");
        let (_dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;

        controller.request_edit().await;
        assert!(controller.snapshot().edited_image.is_some());

        assert_eq!(controller.request_edit().await, Outcome::Failed);

        let state = controller.snapshot();
        assert_eq!(state.error.as_deref(), Some(EDIT_FAILED_MESSAGE));
        assert!(state.edited_image.is_none());
        assert!(!state.is_editing);
    }

    #[tokio::test]
    async fn test_successful_describe_stores_text() {
        let describer = MockPhotoDescriptionClient::new()
            .with_description_response("A Romanesque basilica.".to_string());
        let (_dir, controller) =
            controller_with_upload(MockPhotoEditClient::new(), describer).await;

        assert_eq!(controller.request_describe().await, Outcome::Completed);

        let state = controller.snapshot();
        assert_eq!(state.description.as_deref(), Some("A Romanesque basilica."));
        assert!(state.error.is_none());
        assert!(!state.is_describing);
    }

    #[tokio::test]
    async fn test_describe_without_upload_is_rejected() {
        let controller = idle_controller();
        assert_eq!(controller.request_describe().await, Outcome::Rejected);
        let state = controller.snapshot();
        assert_eq!(state.error.as_deref(), Some(DESCRIBE_PRECONDITION_MESSAGE));
        assert!(!state.is_describing);
    }

    #[tokio::test]
    async fn test_describe_retry_after_failure_clears_error() {
        let describer = MockPhotoDescriptionClient::new()
            .with_failure("timeout")
            .with_description_response("Art Deco".to_string());
        let (_dir, controller) =
            controller_with_upload(MockPhotoEditClient::new(), describer).await;

        assert_eq!(controller.request_describe().await, Outcome::Failed);
        assert_eq!(
            controller.snapshot().error.as_deref(),
            Some(DESCRIBE_FAILED_MESSAGE)
        );

        assert_eq!(controller.request_describe().await, Outcome::Completed);
        let state = controller.snapshot();
        assert!(state.error.is_none());
        assert_eq!(state.description.as_deref(), Some("Art Deco"));
    }

    #[tokio::test]
    async fn test_in_flight_flag_spans_the_remote_call() {
        let gate = CallGate::new();
        let editor = MockPhotoEditClient::new()
            .with_failure("boom")
            .with_gate(Arc::clone(&gate));
        let (_dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;

        assert!(!controller.snapshot().is_editing);
        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.request_edit().await }
        });

        gate.wait_started().await;
        let during = controller.snapshot();
        assert!(during.is_editing);
        assert!(!during.is_describing);
        assert!(during.error.is_none());

        gate.release();
        assert_eq!(task.await.unwrap(), Outcome::Failed);
        assert!(!controller.snapshot().is_editing);
    }

    #[tokio::test]
    async fn test_second_edit_while_in_flight_is_busy() {
        let gate = CallGate::new();
        let editor = MockPhotoEditClient::new().with_gate(Arc::clone(&gate));
        let probe = editor.clone();
        let (_dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.request_edit().await }
        });
        gate.wait_started().await;

        assert_eq!(controller.request_edit().await, Outcome::Busy);
        assert_eq!(probe.get_call_count(), 1);

        gate.release();
        assert_eq!(task.await.unwrap(), Outcome::Completed);
    }

    #[tokio::test]
    async fn test_edit_and_describe_interleave() {
        let edit_gate = CallGate::new();
        let describe_gate = CallGate::new();
        let editor = MockPhotoEditClient::new()
            .with_image_response(edited("RURJVA=="))
            .with_gate(Arc::clone(&edit_gate));
        let describer = MockPhotoDescriptionClient::new()
            .with_description_response("Neo-Gothic".to_string())
            .with_gate(Arc::clone(&describe_gate));
        let (_dir, controller) = controller_with_upload(editor, describer).await;

        let edit = tokio::spawn({
            let controller = controller.clone();
            async move { controller.request_edit().await }
        });
        let describe = tokio::spawn({
            let controller = controller.clone();
            async move { controller.request_describe().await }
        });
        edit_gate.wait_started().await;
        describe_gate.wait_started().await;

        let during = controller.snapshot();
        assert!(during.is_editing && during.is_describing);

        describe_gate.release();
        assert_eq!(describe.await.unwrap(), Outcome::Completed);
        assert!(controller.snapshot().is_editing);

        edit_gate.release();
        assert_eq!(edit.await.unwrap(), Outcome::Completed);

        let state = controller.snapshot();
        assert_eq!(state.edited_image, Some(edited("RURJVA==")));
        assert_eq!(state.description.as_deref(), Some("Neo-Gothic"));
        assert!(!state.is_busy());
    }

    #[tokio::test]
    async fn test_response_for_replaced_image_is_discarded() {
        let gate = CallGate::new();
        let describer = MockPhotoDescriptionClient::new()
            .with_description_response("Stale analysis".to_string())
            .with_gate(Arc::clone(&gate));
        let (dir, controller) =
            controller_with_upload(MockPhotoEditClient::new(), describer).await;

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.request_describe().await }
        });
        gate.wait_started().await;

        let replacement = write_file(dir.path(), "bridge.webp", b"bridge");
        controller.on_file_selected(Some(replacement)).await;
        let replacement_id = controller.snapshot().original_image.unwrap().id;

        gate.release();
        assert_eq!(task.await.unwrap(), Outcome::Discarded);

        let state = controller.snapshot();
        assert!(state.description.is_none());
        assert!(!state.is_describing);
        assert_eq!(state.original_image.unwrap().id, replacement_id);
    }

    #[tokio::test]
    async fn test_failure_for_replaced_image_is_not_shown() {
        let gate = CallGate::new();
        let editor = MockPhotoEditClient::new()
            .with_failure("model unavailable")
            .with_gate(Arc::clone(&gate));
        let (dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.request_edit().await }
        });
        gate.wait_started().await;

        let replacement = write_file(dir.path(), "chapel.png", b"chapel");
        assert_eq!(
            controller.on_file_selected(Some(replacement)).await,
            Outcome::Completed
        );

        gate.release();
        assert_eq!(task.await.unwrap(), Outcome::Discarded);

        let state = controller.snapshot();
        assert!(state.error.is_none());
        assert!(state.edited_image.is_none());
        assert!(!state.is_editing);
    }

    /// Reading a FIFO blocks until a writer shows up, which holds an upload
    /// in the encoder.
    #[cfg(unix)]
    fn make_fifo(dir: &Path, name: &str) -> std::path::PathBuf {
        let pipe = dir.join(name);
        let status = std::process::Command::new("mkfifo")
            .arg(&pipe)
            .status()
            .unwrap();
        assert!(status.success());
        pipe
    }

    /// Selects `pipe` and waits until the selection has been accepted.
    #[cfg(unix)]
    async fn start_blocked_upload(
        controller: &Controller,
        pipe: &Path,
    ) -> tokio::task::JoinHandle<Outcome> {
        let generation = controller.snapshot().upload_generation;
        let upload = tokio::spawn({
            let controller = controller.clone();
            let file = SelectedFile::from_path(pipe);
            async move { controller.on_file_selected(Some(file)).await }
        });
        while controller.snapshot().upload_generation == generation {
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        upload
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_result_stored_mid_encode_is_cleared_by_new_image() {
        let describer =
            MockPhotoDescriptionClient::new().with_description_response("Old mill".to_string());
        let (dir, controller) =
            controller_with_upload(MockPhotoEditClient::new(), describer).await;

        let pipe = make_fifo(dir.path(), "granary.png");
        let upload = start_blocked_upload(&controller, &pipe).await;

        assert_eq!(controller.request_describe().await, Outcome::Completed);
        assert!(controller.snapshot().description.is_some());

        tokio::task::spawn_blocking(move || std::fs::write(&pipe, b"granary"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(upload.await.unwrap(), Outcome::Completed);

        let state = controller.snapshot();
        assert!(state.description.is_none());
        assert!(state.error.is_none());
        assert!(!state.is_describing);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_response_landing_while_replacement_encodes_is_discarded() {
        let gate = CallGate::new();
        let editor = MockPhotoEditClient::new()
            .with_image_response(edited("QUJD"))
            .with_gate(Arc::clone(&gate));
        let (dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;

        let edit = tokio::spawn({
            let controller = controller.clone();
            async move { controller.request_edit().await }
        });
        gate.wait_started().await;

        let pipe = make_fifo(dir.path(), "annex.png");
        let upload = start_blocked_upload(&controller, &pipe).await;

        gate.release();
        assert_eq!(edit.await.unwrap(), Outcome::Discarded);
        let state = controller.snapshot();
        assert!(state.edited_image.is_none());
        assert!(!state.is_editing);

        tokio::task::spawn_blocking(move || std::fs::write(&pipe, b"annex"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(upload.await.unwrap(), Outcome::Completed);

        let state = controller.snapshot();
        assert_eq!(state.original_image.unwrap().encoded.data, "YW5uZXg=");
        assert!(state.edited_image.is_none());
        assert!(state.error.is_none());
    }

    #[tokio::test]
    async fn test_abandoned_operation_releases_flag() {
        let gate = CallGate::new();
        let editor = MockPhotoEditClient::new().with_gate(Arc::clone(&gate));
        let (_dir, controller) =
            controller_with_upload(editor, MockPhotoDescriptionClient::new()).await;

        let task = tokio::spawn({
            let controller = controller.clone();
            async move { controller.request_edit().await }
        });
        gate.wait_started().await;
        assert!(controller.snapshot().is_editing);

        task.abort();
        assert!(task.await.unwrap_err().is_cancelled());
        assert!(!controller.snapshot().is_editing);
    }
}
