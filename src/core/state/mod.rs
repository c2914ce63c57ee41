// Per-subject state: credentials, delivery watermarks and upload status

pub mod manager;
pub mod subject_state;

pub use manager::StateManager;
pub use subject_state::{SubjectState, UploadStatus};
