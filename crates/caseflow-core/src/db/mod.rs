//! Database layer for Caseflow

mod attachment_repository;
mod case_repository;
mod connection;
mod keys;
mod migrations;
mod note_repository;
mod queue_repository;
mod status_repository;

pub use attachment_repository::AttachmentRepository;
pub use case_repository::CaseRepository;
pub use connection::Database;
pub use note_repository::NoteRepository;
pub use queue_repository::QueueRepository;
pub use status_repository::{StatusRepository, INTERRUPTED_MESSAGE};
