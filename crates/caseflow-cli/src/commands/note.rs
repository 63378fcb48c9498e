use std::path::Path;

use caseflow_core::ChangeTracker;

use crate::cli::NoteCommands;
use crate::commands::common::{normalize_note_text, open_store, resolve_case};
use crate::error::CliError;

pub async fn run_note(command: NoteCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        NoteCommands::Add { case, text, author } => {
            run_note_add(&case, &text, &author, db_path).await
        }
    }
}

pub async fn run_note_add(
    case_id: &str,
    text_parts: &[String],
    author: &str,
    db_path: &Path,
) -> Result<(), CliError> {
    let text = normalize_note_text(text_parts)?;
    let store = open_store(db_path)?;
    let case = resolve_case(&store, case_id).await?;

    let note = ChangeTracker::new(store)
        .add_note(case.key, &text, author)
        .await?;
    println!("Added note {} to case {}", note.key, case.key);
    Ok(())
}

pub fn guess_mime_type(file: &Path) -> String {
    mime_guess::from_path(file)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

pub async fn run_attach(
    case_id: &str,
    file: &Path,
    mime: Option<&str>,
    db_path: &Path,
) -> Result<(), CliError> {
    let data = std::fs::read(file)?;
    let name = file
        .file_name()
        .map_or_else(|| "attachment".to_string(), |name| name.to_string_lossy().into_owned());
    let mime_type = mime.map_or_else(|| guess_mime_type(file), str::to_string);

    let store = open_store(db_path)?;
    let case = resolve_case(&store, case_id).await?;
    let attachment = ChangeTracker::new(store)
        .add_attachment(case.key, &name, &mime_type, data)
        .await?;
    println!(
        "Attached {} ({}, {} bytes) to case {}",
        attachment.name, attachment.mime_type, attachment.size_bytes, case.key
    );
    Ok(())
}
