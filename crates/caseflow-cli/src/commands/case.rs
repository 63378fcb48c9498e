use std::path::Path;

use caseflow_core::{CaseUpdate, ChangeTracker, NewCase};
use serde::Serialize;

use crate::cli::{CaseCommands, CaseFields, CaseUpdateFields};
use crate::commands::common::{
    case_to_list_item, format_case_lines, format_sync_timestamp, open_store, parse_record_key,
    resolve_case, sync_marker, CaseListItem,
};
use crate::error::CliError;

pub async fn run_case(command: CaseCommands, db_path: &Path) -> Result<(), CliError> {
    match command {
        CaseCommands::Add(fields) => run_case_add(fields, db_path).await,
        CaseCommands::Update { id, fields } => run_case_update(&id, fields, db_path).await,
        CaseCommands::List {
            limit,
            status,
            json,
        } => run_case_list(limit, status.as_deref(), json, db_path).await,
        CaseCommands::Show { id, json } => run_case_show(&id, json, db_path).await,
    }
}

pub fn new_case_from_fields(fields: CaseFields) -> NewCase {
    NewCase {
        title: fields.title,
        client_name: fields.client_name,
        client_phone: fields.client_phone,
        device_type: fields.device_type,
        device_model: fields.device_model,
        serial_number: fields.serial_number,
        status: fields.status,
        priority: fields.priority,
        issue_description: fields.issue,
        case_number: fields.case_number,
        technician_name: fields.technician,
    }
}

pub fn case_update_from_fields(fields: CaseUpdateFields) -> CaseUpdate {
    CaseUpdate {
        title: fields.title,
        client_name: fields.client_name,
        client_phone: fields.client_phone,
        device_type: fields.device_type,
        device_model: fields.device_model,
        serial_number: fields.serial_number,
        status: fields.status,
        priority: fields.priority,
        issue_description: fields.issue,
        diagnosis: fields.diagnosis,
        solution: fields.solution,
        technician_name: fields.technician,
    }
}

pub async fn run_case_add(fields: CaseFields, db_path: &Path) -> Result<(), CliError> {
    let tracker = ChangeTracker::new(open_store(db_path)?);
    let case = tracker.add_case(new_case_from_fields(fields)).await?;
    println!("Created case {} ({})", case.key, case.title);
    Ok(())
}

pub async fn run_case_update(
    id: &str,
    fields: CaseUpdateFields,
    db_path: &Path,
) -> Result<(), CliError> {
    let key = parse_record_key(id)?;
    let tracker = ChangeTracker::new(open_store(db_path)?);
    let case = tracker
        .update_case(key, case_update_from_fields(fields))
        .await
        .map_err(|error| match error {
            caseflow_core::Error::NotFound(_) => CliError::CaseNotFound(id.trim().to_string()),
            other => CliError::Core(other),
        })?;
    println!("Updated case {} ({})", case.key, case.title);
    Ok(())
}

pub async fn run_case_list(
    limit: usize,
    status: Option<&str>,
    as_json: bool,
    db_path: &Path,
) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let cases = match status {
        Some(status) => {
            let mut cases = store.list_cases_by_status(status).await?;
            cases.truncate(limit);
            cases
        }
        None => store.list_cases(limit, 0).await?,
    };

    if as_json {
        let items = cases
            .iter()
            .map(case_to_list_item)
            .collect::<Vec<CaseListItem>>();
        println!("{}", serde_json::to_string_pretty(&items)?);
    } else if cases.is_empty() {
        println!("No cases.");
    } else {
        for line in format_case_lines(&cases) {
            println!("{line}");
        }
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct CaseDetail<'a> {
    case: &'a caseflow_core::CaseRecord,
    notes: &'a [caseflow_core::NoteRecord],
    attachments: Vec<AttachmentSummary>,
}

#[derive(Debug, Serialize)]
struct AttachmentSummary {
    id: String,
    name: String,
    mime_type: String,
    size_bytes: i64,
    needs_sync: bool,
    sync_error: Option<String>,
}

pub async fn run_case_show(id: &str, as_json: bool, db_path: &Path) -> Result<(), CliError> {
    let store = open_store(db_path)?;
    let case = resolve_case(&store, id).await?;
    let notes = store.notes_for_case(case.key).await?;
    let attachments = store
        .attachments_for_case(case.key)
        .await?
        .into_iter()
        .map(|attachment| AttachmentSummary {
            id: attachment.key.to_string(),
            name: attachment.name,
            mime_type: attachment.mime_type,
            size_bytes: attachment.size_bytes,
            needs_sync: attachment.needs_sync,
            sync_error: attachment.sync_error,
        })
        .collect::<Vec<_>>();

    if as_json {
        let detail = CaseDetail {
            case: &case,
            notes: &notes,
            attachments,
        };
        println!("{}", serde_json::to_string_pretty(&detail)?);
        return Ok(());
    }

    println!("Case {}: {}", case.key, case.title);
    println!("  Status:   {}", case.status);
    if let Some(priority) = &case.priority {
        println!("  Priority: {priority}");
    }
    println!("  Client:   {} {}", case.client_name, case.client_phone);
    println!("  Device:   {} {}", case.device_type, case.device_model);
    if !case.issue_description.is_empty() {
        println!("  Issue:    {}", case.issue_description);
    }
    if let Some(diagnosis) = &case.diagnosis {
        println!("  Diagnosis: {diagnosis}");
    }
    if let Some(solution) = &case.solution {
        println!("  Solution: {solution}");
    }
    println!("  Updated:  {}", format_sync_timestamp(case.updated_at));
    if case.needs_sync {
        match &case.sync_error {
            Some(error) => println!("  Sync:     failed ({error})"),
            None => println!("  Sync:     pending"),
        }
    }

    if !notes.is_empty() {
        println!("Notes:");
        for note in &notes {
            println!(
                "{} {}  {}: {}",
                sync_marker(note.needs_sync, note.sync_error.as_deref()),
                format_sync_timestamp(note.created_at),
                note.created_by,
                note.text
            );
        }
    }
    if !attachments.is_empty() {
        println!("Attachments:");
        for attachment in &attachments {
            println!(
                "{} {}  {}  {} bytes",
                sync_marker(attachment.needs_sync, attachment.sync_error.as_deref()),
                attachment.name,
                attachment.mime_type,
                attachment.size_bytes
            );
        }
    }
    Ok(())
}
