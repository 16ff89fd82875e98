//! CIP-25-shaped metadata payloads for minted diplomas. Content is plain
//! JSON; the wallet SDK wraps it into the on-chain metadata envelope.

use serde_json::{json, Value};

use diploma_types::{ContentAddress, SchoolProfile, StudentId, StudentProfile, TemplateId};

/// Unique on-chain asset name for one recipient's diploma.
pub fn asset_name(student: &StudentId, issued_at_unix_millis: u64) -> String {
    format!("Diploma_{student}_{issued_at_unix_millis}")
}

/// Stand-in asset payload when a stored template is the source; template
/// rendering itself is a UI concern.
pub fn template_asset_descriptor(template: &TemplateId) -> Value {
    json!({
        "kind": "diploma-template",
        "template_id": template,
    })
}

/// Batch-level metadata pinned once per issuance run.
pub fn batch_metadata(
    school: &SchoolProfile,
    template: Option<&TemplateId>,
    recipient_count: usize,
    issued_at_unix_millis: u64,
) -> Value {
    json!({
        "name": format!("Diploma Batch {issued_at_unix_millis}"),
        "description": "Educational diploma NFTs",
        "issuer": { "name": school.name, "id": school.id },
        "template_id": template,
        "recipients": recipient_count,
        "issued_at_unix_millis": issued_at_unix_millis,
    })
}

/// Per-recipient asset metadata. When the student profile could not be
/// read back (eventually consistent directory), the id stands in for the
/// display name.
pub fn diploma_metadata(
    school: &SchoolProfile,
    student: Option<&StudentProfile>,
    student_id: &StudentId,
    image: &ContentAddress,
    batch: &ContentAddress,
    issued_at_unix_millis: u64,
) -> Value {
    let display_name = student
        .map(|s| s.full_name.clone())
        .unwrap_or_else(|| student_id.to_string());
    json!({
        "name": format!("Diploma - {display_name}"),
        "image": image,
        "description": "Official academic diploma",
        "student": {
            "name": display_name,
            "id": student_id,
            "matricule": student.map(|s| s.matricule.clone()),
        },
        "academic": {
            "faculty": student.and_then(|s| s.faculty.clone()),
            "level": student.and_then(|s| s.level.clone()),
        },
        "issuer": { "name": school.name, "id": school.id },
        "certificate": {
            "number": format!("DIP-{issued_at_unix_millis}-{student_id}"),
            "issued_at_unix_millis": issued_at_unix_millis,
            "standard": "CIP-25",
            "version": "1.0",
        },
        "batch": batch,
    })
}
