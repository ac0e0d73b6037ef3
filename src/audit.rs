use serde_json::Value;
use uuid::Uuid;

use crate::repository::AuditSink;

#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntry {
    pub user_id: Option<Uuid>,
    pub action: String,
    pub resource: Option<String>,
    pub metadata: Option<Value>,
}

/// Best effort: a failed audit write is logged and never fails the request.
pub async fn log_audit<S: AuditSink + ?Sized>(
    sink: &S,
    user_id: Option<Uuid>,
    action: &str,
    resource: Option<&str>,
    metadata: Option<Value>,
) {
    let entry = AuditEntry {
        user_id,
        action: action.to_string(),
        resource: resource.map(str::to_string),
        metadata,
    };
    if let Err(err) = sink.record_audit(entry).await {
        tracing::warn!(error = %err, action, "audit log failed");
    }
}
