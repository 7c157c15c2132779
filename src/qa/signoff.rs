//! Persists the QA sign-off record into a spec's `implementation_plan.json`,
//! preserving whatever other keys the write phase already wrote there.

use std::path::Path;

use crate::qa::error::QaError;
use crate::qa::models::QaSignoff;

const PLAN_FILE: &str = "implementation_plan.json";

/// Merges `signoff` into `<spec_dir>/implementation_plan.json` under the
/// `qa_signoff` key, using the same write-to-`.tmp`-then-rename pattern as
/// every other persisted artifact in this engine.
pub async fn persist_signoff(spec_dir: &Path, signoff: &QaSignoff) -> Result<(), QaError> {
    tokio::fs::create_dir_all(spec_dir).await?;
    let final_path = spec_dir.join(PLAN_FILE);
    let tmp_path = final_path.with_extension("json.tmp");

    let mut plan: serde_json::Value = match tokio::fs::read_to_string(&final_path).await {
        Ok(raw) => serde_json::from_str(&raw).unwrap_or_else(|_| serde_json::json!({})),
        Err(_) => serde_json::json!({}),
    };
    if !plan.is_object() {
        plan = serde_json::json!({});
    }

    let signoff_value = serde_json::to_value(signoff).map_err(|source| QaError::Serde {
        entity: "qa_signoff".to_string(),
        source,
    })?;
    plan.as_object_mut()
        .expect("just normalized to an object above")
        .insert("qa_signoff".to_string(), signoff_value);

    let json = serde_json::to_string_pretty(&plan).map_err(|source| QaError::Serde {
        entity: PLAN_FILE.to_string(),
        source,
    })?;
    tokio::fs::write(&tmp_path, json).await?;
    tokio::fs::rename(&tmp_path, &final_path).await?;

    Ok(())
}
