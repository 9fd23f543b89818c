use std::collections::HashSet;
use std::path::Path;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{ImportError, ImportErrorCode};
use crate::feed::{Subscription, SubscriptionStatus};
use crate::normalize::normalize_url;

pub const EXPORT_VERSION: &str = "1.0.0";
pub const MAX_IMPORT_FILE_SIZE: u64 = 1_048_576;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ExportData {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub subscriptions: Vec<Subscription>,
}

pub fn export_subscriptions(
    subscriptions: &[Subscription],
    now: DateTime<Utc>,
) -> Result<String, serde_json::Error> {
    let data = ExportData {
        version: EXPORT_VERSION.to_owned(),
        exported_at: now,
        subscriptions: subscriptions.to_vec(),
    };
    serde_json::to_string_pretty(&data)
}

/// `subscriptions_YYYY-MM-DD.json`, dated in local time.
pub fn export_filename(now: DateTime<Local>) -> String {
    format!("subscriptions_{}.json", now.format("%Y-%m-%d"))
}

/// Size and type checks happen before the file is read.
pub async fn read_import_file(path: &Path) -> Result<String, ImportError> {
    let metadata = tokio::fs::metadata(path).await.map_err(|e| {
        ImportError::with_details(ImportErrorCode::FileReadError, e.to_string())
    })?;
    if metadata.len() > MAX_IMPORT_FILE_SIZE {
        return Err(ImportError::with_details(
            ImportErrorCode::FileTooLarge,
            format!("{} bytes", metadata.len()),
        ));
    }

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if !is_json {
        return Err(ImportError::with_details(
            ImportErrorCode::InvalidFileType,
            path.display().to_string(),
        ));
    }

    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| ImportError::with_details(ImportErrorCode::FileReadError, e.to_string()))
}

fn missing(details: impl Into<String>) -> ImportError {
    ImportError::with_details(ImportErrorCode::MissingRequiredField, details)
}

fn schema(details: impl Into<String>) -> ImportError {
    ImportError::with_details(ImportErrorCode::InvalidSchema, details)
}

// Absent, null, false and "" all count as missing.
fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) | Some(Value::Bool(false)) => true,
        Some(Value::String(s)) => s.is_empty(),
        _ => false,
    }
}

fn optional_string(entry: &Value, field: &str, index: usize) -> Result<Option<String>, ImportError> {
    match entry.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(schema(format!("{field} must be null or string at index {index}"))),
    }
}

fn optional_time(entry: &Value, field: &str) -> Option<DateTime<Utc>> {
    entry
        .get(field)
        .and_then(Value::as_str)
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
}

fn validate_entry(entry: &Value, index: usize) -> Result<Subscription, ImportError> {
    if !entry.is_object() {
        return Err(schema(format!("subscription must be an object at index {index}")));
    }
    if is_blank(entry.get("url")) {
        return Err(missing(format!("url field is missing at index {index}")));
    }
    if is_blank(entry.get("status")) {
        return Err(missing(format!("status field is missing at index {index}")));
    }
    let url = entry
        .get("url")
        .and_then(Value::as_str)
        .ok_or_else(|| schema(format!("url must be a string at index {index}")))?;
    let status = match entry.get("status").and_then(Value::as_str) {
        Some("active") => SubscriptionStatus::Active,
        Some("error") => SubscriptionStatus::Error,
        _ => {
            return Err(schema(format!(
                "status must be \"active\" or \"error\" at index {index}"
            )))
        }
    };
    let title = optional_string(entry, "title", index)?;
    let custom_title = optional_string(entry, "customTitle", index)?;

    Ok(Subscription {
        id: entry
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_owned)
            .unwrap_or_else(|| Uuid::new_v4().to_string()),
        url: url.to_owned(),
        title,
        custom_title,
        subscribed_at: optional_time(entry, "subscribedAt").unwrap_or_else(Utc::now),
        last_fetched_at: optional_time(entry, "lastFetchedAt"),
        status,
    })
}

/// Parses and validates the contents of an export file.
pub fn parse_import(text: &str) -> Result<Vec<Subscription>, ImportError> {
    let data: Value = serde_json::from_str(text)
        .map_err(|e| schema(format!("invalid JSON: {e}")))?;
    if !data.is_object() {
        return Err(schema("export data must be a JSON object"));
    }

    if is_blank(data.get("version")) {
        return Err(missing("version field is missing"));
    }
    if is_blank(data.get("exportedAt")) {
        return Err(missing("exportedAt field is missing"));
    }
    let subscriptions = match data.get("subscriptions") {
        None => return Err(missing("subscriptions field is missing")),
        Some(Value::Array(items)) => items,
        Some(_) => return Err(schema("subscriptions must be an array")),
    };
    match data.get("version").and_then(Value::as_str) {
        Some(EXPORT_VERSION) => {}
        other => {
            let shown = other
                .map(str::to_owned)
                .unwrap_or_else(|| data["version"].to_string());
            return Err(ImportError::with_details(
                ImportErrorCode::InvalidVersion,
                format!("Unsupported version: {shown}"),
            ));
        }
    }

    subscriptions
        .iter()
        .enumerate()
        .map(|(index, entry)| validate_entry(entry, index))
        .collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeResult {
    pub added: Vec<Subscription>,
    pub skipped: usize,
}

/// Keeps imported feeds whose URL is new, giving each a fresh id and date.
///
/// URLs are compared after normalization, both against `existing` and against
/// entries earlier in the same import.
pub fn merge_subscriptions(existing: &[Subscription], imported: &[Subscription]) -> MergeResult {
    let mut known: HashSet<String> = existing.iter().map(|s| normalize_url(&s.url)).collect();
    let mut result = MergeResult::default();

    for sub in imported {
        if !known.insert(normalize_url(&sub.url)) {
            debug!(url = %sub.url, "skipping duplicate feed on import");
            result.skipped += 1;
            continue;
        }
        result.added.push(Subscription {
            id: Uuid::new_v4().to_string(),
            subscribed_at: Utc::now(),
            ..sub.clone()
        });
    }
    info!(added = result.added.len(), skipped = result.skipped, "merged imported subscriptions");
    result
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportSummary {
    pub added_count: usize,
    pub skipped_count: usize,
}

impl ImportSummary {
    pub fn message(&self) -> String {
        if self.skipped_count == 0 {
            format!("imported {} feeds", self.added_count)
        } else {
            format!(
                "imported {} feeds ({} duplicates skipped)",
                self.added_count, self.skipped_count
            )
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sub(url: &str) -> Subscription {
        Subscription::new(url, Some("Feed".into()))
    }

    fn export_json(subscriptions: Value) -> String {
        json!({
            "version": "1.0.0",
            "exportedAt": "2025-11-02T12:00:00.000Z",
            "subscriptions": subscriptions,
        })
        .to_string()
    }

    #[test]
    fn export_then_parse_keeps_feeds() {
        let subs = vec![sub("https://a.example/feed"), sub("https://b.example/feed")];
        let text = export_subscriptions(&subs, Utc::now()).unwrap();
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["version"], "1.0.0");
        assert_eq!(parse_import(&text).unwrap(), subs);
    }

    #[test]
    fn filename_uses_local_date() {
        let date = DateTime::parse_from_rfc3339("2025-11-02T12:00:00+00:00")
            .unwrap()
            .with_timezone(&Local);
        assert_eq!(
            export_filename(date),
            format!("subscriptions_{}.json", date.format("%Y-%m-%d"))
        );
        assert!(export_filename(date).starts_with("subscriptions_2025-11-0"));
    }

    #[test]
    fn rejects_non_json() {
        let err = parse_import("not json at all").unwrap_err();
        assert_eq!(err.code, ImportErrorCode::InvalidSchema);
    }

    #[test]
    fn rejects_missing_fields_and_bad_version() {
        let err = parse_import(r#"{"exportedAt":"x","subscriptions":[]}"#).unwrap_err();
        assert_eq!(err.code, ImportErrorCode::MissingRequiredField);
        assert_eq!(err.details.as_deref(), Some("version field is missing"));

        let err = parse_import(r#"{"version":"1.0.0","subscriptions":[]}"#).unwrap_err();
        assert_eq!(err.details.as_deref(), Some("exportedAt field is missing"));

        let err = parse_import(r#"{"version":"1.0.0","exportedAt":"x"}"#).unwrap_err();
        assert_eq!(err.details.as_deref(), Some("subscriptions field is missing"));

        let err = parse_import(r#"{"version":"1.0.0","exportedAt":"x","subscriptions":{}}"#).unwrap_err();
        assert_eq!(err.code, ImportErrorCode::InvalidSchema);

        let err = parse_import(r#"{"version":"2.0.0","exportedAt":"x","subscriptions":[]}"#).unwrap_err();
        assert_eq!(err.code, ImportErrorCode::InvalidVersion);
        assert_eq!(err.details.as_deref(), Some("Unsupported version: 2.0.0"));
    }

    #[test]
    fn rejects_bad_entries_with_index() {
        let err = parse_import(&export_json(json!([{ "status": "active" }]))).unwrap_err();
        assert_eq!(err.code, ImportErrorCode::MissingRequiredField);
        assert_eq!(err.details.as_deref(), Some("url field is missing at index 0"));

        let err = parse_import(&export_json(json!([
            { "url": "https://a.example/feed", "status": "active" },
            { "url": "https://b.example/feed", "status": "paused" }
        ])))
        .unwrap_err();
        assert_eq!(err.code, ImportErrorCode::InvalidSchema);
        assert!(err.details.unwrap().ends_with("index 1"));

        let err = parse_import(&export_json(json!([{ "url": 42, "status": "active" }]))).unwrap_err();
        assert_eq!(err.code, ImportErrorCode::InvalidSchema);

        let err = parse_import(&export_json(json!([
            { "url": "https://a.example/feed", "status": "active", "title": 7 }
        ])))
        .unwrap_err();
        assert_eq!(err.details.as_deref(), Some("title must be null or string at index 0"));
    }

    #[test]
    fn merge_skips_duplicate_urls() {
        let existing = vec![sub("https://a.example/feed"), sub("https://b.example/feed")];
        let imported = vec![
            sub("https://a.example/feed"),
            sub("https://c.example/feed"),
            sub("http://b.example/feed/"),
            sub("https://d.example/feed"),
            sub("https://e.example/feed"),
        ];
        let result = merge_subscriptions(&existing, &imported);
        assert_eq!(result.added.len(), 3);
        assert_eq!(result.skipped, 2);
        assert!(result.added.iter().all(|s| imported.iter().all(|i| i.id != s.id)));
    }

    #[test]
    fn merge_skips_repeats_within_the_batch() {
        let imported = vec![sub("https://a.example/feed"), sub("https://a.example/feed")];
        let result = merge_subscriptions(&[], &imported);
        assert_eq!(result.added.len(), 1);
        assert_eq!(result.skipped, 1);
    }

    #[tokio::test]
    async fn file_checks_run_before_reading() {
        let dir = tempfile::tempdir().unwrap();

        let big = dir.path().join("big.json");
        tokio::fs::write(&big, vec![b' '; (MAX_IMPORT_FILE_SIZE + 1) as usize]).await.unwrap();
        assert_eq!(read_import_file(&big).await.unwrap_err().code, ImportErrorCode::FileTooLarge);

        let txt = dir.path().join("feeds.txt");
        tokio::fs::write(&txt, "{}").await.unwrap();
        assert_eq!(read_import_file(&txt).await.unwrap_err().code, ImportErrorCode::InvalidFileType);

        let absent = dir.path().join("absent.json");
        assert_eq!(read_import_file(&absent).await.unwrap_err().code, ImportErrorCode::FileReadError);

        let ok = dir.path().join("ok.json");
        tokio::fs::write(&ok, "{}").await.unwrap();
        assert_eq!(read_import_file(&ok).await.unwrap(), "{}");
    }
}
