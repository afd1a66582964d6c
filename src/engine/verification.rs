//! Per-record verification workflow.
//!
//! ```text
//! pending ──verify──▶ verified
//!    │                   ▲
//!    └──reject──▶ rejected ──verify──┘
//! ```
//!
//! `verified → rejected` is refused. Re-applying the current state is a no-op.

use sqlx::SqlitePool;

use crate::db::{StoreError, VerificationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckKind {
    Daily,
    Weekly,
}

impl CheckKind {
    fn table(&self) -> &'static str {
        match self {
            CheckKind::Daily => "daily_checks",
            CheckKind::Weekly => "weekly_checks",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CheckKind::Daily => "Daily check",
            CheckKind::Weekly => "Weekly check",
        }
    }
}

/// States from which a record may move to `target`
pub fn allowed_sources(target: VerificationStatus) -> &'static [VerificationStatus] {
    match target {
        VerificationStatus::Verified => &[VerificationStatus::Pending, VerificationStatus::Rejected],
        VerificationStatus::Rejected => &[VerificationStatus::Pending],
        VerificationStatus::Pending => &[],
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied,
    Unchanged,
}

/// Apply a verification transition to one record.
///
/// The state change and the verifier fields are written by one UPDATE
/// guarded on the current state; when it matches no row the record is
/// re-read to tell a missing record, a no-op and a refused move apart.
pub async fn transition(
    db: &SqlitePool,
    kind: CheckKind,
    id: &str,
    target: VerificationStatus,
    verifier_id: &str,
    comment: Option<&str>,
) -> Result<TransitionOutcome, StoreError> {
    let sources = allowed_sources(target);
    if !sources.is_empty() {
        let placeholders = vec!["?"; sources.len()].join(", ");
        let sql = format!(
            "UPDATE {} SET verification_status = ?, verified_by = ?, verified_at = ?, verification_comment = ? \
             WHERE id = ? AND verification_status IN ({})",
            kind.table(),
            placeholders
        );

        let mut query = sqlx::query(&sql)
            .bind(target)
            .bind(verifier_id)
            .bind(chrono::Utc::now().to_rfc3339())
            .bind(comment)
            .bind(id);
        for source in sources {
            query = query.bind(*source);
        }

        if query.execute(db).await?.rows_affected() > 0 {
            tracing::info!(
                kind = kind.label(),
                id = id,
                to = %target,
                verifier = verifier_id,
                "Check verification status changed"
            );
            return Ok(TransitionOutcome::Applied);
        }
    }

    let sql = format!("SELECT verification_status FROM {} WHERE id = ?", kind.table());
    let current: Option<VerificationStatus> = sqlx::query_scalar(&sql)
        .bind(id)
        .fetch_optional(db)
        .await?;

    match current {
        None => Err(StoreError::NotFound(kind.label())),
        Some(current) if current == target => Ok(TransitionOutcome::Unchanged),
        Some(current) => Err(StoreError::InvalidTransition {
            from: current.to_string(),
            to: target.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::fixture;
    use crate::db::{
        CheckStatus, CreateWeeklyCheckRequest, DailyCheck, NewDailyCheck, NewWeeklyCheck, WeeklyCheck,
    };

    async fn submitted(db: &SqlitePool, f: &crate::db::test_support::Fixture) -> DailyCheck {
        DailyCheck::upsert(
            db,
            NewDailyCheck {
                database_id: &f.database_id,
                check_type_id: &f.daily_check_type_id,
                check_date: "2024-03-01",
                status: CheckStatus::Pass,
                value: None,
                comment: None,
                submitted_by: &f.user_id,
            },
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_reject_then_verify() {
        let (db, f) = fixture().await;
        let record = submitted(&db, &f).await;

        let outcome = transition(
            &db,
            CheckKind::Daily,
            &record.id,
            VerificationStatus::Rejected,
            &f.admin_id,
            Some("value missing"),
        )
        .await
        .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied);

        transition(&db, CheckKind::Daily, &record.id, VerificationStatus::Verified, &f.admin_id, None)
            .await
            .unwrap();

        let record = DailyCheck::find_by_id(&db, &record.id).await.unwrap().unwrap();
        assert_eq!(record.verification_status, VerificationStatus::Verified);
        assert_eq!(record.verified_by.as_deref(), Some(f.admin_id.as_str()));
        assert!(record.verified_at.is_some());
        assert!(record.verification_comment.is_none());
    }

    #[tokio::test]
    async fn test_weekly_reject_then_verify() {
        let (db, f) = fixture().await;
        let payload = CreateWeeklyCheckRequest {
            database_id: f.database_id.clone(),
            week_number: Some(10),
            year: Some(2024),
            status: CheckStatus::Warning,
            production_db_size: None,
            archive_db_size: None,
            invalid_objects: Some(3),
            instance_start_date: None,
            schema_sizes: Default::default(),
            tablespaces: vec![],
            objects_created: vec![],
            comment: None,
        };
        let record = WeeklyCheck::upsert(
            &db,
            NewWeeklyCheck {
                database_id: &f.database_id,
                week_number: 10,
                year: 2024,
                week_start_date: "2024-03-04",
                submitted_by: &f.user_id,
                payload: &payload,
            },
        )
        .await
        .unwrap();

        transition(
            &db,
            CheckKind::Weekly,
            &record.id,
            VerificationStatus::Rejected,
            &f.admin_id,
            Some("invalid objects not explained"),
        )
        .await
        .unwrap();
        let rejected = WeeklyCheck::find_by_id(&db, &record.id).await.unwrap().unwrap();
        assert_eq!(rejected.verification_status, VerificationStatus::Rejected);
        assert_eq!(rejected.verification_comment.as_deref(), Some("invalid objects not explained"));

        let outcome = transition(&db, CheckKind::Weekly, &record.id, VerificationStatus::Verified, &f.admin_id, None)
            .await
            .unwrap();
        assert_eq!(outcome, TransitionOutcome::Applied);

        let verified = WeeklyCheck::find_by_id(&db, &record.id).await.unwrap().unwrap();
        assert_eq!(verified.verification_status, VerificationStatus::Verified);
        assert_eq!(verified.verified_by.as_deref(), Some(f.admin_id.as_str()));
        assert!(verified.verification_comment.is_none());

        let err = transition(&db, CheckKind::Weekly, &record.id, VerificationStatus::Rejected, &f.admin_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));
    }

    #[tokio::test]
    async fn test_verified_cannot_be_rejected() {
        let (db, f) = fixture().await;
        let record = submitted(&db, &f).await;
        transition(&db, CheckKind::Daily, &record.id, VerificationStatus::Verified, &f.admin_id, None)
            .await
            .unwrap();

        let err = transition(&db, CheckKind::Daily, &record.id, VerificationStatus::Rejected, &f.admin_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidTransition { .. }));

        let again = transition(&db, CheckKind::Daily, &record.id, VerificationStatus::Verified, &f.admin_id, None)
            .await
            .unwrap();
        assert_eq!(again, TransitionOutcome::Unchanged);
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let (db, f) = fixture().await;
        let err = transition(&db, CheckKind::Weekly, "missing", VerificationStatus::Verified, &f.admin_id, None)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound("Weekly check")));
    }

    #[test]
    fn test_allowed_sources() {
        assert!(allowed_sources(VerificationStatus::Verified).contains(&VerificationStatus::Rejected));
        assert!(!allowed_sources(VerificationStatus::Rejected).contains(&VerificationStatus::Verified));
        assert!(allowed_sources(VerificationStatus::Pending).is_empty());
    }
}
