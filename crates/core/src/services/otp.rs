//! One-time code issuance and verification.
//!
//! Issuance runs its checks in a fixed order: the student is resolved,
//! earlier unused codes are invalidated, then the per-student cooldown and rolling hourly cap are
//! applied, and only then is a code generated, stored and sent. A code whose
//! delivery is refused is burned immediately.

use std::sync::Arc;

use ballot_common::{AppError, AppResult, IdGenerator, config::OtpConfig};
use ballot_db::{ElectionStore, entities::sms_otp};
use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::Serialize;

use super::identity::{ALREADY_VOTED, RECORD_INCOMPLETE, canonical_student_id, require_student};
use super::sms::{SmsDelivery, SmsSender};

pub const CODE_SENT: &str = "Verification code sent to your phone number.";
pub const INVALID_CODE: &str = "Invalid or expired verification code. Please try again.";
pub const HOURLY_LIMIT_REACHED: &str =
    "Too many OTP requests. Please try again after 1 hour or contact support.";
pub const SEND_FAILED: &str = "Failed to send SMS verification code. Please try again.";

/// Issuance limits.
#[derive(Debug, Clone)]
pub struct OtpPolicy {
    /// Minimum time between two codes for one student.
    pub cooldown: Duration,
    /// Codes allowed per rolling window.
    pub hourly_limit: u64,
    /// Rolling window for `hourly_limit`.
    pub window: Duration,
    /// Code lifetime.
    pub ttl: Duration,
    /// How long expired codes are kept.
    pub retention: Duration,
}

impl From<&OtpConfig> for OtpPolicy {
    fn from(config: &OtpConfig) -> Self {
        Self {
            cooldown: Duration::seconds(config.cooldown_secs),
            hourly_limit: config.hourly_limit,
            window: Duration::seconds(config.window_secs),
            ttl: Duration::seconds(config.ttl_secs),
            retention: Duration::seconds(config.retention_secs),
        }
    }
}

impl Default for OtpPolicy {
    fn default() -> Self {
        Self::from(&OtpConfig::default())
    }
}

/// Result of a successful issuance.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedOtp {
    /// User-facing confirmation.
    pub message: String,
    /// Seconds before another code may be requested.
    pub resend_after: u64,
    /// When the code stops verifying.
    pub expires_at: DateTime<Utc>,
    #[serde(skip)]
    pub delivery: SmsDelivery,
}

/// Generate a uniformly random six-digit code.
#[must_use]
pub fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}

/// Issues and verifies SMS one-time codes.
#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn ElectionStore>,
    sms: Arc<dyn SmsSender>,
    policy: OtpPolicy,
    id_gen: IdGenerator,
}

impl OtpService {
    /// Create a new OTP service.
    #[must_use]
    pub fn new(store: Arc<dyn ElectionStore>, sms: Arc<dyn SmsSender>, policy: OtpPolicy) -> Self {
        Self {
            store,
            sms,
            policy,
            id_gen: IdGenerator::new(),
        }
    }

    /// The limits this service enforces.
    #[must_use]
    pub const fn policy(&self) -> &OtpPolicy {
        &self.policy
    }

    /// Issue a fresh code to the student's registered phone.
    ///
    /// Codes are keyed by the student ID exactly as stored, so limits and
    /// verification see the same rows whatever casing the caller typed.
    pub async fn issue(&self, student_id: &str) -> AppResult<IssuedOtp> {
        let student = require_student(self.store.as_ref(), student_id).await?;
        let student_id = student.student_id.as_str();
        let now = Utc::now();

        let invalidated = self.store.invalidate_unused_otps(student_id).await?;
        if invalidated > 0 {
            tracing::debug!(student_id = %student_id, invalidated, "Invalidated earlier codes");
        }

        self.check_cooldown(student_id, now).await?;
        self.check_hourly_limit(student_id, now).await?;

        if student.has_voted {
            return Err(AppError::Conflict(ALREADY_VOTED.to_string()));
        }
        let phone = student
            .phone
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AppError::Validation(RECORD_INCOMPLETE.to_string()))?;

        let code = generate_code();
        let expires_at = now + self.policy.ttl;
        let record = self
            .store
            .insert_otp(sms_otp::Model {
                id: self.id_gen.generate(),
                student_id: student_id.to_string(),
                phone: phone.clone(),
                otp_code: code.clone(),
                created_at: now.into(),
                expires_at: expires_at.into(),
                used: false,
            })
            .await?;

        // An unreachable gateway still lets the student continue.
        let delivery = match self.sms.send_otp(&phone, &code).await {
            Ok(delivery) => delivery,
            Err(e) => {
                tracing::warn!(student_id = %student_id, error = %e, "SMS gateway unreachable");
                SmsDelivery::Fallback
            }
        };

        if !delivery.is_success() {
            self.store.mark_otp_used(&record.id).await?;
            tracing::warn!(
                student_id = %student_id,
                otp_id = %record.id,
                delivery = ?delivery,
                "SMS delivery refused, code burned"
            );
            return Err(AppError::ExternalService(SEND_FAILED.to_string()));
        }

        tracing::info!(
            student_id = %student_id,
            otp_id = %record.id,
            delivery = ?delivery,
            "Verification code issued"
        );

        Ok(IssuedOtp {
            message: CODE_SENT.to_string(),
            resend_after: self.policy.cooldown.num_seconds().max(0) as u64,
            expires_at,
            delivery,
        })
    }

    /// Check a submitted code. Success consumes it.
    ///
    /// Wrong, expired and already used codes fail with the same message,
    /// as does an unknown student.
    pub async fn verify(&self, student_id: &str, code: &str) -> AppResult<()> {
        let invalid = || AppError::Validation(INVALID_CODE.to_string());

        let Some(student) = self
            .store
            .find_student(&canonical_student_id(student_id))
            .await?
        else {
            return Err(invalid());
        };
        let student_id = student.student_id.as_str();

        let Some(record) = self
            .store
            .find_active_otp(student_id, code.trim(), Utc::now())
            .await?
        else {
            tracing::debug!(student_id = %student_id, "No matching active code");
            return Err(invalid());
        };

        if !self.store.mark_otp_used(&record.id).await? {
            return Err(invalid());
        }

        tracing::info!(student_id = %student_id, otp_id = %record.id, "Verification code accepted");
        Ok(())
    }

    /// Delete codes that expired longer ago than the retention period.
    pub async fn purge_stale(&self) -> AppResult<u64> {
        let purged = self.store.purge_otps(Utc::now() - self.policy.retention).await?;
        if purged > 0 {
            tracing::info!(purged, "Purged stale verification codes");
        }
        Ok(purged)
    }

    async fn check_cooldown(&self, student_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        let recent = self
            .store
            .recent_otps(student_id, now - self.policy.cooldown)
            .await?;
        let Some(last) = recent.first() else {
            return Ok(());
        };

        let elapsed_ms = (now - last.created_at.with_timezone(&Utc))
            .num_milliseconds()
            .max(0);
        let elapsed_secs = (elapsed_ms + 999) / 1000;
        let wait = self.policy.cooldown.num_seconds() - elapsed_secs;

        if wait > 0 {
            tracing::debug!(student_id = %student_id, wait, "OTP cooldown active");
            return Err(AppError::RateLimited {
                message: format!("Please wait {wait} seconds before requesting another OTP."),
                retry_after: Some(wait as u64),
            });
        }
        Ok(())
    }

    async fn check_hourly_limit(&self, student_id: &str, now: DateTime<Utc>) -> AppResult<()> {
        let issued = self
            .store
            .recent_otps(student_id, now - self.policy.window)
            .await?
            .len() as u64;

        if issued >= self.policy.hourly_limit {
            tracing::info!(student_id = %student_id, issued, "OTP hourly limit reached");
            return Err(AppError::RateLimited {
                message: HOURLY_LIMIT_REACHED.to_string(),
                retry_after: None,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use ballot_db::test_utils::{MemoryStore, sample_student};
    use std::sync::Mutex;

    /// Records every send; optionally rejects.
    #[derive(Default)]
    pub(crate) struct RecordingSms {
        pub sent: Mutex<Vec<(String, String)>>,
        pub reject: bool,
        pub unreachable: bool,
    }

    impl RecordingSms {
        pub(crate) fn last_code(&self) -> Option<String> {
            self.sent.lock().unwrap().last().map(|(_, code)| code.clone())
        }

        pub(crate) fn count(&self) -> usize {
            self.sent.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl SmsSender for RecordingSms {
        async fn send_otp(&self, phone: &str, code: &str) -> AppResult<SmsDelivery> {
            self.sent
                .lock()
                .unwrap()
                .push((phone.to_string(), code.to_string()));
            if self.unreachable {
                Err(AppError::ExternalService("connection refused".to_string()))
            } else if self.reject {
                Ok(SmsDelivery::Rejected("Insufficient balance".to_string()))
            } else {
                Ok(SmsDelivery::Sent)
            }
        }
    }

    async fn setup(reject: bool) -> (Arc<MemoryStore>, Arc<RecordingSms>, OtpService) {
        let store = Arc::new(MemoryStore::new());
        store.add_student(sample_student("01200644D", "0241234567")).await;
        let sms = Arc::new(RecordingSms {
            reject,
            ..RecordingSms::default()
        });
        let service = OtpService::new(store.clone(), sms.clone(), OtpPolicy::default());
        (store, sms, service)
    }

    fn assert_wait_message(err: &AppError) {
        match err {
            AppError::RateLimited {
                message,
                retry_after: Some(wait),
            } => {
                assert!(*wait > 0 && *wait <= 120, "wait was {wait}");
                assert_eq!(
                    message,
                    &format!("Please wait {wait} seconds before requesting another OTP.")
                );
            }
            other => panic!("expected cooldown error, got {other:?}"),
        }
    }

    #[test]
    fn test_generate_code_is_six_digits() {
        for _ in 0..200 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[tokio::test]
    async fn test_issue_stores_then_sends() {
        let (store, sms, service) = setup(false).await;

        let issued = service.issue("01200644D").await.unwrap();

        assert_eq!(issued.message, CODE_SENT);
        assert_eq!(issued.resend_after, 120);
        let otps = store.otps_for("01200644D").await;
        assert_eq!(otps.len(), 1);
        assert!(!otps[0].used);
        assert_eq!(sms.last_code(), Some(otps[0].otp_code.clone()));
        let ttl = otps[0].expires_at - otps[0].created_at;
        assert_eq!(ttl.num_seconds(), 600);
    }

    #[tokio::test]
    async fn test_issue_within_cooldown_fails_with_wait() {
        let (_store, sms, service) = setup(false).await;

        service.issue("01200644d").await.unwrap();
        let err = service.issue("01200644d").await.unwrap_err();

        assert_wait_message(&err);
        assert_eq!(sms.count(), 1);
    }

    #[tokio::test]
    async fn test_cooldown_wait_reflects_elapsed_time() {
        let (store, _sms, service) = setup(false).await;

        service.issue("01200644d").await.unwrap();
        store.backdate_otps("01200644D", 100).await;

        match service.issue("01200644d").await.unwrap_err() {
            AppError::RateLimited {
                retry_after: Some(wait),
                ..
            } => assert!((19..=20).contains(&wait), "wait was {wait}"),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fourth_code_in_window_is_refused() {
        let (store, sms, service) = setup(false).await;

        for _ in 0..3 {
            service.issue("01200644d").await.unwrap();
            store.backdate_otps("01200644D", 121).await;
        }
        let err = service.issue("01200644d").await.unwrap_err();

        assert!(matches!(
            err,
            AppError::RateLimited { ref message, retry_after: None } if message == HOURLY_LIMIT_REACHED
        ));
        assert_eq!(sms.count(), 3);
    }

    #[tokio::test]
    async fn test_window_rolls_over() {
        let (store, _sms, service) = setup(false).await;

        for _ in 0..3 {
            service.issue("01200644d").await.unwrap();
            store.backdate_otps("01200644D", 1300).await;
        }
        // The first code is now 3900s old and outside the window.
        assert!(service.issue("01200644d").await.is_ok());
    }

    #[tokio::test]
    async fn test_new_code_supersedes_old() {
        let (store, sms, service) = setup(false).await;

        service.issue("01200644d").await.unwrap();
        let first = sms.last_code().unwrap();
        store.backdate_otps("01200644D", 121).await;
        service.issue("01200644d").await.unwrap();
        let second = sms.last_code().unwrap();

        if first != second {
            assert!(service.verify("01200644d", &first).await.is_err());
        }
        assert!(service.verify("01200644d", &second).await.is_ok());
    }

    #[tokio::test]
    async fn test_verify_is_single_use() {
        let (_store, sms, service) = setup(false).await;

        service.issue("01200644d").await.unwrap();
        let code = sms.last_code().unwrap();

        service.verify("01200644D", &format!(" {code} ")).await.unwrap();
        let err = service.verify("01200644d", &code).await.unwrap_err();
        assert_eq!(err.to_string(), INVALID_CODE);
    }

    #[tokio::test]
    async fn test_verify_rejects_expired_code() {
        let (store, sms, service) = setup(false).await;

        service.issue("01200644d").await.unwrap();
        let code = sms.last_code().unwrap();
        store.backdate_otps("01200644D", 601).await;

        assert!(matches!(
            service.verify("01200644d", &code).await,
            Err(AppError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_verify_rejects_wrong_code() {
        let (_store, sms, service) = setup(false).await;

        service.issue("01200644d").await.unwrap();
        let code = sms.last_code().unwrap();
        let wrong = if code == "123456" { "654321" } else { "123456" };

        assert!(service.verify("01200644d", wrong).await.is_err());
        assert!(service.verify("01200644d", &code).await.is_ok());
    }

    #[tokio::test]
    async fn test_rejected_delivery_burns_code() {
        let (store, sms, service) = setup(true).await;

        let err = service.issue("01200644d").await.unwrap_err();
        assert!(matches!(err, AppError::ExternalService(_)));

        let otps = store.otps_for("01200644D").await;
        assert_eq!(otps.len(), 1);
        assert!(otps[0].used);
        let code = sms.last_code().unwrap();
        assert!(service.verify("01200644d", &code).await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_gateway_falls_back() {
        let store = Arc::new(MemoryStore::new());
        store.add_student(sample_student("01200644D", "0241234567")).await;
        let sms = Arc::new(RecordingSms {
            unreachable: true,
            ..RecordingSms::default()
        });
        let service = OtpService::new(store.clone(), sms.clone(), OtpPolicy::default());

        let issued = service.issue("01200644d").await.unwrap();

        assert_eq!(issued.delivery, SmsDelivery::Fallback);
        let otps = store.otps_for("01200644D").await;
        assert_eq!(otps.len(), 1);
        assert!(!otps[0].used);
        let code = sms.last_code().unwrap();
        assert!(service.verify("01200644d", &code).await.is_ok());
    }

    #[tokio::test]
    async fn test_limits_apply_to_stored_id_casing() {
        let store = Arc::new(MemoryStore::new());
        store.add_student(sample_student("AB1234CD", "0241234567")).await;
        let sms = Arc::new(RecordingSms::default());
        let service = OtpService::new(store.clone(), sms.clone(), OtpPolicy::default());

        service.issue("ab1234cd").await.unwrap();
        assert_wait_message(&service.issue(" Ab1234Cd ").await.unwrap_err());
        assert_eq!(sms.count(), 1);

        let otps = store.otps_for("AB1234CD").await;
        assert_eq!(otps.len(), 1);
        assert_eq!(otps[0].student_id, "AB1234CD");

        let code = sms.last_code().unwrap();
        service.verify("ab1234cd", &code).await.unwrap();
        assert!(store.otps_for("AB1234CD").await[0].used);
    }

    #[tokio::test]
    async fn test_verify_unknown_student() {
        let (_store, sms, service) = setup(false).await;

        service.issue("01200644d").await.unwrap();
        let code = sms.last_code().unwrap();

        let err = service.verify("99999999X", &code).await.unwrap_err();
        assert_eq!(err.to_string(), INVALID_CODE);
    }

    #[tokio::test]
    async fn test_voted_student_gets_no_code() {
        let (store, sms, service) = setup(false).await;
        let mut student = sample_student("01200644D", "0241234567");
        student.has_voted = true;
        store.add_student(student).await;

        let err = service.issue("01200644d").await.unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(sms.count(), 0);
        assert!(store.otps_for("01200644D").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_student() {
        let (_store, sms, service) = setup(false).await;

        assert!(matches!(
            service.issue("99999999X").await,
            Err(AppError::NotFound(_))
        ));
        assert_eq!(sms.count(), 0);
    }

    #[tokio::test]
    async fn test_store_failure_fails_closed() {
        let (store, sms, service) = setup(false).await;
        store.set_failing(true);

        let err = service.issue("01200644d").await.unwrap_err();

        assert!(err.is_server_error());
        assert_eq!(sms.count(), 0);
    }

    #[tokio::test]
    async fn test_purge_keeps_recent_codes() {
        let (store, _sms, service) = setup(false).await;

        service.issue("01200644d").await.unwrap();
        store.backdate_otps("01200644D", 200_000).await;
        service.issue("01200644d").await.unwrap();

        assert_eq!(service.purge_stale().await.unwrap(), 1);
        assert_eq!(store.otps_for("01200644D").await.len(), 1);
    }
}
