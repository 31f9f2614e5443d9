//! Voter verification state machine.
//!
//! ```text
//! id-verification -> phone-verification -> sms-otp -> verified
//!        ^                  |    ^            |  ^
//!        +------ back ------+    +--- back ---+  +-- resend
//! ```
//!
//! Each [`VerificationEvent`] is valid in exactly one state (`Back` in two).
//! Any other pairing is rejected, so a code can never be checked before the
//! phone number matched. On error the caller stays in its current state.

use std::fmt;
use std::sync::Arc;

use ballot_common::{AppError, AppResult};
use ballot_db::ElectionStore;
use serde::{Deserialize, Serialize};

use super::identity::{RECORD_INCOMPLETE, require_eligible_student};
use super::otp::OtpService;
use super::phone::{mask_phone, normalize_phone};

pub const ENTER_STUDENT_ID: &str = "Please enter your student ID.";
pub const ENTER_PHONE: &str = "Please enter your phone number.";
pub const ENTER_CODE: &str = "Please enter the 6-digit verification code.";
pub const PHONE_MISMATCH: &str =
    "Phone number does not match our records. Please check and try again.";
pub const STUDENT_FOUND: &str = "Student ID verified. Please confirm your phone number.";
pub const VERIFIED: &str = "Verification successful.";

/// Where a voter is in the verification flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum VerificationState {
    IdVerification,
    PhoneVerification {
        student_id: String,
        masked_phone: String,
    },
    SmsOtp {
        student_id: String,
        masked_phone: String,
        /// Advisory client countdown; the server enforces its own limits.
        resend_after: u64,
    },
    Verified {
        student_id: String,
        name: String,
    },
}

impl VerificationState {
    /// Short name of the step.
    #[must_use]
    pub const fn step(&self) -> &'static str {
        match self {
            Self::IdVerification => "id-verification",
            Self::PhoneVerification { .. } => "phone-verification",
            Self::SmsOtp { .. } => "sms-otp",
            Self::Verified { .. } => "verified",
        }
    }
}

/// Input that moves the flow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationEvent {
    SubmitStudentId(String),
    SubmitPhone(String),
    SubmitCode(String),
    Resend,
    Back,
}

impl fmt::Display for VerificationEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::SubmitStudentId(_) => "Submitting a student ID",
            Self::SubmitPhone(_) => "Submitting a phone number",
            Self::SubmitCode(_) => "Submitting a code",
            Self::Resend => "Resending a code",
            Self::Back => "Going back",
        })
    }
}

/// Next state plus a message for the voter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Transition {
    pub state: VerificationState,
    pub message: Option<String>,
}

impl Transition {
    fn to(state: VerificationState) -> Self {
        Self {
            state,
            message: None,
        }
    }

    fn with_message(state: VerificationState, message: impl Into<String>) -> Self {
        Self {
            state,
            message: Some(message.into()),
        }
    }
}

/// Drives [`VerificationState`] transitions.
#[derive(Clone)]
pub struct VerificationFlow {
    store: Arc<dyn ElectionStore>,
    otp: OtpService,
}

impl VerificationFlow {
    /// Create a new verification flow.
    #[must_use]
    pub fn new(store: Arc<dyn ElectionStore>, otp: OtpService) -> Self {
        Self { store, otp }
    }

    /// The OTP service behind the flow.
    #[must_use]
    pub const fn otp(&self) -> &OtpService {
        &self.otp
    }

    /// Apply one event.
    pub async fn apply(
        &self,
        state: &VerificationState,
        event: VerificationEvent,
    ) -> AppResult<Transition> {
        use VerificationEvent as E;
        use VerificationState as S;

        match (state, event) {
            (S::IdVerification, E::SubmitStudentId(raw)) => self.submit_student_id(&raw).await,
            (S::PhoneVerification { student_id, .. }, E::SubmitPhone(phone)) => {
                self.submit_phone(student_id, &phone).await
            }
            (S::SmsOtp { student_id, .. }, E::SubmitCode(code)) => {
                self.submit_code(student_id, &code).await
            }
            (
                S::SmsOtp {
                    student_id,
                    masked_phone,
                    ..
                },
                E::Resend,
            ) => self.send_code(student_id, masked_phone).await,
            (S::PhoneVerification { .. }, E::Back) => Ok(Transition::to(S::IdVerification)),
            (
                S::SmsOtp {
                    student_id,
                    masked_phone,
                    ..
                },
                E::Back,
            ) => Ok(Transition::to(S::PhoneVerification {
                student_id: student_id.clone(),
                masked_phone: masked_phone.clone(),
            })),
            (state, event) => Err(AppError::BadRequest(format!(
                "{event} is not allowed during {}.",
                state.step()
            ))),
        }
    }

    async fn submit_student_id(&self, raw: &str) -> AppResult<Transition> {
        if raw.trim().is_empty() {
            return Err(AppError::Validation(ENTER_STUDENT_ID.to_string()));
        }

        let student = require_eligible_student(self.store.as_ref(), raw).await?;
        if !student.is_complete() {
            return Err(AppError::Validation(RECORD_INCOMPLETE.to_string()));
        }
        let masked_phone = mask_phone(student.phone.as_deref().unwrap_or_default());

        tracing::debug!(student_id = %student.student_id, "Student ID accepted");
        Ok(Transition::with_message(
            VerificationState::PhoneVerification {
                student_id: student.student_id,
                masked_phone,
            },
            STUDENT_FOUND,
        ))
    }

    async fn submit_phone(&self, student_id: &str, phone: &str) -> AppResult<Transition> {
        let entered = normalize_phone(phone);
        if entered.is_empty() {
            return Err(AppError::Validation(ENTER_PHONE.to_string()));
        }

        let student = require_eligible_student(self.store.as_ref(), student_id).await?;
        let stored = normalize_phone(student.phone.as_deref().unwrap_or_default());
        if stored.is_empty() || entered != stored {
            tracing::debug!(student_id = %student_id, "Phone number mismatch");
            return Err(AppError::Validation(PHONE_MISMATCH.to_string()));
        }

        self.send_code(&student.student_id, &mask_phone(&stored)).await
    }

    async fn send_code(&self, student_id: &str, masked_phone: &str) -> AppResult<Transition> {
        let issued = self.otp.issue(student_id).await?;
        Ok(Transition::with_message(
            VerificationState::SmsOtp {
                student_id: student_id.to_string(),
                masked_phone: masked_phone.to_string(),
                resend_after: issued.resend_after,
            },
            issued.message,
        ))
    }

    async fn submit_code(&self, student_id: &str, code: &str) -> AppResult<Transition> {
        let code = code.trim();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Err(AppError::Validation(ENTER_CODE.to_string()));
        }

        self.otp.verify(student_id, code).await?;
        let student = require_eligible_student(self.store.as_ref(), student_id).await?;

        tracing::info!(student_id = %student.student_id, "Voter verified");
        Ok(Transition::with_message(
            VerificationState::Verified {
                student_id: student.student_id,
                name: student.name.unwrap_or_default(),
            },
            VERIFIED,
        ))
    }
}
