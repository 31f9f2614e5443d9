//! Business logic services.

#![allow(missing_docs)]

pub mod ballot;
pub mod identity;
pub mod otp;
pub mod phone;
pub mod results;
pub mod session;
pub mod sms;
pub mod student_details;
pub mod verification;
pub mod voting_status;

pub use ballot::{Ballot, BallotProgress, BallotService, Confirmation, VoteReceipt};
pub use otp::{IssuedOtp, OtpPolicy, OtpService};
pub use phone::{mask_phone, normalize_phone};
pub use results::{Dashboard, ResultsService, TurnoutBreakdown};
pub use session::{SessionSigner, VerifiedVoter};
pub use sms::{MnotifySms, SimulatedSms, SmsDelivery, SmsSender, sender_from_config};
pub use student_details::{StudentDetailsService, StudentProfile};
pub use verification::{Transition, VerificationEvent, VerificationFlow, VerificationState};
pub use voting_status::{VotingGate, VotingStatusView};
