//! Database repositories.

mod category;
mod sms_otp;
mod student;
mod vote;
mod voting_status;

pub use category::{CandidateRepository, VotingCategoryRepository};
pub use sms_otp::SmsOtpRepository;
pub use student::{DetailsInsert, StudentDetailsRepository, StudentRepository};
pub use vote::{CandidateTally, VoteInsert, VoteRepository};
pub use voting_status::VotingStatusRepository;
