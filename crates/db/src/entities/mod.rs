//! Database entities.

pub mod candidate;
pub mod sms_otp;
pub mod student;
pub mod student_details;
pub mod vote;
pub mod voting_category;
pub mod voting_status;

pub use candidate::Entity as Candidate;
pub use sms_otp::Entity as SmsOtp;
pub use student::Entity as Student;
pub use student_details::Entity as StudentDetails;
pub use vote::Entity as Vote;
pub use voting_category::Entity as VotingCategory;
pub use voting_status::Entity as VotingStatus;
