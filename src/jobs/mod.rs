pub mod download;
pub mod mention;

pub use download::{DownloadJob, ListingSource};
pub use mention::MentionJob;
