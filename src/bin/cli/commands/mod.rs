pub mod add;
pub mod backup;
pub mod due;
pub mod edit;
pub mod list;
pub mod note;
pub mod progress;
pub mod remove;
pub mod review;
pub mod search;
pub mod show;
pub mod stats;
pub mod tags;
