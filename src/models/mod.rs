pub mod approval;
pub mod status;
