pub mod init;
pub mod run_stage;
pub mod validate_plan;
