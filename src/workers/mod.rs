pub mod result_listener;
pub mod storage_sweeper;
