//! Task lifecycle state
//!
//! `TaskStatus` tracks where a frontier task is in its lifecycle:
//! `pending → inprogress → {done | ignored | retry_later | failed}`, with
//! `retry_later` and abandoned `inprogress` tasks becoming claimable again.

mod task_status;

pub use task_status::TaskStatus;
