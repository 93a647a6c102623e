pub mod raw_record;
pub mod reconciler;
