pub mod json_snapshot_store;

pub use json_snapshot_store::JsonSnapshotStore;
