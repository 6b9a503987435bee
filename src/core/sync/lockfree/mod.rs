/*!
 * Lock-Free Primitives
 *
 * - `SnapshotCell`: RCU-style publication of immutable snapshots
 */

mod snapshot;

pub use snapshot::SnapshotCell;
