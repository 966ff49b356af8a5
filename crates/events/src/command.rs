use deliverynote_core::AggregateId;

/// A command targets exactly one aggregate instance.
///
/// Commands are intent ("save delivery 42"); events are the facts the aggregate
/// accepts in response. Commands own all their data so they can be logged,
/// queued and retried across threads.
pub trait Command: Clone + core::fmt::Debug + Send + Sync + 'static {
    fn target_aggregate_id(&self) -> AggregateId;
}
