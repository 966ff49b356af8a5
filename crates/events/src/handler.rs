/// Execute an aggregate command in place: decide, then evolve.
///
/// No persistence and no publication; the infra `CommandDispatcher` wraps the
/// same two steps with loading, appending and publishing. Used by domain tests
/// to drive an aggregate through its lifecycle.
pub fn execute<A>(aggregate: &mut A, command: &A::Command) -> Result<Vec<A::Event>, A::Error>
where
    A: deliverynote_core::Aggregate,
{
    let events = A::handle(aggregate, command)?;
    for ev in &events {
        A::apply(aggregate, ev);
    }
    Ok(events)
}
