//! Entity trait: identity + continuity across state changes.

/// Catalog records (parties, products, taxes) and delivery lines are entities:
/// two values with the same id are the same record, whatever their fields say.
pub trait Entity {
    type Id: Clone + Eq + core::hash::Hash + core::fmt::Debug;

    fn id(&self) -> &Self::Id;
}
