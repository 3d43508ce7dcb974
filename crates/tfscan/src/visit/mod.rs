//! expression visitors
//!
//! The resolver rewrites reference traversals in place and [crate::block::AttributeRef::references]
//! collects them, both through [VisitTraversalsMut].
mod visit_traversals;
pub use visit_traversals::VisitTraversalsMut;

/// Visitor that visits its subjects mutably
pub trait VisitMut<T> {
    fn visit_mut(&mut self, value: &mut T);
}

// closures collecting or rewriting traversals
impl<T, F> VisitMut<T> for F
where
    F: FnMut(&mut T),
{
    fn visit_mut(&mut self, value: &mut T) {
        self(value)
    }
}
