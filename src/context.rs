//! Collaborator contract for observable-state context building.
//!
//! The context builder lives outside this crate; the simulation supplies an
//! implementation. The governance pipeline only depends on this seam.

use serde_json::Value;

/// Builds the bounded observable state one actor is allowed to see and
/// renders it into a generation prompt.
///
/// Implementations must never include hidden or non-observable fields in
/// the returned mapping; the role table's readable scopes define the bound
/// the pipeline passes in.
pub trait ContextBuilder {
    /// Bounded state mapping for one actor, restricted to the given
    /// observable state scopes.
    fn build(&self, actor_id: &str, observable_categories: &[String]) -> Value;

    /// Render a generation prompt from a built context.
    fn format_prompt(&self, context: &Value) -> String;

    /// Retrieved memory fragments for the actor, most relevant first.
    fn get_memory(&self, actor_id: &str) -> Vec<String>;
}
