//! Context propagation across the activity boundary. Propagators copy selected values between a
//! [Context] and the [Header] that travels with a task, so request-scoped data set by a workflow
//! (tenant ids, trace parents and the like) is visible to the activity it schedules.

use crate::{context::Context, protos::Header};
use std::fmt::Debug;

/// Moves values between a [Context] and task headers
pub trait ContextPropagator: Send + Sync + Debug {
    /// Write the values this propagator owns from `ctx` into `header`
    fn inject(&self, ctx: &Context, header: &mut Header) -> Result<(), anyhow::Error>;

    /// Returns a context derived from `ctx` carrying whatever this propagator finds in `header`.
    /// Returns `ctx` unchanged (a clone of it) when the header holds nothing it recognizes.
    fn extract(&self, ctx: &Context, header: &Header) -> Result<Context, anyhow::Error>;
}


#[cfg(test)]
mod tests {
    use super::{test_help::*, *};

    #[test]
    fn tenant_survives_header_trip() {
        let source = Context::background().with_value(Tenant("acme".to_string()));
        let mut header = Header::default();
        TenantPropagator.inject(&source, &mut header).unwrap();
        assert!(header.fields.contains_key("tenant"));

        let extracted = TenantPropagator
            .extract(&Context::background(), &header)
            .unwrap();
        assert_eq!(
            extracted.value::<Tenant>(),
            Some(&Tenant("acme".to_string()))
        );
    }

    #[test]
    fn missing_field_leaves_context_alone() {
        let ctx = TenantPropagator
            .extract(&Context::background(), &Header::default())
            .unwrap();
        assert_eq!(ctx.value::<Tenant>(), None);
    }
}
